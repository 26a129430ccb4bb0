//! Date, time and duration parsing for extracted entities.
//!
//! Relative phrases resolve against a caller-supplied "today" so tests
//! are clock-independent; the extractor passes the host-local date.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Resolve a date phrase to an ISO `YYYY-MM-DD` string.
///
/// Accepts `today`, `tomorrow`, `yesterday`, `next <weekday>` and literal
/// ISO dates. `next <weekday>` is the first matching weekday strictly
/// after `today`.
pub fn resolve_date(raw: &str, today: NaiveDate) -> Option<String> {
    let phrase = raw.trim().to_lowercase();
    let resolved = match phrase.as_str() {
        "today" => today,
        "tomorrow" => today + Duration::days(1),
        "yesterday" => today - Duration::days(1),
        _ => {
            if let Some(day) = phrase.strip_prefix("next ") {
                let target = parse_weekday(day.trim())?;
                let mut date = today + Duration::days(1);
                while date.weekday() != target {
                    date += Duration::days(1);
                }
                date
            } else {
                // Literal ISO date; reject impossible dates.
                NaiveDate::parse_from_str(&phrase, "%Y-%m-%d").ok()?
            }
        }
    };
    Some(resolved.format("%Y-%m-%d").to_string())
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    Some(match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    })
}

/// Parse a time phrase to 24-hour `HH:MM`.
///
/// Accepts `14:30` and `2pm` / `11 am` forms.
pub fn parse_time(raw: &str) -> Option<String> {
    let phrase = raw.trim().to_lowercase();

    if let Some((h, m)) = phrase.split_once(':') {
        let hour: u32 = h.trim().parse().ok()?;
        let minute: u32 = m.trim().parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        return Some(format!("{:02}:{:02}", hour, minute));
    }

    let (digits, meridiem) = if let Some(rest) = phrase.strip_suffix("am") {
        (rest.trim(), false)
    } else if let Some(rest) = phrase.strip_suffix("pm") {
        (rest.trim(), true)
    } else {
        return None;
    };

    let hour: u32 = digits.parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour24 = match (hour, meridiem) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    Some(format!("{:02}:00", hour24))
}

/// Parse a duration phrase (`2 hours`, `45 min`, `1 day`) to total minutes.
pub fn parse_duration_minutes(raw: &str) -> Option<i64> {
    let phrase = raw.trim().to_lowercase();
    let split = phrase.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = phrase.split_at(split);
    let count: i64 = count.parse().ok()?;
    let unit = unit.trim();

    let per_unit = if unit.starts_with("hour") || unit.starts_with("hr") {
        60
    } else if unit.starts_with("min") {
        1
    } else if unit.starts_with("day") {
        24 * 60
    } else {
        return None;
    };
    Some(count * per_unit)
}
