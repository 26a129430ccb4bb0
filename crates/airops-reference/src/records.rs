//! Typed reference records.

use serde::{Deserialize, Serialize};

/// Airport master record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// 3-letter IATA code, uppercase.
    pub iata: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Airline master record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    /// 2-letter IATA code, uppercase.
    pub iata: String,
    pub name: String,
}

/// Aircraft type record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// IATA type designator, e.g. `777` or `A320`.
    pub iata: String,
    pub name: String,
    pub size: SizeCategory,
}

/// ICAO-style aircraft size category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeCategory {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl SizeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        }
    }
}

impl std::fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aircraft stand record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stand {
    /// Display name, e.g. `A1` or `T1A12`.
    pub name: String,
    /// Owning terminal, normalised `T<n>` form.
    pub terminal: Option<String>,
    /// Owning pier letter.
    pub pier: Option<String>,
    /// Largest size category the stand accepts.
    pub max_size: Option<SizeCategory>,
}

/// Terminal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    /// Normalised `T<n>` identifier.
    pub id: String,
    pub name: Option<String>,
}
