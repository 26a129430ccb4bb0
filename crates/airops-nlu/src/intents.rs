//! Closed intent catalogue.
//!
//! Loaded once at start and read-only afterwards. Each intent carries a
//! one-line description (fed into the classifier's system prompt),
//! example utterances and a category tag. CRUD intents use the
//! `<verb>.<entity>` form and are routed to the operation specialisation
//! instead of the domain processor.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Coarse grouping of intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Asset,
    Reference,
    Maintenance,
    Operational,
    Crud,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Reference => "reference",
            Self::Maintenance => "maintenance",
            Self::Operational => "operational",
            Self::Crud => "crud",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalogue entry.
#[derive(Debug, Clone)]
pub struct IntentDef {
    pub name: &'static str,
    pub description: &'static str,
    pub examples: &'static [&'static str],
    pub category: Category,
}

/// Entity requirements for an intent.
///
/// `required` must all be present. When `any_of` is non-empty, at least
/// one of its groups must be fully present as well (a group is a set of
/// entity keys that only satisfies together, e.g. latitude+longitude).
#[derive(Debug, Clone, Default)]
pub struct Requirement {
    pub required: &'static [&'static str],
    pub any_of: &'static [&'static [&'static str]],
    pub optional: &'static [&'static str],
}

/// CRUD verbs mapped to operation kinds; see `operations::OperationKind`.
pub const CREATE_VERBS: &[&str] = &["create", "add", "schedule"];
pub const READ_VERBS: &[&str] = &["get", "list", "view", "show"];
pub const UPDATE_VERBS: &[&str] = &["update", "edit", "modify", "change"];
pub const DELETE_VERBS: &[&str] = &["delete", "remove", "cancel", "clear"];

/// Intents whose answers change with the clock even without an explicit
/// time entity.
pub const TIME_SENSITIVE_INTENTS: &[&str] = &[
    "stand.availability",
    "maintenance.schedule",
    "maintenance.status",
    "flight.details",
    "capacity.summary",
];

static CATALOGUE: Lazy<Vec<IntentDef>> = Lazy::new(|| {
    use Category::*;
    vec![
        // ── asset ────────────────────────────────────────────────
        IntentDef {
            name: "stand.details",
            description: "Details of a specific aircraft stand",
            examples: &["tell me about stand A1", "stand 23 details"],
            category: Asset,
        },
        IntentDef {
            name: "stand.status",
            description: "Current status of a stand (occupied, free, closed)",
            examples: &["what is the status of stand A1", "is stand 12 occupied"],
            category: Asset,
        },
        IntentDef {
            name: "stand.list",
            description: "List stands, optionally filtered by terminal or pier",
            examples: &["show all stands in terminal 2"],
            category: Asset,
        },
        IntentDef {
            name: "stand.nearest",
            description: "Find the stand nearest to a point or named location",
            examples: &["which stand is nearest to the fuel farm"],
            category: Asset,
        },
        IntentDef {
            name: "stand.availability",
            description: "Whether a stand is available at a given time",
            examples: &["is stand A1 free tomorrow at 14:00"],
            category: Asset,
        },
        IntentDef {
            name: "terminal.details",
            description: "Details of a terminal",
            examples: &["tell me about terminal 5"],
            category: Asset,
        },
        IntentDef {
            name: "terminal.stands",
            description: "Stands belonging to a terminal",
            examples: &["which stands are in T2"],
            category: Asset,
        },
        IntentDef {
            name: "pier.details",
            description: "Details of a pier",
            examples: &["tell me about pier B"],
            category: Asset,
        },
        // ── reference ────────────────────────────────────────────
        IntentDef {
            name: "airport.details",
            description: "Details of an airport by IATA code",
            examples: &["tell me about LHR"],
            category: Reference,
        },
        IntentDef {
            name: "airport.search",
            description: "Search airports by name, city, country or region",
            examples: &["find airports in Spain"],
            category: Reference,
        },
        IntentDef {
            name: "airline.details",
            description: "Details of an airline by IATA code",
            examples: &["who is BA"],
            category: Reference,
        },
        IntentDef {
            name: "aircraft.details",
            description: "Details of an aircraft type",
            examples: &["tell me about the 777"],
            category: Reference,
        },
        IntentDef {
            name: "aircraft.stands",
            description: "Which stands can accept a given aircraft type or size",
            examples: &["can a 777 use stand A1", "stands for size E aircraft"],
            category: Reference,
        },
        // ── maintenance ──────────────────────────────────────────
        IntentDef {
            name: "maintenance.status",
            description: "Maintenance status of a stand",
            examples: &["is stand A1 under maintenance"],
            category: Maintenance,
        },
        IntentDef {
            name: "maintenance.list",
            description: "List maintenance requests",
            examples: &["show open maintenance requests"],
            category: Maintenance,
        },
        IntentDef {
            name: "maintenance.schedule",
            description: "Upcoming maintenance schedule for a stand",
            examples: &["when is stand A1 next down for maintenance"],
            category: Maintenance,
        },
        // ── operational ──────────────────────────────────────────
        IntentDef {
            name: "flight.details",
            description: "Details of a flight by flight number",
            examples: &["where is BA123"],
            category: Operational,
        },
        IntentDef {
            name: "capacity.summary",
            description: "Stand capacity summary for the airport",
            examples: &["how much stand capacity do we have today"],
            category: Operational,
        },
        IntentDef {
            name: "utilization.summary",
            description: "Stand utilisation summary",
            examples: &["stand utilisation this week"],
            category: Operational,
        },
        // ── crud ─────────────────────────────────────────────────
        IntentDef {
            name: "create.stand",
            description: "Create a new stand",
            examples: &["create a stand named A5 in terminal 1"],
            category: Crud,
        },
        IntentDef {
            name: "update.stand",
            description: "Update an existing stand",
            examples: &["update stand A1 with type=remote"],
            category: Crud,
        },
        IntentDef {
            name: "delete.stand",
            description: "Delete a stand",
            examples: &["delete stand A1"],
            category: Crud,
        },
        IntentDef {
            name: "get.stand",
            description: "Fetch one stand record",
            examples: &["get stand A1"],
            category: Crud,
        },
        IntentDef {
            name: "list.stands",
            description: "List stand records",
            examples: &["list stands sorted by name"],
            category: Crud,
        },
        IntentDef {
            name: "create.terminal",
            description: "Create a new terminal",
            examples: &["add terminal 6"],
            category: Crud,
        },
        IntentDef {
            name: "update.terminal",
            description: "Update a terminal",
            examples: &["rename terminal 2"],
            category: Crud,
        },
        IntentDef {
            name: "delete.terminal",
            description: "Delete a terminal",
            examples: &["remove terminal 6"],
            category: Crud,
        },
        IntentDef {
            name: "create.maintenance",
            description: "Schedule a maintenance request for a stand",
            examples: &["schedule maintenance for stand A1 from tomorrow until friday"],
            category: Crud,
        },
        IntentDef {
            name: "update.maintenance",
            description: "Update a maintenance request",
            examples: &["change maintenance MR-1 priority to high"],
            category: Crud,
        },
        IntentDef {
            name: "delete.maintenance",
            description: "Cancel a maintenance request",
            examples: &["cancel maintenance MR-1"],
            category: Crud,
        },
        IntentDef {
            name: "get.maintenance",
            description: "Fetch one maintenance request",
            examples: &["get maintenance MR-1"],
            category: Crud,
        },
        IntentDef {
            name: "list.maintenances",
            description: "List maintenance requests",
            examples: &["list maintenance for terminal 1"],
            category: Crud,
        },
    ]
});

static REQUIREMENTS: Lazy<HashMap<&'static str, Requirement>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "stand.details",
        Requirement {
            required: &["stand"],
            optional: &["terminal", "pier"],
            ..Default::default()
        },
    );
    map.insert(
        "stand.status",
        Requirement {
            required: &["stand"],
            optional: &["date", "time"],
            ..Default::default()
        },
    );
    map.insert(
        "stand.availability",
        Requirement {
            required: &["stand"],
            optional: &["date", "time", "duration"],
            ..Default::default()
        },
    );
    map.insert(
        "stand.nearest",
        Requirement {
            any_of: &[&["latitude", "longitude"], &["referencePoint"]],
            optional: &["terminal"],
            ..Default::default()
        },
    );
    map.insert(
        "terminal.details",
        Requirement {
            required: &["terminal"],
            ..Default::default()
        },
    );
    map.insert(
        "terminal.stands",
        Requirement {
            required: &["terminal"],
            optional: &["pier"],
            ..Default::default()
        },
    );
    map.insert(
        "pier.details",
        Requirement {
            required: &["pier"],
            ..Default::default()
        },
    );
    map.insert(
        "airport.details",
        Requirement {
            required: &["airport"],
            ..Default::default()
        },
    );
    map.insert(
        "airport.search",
        Requirement {
            any_of: &[
                &["name"],
                &["city"],
                &["country"],
                &["region"],
                &["query"],
                &["searchTerm"],
            ],
            ..Default::default()
        },
    );
    map.insert(
        "airline.details",
        Requirement {
            required: &["airline"],
            ..Default::default()
        },
    );
    map.insert(
        "aircraft.details",
        Requirement {
            required: &["aircraftType"],
            ..Default::default()
        },
    );
    map.insert(
        "aircraft.stands",
        Requirement {
            any_of: &[&["aircraftType"], &["aircraftSize"]],
            optional: &["stand", "terminal", "date"],
            ..Default::default()
        },
    );
    map.insert(
        "maintenance.status",
        Requirement {
            required: &["stand"],
            ..Default::default()
        },
    );
    map.insert(
        "maintenance.schedule",
        Requirement {
            required: &["stand"],
            optional: &["date"],
            ..Default::default()
        },
    );
    map.insert(
        "flight.details",
        Requirement {
            required: &["flightNumber"],
            ..Default::default()
        },
    );
    map
});

/// Full catalogue, declaration order.
pub fn catalogue() -> &'static [IntentDef] {
    &CATALOGUE
}

/// Look up one intent by name.
pub fn lookup(name: &str) -> Option<&'static IntentDef> {
    CATALOGUE.iter().find(|def| def.name == name)
}

/// Category of a known intent.
pub fn category_of(name: &str) -> Option<Category> {
    lookup(name).map(|def| def.category)
}

/// Requirement record for an intent; intents without an entry have no
/// required entities.
pub fn requirements(name: &str) -> Option<&'static Requirement> {
    REQUIREMENTS.get(name)
}

/// Whether the intent follows the CRUD `<verb>.<entity>` form.
pub fn is_crud(name: &str) -> bool {
    category_of(name) == Some(Category::Crud)
}

/// Split a CRUD intent into `(verb, entity)`.
pub fn split_crud(name: &str) -> Option<(&str, &str)> {
    let (verb, entity) = name.split_once('.')?;
    let is_verb = CREATE_VERBS.contains(&verb)
        || READ_VERBS.contains(&verb)
        || UPDATE_VERBS.contains(&verb)
        || DELETE_VERBS.contains(&verb);
    is_verb.then_some((verb, entity))
}
