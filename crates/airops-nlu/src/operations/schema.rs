//! Per-operation validation schemas.
//!
//! Keyed by `(kind, entityType)`. Update schemas reuse the create field
//! rules of their entity; the rules apply to the `fieldsToUpdate`
//! sub-record there.

use super::OperationKind;

/// Declared parameter type, used for coercion and type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
        }
    }
}

/// One parameter's type and constraints.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Anchored regex the string form must match.
    pub pattern: Option<&'static str>,
    /// Closed value set, lowercase.
    pub allowed: &'static [&'static str],
    /// Constraint message override; a default is derived when absent.
    pub message: Option<&'static str>,
}

const fn text(name: &'static str) -> FieldRule {
    FieldRule {
        name,
        field_type: FieldType::Text,
        pattern: None,
        allowed: &[],
        message: None,
    }
}

/// Schema for one `(kind, entityType)` pair.
#[derive(Debug, Clone)]
pub struct OperationSchema {
    pub required: &'static [&'static str],
    pub fields: &'static [FieldRule],
    /// Cross-field constraint: second date must not precede the first.
    pub date_pair: Option<(&'static str, &'static str)>,
    /// `(parameter, reference kind)` pairs checked against the registry.
    pub reference_checks: &'static [(&'static str, &'static str)],
}

const STAND_FIELDS: &[FieldRule] = &[
    text("name"),
    FieldRule {
        name: "terminal",
        field_type: FieldType::Text,
        pattern: Some(r"^T?\d+$"),
        allowed: &[],
        message: Some("terminal must be a terminal identifier like T1"),
    },
    text("pier"),
    FieldRule {
        name: "capacity",
        field_type: FieldType::Number,
        pattern: None,
        allowed: &[],
        message: None,
    },
    FieldRule {
        name: "type",
        field_type: FieldType::Text,
        pattern: None,
        allowed: &["contact", "remote", "cargo"],
        message: None,
    },
    FieldRule {
        name: "status",
        field_type: FieldType::Text,
        pattern: None,
        allowed: &["active", "inactive", "maintenance", "closed"],
        message: None,
    },
    FieldRule {
        name: "features",
        field_type: FieldType::Array,
        pattern: None,
        allowed: &[],
        message: None,
    },
    text("location"),
    text("description"),
];

const TERMINAL_FIELDS: &[FieldRule] = &[
    text("name"),
    text("code"),
    FieldRule {
        name: "capacity",
        field_type: FieldType::Number,
        pattern: None,
        allowed: &[],
        message: None,
    },
    text("description"),
];

const MAINTENANCE_FIELDS: &[FieldRule] = &[
    text("standId"),
    FieldRule {
        name: "startDate",
        field_type: FieldType::Date,
        pattern: None,
        allowed: &[],
        message: None,
    },
    FieldRule {
        name: "endDate",
        field_type: FieldType::Date,
        pattern: None,
        allowed: &[],
        message: None,
    },
    text("reason"),
    FieldRule {
        name: "priority",
        field_type: FieldType::Text,
        pattern: None,
        allowed: &["high", "medium", "low"],
        message: None,
    },
    text("description"),
];

const DELETE_FLAGS: &[FieldRule] = &[
    FieldRule {
        name: "softDelete",
        field_type: FieldType::Boolean,
        pattern: None,
        allowed: &[],
        message: None,
    },
    FieldRule {
        name: "cascade",
        field_type: FieldType::Boolean,
        pattern: None,
        allowed: &[],
        message: None,
    },
];

static CREATE_STAND: OperationSchema = OperationSchema {
    required: &["name", "terminal"],
    fields: STAND_FIELDS,
    date_pair: None,
    reference_checks: &[("terminal", "terminal")],
};

static CREATE_TERMINAL: OperationSchema = OperationSchema {
    required: &["name"],
    fields: TERMINAL_FIELDS,
    date_pair: None,
    reference_checks: &[],
};

static CREATE_MAINTENANCE: OperationSchema = OperationSchema {
    required: &["standId", "startDate", "endDate"],
    fields: MAINTENANCE_FIELDS,
    date_pair: Some(("startDate", "endDate")),
    reference_checks: &[("standId", "stand")],
};

static UPDATE_STAND: OperationSchema = OperationSchema {
    required: &["id"],
    fields: STAND_FIELDS,
    date_pair: None,
    reference_checks: &[("id", "stand"), ("terminal", "terminal")],
};

static UPDATE_TERMINAL: OperationSchema = OperationSchema {
    required: &["id"],
    fields: TERMINAL_FIELDS,
    date_pair: None,
    reference_checks: &[("id", "terminal")],
};

static UPDATE_MAINTENANCE: OperationSchema = OperationSchema {
    required: &["id"],
    fields: MAINTENANCE_FIELDS,
    date_pair: Some(("startDate", "endDate")),
    reference_checks: &[("id", "maintenance")],
};

static DELETE_STAND: OperationSchema = OperationSchema {
    required: &["id"],
    fields: DELETE_FLAGS,
    date_pair: None,
    reference_checks: &[("id", "stand")],
};

static DELETE_TERMINAL: OperationSchema = OperationSchema {
    required: &["id"],
    fields: DELETE_FLAGS,
    date_pair: None,
    reference_checks: &[("id", "terminal")],
};

static DELETE_MAINTENANCE: OperationSchema = OperationSchema {
    required: &["id"],
    fields: DELETE_FLAGS,
    date_pair: None,
    reference_checks: &[("id", "maintenance")],
};

static READ_GENERIC: OperationSchema = OperationSchema {
    required: &[],
    fields: &[
        text("id"),
        text("terminal"),
        text("pier"),
        text("status"),
        FieldRule {
            name: "limit",
            field_type: FieldType::Number,
            pattern: None,
            allowed: &[],
            message: None,
        },
        text("sortBy"),
        FieldRule {
            name: "orderDirection",
            field_type: FieldType::Text,
            pattern: None,
            allowed: &["asc", "desc"],
            message: None,
        },
        FieldRule {
            name: "filterBy",
            field_type: FieldType::Array,
            pattern: None,
            allowed: &[],
            message: None,
        },
        text("format"),
    ],
    date_pair: None,
    reference_checks: &[],
};

/// Schema lookup; `None` means the operation type is not recognised.
pub fn schema_for(kind: OperationKind, entity: &str) -> Option<&'static OperationSchema> {
    use OperationKind::*;
    match (kind, entity) {
        (Create, "stand") => Some(&CREATE_STAND),
        (Create, "terminal") => Some(&CREATE_TERMINAL),
        (Create, "maintenance") => Some(&CREATE_MAINTENANCE),
        (Update, "stand") => Some(&UPDATE_STAND),
        (Update, "terminal") => Some(&UPDATE_TERMINAL),
        (Update, "maintenance") => Some(&UPDATE_MAINTENANCE),
        (Delete, "stand") => Some(&DELETE_STAND),
        (Delete, "terminal") => Some(&DELETE_TERMINAL),
        (Delete, "maintenance") => Some(&DELETE_MAINTENANCE),
        (Read, "stand" | "terminal" | "maintenance") => Some(&READ_GENERIC),
        _ => None,
    }
}

/// Field rule by name within a schema.
pub fn field_rule(schema: &'static OperationSchema, name: &str) -> Option<&'static FieldRule> {
    schema.fields.iter().find(|f| f.name == name)
}
