//! Pipeline errors with stable, caller-visible codes.
//!
//! Errors never cross a component boundary as panics or raw anyhow
//! chains; each stage converts its failures into one of these variants
//! and the result envelope carries the stable code to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NluError {
    /// Empty or unusable input text.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Neither the rule stage nor the AI stage produced an intent.
    #[error("could not classify intent for: {0}")]
    ClassificationFailed(String),

    /// Intent found, but below the minimum confidence gate.
    #[error("intent {intent} classified at {confidence:.2}, below minimum {minimum:.2}")]
    LowConfidence {
        intent: String,
        confidence: f64,
        minimum: f64,
    },

    /// The classifier stage failed inside the query parser.
    #[error("intent classification failed: {0}")]
    IntentClassificationFailed(String),

    /// The extractor stage failed inside the query parser.
    #[error("entity extraction failed: {0}")]
    EntityExtractionFailed(String),

    /// Domain or schema validation rejected the query.
    #[error("validation failed: {}", .problems.join("; "))]
    ValidationFailed {
        problems: Vec<String>,
        missing_required: Vec<String>,
    },

    /// Anything unexpected inside a stage.
    #[error("processing error: {0}")]
    Processing(String),
}

impl NluError {
    /// Stable error code for the result envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ClassificationFailed(_) => "CLASSIFICATION_FAILED",
            Self::LowConfidence { .. } => "LOW_CONFIDENCE",
            Self::IntentClassificationFailed(_) => "INTENT_CLASSIFICATION_FAILED",
            Self::EntityExtractionFailed(_) => "ENTITY_EXTRACTION_FAILED",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::Processing(_) => "PROCESSING_ERROR",
        }
    }

    /// Structured details for the envelope, where a variant has any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ValidationFailed {
                problems,
                missing_required,
            } => Some(serde_json::json!({
                "problems": problems,
                "missingRequired": missing_required,
            })),
            Self::LowConfidence {
                intent,
                confidence,
                minimum,
            } => Some(serde_json::json!({
                "intent": intent,
                "confidence": confidence,
                "minimum": minimum,
            })),
            _ => None,
        }
    }

    pub fn missing_required(missing: Vec<String>) -> Self {
        let problems = missing
            .iter()
            .map(|m| format!("missing required entity: {}", m))
            .collect();
        Self::ValidationFailed {
            problems,
            missing_required: missing,
        }
    }
}

pub type Result<T> = std::result::Result<T, NluError>;
