//! Natural-language query understanding for airport operations.
//!
//! Turns free-text questions ("Is stand A1 free tomorrow at 2pm?") into
//! structured intents, validated entities and, for CRUD phrasings,
//! fully specialised operations with confirmation prompts.
//!
//! The pipeline is hybrid: deterministic regex/keyword rules run first
//! and an LLM fills the gaps; every AI stage degrades gracefully to the
//! rule result when the model is unavailable, slow or wrong.
//!
//! ```no_run
//! use airops_nlu::{Context, NluConfig, NluPipeline};
//!
//! # async fn demo() {
//! let pipeline = NluPipeline::new(None, None, NluConfig::default());
//! let outcome = pipeline
//!     .process("Tell me about stand A1", &Context::default())
//!     .await;
//! assert!(outcome.success);
//! # }
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod entities;
pub mod errors;
pub mod extractor;
pub mod intents;
pub mod llm;
pub mod operations;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod testutils;

pub use classifier::{ClassifiedIntent, IntentClassifier};
pub use config::{LlmConfig, NluConfig};
pub use domain::{DomainProcessor, DomainQuery};
pub use entities::{Entities, EntityKind, EntityValue};
pub use errors::NluError;
pub use extractor::EntityExtractor;
pub use operations::{CrudOperation, OperationKind, OperationProcessor};
pub use parser::{Context, ParsedQuery, QueryParser};
pub use pipeline::{NluPipeline, PipelineResponse, UtteranceState};
pub use processor::{ConfidenceBand, MetricsSnapshot, Outcome};
