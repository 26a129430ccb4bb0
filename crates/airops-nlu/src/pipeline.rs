//! Pipeline facade: one entry point from raw text to an answerable
//! query or a specialised CRUD operation.
//!
//! CRUD intents short-circuit the domain processor and go to the
//! operation specialisation instead. The per-utterance state machine is
//! reported in result metadata.

use std::sync::Arc;

use serde::Serialize;

use airops_reference::ReferenceRepository;

use crate::config::NluConfig;
use crate::domain::{DomainProcessor, DomainQuery};
use crate::intents;
use crate::llm::LanguageModel;
use crate::operations::{CrudOperation, OperationKind, OperationProcessor};
use crate::parser::{Context, ParsedQuery, QueryParser};
use crate::processor::{MetricsSnapshot, Outcome};

pub const PROCESSOR: &str = "nlu-pipeline";

/// Where an utterance ended up in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceState {
    Selecting,
    Classified,
    Extracted,
    Validated,
    Failed,
    Confirming,
    DispatchedRead,
}

impl UtteranceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Classified => "classified",
            Self::Extracted => "extracted",
            Self::Validated => "validated",
            Self::Failed => "failed",
            Self::Confirming => "confirming",
            Self::DispatchedRead => "dispatched_read",
        }
    }
}

/// Final product of the pipeline for one utterance.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineResponse {
    /// Enriched read-only query.
    Query {
        parsed: ParsedQuery,
        domain: DomainQuery,
    },
    /// Specialised CRUD operation.
    Operation {
        parsed: ParsedQuery,
        operation: CrudOperation,
    },
}

/// End-to-end NLU pipeline.
pub struct NluPipeline {
    parser: QueryParser,
    domain: DomainProcessor,
    operations: OperationProcessor,
}

impl NluPipeline {
    pub fn new(
        llm: Option<Arc<dyn LanguageModel>>,
        reference: Option<Arc<dyn ReferenceRepository>>,
        config: NluConfig,
    ) -> Self {
        Self {
            parser: QueryParser::new(llm, reference.clone(), config.clone()),
            domain: DomainProcessor::new(reference.clone(), config.clone()),
            operations: OperationProcessor::new(reference, config),
        }
    }

    /// Process one utterance end to end.
    pub async fn process(&self, text: &str, context: &Context) -> Outcome<PipelineResponse> {
        let parse_outcome = self.parser.process(text, context).await;
        let Some(parsed) = parse_outcome.data else {
            return self.failed(parse_outcome);
        };
        // The parser's extras (cached, confidenceBand, intentSource,
        // entityCount) survive into the facade envelope.
        let parse_extra = parse_outcome.metadata.extra;

        if intents::is_crud(&parsed.intent) {
            let op_outcome = self.operations.process(&parsed).await;
            let Some(operation) = op_outcome.data else {
                return self.failed(op_outcome);
            };
            let state = match operation.operation_type {
                OperationKind::Read => UtteranceState::DispatchedRead,
                _ if operation.parameter_status.is_complete => UtteranceState::Confirming,
                _ => UtteranceState::Validated,
            };
            let mut out = Outcome::ok(PROCESSOR, PipelineResponse::Operation { parsed, operation })
                .with_meta("state", serde_json::json!(state.as_str()));
            out.metadata.extra.extend(parse_extra);
            out.metadata.extra.extend(op_outcome.metadata.extra);
            out
        } else {
            let domain_outcome = self.domain.process(&parsed, context).await;
            let Some(domain) = domain_outcome.data else {
                return self.failed(domain_outcome);
            };
            let mut out = Outcome::ok(PROCESSOR, PipelineResponse::Query { parsed, domain })
                .with_meta(
                    "state",
                    serde_json::json!(UtteranceState::DispatchedRead.as_str()),
                );
            out.metadata.extra.extend(parse_extra);
            out.metadata.extra.extend(domain_outcome.metadata.extra);
            out
        }
    }

    /// Re-wrap a stage failure under the pipeline's name, keeping the
    /// original error and noting the stage that failed.
    fn failed<T, U>(&self, stage: Outcome<U>) -> Outcome<T> {
        let stage_name = stage.metadata.processor;
        Outcome {
            success: false,
            data: None,
            metadata: crate::processor::ResultMetadata {
                timestamp: stage.metadata.timestamp,
                processor: PROCESSOR,
                extra: stage.metadata.extra,
                error: stage.metadata.error,
            },
        }
        .with_meta("state", serde_json::json!(UtteranceState::Failed.as_str()))
        .with_meta("failedStage", serde_json::json!(stage_name))
    }

    pub fn clear_cache(&self) {
        self.parser.clear_cache();
    }

    /// Per-component metrics snapshots.
    pub fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            parser: self.parser.metrics().snapshot(),
            domain: self.domain.metrics().snapshot(),
            operations: self.operations.metrics().snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub parser: MetricsSnapshot,
    pub domain: MetricsSnapshot,
    pub operations: MetricsSnapshot,
}
