//! Common processor scaffolding: result envelope, confidence bands,
//! per-component metrics and scoped timing.
//!
//! Every pipeline component returns `Outcome<T>` rather than a bare
//! `Result`; failures are data, not control flow, by the time they reach
//! a caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::NluConfig;
use crate::errors::NluError;

/// A single call taking longer than this is logged as slow.
const SLOW_CALL_MS: u128 = 1_000;

// ============================================================================
// Result Envelope
// ============================================================================

/// Error block inside a result envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&NluError> for ErrorInfo {
    fn from(err: &NluError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code(),
            details: err.details(),
        }
    }
}

/// Envelope metadata shared by success and failure results.
#[derive(Debug, Clone, Serialize)]
pub struct ResultMetadata {
    pub timestamp: DateTime<Utc>,
    /// Component that produced the result, e.g. `intent-classifier`.
    pub processor: &'static str,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Result envelope returned by every component.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub metadata: ResultMetadata,
}

impl<T> Outcome<T> {
    pub fn ok(processor: &'static str, data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            metadata: ResultMetadata {
                timestamp: Utc::now(),
                processor,
                extra: serde_json::Map::new(),
                error: None,
            },
        }
    }

    pub fn err(processor: &'static str, err: &NluError) -> Self {
        Self {
            success: false,
            data: None,
            metadata: ResultMetadata {
                timestamp: Utc::now(),
                processor,
                extra: serde_json::Map::new(),
                error: Some(ErrorInfo::from(err)),
            },
        }
    }

    /// Attach an extra metadata field.
    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.to_string(), value);
        self
    }

    /// Error code, if this is a failure envelope.
    pub fn error_code(&self) -> Option<&'static str> {
        self.metadata.error.as_ref().map(|e| e.code)
    }
}

// ============================================================================
// Confidence Bands
// ============================================================================

/// Coarse confidence classification used for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
    Insufficient,
}

impl ConfidenceBand {
    /// Classify a score against the configured thresholds.
    pub fn of(score: f64, config: &NluConfig) -> Self {
        if score >= config.high_confidence_threshold {
            Self::High
        } else if score >= config.confidence_threshold {
            Self::Medium
        } else if score >= config.low_confidence_threshold {
            Self::Low
        } else {
            Self::Insufficient
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Insufficient => "insufficient",
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Point-in-time view of a component's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_ms: u64,
    pub average_processing_time_ms: f64,
    pub success_rate: f64,
}

/// Lock-free per-component counters.
///
/// Counters are monotonically increasing between resets; a snapshot may
/// straddle a concurrent update but individual fields never tear.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    total_ms: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, elapsed_ms: u64, success: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            processed,
            succeeded,
            failed,
            total_ms,
            average_processing_time_ms: if processed == 0 {
                0.0
            } else {
                total_ms as f64 / processed as f64
            },
            success_rate: if processed == 0 {
                0.0
            } else {
                succeeded as f64 / processed as f64
            },
        }
    }

    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total_ms.store(0, Ordering::Relaxed);
    }
}

/// Scoped timer tying one call's duration back to its component metrics.
///
/// Created at stage entry; `finish()` records the elapsed time and logs a
/// warning when the call breached the slow threshold.
pub struct StageTimer<'a> {
    processor: &'static str,
    metrics: &'a ProcessorMetrics,
    enabled: bool,
    started: Instant,
}

impl<'a> StageTimer<'a> {
    pub fn start(processor: &'static str, metrics: &'a ProcessorMetrics, enabled: bool) -> Self {
        Self {
            processor,
            metrics,
            enabled,
            started: Instant::now(),
        }
    }

    pub fn finish(self, success: bool) {
        let elapsed = self.started.elapsed();
        if elapsed.as_millis() > SLOW_CALL_MS {
            warn!(
                processor = self.processor,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow pipeline call"
            );
        }
        if self.enabled {
            self.metrics.record(elapsed.as_millis() as u64, success);
        }
    }
}
