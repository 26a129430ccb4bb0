//! Reference-data contracts for the airport ops assistant.
//!
//! The NLU pipeline validates extracted entities and CRUD parameters
//! against reference data (airports, airlines, aircraft types, stands,
//! terminals). This crate owns the service contract and typed records;
//! the real implementation lives with whatever backs the reference DB.
//! `InMemoryReference` is the fixture-backed implementation used by
//! tests and the CLI harness.

mod memory;
mod records;

pub use memory::InMemoryReference;
pub use records::{Aircraft, Airline, Airport, SizeCategory, Stand, Terminal};

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a reference service.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference service unavailable: {0}")]
    Unavailable(String),

    #[error("reference lookup failed: {0}")]
    LookupFailed(String),
}

pub type Result<T> = std::result::Result<T, ReferenceError>;

/// Read-only lookup contract for airport reference data.
///
/// All operations are idempotent. Lookups return `Ok(None)` when the
/// record genuinely does not exist and `Err(_)` when the service itself
/// failed; callers treat the two differently (missing record is a
/// validation outcome, service failure is subject to the strictness
/// policy).
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    /// Look up an airport by its 3-letter IATA code.
    async fn airport_by_iata(&self, code: &str) -> Result<Option<Airport>>;

    /// Look up an airline by its 2-letter IATA code.
    async fn airline_by_iata(&self, code: &str) -> Result<Option<Airline>>;

    /// Look up an aircraft type by its IATA type designator.
    async fn aircraft_type_by_iata(&self, code: &str) -> Result<Option<Aircraft>>;

    /// Look up a stand by display name, e.g. `A1`.
    async fn stand_by_name(&self, name: &str) -> Result<Option<Stand>>;

    /// Whether a terminal with this identifier exists (`T1`, `1`).
    async fn terminal_exists(&self, id: &str) -> Result<bool>;

    /// Whether a stand with this identifier exists.
    async fn stand_exists(&self, id: &str) -> Result<bool>;

    /// Generic existence probe for CRUD targets (`stand`, `terminal`,
    /// `maintenance`, ...).
    async fn entity_exists(&self, kind: &str, id: &str) -> Result<bool>;
}
