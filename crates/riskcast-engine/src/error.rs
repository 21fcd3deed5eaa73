//! Error types for the simulation engine.
//!
//! Validation and not-found conditions are raised synchronously at call
//! time. Failures that occur inside a running simulation are recorded on
//! the `SimulationResult` instead (partial failures in its `errors` list,
//! fatal failures as a `failed` status), so registry bookkeeping calls
//! never throw on behalf of a run.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced synchronously by the engine's entry points.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A referenced entity, tenant, or simulation does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed scenario or configuration input, rejected before any
    /// work begins.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external store failed to serve the snapshot.
    #[error("Store error: {0}")]
    Store(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Convenience constructor for a missing entity.
    pub fn entity_not_found(id: Uuid) -> Self {
        EngineError::NotFound(format!("entity {id}"))
    }

    /// Convenience constructor for a missing simulation.
    pub fn simulation_not_found(id: Uuid) -> Self {
        EngineError::NotFound(format!("simulation {id}"))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
