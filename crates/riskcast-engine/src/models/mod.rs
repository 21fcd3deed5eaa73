//! Domain models for the risk cascade engine.
//!
//! Entities and dependencies are owned by the external store; the engine
//! only ever sees immutable snapshots of them.

mod dependency;
mod entity;

pub use dependency::{Dependency, DependencyLayer};
pub use entity::{Entity, EntityCategory, RiskBand};
