//! # riskcast-engine
//!
//! Risk cascade propagation and portfolio simulation engine.
//!
//! Given a tenant's graph of entities and typed dependencies, the engine
//! predicts how a shock to one entity propagates outward (cascade), runs
//! stochastic projections over portfolio risk (Monte Carlo), evaluates
//! deterministic scenario overrides (what-if), and applies named shock
//! profiles (stress tests). Runs are tracked by a registry supporting
//! progress queries and cooperative cancellation.
//!
//! The engine reads entities and dependencies through the [`RiskStore`]
//! trait and never persists results itself; callers own durability.

pub mod cascade;
pub mod engine;
pub mod error;
pub mod models;
pub mod monte_carlo;
pub mod registry;
pub mod simulation;
pub mod snapshot;
pub mod stress;
pub mod what_if;

pub use cascade::{CascadeConfig, CascadeEffect, CascadeOutcome, CascadePropagator, Severity};
pub use engine::{EngineConfig, SimulationEngine};
pub use error::{EngineError, EngineResult};
pub use models::{Dependency, DependencyLayer, Entity, EntityCategory, RiskBand};
pub use monte_carlo::{
    EntityStatistics, MonteCarloConfig, MonteCarloOutcome, MonteCarloSimulator,
    PortfolioStatistics,
};
pub use registry::SimulationRegistry;
pub use simulation::{
    AffectedEntity, SimulationOutcome, SimulationResult, SimulationStatus, SimulationType,
};
pub use snapshot::{GraphSnapshot, InMemoryRiskStore, RiskStore, SnapshotLoader};
pub use stress::{ResilienceRating, StressOutcome, StressScenario, StressTestRunner};
pub use what_if::{
    EntityChange, Recommendation, WhatIfEvaluator, WhatIfOutcome, WhatIfScenario,
};
