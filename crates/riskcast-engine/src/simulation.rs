//! Simulation result envelope.
//!
//! Every simulation kind produces the same outer shape (id, type, status,
//! timestamps, progress, errors) with a strongly-typed `outcome` payload
//! per kind. The whole structure is plain data: numbers, strings, lists
//! and maps, safe to hand across the service boundary.

use crate::cascade::CascadeOutcome;
use crate::monte_carlo::MonteCarloOutcome;
use crate::stress::StressOutcome;
use crate::what_if::WhatIfOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationType {
    /// Multi-hop impact propagation from a trigger entity.
    Cascade,
    /// Stochastic trials over entity risk scores.
    MonteCarlo,
    /// Deterministic scenario projection against baseline.
    WhatIf,
    /// Named shock profiles applied across the portfolio.
    StressTest,
}

impl std::fmt::Display for SimulationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationType::Cascade => write!(f, "cascade"),
            SimulationType::MonteCarlo => write!(f, "monte_carlo"),
            SimulationType::WhatIf => write!(f, "what_if"),
            SimulationType::StressTest => write!(f, "stress_test"),
        }
    }
}

/// Lifecycle status of a simulation run.
///
/// Transitions are strictly monotonic: `pending -> running -> terminal`.
/// Once a run reaches a terminal state it never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    /// Created, not yet executing.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Aborted by an unrecoverable error.
    Failed,
    /// Stopped cooperatively before completion.
    Cancelled,
}

impl SimulationStatus {
    /// Returns true for completed, failed, and cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SimulationStatus::Completed | SimulationStatus::Failed | SimulationStatus::Cancelled
        )
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationStatus::Pending => write!(f, "pending"),
            SimulationStatus::Running => write!(f, "running"),
            SimulationStatus::Completed => write!(f, "completed"),
            SimulationStatus::Failed => write!(f, "failed"),
            SimulationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Type-specific payload of a finished (or partially finished) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// Cascade propagation results.
    Cascade(CascadeOutcome),
    /// Monte Carlo statistics.
    MonteCarlo(MonteCarloOutcome),
    /// What-if projection against baseline.
    WhatIf(WhatIfOutcome),
    /// Stress test results.
    Stress(StressOutcome),
}

/// Summary entry for an entity touched by a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedEntity {
    /// The affected entity.
    pub entity_id: Uuid,
    /// Entity name at snapshot time.
    pub name: String,
    /// Headline impact metric for this entity. For cascades this is the
    /// risk score delta; for projections it is the score change.
    pub impact: f64,
}

/// The result record for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Unique identifier for this run.
    pub id: Uuid,
    /// Tenant the run was scoped to.
    pub tenant_id: Uuid,
    /// Kind of simulation.
    pub simulation_type: SimulationType,
    /// Lifecycle status.
    pub status: SimulationStatus,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Progress: iterations finished so far.
    pub iterations: u64,
    /// Progress: iterations planned in total.
    pub total_iterations: u64,
    /// Type-specific results, present once the run has produced any.
    pub outcome: Option<SimulationOutcome>,
    /// Entities touched by the run, with headline impact metrics.
    #[serde(default)]
    pub affected_entities: Vec<AffectedEntity>,
    /// Full propagation paths (cascade runs only).
    #[serde(default)]
    pub cascade_paths: Vec<Vec<Uuid>>,
    /// Non-fatal problems encountered during the run.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SimulationResult {
    /// Creates a new pending run record.
    pub fn new(tenant_id: Uuid, simulation_type: SimulationType, total_iterations: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            simulation_type,
            status: SimulationStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            iterations: 0,
            total_iterations,
            outcome: None,
            affected_entities: Vec::new(),
            cascade_paths: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Moves a pending run to running. No-op in any other state.
    pub fn mark_running(&mut self) {
        if self.status == SimulationStatus::Pending {
            self.status = SimulationStatus::Running;
        }
    }

    /// Completes the run with its outcome. No-op if already terminal.
    pub fn complete(&mut self, outcome: SimulationOutcome) {
        if self.status.is_terminal() {
            return;
        }
        self.outcome = Some(outcome);
        self.status = SimulationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Fails the run, recording the error message. No-op if already
    /// terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.errors.push(message.into());
        self.status = SimulationStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Cancels the run, preserving any partial outcome already attached.
    /// No-op if already terminal.
    pub fn cancel(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SimulationStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
