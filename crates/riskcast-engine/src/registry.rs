//! Simulation registry: lifecycle tracking for simulation runs.
//!
//! The registry's map is the only structure shared between runs. Each
//! result record is mutated exclusively by the task that owns the run;
//! readers always get a cloned snapshot, so progress counters are never
//! torn. Cancellation is a per-run atomic flag the owning task polls at
//! its checkpoints.

use crate::error::{EngineError, EngineResult};
use crate::simulation::{SimulationResult, SimulationStatus, SimulationType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Handle to a registered run, owned by the executing task.
#[derive(Clone)]
pub struct RunHandle {
    /// The run's result record. Only the owning task writes to it.
    result: Arc<RwLock<SimulationResult>>,
    /// Cooperative cancellation flag.
    cancel: Arc<AtomicBool>,
    /// Live progress counter, readable without locking the record.
    progress: Arc<AtomicU64>,
}

impl RunHandle {
    fn new(result: SimulationResult) -> Self {
        Self {
            result: Arc::new(RwLock::new(result)),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Publishes the number of iterations finished so far.
    pub fn set_progress(&self, iterations: u64) {
        self.progress.store(iterations, Ordering::Relaxed);
    }

    /// Grants the owning task write access to the record.
    pub async fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut SimulationResult),
    {
        let mut result = self.result.write().await;
        mutate(&mut result);
        self.progress.store(result.iterations, Ordering::Relaxed);
    }

    /// Returns a consistent snapshot of the record, with live progress
    /// folded in while the run is still in flight.
    pub async fn snapshot(&self) -> SimulationResult {
        let mut result = self.result.read().await.clone();
        if !result.status.is_terminal() {
            result.iterations = self.progress.load(Ordering::Relaxed);
        }
        result
    }
}

/// Tracks every simulation run by id.
///
/// Explicitly constructed and passed to callers; there is no global
/// instance. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct SimulationRegistry {
    runs: Arc<RwLock<HashMap<Uuid, RunHandle>>>,
}

impl SimulationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run and returns the handle its owning task will
    /// drive.
    pub async fn register(&self, result: SimulationResult) -> RunHandle {
        let id = result.id;
        let handle = RunHandle::new(result);
        self.runs.write().await.insert(id, handle.clone());
        debug!(simulation_id = %id, "Registered simulation run");
        handle
    }

    /// Fetches a consistent snapshot of a run.
    pub async fn get(&self, id: Uuid) -> EngineResult<SimulationResult> {
        let handle = {
            let runs = self.runs.read().await;
            runs.get(&id).cloned()
        };
        match handle {
            Some(handle) => Ok(handle.snapshot().await),
            None => Err(EngineError::simulation_not_found(id)),
        }
    }

    /// Lists runs, optionally filtered by type, sorted by start time
    /// descending, truncated to `limit`.
    pub async fn list(
        &self,
        simulation_type: Option<SimulationType>,
        limit: usize,
    ) -> Vec<SimulationResult> {
        let handles: Vec<RunHandle> = {
            let runs = self.runs.read().await;
            runs.values().cloned().collect()
        };

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle.snapshot().await;
            if simulation_type.map_or(true, |t| result.simulation_type == t) {
                results.push(result);
            }
        }
        results.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        results.truncate(limit);
        results
    }

    /// Requests cancellation of a run. Returns true if the run was still
    /// pending or running; terminal runs are left untouched.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let handle = {
            let runs = self.runs.read().await;
            runs.get(&id).cloned()
        };
        let Some(handle) = handle else {
            return false;
        };

        let result = handle.result.read().await;
        if result.status.is_terminal() {
            return false;
        }
        handle.cancel.store(true, Ordering::Relaxed);
        debug!(simulation_id = %id, "Cancellation requested");
        true
    }

    /// Number of runs tracked.
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Returns true if no runs are tracked.
    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}
