//! Simulation engine facade.
//!
//! Ties the snapshot loader, the four algorithms, and the registry
//! together behind the operations the service layer calls. The engine is
//! an explicitly constructed value with injected collaborators; hosting
//! code owns its lifecycle and there is no global instance.
//!
//! Validation and not-found conditions surface synchronously from the
//! `run_*` methods. Once a run is registered, failures land on its result
//! record instead: callers check `status` and `errors`.

use crate::cascade::{CascadeConfig, CascadePropagator, MAX_CASCADE_DEPTH};
use crate::error::{EngineError, EngineResult};
use crate::monte_carlo::{MonteCarloConfig, MonteCarloSimulator};
use crate::registry::{RunHandle, SimulationRegistry};
use crate::simulation::{
    AffectedEntity, SimulationOutcome, SimulationResult, SimulationType,
};
use crate::snapshot::{GraphSnapshot, RiskStore, SnapshotLoader};
use crate::stress::{builtin_scenarios, StressScenario, StressTestRunner};
use crate::what_if::{WhatIfConfig, WhatIfEvaluator, WhatIfScenario};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Tunables for the engine and its subsystems.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound accepted for a cascade's `max_depth` argument.
    pub max_cascade_depth: u32,
    /// Cascade propagation parameters.
    pub cascade: CascadeConfig,
    /// Defaults applied when a Monte Carlo caller supplies no config.
    pub default_monte_carlo: MonteCarloConfig,
    /// What-if materiality and reporting limits.
    pub what_if: WhatIfConfig,
    /// Stress scenario catalog.
    pub stress_scenarios: Vec<StressScenario>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: MAX_CASCADE_DEPTH,
            cascade: CascadeConfig::default(),
            default_monte_carlo: MonteCarloConfig::default(),
            what_if: WhatIfConfig::default(),
            stress_scenarios: builtin_scenarios(),
        }
    }
}

/// The risk simulation engine.
#[derive(Clone)]
pub struct SimulationEngine {
    loader: SnapshotLoader,
    registry: SimulationRegistry,
    config: Arc<EngineConfig>,
}

impl SimulationEngine {
    /// Creates an engine over the given store with default configuration.
    pub fn new(store: Arc<dyn RiskStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with explicit configuration.
    pub fn with_config(store: Arc<dyn RiskStore>, config: EngineConfig) -> Self {
        Self {
            loader: SnapshotLoader::new(store),
            registry: SimulationRegistry::new(),
            config: Arc::new(config),
        }
    }

    /// The registry tracking this engine's runs.
    pub fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }

    // ========================================================================
    // Run operations
    // ========================================================================

    /// Runs a cascade simulation from a trigger entity.
    #[instrument(skip(self), fields(%tenant_id, %trigger_entity_id))]
    pub async fn run_cascade(
        &self,
        tenant_id: Uuid,
        trigger_entity_id: Uuid,
        max_depth: u32,
    ) -> EngineResult<SimulationResult> {
        if max_depth == 0 || max_depth > self.config.max_cascade_depth {
            return Err(EngineError::Validation(format!(
                "max_depth must be between 1 and {}",
                self.config.max_cascade_depth
            )));
        }

        let snapshot = self
            .loader
            .load_with_trigger(tenant_id, trigger_entity_id)
            .await?;

        let record = SimulationResult::new(tenant_id, SimulationType::Cascade, max_depth as u64);
        let handle = self.registry.register(record).await;
        handle.update(|r| r.mark_running()).await;

        let propagator = CascadePropagator::new(self.config.cascade.clone());
        let run = propagator.propagate(&snapshot, trigger_entity_id, max_depth, || {
            !handle.is_cancelled()
        });

        let id = {
            let affected: Vec<AffectedEntity> = run
                .outcome
                .effects
                .iter()
                .map(|e| AffectedEntity {
                    entity_id: e.entity_id,
                    name: e.entity_name.clone(),
                    impact: e.risk_score_delta,
                })
                .collect();
            let cancelled = run.cancelled;
            let errors = run.errors;
            let outcome = run.outcome;
            let mut run_id = Uuid::nil();
            handle
                .update(|r| {
                    run_id = r.id;
                    r.errors.extend(errors.iter().cloned());
                    r.affected_entities = affected.clone();
                    r.cascade_paths = outcome.paths.clone();
                    r.iterations = outcome.max_cascade_depth as u64;
                    if cancelled {
                        r.outcome = Some(SimulationOutcome::Cascade(outcome.clone()));
                        r.cancel();
                    } else {
                        r.complete(SimulationOutcome::Cascade(outcome.clone()));
                    }
                })
                .await;
            run_id
        };

        info!(simulation_id = %id, "Cascade simulation finished");
        self.registry.get(id).await
    }

    /// Runs a Monte Carlo simulation to completion (or cancellation) and
    /// returns the finished result.
    #[instrument(skip(self, config), fields(%tenant_id))]
    pub async fn run_monte_carlo(
        &self,
        tenant_id: Uuid,
        entity_ids: Option<&[Uuid]>,
        config: Option<MonteCarloConfig>,
    ) -> EngineResult<SimulationResult> {
        let config = config.unwrap_or_else(|| self.config.default_monte_carlo.clone());
        let simulator = MonteCarloSimulator::new(config.clone())?;

        let snapshot = self.loader.load(tenant_id, entity_ids).await?;
        let record =
            SimulationResult::new(tenant_id, SimulationType::MonteCarlo, config.iterations);
        let handle = self.registry.register(record).await;
        let id = self.execute_monte_carlo(&simulator, &snapshot, &handle).await;

        info!(simulation_id = %id, "Monte Carlo simulation finished");
        self.registry.get(id).await
    }

    /// Starts a Monte Carlo simulation in the background and returns its
    /// id immediately, so callers can poll progress and cancel long runs.
    #[instrument(skip(self, config), fields(%tenant_id))]
    pub async fn spawn_monte_carlo(
        &self,
        tenant_id: Uuid,
        entity_ids: Option<Vec<Uuid>>,
        config: Option<MonteCarloConfig>,
    ) -> EngineResult<Uuid> {
        let config = config.unwrap_or_else(|| self.config.default_monte_carlo.clone());
        let simulator = MonteCarloSimulator::new(config.clone())?;

        let record =
            SimulationResult::new(tenant_id, SimulationType::MonteCarlo, config.iterations);
        let id = record.id;
        let handle = self.registry.register(record).await;

        let engine = self.clone();
        tokio::spawn(async move {
            let snapshot = match engine.loader.load(tenant_id, entity_ids.as_deref()).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(simulation_id = %id, %err, "Snapshot load failed");
                    handle.update(|r| r.fail(err.to_string())).await;
                    return;
                }
            };
            engine
                .execute_monte_carlo(&simulator, &snapshot, &handle)
                .await;
            info!(simulation_id = %id, "Background Monte Carlo finished");
        });

        Ok(id)
    }

    async fn execute_monte_carlo(
        &self,
        simulator: &MonteCarloSimulator,
        snapshot: &GraphSnapshot,
        handle: &RunHandle,
    ) -> Uuid {
        handle.update(|r| r.mark_running()).await;

        let run = simulator.run(snapshot, |done| {
            handle.set_progress(done);
            !handle.is_cancelled()
        });

        let affected: Vec<AffectedEntity> = run
            .outcome
            .entity_statistics
            .iter()
            .map(|s| AffectedEntity {
                entity_id: s.entity_id,
                name: s.name.clone(),
                impact: s.mean - s.baseline_score,
            })
            .collect();

        let mut id = Uuid::nil();
        let iterations_run = run.iterations_run;
        let cancelled = run.cancelled;
        let outcome = run.outcome;
        handle
            .update(|r| {
                id = r.id;
                r.iterations = iterations_run;
                r.affected_entities = affected.clone();
                if cancelled {
                    r.outcome = Some(SimulationOutcome::MonteCarlo(outcome.clone()));
                    r.cancel();
                } else {
                    r.complete(SimulationOutcome::MonteCarlo(outcome.clone()));
                }
            })
            .await;
        id
    }

    /// Evaluates a what-if scenario against the tenant's current snapshot.
    #[instrument(skip(self, scenario), fields(%tenant_id, scenario = %scenario.name))]
    pub async fn run_what_if(
        &self,
        tenant_id: Uuid,
        scenario: WhatIfScenario,
    ) -> EngineResult<SimulationResult> {
        scenario.validate()?;

        let snapshot = self.loader.load(tenant_id, None).await?;
        let record = SimulationResult::new(tenant_id, SimulationType::WhatIf, 1);
        let handle = self.registry.register(record).await;
        handle.update(|r| r.mark_running()).await;

        let evaluator = WhatIfEvaluator::new(self.config.what_if.clone());
        let run = evaluator.evaluate(&snapshot, &scenario);

        let affected: Vec<AffectedEntity> = run
            .outcome
            .material_changes
            .iter()
            .map(|c| AffectedEntity {
                entity_id: c.entity_id,
                name: c.name.clone(),
                impact: c.delta,
            })
            .collect();

        let mut id = Uuid::nil();
        let errors = run.errors;
        let outcome = run.outcome;
        handle
            .update(|r| {
                id = r.id;
                r.errors.extend(errors.iter().cloned());
                r.affected_entities = affected.clone();
                r.iterations = 1;
                r.complete(SimulationOutcome::WhatIf(outcome.clone()));
            })
            .await;

        info!(simulation_id = %id, "What-if evaluation finished");
        self.registry.get(id).await
    }

    /// Runs stress scenarios against the tenant's snapshot. With `names`
    /// absent, the full catalog runs.
    #[instrument(skip(self, scenario_names), fields(%tenant_id))]
    pub async fn run_stress_test(
        &self,
        tenant_id: Uuid,
        scenario_names: Option<&[String]>,
    ) -> EngineResult<SimulationResult> {
        let planned = scenario_names
            .map(|n| n.len())
            .unwrap_or(self.config.stress_scenarios.len()) as u64;

        let snapshot = self.loader.load(tenant_id, None).await?;
        let record = SimulationResult::new(tenant_id, SimulationType::StressTest, planned);
        let handle = self.registry.register(record).await;
        handle.update(|r| r.mark_running()).await;

        let runner = StressTestRunner::new(self.config.stress_scenarios.clone());
        let run = runner.run(&snapshot, scenario_names);

        let mut id = Uuid::nil();
        let errors = run.errors;
        let outcome = run.outcome;
        handle
            .update(|r| {
                id = r.id;
                r.errors.extend(errors.iter().cloned());
                r.iterations = outcome.scenarios.len() as u64;
                r.complete(SimulationOutcome::Stress(outcome.clone()));
            })
            .await;

        info!(simulation_id = %id, "Stress test finished");
        self.registry.get(id).await
    }

    // ========================================================================
    // Query operations
    // ========================================================================

    /// Fetches a simulation result by id.
    pub async fn get_simulation(&self, id: Uuid) -> EngineResult<SimulationResult> {
        self.registry.get(id).await
    }

    /// Lists simulations, newest first.
    pub async fn list_simulations(
        &self,
        simulation_type: Option<SimulationType>,
        limit: usize,
    ) -> Vec<SimulationResult> {
        self.registry.list(simulation_type, limit).await
    }

    /// Requests cancellation of a run. Returns true if the run was still
    /// cancellable.
    pub async fn cancel_simulation(&self, id: Uuid) -> bool {
        self.registry.cancel(id).await
    }
}
