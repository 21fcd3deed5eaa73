//! What-if scenario evaluation.
//!
//! Applies a declarative set of overrides to the current snapshot and
//! reports projected state against baseline. Fully deterministic: same
//! snapshot and scenario always produce the same projection.

use crate::error::{EngineError, EngineResult};
use crate::models::RiskBand;
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Key in `global_modifiers` for the portfolio-wide score multiplier.
pub const MODIFIER_RISK_MULTIPLIER: &str = "risk_multiplier";

/// A declarative scenario to evaluate against the current snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatIfScenario {
    /// Short name for the scenario.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Per-entity score changes.
    #[serde(default)]
    pub entity_changes: Vec<EntityChange>,
    /// Named global modifiers (e.g. `risk_multiplier`).
    #[serde(default)]
    pub global_modifiers: HashMap<String, f64>,
}

impl WhatIfScenario {
    /// Creates a named scenario with no changes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the global risk multiplier.
    pub fn with_risk_multiplier(mut self, multiplier: f64) -> Self {
        self.global_modifiers
            .insert(MODIFIER_RISK_MULTIPLIER.to_string(), multiplier);
        self
    }

    /// Adds a per-entity change.
    pub fn with_entity_change(mut self, change: EntityChange) -> Self {
        self.entity_changes.push(change);
        self
    }

    /// Returns the global risk multiplier, defaulting to 1.0.
    pub fn risk_multiplier(&self) -> f64 {
        self.global_modifiers
            .get(MODIFIER_RISK_MULTIPLIER)
            .copied()
            .unwrap_or(1.0)
    }

    /// Validates the scenario, rejecting it before any work begins.
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("scenario name is required".into()));
        }
        for (key, value) in &self.global_modifiers {
            if !value.is_finite() || *value < 0.0 {
                return Err(EngineError::Validation(format!(
                    "global modifier {key} must be finite and non-negative"
                )));
            }
        }
        for change in &self.entity_changes {
            if let Some(v) = change.risk_override {
                if !v.is_finite() {
                    return Err(EngineError::Validation(format!(
                        "risk_override for entity {} must be finite",
                        change.entity_id
                    )));
                }
            }
            if let Some(v) = change.risk_adjustment {
                if !v.is_finite() {
                    return Err(EngineError::Validation(format!(
                        "risk_adjustment for entity {} must be finite",
                        change.entity_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A score change for a single entity. An absolute `risk_override` takes
/// precedence over an additive `risk_adjustment` when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityChange {
    /// The entity to change.
    pub entity_id: Uuid,
    /// Absolute replacement score.
    #[serde(default)]
    pub risk_override: Option<f64>,
    /// Additive score adjustment.
    #[serde(default)]
    pub risk_adjustment: Option<f64>,
}

impl EntityChange {
    /// Creates an absolute override.
    pub fn override_score(entity_id: Uuid, score: f64) -> Self {
        Self {
            entity_id,
            risk_override: Some(score),
            risk_adjustment: None,
        }
    }

    /// Creates an additive adjustment.
    pub fn adjust_score(entity_id: Uuid, delta: f64) -> Self {
        Self {
            entity_id,
            risk_override: None,
            risk_adjustment: Some(delta),
        }
    }
}

/// Aggregate portfolio state at one point (current or projected).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Number of entities in scope.
    pub entity_count: u64,
    /// Number of dependencies in scope.
    pub dependency_count: u64,
    /// Mean risk score across entities.
    pub mean_risk_score: f64,
    /// Entities with score >= 75.
    pub high_risk_count: u64,
    /// Entities with score in [50, 75).
    pub medium_risk_count: u64,
    /// Entities with score < 50.
    pub low_risk_count: u64,
}

impl PortfolioState {
    fn from_scores(scores: &[f64], dependency_count: u64) -> Self {
        let mut state = PortfolioState {
            entity_count: scores.len() as u64,
            dependency_count,
            ..Self::default()
        };
        if scores.is_empty() {
            return state;
        }
        state.mean_risk_score = scores.iter().sum::<f64>() / scores.len() as f64;
        for score in scores {
            match RiskBand::from_score(*score) {
                RiskBand::High => state.high_risk_count += 1,
                RiskBand::Medium => state.medium_risk_count += 1,
                RiskBand::Low => state.low_risk_count += 1,
            }
        }
        state
    }
}

/// Numeric differences between projected and current state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDeltas {
    /// Change in mean risk score.
    pub mean_risk_score: f64,
    /// Change in high-band count.
    pub high_risk_count: i64,
    /// Change in medium-band count.
    pub medium_risk_count: i64,
    /// Change in low-band count.
    pub low_risk_count: i64,
}

/// An entity whose projected score moved materially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityImpact {
    /// The impacted entity.
    pub entity_id: Uuid,
    /// Entity name at snapshot time.
    pub name: String,
    /// Score before the scenario.
    pub baseline_score: f64,
    /// Score after the scenario.
    pub projected_score: f64,
    /// Projected minus baseline.
    pub delta: f64,
}

/// Qualitative reading of the portfolio mean delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Mean risk rises by more than 10 points.
    Critical,
    /// Mean risk rises by more than 5 points.
    Warning,
    /// Mean risk falls by more than 5 points.
    Positive,
    /// Everything else.
    #[default]
    Neutral,
}

impl Recommendation {
    fn from_mean_delta(delta: f64) -> Self {
        if delta > 10.0 {
            Recommendation::Critical
        } else if delta > 5.0 {
            Recommendation::Warning
        } else if delta < -5.0 {
            Recommendation::Positive
        } else {
            Recommendation::Neutral
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Critical => write!(f, "critical"),
            Recommendation::Warning => write!(f, "warning"),
            Recommendation::Positive => write!(f, "positive"),
            Recommendation::Neutral => write!(f, "neutral"),
        }
    }
}

/// Results of a what-if evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatIfOutcome {
    /// Name of the evaluated scenario.
    pub scenario_name: String,
    /// Aggregate state before the scenario.
    pub current_state: PortfolioState,
    /// Aggregate state after the scenario.
    pub projected_state: PortfolioState,
    /// Projected minus current, per numeric field.
    pub deltas: StateDeltas,
    /// Entities whose score moved beyond the materiality threshold,
    /// sorted by descending absolute change, truncated to the top N.
    pub material_changes: Vec<EntityImpact>,
    /// Qualitative recommendation derived from the mean delta.
    pub recommendation: Recommendation,
}

/// Tunables for the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfConfig {
    /// Minimum absolute score change for an entity to be reported.
    pub materiality_threshold: f64,
    /// Maximum number of material changes reported.
    pub max_reported_changes: usize,
}

impl Default for WhatIfConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 1.0,
            max_reported_changes: 20,
        }
    }
}

/// Output of the evaluator: the outcome plus any non-fatal errors.
#[derive(Debug)]
pub struct WhatIfRun {
    /// The computed outcome.
    pub outcome: WhatIfOutcome,
    /// Non-fatal problems (e.g. changes referencing unknown entities).
    pub errors: Vec<String>,
}

/// Deterministic what-if evaluator.
pub struct WhatIfEvaluator {
    config: WhatIfConfig,
}

impl WhatIfEvaluator {
    /// Creates an evaluator with the given tunables.
    pub fn new(config: WhatIfConfig) -> Self {
        Self { config }
    }

    /// Evaluates a scenario against a snapshot.
    ///
    /// Changes referencing entities not present in the snapshot are
    /// skipped and reported in `errors`; they never fail the run.
    pub fn evaluate(&self, snapshot: &GraphSnapshot, scenario: &WhatIfScenario) -> WhatIfRun {
        let mut errors = Vec::new();

        // Index changes by entity; later changes for the same entity win.
        let mut changes: HashMap<Uuid, &EntityChange> = HashMap::new();
        for change in &scenario.entity_changes {
            if snapshot.entity(&change.entity_id).is_none() {
                errors.push(format!(
                    "entity change references unknown entity {}",
                    change.entity_id
                ));
                continue;
            }
            changes.insert(change.entity_id, change);
        }

        let multiplier = scenario.risk_multiplier();
        let mut entities: Vec<_> = snapshot.entities().collect();
        entities.sort_by_key(|e| e.id);

        let mut baseline_scores = Vec::with_capacity(entities.len());
        let mut projected_scores = Vec::with_capacity(entities.len());
        let mut impacts: Vec<EntityImpact> = Vec::new();

        for entity in &entities {
            let baseline = entity.baseline_risk_score;
            let mut projected = baseline * multiplier;
            if let Some(change) = changes.get(&entity.id) {
                if let Some(score) = change.risk_override {
                    projected = score;
                } else if let Some(delta) = change.risk_adjustment {
                    projected += delta;
                }
            }
            let projected = projected.clamp(0.0, 100.0);

            baseline_scores.push(baseline);
            projected_scores.push(projected);

            let delta = projected - baseline;
            if delta.abs() > self.config.materiality_threshold {
                impacts.push(EntityImpact {
                    entity_id: entity.id,
                    name: entity.name.clone(),
                    baseline_score: baseline,
                    projected_score: projected,
                    delta,
                });
            }
        }

        impacts.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));
        impacts.truncate(self.config.max_reported_changes);

        let dependency_count = snapshot.edge_count() as u64;
        let current_state = PortfolioState::from_scores(&baseline_scores, dependency_count);
        let projected_state = PortfolioState::from_scores(&projected_scores, dependency_count);

        let deltas = StateDeltas {
            mean_risk_score: projected_state.mean_risk_score - current_state.mean_risk_score,
            high_risk_count: projected_state.high_risk_count as i64
                - current_state.high_risk_count as i64,
            medium_risk_count: projected_state.medium_risk_count as i64
                - current_state.medium_risk_count as i64,
            low_risk_count: projected_state.low_risk_count as i64
                - current_state.low_risk_count as i64,
        };
        let recommendation = Recommendation::from_mean_delta(deltas.mean_risk_score);

        debug!(
            scenario = %scenario.name,
            mean_delta = deltas.mean_risk_score,
            material = impacts.len(),
            "What-if evaluation finished"
        );

        WhatIfRun {
            outcome: WhatIfOutcome {
                scenario_name: scenario.name.clone(),
                current_state,
                projected_state,
                deltas,
                material_changes: impacts,
                recommendation,
            },
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityCategory};

    fn snapshot_with_scores(scores: &[f64]) -> (GraphSnapshot, Vec<Uuid>) {
        let tenant_id = Uuid::new_v4();
        let entities: Vec<Entity> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| Entity::new(tenant_id, format!("E{i}"), EntityCategory::System, *s))
            .collect();
        let ids = entities.iter().map(|e| e.id).collect();
        (GraphSnapshot::build(entities, vec![]), ids)
    }

    fn evaluator() -> WhatIfEvaluator {
        WhatIfEvaluator::new(WhatIfConfig::default())
    }

    #[test]
    fn test_global_multiplier_doubles_score() {
        let (snapshot, _) = snapshot_with_scores(&[40.0]);
        let scenario = WhatIfScenario::new("double").with_risk_multiplier(2.0);

        let run = evaluator().evaluate(&snapshot, &scenario);
        assert!(run.errors.is_empty());

        let outcome = run.outcome;
        assert_eq!(outcome.projected_state.mean_risk_score, 80.0);
        assert_eq!(outcome.deltas.mean_risk_score, 40.0);
        assert_eq!(outcome.material_changes.len(), 1);
        assert_eq!(outcome.material_changes[0].projected_score, 80.0);
        assert_eq!(outcome.material_changes[0].delta, 40.0);
    }

    #[test]
    fn test_override_takes_precedence_over_adjustment() {
        let (snapshot, ids) = snapshot_with_scores(&[30.0]);
        let scenario = WhatIfScenario::new("both").with_entity_change(EntityChange {
            entity_id: ids[0],
            risk_override: Some(90.0),
            risk_adjustment: Some(5.0),
        });

        let run = evaluator().evaluate(&snapshot, &scenario);
        assert_eq!(run.outcome.projected_state.mean_risk_score, 90.0);
    }

    #[test]
    fn test_adjustment_is_additive_after_multiplier() {
        let (snapshot, ids) = snapshot_with_scores(&[40.0]);
        let scenario = WhatIfScenario::new("adjust")
            .with_risk_multiplier(1.5)
            .with_entity_change(EntityChange::adjust_score(ids[0], -10.0));

        let run = evaluator().evaluate(&snapshot, &scenario);
        // 40 * 1.5 - 10 = 50.
        assert_eq!(run.outcome.projected_state.mean_risk_score, 50.0);
    }

    #[test]
    fn test_projected_scores_clamped() {
        let (snapshot, ids) = snapshot_with_scores(&[90.0, 10.0]);
        let scenario = WhatIfScenario::new("clamp")
            .with_entity_change(EntityChange::adjust_score(ids[0], 50.0))
            .with_entity_change(EntityChange::adjust_score(ids[1], -50.0));

        let run = evaluator().evaluate(&snapshot, &scenario);
        let scores: Vec<f64> = run
            .outcome
            .material_changes
            .iter()
            .map(|i| i.projected_score)
            .collect();
        assert!(scores.contains(&100.0));
        assert!(scores.contains(&0.0));
    }

    #[test]
    fn test_bands_disjoint_and_exhaustive() {
        let (snapshot, _) = snapshot_with_scores(&[10.0, 49.9, 50.0, 74.9, 75.0, 99.0]);
        let scenario = WhatIfScenario::new("bands").with_risk_multiplier(1.2);

        let run = evaluator().evaluate(&snapshot, &scenario);
        for state in [&run.outcome.current_state, &run.outcome.projected_state] {
            assert_eq!(
                state.high_risk_count + state.medium_risk_count + state.low_risk_count,
                state.entity_count
            );
        }
        assert_eq!(run.outcome.current_state.high_risk_count, 2);
        assert_eq!(run.outcome.current_state.medium_risk_count, 2);
        assert_eq!(run.outcome.current_state.low_risk_count, 2);
    }

    #[test]
    fn test_unknown_entity_is_skipped_not_fatal() {
        let (snapshot, _) = snapshot_with_scores(&[40.0]);
        let scenario = WhatIfScenario::new("ghost")
            .with_entity_change(EntityChange::override_score(Uuid::new_v4(), 99.0));

        let run = evaluator().evaluate(&snapshot, &scenario);
        assert_eq!(run.errors.len(), 1);
        // The unknown change had no effect.
        assert_eq!(run.outcome.deltas.mean_risk_score, 0.0);
    }

    #[test]
    fn test_material_changes_sorted_and_truncated() {
        let scores: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let (snapshot, _) = snapshot_with_scores(&scores);
        let scenario = WhatIfScenario::new("big").with_risk_multiplier(2.0);

        let run = evaluator().evaluate(&snapshot, &scenario);
        let changes = &run.outcome.material_changes;
        assert_eq!(changes.len(), 20);
        for pair in changes.windows(2) {
            assert!(pair[0].delta.abs() >= pair[1].delta.abs());
        }
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(Recommendation::from_mean_delta(10.1), Recommendation::Critical);
        assert_eq!(Recommendation::from_mean_delta(10.0), Recommendation::Warning);
        assert_eq!(Recommendation::from_mean_delta(5.1), Recommendation::Warning);
        assert_eq!(Recommendation::from_mean_delta(0.0), Recommendation::Neutral);
        assert_eq!(Recommendation::from_mean_delta(-5.0), Recommendation::Neutral);
        assert_eq!(Recommendation::from_mean_delta(-5.1), Recommendation::Positive);
    }

    #[test]
    fn test_scenario_validation() {
        assert!(WhatIfScenario::new("ok").validate().is_ok());
        assert!(WhatIfScenario::new("  ").validate().is_err());

        let bad = WhatIfScenario::new("neg").with_risk_multiplier(-1.0);
        assert!(bad.validate().is_err());

        let bad = WhatIfScenario::new("nan")
            .with_entity_change(EntityChange::adjust_score(Uuid::new_v4(), f64::NAN));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_determinism() {
        let (snapshot, ids) = snapshot_with_scores(&[25.0, 50.0, 75.0]);
        let scenario = WhatIfScenario::new("repeat")
            .with_risk_multiplier(1.3)
            .with_entity_change(EntityChange::adjust_score(ids[1], 7.0));

        let a = evaluator().evaluate(&snapshot, &scenario);
        let b = evaluator().evaluate(&snapshot, &scenario);
        assert_eq!(
            serde_json::to_string(&a.outcome).unwrap(),
            serde_json::to_string(&b.outcome).unwrap()
        );
    }
}
