//! Stress testing: named shock profiles applied across the portfolio.
//!
//! Each stress scenario is a fixed multiplier table keyed by entity
//! category with a default fallback. Purely deterministic.

use crate::models::EntityCategory;
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Entities kept in each scenario's most-impacted list.
pub const TOP_IMPACTED_LIMIT: usize = 10;

/// Stressed score at or above which an entity is in the critical zone.
pub const CRITICAL_ZONE_THRESHOLD: f64 = 90.0;

/// Stressed score at or above which an entity is in the high-risk zone.
pub const HIGH_RISK_ZONE_THRESHOLD: f64 = 75.0;

/// A named shock profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    /// Identifier callers use to select this scenario.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Score multipliers per entity category.
    pub multipliers: HashMap<EntityCategory, f64>,
    /// Multiplier for categories absent from the table.
    pub default_multiplier: f64,
}

impl StressScenario {
    /// Returns the multiplier for an entity category.
    pub fn multiplier_for(&self, category: EntityCategory) -> f64 {
        self.multipliers
            .get(&category)
            .copied()
            .unwrap_or(self.default_multiplier)
    }
}

/// The built-in shock profiles. Deployments may replace or extend these
/// through [`crate::engine::EngineConfig`].
pub fn builtin_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "sanctions_shock".into(),
            description: "Broad sanctions designation hitting organizations and vessels".into(),
            multipliers: HashMap::from([
                (EntityCategory::Organization, 1.8),
                (EntityCategory::Vessel, 2.0),
                (EntityCategory::Individual, 1.5),
                (EntityCategory::Financial, 1.6),
            ]),
            default_multiplier: 1.2,
        },
        StressScenario {
            name: "financial_crisis".into(),
            description: "Systemic credit crunch across financial instruments".into(),
            multipliers: HashMap::from([
                (EntityCategory::Financial, 2.2),
                (EntityCategory::Organization, 1.5),
            ]),
            default_multiplier: 1.3,
        },
        StressScenario {
            name: "supply_chain_disruption".into(),
            description: "Logistics breakdown stressing operational dependencies".into(),
            multipliers: HashMap::from([
                (EntityCategory::Vessel, 1.9),
                (EntityCategory::Organization, 1.6),
                (EntityCategory::System, 1.4),
            ]),
            default_multiplier: 1.25,
        },
        StressScenario {
            name: "cyber_incident".into(),
            description: "Large-scale intrusion degrading IT systems".into(),
            multipliers: HashMap::from([
                (EntityCategory::System, 2.5),
                (EntityCategory::Organization, 1.4),
            ]),
            default_multiplier: 1.1,
        },
    ]
}

/// An entity strongly impacted by a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressedEntity {
    /// The impacted entity.
    pub entity_id: Uuid,
    /// Entity name at snapshot time.
    pub name: String,
    /// Score before the shock.
    pub baseline_score: f64,
    /// Score under the shock.
    pub stressed_score: f64,
    /// Absolute increase.
    pub increase: f64,
}

/// Aggregate results for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioImpact {
    /// Scenario name.
    pub scenario_name: String,
    /// Mean stressed score across entities.
    pub mean_stressed_score: f64,
    /// Highest stressed score.
    pub max_stressed_score: f64,
    /// Entities at or above [`CRITICAL_ZONE_THRESHOLD`].
    pub critical_zone_count: u64,
    /// Entities at or above [`HIGH_RISK_ZONE_THRESHOLD`].
    pub high_risk_zone_count: u64,
    /// Most impacted entities by absolute increase.
    pub top_impacted: Vec<StressedEntity>,
}

/// Qualitative portfolio resilience rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResilienceRating {
    /// Mean critical-zone count below 1.
    Strong,
    /// Mean critical-zone count below 5.
    Moderate,
    /// Everything above that.
    Weak,
}

impl std::fmt::Display for ResilienceRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResilienceRating::Strong => write!(f, "Strong"),
            ResilienceRating::Moderate => write!(f, "Moderate"),
            ResilienceRating::Weak => write!(f, "Weak"),
        }
    }
}

/// Results of a stress test over one or more scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressOutcome {
    /// Per-scenario results, in execution order.
    pub scenarios: Vec<ScenarioImpact>,
    /// Portfolio robustness score (0 - 100, higher is better).
    pub resilience_score: f64,
    /// Qualitative rating derived from mean critical-zone counts.
    pub resilience_rating: ResilienceRating,
    /// Scenario with the highest average stressed score, if any ran.
    pub worst_scenario: Option<String>,
}

/// Output of the runner: the outcome plus any non-fatal errors.
#[derive(Debug)]
pub struct StressRun {
    /// The computed outcome.
    pub outcome: StressOutcome,
    /// Non-fatal problems (e.g. unknown scenario names).
    pub errors: Vec<String>,
}

/// Deterministic stress test runner.
pub struct StressTestRunner {
    scenarios: Vec<StressScenario>,
}

impl StressTestRunner {
    /// Creates a runner over the given scenario catalog.
    pub fn new(scenarios: Vec<StressScenario>) -> Self {
        Self { scenarios }
    }

    /// Runs the named scenarios against a snapshot. With `names` absent,
    /// every catalog scenario runs. Unknown names are recorded as errors
    /// and skipped; the run continues for the rest.
    pub fn run(&self, snapshot: &GraphSnapshot, names: Option<&[String]>) -> StressRun {
        let mut errors = Vec::new();
        let selected: Vec<&StressScenario> = match names {
            None => self.scenarios.iter().collect(),
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let found = self.scenarios.iter().find(|s| &s.name == name);
                    if found.is_none() {
                        errors.push(format!("unknown stress scenario: {name}"));
                    }
                    found
                })
                .collect(),
        };

        let mut entities: Vec<_> = snapshot.entities().collect();
        entities.sort_by_key(|e| e.id);

        let mut impacts = Vec::with_capacity(selected.len());
        for scenario in selected {
            impacts.push(self.apply(scenario, &entities));
        }

        let outcome = summarize(impacts);
        debug!(
            scenarios = outcome.scenarios.len(),
            resilience = outcome.resilience_score,
            "Stress test finished"
        );
        StressRun { outcome, errors }
    }

    fn apply(
        &self,
        scenario: &StressScenario,
        entities: &[&crate::models::Entity],
    ) -> ScenarioImpact {
        let mut sum = 0.0;
        let mut max = 0.0_f64;
        let mut critical = 0;
        let mut high = 0;
        let mut stressed: Vec<StressedEntity> = Vec::with_capacity(entities.len());

        for entity in entities {
            let multiplier = scenario.multiplier_for(entity.category);
            let score = (entity.baseline_risk_score * multiplier).clamp(0.0, 100.0);
            sum += score;
            max = max.max(score);
            if score >= CRITICAL_ZONE_THRESHOLD {
                critical += 1;
            }
            if score >= HIGH_RISK_ZONE_THRESHOLD {
                high += 1;
            }
            stressed.push(StressedEntity {
                entity_id: entity.id,
                name: entity.name.clone(),
                baseline_score: entity.baseline_risk_score,
                stressed_score: score,
                increase: score - entity.baseline_risk_score,
            });
        }

        stressed.sort_by(|a, b| b.increase.total_cmp(&a.increase));
        stressed.truncate(TOP_IMPACTED_LIMIT);

        ScenarioImpact {
            scenario_name: scenario.name.clone(),
            mean_stressed_score: if entities.is_empty() {
                0.0
            } else {
                sum / entities.len() as f64
            },
            max_stressed_score: max,
            critical_zone_count: critical,
            high_risk_zone_count: high,
            top_impacted: stressed,
        }
    }
}

fn summarize(impacts: Vec<ScenarioImpact>) -> StressOutcome {
    if impacts.is_empty() {
        return StressOutcome {
            scenarios: impacts,
            resilience_score: 100.0,
            resilience_rating: ResilienceRating::Strong,
            worst_scenario: None,
        };
    }

    let n = impacts.len() as f64;
    let mean_critical = impacts.iter().map(|i| i.critical_zone_count as f64).sum::<f64>() / n;
    let mean_high = impacts
        .iter()
        .map(|i| i.high_risk_zone_count as f64)
        .sum::<f64>()
        / n;

    let resilience_score = (100.0 - (mean_critical * 10.0 + mean_high * 2.0)).clamp(0.0, 100.0);
    let resilience_rating = if mean_critical < 1.0 {
        ResilienceRating::Strong
    } else if mean_critical < 5.0 {
        ResilienceRating::Moderate
    } else {
        ResilienceRating::Weak
    };

    let worst_scenario = impacts
        .iter()
        .max_by(|a, b| a.mean_stressed_score.total_cmp(&b.mean_stressed_score))
        .map(|i| i.scenario_name.clone());

    StressOutcome {
        scenarios: impacts,
        resilience_score,
        resilience_rating,
        worst_scenario,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;

    fn snapshot(entries: &[(EntityCategory, f64)]) -> GraphSnapshot {
        let tenant_id = Uuid::new_v4();
        let entities = entries
            .iter()
            .enumerate()
            .map(|(i, (cat, score))| Entity::new(tenant_id, format!("E{i}"), *cat, *score))
            .collect();
        GraphSnapshot::build(entities, vec![])
    }

    fn runner() -> StressTestRunner {
        StressTestRunner::new(builtin_scenarios())
    }

    #[test]
    fn test_multiplier_lookup_with_default() {
        let scenario = &builtin_scenarios()[0];
        assert_eq!(scenario.multiplier_for(EntityCategory::Vessel), 2.0);
        // "other" is not in the table, falls back to the default.
        assert_eq!(
            scenario.multiplier_for(EntityCategory::Other),
            scenario.default_multiplier
        );
    }

    #[test]
    fn test_stressed_scores_clamped() {
        let snapshot = snapshot(&[(EntityCategory::Vessel, 80.0)]);
        let run = runner().run(&snapshot, Some(&["sanctions_shock".to_string()]));

        let impact = &run.outcome.scenarios[0];
        // 80 * 2.0 clamps to 100.
        assert_eq!(impact.max_stressed_score, 100.0);
        assert_eq!(impact.critical_zone_count, 1);
        assert_eq!(impact.high_risk_zone_count, 1);
    }

    #[test]
    fn test_unknown_scenario_recorded_not_fatal() {
        let snapshot = snapshot(&[(EntityCategory::Organization, 50.0)]);
        let names = vec!["no_such_scenario".to_string(), "cyber_incident".to_string()];
        let run = runner().run(&snapshot, Some(&names));

        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].contains("no_such_scenario"));
        assert_eq!(run.outcome.scenarios.len(), 1);
        assert_eq!(run.outcome.scenarios[0].scenario_name, "cyber_incident");
    }

    #[test]
    fn test_all_scenarios_run_by_default() {
        let snapshot = snapshot(&[(EntityCategory::Financial, 40.0)]);
        let run = runner().run(&snapshot, None);
        assert_eq!(run.outcome.scenarios.len(), builtin_scenarios().len());
        assert!(run.outcome.worst_scenario.is_some());
    }

    #[test]
    fn test_resilience_monotone_in_critical_count() {
        // Calm portfolio: nothing near the critical zone.
        let calm = snapshot(&[(EntityCategory::Other, 20.0), (EntityCategory::Other, 30.0)]);
        // Hot portfolio: everything blows through 90 under any shock.
        let hot = snapshot(&[
            (EntityCategory::Organization, 85.0),
            (EntityCategory::Financial, 88.0),
        ]);

        let calm_run = runner().run(&calm, None);
        let hot_run = runner().run(&hot, None);
        assert!(calm_run.outcome.resilience_score > hot_run.outcome.resilience_score);
        assert_eq!(calm_run.outcome.resilience_rating, ResilienceRating::Strong);
    }

    #[test]
    fn test_resilience_formula() {
        // One scenario, known counts: critical=1, high=2 (includes the
        // critical entity) -> 100 - (1*10 + 2*2) = 86.
        let scenario = StressScenario {
            name: "flat".into(),
            description: "uniform".into(),
            multipliers: HashMap::new(),
            default_multiplier: 1.0,
        };
        let runner = StressTestRunner::new(vec![scenario]);
        let snapshot = snapshot(&[
            (EntityCategory::Other, 95.0),
            (EntityCategory::Other, 80.0),
            (EntityCategory::Other, 10.0),
        ]);

        let run = runner.run(&snapshot, None);
        assert!((run.outcome.resilience_score - 86.0).abs() < 1e-9);
        assert_eq!(run.outcome.resilience_rating, ResilienceRating::Moderate);
    }

    #[test]
    fn test_top_impacted_sorted_by_increase() {
        let snapshot = snapshot(&[
            (EntityCategory::System, 30.0),
            (EntityCategory::Organization, 30.0),
            (EntityCategory::Other, 30.0),
        ]);
        let run = runner().run(&snapshot, Some(&["cyber_incident".to_string()]));

        let top = &run.outcome.scenarios[0].top_impacted;
        // System entity (x2.5) must lead.
        assert!(top[0].increase >= top[1].increase);
        assert!(top[1].increase >= top[2].increase);
        assert_eq!(top[0].stressed_score, 75.0);
    }

    #[test]
    fn test_empty_selection_yields_full_resilience() {
        let snapshot = snapshot(&[(EntityCategory::Other, 50.0)]);
        let run = runner().run(&snapshot, Some(&["bogus".to_string()]));
        assert!(run.outcome.scenarios.is_empty());
        assert_eq!(run.outcome.resilience_score, 100.0);
        assert_eq!(run.outcome.worst_scenario, None);
    }
}
