//! Cascade propagation: bounded-depth spread of a shock through the
//! dependency graph.
//!
//! The propagator is a breadth-first traversal over an explicit worklist.
//! Termination is guaranteed by visited-set membership, not by the depth
//! bound: every entity is processed at most once per run, so cyclic graphs
//! cannot loop.

use crate::models::DependencyLayer;
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Hard ceiling on traversal depth.
pub const MAX_CASCADE_DEPTH: u32 = 5;

/// Severity of a cascade effect, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Marginal impact.
    Minor,
    /// Noticeable impact.
    Moderate,
    /// Substantial impact.
    Significant,
    /// Major impact.
    Severe,
    /// Existential impact. Reserved for first-order effects supplied by
    /// the caller; edge-derived effects top out at severe.
    Catastrophic,
}

impl Severity {
    /// Buckets an edge criticality (1.0 - 5.0 scale) into a severity,
    /// checking thresholds from highest to lowest.
    pub fn from_criticality(criticality: f64) -> Self {
        if criticality >= 5.0 {
            Severity::Severe
        } else if criticality >= 4.0 {
            Severity::Significant
        } else if criticality >= 3.0 {
            Severity::Moderate
        } else {
            Severity::Minor
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Significant => "significant",
            Severity::Severe => "severe",
            Severity::Catastrophic => "catastrophic",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tunable parameters for cascade propagation.
///
/// The defaults are heuristics, not physical constants; deployments are
/// expected to tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Top of the edge criticality scale, used for normalization.
    pub max_criticality: f64,
    /// Geometric decay applied to risk score deltas per hop.
    pub score_decay_rate: f64,
    /// Geometric decay applied to propagation probability per hop.
    pub probability_decay_rate: f64,
    /// Effects whose propagation probability falls below this are dropped
    /// and their branch is pruned.
    pub materiality_threshold: f64,
    /// Score delta of a maximal-criticality effect before decay.
    pub base_magnitude: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_criticality: 5.0,
            score_decay_rate: 0.7,
            probability_decay_rate: 0.9,
            materiality_threshold: 0.1,
            base_magnitude: 25.0,
        }
    }
}

impl CascadeConfig {
    /// Base propagation delay in days for a dependency layer.
    pub fn layer_base_delay_days(&self, layer: DependencyLayer) -> u32 {
        match layer {
            DependencyLayer::Operational => 7,
            DependencyLayer::Financial => 14,
            DependencyLayer::Legal => 30,
            DependencyLayer::Human => 7,
            DependencyLayer::Academic => 60,
            DependencyLayer::Technical => 14,
        }
    }
}

/// One effect of a cascade on a single entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEffect {
    /// The affected entity.
    pub entity_id: Uuid,
    /// Entity name at snapshot time.
    pub entity_name: String,
    /// Severity bucket derived from the carrying edge.
    pub severity: Severity,
    /// Days until the effect is expected to materialize. Zero for
    /// first-order (immediate) effects.
    pub time_delay_days: u32,
    /// Projected change to the entity's risk score.
    pub risk_score_delta: f64,
    /// Probability that the effect materializes, decayed per hop.
    pub probability: f64,
    /// Traversal depth at which the entity was reached (1 = first order).
    pub depth: u32,
}

/// Results of one cascade run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CascadeOutcome {
    /// The entity the cascade started from.
    pub trigger_entity_id: Option<Uuid>,
    /// All effects, immediate and delayed.
    pub effects: Vec<CascadeEffect>,
    /// Full id sequences from the trigger to each affected entity.
    pub paths: Vec<Vec<Uuid>>,
    /// Number of distinct entities affected (trigger excluded).
    pub total_entities_affected: u64,
    /// Deepest traversal level actually reached.
    pub max_cascade_depth: u32,
    /// Count of effects per severity bucket.
    pub severity_distribution: BTreeMap<Severity, u64>,
    /// Highest severity bucket with a non-zero count.
    pub overall_severity: Option<Severity>,
}

/// Output of the propagator: the outcome plus any non-fatal errors.
#[derive(Debug)]
pub struct CascadeRun {
    /// The computed outcome.
    pub outcome: CascadeOutcome,
    /// Non-fatal problems (malformed edges) hit during traversal.
    pub errors: Vec<String>,
    /// True if the run stopped at a cancellation checkpoint.
    pub cancelled: bool,
}

/// Worklist entry: an affected entity awaiting expansion.
struct WorkItem {
    entity_id: Uuid,
    depth: u32,
    probability: f64,
    path: Vec<Uuid>,
}

/// Breadth-first cascade propagator.
pub struct CascadePropagator {
    config: CascadeConfig,
}

impl CascadePropagator {
    /// Creates a propagator with the given configuration.
    pub fn new(config: CascadeConfig) -> Self {
        Self { config }
    }

    /// Propagates a shock from `trigger_entity_id` through the snapshot.
    ///
    /// First-order effects are derived from the trigger's outgoing edges
    /// with zero time delay. `max_depth` is clamped to
    /// [`MAX_CASCADE_DEPTH`]. The `checkpoint` callback is polled at each
    /// depth boundary; returning `false` stops the traversal.
    pub fn propagate<F>(
        &self,
        snapshot: &GraphSnapshot,
        trigger_entity_id: Uuid,
        max_depth: u32,
        checkpoint: F,
    ) -> CascadeRun
    where
        F: FnMut() -> bool,
    {
        let seed = WorkItem {
            entity_id: trigger_entity_id,
            depth: 0,
            probability: 1.0,
            path: vec![trigger_entity_id],
        };
        self.run(snapshot, Some(trigger_entity_id), vec![seed], Vec::new(), max_depth, checkpoint)
    }

    /// Propagates from caller-supplied first-order effects instead of a
    /// trigger's edges. Each supplied effect is taken as depth 1; the
    /// traversal continues outward from there.
    pub fn propagate_from_effects<F>(
        &self,
        snapshot: &GraphSnapshot,
        initial_effects: Vec<CascadeEffect>,
        max_depth: u32,
        checkpoint: F,
    ) -> CascadeRun
    where
        F: FnMut() -> bool,
    {
        let mut seeds = Vec::with_capacity(initial_effects.len());
        let mut effects = Vec::with_capacity(initial_effects.len());
        for mut effect in initial_effects {
            effect.depth = 1;
            seeds.push(WorkItem {
                entity_id: effect.entity_id,
                depth: 1,
                probability: effect.probability,
                path: vec![effect.entity_id],
            });
            effects.push(effect);
        }
        self.run(snapshot, None, seeds, effects, max_depth, checkpoint)
    }

    fn run<F>(
        &self,
        snapshot: &GraphSnapshot,
        trigger_entity_id: Option<Uuid>,
        seeds: Vec<WorkItem>,
        mut effects: Vec<CascadeEffect>,
        max_depth: u32,
        mut checkpoint: F,
    ) -> CascadeRun
    where
        F: FnMut() -> bool,
    {
        let max_depth = max_depth.clamp(1, MAX_CASCADE_DEPTH);
        let mut errors = Vec::new();
        let mut cancelled = false;

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        let mut paths: Vec<Vec<Uuid>> = Vec::new();
        let mut max_depth_reached = 0;

        for seed in seeds {
            visited.insert(seed.entity_id);
            max_depth_reached = max_depth_reached.max(seed.depth);
            queue.push_back(seed);
        }

        let mut current_depth = 0;
        while let Some(item) = queue.pop_front() {
            // Depth boundary: poll cancellation once per BFS level.
            if item.depth > current_depth {
                current_depth = item.depth;
                if !checkpoint() {
                    cancelled = true;
                    break;
                }
            }
            if item.depth >= max_depth {
                continue;
            }

            let child_depth = item.depth + 1;
            for edge in snapshot.outgoing(&item.entity_id) {
                if visited.contains(&edge.target_entity_id) {
                    continue;
                }
                if !edge.criticality.is_finite() || edge.criticality <= 0.0 {
                    warn!(dependency_id = %edge.id, "Skipping edge with malformed criticality");
                    errors.push(format!(
                        "dependency {}: malformed criticality {}",
                        edge.id, edge.criticality
                    ));
                    continue;
                }

                // One decay factor per hop beyond the first, so a branch
                // seeded at probability 1.0 sits at decay^(depth - 1).
                let probability = if child_depth == 1 {
                    item.probability
                } else {
                    item.probability * self.config.probability_decay_rate
                };
                if probability < self.config.materiality_threshold {
                    // Immaterial: not recorded, branch pruned.
                    continue;
                }

                let target = match snapshot.entity(&edge.target_entity_id) {
                    Some(e) => e,
                    // Snapshot construction drops dangling edges, so this
                    // only fires on a malformed snapshot.
                    None => {
                        errors.push(format!(
                            "dependency {}: target {} missing from snapshot",
                            edge.id, edge.target_entity_id
                        ));
                        continue;
                    }
                };

                let decay = self
                    .config
                    .score_decay_rate
                    .powi(child_depth.saturating_sub(1) as i32);
                let risk_score_delta = self.config.base_magnitude
                    * (edge.criticality / self.config.max_criticality)
                    * decay;
                let time_delay_days = self.config.layer_base_delay_days(edge.layer)
                    * child_depth.saturating_sub(1);

                let mut path = item.path.clone();
                path.push(target.id);

                effects.push(CascadeEffect {
                    entity_id: target.id,
                    entity_name: target.name.clone(),
                    severity: Severity::from_criticality(edge.criticality),
                    time_delay_days,
                    risk_score_delta,
                    probability,
                    depth: child_depth,
                });
                paths.push(path.clone());
                visited.insert(target.id);
                max_depth_reached = max_depth_reached.max(child_depth);

                queue.push_back(WorkItem {
                    entity_id: target.id,
                    depth: child_depth,
                    probability,
                    path,
                });
            }
        }

        let mut severity_distribution: BTreeMap<Severity, u64> = BTreeMap::new();
        for effect in &effects {
            *severity_distribution.entry(effect.severity).or_insert(0) += 1;
        }
        let overall_severity = severity_distribution.keys().next_back().copied();

        debug!(
            affected = effects.len(),
            max_depth_reached,
            cancelled,
            "Cascade traversal finished"
        );

        CascadeRun {
            outcome: CascadeOutcome {
                trigger_entity_id,
                total_entities_affected: effects.len() as u64,
                max_cascade_depth: max_depth_reached,
                severity_distribution,
                overall_severity,
                effects,
                paths,
            },
            errors,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, DependencyLayer, Entity, EntityCategory};

    fn entity(tenant_id: Uuid, name: &str) -> Entity {
        Entity::new(tenant_id, name, EntityCategory::Organization, 50.0)
    }

    fn edge(
        tenant_id: Uuid,
        source: Uuid,
        target: Uuid,
        layer: DependencyLayer,
        criticality: f64,
    ) -> Dependency {
        Dependency::new(tenant_id, source, target, layer, "supplier")
            .with_criticality(criticality)
    }

    fn propagator() -> CascadePropagator {
        CascadePropagator::new(CascadeConfig::default())
    }

    #[test]
    fn test_single_edge_first_order_effect() {
        let tenant_id = Uuid::new_v4();
        let a = entity(tenant_id, "A");
        let b = entity(tenant_id, "B");
        let (a_id, b_id) = (a.id, b.id);

        let snapshot = GraphSnapshot::build(
            vec![a, b],
            vec![edge(tenant_id, a_id, b_id, DependencyLayer::Operational, 5.0)],
        );

        let run = propagator().propagate(&snapshot, a_id, 2, || true);
        assert!(run.errors.is_empty());
        assert!(!run.cancelled);

        let outcome = run.outcome;
        assert_eq!(outcome.effects.len(), 1);
        let effect = &outcome.effects[0];
        assert_eq!(effect.entity_id, b_id);
        assert_eq!(effect.severity, Severity::Severe);
        assert_eq!(effect.time_delay_days, 0);
        assert_eq!(effect.depth, 1);
        // B has no outgoing edges, so nothing at depth 2.
        assert_eq!(outcome.max_cascade_depth, 1);
        assert_eq!(outcome.total_entities_affected, 1);
        assert_eq!(outcome.overall_severity, Some(Severity::Severe));
        assert_eq!(outcome.paths, vec![vec![a_id, b_id]]);
    }

    #[test]
    fn test_severity_buckets_highest_first() {
        assert_eq!(Severity::from_criticality(5.0), Severity::Severe);
        assert_eq!(Severity::from_criticality(4.5), Severity::Significant);
        assert_eq!(Severity::from_criticality(4.0), Severity::Significant);
        assert_eq!(Severity::from_criticality(3.0), Severity::Moderate);
        assert_eq!(Severity::from_criticality(2.9), Severity::Minor);
        assert_eq!(Severity::from_criticality(1.0), Severity::Minor);
    }

    #[test]
    fn test_cycle_terminates_and_visits_once() {
        let tenant_id = Uuid::new_v4();
        let a = entity(tenant_id, "A");
        let b = entity(tenant_id, "B");
        let c = entity(tenant_id, "C");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        // A -> B -> C -> A, a full cycle.
        let snapshot = GraphSnapshot::build(
            vec![a, b, c],
            vec![
                edge(tenant_id, a_id, b_id, DependencyLayer::Operational, 5.0),
                edge(tenant_id, b_id, c_id, DependencyLayer::Operational, 5.0),
                edge(tenant_id, c_id, a_id, DependencyLayer::Operational, 5.0),
            ],
        );

        let run = propagator().propagate(&snapshot, a_id, 5, || true);
        let outcome = run.outcome;

        // A is the trigger, so only B and C are affected, each once.
        assert_eq!(outcome.total_entities_affected, 2);
        let affected: Vec<Uuid> = outcome.effects.iter().map(|e| e.entity_id).collect();
        assert_eq!(affected.len(), 2);
        assert!(affected.contains(&b_id));
        assert!(affected.contains(&c_id));
        assert!(outcome.max_cascade_depth <= 5);
    }

    #[test]
    fn test_depth_bound_respected() {
        let tenant_id = Uuid::new_v4();
        // Chain A -> B -> C -> D.
        let chain: Vec<Entity> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| entity(tenant_id, n))
            .collect();
        let ids: Vec<Uuid> = chain.iter().map(|e| e.id).collect();
        let edges: Vec<Dependency> = ids
            .windows(2)
            .map(|w| edge(tenant_id, w[0], w[1], DependencyLayer::Financial, 5.0))
            .collect();
        let snapshot = GraphSnapshot::build(chain, edges);

        let run = propagator().propagate(&snapshot, ids[0], 2, || true);
        let outcome = run.outcome;
        assert_eq!(outcome.max_cascade_depth, 2);
        // Only B and C are reachable within depth 2.
        assert_eq!(outcome.total_entities_affected, 2);
    }

    #[test]
    fn test_time_delay_accumulates_per_layer() {
        let tenant_id = Uuid::new_v4();
        let chain: Vec<Entity> = ["A", "B", "C"].iter().map(|n| entity(tenant_id, n)).collect();
        let ids: Vec<Uuid> = chain.iter().map(|e| e.id).collect();
        let snapshot = GraphSnapshot::build(
            chain,
            vec![
                edge(tenant_id, ids[0], ids[1], DependencyLayer::Legal, 5.0),
                edge(tenant_id, ids[1], ids[2], DependencyLayer::Legal, 5.0),
            ],
        );

        let run = propagator().propagate(&snapshot, ids[0], 3, || true);
        let by_depth: BTreeMap<u32, u32> = run
            .outcome
            .effects
            .iter()
            .map(|e| (e.depth, e.time_delay_days))
            .collect();

        // depth 1: 30 * 0 = 0; depth 2: 30 * 1 = 30.
        assert_eq!(by_depth[&1], 0);
        assert_eq!(by_depth[&2], 30);
    }

    #[test]
    fn test_score_delta_decays_geometrically() {
        let tenant_id = Uuid::new_v4();
        let chain: Vec<Entity> = ["A", "B", "C"].iter().map(|n| entity(tenant_id, n)).collect();
        let ids: Vec<Uuid> = chain.iter().map(|e| e.id).collect();
        let snapshot = GraphSnapshot::build(
            chain,
            vec![
                edge(tenant_id, ids[0], ids[1], DependencyLayer::Operational, 5.0),
                edge(tenant_id, ids[1], ids[2], DependencyLayer::Operational, 5.0),
            ],
        );

        let config = CascadeConfig::default();
        let run = CascadePropagator::new(config.clone()).propagate(&snapshot, ids[0], 3, || true);
        let deltas: BTreeMap<u32, f64> = run
            .outcome
            .effects
            .iter()
            .map(|e| (e.depth, e.risk_score_delta))
            .collect();

        assert!((deltas[&1] - config.base_magnitude).abs() < 1e-9);
        assert!((deltas[&2] - config.base_magnitude * config.score_decay_rate).abs() < 1e-9);
    }

    #[test]
    fn test_immaterial_branches_pruned() {
        let tenant_id = Uuid::new_v4();
        // Long chain; with probability decay 0.9 per hop and threshold
        // 0.85 the traversal dies after two hops despite depth headroom.
        let chain: Vec<Entity> = (0..5)
            .map(|i| entity(tenant_id, &format!("E{i}")))
            .collect();
        let ids: Vec<Uuid> = chain.iter().map(|e| e.id).collect();
        let edges: Vec<Dependency> = ids
            .windows(2)
            .map(|w| edge(tenant_id, w[0], w[1], DependencyLayer::Operational, 5.0))
            .collect();
        let snapshot = GraphSnapshot::build(chain, edges);

        let config = CascadeConfig {
            materiality_threshold: 0.85,
            ..CascadeConfig::default()
        };
        let run = CascadePropagator::new(config).propagate(&snapshot, ids[0], 5, || true);

        // depth 1: p = 1.0; depth 2: p = 0.9; depth 3: p = 0.81 falls
        // below 0.85 and is dropped.
        for effect in &run.outcome.effects {
            assert!(effect.probability >= 0.85);
        }
        assert_eq!(run.outcome.max_cascade_depth, 2);
    }

    #[test]
    fn test_propagate_from_initial_effects() {
        let tenant_id = Uuid::new_v4();
        let a = entity(tenant_id, "A");
        let b = entity(tenant_id, "B");
        let (a_id, b_id) = (a.id, b.id);
        let snapshot = GraphSnapshot::build(
            vec![a, b],
            vec![edge(tenant_id, a_id, b_id, DependencyLayer::Human, 4.0)],
        );

        let initial = vec![CascadeEffect {
            entity_id: a_id,
            entity_name: "A".into(),
            severity: Severity::Catastrophic,
            time_delay_days: 0,
            risk_score_delta: 50.0,
            probability: 1.0,
            depth: 1,
        }];

        let run = propagator().propagate_from_effects(&snapshot, initial, 3, || true);
        let outcome = run.outcome;

        // The supplied effect plus the second-order effect on B.
        assert_eq!(outcome.effects.len(), 2);
        assert_eq!(outcome.overall_severity, Some(Severity::Catastrophic));
        let second = outcome.effects.iter().find(|e| e.entity_id == b_id).unwrap();
        assert_eq!(second.depth, 2);
        assert_eq!(second.severity, Severity::Significant);
        // Human layer: 7 days * (2 - 1).
        assert_eq!(second.time_delay_days, 7);
    }

    #[test]
    fn test_cancellation_at_depth_boundary() {
        let tenant_id = Uuid::new_v4();
        let chain: Vec<Entity> = (0..4)
            .map(|i| entity(tenant_id, &format!("E{i}")))
            .collect();
        let ids: Vec<Uuid> = chain.iter().map(|e| e.id).collect();
        let edges: Vec<Dependency> = ids
            .windows(2)
            .map(|w| edge(tenant_id, w[0], w[1], DependencyLayer::Operational, 5.0))
            .collect();
        let snapshot = GraphSnapshot::build(chain, edges);

        // Allow the first boundary, cancel at the second.
        let mut polls = 0;
        let run = propagator().propagate(&snapshot, ids[0], 4, || {
            polls += 1;
            polls < 2
        });

        assert!(run.cancelled);
        assert!(run.outcome.total_entities_affected < 3);
    }

    #[test]
    fn test_trigger_with_no_edges_yields_empty_outcome() {
        let tenant_id = Uuid::new_v4();
        let a = entity(tenant_id, "A");
        let a_id = a.id;
        let snapshot = GraphSnapshot::build(vec![a], vec![]);

        let run = propagator().propagate(&snapshot, a_id, 3, || true);
        let outcome = run.outcome;
        assert!(outcome.effects.is_empty());
        assert_eq!(outcome.total_entities_affected, 0);
        assert_eq!(outcome.max_cascade_depth, 0);
        assert_eq!(outcome.overall_severity, None);
    }

    #[test]
    fn test_severity_distribution_counts() {
        let tenant_id = Uuid::new_v4();
        let a = entity(tenant_id, "A");
        let b = entity(tenant_id, "B");
        let c = entity(tenant_id, "C");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        let snapshot = GraphSnapshot::build(
            vec![a, b, c],
            vec![
                edge(tenant_id, a_id, b_id, DependencyLayer::Operational, 5.0),
                edge(tenant_id, a_id, c_id, DependencyLayer::Operational, 2.0),
            ],
        );

        let run = propagator().propagate(&snapshot, a_id, 2, || true);
        let dist = run.outcome.severity_distribution;
        assert_eq!(dist.get(&Severity::Severe), Some(&1));
        assert_eq!(dist.get(&Severity::Minor), Some(&1));
        assert_eq!(run.outcome.overall_severity, Some(Severity::Severe));
    }
}
