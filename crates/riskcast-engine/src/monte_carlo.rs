//! Monte Carlo risk simulation.
//!
//! For each trial, every entity in scope gets an independent Gaussian
//! shock scaled by its baseline score; the trial records both per-entity
//! simulated scores and the portfolio mean. Statistics are computed after
//! all trials. A supplied seed makes the whole run bit-for-bit
//! reproducible: a single seeded RNG is threaded through the trial loop
//! and entities are iterated in a fixed order.

use crate::error::{EngineError, EngineResult};
use crate::snapshot::GraphSnapshot;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Iterations between cancellation/progress checkpoints.
pub const CHECKPOINT_INTERVAL: u64 = 100;

/// Upper bound on requested iterations.
pub const MAX_ITERATIONS: u64 = 100_000;

/// Configuration for a Monte Carlo run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of trials to run.
    pub iterations: u64,
    /// Symmetric confidence level for percentile intervals, in (0, 1).
    pub confidence_level: f64,
    /// Shock standard deviation as a fraction of each entity's baseline
    /// score. Zero collapses every trial to the baseline.
    pub risk_volatility: f64,
    /// Seed for reproducible runs. `None` draws from system entropy.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            confidence_level: 0.95,
            risk_volatility: 0.15,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    /// Validates the configuration, rejecting it before any work begins.
    pub fn validate(&self) -> EngineResult<()> {
        if self.iterations == 0 {
            return Err(EngineError::Validation(
                "iterations must be greater than zero".into(),
            ));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(EngineError::Validation(format!(
                "iterations must not exceed {MAX_ITERATIONS}"
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(EngineError::Validation(
                "confidence_level must be in (0, 1)".into(),
            ));
        }
        if !self.risk_volatility.is_finite() || self.risk_volatility < 0.0 {
            return Err(EngineError::Validation(
                "risk_volatility must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Distribution statistics for one entity across all trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStatistics {
    /// The entity these statistics describe.
    pub entity_id: Uuid,
    /// Entity name at snapshot time.
    pub name: String,
    /// Baseline risk score before shocks.
    pub baseline_score: f64,
    /// Mean simulated score.
    pub mean: f64,
    /// Sample standard deviation of simulated scores.
    pub std_dev: f64,
    /// Median simulated score.
    pub median: f64,
    /// Lowest simulated score.
    pub min: f64,
    /// Highest simulated score.
    pub max: f64,
    /// Lower bound of the symmetric confidence interval.
    pub confidence_lower: f64,
    /// Upper bound of the symmetric confidence interval.
    pub confidence_upper: f64,
    /// 95th percentile (VaR-style).
    pub var_95: f64,
    /// 99th percentile (VaR-style).
    pub var_99: f64,
}

/// Distribution statistics for the portfolio (per-trial means).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioStatistics {
    /// Mean of per-trial portfolio means.
    pub mean: f64,
    /// Sample standard deviation of per-trial portfolio means.
    pub std_dev: f64,
    /// Median portfolio mean.
    pub median: f64,
    /// Lowest portfolio mean.
    pub min: f64,
    /// Highest portfolio mean.
    pub max: f64,
    /// Lower bound of the symmetric confidence interval.
    pub confidence_lower: f64,
    /// Upper bound of the symmetric confidence interval.
    pub confidence_upper: f64,
    /// 95th percentile.
    pub var_95: f64,
    /// 99th percentile.
    pub var_99: f64,
    /// Fraction of trials with portfolio mean above 75.
    pub probability_high_risk: f64,
    /// Fraction of trials with portfolio mean in [50, 75].
    pub probability_medium_risk: f64,
    /// Fraction of trials with portfolio mean below 50.
    pub probability_low_risk: f64,
}

/// Results of a Monte Carlo run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonteCarloOutcome {
    /// Trials actually completed (may be short of the plan if cancelled).
    pub iterations_run: u64,
    /// Confidence level the intervals were computed at.
    pub confidence_level: f64,
    /// Per-entity statistics.
    pub entity_statistics: Vec<EntityStatistics>,
    /// Portfolio-level statistics, absent when no trials completed.
    pub portfolio: Option<PortfolioStatistics>,
    /// Explanatory note (e.g. "no entities in scope").
    pub message: Option<String>,
}

/// Output of the simulator: the outcome plus run control flags.
#[derive(Debug)]
pub struct MonteCarloRun {
    /// The computed outcome.
    pub outcome: MonteCarloOutcome,
    /// Trials completed.
    pub iterations_run: u64,
    /// True if a checkpoint requested a stop.
    pub cancelled: bool,
}

/// Monte Carlo simulator over a graph snapshot.
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    /// Creates a simulator, validating the configuration up front.
    pub fn new(config: MonteCarloConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs the simulation over every entity in the snapshot.
    ///
    /// The `checkpoint` callback is invoked every [`CHECKPOINT_INTERVAL`]
    /// trials with the number of trials finished so far; returning `false`
    /// stops the run at that boundary. Statistics are computed over the
    /// trials that did complete.
    pub fn run<F>(&self, snapshot: &GraphSnapshot, mut checkpoint: F) -> MonteCarloRun
    where
        F: FnMut(u64) -> bool,
    {
        let mut entities: Vec<_> = snapshot.entities().collect();
        if entities.is_empty() {
            return MonteCarloRun {
                outcome: MonteCarloOutcome {
                    iterations_run: 0,
                    confidence_level: self.config.confidence_level,
                    entity_statistics: Vec::new(),
                    portfolio: None,
                    message: Some("no entities in scope".into()),
                },
                iterations_run: 0,
                cancelled: false,
            };
        }
        // Fixed iteration order so a seeded run is reproducible regardless
        // of map layout.
        entities.sort_by_key(|e| e.id);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Shock distributions are built once per entity. A zero sigma is
        // represented as `None` and sampled as no shock at all.
        let shocks: Vec<Option<Normal<f64>>> = entities
            .iter()
            .map(|e| {
                let sigma = self.config.risk_volatility * e.baseline_risk_score;
                if sigma > 0.0 {
                    Normal::new(0.0, sigma).ok()
                } else {
                    None
                }
            })
            .collect();

        let iterations = self.config.iterations;
        let mut samples: Vec<Vec<f64>> = entities
            .iter()
            .map(|_| Vec::with_capacity(iterations as usize))
            .collect();
        let mut portfolio_means: Vec<f64> = Vec::with_capacity(iterations as usize);
        let mut cancelled = false;

        for trial in 0..iterations {
            if trial % CHECKPOINT_INTERVAL == 0 && !checkpoint(trial) {
                cancelled = true;
                break;
            }

            let mut sum = 0.0;
            for (idx, entity) in entities.iter().enumerate() {
                let shock = match &shocks[idx] {
                    Some(normal) => normal.sample(&mut rng),
                    None => 0.0,
                };
                let score = (entity.baseline_risk_score + shock).clamp(0.0, 100.0);
                samples[idx].push(score);
                sum += score;
            }
            portfolio_means.push(sum / entities.len() as f64);
        }

        let iterations_run = portfolio_means.len() as u64;
        debug!(iterations_run, cancelled, "Monte Carlo trials finished");

        let entity_statistics = entities
            .iter()
            .zip(samples.iter())
            .map(|(entity, scores)| {
                let d = describe(scores, self.config.confidence_level);
                EntityStatistics {
                    entity_id: entity.id,
                    name: entity.name.clone(),
                    baseline_score: entity.baseline_risk_score,
                    mean: d.mean,
                    std_dev: d.std_dev,
                    median: d.median,
                    min: d.min,
                    max: d.max,
                    confidence_lower: d.confidence_lower,
                    confidence_upper: d.confidence_upper,
                    var_95: d.var_95,
                    var_99: d.var_99,
                }
            })
            .collect();

        let portfolio = if portfolio_means.is_empty() {
            None
        } else {
            let d = describe(&portfolio_means, self.config.confidence_level);
            let total = portfolio_means.len() as f64;
            let high = portfolio_means.iter().filter(|m| **m > 75.0).count() as f64;
            let low = portfolio_means.iter().filter(|m| **m < 50.0).count() as f64;
            let medium = total - high - low;
            Some(PortfolioStatistics {
                mean: d.mean,
                std_dev: d.std_dev,
                median: d.median,
                min: d.min,
                max: d.max,
                confidence_lower: d.confidence_lower,
                confidence_upper: d.confidence_upper,
                var_95: d.var_95,
                var_99: d.var_99,
                probability_high_risk: high / total,
                probability_medium_risk: medium / total,
                probability_low_risk: low / total,
            })
        };

        MonteCarloRun {
            outcome: MonteCarloOutcome {
                iterations_run,
                confidence_level: self.config.confidence_level,
                entity_statistics,
                portfolio,
                message: None,
            },
            iterations_run,
            cancelled,
        }
    }
}

/// Summary statistics of a sample.
struct Describe {
    mean: f64,
    std_dev: f64,
    median: f64,
    min: f64,
    max: f64,
    confidence_lower: f64,
    confidence_upper: f64,
    var_95: f64,
    var_99: f64,
}

fn describe(values: &[f64], confidence_level: f64) -> Describe {
    if values.is_empty() {
        return Describe {
            mean: 0.0,
            std_dev: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            confidence_lower: 0.0,
            confidence_upper: 0.0,
            var_95: 0.0,
            var_99: 0.0,
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let tail = (1.0 - confidence_level) / 2.0;
    Describe {
        mean,
        std_dev,
        median: percentile(&sorted, 0.5),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        confidence_lower: percentile(&sorted, tail),
        confidence_upper: percentile(&sorted, 1.0 - tail),
        var_95: percentile(&sorted, 0.95),
        var_99: percentile(&sorted, 0.99),
    }
}

/// Linear-interpolated percentile of a sorted, non-empty sample.
/// `q` is a fraction in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = position - lower as f64;
        sorted[lower] + fraction * (sorted[upper] - sorted[lower])
    }
}
