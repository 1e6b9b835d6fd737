//! Convergence Tester — five cumulative acceptance criteria over the registry.
//!
//! Criteria are deliberately ordered most-severe-first; the first failing
//! criterion short-circuits and is reported. All five must pass for the
//! panel to converge.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{RatingRegistry, Verdict};

/// Thresholds for the acceptance criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    /// Maximum WARN ratings tolerated.
    pub max_warnings: usize,
    /// Mean confidence must strictly exceed this.
    pub min_mean_confidence: f64,
    /// Fraction of ACCEPT/ENDORSE ratings must reach this.
    pub min_positive_fraction: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_warnings: 2,
            min_mean_confidence: 0.70,
            min_positive_fraction: 0.60,
        }
    }
}

/// Detail metrics computed alongside the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceMetrics {
    pub total_ratings: usize,
    pub block_count: usize,
    pub warn_count: usize,
    pub mean_confidence: f64,
    pub positive_fraction: f64,
}

/// Outcome of one convergence evaluation. Replaced, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceResult {
    /// Whether all five criteria passed.
    pub converged: bool,
    /// Failing criteria in evaluation order (first failure short-circuits).
    pub failed_criteria: Vec<String>,
    /// Count/rate metrics over the registry.
    pub metrics: ConvergenceMetrics,
}

/// Evaluates the cumulative criteria after the protocol engine drains its queue.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceTester {
    criteria: ConvergenceCriteria,
}

impl ConvergenceTester {
    /// Create a tester with custom criteria.
    pub fn new(criteria: ConvergenceCriteria) -> Self {
        Self { criteria }
    }

    /// Evaluate the registry against all five criteria in order.
    pub fn evaluate(&self, registry: &RatingRegistry) -> ConvergenceResult {
        let metrics = ConvergenceMetrics {
            total_ratings: registry.len(),
            block_count: registry.count(Verdict::Block),
            warn_count: registry.count(Verdict::Warn),
            mean_confidence: registry.mean_confidence(),
            positive_fraction: registry.positive_fraction(),
        };

        let failed = self.first_failure(registry, &metrics);
        let result = ConvergenceResult {
            converged: failed.is_none(),
            failed_criteria: failed.into_iter().collect(),
            metrics,
        };
        debug!(
            converged = result.converged,
            failed = ?result.failed_criteria,
            "convergence evaluated"
        );
        result
    }

    fn first_failure(
        &self,
        registry: &RatingRegistry,
        metrics: &ConvergenceMetrics,
    ) -> Option<String> {
        // 1. Zero BLOCK ratings.
        if metrics.block_count > 0 {
            return Some("blocking_concerns".to_string());
        }

        // 2. Bounded WARN count.
        if metrics.warn_count > self.criteria.max_warnings {
            return Some("too_many_warnings".to_string());
        }

        // 3. Every WARN carries an accepted mitigation plan.
        for rating in registry.all().filter(|r| r.verdict == Verdict::Warn) {
            if rating.mitigation_plan.is_none() {
                return Some("missing_mitigation".to_string());
            }
            if rating.mitigation_accepted != Some(true) {
                return Some("mitigation_not_accepted".to_string());
            }
        }

        // 4. Mean confidence strictly above the floor.
        if metrics.mean_confidence <= self.criteria.min_mean_confidence {
            return Some("insufficient_confidence".to_string());
        }

        // 5. Enough positive verdicts.
        if metrics.positive_fraction < self.criteria.min_positive_fraction {
            return Some("insufficient_agreement".to_string());
        }

        None
    }
}
