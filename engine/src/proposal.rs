//! Proposal under review — versioned content plus quantitative success metrics.
//!
//! Owned by the orchestrator. Each negotiation concession produces a new
//! version, which is what triggers reviewers to re-evaluate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known success-metric keys read by the negotiation procedures.
pub mod metric {
    /// Projected revenue premium from entering the contested jurisdiction.
    pub const REVENUE_PREMIUM: &str = "revenue_premium";
    /// Risk-adjusted compliance cost in the contested jurisdiction.
    pub const RISK_ADJUSTED_COST: &str = "risk_adjusted_cost";
    /// Carbon-intensity delta introduced by the proposal.
    pub const CARBON_DELTA: &str = "carbon_delta";
    /// Budget allocated to carbon mitigation.
    pub const MITIGATION_BUDGET: &str = "mitigation_budget";
    /// Delivery timeline in months.
    pub const TIMELINE_MONTHS: &str = "timeline_months";
    /// Baseline timeline the return projection was computed against.
    pub const BASELINE_MONTHS: &str = "baseline_months";
    /// Projected rate of return at the baseline timeline.
    pub const PROJECTED_RETURN: &str = "projected_return";
    /// Projected demand for the proposed capacity.
    pub const PROJECTED_DEMAND: &str = "projected_demand";
    /// Cost of the capacity expansion.
    pub const CAPACITY_COST: &str = "capacity_cost";
}

/// A versioned proposal with its quantitative success metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Revision number, bumped on every concession.
    pub version: u32,
    /// Proposal body (summary text; rendering is out of scope).
    pub content: String,
    /// Named quantitative metrics the procedures evaluate.
    pub success_metrics: BTreeMap<String, f64>,
}

impl Proposal {
    /// Create a version-1 proposal.
    pub fn new(content: &str) -> Self {
        Self {
            version: 1,
            content: content.to_string(),
            success_metrics: BTreeMap::new(),
        }
    }

    /// Set a metric, builder-style.
    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.success_metrics.insert(key.to_string(), value);
        self
    }

    /// Read a metric; missing metrics read as 0.0.
    pub fn metric(&self, key: &str) -> f64 {
        self.success_metrics.get(key).copied().unwrap_or(0.0)
    }

    /// Overwrite a metric on the current version.
    pub fn set_metric(&mut self, key: &str, value: f64) {
        self.success_metrics.insert(key.to_string(), value);
    }

    /// Scale a metric by `factor` (no-op if the metric is absent).
    pub fn scale_metric(&mut self, key: &str, factor: f64) {
        if let Some(v) = self.success_metrics.get_mut(key) {
            *v *= factor;
        }
    }

    /// Bump the version, marking a revised proposal.
    pub fn revise(&mut self) -> u32 {
        self.version += 1;
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_proposal() {
        let p = Proposal::new("expand into region X");
        assert_eq!(p.version, 1);
        assert!(p.success_metrics.is_empty());
    }

    #[test]
    fn test_metric_default_zero() {
        let p = Proposal::new("x");
        assert_eq!(p.metric(metric::CARBON_DELTA), 0.0);
    }

    #[test]
    fn test_with_and_set_metric() {
        let mut p = Proposal::new("x").with_metric(metric::REVENUE_PREMIUM, 12.0);
        assert_eq!(p.metric(metric::REVENUE_PREMIUM), 12.0);

        p.set_metric(metric::REVENUE_PREMIUM, 14.0);
        assert_eq!(p.metric(metric::REVENUE_PREMIUM), 14.0);
    }

    #[test]
    fn test_scale_metric() {
        let mut p = Proposal::new("x").with_metric(metric::MITIGATION_BUDGET, 100.0);
        p.scale_metric(metric::MITIGATION_BUDGET, 1.1);
        assert!((p.metric(metric::MITIGATION_BUDGET) - 110.0).abs() < 1e-9);

        // Absent metric is untouched
        p.scale_metric(metric::CAPACITY_COST, 2.0);
        assert_eq!(p.metric(metric::CAPACITY_COST), 0.0);
    }

    #[test]
    fn test_revise_bumps_version() {
        let mut p = Proposal::new("x");
        assert_eq!(p.revise(), 2);
        assert_eq!(p.revise(), 3);
        assert_eq!(p.version, 3);
    }
}
