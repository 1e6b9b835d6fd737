//! Rating Registry — latest rating per reviewer for the current proposal revision.
//!
//! Pure data access: the registry holds state and counting helpers, no policy.
//! Ratings are overwritten (not appended) each time a reviewer re-evaluates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reviewer verdict on a proposal revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Proposal must not proceed as-is.
    Block,
    /// Concerns that require a mitigation plan.
    Warn,
    /// Proposal is acceptable.
    Accept,
    /// Proposal is actively supported.
    Endorse,
}

impl Verdict {
    /// Whether this verdict counts toward agreement (ACCEPT or ENDORSE).
    pub fn is_positive(self) -> bool {
        matches!(self, Self::Accept | Self::Endorse)
    }

    /// Whether this verdict blocks convergence outright.
    pub fn is_blocking(self) -> bool {
        self == Self::Block
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Warn => write!(f, "warn"),
            Self::Accept => write!(f, "accept"),
            Self::Endorse => write!(f, "endorse"),
        }
    }
}

/// A single reviewer's rating of the current proposal revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    /// Which reviewer produced this rating.
    pub reviewer_id: String,
    /// The verdict.
    pub verdict: Verdict,
    /// Confidence in the verdict (0.0–1.0).
    pub confidence: f64,
    /// Free-text reasoning behind the verdict.
    pub reasoning: String,
    /// Mitigation plan attached to a WARN verdict.
    pub mitigation_plan: Option<String>,
    /// Whether the mitigation plan was accepted by the reviewer.
    pub mitigation_accepted: Option<bool>,
    /// Reason for rejection, when the reviewer rejected a revision.
    pub rejection_reason: Option<String>,
    /// Proposal version this rating applies to.
    pub proposal_version: u32,
    /// When the rating was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Rating {
    /// Create a new rating with confidence clamped to [0, 1].
    pub fn new(reviewer_id: &str, verdict: Verdict, confidence: f64, reasoning: &str) -> Self {
        Self {
            reviewer_id: reviewer_id.to_string(),
            verdict,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.to_string(),
            mitigation_plan: None,
            mitigation_accepted: None,
            rejection_reason: None,
            proposal_version: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Attach a mitigation plan and its acceptance state.
    pub fn with_mitigation(mut self, plan: &str, accepted: bool) -> Self {
        self.mitigation_plan = Some(plan.to_string());
        self.mitigation_accepted = Some(accepted);
        self
    }

    /// Set the proposal version this rating applies to.
    pub fn for_version(mut self, version: u32) -> Self {
        self.proposal_version = version;
        self
    }

    /// Whether reasoning mentions a keyword (case-insensitive).
    pub fn cites(&self, keyword: &str) -> bool {
        self.reasoning
            .to_lowercase()
            .contains(&keyword.to_lowercase())
    }
}

/// Latest rating per reviewer. BTreeMap keeps iteration order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingRegistry {
    ratings: BTreeMap<String, Rating>,
}

impl RatingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rating, overwriting any previous rating from the same reviewer.
    pub fn record(&mut self, rating: Rating) {
        self.ratings.insert(rating.reviewer_id.clone(), rating);
    }

    /// Get a reviewer's latest rating.
    pub fn get(&self, reviewer_id: &str) -> Option<&Rating> {
        self.ratings.get(reviewer_id)
    }

    /// All ratings in reviewer-id order.
    pub fn all(&self) -> impl Iterator<Item = &Rating> {
        self.ratings.values()
    }

    /// Reviewer ids currently holding a rating.
    pub fn reviewer_ids(&self) -> Vec<&str> {
        self.ratings.keys().map(|k| k.as_str()).collect()
    }

    /// Number of ratings held.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Whether the registry holds no ratings.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Count of ratings with the given verdict.
    pub fn count(&self, verdict: Verdict) -> usize {
        self.ratings.values().filter(|r| r.verdict == verdict).count()
    }

    /// Whether any of the given reviewers currently holds a BLOCK.
    pub fn any_blocking(&self, reviewers: &[String]) -> bool {
        reviewers
            .iter()
            .filter_map(|id| self.ratings.get(id))
            .any(|r| r.verdict.is_blocking())
    }

    /// Mean confidence across all ratings (0.0 when empty).
    pub fn mean_confidence(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.ratings.values().map(|r| r.confidence).sum();
        sum / self.ratings.len() as f64
    }

    /// Fraction of ratings with a positive verdict (0.0 when empty).
    pub fn positive_fraction(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let positive = self
            .ratings
            .values()
            .filter(|r| r.verdict.is_positive())
            .count();
        positive as f64 / self.ratings.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(id: &str, verdict: Verdict, confidence: f64) -> Rating {
        Rating::new(id, verdict, confidence, "no particular reason")
    }

    #[test]
    fn test_record_and_get() {
        let mut registry = RatingRegistry::new();
        registry.record(rating("legal", Verdict::Accept, 0.8));

        let r = registry.get("legal").unwrap();
        assert_eq!(r.verdict, Verdict::Accept);
        assert!((r.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_overwrites() {
        let mut registry = RatingRegistry::new();
        registry.record(rating("legal", Verdict::Block, 0.9));
        registry.record(rating("legal", Verdict::Accept, 0.7));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("legal").unwrap().verdict, Verdict::Accept);
    }

    #[test]
    fn test_counts() {
        let mut registry = RatingRegistry::new();
        registry.record(rating("legal", Verdict::Block, 0.9));
        registry.record(rating("finance", Verdict::Warn, 0.8));
        registry.record(rating("ethics", Verdict::Warn, 0.7));
        registry.record(rating("market", Verdict::Endorse, 0.95));

        assert_eq!(registry.count(Verdict::Block), 1);
        assert_eq!(registry.count(Verdict::Warn), 2);
        assert_eq!(registry.count(Verdict::Endorse), 1);
        assert_eq!(registry.count(Verdict::Accept), 0);
    }

    #[test]
    fn test_mean_confidence() {
        let mut registry = RatingRegistry::new();
        assert_eq!(registry.mean_confidence(), 0.0);

        registry.record(rating("a", Verdict::Accept, 0.9));
        registry.record(rating("b", Verdict::Accept, 0.7));
        assert!((registry.mean_confidence() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_positive_fraction() {
        let mut registry = RatingRegistry::new();
        assert_eq!(registry.positive_fraction(), 0.0);

        registry.record(rating("a", Verdict::Accept, 0.9));
        registry.record(rating("b", Verdict::Endorse, 0.9));
        registry.record(rating("c", Verdict::Warn, 0.9));
        registry.record(rating("d", Verdict::Block, 0.9));
        assert!((registry.positive_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_any_blocking() {
        let mut registry = RatingRegistry::new();
        registry.record(rating("legal", Verdict::Block, 0.9));
        registry.record(rating("finance", Verdict::Accept, 0.8));

        assert!(registry.any_blocking(&["legal".to_string(), "finance".to_string()]));
        assert!(!registry.any_blocking(&["finance".to_string()]));
        assert!(!registry.any_blocking(&["missing".to_string()]));
    }

    #[test]
    fn test_confidence_clamped() {
        let r = Rating::new("a", Verdict::Accept, 1.7, "overconfident");
        assert_eq!(r.confidence, 1.0);
        let r = Rating::new("a", Verdict::Accept, -0.3, "underconfident");
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_cites() {
        let r = Rating::new("legal", Verdict::Block, 0.9, "Outside our Jurisdiction entirely");
        assert!(r.cites("jurisdiction"));
        assert!(!r.cites("carbon"));
    }

    #[test]
    fn test_with_mitigation() {
        let r = rating("ops", Verdict::Warn, 0.75).with_mitigation("phased rollout", true);
        assert_eq!(r.mitigation_plan.as_deref(), Some("phased rollout"));
        assert_eq!(r.mitigation_accepted, Some(true));
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Block.to_string(), "block");
        assert_eq!(Verdict::Warn.to_string(), "warn");
        assert_eq!(Verdict::Accept.to_string(), "accept");
        assert_eq!(Verdict::Endorse.to_string(), "endorse");
    }

    #[test]
    fn test_verdict_serde() {
        let json = serde_json::to_string(&Verdict::Endorse).unwrap();
        assert_eq!(json, "\"endorse\"");
        let parsed: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Verdict::Endorse);
    }

    #[test]
    fn test_rating_serde_roundtrip() {
        let r = rating("legal", Verdict::Warn, 0.66).with_mitigation("plan", false);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Rating = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.reviewer_id, "legal");
        assert_eq!(parsed.mitigation_accepted, Some(false));
    }
}
