//! Precedent retrieval — similarity search with quality-threshold downgrades.
//!
//! Candidates are filtered by a quality threshold starting at 3.5 (1–5
//! scale), retried at 3.0 and 2.5 with growing confidence penalties, then
//! re-ranked by an enhanced score that rewards precedents whose recorded
//! long-term outcome held up. Zero results at every threshold is a
//! cold-start condition: the protocol engine must rely on its numeric
//! thresholds alone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Quality thresholds tried in order, with their confidence penalties.
const THRESHOLD_LADDER: [(f64, f64); 3] = [(3.5, 0.0), (3.0, -0.20), (2.5, -0.25)];

/// Confidence penalty applied when no precedent survives any threshold.
const COLD_START_PENALTY: f64 = -0.15;

/// How many candidates to pull from the store before local filtering.
const CANDIDATE_POOL: usize = 20;

/// Maximum precedents returned to the protocol engine.
const MAX_RETURNED: usize = 3;

/// Errors from the precedent store.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("precedent store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("precedent query rejected: {0}")]
    QueryRejected(String),
}

/// Recorded long-term outcome status of a precedent case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The recommendation was implemented.
    Implemented,
    /// The recommendation was rejected.
    Rejected,
    /// Outcome not yet known.
    Pending,
}

/// Long-term outcome recorded against a precedent case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// What happened to the recommendation.
    pub status: OutcomeStatus,
    /// How well the outcome aligned with the recommendation (1–5).
    pub alignment: f64,
}

/// A precedent case returned by the similarity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentCase {
    /// Store-assigned case identifier.
    pub case_id: String,
    /// Similarity to the query (0.0–1.0).
    pub similarity: f64,
    /// Recorded quality of the case (1–5).
    pub quality: f64,
    /// Long-term outcome, when recorded.
    pub outcome: Option<CaseOutcome>,
    /// Short description of the case.
    pub summary: String,
}

impl PrecedentCase {
    /// Similarity adjusted by the recorded long-term outcome.
    pub fn enhanced_score(&self) -> f64 {
        match self.outcome {
            Some(CaseOutcome {
                status: OutcomeStatus::Implemented,
                alignment,
            }) if alignment >= 4.0 => self.similarity * 1.5,
            Some(CaseOutcome {
                status: OutcomeStatus::Implemented,
                alignment,
            }) if alignment < 3.0 => self.similarity * 0.7,
            _ => self.similarity,
        }
    }
}

/// Similarity-search contract for the precedent store.
#[async_trait]
pub trait PrecedentStore: Send + Sync {
    /// Search for cases ranked by similarity to the query.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<Vec<PrecedentCase>, RetrievalError>;
}

/// Result of a precedent recall, including any confidence penalty incurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentRecall {
    /// Surviving cases, sorted by enhanced score descending (at most 3).
    pub cases: Vec<PrecedentCase>,
    /// Confidence penalty from threshold downgrades or cold start.
    pub confidence_adjustment: f64,
    /// Threshold the surviving cases passed (None on cold start).
    pub threshold_used: Option<f64>,
    /// Whether nothing survived any threshold.
    pub cold_start: bool,
}

impl PrecedentRecall {
    /// A cold-start recall carrying the standard penalty.
    pub fn cold_start() -> Self {
        Self {
            cases: Vec::new(),
            confidence_adjustment: COLD_START_PENALTY,
            threshold_used: None,
            cold_start: true,
        }
    }
}

/// Runs the threshold ladder and enhanced-score re-ranking over a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecedentRetriever;

impl PrecedentRetriever {
    /// Create a retriever.
    pub fn new() -> Self {
        Self
    }

    /// Recall up to three precedents for the query.
    pub async fn recall(
        &self,
        store: &dyn PrecedentStore,
        query: &str,
    ) -> Result<PrecedentRecall, RetrievalError> {
        let candidates = store.search(query, CANDIDATE_POOL).await?;

        for (threshold, penalty) in THRESHOLD_LADDER {
            let mut surviving: Vec<PrecedentCase> = candidates
                .iter()
                .filter(|c| c.quality >= threshold)
                .cloned()
                .collect();

            if surviving.is_empty() {
                warn!(
                    threshold,
                    "no precedents at quality threshold, downgrading"
                );
                continue;
            }

            surviving.sort_by(|a, b| {
                b.enhanced_score()
                    .partial_cmp(&a.enhanced_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            surviving.truncate(MAX_RETURNED);

            return Ok(PrecedentRecall {
                cases: surviving,
                confidence_adjustment: penalty,
                threshold_used: Some(threshold),
                cold_start: false,
            });
        }

        warn!(
            penalty = COLD_START_PENALTY,
            "precedent cold start: relying on numeric thresholds alone"
        );
        Ok(PrecedentRecall::cold_start())
    }
}

/// In-memory precedent store, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPrecedentStore {
    cases: Vec<PrecedentCase>,
}

impl InMemoryPrecedentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with cases.
    pub fn with_cases(cases: Vec<PrecedentCase>) -> Self {
        Self { cases }
    }

    /// Add a case.
    pub fn add(&mut self, case: PrecedentCase) {
        self.cases.push(case);
    }
}

#[async_trait]
impl PrecedentStore for InMemoryPrecedentStore {
    async fn search(
        &self,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<PrecedentCase>, RetrievalError> {
        let mut ranked = self.cases.clone();
        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_k);
        Ok(ranked)
    }
}
