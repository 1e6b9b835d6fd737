//! Rating mechanism contract — the external capability that rates proposals.
//!
//! How a rating is produced (model calls, retries, provider fallback) is out
//! of scope; the engine sees an async trait that either returns a Rating or
//! fails with provider exhaustion. A retrying decorator and deterministic
//! test doubles are injected at the orchestrator boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::proposal::Proposal;
use crate::registry::Rating;

/// Errors from the rating mechanism.
#[derive(Debug, Clone, Error)]
pub enum RaterError {
    #[error("provider exhausted for {reviewer_id}: {detail}")]
    ProviderExhausted { reviewer_id: String, detail: String },

    #[error("rating call timed out after {0:?}")]
    Timeout(Duration),

    #[error("unparseable rating response: {0}")]
    Malformed(String),
}

/// One prior exchange in the negotiation context.
///
/// Context is an explicit ordered list threaded into every call, never
/// ambient state; the engine clears it at proposal-revision boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Reviewer whose rating produced this exchange.
    pub reviewer_id: String,
    /// Proposal version the exchange refers to.
    pub proposal_version: u32,
    /// Summary of the position taken.
    pub summary: String,
    /// When the exchange happened.
    pub at: DateTime<Utc>,
}

impl Exchange {
    /// Record an exchange from a freshly collected rating.
    pub fn from_rating(rating: &Rating) -> Self {
        Self {
            reviewer_id: rating.reviewer_id.clone(),
            proposal_version: rating.proposal_version,
            summary: format!("{}: {}", rating.verdict, rating.reasoning),
            at: Utc::now(),
        }
    }
}

/// The external rating mechanism.
#[async_trait]
pub trait RatingMechanism: Send + Sync {
    /// Re-evaluate a proposal from one reviewer's perspective.
    async fn evaluate(
        &self,
        reviewer_id: &str,
        proposal: &Proposal,
        context: &[Exchange],
    ) -> Result<Rating, RaterError>;
}

/// Retry policy for rating calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay, doubled per retry.
    pub base_delay_ms: u64,
    /// Per-call timeout.
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            timeout_secs: 30,
        }
    }
}

/// Decorator adding timeout and exponential-backoff retries to any rater.
pub struct RetryingRater<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: RatingMechanism> RetryingRater<R> {
    /// Wrap a rater with the default policy.
    pub fn new(inner: R) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    /// Wrap a rater with a custom policy.
    pub fn with_policy(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<R: RatingMechanism> RatingMechanism for RetryingRater<R> {
    async fn evaluate(
        &self,
        reviewer_id: &str,
        proposal: &Proposal,
        context: &[Exchange],
    ) -> Result<Rating, RaterError> {
        let timeout = Duration::from_secs(self.policy.timeout_secs);
        let mut last_err = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.base_delay_ms * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match tokio::time::timeout(timeout, self.inner.evaluate(reviewer_id, proposal, context))
                .await
            {
                Ok(Ok(rating)) => return Ok(rating),
                Ok(Err(e)) => {
                    warn!(reviewer_id, attempt, error = %e, "rating call failed");
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(reviewer_id, attempt, "rating call timed out");
                    last_err = Some(RaterError::Timeout(timeout));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| RaterError::ProviderExhausted {
            reviewer_id: reviewer_id.to_string(),
            detail: "no attempts made".to_string(),
        }))
    }
}

/// Deterministic scripted rater for tests and incremental development.
///
/// Responses are popped per reviewer in push order; when a reviewer's queue
/// runs dry the last response is repeated. Reviewers marked failing always
/// return provider exhaustion.
#[derive(Default)]
pub struct ScriptedRater {
    scripts: Mutex<HashMap<String, Vec<Rating>>>,
    cursors: Mutex<HashMap<String, usize>>,
    failing: Mutex<Vec<String>>,
}

impl ScriptedRater {
    /// Create an empty scripted rater.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a reviewer.
    pub fn push_response(&self, reviewer_id: &str, rating: Rating) {
        self.scripts
            .lock()
            .unwrap()
            .entry(reviewer_id.to_string())
            .or_default()
            .push(rating);
    }

    /// Make every future call for a reviewer fail with provider exhaustion.
    pub fn fail_for(&self, reviewer_id: &str) {
        self.failing.lock().unwrap().push(reviewer_id.to_string());
    }
}

#[async_trait]
impl RatingMechanism for ScriptedRater {
    async fn evaluate(
        &self,
        reviewer_id: &str,
        proposal: &Proposal,
        _context: &[Exchange],
    ) -> Result<Rating, RaterError> {
        if self.failing.lock().unwrap().iter().any(|r| r == reviewer_id) {
            return Err(RaterError::ProviderExhausted {
                reviewer_id: reviewer_id.to_string(),
                detail: "scripted failure".to_string(),
            });
        }

        let scripts = self.scripts.lock().unwrap();
        let queue = scripts.get(reviewer_id).ok_or_else(|| RaterError::Malformed(
            format!("no script for reviewer {}", reviewer_id),
        ))?;

        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry(reviewer_id.to_string()).or_insert(0);
        let idx = (*cursor).min(queue.len() - 1);
        *cursor += 1;

        let mut rating = queue[idx].clone();
        rating.proposal_version = proposal.version;
        Ok(rating)
    }
}

/// Rater that always reports provider exhaustion.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRater;

#[async_trait]
impl RatingMechanism for FailingRater {
    async fn evaluate(
        &self,
        reviewer_id: &str,
        _proposal: &Proposal,
        _context: &[Exchange],
    ) -> Result<Rating, RaterError> {
        Err(RaterError::ProviderExhausted {
            reviewer_id: reviewer_id.to_string(),
            detail: "all providers exhausted".to_string(),
        })
    }
}
