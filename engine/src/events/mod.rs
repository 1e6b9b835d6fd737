//! Audit log — append-only, timestamped state-transition events.
//!
//! Every state transition in the engine emits one event, keyed by a trace
//! identifier covering the whole query. Events are serde-tagged for
//! downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// All engine state-transition events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    /// A detector pattern fired.
    TensionDetected {
        tension_id: String,
        protocol: String,
        reviewers: Vec<String>,
        trigger_reason: String,
    },
    /// The prioritizer assigned a tier and dependencies.
    TensionPrioritized {
        tension_id: String,
        tier: u8,
        depends_on: Vec<String>,
    },
    /// One negotiation iteration completed.
    TensionIterated {
        tension_id: String,
        iteration: u32,
        measured: f64,
        threshold: f64,
        accepted: bool,
    },
    /// A tension was re-enqueued behind pending dependencies.
    TensionBlocked {
        tension_id: String,
        reinsertions: u32,
    },
    /// A negotiation accepted a revision.
    TensionResolved {
        tension_id: String,
        iterations: u32,
        summary: String,
    },
    /// A tension was handed to human review.
    TensionEscalated {
        tension_id: String,
        reason_code: String,
    },
    /// A concession produced a new proposal version.
    ProposalRevised { version: u32, by_protocol: String },
    /// A reviewer's rating was recorded (overwriting the previous one).
    RatingRecorded {
        reviewer_id: String,
        verdict: String,
        confidence: f64,
        proposal_version: u32,
    },
    /// The convergence tester ran over the final registry.
    ConvergenceEvaluated {
        converged: bool,
        failed_criteria: Vec<String>,
    },
}

/// One appended audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic sequence number within the trace.
    pub seq: u64,
    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: PanelEvent,
}

/// Append-only event sequence for one query/trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    trace_id: String,
    records: Vec<AuditRecord>,
    next_seq: u64,
}

impl AuditLog {
    /// Create a log with a fresh v4 trace id.
    pub fn new() -> Self {
        Self::with_trace_id(&format!("trace-{}", Uuid::new_v4()))
    }

    /// Create a log under an externally supplied trace id.
    pub fn with_trace_id(trace_id: &str) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            records: Vec::new(),
            next_seq: 1,
        }
    }

    /// Append an event, returning its sequence number.
    pub fn append(&mut self, event: PanelEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(trace_id = %self.trace_id, seq, event = ?event, "audit event");
        self.records.push(AuditRecord {
            seq,
            timestamp: Utc::now(),
            event,
        });
        seq
    }

    /// Trace identifier for the whole query.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// All records in append order.
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Number of appended records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
