//! Tension records — detected disagreements and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The five known conflict patterns, each with its own negotiation procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolId {
    /// Ethics vs legal: legal-minimum compliance against an ethical violation.
    /// Never negotiated — instant escalation by policy.
    ValuesConflict,
    /// Legal vs finance: jurisdiction risk against a cost threshold.
    JurisdictionCost,
    /// Sustainability vs finance: carbon-intensity delta against a mitigation budget.
    CarbonMitigation,
    /// Operations vs finance: revised timeline against a recomputed return.
    TimelineReturn,
    /// Market vs operations: projected demand against capacity expansion cost.
    DemandCapacity,
}

impl ProtocolId {
    /// All known protocols, in detection-scan order.
    pub const ALL: [ProtocolId; 5] = [
        ProtocolId::ValuesConflict,
        ProtocolId::JurisdictionCost,
        ProtocolId::CarbonMitigation,
        ProtocolId::TimelineReturn,
        ProtocolId::DemandCapacity,
    ];

    /// The reviewer pair this pattern watches.
    pub fn reviewers(self) -> &'static [&'static str] {
        match self {
            Self::ValuesConflict => &["ethics", "legal"],
            Self::JurisdictionCost => &["legal", "finance"],
            Self::CarbonMitigation => &["sustainability", "finance"],
            Self::TimelineReturn => &["operations", "finance"],
            Self::DemandCapacity => &["market", "operations"],
        }
    }

    /// Protocol-specific negotiation bound.
    pub fn max_iterations(self) -> u32 {
        match self {
            Self::ValuesConflict => 0,
            Self::JurisdictionCost => 2,
            Self::CarbonMitigation => 3,
            Self::TimelineReturn => 3,
            Self::DemandCapacity => 4,
        }
    }

    /// Whether this is the tier-1 values-conflict pattern.
    pub fn is_values_conflict(self) -> bool {
        self == Self::ValuesConflict
    }
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValuesConflict => write!(f, "values_conflict"),
            Self::JurisdictionCost => write!(f, "jurisdiction_cost"),
            Self::CarbonMitigation => write!(f, "carbon_mitigation"),
            Self::TimelineReturn => write!(f, "timeline_return"),
            Self::DemandCapacity => write!(f, "demand_capacity"),
        }
    }
}

/// Lifecycle status of a tension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionStatus {
    /// Awaiting or under negotiation.
    Active,
    /// Waiting on dependencies; re-enqueued behind the queue.
    Blocked,
    /// Negotiation accepted a revision.
    Resolved,
    /// Handed to human review with a report.
    Escalated,
}

impl TensionStatus {
    /// Whether this status ends the tension's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Escalated)
    }
}

impl std::fmt::Display for TensionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Blocked => write!(f, "blocked"),
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// A detected disagreement between two or more reviewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tension {
    /// Unique id for this instance (`t-<uuid>`).
    pub id: String,
    /// Which negotiation procedure applies.
    pub protocol: ProtocolId,
    /// Reviewers in conflict.
    pub reviewers: Vec<String>,
    /// Lifecycle status.
    pub status: TensionStatus,
    /// Negotiation iterations used so far.
    pub iteration: u32,
    /// Protocol-specific iteration bound.
    pub max_iterations: u32,
    /// Priority tier (1 = highest). Assigned by the prioritizer.
    pub priority_tier: u8,
    /// Tensions that must reach a terminal status first.
    pub depends_on: BTreeSet<String>,
    /// Why the detector fired.
    pub trigger_reason: String,
    /// Detection order, used for creation-time tie-breaking.
    pub detected_seq: u64,
    /// When the tension was detected.
    pub created_at: DateTime<Utc>,
    /// When the tension reached a terminal status.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Tension {
    /// Create a fresh active tension for a detected pattern.
    pub fn new(protocol: ProtocolId, trigger_reason: &str, detected_seq: u64) -> Self {
        Self {
            id: format!("t-{}", Uuid::new_v4()),
            protocol,
            reviewers: protocol.reviewers().iter().map(|r| r.to_string()).collect(),
            status: TensionStatus::Active,
            iteration: 0,
            max_iterations: protocol.max_iterations(),
            priority_tier: 4,
            depends_on: BTreeSet::new(),
            trigger_reason: trigger_reason.to_string(),
            detected_seq,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether this tension shares at least one reviewer with another.
    pub fn shares_reviewer(&self, other: &Tension) -> bool {
        self.reviewers.iter().any(|r| other.reviewers.contains(r))
    }

    /// Mark resolved and stamp the terminal time.
    pub fn mark_resolved(&mut self) {
        self.status = TensionStatus::Resolved;
        self.resolved_at = Some(Utc::now());
    }

    /// Mark escalated and stamp the terminal time.
    pub fn mark_escalated(&mut self) {
        self.status = TensionStatus::Escalated;
        self.resolved_at = Some(Utc::now());
    }
}

/// Resolution produced when a negotiation procedure accepts a revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Tension this resolution settles.
    pub tension_id: String,
    /// Protocol that produced it.
    pub protocol: ProtocolId,
    /// Measured value at acceptance.
    pub measured: f64,
    /// Threshold the measurement was compared against.
    pub threshold: f64,
    /// Iterations consumed to get there.
    pub iterations: u32,
    /// Human-readable summary of the accepted position.
    pub summary: String,
}
