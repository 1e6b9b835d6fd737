//! Tension resolution and convergence engine for adversarial review panels.
//!
//! A panel of domain reviewers rates a proposal; this crate turns their
//! disagreements into structured, bounded negotiations:
//! - Rating registry: latest verdict per reviewer
//! - Tension detector: five verdict/keyword conflict patterns
//! - Tension prioritizer: shared-reviewer dependency graph, four tiers
//! - Protocol engine: bounded-iteration negotiation per tension
//! - Convergence tester: five cumulative short-circuit criteria
//! - Escalation reporter: structured hand-off to human review
//! - Precedent memory: quality-threshold ladder with outcome re-ranking
//!
//! Everything is deterministic given the ratings; the only external calls
//! are through the [`rater::RatingMechanism`] and [`memory::PrecedentStore`]
//! traits.

#![allow(dead_code)]
#![allow(clippy::uninlined_format_args)]

pub mod convergence;
pub mod escalation;
pub mod events;
pub mod memory;
pub mod orchestrator;
pub mod proposal;
pub mod protocol;
pub mod rater;
pub mod registry;
pub mod state;
pub mod tension;

// Re-export registry types
pub use registry::{Rating, RatingRegistry, Verdict};

// Re-export tension types
pub use tension::{
    PrioritizerConfig, ProtocolId, Resolution, Tension, TensionDetector, TensionPrioritizer,
    TensionStatus,
};

// Re-export protocol-engine types
pub use protocol::{
    procedure_for, Assessment, EngineConfig, EngineOutcome, NegotiationProcedure, ProtocolEngine,
};

// Re-export convergence types
pub use convergence::{
    ConvergenceCriteria, ConvergenceMetrics, ConvergenceResult, ConvergenceTester,
};

// Re-export escalation types
pub use escalation::{
    EscalationReason, EscalationReport, EscalationReporter, ReviewerPosition, TradeOff,
};

// Re-export precedent-memory types
pub use memory::{
    CaseOutcome, InMemoryPrecedentStore, OutcomeStatus, PrecedentCase, PrecedentRecall,
    PrecedentRetriever, PrecedentStore, RetrievalError,
};

// Re-export rating-mechanism types
pub use rater::{
    Exchange, FailingRater, RaterError, RatingMechanism, RetryPolicy, RetryingRater, ScriptedRater,
};

// Re-export audit types
pub use events::{AuditLog, AuditRecord, PanelEvent};

// Re-export orchestrator types
pub use orchestrator::{PanelConfig, PanelOrchestrator, RoundOutcome, REVIEWER_ROSTER};

// Re-export state types
pub use proposal::Proposal;
pub use state::PanelState;
