//! Panel orchestrator — wires the pipeline into one debate round.
//!
//! detect → prioritize → recall precedents → negotiate → test convergence.
//! The orchestrator owns the state triple and the audit log; everything else
//! is threaded through explicitly.

use anyhow::Context;
use tracing::{info, warn};

use crate::convergence::{ConvergenceCriteria, ConvergenceResult, ConvergenceTester};
use crate::escalation::{EscalationReport, EscalationReporter};
use crate::events::{AuditLog, PanelEvent};
use crate::memory::{PrecedentRecall, PrecedentRetriever, PrecedentStore};
use crate::proposal::Proposal;
use crate::protocol::{EngineConfig, ProtocolEngine};
use crate::rater::RatingMechanism;
use crate::state::PanelState;
use crate::tension::{
    PrioritizerConfig, Resolution, Tension, TensionDetector, TensionPrioritizer,
};

/// The fixed reviewer roster.
pub const REVIEWER_ROSTER: [&str; 6] = [
    "legal",
    "finance",
    "sustainability",
    "operations",
    "market",
    "ethics",
];

/// Knobs for a whole panel run.
#[derive(Debug, Clone, Default)]
pub struct PanelConfig {
    /// Protocol-engine bounds.
    pub engine: EngineConfig,
    /// Dependency-graph behaviour.
    pub prioritizer: PrioritizerConfig,
    /// Convergence thresholds.
    pub criteria: ConvergenceCriteria,
}

/// Everything one round produced.
#[derive(Debug)]
pub struct RoundOutcome {
    /// Tensions resolved this round.
    pub resolutions: Vec<Resolution>,
    /// Escalation reports, including a convergence-failure report when the
    /// final registry did not converge.
    pub escalations: Vec<EscalationReport>,
    /// The convergence verdict over the final registry.
    pub convergence: ConvergenceResult,
    /// What the precedent memory contributed.
    pub precedents: PrecedentRecall,
    /// Negotiation iterations consumed against the global ceiling.
    pub rounds_used: u32,
}

/// Runs debate rounds over an owned state triple.
pub struct PanelOrchestrator {
    detector: TensionDetector,
    prioritizer: TensionPrioritizer,
    engine: ProtocolEngine,
    tester: ConvergenceTester,
    reporter: EscalationReporter,
    retriever: PrecedentRetriever,
    /// The Registry / Tension-set / Proposal triple.
    pub state: PanelState,
    /// Append-only event log for the whole run.
    pub audit: AuditLog,
    /// Terminal tensions from previous rounds.
    pub history: Vec<Tension>,
}

impl PanelOrchestrator {
    /// Create an orchestrator with default config for a fresh proposal.
    pub fn new(proposal: Proposal) -> Self {
        Self::with_config(proposal, PanelConfig::default())
    }

    /// Create with explicit config.
    pub fn with_config(proposal: Proposal, config: PanelConfig) -> Self {
        Self {
            detector: TensionDetector::new(),
            prioritizer: TensionPrioritizer::with_config(config.prioritizer),
            engine: ProtocolEngine::with_config(config.engine),
            tester: ConvergenceTester::new(config.criteria),
            reporter: EscalationReporter::new(),
            retriever: PrecedentRetriever::new(),
            state: PanelState::new(proposal),
            audit: AuditLog::new(),
            history: Vec::new(),
        }
    }

    /// Collect one rating per roster reviewer into the registry.
    ///
    /// Initial ratings are mandatory, so a rating-mechanism failure here
    /// aborts the round rather than escalating a tension.
    pub async fn collect_ratings(&mut self, rater: &dyn RatingMechanism) -> anyhow::Result<()> {
        for reviewer in REVIEWER_ROSTER {
            let rating = rater
                .evaluate(reviewer, &self.state.proposal, &[])
                .await
                .with_context(|| format!("initial rating from {reviewer}"))?;
            self.audit.append(PanelEvent::RatingRecorded {
                reviewer_id: rating.reviewer_id.clone(),
                verdict: rating.verdict.to_string(),
                confidence: rating.confidence,
                proposal_version: rating.proposal_version,
            });
            self.state.registry.record(rating);
        }
        Ok(())
    }

    /// Run one full round over the current registry.
    pub async fn run_round(
        &mut self,
        rater: &dyn RatingMechanism,
        store: &dyn PrecedentStore,
    ) -> RoundOutcome {
        // Detect new tensions over the latest ratings.
        let detected = self
            .detector
            .scan(&self.state.registry, &self.state.tensions);
        for tension in &detected {
            self.audit.append(PanelEvent::TensionDetected {
                tension_id: tension.id.clone(),
                protocol: tension.protocol.to_string(),
                reviewers: tension.reviewers.clone(),
                trigger_reason: tension.trigger_reason.clone(),
            });
        }
        info!(count = detected.len(), "tensions detected");
        self.state.tensions.extend(detected);

        // Tier and order them.
        let queue = self
            .prioritizer
            .prioritize(&mut self.state.tensions, &self.state.registry);
        for id in &queue {
            if let Some(tension) = self.state.tension(id) {
                self.audit.append(PanelEvent::TensionPrioritized {
                    tension_id: tension.id.clone(),
                    tier: tension.priority_tier,
                    depends_on: tension.depends_on.iter().cloned().collect(),
                });
            }
        }

        // Recall precedents once per round; a failing store degrades to a
        // cold start rather than aborting the negotiations.
        let precedents = match self
            .retriever
            .recall(store, &self.state.proposal.content)
            .await
        {
            Ok(recall) => recall,
            Err(e) => {
                warn!(error = %e, "precedent recall failed, treating as cold start");
                PrecedentRecall::cold_start()
            }
        };

        // Negotiate.
        let outcome = self
            .engine
            .process(queue, &mut self.state, rater, &precedents, &mut self.audit)
            .await;

        self.history.extend(self.state.drain_terminal());

        // Convergence over the final registry.
        let convergence = self.tester.evaluate(&self.state.registry);
        self.audit.append(PanelEvent::ConvergenceEvaluated {
            converged: convergence.converged,
            failed_criteria: convergence.failed_criteria.clone(),
        });

        let mut escalations = outcome.escalations;
        if !convergence.converged {
            escalations.push(self.reporter.for_convergence(
                &convergence,
                &self.state.registry,
                &precedents.cases,
            ));
        }

        RoundOutcome {
            resolutions: outcome.resolutions,
            escalations,
            convergence,
            precedents,
            rounds_used: outcome.rounds_used,
        }
    }
}
