//! Protocol Engine — drains the priority queue, one bounded negotiation per
//! tension.
//!
//! Strictly sequential: no two tensions are resolved concurrently, because
//! dependency correctness requires it (intersecting reviewer sets). The only
//! suspension points are the calls into the external rating mechanism.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::escalation::{EscalationReason, EscalationReporter, EscalationReport, TradeOff};
use crate::events::{AuditLog, PanelEvent};
use crate::memory::PrecedentRecall;
use crate::protocol::procedure_for;
use crate::rater::{Exchange, RatingMechanism};
use crate::state::PanelState;
use crate::tension::{Resolution, TensionStatus};

/// Termination bounds for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Re-insertion cap multiplier: a tension may be re-enqueued behind its
    /// dependencies at most `multiplier × max(max_iterations, 1)` times.
    pub reinsertion_multiplier: u32,
    /// Global debate-round ceiling across all tensions. Exceeding it
    /// force-escalates everything still active.
    pub max_total_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reinsertion_multiplier: 3,
            max_total_rounds: 12,
        }
    }
}

/// What the engine produced while draining the queue.
#[derive(Debug, Default)]
pub struct EngineOutcome {
    /// Accepted negotiations.
    pub resolutions: Vec<Resolution>,
    /// Reports for every escalated tension.
    pub escalations: Vec<EscalationReport>,
    /// Negotiation iterations consumed (counts against the global ceiling).
    pub rounds_used: u32,
}

/// Executes negotiation procedures over the priority-ordered queue.
#[derive(Debug, Clone, Default)]
pub struct ProtocolEngine {
    config: EngineConfig,
    reporter: EscalationReporter,
}

impl ProtocolEngine {
    /// Create an engine with default bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom bounds.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            reporter: EscalationReporter::new(),
        }
    }

    /// Drain the queue, mutating the state triple via the rating mechanism.
    ///
    /// A rating-mechanism failure escalates the current tension and
    /// processing continues with the next one; there is no global abort.
    pub async fn process(
        &self,
        queue: Vec<String>,
        state: &mut PanelState,
        rater: &dyn RatingMechanism,
        precedents: &PrecedentRecall,
        audit: &mut AuditLog,
    ) -> EngineOutcome {
        let mut pending: VecDeque<String> = queue.into();
        let mut reinsertions: HashMap<String, u32> = HashMap::new();
        let mut outcome = EngineOutcome::default();
        // Negotiation context: explicit, ordered, cleared at revision boundaries.
        let mut context: Vec<Exchange> = Vec::new();

        while let Some(id) = pending.pop_front() {
            let Some(tension) = state.tension(&id) else {
                continue;
            };
            if tension.status.is_terminal() {
                // Already settled as a side effect of a dependency.
                continue;
            }
            let protocol = tension.protocol;
            let max_iterations = tension.max_iterations;

            // Global overload: force-escalate this and everything behind it.
            if outcome.rounds_used >= self.config.max_total_rounds {
                warn!(tension_id = %id, "debate-round ceiling reached, force-escalating");
                self.escalate(
                    state,
                    &id,
                    EscalationReason::ComplexityOverload {
                        rounds_used: outcome.rounds_used,
                        ceiling: self.config.max_total_rounds,
                    },
                    vec![],
                    precedents,
                    audit,
                    &mut outcome,
                );
                continue;
            }

            // Tier 1 bypasses the loop entirely: fatal by design, iteration 0.
            if protocol.is_values_conflict() {
                self.escalate(
                    state,
                    &id,
                    EscalationReason::ValuesConflict {
                        protocol: protocol.to_string(),
                    },
                    vec![],
                    precedents,
                    audit,
                    &mut outcome,
                );
                continue;
            }

            // Dependencies still pending: block and re-enqueue, bounded.
            let snapshot = state.tension(&id).expect("tension present").clone();
            if !state.deps_satisfied(&snapshot) {
                let cap = self.config.reinsertion_multiplier * max_iterations.max(1);
                let count = reinsertions.entry(id.clone()).or_insert(0);
                *count += 1;
                if *count > cap {
                    let reinserted = *count;
                    self.escalate(
                        state,
                        &id,
                        EscalationReason::BlockedDeadlock {
                            reinsertions: reinserted,
                            cap,
                        },
                        vec![],
                        precedents,
                        audit,
                        &mut outcome,
                    );
                } else {
                    if let Some(t) = state.tension_mut(&id) {
                        t.status = TensionStatus::Blocked;
                    }
                    audit.append(PanelEvent::TensionBlocked {
                        tension_id: id.clone(),
                        reinsertions: *count,
                    });
                    pending.push_back(id);
                }
                continue;
            }

            if let Some(t) = state.tension_mut(&id) {
                t.status = TensionStatus::Active;
            }

            // The generic bounded negotiation loop.
            let procedure = procedure_for(protocol);
            loop {
                let assessment = procedure.assess(&state.proposal, &state.registry);
                let iteration = state.tension(&id).expect("tension present").iteration;
                audit.append(PanelEvent::TensionIterated {
                    tension_id: id.clone(),
                    iteration,
                    measured: assessment.measured,
                    threshold: assessment.threshold,
                    accepted: assessment.accepted,
                });

                if assessment.accepted {
                    let resolution = Resolution {
                        tension_id: id.clone(),
                        protocol,
                        measured: assessment.measured,
                        threshold: assessment.threshold,
                        iterations: iteration,
                        summary: assessment.summary.clone(),
                    };
                    if let Some(t) = state.tension_mut(&id) {
                        t.mark_resolved();
                    }
                    info!(tension_id = %id, protocol = %protocol, "tension resolved");
                    audit.append(PanelEvent::TensionResolved {
                        tension_id: id.clone(),
                        iterations: iteration,
                        summary: assessment.summary,
                    });
                    outcome.resolutions.push(resolution);
                    self.promote(state, audit);
                    break;
                }

                if iteration >= max_iterations {
                    self.escalate(
                        state,
                        &id,
                        EscalationReason::IterationExhaustion {
                            iterations: iteration,
                            max_iterations,
                        },
                        assessment.trade_offs,
                        precedents,
                        audit,
                        &mut outcome,
                    );
                    break;
                }

                // Rejected with iterations left: concede, revise, re-evaluate.
                let next_iteration = iteration + 1;
                if let Some(t) = state.tension_mut(&id) {
                    t.iteration = next_iteration;
                }
                outcome.rounds_used += 1;
                procedure.concede(&mut state.proposal, next_iteration);
                let version = state.proposal.revise();
                audit.append(PanelEvent::ProposalRevised {
                    version,
                    by_protocol: protocol.to_string(),
                });
                context.clear();

                let reviewers = state
                    .tension(&id)
                    .expect("tension present")
                    .reviewers
                    .clone();
                let mut aborted = false;
                for reviewer in &reviewers {
                    match rater.evaluate(reviewer, &state.proposal, &context).await {
                        Ok(rating) => {
                            audit.append(PanelEvent::RatingRecorded {
                                reviewer_id: rating.reviewer_id.clone(),
                                verdict: rating.verdict.to_string(),
                                confidence: rating.confidence,
                                proposal_version: rating.proposal_version,
                            });
                            context.push(Exchange::from_rating(&rating));
                            state.registry.record(rating);
                        }
                        Err(e) => {
                            warn!(tension_id = %id, reviewer, error = %e, "rating call exhausted");
                            self.escalate(
                                state,
                                &id,
                                EscalationReason::ProviderExhausted {
                                    reviewer_id: reviewer.clone(),
                                    detail: e.to_string(),
                                },
                                vec![],
                                precedents,
                                audit,
                                &mut outcome,
                            );
                            aborted = true;
                            break;
                        }
                    }
                }
                if aborted {
                    break;
                }
            }
        }

        outcome
    }

    /// Mark a tension escalated, emit its report, and unblock dependents.
    #[allow(clippy::too_many_arguments)]
    fn escalate(
        &self,
        state: &mut PanelState,
        id: &str,
        reason: EscalationReason,
        trade_offs: Vec<TradeOff>,
        precedents: &PrecedentRecall,
        audit: &mut AuditLog,
        outcome: &mut EngineOutcome,
    ) {
        if let Some(t) = state.tension_mut(id) {
            t.mark_escalated();
        }
        let Some(tension) = state.tension(id) else {
            return;
        };
        let report = self.reporter.for_tension(
            tension,
            reason.clone(),
            &state.registry,
            trade_offs,
            &precedents.cases,
        );
        audit.append(PanelEvent::TensionEscalated {
            tension_id: id.to_string(),
            reason_code: reason.code().to_string(),
        });
        outcome.escalations.push(report);
        self.promote(state, audit);
    }

    /// Promote blocked tensions whose dependencies just became terminal.
    fn promote(&self, state: &mut PanelState, audit: &mut AuditLog) {
        for id in state.promote_unblocked() {
            audit.append(PanelEvent::TensionPrioritized {
                tension_id: id,
                tier: 3,
                depends_on: vec![],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{metric, Proposal};
    use crate::rater::{FailingRater, ScriptedRater};
    use crate::registry::{Rating, Verdict};
    use crate::tension::{ProtocolId, Tension};

    fn cold_precedents() -> PrecedentRecall {
        PrecedentRecall::cold_start()
    }

    fn state_with(proposal: Proposal, tensions: Vec<Tension>) -> PanelState {
        let mut state = PanelState::new(proposal);
        state.tensions = tensions;
        state
    }

    fn scripted_accepts(reviewers: &[&str]) -> ScriptedRater {
        let rater = ScriptedRater::new();
        for r in reviewers {
            rater.push_response(r, Rating::new(r, Verdict::Accept, 0.85, "revision works"));
        }
        rater
    }

    #[tokio::test]
    async fn test_immediate_acceptance_resolves_without_iterating() {
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 130.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0);
        let tension = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let id = tension.id.clone();
        let mut state = state_with(proposal, vec![tension]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![id.clone()],
                &mut state,
                &scripted_accepts(&["legal", "finance"]),
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.resolutions.len(), 1);
        assert_eq!(outcome.resolutions[0].iterations, 0);
        assert_eq!(outcome.rounds_used, 0);
        assert_eq!(state.tension(&id).unwrap().status, TensionStatus::Resolved);
        assert_eq!(state.proposal.version, 1); // no revision requested
    }

    #[tokio::test]
    async fn test_concessions_reach_acceptance() {
        // Ratio starts at 1.10; two concessions (×0.98/0.88 each) push it
        // past 1.15.
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 110.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0);
        let tension = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let id = tension.id.clone();
        let mut state = state_with(proposal, vec![tension]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![id.clone()],
                &mut state,
                &scripted_accepts(&["legal", "finance"]),
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.resolutions.len(), 1);
        assert!(outcome.resolutions[0].iterations >= 1);
        assert!(state.proposal.version > 1);
        // Reviewers re-evaluated the revision.
        assert_eq!(state.registry.get("legal").unwrap().verdict, Verdict::Accept);
    }

    #[tokio::test]
    async fn test_iteration_exhaustion_escalates() {
        // Ratio 0.50 cannot reach 1.15 within two concessions.
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 50.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0);
        let tension = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let id = tension.id.clone();
        let mut state = state_with(proposal, vec![tension]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![id.clone()],
                &mut state,
                &scripted_accepts(&["legal", "finance"]),
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert!(outcome.resolutions.is_empty());
        assert_eq!(outcome.escalations.len(), 1);
        assert_eq!(outcome.escalations[0].reason.code(), "iteration_exhaustion");
        assert!(!outcome.escalations[0].trade_offs.is_empty());
        assert_eq!(state.tension(&id).unwrap().status, TensionStatus::Escalated);
        assert_eq!(state.tension(&id).unwrap().iteration, 2);
    }

    #[tokio::test]
    async fn test_values_conflict_escalates_at_iteration_zero() {
        let tension = Tension::new(ProtocolId::ValuesConflict, "ethics vs legal", 1);
        let id = tension.id.clone();
        let mut state = state_with(Proposal::new("p"), vec![tension]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![id.clone()],
                &mut state,
                &FailingRater, // must never be called
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.escalations.len(), 1);
        assert_eq!(outcome.escalations[0].reason.code(), "values_conflict");
        let t = state.tension(&id).unwrap();
        assert_eq!(t.status, TensionStatus::Escalated);
        assert_eq!(t.iteration, 0);
        assert_eq!(outcome.rounds_used, 0);
    }

    #[tokio::test]
    async fn test_provider_failure_escalates_and_continues() {
        // First tension needs a revision but the rater is dead; the second is
        // immediately acceptable and must still be processed.
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 50.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0)
            .with_metric(metric::PROJECTED_DEMAND, 130.0)
            .with_metric(metric::CAPACITY_COST, 100.0);
        let a = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let b = Tension::new(ProtocolId::DemandCapacity, "", 2);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut state = state_with(proposal, vec![a, b]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![a_id.clone(), b_id.clone()],
                &mut state,
                &FailingRater,
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.escalations.len(), 1);
        assert_eq!(outcome.escalations[0].reason.code(), "provider_exhausted");
        assert_eq!(state.tension(&a_id).unwrap().status, TensionStatus::Escalated);
        // No global abort: the demand tension still resolved.
        assert_eq!(outcome.resolutions.len(), 1);
        assert_eq!(state.tension(&b_id).unwrap().status, TensionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_dependent_tension_blocks_until_dependency_terminal() {
        // Queue deliberately places the dependent first so it must block and
        // re-enqueue behind its dependency.
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 130.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0)
            .with_metric(metric::CARBON_DELTA, 50.0)
            .with_metric(metric::MITIGATION_BUDGET, 100.0);
        let a = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let mut b = Tension::new(ProtocolId::CarbonMitigation, "", 2);
        b.depends_on.insert(a.id.clone());
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut state = state_with(proposal, vec![a, b]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![b_id.clone(), a_id.clone()],
                &mut state,
                &scripted_accepts(&["legal", "finance", "sustainability"]),
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.resolutions.len(), 2);
        // The dependent was observed blocked before its dependency settled.
        let blocked_seq = audit
            .records()
            .iter()
            .find(|r| matches!(&r.event, PanelEvent::TensionBlocked { tension_id, .. } if *tension_id == b_id))
            .map(|r| r.seq)
            .expect("dependent must block");
        let a_resolved_seq = audit
            .records()
            .iter()
            .find(|r| matches!(&r.event, PanelEvent::TensionResolved { tension_id, .. } if *tension_id == a_id))
            .map(|r| r.seq)
            .unwrap();
        let b_resolved_seq = audit
            .records()
            .iter()
            .find(|r| matches!(&r.event, PanelEvent::TensionResolved { tension_id, .. } if *tension_id == b_id))
            .map(|r| r.seq)
            .unwrap();
        assert!(blocked_seq < a_resolved_seq);
        assert!(a_resolved_seq < b_resolved_seq);
    }

    #[tokio::test]
    async fn test_deadlocked_dependency_force_escalates() {
        // The dependency is never queued, so the dependent re-inserts until
        // the cap trips.
        let proposal = Proposal::new("p")
            .with_metric(metric::CARBON_DELTA, 50.0)
            .with_metric(metric::MITIGATION_BUDGET, 100.0);
        let a = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let mut b = Tension::new(ProtocolId::CarbonMitigation, "", 2);
        b.depends_on.insert(a.id.clone());
        let b_id = b.id.clone();
        let mut state = state_with(proposal, vec![a, b]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![b_id.clone()],
                &mut state,
                &FailingRater,
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.escalations.len(), 1);
        assert_eq!(outcome.escalations[0].reason.code(), "blocked_deadlock");
        assert_eq!(state.tension(&b_id).unwrap().status, TensionStatus::Escalated);
    }

    #[tokio::test]
    async fn test_global_ceiling_force_escalates_remaining() {
        // Ceiling of zero rounds: the first tension needs a revision, which
        // immediately trips the overload path for it and everything queued.
        let proposal = Proposal::new("p")
            .with_metric(metric::REVENUE_PREMIUM, 50.0)
            .with_metric(metric::RISK_ADJUSTED_COST, 100.0)
            .with_metric(metric::PROJECTED_DEMAND, 130.0)
            .with_metric(metric::CAPACITY_COST, 100.0);
        let a = Tension::new(ProtocolId::JurisdictionCost, "", 1);
        let b = Tension::new(ProtocolId::DemandCapacity, "", 2);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut state = state_with(proposal, vec![a, b]);
        let mut audit = AuditLog::new();

        let engine = ProtocolEngine::with_config(EngineConfig {
            reinsertion_multiplier: 3,
            max_total_rounds: 0,
        });
        let outcome = engine
            .process(
                vec![a_id, b_id],
                &mut state,
                &scripted_accepts(&["legal", "finance", "market", "operations"]),
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert_eq!(outcome.escalations.len(), 2);
        assert!(outcome
            .escalations
            .iter()
            .all(|e| e.reason.code() == "complexity_overload"));
    }

    #[tokio::test]
    async fn test_side_effect_resolution_skips_tension() {
        let mut resolved = Tension::new(ProtocolId::DemandCapacity, "", 1);
        resolved.mark_resolved();
        let id = resolved.id.clone();
        let mut state = state_with(Proposal::new("p"), vec![resolved]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec![id],
                &mut state,
                &FailingRater,
                &cold_precedents(),
                &mut audit,
            )
            .await;

        assert!(outcome.resolutions.is_empty());
        assert!(outcome.escalations.is_empty());
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_queue_entry_is_ignored() {
        let mut state = state_with(Proposal::new("p"), vec![]);
        let mut audit = AuditLog::new();

        let outcome = ProtocolEngine::new()
            .process(
                vec!["t-ghost".to_string()],
                &mut state,
                &FailingRater,
                &cold_precedents(),
                &mut audit,
            )
            .await;
        assert!(outcome.escalations.is_empty());
    }
}
