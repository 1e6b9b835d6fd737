//! Escalation Reporter — structured, quantified reports for human review.
//!
//! Produced whenever a tension or the overall debate fails to resolve within
//! its limits. Write-once: consumed by an external human-review surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convergence::ConvergenceResult;
use crate::memory::PrecedentCase;
use crate::registry::{RatingRegistry, Verdict};
use crate::tension::Tension;

/// Why an escalation was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationReason {
    /// Tier-1 values conflict: non-automatable by policy, never negotiated.
    ValuesConflict { protocol: String },
    /// Protocol iterations exhausted without acceptance.
    IterationExhaustion { iterations: u32, max_iterations: u32 },
    /// The external rating mechanism failed mid-negotiation.
    ProviderExhausted { reviewer_id: String, detail: String },
    /// Dependencies never cleared within the re-insertion cap.
    BlockedDeadlock { reinsertions: u32, cap: u32 },
    /// Global debate-round ceiling exceeded.
    ComplexityOverload { rounds_used: u32, ceiling: u32 },
    /// The convergence test failed after the queue drained.
    ConvergenceFailed { criterion: String },
}

impl EscalationReason {
    /// Stable reason code for audit events and sinks.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValuesConflict { .. } => "values_conflict",
            Self::IterationExhaustion { .. } => "iteration_exhaustion",
            Self::ProviderExhausted { .. } => "provider_exhausted",
            Self::BlockedDeadlock { .. } => "blocked_deadlock",
            Self::ComplexityOverload { .. } => "complexity_overload",
            Self::ConvergenceFailed { .. } => "convergence_failed",
        }
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValuesConflict { protocol } => {
                write!(f, "values conflict ({}) is not automatable", protocol)
            }
            Self::IterationExhaustion {
                iterations,
                max_iterations,
            } => write!(
                f,
                "no acceptance after {}/{} negotiation iterations",
                iterations, max_iterations
            ),
            Self::ProviderExhausted {
                reviewer_id,
                detail,
            } => write!(f, "rating mechanism failed for {}: {}", reviewer_id, detail),
            Self::BlockedDeadlock { reinsertions, cap } => write!(
                f,
                "dependency deadlock after {} re-insertions (cap {})",
                reinsertions, cap
            ),
            Self::ComplexityOverload {
                rounds_used,
                ceiling,
            } => write!(
                f,
                "debate-round ceiling exceeded ({} of {})",
                rounds_used, ceiling
            ),
            Self::ConvergenceFailed { criterion } => {
                write!(f, "convergence failed on criterion {}", criterion)
            }
        }
    }
}

/// A reviewer's position captured at escalation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerPosition {
    pub reviewer_id: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: String,
}

/// A quantified trade-off supporting the escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOff {
    /// What was measured.
    pub label: String,
    /// The measured value.
    pub value: f64,
}

impl TradeOff {
    pub fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

/// Structured report handed to the human-review surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationReport {
    /// Tension the report concerns (None for a global convergence failure).
    pub tension_id: Option<String>,
    /// Why the escalation happened.
    pub reason: EscalationReason,
    /// Positions of the involved reviewers.
    pub positions: Vec<ReviewerPosition>,
    /// Quantified trade-offs at the point of failure.
    pub trade_offs: Vec<TradeOff>,
    /// Precedent cases supporting the recommendation.
    pub precedents: Vec<PrecedentCase>,
    /// Recommendation text for the human decision-maker.
    pub recommendation: String,
    /// When the report was produced.
    pub created_at: DateTime<Utc>,
}

/// Builds escalation reports from the registry and tension state.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationReporter;

impl EscalationReporter {
    pub fn new() -> Self {
        Self
    }

    /// Build a report for a failed tension.
    pub fn for_tension(
        &self,
        tension: &Tension,
        reason: EscalationReason,
        registry: &RatingRegistry,
        trade_offs: Vec<TradeOff>,
        precedents: &[PrecedentCase],
    ) -> EscalationReport {
        let positions = tension
            .reviewers
            .iter()
            .filter_map(|id| registry.get(id))
            .map(|r| ReviewerPosition {
                reviewer_id: r.reviewer_id.clone(),
                verdict: r.verdict,
                confidence: r.confidence,
                reasoning: r.reasoning.clone(),
            })
            .collect();

        let recommendation = match &reason {
            EscalationReason::ValuesConflict { .. } => format!(
                "Human adjudication required: {} pits a legal-minimum position against a \
                 reported ethical violation. Trigger: {}",
                tension.protocol, tension.trigger_reason
            ),
            EscalationReason::ProviderExhausted { reviewer_id, .. } => format!(
                "Negotiation of {} aborted: no rating could be obtained for {}. Re-run once \
                 the rating mechanism recovers or decide manually.",
                tension.protocol, reviewer_id
            ),
            other => format!(
                "Negotiation of {} did not reach acceptance ({}). Review the quantified \
                 trade-offs and decide manually.",
                tension.protocol, other
            ),
        };

        EscalationReport {
            tension_id: Some(tension.id.clone()),
            reason,
            positions,
            trade_offs,
            precedents: precedents.to_vec(),
            recommendation,
            created_at: Utc::now(),
        }
    }

    /// Build a report for a global convergence failure.
    pub fn for_convergence(
        &self,
        result: &ConvergenceResult,
        registry: &RatingRegistry,
        precedents: &[PrecedentCase],
    ) -> EscalationReport {
        let criterion = result
            .failed_criteria
            .first()
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let positions = registry
            .all()
            .map(|r| ReviewerPosition {
                reviewer_id: r.reviewer_id.clone(),
                verdict: r.verdict,
                confidence: r.confidence,
                reasoning: r.reasoning.clone(),
            })
            .collect();

        let trade_offs = vec![
            TradeOff::new("block_count", result.metrics.block_count as f64),
            TradeOff::new("warn_count", result.metrics.warn_count as f64),
            TradeOff::new("mean_confidence", result.metrics.mean_confidence),
            TradeOff::new("positive_fraction", result.metrics.positive_fraction),
        ];

        EscalationReport {
            tension_id: None,
            reason: EscalationReason::ConvergenceFailed {
                criterion: criterion.clone(),
            },
            positions,
            trade_offs,
            precedents: precedents.to_vec(),
            recommendation: format!(
                "Panel did not converge: first failing criterion was {}. Review the \
                 remaining positions and decide manually.",
                criterion
            ),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::{ConvergenceCriteria, ConvergenceTester};
    use crate::registry::Rating;
    use crate::tension::ProtocolId;

    fn registry() -> RatingRegistry {
        let mut r = RatingRegistry::new();
        r.record(Rating::new("legal", Verdict::Block, 0.9, "jurisdiction"));
        r.record(Rating::new("finance", Verdict::Block, 0.8, "cost"));
        r
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            EscalationReason::ValuesConflict {
                protocol: "values_conflict".to_string()
            }
            .code(),
            "values_conflict"
        );
        assert_eq!(
            EscalationReason::BlockedDeadlock {
                reinsertions: 7,
                cap: 6
            }
            .code(),
            "blocked_deadlock"
        );
        assert_eq!(
            EscalationReason::ComplexityOverload {
                rounds_used: 13,
                ceiling: 12
            }
            .code(),
            "complexity_overload"
        );
    }

    #[test]
    fn test_reason_serde_tagged() {
        let reason = EscalationReason::IterationExhaustion {
            iterations: 2,
            max_iterations: 2,
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("\"kind\":\"iteration_exhaustion\""), "{json}");
        let parsed: EscalationReason = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reason);
    }

    #[test]
    fn test_tension_report_captures_positions() {
        let tension = Tension::new(ProtocolId::JurisdictionCost, "both blocked", 1);
        let report = EscalationReporter::new().for_tension(
            &tension,
            EscalationReason::IterationExhaustion {
                iterations: 2,
                max_iterations: 2,
            },
            &registry(),
            vec![TradeOff::new("premium_to_cost_ratio", 1.02)],
            &[],
        );

        assert_eq!(report.tension_id.as_deref(), Some(tension.id.as_str()));
        assert_eq!(report.positions.len(), 2);
        assert_eq!(report.trade_offs.len(), 1);
        assert!(report.recommendation.contains("jurisdiction_cost"));
    }

    #[test]
    fn test_tension_report_skips_missing_positions() {
        let tension = Tension::new(ProtocolId::DemandCapacity, "", 1);
        let report = EscalationReporter::new().for_tension(
            &tension,
            EscalationReason::ProviderExhausted {
                reviewer_id: "market".to_string(),
                detail: "all providers exhausted".to_string(),
            },
            &registry(), // holds neither market nor operations
            vec![],
            &[],
        );
        assert!(report.positions.is_empty());
        assert!(report.recommendation.contains("market"));
    }

    #[test]
    fn test_convergence_report() {
        let reg = registry();
        let result = ConvergenceTester::new(ConvergenceCriteria::default()).evaluate(&reg);
        assert!(!result.converged);

        let report = EscalationReporter::new().for_convergence(&result, &reg, &[]);
        assert!(report.tension_id.is_none());
        assert_eq!(
            report.reason,
            EscalationReason::ConvergenceFailed {
                criterion: "blocking_concerns".to_string()
            }
        );
        assert_eq!(report.positions.len(), 2);
        assert!(report
            .trade_offs
            .iter()
            .any(|t| t.label == "block_count" && t.value == 2.0));
    }

    #[test]
    fn test_reason_display() {
        let reason = EscalationReason::BlockedDeadlock {
            reinsertions: 7,
            cap: 6,
        };
        assert!(reason.to_string().contains("7 re-insertions"));
    }
}
