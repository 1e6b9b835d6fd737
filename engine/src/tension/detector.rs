//! Tension Detector — scans the registry for known conflict patterns.
//!
//! Each pattern is a reviewer pair plus a predicate over their verdicts and
//! stated concerns. Detection has no side effects beyond emitting fresh
//! Tension records and is idempotent over a registry snapshot: a pattern
//! with an already-active tension is not re-instantiated. Missing ratings
//! silently skip the pattern.

use tracing::debug;

use crate::registry::{Rating, RatingRegistry, Verdict};
use crate::tension::types::{ProtocolId, Tension};

/// Scans the rating registry and instantiates tensions for matched patterns.
#[derive(Debug, Default)]
pub struct TensionDetector {
    next_seq: u64,
}

impl TensionDetector {
    /// Create a detector with its detection sequence at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the registry, skipping protocols already present in `active`.
    pub fn scan(&mut self, registry: &RatingRegistry, active: &[Tension]) -> Vec<Tension> {
        let mut detected = Vec::new();

        for protocol in ProtocolId::ALL {
            if active
                .iter()
                .any(|t| t.protocol == protocol && !t.status.is_terminal())
            {
                continue;
            }

            let [first_id, second_id] = [protocol.reviewers()[0], protocol.reviewers()[1]];
            let (Some(first), Some(second)) = (registry.get(first_id), registry.get(second_id))
            else {
                // Pattern-skip: reviewers without ratings are not an error.
                continue;
            };

            if let Some(reason) = match_pattern(protocol, first, second) {
                self.next_seq += 1;
                let tension = Tension::new(protocol, &reason, self.next_seq);
                debug!(
                    tension_id = %tension.id,
                    protocol = %protocol,
                    reason = %reason,
                    "tension detected"
                );
                detected.push(tension);
            }
        }

        detected
    }
}

/// Evaluate a single pattern's predicate; returns the trigger reason on match.
fn match_pattern(protocol: ProtocolId, first: &Rating, second: &Rating) -> Option<String> {
    let contested = |r: &Rating| matches!(r.verdict, Verdict::Block | Verdict::Warn);

    match protocol {
        ProtocolId::ValuesConflict => {
            // Ethics blocks on a violation while legal holds a positive
            // minimum-compliance position.
            if first.verdict == Verdict::Block
                && first.cites("violation")
                && second.verdict.is_positive()
                && second.cites("complian")
            {
                Some(format!(
                    "ethics blocks on an ethical violation while legal accepts on minimum \
                     compliance: {}",
                    first.reasoning
                ))
            } else {
                None
            }
        }
        ProtocolId::JurisdictionCost => {
            if first.verdict == Verdict::Block
                && first.cites("jurisdiction")
                && second.verdict == Verdict::Block
                && second.cites("cost")
            {
                Some("legal blocks on jurisdiction while finance blocks on cost".to_string())
            } else {
                None
            }
        }
        ProtocolId::CarbonMitigation => {
            if contested(first)
                && first.cites("carbon")
                && contested(second)
                && second.cites("budget")
            {
                Some(
                    "sustainability contests the carbon delta while finance contests the \
                     mitigation budget"
                        .to_string(),
                )
            } else {
                None
            }
        }
        ProtocolId::TimelineReturn => {
            if contested(first)
                && (first.cites("timeline") || first.cites("schedule"))
                && contested(second)
                && second.cites("return")
            {
                Some(
                    "operations contests the timeline while finance contests the projected return"
                        .to_string(),
                )
            } else {
                None
            }
        }
        ProtocolId::DemandCapacity => {
            if contested(first)
                && first.cites("demand")
                && contested(second)
                && second.cites("capacity")
            {
                Some(
                    "market contests projected demand while operations contests capacity"
                        .to_string(),
                )
            } else {
                None
            }
        }
    }
}
