//! Negotiation protocols — one bounded-iteration procedure per tension pattern.
//!
//! Procedures are selected by a lookup table keyed on ProtocolId (tagged
//! dispatch, no inheritance). Each procedure computes quantitative inputs
//! from the proposal's success metrics, compares them against a fixed
//! acceptance threshold, and models the concession a revised proposal would
//! carry.

pub mod engine;
pub mod procedures;

use crate::escalation::TradeOff;
use crate::proposal::Proposal;
use crate::registry::RatingRegistry;
use crate::tension::ProtocolId;

pub use engine::{EngineConfig, EngineOutcome, ProtocolEngine};

/// Outcome of one quantitative assessment step.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Whether the measurement clears the protocol's threshold.
    pub accepted: bool,
    /// The measured value.
    pub measured: f64,
    /// The fixed threshold it was compared against.
    pub threshold: f64,
    /// Human-readable summary of the comparison.
    pub summary: String,
    /// Quantified trade-offs backing an escalation report.
    pub trade_offs: Vec<TradeOff>,
}

/// A conflict-specific negotiation procedure.
pub trait NegotiationProcedure: Send + Sync {
    /// Which tension pattern this procedure resolves.
    fn protocol(&self) -> ProtocolId;

    /// Compute the protocol's quantitative inputs and compare them against
    /// its acceptance threshold.
    fn assess(&self, proposal: &Proposal, registry: &RatingRegistry) -> Assessment;

    /// Adjust the proposal's metrics the way the requested revision would.
    /// Called once per rejected iteration, before the version bump.
    fn concede(&self, proposal: &mut Proposal, iteration: u32);
}

/// Look up the procedure for a protocol.
pub fn procedure_for(protocol: ProtocolId) -> Box<dyn NegotiationProcedure> {
    match protocol {
        ProtocolId::ValuesConflict => Box::new(procedures::ValuesConflictProcedure),
        ProtocolId::JurisdictionCost => Box::new(procedures::JurisdictionCostProcedure),
        ProtocolId::CarbonMitigation => Box::new(procedures::CarbonMitigationProcedure),
        ProtocolId::TimelineReturn => Box::new(procedures::TimelineReturnProcedure),
        ProtocolId::DemandCapacity => Box::new(procedures::DemandCapacityProcedure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_table_covers_every_protocol() {
        for protocol in ProtocolId::ALL {
            assert_eq!(procedure_for(protocol).protocol(), protocol);
        }
    }
}
