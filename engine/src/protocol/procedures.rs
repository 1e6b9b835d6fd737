//! The five negotiation procedures, one per conflict pattern.
//!
//! Thresholds are fixed per protocol. Concessions are deliberately small so
//! a negotiation that starts far from its threshold exhausts its iterations
//! and escalates rather than converging artificially.

use crate::escalation::TradeOff;
use crate::proposal::{metric, Proposal};
use crate::registry::RatingRegistry;
use crate::tension::ProtocolId;

use super::{Assessment, NegotiationProcedure};

fn rejected(measured: f64, threshold: f64, summary: String, trade_offs: Vec<TradeOff>) -> Assessment {
    Assessment {
        accepted: false,
        measured,
        threshold,
        summary,
        trade_offs,
    }
}

/// Tier-1 values conflict: non-automatable, always escalates.
pub struct ValuesConflictProcedure;

impl NegotiationProcedure for ValuesConflictProcedure {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::ValuesConflict
    }

    fn assess(&self, _proposal: &Proposal, _registry: &RatingRegistry) -> Assessment {
        rejected(
            0.0,
            0.0,
            "values conflicts are never negotiated".to_string(),
            vec![],
        )
    }

    fn concede(&self, _proposal: &mut Proposal, _iteration: u32) {
        // Never called: the engine escalates tier-1 tensions before the loop.
    }
}

/// Jurisdiction vs cost: the revenue premium must cover the risk-adjusted
/// compliance cost with a 15% margin.
pub struct JurisdictionCostProcedure;

impl JurisdictionCostProcedure {
    const THRESHOLD: f64 = 1.15;
}

impl NegotiationProcedure for JurisdictionCostProcedure {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::JurisdictionCost
    }

    fn assess(&self, proposal: &Proposal, _registry: &RatingRegistry) -> Assessment {
        let premium = proposal.metric(metric::REVENUE_PREMIUM);
        let cost = proposal.metric(metric::RISK_ADJUSTED_COST);
        if cost <= 0.0 {
            return rejected(
                0.0,
                Self::THRESHOLD,
                "risk_adjusted_cost metric missing or zero".to_string(),
                vec![TradeOff::new("revenue_premium", premium)],
            );
        }

        let ratio = premium / cost;
        Assessment {
            accepted: ratio >= Self::THRESHOLD,
            measured: ratio,
            threshold: Self::THRESHOLD,
            summary: format!(
                "revenue premium {:.2} vs risk-adjusted cost {:.2} (ratio {:.3})",
                premium, cost, ratio
            ),
            trade_offs: vec![
                TradeOff::new("revenue_premium", premium),
                TradeOff::new("risk_adjusted_cost", cost),
                TradeOff::new("premium_to_cost_ratio", ratio),
            ],
        }
    }

    fn concede(&self, proposal: &mut Proposal, _iteration: u32) {
        // Narrow the jurisdictional footprint: less premium, much less risk.
        proposal.scale_metric(metric::REVENUE_PREMIUM, 0.98);
        proposal.scale_metric(metric::RISK_ADJUSTED_COST, 0.88);
    }
}

/// Carbon vs budget: the mitigation budget must absorb the carbon delta with
/// 15% headroom.
pub struct CarbonMitigationProcedure;

impl CarbonMitigationProcedure {
    const THRESHOLD: f64 = 0.85;
}

impl NegotiationProcedure for CarbonMitigationProcedure {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::CarbonMitigation
    }

    fn assess(&self, proposal: &Proposal, _registry: &RatingRegistry) -> Assessment {
        let delta = proposal.metric(metric::CARBON_DELTA);
        let budget = proposal.metric(metric::MITIGATION_BUDGET);
        if budget <= 0.0 {
            return rejected(
                f64::INFINITY,
                Self::THRESHOLD,
                "mitigation_budget metric missing or zero".to_string(),
                vec![TradeOff::new("carbon_delta", delta)],
            );
        }

        let ratio = delta / budget;
        Assessment {
            accepted: ratio <= Self::THRESHOLD,
            measured: ratio,
            threshold: Self::THRESHOLD,
            summary: format!(
                "carbon delta {:.2} vs mitigation budget {:.2} (ratio {:.3})",
                delta, budget, ratio
            ),
            trade_offs: vec![
                TradeOff::new("carbon_delta", delta),
                TradeOff::new("mitigation_budget", budget),
                TradeOff::new("delta_to_budget_ratio", ratio),
            ],
        }
    }

    fn concede(&self, proposal: &mut Proposal, _iteration: u32) {
        proposal.scale_metric(metric::MITIGATION_BUDGET, 1.10);
        proposal.scale_metric(metric::CARBON_DELTA, 0.97);
    }
}

/// Timeline vs return: the return recomputed at the revised timeline must
/// clear a 12% hurdle.
pub struct TimelineReturnProcedure;

impl TimelineReturnProcedure {
    const THRESHOLD: f64 = 0.12;
}

impl NegotiationProcedure for TimelineReturnProcedure {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::TimelineReturn
    }

    fn assess(&self, proposal: &Proposal, _registry: &RatingRegistry) -> Assessment {
        let timeline = proposal.metric(metric::TIMELINE_MONTHS);
        let baseline = proposal.metric(metric::BASELINE_MONTHS);
        let projected = proposal.metric(metric::PROJECTED_RETURN);
        if timeline <= 0.0 || baseline <= 0.0 {
            return rejected(
                0.0,
                Self::THRESHOLD,
                "timeline metrics missing or zero".to_string(),
                vec![TradeOff::new("projected_return", projected)],
            );
        }

        // A stretched timeline dilutes the projected return proportionally.
        let recomputed = projected * (baseline / timeline);
        Assessment {
            accepted: recomputed >= Self::THRESHOLD,
            measured: recomputed,
            threshold: Self::THRESHOLD,
            summary: format!(
                "return {:.3} recomputed at {:.1} months (baseline {:.1})",
                recomputed, timeline, baseline
            ),
            trade_offs: vec![
                TradeOff::new("timeline_months", timeline),
                TradeOff::new("baseline_months", baseline),
                TradeOff::new("recomputed_return", recomputed),
            ],
        }
    }

    fn concede(&self, proposal: &mut Proposal, _iteration: u32) {
        proposal.scale_metric(metric::TIMELINE_MONTHS, 0.94);
    }
}

/// Demand vs capacity: projected demand must cover the capacity expansion
/// cost 1.25×.
pub struct DemandCapacityProcedure;

impl DemandCapacityProcedure {
    const THRESHOLD: f64 = 1.25;
}

impl NegotiationProcedure for DemandCapacityProcedure {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::DemandCapacity
    }

    fn assess(&self, proposal: &Proposal, _registry: &RatingRegistry) -> Assessment {
        let demand = proposal.metric(metric::PROJECTED_DEMAND);
        let cost = proposal.metric(metric::CAPACITY_COST);
        if cost <= 0.0 {
            return rejected(
                0.0,
                Self::THRESHOLD,
                "capacity_cost metric missing or zero".to_string(),
                vec![TradeOff::new("projected_demand", demand)],
            );
        }

        let coverage = demand / cost;
        Assessment {
            accepted: coverage >= Self::THRESHOLD,
            measured: coverage,
            threshold: Self::THRESHOLD,
            summary: format!(
                "projected demand {:.2} vs capacity cost {:.2} (coverage {:.3})",
                demand, cost, coverage
            ),
            trade_offs: vec![
                TradeOff::new("projected_demand", demand),
                TradeOff::new("capacity_cost", cost),
                TradeOff::new("demand_coverage", coverage),
            ],
        }
    }

    fn concede(&self, proposal: &mut Proposal, iteration: u32) {
        // Early concessions phase the build-out; later ones trim scope harder.
        let factor = if iteration <= 1 { 0.95 } else { 0.90 };
        proposal.scale_metric(metric::CAPACITY_COST, factor);
    }
}
