//! PanelState — the Registry / Tension-set / Proposal triple.
//!
//! There is no shared mutable state outside this triple; it is owned by the
//! orchestrator and threaded explicitly through every call.

use serde::{Deserialize, Serialize};

use crate::proposal::Proposal;
use crate::registry::RatingRegistry;
use crate::tension::{Tension, TensionStatus};

/// Mutable engine state for one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelState {
    /// Latest rating per reviewer.
    pub registry: RatingRegistry,
    /// All tensions detected this debate, terminal ones included.
    pub tensions: Vec<Tension>,
    /// The proposal under review.
    pub proposal: Proposal,
}

impl PanelState {
    /// Create state for a fresh proposal.
    pub fn new(proposal: Proposal) -> Self {
        Self {
            registry: RatingRegistry::new(),
            tensions: Vec::new(),
            proposal,
        }
    }

    /// Find a tension by id.
    pub fn tension(&self, id: &str) -> Option<&Tension> {
        self.tensions.iter().find(|t| t.id == id)
    }

    /// Find a tension by id, mutably.
    pub fn tension_mut(&mut self, id: &str) -> Option<&mut Tension> {
        self.tensions.iter_mut().find(|t| t.id == id)
    }

    /// Whether all of a tension's dependencies reached a terminal status.
    /// Unknown dependency ids count as satisfied.
    pub fn deps_satisfied(&self, tension: &Tension) -> bool {
        tension.depends_on.iter().all(|dep| {
            self.tension(dep)
                .map(|t| t.status.is_terminal())
                .unwrap_or(true)
        })
    }

    /// Promote blocked tensions whose dependencies are now satisfied to
    /// tier 3 / active. Returns the promoted ids.
    pub fn promote_unblocked(&mut self) -> Vec<String> {
        let ready: Vec<String> = self
            .tensions
            .iter()
            .filter(|t| t.status == TensionStatus::Blocked && self.deps_satisfied(t))
            .map(|t| t.id.clone())
            .collect();

        for id in &ready {
            if let Some(t) = self.tension_mut(id) {
                t.status = TensionStatus::Active;
                t.priority_tier = 3;
            }
        }
        ready
    }

    /// Tensions that have not reached a terminal status.
    pub fn active_tensions(&self) -> Vec<&Tension> {
        self.tensions
            .iter()
            .filter(|t| !t.status.is_terminal())
            .collect()
    }

    /// Move terminal tensions out of the working set, returning them for the
    /// orchestrator's history log.
    pub fn drain_terminal(&mut self) -> Vec<Tension> {
        let (terminal, live): (Vec<_>, Vec<_>) = self
            .tensions
            .drain(..)
            .partition(|t| t.status.is_terminal());
        self.tensions = live;
        terminal
    }
}
