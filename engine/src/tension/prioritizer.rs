//! Tension Prioritizer — dependency inference, tier assignment, resolution order.
//!
//! Two tensions are mutually dependent when their reviewer sets intersect: a
//! reviewer cannot revise its position under two independent negotiations.
//! With transitive blocking enabled (the default), the shared-reviewer
//! relation is widened to connected components of the tension graph, so a
//! chain A–B–C blocks C on A even when A and C share nobody directly.

use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::registry::RatingRegistry;
use crate::tension::types::Tension;

/// Configuration for dependency inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizerConfig {
    /// Widen shared-reviewer dependency to graph components (A–B, B–C ⇒ A–C).
    pub transitive_blocking: bool,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            transitive_blocking: true,
        }
    }
}

/// Assigns priority tiers and dependencies, and emits the resolution order.
#[derive(Debug, Clone, Default)]
pub struct TensionPrioritizer {
    config: PrioritizerConfig,
}

impl TensionPrioritizer {
    /// Create a prioritizer with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config.
    pub fn with_config(config: PrioritizerConfig) -> Self {
        Self { config }
    }

    /// Assign `priority_tier` and `depends_on` on each active tension and
    /// return tension ids ordered by (tier ascending, detection order).
    pub fn prioritize(&self, tensions: &mut [Tension], registry: &RatingRegistry) -> Vec<String> {
        let active: Vec<usize> = tensions
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.status.is_terminal())
            .map(|(i, _)| i)
            .collect();

        let related = self.relation(tensions, &active);

        // Provisional tiers: 1 for values conflicts, 2 when a BLOCK is held,
        // 4 otherwise. Tier 3 is decided after dependencies are known.
        let mut tier = vec![4u8; tensions.len()];
        for &i in &active {
            let t = &tensions[i];
            if t.protocol.is_values_conflict() {
                tier[i] = 1;
            } else if registry.any_blocking(&t.reviewers) {
                tier[i] = 2;
            }
        }

        // A tension depends on every related tension with a strictly higher
        // tier, or an equal tier and earlier detection.
        for &i in &active {
            let mut deps = BTreeSet::new();
            for &j in &related[i] {
                let earlier = (tier[j], tensions[j].detected_seq) < (tier[i], tensions[i].detected_seq);
                if earlier {
                    deps.insert(tensions[j].id.clone());
                }
            }
            tensions[i].depends_on = deps;
        }

        // Settle tiers 3/4: dependency-free (or dependency-satisfied) tensions
        // outside tiers 1-2 are ready now.
        for &i in &active {
            if tier[i] == 4 {
                let satisfied = tensions[i].depends_on.iter().all(|dep| {
                    tensions
                        .iter()
                        .find(|t| &t.id == dep)
                        .map(|t| t.status.is_terminal())
                        .unwrap_or(true)
                });
                if satisfied {
                    tier[i] = 3;
                }
            }
            tensions[i].priority_tier = tier[i];
        }

        let mut order: Vec<usize> = active;
        order.sort_by_key(|&i| (tensions[i].priority_tier, tensions[i].detected_seq));

        for &i in &order {
            debug!(
                tension_id = %tensions[i].id,
                tier = tensions[i].priority_tier,
                deps = tensions[i].depends_on.len(),
                "tension prioritized"
            );
        }

        order.into_iter().map(|i| tensions[i].id.clone()).collect()
    }

    /// Indices related to each tension under the configured relation.
    fn relation(&self, tensions: &[Tension], active: &[usize]) -> Vec<Vec<usize>> {
        let mut graph: UnGraph<usize, ()> = UnGraph::new_undirected();
        let nodes: Vec<_> = active.iter().map(|&i| graph.add_node(i)).collect();

        for (a, &i) in active.iter().enumerate() {
            for (b, &j) in active.iter().enumerate().skip(a + 1) {
                if tensions[i].shares_reviewer(&tensions[j]) {
                    graph.add_edge(nodes[a], nodes[b], ());
                }
            }
        }

        let mut related = vec![Vec::new(); tensions.len()];
        if self.config.transitive_blocking {
            // Union-find over the shared-reviewer edges gives components.
            let mut uf = UnionFind::new(graph.node_count());
            for edge in graph.edge_references() {
                uf.union(edge.source().index(), edge.target().index());
            }
            for (a, &i) in active.iter().enumerate() {
                for (b, &j) in active.iter().enumerate() {
                    if a != b && uf.equiv(a, b) {
                        related[i].push(j);
                    }
                }
            }
        } else {
            for edge in graph.edge_references() {
                let i = graph[edge.source()];
                let j = graph[edge.target()];
                related[i].push(j);
                related[j].push(i);
            }
        }
        related
    }
}
