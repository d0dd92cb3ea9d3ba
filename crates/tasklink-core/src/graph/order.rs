//! Deterministic topological ordering.
//!
//! Kahn's algorithm with a sorted ready set: among items whose predecessors
//! are all placed, the smallest id goes first. The same edge set always
//! yields the same order.

use std::collections::{BTreeSet, HashMap};

use super::adjacency::DependencyGraph;

/// Outcome of ordering a graph that turned out to contain a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unordered {
    /// Items that were placed before the algorithm stalled.
    pub placed: Vec<String>,
    /// Items left with unresolved predecessors (members of, or downstream of, a cycle).
    pub stuck: Vec<String>,
}

/// Order every node so each predecessor precedes its successors.
///
/// # Errors
///
/// Returns [`Unordered`] if the graph contains a cycle.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<String>, Unordered> {
    let mut remaining: HashMap<&str, usize> = graph
        .nodes()
        .map(|id| (id, graph.in_degree(id)))
        .collect();

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut placed = Vec::with_capacity(graph.node_count());

    while let Some(id) = ready.pop_first() {
        placed.push(id.to_string());
        for next in graph.successors(id) {
            if let Some(deg) = remaining.get_mut(next) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if placed.len() == graph.node_count() {
        return Ok(placed);
    }

    let mut stuck: Vec<String> = remaining
        .into_iter()
        .filter(|&(_, deg)| deg > 0)
        .map(|(id, _)| id.to_string())
        .collect();
    stuck.sort_unstable();

    Err(Unordered { placed, stuck })
}

/// Returns `true` if the graph admits a topological order.
#[must_use]
pub fn is_dag(graph: &DependencyGraph) -> bool {
    topological_order(graph).is_ok()
}
