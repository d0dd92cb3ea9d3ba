//! Cycle detection for the dependency graph.
//!
//! # Edge direction
//!
//! Edges point `predecessor -> successor`. Adding `P -> S` closes a cycle
//! exactly when `P` is already reachable from `S` along existing edges.
//!
//! # Design
//!
//! - **Incremental check**: [`detect_cycle_on_add`] runs an iterative DFS
//!   from the successor with a visited set and a parent map, so deep chains
//!   cannot exhaust the call stack. O(V+E) per call.
//! - **Full scan**: [`find_all_cycles`] groups every cycle into a strongly
//!   connected component with petgraph's Tarjan SCC. Used to verify a
//!   persisted edge set that may have been written outside the service.
//! - Dependency type and lag do not matter here; only topology does.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;

use super::adjacency::DependencyGraph;

// ---------------------------------------------------------------------------
// CyclePath
// ---------------------------------------------------------------------------

/// A closed walk through the graph, first node repeated at the end.
///
/// For a rejected edge `P -> S` the path reads `P -> S -> ... -> P`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CyclePath(Vec<String>);

impl CyclePath {
    #[must_use]
    pub const fn new(nodes: Vec<String>) -> Self {
        Self(nodes)
    }

    /// Nodes in walk order, including the repeated closing node.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.0
    }

    /// Number of distinct items in the cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency cycle ({} items): {}",
            self.len(),
            self.0.join(" -> ")
        )
    }
}

impl serde::Serialize for CyclePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Incremental detection
// ---------------------------------------------------------------------------

/// Check whether adding `predecessor -> successor` would close a cycle.
///
/// Returns the cycle the new edge would close, or `None` if the edge is safe.
/// A self-edge is reported as the two-element path `[x, x]`.
#[must_use]
pub fn detect_cycle_on_add(
    graph: &DependencyGraph,
    predecessor: &str,
    successor: &str,
) -> Option<CyclePath> {
    if predecessor == successor {
        return Some(CyclePath::new(vec![
            predecessor.to_string(),
            predecessor.to_string(),
        ]));
    }

    let mut visited: HashSet<&str> = HashSet::from([successor]);
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut stack: Vec<&str> = vec![successor];

    while let Some(current) = stack.pop() {
        if current == predecessor {
            return Some(reconstruct(&parent, predecessor, successor));
        }
        for next in graph.successors(current) {
            if visited.insert(next) {
                parent.insert(next, current);
                stack.push(next);
            }
        }
    }

    None
}

/// Returns `true` if `target` can be reached from `start` (or they are equal).
#[must_use]
pub fn is_reachable(graph: &DependencyGraph, start: &str, target: &str) -> bool {
    if start == target {
        return true;
    }
    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        for next in graph.successors(current) {
            if next == target {
                return true;
            }
            if visited.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}

fn reconstruct<'a>(
    parent: &HashMap<&'a str, &'a str>,
    predecessor: &'a str,
    successor: &str,
) -> CyclePath {
    // Parent links walk predecessor back to successor.
    let mut walk = vec![predecessor.to_string()];
    let mut cursor = predecessor;
    while cursor != successor {
        match parent.get(cursor) {
            Some(prev) => {
                cursor = *prev;
                walk.push(cursor.to_string());
            }
            None => break,
        }
    }
    walk.reverse();

    let mut path = Vec::with_capacity(walk.len() + 1);
    path.push(predecessor.to_string());
    path.extend(walk);
    CyclePath::new(path)
}

// ---------------------------------------------------------------------------
// Full scan
// ---------------------------------------------------------------------------

/// Find every cycle currently present in `graph`.
///
/// Each entry is the sorted member list of one strongly connected component
/// with more than one node (self-loops are reported as one-element groups).
/// Entries are sorted for stable output.
#[must_use]
pub fn find_all_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let (dg, _) = graph.to_digraph();

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&dg)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|node| dg.find_edge(*node, *node).is_some())
        })
        .map(|component| {
            let mut ids: Vec<String> = component
                .into_iter()
                .filter_map(|idx| dg.node_weight(idx).cloned())
                .collect();
            ids.sort_unstable();
            ids
        })
        .collect();

    cycles.sort_unstable();
    cycles
}

/// Returns `true` if `graph` contains at least one cycle.
#[must_use]
pub fn has_cycles(graph: &DependencyGraph) -> bool {
    let (dg, _) = graph.to_digraph();
    petgraph::algo::is_cyclic_directed(&dg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
