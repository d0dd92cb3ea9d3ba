//! In-memory adjacency for one project's dependency edges.
//!
//! Edges point `predecessor -> successor`: following outgoing edges walks
//! toward work that has to wait. The graph is rebuilt for every validation
//! call from the edges persisted at that moment, so it is never stale.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::dependency::Dependency;

/// Directed dependency graph keyed by work-item id.
///
/// `BTreeMap`/`BTreeSet` keep iteration order stable so traversals and
/// reported paths are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from persisted edges.
    #[must_use]
    pub fn from_dependencies<'a>(deps: impl IntoIterator<Item = &'a Dependency>) -> Self {
        let mut graph = Self::new();
        for dep in deps {
            graph.add_edge(&dep.predecessor_id, &dep.successor_id);
        }
        graph
    }

    /// Build a graph from `(predecessor, successor)` pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph = Self::new();
        for (predecessor, successor) in pairs {
            graph.add_edge(predecessor, successor);
        }
        graph
    }

    /// Register a node with no edges. No-op if it already exists.
    pub fn add_node(&mut self, id: &str) {
        self.outgoing.entry(id.to_string()).or_default();
        self.incoming.entry(id.to_string()).or_default();
    }

    /// Add the edge `predecessor -> successor`. Returns `false` if it was
    /// already present.
    pub fn add_edge(&mut self, predecessor: &str, successor: &str) -> bool {
        self.add_node(predecessor);
        self.add_node(successor);
        let inserted = self
            .outgoing
            .get_mut(predecessor)
            .is_some_and(|set| set.insert(successor.to_string()));
        if inserted {
            if let Some(set) = self.incoming.get_mut(successor) {
                set.insert(predecessor.to_string());
            }
        }
        inserted
    }

    /// Remove the edge `predecessor -> successor`. Returns `false` if absent.
    pub fn remove_edge(&mut self, predecessor: &str, successor: &str) -> bool {
        let removed = self
            .outgoing
            .get_mut(predecessor)
            .is_some_and(|set| set.remove(successor));
        if removed {
            if let Some(set) = self.incoming.get_mut(successor) {
                set.remove(predecessor);
            }
        }
        removed
    }

    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.outgoing.contains_key(id)
    }

    #[must_use]
    pub fn contains_edge(&self, predecessor: &str, successor: &str) -> bool {
        self.outgoing
            .get(predecessor)
            .is_some_and(|set| set.contains(successor))
    }

    /// Items that directly depend on `id` (outgoing neighbors), sorted.
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.outgoing
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Items `id` directly depends on (incoming neighbors), sorted.
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.incoming
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Number of direct predecessors of `id`.
    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, BTreeSet::len)
    }

    /// All node ids, sorted.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.outgoing.keys().map(String::as_str)
    }

    /// All edges as `(predecessor, successor)`, sorted.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outgoing.iter().flat_map(|(from, targets)| {
            targets.iter().map(move |to| (from.as_str(), to.as_str()))
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Convert to a petgraph `DiGraph` with item ids as node weights.
    #[must_use]
    pub fn to_digraph(&self) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.node_count(), self.edge_count());
        let mut index = HashMap::with_capacity(self.node_count());

        for id in self.nodes() {
            index.insert(id.to_string(), graph.add_node(id.to_string()));
        }
        for (from, to) in self.edges() {
            if let (Some(&a), Some(&b)) = (index.get(from), index.get(to)) {
                graph.add_edge(a, b, ());
            }
        }

        (graph, index)
    }
}
