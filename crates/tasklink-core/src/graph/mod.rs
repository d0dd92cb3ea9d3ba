//! Graph-level views over dependency edges.
//!
//! Nothing here touches SQLite: the service snapshots a project's edges,
//! builds a [`DependencyGraph`](adjacency::DependencyGraph), and runs the
//! algorithms below against that snapshot.
//!
//! ## Submodules
//!
//! - [`adjacency`] - in-memory adjacency built on demand.
//! - [`cycles`] - incremental DFS check and full cycle scan.
//! - [`order`] - deterministic topological ordering.
//! - [`schedule`] - lag/type constraint checks against planned dates.

pub mod adjacency;
pub mod cycles;
pub mod order;
pub mod schedule;
