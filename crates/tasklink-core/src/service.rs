//! Cycle-safe dependency linking over the SQLite store.
//!
//! Every mutation follows the same shape:
//!
//! 1. resolve the affected project with a read-only lookup,
//! 2. take that project's [`ProjectLock`],
//! 3. open an `IMMEDIATE` transaction and re-run every check against the
//!    rows as they are now,
//! 4. write, commit, release.
//!
//! Validation failures return before any write, so a rejected call leaves
//! the store untouched. Reads take no advisory lock.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::instrument;

use crate::config::{EffectiveConfig, StorePaths};
use crate::db::{self, query};
use crate::error::{DependencyError, Result};
use crate::graph::adjacency::DependencyGraph;
use crate::graph::cycles::{detect_cycle_on_add, find_all_cycles};
use crate::graph::order;
use crate::graph::schedule::{ScheduleViolation, check_dependency};
use crate::lock::ProjectLock;
use crate::model::dependency::{Dependency, DependencyPatch, EdgeId, NewDependency};
use crate::model::item::{NewWorkItem, Status, WorkItem};

/// Prefix of generated work-item ids.
pub const ITEM_ID_PREFIX: &str = "tk-";

/// Projects the caller may see. Anything outside is reported as not found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Projects(BTreeSet<String>),
}

impl Scope {
    /// Restrict visibility to the given projects.
    pub fn projects<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Projects(ids.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn allows(&self, project_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Projects(set) => set.contains(project_id),
        }
    }
}

/// How [`DependencyService::delete_work_item`] removes an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Keep the row, flagged deleted.
    #[default]
    Soft,
    /// Remove the row.
    Hard,
}

/// An unfinished predecessor holding up an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    pub dependency: Dependency,
    pub item: WorkItem,
}

/// Result of a full cycle scan over a project's persisted edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcyclicReport {
    pub project_id: String,
    pub items: usize,
    pub edges: usize,
    /// Sorted member lists of each strongly connected component that loops.
    pub cycles: Vec<Vec<String>>,
}

impl AcyclicReport {
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}

/// Owns a store connection and serializes writers per project.
#[derive(Debug)]
pub struct DependencyService {
    conn: Connection,
    lock_dir: PathBuf,
    lock_timeout: Duration,
    id_seq: u64,
}

impl DependencyService {
    /// Wrap an already-migrated connection.
    #[must_use]
    pub fn new(conn: Connection, lock_dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            conn,
            lock_dir: lock_dir.into(),
            lock_timeout,
            id_seq: 0,
        }
    }

    /// Open the store of an initialized project directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(project_root: &Path, config: &EffectiveConfig) -> anyhow::Result<Self> {
        let paths = StorePaths::new(project_root);
        let conn = db::open_store(&paths.db(), config.busy_timeout)?;
        Ok(Self::new(conn, paths.locks(), config.lock_timeout))
    }

    /// Service over a fresh in-memory store; lock files go to `lock_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory store cannot be created.
    pub fn in_memory(lock_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::new(
            db::open_in_memory()?,
            lock_dir,
            Duration::from_millis(500),
        ))
    }

    fn write_locked<T>(
        &mut self,
        project_id: &str,
        op: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let lock = ProjectLock::acquire(&self.lock_dir, [project_id], self.lock_timeout)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        lock.release();
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// Add the edge "`successor` depends on `predecessor`".
    ///
    /// Checks, in order: distinct endpoints, both items visible, same
    /// project, no existing edge for the pair, no path from successor back
    /// to predecessor.
    ///
    /// # Errors
    ///
    /// - [`DependencyError::InvalidDependency`] for a self-dependency or a
    ///   cross-project pair
    /// - [`DependencyError::NotFound`] if either item is missing or hidden
    /// - [`DependencyError::DuplicateDependency`] if the pair is already linked
    /// - [`DependencyError::CyclicDependency`] if the edge would close a cycle
    /// - lock or storage errors
    #[instrument(
        skip(self, scope, new),
        fields(successor = %new.successor_id, predecessor = %new.predecessor_id)
    )]
    pub fn add_dependency(&mut self, scope: &Scope, new: NewDependency) -> Result<Dependency> {
        let result = self.try_add_dependency(scope, &new);
        match &result {
            Ok(dep) => tracing::info!(
                edge = %dep.id,
                kind = dep.dependency_type.short(),
                lag = dep.lag,
                "dependency added"
            ),
            Err(err) if err.is_validation() => {
                tracing::warn!(code = %err.code(), error = %err, "dependency rejected");
            }
            Err(_) => {}
        }
        result
    }

    fn try_add_dependency(&mut self, scope: &Scope, new: &NewDependency) -> Result<Dependency> {
        if new.successor_id == new.predecessor_id {
            return Err(DependencyError::InvalidDependency {
                reason: format!("work item '{}' cannot depend on itself", new.successor_id),
            });
        }

        let project = shared_project(&self.conn, scope, new)?;

        self.write_locked(&project, |tx| {
            shared_project(tx, scope, new)?;

            if let Some(existing) =
                query::find_dependency(tx, &new.predecessor_id, &new.successor_id)?
            {
                return Err(DependencyError::DuplicateDependency {
                    predecessor: new.predecessor_id.clone(),
                    successor: new.successor_id.clone(),
                    existing: existing.id,
                });
            }

            let edges = query::project_dependencies(tx, &project)?;
            let graph = DependencyGraph::from_dependencies(&edges);
            tracing::debug!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "built project graph"
            );

            if let Some(path) =
                detect_cycle_on_add(&graph, &new.predecessor_id, &new.successor_id)
            {
                return Err(DependencyError::CyclicDependency(path));
            }

            let created_at = now();
            let id = query::insert_dependency(tx, new, created_at)?;
            Ok(Dependency {
                id,
                successor_id: new.successor_id.clone(),
                predecessor_id: new.predecessor_id.clone(),
                dependency_type: new.dependency_type,
                lag: new.lag,
                created_at,
            })
        })
    }

    /// Delete one edge. Removing an edge can never introduce a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the edge does not exist or is
    /// hidden by `scope`.
    #[instrument(skip(self, scope))]
    pub fn remove_dependency(&mut self, scope: &Scope, id: EdgeId) -> Result<Dependency> {
        let (_, project) = visible_edge(&self.conn, scope, id)?;
        let removed = self.write_locked(&project, |tx| {
            let (dep, _) = visible_edge(tx, scope, id)?;
            query::delete_dependency(tx, id)?;
            Ok(dep)
        })?;
        tracing::info!(edge = %id, "dependency removed");
        Ok(removed)
    }

    /// Change an edge's type and/or lag. Endpoints never change, so no cycle
    /// check is needed.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the edge does not exist or is
    /// hidden by `scope`.
    #[instrument(skip(self, scope))]
    pub fn update_dependency(
        &mut self,
        scope: &Scope,
        id: EdgeId,
        patch: DependencyPatch,
    ) -> Result<Dependency> {
        let (current, project) = visible_edge(&self.conn, scope, id)?;
        if patch.is_empty() {
            return Ok(current);
        }

        let updated = self.write_locked(&project, |tx| {
            let (mut dep, _) = visible_edge(tx, scope, id)?;
            dep.dependency_type = patch.dependency_type.unwrap_or(dep.dependency_type);
            dep.lag = patch.lag.unwrap_or(dep.lag);
            query::update_dependency(tx, id, dep.dependency_type, dep.lag)?;
            Ok(dep)
        })?;
        tracing::info!(
            edge = %id,
            kind = updated.dependency_type.short(),
            lag = updated.lag,
            "dependency updated"
        );
        Ok(updated)
    }

    /// Fetch one edge.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the edge does not exist or is
    /// hidden by `scope`.
    pub fn get_dependency(&self, scope: &Scope, id: EdgeId) -> Result<Dependency> {
        visible_edge(&self.conn, scope, id).map(|(dep, _)| dep)
    }

    /// Edges where `item_id` is the predecessor, ordered by successor id.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing or hidden.
    pub fn list_dependents(&self, scope: &Scope, item_id: &str) -> Result<Vec<Dependency>> {
        visible_item(&self.conn, scope, item_id)?;
        Ok(query::dependents_of(&self.conn, item_id)?)
    }

    /// Edges where `item_id` is the successor, ordered by predecessor id.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing or hidden.
    pub fn list_predecessors(&self, scope: &Scope, item_id: &str) -> Result<Vec<Dependency>> {
        visible_item(&self.conn, scope, item_id)?;
        Ok(query::predecessors_of(&self.conn, item_id)?)
    }

    /// Direct predecessors of `item_id` that are neither done nor cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing or hidden.
    pub fn open_blockers(&self, scope: &Scope, item_id: &str) -> Result<Vec<Blocker>> {
        let mut blockers = Vec::new();
        for dependency in self.list_predecessors(scope, item_id)? {
            let Some(item) = query::get_work_item(&self.conn, &dependency.predecessor_id, false)?
            else {
                continue;
            };
            if !item.status.is_closed() {
                blockers.push(Blocker { dependency, item });
            }
        }
        Ok(blockers)
    }

    // -----------------------------------------------------------------------
    // Work items
    // -----------------------------------------------------------------------

    /// Create a work item with a generated `tk-` id.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::InvalidInput`] for a blank project or
    /// title, or a planned end before the planned start.
    #[instrument(skip(self, new), fields(project = %new.project_id))]
    pub fn create_work_item(&mut self, new: NewWorkItem) -> Result<WorkItem> {
        let project_id = new.project_id.trim().to_string();
        let title = new.title.trim().to_string();
        if project_id.is_empty() {
            return Err(DependencyError::InvalidInput {
                field: "project",
                reason: "must not be empty".to_string(),
            });
        }
        if title.is_empty() {
            return Err(DependencyError::InvalidInput {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if let (Some(start), Some(end)) = (new.planned_start, new.planned_end) {
            if end < start {
                return Err(DependencyError::InvalidInput {
                    field: "planned dates",
                    reason: format!("end {end} is before start {start}"),
                });
            }
        }

        let mut seq = self.id_seq;
        let item = self.write_locked(&project_id, |tx| {
            let created_at = now();
            let id = loop {
                seq += 1;
                let candidate = generate_item_id(&project_id, &title, created_at, seq);
                if query::get_work_item(tx, &candidate, true)?.is_none() {
                    break candidate;
                }
            };
            let item = WorkItem {
                id,
                project_id: project_id.clone(),
                title: title.clone(),
                status: Status::default(),
                planned_start: new.planned_start,
                planned_end: new.planned_end,
                is_deleted: false,
                created_at,
                updated_at: created_at,
            };
            query::insert_work_item(tx, &item)?;
            Ok(item)
        })?;
        self.id_seq = seq;

        tracing::info!(item = %item.id, "work item created");
        Ok(item)
    }

    /// Fetch one live work item.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing, deleted,
    /// or hidden.
    pub fn get_work_item(&self, scope: &Scope, item_id: &str) -> Result<WorkItem> {
        visible_item(&self.conn, scope, item_id)
    }

    /// Live items of one project, ordered by id. Hidden projects look empty.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn list_work_items(&self, scope: &Scope, project_id: &str) -> Result<Vec<WorkItem>> {
        if !scope.allows(project_id) {
            return Ok(Vec::new());
        }
        Ok(query::list_work_items(&self.conn, project_id)?)
    }

    /// Set an item's status.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing or hidden.
    #[instrument(skip(self, scope))]
    pub fn set_status(&mut self, scope: &Scope, item_id: &str, status: Status) -> Result<WorkItem> {
        let item = visible_item(&self.conn, scope, item_id)?;
        self.write_locked(&item.project_id, |tx| {
            let mut item = visible_item(tx, scope, item_id)?;
            let updated_at = now();
            query::update_status(tx, item_id, status, updated_at)?;
            item.status = status;
            item.updated_at = updated_at;
            Ok(item)
        })
    }

    /// Delete an item together with every edge that touches it.
    ///
    /// Returns the number of edges removed.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::NotFound`] if the item is missing or hidden.
    #[instrument(skip(self, scope))]
    pub fn delete_work_item(
        &mut self,
        scope: &Scope,
        item_id: &str,
        mode: DeleteMode,
    ) -> Result<usize> {
        let item = visible_item(&self.conn, scope, item_id)?;
        let removed = self.write_locked(&item.project_id, |tx| {
            visible_item(tx, scope, item_id)?;
            let removed = query::delete_edges_touching(tx, item_id)?;
            match mode {
                DeleteMode::Soft => query::mark_deleted(tx, item_id, now())?,
                DeleteMode::Hard => query::delete_work_item(tx, item_id)?,
            };
            Ok(removed)
        })?;
        tracing::info!(item = %item_id, ?mode, edges_removed = removed, "work item deleted");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Project-wide views
    // -----------------------------------------------------------------------

    fn project_snapshot(
        &self,
        project_id: &str,
    ) -> Result<(Vec<WorkItem>, Vec<Dependency>, DependencyGraph)> {
        let items = query::list_work_items(&self.conn, project_id)?;
        let edges = query::project_dependencies(&self.conn, project_id)?;

        let mut graph = DependencyGraph::from_dependencies(&edges);
        for item in &items {
            graph.add_node(&item.id);
        }
        Ok((items, edges, graph))
    }

    /// Live items of a project with every predecessor before its successors.
    /// Ties are broken by id.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Corrupt`] if persisted edges form a cycle.
    pub fn topological_order(&self, scope: &Scope, project_id: &str) -> Result<Vec<WorkItem>> {
        if !scope.allows(project_id) {
            return Ok(Vec::new());
        }
        let (items, _, graph) = self.project_snapshot(project_id)?;

        let ordered = order::topological_order(&graph).map_err(|unordered| {
            DependencyError::Corrupt(format!(
                "project '{project_id}' has a dependency cycle involving {}",
                unordered.stuck.join(", ")
            ))
        })?;

        let mut by_id: HashMap<String, WorkItem> =
            items.into_iter().map(|item| (item.id.clone(), item)).collect();
        Ok(ordered
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }

    /// Edges whose planned dates break their type/lag constraint.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be read.
    pub fn schedule_violations(
        &self,
        scope: &Scope,
        project_id: &str,
    ) -> Result<Vec<ScheduleViolation>> {
        if !scope.allows(project_id) {
            return Ok(Vec::new());
        }
        let (items, edges, _) = self.project_snapshot(project_id)?;
        let by_id: HashMap<&str, &WorkItem> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();

        Ok(edges
            .iter()
            .filter_map(|dep| {
                let predecessor = by_id.get(dep.predecessor_id.as_str())?;
                let successor = by_id.get(dep.successor_id.as_str())?;
                check_dependency(dep, predecessor, successor)
            })
            .collect())
    }

    /// Scan a project's persisted edges for cycles.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be read.
    #[instrument(skip(self, scope))]
    pub fn verify_acyclic(&self, scope: &Scope, project_id: &str) -> Result<AcyclicReport> {
        let report = if scope.allows(project_id) {
            let (items, edges, graph) = self.project_snapshot(project_id)?;
            AcyclicReport {
                project_id: project_id.to_string(),
                items: items.len(),
                edges: edges.len(),
                cycles: find_all_cycles(&graph),
            }
        } else {
            AcyclicReport {
                project_id: project_id.to_string(),
                items: 0,
                edges: 0,
                cycles: Vec::new(),
            }
        };

        if !report.is_acyclic() {
            tracing::warn!(cycles = report.cycles.len(), "persisted dependency cycles found");
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Store timestamps carry microseconds; truncate so values round-trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn generate_item_id(project_id: &str, title: &str, at: DateTime<Utc>, seq: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(project_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(title.as_bytes());
    hasher.update(&at.timestamp_micros().to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    let digest = hasher.finalize().to_hex();
    format!("{ITEM_ID_PREFIX}{}", &digest[..8])
}

fn visible_item(conn: &Connection, scope: &Scope, item_id: &str) -> Result<WorkItem> {
    match query::get_work_item(conn, item_id, false)? {
        Some(item) if scope.allows(&item.project_id) => Ok(item),
        _ => Err(DependencyError::item_not_found(item_id)),
    }
}

fn visible_edge(conn: &Connection, scope: &Scope, id: EdgeId) -> Result<(Dependency, String)> {
    let project = query::dependency_project(conn, id)?
        .filter(|project| scope.allows(project))
        .ok_or_else(|| DependencyError::edge_not_found(id))?;
    let dep = query::get_dependency(conn, id)?.ok_or_else(|| DependencyError::edge_not_found(id))?;
    Ok((dep, project))
}

/// Both endpoints must be visible and live in the same project.
fn shared_project(conn: &Connection, scope: &Scope, new: &NewDependency) -> Result<String> {
    let successor = visible_item(conn, scope, &new.successor_id)?;
    let predecessor = visible_item(conn, scope, &new.predecessor_id)?;
    if successor.project_id != predecessor.project_id {
        return Err(DependencyError::InvalidDependency {
            reason: format!(
                "cross-project dependency: '{}' is in project '{}' but '{}' is in project '{}'",
                successor.id, successor.project_id, predecessor.id, predecessor.project_id
            ),
        });
    }
    Ok(successor.project_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, Missing};
    use crate::model::dependency::DependencyType;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        svc: DependencyService,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let svc = DependencyService::new(
            db::open_in_memory().expect("in-memory store"),
            dir.path().join("locks"),
            Duration::from_millis(100),
        );
        Fixture { _dir: dir, svc }
    }

    fn item(svc: &mut DependencyService, project: &str, title: &str) -> String {
        svc.create_work_item(NewWorkItem::new(project, title))
            .expect("create item")
            .id
    }

    fn link(svc: &mut DependencyService, successor: &str, predecessor: &str) -> Result<Dependency> {
        svc.add_dependency(&Scope::All, NewDependency::new(successor, predecessor))
    }

    fn edge_count(svc: &DependencyService, project: &str) -> usize {
        query::project_dependencies(&svc.conn, project)
            .expect("edges")
            .len()
    }

    #[test]
    fn three_task_scenario() {
        let Fixture { _dir, mut svc } = fixture();
        let t1 = item(&mut svc, "alpha", "T1");
        let t2 = item(&mut svc, "alpha", "T2");
        let t3 = item(&mut svc, "alpha", "T3");

        let t1_t2 = link(&mut svc, &t2, &t1).expect("T2 after T1");
        link(&mut svc, &t3, &t2).expect("T3 after T2");

        let err = link(&mut svc, &t1, &t3).expect_err("T1 after T3 closes a loop");
        match err {
            DependencyError::CyclicDependency(path) => {
                assert_eq!(path.nodes(), [t3.clone(), t1.clone(), t2.clone(), t3.clone()]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        svc.remove_dependency(&Scope::All, t1_t2.id).expect("remove T1->T2");
        link(&mut svc, &t1, &t3).expect("no cycle once T1->T2 is gone");
        assert_eq!(edge_count(&svc, "alpha"), 2);
    }

    #[test]
    fn self_dependency_is_invalid_even_for_unknown_ids() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");

        for id in [a.as_str(), "tk-nothere"] {
            let err = link(&mut svc, id, id).expect_err("self-loop");
            assert!(matches!(err, DependencyError::InvalidDependency { .. }), "{err:?}");
            assert_eq!(err.code(), ErrorCode::InvalidDependency);
        }
    }

    #[test]
    fn direct_reverse_edge_is_cyclic() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");

        link(&mut svc, &b, &a).expect("B after A");
        let err = link(&mut svc, &a, &b).expect_err("A after B");
        assert_eq!(err.code(), ErrorCode::CycleDetected);
        assert_eq!(edge_count(&svc, "alpha"), 1);
    }

    #[test]
    fn duplicate_keeps_first_edge_untouched() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");

        let first = svc
            .add_dependency(
                &Scope::All,
                NewDependency::new(&b, &a)
                    .with_type(DependencyType::StartToStart)
                    .with_lag(2),
            )
            .expect("first add");

        let err = svc
            .add_dependency(
                &Scope::All,
                NewDependency::new(&b, &a)
                    .with_type(DependencyType::FinishToFinish)
                    .with_lag(9),
            )
            .expect_err("duplicate");
        assert!(
            matches!(err, DependencyError::DuplicateDependency { existing, .. } if existing == first.id)
        );

        assert_eq!(svc.get_dependency(&Scope::All, first.id).expect("get"), first);
    }

    #[test]
    fn missing_endpoints_are_not_found() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");

        let err = link(&mut svc, &a, "tk-missing").expect_err("unknown predecessor");
        assert!(matches!(&err, DependencyError::NotFound(Missing::Item(id)) if id == "tk-missing"));

        let err = link(&mut svc, "tk-missing", &a).expect_err("unknown successor");
        assert_eq!(err.code(), ErrorCode::ItemNotFound);
    }

    #[test]
    fn cross_project_links_are_rejected() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let x = item(&mut svc, "beta", "X");

        let err = link(&mut svc, &x, &a).expect_err("cross-project");
        assert!(matches!(&err, DependencyError::InvalidDependency { reason } if reason.contains("cross-project")));
    }

    #[test]
    fn scope_hides_items_and_edges() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");
        let dep = link(&mut svc, &b, &a).expect("link");

        let beta_only = Scope::projects(["beta"]);
        assert_eq!(
            svc.get_work_item(&beta_only, &a).expect_err("hidden").code(),
            ErrorCode::ItemNotFound
        );
        assert_eq!(
            svc.get_dependency(&beta_only, dep.id).expect_err("hidden").code(),
            ErrorCode::EdgeNotFound
        );
        assert!(svc.list_dependents(&beta_only, &a).is_err());
        assert!(svc.remove_dependency(&beta_only, dep.id).is_err());
        assert!(svc.list_work_items(&beta_only, "alpha").expect("list").is_empty());

        let alpha = Scope::projects(["alpha"]);
        assert_eq!(svc.list_dependents(&alpha, &a).expect("visible").len(), 1);
    }

    #[test]
    fn listings_are_ordered_and_repeatable() {
        let Fixture { _dir, mut svc } = fixture();
        let hub = item(&mut svc, "alpha", "hub");
        let mut downstream: Vec<String> = (0..4).map(|i| item(&mut svc, "alpha", &format!("d{i}"))).collect();
        for id in &downstream {
            link(&mut svc, id, &hub).expect("link");
        }
        downstream.sort();

        let first = svc.list_dependents(&Scope::All, &hub).expect("list");
        let second = svc.list_dependents(&Scope::All, &hub).expect("list again");
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|d| d.successor_id.clone()).collect::<Vec<_>>(),
            downstream
        );

        let preds = svc.list_predecessors(&Scope::All, &downstream[0]).expect("preds");
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].predecessor_id, hub);
        assert!(svc.list_predecessors(&Scope::All, &hub).expect("none").is_empty());
    }

    #[test]
    fn removing_unknown_edge_is_not_found() {
        let Fixture { _dir, mut svc } = fixture();
        let err = svc.remove_dependency(&Scope::All, EdgeId(77)).expect_err("missing");
        assert!(matches!(err, DependencyError::NotFound(Missing::Edge(EdgeId(77)))));
    }

    #[test]
    fn update_changes_only_type_and_lag() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");
        let dep = link(&mut svc, &b, &a).expect("link");

        let updated = svc
            .update_dependency(
                &Scope::All,
                dep.id,
                DependencyPatch {
                    dependency_type: Some(DependencyType::StartToFinish),
                    lag: Some(-4),
                },
            )
            .expect("update");
        assert_eq!(updated.dependency_type, DependencyType::StartToFinish);
        assert_eq!(updated.lag, -4);
        assert_eq!(updated.successor_id, dep.successor_id);
        assert_eq!(updated.predecessor_id, dep.predecessor_id);
        assert_eq!(updated.created_at, dep.created_at);
        assert_eq!(svc.get_dependency(&Scope::All, dep.id).expect("get"), updated);

        let lag_only = svc
            .update_dependency(
                &Scope::All,
                dep.id,
                DependencyPatch {
                    lag: Some(1),
                    ..DependencyPatch::default()
                },
            )
            .expect("lag only");
        assert_eq!(lag_only.dependency_type, DependencyType::StartToFinish);
        assert_eq!(lag_only.lag, 1);

        let unchanged = svc
            .update_dependency(&Scope::All, dep.id, DependencyPatch::default())
            .expect("empty patch");
        assert_eq!(unchanged, lag_only);
    }

    #[test]
    fn soft_delete_cascades_edges_and_hides_item() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");
        let c = item(&mut svc, "alpha", "C");
        link(&mut svc, &b, &a).expect("B after A");
        link(&mut svc, &c, &b).expect("C after B");
        link(&mut svc, &c, &a).expect("C after A");

        let removed = svc
            .delete_work_item(&Scope::All, &b, DeleteMode::Soft)
            .expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(edge_count(&svc, "alpha"), 1);
        assert!(svc.get_work_item(&Scope::All, &b).is_err());
        assert!(link(&mut svc, &c, &b).is_err());
        assert!(
            query::get_work_item(&svc.conn, &b, true)
                .expect("query")
                .is_some_and(|row| row.is_deleted)
        );
    }

    #[test]
    fn hard_delete_removes_row() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");
        link(&mut svc, &b, &a).expect("link");

        assert_eq!(
            svc.delete_work_item(&Scope::All, &a, DeleteMode::Hard)
                .expect("delete"),
            1
        );
        assert!(query::get_work_item(&svc.conn, &a, true).expect("query").is_none());
        assert!(svc.list_predecessors(&Scope::All, &b).expect("list").is_empty());
    }

    #[test]
    fn open_blockers_skip_closed_predecessors() {
        let Fixture { _dir, mut svc } = fixture();
        let done = item(&mut svc, "alpha", "done");
        let cancelled = item(&mut svc, "alpha", "cancelled");
        let open = item(&mut svc, "alpha", "open");
        let target = item(&mut svc, "alpha", "target");
        for pred in [&done, &cancelled, &open] {
            link(&mut svc, &target, pred).expect("link");
        }
        svc.set_status(&Scope::All, &done, Status::Done).expect("status");
        svc.set_status(&Scope::All, &cancelled, Status::Cancelled)
            .expect("status");
        svc.set_status(&Scope::All, &open, Status::InProgress)
            .expect("status");

        let blockers = svc.open_blockers(&Scope::All, &target).expect("blockers");
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].item.id, open);
        assert_eq!(blockers[0].item.status, Status::InProgress);
    }

    #[test]
    fn topological_order_puts_predecessors_first() {
        let Fixture { _dir, mut svc } = fixture();
        let ids: Vec<String> = (0..5).map(|i| item(&mut svc, "alpha", &format!("n{i}"))).collect();
        link(&mut svc, &ids[0], &ids[4]).expect("link");
        link(&mut svc, &ids[1], &ids[0]).expect("link");
        link(&mut svc, &ids[3], &ids[1]).expect("link");

        let order: Vec<String> = svc
            .topological_order(&Scope::All, "alpha")
            .expect("order")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(order.len(), 5);
        let pos = |id: &str| order.iter().position(|x| x == id).expect("present");
        assert!(pos(&ids[4]) < pos(&ids[0]));
        assert!(pos(&ids[0]) < pos(&ids[1]));
        assert!(pos(&ids[1]) < pos(&ids[3]));
    }

    #[test]
    fn schedule_violations_follow_planned_dates() {
        let Fixture { _dir, mut svc } = fixture();
        let d = |day| NaiveDate::from_ymd_opt(2026, 4, day);
        let pour = svc
            .create_work_item(NewWorkItem::new("alpha", "pour").planned(d(1), d(5)))
            .expect("create");
        let frame = svc
            .create_work_item(NewWorkItem::new("alpha", "frame").planned(d(6), d(12)))
            .expect("create");

        svc.add_dependency(
            &Scope::All,
            NewDependency::new(&frame.id, &pour.id).with_lag(3),
        )
        .expect("link");

        let violations = svc.schedule_violations(&Scope::All, "alpha").expect("check");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].required, NaiveDate::from_ymd_opt(2026, 4, 8).expect("date"));
        assert_eq!(violations[0].slip_days, 2);
        assert!(
            svc.schedule_violations(&Scope::projects(["beta"]), "alpha")
                .expect("hidden")
                .is_empty()
        );
    }

    #[test]
    fn verify_acyclic_flags_rows_written_around_the_service() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");
        link(&mut svc, &b, &a).expect("link");
        assert!(svc.verify_acyclic(&Scope::All, "alpha").expect("scan").is_acyclic());

        svc.conn
            .execute(
                "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
                 VALUES (?1, ?2, 0)",
                rusqlite::params![a, b],
            )
            .expect("raw insert");

        let report = svc.verify_acyclic(&Scope::All, "alpha").expect("scan");
        assert_eq!(report.edges, 2);
        assert_eq!(report.cycles, vec![{
            let mut ids = vec![a.clone(), b.clone()];
            ids.sort();
            ids
        }]);
        assert_eq!(
            svc.topological_order(&Scope::All, "alpha")
                .expect_err("cycle")
                .code(),
            ErrorCode::CorruptStore
        );
    }

    #[test]
    fn held_project_lock_times_out_writers() {
        let Fixture { _dir, mut svc } = fixture();
        let a = item(&mut svc, "alpha", "A");
        let b = item(&mut svc, "alpha", "B");

        let held = ProjectLock::acquire(&svc.lock_dir, ["alpha"], Duration::from_millis(50))
            .expect("hold lock");
        let err = link(&mut svc, &b, &a).expect_err("lock held");
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert!(!err.is_validation());
        assert_eq!(edge_count(&svc, "alpha"), 0);

        held.release();
        link(&mut svc, &b, &a).expect("lock released");
    }

    #[test]
    fn create_validates_fields() {
        let Fixture { _dir, mut svc } = fixture();
        let blank = svc
            .create_work_item(NewWorkItem::new("alpha", "   "))
            .expect_err("blank title");
        assert_eq!(blank.code(), ErrorCode::InvalidInput);

        assert!(svc.create_work_item(NewWorkItem::new("", "x")).is_err());

        let backwards = NewWorkItem::new("alpha", "x").planned(
            NaiveDate::from_ymd_opt(2026, 5, 2),
            NaiveDate::from_ymd_opt(2026, 5, 1),
        );
        assert!(matches!(
            svc.create_work_item(backwards),
            Err(DependencyError::InvalidInput { field: "planned dates", .. })
        ));
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let Fixture { _dir, mut svc } = fixture();
        let ids: BTreeSet<String> = (0..50).map(|_| item(&mut svc, "alpha", "same title")).collect();
        assert_eq!(ids.len(), 50);
        assert!(ids.iter().all(|id| id.starts_with(ITEM_ID_PREFIX) && id.len() == 11));
    }
}
