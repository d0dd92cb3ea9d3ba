//! Typed query helpers for the tasklink store.
//!
//! Every function takes a `&Connection` (a `Transaction` derefs to one, so
//! the service can run them inside its write transaction) and returns typed
//! structs, never raw rows.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use crate::model::dependency::{Dependency, DependencyType, EdgeId, NewDependency};
use crate::model::item::{Status, WorkItem};

const DATE_FORMAT: &str = "%Y-%m-%d";

const ITEM_COLUMNS: &str = "item_id, project_id, title, status, planned_start, planned_end, \
                            is_deleted, created_at_us, updated_at_us";

const DEPENDENCY_COLUMNS: &str =
    "id, task_id, depends_on_task_id, dependency_type, lag, created_at_us";

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        conversion_error(
            idx,
            Type::Integer,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("timestamp out of range: {micros}"),
            ),
        )
    })
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map_err(|err| conversion_error(idx, Type::Text, err))
    })
    .transpose()
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn row_to_work_item(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    let status_raw: String = row.get(3)?;
    let status = status_raw
        .parse::<Status>()
        .map_err(|err| conversion_error(3, Type::Text, err))?;

    Ok(WorkItem {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        status,
        planned_start: date_at(row, 4)?,
        planned_end: date_at(row, 5)?,
        is_deleted: row.get::<_, i64>(6)? != 0,
        created_at: timestamp_at(row, 7)?,
        updated_at: timestamp_at(row, 8)?,
    })
}

fn row_to_dependency(row: &Row<'_>) -> rusqlite::Result<Dependency> {
    let type_raw: String = row.get(3)?;
    let dependency_type = type_raw
        .parse::<DependencyType>()
        .map_err(|err| conversion_error(3, Type::Text, err))?;

    Ok(Dependency {
        id: EdgeId(row.get(0)?),
        successor_id: row.get(1)?,
        predecessor_id: row.get(2)?,
        dependency_type,
        lag: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

fn collect_dependencies(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> rusqlite::Result<Vec<Dependency>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![key], row_to_dependency)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// Insert a new work item row.
///
/// # Errors
///
/// Returns an error if the insert fails (including primary-key collisions).
pub fn insert_work_item(conn: &Connection, item: &WorkItem) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO work_items (item_id, project_id, title, status, planned_start, \
         planned_end, is_deleted, created_at_us, updated_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            item.id,
            item.project_id,
            item.title,
            item.status.as_str(),
            format_date(item.planned_start),
            format_date(item.planned_end),
            i64::from(item.is_deleted),
            item.created_at.timestamp_micros(),
            item.updated_at.timestamp_micros(),
        ],
    )?;
    Ok(())
}

/// Fetch a single work item by exact id.
///
/// Soft-deleted rows are returned only when `include_deleted` is set.
///
/// # Errors
///
/// Returns an error if the query fails or a row holds unparseable values.
pub fn get_work_item(
    conn: &Connection,
    item_id: &str,
    include_deleted: bool,
) -> rusqlite::Result<Option<WorkItem>> {
    let sql = if include_deleted {
        format!("SELECT {ITEM_COLUMNS} FROM work_items WHERE item_id = ?1")
    } else {
        format!("SELECT {ITEM_COLUMNS} FROM work_items WHERE item_id = ?1 AND is_deleted = 0")
    };
    conn.query_row(&sql, params![item_id], row_to_work_item)
        .optional()
}

/// List live work items of a project, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_work_items(conn: &Connection, project_id: &str) -> rusqlite::Result<Vec<WorkItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM work_items \
         WHERE project_id = ?1 AND is_deleted = 0 ORDER BY item_id"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![project_id], row_to_work_item)?;
    rows.collect()
}

/// Set the status of a live work item. Returns `false` if no row matched.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_status(
    conn: &Connection,
    item_id: &str,
    status: Status,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE work_items SET status = ?2, updated_at_us = ?3 \
         WHERE item_id = ?1 AND is_deleted = 0",
        params![item_id, status.as_str(), now.timestamp_micros()],
    )?;
    Ok(changed > 0)
}

/// Flag a work item as deleted without removing its row.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn mark_deleted(
    conn: &Connection,
    item_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE work_items SET is_deleted = 1, updated_at_us = ?2 \
         WHERE item_id = ?1 AND is_deleted = 0",
        params![item_id, now.timestamp_micros()],
    )?;
    Ok(changed > 0)
}

/// Remove a work item row. Incident edges go with it via `ON DELETE CASCADE`.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_work_item(conn: &Connection, item_id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM work_items WHERE item_id = ?1", params![item_id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Insert an edge and return its new id.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or fails.
pub fn insert_dependency(
    conn: &Connection,
    dep: &NewDependency,
    created_at: DateTime<Utc>,
) -> rusqlite::Result<EdgeId> {
    conn.execute(
        "INSERT INTO task_dependencies \
         (task_id, depends_on_task_id, dependency_type, lag, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            dep.successor_id,
            dep.predecessor_id,
            dep.dependency_type.as_str(),
            dep.lag,
            created_at.timestamp_micros(),
        ],
    )?;
    Ok(EdgeId(conn.last_insert_rowid()))
}

/// Fetch one edge by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_dependency(conn: &Connection, id: EdgeId) -> rusqlite::Result<Option<Dependency>> {
    let sql = format!("SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies WHERE id = ?1");
    conn.query_row(&sql, params![id.0], row_to_dependency)
        .optional()
}

/// Fetch the edge `predecessor -> successor`, if present.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_dependency(
    conn: &Connection,
    predecessor_id: &str,
    successor_id: &str,
) -> rusqlite::Result<Option<Dependency>> {
    let sql = format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies \
         WHERE task_id = ?1 AND depends_on_task_id = ?2"
    );
    conn.query_row(&sql, params![successor_id, predecessor_id], row_to_dependency)
        .optional()
}

/// Delete one edge. Returns `false` if it did not exist.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_dependency(conn: &Connection, id: EdgeId) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM task_dependencies WHERE id = ?1", params![id.0])?;
    Ok(changed > 0)
}

/// Delete every edge where `item_id` is predecessor or successor.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_edges_touching(conn: &Connection, item_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM task_dependencies WHERE task_id = ?1 OR depends_on_task_id = ?1",
        params![item_id],
    )
}

/// Overwrite the type and lag of an edge. Returns `false` if it did not exist.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_dependency(
    conn: &Connection,
    id: EdgeId,
    dependency_type: DependencyType,
    lag: i32,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE task_dependencies SET dependency_type = ?2, lag = ?3 WHERE id = ?1",
        params![id.0, dependency_type.as_str(), lag],
    )?;
    Ok(changed > 0)
}

/// Edges where `item_id` is the successor (its direct predecessors).
///
/// Ordered by predecessor id, then edge id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn predecessors_of(conn: &Connection, item_id: &str) -> rusqlite::Result<Vec<Dependency>> {
    let sql = format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies \
         WHERE task_id = ?1 ORDER BY depends_on_task_id, id"
    );
    collect_dependencies(conn, &sql, item_id)
}

/// Edges where `item_id` is the predecessor (its direct dependents).
///
/// Ordered by successor id, then edge id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn dependents_of(conn: &Connection, item_id: &str) -> rusqlite::Result<Vec<Dependency>> {
    let sql = format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies \
         WHERE depends_on_task_id = ?1 ORDER BY task_id, id"
    );
    collect_dependencies(conn, &sql, item_id)
}

/// Every edge whose successor belongs to `project_id`, ordered by edge id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn project_dependencies(
    conn: &Connection,
    project_id: &str,
) -> rusqlite::Result<Vec<Dependency>> {
    let sql = "SELECT d.id, d.task_id, d.depends_on_task_id, d.dependency_type, d.lag, \
               d.created_at_us \
               FROM task_dependencies d \
               JOIN work_items s ON s.item_id = d.task_id \
               WHERE s.project_id = ?1 \
               ORDER BY d.id";
    collect_dependencies(conn, sql, project_id)
}

/// Project of the successor that owns an edge.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn dependency_project(conn: &Connection, id: EdgeId) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT s.project_id FROM task_dependencies d \
         JOIN work_items s ON s.item_id = d.task_id WHERE d.id = ?1",
        params![id.0],
        |row| row.get(0),
    )
    .optional()
}

/// Read the schema version mirrored in `store_meta`.
///
/// # Errors
///
/// Returns an error if the meta row is missing or unreadable.
pub fn store_schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT schema_version FROM store_meta WHERE id = 1",
        [],
        |row| row.get(0),
    )
}

/// Attempt to open the store, treating a missing or corrupt file as absent.
///
/// # Errors
///
/// Never fails today; the `Result` keeps room for unexpected I/O errors.
pub fn try_open_store(
    path: &std::path::Path,
    busy_timeout: std::time::Duration,
) -> anyhow::Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    match super::open_store(path, busy_timeout) {
        Ok(conn) => {
            if store_schema_version(&conn).is_ok() {
                Ok(Some(conn))
            } else {
                tracing::warn!(path = %path.display(), "store metadata unreadable, treating as corrupt");
                Ok(None)
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to open store"
            );
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
