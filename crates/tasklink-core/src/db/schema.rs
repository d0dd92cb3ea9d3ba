//! Canonical SQLite schema for tasklink.
//!
//! - `work_items` holds one row per task, scoped by `project_id`
//! - `task_dependencies` holds one row per edge; `task_id` is the successor
//!   and `depends_on_task_id` the predecessor
//! - `store_meta` mirrors the schema version for quick integrity checks

/// Migration v1: work items, dependency edges, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS work_items (
    item_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL CHECK (length(trim(project_id)) > 0),
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'not_started'
        CHECK (status IN ('not_started', 'in_progress', 'in_review', 'done', 'cancelled')),
    planned_start TEXT,
    planned_end TEXT,
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL REFERENCES work_items(item_id) ON DELETE CASCADE,
    depends_on_task_id TEXT NOT NULL REFERENCES work_items(item_id) ON DELETE CASCADE,
    dependency_type TEXT NOT NULL DEFAULT 'finish_to_start'
        CHECK (dependency_type IN (
            'finish_to_start', 'start_to_start', 'finish_to_finish', 'start_to_finish'
        )),
    lag INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    UNIQUE (task_id, depends_on_task_id),
    CHECK (task_id <> depends_on_task_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for project scans and reverse lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_work_items_project
    ON work_items(project_id, is_deleted, item_id);

CREATE INDEX IF NOT EXISTS idx_task_dependencies_predecessor
    ON task_dependencies(depends_on_task_id, task_id);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by listing and graph-build query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_work_items_project",
    "idx_task_dependencies_predecessor",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        for idx in 0..24_u32 {
            let project = if idx % 2 == 0 { "alpha" } else { "beta" };
            conn.execute(
                "INSERT INTO work_items (item_id, project_id, title, created_at_us, updated_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![
                    format!("tk-{idx:03x}"),
                    project,
                    format!("Task {idx}"),
                    i64::from(idx)
                ],
            )?;
        }

        conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('tk-002', 'tk-000', 1)",
            [],
        )?;
        conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('tk-004', 'tk-000', 2)",
            [],
        )?;

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        stmt.query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>()
    }

    #[test]
    fn query_plan_uses_reverse_dependency_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT task_id FROM task_dependencies WHERE depends_on_task_id = 'tk-000'",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_task_dependencies_predecessor")),
            "expected dependency index in plan, got: {details:?}"
        );
        Ok(())
    }

    #[test]
    fn query_plan_uses_project_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT item_id FROM work_items WHERE project_id = 'alpha' AND is_deleted = 0",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_work_items_project")),
            "expected project index in plan, got: {details:?}"
        );
        Ok(())
    }

    #[test]
    fn schema_rejects_self_dependency_and_duplicates() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;

        let self_loop = conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('tk-001', 'tk-001', 3)",
            [],
        );
        assert!(self_loop.is_err(), "self-dependency must violate CHECK");

        let duplicate = conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('tk-002', 'tk-000', 4)",
            [],
        );
        assert!(duplicate.is_err(), "duplicate pair must violate UNIQUE");
        Ok(())
    }

    #[test]
    fn schema_rejects_unknown_dependency_type() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let bad = conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, dependency_type, created_at_us)
             VALUES ('tk-006', 'tk-000', 'blocks', 5)",
            [],
        );
        assert!(bad.is_err());
        Ok(())
    }
}
