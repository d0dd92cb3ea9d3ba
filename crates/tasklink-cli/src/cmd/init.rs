use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;

use tasklink_core::config::{DEFAULT_CONFIG_TOML, StorePaths, resolve_config};
use tasklink_core::db;

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `config.toml` even if `.tasklink/` already exists. The store is kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "tasklink.db\ntasklink.db-wal\ntasklink.db-shm\nlocks/\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    path: String,
    schema_version: i64,
}

/// Execute `tl init`. Creates:
///
/// ```text
/// .tasklink/
///   config.toml   (default template)
///   .gitignore    (store files and locks)
///   locks/
///   tasklink.db   (migrated SQLite store)
/// ```
///
/// # Errors
///
/// Returns an error if `.tasklink/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let paths = StorePaths::new(project_root);

    if paths.is_initialized() && !args.force {
        anyhow::bail!(".tasklink/ already exists. Use `tl init --force` to reinitialize.");
    }

    std::fs::create_dir_all(paths.locks())
        .with_context(|| format!("Failed to create {}", paths.locks().display()))?;
    std::fs::write(paths.config(), DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", paths.config().display()))?;
    std::fs::write(paths.root.join(".gitignore"), GITIGNORE)
        .context("Failed to write .tasklink/.gitignore")?;

    let config = resolve_config(project_root)?;
    let conn = db::open_store(&paths.db(), config.busy_timeout)?;
    let schema_version = db::query::store_schema_version(&conn)
        .context("Failed to read schema version")?;
    tracing::info!(path = %paths.root.display(), schema_version, "project initialized");

    let out = InitOutput {
        ok: true,
        path: paths.root.display().to_string(),
        schema_version,
    };
    render(output, &out, |o, w| {
        writeln!(w, "Initialized tasklink project")?;
        pretty_kv(w, "Store", &o.path)?;
        pretty_kv(w, "Schema", o.schema_version.to_string())?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  tl item create --project <id> --title \"...\"")?;
        writeln!(w, "  tl dep add <successor> --after <predecessor>")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout() {
        let dir = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");

        let paths = StorePaths::new(dir.path());
        assert!(paths.config().is_file());
        assert!(paths.db().is_file());
        assert!(paths.locks().is_dir());
    }

    #[test]
    fn second_init_requires_force() {
        let dir = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");

        let err = run_init(&InitArgs { force: false }, OutputMode::Json, dir.path())
            .expect_err("second init must fail");
        assert!(err.to_string().contains("--force"));

        run_init(&InitArgs { force: true }, OutputMode::Json, dir.path()).expect("forced init");
    }
}
