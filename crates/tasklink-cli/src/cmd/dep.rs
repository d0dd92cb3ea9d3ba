//! `tl dep`: manage dependency edges between work items.
//!
//! - `tl dep add <successor> --after <predecessor>` links two items
//! - `tl dep rm <edge>` / `tl dep update <edge>` act on an existing edge
//! - `tl dep list`, `blockers`, `order` and `check` are read-only views

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use tasklink_core::error::DependencyError;
use tasklink_core::graph::schedule::ScheduleViolation;
use tasklink_core::service::Blocker;
use tasklink_core::{
    Dependency, DependencyPatch, DependencyService, DependencyType, EdgeId, ErrorCode,
    NewDependency, Scope,
};

use crate::output::{
    CliError, OutputMode, Renderable, fail, pretty_kv, pretty_section, render, render_error,
    render_item, render_list,
};

// ---------------------------------------------------------------------------
// Clap types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepCommand {
    #[command(
        about = "Make one item depend on another",
        after_help = "EXAMPLES:\n    # tk-b starts after tk-a finishes\n    tl dep add tk-b --after tk-a\n\n    # tk-b finishes at least two days after tk-a finishes\n    tl dep add tk-b --after tk-a --type FF --lag 2\n\n    # Overlap by a day\n    tl dep add tk-b --after tk-a --lag -1"
    )]
    Add(DepAddArgs),

    #[command(
        about = "Remove a dependency edge",
        after_help = "EXAMPLES:\n    tl dep rm 12\n    tl dep rm '#12'"
    )]
    Rm(DepRmArgs),

    #[command(
        about = "Change the type or lag of a dependency edge",
        after_help = "EXAMPLES:\n    tl dep update 12 --type SS\n    tl dep update 12 --lag 3"
    )]
    Update(DepUpdateArgs),

    #[command(
        about = "List the edges of an item",
        after_help = "EXAMPLES:\n    # Both directions\n    tl dep list tk-a\n\n    # Only items that wait on tk-a\n    tl dep list tk-a --dependents"
    )]
    List(DepListArgs),

    #[command(
        about = "List unfinished predecessors of an item",
        after_help = "EXAMPLES:\n    tl dep blockers tk-c"
    )]
    Blockers(DepItemArgs),

    #[command(
        about = "Print a project's items in dependency order",
        after_help = "EXAMPLES:\n    tl dep order --project site"
    )]
    Order(DepProjectArgs),

    #[command(
        about = "Scan a project for cycles and schedule violations",
        after_help = "EXAMPLES:\n    tl dep check --project site --json"
    )]
    Check(DepProjectArgs),
}

#[derive(Args, Debug)]
pub struct DepAddArgs {
    /// Item that waits (the successor).
    pub successor: String,

    /// Item it waits on (the predecessor).
    #[arg(long, value_name = "PREDECESSOR")]
    pub after: String,

    /// FS, SS, FF or SF.
    #[arg(long = "type", default_value = "FS", value_name = "TYPE")]
    pub kind: String,

    /// Lead (negative) or lag (positive) in days.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub lag: i32,
}

#[derive(Args, Debug)]
pub struct DepRmArgs {
    /// Edge id, with or without the leading `#`.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DepUpdateArgs {
    pub id: String,

    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub lag: Option<i32>,
}

#[derive(Args, Debug)]
pub struct DepListArgs {
    pub item: String,

    /// Only edges where the item is the predecessor.
    #[arg(long, conflicts_with = "predecessors")]
    pub dependents: bool,

    /// Only edges where the item is the successor.
    #[arg(long)]
    pub predecessors: bool,
}

#[derive(Args, Debug)]
pub struct DepItemArgs {
    pub item: String,
}

#[derive(Args, Debug)]
pub struct DepProjectArgs {
    #[arg(long)]
    pub project: String,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

fn describe(dep: &Dependency) -> String {
    format!(
        "{} -> {} {} {:+}d",
        dep.predecessor_id,
        dep.successor_id,
        dep.dependency_type.short(),
        dep.lag
    )
}

impl Renderable for Dependency {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{:<6} {}", self.id.to_string(), describe(self))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id.0,
            self.predecessor_id,
            self.successor_id,
            self.dependency_type.short(),
            self.lag
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "predecessor", "successor", "type", "lag"]
    }
}

impl Renderable for Blocker {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:<12} {:<12} {}  (via {} {})",
            self.item.id,
            self.item.status.as_str(),
            self.item.title,
            self.dependency.id,
            self.dependency.dependency_type.short()
        )
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            self.item.id,
            self.item.status,
            self.dependency.id.0,
            self.item.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "status", "edge", "title"]
    }
}

#[derive(Debug, Serialize)]
struct DepListing {
    item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    predecessors: Option<Vec<Dependency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependents: Option<Vec<Dependency>>,
}

#[derive(Debug, Serialize)]
struct DepRmOutput {
    ok: bool,
    removed: Dependency,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    project_id: String,
    items: usize,
    edges: usize,
    acyclic: bool,
    cycles: Vec<Vec<String>>,
    violations: Vec<ScheduleViolation>,
}

fn render_listing(listing: &DepListing, w: &mut dyn Write) -> io::Result<()> {
    for (heading, edges) in [
        ("Depends on", &listing.predecessors),
        ("Dependents", &listing.dependents),
    ] {
        let Some(edges) = edges else { continue };
        writeln!(w, "{heading} ({}):", edges.len())?;
        for dep in edges {
            write!(w, "  ")?;
            dep.render_human(w)?;
        }
    }
    Ok(())
}

fn render_check(report: &CheckOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Project {}", report.project_id))?;
    pretty_kv(w, "Items", report.items.to_string())?;
    pretty_kv(w, "Edges", report.edges.to_string())?;
    pretty_kv(w, "Acyclic", if report.acyclic { "yes" } else { "NO" })?;
    for cycle in &report.cycles {
        writeln!(w, "  cycle: {}", cycle.join(", "))?;
    }
    pretty_kv(w, "Violations", report.violations.len().to_string())?;
    for v in &report.violations {
        writeln!(
            w,
            "  {} {} -> {} {} {:+}d: {:?} {} is before {} ({}d)",
            v.edge_id,
            v.predecessor_id,
            v.successor_id,
            v.dependency_type.short(),
            v.lag,
            v.anchor,
            v.actual,
            v.required,
            v.slip_days
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn parse_kind(output: OutputMode, raw: &str) -> Result<DependencyType> {
    raw.parse::<DependencyType>()
        .map_err(|e| fail(output, &DependencyError::from(e)))
}

fn parse_edge(output: OutputMode, raw: &str) -> Result<EdgeId> {
    raw.parse::<EdgeId>()
        .map_err(|e| fail(output, &DependencyError::from(e)))
}

/// Execute `tl dep <subcommand>`.
///
/// # Errors
///
/// Returns an error after reporting any service failure on stderr.
pub fn run_dep(args: &DepArgs, output: OutputMode, svc: &mut DependencyService) -> Result<()> {
    let scope = Scope::All;
    match &args.command {
        DepCommand::Add(a) => {
            let kind = parse_kind(output, &a.kind)?;
            let new = NewDependency::new(&a.successor, &a.after)
                .with_type(kind)
                .with_lag(a.lag);
            let dep = svc
                .add_dependency(&scope, new)
                .map_err(|e| fail(output, &e))?;
            render(output, &dep, |d, w| match output {
                OutputMode::Text => d.render_table(w),
                _ => writeln!(w, "added {} {}", d.id, describe(d)),
            })
        }
        DepCommand::Rm(a) => {
            let id = parse_edge(output, &a.id)?;
            let removed = svc
                .remove_dependency(&scope, id)
                .map_err(|e| fail(output, &e))?;
            let out = DepRmOutput { ok: true, removed };
            render(output, &out, |o, w| {
                writeln!(w, "removed {} {}", o.removed.id, describe(&o.removed))
            })
        }
        DepCommand::Update(a) => {
            let id = parse_edge(output, &a.id)?;
            let dependency_type = a
                .kind
                .as_deref()
                .map(|raw| parse_kind(output, raw))
                .transpose()?;
            let patch = DependencyPatch {
                dependency_type,
                lag: a.lag,
            };
            if patch.is_empty() {
                render_error(
                    output,
                    &CliError::with_details(
                        "nothing to update",
                        "Pass --type and/or --lag.",
                        ErrorCode::InvalidInput.code(),
                    ),
                )?;
                anyhow::bail!("nothing to update");
            }
            let dep = svc
                .update_dependency(&scope, id, patch)
                .map_err(|e| fail(output, &e))?;
            render_item(&dep, output)
        }
        DepCommand::List(a) => {
            let want_preds = !a.dependents;
            let want_deps = !a.predecessors;
            let listing = DepListing {
                item_id: a.item.clone(),
                predecessors: want_preds
                    .then(|| svc.list_predecessors(&scope, &a.item))
                    .transpose()
                    .map_err(|e| fail(output, &e))?,
                dependents: want_deps
                    .then(|| svc.list_dependents(&scope, &a.item))
                    .transpose()
                    .map_err(|e| fail(output, &e))?,
            };
            render(output, &listing, |l, w| match output {
                OutputMode::Text => {
                    for dep in l.predecessors.iter().chain(&l.dependents).flatten() {
                        dep.render_table(w)?;
                    }
                    Ok(())
                }
                _ => render_listing(l, w),
            })
        }
        DepCommand::Blockers(a) => {
            let blockers = svc
                .open_blockers(&scope, &a.item)
                .map_err(|e| fail(output, &e))?;
            render_list(&blockers, output, "(not blocked)")
        }
        DepCommand::Order(a) => {
            let items = svc
                .topological_order(&scope, &a.project)
                .map_err(|e| fail(output, &e))?;
            render_list(&items, output, "(no work items)")
        }
        DepCommand::Check(a) => {
            let report = svc
                .verify_acyclic(&scope, &a.project)
                .map_err(|e| fail(output, &e))?;
            let violations = svc
                .schedule_violations(&scope, &a.project)
                .map_err(|e| fail(output, &e))?;
            let out = CheckOutput {
                acyclic: report.is_acyclic(),
                project_id: report.project_id,
                items: report.items,
                edges: report.edges,
                cycles: report.cycles,
                violations,
            };
            render(output, &out, render_check)?;
            if !out.acyclic {
                anyhow::bail!(
                    "project '{}' has {} dependency cycle(s)",
                    out.project_id,
                    out.cycles.len()
                );
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        cmd: DepCommand,
    }

    #[test]
    fn add_defaults_to_finish_to_start_without_lag() {
        let w = Wrapper::parse_from(["test", "add", "tk-b", "--after", "tk-a"]);
        let DepCommand::Add(args) = w.cmd else {
            panic!("expected add");
        };
        assert_eq!(args.successor, "tk-b");
        assert_eq!(args.after, "tk-a");
        assert_eq!(args.kind, "FS");
        assert_eq!(args.lag, 0);
    }

    #[test]
    fn add_accepts_negative_lag() {
        let w = Wrapper::parse_from([
            "test", "add", "tk-b", "--after", "tk-a", "--type", "ss", "--lag", "-3",
        ]);
        let DepCommand::Add(args) = w.cmd else {
            panic!("expected add");
        };
        assert_eq!(args.lag, -3);
        assert_eq!(args.kind, "ss");
    }

    #[test]
    fn add_requires_predecessor() {
        assert!(Wrapper::try_parse_from(["test", "add", "tk-b"]).is_err());
    }

    #[test]
    fn list_direction_flags_conflict() {
        let res = Wrapper::try_parse_from([
            "test",
            "list",
            "tk-a",
            "--dependents",
            "--predecessors",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn describe_signs_lag() {
        let dep = Dependency {
            id: EdgeId(4),
            successor_id: "tk-b".to_string(),
            predecessor_id: "tk-a".to_string(),
            dependency_type: DependencyType::FinishToStart,
            lag: -2,
            created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        };
        assert_eq!(describe(&dep), "tk-a -> tk-b FS -2d");
    }
}
