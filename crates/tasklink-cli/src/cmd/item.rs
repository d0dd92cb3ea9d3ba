//! `tl item`: create, inspect and retire work items.

use std::io::{self, Write};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;

use tasklink_core::error::DependencyError;
use tasklink_core::{
    DeleteMode, Dependency, DependencyService, NewWorkItem, Scope, Status, WorkItem,
};

use crate::output::{
    OutputMode, Renderable, fail, pretty_kv, pretty_section, render, render_item, render_list,
};

#[derive(Args, Debug)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub command: ItemCommand,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    #[command(
        about = "Create a work item",
        after_help = "EXAMPLES:\n    # Plain item\n    tl item create --project site --title \"Pour foundation\"\n\n    # With planned dates\n    tl item create --project site --title \"Frame walls\" --start 2026-03-02 --end 2026-03-09"
    )]
    Create(CreateArgs),

    #[command(
        about = "Show a work item and its edges",
        after_help = "EXAMPLES:\n    tl item show tk-1a2b3c4d\n\n    # Machine-readable\n    tl item show tk-1a2b3c4d --json"
    )]
    Show(ShowArgs),

    #[command(
        about = "List live work items of a project",
        after_help = "EXAMPLES:\n    tl item list --project site"
    )]
    List(ListArgs),

    #[command(
        about = "Set the status of a work item",
        after_help = "EXAMPLES:\n    tl item status tk-1a2b3c4d in-progress\n    tl item status tk-1a2b3c4d done"
    )]
    Status(StatusArgs),

    #[command(
        about = "Delete a work item and every edge touching it",
        after_help = "EXAMPLES:\n    # Soft delete (row kept, hidden from every view)\n    tl item delete tk-1a2b3c4d\n\n    # Remove the row\n    tl item delete tk-1a2b3c4d --hard"
    )]
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project the item belongs to.
    #[arg(long)]
    pub project: String,

    /// Item title.
    #[arg(long)]
    pub title: String,

    /// Planned start date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Planned end date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub project: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: String,

    /// not-started, in-progress, in-review, done or cancelled.
    pub status: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,

    /// Remove the row instead of flagging it deleted.
    #[arg(long)]
    pub hard: bool,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

impl Renderable for WorkItem {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:<12} {:<12} {} .. {}  {}",
            self.id,
            self.status.as_str(),
            date_or_dash(self.planned_start),
            date_or_dash(self.planned_end),
            self.title
        )
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.project_id,
            self.status,
            date_or_dash(self.planned_start),
            date_or_dash(self.planned_end),
            self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "project", "status", "start", "end", "title"]
    }
}

#[derive(Debug, Serialize)]
struct ItemDetail {
    #[serde(flatten)]
    item: WorkItem,
    predecessors: Vec<Dependency>,
    dependents: Vec<Dependency>,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    ok: bool,
    id: String,
    hard: bool,
    edges_removed: usize,
}

fn render_detail(detail: &ItemDetail, w: &mut dyn Write) -> io::Result<()> {
    let item = &detail.item;
    pretty_section(w, &format!("{}  {}", item.id, item.title))?;
    pretty_kv(w, "Project", &item.project_id)?;
    pretty_kv(w, "Status", item.status.as_str())?;
    pretty_kv(w, "Start", date_or_dash(item.planned_start))?;
    pretty_kv(w, "End", date_or_dash(item.planned_end))?;
    pretty_kv(w, "Created", item.created_at.to_rfc3339())?;

    writeln!(w)?;
    writeln!(w, "Depends on ({}):", detail.predecessors.len())?;
    for dep in &detail.predecessors {
        writeln!(
            w,
            "  {:<6} {} {} lag {}d",
            dep.id.to_string(),
            dep.predecessor_id,
            dep.dependency_type.short(),
            dep.lag
        )?;
    }
    writeln!(w, "Dependents ({}):", detail.dependents.len())?;
    for dep in &detail.dependents {
        writeln!(
            w,
            "  {:<6} {} {} lag {}d",
            dep.id.to_string(),
            dep.successor_id,
            dep.dependency_type.short(),
            dep.lag
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Execute `tl item <subcommand>`.
///
/// # Errors
///
/// Returns an error after reporting any service failure on stderr.
pub fn run_item(args: &ItemArgs, output: OutputMode, svc: &mut DependencyService) -> Result<()> {
    let scope = Scope::All;
    match &args.command {
        ItemCommand::Create(a) => {
            let new = NewWorkItem::new(&a.project, &a.title).planned(a.start, a.end);
            let item = svc.create_work_item(new).map_err(|e| fail(output, &e))?;
            render_item(&item, output)
        }
        ItemCommand::Show(a) => {
            let detail = item_detail(svc, &scope, &a.id).map_err(|e| fail(output, &e))?;
            render(output, &detail, |d, w| match output {
                OutputMode::Text => d.item.render_table(w),
                _ => render_detail(d, w),
            })
        }
        ItemCommand::List(a) => {
            let items = svc
                .list_work_items(&scope, &a.project)
                .map_err(|e| fail(output, &e))?;
            render_list(&items, output, "(no work items)")
        }
        ItemCommand::Status(a) => {
            let status = a
                .status
                .parse::<Status>()
                .map_err(|e| fail(output, &DependencyError::from(e)))?;
            let item = svc
                .set_status(&scope, &a.id, status)
                .map_err(|e| fail(output, &e))?;
            render_item(&item, output)
        }
        ItemCommand::Delete(a) => {
            let mode = if a.hard {
                DeleteMode::Hard
            } else {
                DeleteMode::Soft
            };
            let edges_removed = svc
                .delete_work_item(&scope, &a.id, mode)
                .map_err(|e| fail(output, &e))?;
            let out = DeleteOutput {
                ok: true,
                id: a.id.clone(),
                hard: a.hard,
                edges_removed,
            };
            render(output, &out, |o, w| {
                writeln!(
                    w,
                    "deleted {} ({} edge(s) removed)",
                    o.id, o.edges_removed
                )
            })
        }
    }
}

fn item_detail(
    svc: &DependencyService,
    scope: &Scope,
    id: &str,
) -> tasklink_core::error::Result<ItemDetail> {
    Ok(ItemDetail {
        item: svc.get_work_item(scope, id)?,
        predecessors: svc.list_predecessors(scope, id)?,
        dependents: svc.list_dependents(scope, id)?,
    })
}
