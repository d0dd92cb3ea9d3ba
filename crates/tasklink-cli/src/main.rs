#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tasklink_core::ErrorCode;
use tasklink_core::config::resolve_config;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "tl",
    author,
    version,
    about = "tasklink: cycle-safe task dependencies",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Start project discovery here instead of the current directory.
    #[arg(long, global = true, value_name = "PATH")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a tasklink project",
        long_about = "Create .tasklink/ with a default config.toml and a migrated store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tl init\n\n    # Rewrite config.toml, keep the store\n    tl init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Items",
        about = "Manage work items",
        after_help = "EXAMPLES:\n    tl item create --project site --title \"Pour foundation\"\n    tl item list --project site"
    )]
    Item(cmd::item::ItemArgs),

    #[command(
        next_help_heading = "Dependencies",
        about = "Manage dependency edges",
        after_help = "EXAMPLES:\n    tl dep add tk-b --after tk-a\n    tl dep list tk-a\n    tl dep order --project site"
    )]
    Dep(cmd::dep::DepArgs),

    #[command(
        next_help_heading = "Utilities",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    tl completions bash > ~/.local/share/bash-completion/completions/tl"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TASKLINK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tasklink=debug,info"
        } else {
            "tasklink=info,warn"
        })
    });

    let format = env::var("TASKLINK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let start = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let root = cmd::find_project_root(&start);

    let project = match root.map(|root| resolve_config(&root).map(|config| (root, config))) {
        None => None,
        Some(Ok((root, config))) => Some(cmd::Project { root, config }),
        Some(Err(err)) => {
            let code = ErrorCode::ConfigParseError;
            render_error(
                resolve_output_mode(cli.format, cli.json, None),
                &CliError::with_details(
                    format!("{err:#}"),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            return Err(err);
        }
    };

    let output = resolve_output_mode(
        cli.format,
        cli.json,
        project
            .as_ref()
            .and_then(|p| p.config.project.output.format.as_deref()),
    );
    if cli.verbose {
        info!(?output, root = ?project.as_ref().map(|p| &p.root), "resolved invocation");
    }

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &start),
        Commands::Item(ref args) => {
            let mut svc = cmd::open_service(project.as_ref(), output)?;
            cmd::item::run_item(args, output, &mut svc)
        }
        Commands::Dep(ref args) => {
            let mut svc = cmd::open_service(project.as_ref(), output)?;
            cmd::dep::run_dep(args, output, &mut svc)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tl", "item", "list", "--project", "site", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Item(_)));
    }

    #[test]
    fn format_flag_parses_value_enum() {
        let cli = Cli::parse_from(["tl", "--format", "text", "dep", "order", "--project", "p"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn project_dir_flag() {
        let cli = Cli::parse_from(["tl", "--project-dir", "/tmp/site", "init"]);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/tmp/site")));
    }

    #[test]
    fn completions_requires_known_shell() {
        assert!(Cli::try_parse_from(["tl", "completions", "bash"]).is_ok());
        assert!(Cli::try_parse_from(["tl", "completions", "tcsh"]).is_err());
    }
}
