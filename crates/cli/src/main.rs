use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use conveyor_core::pipeline_manager::{PipelineManager, PipelineManagerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;

/// Conveyor - A task runner for front-end asset pipelines
#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Run and watch front-end asset pipeline tasks")]
#[command(version)]
struct Cli {
    /// Task to run (defaults to the pipeline's default task)
    task: Option<String>,

    /// Path to the pipeline root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Keep watching for changes after the initial run
    #[arg(short, long)]
    watch: bool,

    /// Show the execution plan without running it
    #[arg(long, conflicts_with_all = ["watch", "tasks", "graph", "schema"])]
    plan: bool,

    /// List the pipeline's tasks
    #[arg(long, conflicts_with_all = ["watch", "graph", "schema"])]
    tasks: bool,

    /// Show the task dependency graph
    #[arg(long, conflicts_with_all = ["watch", "schema"])]
    graph: bool,

    /// Print the JSON schema of the pipeline configuration
    #[arg(long, conflicts_with = "watch")]
    schema: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit status for a run killed by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel `token` on the first Ctrl-C; started tasks are allowed to finish.
/// A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
            return;
        }
        tracing::info!("interrupt received, finishing running tasks");
        eprintln!("Interrupted; waiting for running tasks (Ctrl-C again to force exit)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt received, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.schema {
        return commands::schema::execute();
    }

    // Initialize pipeline manager with all business logic
    let manager = PipelineManager::new(PipelineManagerConfig {
        pipeline_root: cli.root,
    })
    .map_err(|e| anyhow::anyhow!("Failed to load pipeline: {}", e))?;

    cancel_on_ctrl_c(manager.cancellation_token());

    // Execute command (CLI layer only handles presentation)
    let task = cli.task.as_deref();
    if cli.plan {
        commands::plan::execute(&manager, task)
    } else if cli.tasks {
        commands::list::execute(&manager)
    } else if cli.graph {
        commands::graph::execute(&manager)
    } else {
        commands::run::execute(&manager, task, cli.watch).await
    }
}
