//! mender: autonomous repository repair agent CLI
//!
//! Submits a repair run against a failing repository, streams progress to
//! stdout, and exits non-zero when the run ends in a failed terminal state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use mender_core::{
    init_tracing, DockerSandbox, GitHubPublisher, HttpReasoner, Orchestrator, ProgressKind,
    ProgressSender, ReasonerConfig, RepairRequest, RunStore, Terminal, Workspace, TOKEN_ENV,
};

#[derive(Parser)]
#[command(name = "mender")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autonomous repository repair agent", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the repair loop against a repository and publish the fix
    Run {
        /// Upstream repository URL (https://github.com/<owner>/<repo>)
        #[arg(long)]
        repo: String,

        /// Team identity used in the fix-branch name
        #[arg(long, default_value = "mender")]
        team: String,

        /// Operator identity used in the fix-branch name
        #[arg(long, default_value = "agent")]
        leader: String,

        /// Use an existing working copy instead of cloning
        #[arg(long)]
        local_path: Option<PathBuf>,

        /// Model identifier for the reasoning backend
        #[arg(long)]
        model: Option<String>,

        /// Sandbox wall-clock timeout in seconds
        #[arg(long, default_value = "60")]
        sandbox_timeout: u64,

        /// Print progress events as JSON lines instead of plain text
        #[arg(long)]
        events_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            repo,
            team,
            leader,
            local_path,
            model,
            sandbox_timeout,
            events_json,
        } => {
            run_repair(
                repo,
                team,
                leader,
                local_path,
                model,
                sandbox_timeout,
                events_json,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_repair(
    repo: String,
    team: String,
    leader: String,
    local_path: Option<PathBuf>,
    model: Option<String>,
    sandbox_timeout: u64,
    events_json: bool,
) -> Result<()> {
    let mut reasoner_config = ReasonerConfig::default();
    if let Some(model) = model {
        reasoner_config.model = model;
    }
    let reasoner =
        HttpReasoner::from_env(reasoner_config).context("reasoning backend configuration")?;
    let sandbox = DockerSandbox::new(Duration::from_secs(sandbox_timeout));

    let credential = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
    let publisher = GitHubPublisher::new(credential.clone().unwrap_or_default())
        .context("publisher configuration")?;

    let mut orchestrator =
        Orchestrator::new(Arc::new(reasoner), Arc::new(sandbox), Arc::new(publisher));
    if let Some(token) = credential {
        orchestrator = orchestrator.with_credential(token);
    }

    let request = RepairRequest {
        repo_url: repo.clone(),
        team_name: team,
        leader_name: leader,
    };

    let store = RunStore::new();
    let run_id = store.submit(request.clone());

    let workspace = match local_path {
        Some(path) => Workspace::open(path),
        None => Workspace::clone(&repo).await?,
    };

    let (mut progress, mut events) = ProgressSender::channel(run_id);

    // Drain the progress stream to stdout while the run executes.
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if events_json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("failed to encode event: {e}"),
                }
            } else {
                match event.kind {
                    ProgressKind::Status(status) => println!("status: {status:?}"),
                    ProgressKind::Step(step) => println!("step {step}"),
                    ProgressKind::Log(line) => println!("  {line}"),
                    ProgressKind::Fix(fix) => {
                        println!("  fix: {} ({}) -> {}", fix.file, fix.bug_type, fix.commit_summary)
                    }
                    ProgressKind::Score(score) => println!("score: {}", score.total),
                }
            }
        }
    });

    let report = orchestrator
        .run(run_id, &request, &workspace, &mut progress)
        .await?;
    drop(progress);
    printer.await.ok();

    store.complete(run_id, report.terminal)?;
    tracing::info!(run_id = %run_id, terminal = ?report.terminal, "run finished");

    match report.terminal {
        t if t.is_success() => Ok(()),
        Terminal::FormatExhausted => anyhow::bail!("format-retry budget exhausted"),
        Terminal::RetriesExhausted => anyhow::bail!("logic-retry budget exhausted"),
        Terminal::NoFixes => anyhow::bail!("no fixes to publish"),
        Terminal::AuthFailed => anyhow::bail!("no {TOKEN_ENV} credential available"),
        other => anyhow::bail!("run failed: {other:?}"),
    }
}
