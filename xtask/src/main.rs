use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use codestorm_core::orchestrator::{ExecutionMode, OrchestratorOptions, ProjectOrchestrator};
use codestorm_core::plan::{Database, Framework, ProjectPlan};
use codestorm_core::runner::{CommandRunner, ScriptedRunner, ShellCommandRunner};
use codestorm_core::telemetry;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Codestorm")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every generated plan through the orchestrator with a scripted runner.
    Smoke {
        /// Also run a small mkdir/touch plan through the real shell in a temp dir.
        #[arg(long)]
        shell: bool,
    },
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke { shell } => smoke_test(shell),
    }
}

fn smoke_test(shell: bool) -> Result<()> {
    let runtime = Runtime::new()?;

    for framework in Framework::ALL {
        let plan = ProjectPlan::new("smoke-app", framework, Database::PostgreSql)?;
        run(&runtime, &plan, Arc::new(ScriptedRunner::new()))?;
    }

    if shell {
        let temp_dir = TempDir::new()?;
        let plan = ProjectPlan {
            name: "smoke-shell".into(),
            steps: vec![
                "mkdir -p smoke-shell/src".into(),
                "cd smoke-shell && touch src/main.rs".into(),
                "ls smoke-shell/src".into(),
            ],
        };
        run(&runtime, &plan, Arc::new(ShellCommandRunner::new(temp_dir.path())))?;
    }

    Ok(())
}

fn run(runtime: &Runtime, plan: &ProjectPlan, runner: Arc<dyn CommandRunner>) -> Result<()> {
    let (planner, _events) = ProjectOrchestrator::new(runner, OrchestratorOptions::immediate());
    let snapshot = runtime.block_on(async {
        planner.start(plan.steps.clone(), ExecutionMode::Auto)?;
        anyhow::Ok(planner.settled().await)
    })?;

    if let Some(failed) = snapshot.failed_step() {
        bail!(
            "{}: step {} `{}` failed: {}",
            plan.name,
            failed.index + 1,
            failed.command,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    info!(
        plan = %plan.name,
        "steps" = snapshot.history.len(),
        "entries" = snapshot.structure.len(),
        "smoke plan finished"
    );
    Ok(())
}
