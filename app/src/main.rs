use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use codestorm::{
    apply_overrides, load_planner_settings, open_key_store, render, run_plan, AutoApprove,
    Confirmer, RunOverrides, Scope, StdinConfirmer,
};
use codestorm_core::assistant::{AssistantGateway, AssistantRequest, ProviderKind};
use codestorm_core::orchestrator::ExecutionMode;
use codestorm_core::plan::{Database, Framework, ProjectPlan};
use codestorm_core::runner::{CommandRunner, ScriptedRunner, ShellCommandRunner};
use codestorm_core::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "codestorm", version, about = "Plan and scaffold new projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Read settings and keys from <DIR>/.codestorm instead of the user config directory.
    #[arg(long, global = true)]
    project: Option<PathBuf>,
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the steps and checklist for a selection without running anything.
    Plan {
        #[command(flatten)]
        source: PlanSource,
        /// Mark checklist items as done before printing (review only).
        #[arg(long = "toggle", value_name = "ID")]
        toggles: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Execute a plan step by step.
    Run {
        #[command(flatten)]
        source: PlanSource,
        #[arg(long)]
        mode: Option<ExecutionMode>,
        /// Answer yes to every confirmation.
        #[arg(long, short)]
        yes: bool,
        /// Record the commands without executing them.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        delay_ms: Option<u64>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        shell: Option<String>,
        /// Print the final state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Manage AI provider API keys.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Send a prompt through the assistant gateway.
    Ask {
        prompt: String,
        #[arg(long, default_value = "mock")]
        provider: ProviderKind,
        /// Attach a file as code context.
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    List,
    Set { provider: ProviderKind, key: String },
    Remove { provider: ProviderKind },
}

#[derive(Args, Debug)]
struct PlanSource {
    /// TOML plan file; replaces the framework selection.
    #[arg(long, conflicts_with_all = ["name", "framework", "database"])]
    file: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    framework: Option<Framework>,
    #[arg(long, default_value = "none")]
    database: Database,
}

impl PlanSource {
    fn resolve(&self) -> anyhow::Result<ProjectPlan> {
        if let Some(path) = &self.file {
            return Ok(ProjectPlan::from_file(path)?);
        }
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| anyhow!("--name is required unless --file is given"))?;
        let framework = self
            .framework
            .ok_or_else(|| anyhow!("--framework is required unless --file is given"))?;
        Ok(ProjectPlan::new(name, framework, self.database)?)
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_tracing(telemetry::default_filter(cli.verbose))?;

    let scope = match &cli.project {
        Some(path) => Scope::Project(path.clone()),
        None => Scope::User,
    };

    match cli.command {
        Command::Plan {
            source,
            toggles,
            json,
        } => {
            let plan = source.resolve()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }
            let mut checklist = plan.checklist();
            for id in &toggles {
                if !checklist.toggle(id) {
                    tracing::warn!(%id, "no checklist item with that id");
                }
            }
            print!("{}", render::render_plan(&plan));
            print!("{}", render::render_checklist(&checklist));
        }
        Command::Run {
            source,
            mode,
            yes,
            dry_run,
            dir,
            delay_ms,
            timeout_secs,
            shell,
            json,
        } => {
            let plan = source.resolve()?;
            let overrides = RunOverrides {
                mode,
                step_delay_ms: delay_ms,
                step_timeout_secs: timeout_secs,
                shell,
                working_dir: dir,
            };
            let settings = apply_overrides(load_planner_settings(&scope)?, &overrides);
            let runner: Arc<dyn CommandRunner> = if dry_run {
                Arc::new(ScriptedRunner::new())
            } else {
                let working_dir = codestorm::config::resolve_working_dir(&settings)?;
                Arc::new(ShellCommandRunner::new(working_dir).with_shell(settings.shell.clone()))
            };
            let runtime = Runtime::new()?;
            let mut confirmer: Box<dyn Confirmer> = if yes {
                Box::new(AutoApprove)
            } else {
                Box::new(StdinConfirmer::new())
            };

            let snapshot = if json {
                let mut sink = std::io::sink();
                runtime.block_on(run_plan(&plan, runner, &settings, confirmer.as_mut(), &mut sink))?
            } else {
                let mut stdout = std::io::stdout();
                runtime.block_on(run_plan(&plan, runner, &settings, confirmer.as_mut(), &mut stdout))?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            if snapshot.failed_step().is_some() {
                std::process::exit(1);
            }
        }
        Command::Keys { action } => {
            let keys = open_key_store(&scope)?;
            match action {
                KeysAction::List => {
                    for provider in ProviderKind::REMOTE {
                        let state = if keys.has_key(provider) { "configured" } else { "missing" };
                        println!("{:<14} {state}", provider.label());
                    }
                }
                KeysAction::Set { provider, key } => {
                    keys.set_key(provider, &key)
                        .with_context(|| format!("failed to store key for {provider}"))?;
                    println!("Saved key for {provider}");
                }
                KeysAction::Remove { provider } => {
                    keys.clear_key(provider)?;
                    println!("Removed key for {provider}");
                }
            }
        }
        Command::Ask {
            prompt,
            provider,
            file,
            model,
        } => {
            let gateway = AssistantGateway::new(open_key_store(&scope)?);
            let mut request = AssistantRequest::new(prompt);
            if let Some(path) = file {
                let code = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                request = request.with_code(code);
            }
            if let Some(model) = model {
                request = request.with_model(model);
            }
            let runtime = Runtime::new()?;
            match runtime.block_on(gateway.generate(provider, &request)) {
                Ok(reply) => println!("{reply}"),
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
