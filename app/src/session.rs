use crate::render::{render_event, render_summary};
use anyhow::{bail, Result};
use async_trait::async_trait;
use codestorm_core::config::PlannerSettings;
use codestorm_core::orchestrator::{
    ExecutionMode, OrchestratorOptions, PlannerEvent, PlannerSnapshot, ProjectOrchestrator,
};
use codestorm_core::plan::ProjectPlan;
use codestorm_core::runner::CommandRunner;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Asked before each step in confirm mode.
#[async_trait]
pub trait Confirmer: Send {
    async fn confirm(&mut self, index: usize, command: &str) -> Result<bool>;
}

/// Says yes to everything (`--yes`).
pub struct AutoApprove;

#[async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&mut self, _index: usize, _command: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Prompts on the terminal; anything but `y`/`yes`/empty cancels.
pub struct StdinConfirmer {
    lines: tokio::io::Lines<BufReader<tokio::io::Stdin>>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&mut self, index: usize, command: &str) -> Result<bool> {
        print!("Run step {}: `{command}`? [Y/n] ", index + 1);
        std::io::stdout().flush()?;
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "" | "y" | "yes"
        ))
    }
}

/// Drive `plan` to completion, failure or cancellation, printing progress to `out`.
pub async fn run_plan(
    plan: &ProjectPlan,
    runner: Arc<dyn CommandRunner>,
    settings: &PlannerSettings,
    confirmer: &mut dyn Confirmer,
    out: &mut (dyn Write + Send),
) -> Result<PlannerSnapshot> {
    let (orchestrator, mut events) =
        ProjectOrchestrator::new(runner, OrchestratorOptions::from(settings.clone()));
    orchestrator.start(plan.steps.clone(), settings.mode)?;

    while let Some(event) = events.recv().await {
        if let Some(line) = render_event(&event) {
            writeln!(out, "{line}")?;
        }
        match event {
            PlannerEvent::StepReady { index, command } => {
                if settings.mode != ExecutionMode::Confirm {
                    continue;
                }
                if confirmer.confirm(index, &command).await? {
                    if !orchestrator.confirm_next() {
                        bail!("planner is not waiting to run step {}", index + 1);
                    }
                } else {
                    orchestrator.cancel();
                    writeln!(out, "Stopped by user before step {}.", index + 1)?;
                    break;
                }
            }
            PlannerEvent::Finished { .. } | PlannerEvent::StepFailed { .. } => break,
            _ => {}
        }
    }

    let snapshot = orchestrator.settled().await;
    while let Ok(event) = events.try_recv() {
        if let Some(line) = render_event(&event) {
            writeln!(out, "{line}")?;
        }
    }
    write!(out, "{}", render_summary(&snapshot))?;
    Ok(snapshot)
}
