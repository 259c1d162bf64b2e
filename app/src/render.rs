use codestorm_core::checklist::Checklist;
use codestorm_core::execution::{CommandExecution, ExecutionStatus};
use codestorm_core::orchestrator::{PlannerEvent, PlannerSnapshot};
use codestorm_core::plan::ProjectPlan;
use codestorm_core::structure::ProjectStructure;

const OUTPUT_TAIL_LINES: usize = 8;

pub fn render_plan(plan: &ProjectPlan) -> String {
    let mut out = format!("Plan for {} ({} steps)\n", plan.name, plan.steps.len());
    for (index, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("{:>3}. {}\n     $ {}\n", index + 1, step.title, step.command));
        if !step.description.is_empty() {
            out.push_str(&format!("     {}\n", step.description));
        }
    }
    out
}

pub fn render_checklist(checklist: &Checklist) -> String {
    let mut out = format!(
        "Checklist {}/{} ({}%)\n",
        checklist.completed_count(),
        checklist.len(),
        checklist.completion_percent()
    );
    for item in checklist.items() {
        let mark = if item.completed { "x" } else { " " };
        out.push_str(&format!("  [{mark}] {} {}\n", item.id, item.title));
    }
    out
}

pub fn render_history(history: &[CommandExecution]) -> String {
    let mut out = String::new();
    for execution in history {
        let badge = match execution.status {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "OK",
            ExecutionStatus::Error => "ERROR",
        };
        out.push_str(&format!("  {badge:<7} {}\n", execution.command));
        if let Some(error) = &execution.error {
            out.push_str(&format!("          {error}\n"));
        }
    }
    out
}

/// Indented tree, sorted by path so children follow their parents.
pub fn render_structure(structure: &ProjectStructure) -> String {
    let mut entries: Vec<_> = structure.entries().iter().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let mut out = String::new();
    for entry in entries {
        let depth = entry.path.matches('/').count();
        let suffix = if entry.is_directory { "/" } else { "" };
        out.push_str(&"  ".repeat(depth + 1));
        out.push_str(&entry.name);
        out.push_str(suffix);
        if !entry.is_directory && entry.language != "plaintext" {
            out.push_str(&format!("  ({})", entry.language));
        }
        out.push('\n');
    }
    out
}

pub fn render_event(event: &PlannerEvent) -> Option<String> {
    match event {
        PlannerEvent::Started { mode, total, .. } => {
            Some(format!("Starting {total} steps in {mode} mode"))
        }
        PlannerEvent::Resumed { index, .. } => Some(format!("Resuming at step {}", index + 1)),
        PlannerEvent::StepReady { .. } => None,
        PlannerEvent::StepStarted { index, command } => {
            Some(format!("[{}] $ {command}", index + 1))
        }
        PlannerEvent::StepCompleted { output, .. } => {
            let tail = tail_lines(output, OUTPUT_TAIL_LINES);
            if tail.is_empty() {
                None
            } else {
                Some(tail)
            }
        }
        PlannerEvent::StepFailed {
            index,
            command,
            error,
            output,
        } => {
            let mut message = format!("Step {} failed: {command}\n  {error}", index + 1);
            let tail = tail_lines(output, OUTPUT_TAIL_LINES);
            if !tail.is_empty() {
                message.push('\n');
                message.push_str(&tail);
            }
            Some(message)
        }
        PlannerEvent::Finished { .. } => Some("All steps completed.".to_string()),
        PlannerEvent::Cancelled { index, .. } => {
            Some(format!("Cancelled before step {}.", index + 1))
        }
    }
}

pub fn render_summary(snapshot: &PlannerSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&render_checklist(&snapshot.checklist));
    if !snapshot.history.is_empty() {
        out.push_str("History\n");
        out.push_str(&render_history(&snapshot.history));
    }
    if !snapshot.structure.is_empty() {
        out.push_str("Inferred structure\n");
        out.push_str(&render_structure(&snapshot.structure));
    }
    if let Some(failed) = snapshot.failed_step() {
        out.push_str(&format!(
            "Stopped at step {}. Fix the problem and run again.\n",
            failed.index + 1
        ));
    }
    out
}

fn tail_lines(output: &str, count: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..]
        .iter()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
