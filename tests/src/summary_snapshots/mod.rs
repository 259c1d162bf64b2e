use codestorm::render::render_summary;
use codestorm::{run_plan, AutoApprove};
use codestorm_core::config::PlannerSettings;
use codestorm_core::orchestrator::ExecutionMode;
use codestorm_core::plan::ProjectPlan;
use codestorm_core::runner::ScriptedRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn test_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn auto_settings() -> PlannerSettings {
    PlannerSettings {
        mode: ExecutionMode::Auto,
        step_delay: Duration::ZERO,
        ..PlannerSettings::default()
    }
}

fn plan(commands: &[&str]) -> ProjectPlan {
    ProjectPlan {
        name: "snapshot".into(),
        steps: commands.iter().map(|command| (*command).into()).collect(),
    }
}

#[test]
fn completed_run_summary() {
    let runtime = test_runtime();
    let runner = ScriptedRunner::new();
    let mut out = Vec::new();
    let snapshot = runtime
        .block_on(run_plan(
            &plan(&["mkdir web", "touch web/index.html"]),
            Arc::new(runner),
            &auto_settings(),
            &mut AutoApprove,
            &mut out,
        ))
        .expect("run plan");

    let expected = "\
Checklist 2/2 (100%)
  [x] step-1 mkdir web
  [x] step-2 touch web/index.html
History
  OK      mkdir web
  OK      touch web/index.html
Inferred structure
  web/
    index.html  (html)
";
    assert_eq!(render_summary(&snapshot), expected);
    let printed = String::from_utf8(out).expect("utf8");
    assert!(printed.starts_with("Starting 2 steps in auto mode\n[1] $ mkdir web\n"));
    assert!(printed.ends_with(expected));
}

#[test]
fn failed_run_summary() {
    let runtime = test_runtime();
    let runner = ScriptedRunner::new().fail("npm install", "exit code 1: ETIMEDOUT");
    let mut out = Vec::new();
    let snapshot = runtime
        .block_on(run_plan(
            &plan(&["npm init -y", "npm install", "npm test"]),
            Arc::new(runner),
            &auto_settings(),
            &mut AutoApprove,
            &mut out,
        ))
        .expect("run plan");

    let expected = "\
Checklist 1/3 (33%)
  [x] step-1 npm init -y
  [ ] step-2 npm install
  [ ] step-3 npm test
History
  OK      npm init -y
  ERROR   npm install
          exit code 1: ETIMEDOUT
Inferred structure
  package.json  (json)
Stopped at step 2. Fix the problem and run again.
";
    assert_eq!(render_summary(&snapshot), expected);
}
