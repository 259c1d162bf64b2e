use codestorm_core::execution::ExecutionStatus;
use codestorm_core::orchestrator::{ExecutionMode, OrchestratorOptions, ProjectOrchestrator};
use codestorm_core::plan::{Database, Framework, ProjectPlan};
use codestorm_core::runner::{ScriptedRunner, ShellCommandRunner};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

#[cfg(unix)]
#[test]
fn shell_plan_creates_files_and_matching_structure() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let plan = ProjectPlan::from_toml(
        r#"
name = "notes"

[[steps]]
command = "mkdir notes"
title = "Create project folder"

[[steps]]
command = "mkdir -p notes/src"

[[steps]]
command = "cd notes && touch src/main.py"
title = "Add entry point"
"#,
    )
    .expect("plan");

    let runner = ShellCommandRunner::new(temp_dir.path());
    let (planner, _events) =
        ProjectOrchestrator::new(Arc::new(runner), OrchestratorOptions::immediate());
    let snapshot = runtime.block_on(async {
        planner
            .start(plan.steps.clone(), ExecutionMode::Auto)
            .expect("start");
        planner.settled().await
    });

    assert!(snapshot.is_finished());
    assert!(temp_dir.path().join("notes/src/main.py").is_file());
    let entry = snapshot
        .structure
        .find("notes/src/main.py")
        .expect("inferred entry");
    assert_eq!(entry.language, "python");
    assert_eq!(snapshot.checklist.items()[2].title, "Add entry point");
}

#[cfg(unix)]
#[test]
fn shell_failure_stops_remaining_steps() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let runner = ShellCommandRunner::new(temp_dir.path());
    let (planner, _events) =
        ProjectOrchestrator::new(Arc::new(runner), OrchestratorOptions::immediate());

    let snapshot = runtime.block_on(async {
        planner
            .start(["mkdir app", "false", "touch app/never.txt"], ExecutionMode::Auto)
            .expect("start");
        planner.settled().await
    });

    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.history[1].status, ExecutionStatus::Error);
    assert_eq!(snapshot.history[1].error.as_deref(), Some("exit code 1"));
    assert!(!temp_dir.path().join("app/never.txt").exists());
    assert!(snapshot.structure.find("app/never.txt").is_none());
    assert!(!snapshot.is_running);
}

#[cfg(unix)]
#[test]
fn timed_out_shell_step_is_killed() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let runner = ShellCommandRunner::new(temp_dir.path());
    let options = OrchestratorOptions {
        step_delay: Duration::ZERO,
        step_timeout: Some(Duration::from_millis(200)),
    };
    let (planner, _events) = ProjectOrchestrator::new(Arc::new(runner), options);

    let snapshot = runtime.block_on(async {
        planner
            .start(["sleep 1; touch late-marker"], ExecutionMode::Auto)
            .expect("start");
        let snapshot = planner.settled().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        snapshot
    });

    assert_eq!(
        snapshot.history[0].error.as_deref(),
        Some("timed out after 200ms")
    );
    assert!(!snapshot.is_running);
    assert!(!temp_dir.path().join("late-marker").exists());
}

#[test]
fn generated_plan_runs_to_completion_with_scripted_runner() {
    let runtime = test_runtime();
    let plan = ProjectPlan::new("shop", Framework::Vite, Database::MongoDb).expect("plan");
    let runner = ScriptedRunner::new();
    let (planner, _events) =
        ProjectOrchestrator::new(Arc::new(runner.clone()), OrchestratorOptions::immediate());

    let snapshot = runtime.block_on(async {
        planner
            .start(plan.steps.clone(), ExecutionMode::Auto)
            .expect("start");
        planner.settled().await
    });

    assert_eq!(runner.seen(), plan.commands());
    assert_eq!(snapshot.history.len(), plan.steps.len());
    assert_eq!(snapshot.checklist.completion_percent(), 100);
    for path in [
        "shop/package.json",
        "shop/src/main.jsx",
        "shop/src/db/index.js",
        "shop/.env",
    ] {
        assert!(snapshot.structure.find(path).is_some(), "missing {path}");
    }
}

#[test]
fn review_toggles_do_not_leak_into_the_run() {
    let runtime = test_runtime();
    let plan = ProjectPlan::new("blog", Framework::React, Database::None).expect("plan");
    let mut review = plan.checklist();
    assert!(review.toggle("step-1"));
    assert_eq!(review.completed_count(), 1);

    let runner = ScriptedRunner::new();
    let (planner, _events) =
        ProjectOrchestrator::new(Arc::new(runner), OrchestratorOptions::immediate());
    runtime.block_on(async {
        planner
            .start(plan.steps.clone(), ExecutionMode::Confirm)
            .expect("start");
    });

    let snapshot = planner.snapshot();
    assert_eq!(snapshot.checklist.completed_count(), 0);
    assert_eq!(snapshot.checklist.len(), review.len());
}
