use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("failed to start `{command}`: {reason}")]
    Spawn { command: String, reason: String },
    #[error("{}", describe_exit(*code, stderr))]
    Exit {
        code: Option<i32>,
        stderr: String,
        output: String,
    },
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// Whatever the command printed before it failed.
    pub fn output(&self) -> &str {
        match self {
            CommandError::Exit { output, .. } => output,
            _ => "",
        }
    }
}

fn describe_exit(code: Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    };
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// Executes one shell command and returns its captured output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, CommandError>;
}

/// Runs commands through a local shell (`sh -c` by default).
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    working_dir: PathBuf,
}

impl ShellCommandRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: working_dir.into(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn execute(&self, command: &str) -> Result<String, CommandError> {
        debug!(shell = %self.shell, cwd = %self.working_dir.display(), %command, "spawning command");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| CommandError::Spawn {
                command: command.to_string(),
                reason: err.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.into_owned();
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            Ok(combined)
        } else {
            Err(CommandError::Exit {
                code: output.status.code(),
                stderr: stderr.into_owned(),
                output: combined,
            })
        }
    }
}

/// Holds a scripted command open until the test releases it.
#[derive(Clone, Default)]
pub struct StepGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl StepGate {
    /// Wait until the runner has picked up the gated command.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct Script {
    outcomes: HashMap<String, Result<String, String>>,
    gates: HashMap<String, StepGate>,
    seen: Vec<String>,
}

/// Canned runner for tests and dry runs. Unscripted commands succeed with
/// empty output.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.script
            .lock()
            .outcomes
            .insert(command.into(), Ok(output.into()));
        self
    }

    pub fn fail(self, command: impl Into<String>, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .outcomes
            .insert(command.into(), Err(message.into()));
        self
    }

    pub fn gate(&self, command: impl Into<String>) -> StepGate {
        let gate = StepGate::default();
        self.script.lock().gates.insert(command.into(), gate.clone());
        gate
    }

    /// Commands in the order they were dispatched.
    pub fn seen(&self) -> Vec<String> {
        self.script.lock().seen.clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, command: &str) -> Result<String, CommandError> {
        let (gate, outcome) = {
            let mut script = self.script.lock();
            script.seen.push(command.to_string());
            (
                script.gates.get(command).cloned(),
                script.outcomes.get(command).cloned(),
            )
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match outcome {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(CommandError::Failed(message)),
            None => Ok(String::new()),
        }
    }
}
