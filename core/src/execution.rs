use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One dispatched command and what came back from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandExecution {
    pub index: usize,
    pub command: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CommandExecution {
    pub fn new(index: usize, command: impl Into<String>) -> Self {
        Self {
            index,
            command: command.into(),
            status: ExecutionStatus::Pending,
            output: String::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    pub fn complete(&mut self, output: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Completed;
        self.output = output.into();
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>, output: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Error;
        self.error = Some(error.into());
        self.output = output.into();
        self.finished_at = Some(Utc::now());
    }
}
