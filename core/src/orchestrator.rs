//! Sequential execution of a project plan.
//!
//! The orchestrator owns the command list, the checklist, the execution
//! history and the inferred structure for one planning session. At most one
//! command is in flight at any time: a step is only dispatched by the single
//! driver task, and a new driver is only spawned once the previous one has
//! finished.

use crate::checklist::Checklist;
use crate::config::PlannerSettings;
use crate::execution::CommandExecution;
use crate::plan::PlanStep;
use crate::runner::{CommandError, CommandRunner};
use crate::structure::{ProjectStructure, StructureInference};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Steps run back to back.
    Auto,
    /// Each step waits for [`ProjectOrchestrator::confirm_next`].
    #[default]
    Confirm,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Auto => f.write_str("auto"),
            ExecutionMode::Confirm => f.write_str("confirm"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Ok(ExecutionMode::Auto),
            "confirm" | "manual" | "step" => Ok(ExecutionMode::Confirm),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("cannot start an empty plan")]
    EmptyPlan,
    #[error("a plan is already running")]
    AlreadyRunning,
    #[error("there is no interrupted step to resume")]
    NothingToResume,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerEvent {
    Started {
        session_id: Uuid,
        mode: ExecutionMode,
        total: usize,
    },
    Resumed {
        session_id: Uuid,
        index: usize,
    },
    StepReady {
        index: usize,
        command: String,
    },
    StepStarted {
        index: usize,
        command: String,
    },
    StepCompleted {
        index: usize,
        output: String,
    },
    StepFailed {
        index: usize,
        command: String,
        error: String,
        output: String,
    },
    Finished {
        session_id: Uuid,
    },
    Cancelled {
        session_id: Uuid,
        index: usize,
    },
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlannerSnapshot {
    pub session_id: Option<Uuid>,
    pub mode: ExecutionMode,
    pub current_index: usize,
    pub is_running: bool,
    pub step_in_flight: bool,
    pub commands: Vec<String>,
    pub history: Vec<CommandExecution>,
    pub checklist: Checklist,
    pub structure: ProjectStructure,
}

impl PlannerSnapshot {
    pub fn total(&self) -> usize {
        self.commands.len()
    }

    pub fn is_finished(&self) -> bool {
        !self.commands.is_empty() && self.checklist.completed_count() == self.commands.len()
    }

    pub fn failed_step(&self) -> Option<&CommandExecution> {
        self.history
            .last()
            .filter(|execution| execution.status == crate::execution::ExecutionStatus::Error)
    }

    pub fn next_command(&self) -> Option<&str> {
        self.commands.get(self.current_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Pause between automatic steps.
    pub step_delay: Duration,
    pub step_timeout: Option<Duration>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        PlannerSettings::default().into()
    }
}

impl OrchestratorOptions {
    pub fn immediate() -> Self {
        Self {
            step_delay: Duration::ZERO,
            step_timeout: None,
        }
    }
}

impl From<PlannerSettings> for OrchestratorOptions {
    fn from(settings: PlannerSettings) -> Self {
        Self {
            step_delay: settings.step_delay,
            step_timeout: settings.step_timeout,
        }
    }
}

struct Session {
    id: Uuid,
    steps: Vec<PlanStep>,
    mode: ExecutionMode,
    current_index: usize,
    is_running: bool,
    in_flight: bool,
    history: Vec<CommandExecution>,
    checklist: Checklist,
    structure: ProjectStructure,
}

impl Session {
    fn new(steps: Vec<PlanStep>, mode: ExecutionMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            checklist: Checklist::from_steps(&steps),
            steps,
            mode,
            current_index: 0,
            is_running: true,
            in_flight: false,
            history: Vec::new(),
            structure: ProjectStructure::default(),
        }
    }
}

#[derive(Default)]
struct InnerState {
    session: Option<Session>,
    driver_active: bool,
}

enum StepOutcome {
    Continue(usize),
    Stop,
}

#[derive(Clone)]
pub struct ProjectOrchestrator {
    inner: Arc<RwLock<InnerState>>,
    runner: Arc<dyn CommandRunner>,
    inference: Arc<StructureInference>,
    options: OrchestratorOptions,
    events_tx: UnboundedSender<PlannerEvent>,
    revision: Arc<watch::Sender<u64>>,
}

impl ProjectOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        options: OrchestratorOptions,
    ) -> (Self, UnboundedReceiver<PlannerEvent>) {
        let (events_tx, events_rx) = unbounded_channel();
        let (revision, _) = watch::channel(0);
        (
            Self {
                inner: Arc::new(RwLock::new(InnerState::default())),
                runner,
                inference: Arc::new(StructureInference::default()),
                options,
                events_tx,
                revision: Arc::new(revision),
            },
            events_rx,
        )
    }

    pub fn with_inference(mut self, inference: StructureInference) -> Self {
        self.inference = Arc::new(inference);
        self
    }

    /// Begin a fresh session. Auto mode dispatches the first step right away;
    /// confirm mode announces it and waits for [`Self::confirm_next`].
    pub fn start<I, S>(&self, steps: I, mode: ExecutionMode) -> Result<(), PlannerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<PlanStep>,
    {
        let steps: Vec<PlanStep> = steps.into_iter().map(Into::into).collect();
        if steps.is_empty() {
            return Err(PlannerError::EmptyPlan);
        }

        let (session_id, first_command, total) = {
            let mut inner = self.inner.write();
            let busy = inner
                .session
                .as_ref()
                .map(|session| session.is_running)
                .unwrap_or(false);
            if busy || inner.driver_active {
                return Err(PlannerError::AlreadyRunning);
            }
            let session = Session::new(steps, mode);
            let ids = (session.id, session.steps[0].command.clone(), session.steps.len());
            inner.session = Some(session);
            if mode == ExecutionMode::Auto {
                inner.driver_active = true;
            }
            ids
        };

        info!(session = %session_id, %mode, steps = total, "planner session started");
        self.emit(PlannerEvent::Started {
            session_id,
            mode,
            total,
        });
        match mode {
            ExecutionMode::Auto => self.spawn_driver(session_id, 0),
            ExecutionMode::Confirm => self.emit(PlannerEvent::StepReady {
                index: 0,
                command: first_command,
            }),
        }
        self.bump();
        Ok(())
    }

    /// Run the announced step in confirm mode. Returns `false` without doing
    /// anything when the session is not waiting for a confirmation.
    pub fn confirm_next(&self) -> bool {
        let (session_id, index) = {
            let mut inner = self.inner.write();
            if inner.driver_active {
                return false;
            }
            let ready = match inner.session.as_ref() {
                Some(session)
                    if session.mode == ExecutionMode::Confirm
                        && session.is_running
                        && !session.in_flight
                        && session.current_index < session.steps.len() =>
                {
                    Some((session.id, session.current_index))
                }
                _ => None,
            };
            let Some(ready) = ready else {
                return false;
            };
            inner.driver_active = true;
            ready
        };
        self.spawn_driver(session_id, index);
        true
    }

    /// Stop scheduling further steps. A step already in flight still runs to
    /// completion and is recorded; nothing is rolled back.
    pub fn cancel(&self) {
        let cancelled = {
            let mut inner = self.inner.write();
            match inner.session.as_mut() {
                Some(session) if session.is_running => {
                    session.is_running = false;
                    Some((session.id, session.current_index))
                }
                _ => None,
            }
        };
        if let Some((session_id, index)) = cancelled {
            warn!(session = %session_id, index, "planner session cancelled");
            self.emit(PlannerEvent::Cancelled { session_id, index });
            self.bump();
        }
    }

    /// Continue an interrupted session from its current step, keeping the
    /// history and checklist gathered so far.
    pub fn resume(&self) -> Result<(), PlannerError> {
        let (session_id, mode, index, command) = {
            let mut inner = self.inner.write();
            if inner.driver_active {
                return Err(PlannerError::AlreadyRunning);
            }
            let session = inner.session.as_mut().ok_or(PlannerError::NothingToResume)?;
            if session.is_running {
                return Err(PlannerError::AlreadyRunning);
            }
            let index = session.current_index;
            let command = session
                .steps
                .get(index)
                .map(|step| step.command.clone())
                .ok_or(PlannerError::NothingToResume)?;
            session.is_running = true;
            let resumed = (session.id, session.mode, index, command);
            if resumed.1 == ExecutionMode::Auto {
                inner.driver_active = true;
            }
            resumed
        };

        info!(session = %session_id, index, "planner session resumed");
        self.emit(PlannerEvent::Resumed { session_id, index });
        match mode {
            ExecutionMode::Auto => self.spawn_driver(session_id, index),
            ExecutionMode::Confirm => self.emit(PlannerEvent::StepReady { index, command }),
        }
        self.bump();
        Ok(())
    }

    pub fn snapshot(&self) -> PlannerSnapshot {
        let inner = self.inner.read();
        match &inner.session {
            Some(session) => PlannerSnapshot {
                session_id: Some(session.id),
                mode: session.mode,
                current_index: session.current_index,
                is_running: session.is_running,
                step_in_flight: session.in_flight,
                commands: session.steps.iter().map(|step| step.command.clone()).collect(),
                history: session.history.clone(),
                checklist: session.checklist.clone(),
                structure: session.structure.clone(),
            },
            None => PlannerSnapshot::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .read()
            .session
            .as_ref()
            .map(|session| session.is_running)
            .unwrap_or(false)
    }

    /// Resolve once no step is executing or scheduled.
    pub async fn settled(&self) -> PlannerSnapshot {
        let mut revisions = self.revision.subscribe();
        loop {
            if !self.inner.read().driver_active {
                return self.snapshot();
            }
            if revisions.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    fn spawn_driver(&self, session_id: Uuid, index: usize) {
        let this = self.clone();
        tokio::spawn(async move { this.drive(session_id, index).await });
    }

    async fn drive(self, session_id: Uuid, mut index: usize) {
        loop {
            match self.execute_step(session_id, index).await {
                StepOutcome::Continue(next) => {
                    if !self.options.step_delay.is_zero() {
                        tokio::time::sleep(self.options.step_delay).await;
                    }
                    index = next;
                }
                StepOutcome::Stop => break,
            }
        }
    }

    async fn execute_step(&self, session_id: Uuid, index: usize) -> StepOutcome {
        let command = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let Some(session) = inner.session.as_mut().filter(|s| s.id == session_id) else {
                inner.driver_active = false;
                return self.stopped();
            };
            if !session.is_running {
                inner.driver_active = false;
                return self.stopped();
            }
            let Some(command) = session.steps.get(index).map(|step| step.command.clone()) else {
                inner.driver_active = false;
                return self.stopped();
            };
            let mut execution = CommandExecution::new(index, command.clone());
            execution.mark_running();
            session.history.push(execution);
            session.current_index = index;
            session.in_flight = true;
            command
        };

        info!(session = %session_id, index, %command, "running step");
        self.emit(PlannerEvent::StepStarted {
            index,
            command: command.clone(),
        });
        self.bump();

        let result = match self.options.step_timeout {
            Some(limit) => tokio::time::timeout(limit, self.runner.execute(&command))
                .await
                .unwrap_or(Err(CommandError::TimedOut(limit))),
            None => self.runner.execute(&command).await,
        };

        let mut events = Vec::new();
        let outcome = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let Some(session) = inner.session.as_mut().filter(|s| s.id == session_id) else {
                inner.driver_active = false;
                return self.stopped();
            };
            session.in_flight = false;
            let Some(record) = session.history.last_mut() else {
                inner.driver_active = false;
                return self.stopped();
            };

            let outcome = match result {
                Ok(output) => {
                    record.complete(output.clone());
                    session.checklist.mark_completed(index);
                    let added = session.structure.apply(self.inference.infer(&command));
                    info!(session = %session_id, index, inferred = added, "step completed");
                    events.push(PlannerEvent::StepCompleted { index, output });

                    let next = index + 1;
                    session.current_index = next;
                    if next >= session.steps.len() {
                        session.is_running = false;
                        info!(session = %session_id, "planner session finished");
                        events.push(PlannerEvent::Finished { session_id });
                        StepOutcome::Stop
                    } else if !session.is_running {
                        StepOutcome::Stop
                    } else {
                        match session.mode {
                            ExecutionMode::Auto => StepOutcome::Continue(next),
                            ExecutionMode::Confirm => {
                                events.push(PlannerEvent::StepReady {
                                    index: next,
                                    command: session.steps[next].command.clone(),
                                });
                                StepOutcome::Stop
                            }
                        }
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    record.fail(message.clone(), err.output());
                    session.is_running = false;
                    warn!(session = %session_id, index, %command, error = %message, "step failed");
                    events.push(PlannerEvent::StepFailed {
                        index,
                        command: command.clone(),
                        error: message,
                        output: err.output().to_string(),
                    });
                    StepOutcome::Stop
                }
            };
            // Cleared before StepReady goes out so the listener can confirm
            // straight away. Events are queued under the lock so `settled`
            // never resolves ahead of them.
            if matches!(outcome, StepOutcome::Stop) {
                inner.driver_active = false;
            }
            for event in events {
                self.emit(event);
            }
            outcome
        };

        self.bump();
        outcome
    }

    fn stopped(&self) -> StepOutcome {
        self.bump();
        StepOutcome::Stop
    }

    fn emit(&self, event: PlannerEvent) {
        self.events_tx.send(event).ok();
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
