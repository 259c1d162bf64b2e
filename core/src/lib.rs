pub mod assistant;
pub mod checklist;
pub mod config;
pub mod execution;
pub mod keys;
pub mod orchestrator;
pub mod plan;
pub mod runner;
pub mod structure;
pub mod telemetry;

pub use assistant::{AssistantGateway, AssistantRequest, CodeAssistant, ProviderKind};
pub use checklist::{Checklist, ChecklistItem};
pub use config::PlannerSettings;
pub use execution::{CommandExecution, ExecutionStatus};
pub use keys::{ApiKeyStore, FileKeyStore, InMemoryKeyStore, KeyValueStore};
pub use orchestrator::{
    ExecutionMode, OrchestratorOptions, PlannerError, PlannerEvent, PlannerSnapshot,
    ProjectOrchestrator,
};
pub use plan::{Database, Framework, PlanStep, ProjectPlan};
pub use runner::{CommandError, CommandRunner, ScriptedRunner, ShellCommandRunner};
pub use structure::{ProjectStructure, ProjectStructureEntry, StructureInference, StructureRule};
