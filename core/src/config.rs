use crate::orchestrator::ExecutionMode;
use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_STEP_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    pub mode: ExecutionMode,
    pub step_delay: Duration,
    pub step_timeout: Option<Duration>,
    pub shell: String,
    pub working_dir: Option<PathBuf>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Confirm,
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            step_timeout: None,
            shell: "sh".to_string(),
            working_dir: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(detail) => format!("Planner not configured: {detail}. Update codestorm.yaml."),
        }
    }
}

impl PlannerSettings {
    /// Load settings from the first `codestorm.yaml` found, or defaults when none exists.
    pub fn load() -> Result<Self, ConfigError> {
        match locate_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: CodestormConfig = serde_yaml::from_str(contents)
            .map_err(|err| ConfigError::Invalid(format!("invalid codestorm.yaml: {err}")))?;
        resolve_planner_settings(config.planner.unwrap_or_default())
    }
}

fn resolve_planner_settings(section: PlannerSection) -> Result<PlannerSettings, ConfigError> {
    let defaults = PlannerSettings::default();
    let shell = match section.shell {
        Some(shell) if shell.trim().is_empty() => {
            return Err(ConfigError::Invalid("planner shell cannot be empty".to_string()))
        }
        Some(shell) => shell.trim().to_string(),
        None => defaults.shell,
    };
    let step_timeout = match section.step_timeout_secs {
        Some(0) => {
            return Err(ConfigError::Invalid(
                "step_timeout_secs must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };
    Ok(PlannerSettings {
        mode: section.mode.unwrap_or(defaults.mode),
        step_delay: section
            .step_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.step_delay),
        step_timeout,
        shell,
        working_dir: section.working_dir,
    })
}

/// Directory holding `codestorm.yaml` and `keys.json`.
pub fn config_dir() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.config_dir().join("codestorm")
    } else {
        PathBuf::from(".codestorm")
    }
}

fn locate_config_file() -> Option<PathBuf> {
    codestorm_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn codestorm_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("codestorm");
        paths.push(config_dir.join("codestorm.yaml"));
        paths.push(config_dir.join("codestorm.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".codestorm").join("codestorm.yaml"));
        paths.push(home_dir.join(".codestorm").join("codestorm.yml"));
    } else {
        paths.push(PathBuf::from("codestorm.yaml"));
        paths.push(PathBuf::from("codestorm.yml"));
    }
    paths
}

#[derive(Debug, Deserialize)]
struct CodestormConfig {
    planner: Option<PlannerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct PlannerSection {
    #[serde(default)]
    mode: Option<ExecutionMode>,
    #[serde(default)]
    step_delay_ms: Option<u64>,
    #[serde(default)]
    step_timeout_secs: Option<u64>,
    #[serde(default)]
    shell: Option<String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
}
