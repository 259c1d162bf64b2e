use anyhow::{Context, Result};
use codestorm_core::config::{config_dir, PlannerSettings};
use codestorm_core::keys::{ApiKeyStore, FileKeyStore};
use codestorm_core::orchestrator::ExecutionMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    User,
    Project(PathBuf),
}

/// Command-line values that win over `codestorm.yaml`.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub mode: Option<ExecutionMode>,
    pub step_delay_ms: Option<u64>,
    pub step_timeout_secs: Option<u64>,
    pub shell: Option<String>,
    pub working_dir: Option<PathBuf>,
}

pub fn load_planner_settings(scope: &Scope) -> Result<PlannerSettings> {
    let loaded = match scope {
        Scope::User => PlannerSettings::load(),
        Scope::Project(root) => {
            let path = project_dir(root).join("codestorm.yaml");
            if path.exists() {
                PlannerSettings::load_from(&path)
            } else {
                PlannerSettings::load()
            }
        }
    };
    loaded.map_err(|err| anyhow::anyhow!(err.user_message()))
}

pub fn apply_overrides(mut settings: PlannerSettings, overrides: &RunOverrides) -> PlannerSettings {
    if let Some(mode) = overrides.mode {
        settings.mode = mode;
    }
    if let Some(delay) = overrides.step_delay_ms {
        settings.step_delay = Duration::from_millis(delay);
    }
    match overrides.step_timeout_secs {
        Some(0) => {
            warn!("ignoring --timeout-secs 0; steps run without a timeout");
            settings.step_timeout = None;
        }
        Some(secs) => settings.step_timeout = Some(Duration::from_secs(secs)),
        None => {}
    }
    if let Some(shell) = overrides.shell.as_ref().filter(|s| !s.trim().is_empty()) {
        settings.shell = shell.trim().to_string();
    }
    if let Some(dir) = &overrides.working_dir {
        settings.working_dir = Some(dir.clone());
    }
    settings
}

/// Directory commands run in: the configured one, else the current directory.
pub fn resolve_working_dir(settings: &PlannerSettings) -> Result<PathBuf> {
    match &settings.working_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create working directory {}", dir.display()))?;
            Ok(dir.clone())
        }
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

pub fn key_file_path(scope: &Scope) -> PathBuf {
    match scope {
        Scope::User => config_dir().join("keys.json"),
        Scope::Project(path) => project_dir(path).join("keys.json"),
    }
}

pub fn open_key_store(scope: &Scope) -> Result<ApiKeyStore> {
    let store = FileKeyStore::open(key_file_path(scope))?;
    Ok(ApiKeyStore::new(Arc::new(store)).with_env_fallback())
}

fn project_dir(path: &Path) -> PathBuf {
    path.join(".codestorm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let overrides = RunOverrides {
            mode: Some(ExecutionMode::Auto),
            step_delay_ms: Some(0),
            step_timeout_secs: Some(30),
            shell: Some("bash".into()),
            working_dir: Some(PathBuf::from("/tmp/out")),
        };
        let settings = apply_overrides(PlannerSettings::default(), &overrides);
        assert_eq!(settings.mode, ExecutionMode::Auto);
        assert_eq!(settings.step_delay, Duration::ZERO);
        assert_eq!(settings.step_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.shell, "bash");
        assert_eq!(settings.working_dir, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn empty_overrides_keep_settings() {
        let settings = apply_overrides(PlannerSettings::default(), &RunOverrides::default());
        assert_eq!(settings, PlannerSettings::default());
    }

    #[test]
    fn project_scope_keeps_keys_inside_project() {
        let path = key_file_path(&Scope::Project(PathBuf::from("/work/shop")));
        assert_eq!(path, PathBuf::from("/work/shop/.codestorm/keys.json"));
    }
}
