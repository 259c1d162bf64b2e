use crate::assistant::ProviderKind;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// String key-value capability the key store is built on.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.values.write().remove(name);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
#[derive(Clone)]
pub struct FileKeyStore {
    path: PathBuf,
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileKeyStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("invalid key file at {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(Self {
            path,
            values: Arc::new(RwLock::new(values)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let serialized = serde_json::to_vec_pretty(values)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write key file at {}", self.path.display()))
    }
}

impl KeyValueStore for FileKeyStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut values = self.values.write();
        values.insert(name.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut values = self.values.write();
        if values.remove(name).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Provider API keys on top of an injected [`KeyValueStore`].
#[derive(Clone)]
pub struct ApiKeyStore {
    store: Arc<dyn KeyValueStore>,
    env_fallback: bool,
}

impl ApiKeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            env_fallback: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyStore::new()))
    }

    /// Consult the provider's environment variable when no key is stored.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    pub fn key_for(&self, provider: ProviderKind) -> Option<String> {
        let stored = self
            .store
            .get(provider.storage_key())
            .filter(|key| !key.trim().is_empty());
        if stored.is_some() || !self.env_fallback {
            return stored;
        }
        provider
            .env_var()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn has_key(&self, provider: ProviderKind) -> bool {
        !provider.requires_key() || self.key_for(provider).is_some()
    }

    pub fn set_key(&self, provider: ProviderKind, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return self.clear_key(provider);
        }
        self.store.set(provider.storage_key(), key)
    }

    pub fn clear_key(&self, provider: ProviderKind) -> Result<()> {
        self.store.remove(provider.storage_key())
    }

    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::REMOTE
            .iter()
            .copied()
            .filter(|provider| self.key_for(*provider).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        let keys = ApiKeyStore::in_memory();
        assert!(!keys.has_key(ProviderKind::OpenAi));
        keys.set_key(ProviderKind::OpenAi, "sk-test").unwrap();
        assert!(keys.has_key(ProviderKind::OpenAi));
        keys.set_key(ProviderKind::OpenAi, "   ").unwrap();
        assert!(!keys.has_key(ProviderKind::OpenAi));
        assert!(keys.has_key(ProviderKind::Mock));
    }

    #[test]
    fn lists_configured_providers_in_order() {
        let keys = ApiKeyStore::in_memory();
        keys.set_key(ProviderKind::Gemini, "g-key").unwrap();
        keys.set_key(ProviderKind::Anthropic, "a-key").unwrap();
        assert_eq!(
            keys.configured_providers(),
            [ProviderKind::Anthropic, ProviderKind::Gemini]
        );
        keys.clear_key(ProviderKind::Gemini).unwrap();
        assert_eq!(keys.configured_providers(), [ProviderKind::Anthropic]);
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("keys.json");
        let store = FileKeyStore::open(&path).expect("open");
        store.set("anthropic_api_key", "a-key").unwrap();

        let reopened = FileKeyStore::open(&path).expect("reopen");
        assert_eq!(reopened.get("anthropic_api_key").as_deref(), Some("a-key"));
        reopened.remove("anthropic_api_key").unwrap();
        assert!(FileKeyStore::open(&path).unwrap().get("anthropic_api_key").is_none());
    }

    #[test]
    fn corrupt_key_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("keys.json");
        fs::write(&path, "not json").unwrap();
        assert!(FileKeyStore::open(&path).is_err());
    }
}
