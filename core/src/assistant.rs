use crate::keys::ApiKeyStore;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Qwen,
    Mock,
}

impl ProviderKind {
    /// Providers that need an API key, in display order.
    pub const REMOTE: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Qwen,
    ];

    pub fn from_environment() -> Self {
        std::env::var("CODESTORM_PROVIDER")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(Self::OpenAi)
    }

    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Qwen => "Alibaba Qwen",
            ProviderKind::Mock => "Mock",
        }
    }

    pub fn storage_key(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai_api_key",
            ProviderKind::Anthropic => "anthropic_api_key",
            ProviderKind::Gemini => "gemini_api_key",
            ProviderKind::Qwen => "qwen_api_key",
            ProviderKind::Mock => "mock_api_key",
        }
    }

    pub fn env_var(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Qwen => Some("DASHSCOPE_API_KEY"),
            ProviderKind::Mock => None,
        }
    }

    pub fn requires_key(self) -> bool {
        self != ProviderKind::Mock
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProviderKind {
    type Err = AssistantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "qwen" | "alibaba" | "dashscope" => Ok(ProviderKind::Qwen),
            "mock" => Ok(ProviderKind::Mock),
            _ => Err(AssistantError::UnknownProvider(value.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AssistantError {
    #[error("no API key configured for {0}")]
    MissingApiKey(ProviderKind),
    #[error("no adapter registered for {0}")]
    NoAdapter(ProviderKind),
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: ProviderKind,
        message: String,
    },
}

impl AssistantError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingApiKey(provider) => format!(
                "{provider} is not configured. Run `codestorm keys set {}` to add an API key.",
                provider.storage_key().trim_end_matches("_api_key")
            ),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantRequest {
    pub prompt: String,
    #[serde(default)]
    pub code_context: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AssistantRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            code_context: None,
            model: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code_context = Some(code.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Prompt text with the code context appended as a fenced block.
    pub fn render(&self) -> String {
        match self.code_context.as_deref().filter(|code| !code.trim().is_empty()) {
            Some(code) => format!("{}\n\n```\n{}\n```", self.prompt.trim(), code.trim_end()),
            None => self.prompt.trim().to_string(),
        }
    }
}

/// One provider adapter. Implementations live outside this crate.
#[async_trait]
pub trait CodeAssistant: Send + Sync {
    async fn generate(&self, request: &AssistantRequest, api_key: Option<&str>) -> Result<String>;
}

/// Offline adapter that echoes the request back.
#[derive(Default)]
pub struct EchoAssistant;

#[async_trait]
impl CodeAssistant for EchoAssistant {
    async fn generate(&self, request: &AssistantRequest, _api_key: Option<&str>) -> Result<String> {
        sleep(Duration::from_millis(5)).await;
        Ok(format!(
            "[Mock] Model {:?}: received '{}'.",
            request.model.as_deref().unwrap_or("default"),
            request.render()
        ))
    }
}

/// Routes requests to adapters after checking that the provider has a key.
#[derive(Clone)]
pub struct AssistantGateway {
    keys: ApiKeyStore,
    adapters: HashMap<ProviderKind, Arc<dyn CodeAssistant>>,
}

impl AssistantGateway {
    pub fn new(keys: ApiKeyStore) -> Self {
        let mut adapters: HashMap<ProviderKind, Arc<dyn CodeAssistant>> = HashMap::new();
        adapters.insert(ProviderKind::Mock, Arc::new(EchoAssistant));
        Self { keys, adapters }
    }

    pub fn register(&mut self, provider: ProviderKind, adapter: Arc<dyn CodeAssistant>) {
        self.adapters.insert(provider, adapter);
    }

    pub fn keys(&self) -> &ApiKeyStore {
        &self.keys
    }

    pub async fn generate(
        &self,
        provider: ProviderKind,
        request: &AssistantRequest,
    ) -> Result<String, AssistantError> {
        if request.prompt.trim().is_empty() {
            return Err(AssistantError::EmptyPrompt);
        }
        let api_key = self.keys.key_for(provider);
        if provider.requires_key() && api_key.is_none() {
            warn!(%provider, "assistant request blocked: missing API key");
            return Err(AssistantError::MissingApiKey(provider));
        }
        let adapter = self
            .adapters
            .get(&provider)
            .cloned()
            .ok_or(AssistantError::NoAdapter(provider))?;
        info!(%provider, model = ?request.model, "dispatching assistant request");
        adapter
            .generate(request, api_key.as_deref())
            .await
            .map_err(|err| AssistantError::Provider {
                provider,
                message: err.to_string(),
            })
    }
}
