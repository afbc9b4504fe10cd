//! Request bridging: validates an incoming chat turn, resolves the provider
//! credential, dispatches to the matching `ChatClient` and normalizes the outcome.

use log::{ error, info, warn };
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use crate::llm::chat::{ ChatClient, new_client };
use crate::llm::{ recent_history, LlmConfig, ProviderKind, Turn };
use crate::normalize::{ normalize_error, ErrorKind, Failure, NormalizedResult, INVALID_MESSAGE };

pub const INVALID_JSON: &str = "Request body must be valid JSON";
pub const INVALID_HISTORY: &str = "History must be an array of {role, content} objects";

/// Looks up provider credentials at call time.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self, provider: ProviderKind) -> Option<String>;
}

/// Reads `OPENAI_API_KEY` / `GEMINI_API_KEY` from the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn api_key(&self, provider: ProviderKind) -> Option<String> {
        std::env::var(provider.key_env()).ok().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<ProviderKind, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: ProviderKind, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn api_key(&self, provider: ProviderKind) -> Option<String> {
        self.keys.get(&provider).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Turn>,
}

/// Parses `{ message, history? }`. `message` must be a non-empty string.
pub fn parse_request(body: &[u8]) -> Result<ChatRequest, Failure> {
    let value: JsonValue = serde_json
        ::from_slice(body)
        .map_err(|_| Failure::invalid_input(INVALID_JSON))?;

    let message = match value.get("message") {
        Some(JsonValue::String(m)) if !m.is_empty() => m.clone(),
        _ => {
            return Err(Failure::invalid_input(INVALID_MESSAGE));
        }
    };

    let history = match value.get("history") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(raw) =>
            serde_json
                ::from_value::<Vec<Turn>>(raw.clone())
                .map_err(|_| Failure::invalid_input(INVALID_HISTORY))?,
    };

    Ok(ChatRequest { message, history })
}

#[derive(Clone)]
pub struct ChatBridge {
    clients: HashMap<ProviderKind, Arc<dyn ChatClient>>,
    credentials: Arc<dyn CredentialSource>,
}

impl ChatBridge {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self { clients: HashMap::new(), credentials }
    }

    pub fn with_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    pub fn from_configs(
        configs: &[LlmConfig],
        credentials: Arc<dyn CredentialSource>
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut bridge = Self::new(credentials);
        for config in configs {
            let client = new_client(config)?;
            info!(
                "Chat client configured: Provider={}, Model={}, Route={}",
                config.kind,
                client.get_model(),
                config.kind.route()
            );
            bridge = bridge.with_client(client);
        }
        Ok(bridge)
    }

    pub fn has_credential(&self, provider: ProviderKind) -> bool {
        self.credentials.api_key(provider).is_some()
    }

    /// Validates a raw request body and forwards it.
    pub async fn send_raw(&self, provider: ProviderKind, body: &[u8]) -> NormalizedResult {
        match parse_request(body) {
            Ok(request) => self.send(provider, &request).await,
            Err(failure) => {
                warn!("Rejected {} request: {}", provider, failure.error);
                failure.into()
            }
        }
    }

    /// One attempt against the provider. Never returns an unclassified error.
    pub async fn send(&self, provider: ProviderKind, request: &ChatRequest) -> NormalizedResult {
        if request.message.is_empty() {
            return Failure::invalid_input(INVALID_MESSAGE).into();
        }

        let Some(client) = self.clients.get(&provider) else {
            error!("No chat client registered for provider {}", provider);
            return Failure::new(
                ErrorKind::Unconfigured,
                format!("{} provider is not enabled on this server.", provider.display_name())
            ).into();
        };

        let Some(api_key) = self.credentials.api_key(provider) else {
            warn!("{} is not set; rejecting request", provider.key_env());
            return Failure::unconfigured(provider).into();
        };

        let history = recent_history(&request.history);
        info!(
            "Forwarding chat turn to {} (history {} of {})",
            provider,
            history.len(),
            request.history.len()
        );

        match client.complete(&api_key, &request.message, history).await {
            Ok(resp) => NormalizedResult::success(resp.response),
            Err(e) => {
                error!("Error in {} chat API: {:?}", provider, e);
                normalize_error(provider, &e).into()
            }
        }
    }
}
