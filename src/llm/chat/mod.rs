pub mod openai;
pub mod gemini;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;
use super::{ LlmConfig, ProviderKind, Turn };
use self::openai::OpenAIChatClient;
use self::gemini::GeminiChatClient;
use crate::normalize::UpstreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub response: String,
}

/// One upstream chat-completion backend.
///
/// `history` is already trimmed to the most recent turns; `api_key` is resolved
/// by the caller for every call.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        message: &str,
        history: &[Turn]
    ) -> Result<CompletionResponse, UpstreamError>;

    fn kind(&self) -> ProviderKind;
    fn get_model(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.kind {
        ProviderKind::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        ProviderKind::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
