use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, ProviderKind, Turn };
use crate::normalize::UpstreamError;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate, and helpful responses to user questions.";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIErrorBody,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

/// System instruction, then the recent history verbatim, then the new user turn.
pub fn build_messages(system_prompt: &str, message: &str, history: &[Turn]) -> Vec<OpenAIMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(OpenAIMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    for turn in history {
        messages.push(OpenAIMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(OpenAIMessage {
        role: "user".to_string(),
        content: message.to_string(),
    });
    messages
}

/// Pulls `error.message` out of an OpenAI error body, or returns the body as is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<OpenAIErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn first_choice_text(resp: OpenAIResponse) -> Option<String> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.is_empty())
}

impl OpenAIChatClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        system_prompt: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(
            config.completion_model.clone(),
            config.base_url.clone(),
            config.system_prompt.clone(),
            config.temperature,
            config.max_tokens,
        )
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        api_key: &str,
        message: &str,
        history: &[Turn]
    ) -> Result<CompletionResponse, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let req = OpenAIChatRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, message, history),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        info!(
            "OpenAIChatClient::complete() → model={} messages={}",
            self.model,
            req.messages.len()
        );

        let resp = self.http.post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!("OpenAI error body: {}", body);
            return Err(UpstreamError::with_status(status.as_u16(), error_message(&body)));
        }

        let parsed = resp.json::<OpenAIResponse>().await?;
        let content = first_choice_text(parsed).ok_or_else(UpstreamError::no_response)?;

        Ok(CompletionResponse { response: content })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_system_history_then_user() {
        let history = vec![Turn::user("hi"), Turn::assistant("hello there")];
        let messages = build_messages("be nice", "how are you?", &history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, "be nice");
        assert_eq!(messages[2].content, "hello there");
        assert_eq!(messages[3].content, "how are you?");
    }

    #[test]
    fn request_serializes_fixed_sampling_settings() {
        let req = OpenAIChatRequest {
            model: DEFAULT_MODEL,
            messages: build_messages(DEFAULT_SYSTEM_PROMPT, "x", &[]),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["stream"], false);
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn extracts_first_choice() {
        let resp: OpenAIResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"4"}},{"message":{"content":"5"}}]}"#
        ).unwrap();
        assert_eq!(first_choice_text(resp), Some("4".to_string()));
    }

    #[test]
    fn missing_choice_is_no_response() {
        let resp: OpenAIResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_choice_text(resp), None);
        let resp: OpenAIResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null}}]}"#
        ).unwrap();
        assert_eq!(first_choice_text(resp), None);
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("Bad gateway\n"), "Bad gateway");
    }
}
