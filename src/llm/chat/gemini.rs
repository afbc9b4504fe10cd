use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, ProviderKind, Turn };
use crate::normalize::UpstreamError;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Flattens the history into `User:`/`Assistant:` lines followed by the new turn
/// and an open `Assistant:` cue.
pub fn build_prompt(message: &str, history: &[Turn]) -> String {
    let mut prompt = String::new();
    if !history.is_empty() {
        let context: Vec<String> = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
            .collect();
        prompt.push_str(&context.join("\n"));
        prompt.push('\n');
    }
    prompt.push_str(&format!("User: {}\nAssistant:", message));
    prompt
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
    #[serde(default)]
    details: Vec<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    reason: Option<String>,
}

/// `[<status>] <message> (<reasons>)`. The detail reasons carry codes such as
/// `API_KEY_INVALID` that the normalizer keys on.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(env) => {
            let reasons: Vec<String> = env.error.details
                .into_iter()
                .filter_map(|d| d.reason)
                .collect();
            let mut text = format!("[{}] {}", status, env.error.message);
            if !reasons.is_empty() {
                text.push_str(&format!(" ({})", reasons.join(", ")));
            }
            text
        }
        Err(_) => format!("[{}] {}", status, body.trim()),
    }
}

fn blocked(reason: &str) -> UpstreamError {
    UpstreamError::from_message(format!("Response was blocked due to {}", reason))
}

/// Concatenated text of the first candidate. A blocked prompt or a candidate that
/// stopped early without text is reported with its reason.
fn reply_text(resp: GenerateResponse) -> Result<String, UpstreamError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(blocked(&reason));
    }
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(UpstreamError::no_response());
    };
    let text: String = candidate.content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if !text.is_empty() {
        return Ok(text);
    }
    match candidate.finish_reason.as_deref() {
        Some(reason) if reason != "STOP" => Err(blocked(reason)),
        _ => Err(UpstreamError::no_response()),
    }
}

pub struct GeminiChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if chat_model.trim().is_empty() {
            return Err("Gemini model name must not be empty".into());
        }
        let api_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self { http, model: chat_model, base_url: api_url })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.completion_model.clone(), config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        api_key: &str,
        message: &str,
        history: &[Turn]
    ) -> Result<CompletionResponse, UpstreamError> {
        // The key travels in a header so it never shows up in a URL.
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let request = GenerateRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: Some(build_prompt(message, history)) }],
            }],
        };
        info!(
            "GeminiChatClient::complete() → model={} base_url={} history={}",
            self.model,
            self.base_url,
            history.len()
        );

        let resp = self.http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!("Gemini error body: {}", body);
            return Err(UpstreamError::from_message(error_message(status, &body)));
        }

        let parsed = resp.json::<GenerateResponse>().await?;
        let text = reply_text(parsed)?;
        Ok(CompletionResponse { response: text })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_history() {
        assert_eq!(build_prompt("What is 2+2?", &[]), "User: What is 2+2?\nAssistant:");
    }

    #[test]
    fn prompt_with_history() {
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        assert_eq!(
            build_prompt("bye", &history),
            "User: hi\nAssistant: hello\nUser: bye\nAssistant:"
        );
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(GeminiChatClient::new(Some(" ".into()), None).is_err());
        let client = GeminiChatClient::new(None, Some("".into())).unwrap();
        assert_eq!(client.get_model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn request_body_has_single_user_turn() {
        let request = GenerateRequest {
            contents: vec![GeminiContent {
                role: Some("user".into()),
                parts: vec![GeminiPart { text: Some("User: hi\nAssistant:".into()) }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "User: hi\nAssistant:" }] }]
            })
        );
    }

    #[test]
    fn error_message_keeps_detail_reasons() {
        let body =
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "[400 Bad Request] API key not valid. Please pass a valid API key. (API_KEY_INVALID)"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "[502 Bad Gateway] upstream down"
        );
    }

    #[test]
    fn reply_text_joins_parts_of_first_candidate() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"4"},{"text":"."}]},"finishReason":"STOP"},{"content":{"parts":[{"text":"5"}]}}]}"#
        ).unwrap();
        assert_eq!(reply_text(resp).unwrap(), "4.");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#
        ).unwrap();
        let err = reply_text(resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#
        ).unwrap();
        assert!(reply_text(resp).unwrap_err().to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_reply_is_no_response() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(reply_text(resp).unwrap_err(), UpstreamError::no_response());
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}"#
        ).unwrap();
        assert_eq!(reply_text(resp).unwrap_err(), UpstreamError::no_response());
    }
}
