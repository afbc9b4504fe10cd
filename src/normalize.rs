//! Maps provider outcomes onto the single success/failure shape the client sees.

use chrono::{ DateTime, SecondsFormat, Utc };
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::llm::ProviderKind;

pub const UNKNOWN_ERROR: &str = "An unknown error occurred.";
pub const INVALID_MESSAGE: &str = "Message is required and must be a string";
pub const NO_RESPONSE: &str = "No response generated";

/// Whatever came back from an upstream call that did not produce reply text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or(UNKNOWN_ERROR))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl UpstreamError {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: Some(message.into()) }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self { status: None, message: Some(message.into()) }
    }

    pub fn unknown() -> Self {
        Self { status: None, message: None }
    }

    /// A non error-like value. Only a plain object carrying a string `error`
    /// field yields a usable message.
    pub fn opaque(value: &JsonValue) -> Self {
        let message = value
            .as_object()
            .and_then(|obj| obj.get("error"))
            .and_then(|e| e.as_str())
            .map(str::to_string);
        Self { status: None, message }
    }

    pub fn no_response() -> Self {
        Self::from_message(NO_RESPONSE)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs stay out of client-facing text.
        let status = err.status().map(|s| s.as_u16());
        Self { status, message: Some(err.without_url().to_string()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    RateLimited,
    ContentPolicy,
    Unconfigured,
    UpstreamFailure,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput | ErrorKind::ContentPolicy => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::RateLimited => 429,
            ErrorKind::Unconfigured | ErrorKind::UpstreamFailure => 500,
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Unauthorized,
            429 => ErrorKind::RateLimited,
            400..=499 => ErrorKind::InvalidInput,
            _ => ErrorKind::UpstreamFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub error: String,
    pub status_code: u16,
}

impl Failure {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self { kind, error: error.into(), status_code: kind.status_code() }
    }

    pub fn invalid_input(error: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, error)
    }

    pub fn unconfigured(provider: ProviderKind) -> Self {
        Self::new(
            ErrorKind::Unconfigured,
            format!(
                "{} API key is not configured. Please set {} environment variable.",
                provider.display_name(),
                provider.key_env()
            )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    Success {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Failure(Failure),
}

impl NormalizedResult {
    pub fn success(message: impl Into<String>) -> Self {
        NormalizedResult::Success { message: message.into(), timestamp: Utc::now() }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            NormalizedResult::Success { .. } => 200,
            NormalizedResult::Failure(f) => f.status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NormalizedResult::Success { .. })
    }

    pub fn to_body(&self) -> ResponseBody {
        match self {
            NormalizedResult::Success { message, timestamp } =>
                ResponseBody::Success {
                    message: message.clone(),
                    timestamp: format_timestamp(timestamp),
                },
            NormalizedResult::Failure(f) => ResponseBody::Failure { error: f.error.clone() },
        }
    }
}

impl From<Failure> for NormalizedResult {
    fn from(failure: Failure) -> Self {
        NormalizedResult::Failure(failure)
    }
}

/// JSON body sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success {
        message: String,
        timestamp: String,
    },
    Failure {
        error: String,
    },
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct ErrorRule {
    fragments: &'static [&'static str],
    kind: ErrorKind,
    replacement: Option<&'static str>,
}

const OPENAI_RULES: &[ErrorRule] = &[
    ErrorRule { fragments: &["Invalid API key"], kind: ErrorKind::Unauthorized, replacement: None },
    ErrorRule {
        fragments: &["quota exceeded", "rate limit"],
        kind: ErrorKind::RateLimited,
        replacement: None,
    },
    ErrorRule { fragments: &["content_policy"], kind: ErrorKind::ContentPolicy, replacement: None },
];

const GEMINI_RULES: &[ErrorRule] = &[
    ErrorRule {
        fragments: &["API_KEY_INVALID"],
        kind: ErrorKind::Unauthorized,
        replacement: Some("Invalid API key. Please check your Gemini API key configuration."),
    },
    ErrorRule {
        fragments: &["QUOTA_EXCEEDED"],
        kind: ErrorKind::RateLimited,
        replacement: Some("API quota exceeded. Please try again later."),
    },
    ErrorRule {
        fragments: &["SAFETY"],
        kind: ErrorKind::ContentPolicy,
        replacement: Some(
            "Content was blocked due to safety concerns. Please rephrase your message."
        ),
    },
];

fn rules_for(provider: ProviderKind) -> &'static [ErrorRule] {
    match provider {
        ProviderKind::OpenAI => OPENAI_RULES,
        ProviderKind::Gemini => GEMINI_RULES,
    }
}

/// Classifies an upstream error. Total: every input yields exactly one failure.
///
/// An explicit status wins. Otherwise the message is matched, case-sensitively,
/// against the provider's known fragments in order. Anything else is a 500.
pub fn normalize_error(provider: ProviderKind, err: &UpstreamError) -> Failure {
    let message = err.message.as_deref().filter(|m| !m.trim().is_empty());

    if let Some(status) = err.status {
        let status_code = if (400..=599).contains(&status) { status } else { 500 };
        return Failure {
            kind: ErrorKind::from_status(status_code),
            error: message.unwrap_or(UNKNOWN_ERROR).to_string(),
            status_code,
        };
    }

    let Some(message) = message else {
        return Failure::new(ErrorKind::UpstreamFailure, UNKNOWN_ERROR);
    };

    for rule in rules_for(provider) {
        if rule.fragments.iter().any(|f| message.contains(f)) {
            return Failure::new(rule.kind, rule.replacement.unwrap_or(message));
        }
    }

    Failure::new(ErrorKind::UpstreamFailure, message)
}
