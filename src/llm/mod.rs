pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

/// Number of most recent history turns forwarded upstream.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the credential for this provider.
    pub fn key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "/api/chat-openai",
            ProviderKind::Gemini => "/api/chat",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseProviderKindError {
    message: String,
}

impl fmt::Display for ParseProviderKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseProviderKindError {}
impl FromStr for ProviderKind {
    type Err = ParseProviderKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "gemini" => Ok(ProviderKind::Gemini),
            _ =>
                Err(ParseProviderKindError {
                    message: format!("Invalid provider: '{}' (expected 'gemini' or 'openai')", s),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

// Anything that is not "user" is replayed as an assistant turn.
impl From<String> for Role {
    fn from(value: String) -> Self {
        if value == "user" { Role::User } else { Role::Assistant }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: serde::Deserializer<'de> {
        String::deserialize(deserializer).map(Role::from)
    }
}

/// One `{role, content}` entry of a conversation as it crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The last `HISTORY_LIMIT` turns, oldest first.
pub fn recent_history(history: &[Turn]) -> &[Turn] {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    &history[start..]
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub kind: ProviderKind,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            completion_model: None,
            base_url: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAI));
        assert_eq!(" Gemini ".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert!("anthropic".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn recent_history_keeps_last_ten_in_order() {
        let history: Vec<Turn> = (0..15).map(|i| Turn::user(format!("m{}", i))).collect();
        let recent = recent_history(&history);
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent.first().map(|t| t.content.as_str()), Some("m5"));
        assert_eq!(recent.last().map(|t| t.content.as_str()), Some("m14"));
    }

    #[test]
    fn recent_history_short_is_untouched() {
        let history = vec![Turn::user("a"), Turn::assistant("b")];
        assert_eq!(recent_history(&history), &history[..]);
    }

    #[test]
    fn unknown_roles_become_assistant() {
        let turn: Turn = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        let turn: Turn = serde_json::from_str(r#"{"role":"user","content":"y"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }
}
