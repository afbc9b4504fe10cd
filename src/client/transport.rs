use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use thiserror::Error;

use super::state::{ PendingTurn, Reply };
use crate::llm::Turn;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response carrying an `error` string.
    #[error("{0}")]
    Server(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("Invalid response from server: {0}")]
    InvalidBody(String),
}

/// Delivers one pending turn to the bridge.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, turn: &PendingTurn) -> Result<Reply, TransportError>;
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    history: &'a [Turn],
}

#[derive(Deserialize)]
struct SuccessBody {
    message: String,
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn error_from_body(status: u16, body: &str) -> TransportError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) if !error.is_empty() => TransportError::Server(error),
        _ => TransportError::Status(status),
    }
}

pub struct HttpTransport {
    http: HttpClient,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, turn: &PendingTurn) -> Result<Reply, TransportError> {
        let url = format!("{}{}", self.base_url, turn.provider.route());
        debug!("POST {} (history {})", url, turn.history.len());

        let resp = self.http
            .post(&url)
            .json(&(ChatPayload { message: &turn.message, history: &turn.history }))
            .send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }

        let parsed: SuccessBody = serde_json
            ::from_str(&body)
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;
        Ok(Reply {
            message: parsed.message,
            timestamp: parse_timestamp(parsed.timestamp.as_deref()),
        })
    }
}
