use crate::bridge::ChatBridge;
use crate::cli::ServeArgs;
use crate::llm::ProviderKind;
use crate::normalize::NormalizedResult;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::State,
    response::{ IntoResponse, Response },
    http::{ header, HeaderValue, StatusCode },
    Json,
};
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;
use log::{ info, warn };

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<ChatBridge>,
}

impl IntoResponse for NormalizedResult {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(
            StatusCode::INTERNAL_SERVER_ERROR
        );
        (status, Json(self.to_body())).into_response()
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(ProviderKind::Gemini.route(), post(gemini_chat_handler).options(preflight_handler))
        .route(ProviderKind::OpenAI.route(), post(openai_chat_handler).options(preflight_handler))
        .route("/health", get(health_handler))
        .layer(
            SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static(ALLOW_ORIGIN)
            )
        )
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    bridge: Arc<ChatBridge>,
    args: &ServeArgs
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = build_app(AppState { bridge });

    if args.enable_tls {
        let (Some(cert_path), Some(key_path)) = (&args.tls_cert_path, &args.tls_key_path) else {
            return Err("TLS enabled without both --tls-cert-path and --tls-key-path".into());
        };
        info!("Loading TLS certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("HTTPS server listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener
            ::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn gemini_chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    chat(&state, ProviderKind::Gemini, &body).await
}

async fn openai_chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    chat(&state, ProviderKind::OpenAI, &body).await
}

async fn chat(state: &AppState, provider: ProviderKind, body: &[u8]) -> Response {
    let request_id = Uuid::new_v4();
    info!("[{}] POST {} ({} bytes)", request_id, provider.route(), body.len());

    let result = state.bridge.send_raw(provider, body).await;
    let status = result.status_code();
    if result.is_success() {
        info!("[{}] {} replied", request_id, provider);
    } else {
        warn!("[{}] {} failed with status {}", request_id, provider, status);
    }
    result.into_response()
}

async fn preflight_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN),
            (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
        ],
    )
}

async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
