use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, Response, StatusCode},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::{error, info};

use crate::config::ProxyConfig;
use crate::detector::SignatureDetector;
use crate::normalizer::normalize_request;
use crate::retry::{deliver_with_retry, DeliveryOutcome};

/// Shared per-process state: the immutable config and one HTTP client.
/// Nothing here is mutated after startup, so connections share it freely.
#[derive(Clone)]
pub struct ProxyState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            // No request timeout: the target may legitimately stream for a
            // long time, so only transport-level defaults apply.
            client: reqwest::Client::new(),
        }
    }
}

/// Build the router. A single fallback handler takes every path; the proxy
/// does no routing of its own.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

/// Per-connection entry point: read and parse the inbound request, rewrite
/// it once, run the delivery loop, and map the terminal outcome to a
/// client-visible response.
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Result<Response<Body>, StatusCode> {
    info!("📨 Connection received from {}", addr.ip());

    if req.method() != Method::POST {
        return plain_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Only POST requests are supported.",
        );
    }

    let body_bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let mut body: Value = match serde_json::from_slice(&body_bytes) {
        Ok(json) => json,
        Err(e) => {
            error!("Could not parse JSON from request: {}", e);
            return plain_response(StatusCode::BAD_REQUEST, "Invalid JSON in request body.");
        }
    };

    // Rewritten once; every retry attempt sends these exact bytes
    normalize_request(&mut body, &state.config);
    let payload: Bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes.into(),
        Err(e) => {
            error!("Failed to serialize normalized request: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match deliver_with_retry(&state.client, &state.config, payload, &SignatureDetector).await {
        DeliveryOutcome::Delivered(buffer) => commit_response(buffer),
        DeliveryOutcome::Rejected { status, reason } => {
            error!("Target returned HTTP {}: {}", status.as_u16(), reason);
            plain_response(
                status,
                &format!("Target API returned HTTP {}", status.as_u16()),
            )
        }
        DeliveryOutcome::Exhausted => {
            error!(
                "💀 Failed to get a clean response after {} attempts",
                state.config.retry_attempts
            );
            plain_response(
                StatusCode::BAD_GATEWAY,
                "Proxy failed to get a valid response from the target API.",
            )
        }
    }
}

/// Emit a vetted buffer to the client in one write. The client only ever
/// sees a complete payload, never a partial stream.
fn commit_response(buffer: Bytes) -> Result<Response<Body>, StatusCode> {
    info!("✅ Streaming {} buffered bytes to client", buffer.len());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .body(Body::from(buffer))
        .map_err(|e| {
            error!("Failed to build response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

fn plain_response(status: StatusCode, message: &str) -> Result<Response<Body>, StatusCode> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from(message.to_string()))
        .map_err(|e| {
            error!("Failed to build response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
