use bytes::Bytes;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::ProxyConfig;

/// Header carrying the credential to the target endpoint.
pub const API_KEY_HEADER: &str = "api-key";

/// Issue exactly one POST to the configured endpoint with the fixed
/// normalized payload.
///
/// Any HTTP response, success or error status, comes back as `Ok` so the
/// orchestrator can apply status-specific policy; only connection-level
/// failures (DNS, refused connection, timeout, protocol violation) are `Err`.
/// No retry logic lives here.
pub async fn send_request(
    client: &Client,
    config: &ProxyConfig,
    payload: Bytes,
) -> Result<Response, reqwest::Error> {
    debug!("📤 Sending {} bytes to target endpoint", payload.len());

    client
        .post(&config.endpoint)
        .header("Content-Type", "application/json")
        .header(API_KEY_HEADER, &config.api_key)
        .body(payload)
        .send()
        .await
}
