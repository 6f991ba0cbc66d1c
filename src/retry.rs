use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ProxyConfig;
use crate::detector::StreamErrorDetector;
use crate::scanner::{scan_stream, ScanOutcome};
use crate::upstream;

/// Fixed wait before retrying after a connection-level failure. Transient
/// network faults tend to clear quickly; rate limiting does not, which is
/// why it gets the progressive wait instead.
pub const TRANSPORT_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Result of a single upstream attempt. Produced once per attempt and never
/// kept beyond the loop iteration that created it.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Full body buffered with no error signature.
    Success(Bytes),
    /// An error signature surfaced inside an otherwise-successful body.
    MidStreamError,
    /// The endpoint answered with a non-success status.
    HttpError { status: StatusCode, reason: String },
    /// The connection itself failed.
    TransportError(String),
}

/// What the orchestrator does after evaluating one attempt.
#[derive(Debug)]
pub enum NextStep {
    Commit(Bytes),
    Fail { status: StatusCode, reason: String },
    RetryAfter(Duration),
}

/// Terminal result of the whole delivery loop.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered(Bytes),
    Rejected { status: StatusCode, reason: String },
    Exhausted,
}

/// Linear backoff: retry n waits n * base seconds.
pub fn progressive_backoff(attempt: u32, base_wait_seconds: u64) -> Duration {
    Duration::from_secs(u64::from(attempt) * base_wait_seconds)
}

/// Decide the next step for one attempt outcome. Pure, so every transition
/// and wait computation is testable on its own.
///
/// Rate limiting is always retryable, whether it shows up as HTTP 429 or as
/// a signature inside a 200 body. Any other HTTP error status terminates the
/// loop immediately and is surfaced to the client as-is.
pub fn evaluate(outcome: AttemptOutcome, attempt: u32, config: &ProxyConfig) -> NextStep {
    match outcome {
        AttemptOutcome::Success(buffer) => NextStep::Commit(buffer),
        AttemptOutcome::MidStreamError => {
            NextStep::RetryAfter(progressive_backoff(attempt, config.retry_wait_seconds))
        }
        AttemptOutcome::HttpError { status, .. } if status == StatusCode::TOO_MANY_REQUESTS => {
            NextStep::RetryAfter(progressive_backoff(attempt, config.retry_wait_seconds))
        }
        AttemptOutcome::HttpError { status, reason } => NextStep::Fail { status, reason },
        AttemptOutcome::TransportError(_) => NextStep::RetryAfter(TRANSPORT_RETRY_WAIT),
    }
}

/// One delivery attempt: send, check the status, then buffer and scan the
/// body. Exactly one attempt is ever in flight at a time.
async fn run_attempt(
    client: &Client,
    config: &ProxyConfig,
    payload: Bytes,
    detector: &dyn StreamErrorDetector,
) -> AttemptOutcome {
    let response = match upstream::send_request(client, config, payload).await {
        Ok(response) => response,
        Err(e) => return AttemptOutcome::TransportError(e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("unknown").to_string();
        return AttemptOutcome::HttpError { status, reason };
    }

    match scan_stream(response.bytes_stream(), detector).await {
        Ok(ScanOutcome::Clean(buffer)) => AttemptOutcome::Success(buffer),
        Ok(ScanOutcome::ErrorDetected) => AttemptOutcome::MidStreamError,
        Err(e) => AttemptOutcome::TransportError(e.to_string()),
    }
}

/// The attempt loop. Sends the same payload bytes until a clean buffered
/// response is obtained, a non-retryable status comes back, or the attempt
/// budget runs out. Retryable failures are fully absorbed here; the client
/// only ever sees them as added latency.
pub async fn deliver_with_retry(
    client: &Client,
    config: &ProxyConfig,
    payload: Bytes,
    detector: &dyn StreamErrorDetector,
) -> DeliveryOutcome {
    for attempt in 1..=config.retry_attempts {
        info!(
            "🚀 Attempt {}/{}: sending {} bytes to target endpoint",
            attempt,
            config.retry_attempts,
            payload.len()
        );

        let outcome = run_attempt(client, config, payload.clone(), detector).await;

        match &outcome {
            AttemptOutcome::Success(buffer) => {
                info!("✅ Received {} clean bytes from target", buffer.len());
            }
            AttemptOutcome::MidStreamError => {
                warn!("🛡️  Shield: target sent an error mid-stream");
            }
            AttemptOutcome::HttpError { status, reason } => {
                warn!("📬 Target returned HTTP {}: {}", status.as_u16(), reason);
            }
            AttemptOutcome::TransportError(detail) => {
                error!("❌ A network or unknown error occurred: {}", detail);
            }
        }

        match evaluate(outcome, attempt, config) {
            NextStep::Commit(buffer) => return DeliveryOutcome::Delivered(buffer),
            NextStep::Fail { status, reason } => {
                return DeliveryOutcome::Rejected { status, reason }
            }
            NextStep::RetryAfter(wait) => {
                // No wait after the final permitted attempt
                if attempt < config.retry_attempts {
                    warn!("⏳ Retrying in {}s...", wait.as_secs());
                    sleep(wait).await;
                }
            }
        }
    }

    DeliveryOutcome::Exhausted
}
