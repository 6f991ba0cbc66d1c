use std::env;
use std::net::SocketAddr;
use std::process;

use axum::serve;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use shield_proxy::config::ProxyConfig;
use shield_proxy::proxy::{self, ProxyState};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse::<Level>().ok())
                .unwrap_or(Level::INFO),
        )
        .init();

    // Configuration from environment variables; the process refuses to start
    // without the target endpoint and credential
    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("Set TARGET_ENDPOINT and TARGET_API_KEY before starting the proxy.");
            process::exit(1);
        }
    };

    info!("Starting Shield Proxy");
    info!("Listening on: 127.0.0.1:{}", config.port);
    info!("Target endpoint: {}", truncate_for_log(&config.endpoint));
    if let Some(model) = &config.forced_model {
        info!("Forcing model: {}", model);
    }
    info!("Retry config:");
    info!("  Max attempts: {}", config.retry_attempts);
    info!("  Base backoff: {} seconds", config.retry_wait_seconds);

    let bind_addr = format!("127.0.0.1:{}", config.port);
    let state = ProxyState::new(config);

    // Build router
    let app = proxy::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("Shield Proxy is ready");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

/// Keep long endpoint URLs out of the banner
fn truncate_for_log(endpoint: &str) -> String {
    if endpoint.chars().count() > 50 {
        format!("{}...", endpoint.chars().take(50).collect::<String>())
    } else {
        endpoint.to_string()
    }
}
