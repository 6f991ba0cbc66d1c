use std::collections::HashMap;
use std::env;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_WAIT_SECONDS: u64 = 15;

/// Process configuration, read once at startup and immutable afterwards.
///
/// Handlers receive this by value inside their shared state; nothing in the
/// request path reads the environment directly.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Full URL of the target chat-completion endpoint.
    pub endpoint: String,
    /// API key forwarded to the target in the `api-key` header.
    pub api_key: String,
    /// When set, overrides the `model` field of every inbound request.
    pub forced_model: Option<String>,
    /// Port the proxy listens on (loopback only).
    pub port: u16,
    /// Maximum delivery attempts per inbound request.
    pub retry_attempts: u32,
    /// Base seconds for the progressive backoff (attempt n waits n * base).
    pub retry_wait_seconds: u64,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, String> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build a config from a plain key/value map. Split out from `from_env`
    /// so validation is testable without touching the process environment.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, String> {
        let endpoint = vars
            .get("TARGET_ENDPOINT")
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| "missing required environment variable TARGET_ENDPOINT".to_string())?;

        let api_key = vars
            .get("TARGET_API_KEY")
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| "missing required environment variable TARGET_API_KEY".to_string())?;

        let forced_model = vars.get("FORCED_MODEL").filter(|s| !s.is_empty()).cloned();

        let port = vars
            .get("PROXY_PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let retry_attempts = vars
            .get("RETRY_ATTEMPTS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS);

        let retry_wait_seconds = vars
            .get("RETRY_WAIT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_WAIT_SECONDS);

        Ok(Self {
            endpoint,
            api_key,
            forced_model,
            port,
            retry_attempts,
            retry_wait_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ProxyConfig::from_vars(&vars(&[
            ("TARGET_ENDPOINT", "https://api.example.com/chat/completions"),
            ("TARGET_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "https://api.example.com/chat/completions");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.forced_model, None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(config.retry_wait_seconds, DEFAULT_RETRY_WAIT_SECONDS);
    }

    #[test]
    fn test_full_config_overrides_defaults() {
        let config = ProxyConfig::from_vars(&vars(&[
            ("TARGET_ENDPOINT", "https://api.example.com/chat/completions"),
            ("TARGET_API_KEY", "secret"),
            ("FORCED_MODEL", "gpt-x"),
            ("PROXY_PORT", "9001"),
            ("RETRY_ATTEMPTS", "3"),
            ("RETRY_WAIT_SECONDS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.forced_model.as_deref(), Some("gpt-x"));
        assert_eq!(config.port, 9001);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_wait_seconds, 2);
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let result = ProxyConfig::from_vars(&vars(&[("TARGET_API_KEY", "secret")]));
        let err = result.unwrap_err();
        assert!(err.contains("TARGET_ENDPOINT"), "unexpected error: {}", err);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let result = ProxyConfig::from_vars(&vars(&[(
            "TARGET_ENDPOINT",
            "https://api.example.com/chat/completions",
        )]));
        let err = result.unwrap_err();
        assert!(err.contains("TARGET_API_KEY"), "unexpected error: {}", err);
    }

    #[test]
    fn test_empty_required_value_is_fatal() {
        let result = ProxyConfig::from_vars(&vars(&[
            ("TARGET_ENDPOINT", ""),
            ("TARGET_API_KEY", "secret"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unparseable_numbers_fall_back_to_defaults() {
        let config = ProxyConfig::from_vars(&vars(&[
            ("TARGET_ENDPOINT", "https://api.example.com/chat/completions"),
            ("TARGET_API_KEY", "secret"),
            ("PROXY_PORT", "not-a-port"),
            ("RETRY_ATTEMPTS", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
    }

    #[test]
    fn test_empty_forced_model_treated_as_unset() {
        let config = ProxyConfig::from_vars(&vars(&[
            ("TARGET_ENDPOINT", "https://api.example.com/chat/completions"),
            ("TARGET_API_KEY", "secret"),
            ("FORCED_MODEL", ""),
        ]))
        .unwrap();

        assert_eq!(config.forced_model, None);
    }
}
