use serde_json::Value;
use tracing::info;

use crate::config::ProxyConfig;

/// Trait for request normalizers
/// Each normalizer can inspect and rewrite the inbound body before delivery
pub trait RequestNormalizer {
    fn apply(&self, body: &mut Value, config: &ProxyConfig) -> bool;
    fn name(&self) -> &str;
}

/// Overwrites the `model` field when a forced model is configured
pub struct ForcedModelNormalizer;

impl RequestNormalizer for ForcedModelNormalizer {
    fn apply(&self, body: &mut Value, config: &ProxyConfig) -> bool {
        let forced = match config.forced_model.as_deref() {
            Some(forced) => forced,
            None => return false,
        };

        let obj = match body.as_object_mut() {
            Some(obj) => obj,
            None => return false,
        };

        let previous = obj.insert("model".to_string(), Value::String(forced.to_string()));
        let changed = previous.as_ref().and_then(|v| v.as_str()) != Some(forced);
        if changed {
            info!(
                "✏️  Overrode model: {} → {}",
                previous
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unset>"),
                forced
            );
        }
        changed
    }

    fn name(&self) -> &str {
        "ForcedModelNormalizer"
    }
}

/// Forces `stream` to `true`; the shield only works against streamed bodies
pub struct ForceStreamNormalizer;

impl RequestNormalizer for ForceStreamNormalizer {
    fn apply(&self, body: &mut Value, _config: &ProxyConfig) -> bool {
        let obj = match body.as_object_mut() {
            Some(obj) => obj,
            None => return false,
        };

        let previous = obj.insert("stream".to_string(), Value::Bool(true));
        previous.as_ref().and_then(|v| v.as_bool()) != Some(true)
    }

    fn name(&self) -> &str {
        "ForceStreamNormalizer"
    }
}

/// Apply all normalizers to the inbound body.
///
/// Runs exactly once per connection; the serialized result is reused
/// unchanged across every retry attempt.
pub fn normalize_request(body: &mut Value, config: &ProxyConfig) -> bool {
    let normalizers: Vec<Box<dyn RequestNormalizer>> = vec![
        Box::new(ForcedModelNormalizer),
        Box::new(ForceStreamNormalizer),
    ];

    let mut any_modified = false;

    for normalizer in normalizers {
        if normalizer.apply(body, config) {
            info!("🔧 {} rewrote the request", normalizer.name());
            any_modified = true;
        }
    }

    any_modified
}
