//! Command handlers.
//!
//! Handlers render to a `String` and leave printing to the binary.

use std::collections::BTreeMap;
use std::path::Path;
use tollgate_error::TollgateResult;
use tollgate_rate_limit::{ProviderRegistry, TollgateConfig, classify};
use tracing::{debug, instrument};

/// Load the configuration from `path`, or with layered precedence if `None`.
#[instrument]
pub fn load_config(path: Option<&Path>) -> TollgateResult<TollgateConfig> {
    match path {
        Some(path) => TollgateConfig::from_file(path),
        None => TollgateConfig::load(),
    }
}

/// Effective per-provider configuration, budget applied, as pretty JSON.
///
/// The `[defaults]` table is listed under `"*"` when present.
pub fn render_config(config: &TollgateConfig) -> Result<String, serde_json::Error> {
    let mut effective: BTreeMap<String, _> = config
        .provider_names()
        .into_iter()
        .map(|name| {
            let provider = config.provider(&name);
            (name, provider)
        })
        .collect();
    if config.defaults.is_some() {
        effective.insert("*".to_string(), config.provider("*"));
    }
    serde_json::to_string_pretty(&effective)
}

/// Status of every configured provider as pretty JSON.
pub fn render_status(registry: &ProviderRegistry) -> Result<String, serde_json::Error> {
    for name in registry.config().provider_names() {
        registry.get(&name);
    }
    let statuses = registry.statuses();
    debug!(providers = statuses.len(), "Rendering status");
    serde_json::to_string_pretty(&statuses)
}

/// One-line classification report for an error message.
pub fn render_classification(
    registry: &ProviderRegistry,
    provider: Option<&str>,
    message: &str,
) -> String {
    let cause = match provider {
        Some(provider) => registry.get(provider).classify(message),
        None => classify(message),
    };
    format!("{} (retryable: {})", cause, cause.is_retryable())
}
