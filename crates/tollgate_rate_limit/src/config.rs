//! Provider limits and configuration loading.
//!
//! Limits are plain TOML. The configuration system supports:
//! - Bundled defaults (include_str! from tollgate.toml)
//! - User overrides (./tollgate.toml or ~/.config/tollgate/tollgate.toml)
//! - Automatic merging with user values taking precedence

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tollgate_core::{BudgetConfig, DailyResetPolicy, ProviderLimits, RateLimitCause};
use tollgate_error::{ConfigError, TollgateError, TollgateResult};
use tracing::{debug, instrument};

/// Static limits and tuning for one provider.
///
/// Every field has a default, so a TOML table only needs the values that
/// differ from it.
///
/// ```toml
/// [providers.gemini]
/// requests_per_minute = 10
/// tokens_per_minute = 250_000
/// daily_quota = 250
/// circuit_timeout_secs = 120
///
/// [providers.gemini.error_codes]
/// RESOURCE_EXHAUSTED = "REQUESTS_PER_MINUTE"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, derive_setters::Setters)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct ProviderConfig {
    /// Requests allowed per wall-clock minute
    pub requests_per_minute: u32,

    /// Tokens allowed per wall-clock minute
    pub tokens_per_minute: u64,

    /// Requests allowed per daily window
    pub daily_quota: u32,

    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,

    /// Seconds the circuit stays open before a trial call is allowed
    pub circuit_timeout_secs: u64,

    /// First exponential backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Cap on the exponential backoff delay in seconds
    pub max_delay_secs: u64,

    /// Backoff delays are scaled by a factor drawn from `[1 - j, 1 + j]`
    pub jitter_fraction: f64,

    /// Retries after the first attempt before the failure is surfaced
    pub max_retries: u32,

    /// When the daily counters start over
    pub daily_reset: DailyResetPolicy,

    /// Exact provider error codes and the cause each one means
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub error_codes: HashMap<String, RateLimitCause>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            tokens_per_minute: 1_000_000,
            daily_quota: 10_000,
            failure_threshold: 5,
            success_threshold: 3,
            circuit_timeout_secs: 300,
            base_delay_ms: 1_000,
            max_delay_secs: 300,
            jitter_fraction: 0.25,
            max_retries: 5,
            daily_reset: DailyResetPolicy::UtcMidnight,
            error_codes: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Create a configuration with the given ceilings and default tuning.
    pub fn new(requests_per_minute: u32, tokens_per_minute: u64, daily_quota: u32) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
            daily_quota,
            ..Self::default()
        }
    }

    /// Time the circuit stays open before probing.
    pub fn circuit_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_timeout_secs)
    }

    /// First exponential backoff delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Cap on the exponential backoff delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// The hard ceilings of this provider.
    pub fn limits(&self) -> ProviderLimits {
        ProviderLimits::new(
            self.requests_per_minute,
            self.tokens_per_minute,
            self.daily_quota,
        )
    }

    /// Returns a copy with the budget multipliers applied to the ceilings.
    pub fn with_budget(&self, budget: &BudgetConfig) -> ProviderConfig {
        ProviderConfig {
            requests_per_minute: budget.scale_requests_per_minute(self.requests_per_minute),
            tokens_per_minute: budget.scale_tokens_per_minute(self.tokens_per_minute),
            daily_quota: budget.scale_daily_quota(self.daily_quota),
            ..self.clone()
        }
    }

    /// Check that the limits and tuning are usable.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the provider and the offending field.
    pub fn validate(&self, provider: &str) -> TollgateResult<()> {
        let positive = [
            ("requests_per_minute", u64::from(self.requests_per_minute)),
            ("tokens_per_minute", self.tokens_per_minute),
            ("daily_quota", u64::from(self.daily_quota)),
            ("failure_threshold", u64::from(self.failure_threshold)),
            ("success_threshold", u64::from(self.success_threshold)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::new(format!(
                    "Provider '{}': {} must be greater than zero",
                    provider, field
                ))
                .into());
            }
        }

        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::new(format!(
                "Provider '{}': jitter_fraction must be within [0, 1], got {}",
                provider, self.jitter_fraction
            ))
            .into());
        }

        if self.base_delay() > self.max_delay() {
            return Err(ConfigError::new(format!(
                "Provider '{}': base_delay_ms ({}) exceeds max_delay_secs ({})",
                provider, self.base_delay_ms, self.max_delay_secs
            ))
            .into());
        }

        Ok(())
    }
}

/// Top-level Tollgate configuration.
///
/// Loads provider limits from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from tollgate.toml)
/// 2. User override (~/.config/tollgate/tollgate.toml, then ./tollgate.toml)
///
/// # Example
///
/// ```no_run
/// use tollgate_rate_limit::TollgateConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TollgateConfig::load()?;
/// let gemini = config.provider("gemini");
/// println!("Gemini RPM: {}", gemini.requests_per_minute);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct TollgateConfig {
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Configuration for providers without a table of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ProviderConfig>,

    /// Budget multipliers applied to every provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetConfig>,
}

impl TollgateConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TollgateResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML for this structure.
    pub fn from_toml_str(toml: &str) -> TollgateResult<Self> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (tollgate.toml shipped with the library)
    /// 2. User config in home directory (~/.config/tollgate/tollgate.toml)
    /// 3. User config in current directory (./tollgate.toml)
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> TollgateResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../tollgate.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/tollgate/tollgate.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("tollgate").required(false));

        builder
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Effective configuration for a provider, with the budget applied.
    ///
    /// Falls back to the `[defaults]` table and then to
    /// `ProviderConfig::default()` for providers that are not listed.
    #[instrument(skip(self))]
    pub fn provider(&self, name: &str) -> ProviderConfig {
        let configured = self
            .providers
            .get(name)
            .or_else(|| self.providers.get(&name.to_ascii_lowercase()));

        let base = match (configured, &self.defaults) {
            (Some(config), _) => config.clone(),
            (None, Some(defaults)) => {
                debug!(provider = name, "No provider table, using [defaults]");
                defaults.clone()
            }
            (None, None) => {
                debug!(provider = name, "No provider table, using built-in defaults");
                ProviderConfig::default()
            }
        };

        match &self.budget {
            Some(budget) => base.with_budget(budget),
            None => base,
        }
    }

    /// Names of the providers with their own table, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validate the budget and every provider table.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> TollgateResult<()> {
        if let Some(budget) = &self.budget {
            budget
                .validate()
                .map_err(|msg| TollgateError::from(ConfigError::new(format!("budget: {}", msg))))?;
        }
        if let Some(defaults) = &self.defaults {
            defaults.validate("defaults")?;
        }
        for name in self.provider_names() {
            self.provider(&name).validate(&name)?;
        }
        Ok(())
    }
}
