//! Process-wide table of per-provider rate limiters.

use crate::classifier::{self, ErrorClassifier};
use crate::{Clock, RateLimiter, SystemClock, TollgateConfig};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tollgate_core::RateLimiterStatus;
use tollgate_error::TollgateResult;
use tracing::{debug, info, instrument};

/// Maps provider names to their single shared [`RateLimiter`].
///
/// Limiters are built lazily on first request and live as long as the
/// registry. Construct one registry at startup and hand it to every call site
/// (typically as `Arc<ProviderRegistry>`); tests build isolated registries.
///
/// # Example
///
/// ```no_run
/// use tollgate_rate_limit::{ProviderRegistry, TollgateConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ProviderRegistry::from_config(TollgateConfig::load()?)?;
/// let gemini = registry.get("gemini");
/// assert!(std::sync::Arc::ptr_eq(&gemini, &registry.get("gemini")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProviderRegistry {
    config: TollgateConfig,
    clock: Arc<dyn Clock>,
    classifiers: HashMap<String, Arc<dyn ErrorClassifier>>,
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
}

impl ProviderRegistry {
    /// Creates a new registry builder.
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Build a registry on the system clock from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any provider table is invalid.
    pub fn from_config(config: TollgateConfig) -> TollgateResult<Self> {
        Self::builder().config(config).build()
    }

    /// The configuration limiters are built from.
    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    /// The limiter for `provider`, created on first use.
    ///
    /// Concurrent first calls for the same name all receive the same instance.
    #[instrument(skip(self))]
    pub fn get(&self, provider: &str) -> Arc<RateLimiter> {
        if let Some(limiter) = self.read_limiters().get(provider) {
            return Arc::clone(limiter);
        }

        let mut limiters = self
            .limiters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let limiter = limiters
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(self.build_limiter(provider)));
        Arc::clone(limiter)
    }

    /// Names of the providers with a constructed limiter, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_limiters().keys().cloned().collect();
        names.sort();
        names
    }

    /// Status of every constructed limiter, sorted by provider name.
    pub fn statuses(&self) -> Vec<RateLimiterStatus> {
        let limiters: Vec<Arc<RateLimiter>> = self.read_limiters().values().cloned().collect();
        let mut statuses: Vec<RateLimiterStatus> =
            limiters.iter().map(|limiter| limiter.status()).collect();
        statuses.sort_by(|a, b| a.provider().cmp(b.provider()));
        statuses
    }

    fn build_limiter(&self, provider: &str) -> RateLimiter {
        let config = self.config.provider(provider);
        let classifier = self
            .classifiers
            .get(provider)
            .cloned()
            .unwrap_or_else(|| classifier::classifier_for(&config));
        info!(
            provider,
            rpm = config.requests_per_minute,
            tpm = config.tokens_per_minute,
            daily_quota = config.daily_quota,
            "Creating rate limiter"
        );
        RateLimiter::with_parts(provider, config, classifier, Arc::clone(&self.clock))
    }

    fn read_limiters(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RateLimiter>>> {
        self.limiters.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            config: TollgateConfig::default(),
            clock: Arc::new(SystemClock),
            classifiers: HashMap::new(),
            limiters: RwLock::new(HashMap::new()),
        }
    }
}

/// Builder for `ProviderRegistry`.
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    config: Option<TollgateConfig>,
    clock: Option<Arc<dyn Clock>>,
    classifiers: HashMap<String, Arc<dyn ErrorClassifier>>,
}

impl ProviderRegistryBuilder {
    /// Sets the configuration (default: empty, built-in provider defaults).
    pub fn config(mut self, config: TollgateConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the clock shared by every limiter (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the error classifier of one provider.
    pub fn classifier(
        mut self,
        provider: impl Into<String>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        self.classifiers.insert(provider.into(), classifier);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration does not validate.
    pub fn build(self) -> TollgateResult<ProviderRegistry> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        debug!(
            providers = config.providers.len(),
            classifiers = self.classifiers.len(),
            "Building provider registry"
        );
        Ok(ProviderRegistry {
            config,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            classifiers: self.classifiers,
            limiters: RwLock::new(HashMap::new()),
        })
    }
}
