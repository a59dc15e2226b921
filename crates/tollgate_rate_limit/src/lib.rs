//! Rate limiting, circuit breaking and usage tracking for AI providers.
//!
//! Every outbound call to a quota-limited provider (vision, text and
//! embedding APIs) goes through the provider's [`RateLimiter`]. The limiter
//! keeps per-minute and per-day usage, refuses calls while the provider's
//! circuit is open, classifies failures into a provider-agnostic taxonomy and
//! retries with delays that respect minute windows and exponential backoff.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate_rate_limit::{ProviderRegistry, TollgateConfig};
//!
//! let registry = Arc::new(ProviderRegistry::from_config(TollgateConfig::load()?)?);
//!
//! let embedding = registry
//!     .get("openai")
//!     .execute_with_rate_limiting(estimated_tokens, || client.embed(&chunk))
//!     .await?;
//!
//! for status in registry.statuses() {
//!     println!("{}: can_proceed={}", status.provider(), status.can_proceed());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
mod breaker;
mod classifier;
mod clock;
mod config;
mod limiter;
mod registry;
mod window;

pub use breaker::{BreakerPermit, CircuitBreaker};
pub use classifier::{
    ErrorClassifier, ExactMatchClassifier, SubstringClassifier, classifier_for, classify,
};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{ProviderConfig, TollgateConfig};
pub use limiter::RateLimiter;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use window::UsageWindow;
