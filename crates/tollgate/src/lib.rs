//! Tollgate - rate limiting for quota-limited AI providers
//!
//! Tollgate wraps every outbound call to a vision, text or embedding provider
//! in a per-provider guard that enforces request, token and daily quotas,
//! stops calling a provider that keeps failing, and retries throttled calls
//! once waiting can help.
//!
//! # Features
//!
//! - **Usage Windows**: Wall-clock minute and daily counters per provider
//! - **Circuit Breaker**: Closed, open and half-open states with a single trial call
//! - **Error Classification**: Provider errors mapped onto one cause taxonomy
//! - **Backoff**: Waits for the next minute or backs off exponentially with jitter
//! - **Configuration**: Layered TOML limits with budget multipliers
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate::{ProviderRegistry, TollgateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ProviderRegistry::from_config(TollgateConfig::load()?)?);
//!
//!     let transcript = registry
//!         .get("openai")
//!         .execute_with_rate_limiting(2_000, || client.transcribe(&audio))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `tollgate_core` - Shared data types (causes, states, status snapshots)
//! - `tollgate_error` - Error types
//! - `tollgate_rate_limit` - Limiter, breaker, windows, classifiers and registry
//!
//! This crate (`tollgate`) re-exports everything for convenience and ships the
//! `tollgate` operator CLI.

pub mod cli;

pub use tollgate_core::*;
pub use tollgate_error::*;
pub use tollgate_rate_limit::{
    BreakerPermit, CircuitBreaker, Clock, ErrorClassifier, ExactMatchClassifier, ProviderConfig,
    ProviderRegistry, ProviderRegistryBuilder, RateLimiter, SubstringClassifier, SystemClock,
    TokioClock, TollgateConfig, UsageWindow, backoff, classifier_for, classify,
};
