//! Core data types for Tollgate.
//!
//! These types are shared by the rate limiting engine, the error crate and any
//! monitoring collaborator that renders limiter status. They carry no behavior
//! beyond small helpers, so depending on this crate never pulls in the runtime.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod budget;
mod cause;
mod circuit;
mod reset;
mod status;

pub use budget::{BudgetConfig, BudgetConfigBuilder};
pub use cause::RateLimitCause;
pub use circuit::CircuitState;
pub use reset::DailyResetPolicy;
pub use status::{CircuitSnapshot, ProviderLimits, RateLimiterStatus, UsageSnapshot};
