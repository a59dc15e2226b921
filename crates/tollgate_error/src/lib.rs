//! Error types for the Tollgate library.
//!
//! This crate provides the error types used throughout the Tollgate workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Guarded provider calls return [`CallError`], which either carries a
//! [`RateLimitError`] raised by the limiter itself or passes the provider's
//! own failure through untouched.
//!
//! # Examples
//!
//! ```
//! use tollgate_error::{ConfigError, TollgateResult};
//!
//! fn load_limits() -> TollgateResult<u32> {
//!     Err(ConfigError::new("requests_per_minute must be greater than zero"))?
//! }
//!
//! assert!(load_limits().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod call;
mod config;
mod error;
mod rate_limit;

pub use call::CallError;
pub use config::ConfigError;
pub use error::{TollgateError, TollgateErrorKind, TollgateResult};
pub use rate_limit::{RateLimitError, RateLimitErrorKind};
