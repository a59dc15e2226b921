//! Top-level error wrapper types.

use crate::{ConfigError, RateLimitError};

/// Every error the Tollgate crates raise outside of a guarded call.
///
/// # Examples
///
/// ```
/// use tollgate_error::{ConfigError, TollgateError};
///
/// let err: TollgateError = ConfigError::new("missing providers table").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum TollgateErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Rate limiter rejection
    #[from(RateLimitError)]
    RateLimit(RateLimitError),
}

/// Tollgate error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Tollgate Error: {}", _0)]
pub struct TollgateError(Box<TollgateErrorKind>);

impl TollgateError {
    /// Create a new error from a kind.
    pub fn new(kind: TollgateErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TollgateErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to TollgateErrorKind
impl<T> From<T> for TollgateError
where
    T: Into<TollgateErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Tollgate operations.
pub type TollgateResult<T> = std::result::Result<T, TollgateError>;
