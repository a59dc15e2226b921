//! Errors raised by the rate limiter itself.

use tollgate_core::RateLimitCause;

/// Reasons the limiter refused to run a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RateLimitErrorKind {
    /// The provider's circuit breaker is open (or a half-open trial is running)
    #[display("Circuit open for provider '{}'", provider)]
    CircuitOpen {
        /// Provider name
        provider: String,
    },
    /// A quota or throughput ceiling was reached
    #[display("Rate limit exceeded for provider '{}': {}", provider, cause)]
    LimitExceeded {
        /// Provider name
        provider: String,
        /// Which ceiling was hit
        cause: RateLimitCause,
    },
}

/// Rate limit error with source location tracking.
///
/// # Examples
///
/// ```
/// use tollgate_core::RateLimitCause;
/// use tollgate_error::{RateLimitError, RateLimitErrorKind};
///
/// let err = RateLimitError::new(RateLimitErrorKind::LimitExceeded {
///     provider: "gemini".to_string(),
///     cause: RateLimitCause::DailyQuota,
/// });
/// assert_eq!(err.cause(), Some(RateLimitCause::DailyQuota));
/// assert!(format!("{}", err).contains("DAILY_QUOTA"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Rate Limit Error: {} at line {} in {}", kind, line, file)]
pub struct RateLimitError {
    /// The kind of error that occurred
    pub kind: RateLimitErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RateLimitError {
    /// Create a new RateLimitError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a circuit-open rejection.
    #[track_caller]
    pub fn circuit_open(provider: impl Into<String>) -> Self {
        Self::new(RateLimitErrorKind::CircuitOpen {
            provider: provider.into(),
        })
    }

    /// Shorthand for a quota rejection.
    #[track_caller]
    pub fn limit_exceeded(provider: impl Into<String>, cause: RateLimitCause) -> Self {
        Self::new(RateLimitErrorKind::LimitExceeded {
            provider: provider.into(),
            cause,
        })
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RateLimitErrorKind {
        &self.kind
    }

    /// Returns true if the call was refused by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self.kind, RateLimitErrorKind::CircuitOpen { .. })
    }

    /// The exhausted ceiling, if this is a quota rejection.
    pub fn cause(&self) -> Option<RateLimitCause> {
        match self.kind {
            RateLimitErrorKind::LimitExceeded { cause, .. } => Some(cause),
            RateLimitErrorKind::CircuitOpen { .. } => None,
        }
    }
}
