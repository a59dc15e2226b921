//! Outcome type of a guarded provider call.

use crate::RateLimitError;
use std::fmt;
use tollgate_core::RateLimitCause;

/// Failure of a call made through the rate limiter.
///
/// Either the limiter refused (or gave up on) the call, or the wrapped work
/// failed and its error is passed through unchanged once retries are spent.
///
/// # Examples
///
/// ```
/// use tollgate_error::{CallError, RateLimitError};
///
/// let refused: CallError<String> = CallError::Rejected(RateLimitError::circuit_open("openai"));
/// assert!(refused.is_circuit_open());
///
/// let failed: CallError<String> = CallError::Provider("bad request".to_string());
/// assert_eq!(failed.into_provider().as_deref(), Some("bad request"));
/// ```
#[derive(Debug)]
pub enum CallError<E> {
    /// Refused by the circuit breaker or a quota ceiling
    Rejected(RateLimitError),
    /// The wrapped work's own failure
    Provider(E),
}

impl<E> CallError<E> {
    /// Returns true if the call was refused by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::Rejected(err) if err.is_circuit_open())
    }

    /// The exhausted ceiling, if the call was refused by a quota.
    pub fn limit_cause(&self) -> Option<RateLimitCause> {
        match self {
            CallError::Rejected(err) => err.cause(),
            CallError::Provider(_) => None,
        }
    }

    /// The limiter's rejection, if any.
    pub fn rejection(&self) -> Option<&RateLimitError> {
        match self {
            CallError::Rejected(err) => Some(err),
            CallError::Provider(_) => None,
        }
    }

    /// Consume and return the provider's error, if the work itself failed.
    pub fn into_provider(self) -> Option<E> {
        match self {
            CallError::Provider(err) => Some(err),
            CallError::Rejected(_) => None,
        }
    }
}

impl<E> From<RateLimitError> for CallError<E> {
    fn from(err: RateLimitError) -> Self {
        CallError::Rejected(err)
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Rejected(err) => write!(f, "{}", err),
            CallError::Provider(err) => write!(f, "Provider call failed: {}", err),
        }
    }
}

impl<E> std::error::Error for CallError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Rejected(err) => Some(err),
            CallError::Provider(err) => Some(err),
        }
    }
}
