//! Circuit breaker state.

use serde::{Deserialize, Serialize};

/// State of a provider's circuit breaker.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    #[default]
    #[display("CLOSED")]
    Closed,
    /// Provider presumed unhealthy, calls are rejected
    #[display("OPEN")]
    Open,
    /// Probing recovery with a single trial call at a time
    #[display("HALF_OPEN")]
    HalfOpen,
}

impl CircuitState {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}
