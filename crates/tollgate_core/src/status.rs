//! Read-only status snapshots consumed by monitoring collaborators.

use crate::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configured ceilings of a provider, after budget multipliers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_new::new,
)]
pub struct ProviderLimits {
    /// Requests allowed per wall-clock minute
    requests_per_minute: u32,
    /// Tokens allowed per wall-clock minute
    tokens_per_minute: u64,
    /// Requests allowed per daily window
    daily_quota: u32,
}

/// Usage counters of one provider, normalized to the current windows.
///
/// Recorded counters only include successful calls. In-flight counters hold
/// the reservations of calls that were admitted and have not finished yet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_new::new,
)]
pub struct UsageSnapshot {
    /// Start of the current minute window
    minute_start: DateTime<Utc>,
    /// Successful requests recorded this minute
    requests_this_minute: u32,
    /// Tokens recorded this minute
    tokens_this_minute: u64,
    /// Start of the current daily window
    day_start: DateTime<Utc>,
    /// Successful requests recorded in the daily window
    requests_today: u32,
    /// Tokens recorded in the daily window
    tokens_today: u64,
    /// Admitted calls that have not completed
    in_flight_requests: u32,
    /// Tokens reserved by admitted calls that have not completed
    in_flight_tokens: u64,
}

/// Circuit breaker state and counters.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_new::new,
)]
pub struct CircuitSnapshot {
    /// Current breaker state
    state: CircuitState,
    /// Consecutive failures observed while closed
    consecutive_failures: u32,
    /// Consecutive successes observed while half-open
    consecutive_successes: u32,
    /// When the breaker last opened, if it is open
    opened_at: Option<DateTime<Utc>>,
    /// Whether a half-open trial call is executing
    trial_in_flight: bool,
}

/// Point-in-time status of one provider's rate limiter.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use tollgate_core::{
///     CircuitSnapshot, CircuitState, ProviderLimits, RateLimiterStatus, UsageSnapshot,
/// };
///
/// let now = Utc::now();
/// let status = RateLimiterStatus::new(
///     "gemini".to_string(),
///     ProviderLimits::new(10, 250_000, 250),
///     UsageSnapshot::new(now, 1, 500, now, 1, 500, 0, 0),
///     CircuitSnapshot::new(CircuitState::Closed, 0, 0, None, false),
///     true,
/// );
/// assert_eq!(status.provider(), "gemini");
/// assert_eq!(*status.circuit().state(), CircuitState::Closed);
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters, derive_new::new,
)]
pub struct RateLimiterStatus {
    /// Provider name
    provider: String,
    /// Configured ceilings
    limits: ProviderLimits,
    /// Current usage
    usage: UsageSnapshot,
    /// Circuit breaker state
    circuit: CircuitSnapshot,
    /// Whether the next call would be admitted immediately
    can_proceed: bool,
}
