//! Retry delay computation.

use crate::ProviderConfig;
use rand::Rng;
use std::time::Duration;
use tollgate_core::RateLimitCause;

/// What to do after a throttled or failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    /// Fail now, waiting cannot help
    DoNotRetry,
    /// Retry once this much time has passed
    After(Duration),
}

impl RetryDelay {
    /// The delay to wait, zero for `DoNotRetry`.
    pub fn duration(&self) -> Duration {
        match self {
            RetryDelay::DoNotRetry => Duration::ZERO,
            RetryDelay::After(delay) => *delay,
        }
    }

    /// Returns true if a retry should be scheduled.
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDelay::After(_))
    }
}

/// Delay before retry number `attempt` (0 for the first retry).
///
/// - `DailyQuota` never retries.
/// - Per-minute causes wait out `until_next_minute`, so the retry lands in a
///   fresh window.
/// - Everything else backs off exponentially from `base_delay`, capped at
///   `max_delay`, then scaled by a jitter factor in
///   `[1 - jitter_fraction, 1 + jitter_fraction]`.
pub fn delay_for(
    attempt: u32,
    cause: RateLimitCause,
    config: &ProviderConfig,
    until_next_minute: Duration,
) -> RetryDelay {
    match cause {
        RateLimitCause::DailyQuota => RetryDelay::DoNotRetry,
        RateLimitCause::RequestsPerMinute | RateLimitCause::TokensPerMinute => {
            RetryDelay::After(until_next_minute)
        }
        RateLimitCause::TemporaryOverload | RateLimitCause::Unknown => RetryDelay::After(
            jittered(exponential_delay(attempt, config), config.jitter_fraction),
        ),
    }
}

/// Un-jittered exponential delay: `base_delay * 2^attempt`, capped at `max_delay`.
pub fn exponential_delay(attempt: u32, config: &ProviderConfig) -> Duration {
    config
        .base_delay()
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(config.max_delay())
}

fn jittered(delay: Duration, jitter_fraction: f64) -> Duration {
    let fraction = jitter_fraction.clamp(0.0, 1.0);
    if fraction == 0.0 {
        return delay;
    }
    let factor = rand::thread_rng().gen_range((1.0 - fraction)..=(1.0 + fraction));
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}
