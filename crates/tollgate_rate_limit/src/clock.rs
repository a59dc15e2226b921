//! Wall-clock sources for window and circuit bookkeeping.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

/// Source of the current wall-clock time.
///
/// Usage windows roll over on wall-clock minute and day boundaries, and the
/// circuit breaker measures its open timeout against the same clock, so every
/// limiter reads time from exactly one `Clock`.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock that advances with Tokio's clock.
///
/// The clock is anchored to a wall-clock instant when it is created and then
/// moves forward with `tokio::time::Instant`. Under a paused runtime
/// (`#[tokio::test(start_paused = true)]`) backoff sleeps and
/// `tokio::time::advance` move this clock too, which makes minute rollover and
/// circuit timeouts deterministic in tests and simulations.
///
/// # Example
///
/// ```rust,ignore
/// use chrono::{TimeZone, Utc};
/// use tollgate_rate_limit::{Clock, TokioClock};
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 30).unwrap();
/// let clock = TokioClock::starting_at(start);
/// tokio::time::advance(std::time::Duration::from_secs(30)).await;
/// assert_eq!(clock.now(), start + chrono::TimeDelta::seconds(30));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall_anchor: DateTime<Utc>,
    instant_anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock that reads `start` right now.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            wall_anchor: start,
            instant_anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.instant_anchor.elapsed())
            .ok()
            .and_then(|elapsed| self.wall_anchor.checked_add_signed(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
