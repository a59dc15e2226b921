//! Fixed minute and day usage windows for one provider.
//!
//! Rollover is lazy: there is no background task. Every read and write first
//! normalizes the windows against `now`, so a counter from a finished minute
//! or day is never observed or extended.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use std::time::Duration;
use tollgate_core::{DailyResetPolicy, ProviderLimits, RateLimitCause, UsageSnapshot};
use tracing::debug;

const MINUTE: Duration = Duration::from_secs(60);

/// Request and token counters for the current minute and day.
///
/// Recorded counters only grow through [`UsageWindow::record`], which the
/// limiter calls for successful calls. Admitted calls that are still running
/// hold a reservation (`in_flight_*`) that counts against the ceilings but is
/// not part of the recorded usage. Reservations survive window rollover since
/// they belong to calls, not to windows.
///
/// Not synchronized: the owning limiter serializes access.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    limits: ProviderLimits,
    daily_reset: DailyResetPolicy,
    minute_start: DateTime<Utc>,
    requests_this_minute: u32,
    tokens_this_minute: u64,
    day_start: DateTime<Utc>,
    requests_today: u32,
    tokens_today: u64,
    in_flight_requests: u32,
    in_flight_tokens: u64,
}

/// Counters as they stand after normalization.
#[derive(Debug, Clone, Copy)]
struct Counters {
    minute_start: DateTime<Utc>,
    requests_this_minute: u32,
    tokens_this_minute: u64,
    day_start: DateTime<Utc>,
    requests_today: u32,
    tokens_today: u64,
}

impl UsageWindow {
    /// Create empty windows starting at the boundaries around `now`.
    pub fn new(limits: ProviderLimits, daily_reset: DailyResetPolicy, now: DateTime<Utc>) -> Self {
        let day_start = match daily_reset {
            DailyResetPolicy::UtcMidnight => utc_midnight(now),
            DailyResetPolicy::Rolling => now,
        };
        Self {
            limits,
            daily_reset,
            minute_start: minute_floor(now),
            requests_this_minute: 0,
            tokens_this_minute: 0,
            day_start,
            requests_today: 0,
            tokens_today: 0,
            in_flight_requests: 0,
            in_flight_tokens: 0,
        }
    }

    /// The ceilings this window is checked against.
    pub fn limits(&self) -> ProviderLimits {
        self.limits
    }

    /// Add successful usage to the current windows.
    pub fn record(&mut self, now: DateTime<Utc>, requests: u32, tokens: u64) {
        self.normalize(now);
        self.requests_this_minute = self.requests_this_minute.saturating_add(requests);
        self.tokens_this_minute = self.tokens_this_minute.saturating_add(tokens);
        self.requests_today = self.requests_today.saturating_add(requests);
        self.tokens_today = self.tokens_today.saturating_add(tokens);
    }

    /// Normalized view of the counters. Never exposes a finished window.
    pub fn snapshot(&self, now: DateTime<Utc>) -> UsageSnapshot {
        let c = self.current(now);
        UsageSnapshot::new(
            c.minute_start,
            c.requests_this_minute,
            c.tokens_this_minute,
            c.day_start,
            c.requests_today,
            c.tokens_today,
            self.in_flight_requests,
            self.in_flight_tokens,
        )
    }

    /// The first ceiling one more request of `estimated_tokens` would cross.
    ///
    /// Checked in priority order: requests per minute, tokens per minute,
    /// daily quota. In-flight reservations count as used.
    pub fn would_exceed(&self, now: DateTime<Utc>, estimated_tokens: u64) -> Option<RateLimitCause> {
        let c = self.current(now);
        let pending = u64::from(self.in_flight_requests);

        let requests_minute = u64::from(c.requests_this_minute) + pending + 1;
        if requests_minute > u64::from(*self.limits.requests_per_minute()) {
            return Some(RateLimitCause::RequestsPerMinute);
        }

        let tokens_minute = c
            .tokens_this_minute
            .saturating_add(self.in_flight_tokens)
            .saturating_add(estimated_tokens);
        if tokens_minute > *self.limits.tokens_per_minute() {
            return Some(RateLimitCause::TokensPerMinute);
        }

        let requests_day = u64::from(c.requests_today) + pending + 1;
        if requests_day > u64::from(*self.limits.daily_quota()) {
            return Some(RateLimitCause::DailyQuota);
        }

        None
    }

    /// Time left until the next minute boundary, at most one minute.
    pub fn until_next_minute(&self, now: DateTime<Utc>) -> Duration {
        let next = self.current(now).minute_start + TimeDelta::seconds(60);
        (next - now).to_std().unwrap_or(Duration::ZERO).min(MINUTE)
    }

    /// Hold one request and `tokens` for an admitted call.
    pub fn reserve(&mut self, now: DateTime<Utc>, tokens: u64) {
        self.normalize(now);
        self.in_flight_requests = self.in_flight_requests.saturating_add(1);
        self.in_flight_tokens = self.in_flight_tokens.saturating_add(tokens);
    }

    /// Drop a reservation without recording usage.
    pub fn release(&mut self, tokens: u64) {
        self.in_flight_requests = self.in_flight_requests.saturating_sub(1);
        self.in_flight_tokens = self.in_flight_tokens.saturating_sub(tokens);
    }

    /// Turn a reservation into recorded usage.
    pub fn commit(&mut self, now: DateTime<Utc>, tokens: u64) {
        self.release(tokens);
        self.record(now, 1, tokens);
    }

    fn normalize(&mut self, now: DateTime<Utc>) {
        let c = self.current(now);
        if c.minute_start != self.minute_start {
            debug!(minute_start = %c.minute_start, "Minute window rolled over");
        }
        if c.day_start != self.day_start && self.requests_today > 0 {
            debug!(day_start = %c.day_start, "Daily window rolled over");
        }
        self.minute_start = c.minute_start;
        self.requests_this_minute = c.requests_this_minute;
        self.tokens_this_minute = c.tokens_this_minute;
        self.day_start = c.day_start;
        self.requests_today = c.requests_today;
        self.tokens_today = c.tokens_today;
    }

    fn current(&self, now: DateTime<Utc>) -> Counters {
        // Windows only move forward; a clock stepping backwards keeps the counters.
        let floor = minute_floor(now);
        let (minute_start, requests_this_minute, tokens_this_minute) = if floor > self.minute_start
        {
            (floor, 0, 0)
        } else {
            (
                self.minute_start,
                self.requests_this_minute,
                self.tokens_this_minute,
            )
        };

        let day_start = match self.daily_reset {
            DailyResetPolicy::UtcMidnight => {
                let midnight = utc_midnight(now);
                if midnight > self.day_start {
                    Some(midnight)
                } else {
                    None
                }
            }
            DailyResetPolicy::Rolling => {
                let unused = self.requests_today == 0 && self.in_flight_requests == 0;
                if unused || now >= self.day_start + TimeDelta::days(1) {
                    Some(now)
                } else {
                    None
                }
            }
        };

        let (day_start, requests_today, tokens_today) = match day_start {
            Some(start) => (start, 0, 0),
            None => (self.day_start, self.requests_today, self.tokens_today),
        };

        Counters {
            minute_start,
            requests_this_minute,
            tokens_this_minute,
            day_start,
            requests_today,
            tokens_today,
        }
    }
}

fn minute_floor(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(now)
}

fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
