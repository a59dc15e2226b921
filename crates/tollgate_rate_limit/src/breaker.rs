//! Circuit breaker state machine.
//!
//! The breaker has three states:
//! - Closed: normal operation, calls pass through
//! - Open: failures reached the threshold, calls are rejected
//! - HalfOpen: probing recovery, one trial call at a time
//!
//! The breaker is a plain value; the owning limiter keeps it behind the same
//! lock as the usage window, so every transition is serialized per provider.

use crate::ProviderConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tollgate_core::{CircuitSnapshot, CircuitState};
use tracing::{debug, info, warn};

/// How a call got past the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPermit {
    /// Admitted while the circuit was closed
    Normal,
    /// The single trial call of one half-open period
    Trial {
        /// Half-open period the trial belongs to
        generation: u64,
    },
}

impl BreakerPermit {
    /// Whether this permit claimed a half-open trial slot.
    pub fn is_trial(&self) -> bool {
        matches!(self, BreakerPermit::Trial { .. })
    }
}

/// Per-provider circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    generation: u64,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            timeout,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            trial_in_flight: false,
            generation: 0,
        }
    }

    /// Create a closed breaker tuned by a provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.failure_threshold,
            config.success_threshold,
            config.circuit_timeout(),
        )
    }

    /// Current state, without applying the open timeout.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Consecutive failures while closed.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Consecutive trial successes while half-open.
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    /// When the circuit last opened, if it is open.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Whether a half-open trial call is executing.
    pub fn trial_in_flight(&self) -> bool {
        self.trial_in_flight
    }

    /// Whether a call arriving at `now` would get past the breaker.
    ///
    /// Open with the timeout elapsed counts as admissible; the caller moves the
    /// breaker to half-open with [`CircuitBreaker::transition_to_half_open`]
    /// before proceeding. Half-open admits only while no trial is running.
    pub fn can_proceed(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.timeout_elapsed(now),
            CircuitState::HalfOpen => !self.trial_in_flight,
        }
    }

    /// Move from open to half-open once the timeout has elapsed.
    ///
    /// Returns true if the transition happened.
    pub fn transition_to_half_open(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != CircuitState::Open || !self.timeout_elapsed(now) {
            return false;
        }
        self.generation += 1;
        info!(
            generation = self.generation,
            "Circuit breaker entering half-open state"
        );
        self.state = CircuitState::HalfOpen;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
        true
    }

    /// Admit a call, claiming the trial slot when half-open.
    ///
    /// Returns `None` if the call must be rejected as circuit-open.
    pub fn admit(&mut self, now: DateTime<Utc>) -> Option<BreakerPermit> {
        self.transition_to_half_open(now);
        match self.state {
            CircuitState::Closed => Some(BreakerPermit::Normal),
            CircuitState::Open => None,
            CircuitState::HalfOpen if self.trial_in_flight => None,
            CircuitState::HalfOpen => {
                debug!("Admitting half-open trial call");
                self.trial_in_flight = true;
                Some(BreakerPermit::Trial {
                    generation: self.generation,
                })
            }
        }
    }

    /// Record a successful call.
    ///
    /// Only the current half-open period's trial counts toward closing.
    pub fn record_success(&mut self, permit: BreakerPermit) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if self.is_current_trial(permit) => {
                self.trial_in_flight = false;
                self.consecutive_successes += 1;
                debug!(
                    successes = self.consecutive_successes,
                    threshold = self.success_threshold,
                    "Circuit breaker success in half-open state"
                );
                if self.consecutive_successes >= self.success_threshold {
                    self.close();
                }
            }
            // Calls admitted before the current half-open period say nothing about recovery.
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Record a failed call that signals provider trouble.
    pub fn record_failure(&mut self, now: DateTime<Utc>, permit: BreakerPermit) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                debug!(
                    failures = self.consecutive_failures,
                    threshold = self.failure_threshold,
                    "Circuit breaker failure recorded"
                );
                if self.consecutive_failures >= self.failure_threshold {
                    self.open(now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    trial = self.is_current_trial(permit),
                    "Circuit breaker failure in half-open state, reopening"
                );
                self.open(now);
            }
            CircuitState::Open => {}
        }
    }

    /// Give back a permit without a health verdict.
    ///
    /// Used when a call ends in quota exhaustion or is cancelled.
    pub fn release(&mut self, permit: BreakerPermit) {
        if self.state == CircuitState::HalfOpen && self.is_current_trial(permit) {
            self.trial_in_flight = false;
        }
    }

    /// Force the breaker closed.
    pub fn reset(&mut self) {
        self.close();
    }

    /// Copy of the state and counters for status reporting.
    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot::new(
            self.state,
            self.consecutive_failures,
            self.consecutive_successes,
            self.opened_at,
            self.trial_in_flight,
        )
    }

    fn is_current_trial(&self, permit: BreakerPermit) -> bool {
        permit == BreakerPermit::Trial {
            generation: self.generation,
        }
    }

    fn timeout_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.opened_at.is_none_or(|opened_at| {
            (now - opened_at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= self.timeout)
        })
    }

    fn open(&mut self, now: DateTime<Utc>) {
        info!(
            failures = self.consecutive_failures,
            "Circuit breaker opened"
        );
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.trial_in_flight = false;
    }

    fn close(&mut self) {
        if self.state != CircuitState::Closed {
            info!("Circuit breaker closed");
        }
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.trial_in_flight = false;
    }
}
