//! Per-provider rate limiter that guards every outbound call.
//!
//! The limiter composes a [`UsageWindow`], a [`CircuitBreaker`], an
//! [`ErrorClassifier`] and the backoff policy:
//! 1. The breaker decides whether the provider may be called at all
//! 2. The usage window decides whether a ceiling is in the way
//! 3. The work runs outside any lock
//! 4. The outcome is recorded and the failure, if any, classified
//! 5. Retries are scheduled through `tokio-retry2`, sleeping the policy-computed delays
//!
//! Only the bookkeeping before and after the work is serialized. Sleeps and
//! the work itself never hold the lock.

use crate::backoff::{self, RetryDelay};
use crate::breaker::BreakerPermit;
use crate::classifier::{self, ErrorClassifier};
use crate::{CircuitBreaker, Clock, ProviderConfig, SystemClock, UsageWindow};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tollgate_core::{RateLimitCause, RateLimiterStatus};
use tollgate_error::{CallError, RateLimitError};
use tracing::{debug, instrument, warn};

/// Mutable per-provider state. One lock covers both parts.
#[derive(Debug)]
struct LimiterState {
    window: UsageWindow,
    breaker: CircuitBreaker,
}

/// Result of the admission check that precedes every attempt.
enum Admission<'a> {
    /// The call may run and holds a reservation
    Granted(InFlight<'a>),
    /// A per-minute ceiling is in the way; try again after `delay`
    Wait {
        cause: RateLimitCause,
        delay: Duration,
    },
    /// Fail without retrying
    Rejected(RateLimitError),
}

/// Retry bookkeeping of one `execute_with_rate_limiting` call.
///
/// `next_delay` hands the policy delay of a failed attempt to the retry
/// strategy, which sleeps for it before the next attempt.
#[derive(Debug, Default)]
struct RetryState {
    attempts: AtomicU32,
    next_delay_nanos: AtomicU64,
}

impl RetryState {
    /// Retries scheduled so far, which is the backoff exponent of the next one.
    fn attempt(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn set_delay(&self, delay: Duration) {
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        self.next_delay_nanos.store(nanos, Ordering::SeqCst);
    }

    fn take_delay(&self) -> Duration {
        Duration::from_nanos(self.next_delay_nanos.swap(0, Ordering::SeqCst))
    }
}

/// Rate limiter, circuit breaker and usage tracker for one provider.
///
/// One instance exists per provider for the lifetime of the process, shared
/// by every caller through the [`ProviderRegistry`](crate::ProviderRegistry).
///
/// # Example
///
/// ```rust,ignore
/// use tollgate_rate_limit::{ProviderConfig, RateLimiter};
///
/// let limiter = RateLimiter::new("gemini", ProviderConfig::new(10, 250_000, 250));
///
/// let caption = limiter
///     .execute_with_rate_limiting(1_200, || client.describe_frame(&frame))
///     .await?;
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    config: ProviderConfig,
    classifier: Arc<dyn ErrorClassifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter on the system clock, classifying errors as the
    /// configuration calls for.
    pub fn new(provider: impl Into<String>, config: ProviderConfig) -> Self {
        let classifier = classifier::classifier_for(&config);
        Self::with_parts(provider, config, classifier, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit classifier and clock.
    pub fn with_parts(
        provider: impl Into<String>,
        config: ProviderConfig,
        classifier: Arc<dyn ErrorClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let state = LimiterState {
            window: UsageWindow::new(config.limits(), config.daily_reset, now),
            breaker: CircuitBreaker::from_config(&config),
        };
        Self {
            provider: provider.into(),
            config,
            classifier,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Provider name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Classify an error message the way this provider's failures are classified.
    pub fn classify(&self, message: &str) -> RateLimitCause {
        self.classifier.classify(message)
    }

    /// Run `work` under the provider's rate limits and circuit breaker.
    ///
    /// Each attempt is admitted first; `work` is only called for admitted
    /// attempts. Between attempts the limiter sleeps for the backoff delay of
    /// the failure that ended the previous attempt.
    ///
    /// # Errors
    ///
    /// - `CallError::Rejected` with a circuit-open error when the breaker
    ///   refuses the call
    /// - `CallError::Rejected` with `LimitExceeded { cause }` when a quota is
    ///   exhausted: immediately for the daily quota, after the retry budget
    ///   for per-minute ceilings
    /// - `CallError::Provider` with the work's own error once retries are spent
    #[instrument(skip(self, work), fields(provider = %self.provider))]
    pub async fn execute_with_rate_limiting<F, Fut, T, E>(
        &self,
        estimated_tokens: u64,
        mut work: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let retry = &RetryState::default();
        let strategy =
            std::iter::from_fn(|| Some(retry.take_delay())).take(self.config.max_retries as usize);

        Retry::spawn(strategy, move || {
            let admitted = match self.admit(estimated_tokens) {
                Admission::Granted(in_flight) => Ok((in_flight, work())),
                Admission::Rejected(err) => {
                    warn!(error = %err, "Call rejected");
                    Err(RetryError::Permanent(err.into()))
                }
                Admission::Wait { cause, delay } => {
                    let delay =
                        backoff::delay_for(retry.attempt(), cause, &self.config, delay).duration();
                    let err = RateLimitError::limit_exceeded(&self.provider, cause);
                    Err(self.retry_after(retry, err.into(), delay))
                }
            };
            self.attempt(retry, admitted)
        })
        .await
    }

    /// Read-only snapshot for monitoring.
    pub fn status(&self) -> RateLimiterStatus {
        let now = self.clock.now();
        let state = self.lock();
        let can_proceed =
            state.breaker.can_proceed(now) && state.window.would_exceed(now, 0).is_none();
        RateLimiterStatus::new(
            self.provider.clone(),
            self.config.limits(),
            state.window.snapshot(now),
            state.breaker.snapshot(),
            can_proceed,
        )
    }

    /// Force the circuit breaker closed.
    pub fn reset_circuit(&self) {
        self.lock().breaker.reset();
    }

    async fn attempt<Fut, T, E>(
        &self,
        retry: &RetryState,
        admitted: Result<(InFlight<'_>, Fut), RetryError<CallError<E>>>,
    ) -> Result<T, RetryError<CallError<E>>>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let (in_flight, call) = admitted?;

        match call.await {
            Ok(value) => {
                in_flight.succeed();
                Ok(value)
            }
            Err(err) => {
                let cause = self.classifier.classify(&err.to_string());
                let until_next_minute = in_flight.fail(cause);
                match backoff::delay_for(retry.attempt(), cause, &self.config, until_next_minute)
                {
                    RetryDelay::DoNotRetry => {
                        warn!(error = %err, %cause, "Provider reported quota exhaustion");
                        Err(RetryError::Permanent(
                            RateLimitError::limit_exceeded(&self.provider, cause).into(),
                        ))
                    }
                    RetryDelay::After(delay) => {
                        Err(self.retry_after(retry, CallError::Provider(err), delay))
                    }
                }
            }
        }
    }

    /// Serialized admission: breaker first, then the usage window.
    fn admit(&self, estimated_tokens: u64) -> Admission<'_> {
        let now = self.clock.now();
        let mut state = self.lock();

        let Some(permit) = state.breaker.admit(now) else {
            return Admission::Rejected(RateLimitError::circuit_open(&self.provider));
        };

        match state.window.would_exceed(now, estimated_tokens) {
            None => {
                state.window.reserve(now, estimated_tokens);
                debug!(estimated_tokens, ?permit, "Call admitted");
                Admission::Granted(InFlight {
                    limiter: self,
                    tokens: estimated_tokens,
                    permit,
                    settled: false,
                })
            }
            Some(cause) => {
                state.breaker.release(permit);
                let oversized = cause == RateLimitCause::TokensPerMinute
                    && estimated_tokens > self.config.tokens_per_minute;
                if !cause.is_retryable() || oversized {
                    Admission::Rejected(RateLimitError::limit_exceeded(&self.provider, cause))
                } else {
                    Admission::Wait {
                        cause,
                        delay: state.window.until_next_minute(now),
                    }
                }
            }
        }
    }

    /// Decide between another attempt after `delay` and giving up.
    fn retry_after<E>(
        &self,
        retry: &RetryState,
        err: CallError<E>,
        delay: Duration,
    ) -> RetryError<CallError<E>>
    where
        E: fmt::Display,
    {
        let attempt = retry.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.config.max_retries {
            warn!(error = %err, attempts = attempt + 1, "Retries exhausted");
            RetryError::Permanent(err)
        } else {
            warn!(
                error = %err,
                retry = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, will retry"
            );
            retry.set_delay(delay);
            RetryError::Transient {
                err,
                retry_after: Some(delay),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reservation held by an admitted call.
///
/// Settled exactly once: by success, by failure, or on drop when the caller
/// is cancelled mid-call. Dropping releases the reservation and the trial
/// slot without recording usage or a health verdict.
struct InFlight<'a> {
    limiter: &'a RateLimiter,
    tokens: u64,
    permit: BreakerPermit,
    settled: bool,
}

impl InFlight<'_> {
    fn succeed(mut self) {
        let now = self.limiter.clock.now();
        let mut state = self.limiter.lock();
        state.window.commit(now, self.tokens);
        state.breaker.record_success(self.permit);
        self.settled = true;
    }

    /// Settle a failed call and report the time left in the current minute.
    fn fail(mut self, cause: RateLimitCause) -> Duration {
        let now = self.limiter.clock.now();
        let mut state = self.limiter.lock();
        state.window.release(self.tokens);
        if cause.is_retryable() {
            state.breaker.record_failure(now, self.permit);
        } else {
            state.breaker.release(self.permit);
        }
        self.settled = true;
        state.window.until_next_minute(now)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!("Call cancelled, releasing reservation");
        let mut state = self.limiter.lock();
        state.window.release(self.tokens);
        state.breaker.release(self.permit);
    }
}
