//! Tests for the rate limiter under virtual time.
//!
//! Every test runs on a paused Tokio clock, so backoff sleeps auto-advance and
//! `tokio::time::advance` moves the limiter's wall clock.

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tollgate_core::{CircuitState, RateLimitCause};
use tollgate_error::{CallError, RateLimitErrorKind};
use tollgate_rate_limit::{ProviderConfig, RateLimiter, SubstringClassifier, TokioClock};

/// Half past noon, so the current minute has 30 seconds left.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 30).unwrap()
}

fn limiter(config: ProviderConfig) -> RateLimiter {
    RateLimiter::with_parts(
        "test-provider",
        config,
        Arc::new(SubstringClassifier),
        Arc::new(TokioClock::starting_at(start())),
    )
}

async fn succeed(limiter: &RateLimiter, calls: &AtomicU32) -> Result<u32, CallError<String>> {
    limiter
        .execute_with_rate_limiting(100, move || async move {
            Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) + 1)
        })
        .await
}

async fn fail_with(
    limiter: &RateLimiter,
    calls: &AtomicU32,
    message: &str,
) -> Result<(), CallError<String>> {
    limiter
        .execute_with_rate_limiting(100, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(message.to_string())
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_successful_call_records_usage() {
    let limiter = limiter(ProviderConfig::new(10, 10_000, 100));
    let calls = AtomicU32::new(0);

    assert_eq!(succeed(&limiter, &calls).await.unwrap(), 1);

    let status = limiter.status();
    assert_eq!(status.provider(), "test-provider");
    assert_eq!(*status.usage().requests_this_minute(), 1);
    assert_eq!(*status.usage().tokens_this_minute(), 100);
    assert_eq!(*status.usage().requests_today(), 1);
    assert_eq!(*status.usage().in_flight_requests(), 0);
    assert!(*status.can_proceed());
}

#[tokio::test(start_paused = true)]
async fn test_third_call_waits_for_next_minute() {
    let limiter = limiter(ProviderConfig::new(2, 10_000, 100));
    let calls = AtomicU32::new(0);
    let began = Instant::now();

    succeed(&limiter, &calls).await.unwrap();
    succeed(&limiter, &calls).await.unwrap();
    assert!(!*limiter.status().can_proceed());

    assert_eq!(succeed(&limiter, &calls).await.unwrap(), 3);
    assert!(began.elapsed() >= Duration::from_secs(30));

    let usage = *limiter.status().usage();
    assert_eq!(*usage.requests_this_minute(), 1);
    assert_eq!(*usage.requests_today(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_minute_ceiling_without_retries_fails() {
    let limiter = limiter(ProviderConfig::new(2, 10_000, 100).with_max_retries(0));
    let calls = AtomicU32::new(0);

    succeed(&limiter, &calls).await.unwrap();
    succeed(&limiter, &calls).await.unwrap();
    let err = succeed(&limiter, &calls).await.unwrap_err();

    assert_eq!(err.limit_cause(), Some(RateLimitCause::RequestsPerMinute));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_provider_rate_limit_is_retried_next_minute() {
    let limiter = limiter(ProviderConfig::new(10, 10_000, 100));
    let calls = &AtomicU32::new(0);
    let began = Instant::now();

    let result = limiter
        .execute_with_rate_limiting(100, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("429 rate limit reached".to_string())
            } else {
                Ok("done")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(began.elapsed() >= Duration::from_secs(30));
    assert_eq!(*limiter.status().usage().requests_today(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_open_circuit() {
    let limiter = limiter(ProviderConfig::new(60, 100_000, 1_000).with_max_retries(0));
    let calls = AtomicU32::new(0);

    for _ in 0..5 {
        let err = fail_with(&limiter, &calls, "service overloaded")
            .await
            .unwrap_err();
        assert_eq!(err.into_provider().as_deref(), Some("service overloaded"));
    }
    assert_eq!(*limiter.status().circuit().state(), CircuitState::Open);

    let err = fail_with(&limiter, &calls, "service overloaded")
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(!*limiter.status().can_proceed());
}

#[tokio::test(start_paused = true)]
async fn test_circuit_recovers_after_timeout() {
    let limiter = limiter(ProviderConfig::new(60, 100_000, 1_000).with_max_retries(0));
    let calls = AtomicU32::new(0);

    for _ in 0..5 {
        let _ = fail_with(&limiter, &calls, "service overloaded").await;
    }
    assert!(succeed(&limiter, &calls).await.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_secs(300)).await;
    assert!(*limiter.status().can_proceed());

    for _ in 0..3 {
        succeed(&limiter, &calls).await.unwrap();
    }
    let circuit = *limiter.status().circuit();
    assert_eq!(*circuit.state(), CircuitState::Closed);
    assert_eq!(*circuit.consecutive_failures(), 0);
    assert_eq!(*circuit.consecutive_successes(), 0);

    succeed(&limiter, &calls).await.unwrap();
    assert_eq!(*limiter.status().circuit().state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_when_circuit_opens() {
    let limiter = limiter(ProviderConfig::new(60, 100_000, 1_000));
    let calls = AtomicU32::new(0);

    let err = fail_with(&limiter, &calls, "The model is overloaded")
        .await
        .unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_pass_provider_error_through() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(2)
            .with_failure_threshold(10),
    );
    let calls = AtomicU32::new(0);
    let began = Instant::now();

    let err = fail_with(&limiter, &calls, "invalid request body")
        .await
        .unwrap_err();

    assert_eq!(err.into_provider().as_deref(), Some("invalid request body"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s then 2s of backoff, each jittered by at most a quarter.
    assert!(began.elapsed() >= Duration::from_millis(2_250));

    let status = limiter.status();
    assert_eq!(*status.usage().requests_today(), 0);
    assert_eq!(*status.circuit().consecutive_failures(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_overload_backs_off_exponentially() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(3)
            .with_failure_threshold(10),
    );
    let calls = AtomicU32::new(0);
    let began = Instant::now();

    let err = fail_with(&limiter, &calls, "service overloaded")
        .await
        .unwrap_err();

    assert_eq!(err.into_provider().as_deref(), Some("service overloaded"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let elapsed = began.elapsed();
    assert!(elapsed >= Duration::from_millis(5_250), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(8_750), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_backoff_without_jitter_is_exact() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(2)
            .with_jitter_fraction(0.0),
    );
    let calls = AtomicU32::new(0);
    let began = Instant::now();

    let _ = fail_with(&limiter, &calls, "503 service unavailable").await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(began.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_work_not_called_when_admission_fails() {
    let invoked = &AtomicU32::new(0);

    let open = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(0)
            .with_failure_threshold(1),
    );
    let _ = open
        .execute_with_rate_limiting(100, move || {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("service unavailable".to_string()) }
        })
        .await;
    assert_eq!(invoked.load(Ordering::SeqCst), 1);

    let err = open
        .execute_with_rate_limiting(100, move || {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(()) }
        })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 1);

    let exhausted = limiter(ProviderConfig::new(60, 100_000, 1));
    let call = || {
        exhausted.execute_with_rate_limiting(100, move || {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(()) }
        })
    };
    call().await.unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 2);

    let err = call().await.unwrap_err();
    assert_eq!(err.limit_cause(), Some(RateLimitCause::DailyQuota));
    assert_eq!(invoked.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_daily_quota_fails_fast() {
    let limiter = limiter(ProviderConfig::new(60, 100_000, 1_000));
    let calls = AtomicU32::new(0);
    let began = Instant::now();

    let err = fail_with(&limiter, &calls, "daily quota exceeded")
        .await
        .unwrap_err();

    let rejection = err.rejection().unwrap();
    assert!(matches!(
        rejection.kind(),
        RateLimitErrorKind::LimitExceeded {
            cause: RateLimitCause::DailyQuota,
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(began.elapsed(), Duration::ZERO);

    let status = limiter.status();
    assert_eq!(*status.circuit().consecutive_failures(), 0);
    assert_eq!(*status.usage().requests_today(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_local_daily_quota_rejects_without_calling() {
    let limiter = limiter(ProviderConfig::new(60, 100_000, 2));
    let calls = AtomicU32::new(0);

    succeed(&limiter, &calls).await.unwrap();
    succeed(&limiter, &calls).await.unwrap();
    let err = succeed(&limiter, &calls).await.unwrap_err();

    assert_eq!(err.limit_cause(), Some(RateLimitCause::DailyQuota));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_request_fails_fast() {
    let limiter = limiter(ProviderConfig::new(60, 1_000, 1_000));
    let calls = &AtomicU32::new(0);
    let began = Instant::now();

    let err = limiter
        .execute_with_rate_limiting(5_000, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.limit_cause(), Some(RateLimitCause::TokensPerMinute));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(began.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_never_exceed_rpm() {
    let limiter = limiter(ProviderConfig::new(5, 100_000, 1_000).with_max_retries(0));

    let results = join_all((0..10).map(|i| {
        limiter.execute_with_rate_limiting(100, move || async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(i)
        })
    }))
    .await;

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let throttled = results
        .iter()
        .filter(|r| {
            r.as_ref().err().and_then(CallError::limit_cause)
                == Some(RateLimitCause::RequestsPerMinute)
        })
        .count();
    assert_eq!(admitted, 5);
    assert_eq!(throttled, 5);
    assert_eq!(*limiter.status().usage().requests_this_minute(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_spill_into_next_minute() {
    let limiter = limiter(ProviderConfig::new(5, 100_000, 1_000));

    let results = join_all((0..10).map(|i| {
        limiter.execute_with_rate_limiting(100, move || async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(i)
        })
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));
    let usage = *limiter.status().usage();
    assert_eq!(*usage.requests_this_minute(), 5);
    assert_eq!(*usage.requests_today(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_admits_single_trial() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(0)
            .with_failure_threshold(1)
            .with_circuit_timeout_secs(10),
    );
    let limiter = &limiter;
    let calls = AtomicU32::new(0);
    let _ = fail_with(limiter, &calls, "service unavailable").await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let (release, released) = oneshot::channel::<()>();
    let mut released = Some(released);

    let trial = limiter.execute_with_rate_limiting(100, || {
        let released = released.take();
        async move {
            if let Some(released) = released {
                let _ = released.await;
            }
            Ok::<_, String>("trial")
        }
    });
    let rival = async move {
        tokio::task::yield_now().await;
        let result = limiter
            .execute_with_rate_limiting(100, || async { Ok::<_, String>("rival") })
            .await;
        let _ = release.send(());
        result
    };
    let (trial, rival) = tokio::join!(trial, rival);

    assert_eq!(trial.unwrap(), "trial");
    assert!(rival.unwrap_err().is_circuit_open());

    let circuit = *limiter.status().circuit();
    assert_eq!(*circuit.state(), CircuitState::HalfOpen);
    assert_eq!(*circuit.consecutive_successes(), 1);
    assert!(!*circuit.trial_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_trial_releases_slot() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(0)
            .with_failure_threshold(1)
            .with_circuit_timeout_secs(10),
    );
    let calls = AtomicU32::new(0);
    let _ = fail_with(&limiter, &calls, "request timeout").await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        limiter.execute_with_rate_limiting(500, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, String>(())
        }),
    )
    .await;
    assert!(cancelled.is_err());

    let status = limiter.status();
    assert_eq!(*status.circuit().state(), CircuitState::HalfOpen);
    assert!(!*status.circuit().trial_in_flight());
    assert_eq!(*status.usage().in_flight_requests(), 0);
    assert_eq!(*status.usage().in_flight_tokens(), 0);
    assert_eq!(*status.usage().requests_today(), 0);

    succeed(&limiter, &calls).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reset_circuit() {
    let limiter = limiter(
        ProviderConfig::new(60, 100_000, 1_000)
            .with_max_retries(0)
            .with_failure_threshold(1),
    );
    let calls = AtomicU32::new(0);
    let _ = fail_with(&limiter, &calls, "overloaded").await;
    assert_eq!(*limiter.status().circuit().state(), CircuitState::Open);

    limiter.reset_circuit();

    assert_eq!(*limiter.status().circuit().state(), CircuitState::Closed);
    succeed(&limiter, &calls).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_status_recovers_on_next_minute() {
    let limiter = limiter(ProviderConfig::new(1, 100_000, 1_000));
    let calls = AtomicU32::new(0);

    succeed(&limiter, &calls).await.unwrap();
    assert!(!*limiter.status().can_proceed());

    tokio::time::advance(Duration::from_secs(30)).await;
    let status = limiter.status();
    assert!(*status.can_proceed());
    assert_eq!(*status.usage().requests_this_minute(), 0);
    assert_eq!(*status.usage().requests_today(), 1);
}

#[test]
fn test_classify_uses_configured_codes() {
    let mut codes = std::collections::HashMap::new();
    codes.insert("RESOURCE_EXHAUSTED".to_string(), RateLimitCause::TokensPerMinute);
    let limiter = RateLimiter::new("gemini", ProviderConfig::default().with_error_codes(codes));

    assert_eq!(limiter.provider(), "gemini");
    assert_eq!(
        limiter.classify("RESOURCE_EXHAUSTED: try again later"),
        RateLimitCause::TokensPerMinute
    );
}
