//! Integration tests for the retry loop and backoff
//!
//! Run with: cargo test -p steadfast --test retry_test

mod common;

use common::{FlakyService, RecordingSleeper};
use proptest::prelude::*;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steadfast::error::{ErrorCategory, ErrorState};
use steadfast::retry::{JitterSource, RetryExecutor, RetryPolicy, compute_delay};
use tokio_test::{assert_err, assert_ok};

fn quiet_executor(sleeper: &RecordingSleeper) -> RetryExecutor {
    RetryExecutor::new()
        .jitter(JitterSource::none())
        .sleeper(sleeper.clone())
}

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let sleeper = RecordingSleeper::default();
    let service = FlakyService::failing(2);
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(10))
        .build()
        .unwrap();

    let value = assert_ok!(quiet_executor(&sleeper).execute(|| service.call(), &policy).await);

    assert_eq!(value, "success");
    assert_eq!(service.calls(), 3);
}

#[tokio::test]
async fn test_always_failing_runs_exactly_max_attempts() {
    for max_attempts in 1..=6 {
        let sleeper = RecordingSleeper::default();
        let service = FlakyService::always_failing();
        let policy = RetryPolicy::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(1))
            .build()
            .unwrap();

        let err = assert_err!(quiet_executor(&sleeper).execute(|| service.call(), &policy).await);

        assert_eq!(service.calls(), max_attempts);
        assert_eq!(
            err.to_string(),
            format!("connection reset on call {max_attempts}")
        );
        assert_eq!(sleeper.delays().len() as u32, max_attempts - 1);
    }
}

#[tokio::test]
async fn test_on_retry_runs_once_per_recovered_failure() {
    for k in 0..4 {
        let sleeper = RecordingSleeper::default();
        let service = FlakyService::failing(k);
        let observed = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&observed);
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .base_delay(Duration::from_millis(1))
            .on_retry(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_ok!(quiet_executor(&sleeper).execute(|| service.call(), &policy).await);

        assert_eq!(service.calls(), k + 1);
        assert_eq!(observed.load(Ordering::SeqCst), k);
    }
}

#[tokio::test]
async fn test_predicate_refusing_first_failure() {
    let sleeper = RecordingSleeper::default();
    let service = FlakyService::always_failing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .should_retry(move |state: &ErrorState, attempt| {
            record.lock().unwrap().push((state.category, attempt));
            false
        })
        .build()
        .unwrap();

    assert_err!(quiet_executor(&sleeper).execute(|| service.call(), &policy).await);

    assert_eq!(service.calls(), 1);
    assert!(sleeper.delays().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![(ErrorCategory::Network, 0)]);
}

#[tokio::test]
async fn test_delays_grow_and_cap() {
    let sleeper = RecordingSleeper::default();
    let service = FlakyService::always_failing();
    let policy = RetryPolicy::builder()
        .max_attempts(6)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(500))
        .build()
        .unwrap();

    assert_err!(quiet_executor(&sleeper).execute(|| service.call(), &policy).await);

    let ms: Vec<u128> = sleeper.delays().iter().map(Duration::as_millis).collect();
    assert_eq!(ms, vec![100, 200, 400, 500, 500]);
}

#[tokio::test]
async fn test_seeded_jitter_is_reproducible_across_executors() {
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .base_delay(Duration::from_millis(10))
        .build()
        .unwrap();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let sleeper = RecordingSleeper::default();
        let service = FlakyService::always_failing();
        let executor = RetryExecutor::new()
            .jitter(JitterSource::seeded(42))
            .sleeper(sleeper.clone());
        assert_err!(executor.execute(|| service.call(), &policy).await);
        runs.push(sleeper.delays());
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].len(), 3);
}

#[tokio::test]
async fn test_timeout_attempts_are_classified_as_timeouts() {
    let sleeper = RecordingSleeper::default();
    let categories = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&categories);
    let policy = RetryPolicy::builder()
        .max_attempts(2)
        .base_delay(Duration::from_millis(1))
        .on_retry(move |state, _, _| record.lock().unwrap().push(state.category))
        .build()
        .unwrap();

    let result = quiet_executor(&sleeper)
        .execute_with_timeout(
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, io::Error>(())
            },
            Duration::from_millis(20),
            &policy,
        )
        .await;

    assert!(assert_err!(result).is_timeout());
    assert_eq!(*categories.lock().unwrap(), vec![ErrorCategory::Timeout]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_gives_each_attempt_a_fresh_token() {
    let sleeper = RecordingSleeper::default();
    let cancelled = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&cancelled);
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .build()
        .unwrap();

    let result = quiet_executor(&sleeper)
        .execute_with_cancellation(
            move |token| {
                let counter = Arc::clone(&counter);
                async move {
                    assert!(!token.is_cancelled());
                    token.cancelled().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(io::Error::other("cancelled"))
                }
            },
            Duration::from_millis(50),
            &policy,
        )
        .await;

    assert!(assert_err!(result).is_timeout());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(cancelled.load(Ordering::SeqCst), 3);
}

proptest! {
    #[test]
    fn prop_delay_stays_within_bounds(
        attempt in 0u32..64,
        base_ms in 1u64..5_000,
        extra_ms in 0u64..60_000,
        factor in 1.01f64..4.0,
        jitter_ms in 0u64..1_000,
    ) {
        let max_ms = base_ms + extra_ms;
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms))
            .backoff_factor(factor)
            .build()
            .unwrap();

        let delay = compute_delay(attempt, &policy, Duration::from_millis(jitter_ms));
        let floor = (base_ms as f64 * factor.powi(attempt as i32)).min(max_ms as f64);

        prop_assert!(delay <= Duration::from_millis(max_ms));
        prop_assert!(delay.as_secs_f64() * 1_000.0 + 1e-6 >= floor);
    }
}
