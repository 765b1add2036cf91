//! Example: Retry, timeouts, and circuit breaking around an unreliable API
//!
//! This example demonstrates:
//! 1. Retry with exponential backoff until a flaky call succeeds
//! 2. Retrying only network failures
//! 3. Bounding each attempt with a timeout
//! 4. A circuit breaker opening, failing fast, and recovering
//!
//! Run with:
//! ```bash
//! RUST_LOG=steadfast=debug cargo run -p steadfast --example resilience_example
//! ```

use std::error::Error;
use std::io;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use steadfast::prelude::*;
use tracing_subscriber::EnvFilter;

const ATTEMPTS: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// A simulated API that fails the first few times
struct UnreliableApi {
    attempts: AtomicU32,
    fail_count: u32,
}

impl UnreliableApi {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED (connection reset)", attempt + 1);
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection reset on attempt {}", attempt + 1),
            ))
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok("API response data".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Simple retry with exponential backoff
async fn example_simple_retry() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Retry with Exponential Backoff ===\n");

    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(100))
        .on_retry(|state, attempt, delay| {
            println!("  -> {} failure on attempt {attempt}, waiting {delay:?}", state.category);
        })
        .build()?;

    // No jitter for predictable output
    let executor = RetryExecutor::new().jitter(JitterSource::none());
    let api = UnreliableApi::new(2);

    let start = Instant::now();
    let result = executor.execute(|| api.call(), &policy).await?;

    println!("\nResult: {}", result);
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 2: Only network errors are retried
async fn example_retry_on_category() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Retry Network Errors Only ===\n");

    println!("Test 1: Permission error (should NOT retry)");
    let attempts = AtomicU32::new(0);
    let result = retry_on_category(
        || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(io::Error::new(io::ErrorKind::PermissionDenied, "auth failed"))
        },
        ErrorCategory::Network,
        ATTEMPTS,
    )
    .await;
    assert!(result.is_err());
    println!("  Attempts: {}", attempts.load(Ordering::SeqCst));

    println!("\nTest 2: Connection reset (should retry)");
    let api = UnreliableApi::new(1);
    let result = retry_on_category(
        || api.call(),
        ErrorCategory::Network,
        ATTEMPTS,
    )
    .await?;
    println!("  Result: {} after {} attempts", result, api.total_attempts());

    Ok(())
}

/// Example 3: Each attempt bounded by a timeout
async fn example_retry_with_timeout() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Per-Attempt Timeout ===\n");

    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(50))
        .max_jitter(Duration::ZERO)
        .build()?;
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&attempts);
    let result = retry_with_timeout(
        move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                // The first attempt hangs past its deadline
                let latency = if attempt == 0 { 500 } else { 20 };
                tokio::time::sleep(Duration::from_millis(latency)).await;
                Ok::<_, io::Error>(format!("answered in {latency}ms"))
            }
        },
        Duration::from_millis(100),
        &policy,
    )
    .await?;

    println!("Result: {}", result);
    println!("Total attempts: {}", attempts.load(Ordering::SeqCst));

    Ok(())
}

/// Example 4: Circuit breaker lifecycle
async fn example_circuit_breaker() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 4: Circuit Breaker ===\n");

    let healthy = Arc::new(AtomicBool::new(false));
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(2)
        .recovery_timeout(Duration::from_millis(200))
        .build()?;

    let flag = Arc::clone(&healthy);
    let breaker = with_circuit_breaker(
        move |request: &'static str| {
            let up = flag.load(Ordering::SeqCst);
            async move {
                if up {
                    Ok(format!("{request}: ok"))
                } else {
                    Err(io::Error::other(format!("{request}: service unavailable")))
                }
            }
        },
        config,
    );

    for request in ["first", "second", "third"] {
        match breaker.execute(request).await {
            Ok(body) => println!("  {body}"),
            Err(err) => println!("  {request}: {err} (state: {})", breaker.state()),
        }
    }

    println!("\nWaiting for recovery timeout...");
    tokio::time::sleep(Duration::from_millis(250)).await;
    healthy.store(true, Ordering::SeqCst);

    let body = breaker.execute("probe").await?;
    println!("  {body} (state: {})", breaker.state());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("==============================================");
    println!("   Steadfast: Resilient Execution Examples");
    println!("==============================================");

    example_simple_retry().await?;
    example_retry_on_category().await?;
    example_retry_with_timeout().await?;
    example_circuit_breaker().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
