//! Common test utilities and helpers

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steadfast::retry::Sleeper;

/// Sleeper that records requested delays and returns immediately.
#[allow(dead_code)]
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

#[allow(dead_code)]
impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Operation that fails `failures` times with a network error, then succeeds.
#[derive(Debug, Clone)]
pub struct FlakyService {
    calls: Arc<AtomicU32>,
    failures: u32,
}

#[allow(dead_code)]
impl FlakyService {
    pub fn failing(failures: u32) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub async fn call(&self) -> Result<&'static str, io::Error> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection reset on call {}", n + 1),
            ))
        } else {
            Ok("success")
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
