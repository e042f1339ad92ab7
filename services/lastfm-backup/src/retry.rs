//!
//! src/retry.rs  Andrew Belles  Oct 18th, 2026
//!
//! Bounded retry policy. The delay schedule is a plain lookup on the
//! attempt number so it can be checked without touching the network
//!

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;
use crate::errors::BackupError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    schedule: Vec<Duration>
}

impl RetryPolicy {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.schedule.clone())
    }

    /// Total calls made before giving up: the first one plus one per delay
    pub fn max_attempts(&self) -> usize {
        self.schedule.len() + 1
    }

    /// Delay to sleep after failed attempt `attempt` (0 based), or None
    /// once the schedule is exhausted
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        self.schedule.get(attempt).copied()
    }

    /// Runs `op` until it succeeds, fails with a non transient error, or
    /// the schedule runs out. The last error is returned in the latter case.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, BackupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackupError>>
    {
        let mut attempt = 0_usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    let Some(backoff) = self.delay(attempt) else {
                        warn!(what, attempts = self.max_attempts(), error = %e, "http.retry.exhausted");
                        return Err(e);
                    };
                    warn!(
                        what, attempt, backoff = ?backoff.as_millis(), error = %e,
                        "http.retry"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
