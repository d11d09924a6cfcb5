//! Backoff pacer wrapping every remote call.
//!
//! A call is retried while the operation reports it should be, sleeping an
//! exponentially growing, jittered interval between attempts. The interval a
//! call starts from is shared: retries push it up and successes let it decay
//! back to the minimum, so a struggling backend slows every caller down.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{MediaFsError, Result};

const MIN_SLEEP_MS: u64 = 10;
const MAX_SLEEP_MS: u64 = 2000;
const DECAY_CONSTANT: u32 = 2;
const MAX_ATTEMPTS: u32 = 10;

/// Pacer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacerConfig {
    pub min_sleep_ms: u64,
    pub max_sleep_ms: u64,
    pub decay: u32,
    /// Attempts per call before giving up, 0 retries forever
    pub max_attempts: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            min_sleep_ms: MIN_SLEEP_MS,
            max_sleep_ms: MAX_SLEEP_MS,
            decay: DECAY_CONSTANT,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl PacerConfig {
    pub fn min_sleep(&self) -> Duration {
        Duration::from_millis(self.min_sleep_ms)
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms.max(self.min_sleep_ms))
    }

    fn decay(&self) -> u32 {
        self.decay.max(2)
    }
}

/// Sequence of sleep intervals for one call.
///
/// Each interval is the current base plus up to half of it as jitter, capped at
/// the ceiling. The base grows by the decay factor every step, which keeps the
/// sequence non-decreasing despite the jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    decay: u32,
}

impl Backoff {
    pub fn new(start: Duration, max: Duration, decay: u32) -> Self {
        Self {
            base: start.min(max),
            max,
            decay: decay.max(2),
        }
    }

    /// Base the next interval is drawn from
    pub fn base(&self) -> Duration {
        self.base
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let base_ms = self.base.as_millis() as u64;
        let jitter_ms = if base_ms >= 2 {
            rand::rng().random_range(0..=base_ms / 2)
        } else {
            0
        };
        let interval = (self.base + Duration::from_millis(jitter_ms)).min(self.max);
        self.base = (self.base * self.decay).min(self.max);
        Some(interval)
    }
}

/// Retry decision for a plain remote result.
pub fn should_retry<T>(result: &Result<T>) -> bool {
    matches!(result, Err(err) if err.is_retryable())
}

pub struct Pacer {
    config: PacerConfig,
    current: Mutex<Duration>,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(config: PacerConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Pacer whose retry sleeps are interrupted by `cancel`
    pub fn with_cancellation(config: PacerConfig, cancel: CancellationToken) -> Self {
        let start = config.min_sleep();
        Self {
            config,
            current: Mutex::new(start),
            cancel,
        }
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `op` until it reports it should not be retried.
    ///
    /// `op` returns the retry flag together with its outcome; the outcome of
    /// the last attempt is returned unmodified.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = (bool, Result<T>)>,
    {
        let start = *self.current.lock().await;
        let mut backoff = Backoff::new(start, self.config.max_sleep(), self.config.decay());
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(MediaFsError::Cancelled);
            }
            attempt += 1;

            let (retry, result) = op().await;
            if !retry {
                if result.is_ok() {
                    self.decay_current().await;
                }
                return result;
            }

            let err = match result {
                Err(err) => err,
                // retry requested on a success: honour it, nothing to report yet
                Ok(_) => MediaFsError::Transport("retry requested".to_string()),
            };

            if self.config.max_attempts > 0 && attempt >= self.config.max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, err);
                return Err(MediaFsError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = backoff.next().unwrap_or(self.config.max_sleep());
            {
                let mut current = self.current.lock().await;
                *current = backoff.base();
            }
            warn!(
                "Retrying in {:?} (attempt {}): {}",
                delay, attempt, err
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Pacer cancelled while backing off");
                    return Err(MediaFsError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run `op`, retrying on the standard transient failures.
    pub async fn call_remote<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.call(|| {
            let fut = op();
            async move {
                let result = fut.await;
                (should_retry(&result), result)
            }
        })
        .await
    }

    async fn decay_current(&self) {
        let mut current = self.current.lock().await;
        let decayed = *current / self.config.decay();
        *current = decayed.max(self.config.min_sleep());
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(PacerConfig::default())
    }
}
