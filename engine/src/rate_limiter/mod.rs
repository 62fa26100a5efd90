//! Outbound request throttling
//!
//! The remote model is billed against a per-minute quota shared by every
//! caller in the process. `ThrottleGate` enforces a minimum spacing between
//! the starts of two consecutive remote calls:
//!
//! - `min_interval = 60 / requests_per_minute`, or an explicit interval
//! - the check and the timestamp update happen under one lock, so two
//!   concurrent callers can never observe the same free slot
//! - the recorded timestamp never moves backwards
//!
//! Callers queue on the lock in FIFO order (tokio's mutex is fair). The lock
//! is held across the spacing sleep only; it is released before the caller
//! starts its network request.

use crate::config::{ThrottleConfig, MAX_INTERVAL_SECS};
use crate::llm::{LLMError, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Process-wide gate spacing out calls to the remote model
pub struct ThrottleGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ThrottleGate {
    /// Create a gate with an explicit minimum spacing, capped at one day
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval: min_interval.min(Duration::from_secs_f64(MAX_INTERVAL_SECS)),
            last_request: Mutex::new(None),
        }
    }

    /// Create a gate from the `[throttle]` configuration section
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(config.min_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Timestamp of the most recently granted slot, if any.
    ///
    /// Shares the lock that queued callers hold while they sleep, so this
    /// can wait until every caller already in the queue has been granted.
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }

    /// Wait until a call may start, then claim the slot.
    ///
    /// Returns the instant the slot was granted. The first call is granted
    /// immediately.
    ///
    /// # Errors
    /// `LLMError::Cancelled` if `cancel` fires while queued or waiting. A
    /// cancelled caller does not claim a slot.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Instant> {
        let mut last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LLMError::Cancelled),
            guard = self.last_request.lock() => guard,
        };

        if let Some(previous) = *last {
            let ready_at = previous
                .checked_add(self.min_interval)
                .ok_or_else(|| LLMError::Unknown("throttle interval overflows the clock".into()))?;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    "Throttle: waiting {:.2}s before next request",
                    (ready_at - now).as_secs_f64()
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                    _ = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        let granted = Instant::now();
        *last = Some(granted);
        Ok(granted)
    }
}
