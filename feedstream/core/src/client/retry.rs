//! Retry on Not-Ready
//!
//! Some services answer with a transient status (409, 503) while a resource
//! is still being materialized. [`RetryPolicy::run`] repeats an operation on
//! [`ClientError::NotReady`] with a fixed delay; every other error is
//! returned immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Fixed-delay retry for not-ready responses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Pause between attempts
    #[serde(with = "millis")]
    pub delay: Duration,

    /// HTTP statuses that mean "try again later"
    pub not_ready_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
            not_ready_statuses: vec![409, 503],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Whether `status` counts as not-ready
    #[must_use]
    pub fn is_not_ready(&self, status: u16) -> bool {
        self.not_ready_statuses.contains(&status)
    }

    /// Run `operation` until it succeeds, fails with something other than
    /// not-ready, or runs out of attempts
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Err(e) if e.is_not_ready() && attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Resource not ready, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
