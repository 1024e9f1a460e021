//! Bounded retries around a [`Transport`].
//!
//! The driver is a small state machine:
//!
//! ```text
//! Attempting(1) --fail--> Attempting(2) --fail--> ... --fail--> Exhausted
//!       |                       |
//!       +------ok------> Succeeded <------ok------+
//! ```
//!
//! Backoff is linear in the number of failed attempts (1, 2, ... units) with no
//! jitter. Every transport error counts as retryable; any other error (see
//! [`Error::is_transport`]) ends the run on the attempt that produced it.
//! Sleeping goes through [`Sleep`] so tests can run without real delays.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::request::ComposedRequest;
use crate::transport::{RawResponse, Transport};

/// Attempt ceiling and backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause before `attempt` (1-based): nothing before the first, then one
    /// unit per attempt already failed.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt.saturating_sub(1)
    }
}

/// Where the driver stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to run (or running) the n-th attempt, 1-based.
    Attempting(u32),
    Succeeded,
    Exhausted,
}

impl RetryState {
    pub fn start() -> Self {
        Self::Attempting(1)
    }

    /// Transition on the outcome of the current attempt. Terminal states stay put.
    pub fn next(self, succeeded: bool, policy: &RetryPolicy) -> Self {
        match self {
            Self::Attempting(_) if succeeded => Self::Succeeded,
            Self::Attempting(n) if n < policy.max_attempts => Self::Attempting(n + 1),
            Self::Attempting(_) => Self::Exhausted,
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Attempting(_))
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Send `request` until it succeeds or the policy runs out of attempts.
///
/// On exhaustion the last error is returned inside [`Error::SendExhausted`];
/// earlier errors are only logged. A non-transport error is returned as is,
/// without further attempts.
pub async fn send_with_retry<T, S>(
    request: &ComposedRequest,
    transport: &T,
    policy: &RetryPolicy,
    sleeper: &S,
) -> Result<RawResponse>
where
    T: Transport + ?Sized,
    S: Sleep + ?Sized,
{
    let mut state = RetryState::start();
    let mut last_error = None;

    while let RetryState::Attempting(attempt) = state {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            sleeper.sleep(delay).await;
        }

        let outcome = transport.send(request).await;
        state = state.next(outcome.is_ok(), policy);

        match outcome {
            Ok(response) => {
                tracing::debug!("Attempt {} succeeded with {}", attempt, response.status);
                return Ok(response);
            }
            Err(e) if !e.is_transport() => {
                tracing::warn!("Attempt {} failed: {}, not retrying", attempt, e);
                return Err(e);
            }
            Err(e) if state == RetryState::Exhausted => {
                tracing::warn!("Attempt {} failed: {}", attempt, e);
                last_error = Some(e);
            }
            Err(e) => {
                tracing::warn!("Attempt {} failed: {}, retrying...", attempt, e);
                last_error = Some(e);
            }
        }
    }

    Err(Error::SendExhausted {
        attempts: policy.max_attempts(),
        last: Box::new(last_error.unwrap_or_else(|| Error::connection("no attempt completed"))),
    })
}
