//! Timeout configuration for a single send attempt.
//!
//! # Timeout Types
//!
//! - **connect**: TCP + TLS handshake
//! - **ttfb**: request sent → response headers received
//! - **read_idle**: maximum gap between body chunks (resets on each chunk)
//! - **total**: deadline for one attempt, connect through response headers,
//!   redirects included
//!
//! The retry driver applies these per attempt; there is no budget across
//! attempts.

use std::time::Duration;

/// Timeout configuration for HTTP requests.
///
/// All timeouts are optional. When `None`, no timeout is applied for that phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Timeout for establishing connection (DNS + TCP + TLS handshake).
    pub connect: Option<Duration>,

    /// Time-to-first-byte timeout: time from request sent until response
    /// headers received.
    pub ttfb: Option<Duration>,

    /// Read idle timeout while collecting the response body.
    ///
    /// **This timeout resets on each successful read.**
    pub read_idle: Option<Duration>,

    /// Deadline for one attempt.
    ///
    /// **This timeout does NOT reset.**
    pub total: Option<Duration>,
}

impl Timeouts {
    /// Create a new Timeouts with all timeouts set to None.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for a one-shot fetch.
    ///
    /// - connect: 10s
    /// - ttfb: 30s
    /// - read_idle: 30s
    /// - total: 30s
    pub fn fetch_defaults() -> Self {
        Self {
            connect: Some(Duration::from_secs(10)),
            ttfb: Some(Duration::from_secs(30)),
            read_idle: Some(Duration::from_secs(30)),
            total: Some(Duration::from_secs(30)),
        }
    }

    /// Set connect timeout.
    pub fn connect(mut self, timeout: Duration) -> Self {
        self.connect = Some(timeout);
        self
    }

    /// Set TTFB (time-to-first-byte) timeout.
    pub fn ttfb(mut self, timeout: Duration) -> Self {
        self.ttfb = Some(timeout);
        self
    }

    /// Set read idle timeout.
    pub fn read_idle(mut self, timeout: Duration) -> Self {
        self.read_idle = Some(timeout);
        self
    }

    /// Set the per-attempt deadline. Phase timeouts longer than it are
    /// clamped down to it.
    pub fn total(mut self, timeout: Duration) -> Self {
        self.total = Some(timeout);
        self.connect = self.connect.map(|c| c.min(timeout));
        self.ttfb = self.ttfb.map(|t| t.min(timeout));
        self
    }
}

/// Run `fut` under an optional timeout, mapping expiry with `on_timeout`.
pub(crate) async fn with_timeout<F, T>(
    limit: Option<Duration>,
    fut: F,
    on_timeout: impl FnOnce(Duration) -> crate::Error,
) -> crate::Result<T>
where
    F: std::future::Future<Output = crate::Result<T>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| on_timeout(d))?,
        None => fut.await,
    }
}
