//! HTTP transport.
//!
//! The pipeline only sees the [`Transport`] trait. [`BrowserTransport`] is the
//! production implementation: BoringSSL with the profile's ClientHello shape,
//! then HTTP/1.1 or HTTP/2 via hyper depending on ALPN.

pub mod client;
pub mod connector;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tokio::time::Instant;
use url::Url;

use crate::error::{Error, Result};
use crate::request::ComposedRequest;

pub use client::{BrowserTransport, RedirectPolicy, TransportBuilder};
pub use connector::{AlpnProtocol, BoringConnector, MaybeHttpsStream};

/// Response body as handed out by a transport. Not yet read.
pub type ResponseBody = UnsyncBoxBody<Bytes, Error>;

/// Sends one composed request using a fixed browser fingerprint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identifier of the browser profile this transport impersonates.
    fn profile_id(&self) -> &str;

    /// Perform the exchange and return the response head with an unread body.
    async fn send(&self, request: &ComposedRequest) -> Result<RawResponse>;
}

/// Response head plus unread body.
pub struct RawResponse {
    pub status: StatusCode,
    /// Reason phrase from an HTTP/1.1 status line when it differs from the
    /// canonical one.
    pub reason: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    /// URL of the request that produced this response (after redirects).
    pub url: Option<Url>,
    /// End of the attempt that produced this response. The body has to be
    /// read by then.
    pub deadline: Option<Instant>,
    body: ResponseBody,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            reason: None,
            version: Version::HTTP_11,
            headers,
            url: None,
            deadline: None,
            body,
        }
    }

    /// Response with an in-memory body.
    pub fn buffered(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self::new(status, headers, buffered_body(body))
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Full status line text, e.g. `200 OK`.
    pub fn status_text(&self) -> String {
        let reason = self
            .reason
            .as_deref()
            .or_else(|| self.status.canonical_reason());
        match reason {
            Some(r) if !r.is_empty() => format!("{} {}", self.status.as_u16(), r),
            _ => self.status.as_u16().to_string(),
        }
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Box an in-memory body.
pub fn buffered_body(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_uses_reason_or_canonical() {
        let ok = RawResponse::buffered(StatusCode::OK, HeaderMap::new(), "");
        assert_eq!(ok.status_text(), "200 OK");

        let custom = RawResponse::buffered(StatusCode::OK, HeaderMap::new(), "").with_reason("Fine");
        assert_eq!(custom.status_text(), "200 Fine");

        let unknown = RawResponse::buffered(StatusCode::from_u16(599).unwrap(), HeaderMap::new(), "");
        assert_eq!(unknown.status_text(), "599");
    }
}
