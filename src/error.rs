//! Error types for phantom-fetch.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, sending, or normalizing a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed config descriptor or missing/invalid url.
    #[error("Config error: {0}")]
    Config(String),

    /// A valid intent could not be turned into a request (bad method token,
    /// header name or value that cannot go on the wire).
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// HTTP protocol error.
    #[error("HTTP protocol error: {0}")]
    HttpProtocol(String),

    /// Redirect limit exceeded.
    #[error("Redirect limit exceeded ({count} redirects)")]
    RedirectLimit { count: u32 },

    /// Invalid redirect URL.
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(String),

    /// Set-Cookie parsing error.
    #[error("Cookie parse error: {0}")]
    CookieParse(String),

    /// Content-Encoding could not be decoded.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The response body could not be read to completion.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// The response envelope could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// All send attempts failed; carries the last transport error.
    #[error("Send failed after {attempts} attempts: {last}")]
    SendExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// Generic timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Connect timeout (TCP + TLS handshake).
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// TTFB (time-to-first-byte) timeout.
    #[error("TTFB timeout after {0:?} - server did not respond with headers")]
    TtfbTimeout(Duration),

    /// Read idle timeout (no body data received within duration).
    #[error("Read idle timeout after {0:?} - stream may be hung")]
    ReadIdleTimeout(Duration),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a request build error.
    pub fn request_build(message: impl Into<String>) -> Self {
        Self::RequestBuild(message.into())
    }

    /// Create an HTTP protocol error.
    pub fn http_protocol(message: impl Into<String>) -> Self {
        Self::HttpProtocol(message.into())
    }

    /// Create a body read error.
    pub fn body_read(message: impl Into<String>) -> Self {
        Self::BodyRead(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Whether this error came out of the network exchange itself.
    ///
    /// These are the failures the retry driver absorbs; everything else is
    /// fatal as soon as it happens.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpProtocol(_)
                | Self::RedirectLimit { .. }
                | Self::InvalidRedirectUrl(_)
                | Self::Timeout(_)
                | Self::ConnectTimeout(_)
                | Self::TtfbTimeout(_)
                | Self::Connection(_)
                | Self::Tls(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_exhausted_reports_last_error() {
        let err = Error::SendExhausted {
            attempts: 3,
            last: Box::new(Error::connection("refused")),
        };
        assert_eq!(
            err.to_string(),
            "Send failed after 3 attempts: Connection error: refused"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn transport_classification() {
        assert!(Error::tls("handshake").is_transport());
        assert!(Error::TtfbTimeout(Duration::from_secs(1)).is_transport());
        assert!(!Error::config("bad").is_transport());
        assert!(!Error::body_read("reset").is_transport());
    }
}
