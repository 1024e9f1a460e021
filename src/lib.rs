//! # phantom-fetch
//!
//! Single-shot HTTP fetcher that looks like a desktop browser on the wire.
//!
//! A JSON descriptor (`{url, method?, headers?, cookie?}`) is turned into a
//! request carrying the browser profile's default headers and cookies, sent
//! with BoringSSL TLS and HTTP/2 fingerprint control and bounded retries, and
//! the response is reduced to a JSON envelope
//! (`{status, statusText, headers, body}`).

pub mod config;
pub mod cookie;
pub mod error;
pub mod headers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod retry;
pub mod timeouts;

// Fingerprinting
pub mod fingerprint;

// Transport layer
pub mod transport;

// Re-exports
pub use config::RequestIntent;
pub use cookie::{CookieEntry, CookieJar, CookieStore};
pub use error::{Error, Result};
pub use fingerprint::{BrowserProfile, FingerprintProfile};
pub use pipeline::Fetcher;
pub use request::ComposedRequest;
pub use response::ResponseEnvelope;
pub use retry::{RetryPolicy, RetryState, Sleep, TokioSleep};
pub use timeouts::Timeouts;
pub use transport::{BrowserTransport, RawResponse, RedirectPolicy, Transport};
