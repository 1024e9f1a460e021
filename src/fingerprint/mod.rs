//! TLS and HTTP/2 fingerprinting configuration.

pub mod http2;
pub mod profiles;
pub mod tls;

pub use http2::Http2Settings;
pub use profiles::{BrowserProfile, FingerprintProfile};
pub use tls::{CertCompression, TlsFingerprint};
