//! Browser fingerprint profiles.
//!
//! A [`BrowserProfile`] bundles everything that has to agree for a request to
//! look like one browser build: the default header table (User-Agent and
//! client hints), the TLS ClientHello shape and the HTTP/2 SETTINGS.

use super::http2::Http2Settings;
use super::tls::TlsFingerprint;
use crate::error::{Error, Result};
use crate::headers;

/// Built-in browser identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintProfile {
    /// Chrome 133 on Linux.
    #[default]
    Chrome133,
    /// Chrome 131 on Linux.
    Chrome131,
}

impl FingerprintProfile {
    pub const ALL: [FingerprintProfile; 2] = [Self::Chrome133, Self::Chrome131];

    /// Canonical identifier (`chrome_133`).
    pub fn id(&self) -> &'static str {
        match self {
            Self::Chrome133 => "chrome_133",
            Self::Chrome131 => "chrome_131",
        }
    }

    /// Look a profile up by id. Case and `-`/`_` spelling are ignored, so
    /// `Chrome-133` and `chrome_133` name the same profile.
    pub fn from_id(id: &str) -> Result<Self> {
        let wanted = id.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|p| p.id()).collect();
                Error::config(format!("unknown browser profile {:?} (known: {})", id, known.join(", ")))
            })
    }

    /// Get the User-Agent string for this profile.
    pub fn user_agent(&self) -> &'static str {
        match self {
            Self::Chrome133 => headers::CHROME_133_USER_AGENT,
            Self::Chrome131 => headers::CHROME_131_USER_AGENT,
        }
    }

    /// Get the TLS fingerprint for this profile.
    pub fn tls_fingerprint(&self) -> TlsFingerprint {
        match self {
            Self::Chrome133 | Self::Chrome131 => TlsFingerprint::chrome(),
        }
    }

    pub fn http2_settings(&self) -> Http2Settings {
        match self {
            Self::Chrome133 | Self::Chrome131 => Http2Settings::chrome(),
        }
    }

    pub fn default_headers(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::Chrome133 => headers::chrome_133_headers(),
            Self::Chrome131 => headers::chrome_131_headers(),
        }
    }

    /// Materialize the full profile.
    pub fn browser_profile(&self) -> BrowserProfile {
        BrowserProfile {
            id: self.id().to_string(),
            headers: self
                .default_headers()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tls: self.tls_fingerprint(),
            http2: self.http2_settings(),
        }
    }
}

/// Header defaults and transport fingerprint for one browser identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    id: String,
    headers: Vec<(String, String)>,
    tls: TlsFingerprint,
    http2: Http2Settings,
}

impl BrowserProfile {
    /// Build a custom profile.
    pub fn new(
        id: impl Into<String>,
        headers: Vec<(String, String)>,
        tls: TlsFingerprint,
        http2: Http2Settings,
    ) -> Self {
        Self {
            id: id.into(),
            headers,
            tls,
            http2,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Default header table in send order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn tls(&self) -> &TlsFingerprint {
        &self.tls
    }

    pub fn http2(&self) -> &Http2Settings {
        &self.http2
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .map(|(_, v)| v.as_str())
    }
}

impl Default for BrowserProfile {
    fn default() -> Self {
        FingerprintProfile::default().browser_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_common_spellings() {
        assert_eq!(FingerprintProfile::from_id("chrome_133").unwrap(), FingerprintProfile::Chrome133);
        assert_eq!(FingerprintProfile::from_id("Chrome-133").unwrap(), FingerprintProfile::Chrome133);
        assert_eq!(FingerprintProfile::from_id(" CHROME_131 ").unwrap(), FingerprintProfile::Chrome131);
        assert!(matches!(FingerprintProfile::from_id("safari_18"), Err(Error::Config(_))));
    }

    #[test]
    fn header_identity_matches_profile() {
        for fp in FingerprintProfile::ALL {
            let profile = fp.browser_profile();
            assert_eq!(profile.id(), fp.id());
            assert_eq!(profile.user_agent(), Some(fp.user_agent()));

            let version = fp.id().trim_start_matches("chrome_");
            let ch_ua = profile
                .headers()
                .iter()
                .find(|(k, _)| k == "sec-ch-ua")
                .map(|(_, v)| v.as_str())
                .unwrap();
            assert!(ch_ua.contains(&format!("\"Google Chrome\";v=\"{}\"", version)), "{ch_ua}");
            assert!(fp.user_agent().contains(&format!("Chrome/{}.", version)));
        }
    }

    #[test]
    fn default_is_chrome_133() {
        assert_eq!(BrowserProfile::default().id(), "chrome_133");
        assert!(!BrowserProfile::default().tls().is_default());
    }
}
