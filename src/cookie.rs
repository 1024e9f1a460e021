//! Cookie handling.
//!
//! Two sources feed the jar: the caller's `"k=v; k2=v2"` string, installed once
//! before the first send, and `Set-Cookie` headers seen while following
//! redirects inside a single attempt.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use url::Url;

use crate::error::{Error, Result};

/// One `name=value` pair from a request `Cookie` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

impl CookieEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Split a `Cookie` request header value into entries.
///
/// Segments are split on the first `=` and trimmed. A segment without `=`, or
/// with an empty name or value, is skipped; the rest of the header still
/// counts.
pub fn parse_cookie_header(raw: &str) -> Vec<CookieEntry> {
    raw.split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                tracing::debug!("Skipping malformed cookie segment {:?}", segment.trim());
                return None;
            }
            Some(CookieEntry::new(name, value))
        })
        .collect()
}

/// Cookie storage scoped by origin.
pub trait CookieStore {
    /// Install entries for `origin` (scheme + host of the request URL).
    fn set_cookies(&mut self, origin: &Url, entries: &[CookieEntry]);

    /// `Cookie` header value for an outgoing request, if any cookie applies.
    fn cookie_header(&self, url: &Url) -> Option<String>;
}

/// Parse `cookie_header` and install every valid entry under `origin`.
///
/// Best effort: an empty or fully malformed header installs nothing.
pub fn inject(cookie_header: &str, origin: &Url, store: &mut impl CookieStore) -> usize {
    let entries = parse_cookie_header(cookie_header);
    for entry in &entries {
        tracing::info!("Adding cookie: [{}={}]", entry.name, entry.value);
    }
    if !entries.is_empty() {
        store.set_cookies(origin, &entries);
    }
    entries.len()
}

/// Stored cookie with the attributes needed for request matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Only sent to exactly `domain`, not its subdomains.
    pub host_only: bool,
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            host_only: true,
            expires: None,
        }
    }

    pub fn from_set_cookie_header(header: &str, request_url: &Url) -> Result<Self> {
        let request_domain = request_url
            .host_str()
            .ok_or_else(|| Error::CookieParse("No host in URL".to_string()))?;

        let mut parts = header.split(';').map(str::trim);
        let first = parts.next().unwrap_or_default();

        let (name, value) = match first.split_once('=') {
            Some((n, v)) => (n.trim().to_string(), v.trim().to_string()),
            None => return Err(Error::CookieParse("No = in cookie".to_string())),
        };

        if name.is_empty() {
            return Err(Error::CookieParse("Empty cookie name".to_string()));
        }

        let mut cookie = Cookie::new(name, value, request_domain);
        cookie.path = default_path(request_url);
        let mut max_age = None;

        for attr in parts {
            let attr_lower = attr.to_lowercase();
            if attr_lower == "secure" {
                cookie.secure = true;
            } else if attr_lower == "httponly" {
                cookie.http_only = true;
            } else if let Some((key, val)) = attr.split_once('=') {
                let val = val.trim();
                match key.trim().to_lowercase().as_str() {
                    "domain" if !val.is_empty() => {
                        let domain = normalize_domain(val);
                        if !domain_matches(&request_domain.to_lowercase(), &domain) {
                            return Err(Error::CookieParse(format!(
                                "Domain {} does not cover {}",
                                domain, request_domain
                            )));
                        }
                        cookie.domain = domain;
                        cookie.host_only = false;
                    }
                    "path" if val.starts_with('/') => cookie.path = val.to_string(),
                    "expires" => cookie.expires = parse_cookie_date(val),
                    "max-age" => max_age = val.parse::<i64>().ok(),
                    _ => {}
                }
            }
        }

        // Max-Age takes precedence over Expires.
        if let Some(secs) = max_age {
            cookie.expires = Some(if secs <= 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                Utc::now() + ChronoDuration::seconds(secs)
            });
        }
        Ok(cookie)
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|e| e <= Utc::now())
    }

    pub fn matches_url(&self, url: &Url) -> bool {
        let request_domain = match url.host_str() {
            Some(h) => h.to_lowercase(),
            None => return false,
        };

        if self.secure && url.scheme() != "https" {
            return false;
        }
        if self.is_expired() {
            return false;
        }

        if self.host_only {
            if request_domain != self.domain {
                return false;
            }
        } else if !domain_matches(&request_domain, &self.domain) {
            return false;
        }

        let request_path = url.path();
        request_path == self.path
            || request_path.starts_with(&format!("{}/", self.path.trim_end_matches('/')))
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Cookie jar keyed by domain, then (path, name).
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: HashMap<String, HashMap<(String, String), Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie; an expired cookie removes any stored one of that name.
    pub fn store(&mut self, cookie: Cookie) {
        let key = (cookie.path.clone(), cookie.name.clone());
        if cookie.is_expired() {
            if let Some(by_key) = self.cookies.get_mut(&cookie.domain) {
                by_key.remove(&key);
            }
            return;
        }
        self.cookies.entry(cookie.domain.clone()).or_default().insert(key, cookie);
    }

    pub fn cookies(&self) -> Vec<&Cookie> {
        self.cookies.values().flat_map(|m| m.values()).collect()
    }

    pub fn cookies_for_url(&self, url: &Url) -> Vec<&Cookie> {
        let mut matching: Vec<&Cookie> = self
            .cookies
            .values()
            .flat_map(|m| m.values())
            .filter(|c| c.matches_url(url))
            .collect();
        // Longer paths first, then name, for a stable header.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.name.cmp(&b.name)));
        matching
    }

    pub fn build_cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Store every parseable `Set-Cookie` value of a response.
    pub fn store_set_cookies<'a>(&mut self, values: impl IntoIterator<Item = &'a str>, request_url: &Url) {
        for value in values {
            match Cookie::from_set_cookie_header(value, request_url) {
                Ok(cookie) => self.store(cookie),
                Err(e) => tracing::debug!("Ignoring Set-Cookie {:?}: {}", value, e),
            }
        }
    }

    /// Cookie `name` stored for `domain` with the longest path.
    pub fn get(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.cookies
            .get(&normalize_domain(domain))?
            .values()
            .filter(|c| c.name == name)
            .max_by_key(|c| c.path.len())
    }

    /// Remove every cookie `name` stored for `domain`, returning how many went.
    pub fn remove(&mut self, domain: &str, name: &str) -> usize {
        let Some(by_key) = self.cookies.get_mut(&normalize_domain(domain)) else {
            return 0;
        };
        let before = by_key.len();
        by_key.retain(|(_, n), _| n != name);
        before - by_key.len()
    }

    pub fn len(&self) -> usize {
        self.cookies.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&mut self, origin: &Url, entries: &[CookieEntry]) {
        let Some(host) = origin.host_str() else {
            return;
        };
        for entry in entries {
            self.store(Cookie::new(&entry.name, &entry.value, host));
        }
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.build_cookie_header(url)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.strip_prefix('.').unwrap_or(domain).to_lowercase()
}

fn domain_matches(request_domain: &str, cookie_domain: &str) -> bool {
    request_domain == cookie_domain || request_domain.ends_with(&format!(".{}", cookie_domain))
}

/// RFC 6265 default-path: directory of the request path.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn parse_cookie_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Two-digit years before four-digit ones: `%Y` would read `94` as year 94.
    for fmt in [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}
