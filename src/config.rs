//! Request descriptor decoding.
//!
//! The process is driven by one JSON object:
//!
//! ```json
//! {"url": "https://example.com", "method": "GET",
//!  "headers": {"Accept": "application/json"}, "cookie": "a=1; b=2"}
//! ```
//!
//! Only `url` is required. Unknown fields are ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Method used when the descriptor omits one or leaves it empty.
pub const DEFAULT_METHOD: &str = "GET";

/// Wire shape of the descriptor.
#[derive(Debug, Default, Deserialize, Serialize)]
struct Descriptor {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headers: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookie: Option<String>,
}

/// What the caller asked for, before any browser defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIntent {
    pub url: Url,
    pub method: String,
    /// Caller header overrides in document order. Keys are unique
    /// case-insensitively; a later duplicate replaced the earlier one.
    pub header_overrides: IndexMap<String, String>,
    pub raw_cookie_header: Option<String>,
}

impl RequestIntent {
    /// Intent for a plain GET with no overrides.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: DEFAULT_METHOD.to_string(),
            header_overrides: IndexMap::new(),
            raw_cookie_header: None,
        }
    }

    /// Decode a JSON descriptor.
    pub fn decode(raw: &str) -> Result<Self> {
        let descriptor: Descriptor = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("invalid config JSON: {}", e)))?;

        let url_str = match descriptor.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u,
            _ => return Err(Error::config("missing required field `url`")),
        };
        let url = parse_target_url(url_str)?;

        let method = match descriptor.method.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => DEFAULT_METHOD.to_string(),
        };

        let mut header_overrides = IndexMap::new();
        for (name, value) in descriptor.headers.unwrap_or_default() {
            set_case_insensitive(&mut header_overrides, name, value);
        }

        let raw_cookie_header = descriptor.cookie.filter(|c| !c.trim().is_empty());

        Ok(Self {
            url,
            method,
            header_overrides,
            raw_cookie_header,
        })
    }

    /// Encode back into the descriptor format accepted by [`RequestIntent::decode`].
    pub fn to_config_json(&self) -> Result<String> {
        let descriptor = Descriptor {
            url: Some(self.url.to_string()),
            method: Some(self.method.clone()),
            headers: (!self.header_overrides.is_empty()).then(|| self.header_overrides.clone()),
            cookie: self.raw_cookie_header.clone(),
        };
        serde_json::to_string(&descriptor).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Parse and check the request target. Only absolute http(s) URLs with a host
/// are accepted.
fn parse_target_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::config(format!("invalid url {:?}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(Error::config(format!("unsupported url scheme {:?}", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::config(format!("url {:?} has no host", raw)));
    }
    Ok(url)
}

fn set_case_insensitive(map: &mut IndexMap<String, String>, name: String, value: String) {
    if let Some(idx) = map.keys().position(|k| k.eq_ignore_ascii_case(&name)) {
        map.shift_remove_index(idx);
    }
    map.insert(name, value);
}
