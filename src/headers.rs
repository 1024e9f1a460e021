//! Browser header presets and override composition.
//!
//! Presets mirror what Chrome sends for a same-origin `fetch()` on Linux. They
//! must stay in step with the TLS profile of the same version, which is why
//! they are reached through [`crate::fingerprint::FingerprintProfile`].

use indexmap::IndexMap;

pub const CHROME_133_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

pub const CHROME_131_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Chrome 133 headers for API-style requests.
pub fn chrome_133_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Accept", "*/*"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br, zstd"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "empty"),
        ("Sec-Fetch-Mode", "cors"),
        ("Sec-Fetch-Site", "same-origin"),
        ("User-Agent", CHROME_133_USER_AGENT),
        ("sec-ch-ua", r#""Not(A:Brand";v="99", "Google Chrome";v="133", "Chromium";v="133""#),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", r#""Linux""#),
    ]
}

/// Chrome 131 headers for API-style requests.
pub fn chrome_131_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Accept", "*/*"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br, zstd"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "empty"),
        ("Sec-Fetch-Mode", "cors"),
        ("Sec-Fetch-Site", "same-origin"),
        ("User-Agent", CHROME_131_USER_AGENT),
        ("sec-ch-ua", r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", r#""Linux""#),
    ]
}

/// Ordered header list with case-insensitive, single-valued keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(String, String)>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value of `name` in place, or append it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = HeaderTable::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

/// Overlay caller overrides on a default table.
///
/// Overrides replace the default value for the same key (case-insensitive)
/// and keep its position; new keys are appended in override order. Values are
/// passed through untouched.
pub fn compose<'a, 'b, D, O>(defaults: D, overrides: O) -> HeaderTable
where
    D: IntoIterator<Item = (&'a str, &'a str)>,
    O: IntoIterator<Item = (&'b str, &'b str)>,
{
    let mut table: HeaderTable = defaults.into_iter().collect();
    for (name, value) in overrides {
        table.set(name, value);
    }
    table
}

/// Compose a profile table with the override map of a request intent.
pub fn compose_with_overrides(defaults: &[(String, String)], overrides: &IndexMap<String, String>) -> HeaderTable {
    compose(
        defaults.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_133_table_shape() {
        let headers = chrome_133_headers();
        assert_eq!(headers.len(), 13);
        let names: Vec<_> = headers.iter().map(|(k, _)| k.to_ascii_lowercase()).collect();
        for expected in [
            "accept",
            "accept-language",
            "accept-encoding",
            "dnt",
            "connection",
            "upgrade-insecure-requests",
            "sec-fetch-dest",
            "sec-fetch-mode",
            "sec-fetch-site",
            "user-agent",
            "sec-ch-ua",
            "sec-ch-ua-mobile",
            "sec-ch-ua-platform",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn override_wins_regardless_of_case() {
        let table = compose(chrome_133_headers(), [("accept", "application/json"), ("USER-AGENT", "custom/1.0")]);
        assert_eq!(table.len(), 13);
        assert_eq!(table.get("Accept"), Some("application/json"));
        assert_eq!(table.get("user-agent"), Some("custom/1.0"));
        // Position and spelling of the default key are kept.
        assert_eq!(table.iter().next(), Some(("Accept", "application/json")));
    }

    #[test]
    fn new_keys_are_appended_in_order() {
        let table = compose(chrome_133_headers(), [("X-One", "1"), ("X-Two", "2")]);
        let tail: Vec<_> = table.iter().skip(13).collect();
        assert_eq!(tail, vec![("X-One", "1"), ("X-Two", "2")]);
    }

    #[test]
    fn compose_is_idempotent() {
        let overrides = [("accept-language", "de-DE"), ("X-Api-Key", "k"), ("DNT", "0")];
        let once = compose(chrome_133_headers(), overrides);
        let twice = compose(once.iter().collect::<Vec<_>>(), overrides);
        assert_eq!(once, twice);
    }

    #[test]
    fn values_pass_through_unvalidated() {
        let table = compose(Vec::new(), [("X-Odd", "  spaced\tvalue ")]);
        assert_eq!(table.get("x-odd"), Some("  spaced\tvalue "));
    }

    #[test]
    fn compose_with_intent_overrides() {
        let defaults: Vec<(String, String)> = chrome_131_headers()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut overrides = IndexMap::new();
        overrides.insert("sec-fetch-site".to_string(), "cross-site".to_string());
        let table = compose_with_overrides(&defaults, &overrides);
        assert_eq!(table.get("Sec-Fetch-Site"), Some("cross-site"));
        assert_eq!(table.get("User-Agent"), Some(CHROME_131_USER_AGENT));
    }
}
