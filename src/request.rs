//! Turning a [`RequestIntent`] into a request ready for the wire.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use crate::config::RequestIntent;
use crate::cookie::{self, CookieJar, CookieStore};
use crate::error::{Error, Result};
use crate::fingerprint::BrowserProfile;
use crate::headers::{self, HeaderTable};

/// Fully materialized request: method, browser headers with caller overrides
/// applied, and a cookie jar seeded for the request origin.
///
/// Owned by one pipeline run. Transports read it; nothing mutates it after
/// [`ComposedRequest::compose`].
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    url: Url,
    method: Method,
    headers: HeaderMap,
    cookies: CookieJar,
}

impl ComposedRequest {
    pub fn compose(intent: &RequestIntent, profile: &BrowserProfile) -> Result<Self> {
        let method = Method::from_bytes(intent.method.as_bytes())
            .map_err(|_| Error::request_build(format!("invalid method {:?}", intent.method)))?;

        let table = headers::compose_with_overrides(profile.headers(), &intent.header_overrides);
        let headers = to_header_map(&table)?;

        let mut cookies = CookieJar::new();
        if let Some(raw) = intent.raw_cookie_header.as_deref() {
            tracing::info!("Adding cookies: {}", raw);
            cookie::inject(raw, &intent.url, &mut cookies);
        }
        if let Some(rendered) = cookies.cookie_header(&intent.url) {
            HeaderValue::from_str(&rendered)
                .map_err(|e| Error::request_build(format!("invalid cookie header {:?}: {}", rendered, e)))?;
        }

        Ok(Self {
            url: intent.url.clone(),
            method,
            headers,
            cookies,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Composed headers in send order, without `Cookie`.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// `Cookie` header value for the initial request URL.
    pub fn cookie_header(&self) -> Option<String> {
        self.cookies.cookie_header(&self.url)
    }
}

fn to_header_map(table: &HeaderTable) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(table.len());
    for (name, value) in table.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::request_build(format!("invalid header name {:?}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::request_build(format!("invalid value for header {}: {}", name, e)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintProfile;

    fn intent(raw: &str) -> RequestIntent {
        RequestIntent::decode(raw).unwrap()
    }

    #[test]
    fn defaults_and_overrides() {
        let req = ComposedRequest::compose(
            &intent(r#"{"url":"https://example.com/x","headers":{"accept":"text/html","X-Extra":"1"}}"#),
            &BrowserProfile::default(),
        )
        .unwrap();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.headers().len(), 14);
        assert_eq!(req.headers()["accept"], "text/html");
        assert_eq!(req.headers()["x-extra"], "1");
        assert_eq!(
            req.headers()["user-agent"],
            FingerprintProfile::Chrome133.user_agent()
        );
        // Send order follows the profile table.
        let first = req.headers().keys().next().unwrap();
        assert_eq!(first.as_str(), "accept");
    }

    #[test]
    fn cookies_are_installed_for_origin() {
        let req = ComposedRequest::compose(
            &intent(r#"{"url":"https://example.com/x","cookie":"a=1;bad;c=3"}"#),
            &BrowserProfile::default(),
        )
        .unwrap();
        assert_eq!(req.cookies().len(), 2);
        assert_eq!(req.cookie_header().as_deref(), Some("a=1; c=3"));
        assert!(req.headers().get("cookie").is_none());
    }

    #[test]
    fn custom_profile_is_respected() {
        let profile = BrowserProfile::new(
            "test",
            vec![("User-Agent".into(), "probe/1".into())],
            Default::default(),
            Default::default(),
        );
        let req = ComposedRequest::compose(&intent(r#"{"url":"http://localhost/"}"#), &profile).unwrap();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.headers()["user-agent"], "probe/1");
    }

    #[test]
    fn bad_method_is_request_build_error() {
        let err = ComposedRequest::compose(
            &intent(r#"{"url":"https://example.com","method":"GE T"}"#),
            &BrowserProfile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::RequestBuild(_)));
    }

    #[test]
    fn unsendable_cookie_is_request_build_error() {
        let err = ComposedRequest::compose(
            &intent(r#"{"url":"https://example.com","cookie":"a=x\u0001y; b=2"}"#),
            &BrowserProfile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::RequestBuild(ref m) if m.contains("cookie")), "{err:?}");
    }

    #[test]
    fn unsendable_header_is_request_build_error() {
        for raw in [
            r#"{"url":"https://example.com","headers":{"Bad Name":"x"}}"#,
            r#"{"url":"https://example.com","headers":{"X-Ok":"line\nbreak"}}"#,
        ] {
            let err = ComposedRequest::compose(&intent(raw), &BrowserProfile::default()).unwrap_err();
            assert!(matches!(err, Error::RequestBuild(_)), "{raw}");
        }
    }
}
