//! HTTP/1.1 and HTTP/2 transport via hyper over the BoringSSL connector.

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, COOKIE, HOST, LOCATION, SET_COOKIE};
use http::{HeaderMap, Method, Request, StatusCode, Uri, Version};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::time::Instant;
use bytes::Bytes;
use url::Url;

use crate::cookie::{CookieJar, CookieStore};
use crate::error::{Error, Result};
use crate::fingerprint::{BrowserProfile, Http2Settings};
use crate::request::ComposedRequest;
use crate::timeouts::{with_timeout, Timeouts};
use crate::transport::connector::{BoringConnector, MaybeHttpsStream};
use crate::transport::{RawResponse, Transport};

/// Headers HTTP/2 forbids; hyper would strip them with a warning.
const CONNECTION_SPECIFIC: &[&str] = &["connection", "keep-alive", "proxy-connection", "transfer-encoding", "upgrade"];

/// Redirect handling inside one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Return 3xx responses as they are.
    None,
    /// Follow up to this many redirects, then fail.
    Limited(u32),
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::Limited(10)
    }
}

/// Transport that looks like the browser described by a [`BrowserProfile`].
pub struct BrowserTransport {
    connector: BoringConnector,
    profile_id: String,
    http2_settings: Http2Settings,
    timeouts: Timeouts,
    redirects: RedirectPolicy,
}

/// Builder for [`BrowserTransport`].
pub struct TransportBuilder {
    profile: BrowserProfile,
    timeouts: Timeouts,
    redirects: RedirectPolicy,
}

impl BrowserTransport {
    pub fn builder(profile: &BrowserProfile) -> TransportBuilder {
        TransportBuilder::new(profile)
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    async fn follow_redirects(&self, request: &ComposedRequest) -> Result<RawResponse> {
        // Set-Cookie from intermediate hops only lives for this attempt.
        let mut jar: CookieJar = request.cookies().clone();
        let mut url = request.url().clone();
        let mut method = request.method().clone();
        let mut strip_credentials = false;
        let mut hops = 0u32;

        loop {
            let cookie = jar.cookie_header(&url);
            let response = self
                .exchange(&method, &url, request.headers(), cookie, strip_credentials)
                .await?;

            jar.store_set_cookies(
                response.headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()),
                &url,
            );

            let max = match self.redirects {
                RedirectPolicy::Limited(max) if response.is_redirect() => max,
                _ => return Ok(response),
            };
            let location = response
                .headers
                .get(LOCATION)
                .map(|v| v.to_str().map(str::to_owned));
            let location = match location {
                Some(l) => l.map_err(|_| Error::InvalidRedirectUrl("non-ASCII Location".to_string()))?,
                None => return Ok(response),
            };
            if hops >= max {
                return Err(Error::RedirectLimit { count: hops });
            }

            let next = url
                .join(&location)
                .map_err(|e| Error::InvalidRedirectUrl(format!("{}: {}", location, e)))?;
            if !matches!(next.scheme(), "http" | "https") {
                return Err(Error::InvalidRedirectUrl(next.to_string()));
            }

            if matches!(
                response.status,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            ) && method != Method::HEAD
            {
                method = Method::GET;
            }
            if !strip_credentials {
                strip_credentials = !same_or_subdomain(request.url(), &next);
            }

            hops += 1;
            tracing::debug!("Redirect {} -> {} ({})", url, next, response.status);
            url = next;
        }
    }

    async fn exchange(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        cookie: Option<String>,
        strip_credentials: bool,
    ) -> Result<RawResponse> {
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| Error::request_build(format!("Invalid URI {}: {}", url, e)))?;

        let stream = with_timeout(self.timeouts.connect, self.connector.connect(&uri), Error::ConnectTimeout).await?;
        let use_http2 = stream.is_h2();

        let mut header_map = HeaderMap::with_capacity(headers.len() + 2);
        let target = if use_http2 {
            uri.clone()
        } else {
            let host = uri
                .authority()
                .ok_or_else(|| Error::request_build(format!("No authority in {}", url)))?;
            header_map.insert(
                HOST,
                HeaderValue::from_str(host.as_str()).map_err(|e| Error::request_build(e.to_string()))?,
            );
            uri.path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
                .parse()
                .map_err(|e| Error::request_build(format!("Invalid request target: {}", e)))?
        };

        for (name, value) in headers {
            if *name == HOST || (use_http2 && is_connection_specific(name)) {
                continue;
            }
            if strip_credentials && (*name == AUTHORIZATION || *name == COOKIE) {
                continue;
            }
            header_map.append(name.clone(), value.clone());
        }
        if let Some(cookie) = cookie {
            // Jar cookies extend a caller-supplied Cookie header rather than replace it.
            let merged = match header_map.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{}; {}", existing, cookie),
                _ => cookie,
            };
            let value = HeaderValue::from_str(&merged).map_err(|e| Error::request_build(e.to_string()))?;
            header_map.insert(COOKIE, value);
        }

        let mut request = Request::builder()
            .method(method.clone())
            .uri(target)
            .version(if use_http2 { Version::HTTP_2 } else { Version::HTTP_11 })
            .body(Empty::<Bytes>::new())
            .map_err(|e| Error::request_build(format!("Failed to build request: {}", e)))?;
        *request.headers_mut() = header_map;

        tracing::debug!(
            "{} {} over {}",
            method,
            url,
            if use_http2 { "HTTP/2" } else { "HTTP/1.1" }
        );

        let response = with_timeout(
            self.timeouts.ttfb,
            async {
                if use_http2 {
                    Self::send_http2(stream, request, &self.http2_settings).await
                } else {
                    Self::send_http1(stream, request).await
                }
            },
            Error::TtfbTimeout,
        )
        .await?;

        let (parts, body) = response.into_parts();
        let reason = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());

        let body = body
            .map_err(|e| Error::body_read(e.to_string()))
            .boxed_unsync();
        let mut raw = RawResponse::new(parts.status, parts.headers, body)
            .with_version(parts.version)
            .with_url(url.clone());
        raw.reason = reason;
        Ok(raw)
    }

    async fn send_http1(
        stream: MaybeHttpsStream,
        request: Request<Empty<Bytes>>,
    ) -> Result<hyper::Response<Incoming>> {
        let io = TokioIo::new(stream);
        let (mut sender, conn) = http1::Builder::new()
            .title_case_headers(true)
            .handshake(io)
            .await
            .map_err(|e| Error::http_protocol(format!("HTTP/1.1 handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("HTTP/1.1 connection closed: {}", e);
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(|e| Error::http_protocol(format!("HTTP/1.1 request failed: {}", e)))
    }

    async fn send_http2(
        stream: MaybeHttpsStream,
        request: Request<Empty<Bytes>>,
        settings: &Http2Settings,
    ) -> Result<hyper::Response<Incoming>> {
        tracing::debug!("HTTP/2 SETTINGS {}", settings.akamai_settings());
        let io = TokioIo::new(stream);
        let (mut sender, conn) = http2::Builder::new(TokioExecutor::new())
            .header_table_size(settings.header_table_size)
            .max_concurrent_streams(settings.max_concurrent_streams)
            .initial_stream_window_size(settings.initial_window_size)
            .initial_connection_window_size(settings.initial_connection_window_size)
            .max_frame_size(settings.max_frame_size)
            .max_header_list_size(settings.max_header_list_size)
            .handshake(io)
            .await
            .map_err(|e| Error::http_protocol(format!("HTTP/2 handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("HTTP/2 connection closed: {}", e);
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(|e| Error::http_protocol(format!("HTTP/2 request failed: {}", e)))
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn profile_id(&self) -> &str {
        &self.profile_id
    }

    async fn send(&self, request: &ComposedRequest) -> Result<RawResponse> {
        let deadline = self.timeouts.total.map(|d| Instant::now() + d);
        let response = with_timeout(self.timeouts.total, self.follow_redirects(request), |d| {
            Error::timeout(format!("request did not complete within {:?}", d))
        })
        .await?;
        Ok(match deadline {
            Some(at) => response.with_deadline(at),
            None => response,
        })
    }
}

impl TransportBuilder {
    pub fn new(profile: &BrowserProfile) -> Self {
        Self {
            profile: profile.clone(),
            timeouts: Timeouts::fetch_defaults(),
            redirects: RedirectPolicy::default(),
        }
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn redirects(mut self, policy: RedirectPolicy) -> Self {
        self.redirects = policy;
        self
    }

    pub fn build(self) -> BrowserTransport {
        let tls = self.profile.tls().clone();
        let connector = if tls.is_default() {
            BoringConnector::new()
        } else {
            BoringConnector::with_fingerprint(tls)
        };
        BrowserTransport {
            connector,
            profile_id: self.profile.id().to_string(),
            http2_settings: self.profile.http2().clone(),
            timeouts: self.timeouts,
            redirects: self.redirects,
        }
    }
}

fn is_connection_specific(name: &HeaderName) -> bool {
    CONNECTION_SPECIFIC.contains(&name.as_str())
}

/// Credentials survive a redirect only to the same host or a subdomain of it.
fn same_or_subdomain(original: &Url, next: &Url) -> bool {
    match (original.host_str(), next.host_str()) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.to_ascii_lowercase(), b.to_ascii_lowercase());
            a == b || b.ends_with(&format!(".{}", a))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_credential_scope() {
        let base = Url::parse("https://example.com/a").unwrap();
        assert!(same_or_subdomain(&base, &Url::parse("https://example.com/b").unwrap()));
        assert!(same_or_subdomain(&base, &Url::parse("https://api.example.com/").unwrap()));
        assert!(!same_or_subdomain(&base, &Url::parse("https://evil.com/").unwrap()));
        assert!(!same_or_subdomain(&base, &Url::parse("https://notexample.com/").unwrap()));
    }

    #[test]
    fn connection_specific_names() {
        assert!(is_connection_specific(&HeaderName::from_static("connection")));
        assert!(!is_connection_specific(&HeaderName::from_static("upgrade-insecure-requests")));
    }

    #[test]
    fn builder_carries_profile() {
        let transport = BrowserTransport::builder(&BrowserProfile::default())
            .redirects(RedirectPolicy::None)
            .build();
        assert_eq!(transport.profile_id(), "chrome_133");
        assert!(transport.connector.fingerprint().is_some());
        assert_eq!(transport.timeouts(), &Timeouts::fetch_defaults());
    }
}
