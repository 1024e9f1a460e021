//! Response normalization: eager body read, explicit decompression, and the
//! JSON envelope written to stdout.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_ENCODING;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{RawResponse, ResponseBody};

/// The program's only output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    /// Canonical header name → values in received order.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

impl ResponseEnvelope {
    /// Read the whole body and build the envelope.
    ///
    /// `read_idle` bounds the wait for each body chunk; the response's
    /// deadline, when set, bounds the whole read.
    pub async fn from_raw(raw: RawResponse, read_idle: Option<Duration>) -> Result<Self> {
        let status = raw.status.as_u16();
        let deadline = raw.deadline;
        let status_text = raw.status_text();
        let encoding = raw
            .headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &raw.headers {
            headers
                .entry(canonical_header_key(name.as_str()))
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let read = read_body(raw.into_body(), read_idle);
        let body = match deadline {
            Some(at) => tokio::time::timeout_at(at, read)
                .await
                .map_err(|_| Error::timeout("response body not complete by the attempt deadline"))??,
            None => read.await?,
        };
        let body = decode_content(body, encoding.as_deref())?;
        tracing::debug!("Read {} body bytes for {}", body.len(), status_text);

        Ok(Self {
            status,
            status_text,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Eagerly read `raw` into an envelope. See [`ResponseEnvelope::from_raw`].
pub async fn normalize(raw: RawResponse, read_idle: Option<Duration>) -> Result<ResponseEnvelope> {
    ResponseEnvelope::from_raw(raw, read_idle).await
}

/// Collect every data frame of `body`.
pub async fn read_body(mut body: ResponseBody, read_idle: Option<Duration>) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    loop {
        let next = match read_idle {
            Some(idle) => tokio::time::timeout(idle, body.frame())
                .await
                .map_err(|_| Error::ReadIdleTimeout(idle))?,
            None => body.frame().await,
        };
        match next {
            None => break,
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    buf.extend_from_slice(&data);
                }
            }
            Some(Err(e @ Error::BodyRead(_))) => return Err(e),
            Some(Err(e)) => return Err(Error::body_read(e.to_string())),
        }
    }
    Ok(buf.freeze())
}

/// Undo `Content-Encoding` (gzip, deflate, br, zstd). Unknown or absent
/// encodings leave the bytes untouched.
pub fn decode_content(body: Bytes, encoding: Option<&str>) -> Result<Bytes> {
    if body.is_empty() {
        return Ok(body);
    }
    match encoding.map(str::trim) {
        Some("gzip") | Some("x-gzip") => decode_gzip(&body),
        Some("deflate") => decode_deflate(&body),
        Some("br") => decode_brotli(&body),
        Some("zstd") => decode_zstd(&body),
        _ => Ok(body),
    }
}

/// `content-type` → `Content-Type`, `x-amz-id-2` → `X-Amz-Id-2`.
pub fn canonical_header_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        out.push(if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() });
        upper = c == '-';
    }
    out
}

fn decode_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    flate2::read::MultiGzDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("gzip: {}", e)))?;
    Ok(Bytes::from(decoded))
}

fn decode_deflate(data: &[u8]) -> Result<Bytes> {
    // Servers send both zlib-wrapped and raw deflate under this name.
    let mut decoded = Vec::new();
    if flate2::read::ZlibDecoder::new(data).read_to_end(&mut decoded).is_ok() {
        return Ok(Bytes::from(decoded));
    }
    decoded.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("deflate: {}", e)))?;
    Ok(Bytes::from(decoded))
}

fn decode_brotli(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    brotli::Decompressor::new(data, 4096)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("brotli: {}", e)))?;
    Ok(Bytes::from(decoded))
}

fn decode_zstd(data: &[u8]) -> Result<Bytes> {
    zstd::stream::decode_all(data)
        .map(Bytes::from)
        .map_err(|e| Error::Decompression(format!("zstd: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, SET_COOKIE};
    use http::{HeaderMap, StatusCode};
    use hyper::body::Frame;
    use http_body_util::StreamBody;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn canonical_keys() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("x-amz-id-2"), "X-Amz-Id-2");
        assert_eq!(canonical_header_key("DNT"), "Dnt");
        assert_eq!(canonical_header_key("etag"), "Etag");
    }

    #[tokio::test]
    async fn envelope_from_plain_response() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        let raw = RawResponse::buffered(StatusCode::OK, headers, "ok");

        let env = ResponseEnvelope::from_raw(raw, None).await.unwrap();
        assert_eq!(env.status, 200);
        assert_eq!(env.status_text, "200 OK");
        assert_eq!(env.body, "ok");
        assert_eq!(env.headers["Content-Type"], vec!["text/plain"]);
        assert_eq!(env.headers["Set-Cookie"], vec!["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn envelope_json_shape() {
        let raw = RawResponse::buffered(StatusCode::NOT_FOUND, HeaderMap::new(), "missing");
        let json = ResponseEnvelope::from_raw(raw, None).await.unwrap().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"status":404,"statusText":"404 Not Found","headers":{},"body":"missing"}"#
        );
    }

    #[tokio::test]
    async fn gzip_body_is_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let raw = RawResponse::buffered(StatusCode::OK, headers, gzip(b"{\"used\":3}"));

        let env = ResponseEnvelope::from_raw(raw, None).await.unwrap();
        assert_eq!(env.body, "{\"used\":3}");
        assert_eq!(env.headers["Content-Encoding"], vec!["gzip"]);
    }

    #[tokio::test]
    async fn corrupt_encoding_is_fatal() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let raw = RawResponse::buffered(StatusCode::OK, headers, "definitely not gzip");
        let err = ResponseEnvelope::from_raw(raw, None).await.unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let raw = RawResponse::buffered(StatusCode::OK, HeaderMap::new(), vec![b'o', 0xff, b'k']);
        let env = ResponseEnvelope::from_raw(raw, None).await.unwrap();
        assert_eq!(env.body, "o\u{fffd}k");
    }

    #[tokio::test]
    async fn body_error_mid_stream_fails_the_read() {
        let frames: Vec<std::result::Result<Frame<Bytes>, Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(Error::body_read("connection reset")),
        ];
        let body = StreamBody::new(futures::stream::iter(frames)).boxed_unsync();
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), body);

        let err = normalize(raw, None).await.unwrap_err();
        assert!(matches!(err, Error::BodyRead(ref m) if m == "connection reset"), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_hits_idle_timeout() {
        let stalled = futures::stream::pending::<std::result::Result<Frame<Bytes>, Error>>();
        let body = StreamBody::new(stalled).boxed_unsync();

        let err = read_body(body, Some(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, Error::ReadIdleTimeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_body_is_cut_at_the_attempt_deadline() {
        let stalled = futures::stream::pending::<std::result::Result<Frame<Bytes>, Error>>();
        let body = StreamBody::new(stalled).boxed_unsync();
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), body)
            .with_deadline(tokio::time::Instant::now() + Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let err = normalize(raw, Some(Duration::from_secs(30))).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "{err:?}");
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn decoders_round_trip() {
        let text = b"hello hello hello";
        assert_eq!(&decode_content(Bytes::from(gzip(text)), Some("x-gzip")).unwrap()[..], text);

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(text).unwrap();
        let zlib = zlib.finish().unwrap();
        assert_eq!(&decode_content(Bytes::from(zlib), Some("deflate")).unwrap()[..], text);

        let zst = zstd::stream::encode_all(&text[..], 0).unwrap();
        assert_eq!(&decode_content(Bytes::from(zst), Some("zstd")).unwrap()[..], text);

        let mut br = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut br, 4096, 5, 22);
            w.write_all(text).unwrap();
        }
        assert_eq!(&decode_content(Bytes::from(br), Some("br")).unwrap()[..], text);

        assert_eq!(&decode_content(Bytes::from_static(text), Some("identity")).unwrap()[..], text);
    }
}
