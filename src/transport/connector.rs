//! TCP + BoringSSL connector carrying the profile's ClientHello shape.

use boring::ssl::{SslConnector, SslMethod, SslSessionCacheMode, SslVersion};
use http::Uri;
use std::io;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::error::Error;
use crate::fingerprint::tls::{CertCompression, TlsFingerprint};

use boring_sys::{CRYPTO_BUFFER, SSL, SSL_CTX};
use std::os::raw::c_int;

extern "C" {
    pub fn SSL_CTX_set_grease_enabled(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
    pub fn SSL_CTX_set_permute_extensions(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
}

/// Inflate a compressed Certificate message into a fresh `CRYPTO_BUFFER`.
///
/// Returns 1 on success, 0 when decoding fails or the length does not match
/// what the server announced.
unsafe fn inflate_certificate(
    mut decoder: impl Read,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
) -> c_int {
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => {
            // CRYPTO_BUFFER_new copies; `decompressed` is freed normally.
            let buffer = boring_sys::CRYPTO_BUFFER_new(
                decompressed.as_ptr(),
                decompressed.len(),
                std::ptr::null_mut(),
            );
            if buffer.is_null() {
                return 0;
            }
            *out = buffer;
            1
        }
        _ => 0,
    }
}

unsafe extern "C" fn decompress_brotli_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    inflate_certificate(
        brotli::Decompressor::new(compressed, 4096),
        out,
        uncompressed_len,
    )
}

unsafe extern "C" fn decompress_zlib_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    inflate_certificate(
        flate2::read::ZlibDecoder::new(compressed),
        out,
        uncompressed_len,
    )
}

/// BoringSSL-based TLS connector.
#[derive(Clone, Default)]
pub struct BoringConnector {
    tls_config: Option<TlsFingerprint>,
}

impl BoringConnector {
    /// Create a new connector with default TLS configuration.
    pub fn new() -> Self {
        Self { tls_config: None }
    }

    /// Create a connector with TLS fingerprint configuration.
    pub fn with_fingerprint(fp: TlsFingerprint) -> Self {
        Self {
            tls_config: Some(fp),
        }
    }

    pub fn fingerprint(&self) -> Option<&TlsFingerprint> {
        self.tls_config.as_ref()
    }

    fn configure_ssl(&self) -> Result<SslConnector, Error> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())
            .map_err(|e| Error::tls(format!("Failed to create SSL connector: {}", e)))?;

        if let Some(fp) = &self.tls_config {
            if !fp.cipher_list.is_empty() {
                builder
                    .set_cipher_list(&fp.cipher_list.join(":"))
                    .map_err(|e| Error::tls(format!("Failed to set cipher list: {}", e)))?;
            }

            if !fp.curves.is_empty() {
                builder
                    .set_curves_list(&fp.curves.join(":"))
                    .map_err(|e| Error::tls(format!("Failed to set curves: {}", e)))?;
            }

            if !fp.sigalgs.is_empty() {
                builder
                    .set_sigalgs_list(&fp.sigalgs.join(":"))
                    .map_err(|e| Error::tls(format!("Failed to set signature algorithms: {}", e)))?;
            }

            // SAFETY: `ctx` points at the context owned by `builder`, alive for
            // the duration of these calls.
            unsafe {
                let ctx = builder.as_ptr() as *mut SSL_CTX;
                SSL_CTX_set_grease_enabled(ctx, c_int::from(fp.grease));
                SSL_CTX_set_permute_extensions(ctx, c_int::from(fp.permute_extensions));

                // Decompression only: the client never sends compressed certs.
                match fp.cert_compression {
                    CertCompression::Brotli => {
                        let _ = boring_sys::SSL_CTX_add_cert_compression_alg(
                            ctx,
                            boring_sys::TLSEXT_cert_compression_brotli as u16,
                            None,
                            Some(decompress_brotli_cert),
                        );
                    }
                    CertCompression::Zlib => {
                        let _ = boring_sys::SSL_CTX_add_cert_compression_alg(
                            ctx,
                            boring_sys::TLSEXT_cert_compression_zlib as u16,
                            None,
                            Some(decompress_zlib_cert),
                        );
                    }
                    CertCompression::None => {}
                }
            }
        }

        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|e| Error::tls(format!("Failed to set min TLS version: {}", e)))?;
        builder
            .set_max_proto_version(Some(SslVersion::TLS1_3))
            .map_err(|e| Error::tls(format!("Failed to set max TLS version: {}", e)))?;

        builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);

        builder
            .set_alpn_protos(b"\x02h2\x08http/1.1")
            .map_err(|e| Error::tls(format!("Failed to set ALPN: {}", e)))?;

        Ok(builder.build())
    }
}

/// Negotiated ALPN protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpnProtocol {
    /// HTTP/2 ("h2")
    H2,
    /// HTTP/1.1 ("http/1.1")
    Http1,
    /// No ALPN negotiated or unknown protocol
    Unknown,
}

impl AlpnProtocol {
    /// Check if HTTP/2 was negotiated.
    pub fn is_h2(&self) -> bool {
        matches!(self, Self::H2)
    }
}

/// Stream that can be either HTTP (plain TCP) or HTTPS (TLS).
#[derive(Debug)]
pub enum MaybeHttpsStream {
    /// Plain TCP stream for HTTP.
    Http(TcpStream),
    /// TLS-wrapped stream for HTTPS.
    Https(SslStream<TcpStream>),
}

impl MaybeHttpsStream {
    /// Protocol selected during the TLS handshake; `Unknown` for plain TCP.
    pub fn alpn_protocol(&self) -> AlpnProtocol {
        match self {
            MaybeHttpsStream::Http(_) => AlpnProtocol::Unknown,
            MaybeHttpsStream::Https(stream) => match stream.ssl().selected_alpn_protocol() {
                Some(b"h2") => AlpnProtocol::H2,
                Some(b"http/1.1") => AlpnProtocol::Http1,
                _ => AlpnProtocol::Unknown,
            },
        }
    }

    /// Check if HTTP/2 was negotiated via ALPN.
    pub fn is_h2(&self) -> bool {
        self.alpn_protocol().is_h2()
    }
}

impl AsyncRead for MaybeHttpsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_read(cx, buf),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeHttpsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_write(cx, buf),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_flush(cx),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            MaybeHttpsStream::Http(stream) => Pin::new(stream).poll_shutdown(cx),
            MaybeHttpsStream::Https(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl BoringConnector {
    /// Connect to a URI, returning either a plain TCP or TLS stream.
    pub async fn connect(&self, uri: &Uri) -> Result<MaybeHttpsStream, Error> {
        let host = uri
            .host()
            .ok_or_else(|| Error::connection("Missing host"))?;
        let https = uri.scheme_str() == Some("https");
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });

        let addr = format!("{}:{}", host, port);
        tracing::debug!("Connecting to {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to {}: {}", addr, e)))?;
        let _ = tcp_stream.set_nodelay(true);

        if !https {
            return Ok(MaybeHttpsStream::Http(tcp_stream));
        }

        let ssl_config = self
            .configure_ssl()?
            .configure()
            .map_err(|e| Error::tls(format!("Failed to configure SSL: {}", e)))?;

        // SNI and verification want the bare host, without IPv6 brackets.
        let domain = host.trim_start_matches('[').trim_end_matches(']');
        let ssl_stream = tokio_boring::connect(ssl_config, domain, tcp_stream)
            .await
            .map_err(|e| Error::tls(format!("TLS handshake failed: {}", e)))?;

        let stream = MaybeHttpsStream::Https(ssl_stream);
        tracing::debug!("TLS established with {} (ALPN {:?})", domain, stream.alpn_protocol());
        Ok(stream)
    }
}
