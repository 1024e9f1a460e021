//! TLS fingerprint configuration (JA3/JA4).

/// Chrome 131-133 cipher suites in exact order.
pub const CHROME_CIPHER_SUITES: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
];

/// Chrome signature algorithms.
pub const CHROME_SIGNATURE_ALGORITHMS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

/// Chrome supported curves.
pub const CHROME_CURVES: &[&str] = &["X25519", "P-256", "P-384"];

/// Certificate compression algorithm offered in `compress_certificate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertCompression {
    #[default]
    None,
    Brotli,
    Zlib,
}

/// TLS fingerprint configuration.
///
/// The ClientHello does not offer ALPS (`application_settings`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFingerprint {
    /// Cipher suites in order.
    pub cipher_list: Vec<&'static str>,
    /// Signature algorithms.
    pub sigalgs: Vec<&'static str>,
    /// Supported curves/groups.
    pub curves: Vec<&'static str>,
    /// Enable GREASE values.
    pub grease: bool,
    /// Randomize extension order per handshake.
    pub permute_extensions: bool,
    pub cert_compression: CertCompression,
}

impl Default for TlsFingerprint {
    fn default() -> Self {
        Self {
            cipher_list: vec![],
            sigalgs: vec![],
            curves: vec![],
            grease: false,
            permute_extensions: false,
            cert_compression: CertCompression::None,
        }
    }
}

impl TlsFingerprint {
    /// Create a TLS fingerprint for Chrome 131-133.
    pub fn chrome() -> Self {
        Self {
            cipher_list: CHROME_CIPHER_SUITES.to_vec(),
            sigalgs: CHROME_SIGNATURE_ALGORITHMS.to_vec(),
            curves: CHROME_CURVES.to_vec(),
            grease: true,
            permute_extensions: true,
            cert_compression: CertCompression::Brotli,
        }
    }

    /// Whether this fingerprint changes anything about the library defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
