//! TLS configuration for the transport session
//!
//! Covers the four ways a transport can authenticate its peer:
//! - default verification against the built-in root store
//! - verification against a caller-supplied CA bundle (plus optional
//!   client certificate for mutual TLS)
//! - pinning the SHA-256 fingerprint of the server's leaf certificate
//! - a fully pre-built `rustls::ClientConfig`, which takes precedence
//!   over every other field here

use std::path::PathBuf;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Error, Result};

/// TLS protocol versions the transport can be pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.2 (minimum supported)
    Tls1_2,
    /// TLS 1.3
    Tls1_3,
}

impl TlsVersion {
    fn to_reqwest_version(self) -> reqwest::tls::Version {
        match self {
            TlsVersion::Tls1_2 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls1_3 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

/// TLS configuration, immutable once the transport is constructed
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Disable chain and hostname verification. Off by default;
    /// verification stays on unless explicitly turned off.
    pub no_verify: bool,
    /// Suppress the warning emitted when verification is disabled
    pub silence_warnings: bool,
    /// Extra CA bundle (PEM) added to the root store
    pub ca_certs: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS
    pub client_key: Option<PathBuf>,
    /// Minimum TLS protocol version
    pub min_version: Option<TlsVersion>,
    /// Hex SHA-256 digest of the server's leaf certificate (DER).
    /// When set, fingerprint pinning replaces chain verification.
    pub assert_fingerprint: Option<String>,
    /// Pre-built TLS context. When set, every other field in this struct
    /// is ignored (a warning is the only signal).
    pub preconfigured: Option<rustls::ClientConfig>,
}

impl TlsConfig {
    /// Verify against the built-in root store (the default)
    pub fn secure() -> Self {
        Self::default()
    }

    /// Add a CA bundle file to the root store
    pub fn with_ca_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certs = Some(path.into());
        self
    }

    /// Configure a client certificate and key for mutual TLS
    pub fn with_client_cert(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Pin the server's leaf certificate to a hex SHA-256 digest
    pub fn with_assert_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.assert_fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the minimum TLS protocol version
    pub fn with_min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Supply a pre-built `rustls::ClientConfig`, overriding all other
    /// TLS fields
    pub fn with_preconfigured(mut self, config: rustls::ClientConfig) -> Self {
        self.preconfigured = Some(config);
        self
    }

    /// Disable certificate verification. Dangerous; emits a warning per
    /// session build unless `silence_warnings` is set.
    pub fn danger_no_verify(mut self) -> Self {
        self.no_verify = true;
        self
    }

    /// Whether any field other than `preconfigured` was changed from its
    /// default. Used for the precedence warning.
    fn has_overrides(&self) -> bool {
        self.no_verify
            || self.silence_warnings
            || self.ca_certs.is_some()
            || self.client_cert.is_some()
            || self.client_key.is_some()
            || self.min_version.is_some()
            || self.assert_fingerprint.is_some()
    }

    /// Validate the configuration before any network I/O.
    ///
    /// Referenced files must exist, a client cert requires a key (and vice
    /// versa), and a fingerprint must be valid hex of SHA-256 length. A
    /// pre-built context skips validation entirely since its fields win.
    pub fn validate(&self) -> Result<()> {
        if self.preconfigured.is_some() {
            return Ok(());
        }

        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => {
                return Err(Error::Configuration {
                    message: "client_cert supplied without client_key".to_string(),
                    source: None,
                });
            }
            (None, Some(_)) => {
                return Err(Error::Configuration {
                    message: "client_key supplied without client_cert".to_string(),
                    source: None,
                });
            }
            _ => {}
        }

        for (name, path) in [
            ("ca_certs", &self.ca_certs),
            ("client_cert", &self.client_cert),
            ("client_key", &self.client_key),
        ] {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(Error::Configuration {
                        message: format!("{} file not found: {}", name, path.display()),
                        source: None,
                    });
                }
            }
        }

        if let Some(fingerprint) = &self.assert_fingerprint {
            decode_fingerprint(fingerprint)?;
        }

        Ok(())
    }

    /// Apply this configuration to a `reqwest::ClientBuilder`.
    ///
    /// Precedence: pre-built context > fingerprint pin > assembled
    /// options. Called once, when the session is lazily constructed.
    pub(crate) fn apply(&self, mut builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        if let Some(config) = &self.preconfigured {
            if self.has_overrides() {
                warn!("preconfigured TLS context supplied; other TLS options are ignored");
            }
            return Ok(builder.use_preconfigured_tls(config.clone()));
        }

        if let Some(fingerprint) = &self.assert_fingerprint {
            let expected = decode_fingerprint(fingerprint)?;
            return Ok(builder.use_preconfigured_tls(pinned_client_config(expected)?));
        }

        if self.no_verify {
            if !self.silence_warnings {
                warn!("certificate verification is disabled; connections are not authenticated");
            }
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &self.ca_certs {
            let pem = std::fs::read(path).map_err(|e| Error::Configuration {
                message: format!("failed to read CA bundle {}: {}", path.display(), e),
                source: Some(anyhow::Error::new(e)),
            })?;
            let certs =
                reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| Error::Configuration {
                    message: format!("invalid CA bundle {}: {}", path.display(), e),
                    source: Some(anyhow::Error::new(e)),
                })?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
            let mut pem = std::fs::read(cert).map_err(|e| Error::Configuration {
                message: format!("failed to read client_cert {}: {}", cert.display(), e),
                source: Some(anyhow::Error::new(e)),
            })?;
            let key_pem = std::fs::read(key).map_err(|e| Error::Configuration {
                message: format!("failed to read client_key {}: {}", key.display(), e),
                source: Some(anyhow::Error::new(e)),
            })?;
            pem.extend_from_slice(&key_pem);
            let identity =
                reqwest::Identity::from_pem(&pem).map_err(|e| Error::Configuration {
                    message: format!("invalid client certificate/key pair: {}", e),
                    source: Some(anyhow::Error::new(e)),
                })?;
            builder = builder.identity(identity);
        }

        if let Some(version) = self.min_version {
            builder = builder.min_tls_version(version.to_reqwest_version());
        }

        Ok(builder)
    }
}

/// Decode a hex SHA-256 fingerprint, tolerating the common
/// colon-separated rendering
fn decode_fingerprint(fingerprint: &str) -> Result<Vec<u8>> {
    let normalized: String = fingerprint
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase();
    let bytes = hex::decode(&normalized).map_err(|e| Error::Configuration {
        message: format!("assert_fingerprint is not valid hex: {}", e),
        source: Some(anyhow::Error::new(e)),
    })?;
    if bytes.len() != 32 {
        return Err(Error::Configuration {
            message: format!(
                "assert_fingerprint must be a SHA-256 digest (32 bytes), got {} bytes",
                bytes.len()
            ),
            source: None,
        });
    }
    Ok(bytes)
}

/// Build a rustls client config whose only verification step is comparing
/// the leaf certificate's SHA-256 digest against the pinned value
fn pinned_client_config(expected: Vec<u8>) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Configuration {
            message: format!("failed to build pinned TLS context: {}", e),
            source: Some(anyhow::Error::new(e)),
        })?;
    Ok(builder
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(FingerprintVerifier { expected, provider }))
        .with_no_client_auth())
}

/// Certificate verifier that accepts exactly one leaf certificate,
/// identified by its SHA-256 digest. Chain and hostname checks are
/// intentionally skipped; the pin is the trust anchor.
#[derive(Debug)]
struct FingerprintVerifier {
    expected: Vec<u8>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let digest = Sha256::digest(end_entity.as_ref());
        if digest.as_slice() == self.expected.as_slice() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
