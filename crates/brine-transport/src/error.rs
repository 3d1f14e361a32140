//! Error types for the transport layer
//!
//! Every failure a caller can observe is one of the five kinds below,
//! defined with thiserror and carrying the original low-level error as a
//! source where one exists.

use thiserror::Error;

/// Main error type for transport operations
#[derive(Error, Debug)]
pub enum Error {
    /// TLS handshake or certificate failures, including a pinned
    /// fingerprint that did not match the peer's leaf certificate
    #[error("TLS error: {message}")]
    Tls {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The request exceeded its deadline. Kept distinct from
    /// [`Error::Connection`] so callers can apply a different retry
    /// policy to timeouts than to hard connection failures.
    #[error("request timed out: {message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Any other low-level dispatch failure: DNS, refused connection,
    /// protocol violation
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The response arrived but its status was outside [200, 300) and not
    /// in the caller's ignore set
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Local validation failure detected before any network I/O, such as
    /// a certificate path that does not exist. Never retried.
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The HTTP status code, for status-derived errors
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error was produced without touching the network
    pub fn is_local(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

/// Classify a reqwest dispatch failure into the transport taxonomy.
///
/// Timeouts come first because a timed-out connect also reports
/// `is_connect()`. Certificate problems surface as connect errors whose
/// source chain bottoms out in the TLS stack, so the chain is inspected
/// before falling back to a generic connection error.
pub(crate) fn classify_dispatch_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::Timeout {
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        };
    }
    if is_tls_failure(&err) {
        return Error::Tls {
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        };
    }
    Error::Connection {
        message: err.to_string(),
        source: Some(anyhow::Error::new(err)),
    }
}

/// Walk the source chain looking for a rustls error or a certificate
/// complaint embedded in an io::Error by the TLS connector.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        let text = cause.to_string();
        if text.contains("certificate") || text.contains("handshake") {
            return true;
        }
        source = cause.source();
    }
    false
}
