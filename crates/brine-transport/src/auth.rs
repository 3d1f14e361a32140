//! Authentication for outbound requests
//!
//! Supports exactly two strategies, selected once at construction:
//! - static basic-auth credentials
//! - dynamic per-request signing (e.g. SigV4-style schemes)

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::Result;

/// Trait for request-signing credential providers.
///
/// Implementations are given the full request shape and return headers to
/// merge into the outgoing request. Called once per dispatch, after the
/// body has been finalized (including compression).
pub trait RequestSigner: Send + Sync {
    /// Produce the signing headers for one request
    fn sign(
        &self,
        method: &Method,
        url: &Url,
        query: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap>;
}

/// Authentication credential attached to a transport
#[derive(Clone)]
pub enum Credentials {
    /// Static login/password pair, sent as HTTP basic auth
    Basic { username: String, password: String },
    /// Per-request signer; its headers are merged into each request
    Signer(Arc<dyn RequestSigner>),
}

impl Credentials {
    /// Convenience constructor for basic auth
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Convenience constructor for a signing credential
    pub fn signer(signer: impl RequestSigner + 'static) -> Self {
        Credentials::Signer(Arc::new(signer))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Never print the password
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Signer(_) => f.write_str("Signer(..)"),
        }
    }
}
