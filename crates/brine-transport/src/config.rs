//! Transport configuration
//!
//! Captured once at construction; the adapter never mutates it afterwards.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::tls::TlsConfig;

/// Configuration for a [`Transport`](crate::Transport)
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hostname of the target node
    pub host: String,
    /// Port of the target node
    pub port: u16,
    /// Path prefix prepended to every request path (normalized to a
    /// leading slash and no trailing slash)
    pub url_prefix: String,
    /// Use HTTPS instead of HTTP
    pub use_ssl: bool,
    /// Default per-request timeout; overridable per call
    pub timeout: Duration,
    /// Upper bound on pooled connections kept alive per host
    pub pool_maxsize: usize,
    /// Default headers sent with every request
    pub headers: HashMap<String, String>,
    /// Gzip-compress request bodies
    pub http_compress: bool,
    /// Value for the `x-opaque-id` default header, used by the server to
    /// attribute tasks back to this client
    pub opaque_id: Option<String>,
    /// Authentication credential
    pub credentials: Option<Credentials>,
    /// TLS settings, only consulted when `use_ssl` is set
    pub tls: TlsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            url_prefix: String::new(),
            use_ssl: false,
            timeout: Duration::from_secs(10),
            pool_maxsize: 10,
            headers: HashMap::new(),
            http_compress: false,
            opaque_id: None,
            credentials: None,
            tls: TlsConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Create a configuration for a specific host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the URL prefix prepended to every request path
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = normalize_prefix(&prefix.into());
        self
    }

    /// Use HTTPS with the given TLS settings
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.use_ssl = true;
        self.tls = tls;
        self
    }

    /// Set the default per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound the connection pool
    pub fn with_pool_maxsize(mut self, maxsize: usize) -> Self {
        self.pool_maxsize = maxsize;
        self
    }

    /// Add a default header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Enable gzip compression of request bodies
    pub fn with_http_compress(mut self, compress: bool) -> Self {
        self.http_compress = compress;
        self
    }

    /// Set the `x-opaque-id` header value
    pub fn with_opaque_id(mut self, id: impl Into<String>) -> Self {
        self.opaque_id = Some(id.into());
        self
    }

    /// Attach an authentication credential
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Validate the configuration before any network I/O
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Configuration {
                message: "host must not be empty".to_string(),
                source: None,
            });
        }
        self.base_url()?;
        if self.use_ssl {
            self.tls.validate()?;
        }
        Ok(())
    }

    /// The scheme/host/port/prefix every request URL starts from
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let raw = format!("{}://{}:{}{}", scheme, self.host, self.port, self.url_prefix);
        Url::parse(&raw).map_err(|e| Error::Configuration {
            message: format!("invalid host/prefix combination {:?}: {}", raw, e),
            source: Some(anyhow::Error::new(e)),
        })
    }

    /// Scheme/host/port/prefix as a string, without a trailing slash, for
    /// direct concatenation with a request path
    pub(crate) fn root(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.url_prefix)
    }

    /// Default headers for the session: configured headers plus the
    /// always-on keep-alive marker and the opaque id when set. Per-call
    /// headers overlay these at dispatch time.
    pub(crate) fn default_headers(&self) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        headers
            .entry("connection".to_string())
            .or_insert_with(|| "keep-alive".to_string());
        if let Some(id) = &self.opaque_id {
            headers.insert("x-opaque-id".to_string(), id.clone());
        }
        headers
    }
}

/// Normalize a URL prefix: leading slash, no trailing slash, empty stays
/// empty
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
