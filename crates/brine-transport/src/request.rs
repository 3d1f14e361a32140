//! Per-call request options and request assembly helpers

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use url::Url;

use crate::error::{Error, Result};

/// Options for a single `perform_request` call. All fields are optional;
/// `Default` yields a bare request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, urlencoded into the request URL when non-empty
    pub params: Vec<(String, String)>,
    /// Raw request body
    pub body: Option<Vec<u8>>,
    /// Override of the transport's default timeout, for this call only
    pub timeout: Option<Duration>,
    /// Status codes outside [200, 300) to treat as success for this call
    pub ignore: Vec<u16>,
    /// Headers merged on top of the transport defaults, for this call
    /// only; per-call values win
    pub headers: HashMap<String, String>,
}

impl RequestOptions {
    /// Add a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the timeout for this call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Treat these status codes as success for this call
    pub fn with_ignore(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.ignore.extend(statuses);
        self
    }

    /// Add a per-call header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }
}

/// Build the full target URL: root + path + urlencoded query. An empty
/// parameter list never produces a `?`.
pub(crate) fn build_url(root: &str, path: &str, params: &[(String, String)]) -> Result<Url> {
    let path = if path.starts_with('/') || path.is_empty() {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let mut url = Url::parse(&format!("{}{}", root, path)).map_err(|e| Error::Configuration {
        message: format!("invalid request path {:?}: {}", path, e),
        source: Some(anyhow::Error::new(e)),
    })?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Gzip-compress a request body
pub(crate) fn gzip_body(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).map_err(|e| Error::Configuration {
        message: format!("failed to gzip request body: {}", e),
        source: Some(anyhow::Error::new(e)),
    })?;
    encoder.finish().map_err(|e| Error::Configuration {
        message: format!("failed to gzip request body: {}", e),
        source: Some(anyhow::Error::new(e)),
    })
}
