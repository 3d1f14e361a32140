//! Normalized response representation
//!
//! The transport hands callers a plain `(status, headers, body)` triple.
//! Bodies are decoded permissively: malformed byte sequences become
//! replacement characters rather than a decode failure, so a non-UTF-8
//! payload can never crash the transport. The decoded text therefore does
//! not necessarily round-trip to the original bytes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One received HTTP response, normalized for the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportResponse {
    /// Numeric status code
    pub status: u16,
    /// Response headers, keys lowercased; repeated headers joined with
    /// `", "`
    pub headers: HashMap<String, String>,
    /// Response body, decoded with replacement of invalid sequences
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is in the 2xx success range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Flatten a reqwest header map into the normalized representation
pub(crate) fn normalize_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    let mut normalized: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        normalized
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    normalized
}

/// Surface each `warning` response header as a distinct log record.
/// Warnings never fail the call.
pub(crate) fn surface_warnings(headers: &reqwest::header::HeaderMap) {
    for value in headers.get_all(reqwest::header::WARNING) {
        let value = String::from_utf8_lossy(value.as_bytes());
        warn!("server warning: {}", value);
    }
}

/// Decode a response body, substituting replacement characters for any
/// invalid UTF-8 sequence
pub(crate) fn decode_body(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
