//! Brine Transport - async HTTP transport for the Brine search client
//!
//! This crate owns the lowest layer of the client: dispatching one logical
//! HTTP request against a configured node and normalizing the outcome.
//!
//! # Main Components
//!
//! - **Error Handling**: a five-kind typed taxonomy (`thiserror`), so
//!   callers can tell a timeout from a hard connection failure from a
//!   non-2xx status
//! - **Configuration**: immutable [`TransportConfig`] + [`TlsConfig`],
//!   validated eagerly before any network I/O
//! - **Authentication**: static basic auth or per-request signing via
//!   [`RequestSigner`]
//! - **The Adapter**: [`Transport::perform_request`] — lazy exactly-once
//!   session creation, URL/header/body assembly, optional gzip, timeout,
//!   and status classification against a per-call ignore set
//!
//! Retries, backoff, node fan-out and sniffing are deliberately absent:
//! this layer makes exactly one dispatch attempt per call and reports a
//! typed result for a higher layer to act on.
//!
//! # Example
//!
//! ```no_run
//! use brine_transport::{RequestOptions, Transport, TransportConfig};
//!
//! # async fn example() -> brine_transport::Result<()> {
//! let transport = Transport::new(TransportConfig::new("localhost", 9200))?;
//! let response = transport
//!     .perform_request(
//!         reqwest::Method::GET,
//!         "/my-index/_search",
//!         RequestOptions::default().with_body(br#"{"query":{"match_all":{}}}"#.to_vec()),
//!     )
//!     .await?;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod tls;
pub mod transport;

// Re-export main types for convenience
pub use auth::{Credentials, RequestSigner};
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use request::RequestOptions;
pub use response::TransportResponse;
pub use tls::{TlsConfig, TlsVersion};
pub use transport::Transport;

// Re-export commonly used types
pub use reqwest::Method;
