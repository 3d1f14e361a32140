//! The HTTP transport adapter
//!
//! Owns one lazily-created pooled HTTP session and performs one logical
//! request per `perform_request` call: build URL and headers, optionally
//! compress and authenticate, dispatch under a timeout, then either return
//! a normalized response or a classified error. Retries, node fan-out and
//! sniffing are higher-level concerns and do not live here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING};
use reqwest::{Client, Method};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::Credentials;
use crate::config::TransportConfig;
use crate::error::{classify_dispatch_error, Error, Result};
use crate::request::{build_url, gzip_body, RequestOptions};
use crate::response::{decode_body, normalize_headers, surface_warnings, TransportResponse};

/// Asynchronous HTTP transport for a single configured host.
///
/// The underlying session is created on the first request and reused for
/// the lifetime of the transport. Any number of `perform_request` calls
/// may be in flight concurrently; they share only the session's connection
/// pool and the immutable configuration. There is no defined completion
/// order between concurrent calls. Cancelling a call is dropping its
/// future; the transport never remaps cancellation into an error.
pub struct Transport {
    config: TransportConfig,
    root: String,
    session: OnceCell<Client>,
    closed: AtomicBool,
}

impl Transport {
    /// Create a transport, validating the configuration eagerly.
    ///
    /// TLS material is checked here (file existence, cert/key pairing,
    /// fingerprint format) so misconfiguration surfaces as
    /// [`Error::Configuration`] before any network I/O is attempted.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let root = config.root();
        Ok(Self {
            config,
            root,
            session: OnceCell::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Perform one logical HTTP request.
    ///
    /// `path` is resolved against the configured host and URL prefix.
    /// Success means a status in `[200, 300)` or one listed in
    /// `options.ignore`; anything else received over the wire becomes
    /// [`Error::Status`], and dispatch failures are classified into the
    /// TLS/timeout/connection kinds.
    ///
    /// A successful `HEAD` always reports an empty body; its status and
    /// headers are the real response's.
    pub async fn perform_request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<TransportResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Connection {
                message: "transport is closed".to_string(),
                source: None,
            });
        }

        let session = self.session().await?;
        let url = build_url(&self.root, path, &options.params)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        // Keep the caller's body around for failure logging; the wire
        // body may be the compressed form.
        let original_body = options.body;
        let mut wire_body = original_body.clone();

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Configuration {
                message: format!("invalid header name {:?}: {}", name, e),
                source: Some(anyhow::Error::new(e)),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Configuration {
                message: format!("invalid header value for {}: {}", name, e),
                source: Some(anyhow::Error::new(e)),
            })?;
            headers.insert(name, value);
        }

        if self.config.http_compress {
            if let Some(raw) = &wire_body {
                wire_body = Some(gzip_body(raw)?);
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            }
        }

        let mut request = session
            .request(method.clone(), url.clone())
            .timeout(timeout)
            .headers(headers);

        match &self.config.credentials {
            Some(Credentials::Basic { username, password }) => {
                request = request.basic_auth(username, Some(password));
            }
            Some(Credentials::Signer(signer)) => {
                let signed = signer.sign(&method, &url, url.query(), wire_body.as_deref())?;
                request = request.headers(signed);
            }
            None => {}
        }

        if let Some(body) = wire_body {
            request = request.body(body);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = classify_dispatch_error(e);
                self.log_failure(&method, &url, original_body.as_deref(), started, &err);
                return Err(err);
            }
        };
        let elapsed = started.elapsed();

        let status = response.status().as_u16();
        surface_warnings(response.headers());
        let headers = normalize_headers(response.headers());

        let body = if method == Method::HEAD {
            // HEAD responses carry no payload; report an empty body no
            // matter what arrived.
            String::new()
        } else {
            match response.bytes().await {
                Ok(bytes) => decode_body(&bytes),
                Err(e) => {
                    let err = classify_dispatch_error(e);
                    self.log_failure(&method, &url, original_body.as_deref(), started, &err);
                    return Err(err);
                }
            }
        };

        if (200..300).contains(&status) || options.ignore.contains(&status) {
            info!(
                "{} {} [status:{} request:{:.3}s]",
                method,
                url,
                status,
                elapsed.as_secs_f64()
            );
            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        } else {
            warn!(
                "{} {} [status:{} request:{:.3}s] body: {}",
                method,
                url,
                status,
                elapsed.as_secs_f64(),
                body
            );
            Err(Error::Status { status, body })
        }
    }

    /// Liveness probe: `HEAD /`, any transport failure downgraded to
    /// `false`
    pub async fn ping(&self) -> bool {
        self.perform_request(Method::HEAD, "/", RequestOptions::default())
            .await
            .is_ok()
    }

    /// Mark the transport closed. Later `perform_request` calls fail with
    /// a connection error without touching the network; in-flight calls
    /// are unaffected. The pooled connections close when the transport is
    /// dropped. Re-initialization means constructing a new transport.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The configuration this transport was built with
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The lazily-created session. `OnceCell` guarantees at most one
    /// client is ever constructed, however many requests race here before
    /// the first initialization completes.
    async fn session(&self) -> Result<&Client> {
        self.session
            .get_or_try_init(|| async { self.build_session() })
            .await
    }

    fn build_session(&self) -> Result<Client> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in self.config.default_headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Configuration {
                message: format!("invalid default header name {:?}: {}", name, e),
                source: Some(anyhow::Error::new(e)),
            })?;
            let value = HeaderValue::from_str(&value).map_err(|e| Error::Configuration {
                message: format!("invalid default header value for {}: {}", name, e),
                source: Some(anyhow::Error::new(e)),
            })?;
            default_headers.insert(name, value);
        }

        // No cookie store is configured: cookies never persist across
        // requests.
        let mut builder = Client::builder()
            .default_headers(default_headers)
            .pool_max_idle_per_host(self.config.pool_maxsize)
            .timeout(self.config.timeout);

        if self.config.use_ssl {
            builder = self.config.tls.apply(builder)?;
        }

        builder.build().map_err(|e| Error::Configuration {
            message: format!("failed to build HTTP session: {}", e),
            source: Some(anyhow::Error::new(e)),
        })
    }

    fn log_failure(
        &self,
        method: &Method,
        url: &url::Url,
        body: Option<&[u8]>,
        started: Instant,
        err: &Error,
    ) {
        let body = body.map(|b| String::from_utf8_lossy(b).into_owned());
        warn!(
            "{} {} failed after {:.3}s: {} (body: {})",
            method,
            url,
            started.elapsed().as_secs_f64(),
            err,
            body.as_deref().unwrap_or("")
        );
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("root", &self.root)
            .field("initialized", &self.session.initialized())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsConfig;

    #[test]
    fn test_new_validates_tls_material_eagerly() {
        let config = TransportConfig::new("localhost", 9200)
            .with_tls(TlsConfig::secure().with_ca_certs("/does/not/exist.pem"));
        let err = Transport::new(config).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_root_includes_prefix() {
        let transport = Transport::new(
            TransportConfig::new("node1", 9200).with_url_prefix("/es/"),
        )
        .unwrap();
        assert_eq!(transport.root, "http://node1:9200/es");
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_requests() {
        let transport = Transport::new(TransportConfig::default()).unwrap();
        transport.close();
        assert!(transport.is_closed());

        let err = transport
            .perform_request(Method::GET, "/", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        // close() must not have forced a session into existence
        assert!(!transport.session.initialized());
    }
}
