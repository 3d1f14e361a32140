//! End-to-end transport behavior against a local mock server

use std::time::Duration;

use brine_transport::{
    Credentials, Error, Method, RequestOptions, RequestSigner, Transport, TransportConfig,
};
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> TransportConfig {
    let addr = server.address();
    TransportConfig::new(addr.ip().to_string(), addr.port())
}

fn transport_for(server: &MockServer) -> Transport {
    Transport::new(config_for(server)).expect("valid test config")
}

#[tokio::test]
async fn success_returns_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-index/_search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"hits":{"total":0}}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(
            Method::GET,
            "/my-index/_search",
            RequestOptions::default().with_body(br#"{"query":{"match_all":{}}}"#.to_vec()),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.is_success());
    assert_eq!(response.body, r#"{"hits":{"total":0}}"#);
    assert_eq!(
        response.headers.get("content-type").unwrap(),
        "application/json"
    );

    // The decoded body is plain text; callers parse it themselves
    let parsed: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(parsed["hits"]["total"], 0);
}

#[tokio::test]
async fn ignored_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-index/_search"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"error":"index_not_found"}"#),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(
            Method::GET,
            "/my-index/_search",
            RequestOptions::default().with_ignore([404]),
        )
        .await
        .unwrap();

    // Success for control flow, but the caller can still see the real
    // status code
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.body, r#"{"error":"index_not_found"}"#);
}

#[tokio::test]
async fn unignored_status_raises_with_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-index/_search"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"error":"index_not_found"}"#),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let err = transport
        .perform_request(Method::GET, "/my-index/_search", RequestOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, r#"{"error":"index_not_found"}"#);
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn every_2xx_succeeds_regardless_of_ignore() {
    let server = MockServer::start().await;
    for status in [200u16, 201, 204, 226, 299] {
        Mock::given(method("GET"))
            .and(path(format!("/status/{}", status)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let transport = transport_for(&server);
    for status in [200u16, 201, 204, 226, 299] {
        let response = transport
            .perform_request(
                Method::GET,
                &format!("/status/{}", status),
                RequestOptions::default().with_ignore([418]),
            )
            .await
            .unwrap();
        assert_eq!(response.status, status);
    }
}

#[tokio::test]
async fn head_reports_empty_body_with_real_status_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/my-index"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-marker", "present"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(Method::HEAD, "/my-index", RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "");
    assert_eq!(response.headers.get("x-marker").unwrap(), "present");
}

#[tokio::test]
async fn warning_headers_do_not_fail_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-index/_search"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("warning", "299 - \"deprecated\"")
                .set_body_string(r#"{"hits":{"total":0}}"#),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(Method::GET, "/my-index/_search", RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("warning").unwrap(), "299 - \"deprecated\"");
    assert_eq!(response.body, r#"{"hits":{"total":0}}"#);
}

#[tokio::test]
async fn query_params_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_search"))
        .and(query_param("q", "user:kimchy"))
        .and(query_param("size", "5"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(
            Method::GET,
            "/_search",
            RequestOptions::default()
                .with_param("q", "user:kimchy")
                .with_param("size", "5"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn default_headers_and_per_call_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/defaults"))
        .and(header("x-probe", "default"))
        .and(header("x-opaque-id", "client-7"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/override"))
        .and(header("x-probe", "per-call"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server)
        .with_header("x-probe", "default")
        .with_opaque_id("client-7");
    let transport = Transport::new(config).unwrap();

    let response = transport
        .perform_request(Method::GET, "/defaults", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    // Per-call headers take precedence over the transport defaults
    let response = transport
        .perform_request(
            Method::GET,
            "/override",
            RequestOptions::default().with_header("x-probe", "per-call"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

struct GzipBody;

impl wiremock::Match for GzipBody {
    fn matches(&self, request: &wiremock::Request) -> bool {
        request.body.starts_with(&[0x1f, 0x8b])
    }
}

#[tokio::test]
async fn compressed_bodies_carry_content_encoding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(header("content-encoding", "gzip"))
        .and(GzipBody)
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server).with_http_compress(true);
    let transport = Transport::new(config).unwrap();

    let response = transport
        .perform_request(
            Method::POST,
            "/_bulk",
            RequestOptions::default().with_body(b"{\"index\":{}}\n{}\n".to_vec()),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn basic_auth_is_sent() {
    let server = MockServer::start().await;
    // base64("admin:secret")
    Mock::given(method("GET"))
        .and(path("/_cluster/health"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server).with_credentials(Credentials::basic("admin", "secret"));
    let transport = Transport::new(config).unwrap();

    let response = transport
        .perform_request(Method::GET, "/_cluster/health", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

struct MarkerSigner;

impl RequestSigner for MarkerSigner {
    fn sign(
        &self,
        method: &Method,
        _url: &Url,
        query: Option<&str>,
        _body: Option<&[u8]>,
    ) -> brine_transport::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-signature",
            HeaderValue::from_str(&format!(
                "{}:{}",
                method.as_str(),
                query.unwrap_or("")
            ))
            .unwrap(),
        );
        Ok(headers)
    }
}

#[tokio::test]
async fn signer_headers_are_merged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_search"))
        .and(header("x-signature", "GET:pretty=true"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server).with_credentials(Credentials::signer(MarkerSigner));
    let transport = Transport::new(config).unwrap();

    let response = transport
        .perform_request(
            Method::GET,
            "/_search",
            RequestOptions::default().with_param("pretty", "true"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn timeouts_are_classified_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let err = transport
        .perform_request(
            Method::GET,
            "/slow",
            RequestOptions::default().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "got {:?}", err);
}

#[tokio::test]
async fn refused_connections_are_classified_as_connection() {
    // Bind and immediately drop a listener to find a port nothing is
    // listening on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = Transport::new(TransportConfig::new("127.0.0.1", port)).unwrap();
    let err = transport
        .perform_request(Method::GET, "/", RequestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connection { .. }), "got {:?}", err);
}

#[tokio::test]
async fn identical_calls_yield_identical_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stable"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    for _ in 0..2 {
        let err = transport
            .perform_request(Method::GET, "/stable", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }
}

#[tokio::test]
async fn concurrent_first_requests_share_one_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/racing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = std::sync::Arc::new(transport_for(&server));

    // All of these start before the session exists; the one-shot
    // initializer must hand every caller the same session.
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let transport = transport.clone();
            tokio::spawn(async move {
                transport
                    .perform_request(Method::GET, "/racing", RequestOptions::default())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }
}

#[tokio::test]
async fn invalid_utf8_bodies_are_decoded_lossily() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/binary"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok \xff\xfe".to_vec()))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let response = transport
        .perform_request(Method::GET, "/binary", RequestOptions::default())
        .await
        .unwrap();

    assert!(response.body.starts_with("ok "));
    assert!(response.body.contains('\u{fffd}'));
}

#[tokio::test]
async fn url_prefix_applies_to_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/es/_cat/indices"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server).with_url_prefix("/es");
    let transport = Transport::new(config).unwrap();

    let response = transport
        .perform_request(Method::GET, "/_cat/indices", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn ping_downgrades_failures_to_false() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    assert!(transport.ping().await);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let dead = Transport::new(TransportConfig::new("127.0.0.1", port)).unwrap();
    assert!(!dead.ping().await);
}
