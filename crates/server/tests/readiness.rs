use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use triage_core::domain::server::BackendAddress;
use triage_core::errors::BootstrapError;
use triage_server::health::{HttpReadinessProbe, ReadinessProbe};
use triage_server::{BootstrapSettings, LaunchedServer, ServerBootstrap, ServerLauncher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn probe_for(server: &MockServer) -> HttpReadinessProbe {
    let socket = server.address();
    HttpReadinessProbe::new(
        BackendAddress::new(socket.ip().to_string(), socket.port()),
        format!("{}/api/tags", server.uri()),
        Duration::from_millis(500),
    )
}

/// Bound but never read from: connects succeed through the backlog, requests hang.
fn silent_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

struct NoopLauncher;

impl ServerLauncher for NoopLauncher {
    fn launch(&self) -> Result<LaunchedServer, BootstrapError> {
        Ok(LaunchedServer { pid: 0, program: PathBuf::from("noop") })
    }
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

#[tokio::test]
async fn listening_server_with_live_api_is_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let report = probe_for(&server).check().await;

    assert!(report.is_ready(), "report: {report:?}");
    assert_eq!(report.tcp.status, "ready");
    assert_eq!(report.api.status, "ready");
}

#[tokio::test]
async fn open_port_with_failing_api_is_not_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let report = probe_for(&server).check().await;

    assert!(!report.is_ready());
    assert_eq!(report.tcp.status, "ready");
    assert_eq!(report.api.status, "degraded");
    assert!(report.api.detail.contains("500"), "detail: {}", report.api.detail);
}

#[tokio::test]
async fn closed_port_skips_the_api_check() {
    let port = closed_port();
    let probe = HttpReadinessProbe::new(
        BackendAddress::new("127.0.0.1", port),
        format!("http://127.0.0.1:{port}/api/tags"),
        Duration::from_millis(200),
    );

    let report = probe.check().await;

    assert!(!report.is_ready());
    assert_eq!(report.tcp.status, "degraded");
    assert_eq!(report.api.status, "skipped");
}

#[tokio::test]
async fn silent_health_endpoint_is_degraded_within_attempt_timeout() {
    let (_listener, port) = silent_listener();
    let checker = HttpReadinessProbe::new(
        BackendAddress::new("127.0.0.1", port),
        format!("http://127.0.0.1:{port}/api/tags"),
        Duration::from_millis(200),
    );
    let started = Instant::now();

    let report = checker.check().await;

    assert!(!report.is_ready());
    assert_eq!(report.tcp.status, "ready");
    assert_eq!(report.api.status, "degraded");
    assert!(started.elapsed() < Duration::from_millis(1500), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn bootstrap_against_silent_server_times_out_within_max_wait() {
    let (_listener, port) = silent_listener();
    let address = BackendAddress::new("127.0.0.1", port);
    let checker = HttpReadinessProbe::new(
        address.clone(),
        format!("http://127.0.0.1:{port}/api/tags"),
        Duration::from_millis(500),
    );
    let bootstrap = ServerBootstrap::new(
        BootstrapSettings {
            address: address.clone(),
            max_wait: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
        },
        Arc::new(checker),
        Arc::new(NoopLauncher),
    );
    let started = Instant::now();

    let error = bootstrap.ensure_ready().await.expect_err("server never answers");

    assert!(matches!(
        error,
        BootstrapError::Timeout { address: ref timed_out, .. } if *timed_out == address
    ));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}
