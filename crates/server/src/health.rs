use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::debug;
use triage_core::config::AppConfig;
use triage_core::domain::server::BackendAddress;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn skipped(detail: impl Into<String>) -> Self {
        Self { status: "skipped", detail: detail.into() }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

/// Both layers must pass: a server can accept connections before its API is live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub status: &'static str,
    pub tcp: HealthCheck,
    pub api: HealthCheck,
    pub checked_at: String,
}

impl ReadinessReport {
    pub fn new(tcp: HealthCheck, api: HealthCheck) -> Self {
        let ready = tcp.is_ready() && api.is_ready();
        Self {
            status: if ready { "ready" } else { "degraded" },
            tcp,
            api,
            checked_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.tcp.is_ready() && self.api.is_ready()
    }
}

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self) -> ReadinessReport;
}

/// TCP connect followed by `GET {base_url}{health_path}` expecting a 2xx.
/// Each of the two steps is bounded by `attempt_timeout`.
pub struct HttpReadinessProbe {
    address: BackendAddress,
    health_url: String,
    attempt_timeout: Duration,
    client: reqwest::Client,
}

impl HttpReadinessProbe {
    pub fn new(
        address: BackendAddress,
        health_url: impl Into<String>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            address,
            health_url: health_url.into(),
            attempt_timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let health_url = format!(
            "{}{}",
            config.backend.base_url.trim_end_matches('/'),
            config.bootstrap.health_path
        );
        Self::new(config.bootstrap.address(), health_url, config.bootstrap.probe_timeout())
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    async fn tcp_check(&self) -> HealthCheck {
        let connect = TcpStream::connect((self.address.host.as_str(), self.address.port));
        match tokio::time::timeout(self.attempt_timeout, connect).await {
            Ok(Ok(_stream)) => {
                HealthCheck::ready(format!("{} accepted a connection", self.address))
            }
            Ok(Err(error)) => {
                HealthCheck::degraded(format!("{} refused connection: {error}", self.address))
            }
            Err(_) => HealthCheck::degraded(format!(
                "{} did not accept within {}ms",
                self.address,
                self.attempt_timeout.as_millis()
            )),
        }
    }

    async fn api_check(&self) -> HealthCheck {
        let response =
            self.client.get(&self.health_url).timeout(self.attempt_timeout).send().await;
        match response {
            Ok(response) if response.status().is_success() => HealthCheck::ready(format!(
                "GET {} returned {}",
                self.health_url,
                response.status()
            )),
            Ok(response) => HealthCheck::degraded(format!(
                "GET {} returned {}",
                self.health_url,
                response.status()
            )),
            Err(error) => {
                HealthCheck::degraded(format!("GET {} failed: {error}", self.health_url))
            }
        }
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn check(&self) -> ReadinessReport {
        let tcp = self.tcp_check().await;
        let api = if tcp.is_ready() {
            self.api_check().await
        } else {
            HealthCheck::skipped("skipped because the port is not accepting connections")
        };

        debug!(
            event_name = "bootstrap.probe.result",
            address = %self.address,
            tcp = tcp.status,
            api = api.status,
            "readiness probe finished"
        );
        ReadinessReport::new(tcp, api)
    }
}
