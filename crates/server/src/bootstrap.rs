use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};
use triage_core::config::AppConfig;
use triage_core::domain::server::{BackendAddress, ServerState};
use triage_core::errors::BootstrapError;

use crate::health::{HttpReadinessProbe, ReadinessProbe};
use crate::launcher::{ProcessLauncher, ServerLauncher};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapSettings {
    pub address: BackendAddress,
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl BootstrapSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            address: config.bootstrap.address(),
            max_wait: config.bootstrap.max_wait(),
            poll_interval: config.bootstrap.poll_interval(),
        }
    }
}

/// Makes sure the local inference server answers before any agent call.
///
/// Every `ensure_ready` call probes again; nothing is cached across calls beyond
/// the last observed [`ServerState`]. Calls are serialized so concurrent first
/// callers cannot spawn duplicate servers.
pub struct ServerBootstrap {
    settings: BootstrapSettings,
    probe: Arc<dyn ReadinessProbe>,
    launcher: Arc<dyn ServerLauncher>,
    gate: tokio::sync::Mutex<()>,
    state: Mutex<ServerState>,
}

impl ServerBootstrap {
    pub fn new(
        settings: BootstrapSettings,
        probe: Arc<dyn ReadinessProbe>,
        launcher: Arc<dyn ServerLauncher>,
    ) -> Self {
        Self {
            settings,
            probe,
            launcher,
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(ServerState::Unknown),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            BootstrapSettings::from_config(config),
            Arc::new(HttpReadinessProbe::from_config(config)),
            Arc::new(ProcessLauncher::from_config(&config.bootstrap)),
        )
    }

    pub fn settings(&self) -> &BootstrapSettings {
        &self.settings
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ServerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            info!(
                event_name = "bootstrap.state.transition",
                address = %self.settings.address,
                from = state.as_str(),
                to = next.as_str(),
                "server state changed"
            );
            *state = next;
        }
    }

    /// A check still running at `deadline` is abandoned and counts as not ready.
    async fn is_ready_before(&self, deadline: Instant) -> bool {
        match tokio::time::timeout_at(deadline, self.probe.check()).await {
            Ok(report) => report.is_ready(),
            Err(_) => false,
        }
    }

    pub async fn ensure_ready(&self) -> Result<(), BootstrapError> {
        let _gate = self.gate.lock().await;
        let started = Instant::now();
        let deadline = started + self.settings.max_wait;
        let address = &self.settings.address;

        if self.is_ready_before(deadline).await {
            self.set_state(ServerState::Ready);
            info!(
                event_name = "bootstrap.ready",
                address = %address,
                launched = false,
                "inference server already ready"
            );
            return Ok(());
        }
        self.set_state(ServerState::Unreachable);

        let launched = match self.launcher.launch() {
            Ok(launched) => launched,
            Err(launch_error) => {
                error!(
                    event_name = "bootstrap.launch.failed",
                    address = %address,
                    error = %launch_error,
                    "could not launch inference server"
                );
                return Err(launch_error);
            }
        };
        self.set_state(ServerState::Starting);
        info!(
            event_name = "bootstrap.launch.waiting",
            address = %address,
            pid = launched.pid,
            max_wait_ms = self.settings.max_wait.as_millis() as u64,
            "waiting for inference server"
        );

        loop {
            if self.is_ready_before(deadline).await {
                self.set_state(ServerState::Ready);
                info!(
                    event_name = "bootstrap.ready",
                    address = %address,
                    launched = true,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "inference server ready"
                );
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = now - started;
                self.set_state(ServerState::Unreachable);
                warn!(
                    event_name = "bootstrap.timeout",
                    address = %address,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "inference server did not become ready"
                );
                return Err(BootstrapError::Timeout { address: address.clone(), elapsed });
            }

            tokio::time::sleep_until((now + self.settings.poll_interval).min(deadline)).await;
        }
    }
}
