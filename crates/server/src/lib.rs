//! Local inference server bootstrap: probe readiness, launch the server
//! detached if it is absent, and wait for it within a budget.

pub mod bootstrap;
pub mod health;
pub mod launcher;

pub use bootstrap::{BootstrapSettings, ServerBootstrap};
pub use health::{HealthCheck, HttpReadinessProbe, ReadinessProbe, ReadinessReport};
pub use launcher::{LaunchedServer, ProcessLauncher, ServerLauncher};
