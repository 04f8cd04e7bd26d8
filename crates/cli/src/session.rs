use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use triage_agent::llm::ChatBackend;
use triage_agent::openai::OpenAiCompatClient;
use triage_agent::outcome::RouteOutcome;
use triage_agent::runtime::TriageRouter;
use triage_agent::tutors;
use triage_core::config::AppConfig;
use triage_core::errors::{BootstrapError, RouterError};
use triage_server::ServerBootstrap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GuardrailMode {
    /// Substring match against the homework keyword list.
    Keyword,
    /// Ask the "Guardrail check" agent to classify the input.
    Classifier,
}

/// One configured backend plus the tutor roster routed through it.
pub struct TutorSession {
    bootstrap: Option<ServerBootstrap>,
    router: TriageRouter,
}

impl TutorSession {
    pub fn from_config(config: &AppConfig, mode: GuardrailMode) -> Result<Self> {
        let client = OpenAiCompatClient::from_config(&config.backend)
            .context("failed to build the chat backend client")?;
        let backend: Arc<dyn ChatBackend> = Arc::new(client);

        let model = config.backend.model.as_str();
        let registry = match mode {
            GuardrailMode::Keyword => tutors::tutor_registry(model),
            GuardrailMode::Classifier => {
                tutors::tutor_registry_with_classifier(model, backend.clone())
            }
        }
        .context("failed to assemble the tutor roster")?;

        let bootstrap = config.bootstrap.enabled.then(|| ServerBootstrap::from_config(config));

        Ok(Self { bootstrap, router: TriageRouter::new(Arc::new(registry), backend) })
    }

    /// No-op when bootstrap is disabled; the backend is then assumed to be managed elsewhere.
    pub async fn ensure_ready(&self) -> Result<(), BootstrapError> {
        match &self.bootstrap {
            Some(bootstrap) => bootstrap.ensure_ready().await,
            None => Ok(()),
        }
    }

    pub async fn ask(&self, text: &str) -> Result<RouteOutcome, RouterError> {
        self.router.route_input(text).await
    }
}
