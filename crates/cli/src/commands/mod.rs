pub mod ask;
pub mod config;
pub mod demo;
pub mod doctor;

use serde::Serialize;
use tracing::error;
use triage_agent::outcome::RouteOutcome;
use triage_core::config::{AppConfig, LoadOptions};
use triage_core::errors::{BootstrapError, RouterError};

pub const EXIT_ROUTER_FAILURE: u8 = 1;
pub const EXIT_CONFIG_FAILURE: u8 = 2;
pub const EXIT_BOOTSTRAP_FAILURE: u8 = 3;

pub const BLOCKED_PREFIX: &str = "Guardrail blocked this input:";

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::with_status(command, "ok", message)
    }

    /// A guardrail refusal. Still exit code 0: the input was handled as designed.
    pub fn blocked(command: &str, message: impl Into<String>) -> Self {
        Self::with_status(command, "blocked", message)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn with_status(command: &str, status: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }
}

pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG_FAILURE)
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_ROUTER_FAILURE,
        )
    })
}

pub(crate) fn render_outcome(outcome: &RouteOutcome) -> (bool, String) {
    match outcome {
        RouteOutcome::Answered(result) => (false, result.final_output.clone()),
        RouteOutcome::Blocked(verdict) => {
            (true, format!("{BLOCKED_PREFIX} {}", verdict.reasoning()))
        }
    }
}

pub(crate) fn bootstrap_failure(command: &str, failure: &BootstrapError) -> CommandResult {
    CommandResult::failure(
        command,
        failure.error_class(),
        format!("inference server is not available: {failure}"),
        EXIT_BOOTSTRAP_FAILURE,
    )
}

pub(crate) fn router_failure(command: &str, failure: &RouterError) -> CommandResult {
    error!(
        event_name = "cli.route.failed",
        command,
        error_class = failure.error_class(),
        error = %failure,
        "routing failed"
    );
    CommandResult::failure(
        command,
        failure.error_class(),
        failure.user_message(),
        EXIT_ROUTER_FAILURE,
    )
}

pub(crate) fn setup_failure(command: &str, failure: &anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "session_setup", format!("{failure:#}"), EXIT_ROUTER_FAILURE)
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
