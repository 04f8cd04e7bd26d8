use std::time::Duration;

use thiserror::Error;

use crate::domain::server::BackendAddress;

/// Failures while making sure the local inference server is reachable.
///
/// None of these are retried beyond the readiness poll loop.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("launch executable `{executable}` could not be found")]
    ExecutableNotFound { executable: String },
    #[error("failed to launch `{executable}`: {source}")]
    Launch {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backend at {address} was not ready after {:.1}s", elapsed.as_secs_f64())]
    Timeout { address: BackendAddress, elapsed: Duration },
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::ExecutableNotFound { .. } => "bootstrap_executable_not_found",
            Self::Launch { .. } => "bootstrap_launch_failed",
            Self::Timeout { .. } => "bootstrap_timeout",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent `{name}` is not registered")]
    NotFound { name: String },
    #[error("agent `{agent}` hands off to `{target}`, which is not registered")]
    UnknownHandoffTarget { agent: String, target: String },
    #[error("agent `{name}` is registered more than once")]
    DuplicateAgent { name: String },
}

impl RegistryError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "registry_not_found",
            Self::UnknownHandoffTarget { .. } => "registry_unknown_handoff_target",
            Self::DuplicateAgent { .. } => "registry_duplicate_agent",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("backend call for agent `{agent}` failed: {message}")]
    BackendFailure { agent: String, message: String },
    #[error("handoff cycle: `{agent}` was already visited (chain: {})", chain.join(" -> "))]
    HandoffCycle { agent: String, chain: Vec<String> },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RouterError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BackendFailure { .. } => "router_backend_failure",
            Self::HandoffCycle { .. } => "router_handoff_cycle",
            Self::Registry(error) => error.error_class(),
        }
    }

    /// Text safe to show an end user. Details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BackendFailure { .. } => {
                "The tutor service could not answer right now. Please retry shortly."
            }
            Self::HandoffCycle { .. } | Self::Registry(_) => {
                "The request could not be routed to a tutor."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::server::BackendAddress;
    use crate::errors::{BootstrapError, RegistryError, RouterError};

    #[test]
    fn timeout_message_names_address_and_elapsed() {
        let error = BootstrapError::Timeout {
            address: BackendAddress::new("localhost", 11434),
            elapsed: Duration::from_millis(30_000),
        };

        let message = error.to_string();
        assert!(message.contains("localhost:11434"));
        assert!(message.contains("30.0s"));
        assert_eq!(error.error_class(), "bootstrap_timeout");
    }

    #[test]
    fn handoff_cycle_lists_chain() {
        let error = RouterError::HandoffCycle {
            agent: "A".to_string(),
            chain: vec!["Triage".to_string(), "A".to_string(), "B".to_string()],
        };

        assert!(error.to_string().contains("Triage -> A -> B"));
        assert_eq!(error.error_class(), "router_handoff_cycle");
    }

    #[test]
    fn registry_errors_keep_their_class_through_router() {
        let error = RouterError::from(RegistryError::NotFound { name: "Ghost".to_string() });

        assert_eq!(error.error_class(), "registry_not_found");
        assert_eq!(error.user_message(), "The request could not be routed to a tutor.");
    }

    #[test]
    fn backend_failure_has_generic_user_message() {
        let error = RouterError::BackendFailure {
            agent: "Math Tutor".to_string(),
            message: "connection refused".to_string(),
        };

        assert!(!error.user_message().contains("connection refused"));
    }
}
