use std::fmt;

use serde::{Deserialize, Serialize};

/// Host/port pair of the local inference server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendAddress {
    pub host: String,
    pub port: u16,
}

impl BackendAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Readiness of the local inference server as last observed by the bootstrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    #[default]
    Unknown,
    Unreachable,
    Starting,
    Ready,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unreachable => "unreachable",
            Self::Starting => "starting",
            Self::Ready => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendAddress, ServerState};

    #[test]
    fn address_renders_as_host_port() {
        assert_eq!(BackendAddress::new("127.0.0.1", 11434).to_string(), "127.0.0.1:11434");
    }

    #[test]
    fn default_state_is_unknown() {
        assert_eq!(ServerState::default(), ServerState::Unknown);
        assert!(!ServerState::Starting.is_ready());
        assert!(ServerState::Ready.is_ready());
    }
}
