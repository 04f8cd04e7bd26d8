use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::server::BackendAddress;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub max_wait_secs: u64,
    pub probe_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub executable: String,
    pub args: Vec<String>,
    pub health_path: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub backend_base_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub backend_model: Option<String>,
    pub bootstrap_enabled: Option<bool>,
    pub bootstrap_host: Option<String>,
    pub bootstrap_port: Option<u16>,
    pub bootstrap_max_wait_secs: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub load_dotenv: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:11434".to_string(),
                api_key: secret_value("local-anything".to_string()),
                model: "gpt-oss:20b".to_string(),
                timeout_secs: 120,
            },
            bootstrap: BootstrapConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 11434,
                max_wait_secs: 30,
                probe_timeout_ms: 500,
                poll_interval_ms: 500,
                executable: "ollama".to_string(),
                args: vec!["serve".to_string()],
                health_path: "/api/tags".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BootstrapConfig {
    pub fn address(&self) -> BackendAddress {
        BackendAddress::new(self.host.clone(), self.port)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Which parts of the bootstrap address some config layer set explicitly.
#[derive(Clone, Copy, Debug, Default)]
struct AddressPins {
    host: bool,
    port: bool,
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        if options.load_dotenv {
            // Variables already present in the process environment win over `.env`.
            let _ = dotenvy::dotenv();
        }

        let mut config = Self::default();
        let mut pins = AddressPins::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            if let Some(bootstrap) = &patch.bootstrap {
                pins.host |= bootstrap.host.is_some();
                pins.port |= bootstrap.port.is_some();
            }
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("triage.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        pins.host |= read_env("TRIAGE_BOOTSTRAP_HOST").is_some();
        pins.port |= read_env("TRIAGE_BOOTSTRAP_PORT").is_some();

        pins.host |= options.overrides.bootstrap_host.is_some();
        pins.port |= options.overrides.bootstrap_port.is_some();
        config.apply_overrides(options.overrides);

        config.logging.level = config.logging.level.trim().to_ascii_lowercase();
        config.resolve_bootstrap_address(pins)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(api_key_value) = backend.api_key {
                self.backend.api_key = secret_value(api_key_value);
            }
            if let Some(model) = backend.model {
                self.backend.model = model;
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(bootstrap) = patch.bootstrap {
            if let Some(enabled) = bootstrap.enabled {
                self.bootstrap.enabled = enabled;
            }
            if let Some(host) = bootstrap.host {
                self.bootstrap.host = host;
            }
            if let Some(port) = bootstrap.port {
                self.bootstrap.port = port;
            }
            if let Some(max_wait_secs) = bootstrap.max_wait_secs {
                self.bootstrap.max_wait_secs = max_wait_secs;
            }
            if let Some(probe_timeout_ms) = bootstrap.probe_timeout_ms {
                self.bootstrap.probe_timeout_ms = probe_timeout_ms;
            }
            if let Some(poll_interval_ms) = bootstrap.poll_interval_ms {
                self.bootstrap.poll_interval_ms = poll_interval_ms;
            }
            if let Some(executable) = bootstrap.executable {
                self.bootstrap.executable = executable;
            }
            if let Some(args) = bootstrap.args {
                self.bootstrap.args = args;
            }
            if let Some(health_path) = bootstrap.health_path {
                self.bootstrap.health_path = health_path;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TRIAGE_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("TRIAGE_BACKEND_API_KEY") {
            self.backend.api_key = secret_value(value);
        }
        if let Some(value) = read_env("TRIAGE_BACKEND_MODEL") {
            self.backend.model = value;
        }
        if let Some(value) = read_env("TRIAGE_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("TRIAGE_BACKEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TRIAGE_BOOTSTRAP_ENABLED") {
            self.bootstrap.enabled = parse_bool("TRIAGE_BOOTSTRAP_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TRIAGE_BOOTSTRAP_HOST") {
            self.bootstrap.host = value;
        }
        if let Some(value) = read_env("TRIAGE_BOOTSTRAP_PORT") {
            self.bootstrap.port = parse_u16("TRIAGE_BOOTSTRAP_PORT", &value)?;
        }
        if let Some(value) = read_env("TRIAGE_BOOTSTRAP_MAX_WAIT_SECS") {
            self.bootstrap.max_wait_secs = parse_u64("TRIAGE_BOOTSTRAP_MAX_WAIT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIAGE_BOOTSTRAP_EXECUTABLE") {
            self.bootstrap.executable = value;
        }

        let log_level = read_env("TRIAGE_LOGGING_LEVEL").or_else(|| read_env("TRIAGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TRIAGE_LOGGING_FORMAT").or_else(|| read_env("TRIAGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.backend_base_url {
            self.backend.base_url = base_url;
        }
        if let Some(api_key) = overrides.backend_api_key {
            self.backend.api_key = secret_value(api_key);
        }
        if let Some(model) = overrides.backend_model {
            self.backend.model = model;
        }
        if let Some(enabled) = overrides.bootstrap_enabled {
            self.bootstrap.enabled = enabled;
        }
        if let Some(host) = overrides.bootstrap_host {
            self.bootstrap.host = host;
        }
        if let Some(port) = overrides.bootstrap_port {
            self.bootstrap.port = port;
        }
        if let Some(max_wait_secs) = overrides.bootstrap_max_wait_secs {
            self.bootstrap.max_wait_secs = max_wait_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    /// Readiness checks and the launcher must target the server `base_url` names, so any
    /// unpinned half of the bootstrap address is taken from the URL.
    fn resolve_bootstrap_address(&mut self, pins: AddressPins) -> Result<(), ConfigError> {
        let Some((host, port)) = url_authority(&self.backend.base_url) else {
            return Err(ConfigError::Validation(
                "backend.base_url must be an http:// or https:// URL with a host".to_string(),
            ));
        };

        if !pins.host {
            self.bootstrap.host = host;
        }
        if !pins.port {
            self.bootstrap.port = port;
        } else if self.bootstrap.port != port {
            return Err(ConfigError::Validation(format!(
                "bootstrap.port {} does not match the port of backend.base_url ({port}); \
                 set both or leave bootstrap.port unset",
                self.bootstrap.port
            )));
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend(&self.backend)?;
        validate_bootstrap(&self.bootstrap)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The file `AppConfig::load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("triage.toml"), PathBuf::from("config/triage.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

/// Host and port named by an `http(s)://[user@]host[:port]/...` URL.
fn url_authority(url: &str) -> Option<(String, u16)> {
    let url = url.trim();
    let (rest, default_port) = match url.strip_prefix("https://") {
        Some(rest) => (rest, 443),
        None => (url.strip_prefix("http://")?, 80),
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    let (host, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let (host, tail) = bracketed.split_once(']')?;
            (host, tail.strip_prefix(':'))
        }
        None => match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        },
    };

    if host.is_empty() {
        return None;
    }
    let port = match port {
        Some(port) => port.parse::<u16>().ok()?,
        None => default_port,
    };
    Some((host.to_string(), port))
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let base_url = backend.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "backend.base_url must start with http:// or https://".to_string(),
        ));
    }

    // Local servers accept any bearer token, but it must not be empty.
    if backend.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "backend.api_key must be non-empty (local servers accept any value, e.g. `local-anything`)"
                .to_string(),
        ));
    }

    if backend.model.trim().is_empty() {
        return Err(ConfigError::Validation("backend.model is required".to_string()));
    }

    if backend.timeout_secs == 0 || backend.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "backend.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_bootstrap(bootstrap: &BootstrapConfig) -> Result<(), ConfigError> {
    if bootstrap.host.trim().is_empty() {
        return Err(ConfigError::Validation("bootstrap.host is required".to_string()));
    }

    if bootstrap.port == 0 {
        return Err(ConfigError::Validation(
            "bootstrap.port must be greater than zero".to_string(),
        ));
    }

    if bootstrap.max_wait_secs == 0 {
        return Err(ConfigError::Validation(
            "bootstrap.max_wait_secs must be greater than zero".to_string(),
        ));
    }

    if bootstrap.probe_timeout_ms == 0 || bootstrap.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "bootstrap.probe_timeout_ms and bootstrap.poll_interval_ms must be greater than zero"
                .to_string(),
        ));
    }

    if bootstrap.enabled && bootstrap.executable.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bootstrap.executable is required when bootstrap is enabled".to_string(),
        ));
    }

    if !bootstrap.health_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "bootstrap.health_path must start with `/`".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backend: Option<BackendPatch>,
    bootstrap: Option<BootstrapPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BootstrapPatch {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    max_wait_secs: Option<u64>,
    probe_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    executable: Option<String>,
    args: Option<Vec<String>>,
    health_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
