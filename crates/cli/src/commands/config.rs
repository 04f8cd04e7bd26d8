use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use triage_core::config::{resolve_config_path, AppConfig, LoadOptions};

use crate::commands::{load_config, CommandResult};

struct Sources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let path = resolve_config_path(options.config_path.as_deref());
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let sources = Sources { doc: load_config_file_doc(path.as_deref()), path };
    CommandResult { exit_code: 0, output: render(&config, &sources) }
}

fn render(config: &AppConfig, sources: &Sources) -> String {
    let backend = &config.backend;
    let bootstrap = &config.bootstrap;

    let rows: [(&str, String, &[&str]); 13] = [
        ("backend.base_url", backend.base_url.clone(), &["TRIAGE_BACKEND_BASE_URL"]),
        (
            "backend.api_key",
            redact_token(backend.api_key.expose_secret()),
            &["TRIAGE_BACKEND_API_KEY"],
        ),
        ("backend.model", backend.model.clone(), &["TRIAGE_BACKEND_MODEL"]),
        (
            "backend.timeout_secs",
            backend.timeout_secs.to_string(),
            &["TRIAGE_BACKEND_TIMEOUT_SECS"],
        ),
        ("bootstrap.enabled", bootstrap.enabled.to_string(), &["TRIAGE_BOOTSTRAP_ENABLED"]),
        ("bootstrap.host", bootstrap.host.clone(), &["TRIAGE_BOOTSTRAP_HOST"]),
        ("bootstrap.port", bootstrap.port.to_string(), &["TRIAGE_BOOTSTRAP_PORT"]),
        (
            "bootstrap.max_wait_secs",
            bootstrap.max_wait_secs.to_string(),
            &["TRIAGE_BOOTSTRAP_MAX_WAIT_SECS"],
        ),
        ("bootstrap.executable", bootstrap.executable.clone(), &["TRIAGE_BOOTSTRAP_EXECUTABLE"]),
        ("bootstrap.args", bootstrap.args.join(" "), &[]),
        ("bootstrap.health_path", bootstrap.health_path.clone(), &[]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["TRIAGE_LOGGING_LEVEL", "TRIAGE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TRIAGE_LOGGING_FORMAT", "TRIAGE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in rows {
        let mut source = field_source(key_path, env_keys, sources);
        if source == "default" && matches!(key_path, "bootstrap.host" | "bootstrap.port") {
            source = "derived (backend.base_url)".to_string();
        }
        lines.push(render_line(key_path, &value, source));
    }
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], sources: &Sources) -> String {
    // Blank variables are ignored by the loader, so they are not a source either.
    let env_key = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &sources.doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_prefix() {
        assert_eq!(redact_token("sk-secret-value"), "sk-***");
        assert_eq!(redact_token("local-anything"), "local-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_file_doc() {
        let doc: Value = "[bootstrap]\nport = 12000\n".parse().expect("valid toml");

        assert!(contains_path(&doc, "bootstrap.port"));
        assert!(!contains_path(&doc, "bootstrap.host"));
        assert!(!contains_path(&doc, "backend.model"));
    }
}
