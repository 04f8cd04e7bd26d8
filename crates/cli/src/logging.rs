use tracing::Level;
use triage_core::config::{AppConfig, LogFormat};

/// Installs the fmt subscriber on stderr so stdout stays reserved for command output.
/// Later calls are no-ops.
pub fn init(config: &AppConfig) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level(config))
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn max_level(config: &AppConfig) -> Level {
    config.logging.level.trim().parse::<Level>().unwrap_or(Level::INFO)
}
