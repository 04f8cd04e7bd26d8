pub mod commands;
pub mod logging;
pub mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use triage_core::config::LoadOptions;

use crate::session::GuardrailMode;

#[derive(Debug, Parser)]
#[command(
    name = "triage",
    about = "Tutor triage CLI",
    long_about = "Route questions to tutor agents through a local inference server, with a homework guardrail in front.",
    after_help = "Examples:\n  triage ask \"who was the first president of the united states?\"\n  triage demo\n  triage doctor --json\n  triage config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this TOML file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start the backend if needed, then route one question through triage")]
    Ask {
        #[arg(help = "Question to route")]
        text: String,
        #[arg(long, value_enum, default_value = "keyword")]
        guardrail: GuardrailMode,
    },
    #[command(about = "Route the two sample prompts and print each outcome")]
    Demo {
        #[arg(long, value_enum, default_value = "keyword")]
        guardrail: GuardrailMode,
    },
    #[command(about = "Validate config and check backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration with source attribution and redaction")]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            load_dotenv: true,
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Ask { text, guardrail } => commands::ask::run(options, &text, guardrail),
        Command::Demo { guardrail } => commands::demo::run(options, guardrail),
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
