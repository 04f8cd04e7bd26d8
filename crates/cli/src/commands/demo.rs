use triage_core::config::LoadOptions;

use crate::commands::{
    bootstrap_failure, build_runtime, load_config, render_outcome, router_failure, setup_failure,
    CommandResult,
};
use crate::logging;
use crate::session::{GuardrailMode, TutorSession};

pub const DEMO_PROMPTS: [&str; 2] =
    ["who was the first president of the united states?", "What is the meaning of life?"];

/// Routes each sample prompt in turn. Stops at the first routing failure.
pub fn run(options: LoadOptions, mode: GuardrailMode) -> CommandResult {
    let config = match load_config("demo", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config);

    let runtime = match build_runtime("demo") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let session = match TutorSession::from_config(&config, mode) {
            Ok(session) => session,
            Err(error) => return setup_failure("demo", &error),
        };
        if let Err(error) = session.ensure_ready().await {
            return bootstrap_failure("demo", &error);
        }

        let mut lines = Vec::new();
        for prompt in DEMO_PROMPTS {
            match session.ask(prompt).await {
                Ok(outcome) => {
                    let (_, message) = render_outcome(&outcome);
                    lines.push(format!("> {prompt}\n{message}"));
                }
                Err(error) => return router_failure("demo", &error),
            }
        }

        CommandResult::success("demo", lines.join("\n\n"))
    })
}
