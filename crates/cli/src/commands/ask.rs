use triage_core::config::LoadOptions;

use crate::commands::{
    bootstrap_failure, build_runtime, load_config, render_outcome, router_failure, setup_failure,
    CommandResult,
};
use crate::logging;
use crate::session::{GuardrailMode, TutorSession};

pub fn run(options: LoadOptions, text: &str, mode: GuardrailMode) -> CommandResult {
    let config = match load_config("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config);

    let runtime = match build_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let session = match TutorSession::from_config(&config, mode) {
            Ok(session) => session,
            Err(error) => return setup_failure("ask", &error),
        };

        // Routing never starts against a backend that is not up.
        if let Err(error) = session.ensure_ready().await {
            return bootstrap_failure("ask", &error);
        }

        match session.ask(text).await {
            Ok(outcome) => match render_outcome(&outcome) {
                (true, message) => CommandResult::blocked("ask", message),
                (false, message) => CommandResult::success("ask", message),
            },
            Err(error) => router_failure("ask", &error),
        }
    })
}
