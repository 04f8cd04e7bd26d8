use std::sync::Arc;

use triage_core::errors::RegistryError;

use crate::guardrails::{AgentGuardrail, Guardrail, HomeworkCheck, KeywordGuardrail};
use crate::llm::ChatBackend;
use crate::registry::{AgentDescriptor, AgentRegistry};

pub const TRIAGE_AGENT: &str = "Triage Agent";
pub const MATH_TUTOR: &str = "Math Tutor";
pub const HISTORY_TUTOR: &str = "History Tutor";
pub const LOCAL_TUTOR: &str = "Local Tutor";
pub const GUARDRAIL_CHECK: &str = "Guardrail check";

pub fn guardrail_check_agent(model: &str) -> AgentDescriptor {
    AgentDescriptor::new(GUARDRAIL_CHECK, "Check if the user is asking about homework.", model)
        .with_output_schema(HomeworkCheck::output_schema())
}

pub fn math_tutor(model: &str) -> AgentDescriptor {
    AgentDescriptor::new(
        MATH_TUTOR,
        "You provide help with math problems. Explain your reasoning at each step and include examples",
        model,
    )
    .with_handoff_description("Specialist agent for math questions")
}

pub fn history_tutor(model: &str) -> AgentDescriptor {
    AgentDescriptor::new(
        HISTORY_TUTOR,
        "You provide assistance with historical queries. Explain important events and context clearly.",
        model,
    )
    .with_handoff_description("Specialist agent for historical questions")
}

pub fn local_tutor(model: &str) -> AgentDescriptor {
    AgentDescriptor::new(LOCAL_TUTOR, "Be helpful and show steps.", model)
        .with_handoff_description("Local OSS model via LiteLLM/Ollama")
}

pub fn triage_agent(model: &str, guardrail: Arc<dyn Guardrail>) -> AgentDescriptor {
    AgentDescriptor::new(
        TRIAGE_AGENT,
        "You determine which agent to use based on the user's homework question",
        model,
    )
    .with_handoffs([HISTORY_TUTOR, MATH_TUTOR, LOCAL_TUTOR])
    .with_input_guardrail(guardrail)
}

/// The stock roster with the keyword homework guardrail on the triage agent.
pub fn tutor_registry(model: &str) -> Result<AgentRegistry, RegistryError> {
    tutor_registry_with_guardrail(model, Arc::new(KeywordGuardrail::homework()))
}

/// The stock roster with the homework check delegated to the "Guardrail check" agent.
pub fn tutor_registry_with_classifier(
    model: &str,
    backend: Arc<dyn ChatBackend>,
) -> Result<AgentRegistry, RegistryError> {
    let classifier = AgentGuardrail::new(guardrail_check_agent(model), backend);
    tutor_registry_with_guardrail(model, Arc::new(classifier))
}

pub fn tutor_registry_with_guardrail(
    model: &str,
    guardrail: Arc<dyn Guardrail>,
) -> Result<AgentRegistry, RegistryError> {
    AgentRegistry::new(
        vec![
            guardrail_check_agent(model),
            math_tutor(model),
            history_tutor(model),
            local_tutor(model),
            triage_agent(model, guardrail),
        ],
        TRIAGE_AGENT,
    )
}
