use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use triage_core::errors::RouterError;
use uuid::Uuid;

use crate::llm::{ChatBackend, ChatMessage, ChatRequest, ChatResponse, ToolSpec};
use crate::outcome::{InvocationInput, InvocationRequest, InvocationResult, RouteOutcome};
use crate::registry::{AgentDescriptor, AgentRegistry};

/// Gates input through the entry agent's guardrails, then follows
/// model-selected handoffs until an agent answers.
///
/// Holds no per-call state, so one router can serve concurrent `route` calls.
/// Dropping a `route` future abandons the in-flight backend call and no further
/// handoffs are attempted.
#[derive(Clone)]
pub struct TriageRouter {
    registry: Arc<AgentRegistry>,
    backend: Arc<dyn ChatBackend>,
}

enum Step<'a> {
    Answer(String),
    Handoff { target: &'a AgentDescriptor, preamble: Option<String> },
}

impl TriageRouter {
    pub fn new(registry: Arc<AgentRegistry>, backend: Arc<dyn ChatBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Routes `input` starting from the registry's root agent.
    pub async fn route_input(
        &self,
        input: impl Into<InvocationInput>,
    ) -> Result<RouteOutcome, RouterError> {
        let entry = self.registry.root_agent().name().to_string();
        self.route(InvocationRequest::new(entry, input)).await
    }

    pub async fn route(&self, request: InvocationRequest) -> Result<RouteOutcome, RouterError> {
        let correlation_id = Uuid::new_v4().to_string();
        let entry = self.registry.resolve(&request.entry_agent)?;

        info!(
            event_name = "agent.route.start",
            correlation_id = %correlation_id,
            agent = entry.name(),
            "routing request"
        );

        let guardrail_text = request.input.guardrail_text();
        for guardrail in entry.input_guardrails() {
            let verdict = guardrail.evaluate(&guardrail_text).await?;
            debug!(
                event_name = "agent.guardrail.evaluated",
                correlation_id = %correlation_id,
                guardrail = guardrail.name(),
                blocked = verdict.blocked(),
                reasoning = verdict.reasoning(),
                "guardrail evaluated"
            );
            if verdict.blocked() {
                info!(
                    event_name = "agent.guardrail.tripwire",
                    correlation_id = %correlation_id,
                    guardrail = guardrail.name(),
                    reasoning = verdict.reasoning(),
                    "input blocked by guardrail"
                );
                return Ok(RouteOutcome::Blocked(verdict));
            }
        }

        let mut context = request.input.into_messages();
        let mut chain = vec![entry.name().to_string()];
        let mut visited = HashSet::from([entry.name().to_string()]);
        let mut current = entry;

        loop {
            let targets = self.registry.handoff_targets(current)?;
            let chat_request = build_request(current, &targets, &context);

            let response = self.backend.complete(chat_request).await.map_err(|error| {
                warn!(
                    event_name = "agent.backend.failure",
                    correlation_id = %correlation_id,
                    agent = current.name(),
                    error = %error,
                    "backend call failed"
                );
                RouterError::BackendFailure {
                    agent: current.name().to_string(),
                    message: error.to_string(),
                }
            })?;

            match interpret(current, &targets, response)? {
                Step::Answer(final_output) => {
                    info!(
                        event_name = "agent.route.answered",
                        correlation_id = %correlation_id,
                        agent = current.name(),
                        hops = chain.len() - 1,
                        "agent produced final output"
                    );
                    return Ok(RouteOutcome::Answered(InvocationResult {
                        final_output,
                        last_agent: current.name().to_string(),
                        handoff_chain: chain,
                    }));
                }
                Step::Handoff { target, preamble } => {
                    if !visited.insert(target.name().to_string()) {
                        warn!(
                            event_name = "agent.handoff.cycle",
                            correlation_id = %correlation_id,
                            from = current.name(),
                            to = target.name(),
                            "handoff target already visited"
                        );
                        return Err(RouterError::HandoffCycle {
                            agent: target.name().to_string(),
                            chain,
                        });
                    }

                    info!(
                        event_name = "agent.handoff",
                        correlation_id = %correlation_id,
                        from = current.name(),
                        to = target.name(),
                        "handing off"
                    );
                    if let Some(preamble) = preamble {
                        context.push(ChatMessage::assistant(preamble));
                    }
                    chain.push(target.name().to_string());
                    current = target;
                }
            }
        }
    }
}

fn build_request(
    agent: &AgentDescriptor,
    targets: &[&AgentDescriptor],
    context: &[ChatMessage],
) -> ChatRequest {
    let mut system = agent.instructions().to_string();
    let tools = targets
        .iter()
        .map(|target| ToolSpec {
            name: target.transfer_tool_name(),
            description: handoff_tool_description(target),
        })
        .collect::<Vec<_>>();

    if !tools.is_empty() {
        system.push_str("\n\nYou can hand the conversation off to one of these agents:");
        for (target, tool) in targets.iter().zip(&tools) {
            system.push_str(&format!("\n- {} (call `{}`)", target.name(), tool.name));
            if let Some(description) = target.handoff_description() {
                system.push_str(&format!(": {description}"));
            }
        }
    }

    let mut messages = Vec::with_capacity(context.len() + 1);
    messages.push(ChatMessage::system(system));
    messages.extend_from_slice(context);

    ChatRequest {
        model: agent.model().to_string(),
        messages,
        tools,
        output_schema: agent.output_schema().cloned(),
    }
}

fn handoff_tool_description(target: &AgentDescriptor) -> String {
    match target.handoff_description() {
        Some(description) => {
            format!("Handoff to the {} agent to handle the request. {description}", target.name())
        }
        None => format!("Handoff to the {} agent to handle the request.", target.name()),
    }
}

fn interpret<'a>(
    agent: &AgentDescriptor,
    targets: &[&'a AgentDescriptor],
    response: ChatResponse,
) -> Result<Step<'a>, RouterError> {
    let malformed = |message: String| RouterError::BackendFailure {
        agent: agent.name().to_string(),
        message,
    };

    // Only the first tool call is honoured; an agent hands off to one target at a time.
    if let Some(call) = response.tool_calls.first() {
        let target = targets
            .iter()
            .copied()
            .find(|target| target.transfer_tool_name() == call.name)
            .ok_or_else(|| malformed(format!("model requested unknown handoff `{}`", call.name)))?;
        let preamble = response.content.filter(|content| !content.trim().is_empty());
        return Ok(Step::Handoff { target, preamble });
    }

    match response.content {
        Some(content) if !content.trim().is_empty() => Ok(Step::Answer(content)),
        _ => Err(malformed("model returned neither an answer nor a handoff".to_string())),
    }
}
