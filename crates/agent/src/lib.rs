//! Agent orchestration for tutor triage.
//!
//! A request flows through:
//! 1. **Guardrails** (`guardrails`) - keyword or classifier checks that can block input
//!    before any generation happens
//! 2. **Registry** (`registry`) - immutable agent roster with validated handoff edges
//! 3. **Routing** (`runtime`) - the entry agent picks a specialist through handoff tools;
//!    cycles are refused
//! 4. **Outcome** (`outcome`) - an answer, or a blocked verdict for the caller to explain
//!
//! The chat backend is a collaborator behind [`llm::ChatBackend`]; `openai` provides
//! the HTTP implementation for OpenAI-compatible local servers.

pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod outcome;
pub mod registry;
pub mod runtime;
pub mod tutors;

pub use guardrails::{AgentGuardrail, Guardrail, GuardrailVerdict, HomeworkCheck, KeywordGuardrail};
pub use llm::{BackendError, ChatBackend, ChatMessage, ChatRequest, ChatResponse};
pub use openai::OpenAiCompatClient;
pub use outcome::{InvocationInput, InvocationRequest, InvocationResult, RouteOutcome};
pub use registry::{AgentDescriptor, AgentRegistry};
pub use runtime::TriageRouter;
