use crate::guardrails::GuardrailVerdict;
use crate::llm::{ChatMessage, ChatRole};

/// Raw user input: a single message or an existing conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationInput {
    Text(String),
    Conversation(Vec<ChatMessage>),
}

impl InvocationInput {
    /// Text the guardrails inspect. For conversations this is every user turn, newline-joined.
    pub fn guardrail_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Conversation(messages) => messages
                .iter()
                .filter(|message| message.role == ChatRole::User)
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::Text(text) => vec![ChatMessage::user(text)],
            Self::Conversation(messages) => messages,
        }
    }
}

impl From<&str> for InvocationInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for InvocationInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    pub entry_agent: String,
    pub input: InvocationInput,
}

impl InvocationRequest {
    pub fn new(entry_agent: impl Into<String>, input: impl Into<InvocationInput>) -> Self {
        Self { entry_agent: entry_agent.into(), input: input.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationResult {
    pub final_output: String,
    /// Agent that produced `final_output`.
    pub last_agent: String,
    /// Entry agent followed by every handoff target, in order.
    pub handoff_chain: Vec<String>,
}

/// What a routed call produced. A blocked input is an expected outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Answered(InvocationResult),
    Blocked(GuardrailVerdict),
}

impl RouteOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn final_output(&self) -> Option<&str> {
        match self {
            Self::Answered(result) => Some(&result.final_output),
            Self::Blocked(_) => None,
        }
    }

    pub fn verdict(&self) -> Option<&GuardrailVerdict> {
        match self {
            Self::Answered(_) => None,
            Self::Blocked(verdict) => Some(verdict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InvocationInput, InvocationRequest};
    use crate::llm::ChatMessage;

    #[test]
    fn conversation_guardrail_text_only_includes_user_turns() {
        let input = InvocationInput::Conversation(vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("an answer mentioning homework"),
            ChatMessage::user("follow-up"),
        ]);

        assert_eq!(input.guardrail_text(), "first question\nfollow-up");
    }

    #[test]
    fn text_input_becomes_single_user_message() {
        let request = InvocationRequest::new("Triage Agent", "hello");

        assert_eq!(request.input.into_messages(), vec![ChatMessage::user("hello")]);
    }
}
