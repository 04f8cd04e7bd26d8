use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use triage_core::errors::RouterError;

use crate::llm::{ChatBackend, ChatMessage, ChatRequest, OutputSchema};
use crate::registry::AgentDescriptor;

pub const HOMEWORK_KEYWORDS: [&str; 11] = [
    "homework",
    "assignment",
    "problem set",
    "pset",
    "quiz",
    "exam",
    "worksheet",
    "take-home",
    "due",
    "question 1",
    "q1",
];

pub const NO_MATCH_REASONING: &str = "no homework-related keywords detected";

/// Structured classification produced by a homework guardrail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkCheck {
    pub is_homework: bool,
    pub reasoning: String,
}

impl HomeworkCheck {
    pub fn output_schema() -> OutputSchema {
        OutputSchema {
            name: "homework_check".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "is_homework": {"type": "boolean"},
                    "reasoning": {"type": "string"}
                },
                "required": ["is_homework", "reasoning"],
                "additionalProperties": false
            }),
        }
    }
}

/// Outcome of one guardrail run. Fields are read-only once produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailVerdict {
    guardrail: String,
    blocked: bool,
    info: HomeworkCheck,
}

impl GuardrailVerdict {
    pub fn new(guardrail: impl Into<String>, blocked: bool, info: HomeworkCheck) -> Self {
        Self { guardrail: guardrail.into(), blocked, info }
    }

    pub fn guardrail(&self) -> &str {
        &self.guardrail
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn info(&self) -> &HomeworkCheck {
        &self.info
    }

    pub fn reasoning(&self) -> &str {
        &self.info.reasoning
    }
}

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;
    async fn evaluate(&self, input: &str) -> Result<GuardrailVerdict, RouterError>;
}

/// Case-insensitive substring match against an ordered phrase list.
///
/// Matching is not word-bounded: `"due"` also matches inside `"residue"`.
/// That false-positive source is kept deliberately for compatibility.
#[derive(Clone, Debug)]
pub struct KeywordGuardrail {
    name: String,
    phrases: Vec<String>,
}

impl KeywordGuardrail {
    pub fn new<I, S>(name: impl Into<String>, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            phrases: phrases.into_iter().map(|phrase| phrase.into().to_lowercase()).collect(),
        }
    }

    pub fn homework() -> Self {
        Self::new("homework_keywords", HOMEWORK_KEYWORDS)
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn check(&self, input: &str) -> GuardrailVerdict {
        let lower = input.to_lowercase();
        let matched = self
            .phrases
            .iter()
            .filter(|phrase| lower.contains(phrase.as_str()))
            .map(String::as_str)
            .collect::<Vec<_>>();

        let is_homework = !matched.is_empty();
        let reasoning = if is_homework {
            format!("keyword match: {}", matched.join(", "))
        } else {
            NO_MATCH_REASONING.to_string()
        };

        GuardrailVerdict::new(&self.name, is_homework, HomeworkCheck { is_homework, reasoning })
    }
}

#[async_trait]
impl Guardrail for KeywordGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, input: &str) -> Result<GuardrailVerdict, RouterError> {
        Ok(self.check(input))
    }
}

/// Asks a classifier agent for a [`HomeworkCheck`] instead of matching keywords.
pub struct AgentGuardrail {
    agent: AgentDescriptor,
    backend: Arc<dyn ChatBackend>,
}

impl AgentGuardrail {
    pub fn new(agent: AgentDescriptor, backend: Arc<dyn ChatBackend>) -> Self {
        Self { agent, backend }
    }
}

#[async_trait]
impl Guardrail for AgentGuardrail {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn evaluate(&self, input: &str) -> Result<GuardrailVerdict, RouterError> {
        let request = ChatRequest {
            model: self.agent.model().to_string(),
            messages: vec![
                ChatMessage::system(self.agent.instructions()),
                ChatMessage::user(input),
            ],
            tools: Vec::new(),
            output_schema: Some(
                self.agent.output_schema().cloned().unwrap_or_else(HomeworkCheck::output_schema),
            ),
        };

        let backend_failure = |message: String| RouterError::BackendFailure {
            agent: self.agent.name().to_string(),
            message,
        };

        let response = self
            .backend
            .complete(request)
            .await
            .map_err(|error| backend_failure(error.to_string()))?;
        let content = response
            .content
            .ok_or_else(|| backend_failure("classifier returned no content".to_string()))?;
        let info = serde_json::from_str::<HomeworkCheck>(content.trim()).map_err(|error| {
            backend_failure(format!("classifier output did not match schema: {error}"))
        })?;

        Ok(GuardrailVerdict::new(self.agent.name(), info.is_homework, info))
    }
}

#[cfg(test)]
mod tests {
    use super::{Guardrail, KeywordGuardrail, NO_MATCH_REASONING};

    #[test]
    fn homework_question_is_blocked_with_matches_in_declared_order() {
        let verdict =
            KeywordGuardrail::homework().check("Can you help me with question 1 of my homework?");

        assert!(verdict.blocked());
        assert!(verdict.info().is_homework);
        assert_eq!(verdict.reasoning(), "keyword match: homework, question 1");
    }

    #[test]
    fn history_question_passes() {
        let verdict =
            KeywordGuardrail::homework().check("who was the first president of the united states?");

        assert!(!verdict.blocked());
        assert_eq!(verdict.reasoning(), NO_MATCH_REASONING);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let verdict = KeywordGuardrail::homework().check("My EXAM is on Friday");

        assert!(verdict.blocked());
        assert_eq!(verdict.reasoning(), "keyword match: exam");
    }

    #[test]
    fn matching_is_substring_not_word_bounded() {
        let verdict = KeywordGuardrail::homework().check("What residue does burning wood leave?");

        assert!(verdict.blocked());
        assert_eq!(verdict.reasoning(), "keyword match: due");
    }

    #[test]
    fn overlapping_phrases_are_all_reported() {
        let verdict = KeywordGuardrail::homework().check("pset q1 take-home");

        assert_eq!(verdict.reasoning(), "keyword match: pset, take-home, q1");
    }

    #[test]
    fn custom_phrases_are_normalized_to_lower_case() {
        let guardrail = KeywordGuardrail::new("custom", ["Secret Plan"]);

        assert_eq!(guardrail.phrases(), ["secret plan".to_string()]);
        assert!(guardrail.check("the SECRET PLAN is ready").blocked());
    }

    #[tokio::test]
    async fn async_contract_matches_sync_check() {
        let guardrail = KeywordGuardrail::homework();
        let verdict = guardrail.evaluate("worksheet help").await.expect("keyword guardrail");

        assert_eq!(verdict, guardrail.check("worksheet help"));
        assert_eq!(verdict.guardrail(), "homework_keywords");
    }
}
