use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use triage_core::errors::RegistryError;

use crate::guardrails::Guardrail;
use crate::llm::OutputSchema;

/// Static description of one agent. Handoff edges are stored by name and
/// resolved through the owning [`AgentRegistry`].
#[derive(Clone)]
pub struct AgentDescriptor {
    name: String,
    handoff_description: Option<String>,
    instructions: String,
    model: String,
    handoffs: Vec<String>,
    output_schema: Option<OutputSchema>,
    input_guardrails: Vec<Arc<dyn Guardrail>>,
}

impl AgentDescriptor {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            handoff_description: None,
            instructions: instructions.into(),
            model: model.into(),
            handoffs: Vec::new(),
            output_schema: None,
            input_guardrails: Vec::new(),
        }
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn with_handoffs<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_input_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn handoffs(&self) -> &[String] {
        &self.handoffs
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Guardrails run in declared order before this agent is invoked as an entry point.
    pub fn input_guardrails(&self) -> &[Arc<dyn Guardrail>] {
        &self.input_guardrails
    }

    /// Tool name offered to the model for handing off to this agent.
    pub fn transfer_tool_name(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for ch in self.name.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        format!("transfer_to_{}", slug.trim_matches('_'))
    }
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("handoff_description", &self.handoff_description)
            .field("model", &self.model)
            .field("handoffs", &self.handoffs)
            .field("output_schema", &self.output_schema.as_ref().map(|schema| &schema.name))
            .field(
                "input_guardrails",
                &self.input_guardrails.iter().map(|guardrail| guardrail.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Immutable name → agent mapping with eagerly validated handoff edges.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
    index: HashMap<String, usize>,
    root: usize,
}

impl AgentRegistry {
    pub fn new(agents: Vec<AgentDescriptor>, root: &str) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(agents.len());
        for (position, agent) in agents.iter().enumerate() {
            if index.insert(agent.name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateAgent { name: agent.name.clone() });
            }
        }

        for agent in &agents {
            if let Some(target) = agent.handoffs.iter().find(|target| !index.contains_key(*target))
            {
                return Err(RegistryError::UnknownHandoffTarget {
                    agent: agent.name.clone(),
                    target: target.clone(),
                });
            }
        }

        let root = *index
            .get(root)
            .ok_or_else(|| RegistryError::NotFound { name: root.to_string() })?;

        Ok(Self { agents, index, root })
    }

    pub fn resolve(&self, name: &str) -> Result<&AgentDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|position| &self.agents[*position])
            .ok_or_else(|| RegistryError::NotFound { name: name.to_string() })
    }

    pub fn root_agent(&self) -> &AgentDescriptor {
        &self.agents[self.root]
    }

    pub fn handoff_targets(
        &self,
        agent: &AgentDescriptor,
    ) -> Result<Vec<&AgentDescriptor>, RegistryError> {
        agent.handoffs.iter().map(|target| self.resolve(target)).collect()
    }

    /// Agents reachable from `start` through handoff edges, `start` included.
    pub fn reachable_from(&self, start: &str) -> Result<Vec<&AgentDescriptor>, RegistryError> {
        let mut seen = HashSet::new();
        let mut pending = vec![self.resolve(start)?];
        let mut reachable = Vec::new();

        while let Some(agent) = pending.pop() {
            if !seen.insert(agent.name()) {
                continue;
            }
            reachable.push(agent);
            pending.extend(self.handoff_targets(agent)?);
        }

        Ok(reachable)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use triage_core::errors::RegistryError;

    use super::{AgentDescriptor, AgentRegistry};
    use crate::guardrails::KeywordGuardrail;

    fn agent(name: &str) -> AgentDescriptor {
        AgentDescriptor::new(name, format!("You are {name}."), "test-model")
    }

    #[test]
    fn resolves_agents_and_root() {
        let registry = AgentRegistry::new(
            vec![agent("Math Tutor"), agent("Triage").with_handoffs(["Math Tutor"])],
            "Triage",
        )
        .expect("valid registry");

        assert_eq!(registry.root_agent().name(), "Triage");
        assert_eq!(registry.resolve("Math Tutor").expect("math").model(), "test-model");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unknown_handoff_target_fails_construction() {
        let result =
            AgentRegistry::new(vec![agent("Triage").with_handoffs(["Physics Tutor"])], "Triage");

        assert_eq!(
            result.err(),
            Some(RegistryError::UnknownHandoffTarget {
                agent: "Triage".to_string(),
                target: "Physics Tutor".to_string(),
            })
        );
    }

    #[test]
    fn duplicate_names_fail_construction() {
        let result = AgentRegistry::new(vec![agent("A"), agent("A")], "A");

        assert_eq!(result.err(), Some(RegistryError::DuplicateAgent { name: "A".to_string() }));
    }

    #[test]
    fn missing_root_is_not_found() {
        let result = AgentRegistry::new(vec![agent("A")], "Triage");

        assert_eq!(result.err(), Some(RegistryError::NotFound { name: "Triage".to_string() }));
    }

    #[test]
    fn resolve_unknown_name_is_not_found() {
        let registry = AgentRegistry::new(vec![agent("A")], "A").expect("valid registry");

        assert!(matches!(registry.resolve("B"), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn handoff_targets_keep_declared_order() {
        let registry = AgentRegistry::new(
            vec![agent("B"), agent("C"), agent("A").with_handoffs(["C", "B"])],
            "A",
        )
        .expect("valid registry");

        let targets = registry.handoff_targets(registry.root_agent()).expect("targets");
        let names = targets.iter().map(|agent| agent.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["C", "B"]);
    }

    #[test]
    fn reachable_set_terminates_on_cycles() {
        let registry = AgentRegistry::new(
            vec![
                agent("Entry").with_handoffs(["A"]),
                agent("A").with_handoffs(["B"]),
                agent("B").with_handoffs(["A"]),
                agent("Unreached"),
            ],
            "Entry",
        )
        .expect("cycles are representable");

        let reachable = registry.reachable_from("Entry").expect("reachable");
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn transfer_tool_names_are_snake_case() {
        assert_eq!(agent("Math Tutor").transfer_tool_name(), "transfer_to_math_tutor");
        assert_eq!(agent("Guardrail check").transfer_tool_name(), "transfer_to_guardrail_check");
        assert_eq!(agent("  Q&A -- Bot ").transfer_tool_name(), "transfer_to_q_a_bot");
    }

    #[test]
    fn debug_lists_guardrail_names() {
        let descriptor =
            agent("Triage").with_input_guardrail(Arc::new(KeywordGuardrail::homework()));

        assert!(format!("{descriptor:?}").contains("homework_keywords"));
    }
}
