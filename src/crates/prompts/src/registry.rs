//! Stateless, in-memory prompt template store (spec §4.4).
//!
//! Prompt text itself is out of scope (spec §1: "Prompt text corpora ...
//! treated as opaque strings pulled from a named template registry"), so
//! this module ships a minimal built-in placeholder corpus: enough for the
//! agents to build well-formed requests and for tests to exercise the
//! (role, complexity) lookup and versioning machinery, not production copy.

use crate::complexity::Complexity;
use llm::AgentRole;
use std::collections::HashMap;

/// One block of prompt material for a given (role, complexity) key.
#[derive(Debug, Clone)]
pub struct PromptBlock {
    /// Included in audit events so prompt regressions can be traced back to
    /// a specific template revision (spec §4.4).
    pub version: String,
    pub system_prompt: String,
    pub few_shot: Vec<String>,
    pub reference: Option<String>,
}

impl PromptBlock {
    fn new(version: &str, system_prompt: &str, few_shot: Vec<&str>, reference: Option<&str>) -> Self {
        Self {
            version: version.to_string(),
            system_prompt: system_prompt.to_string(),
            few_shot: few_shot.into_iter().map(str::to_string).collect(),
            reference: reference.map(str::to_string),
        }
    }
}

/// Serves system prompt + few-shot examples + reference material for a
/// given (agent role, task complexity) key.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    blocks: HashMap<(AgentRole, Complexity), PromptBlock>,
    /// CAD API reference fragments keyed by operation name, used by the
    /// Generator (spec §4.6 step 2: "CAD API reference fragment relevant
    /// to the node's operation").
    api_reference: HashMap<String, String>,
}

impl PromptRegistry {
    /// Load the built-in corpus. Stateless after this call — no I/O, no
    /// refresh; a process restart is required to pick up new templates,
    /// matching spec §4.4 ("Stateless, in-memory after startup").
    pub fn load() -> Self {
        let mut blocks = HashMap::new();

        for complexity in [Complexity::Simple, Complexity::Intermediate, Complexity::Complex] {
            blocks.insert(
                (AgentRole::Planner, complexity),
                PromptBlock::new(
                    "planner-v1",
                    "You are the Planner agent in a CAD design pipeline. Convert the \
                     user's natural-language request into a task graph: a DAG of named \
                     CAD operations with parameters and dependencies. Respond with JSON \
                     only, matching the TaskGraph schema.",
                    vec![
                        "{\"nodes\":[{\"id\":\"n1\",\"operation\":\"create_box\",\
                         \"parameters\":{\"length\":10.0,\"width\":20.0,\"height\":30.0},\
                         \"dependencies\":[]}]}",
                    ],
                    None,
                ),
            );
            blocks.insert(
                (AgentRole::Generator, complexity),
                PromptBlock::new(
                    "generator-v1",
                    "You are the Generator agent. Convert one task graph node into a \
                     CAD script fragment using only whitelisted imports (FreeCAD, Part, \
                     PartDesign, Sketcher, Draft, Mesh, math). Name created objects with \
                     the node id as a prefix.",
                    vec!["Box001 = doc.addObject(\"Part::Box\", \"n1_box\")"],
                    None,
                ),
            );
            blocks.insert(
                (AgentRole::Validator, complexity),
                PromptBlock::new(
                    "validator-v1",
                    "You are the Validator agent. Score how well the created CAD objects \
                     match the original design intent, in [0,1], and list any issues. \
                     Respond with JSON only.",
                    vec!["{\"score\":0.92,\"issues\":[]}"],
                    None,
                ),
            );
        }

        let mut api_reference = HashMap::new();
        api_reference.insert(
            "create_box".to_string(),
            "Part::Box: length, width, height (mm). doc.addObject(\"Part::Box\", name)".to_string(),
        );
        api_reference.insert(
            "create_sketch".to_string(),
            "Sketcher::SketchObject: plane, geometry list.".to_string(),
        );
        api_reference.insert(
            "pad".to_string(),
            "PartDesign::Pad: Profile, Length, Reversed.".to_string(),
        );
        api_reference.insert(
            "pocket".to_string(),
            "PartDesign::Pocket: Profile, Length, Reversed.".to_string(),
        );
        api_reference.insert(
            "fillet".to_string(),
            "PartDesign::Fillet: Base edges, Radius.".to_string(),
        );
        api_reference.insert(
            "subtract_cylinder".to_string(),
            "Part::Cylinder subtracted via Part::Cut(Base, Tool).".to_string(),
        );

        Self { blocks, api_reference }
    }

    /// Look up the prompt block for an (role, complexity) key. Falls back
    /// to `Complexity::Simple` for the role if the exact key is somehow
    /// missing — every role/complexity pair is populated by `load()`, so
    /// this only matters if a caller constructs a registry by hand.
    pub fn get(&self, role: AgentRole, complexity: Complexity) -> &PromptBlock {
        self.blocks
            .get(&(role, complexity))
            .or_else(|| self.blocks.get(&(role, Complexity::Simple)))
            .expect("PromptRegistry::load populates every role")
    }

    /// CAD API reference fragment for one operation name, if known.
    pub fn api_reference(&self, operation: &str) -> Option<&str> {
        self.api_reference.get(operation).map(String::as_str)
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_a_simple_block() {
        let registry = PromptRegistry::load();
        for role in [AgentRole::Planner, AgentRole::Generator, AgentRole::Validator] {
            let block = registry.get(role, Complexity::Simple);
            assert!(!block.system_prompt.is_empty());
            assert!(!block.version.is_empty());
        }
    }

    #[test]
    fn api_reference_is_populated_for_core_operations() {
        let registry = PromptRegistry::load();
        assert!(registry.api_reference("create_box").is_some());
        assert!(registry.api_reference("nonexistent_op").is_none());
    }
}
