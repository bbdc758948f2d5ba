//! The prompt registry (spec §4.4): a stateless, in-memory, (role,
//! complexity)-keyed store of system prompts, few-shot examples, and CAD
//! API reference fragments for the Planner/Generator/Validator agents.

pub mod complexity;
pub mod registry;

pub use complexity::{classify, Complexity};
pub use registry::{PromptBlock, PromptRegistry};
