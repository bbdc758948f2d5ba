//! Heuristic complexity classifier used to pick few-shot examples (spec §4.5
//! step 1: "estimated complexity of the user prompt (heuristic classifier
//! over prompt length + keyword density)").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Intermediate,
    Complex,
}

/// Operations and connective words whose presence in a prompt signals a
/// multi-step design (boolean ops, patterns, explicit multi-part phrasing).
const COMPLEX_KEYWORDS: &[&str] = &[
    "pattern", "array", "mirror", "fillet", "chamfer", "thread", "assembly",
    "constraint", "sweep", "loft", "shell", "revolve", "and then", "then add",
    "with a hole", "through its center",
];

const INTERMEDIATE_KEYWORDS: &[&str] = &[
    "hole", "cut", "subtract", "extrude", "pocket", "sketch", "boss", "pad",
];

/// Classify a user prompt into one of three complexity buckets by length
/// and keyword density. This is a heuristic, not a parser: it only decides
/// which few-shot example block the Planner is shown.
pub fn classify(prompt: &str) -> Complexity {
    let lower = prompt.to_lowercase();
    let word_count = lower.split_whitespace().count();
    let complex_hits = COMPLEX_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    let intermediate_hits = INTERMEDIATE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();

    if complex_hits >= 1 || word_count > 40 {
        Complexity::Complex
    } else if intermediate_hits >= 1 || word_count > 12 {
        Complexity::Intermediate
    } else {
        Complexity::Simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_single_shape_prompt_is_simple() {
        assert_eq!(classify("Create a box 10x20x30 mm"), Complexity::Simple);
    }

    #[test]
    fn prompt_with_subtraction_is_intermediate() {
        assert_eq!(
            classify("Create a cube and cut a hole through the middle"),
            Complexity::Intermediate
        );
    }

    #[test]
    fn prompt_with_pattern_keyword_is_complex() {
        assert_eq!(
            classify("Create a plate with a circular pattern of 6 holes and a fillet"),
            Complexity::Complex
        );
    }

    #[test]
    fn long_prompt_is_complex_regardless_of_keywords() {
        let prompt = "make something ".repeat(10);
        assert_eq!(classify(&prompt), Complexity::Complex);
    }
}
