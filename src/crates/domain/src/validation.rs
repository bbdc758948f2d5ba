//! Output of the Validator agent (spec §3, §4.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One issue surfaced by a geometric, semantic, or LLM-review check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: Option<String>,
}

/// The Validator's PASS/REFINE/FAIL decision (spec §4.7 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationDecision {
    Pass,
    Refine,
    Fail,
}

impl ValidationDecision {
    /// overall ≥ 0.8 -> PASS (inclusive); overall < 0.4 -> FAIL (exclusive
    /// lower bound); else REFINE. Matches the boundary cases in spec §8
    /// exactly (0.8 passes, 0.4 refines).
    pub fn from_overall_score(overall: f64) -> Self {
        if overall >= 0.8 {
            ValidationDecision::Pass
        } else if overall < 0.4 {
            ValidationDecision::Fail
        } else {
            ValidationDecision::Refine
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub geometric_score: f64,
    pub semantic_score: f64,
    pub llm_review_score: f64,
    pub overall_score: f64,
    pub decision: ValidationDecision,
    pub issues: Vec<Issue>,
}

/// Weights from spec §3: geo 0.4, semantic 0.4, llm 0.2.
pub const GEOMETRIC_WEIGHT: f64 = 0.4;
pub const SEMANTIC_WEIGHT: f64 = 0.4;
pub const LLM_REVIEW_WEIGHT: f64 = 0.2;

impl ValidationResult {
    pub fn combine(
        geometric_score: f64,
        semantic_score: f64,
        llm_review_score: f64,
        mut issues: Vec<Issue>,
    ) -> Self {
        let overall = GEOMETRIC_WEIGHT * geometric_score
            + SEMANTIC_WEIGHT * semantic_score
            + LLM_REVIEW_WEIGHT * llm_review_score;

        // Top 5 issues across all three checks, sorted by severity (spec §4.7 step 6).
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        issues.truncate(5);

        Self {
            geometric_score,
            semantic_score,
            llm_review_score,
            overall_score: overall,
            decision: ValidationDecision::from_overall_score(overall),
            issues,
        }
    }
}
