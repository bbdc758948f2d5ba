//! Per-model pricing and process-wide cost/usage accounting (spec §4.1
//! "Cost & usage tracking").

use langgraph_core::llm::UsageMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::registry::AgentRole;

/// USD cost per 1,000 tokens, input and output priced separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    pub fn cost_of(&self, usage: &UsageMetadata) -> f64 {
        (usage.input_tokens as f64 / 1000.0) * self.input_per_1k
            + (usage.output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Static per-model pricing table. Unknown models cost nothing — the caller
/// is expected to keep this table current as new models enter the fallback
/// chains in `AgentModelRegistry`.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.entries.insert(model.into(), pricing);
        self
    }

    pub fn price_of(&self, model: &str) -> Option<ModelPricing> {
        self.entries.get(model).copied()
    }
}

/// A cumulative cost/token entry for one (model, role) pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Process-wide counter of LLM spend, keyed by `(model, role)` (spec §4.1).
///
/// A single `CostLedger` is constructed once and shared (behind an `Arc`)
/// across every agent call in the process, so accounting survives across
/// runs rather than resetting per-run.
#[derive(Debug, Default)]
pub struct CostLedger {
    pricing: PricingTable,
    entries: Mutex<HashMap<(String, AgentRole), LedgerEntry>>,
}

impl CostLedger {
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful call's usage. Called after every successful,
    /// non-streaming completion (spec §4.1: "After each successful call...").
    pub fn record(&self, model: &str, role: AgentRole, usage: &UsageMetadata) {
        let cost = self
            .pricing
            .price_of(model)
            .map(|p| p.cost_of(usage))
            .unwrap_or(0.0);

        let mut entries = self.entries.lock().expect("cost ledger mutex poisoned");
        let entry = entries.entry((model.to_string(), role)).or_default();
        entry.calls += 1;
        entry.input_tokens += usage.input_tokens as u64;
        entry.output_tokens += usage.output_tokens as u64;
        entry.cost_usd += cost;
    }

    pub fn snapshot(&self) -> HashMap<(String, AgentRole), LedgerEntry> {
        self.entries.lock().expect("cost ledger mutex poisoned").clone()
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.entries
            .lock()
            .expect("cost ledger mutex poisoned")
            .values()
            .map(|e| e.cost_usd)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_computes_weighted_cost() {
        let pricing = ModelPricing::new(0.005, 0.015);
        let usage = UsageMetadata::new(1000, 1000);
        assert!((pricing.cost_of(&usage) - 0.02).abs() < 1e-9);
    }

    #[test]
    fn ledger_accumulates_across_calls() {
        let table = PricingTable::new().with_model("gpt-4o", ModelPricing::new(0.005, 0.015));
        let ledger = CostLedger::new(table);
        ledger.record("gpt-4o", AgentRole::Planner, &UsageMetadata::new(1000, 1000));
        ledger.record("gpt-4o", AgentRole::Planner, &UsageMetadata::new(500, 500));

        let snapshot = ledger.snapshot();
        let entry = snapshot
            .get(&("gpt-4o".to_string(), AgentRole::Planner))
            .unwrap();
        assert_eq!(entry.calls, 2);
        assert_eq!(entry.input_tokens, 1500);
        assert!((entry.cost_usd - 0.03).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_costs_nothing() {
        let ledger = CostLedger::new(PricingTable::new());
        ledger.record("mystery-model", AgentRole::Validator, &UsageMetadata::new(100, 100));
        assert_eq!(ledger.total_cost_usd(), 0.0);
    }
}
