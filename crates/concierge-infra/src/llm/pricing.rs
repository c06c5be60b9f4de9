//! Built-in pricing for providers whose config omits costs.
//!
//! Prices are approximate, expressed in USD per 1,000 tokens. Cost strings
//! shown to users are always labeled as estimates (`~$0.012`).

use concierge_types::config::ProviderConfig;

struct PricingEntry {
    model_pattern: &'static str,
    input_per_1k: f64,
    output_per_1k: f64,
}

/// Conservative fallback when no pattern matches.
const FALLBACK_INPUT_PER_1K: f64 = 0.005;
const FALLBACK_OUTPUT_PER_1K: f64 = 0.015;

/// Ordered most specific first: `gpt-4o-mini` must win over `gpt-4o`.
const PRICING_TABLE: &[PricingEntry] = &[
    PricingEntry { model_pattern: "claude-opus-4", input_per_1k: 0.015, output_per_1k: 0.075 },
    PricingEntry { model_pattern: "claude-sonnet-4", input_per_1k: 0.003, output_per_1k: 0.015 },
    PricingEntry { model_pattern: "claude-haiku", input_per_1k: 0.00025, output_per_1k: 0.00125 },
    PricingEntry { model_pattern: "gpt-4o-mini", input_per_1k: 0.00015, output_per_1k: 0.0006 },
    PricingEntry { model_pattern: "gpt-4o", input_per_1k: 0.0025, output_per_1k: 0.01 },
    PricingEntry { model_pattern: "gemini-2", input_per_1k: 0.00125, output_per_1k: 0.005 },
    PricingEntry { model_pattern: "mistral-large", input_per_1k: 0.002, output_per_1k: 0.006 },
    PricingEntry { model_pattern: "mistral-small", input_per_1k: 0.0002, output_per_1k: 0.0006 },
];

/// Per-1K `(input, output)` price for a model, matched by prefix.
pub fn lookup_pricing(model: &str) -> (f64, f64) {
    PRICING_TABLE
        .iter()
        .find(|entry| model.starts_with(entry.model_pattern))
        .map(|entry| (entry.input_per_1k, entry.output_per_1k))
        .unwrap_or((FALLBACK_INPUT_PER_1K, FALLBACK_OUTPUT_PER_1K))
}

/// Effective per-1K prices for a configured provider.
///
/// Explicit config values win; a missing side falls back to the table.
pub fn resolve_pricing(config: &ProviderConfig) -> (f64, f64) {
    let (table_in, table_out) = lookup_pricing(&config.model);
    (
        config.cost_per_1k_input.unwrap_or(table_in),
        config.cost_per_1k_output.unwrap_or(table_out),
    )
}

/// Format a cost estimate for display.
///
/// - Costs below $0.01 use 3 decimal places: `~$0.001`
/// - Costs $0.01 and above use 2 decimal places: `~$0.12`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}
