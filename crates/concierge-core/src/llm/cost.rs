//! Cost estimation for routing decisions.
//!
//! Estimates are made before a call from character counts; actual cost is
//! computed afterwards from the token counts the adapter reports.

use concierge_types::llm::{CompletionRequest, ProviderProfile};

/// Rough token count for text that has not been tokenized yet.
///
/// Four characters per token, rounded up. Monotonic in input length.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4).min(u32::MAX as u64) as u32
}

/// Estimated USD cost of serving `request` with `profile`.
///
/// Input tokens are estimated from the prompt and system text; output is
/// assumed to use the full `max_tokens` allowance, so the estimate is an
/// upper bound on completion spend and is non-decreasing in input length.
pub fn calculate_estimated_cost(profile: &ProviderProfile, request: &CompletionRequest) -> f64 {
    let system_tokens = request.system.as_deref().map(estimate_tokens).unwrap_or(0);
    let input_tokens = estimate_tokens(&request.prompt).saturating_add(system_tokens);
    calculate_cost(profile, input_tokens, request.max_tokens)
}

/// USD cost for a known number of tokens.
pub fn calculate_cost(profile: &ProviderProfile, tokens_in: u32, tokens_out: u32) -> f64 {
    (tokens_in as f64 / 1000.0) * profile.cost_per_1k_input
        + (tokens_out as f64 / 1000.0) * profile.cost_per_1k_output
}
