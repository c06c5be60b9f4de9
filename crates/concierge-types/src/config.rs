//! Configuration types for the dispatch and routing core.
//!
//! `ConciergeConfig` represents the top-level `config.toml`. Every field has
//! a default so an empty file (or no file at all) yields a working setup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::CapabilityTier;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConciergeConfig {
    /// Minimum registry score a handler needs to be selected.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Maximum estimated USD cost per request. Unset means no ceiling.
    #[serde(default)]
    pub budget_ceiling: Option<f64>,

    /// Response cache TTL in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "default_cache_shards")]
    pub cache_shards: usize,

    /// Locale written into requests that arrive without one.
    #[serde(default)]
    pub default_locale: Option<String>,

    #[serde(default)]
    pub complexity_thresholds: ComplexityThresholds,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_match_threshold() -> f64 {
    0.5
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    1024
}

fn default_cache_shards() -> usize {
    16
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            budget_ceiling: None,
            cache_ttl: default_cache_ttl(),
            cache_max_entries: default_cache_max_entries(),
            cache_shards: default_cache_shards(),
            default_locale: None,
            complexity_thresholds: ComplexityThresholds::default(),
            budget: BudgetConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            generation: GenerationConfig::default(),
            safety: SafetyConfig::default(),
            providers: Vec::new(),
        }
    }
}

/// Per-tier cutoffs for request classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityThresholds {
    /// Messages at least this long are `standard`.
    #[serde(default = "default_standard_min_chars")]
    pub standard_min_chars: usize,
    /// Messages at least this long are `complex`.
    #[serde(default = "default_complex_min_chars")]
    pub complex_min_chars: usize,
    /// Phrases that suggest multi-step reasoning. One raises a request to
    /// `standard`, two or more to `complex`.
    #[serde(default = "default_reasoning_cues")]
    pub reasoning_cues: Vec<String>,
}

fn default_standard_min_chars() -> usize {
    200
}

fn default_complex_min_chars() -> usize {
    800
}

fn default_reasoning_cues() -> Vec<String> {
    [
        "why",
        "explain",
        "compare",
        "analyze",
        "step by step",
        "pros and cons",
        "plan",
        "what if",
        "how should",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            standard_min_chars: default_standard_min_chars(),
            complex_min_chars: default_complex_min_chars(),
            reasoning_cues: default_reasoning_cues(),
        }
    }
}

/// Trailing-window spend control fed by the usage ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_budget_window")]
    pub window_seconds: u64,
    /// USD. When trailing spend exceeds this, non-safety requests are
    /// classified one tier lower.
    #[serde(default)]
    pub window_limit: Option<f64>,
}

fn default_budget_window() -> u64 {
    3600
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_budget_window(),
            window_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive failures must all fall inside this window to trip.
    #[serde(default = "default_cb_window")]
    pub window_seconds: u64,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cb_window() -> u64 {
    60
}

fn default_cooldown() -> u64 {
    30
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_seconds: default_cb_window(),
            cooldown_seconds: default_cooldown(),
        }
    }
}

/// Token bucket parameters, applied per (user, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity. `0` disables rate limiting.
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_rate_window")]
    pub window_seconds: u64,
}

fn default_requests_per_window() -> u32 {
    60
}

fn default_rate_window() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_seconds: default_rate_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for a single provider call.
    #[serde(default = "default_provider_call_ms")]
    pub provider_call_ms: u64,
    /// End-to-end budget for the whole fallback chain.
    #[serde(default)]
    pub request_deadline_ms: Option<u64>,
}

fn default_provider_call_ms() -> u64 {
    30_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_call_ms: default_provider_call_ms(),
            request_deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
        }
    }
}

/// Crisis keywords and degraded-mode templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_crisis_keywords")]
    pub crisis_keywords: Vec<String>,
    #[serde(default = "default_degraded_template")]
    pub degraded_template: String,
    /// Locale-specific overrides of `degraded_template`, keyed by language tag.
    #[serde(default)]
    pub degraded_templates: BTreeMap<String, String>,
}

fn default_crisis_keywords() -> Vec<String> {
    [
        "suicide",
        "kill myself",
        "end my life",
        "self harm",
        "hurt myself",
        "want to die",
        "overdose",
        "no reason to live",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_degraded_template() -> String {
    "I'm having trouble reaching my assistant services right now. Please try again in a few \
     minutes. If you are in crisis or danger, contact your local emergency number right away."
        .to_string()
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            crisis_keywords: default_crisis_keywords(),
            degraded_template: default_degraded_template(),
            degraded_templates: BTreeMap::new(),
        }
    }
}

/// Which adapter speaks to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompatible,
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub model: String,
    pub tier: CapabilityTier,
    #[serde(default = "default_quality")]
    pub quality: f64,
    /// USD per 1K input tokens. Falls back to the built-in pricing table.
    #[serde(default)]
    pub cost_per_1k_input: Option<f64>,
    #[serde(default)]
    pub cost_per_1k_output: Option<f64>,
    #[serde(default = "default_avg_latency")]
    pub avg_latency_ms: u64,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_quality() -> f64 {
    0.5
}

fn default_avg_latency() -> u64 {
    1000
}

fn default_enabled() -> bool {
    true
}
