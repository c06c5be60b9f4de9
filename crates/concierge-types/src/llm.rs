//! Provider-facing types for the routing core.
//!
//! These model the uniform adapter contract (`complete(prompt, max_tokens,
//! temperature)`), the priced provider profiles the router ranks, and the
//! errors adapters report back to the fallback chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality tier a provider is capable of serving, and the tier a request
/// is classified into.
///
/// Ordered: `Basic < Standard < Complex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityTier {
    Basic,
    Standard,
    Complex,
}

impl CapabilityTier {
    /// One tier cheaper, saturating at `Basic`.
    pub fn downgrade(self) -> Self {
        match self {
            CapabilityTier::Complex => CapabilityTier::Standard,
            CapabilityTier::Standard | CapabilityTier::Basic => CapabilityTier::Basic,
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityTier::Basic => write!(f, "basic"),
            CapabilityTier::Standard => write!(f, "standard"),
            CapabilityTier::Complex => write!(f, "complex"),
        }
    }
}

impl FromStr for CapabilityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(CapabilityTier::Basic),
            "standard" => Ok(CapabilityTier::Standard),
            "complex" => Ok(CapabilityTier::Complex),
            other => Err(format!("invalid capability tier: '{other}'")),
        }
    }
}

/// Request handed to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// What every adapter returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub latency_ms: u64,
}

/// Errors from provider adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("provider call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("context length exceeded: max {max}, requested {requested}")]
    ContextLengthExceeded { max: u32, requested: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// Whether the error is provider-side and transient.
    ///
    /// Transient errors advance the fallback chain and count toward the
    /// provider's circuit breaker. Everything else is a property of the
    /// request (or of our credentials) and only skips the provider for the
    /// current request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Provider { .. }
                | LlmError::Timeout { .. }
                | LlmError::RateLimited { .. }
                | LlmError::Overloaded(..)
                | LlmError::Deserialization(..)
        )
    }
}

/// Priced, tiered description of one configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub model: String,
    pub tier: CapabilityTier,
    /// Relative answer quality in `[0, 1]`, used to order providers of equal cost.
    pub quality: f64,
    /// USD per 1,000 prompt tokens.
    pub cost_per_1k_input: f64,
    /// USD per 1,000 completion tokens.
    pub cost_per_1k_output: f64,
    pub avg_latency_ms: u64,
    /// Reflects circuit-breaker state at the time the profile was read.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl ProviderProfile {
    /// Reject profiles that would break cost ordering.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("provider id must not be empty".to_string());
        }
        if !(self.cost_per_1k_input >= 0.0) || !(self.cost_per_1k_output >= 0.0) {
            return Err(format!(
                "provider '{}' has a negative or NaN cost ({} in / {} out)",
                self.id, self.cost_per_1k_input, self.cost_per_1k_output
            ));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(format!(
                "provider '{}' quality {} is outside [0, 1]",
                self.id, self.quality
            ));
        }
        Ok(())
    }
}

/// Ordered fallback chain for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tier: CapabilityTier,
    pub chain: Vec<ProviderProfile>,
    /// Estimated cost of serving the request with the first provider in the chain.
    pub estimated_cost: f64,
    /// No provider fit under the budget ceiling; the cheapest was kept anyway.
    pub over_budget: bool,
}

/// What happened when the router considered one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    CacheHit,
    CircuitOpen,
    RateLimited { retry_after_ms: u64 },
    TransientFailure { error: String },
    PermanentFailure { error: String },
    DeadlineExceeded,
}

/// One entry of the per-request failover trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider_id: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Health snapshot of a provider (for CLI and REST display).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusInfo {
    pub id: String,
    pub model: String,
    pub tier: CapabilityTier,
    /// One of "closed", "open", "half_open".
    pub circuit_state: String,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Human-readable time since last success (e.g., "2m ago").
    pub last_success_ago: Option<String>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(cost_in: f64, cost_out: f64) -> ProviderProfile {
        ProviderProfile {
            id: "p".to_string(),
            model: "m".to_string(),
            tier: CapabilityTier::Standard,
            quality: 0.5,
            cost_per_1k_input: cost_in,
            cost_per_1k_output: cost_out,
            avg_latency_ms: 100,
            available: true,
        }
    }

    #[test]
    fn tiers_are_ordered_by_capability() {
        assert!(CapabilityTier::Basic < CapabilityTier::Standard);
        assert!(CapabilityTier::Standard < CapabilityTier::Complex);
        assert_eq!(CapabilityTier::Complex.downgrade(), CapabilityTier::Standard);
        assert_eq!(CapabilityTier::Basic.downgrade(), CapabilityTier::Basic);
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Complex".parse::<CapabilityTier>(), Ok(CapabilityTier::Complex));
        assert!("premium".parse::<CapabilityTier>().is_err());
    }

    #[test]
    fn transient_classification() {
        assert!(LlmError::Provider { message: "502".into() }.is_transient());
        assert!(LlmError::Timeout { timeout_ms: 10 }.is_transient());
        assert!(LlmError::RateLimited { retry_after_ms: None }.is_transient());
        assert!(LlmError::Overloaded("busy".into()).is_transient());

        assert!(!LlmError::AuthenticationFailed.is_transient());
        assert!(!LlmError::InvalidRequest("bad".into()).is_transient());
        assert!(!LlmError::ContextLengthExceeded { max: 1, requested: 2 }.is_transient());
    }

    #[test]
    fn negative_costs_are_rejected() {
        assert!(profile(0.0, 0.0).validate().is_ok());
        assert!(profile(-0.1, 0.0).validate().is_err());
        assert!(profile(0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn attempt_serializes_flat() {
        let attempt = ProviderAttempt {
            provider_id: "openai".to_string(),
            outcome: AttemptOutcome::RateLimited { retry_after_ms: 250 },
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["provider_id"], "openai");
        assert_eq!(json["outcome"], "rate_limited");
        assert_eq!(json["retry_after_ms"], 250);
    }
}
