//! Inbound dispatch types: the request, the match produced by intent
//! scoring, and the response envelope returned to callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::Intent;
use crate::llm::{CapabilityTier, ProviderAttempt};

/// Caller context supplied by the authentication/session layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchContext {
    pub user_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    /// The message carries user-specific data; its completion must never be cached.
    #[serde(default)]
    pub personalized: bool,
    /// Set upstream when the conversation is already known to be sensitive.
    #[serde(default)]
    pub safety_sensitive: bool,
    /// Free-form annotations written by middleware.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl DispatchContext {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            ..Default::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// One inbound message. Created per call, discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub id: Uuid,
    pub message: String,
    pub context: DispatchContext,
    pub received_at: DateTime<Utc>,
}

impl DispatchRequest {
    pub fn new(message: impl Into<String>, context: DispatchContext) -> Self {
        Self {
            id: Uuid::now_v7(),
            message: message.into(),
            context,
            received_at: Utc::now(),
        }
    }
}

/// Coarse bucket of a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            ConfidenceTier::High
        } else if score >= 0.6 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Best handler for a message, as produced by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub handler: String,
    /// Registration order of the handler, stable for the registry's lifetime.
    pub handler_index: usize,
    /// Always within `[0, 1]`.
    pub score: f64,
    pub confidence: ConfidenceTier,
    /// The pattern (as registered) that produced the score.
    pub matched_pattern: String,
}

/// Read-only view of a registered handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub name: String,
    pub intent: Intent,
    pub patterns: Vec<String>,
    pub priority: i32,
    pub registration_order: usize,
}

/// Which path produced a response. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum HandledBy {
    /// A middleware short-circuited the request (e.g. empty input).
    Middleware(String),
    Handler(String),
    Provider(String),
    Degraded,
}

impl fmt::Display for HandledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandledBy::Middleware(name) => write!(f, "middleware:{name}"),
            HandledBy::Handler(name) | HandledBy::Provider(name) => f.write_str(name),
            HandledBy::Degraded => f.write_str("degraded"),
        }
    }
}

/// Diagnostics attached to every response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<CapabilityTier>,
    #[serde(default)]
    pub safety_sensitive: bool,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub over_budget: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub latency_ms: u64,
}

/// The outbound result of `dispatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub handled_by: HandledBy,
    pub response: String,
    pub metadata: ResponseMetadata,
}

impl DispatchResponse {
    pub fn new(handled_by: HandledBy, response: impl Into<String>) -> Self {
        Self {
            handled_by,
            response: response.into(),
            metadata: ResponseMetadata::default(),
        }
    }
}

/// A completed exchange, handed to the persistence layer after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub request_id: Uuid,
    pub user_id: String,
    pub conversation_id: String,
    pub user_message: String,
    pub response: String,
    pub handled_by: HandledBy,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn from_exchange(request: &DispatchRequest, response: &DispatchResponse) -> Self {
        Self {
            request_id: request.id,
            user_id: request.context.user_id.clone(),
            conversation_id: request.context.conversation_id.clone(),
            user_message: request.message.clone(),
            response: response.response.clone(),
            handled_by: response.handled_by.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_buckets() {
        assert_eq!(ConfidenceTier::from_score(1.0), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.85), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.8), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.3), ConfidenceTier::Low);
    }

    #[test]
    fn handled_by_display_matches_external_contract() {
        assert_eq!(HandledBy::Handler("reminder_handler".into()).to_string(), "reminder_handler");
        assert_eq!(HandledBy::Provider("openai".into()).to_string(), "openai");
        assert_eq!(HandledBy::Degraded.to_string(), "degraded");
        assert_eq!(HandledBy::Middleware("sanitize".into()).to_string(), "middleware:sanitize");
    }

    #[test]
    fn handled_by_serializes_tagged() {
        let json = serde_json::to_value(HandledBy::Provider("anthropic".into())).unwrap();
        assert_eq!(json["kind"], "provider");
        assert_eq!(json["name"], "anthropic");
    }

    #[test]
    fn context_defaults_when_fields_missing() {
        let ctx: DispatchContext =
            serde_json::from_str(r#"{"user_id":"u1","conversation_id":"c1"}"#).unwrap();
        assert_eq!(ctx.user_id, "u1");
        assert!(ctx.locale.is_none());
        assert!(!ctx.personalized);
        assert!(ctx.tags.is_empty());
    }
}
