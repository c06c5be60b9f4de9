//! Usage accounting types recorded per provider call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One provider call. Append-only once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider_id: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// USD.
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl UsageRecord {
    pub fn success(provider_id: impl Into<String>, tokens_in: u32, tokens_out: u32, cost: f64) -> Self {
        Self {
            provider_id: provider_id.into(),
            tokens_in,
            tokens_out,
            cost,
            timestamp: Utc::now(),
            success: true,
        }
    }

    pub fn failure(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            tokens_in: 0,
            tokens_out: 0,
            cost: 0.0,
            timestamp: Utc::now(),
            success: false,
        }
    }
}

/// Per-provider aggregate over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

/// Aggregated usage over a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub window_seconds: u64,
    pub since: Option<DateTime<Utc>>,
    pub providers: BTreeMap<String, ProviderUsage>,
    pub total_cost: f64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
}
