//! Provider abstractions and cost-aware routing.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider adapters
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `ProviderHealth`: per-provider circuit breaker
//! - `ComplexityClassifier`: maps a message to a capability tier
//! - `ProviderRouter`: chain selection, failover and degraded mode

pub mod box_provider;
pub mod complexity;
pub mod cost;
pub mod health;
pub mod provider;
pub mod router;
