//! Shared domain types for Concierge.
//!
//! This crate contains the types passed between the dispatcher, the handler
//! registry and the provider router: requests and responses, provider
//! profiles, usage records, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod llm;
pub mod usage;
