//! Dispatch and provider-routing logic for Concierge.
//!
//! This crate defines the collaborator traits (provider adapters, safety
//! content, conversation log, content hashing) that the infrastructure layer
//! implements. It depends only on `concierge-types`, never on
//! `concierge-infra` or any network or storage crate.

pub mod cache;
pub mod dispatch;
pub mod handler;
pub mod llm;
pub mod rate_limit;
pub mod repository;
pub mod safety;
pub mod service;
pub mod usage;
