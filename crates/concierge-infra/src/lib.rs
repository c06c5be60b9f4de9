//! Infrastructure layer for Concierge.
//!
//! Contains implementations of the collaborator traits defined in
//! `concierge-core`: HTTP provider adapters, SHA-256 request fingerprints,
//! config-driven safety content, plus TOML config loading and the built-in
//! pricing table.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod safety;
