//! Capability handlers and the registry that matches messages to them.
//!
//! - `scoring`: pure intent-pattern scoring
//! - `capability`: `CapabilityHandler` trait and `BoxHandler` wrapper
//! - `registry`: `HandlerRegistry` with threshold and tie-break rules
//! - `stubs`: audit-time listing of uncovered intents

pub mod capability;
pub mod registry;
pub mod scoring;
pub mod stubs;
