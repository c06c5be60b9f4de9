//! Observability setup for Concierge.
//!
//! - `tracing_setup`: subscriber installation and OpenTelemetry export

pub mod tracing_setup;
