//! Top-level entry point: middleware, handler lookup, provider fallback.

pub mod dispatcher;
pub mod fallback;
pub mod middleware;
