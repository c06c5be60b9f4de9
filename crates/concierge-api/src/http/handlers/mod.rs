//! REST API handler modules.

pub mod dispatch;
pub mod handler;
pub mod provider;
pub mod usage;
