//! Collaborator services the core consumes through traits.
//!
//! Concrete implementations live in concierge-infra.

pub mod hash;
