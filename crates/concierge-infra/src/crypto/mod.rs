//! Hashing for Concierge.
//!
//! - `hash`: SHA-256 request fingerprints for the response cache

pub mod hash;
