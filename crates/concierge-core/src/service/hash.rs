//! ContentHasher trait for computing request fingerprints.
//!
//! Defined in concierge-core so the cache can fingerprint requests without
//! coupling to a specific hashing algorithm. The `Sha256ContentHasher`
//! adapter lives in concierge-infra.

/// Abstraction over content hashing.
///
/// Used by the response cache to turn a normalized prompt plus generation
/// parameters into a stable, provider-agnostic key.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
