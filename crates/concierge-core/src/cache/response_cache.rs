//! Response cache for non-personalized completions.
//!
//! Entries are keyed by a provider-agnostic fingerprint and expire on TTL.
//! Capacity is bounded per shard with LRU eviction; each shard has its own
//! lock so unrelated fingerprints never contend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use concierge_types::llm::CompletionRequest;

use crate::service::hash::ContentHasher;

/// Stable cache key derived from normalized request content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a completion request.
    ///
    /// The prompt is whitespace-collapsed and lowercased; temperature is
    /// rounded to two decimals. The provider is deliberately not part of the
    /// key so any provider's answer can serve the next identical request.
    pub fn compute(hasher: &dyn ContentHasher, request: &CompletionRequest) -> Self {
        let canonical = format!(
            "prompt={}\nsystem={}\nmax_tokens={}\ntemperature={:.2}",
            normalize(&request.prompt),
            request.system.as_deref().map(normalize).unwrap_or_default(),
            request.max_tokens,
            request.temperature,
        );
        Self(hasher.compute_hash(&canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cached completion payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCompletion {
    pub text: String,
    /// Provider that originally produced the text.
    pub provider_id: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedCompletion,
    expires_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ResponseCache {
    shards: Vec<Mutex<LruCache<Fingerprint, CacheEntry>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_entries: usize, shards: usize, default_ttl: Duration) -> Self {
        let shard_count = shards.max(1);
        let per_shard =
            NonZeroUsize::new(max_entries.div_ceil(shard_count)).unwrap_or(NonZeroUsize::MIN);
        Self {
            shards: (0..shard_count)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn shard(&self, fingerprint: &Fingerprint) -> &Mutex<LruCache<Fingerprint, CacheEntry>> {
        let mut hasher = DefaultHasher::new();
        fingerprint.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Look up an entry. Expired entries are dropped and reported as a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CachedCompletion> {
        let mut shard = self.shard(fingerprint).lock();
        let now = Instant::now();
        let hit = match shard.get(fingerprint) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            _ => None,
        };
        if hit.is_none() {
            shard.pop(fingerprint);
        }
        drop(shard);

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %fingerprint.as_str(), "response cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Store an entry for `ttl`. A zero TTL stores nothing.
    pub fn put(&self, fingerprint: Fingerprint, value: CachedCompletion, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.shard(&fingerprint).lock().put(fingerprint, entry);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.shards.iter().map(|s| s.lock().len()).sum(),
        }
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("shards", &self.shards.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
