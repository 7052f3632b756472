//! In-memory TTL cache for fused results.
//!
//! Each engine owns its own [`FusionCache`] instance, so cached rankings
//! never leak between engines that happen to share a configuration but
//! query different backends. Keys combine the trimmed query with a
//! configuration fingerprint, so a reconfigured engine never serves
//! stale rankings either. Uses [`moka`] for async-friendly caching with
//! TTL and automatic eviction. Disabled unless the engine's
//! `cache_ttl_seconds` is non-zero, so fused retrieval stays a pure
//! function of its inputs by default.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::types::FusedResult;

/// Maximum number of cached fused result sets per engine.
const MAX_CACHE_ENTRIES: u64 = 100;

/// A single engine's cache of fused result lists.
#[derive(Debug)]
pub struct FusionCache {
    inner: Cache<CacheKey, Vec<FusedResult>>,
}

impl FusionCache {
    /// Build a cache whose entries expire after `ttl_seconds`.
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build(),
        }
    }

    /// Look up cached fused results for the given key.
    ///
    /// Returns `Some(results)` on cache hit, `None` on miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<FusedResult>> {
        self.inner.get(key).await
    }

    /// Insert fused results into the cache.
    pub async fn insert(&self, key: CacheKey, results: Vec<FusedResult>) {
        self.inner.insert(key, results).await;
    }
}

/// Composite cache key: query text + engine configuration fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Trimmed query string. Deliberately not lowercased: backends may
    /// be case-sensitive rankers.
    query: String,
    /// Hash covering everything that changes the fused output: strategy,
    /// sizing, thresholds, strategy constants, backend count, weights.
    fingerprint: u64,
}

impl CacheKey {
    /// Build a deterministic cache key from a query and a configuration
    /// fingerprint (see [`fingerprint`]).
    pub fn new(query: &str, fingerprint: u64) -> Self {
        Self {
            query: query.trim().to_string(),
            fingerprint,
        }
    }
}

/// Hash the fusion-relevant configuration into a cache fingerprint.
///
/// Any difference in strategy name, `top_k`, threshold, strategy
/// constants, or the normalised weight vector must produce a different
/// fingerprint, so reconfigured engines never serve stale rankings.
pub fn fingerprint(
    strategy: &str,
    top_k: usize,
    score_threshold: Option<f64>,
    rrf_k: f64,
    vote_score_weight: f64,
    weights: &[f64],
) -> u64 {
    let mut hasher = DefaultHasher::new();
    strategy.hash(&mut hasher);
    top_k.hash(&mut hasher);
    score_threshold.map(f64::to_bits).hash(&mut hasher);
    rrf_k.to_bits().hash(&mut hasher);
    vote_score_weight.to_bits().hash(&mut hasher);
    weights.len().hash(&mut hasher);
    for weight in weights {
        weight.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
