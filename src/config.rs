//! Engine configuration with sensible defaults.
//!
//! [`FusionConfig`] controls the active strategy, result sizing, the
//! fan-out timeout budget, and caching. Validation is eager: invalid
//! configurations are rejected at engine construction, never silently
//! corrected at retrieval time.

use crate::error::FusionError;
use crate::types::FusionStrategyKind;

/// Configuration for a [`crate::engine::FusionEngine`].
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Fusion strategy used to merge per-backend result lists.
    pub strategy: FusionStrategyKind,
    /// Default number of fused results returned by `retrieve` when the
    /// caller does not override it.
    pub top_k: usize,
    /// Multiplier applied to `top_k` for each per-backend request, so the
    /// fusion step has enough candidates to re-rank meaningfully.
    pub over_fetch_factor: usize,
    /// Default minimum fused score. Applied after fusion, before
    /// truncation; also forwarded to backends as a pre-filter hint.
    pub score_threshold: Option<f64>,
    /// RRF dampening constant `k` in `1/(k + rank)`.
    pub rrf_k: f64,
    /// Weight of the mean raw score in voting fusion
    /// (`votes + vote_score_weight * mean_score`). The historical value
    /// is 0.1; it is exposed here rather than hidden as a constant.
    pub vote_score_weight: f64,
    /// Timeout budget in seconds for the whole fan-out phase. Backends
    /// that have not responded by the deadline count as failed.
    pub timeout_seconds: u64,
    /// How long to cache fused results in seconds. 0 disables caching,
    /// keeping `retrieve` a pure function of its inputs.
    pub cache_ttl_seconds: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: FusionStrategyKind::RankFusion,
            top_k: 10,
            over_fetch_factor: 2,
            score_threshold: None,
            rrf_k: 60.0,
            vote_score_weight: 0.1,
            timeout_seconds: 8,
            cache_ttl_seconds: 0,
        }
    }
}

impl FusionConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `top_k` must be at least 1
    /// - `over_fetch_factor` must be at least 1
    /// - `timeout_seconds` must be greater than 0
    /// - `rrf_k` must be positive and finite
    /// - `vote_score_weight` must be non-negative and finite
    /// - `score_threshold`, if set, must be finite
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.top_k == 0 {
            return Err(FusionError::Config("top_k must be at least 1".into()));
        }
        if self.over_fetch_factor == 0 {
            return Err(FusionError::Config(
                "over_fetch_factor must be at least 1".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(FusionError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(FusionError::Config("rrf_k must be positive".into()));
        }
        if !self.vote_score_weight.is_finite() || self.vote_score_weight < 0.0 {
            return Err(FusionError::Config(
                "vote_score_weight must be non-negative".into(),
            ));
        }
        if let Some(threshold) = self.score_threshold {
            if !threshold.is_finite() {
                return Err(FusionError::Config("score_threshold must be finite".into()));
            }
        }
        Ok(())
    }

    /// Number of results requested from each backend for a fused `top_k`.
    pub fn per_backend_limit(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.over_fetch_factor)
    }
}
