//! Reciprocal Rank Fusion (RRF).
//!
//! Fused score is `Σ 1/(k + rank)` over contributing backends. Scale-free:
//! only each backend's internal ordering matters, which makes RRF the
//! right default when backend score scales are incomparable.
//!
//! Reference: Cormack, Clarke & Buettcher (2009).

use super::{Candidate, FusionStrategy};

/// Reciprocal Rank Fusion over 1-based backend ranks.
#[derive(Debug, Clone, Copy)]
pub struct RankFusion {
    /// Dampening constant. Higher values flatten the influence of rank-1
    /// dominance; 60 is the standard value from the literature.
    pub k: f64,
}

impl Default for RankFusion {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl FusionStrategy for RankFusion {
    fn fused_score(&self, candidate: &Candidate, _weights: &[f64]) -> f64 {
        candidate
            .contributions
            .iter()
            .map(|c| 1.0 / (self.k + c.rank as f64))
            .sum()
    }
}
