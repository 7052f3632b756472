//! Weighted score fusion.
//!
//! Fused score is `Σ raw_score * backend_weight` over contributing
//! backends, with weights normalised to sum 1 by the engine. Lets a
//! trusted backend dominate without discarding the others.

use super::{Candidate, FusionStrategy};

/// Weight-scaled score sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScoreFusion;

impl FusionStrategy for WeightedScoreFusion {
    /// `weights` must hold one entry per configured backend, in backend
    /// order; the engine always passes its full normalised vector. A
    /// contribution whose backend index has no weight entry adds
    /// nothing.
    fn fused_score(&self, candidate: &Candidate, weights: &[f64]) -> f64 {
        candidate
            .contributions
            .iter()
            .map(|c| c.score * weights.get(c.backend).copied().unwrap_or(0.0))
            .sum()
    }
}
