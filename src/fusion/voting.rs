//! Voting fusion.
//!
//! Fused score is `votes + score_weight * mean_raw_score`, where `votes`
//! is the number of backends that returned the candidate. Agreement
//! across backends dominates; the raw-score term only breaks ties among
//! equally-agreed-upon candidates.

use super::{Candidate, FusionStrategy};

/// Agreement-count fusion with a raw-score tie-break.
#[derive(Debug, Clone, Copy)]
pub struct VotingFusion {
    /// Weight of the mean raw score relative to one vote. The historical
    /// value is 0.1, small enough that votes always dominate for scores
    /// in the usual 0..1 range.
    pub score_weight: f64,
}

impl Default for VotingFusion {
    fn default() -> Self {
        Self { score_weight: 0.1 }
    }
}

impl FusionStrategy for VotingFusion {
    fn fused_score(&self, candidate: &Candidate, _weights: &[f64]) -> f64 {
        candidate.votes() as f64 + self.score_weight * candidate.mean_score()
    }
}
