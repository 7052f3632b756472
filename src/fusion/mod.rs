//! Fusion strategies: merging per-backend ranked lists into one ranking.
//!
//! Every strategy shares the same pipeline — group by [`ResultKey`],
//! score each candidate, filter by the post-fusion threshold, stable-sort
//! descending, assign dense 1-based ranks, truncate to `top_k` — and
//! differs only in how a candidate's fused score is computed. Strategies
//! are trait objects so new ones slot in without touching a dispatch
//! switch.

pub mod grouping;
pub mod rank;
pub mod score;
pub mod voting;
pub mod weighted;

use crate::config::FusionConfig;
use crate::types::{FusedResult, FusionStrategyKind};

pub use grouping::{group_by_key, Candidate, Contribution};
pub use rank::RankFusion;
pub use score::ScoreFusion;
pub use voting::VotingFusion;
pub use weighted::WeightedScoreFusion;

/// Sizing and filtering parameters for one fuse call.
#[derive(Debug, Clone, Copy)]
pub struct FuseParams {
    /// Maximum number of fused results.
    pub top_k: usize,
    /// Post-fusion minimum fused score, applied before truncation.
    pub score_threshold: Option<f64>,
}

/// A pluggable fusion strategy.
///
/// Implementations provide [`fused_score`](FusionStrategy::fused_score);
/// the shared [`fuse`](FusionStrategy::fuse) pipeline handles filtering,
/// ordering, ranking and truncation identically for all strategies.
pub trait FusionStrategy: Send + Sync {
    /// Compute the fused score for one grouped candidate.
    ///
    /// `weights` holds the normalised per-backend weights in backend
    /// configuration order; contributions carry the backend index to
    /// look them up.
    fn fused_score(&self, candidate: &Candidate, weights: &[f64]) -> f64;

    /// Fuse grouped candidates into a ranked list of at most
    /// `params.top_k` results.
    ///
    /// The sort is stable: candidates with equal fused scores keep the
    /// order in which their keys were first encountered during grouping.
    /// Empty input yields an empty list.
    fn fuse(
        &self,
        candidates: Vec<Candidate>,
        weights: &[f64],
        params: &FuseParams,
    ) -> Vec<FusedResult> {
        let mut fused: Vec<FusedResult> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.fused_score(&candidate, weights);
                FusedResult {
                    key: candidate.key,
                    score,
                    rank: 0, // assigned after sorting
                    payload: candidate.payload,
                }
            })
            .collect();

        if let Some(threshold) = params.score_threshold {
            fused.retain(|result| result.score >= threshold);
        }

        // sort_by is stable, so ties preserve grouping encounter order.
        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        fused.truncate(params.top_k);

        for (position, result) in fused.iter_mut().enumerate() {
            result.rank = position + 1;
        }
        fused
    }
}

/// Instantiate the strategy selected by `config`.
pub fn strategy_for(config: &FusionConfig) -> Box<dyn FusionStrategy> {
    match config.strategy {
        FusionStrategyKind::ScoreFusion => Box::new(ScoreFusion),
        FusionStrategyKind::RankFusion => Box::new(RankFusion { k: config.rrf_k }),
        FusionStrategyKind::WeightedScore => Box::new(WeightedScoreFusion),
        FusionStrategyKind::Voting => Box::new(VotingFusion {
            score_weight: config.vote_score_weight,
        }),
    }
}
