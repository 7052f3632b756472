//! Average score fusion.
//!
//! Fused score is the arithmetic mean of the raw scores contributed by
//! each backend that returned the candidate. A cheap, interpretable
//! baseline that assumes backend scores are roughly comparable.

use super::{Candidate, FusionStrategy};

/// Arithmetic-mean score fusion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFusion;

impl FusionStrategy for ScoreFusion {
    fn fused_score(&self, candidate: &Candidate, _weights: &[f64]) -> f64 {
        candidate.mean_score()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{candidate, NO_LIMIT};
    use super::*;

    #[test]
    fn single_contribution_keeps_its_score() {
        let score = ScoreFusion.fused_score(&candidate("a", &[(0, 0.9, 1)]), &[1.0]);
        assert!((score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_across_backends_averages() {
        // 0.9 from one backend and 0.7 from another fuse to exactly 0.8.
        let score = ScoreFusion.fused_score(&candidate("a", &[(0, 0.9, 1), (1, 0.7, 2)]), &[0.5, 0.5]);
        assert!((score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_backends_contribute_nothing_not_zero() {
        // One backend at 0.9; the mean stays 0.9 regardless of how many
        // other backends exist.
        let score = ScoreFusion.fused_score(&candidate("a", &[(2, 0.9, 1)]), &[0.25, 0.25, 0.25, 0.25]);
        assert!((score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn dedup_yields_one_entry_not_two() {
        let candidates = vec![candidate("shared", &[(0, 0.9, 1), (1, 0.7, 1)])];
        let fused = ScoreFusion.fuse(candidates, &[0.5, 0.5], &NO_LIMIT);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.8).abs() < f64::EPSILON);
    }
}
