//! Candidate grouping: the common pre-step for every fusion strategy.
//!
//! Groups all successful backend outcomes by [`ResultKey`], retaining
//! the first-seen payload per key and recording every backend's score and
//! rank contribution. Groups come out in first-encountered order, which
//! later serves as the stable tie-break for equal fused scores.

use std::collections::HashMap;

use crate::fanout::BackendOutcome;
use crate::types::ResultKey;

/// One backend's contribution to a grouped candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    /// Index of the contributing backend in configuration order.
    pub backend: usize,
    /// Raw score the backend assigned.
    pub score: f64,
    /// 1-based rank the backend assigned.
    pub rank: usize,
}

/// A deduplicated candidate with all of its backend contributions.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Identity shared by all contributions.
    pub key: ResultKey,
    /// Payload of the first contribution seen for this key.
    pub payload: serde_json::Value,
    /// One entry per backend that returned this key, in encounter order.
    pub contributions: Vec<Contribution>,
}

impl Candidate {
    /// Number of backends that returned this candidate.
    pub fn votes(&self) -> usize {
        self.contributions.len()
    }

    /// Arithmetic mean of the raw contribution scores.
    ///
    /// Backends that did not return this key contribute nothing, not
    /// zero. Returns 0.0 for an (impossible) empty contribution list.
    pub fn mean_score(&self) -> f64 {
        if self.contributions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.contributions.iter().map(|c| c.score).sum();
        sum / self.contributions.len() as f64
    }
}

/// Group successful outcomes by `ResultKey`.
///
/// Failed outcomes contribute nothing. Output order is the order in
/// which keys were first encountered, scanning outcomes in backend
/// configuration order and each result list top to bottom.
pub fn group_by_key(outcomes: &[BackendOutcome]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut index_of: HashMap<ResultKey, usize> = HashMap::new();

    for (backend, outcome) in outcomes.iter().enumerate() {
        let Some(results) = outcome.results() else {
            continue;
        };
        for result in results {
            let contribution = Contribution {
                backend,
                score: result.score,
                rank: result.rank,
            };
            match index_of.get(&result.key) {
                Some(&slot) => candidates[slot].contributions.push(contribution),
                None => {
                    index_of.insert(result.key.clone(), candidates.len());
                    candidates.push(Candidate {
                        key: result.key.clone(),
                        payload: result.payload.clone(),
                        contributions: vec![contribution],
                    });
                }
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FusionError;
    use crate::retriever::testing::ranked;

    fn outcomes(lists: Vec<Vec<(&str, f64)>>) -> Vec<BackendOutcome> {
        lists
            .into_iter()
            .map(|list| BackendOutcome::Success(ranked(&list)))
            .collect()
    }

    #[test]
    fn unique_keys_pass_through() {
        let grouped = group_by_key(&outcomes(vec![
            vec![("a", 0.9)],
            vec![("b", 0.8)],
        ]));
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].votes(), 1);
        assert_eq!(grouped[1].votes(), 1);
    }

    #[test]
    fn duplicate_keys_merged_with_all_contributions() {
        let grouped = group_by_key(&outcomes(vec![
            vec![("shared", 0.9), ("a-only", 0.5)],
            vec![("shared", 0.7)],
        ]));

        assert_eq!(grouped.len(), 2);
        let shared = &grouped[0];
        assert_eq!(shared.key.source_id, "shared");
        assert_eq!(shared.votes(), 2);
        assert_eq!(shared.contributions[0].backend, 0);
        assert_eq!(shared.contributions[1].backend, 1);
        assert_eq!(shared.contributions[1].rank, 1);
    }

    #[test]
    fn first_seen_payload_retained() {
        let mut first = ranked(&[("shared", 0.9)]);
        first[0].payload = serde_json::json!({"origin": "first"});
        let mut second = ranked(&[("shared", 0.7)]);
        second[0].payload = serde_json::json!({"origin": "second"});

        let grouped = group_by_key(&[
            BackendOutcome::Success(first),
            BackendOutcome::Success(second),
        ]);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].payload["origin"], "first");
    }

    #[test]
    fn encounter_order_preserved() {
        let grouped = group_by_key(&outcomes(vec![
            vec![("x", 0.9), ("y", 0.8)],
            vec![("z", 0.95), ("x", 0.7)],
        ]));

        let order: Vec<&str> = grouped.iter().map(|c| c.key.source_id.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn failed_outcomes_contribute_nothing() {
        let grouped = group_by_key(&[
            BackendOutcome::Failure(FusionError::Backend("down".into())),
            BackendOutcome::Success(ranked(&[("a", 0.9)])),
        ]);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].contributions[0].backend, 1);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(group_by_key(&[]).is_empty());
        assert!(group_by_key(&[BackendOutcome::Success(vec![])]).is_empty());
    }

    #[test]
    fn mean_score_averages_contributions() {
        let grouped = group_by_key(&outcomes(vec![
            vec![("shared", 0.9)],
            vec![("shared", 0.7)],
        ]));
        assert!((grouped[0].mean_score() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn sub_keys_distinguish_chunks_of_one_source() {
        use crate::types::{ResultKey, ScoredResult};

        let results = vec![
            ScoredResult {
                key: ResultKey::with_sub_key("doc", "0"),
                score: 0.9,
                rank: 1,
                payload: serde_json::Value::Null,
            },
            ScoredResult {
                key: ResultKey::with_sub_key("doc", "1"),
                score: 0.8,
                rank: 2,
                payload: serde_json::Value::Null,
            },
        ];
        let grouped = group_by_key(&[BackendOutcome::Success(results)]);
        assert_eq!(grouped.len(), 2);
    }
}
