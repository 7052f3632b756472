//! Integration tests for the fusion engine pipeline.
//!
//! These tests exercise the full fan-out → group → fuse → rank pipeline
//! through the public API using scripted backends (no network, no real
//! vector stores).

use std::sync::Arc;

use async_trait::async_trait;
use retrieval_fusion::{
    FusedResult, FusionConfig, FusionEngine, FusionError, FusionStrategyKind, MetadataFilter,
    Result, ResultKey, Retriever, ScoredResult,
};

/// A scripted backend returning a fixed ranked list, or failing.
struct FixedBackend {
    results: Vec<ScoredResult>,
    fail: bool,
}

impl FixedBackend {
    fn returning(results: &[(&str, f64)]) -> Arc<dyn Retriever> {
        Arc::new(Self {
            results: make_ranked(results),
            fail: false,
        })
    }

    fn failing() -> Arc<dyn Retriever> {
        Arc::new(Self {
            results: vec![],
            fail: true,
        })
    }
}

fn make_ranked(results: &[(&str, f64)]) -> Vec<ScoredResult> {
    results
        .iter()
        .enumerate()
        .map(|(i, (id, score))| ScoredResult {
            key: ResultKey::new(*id),
            score: *score,
            rank: i + 1,
            payload: serde_json::json!({ "source": id }),
        })
        .collect()
}

#[async_trait]
impl Retriever for FixedBackend {
    async fn retrieve(
        &self,
        _query: &str,
        top_k: usize,
        _score_threshold: Option<f64>,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredResult>> {
        if self.fail {
            return Err(FusionError::Backend("scripted failure".into()));
        }
        Ok(self.results.iter().take(top_k).cloned().collect())
    }

    async fn retrieve_similar_to(
        &self,
        _item_key: &str,
        top_k: usize,
        _score_threshold: Option<f64>,
    ) -> Result<Vec<ScoredResult>> {
        if self.fail {
            return Err(FusionError::Backend("scripted failure".into()));
        }
        Ok(self.results.iter().take(top_k).cloned().collect())
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }

    fn retriever_type(&self) -> String {
        if self.fail { "fixed_failing" } else { "fixed" }.to_string()
    }
}

fn engine(backends: Vec<Arc<dyn Retriever>>, strategy: FusionStrategyKind) -> FusionEngine {
    let config = FusionConfig {
        strategy,
        ..Default::default()
    };
    FusionEngine::with_uniform_weights(backends, config).expect("valid engine")
}

fn keys(results: &[FusedResult]) -> Vec<&str> {
    results.iter().map(|r| r.key.source_id.as_str()).collect()
}

#[tokio::test]
async fn rrf_end_to_end_scenario() {
    // Backend A: keyA rank 1, keyB rank 2.
    // Backend B: keyB rank 1, keyC rank 2.
    // RRF with k=60: keyB gains 1/62 + 1/61 and must beat keyA (1/61),
    // which beats keyC (1/62).
    let engine = engine(
        vec![
            FixedBackend::returning(&[("keyA", 0.9), ("keyB", 0.8)]),
            FixedBackend::returning(&[("keyB", 0.95), ("keyC", 0.5)]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let fused = engine.retrieve("query", 3, None, None).await.expect("ok");

    assert_eq!(keys(&fused), vec!["keyB", "keyA", "keyC"]);
    assert_eq!(fused[0].rank, 1);
    assert_eq!(fused[1].rank, 2);
    assert_eq!(fused[2].rank, 3);

    let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
    assert!((fused[0].score - expected_b).abs() < 1e-12);
}

#[tokio::test]
async fn score_fusion_dedup_averages_exactly() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("shared", 0.9)]),
            FixedBackend::returning(&[("shared", 0.7)]),
        ],
        FusionStrategyKind::ScoreFusion,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");

    // One entry at exactly 0.8, never two entries.
    assert_eq!(fused.len(), 1);
    assert!((fused[0].score - 0.8).abs() < f64::EPSILON);
}

#[tokio::test]
async fn fused_output_sorted_non_increasing() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("a", 0.9), ("b", 0.7), ("c", 0.5)]),
            FixedBackend::returning(&[("c", 0.8), ("d", 0.6)]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    for i in 1..fused.len() {
        assert!(
            fused[i - 1].score >= fused[i].score,
            "results not sorted at position {i}"
        );
    }
}

#[tokio::test]
async fn cardinality_never_exceeds_top_k() {
    let many: Vec<(String, f64)> = (0..30)
        .map(|i| (format!("doc-{i}"), 1.0 - i as f64 * 0.01))
        .collect();
    let many_refs: Vec<(&str, f64)> = many.iter().map(|(id, s)| (id.as_str(), *s)).collect();

    let engine = engine(
        vec![FixedBackend::returning(&many_refs)],
        FusionStrategyKind::ScoreFusion,
    );

    let fused = engine.retrieve("query", 5, None, None).await.expect("ok");
    assert_eq!(fused.len(), 5);
    assert_eq!(fused.last().map(|r| r.rank), Some(5));
}

#[tokio::test]
async fn partial_failure_resilience_one_of_three_down() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("a", 0.9)]),
            FixedBackend::failing(),
            FixedBackend::returning(&[("b", 0.8)]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert_eq!(fused.len(), 2);
}

#[tokio::test]
async fn total_failure_surfaces_distinct_error() {
    let engine = engine(
        vec![FixedBackend::failing(), FixedBackend::failing()],
        FusionStrategyKind::RankFusion,
    );

    match engine.retrieve("query", 10, None, None).await {
        Err(FusionError::AllBackendsFailed(message)) => {
            assert!(message.contains("scripted failure"));
        }
        other => panic!("expected AllBackendsFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_backends_yield_empty_success() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[]),
            FixedBackend::returning(&[]),
        ],
        FusionStrategyKind::Voting,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert!(fused.is_empty());
}

#[tokio::test]
async fn score_threshold_bounds_every_fused_result() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("a", 0.9), ("b", 0.55), ("c", 0.1)]),
            FixedBackend::returning(&[("b", 0.65)]),
        ],
        FusionStrategyKind::ScoreFusion,
    );

    let fused = engine
        .retrieve("query", 10, Some(0.5), None)
        .await
        .expect("ok");

    assert!(!fused.is_empty());
    assert!(fused.iter().all(|r| r.score >= 0.5));
    assert!(keys(&fused).iter().all(|&k| k != "c"));
}

#[tokio::test]
async fn fusion_is_deterministic_across_invocations() {
    let build = || {
        engine(
            vec![
                FixedBackend::returning(&[("a", 0.9), ("b", 0.8), ("c", 0.7)]),
                FixedBackend::returning(&[("c", 0.95), ("a", 0.6), ("d", 0.5)]),
            ],
            FusionStrategyKind::RankFusion,
        )
    };

    let first = build().retrieve("query", 10, None, None).await.expect("ok");
    let second = build().retrieve("query", 10, None, None).await.expect("ok");

    assert_eq!(keys(&first), keys(&second));
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.rank, b.rank);
        assert!((a.score - b.score).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn voting_prefers_cross_backend_agreement() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("solo-top", 1.0), ("agreed", 0.4)]),
            FixedBackend::returning(&[("agreed", 0.3)]),
            FixedBackend::returning(&[("agreed", 0.2)]),
        ],
        FusionStrategyKind::Voting,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert_eq!(fused[0].key.source_id, "agreed");
    // 3 votes + small score term clearly beats 1 vote + 0.1.
    assert!(fused[0].score > 3.0);
    assert!(fused[1].score < 2.0);
}

#[tokio::test]
async fn weighted_score_respects_reweighting() {
    let backends: Vec<Arc<dyn Retriever>> = vec![
        FixedBackend::returning(&[("from-first", 0.6)]),
        FixedBackend::returning(&[("from-second", 0.9)]),
    ];
    let config = FusionConfig {
        strategy: FusionStrategyKind::WeightedScore,
        ..Default::default()
    };
    let engine = FusionEngine::with_uniform_weights(backends, config).expect("valid");

    // Uniform weights: 0.9 * 0.5 beats 0.6 * 0.5.
    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert_eq!(fused[0].key.source_id, "from-second");

    // Skew towards the first backend: 0.6 * 0.9 beats 0.9 * 0.1.
    engine.set_weights(&[9.0, 1.0]).expect("valid weights");
    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert_eq!(fused[0].key.source_id, "from-first");
}

#[tokio::test]
async fn payload_carried_through_untouched() {
    let engine = engine(
        vec![FixedBackend::returning(&[("doc-1", 0.9)])],
        FusionStrategyKind::RankFusion,
    );

    let fused = engine.retrieve("query", 10, None, None).await.expect("ok");
    assert_eq!(fused[0].payload["source"], "doc-1");
}

#[tokio::test]
async fn similar_to_pipeline_excludes_probe() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("probe", 1.0), ("near-1", 0.8)]),
            FixedBackend::returning(&[("near-2", 0.7), ("probe", 0.6)]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let fused = engine
        .retrieve_similar_to("probe", 10, None)
        .await
        .expect("ok");

    assert!(keys(&fused).iter().all(|&k| k != "probe"));
    assert_eq!(fused.len(), 2);
    assert_eq!(fused[0].rank, 1);
}

#[tokio::test]
async fn report_accounts_for_every_backend_in_order() {
    let engine = engine(
        vec![
            FixedBackend::returning(&[("a", 0.9)]),
            FixedBackend::failing(),
            FixedBackend::returning(&[]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let (_, report) = engine
        .retrieve_with_report("query", 10, None, None)
        .await
        .expect("ok");

    assert_eq!(report.backends.len(), 3);
    assert_eq!(report.contributing(), 2);
    assert_eq!(report.backends[0].index, 0);
    assert_eq!(report.backends[1].index, 1);
    assert_eq!(report.backends[2].index, 2);
    assert_eq!(report.backends[1].retriever_type, "fixed_failing");

    let json = serde_json::to_value(&report).expect("serializable");
    assert_eq!(json["backends"][1]["outcome"]["status"], "failed");
    assert_eq!(json["backends"][0]["outcome"]["status"], "contributed");
}

#[tokio::test]
async fn nested_engine_composes_with_plain_backends() {
    let inner = FusionEngine::with_uniform_weights(
        vec![
            FixedBackend::returning(&[("x", 0.9), ("y", 0.8)]),
            FixedBackend::returning(&[("y", 0.95)]),
        ],
        FusionConfig::default(),
    )
    .expect("inner");

    let outer = engine(
        vec![
            Arc::new(inner) as Arc<dyn Retriever>,
            FixedBackend::returning(&[("z", 0.7), ("y", 0.6)]),
        ],
        FusionStrategyKind::RankFusion,
    );

    let fused = outer.retrieve("query", 10, None, None).await.expect("ok");

    // "y" is first in the nested engine's fused ranking and second in
    // the plain backend's; it accumulates the most RRF mass.
    assert_eq!(fused[0].key.source_id, "y");
    assert_eq!(fused.len(), 3);
    assert!(outer.health_check().await);
}
