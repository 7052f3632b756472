//! Trait definition for pluggable retrieval backends.
//!
//! Each backend (a vector store client, a keyword index, another fusion
//! engine) implements [`Retriever`] to provide a uniform interface for
//! ranked retrieval. The trait is object-safe so the engine can hold
//! heterogeneous backends as `Arc<dyn Retriever>` and implement the trait
//! itself for nesting.

use async_trait::async_trait;

use crate::error::FusionError;
use crate::types::ScoredResult;

/// Opaque metadata filter forwarded to backends untouched.
pub type MetadataFilter = serde_json::Map<String, serde_json::Value>;

/// A pluggable ranked-retrieval backend.
///
/// Implementations must uphold the ranking invariant: returned results
/// are sorted descending by `score`, with `rank` contiguous from 1, and
/// `key` unique within one response.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `top_k` ranked results for a query.
    ///
    /// `score_threshold` is a minimum-score pre-filter hint; `filter` is
    /// an opaque metadata filter the backend may apply or ignore.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Backend`] (or any other variant) if the
    /// backend cannot produce a ranking. Errors are contained by the
    /// fan-out coordinator and never abort sibling backends.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: Option<f64>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredResult>, FusionError>;

    /// Retrieve up to `top_k` items similar to an already-indexed item.
    ///
    /// `item_key` is the `source_id` of the probe item. Implementations
    /// may include the probe item itself; the fusion engine excludes it
    /// from fused output.
    async fn retrieve_similar_to(
        &self,
        item_key: &str,
        top_k: usize,
        score_threshold: Option<f64>,
    ) -> Result<Vec<ScoredResult>, FusionError>;

    /// Liveness probe. `true` means the backend expects to serve queries.
    async fn health_check(&self) -> bool;

    /// Short human-readable backend description, used in diagnostics.
    fn retriever_type(&self) -> String {
        "retriever".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ranked, MockRetriever};
    use super::*;
    use std::sync::Arc;

    #[test]
    fn retriever_is_object_safe() {
        fn assert_dyn(_: &dyn Retriever) {}
        let mock = MockRetriever::returning(vec![]);
        assert_dyn(&mock);
    }

    #[test]
    fn retriever_usable_behind_arc() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<dyn Retriever>>();
    }

    #[tokio::test]
    async fn mock_retriever_returns_ranked_results() {
        let mock = MockRetriever::returning(ranked(&[("a", 0.9), ("b", 0.7)]));
        let results = mock
            .retrieve("query", 10, None, None)
            .await
            .expect("should succeed");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn mock_retriever_respects_top_k() {
        let mock = MockRetriever::returning(ranked(&[("a", 0.9), ("b", 0.7), ("c", 0.5)]));
        let results = mock
            .retrieve("query", 2, None, None)
            .await
            .expect("should succeed");
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn mock_retriever_propagates_errors() {
        let mock = MockRetriever::failing("index unavailable");
        let err = mock.retrieve("query", 10, None, None).await.unwrap_err();
        assert!(err.to_string().contains("index unavailable"));
        assert!(!mock.health_check().await);
    }
}
