//! Fan-out coordinator: concurrent scatter/gather over retrieval backends.
//!
//! Issues the same logical request to every configured backend
//! concurrently, under one shared deadline for the whole phase, and
//! classifies each call as success or failure without ever letting one
//! backend's failure cancel its siblings. The returned outcomes preserve
//! backend configuration order regardless of completion order, so that
//! weight-to-backend mapping stays correct downstream.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::FusionError;
use crate::retriever::{MetadataFilter, Retriever};
use crate::types::ScoredResult;

/// What to ask each backend for.
#[derive(Debug, Clone, Copy)]
pub enum RetrievalMode<'a> {
    /// A fresh ranked-retrieval query.
    Query {
        /// Query text, forwarded verbatim.
        text: &'a str,
        /// Opaque metadata filter, forwarded verbatim.
        filter: Option<&'a MetadataFilter>,
    },
    /// "Similar to this already-indexed item."
    SimilarTo {
        /// `source_id` of the probe item.
        item_key: &'a str,
    },
}

/// Result of one backend's call within a fan-out.
#[derive(Debug)]
pub enum BackendOutcome {
    /// The backend returned a (possibly empty) ranked list.
    Success(Vec<ScoredResult>),
    /// The backend errored or missed the deadline. Contained here;
    /// fusion proceeds with the remaining backends.
    Failure(FusionError),
}

impl BackendOutcome {
    /// Returns the result list if this outcome is a success.
    pub fn results(&self) -> Option<&[ScoredResult]> {
        match self {
            Self::Success(results) => Some(results),
            Self::Failure(_) => None,
        }
    }

    /// Returns `true` if this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Fan a request out to all backends concurrently.
///
/// Each backend receives `per_backend_limit` and `score_threshold`. The
/// whole phase shares one timeout budget: a backend that has not
/// responded when the deadline expires yields a
/// [`FusionError::Timeout`] outcome while completed siblings keep their
/// results. Always returns exactly one outcome per backend, in the same
/// order as `backends`.
pub async fn fan_out(
    backends: &[Arc<dyn Retriever>],
    mode: RetrievalMode<'_>,
    per_backend_limit: usize,
    score_threshold: Option<f64>,
    timeout: Duration,
) -> Vec<BackendOutcome> {
    let deadline = Instant::now() + timeout;

    let calls = backends.iter().enumerate().map(|(index, backend)| {
        let backend = Arc::clone(backend);
        async move {
            let call = async {
                match mode {
                    RetrievalMode::Query { text, filter } => {
                        backend
                            .retrieve(text, per_backend_limit, score_threshold, filter)
                            .await
                    }
                    RetrievalMode::SimilarTo { item_key } => {
                        backend
                            .retrieve_similar_to(item_key, per_backend_limit, score_threshold)
                            .await
                    }
                }
            };
            match tokio::time::timeout_at(deadline, call).await {
                Ok(Ok(results)) => {
                    tracing::debug!(backend = index, count = results.len(), "backend returned");
                    BackendOutcome::Success(results)
                }
                Ok(Err(err)) => {
                    tracing::warn!(backend = index, error = %err, "backend query failed");
                    BackendOutcome::Failure(err)
                }
                Err(_) => {
                    // Debug-format the budget so sub-second values do
                    // not render as "0s".
                    let err = FusionError::Timeout(format!(
                        "backend {index} missed the {timeout:?} fan-out deadline"
                    ));
                    tracing::warn!(backend = index, error = %err, "backend timed out");
                    BackendOutcome::Failure(err)
                }
            }
        }
    });

    futures::future::join_all(calls).await
}
