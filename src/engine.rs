//! The fusion engine facade.
//!
//! [`FusionEngine`] owns the backend list, the normalised weight vector,
//! and the fusion configuration. It exposes the same retrieval contract
//! as a single backend ([`Retriever`]), so engines can stand in for
//! backends and nest.
//!
//! # Concurrency
//!
//! Backend list and weights are the only mutable shared state. They live
//! in an immutable snapshot behind an `RwLock<Arc<_>>`: every retrieval
//! clones the `Arc` once and works from a consistent snapshot, and every
//! mutation builds a new state value and swaps it in atomically. A
//! mutation during an in-flight retrieval therefore never produces a
//! fusion that mixes half-old, half-new configuration.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::{fingerprint, CacheKey, FusionCache};
use crate::config::FusionConfig;
use crate::error::{FusionError, Result};
use crate::fanout::{fan_out, BackendOutcome, RetrievalMode};
use crate::fusion::{group_by_key, strategy_for, FuseParams};
use crate::retriever::{MetadataFilter, Retriever};
use crate::types::{FusedResult, FusionStrategyKind, ScoredResult};

/// One configured backend: a retriever handle plus its normalised weight.
#[derive(Clone)]
pub struct BackendSpec {
    /// The backend retriever.
    pub retriever: Arc<dyn Retriever>,
    /// Normalised weight; the engine keeps all weights summing to 1.0.
    pub weight: f64,
}

impl std::fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSpec")
            .field("retriever", &self.retriever.retriever_type())
            .field("weight", &self.weight)
            .finish()
    }
}

/// Immutable engine state, swapped wholesale on every mutation.
#[derive(Debug, Clone)]
struct EngineState {
    backends: Vec<BackendSpec>,
    config: FusionConfig,
}

impl EngineState {
    fn weights(&self) -> Vec<f64> {
        self.backends.iter().map(|b| b.weight).collect()
    }

    fn retrievers(&self) -> Vec<Arc<dyn Retriever>> {
        self.backends
            .iter()
            .map(|b| Arc::clone(&b.retriever))
            .collect()
    }
}

/// Per-backend diagnostic entry for one retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct BackendReport {
    /// Backend index in configuration order.
    pub index: usize,
    /// Backend description from [`Retriever::retriever_type`].
    pub retriever_type: String,
    /// Normalised weight at the time of the call.
    pub weight: f64,
    /// What the backend did.
    pub outcome: BackendStatus,
}

/// Outcome classification for one backend within a retrieval.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    /// The backend returned this many results (possibly zero).
    Contributed {
        /// Number of results returned before fusion.
        results: usize,
    },
    /// The backend errored or timed out and was excluded from fusion.
    Failed {
        /// Display string of the contained error.
        error: String,
    },
}

/// Diagnostic trace of which backends contributed to a fused result set.
#[derive(Debug, Clone, Serialize)]
pub struct FusionReport {
    /// One entry per backend, in configuration order.
    pub backends: Vec<BackendReport>,
}

impl FusionReport {
    /// Number of backends that returned results.
    pub fn contributing(&self) -> usize {
        self.backends
            .iter()
            .filter(|b| matches!(b.outcome, BackendStatus::Contributed { .. }))
            .count()
    }
}

/// Serializable snapshot of the engine's configuration, for
/// introspection and liveness endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    /// Active fusion strategy.
    pub strategy: FusionStrategyKind,
    /// RRF dampening constant.
    pub rrf_k: f64,
    /// Voting tie-break weight.
    pub vote_score_weight: f64,
    /// Default fused result count.
    pub top_k: usize,
    /// Per-backend over-fetch multiplier.
    pub over_fetch_factor: usize,
    /// Number of configured backends.
    pub backend_count: usize,
    /// Per-backend description and weight, in configuration order.
    pub backends: Vec<BackendEntry>,
}

/// One backend's description within [`EngineInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct BackendEntry {
    /// Backend description from [`Retriever::retriever_type`].
    pub retriever_type: String,
    /// Normalised weight.
    pub weight: f64,
}

/// Multi-backend retrieval engine with pluggable fusion.
#[derive(Debug)]
pub struct FusionEngine {
    state: RwLock<Arc<EngineState>>,
    /// Engine-local fused-result cache. Never shared across engines, so
    /// two engines with identical configuration but different backends
    /// cannot serve each other's rankings. `None` when caching is
    /// disabled.
    cache: Option<FusionCache>,
}

impl FusionEngine {
    /// Create an engine from `(retriever, weight)` pairs.
    ///
    /// Weights are normalised to sum 1.0. Raw weights must be finite and
    /// non-negative, with at least one positive.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] if `backends` is empty, any weight
    /// is invalid, or `config` fails validation.
    pub fn new(backends: Vec<(Arc<dyn Retriever>, f64)>, config: FusionConfig) -> Result<Self> {
        config.validate()?;
        if backends.is_empty() {
            return Err(FusionError::Config(
                "at least one backend must be configured".into(),
            ));
        }
        let (retrievers, raw_weights): (Vec<_>, Vec<_>) = backends.into_iter().unzip();
        let weights = normalize_weights(&raw_weights)?;
        let backends = retrievers
            .into_iter()
            .zip(weights)
            .map(|(retriever, weight)| BackendSpec { retriever, weight })
            .collect();
        let cache = (config.cache_ttl_seconds > 0)
            .then(|| FusionCache::new(config.cache_ttl_seconds));
        Ok(Self {
            state: RwLock::new(Arc::new(EngineState { backends, config })),
            cache,
        })
    }

    /// Create an engine with uniform `1/N` weights.
    ///
    /// # Errors
    ///
    /// Same as [`FusionEngine::new`].
    pub fn with_uniform_weights(
        retrievers: Vec<Arc<dyn Retriever>>,
        config: FusionConfig,
    ) -> Result<Self> {
        let backends = retrievers.into_iter().map(|r| (r, 1.0)).collect();
        Self::new(backends, config)
    }

    fn snapshot(&self) -> Arc<EngineState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut EngineState) -> Result<()>,
    {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = EngineState::clone(&guard);
        apply(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    /// Retrieve a fused, deduplicated top-`top_k` list for a query.
    ///
    /// Fans the query out to every backend concurrently (each asked for
    /// `top_k * over_fetch_factor` results), fuses the per-backend
    /// rankings with the configured strategy, and returns the fused list.
    /// `score_threshold` overrides the configured default when given.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::AllBackendsFailed`] only if **every**
    /// backend fails or times out. Partial failures are logged and
    /// excluded; an empty result list is a valid, non-error outcome.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: Option<f64>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<FusedResult>> {
        let state = self.snapshot();
        let threshold = score_threshold.or(state.config.score_threshold);

        let cache_key = match &self.cache {
            Some(cache) if filter.is_none() => {
                let key = CacheKey::new(query, state_fingerprint(&state, top_k, threshold));
                if let Some(cached) = cache.get(&key).await {
                    tracing::debug!(count = cached.len(), "fusion cache hit");
                    return Ok(cached);
                }
                Some(key)
            }
            _ => None,
        };

        let mode = RetrievalMode::Query {
            text: query,
            filter,
        };
        let (fused, _report) = self.run(&state, mode, top_k, threshold).await?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, fused.clone()).await;
        }
        Ok(fused)
    }

    /// Retrieve using the engine's configured default `top_k`.
    ///
    /// # Errors
    ///
    /// Same as [`FusionEngine::retrieve`].
    pub async fn retrieve_with_defaults(&self, query: &str) -> Result<Vec<FusedResult>> {
        let top_k = self.snapshot().config.top_k;
        self.retrieve(query, top_k, None, None).await
    }

    /// Retrieve items similar to an already-indexed item.
    ///
    /// Same fan-out/fuse pipeline as [`FusionEngine::retrieve`], but each
    /// backend is asked for neighbours of `item_key`. Candidates whose
    /// `source_id` equals `item_key` (the probe item itself) are excluded
    /// from the fused output.
    ///
    /// # Errors
    ///
    /// Same as [`FusionEngine::retrieve`].
    pub async fn retrieve_similar_to(
        &self,
        item_key: &str,
        top_k: usize,
        score_threshold: Option<f64>,
    ) -> Result<Vec<FusedResult>> {
        let state = self.snapshot();
        let threshold = score_threshold.or(state.config.score_threshold);
        let mode = RetrievalMode::SimilarTo { item_key };
        let (fused, _report) = self.run(&state, mode, top_k, threshold).await?;
        Ok(fused)
    }

    /// Retrieve and also return the per-backend diagnostic report.
    ///
    /// The report lists, in configuration order, which backends
    /// contributed and with how many results, and which failed with what
    /// error. Always bypasses the cache so the report reflects this call.
    ///
    /// # Errors
    ///
    /// Same as [`FusionEngine::retrieve`].
    pub async fn retrieve_with_report(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: Option<f64>,
        filter: Option<&MetadataFilter>,
    ) -> Result<(Vec<FusedResult>, FusionReport)> {
        let state = self.snapshot();
        let threshold = score_threshold.or(state.config.score_threshold);
        let mode = RetrievalMode::Query {
            text: query,
            filter,
        };
        self.run(&state, mode, top_k, threshold).await
    }

    /// Shared fan-out → group → fuse pipeline.
    async fn run(
        &self,
        state: &EngineState,
        mode: RetrievalMode<'_>,
        top_k: usize,
        threshold: Option<f64>,
    ) -> Result<(Vec<FusedResult>, FusionReport)> {
        let exclude = match mode {
            RetrievalMode::SimilarTo { item_key } => Some(item_key.to_string()),
            RetrievalMode::Query { .. } => None,
        };

        let outcomes = fan_out(
            &state.retrievers(),
            mode,
            state.config.per_backend_limit(top_k),
            threshold,
            Duration::from_secs(state.config.timeout_seconds),
        )
        .await;

        let report = build_report(&state.backends, &outcomes);
        if report.contributing() == 0 {
            let errors: Vec<String> = report
                .backends
                .iter()
                .filter_map(|b| match &b.outcome {
                    BackendStatus::Failed { error } => Some(format!("{}: {error}", b.index)),
                    BackendStatus::Contributed { .. } => None,
                })
                .collect();
            return Err(FusionError::AllBackendsFailed(errors.join("; ")));
        }

        let mut candidates = group_by_key(&outcomes);
        if let Some(probe) = exclude {
            candidates.retain(|c| c.key.source_id != probe);
        }

        let params = FuseParams {
            top_k,
            score_threshold: threshold,
        };
        let fused = strategy_for(&state.config).fuse(candidates, &state.weights(), &params);
        Ok((fused, report))
    }

    /// Append a backend and renormalise weights incrementally.
    ///
    /// Existing weights (summing to 1) are scaled by `1/(1 + weight)` and
    /// the new backend gets `weight/(1 + weight)`, preserving the
    /// existing backends' relative proportions.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] if `weight` is negative or not
    /// finite.
    pub fn add_backend(&self, retriever: Arc<dyn Retriever>, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(FusionError::Config(
                "backend weight must be finite and non-negative".into(),
            ));
        }
        self.mutate(|state| {
            let scale = 1.0 / (1.0 + weight);
            for backend in &mut state.backends {
                backend.weight *= scale;
            }
            state.backends.push(BackendSpec {
                retriever,
                weight: weight * scale,
            });
            Ok(())
        })
    }

    /// Remove the backend at `index` and renormalise remaining weights.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] if `index` is out of range or the
    /// removal would leave the engine with no backends.
    pub fn remove_backend(&self, index: usize) -> Result<()> {
        self.mutate(|state| {
            if index >= state.backends.len() {
                return Err(FusionError::Config(format!(
                    "backend index {index} out of range (have {})",
                    state.backends.len()
                )));
            }
            if state.backends.len() == 1 {
                return Err(FusionError::Config(
                    "cannot remove the last backend".into(),
                ));
            }
            state.backends.remove(index);
            let remaining: f64 = state.backends.iter().map(|b| b.weight).sum();
            if remaining > 0.0 {
                for backend in &mut state.backends {
                    backend.weight /= remaining;
                }
            } else {
                // The removed backend carried all the weight. Fall back
                // to uniform rather than leave an all-zero vector.
                let uniform = 1.0 / state.backends.len() as f64;
                for backend in &mut state.backends {
                    backend.weight = uniform;
                }
            }
            Ok(())
        })
    }

    /// Replace all backend weights. Normalised to sum 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] if the count does not match the
    /// backend count, or the weights are invalid.
    pub fn set_weights(&self, weights: &[f64]) -> Result<()> {
        self.mutate(|state| {
            if weights.len() != state.backends.len() {
                return Err(FusionError::Config(format!(
                    "weight count {} does not match backend count {}",
                    weights.len(),
                    state.backends.len()
                )));
            }
            let normalized = normalize_weights(weights)?;
            for (backend, weight) in state.backends.iter_mut().zip(normalized) {
                backend.weight = weight;
            }
            Ok(())
        })
    }

    /// Current normalised weights, in backend configuration order.
    pub fn get_weights(&self) -> Vec<f64> {
        self.snapshot().weights()
    }

    /// Swap the fusion strategy.
    pub fn set_strategy(&self, strategy: FusionStrategyKind) {
        // Strategy swap cannot fail validation; ignore the Ok.
        let _ = self.mutate(|state| {
            state.config.strategy = strategy;
            Ok(())
        });
    }

    /// Number of configured backends.
    pub fn backend_count(&self) -> usize {
        self.snapshot().backends.len()
    }

    /// Liveness probe: `true` iff at least one backend reports healthy.
    ///
    /// Does not gate retrieval; `retrieve` degrades gracefully on partial
    /// failure regardless of this flag.
    pub async fn health_check(&self) -> bool {
        let state = self.snapshot();
        let probes = state
            .backends
            .iter()
            .map(|b| b.retriever.health_check());
        futures::future::join_all(probes)
            .await
            .into_iter()
            .any(|healthy| healthy)
    }

    /// Describe the engine's current configuration.
    pub fn describe(&self) -> EngineInfo {
        let state = self.snapshot();
        EngineInfo {
            strategy: state.config.strategy,
            rrf_k: state.config.rrf_k,
            vote_score_weight: state.config.vote_score_weight,
            top_k: state.config.top_k,
            over_fetch_factor: state.config.over_fetch_factor,
            backend_count: state.backends.len(),
            backends: state
                .backends
                .iter()
                .map(|b| BackendEntry {
                    retriever_type: b.retriever.retriever_type(),
                    weight: b.weight,
                })
                .collect(),
        }
    }
}

/// A fusion engine is itself a retriever, so engines can be nested as
/// backends of other engines.
#[async_trait]
impl Retriever for FusionEngine {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: Option<f64>,
        filter: Option<&MetadataFilter>,
    ) -> std::result::Result<Vec<ScoredResult>, FusionError> {
        let fused = FusionEngine::retrieve(self, query, top_k, score_threshold, filter).await?;
        Ok(fused.into_iter().map(scored_from_fused).collect())
    }

    async fn retrieve_similar_to(
        &self,
        item_key: &str,
        top_k: usize,
        score_threshold: Option<f64>,
    ) -> std::result::Result<Vec<ScoredResult>, FusionError> {
        let fused = FusionEngine::retrieve_similar_to(self, item_key, top_k, score_threshold).await?;
        Ok(fused.into_iter().map(scored_from_fused).collect())
    }

    async fn health_check(&self) -> bool {
        FusionEngine::health_check(self).await
    }

    fn retriever_type(&self) -> String {
        let state = self.snapshot();
        format!(
            "fusion_engine_{}[{}]",
            state.config.strategy,
            state.backends.len()
        )
    }
}

/// Reinterpret a fused result as a backend result, for nesting. The
/// fused rank is already contiguous from 1 and sorted by fused score, so
/// the ranking invariant holds.
fn scored_from_fused(fused: FusedResult) -> ScoredResult {
    ScoredResult {
        key: fused.key,
        score: fused.score,
        rank: fused.rank,
        payload: fused.payload,
    }
}

fn build_report(backends: &[BackendSpec], outcomes: &[BackendOutcome]) -> FusionReport {
    let entries = backends
        .iter()
        .zip(outcomes)
        .enumerate()
        .map(|(index, (spec, outcome))| BackendReport {
            index,
            retriever_type: spec.retriever.retriever_type(),
            weight: spec.weight,
            outcome: match outcome {
                BackendOutcome::Success(results) => BackendStatus::Contributed {
                    results: results.len(),
                },
                BackendOutcome::Failure(err) => BackendStatus::Failed {
                    error: err.to_string(),
                },
            },
        })
        .collect();
    FusionReport { backends: entries }
}

fn state_fingerprint(state: &EngineState, top_k: usize, threshold: Option<f64>) -> u64 {
    fingerprint(
        state.config.strategy.name(),
        top_k,
        threshold,
        state.config.rrf_k,
        state.config.vote_score_weight,
        &state.weights(),
    )
}

/// Normalise raw weights to sum 1.0.
fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(FusionError::Config(
            "weights must be finite and non-negative".into(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(FusionError::Config(
            "at least one weight must be positive".into(),
        ));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}
