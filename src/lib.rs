//! # retrieval-fusion
//!
//! Multi-source retrieval fusion: query several independent
//! ranked-retrieval backends concurrently and merge their per-backend
//! result lists into a single, deduplicated, ranked top-K list.
//!
//! This crate is agnostic to how each backend computes its ranking — a
//! backend is anything implementing [`Retriever`]: a vector store
//! client, a keyword index, or another [`FusionEngine`] (engines nest).
//!
//! ## Design
//!
//! - Fan-out to all backends concurrently under one shared deadline;
//!   a backend failure or timeout never aborts its siblings
//! - Four interchangeable fusion strategies behind one trait: average
//!   score, reciprocal rank (RRF), weighted score, and voting
//! - Deduplication by result identity (`source_id` + optional sub-key),
//!   with stable, deterministic tie-breaking
//! - Snapshot-on-read configuration: backend/weight mutations swap one
//!   immutable value, keeping retrieval lock-free in the common case
//! - Graceful degradation: partial backend failure is contained and
//!   reported through an introspection call, never inline in results
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use retrieval_fusion::{FusionConfig, FusionEngine, Retriever};
//! # async fn example(dense: Arc<dyn Retriever>, sparse: Arc<dyn Retriever>) -> retrieval_fusion::Result<()> {
//! let engine = FusionEngine::new(vec![(dense, 2.0), (sparse, 1.0)], FusionConfig::default())?;
//! let results = engine.retrieve("quarterly revenue targets", 10, None, None).await?;
//! for result in &results {
//!     println!("#{} {} ({:.4})", result.rank, result.key, result.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod fusion;
pub mod retriever;
pub mod types;

pub use config::FusionConfig;
pub use engine::{EngineInfo, FusionEngine, FusionReport};
pub use error::{FusionError, Result};
pub use fanout::BackendOutcome;
pub use fusion::{FuseParams, FusionStrategy};
pub use retriever::{MetadataFilter, Retriever};
pub use types::{FusedResult, FusionStrategyKind, ResultKey, ScoredResult};
