//! Core types for scored retrieval results and fusion strategy selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FusionError;

/// Identity of a retrieved candidate across backends.
///
/// `source_id` identifies the parent item (a document, an email);
/// `sub_key` identifies the matched unit inside it (a chunk). When
/// `sub_key` is absent the identity is `source_id` alone. Two backends
/// returning the same `ResultKey` are talking about the same candidate,
/// and the fusion layer merges them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    /// Identifier of the parent item.
    pub source_id: String,
    /// Identifier of the matched unit within the parent, if any.
    pub sub_key: Option<String>,
}

impl ResultKey {
    /// Key for a whole item with no sub-unit.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            sub_key: None,
        }
    }

    /// Key for a sub-unit (e.g. a chunk) of a parent item.
    pub fn with_sub_key(source_id: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            sub_key: Some(sub_key.into()),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_key {
            Some(sub) => write!(f, "{}/{}", self.source_id, sub),
            None => f.write_str(&self.source_id),
        }
    }
}

/// One candidate as returned by a single backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Identity used to recognise the same candidate across backends.
    pub key: ResultKey,
    /// Relevance score assigned by the originating backend. Higher is
    /// better; scales may be incomparable across backends.
    pub score: f64,
    /// 1-based position in the originating backend's ranking.
    pub rank: usize,
    /// Opaque content/metadata. Carried through fusion untouched.
    pub payload: serde_json::Value,
}

/// One candidate in the fused output.
///
/// Same shape as [`ScoredResult`], but `score` is the fused score and
/// `rank` is the dense 1-based rank assigned after fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    /// Identity of the merged candidate.
    pub key: ResultKey,
    /// Fused score as computed by the active strategy.
    pub score: f64,
    /// Dense 1-based rank in the fused list.
    pub rank: usize,
    /// Payload of the first-seen contribution for this key.
    pub payload: serde_json::Value,
}

/// Available fusion strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategyKind {
    /// Arithmetic mean of raw scores from contributing backends.
    /// Assumes scores are roughly comparable across backends.
    ScoreFusion,
    /// Reciprocal Rank Fusion: `Σ 1/(k + rank)`. Scale-free; only the
    /// backends' internal orderings matter.
    RankFusion,
    /// `Σ score * backend_weight` with weights normalised to sum 1.
    WeightedScore,
    /// Cross-backend agreement dominates; raw scores only break ties.
    Voting,
}

impl FusionStrategyKind {
    /// Returns the wire name of this strategy, as used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScoreFusion => "score_fusion",
            Self::RankFusion => "rank_fusion",
            Self::WeightedScore => "weighted_score",
            Self::Voting => "voting",
        }
    }

    /// Returns all strategy variants.
    pub fn all() -> &'static [FusionStrategyKind] {
        &[
            Self::ScoreFusion,
            Self::RankFusion,
            Self::WeightedScore,
            Self::Voting,
        ]
    }
}

impl fmt::Display for FusionStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FusionStrategyKind {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score_fusion" => Ok(Self::ScoreFusion),
            "rank_fusion" => Ok(Self::RankFusion),
            "weighted_score" => Ok(Self::WeightedScore),
            "voting" => Ok(Self::Voting),
            other => Err(FusionError::Config(format!(
                "unknown fusion strategy: {other}"
            ))),
        }
    }
}
