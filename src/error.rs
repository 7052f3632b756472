//! Error types for the retrieval-fusion crate.
//!
//! Only two error classes cross the engine boundary: `AllBackendsFailed`
//! and `Config`. Individual backend failures are contained by the fan-out
//! coordinator and reported through [`crate::engine::FusionReport`], never
//! propagated inline.

/// Errors that can occur during fused retrieval.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// Every configured backend failed or timed out.
    #[error("all retrieval backends failed: {0}")]
    AllBackendsFailed(String),

    /// A single backend call failed. Contained by the coordinator;
    /// surfaces only inside per-backend outcomes and reports.
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend did not respond within the fan-out deadline.
    #[error("backend timed out: {0}")]
    Timeout(String),

    /// Invalid engine configuration (empty backend list, weight count
    /// mismatch, unknown strategy name, ...). Raised eagerly, never
    /// silently defaulted.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for retrieval-fusion results.
pub type Result<T> = std::result::Result<T, FusionError>;
