//! Error type shared by the orchestration core.
//!
//! The CLI wraps these with `anyhow` context; library callers can match on the
//! variant to tell a rejected request apart from a failed external tool.

use crate::{engine::EngineKind, plan::Operation, stage::PipelineStage};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document's stage cannot reach the operation's target stage.
    #[error("unsupported source type '{stage}' for {operation}")]
    InvalidSourceStage {
        operation: Operation,
        stage: PipelineStage,
    },

    #[error("unsupported translation engine '{0}' (supported: pdf2zh, pdf2zh_next)")]
    UnsupportedEngine(String),

    /// A known engine was requested but no adapter was registered for it.
    #[error("no adapter registered for engine '{0}'")]
    UnknownEngine(EngineKind),

    #[error("{tool} failed ({status}): {stderr}")]
    ExternalToolFailure {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} exceeded timeout of {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// A step reported success but its output is absent or empty.
    #[error("expected artifact missing or empty: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
