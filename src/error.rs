//! Error types shared across the highlight engine.
//!
//! None of these are fatal to a scan pass: callers log and drop them.

use thiserror::Error;

use crate::highlight::dom::NodeId;

/// Failure to bind an overlay region to a live text segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("segment {0:?} is detached from its rendering context")]
    Detached(NodeId),
    #[error("segment {0:?} is not a text node")]
    NotText(NodeId),
    #[error("range {start}..{end} exceeds segment length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },
    #[error("range {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
    #[error("range {start}..{end} is empty")]
    Empty { start: usize, end: usize },
}

/// A pattern-expression rule that failed to compile.
#[derive(Debug, Clone, Error)]
#[error("pattern `{pattern}` failed to compile: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Configuration payload could not be decoded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
