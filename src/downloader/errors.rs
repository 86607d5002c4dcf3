// Error taxonomy for the acquisition pipeline
//
// Engine-internal failures stay EngineError until the orchestrator
// boundary, where they are classified into a categorized hint and wrapped
// in PipelineError. Nothing propagates past the interactive layer
// unclassified.

use std::path::PathBuf;

use thiserror::Error;

use super::extractors::FailureHint;

/// Failures at the extraction-engine boundary, before classification.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("{tool} failed: {stderr}")]
    Failed { tool: String, stderr: String },

    #[error("could not parse engine output: {0}")]
    Parse(String),

    #[error("{0} is not installed")]
    Unavailable(&'static str),

    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("no output file found for media id {0}")]
    MissingArtifact(String),

    #[error("could not relocate {} to {}: {source}", .from.display(), .to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("staging i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed selection token")]
    Malformed,

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Everything a pipeline operation can surface to the interactive layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not a usable media URL: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("metadata extraction failed: {message}")]
    Extraction { hint: FailureHint, message: String },

    #[error("download failed on both engines: {message}")]
    Download { hint: FailureHint, message: String },

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("selection expired or already used")]
    SessionExpired,
}
