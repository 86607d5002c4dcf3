// Extraction engine boundary
//
// Two interchangeable yt-dlp backends: the native binary (primary) and
// the python module (fallback). The orchestrator retries a whole failed
// job once on the other backend; bounded per-request retries happen
// inside the engines themselves via EngineOptions.

mod cli;
mod diagnostics;
mod python;
mod traits;

pub use cli::CliEngine;
pub use diagnostics::{classify_failure, FailureHint};
pub use python::PythonEngine;
pub use traits::{
    AudioTranscode, DownloadOutcome, EngineOptions, ExtractionEngine, MediaMetadata, RawFormat,
    RetryBounds,
};
