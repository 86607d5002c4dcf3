// Media acquisition pipeline
//
// normalize → probe → catalog → session → selection token → orchestrated
// download → staging → public link. Everything outside this module is
// routing glue around it.

pub mod catalog;
pub mod errors;
pub mod extractors;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod protocol;
pub mod publisher;
pub mod session;
pub mod stager;
pub mod utils;

pub use errors::PipelineError;
pub use models::{
    DownloadJob, DownloadMode, MediaReference, RenditionDescriptor, SelectionSession,
    StagedArtifact,
};
pub use orchestrator::{DownloadOrchestrator, JobState, OrchestratorConfig};
pub use session::{MemorySessionStore, SessionStore, DEFAULT_SESSION_TTL};
