// Core data model for the acquisition pipeline

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A resolved remote media asset. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaReference {
    pub canonical_url: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// One downloadable rendition surfaced to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenditionDescriptor {
    /// Extractor-assigned id, opaque to us
    pub rendition_id: String,
    pub height_px: Option<u32>,
    pub container_ext: String,
    pub estimated_size_bytes: Option<u64>,
    pub is_size_approximate: bool,
    /// Derived display label, unique within one catalog
    pub label: String,
}

/// Ephemeral binding between the message carrying the selection controls
/// and the resolved media plus its catalog. Valid for a fixed TTL, gone
/// after the first successful lookup.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    /// Id of the chat message bearing the selection keyboard
    pub session_key: i64,
    pub media: MediaReference,
    pub catalog: Vec<RenditionDescriptor>,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl SelectionSession {
    pub fn new(
        session_key: i64,
        media: MediaReference,
        catalog: Vec<RenditionDescriptor>,
        created_at: SystemTime,
        ttl: Duration,
    ) -> Self {
        Self {
            session_key,
            media,
            catalog,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        now <= self.expires_at
    }
}

/// What the user asked the orchestrator to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// An explicitly picked rendition id
    InteractivePick,
    /// Progressive single-file MP4, else anything
    SafeFallback,
    /// Best MP4 video merged with M4A audio, else best MP4, else anything
    BestQuality,
    /// Unconstrained best
    AnyFormat,
    /// Best audio stream, transcoded to MP3
    AudioOnly,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InteractivePick => write!(f, "pick"),
            Self::SafeFallback => write!(f, "safe"),
            Self::BestQuality => write!(f, "best"),
            Self::AnyFormat => write!(f, "any"),
            Self::AudioOnly => write!(f, "audio"),
        }
    }
}

/// One download request. Created per user action, never persisted.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub title: String,
    pub mode: DownloadMode,
    pub rendition_id: Option<String>,
}

/// A staged file as exposed to the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedArtifact {
    pub final_name: String,
    pub extension: String,
    pub public_url: String,
}
