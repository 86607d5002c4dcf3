// Artifact staging
//
// Finds what the engine actually produced and moves it into the public
// directory under a name that never collides and never leaks the
// engine-chosen filename.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::errors::StagingError;

/// Suffixes yt-dlp leaves on in-progress or bookkeeping files.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".download"];

const SLUG_LEN: usize = 8;

/// The relocated file, ready for link publication.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub final_name: String,
    pub extension: String,
}

pub struct FileStager {
    public_dir: PathBuf,
    // serializes the pick-name/rename window between concurrent jobs
    rename_lock: Mutex<()>,
}

impl FileStager {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
            rename_lock: Mutex::new(()),
        }
    }

    /// Locate the produced artifact and atomically move it into the
    /// public directory under `md5(title)[..8]_<unix_ts>.<ext>`.
    pub fn stage(
        &self,
        work_dir: &Path,
        media_id: &str,
        reported_path: Option<&Path>,
        title: &str,
    ) -> Result<StagedFile, StagingError> {
        let source = self.locate(work_dir, media_id, reported_path)?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string();

        let digest = format!("{:x}", md5::compute(title.as_bytes()));
        let slug = &digest[..SLUG_LEN];

        let _guard = self.rename_lock.lock();

        let mut timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let final_name = loop {
            let candidate = format!("{}_{}.{}", slug, timestamp, extension);
            if !self.public_dir.join(&candidate).exists() {
                break candidate;
            }
            // same title staged again within one second
            timestamp += 1;
        };

        let destination = self.public_dir.join(&final_name);
        fs::rename(&source, &destination).map_err(|e| StagingError::Relocate {
            from: source.clone(),
            to: destination.clone(),
            source: e,
        })?;

        tracing::info!(file = %destination.display(), "staged artifact");
        Ok(StagedFile {
            final_name,
            extension,
        })
    }

    /// Prefer the path the engine reported; otherwise scan the working
    /// directory for `<media_id>.*`, skipping in-progress files and taking
    /// the largest match (sidecars and partials run smaller).
    fn locate(
        &self,
        work_dir: &Path,
        media_id: &str,
        reported_path: Option<&Path>,
    ) -> Result<PathBuf, StagingError> {
        if let Some(path) = reported_path {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            tracing::warn!(
                path = %path.display(),
                "engine-reported path is missing, scanning the working directory"
            );
        }

        let prefix = format!("{}.", media_id);
        let mut best: Option<(u64, PathBuf)> = None;

        for entry in fs::read_dir(work_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                continue;
            }

            let size = entry.metadata()?.len();
            if best.as_ref().map_or(true, |(largest, _)| size > *largest) {
                best = Some((size, entry.path()));
            }
        }

        best.map(|(_, path)| path)
            .ok_or_else(|| StagingError::MissingArtifact(media_id.to_string()))
    }
}
