// Native yt-dlp binary - the primary backend
//
// Fast and dependency-free, at the cost of being the build that breaks
// first when extractors change. The python-module backend covers for it.

use std::path::PathBuf;
use std::process::Command as StdCommand;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::traits::{DownloadOutcome, EngineOptions, ExtractionEngine, MediaMetadata};
use crate::downloader::errors::EngineError;
use crate::downloader::utils::{run_to_completion, run_with_deadline};

/// CLI-backed engine using the yt-dlp binary.
pub struct CliEngine {
    ytdlp_path: String,
}

impl CliEngine {
    pub fn new() -> Self {
        Self {
            ytdlp_path: Self::find_ytdlp(),
        }
    }

    /// Find the yt-dlp binary in common locations, then PATH.
    fn find_ytdlp() -> String {
        let common_paths = ["/usr/local/bin/yt-dlp", "/usr/bin/yt-dlp"];

        for path in common_paths {
            if std::path::Path::new(path).exists() {
                return path.to_string();
            }
        }

        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                if let Ok(path) = String::from_utf8(output.stdout) {
                    let trimmed = path.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        "yt-dlp".to_string()
    }

    fn has_binary(&self) -> bool {
        match StdCommand::new(&self.ytdlp_path).arg("--version").output() {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionEngine for CliEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        self.has_binary()
    }

    async fn probe(&self, url: &str, opts: &EngineOptions) -> Result<MediaMetadata, EngineError> {
        if !self.is_available() {
            return Err(EngineError::Unavailable("yt-dlp"));
        }

        let args = opts.probe_args(url);
        tracing::debug!(tool = %self.ytdlp_path, "probing metadata");

        // Probes get a hard deadline on top of the socket timeout; an
        // interactive request must not hang on a wedged extractor.
        let deadline = opts.socket_timeout * 4;
        let output = run_with_deadline(&self.ytdlp_path, &args, deadline).await?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                tool: "yt-dlp".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        MediaMetadata::parse(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        opts: &EngineOptions,
    ) -> Result<DownloadOutcome, EngineError> {
        if !self.is_available() {
            return Err(EngineError::Unavailable("yt-dlp"));
        }

        let args = opts.download_args(url);
        tracing::debug!(tool = %self.ytdlp_path, "starting download");

        let output = run_to_completion(&self.ytdlp_path, &args).await?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                tool: "yt-dlp".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(DownloadOutcome {
            reported_path: parse_reported_path(&stdout),
        })
    }
}

/// Pull the final output path from yt-dlp's own progress lines. Merge and
/// audio-extraction destinations supersede plain download destinations.
pub(crate) fn parse_reported_path(stdout: &str) -> Option<PathBuf> {
    lazy_static! {
        static ref DEST_RE: Regex = Regex::new(r"\[download\] Destination: (.+)").unwrap();
        static ref MERGE_RE: Regex = Regex::new(r#"Merging formats into "(.+)""#).unwrap();
        static ref EXTRACT_RE: Regex =
            Regex::new(r"\[ExtractAudio\] Destination: (.+)").unwrap();
        static ref ALREADY_RE: Regex =
            Regex::new(r"\[download\] (.+) has already been downloaded").unwrap();
    }

    let mut plain: Option<PathBuf> = None;
    let mut merged: Option<PathBuf> = None;

    for line in stdout.lines() {
        if let Some(caps) = MERGE_RE.captures(line).or_else(|| EXTRACT_RE.captures(line)) {
            merged = caps.get(1).map(|m| PathBuf::from(m.as_str().trim()));
        } else if let Some(caps) = DEST_RE.captures(line).or_else(|| ALREADY_RE.captures(line)) {
            plain = caps.get(1).map(|m| PathBuf::from(m.as_str().trim()));
        }
    }

    merged.or(plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_path_prefers_merge_output() {
        let stdout = "\
[download] Destination: /work/abc123.f137.mp4\n\
[download] 100% of 10.00MiB\n\
[download] Destination: /work/abc123.f140.m4a\n\
[Merger] Merging formats into \"/work/abc123.mp4\"\n";
        assert_eq!(
            parse_reported_path(stdout),
            Some(PathBuf::from("/work/abc123.mp4"))
        );
    }

    #[test]
    fn test_reported_path_from_plain_download() {
        let stdout = "[download] Destination: /work/abc123.mp4\n[download] 100%\n";
        assert_eq!(
            parse_reported_path(stdout),
            Some(PathBuf::from("/work/abc123.mp4"))
        );
    }

    #[test]
    fn test_reported_path_from_audio_extraction() {
        let stdout = "\
[download] Destination: /work/abc123.webm\n\
[ExtractAudio] Destination: /work/abc123.mp3\n";
        assert_eq!(
            parse_reported_path(stdout),
            Some(PathBuf::from("/work/abc123.mp3"))
        );
    }

    #[test]
    fn test_reported_path_when_already_downloaded() {
        let stdout = "[download] /work/abc123.mp4 has already been downloaded\n";
        assert_eq!(
            parse_reported_path(stdout),
            Some(PathBuf::from("/work/abc123.mp4"))
        );
    }

    #[test]
    fn test_reported_path_absent() {
        assert_eq!(parse_reported_path("nothing useful here"), None);
    }
}
