// ExtractionEngine trait and the raw records it produces

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::errors::EngineError;

/// Bounded tier-one retry counts handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct RetryBounds {
    /// Whole-request retries
    pub http: u32,
    /// Per-segment retries for manifest downloads
    pub fragments: u32,
}

impl Default for RetryBounds {
    fn default() -> Self {
        Self {
            http: 5,
            fragments: 10,
        }
    }
}

/// Audio post-processing request (extract and transcode).
#[derive(Debug, Clone)]
pub struct AudioTranscode {
    pub format: String,
    pub bitrate_kbps: u32,
}

/// Per-invocation engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// yt-dlp format expression; engines fall back to their default when unset
    pub format_expr: Option<String>,
    /// Netscape cookie jar for the requesting user
    pub cookie_file: Option<PathBuf>,
    /// Directory the engine writes into, under an id-based template
    pub work_dir: PathBuf,
    pub retry: RetryBounds,
    /// Network-operation timeout; downloads have no whole-job deadline
    pub socket_timeout: Duration,
    pub proxy: Option<String>,
    pub audio: Option<AudioTranscode>,
}

impl EngineOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            format_expr: None,
            cookie_file: None,
            work_dir: work_dir.into(),
            retry: RetryBounds::default(),
            socket_timeout: Duration::from_secs(30),
            proxy: None,
            audio: None,
        }
    }

    pub fn with_format(mut self, expr: impl Into<String>) -> Self {
        self.format_expr = Some(expr.into());
        self
    }

    pub fn with_cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookie_file = path;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_audio(mut self, audio: AudioTranscode) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Arguments for a metadata-only invocation, shared by both backends.
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "--user-agent".to_string(),
            USER_AGENT.to_string(),
        ];
        self.push_auth_args(&mut args);
        args.push(url.to_string());
        args
    }

    /// Arguments for a full download, shared by both backends.
    pub fn download_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--geo-bypass".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
            "--retries".to_string(),
            self.retry.http.to_string(),
            "--fragment-retries".to_string(),
            self.retry.fragments.to_string(),
            "--concurrent-fragments".to_string(),
            "5".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            format!("{}/%(id)s.%(ext)s", self.work_dir.display()),
            "--user-agent".to_string(),
            USER_AGENT.to_string(),
        ];
        if let Some(expr) = &self.format_expr {
            args.push("-f".to_string());
            args.push(expr.clone());
        }
        if let Some(audio) = &self.audio {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(audio.format.clone());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", audio.bitrate_kbps));
        }
        self.push_auth_args(&mut args);
        args.push(url.to_string());
        args
    }

    fn push_auth_args(&self, args: &mut Vec<String>) {
        if let Some(path) = &self.cookie_file {
            args.push("--cookies".to_string());
            args.push(path.display().to_string());
        }
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

/// One extractor-reported rendition record (a `formats[]` row).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
    pub format_note: Option<String>,
    pub protocol: Option<String>,
}

impl RawFormat {
    pub fn has_video(&self) -> bool {
        matches!(&self.vcodec, Some(v) if v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        matches!(&self.acodec, Some(a) if a != "none" && !a.is_empty())
    }
}

/// Probe result for one media reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<f64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub formats: Vec<RawFormat>,
}

impl MediaMetadata {
    /// Parse a `--dump-json` dump. Both backends emit the same shape.
    pub fn parse(stdout: &[u8]) -> Result<Self, EngineError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| EngineError::Parse(format!("invalid JSON: {}", e)))?;

        let formats = json["formats"]
            .as_array()
            .map(|rows| rows.iter().map(parse_format).collect())
            .unwrap_or_default();

        Ok(Self {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64(),
            thumbnail: json["thumbnail"].as_str().map(|s| s.to_string()),
            webpage_url: json["webpage_url"].as_str().map(|s| s.to_string()),
            formats,
        })
    }
}

fn parse_format(f: &serde_json::Value) -> RawFormat {
    RawFormat {
        format_id: f["format_id"].as_str().unwrap_or("").to_string(),
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        height: f["height"].as_u64().map(|h| h as u32),
        vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
        acodec: f["acodec"].as_str().map(|s| s.to_string()),
        filesize: f["filesize"].as_u64(),
        filesize_approx: f["filesize_approx"].as_u64(),
        tbr: f["tbr"].as_f64(),
        format_note: f["format_note"].as_str().map(|s| s.to_string()),
        protocol: f["protocol"].as_str().map(|s| s.to_string()),
    }
}

/// What a finished download reports back.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    /// Output path the engine printed, when it printed one
    pub reported_path: Option<PathBuf>,
}

/// A black-box extraction/download capability. Two interchangeable
/// backends exist so a whole failed attempt can be retried on the other.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check that the backing tool is actually installed
    fn is_available(&self) -> bool;

    /// Fetch metadata without downloading
    async fn probe(&self, url: &str, opts: &EngineOptions) -> Result<MediaMetadata, EngineError>;

    /// Run a full download into the working directory
    async fn download(&self, url: &str, opts: &EngineOptions)
        -> Result<DownloadOutcome, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump_json() {
        let dump = r#"{
            "id": "abc123",
            "title": "Some clip",
            "duration": 63.5,
            "thumbnail": "https://img.example.com/abc123.jpg",
            "webpage_url": "https://example.com/watch?v=abc123",
            "formats": [
                {"format_id": "137", "ext": "mp4", "height": 1080,
                 "vcodec": "avc1.640028", "acodec": "none", "filesize": 1000,
                 "tbr": 2500.0, "protocol": "https"},
                {"format_id": "140", "ext": "m4a",
                 "vcodec": "none", "acodec": "mp4a.40.2", "filesize_approx": 900}
            ]
        }"#;

        let meta = MediaMetadata::parse(dump.as_bytes()).expect("parses");
        assert_eq!(meta.id, "abc123");
        assert_eq!(meta.duration_seconds, Some(63.5));
        assert_eq!(meta.formats.len(), 2);
        assert!(meta.formats[0].has_video());
        assert!(!meta.formats[0].has_audio());
        assert!(meta.formats[1].has_audio());
        assert_eq!(meta.formats[1].filesize_approx, Some(900));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MediaMetadata::parse(b"not json at all").is_err());
    }

    #[test]
    fn test_download_args_carry_retry_bounds() {
        let opts = EngineOptions::new("/tmp/work").with_format("b");
        let args = opts.download_args("https://example.com/watch?v=x");
        let joined = args.join(" ");
        assert!(joined.contains("--retries 5"));
        assert!(joined.contains("--fragment-retries 10"));
        assert!(joined.contains("-f b"));
        assert!(args.last().map(|s| s.as_str()) == Some("https://example.com/watch?v=x"));
    }

    #[test]
    fn test_audio_args_present_only_when_requested() {
        let plain = EngineOptions::new("/tmp/work");
        assert!(!plain.download_args("u").contains(&"-x".to_string()));

        let audio = EngineOptions::new("/tmp/work").with_audio(AudioTranscode {
            format: "mp3".to_string(),
            bitrate_kbps: 192,
        });
        let args = audio.download_args("u");
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"192K".to_string()));
    }
}
