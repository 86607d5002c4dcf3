// Python-module backend - `python3 -m yt_dlp`
//
// Slower to start than the native binary but tracks extractor fixes
// through pip independently of the system package. Used as the
// whole-job fallback when the binary's attempt fails.

use std::process::Command as StdCommand;

use async_trait::async_trait;

use super::cli::parse_reported_path;
use super::traits::{DownloadOutcome, EngineOptions, ExtractionEngine, MediaMetadata};
use crate::downloader::errors::EngineError;
use crate::downloader::utils::{run_to_completion, run_with_deadline};

/// Engine backed by the yt_dlp python module.
pub struct PythonEngine {
    python_cmd: String,
}

impl PythonEngine {
    pub fn new() -> Self {
        Self {
            python_cmd: Self::find_python(),
        }
    }

    /// Find the interpreter. LINKGRAB_PYTHON overrides, e.g. for a venv.
    fn find_python() -> String {
        if let Ok(custom) = std::env::var("LINKGRAB_PYTHON") {
            return custom;
        }

        let candidates = ["python3", "/usr/bin/python3", "/usr/local/bin/python3"];

        for cmd in candidates {
            if let Ok(output) = StdCommand::new(cmd).arg("--version").output() {
                if output.status.success() {
                    return cmd.to_string();
                }
            }
        }

        "python3".to_string()
    }

    fn has_module(&self) -> bool {
        match StdCommand::new(&self.python_cmd)
            .args(["-c", "import yt_dlp"])
            .output()
        {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    fn module_args(&self, tail: Vec<String>) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "yt_dlp".to_string()];
        args.extend(tail);
        args
    }
}

impl Default for PythonEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionEngine for PythonEngine {
    fn name(&self) -> &'static str {
        "python-yt-dlp"
    }

    fn is_available(&self) -> bool {
        self.has_module()
    }

    async fn probe(&self, url: &str, opts: &EngineOptions) -> Result<MediaMetadata, EngineError> {
        if !self.is_available() {
            return Err(EngineError::Unavailable("python yt_dlp module"));
        }

        let args = self.module_args(opts.probe_args(url));
        tracing::debug!(tool = %self.python_cmd, "probing metadata");

        let deadline = opts.socket_timeout * 4;
        let output = run_with_deadline(&self.python_cmd, &args, deadline).await?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                tool: "python-yt-dlp".to_string(),
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
            return Err(EngineError::Unavailable("python yt_dlp module"));
        }

        let args = self.module_args(opts.download_args(url));
        tracing::debug!(tool = %self.python_cmd, "starting download");

        let output = run_to_completion(&self.python_cmd, &args).await?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                tool: "python-yt-dlp".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(DownloadOutcome {
            reported_path: parse_reported_path(&stdout),
        })
    }
}
