// Download orchestration
//
// One job runs through an explicit state machine. Tier-one retries are
// bounded and live inside the engine invocation; tier two is exactly one
// whole-job attempt on the other backend. Both engines failing is
// terminal, there is no third try.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::errors::PipelineError;
use super::extractors::{
    classify_failure, AudioTranscode, EngineOptions, ExtractionEngine,
};
use super::models::{DownloadJob, DownloadMode, StagedArtifact};
use super::publisher::LinkPublisher;
use super::stager::FileStager;

/// Reference bitrate for audio-only transcodes.
pub const AUDIO_TARGET_BITRATE_KBPS: u32 = 192;

/// Lifecycle of one download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    ExtractingMetadata,
    DownloadingPrimary,
    DownloadingFallback,
    Staging,
    Published,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::ExtractingMetadata => write!(f, "extracting-metadata"),
            Self::DownloadingPrimary => write!(f, "downloading-primary"),
            Self::DownloadingFallback => write!(f, "downloading-fallback"),
            Self::Staging => write!(f, "staging"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How the step executed in the current state came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    FailedStep,
}

/// Pure transition function; the terminal conditions of the two-tier
/// retry are all here and nowhere else.
pub fn next_state(state: JobState, outcome: StepOutcome) -> JobState {
    use JobState::*;
    use StepOutcome::*;

    match (state, outcome) {
        (Queued, _) => ExtractingMetadata,
        (ExtractingMetadata, Succeeded) => DownloadingPrimary,
        (ExtractingMetadata, FailedStep) => Failed,
        (DownloadingPrimary, Succeeded) => Staging,
        (DownloadingPrimary, FailedStep) => DownloadingFallback,
        (DownloadingFallback, Succeeded) => Staging,
        (DownloadingFallback, FailedStep) => Failed,
        (Staging, Succeeded) => Published,
        (Staging, FailedStep) => Failed,
        // terminal states absorb
        (Published, _) => Published,
        (Failed, _) => Failed,
    }
}

/// yt-dlp format expression for a download mode. Fallbacks inside one
/// expression are evaluated by the engine left to right.
pub fn format_expression(mode: DownloadMode, rendition_id: Option<&str>) -> String {
    match mode {
        DownloadMode::SafeFallback => "b[ext=mp4]/b".to_string(),
        DownloadMode::BestQuality => "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b".to_string(),
        DownloadMode::AnyFormat => "b".to_string(),
        DownloadMode::AudioOnly => "ba/b".to_string(),
        DownloadMode::InteractivePick => match rendition_id {
            Some(id) => format!("{}+ba/b", id),
            None => "bv*+ba/b".to_string(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub work_dir: PathBuf,
    pub socket_timeout: Duration,
    pub proxy: Option<String>,
}

pub struct DownloadOrchestrator {
    primary: Arc<dyn ExtractionEngine>,
    fallback: Arc<dyn ExtractionEngine>,
    stager: Arc<FileStager>,
    publisher: Arc<LinkPublisher>,
    config: OrchestratorConfig,
}

impl DownloadOrchestrator {
    pub fn new(
        primary: Arc<dyn ExtractionEngine>,
        fallback: Arc<dyn ExtractionEngine>,
        stager: Arc<FileStager>,
        publisher: Arc<LinkPublisher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            stager,
            publisher,
            config,
        }
    }

    fn options_for(&self, job: &DownloadJob, cookie_file: Option<PathBuf>) -> EngineOptions {
        let mut opts = EngineOptions::new(&self.config.work_dir)
            .with_format(format_expression(job.mode, job.rendition_id.as_deref()))
            .with_socket_timeout(self.config.socket_timeout)
            .with_proxy(self.config.proxy.clone())
            .with_cookie_file(cookie_file);
        if job.mode == DownloadMode::AudioOnly {
            opts = opts.with_audio(AudioTranscode {
                format: "mp3".to_string(),
                bitrate_kbps: AUDIO_TARGET_BITRATE_KBPS,
            });
        }
        opts
    }

    /// Run one job to `Published` or `Failed`.
    pub async fn run(
        &self,
        job: DownloadJob,
        cookie_file: Option<PathBuf>,
    ) -> Result<StagedArtifact, PipelineError> {
        let opts = self.options_for(&job, cookie_file);
        let mut state = self.advance(JobState::Queued, StepOutcome::Succeeded, &job);

        let metadata = match self.primary.probe(&job.url, &opts).await {
            Ok(metadata) => {
                state = self.advance(state, StepOutcome::Succeeded, &job);
                metadata
            }
            Err(e) => {
                self.advance(state, StepOutcome::FailedStep, &job);
                let message = e.to_string();
                return Err(PipelineError::Extraction {
                    hint: classify_failure(&message),
                    message,
                });
            }
        };

        let outcome = match self.primary.download(&job.url, &opts).await {
            Ok(outcome) => {
                state = self.advance(state, StepOutcome::Succeeded, &job);
                outcome
            }
            Err(primary_err) => {
                warn!(
                    engine = self.primary.name(),
                    error = %primary_err,
                    "primary engine failed, retrying the whole job on the fallback"
                );
                state = self.advance(state, StepOutcome::FailedStep, &job);

                if !self.fallback.is_available() {
                    self.advance(state, StepOutcome::FailedStep, &job);
                    let message =
                        format!("{}; fallback engine is not installed", primary_err);
                    return Err(PipelineError::Download {
                        hint: classify_failure(&message),
                        message,
                    });
                }

                match self.fallback.download(&job.url, &opts).await {
                    Ok(outcome) => {
                        state = self.advance(state, StepOutcome::Succeeded, &job);
                        outcome
                    }
                    Err(fallback_err) => {
                        self.advance(state, StepOutcome::FailedStep, &job);
                        let message = format!("{}; {}", primary_err, fallback_err);
                        return Err(PipelineError::Download {
                            hint: classify_failure(&message),
                            message,
                        });
                    }
                }
            }
        };

        let staged = match self.stager.stage(
            &self.config.work_dir,
            &metadata.id,
            outcome.reported_path.as_deref(),
            &job.title,
        ) {
            Ok(staged) => {
                state = self.advance(state, StepOutcome::Succeeded, &job);
                staged
            }
            Err(e) => {
                self.advance(state, StepOutcome::FailedStep, &job);
                return Err(PipelineError::Staging(e));
            }
        };

        debug_assert_eq!(state, JobState::Published);
        Ok(self
            .publisher
            .publish(&staged.final_name, &job.title, &staged.extension))
    }

    fn advance(&self, state: JobState, outcome: StepOutcome, job: &DownloadJob) -> JobState {
        let next = next_state(state, outcome);
        info!(from = %state, to = %next, mode = %job.mode, url = %job.url, "job state transition");
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::EngineError;
    use crate::downloader::extractors::{DownloadOutcome, FailureHint, MediaMetadata};
    use async_trait::async_trait;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_transition_table() {
        use JobState::*;
        use StepOutcome::*;

        assert_eq!(next_state(Queued, Succeeded), ExtractingMetadata);
        assert_eq!(next_state(ExtractingMetadata, Succeeded), DownloadingPrimary);
        assert_eq!(next_state(ExtractingMetadata, FailedStep), Failed);
        assert_eq!(next_state(DownloadingPrimary, Succeeded), Staging);
        assert_eq!(next_state(DownloadingPrimary, FailedStep), DownloadingFallback);
        assert_eq!(next_state(DownloadingFallback, Succeeded), Staging);
        assert_eq!(next_state(DownloadingFallback, FailedStep), Failed);
        assert_eq!(next_state(Staging, Succeeded), Published);
        assert_eq!(next_state(Staging, FailedStep), Failed);
        assert_eq!(next_state(Published, FailedStep), Published);
        assert_eq!(next_state(Failed, Succeeded), Failed);
    }

    #[test]
    fn test_format_expressions() {
        assert_eq!(
            format_expression(DownloadMode::SafeFallback, None),
            "b[ext=mp4]/b"
        );
        assert_eq!(
            format_expression(DownloadMode::BestQuality, None),
            "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b"
        );
        assert_eq!(format_expression(DownloadMode::AnyFormat, None), "b");
        assert_eq!(format_expression(DownloadMode::AudioOnly, None), "ba/b");
        assert_eq!(
            format_expression(DownloadMode::InteractivePick, Some("137")),
            "137+ba/b"
        );
    }

    /// Engine double: probe always answers, download behaves as scripted.
    struct ScriptedEngine {
        fail_download: Option<String>,
        installed: bool,
    }

    impl ScriptedEngine {
        fn working() -> Self {
            Self {
                fail_download: None,
                installed: true,
            }
        }

        fn broken(stderr: &str) -> Self {
            Self {
                fail_download: Some(stderr.to_string()),
                installed: true,
            }
        }
    }

    #[async_trait]
    impl ExtractionEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            self.installed
        }

        async fn probe(
            &self,
            _url: &str,
            _opts: &EngineOptions,
        ) -> Result<MediaMetadata, EngineError> {
            Ok(MediaMetadata {
                id: "abc123".to_string(),
                title: "clip".to_string(),
                duration_seconds: Some(60.0),
                thumbnail: None,
                webpage_url: None,
                formats: Vec::new(),
            })
        }

        async fn download(
            &self,
            _url: &str,
            opts: &EngineOptions,
        ) -> Result<DownloadOutcome, EngineError> {
            if let Some(stderr) = &self.fail_download {
                return Err(EngineError::Failed {
                    tool: "scripted".to_string(),
                    stderr: stderr.clone(),
                });
            }
            let path = opts.work_dir.join("abc123.mp4");
            let mut file = File::create(&path).expect("write test artifact");
            file.write_all(b"video bytes").expect("write");
            Ok(DownloadOutcome {
                reported_path: Some(path),
            })
        }
    }

    fn harness(
        primary: ScriptedEngine,
        fallback: ScriptedEngine,
        work: &std::path::Path,
        public: &std::path::Path,
    ) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            Arc::new(primary),
            Arc::new(fallback),
            Arc::new(FileStager::new(public)),
            Arc::new(LinkPublisher::new("https://files.example.com")),
            OrchestratorConfig {
                work_dir: work.to_path_buf(),
                socket_timeout: Duration::from_secs(5),
                proxy: None,
            },
        )
    }

    fn job(mode: DownloadMode) -> DownloadJob {
        DownloadJob {
            url: "https://example.com/watch?v=abc123".to_string(),
            title: "clip".to_string(),
            mode,
            rendition_id: None,
        }
    }

    #[tokio::test]
    async fn test_fallback_engine_rescues_the_job() {
        let work = tempfile::tempdir().expect("work dir");
        let public = tempfile::tempdir().expect("public dir");
        let orchestrator = harness(
            ScriptedEngine::broken("transient network error: connection refused"),
            ScriptedEngine::working(),
            work.path(),
            public.path(),
        );

        let artifact = orchestrator
            .run(job(DownloadMode::SafeFallback), None)
            .await
            .expect("fallback publishes");

        assert!(public.path().join(&artifact.final_name).exists());
        assert!(artifact.public_url.contains(&artifact.final_name));
    }

    #[tokio::test]
    async fn test_both_engines_failing_is_terminal() {
        let work = tempfile::tempdir().expect("work dir");
        let public = tempfile::tempdir().expect("public dir");
        let orchestrator = harness(
            ScriptedEngine::broken("ERROR: Private video. Sign in if you've been granted access"),
            ScriptedEngine::broken("ERROR: Private video. Sign in if you've been granted access"),
            work.path(),
            public.path(),
        );

        let err = orchestrator
            .run(job(DownloadMode::BestQuality), None)
            .await
            .expect_err("no engine left");

        match err {
            PipelineError::Download { hint, .. } => {
                assert_eq!(hint, FailureHint::PrivateMedia)
            }
            other => panic!("expected a download error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_primary_success_never_touches_fallback() {
        let work = tempfile::tempdir().expect("work dir");
        let public = tempfile::tempdir().expect("public dir");
        let orchestrator = harness(
            ScriptedEngine::working(),
            ScriptedEngine {
                fail_download: Some("should never run".to_string()),
                installed: false,
            },
            work.path(),
            public.path(),
        );

        assert!(orchestrator
            .run(job(DownloadMode::AnyFormat), None)
            .await
            .is_ok());
    }
}
