// Event routing - glue between the chat surface and the pipeline
//
// One status message per interaction gets edited through the lifecycle:
// "looking" → keyboard → "downloading" → link or categorized error. The
// status message's own id keys the selection session.

use std::sync::Arc;
use std::time::SystemTime;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::downloader::catalog::CatalogBuilder;
use crate::downloader::errors::PipelineError;
use crate::downloader::extractors::{classify_failure, EngineOptions, ExtractionEngine};
use crate::downloader::models::{
    DownloadJob, DownloadMode, MediaReference, SelectionSession,
};
use crate::downloader::normalize::normalize;
use crate::downloader::orchestrator::DownloadOrchestrator;
use crate::downloader::protocol::Action;
use crate::downloader::session::SessionStore;
use crate::downloader::RenditionDescriptor;
use crate::messenger::{
    ChatId, Control, Controls, InboundEvent, MessageId, Messenger, UserId,
};

pub struct Bot {
    messenger: Arc<dyn Messenger>,
    sessions: Arc<dyn SessionStore>,
    orchestrator: Arc<DownloadOrchestrator>,
    probe_engine: Arc<dyn ExtractionEngine>,
    config: Arc<AppConfig>,
}

impl Bot {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        sessions: Arc<dyn SessionStore>,
        orchestrator: Arc<DownloadOrchestrator>,
        probe_engine: Arc<dyn ExtractionEngine>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            messenger,
            sessions,
            orchestrator,
            probe_engine,
            config,
        }
    }

    pub async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::TextMessage { chat, user, text } => {
                match extract_url(&text) {
                    Some(url) => self.handle_url(chat, user, &url).await,
                    None => {
                        self.reply(chat, "Send me a link to a video and I'll fetch it.")
                            .await
                    }
                }
            }
            InboundEvent::ControlPressed {
                chat,
                user,
                message,
                token,
            } => self.handle_control(chat, user, message, &token).await,
            InboundEvent::DocumentUpload { user, .. } => {
                // cookie upload/persistence is handled outside this service
                debug!(user, "ignoring document upload");
            }
        }
    }

    /// A new URL: resolve it, build the catalog, store the session and
    /// put the selection keyboard on the status message.
    async fn handle_url(&self, chat: ChatId, user: UserId, url: &str) {
        self.sessions.sweep_expired(SystemTime::now());

        let status = match self
            .messenger
            .send(chat, "🔎 Looking at that link...", None)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not open a status message");
                return;
            }
        };

        if let Err(e) = self.resolve_and_offer(chat, user, url, status).await {
            self.edit(chat, status, &user_message(&e)).await;
        }
    }

    async fn resolve_and_offer(
        &self,
        chat: ChatId,
        user: UserId,
        raw_url: &str,
        status: MessageId,
    ) -> Result<(), PipelineError> {
        let canonical = normalize(raw_url, self.config.normalize_policy())?;

        let opts = self.probe_options(user);
        let metadata = self
            .probe_engine
            .probe(&canonical, &opts)
            .await
            .map_err(|e| {
                let message = e.to_string();
                PipelineError::Extraction {
                    hint: classify_failure(&message),
                    message,
                }
            })?;

        let catalog = CatalogBuilder::build(&metadata.formats, metadata.duration_seconds);
        let media = MediaReference {
            canonical_url: canonical,
            title: metadata.title.clone(),
            thumbnail_url: metadata.thumbnail.clone(),
        };

        let controls = build_controls(&catalog, media.thumbnail_url.is_some());
        let text = format!("🎬 {}\n\nPick a quality, or one of the actions:", media.title);

        // the status message carries the keyboard, so its id is the key
        self.sessions.put(SelectionSession::new(
            status,
            media,
            catalog,
            SystemTime::now(),
            self.config.session_ttl,
        ));

        if let Err(e) = self.messenger.edit(chat, status, &text, Some(controls)).await {
            warn!(error = %e, "could not attach the selection keyboard");
        }
        Ok(())
    }

    /// A pressed button: consume the session (single use) and either send
    /// the thumbnail or spawn a download job.
    async fn handle_control(&self, chat: ChatId, user: UserId, message: MessageId, token: &str) {
        let action = match Action::decode(token) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, token, "selection token not understood");
                self.reply(chat, "I did not understand that selection. Send the link again.")
                    .await;
                return;
            }
        };

        let session = match self.sessions.take_if_valid(message, SystemTime::now()) {
            Some(session) => session,
            None => {
                self.edit(
                    chat,
                    message,
                    "⌛ That selection has expired. Send the link again.",
                )
                .await;
                return;
            }
        };

        // drop the keyboard; the session is spent either way
        self.edit(chat, message, &format!("🎬 {}", session.media.title))
            .await;

        let (mode, rendition_id) = match action {
            Action::FetchThumbnail => {
                self.send_thumbnail(chat, &session).await;
                return;
            }
            Action::PickRendition { rendition_id } => {
                (DownloadMode::InteractivePick, Some(rendition_id))
            }
            Action::DownloadSafe => (DownloadMode::SafeFallback, None),
            Action::DownloadBest => (DownloadMode::BestQuality, None),
            Action::DownloadAny => (DownloadMode::AnyFormat, None),
            Action::DownloadAudio => (DownloadMode::AudioOnly, None),
        };

        let job = DownloadJob {
            url: session.media.canonical_url.clone(),
            title: session.media.title.clone(),
            mode,
            rendition_id,
        };

        let status = match self
            .messenger
            .send(chat, "⬇️ Downloading... this can take a while.", None)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not open a download status message");
                return;
            }
        };

        // long-running job: its own task, nothing here holds the store
        let orchestrator = Arc::clone(&self.orchestrator);
        let messenger = Arc::clone(&self.messenger);
        let cookie_file = self.config.cookie_file_for(user);
        tokio::spawn(async move {
            let result = orchestrator.run(job, cookie_file).await;
            let text = match &result {
                Ok(artifact) => format!(
                    "✅ Done!\n\n🔗 {}\n\nThe link works for a limited time.",
                    artifact.public_url
                ),
                Err(e) => user_message(e),
            };
            if let Err(e) = messenger.edit(chat, status, &text, None).await {
                warn!(error = %e, "could not deliver the job result");
            }
        });
    }

    async fn send_thumbnail(&self, chat: ChatId, session: &SelectionSession) {
        match &session.media.thumbnail_url {
            Some(url) => {
                let caption = format!("Cover for {}", session.media.title);
                if let Err(e) = self.messenger.send_photo(chat, url, &caption).await {
                    warn!(error = %e, "could not send the cover");
                    self.reply(chat, "❌ Could not fetch the cover for this video.")
                        .await;
                }
            }
            None => {
                self.reply(chat, "❌ This video has no cover image.").await;
            }
        }
    }

    fn probe_options(&self, user: UserId) -> EngineOptions {
        EngineOptions::new(&self.config.work_dir)
            .with_socket_timeout(self.config.socket_timeout)
            .with_proxy(self.config.proxy.clone())
            .with_cookie_file(self.config.cookie_file_for(user))
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.messenger.send(chat, text, None).await {
            warn!(error = %e, "could not send reply");
        }
    }

    async fn edit(&self, chat: ChatId, message: MessageId, text: &str) {
        if let Err(e) = self.messenger.edit(chat, message, text, None).await {
            warn!(error = %e, "could not edit status message");
        }
    }
}

/// One button per rendition, two to a row, then the fixed action rows.
fn build_controls(catalog: &[RenditionDescriptor], has_thumbnail: bool) -> Controls {
    let mut rows: Controls = Vec::new();

    for pair in catalog.chunks(2) {
        rows.push(
            pair.iter()
                .map(|r| Control {
                    label: format!("🎬 {}", r.label),
                    token: Action::PickRendition {
                        rendition_id: r.rendition_id.clone(),
                    }
                    .encode(),
                })
                .collect(),
        );
    }

    rows.push(vec![
        Control {
            label: "🛟 Safe MP4".to_string(),
            token: Action::DownloadSafe.encode(),
        },
        Control {
            label: "⭐ Best".to_string(),
            token: Action::DownloadBest.encode(),
        },
    ]);
    rows.push(vec![
        Control {
            label: "🎞 Any format".to_string(),
            token: Action::DownloadAny.encode(),
        },
        Control {
            label: "🎵 Audio".to_string(),
            token: Action::DownloadAudio.encode(),
        },
    ]);
    if has_thumbnail {
        rows.push(vec![Control {
            label: "🖼 Cover".to_string(),
            token: Action::FetchThumbnail.encode(),
        }]);
    }

    rows
}

fn extract_url(text: &str) -> Option<String> {
    lazy_static! {
        static ref URL_RE: Regex = Regex::new(r"https?://\S+").unwrap();
    }
    URL_RE.find(text).map(|m| m.as_str().to_string())
}

/// Every terminal outcome becomes one user-visible message.
fn user_message(error: &PipelineError) -> String {
    match error {
        PipelineError::Normalize(e) => format!("❌ {}", e),
        PipelineError::Extraction { hint, .. } => {
            format!("❌ Could not read that link.\n\nℹ️ {}", hint.user_hint())
        }
        PipelineError::Download { hint, .. } => {
            format!("❌ Download failed.\n\nℹ️ {}", hint.user_hint())
        }
        PipelineError::Staging(_) => {
            "❌ The download finished but the file could not be saved.".to_string()
        }
        PipelineError::Protocol(_) => {
            "❌ I did not understand that selection. Send the link again.".to_string()
        }
        PipelineError::SessionExpired => {
            "⌛ That selection has expired. Send the link again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::protocol::{fits_payload_limit, MAX_TOKEN_BYTES};

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("look at https://example.com/watch?v=1 please"),
            Some("https://example.com/watch?v=1".to_string())
        );
        assert_eq!(extract_url("no links here"), None);
    }

    #[test]
    fn test_controls_fit_payload_limit() {
        let catalog = vec![
            RenditionDescriptor {
                rendition_id: "137".to_string(),
                height_px: Some(1080),
                container_ext: "mp4".to_string(),
                estimated_size_bytes: None,
                is_size_approximate: false,
                label: "1080p mp4".to_string(),
            },
            RenditionDescriptor {
                rendition_id: "22".to_string(),
                height_px: Some(720),
                container_ext: "mp4".to_string(),
                estimated_size_bytes: None,
                is_size_approximate: false,
                label: "720p mp4".to_string(),
            },
        ];

        let controls = build_controls(&catalog, true);
        for row in &controls {
            for control in row {
                assert!(control.token.len() <= MAX_TOKEN_BYTES);
                assert!(Action::decode(&control.token).is_ok());
            }
        }
        // 1 rendition row + 2 action rows + cover row
        assert_eq!(controls.len(), 4);
    }

    #[test]
    fn test_static_action_tokens_fit() {
        for action in [
            Action::DownloadSafe,
            Action::DownloadBest,
            Action::DownloadAny,
            Action::DownloadAudio,
            Action::FetchThumbnail,
        ] {
            assert!(fits_payload_limit(&action));
        }
    }
}
