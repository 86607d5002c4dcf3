use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use linkgrab::bot::Bot;
use linkgrab::config::AppConfig;
use linkgrab::downloader::extractors::{CliEngine, ExtractionEngine, PythonEngine};
use linkgrab::downloader::orchestrator::OrchestratorConfig;
use linkgrab::downloader::publisher::LinkPublisher;
use linkgrab::downloader::stager::FileStager;
use linkgrab::downloader::{DownloadOrchestrator, MemorySessionStore};
use linkgrab::messenger::Messenger;
use linkgrab::telegram::TelegramApi;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.ensure_directories() {
        error!(error = %e, "could not create working directories");
        std::process::exit(1);
    }

    let api = match TelegramApi::new(&config.bot_token, config.proxy.as_deref()) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!(error = %e, "could not build the platform client");
            std::process::exit(1);
        }
    };

    let primary: Arc<dyn ExtractionEngine> = Arc::new(CliEngine::new());
    let fallback: Arc<dyn ExtractionEngine> = Arc::new(PythonEngine::new());
    info!(
        primary = primary.name(),
        primary_available = primary.is_available(),
        fallback = fallback.name(),
        fallback_available = fallback.is_available(),
        "extraction engines"
    );

    let orchestrator = Arc::new(DownloadOrchestrator::new(
        Arc::clone(&primary),
        fallback,
        Arc::new(FileStager::new(&config.public_dir)),
        Arc::new(LinkPublisher::new(&config.public_base_url)),
        OrchestratorConfig {
            work_dir: config.work_dir.clone(),
            socket_timeout: config.socket_timeout,
            proxy: config.proxy.clone(),
        },
    ));

    let bot = Arc::new(Bot::new(
        Arc::clone(&api) as Arc<dyn Messenger>,
        Arc::new(MemorySessionStore::new()),
        orchestrator,
        primary,
        Arc::clone(&config),
    ));

    info!("linkgrab is polling for updates");
    let mut offset = 0i64;
    loop {
        let updates = match api.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "update poll failed, backing off");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            if let Some(callback_id) = update.callback_ack_id() {
                api.answer_callback(&callback_id).await;
            }

            let Some(event) = update.into_inbound() else {
                continue;
            };
            // each interaction is its own task
            let bot = Arc::clone(&bot);
            tokio::spawn(async move {
                bot.handle(event).await;
            });
        }
    }
}
