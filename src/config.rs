// Process configuration
//
// Everything comes from the environment (or .env) with workable
// defaults, except the bot token and the public base URL, which have no
// sensible default.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::downloader::normalize::NormalizePolicy;
use crate::downloader::session::DEFAULT_SESSION_TTL;
use crate::messenger::UserId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    /// In-progress downloads land here under an id-based name
    pub work_dir: PathBuf,
    /// Staged artifacts, served by the external file host
    pub public_dir: PathBuf,
    /// Read-only per-user cookie jars, cookies_<user>.txt
    pub cookies_dir: PathBuf,
    pub public_base_url: String,
    pub session_ttl: Duration,
    pub keep_playlist: bool,
    pub socket_timeout: Duration,
    pub proxy: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require("LINKGRAB_BOT_TOKEN")?;
        let public_base_url = require("LINKGRAB_PUBLIC_BASE_URL")?;

        let work_dir = std::env::var("LINKGRAB_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads"))
            });
        let public_dir = std::env::var("LINKGRAB_PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("public"));
        let cookies_dir = std::env::var("LINKGRAB_COOKIES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cookies"));

        let session_ttl = match std::env::var("LINKGRAB_SESSION_TTL_SECS") {
            Ok(raw) => Duration::from_secs(parse_secs("LINKGRAB_SESSION_TTL_SECS", &raw)?),
            Err(_) => DEFAULT_SESSION_TTL,
        };
        let socket_timeout = match std::env::var("LINKGRAB_SOCKET_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_secs("LINKGRAB_SOCKET_TIMEOUT_SECS", &raw)?),
            Err(_) => Duration::from_secs(30),
        };

        let keep_playlist = matches!(
            std::env::var("LINKGRAB_KEEP_PLAYLIST").as_deref(),
            Ok("1") | Ok("true") | Ok("yes")
        );
        let proxy = std::env::var("LINKGRAB_PROXY").ok().filter(|p| !p.is_empty());

        Ok(Self {
            bot_token,
            work_dir,
            public_dir,
            cookies_dir,
            public_base_url,
            session_ttl,
            keep_playlist,
            socket_timeout,
            proxy,
        })
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.public_dir)?;
        std::fs::create_dir_all(&self.cookies_dir)?;
        Ok(())
    }

    /// The user's cookie jar, if they uploaded one.
    pub fn cookie_file_for(&self, user: UserId) -> Option<PathBuf> {
        let path = self.cookies_dir.join(format!("cookies_{}.txt", user));
        path.exists().then_some(path)
    }

    pub fn normalize_policy(&self) -> NormalizePolicy {
        NormalizePolicy {
            keep_playlist: self.keep_playlist,
        }
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_secs(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup_requires_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            bot_token: "token".to_string(),
            work_dir: dir.path().to_path_buf(),
            public_dir: dir.path().to_path_buf(),
            cookies_dir: dir.path().to_path_buf(),
            public_base_url: "https://files.example.com".to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            keep_playlist: false,
            socket_timeout: Duration::from_secs(30),
            proxy: None,
        };

        assert_eq!(config.cookie_file_for(42), None);

        let jar = dir.path().join("cookies_42.txt");
        std::fs::write(&jar, "# Netscape HTTP Cookie File\n").expect("write jar");
        assert_eq!(config.cookie_file_for(42), Some(jar));
    }
}
