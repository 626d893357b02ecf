use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use publisher_engine::PublishSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// On-disk application settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub upload_progress_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub login_check_interval_ms: u64,
    /// How long `publish` and `login` wait for a session before giving up.
    pub login_timeout_ms: u64,
    pub max_archive_bytes: u64,
    pub archive_name: String,
    pub archive_dir: Option<PathBuf>,
    pub correlation_file: PathBuf,
    pub resource: String,
    pub base_url: Option<String>,
    /// Read for the access token whenever `PUBLISHER_ACCESS_TOKEN` is unset.
    pub token_file: PathBuf,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = PublishSettings::default();
        Self {
            connect_timeout_ms: millis(engine.connect_timeout),
            request_timeout_ms: millis(engine.request_timeout),
            upload_progress_interval_ms: millis(engine.upload_progress_interval),
            poll_interval_ms: millis(engine.poll_interval),
            login_check_interval_ms: millis(engine.login_check_interval),
            login_timeout_ms: 5 * 60 * 1000,
            max_archive_bytes: engine.max_archive_bytes,
            archive_name: engine.archive_name,
            archive_dir: engine.archive_dir,
            correlation_file: engine.correlation_file,
            resource: engine.resource,
            base_url: engine.base_url_override,
            token_file: PathBuf::from("publish_token"),
            state_file: PathBuf::from(".publisher_state.ron"),
            log_file: PathBuf::from(publisher_logging::DEFAULT_LOG_FILE),
        }
    }
}

impl AppSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            upload_progress_interval: Duration::from_millis(self.upload_progress_interval_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            login_check_interval: Duration::from_millis(self.login_check_interval_ms),
            max_archive_bytes: self.max_archive_bytes,
            archive_name: self.archive_name.clone(),
            archive_dir: self.archive_dir.clone(),
            correlation_file: self.correlation_file.clone(),
            resource: self.resource.clone(),
            base_url_override: self.base_url.clone(),
        }
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
