use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use publisher_core::{Stage, WorkflowSnapshot, WorkflowState};
use publisher_engine::write_atomically;
use publisher_logging::{publish_error, publish_info, publish_warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct PersistedState {
    saved_at: String,
    title: String,
    artifact_dir: PathBuf,
    artifact_id: String,
    archive_path: PathBuf,
    stage: String,
    poll_key: String,
    remote_url: String,
    error_message: String,
}

impl PersistedState {
    fn capture(state: &WorkflowState) -> Self {
        let snapshot = state.snapshot();
        Self {
            saved_at: Utc::now().to_rfc3339(),
            title: snapshot.title,
            artifact_dir: snapshot.artifact_dir,
            artifact_id: snapshot.artifact_id,
            archive_path: snapshot.archive_path,
            stage: snapshot.stage.as_str().to_string(),
            poll_key: snapshot.poll_key,
            remote_url: snapshot.remote_url,
            error_message: snapshot.error_message,
        }
    }

    fn into_snapshot(self) -> WorkflowSnapshot {
        let stage = Stage::parse(&self.stage).unwrap_or_else(|| {
            publish_warn!("Unknown persisted stage {:?}, using Idle", self.stage);
            Stage::Idle
        });
        WorkflowSnapshot {
            title: self.title,
            artifact_dir: self.artifact_dir,
            artifact_id: self.artifact_id,
            archive_path: self.archive_path,
            stage,
            poll_key: self.poll_key,
            remote_url: self.remote_url,
            error_message: self.error_message,
        }
    }
}

/// Last saved workflow state, or a fresh one when nothing usable is stored.
pub(crate) fn load_state(path: &Path) -> WorkflowState {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return WorkflowState::new();
        }
        Err(err) => {
            publish_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return WorkflowState::new();
        }
    };

    let persisted: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            publish_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            return WorkflowState::new();
        }
    };

    publish_info!(
        "Loaded workflow state saved at {} from {:?}",
        persisted.saved_at,
        path
    );
    WorkflowState::rehydrate(persisted.into_snapshot())
}

pub(crate) fn save_state(path: &Path, state: &WorkflowState) {
    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&PersistedState::capture(state), pretty) {
        Ok(text) => text,
        Err(err) => {
            publish_error!("Failed to serialize workflow state: {}", err);
            return;
        }
    };

    if let Err(err) = write_atomically(path, content.as_bytes()) {
        publish_error!("Failed to write workflow state to {:?}: {}", path, err);
    }
}
