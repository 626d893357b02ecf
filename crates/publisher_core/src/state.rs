use std::path::{Path, PathBuf};

use crate::view_model::{PublishView, Screen};

/// Sentinel used when an artifact carries no identifier file.
pub const UNDEFINED_ARTIFACT_ID: &str = "UNDEFINED_GUID";

/// Discrete phase of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Idle,
    Login,
    Archiving,
    Uploading,
    Processing,
}

impl Stage {
    /// True while a run owns background work (archive, upload or poll chain).
    pub fn is_in_flight(self) -> bool {
        matches!(self, Stage::Archiving | Stage::Uploading | Stage::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Login => "login",
            Stage::Archiving => "archiving",
            Stage::Uploading => "uploading",
            Stage::Processing => "processing",
        }
    }

    pub fn parse(raw: &str) -> Option<Stage> {
        match raw {
            "idle" => Some(Stage::Idle),
            "login" => Some(Stage::Login),
            "archiving" => Some(Stage::Archiving),
            "uploading" => Some(Stage::Uploading),
            "processing" => Some(Stage::Processing),
            _ => None,
        }
    }
}

/// Immutable snapshot of the publish workflow.
///
/// Only the reducer builds new values; everybody else reads through the
/// accessors. Empty strings mean "not set".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowState {
    pub(crate) title: String,
    pub(crate) artifact_dir: PathBuf,
    pub(crate) artifact_id: String,
    pub(crate) archive_path: PathBuf,
    pub(crate) stage: Stage,
    pub(crate) poll_key: String,
    pub(crate) remote_url: String,
    pub(crate) error_message: String,
}

/// Plain field bag used to persist and rehydrate a [`WorkflowState`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowSnapshot {
    pub title: String,
    pub artifact_dir: PathBuf,
    pub artifact_id: String,
    pub archive_path: PathBuf,
    pub stage: Stage,
    pub poll_key: String,
    pub remote_url: String,
    pub error_message: String,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from a persisted snapshot.
    ///
    /// No background task survives a restart, so an in-flight stage is
    /// brought back to `Idle`. A snapshot carrying both a URL and an error
    /// keeps the error.
    pub fn rehydrate(snapshot: WorkflowSnapshot) -> Self {
        let stage = if snapshot.stage.is_in_flight() {
            Stage::Idle
        } else {
            snapshot.stage
        };
        let state = Self {
            title: snapshot.title,
            artifact_dir: snapshot.artifact_dir,
            artifact_id: snapshot.artifact_id,
            archive_path: snapshot.archive_path,
            stage,
            poll_key: snapshot.poll_key,
            remote_url: snapshot.remote_url,
            error_message: snapshot.error_message,
        };
        state.with_outcome_exclusive()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            title: self.title.clone(),
            artifact_dir: self.artifact_dir.clone(),
            artifact_id: self.artifact_id.clone(),
            archive_path: self.archive_path.clone(),
            stage: self.stage,
            poll_key: self.poll_key.clone(),
            remote_url: self.remote_url.clone(),
            error_message: self.error_message.clone(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn poll_key(&self) -> &str {
        &self.poll_key
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    pub fn is_published(&self) -> bool {
        !self.remote_url.is_empty()
    }

    /// A new run may only begin from a quiet, error-free `Idle` state.
    pub fn can_start_run(&self) -> bool {
        self.stage == Stage::Idle && !self.has_error()
    }

    pub fn view(&self) -> PublishView {
        let screen = if self.has_error() {
            Screen::Error
        } else if self.is_published() {
            Screen::Published
        } else {
            match self.stage {
                Stage::Idle => Screen::Ready,
                Stage::Login => Screen::Login,
                Stage::Archiving => Screen::Archiving,
                Stage::Uploading => Screen::Uploading,
                Stage::Processing => Screen::Processing,
            }
        };
        PublishView {
            screen,
            title: crate::filtered_title(&self.title).to_string(),
            artifact_dir: self.artifact_dir.clone(),
            remote_url: self.remote_url.clone(),
            error_message: self.error_message.clone(),
        }
    }

    /// Blank state that only remembers where the last artifact lives.
    pub(crate) fn blank_keeping_artifact(&self) -> Self {
        Self {
            artifact_dir: self.artifact_dir.clone(),
            artifact_id: self.artifact_id.clone(),
            ..Self::default()
        }
    }

    /// Failure wins over success: a recorded error clears the remote URL.
    pub(crate) fn with_outcome_exclusive(mut self) -> Self {
        if self.has_error() {
            self.remote_url.clear();
        }
        self
    }
}
