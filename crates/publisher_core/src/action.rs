use std::path::PathBuf;

/// Percentage reported by the service once processing is finished.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Everything that can happen to a publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Caller asks to package and publish the artifact in `dir`.
    PublishStart { title: String, dir: PathBuf },
    /// An external build finished and produced an artifact.
    ArchiveDone { output_dir: PathBuf, id: String },
    /// The archive exists on disk at `path`.
    ArchivePathReady { path: PathBuf },
    /// Begin uploading the current archive, tagged with the artifact id.
    UploadStart { id: String },
    /// Upload transfer progress, 0..=100. Leveled signal, may be coalesced.
    UploadProgress { pct: u8 },
    /// Ask the service for processing status. `None` reuses the stored key.
    QueryProgress { key: Option<String> },
    /// Answer to a status query.
    QueryProgressResult {
        pct: u8,
        key: String,
        url: String,
        error: String,
    },
    TitleChanged { title: String },
    Error { message: String },
    /// Discard the run, keeping only the artifact location.
    Reset,
    /// Abort the in-flight upload and discard the run.
    StopUpload,
    SessionLost,
    SessionRestored,
}

impl Action {
    /// Short tag, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::PublishStart { .. } => "PublishStart",
            Action::ArchiveDone { .. } => "ArchiveDone",
            Action::ArchivePathReady { .. } => "ArchivePathReady",
            Action::UploadStart { .. } => "UploadStart",
            Action::UploadProgress { .. } => "UploadProgress",
            Action::QueryProgress { .. } => "QueryProgress",
            Action::QueryProgressResult { .. } => "QueryProgressResult",
            Action::TitleChanged { .. } => "TitleChanged",
            Action::Error { .. } => "Error",
            Action::Reset => "Reset",
            Action::StopUpload => "StopUpload",
            Action::SessionLost => "SessionLost",
            Action::SessionRestored => "SessionRestored",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Action::Error {
            message: message.into(),
        }
    }
}
