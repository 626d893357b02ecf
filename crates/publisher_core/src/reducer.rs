use crate::{Action, Stage, WorkflowState, PROGRESS_COMPLETE};

/// Pure reducer: computes the next snapshot for an action.
///
/// Never performs I/O and never fails. The previous snapshot is left intact.
pub fn reduce(state: &WorkflowState, action: &Action) -> WorkflowState {
    let mut next = state.clone();
    match action {
        Action::PublishStart { title, dir } => {
            if !state.can_start_run() {
                return next;
            }
            next.title = title.clone();
            next.artifact_dir = dir.clone();
            next.archive_path = Default::default();
            next.poll_key.clear();
            next.remote_url.clear();
            next.stage = Stage::Archiving;
        }
        Action::ArchiveDone { output_dir, id } => {
            next.artifact_dir = output_dir.clone();
            next.artifact_id = id.clone();
        }
        Action::ArchivePathReady { path } => {
            next.archive_path = path.clone();
            next.stage = Stage::Uploading;
        }
        Action::UploadStart { .. } => {
            next.stage = Stage::Uploading;
        }
        Action::UploadProgress { .. } => {}
        Action::QueryProgress { key } => {
            next.stage = Stage::Processing;
            if let Some(key) = key {
                next.poll_key = key.clone();
            }
        }
        Action::QueryProgressResult {
            pct,
            key,
            url,
            error,
        } => {
            if !error.is_empty() {
                next.error_message = error.clone();
            } else if *pct >= PROGRESS_COMPLETE {
                next.stage = Stage::Idle;
                next.remote_url = url.clone();
            } else {
                next.stage = Stage::Processing;
                if !key.is_empty() {
                    next.poll_key = key.clone();
                }
            }
        }
        Action::TitleChanged { title } => {
            next.title = title.clone();
        }
        Action::Error { message } => {
            next.error_message = message.clone();
        }
        Action::Reset | Action::StopUpload => {
            next = state.blank_keeping_artifact();
        }
        Action::SessionLost => {
            next.stage = Stage::Login;
        }
        Action::SessionRestored => {
            next.stage = Stage::Idle;
        }
    }
    next.with_outcome_exclusive()
}
