//! Terminal rendering of the workflow.

use publisher_core::{Action, PublishView, Screen, WorkflowState};

/// Turns store transitions into status lines, skipping repeats.
#[derive(Debug, Default)]
pub(crate) struct TerminalRenderer {
    last_view: Option<PublishView>,
    last_pct: Option<u8>,
}

impl TerminalRenderer {
    pub(crate) fn observe(&mut self, state: &WorkflowState, action: &Action) -> Option<String> {
        if let Action::UploadProgress { pct } = action {
            if self.last_pct == Some(*pct) {
                return None;
            }
            self.last_pct = Some(*pct);
            return Some(format!("  upload {pct:>3}%"));
        }

        let view = state.view();
        if self.last_view.as_ref() == Some(&view) {
            return None;
        }
        if view.screen != Screen::Uploading {
            self.last_pct = None;
        }
        let line = describe(&view);
        self.last_view = Some(view);
        Some(line)
    }
}

pub(crate) fn describe(view: &PublishView) -> String {
    match view.screen {
        Screen::Ready => "Ready".to_string(),
        Screen::Login => "Waiting for login (set PUBLISHER_ACCESS_TOKEN or write the token file)"
            .to_string(),
        Screen::Archiving => format!("Archiving {}", view.artifact_dir.display()),
        Screen::Uploading => format!("Uploading \"{}\"", view.title),
        Screen::Processing => "Processing on the server".to_string(),
        Screen::Published => format!("Published \"{}\" at {}", view.title, view.remote_url),
        Screen::Error => format!("Error: {}", view.error_message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use publisher_core::reduce;
    use std::path::PathBuf;

    fn step(renderer: &mut TerminalRenderer, state: &mut WorkflowState, action: Action) -> Option<String> {
        *state = reduce(state, &action);
        renderer.observe(state, &action)
    }

    #[test]
    fn prints_each_screen_once_and_progress_changes() {
        let mut renderer = TerminalRenderer::default();
        let mut state = WorkflowState::new();

        let lines = [
            Action::PublishStart {
                title: String::new(),
                dir: PathBuf::from("/builds/demo"),
            },
            Action::ArchivePathReady {
                path: PathBuf::from("/builds/publish_build.zip"),
            },
            Action::UploadStart { id: "g".to_string() },
            Action::UploadProgress { pct: 40 },
            Action::UploadProgress { pct: 40 },
            Action::UploadProgress { pct: 100 },
            Action::QueryProgress {
                key: Some("k".to_string()),
            },
            Action::QueryProgressResult {
                pct: 100,
                key: "k".to_string(),
                url: "https://play.example/p/1".to_string(),
                error: String::new(),
            },
        ]
        .into_iter()
        .filter_map(|action| step(&mut renderer, &mut state, action))
        .collect::<Vec<_>>();

        assert_eq!(
            lines,
            vec![
                "Archiving /builds/demo".to_string(),
                "Uploading \"Untitled\"".to_string(),
                "  upload  40%".to_string(),
                "  upload 100%".to_string(),
                "Processing on the server".to_string(),
                "Published \"Untitled\" at https://play.example/p/1".to_string(),
            ]
        );
    }

    #[test]
    fn errors_are_shown() {
        let mut renderer = TerminalRenderer::default();
        let mut state = WorkflowState::new();
        let line = step(&mut renderer, &mut state, Action::error("disk full"));
        assert_eq!(line.as_deref(), Some("Error: disk full"));
    }
}
