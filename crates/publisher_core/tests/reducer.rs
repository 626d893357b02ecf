use std::path::PathBuf;
use std::sync::Once;

use pretty_assertions::assert_eq;
use publisher_core::{reduce, Action, Screen, Stage, WorkflowSnapshot, WorkflowState};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(publisher_logging::initialize_for_tests);
}

fn apply_all(state: WorkflowState, actions: &[Action]) -> WorkflowState {
    actions
        .iter()
        .fold(state, |state, action| reduce(&state, action))
}

fn start(title: &str, dir: &str) -> Action {
    Action::PublishStart {
        title: title.to_string(),
        dir: PathBuf::from(dir),
    }
}

fn result(pct: u8, key: &str, url: &str, error: &str) -> Action {
    Action::QueryProgressResult {
        pct,
        key: key.to_string(),
        url: url.to_string(),
        error: error.to_string(),
    }
}

fn happy_path() -> Vec<Action> {
    vec![
        start("Demo", "/builds/demo"),
        Action::ArchivePathReady {
            path: PathBuf::from("/builds/publish_build.zip"),
        },
        Action::UploadStart {
            id: "guid-1".to_string(),
        },
        Action::UploadProgress { pct: 40 },
        Action::QueryProgress {
            key: Some("k1".to_string()),
        },
        result(50, "k1", "", ""),
        Action::QueryProgress { key: None },
        result(100, "k1", "https://play.example/p/1", ""),
    ]
}

fn every_action() -> Vec<Action> {
    let mut actions = happy_path();
    actions.extend([
        Action::ArchiveDone {
            output_dir: PathBuf::from("/builds/other"),
            id: "guid-2".to_string(),
        },
        Action::TitleChanged {
            title: "Renamed".to_string(),
        },
        Action::error("boom"),
        result(30, "k2", "https://ignored", "server exploded"),
        Action::Reset,
        Action::StopUpload,
        Action::SessionLost,
        Action::SessionRestored,
    ]);
    actions
}

#[test]
fn publish_start_enters_archiving_and_records_title() {
    init_logging();
    let next = reduce(&WorkflowState::new(), &start("Demo", "/builds/demo"));

    assert_eq!(next.stage(), Stage::Archiving);
    assert_eq!(next.title(), "Demo");
    assert_eq!(next.artifact_dir(), PathBuf::from("/builds/demo"));
}

#[test]
fn transition_table_follows_happy_path() {
    init_logging();
    let mut state = WorkflowState::new();
    let mut stages = Vec::new();
    for action in happy_path() {
        state = reduce(&state, &action);
        stages.push(state.stage());
    }

    assert_eq!(
        stages,
        vec![
            Stage::Archiving,
            Stage::Uploading,
            Stage::Uploading,
            Stage::Uploading,
            Stage::Processing,
            Stage::Processing,
            Stage::Processing,
            Stage::Idle,
        ]
    );
    assert_eq!(state.remote_url(), "https://play.example/p/1");
    assert_eq!(state.error_message(), "");
    assert_eq!(state.poll_key(), "k1");
    assert_eq!(state.archive_path(), PathBuf::from("/builds/publish_build.zip"));
    assert_eq!(state.view().screen, Screen::Published);
}

#[test]
fn archive_done_records_artifact_without_moving_stage() {
    let state = reduce(&WorkflowState::new(), &start("Demo", "/a"));
    let next = reduce(
        &state,
        &Action::ArchiveDone {
            output_dir: PathBuf::from("/b"),
            id: "guid".to_string(),
        },
    );

    assert_eq!(next.stage(), Stage::Archiving);
    assert_eq!(next.artifact_dir(), PathBuf::from("/b"));
    assert_eq!(next.artifact_id(), "guid");
}

#[test]
fn upload_progress_leaves_state_untouched() {
    let state = apply_all(WorkflowState::new(), &happy_path()[..3]);
    assert_eq!(reduce(&state, &Action::UploadProgress { pct: 77 }), state);
}

#[test]
fn partial_result_keeps_processing_and_updates_key() {
    let state = apply_all(WorkflowState::new(), &happy_path()[..5]);
    let next = reduce(&state, &result(60, "k9", "https://not-yet", ""));

    assert_eq!(next.stage(), Stage::Processing);
    assert_eq!(next.poll_key(), "k9");
    assert_eq!(next.remote_url(), "");
}

#[test]
fn server_error_in_result_is_recorded_and_wins_over_url() {
    let state = apply_all(WorkflowState::new(), &happy_path()[..5]);
    let next = reduce(&state, &result(100, "k1", "https://x", "quota exceeded"));

    assert_eq!(next.error_message(), "quota exceeded");
    assert_eq!(next.remote_url(), "");
    assert_eq!(next.view().screen, Screen::Error);
}

#[test]
fn error_after_success_clears_remote_url() {
    let state = apply_all(WorkflowState::new(), &happy_path());
    assert!(state.is_published());

    let next = reduce(&state, &Action::error("late failure"));
    assert_eq!(next.error_message(), "late failure");
    assert_eq!(next.remote_url(), "");
    assert_eq!(next.stage(), state.stage());
}

#[test]
fn reset_and_stop_keep_only_artifact_location() {
    let state = apply_all(
        WorkflowState::new(),
        &[
            Action::ArchiveDone {
                output_dir: PathBuf::from("/builds/demo"),
                id: "guid-1".to_string(),
            },
            Action::SessionRestored,
        ],
    );
    let state = apply_all(state, &happy_path()[..5]);
    let state = reduce(&state, &Action::error("oops"));

    for action in [Action::Reset, Action::StopUpload] {
        let next = reduce(&state, &action);
        let expected = WorkflowSnapshot {
            artifact_dir: PathBuf::from("/builds/demo"),
            artifact_id: "guid-1".to_string(),
            ..WorkflowSnapshot::default()
        };
        assert_eq!(next.snapshot(), expected);
        assert_eq!(next.stage(), Stage::Idle);
    }
}

#[test]
fn reset_is_idempotent() {
    let mut state = WorkflowState::new();
    for action in every_action() {
        state = reduce(&state, &action);
        let once = reduce(&state, &Action::Reset);
        let twice = reduce(&once, &Action::Reset);
        assert_eq!(once, twice);
    }
}

#[test]
fn session_loss_and_restore_toggle_login() {
    let state = apply_all(WorkflowState::new(), &happy_path()[..3]);
    let lost = reduce(&state, &Action::SessionLost);
    assert_eq!(lost.stage(), Stage::Login);
    assert_eq!(lost.view().screen, Screen::Login);

    let restored = reduce(&lost, &Action::SessionRestored);
    assert_eq!(restored.stage(), Stage::Idle);
}

#[test]
fn overlapping_publish_start_is_ignored() {
    let state = apply_all(WorkflowState::new(), &happy_path()[..3]);
    let next = reduce(&state, &start("Second", "/other"));
    assert_eq!(next, state);

    let failed = reduce(&WorkflowState::new(), &Action::error("bad build"));
    assert_eq!(reduce(&failed, &start("Again", "/x")), failed);
}

#[test]
fn new_run_overwrites_previous_outcome() {
    let finished = apply_all(WorkflowState::new(), &happy_path());
    let next = reduce(&finished, &start("Second", "/builds/second"));

    assert_eq!(next.stage(), Stage::Archiving);
    assert_eq!(next.remote_url(), "");
    assert_eq!(next.poll_key(), "");
    assert_eq!(next.archive_path(), PathBuf::new());
}

#[test]
fn reducer_is_deterministic_and_does_not_touch_input() {
    let mut state = WorkflowState::new();
    for action in every_action() {
        let before = state.clone();
        let first = reduce(&state, &action);
        let second = reduce(&state, &action);
        assert_eq!(first, second);
        assert_eq!(state, before);
        state = first;
    }
}

#[test]
fn error_and_url_are_never_both_set() {
    let actions = every_action();
    // Walk every prefix of every rotation to cover many interleavings.
    for offset in 0..actions.len() {
        let mut state = WorkflowState::new();
        for action in actions.iter().cycle().skip(offset).take(actions.len() * 2) {
            state = reduce(&state, action);
            assert!(
                !(state.has_error() && state.is_published()),
                "both outcomes set after {}",
                action.name()
            );
        }
    }
}

#[test]
fn rehydrate_drops_in_flight_stage_and_conflicting_url() {
    let snapshot = WorkflowSnapshot {
        title: "Demo".to_string(),
        stage: Stage::Uploading,
        remote_url: "https://x".to_string(),
        error_message: "failed".to_string(),
        ..WorkflowSnapshot::default()
    };
    let state = WorkflowState::rehydrate(snapshot);

    assert_eq!(state.stage(), Stage::Idle);
    assert_eq!(state.remote_url(), "");
    assert_eq!(state.error_message(), "failed");
    assert_eq!(state.title(), "Demo");

    let login = WorkflowState::rehydrate(WorkflowSnapshot {
        stage: Stage::Login,
        ..WorkflowSnapshot::default()
    });
    assert_eq!(login.stage(), Stage::Login);
}
