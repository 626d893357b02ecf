use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use publisher_core::{publish_store, Action, Middleware, Next, Stage, WorkflowState};

type Log = Arc<Mutex<Vec<String>>>;

/// Records the stage seen before and after the reducer runs.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Middleware<WorkflowState, Action> for Recorder {
    fn handle(&mut self, action: Action, next: &mut Next<'_, WorkflowState, Action>) -> Action {
        let before = next.state().stage();
        let tag = action.name();
        let result = next.run(action);
        let after = next.state().stage();
        self.log.lock().unwrap().push(format!(
            "{}:{}:{:?}->{:?}",
            self.name, tag, before, after
        ));
        result
    }
}

/// Turns `ArchivePathReady` into a follow-up `UploadStart`, like a real side effect would.
struct FollowUp;

impl Middleware<WorkflowState, Action> for FollowUp {
    fn handle(&mut self, action: Action, next: &mut Next<'_, WorkflowState, Action>) -> Action {
        let result = next.run(action);
        if let Action::ArchivePathReady { .. } = result {
            next.dispatcher().dispatch(Action::UploadStart {
                id: "guid".to_string(),
            });
        }
        result
    }
}

/// Swallows `TitleChanged` without passing it on.
struct Gate;

impl Middleware<WorkflowState, Action> for Gate {
    fn handle(&mut self, action: Action, next: &mut Next<'_, WorkflowState, Action>) -> Action {
        match action {
            Action::TitleChanged { .. } => action,
            other => next.run(other),
        }
    }
}

fn archive_ready() -> Action {
    Action::ArchivePathReady {
        path: PathBuf::from("/tmp/a.zip"),
    }
}

#[test]
fn dispatch_returns_the_action_and_updates_state() {
    let mut store = publish_store(WorkflowState::new());
    let returned = store.dispatch(Action::SessionLost);

    assert_eq!(returned, Action::SessionLost);
    assert_eq!(store.state().stage(), Stage::Login);
}

#[test]
fn middleware_wraps_the_reducer_in_registration_order() {
    let log = Log::default();
    let mut store = publish_store(WorkflowState::new())
        .with_middleware(Recorder {
            name: "outer",
            log: log.clone(),
        })
        .with_middleware(Recorder {
            name: "inner",
            log: log.clone(),
        });

    store.dispatch(Action::SessionLost);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "inner:SessionLost:Idle->Login".to_string(),
            "outer:SessionLost:Idle->Login".to_string(),
        ]
    );
}

#[test]
fn follow_up_dispatch_is_sequenced_after_the_current_one() {
    let log = Log::default();
    let mut store = publish_store(WorkflowState::new())
        .with_middleware(Recorder {
            name: "rec",
            log: log.clone(),
        })
        .with_middleware(FollowUp);

    store.dispatch(archive_ready());

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "rec:ArchivePathReady:Idle->Uploading".to_string(),
            "rec:UploadStart:Uploading->Uploading".to_string(),
        ]
    );
}

#[test]
fn subscribers_see_every_transition_with_its_action() {
    let seen: Arc<Mutex<Vec<(Stage, String)>>> = Arc::default();
    let mut store = publish_store(WorkflowState::new()).with_middleware(FollowUp);
    let sink = seen.clone();
    store.subscribe(move |state: &WorkflowState, action: &Action| {
        sink.lock()
            .unwrap()
            .push((state.stage(), action.name().to_string()));
    });

    store.dispatch(archive_ready());
    store.dispatch(Action::UploadProgress { pct: 10 });

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (Stage::Uploading, "ArchivePathReady".to_string()),
            (Stage::Uploading, "UploadStart".to_string()),
            (Stage::Uploading, "UploadProgress".to_string()),
        ]
    );
}

#[test]
fn middleware_can_stop_an_action_before_the_reducer() {
    let mut store = publish_store(WorkflowState::new()).with_middleware(Gate);
    store.dispatch(Action::TitleChanged {
        title: "ignored".to_string(),
    });
    assert_eq!(store.state().title(), "");
}

#[test]
fn captured_snapshots_stay_valid_after_later_transitions() {
    let mut store = publish_store(WorkflowState::new());
    let before = store.state();
    store.dispatch(Action::SessionLost);

    assert_eq!(before.stage(), Stage::Idle);
    assert_eq!(store.state().stage(), Stage::Login);
}

#[test]
fn actions_from_other_threads_are_applied_in_send_order() {
    let mut store = publish_store(WorkflowState::new());
    let dispatcher = store.dispatcher();

    let worker = thread::spawn(move || {
        dispatcher.dispatch(Action::SessionLost);
        dispatcher.dispatch(Action::TitleChanged {
            title: "from worker".to_string(),
        });
        dispatcher.dispatch(Action::SessionRestored);
    });
    worker.join().unwrap();

    let mut applied = 0;
    while applied < 3 {
        applied += store.wait_and_process(Duration::from_secs(1));
    }

    assert_eq!(applied, 3);
    assert_eq!(store.state().stage(), Stage::Idle);
    assert_eq!(store.state().title(), "from worker");
}

#[test]
fn waiting_without_pending_actions_times_out() {
    let mut store = publish_store(WorkflowState::new());
    assert_eq!(store.wait_and_process(Duration::from_millis(10)), 0);
    assert_eq!(store.process_pending(), 0);
}
