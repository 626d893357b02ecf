use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use publisher_core::{format_bytes, Action, PublishStore, Stage, WorkflowState};
use publisher_engine::{folder_size, Collaborators, PublishEngine, Session, SurfaceFlag};
use publisher_logging::{publish_info, publish_warn};

use crate::persistence;
use crate::render::{describe, TerminalRenderer};
use crate::session::EnvSession;
use crate::settings::AppSettings;

const TICK: Duration = Duration::from_millis(100);

/// A store wired to the live engine, plus the handles the run loop needs.
struct Workbench {
    store: PublishStore,
    session: Arc<EnvSession>,
    surface: SurfaceFlag,
    settings: AppSettings,
    _engine: PublishEngine,
}

impl Workbench {
    fn open(settings: AppSettings) -> anyhow::Result<Self> {
        let engine = PublishEngine::new().context("starting the publish runtime")?;
        let session = Arc::new(EnvSession::new(settings.token_file.clone()));
        let surface = SurfaceFlag::new(true);
        let publish_settings = settings.publish_settings();
        let deps = Collaborators::live(
            &publish_settings,
            Arc::clone(&session) as Arc<dyn Session>,
            Arc::new(surface.clone()),
        );

        let initial = persistence::load_state(&settings.state_file);
        let mut store = engine.build_store(publish_settings, deps, initial);
        let mut renderer = TerminalRenderer::default();
        store.subscribe(move |state: &WorkflowState, action: &Action| {
            if let Some(line) = renderer.observe(state, action) {
                println!("{line}");
            }
        });

        Ok(Self {
            store,
            session,
            surface,
            settings,
            _engine: engine,
        })
    }

    /// Process actions until `done` holds. Gives up on a login that takes too long.
    fn run_until(&mut self, done: impl Fn(&WorkflowState) -> bool) {
        let mut login_since: Option<Instant> = None;
        loop {
            let state = self.store.state();
            if done(&state) {
                return;
            }
            if state.stage() == Stage::Login {
                let since = *login_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.settings.login_timeout() {
                    publish_warn!("Gave up waiting for login");
                    self.surface.close();
                    self.store.dispatch(Action::error("Timed out waiting for login"));
                    return;
                }
            } else {
                login_since = None;
            }
            self.store.wait_and_process(TICK);
        }
    }

    fn close(self) -> Arc<WorkflowState> {
        self.surface.close();
        let state = self.store.state();
        persistence::save_state(&self.settings.state_file, &state);
        state
    }
}

/// Archive, upload and wait for the build in `dir` to go live.
pub(crate) fn publish(settings: AppSettings, dir: PathBuf, title: String) -> anyhow::Result<bool> {
    let mut bench = Workbench::open(settings)?;

    let previous = bench.store.state();
    if previous.has_error() || previous.is_published() {
        publish_info!("Clearing the outcome of the previous run");
        bench.store.dispatch(Action::Reset);
    }
    let stage = bench.store.state().stage();
    if !bench.store.state().can_start_run() {
        bench.close();
        bail!(
            "the previous run is still {}; run `publisher reset` first",
            stage.as_str()
        );
    }
    if !bench.session.is_logged_in() {
        publish_warn!("No session yet; the upload will wait for login");
    }

    println!("Publishing {} ({})", dir.display(), format_bytes(folder_size(&dir)));
    bench.store.dispatch(Action::PublishStart { title, dir });

    bench.run_until(|state| state.has_error() || state.is_published());
    let state = bench.close();
    Ok(state.is_published())
}

/// Wait until a session is available.
pub(crate) fn login(settings: AppSettings) -> anyhow::Result<bool> {
    let mut bench = Workbench::open(settings)?;
    if bench.session.is_logged_in() {
        println!("Already logged in");
        bench.close();
        return Ok(true);
    }

    bench.store.dispatch(Action::SessionLost);
    bench.run_until(|state| state.stage() != Stage::Login);
    let state = bench.close();
    Ok(!state.has_error())
}

pub(crate) fn status(settings: &AppSettings) -> bool {
    let state = persistence::load_state(&settings.state_file);
    let view = state.view();
    println!("{}", describe(&view));
    if !state.artifact_dir().as_os_str().is_empty() {
        println!("  build: {}", state.artifact_dir().display());
    }
    if !state.artifact_id().is_empty() {
        println!("  id:    {}", state.artifact_id());
    }
    !state.has_error()
}

pub(crate) fn reset(settings: AppSettings) -> anyhow::Result<bool> {
    let mut bench = Workbench::open(settings)?;
    bench.store.dispatch(Action::Reset);
    bench.close();
    Ok(true)
}
