//! Side effects of the publish workflow.
//!
//! [`PublishMiddleware`] sits around the reducer and is the only place that
//! touches the file system or the network. Long running work is spawned on a
//! tokio runtime; its results come back as actions through the store's
//! [`Dispatcher`], so every state change still happens on the store's thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use publisher_core::{
    filtered_title, format_bytes, Action, Dispatcher, Middleware, Next, Stage, WorkflowState,
    UNDEFINED_ARTIFACT_ID,
};
use publisher_logging::{publish_debug, publish_error, publish_info, publish_warn};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::archive::create_archive;
use crate::clock::{Clock, TokioClock};
use crate::persist::CorrelationFile;
use crate::session::{Session, SurfaceProbe};
use crate::transport::{
    ProgressRequest, PublishTransport, ReqwestTransport, TransportError, UploadCounter,
    UploadRequest,
};
use crate::validate::{read_artifact_id, ArtifactValidator, WebBuildValidator, ARTIFACT_ID_FILE};
use crate::PublishSettings;

/// External services the workflow depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub session: Arc<dyn Session>,
    pub surface: Arc<dyn SurfaceProbe>,
    pub validator: Arc<dyn ArtifactValidator>,
    pub transport: Arc<dyn PublishTransport>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Real validator, HTTP transport and timer around the given session and surface.
    pub fn live(
        settings: &PublishSettings,
        session: Arc<dyn Session>,
        surface: Arc<dyn SurfaceProbe>,
    ) -> Self {
        Self {
            session,
            surface,
            validator: Arc::new(WebBuildValidator),
            transport: Arc::new(ReqwestTransport::new(settings.clone())),
            clock: Arc::new(TokioClock),
        }
    }
}

pub struct PublishMiddleware {
    settings: Arc<PublishSettings>,
    deps: Collaborators,
    correlation: CorrelationFile,
    runtime: Handle,
    /// Cancelled when the current run is stopped or replaced.
    run: CancellationToken,
    upload: Option<CancellationToken>,
    login_wait: Arc<AtomicBool>,
    /// Action blocked by a missing session, replayed once after login.
    resume: Option<Action>,
}

impl PublishMiddleware {
    pub fn new(settings: PublishSettings, deps: Collaborators, runtime: Handle) -> Self {
        let correlation = CorrelationFile::new(settings.correlation_file.clone());
        Self {
            settings: Arc::new(settings),
            deps,
            correlation,
            runtime,
            run: CancellationToken::new(),
            upload: None,
            login_wait: Arc::new(AtomicBool::new(false)),
            resume: None,
        }
    }

    fn admit_publish(&self, state: &WorkflowState, dir: &Path, dispatcher: &Dispatcher<Action>) -> bool {
        if !state.can_start_run() {
            publish_warn!(
                "Ignoring publish of {:?}: a run is active (stage={}, error={:?})",
                dir,
                state.stage().as_str(),
                state.error_message()
            );
            return false;
        }
        if !self.deps.validator.is_valid(dir) {
            publish_warn!("Rejecting publish: {:?} is not a valid build", dir);
            dispatcher.dispatch(Action::error(format!(
                "No valid build found at {}",
                dir.display()
            )));
            return false;
        }
        true
    }

    fn react(&mut self, action: &Action, next: &mut Next<'_, WorkflowState, Action>) {
        match action {
            Action::PublishStart { dir, .. } => self.start_archive(dir.clone(), next.dispatcher()),
            Action::UploadStart { id } => self.start_upload(id, next),
            Action::QueryProgress { key } => self.start_poll(key.clone(), next),
            Action::StopUpload | Action::Reset => self.cancel_run(action.name()),
            Action::SessionLost => self.ensure_login_wait(next.dispatcher()),
            Action::SessionRestored => {
                if let Some(resume) = self.resume.take() {
                    publish_info!("Session restored, resuming {}", resume.name());
                    next.dispatcher().dispatch(resume);
                }
            }
            _ => {}
        }
    }

    fn start_archive(&mut self, dir: PathBuf, dispatcher: Dispatcher<Action>) {
        self.run.cancel();
        self.run = CancellationToken::new();
        let run = self.run.clone();

        let dest = self.settings.archive_path_for(&dir);
        let max_bytes = self.settings.max_archive_bytes;
        publish_info!(
            "Archiving {:?} ({}) into {:?}",
            dir,
            format_bytes(self.deps.validator.artifact_size(&dir)),
            dest
        );

        self.runtime.spawn(async move {
            let source = dir.clone();
            let outcome =
                tokio::task::spawn_blocking(move || create_archive(&source, &dest, max_bytes))
                    .await;
            if run.is_cancelled() {
                publish_info!("Run cancelled while archiving {:?}", dir);
                return;
            }
            match outcome {
                Ok(Ok(info)) => {
                    publish_info!("Archive ready at {:?} ({})", info.path, format_bytes(info.bytes));
                    dispatcher.dispatch(Action::ArchivePathReady { path: info.path });
                    let id = read_artifact_id(&dir).unwrap_or_else(|| {
                        publish_warn!(
                            "Missing {} in {:?}; consider rebuilding the artifact",
                            ARTIFACT_ID_FILE,
                            dir
                        );
                        UNDEFINED_ARTIFACT_ID.to_string()
                    });
                    dispatcher.dispatch(Action::UploadStart { id });
                }
                Ok(Err(err)) => {
                    publish_error!("Archiving {:?} failed: {}", dir, err);
                    dispatcher.dispatch(Action::error(format!("Archiving failed: {err}")));
                }
                Err(err) => {
                    publish_error!("Archive task for {:?} did not finish: {}", dir, err);
                    dispatcher.dispatch(Action::error(format!("Archiving failed: {err}")));
                }
            }
        });
    }

    fn start_upload(&mut self, id: &str, next: &mut Next<'_, WorkflowState, Action>) {
        let access_token = self.deps.session.access_token();
        if access_token.is_empty() {
            self.defer_until_login(
                Action::UploadStart { id: id.to_string() },
                next.dispatcher(),
            );
            return;
        }

        if let Some(previous) = self.upload.take() {
            publish_warn!("Replacing an upload that is still in flight");
            previous.cancel();
        }
        let cancel = self.run.child_token();
        self.upload = Some(cancel.clone());

        let state = next.state();
        let environment = self.deps.session.environment();
        let request = UploadRequest {
            endpoint: self.settings.upload_endpoint(&environment),
            access_token,
            title: filtered_title(state.title()).to_string(),
            build_id: Some(id.to_string()).filter(|id| !id.is_empty()),
            project_id: Some(self.correlation.load()).filter(|id| !id.is_empty()),
            archive_path: state.archive_path().to_path_buf(),
        };
        publish_info!(
            "Uploading {:?} as {:?} to {}",
            request.archive_path,
            request.title,
            request.endpoint
        );

        let task = UploadTask {
            transport: Arc::clone(&self.deps.transport),
            clock: Arc::clone(&self.deps.clock),
            interval: self.settings.upload_progress_interval,
            dispatcher: next.dispatcher(),
            cancel,
        };
        self.runtime.spawn(task.run(request));
    }

    fn start_poll(&mut self, key: Option<String>, next: &mut Next<'_, WorkflowState, Action>) {
        let key = key.unwrap_or_else(|| next.state().poll_key().to_string());
        if key.is_empty() {
            next.dispatcher()
                .dispatch(Action::error("No processing key to query"));
            return;
        }

        let access_token = self.deps.session.access_token();
        if access_token.is_empty() {
            self.defer_until_login(Action::QueryProgress { key: Some(key) }, next.dispatcher());
            return;
        }

        let environment = self.deps.session.environment();
        let request = ProgressRequest {
            endpoint: self.settings.progress_endpoint(&environment),
            access_token,
            key,
        };
        publish_debug!("Querying processing status for {}", request.key);

        let task = PollTask {
            transport: Arc::clone(&self.deps.transport),
            clock: Arc::clone(&self.deps.clock),
            surface: Arc::clone(&self.deps.surface),
            correlation: self.correlation.clone(),
            interval: self.settings.poll_interval,
            dispatcher: next.dispatcher(),
            cancel: self.run.clone(),
        };
        self.runtime.spawn(task.run(request));
    }

    fn defer_until_login(&mut self, action: Action, dispatcher: Dispatcher<Action>) {
        publish_info!("No active session; {} waits for login", action.name());
        self.resume = Some(action);
        dispatcher.dispatch(Action::SessionLost);
    }

    fn cancel_run(&mut self, reason: &str) {
        publish_info!("{}: cancelling the current run", reason);
        self.run.cancel();
        self.run = CancellationToken::new();
        self.upload = None;
        self.resume = None;
    }

    fn ensure_login_wait(&mut self, dispatcher: Dispatcher<Action>) {
        if self.deps.session.is_logged_in() {
            dispatcher.dispatch(Action::SessionRestored);
            return;
        }
        if self
            .login_wait
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            publish_debug!("Login wait already running");
            return;
        }

        let guard = LoginWaitGuard(Arc::clone(&self.login_wait));
        let session = Arc::clone(&self.deps.session);
        let surface = Arc::clone(&self.deps.surface);
        let clock = Arc::clone(&self.deps.clock);
        let interval = self.settings.login_check_interval;

        publish_info!("Waiting for login");
        self.runtime.spawn(async move {
            let mut restored = false;
            while surface.is_open() {
                clock.sleep(interval).await;
                if session.is_logged_in() {
                    restored = true;
                    break;
                }
            }
            // Free the slot first so a session lost right after restore can wait again.
            drop(guard);
            if restored {
                publish_info!("Login detected");
                dispatcher.dispatch(Action::SessionRestored);
            } else {
                publish_info!("Surface closed; no longer waiting for login");
            }
        });
    }
}

impl Middleware<WorkflowState, Action> for PublishMiddleware {
    fn handle(&mut self, action: Action, next: &mut Next<'_, WorkflowState, Action>) -> Action {
        let state = next.state();
        if let Some(reason) = stale_reason(&state, &action) {
            publish_debug!("Dropping {}: {}", action.name(), reason);
            return action;
        }
        if let Action::PublishStart { dir, .. } = &action {
            if !self.admit_publish(&state, dir, &next.dispatcher()) {
                return action;
            }
        }

        let result = next.run(action);
        self.react(&result, next);
        result
    }
}

impl Drop for PublishMiddleware {
    fn drop(&mut self) {
        self.run.cancel();
    }
}

/// Why a late action from a finished or cancelled run must not be applied.
fn stale_reason(state: &WorkflowState, action: &Action) -> Option<&'static str> {
    match action {
        Action::ArchivePathReady { .. } if state.stage() != Stage::Archiving => {
            Some("no archive step in progress")
        }
        Action::UploadStart { .. } if state.archive_path().as_os_str().is_empty() => {
            Some("no archive to upload")
        }
        Action::UploadProgress { .. } if state.stage() != Stage::Uploading => {
            Some("no upload in progress")
        }
        Action::QueryProgress { key: None } if state.poll_key().is_empty() => {
            Some("no processing key")
        }
        Action::QueryProgressResult { .. } if state.stage() != Stage::Processing => {
            Some("no processing in progress")
        }
        _ => None,
    }
}

struct LoginWaitGuard(Arc<AtomicBool>);

impl Drop for LoginWaitGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct UploadTask {
    transport: Arc<dyn PublishTransport>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    dispatcher: Dispatcher<Action>,
    cancel: CancellationToken,
}

impl UploadTask {
    async fn run(self, request: UploadRequest) {
        let counter = Arc::new(UploadCounter::new());
        let reporter = tokio::spawn(report_upload_progress(
            Arc::clone(&counter),
            self.dispatcher.clone(),
            Arc::clone(&self.clock),
            self.interval,
            self.cancel.clone(),
        ));

        let outcome = tokio::select! {
            outcome = self.transport.upload(request, Arc::clone(&counter)) => outcome,
            _ = self.cancel.cancelled() => Err(TransportError::aborted()),
        };
        counter.finish();
        if let Err(err) = reporter.await {
            publish_debug!("Upload progress reporter did not finish: {}", err);
        }

        match outcome {
            Ok(receipt) if !self.cancel.is_cancelled() => {
                publish_info!("Upload accepted, processing key {}", receipt.key);
                self.dispatcher.dispatch(Action::QueryProgress {
                    key: Some(receipt.key),
                });
            }
            Ok(_) => publish_info!("Upload finished after the run was cancelled"),
            Err(err) if err.is_aborted() => publish_info!("Upload aborted"),
            Err(err) => {
                publish_error!("Upload failed: {}", err);
                self.dispatcher
                    .dispatch(Action::error(format!("Upload failed: {err}")));
            }
        }
    }
}

/// Samples the byte counter at a fixed cadence; unchanged values are skipped.
async fn report_upload_progress(
    counter: Arc<UploadCounter>,
    dispatcher: Dispatcher<Action>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut last = None;
    while !counter.is_finished() && !cancel.is_cancelled() {
        let pct = counter.percent();
        if last != Some(pct) {
            dispatcher.dispatch(Action::UploadProgress { pct });
            last = Some(pct);
        }
        clock.sleep(interval).await;
    }
}

struct PollTask {
    transport: Arc<dyn PublishTransport>,
    clock: Arc<dyn Clock>,
    surface: Arc<dyn SurfaceProbe>,
    correlation: CorrelationFile,
    interval: Duration,
    dispatcher: Dispatcher<Action>,
    cancel: CancellationToken,
}

impl PollTask {
    /// One status request; schedules at most one follow-up query.
    async fn run(self, request: ProgressRequest) {
        let key = request.key.clone();
        let outcome = tokio::select! {
            outcome = self.transport.progress(request) => outcome,
            _ = self.cancel.cancelled() => return,
        };
        if self.cancel.is_cancelled() {
            return;
        }

        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                publish_error!("Status query for {} failed: {}", key, err);
                self.dispatcher.dispatch(Action::error(format!(
                    "Processing status check failed: {err}"
                )));
                return;
            }
        };

        publish_debug!("Processing {} at {}%", key, report.progress);
        if report.is_complete_without_url() {
            publish_error!("Processing of {} finished without a published URL", key);
            self.dispatcher.dispatch(Action::error(
                "Processing finished but the service returned no URL",
            ));
            return;
        }
        let terminal = report.is_terminal();
        self.dispatcher.dispatch(Action::QueryProgressResult {
            pct: report.progress,
            key,
            url: report.url,
            error: report.error,
        });

        if terminal {
            if let Err(err) = self.correlation.save(&report.project_id) {
                publish_warn!(
                    "Could not store project id in {:?}: {}",
                    self.correlation.path(),
                    err
                );
            }
            return;
        }

        tokio::select! {
            _ = self.clock.sleep(self.interval) => {}
            _ = self.cancel.cancelled() => return,
        }
        if !self.surface.is_open() {
            publish_info!("Surface closed; stopping status polling");
            return;
        }
        self.dispatcher.dispatch(Action::QueryProgress { key: None });
    }
}
