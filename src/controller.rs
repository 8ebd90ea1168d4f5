//! The conversion request controller: owner of every state transition.
//!
//! ## State machine
//!
//! ```text
//!            intake            submit              ok / err
//!   Idle ───────────▶ FileAccepted ──────▶ Converting ──────▶ Succeeded | Failed
//!    ▲                  │  ▲  (re-intake)                          │
//!    │                  └──┘                                       │
//!    └──────────── reset (explicit, or after `reset_delay`) ───────┘
//! ```
//!
//! Intake while `Succeeded`/`Failed` is an implicit reset followed by the
//! intake; submit from there goes straight back to `Converting`. Nothing
//! reaches a terminal state without passing `Converting`.
//!
//! ## Generations
//!
//! Every accepted file (and every resubmission) gets a new generation
//! number. The progress ticker, the service completion, and the auto-reset
//! timer all carry the generation they were started for and do nothing if
//! it no longer matches, so a superseded request can never write into its
//! successor.
//!
//! ## Locking
//!
//! State sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Snapshots are published while the lock is held so observers see
//! them in mutation order; callbacks run after it is released so they may
//! call back into the controller.

use crate::config::ControllerConfig;
use crate::error::{ConversionError, SubmissionError, ValidationError, VidConvError};
use crate::estimate::{clamp_outstanding, ProgressEstimator, FINALIZING_PROGRESS};
use crate::pipeline::deliver::{delivered_file_name, ConvertedFile, DeliverySink, FileSystemSink};
use crate::pipeline::input::{DropZone, InputEvent};
use crate::pipeline::service::{ConversionService, HttpConversionService};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::request::{
    format_file_size, AcceptedFile, ConversionRequest, RequestSnapshot, SourceFile, Status,
};
use crate::stream::{snapshot_stream, SnapshotStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Drives one conversion request at a time through its lifecycle.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

struct Shared {
    config: ControllerConfig,
    service: Arc<dyn ConversionService>,
    sink: Arc<dyn DeliverySink>,
    callback: ProgressCallback,
    state: Mutex<State>,
    snapshots: watch::Sender<RequestSnapshot>,
}

#[derive(Default)]
struct State {
    request: Option<ConversionRequest>,
    /// Kept outside the request: it may be chosen before a file arrives and
    /// survives re-intake.
    target_format: Option<String>,
    generation: u64,
    zone: DropZone,
    ticker: Option<AbortHandle>,
    reset_timer: Option<AbortHandle>,
    /// The task running the service call and delivery for `generation`.
    conversion: Option<AbortHandle>,
}

impl State {
    fn status(&self) -> Status {
        self.request.as_ref().map_or(Status::Idle, |r| r.status)
    }

    fn stop_ticker(&mut self) {
        if let Some(t) = self.ticker.take() {
            t.abort();
        }
    }

    fn abort_conversion(&mut self) {
        if let Some(t) = self.conversion.take() {
            t.abort();
        }
    }

    fn cancel_reset_timer(&mut self) {
        if let Some(t) = self.reset_timer.take() {
            t.abort();
        }
    }

    fn snapshot(&self) -> RequestSnapshot {
        let status = self.status();
        let req = self.request.as_ref();
        let can_submit = match (req, self.target_format.as_deref()) {
            (Some(r), Some(t)) => status != Status::Converting && r.source_format != t,
            _ => false,
        };
        RequestSnapshot {
            status,
            progress: req.map_or(0.0, |r| r.progress),
            file_name: req.map(|r| r.source_file.name().to_string()),
            size_bytes: req.map(|r| r.source_file.size_bytes()),
            size_display: req.map(|r| format_file_size(r.source_file.size_bytes())),
            source_format: req.map(|r| r.source_format.clone()),
            target_format: self.target_format.clone(),
            error_detail: req.and_then(|r| r.error_detail.clone()),
            can_submit,
            drag_over: self.zone.is_drag_over(),
            generation: self.generation,
        }
    }
}

/// Observer notifications, collected under the lock and fired after it.
enum Event {
    Status(Status, Status),
    Progress(f64),
    Rejected(String),
    Delivered(String, u64),
    Failed(String),
    Reset,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        service: Arc<dyn ConversionService>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        let callback = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        let (snapshots, _) = watch::channel(RequestSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                config,
                service,
                sink,
                callback,
                state: Mutex::new(State::default()),
                snapshots,
            }),
        }
    }

    /// Controller backed by the HTTP service at `config.service_url`,
    /// saving results into `config.output_dir`.
    pub fn http(config: ControllerConfig) -> Result<Self, VidConvError> {
        let service = HttpConversionService::new(config.service_url.clone())?;
        let sink = FileSystemSink::new(config.output_dir.clone());
        Ok(Self::new(config, Arc::new(service), Arc::new(sink)))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> RequestSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> Status {
        self.lock().status()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn subscribe(&self) -> SnapshotStream {
        snapshot_stream(self.shared.snapshots.subscribe())
    }

    /// Wait until the controller reaches `status`, returning that snapshot.
    pub async fn wait_for_status(&self, status: Status) -> RequestSnapshot {
        let mut rx = self.shared.snapshots.subscribe();
        let snapshot = match rx.wait_for(|s| s.status == status).await {
            Ok(s) => s.clone(),
            // The sender lives as long as `self`, so this cannot close.
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Validate `file` and make it the active request.
    ///
    /// Rejection leaves the current state untouched. Acceptance supersedes
    /// whatever was active, including an in-flight conversion.
    pub fn intake(&self, file: SourceFile) -> Result<AcceptedFile, ValidationError> {
        let extension = file.extension();
        let Some(source_format) = self
            .shared
            .config
            .catalog
            .get(&extension)
            .map(str::to_owned)
        else {
            let err = ValidationError::UnsupportedFormat { extension };
            warn!("Rejected {}: {}", file.name(), err);
            self.emit(vec![Event::Rejected(err.to_string())]);
            return Err(err);
        };

        let (accepted, from) = {
            let mut st = self.lock();
            let from = st.status();
            st.cancel_reset_timer();
            st.stop_ticker();
            if from == Status::Converting {
                debug!("Superseding in-flight request {}", st.generation);
                st.abort_conversion();
            }
            if from.is_terminal() {
                st.target_format = None;
            }
            st.generation += 1;
            let generation = st.generation;
            let accepted = AcceptedFile {
                name: file.name().to_string(),
                size_bytes: file.size_bytes(),
                source_format: source_format.clone(),
                generation,
            };
            st.request = Some(ConversionRequest::accepted(file, source_format, generation));
            self.publish(&st);
            (accepted, from)
        };

        info!(
            "Accepted {} ({}, {})",
            accepted.name,
            accepted.source_format,
            format_file_size(accepted.size_bytes)
        );
        self.emit(vec![Event::Status(from, Status::FileAccepted)]);
        Ok(accepted)
    }

    /// Feed a raw drag/drop/pick event. Returns the intake result when the
    /// event carried a file.
    pub fn handle_input(&self, event: InputEvent) -> Option<Result<AcceptedFile, ValidationError>> {
        let file = {
            let mut st = self.lock();
            let before = st.zone;
            let file = st.zone.apply(event);
            if st.zone != before {
                self.publish(&st);
            }
            file
        };
        file.map(|f| self.intake(f))
    }

    // ── Target selection ─────────────────────────────────────────────────

    /// Choose the output format. Equality with the source format is only
    /// checked at submission.
    pub fn select_target(&self, format: &str) -> Result<(), ValidationError> {
        let Some(target) = self.shared.config.catalog.resolve(format).map(str::to_owned) else {
            let err = ValidationError::UnsupportedFormat {
                extension: format.trim().trim_start_matches('.').to_lowercase(),
            };
            self.emit(vec![Event::Rejected(err.to_string())]);
            return Err(err);
        };
        self.set_target(Some(target))
    }

    /// Un-select the output format.
    pub fn clear_target(&self) -> Result<(), ValidationError> {
        self.set_target(None)
    }

    fn set_target(&self, target: Option<String>) -> Result<(), ValidationError> {
        let result = {
            let mut st = self.lock();
            let status = st.status();
            if matches!(status, Status::Idle | Status::FileAccepted) {
                debug!("Target format: {:?}", target);
                st.target_format = target;
                self.publish(&st);
                Ok(())
            } else {
                Err(ValidationError::TargetLocked { status })
            }
        };
        if let Err(ref e) = result {
            self.emit(vec![Event::Rejected(e.to_string())]);
        }
        result
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Send the active request to the conversion service and deliver the
    /// result.
    ///
    /// The service call and the hand-off run on their own task, so dropping
    /// this future (a `select!`, a caller-side timeout) does not strand the
    /// request in `Converting`: the task still drives it to a terminal state.
    ///
    /// # Errors
    /// - [`SubmissionError`] when a precondition fails; nothing was sent.
    /// - [`ConversionError`] when the service, the transport, or delivery
    ///   failed (the request is now `Failed`), or when the request was
    ///   superseded while converting (state untouched).
    pub async fn submit(&self) -> Result<ConvertedFile, VidConvError> {
        let (generation, file, target, events) = match self.begin_submission() {
            Ok(started) => started,
            Err(e) => {
                warn!("Submission rejected: {}", e);
                self.emit(vec![Event::Rejected(e.to_string())]);
                return Err(e.into());
            }
        };
        self.emit(events);

        let task = tokio::spawn(self.clone().run_conversion(generation, file, target));
        {
            let mut st = self.lock();
            if st.generation != generation {
                task.abort();
            } else if !task.is_finished() {
                st.conversion = Some(task.abort_handle());
            }
        }

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                debug!("Conversion task for request {} aborted", generation);
                Err(ConversionError::Superseded.into())
            }
            Err(e) => Err(VidConvError::Internal(format!("Conversion task failed: {e}"))),
        }
    }

    /// Service call, then delivery, then the terminal transition.
    async fn run_conversion(
        self,
        generation: u64,
        file: SourceFile,
        target: String,
    ) -> Result<ConvertedFile, VidConvError> {
        info!("Converting {} → {}", file.name(), target);
        let call = self.shared.service.convert(file.clone(), target.clone());
        let outcome = match self.shared.config.request_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
                .await
                .unwrap_or(Err(ConversionError::Timeout { secs })),
            None => call.await,
        };

        // ── Service resolved: stop the ticker before anything else ───────
        let payload = {
            let mut st = self.lock();
            if st.generation != generation {
                debug!("Discarding result for superseded request {}", generation);
                return Err(ConversionError::Superseded.into());
            }
            st.stop_ticker();
            match outcome {
                Ok(payload) => {
                    let progress = match st.request.as_mut() {
                        Some(req) => {
                            req.progress = req.progress.max(FINALIZING_PROGRESS);
                            req.progress
                        }
                        None => FINALIZING_PROGRESS,
                    };
                    self.publish(&st);
                    drop(st);
                    self.emit(vec![Event::Progress(progress)]);
                    payload
                }
                Err(e) => {
                    // This task is finishing; don't abort ourselves.
                    st.conversion = None;
                    let events = self.fail_locked(&mut st, &e);
                    drop(st);
                    self.emit(events);
                    return Err(e.into());
                }
            }
        };

        // ── Hand-off ─────────────────────────────────────────────────────
        let file_name = delivered_file_name(&file, &target);
        let delivered = self.shared.sink.deliver(payload, file_name).await;

        let mut st = self.lock();
        if st.generation != generation {
            if let Ok(ref out) = delivered {
                info!("Saved {} for a superseded request", out.file_name);
            }
            return Err(ConversionError::Superseded.into());
        }
        st.conversion = None;
        match delivered {
            Ok(converted) => {
                if let Some(req) = st.request.as_mut() {
                    req.status = Status::Succeeded;
                    req.progress = 100.0;
                }
                self.schedule_reset(&mut st, generation);
                self.publish(&st);
                drop(st);
                info!(
                    "Converted to {} ({})",
                    converted.file_name,
                    format_file_size(converted.size_bytes)
                );
                self.emit(vec![
                    Event::Progress(100.0),
                    Event::Status(Status::Converting, Status::Succeeded),
                    Event::Delivered(converted.file_name.clone(), converted.size_bytes),
                ]);
                Ok(converted)
            }
            Err(e) => {
                let events = self.fail_locked(&mut st, &e);
                drop(st);
                self.emit(events);
                Err(e.into())
            }
        }
    }

    /// Check preconditions and move to `Converting`, all under one lock.
    fn begin_submission(
        &self,
    ) -> Result<(u64, SourceFile, String, Vec<Event>), SubmissionError> {
        let mut st = self.lock();
        let status = st.status();
        if status == Status::Converting {
            return Err(SubmissionError::AlreadyConverting);
        }
        let source_format = match st.request {
            Some(ref r) => r.source_format.clone(),
            None => return Err(SubmissionError::MissingFile),
        };
        let target = st
            .target_format
            .clone()
            .ok_or(SubmissionError::MissingTarget)?;
        if target == source_format {
            return Err(SubmissionError::IdenticalFormats { format: target });
        }

        if status.is_terminal() {
            // Resubmission is a fresh request for the same file.
            st.cancel_reset_timer();
            st.generation += 1;
        }
        let generation = st.generation;
        let estimator = self.shared.config.resolve_estimator();
        let ticker = self.spawn_ticker(generation, estimator);
        st.ticker = Some(ticker);

        let file = match st.request.as_mut() {
            Some(req) => {
                req.generation = generation;
                req.status = Status::Converting;
                req.progress = 0.0;
                req.error_detail = None;
                req.source_file.clone()
            }
            None => return Err(SubmissionError::MissingFile),
        };
        self.publish(&st);

        let events = vec![
            Event::Status(status, Status::Converting),
            Event::Progress(0.0),
        ];
        Ok((generation, file, target, events))
    }

    fn fail_locked(&self, st: &mut State, error: &ConversionError) -> Vec<Event> {
        let detail = error.to_string();
        warn!("Conversion failed: {}", detail);
        if let Some(req) = st.request.as_mut() {
            req.status = Status::Failed;
            req.error_detail = Some(detail.clone());
        }
        let generation = st.generation;
        self.schedule_reset(st, generation);
        self.publish(st);
        vec![
            Event::Status(Status::Converting, Status::Failed),
            Event::Failed(detail),
        ]
    }

    // ── Progress ticker ──────────────────────────────────────────────────

    fn spawn_ticker(&self, generation: u64, estimator: Arc<dyn ProgressEstimator>) -> AbortHandle {
        let weak = Arc::downgrade(&self.shared);
        let period = estimator.tick_interval().max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(ctl) = upgrade(&weak) else { break };
                if !ctl.tick(generation, estimator.as_ref()) {
                    break;
                }
            }
        })
        .abort_handle()
    }

    /// One estimator step. Returns `false` once the ticker should stop.
    fn tick(&self, generation: u64, estimator: &dyn ProgressEstimator) -> bool {
        let percent = {
            let mut st = self.lock();
            if st.generation != generation {
                return false;
            }
            let Some(req) = st
                .request
                .as_mut()
                .filter(|r| r.status == Status::Converting)
            else {
                return false;
            };
            let next = clamp_outstanding(req.progress, estimator.next(req.progress));
            if next <= req.progress {
                return true;
            }
            req.progress = next;
            self.publish(&st);
            next
        };
        trace!("Estimated progress {:.1}%", percent);
        self.shared.callback.on_progress(percent);
        true
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Return to `Idle`, clearing the file, both formats, progress and error.
    ///
    /// During `Converting` this supersedes the in-flight request; its
    /// `submit()` resolves to [`ConversionError::Superseded`].
    pub fn reset(&self) {
        let events = {
            let mut st = self.lock();
            self.reset_locked(&mut st)
        };
        self.emit(events);
    }

    fn reset_locked(&self, st: &mut State) -> Vec<Event> {
        let from = st.status();
        st.stop_ticker();
        st.cancel_reset_timer();
        st.abort_conversion();
        st.generation += 1;
        st.request = None;
        st.target_format = None;
        self.publish(st);
        debug!("Reset from {}", from);

        let mut events = Vec::new();
        if from != Status::Idle {
            events.push(Event::Status(from, Status::Idle));
        }
        events.push(Event::Reset);
        events
    }

    fn schedule_reset(&self, st: &mut State, generation: u64) {
        st.cancel_reset_timer();
        let weak = Arc::downgrade(&self.shared);
        let delay = self.shared.config.reset_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(ctl) = upgrade(&weak) {
                ctl.auto_reset(generation);
            }
        })
        .abort_handle();
        st.reset_timer = Some(handle);
    }

    fn auto_reset(&self, generation: u64) {
        let events = {
            let mut st = self.lock();
            if st.generation != generation || !st.status().is_terminal() {
                return;
            }
            // This task is the timer; don't abort ourselves mid-reset.
            st.reset_timer = None;
            info!("Auto-reset after {:?}", self.shared.config.reset_delay);
            self.reset_locked(&mut st)
        };
        self.emit(events);
    }

    // ── Plumbing ─────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, st: &State) {
        self.shared.snapshots.send_replace(st.snapshot());
    }

    fn emit(&self, events: Vec<Event>) {
        let cb = &self.shared.callback;
        for event in events {
            match event {
                Event::Status(from, to) => cb.on_status_change(from, to),
                Event::Progress(p) => cb.on_progress(p),
                Event::Rejected(msg) => cb.on_rejected(&msg),
                Event::Delivered(name, size) => cb.on_delivered(&name, size),
                Event::Failed(detail) => cb.on_failed(&detail),
                Event::Reset => cb.on_reset(),
            }
        }
    }
}

fn upgrade(weak: &Weak<Shared>) -> Option<Controller> {
    weak.upgrade().map(|shared| Controller { shared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct EchoService;

    impl ConversionService for EchoService {
        fn convert(
            &self,
            file: SourceFile,
            _target_format: String,
        ) -> BoxFuture<'_, Result<Bytes, ConversionError>> {
            async move { Ok(file.content().clone()) }.boxed()
        }
    }

    struct NullSink;

    impl DeliverySink for NullSink {
        fn deliver(
            &self,
            payload: Bytes,
            file_name: String,
        ) -> BoxFuture<'_, Result<ConvertedFile, ConversionError>> {
            async move {
                Ok(ConvertedFile {
                    file_name,
                    size_bytes: payload.len() as u64,
                    location: None,
                })
            }
            .boxed()
        }
    }

    fn controller() -> Controller {
        Controller::new(
            ControllerConfig::default(),
            Arc::new(EchoService),
            Arc::new(NullSink),
        )
    }

    #[test]
    fn starts_idle() {
        let c = controller();
        let s = c.snapshot();
        assert_eq!(s.status, Status::Idle);
        assert_eq!(s.progress, 0.0);
        assert!(!s.can_submit);
        assert!(s.file_name.is_none());
    }

    #[test]
    fn can_submit_requires_distinct_target() {
        let c = controller();
        c.intake(SourceFile::new("a.mkv", vec![0u8; 2048])).unwrap();
        assert!(!c.snapshot().can_submit);
        c.select_target("mkv").unwrap();
        assert!(!c.snapshot().can_submit);
        c.select_target("MP4").unwrap();
        let s = c.snapshot();
        assert!(s.can_submit);
        assert_eq!(s.target_format.as_deref(), Some("mp4"));
        assert_eq!(s.size_display.as_deref(), Some("2 KB"));
    }

    #[test]
    fn target_may_be_chosen_before_file() {
        let c = controller();
        c.select_target("webm").unwrap();
        c.intake(SourceFile::new("b.mov", Vec::new())).unwrap();
        assert!(c.snapshot().can_submit);
    }

    #[test]
    fn re_intake_keeps_target_and_bumps_generation() {
        let c = controller();
        let first = c.intake(SourceFile::new("a.mkv", Vec::new())).unwrap();
        c.select_target("mp4").unwrap();
        let second = c.intake(SourceFile::new("b.avi", Vec::new())).unwrap();
        assert!(second.generation > first.generation);
        let s = c.snapshot();
        assert_eq!(s.source_format.as_deref(), Some("avi"));
        assert_eq!(s.target_format.as_deref(), Some("mp4"));
    }

    #[test]
    fn padded_extension_is_not_a_catalog_member() {
        let c = controller();
        let err = c.intake(SourceFile::new("movie. MKV ", Vec::new())).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedFormat {
                extension: " mkv ".into()
            }
        );
        assert_eq!(c.status(), Status::Idle);

        assert!(c.intake(SourceFile::new("movie..mkv", Vec::new())).is_ok());
    }

    #[test]
    fn unknown_target_rejected() {
        let c = controller();
        let err = c.select_target(".MPEG").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedFormat {
                extension: "mpeg".into()
            }
        );
    }

    #[test]
    fn drag_flag_reaches_snapshot() {
        let c = controller();
        assert!(c.handle_input(InputEvent::DragEnter).is_none());
        assert!(c.snapshot().drag_over);
        let res = c
            .handle_input(InputEvent::Drop(vec![SourceFile::new("x.flv", Vec::new())]))
            .unwrap();
        assert!(res.is_ok());
        let s = c.snapshot();
        assert!(!s.drag_over);
        assert_eq!(s.status, Status::FileAccepted);
    }

    #[test]
    fn reset_clears_everything() {
        let c = controller();
        c.intake(SourceFile::new("a.mkv", Vec::new())).unwrap();
        c.select_target("mp4").unwrap();
        c.reset();
        let s = c.snapshot();
        assert_eq!(s.status, Status::Idle);
        assert!(s.target_format.is_none());
        assert!(s.source_format.is_none());
    }

    #[tokio::test]
    async fn echo_round_trip_succeeds() {
        let c = controller();
        c.intake(SourceFile::new("movie.mkv", b"frames".to_vec())).unwrap();
        c.select_target("mp4").unwrap();
        let out = c.submit().await.unwrap();
        assert_eq!(out.file_name, "movie.mp4");
        assert_eq!(out.size_bytes, 6);
        let s = c.snapshot();
        assert_eq!(s.status, Status::Succeeded);
        assert_eq!(s.progress, 100.0);
    }
}
