// Refinement session
// Keeps the analysis window, the current estimate and the running task consistent
// while the user edits bounds, re-runs the estimator and commits the pick.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use uuid::Uuid;

use super::display::arrival_label;
use super::plot::{AicPlot, PlotSurface};
use super::window::{min_margin_samples, BoundLimits, SignalWindow, WindowError};
use crate::estimation::{
    AbortHandle, EstimationError, EstimationTask, OnsetEstimator, RunningTask, TaskEvent, Worker,
};
use crate::record::Record;
use crate::state::{
    DbError, EventEdit, EventStatus, EventStore, PickMethod, PickMode, SeismicEvent,
    SettingsProvider, DEFAULT_MARGIN_SECS,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid window: {0}")]
    Window(#[from] WindowError),
    #[error("Margin must be positive, got {0} samples")]
    NonPositiveMargin(i64),
    #[error("An estimation is already running")]
    AlreadyRunning,
    #[error("No estimation is running")]
    NotRunning,
    #[error("Session is busy with an estimation")]
    Busy,
    #[error("Session is closed")]
    Closed,
    #[error("Estimation failed: {0}")]
    Estimation(EstimationError),
    #[error("No failed estimation to resume from")]
    NoFailure,
    #[error("Estimation task stopped without finishing")]
    TaskDisconnected,
    #[error("Document store error: {0}")]
    Store(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Committed,
    Rejected,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Committed | SessionState::Rejected)
    }
}

/// Progress of the in-flight run after handling notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunProgress {
    Pending,
    Finished,
}

/// What `accept` wrote to the document
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Created(SeismicEvent),
    Edited(SeismicEvent),
    Unchanged,
}

/// Interactive refinement of one event's arrival time.
///
/// Owned by the interactive thread. Estimation runs happen on a
/// [`Worker`]; their notifications are pulled in with [`poll`] or
/// [`wait`]. Dropping the session aborts any run still in flight.
///
/// [`poll`]: RefinementSession::poll
/// [`wait`]: RefinementSession::wait
pub struct RefinementSession {
    record: Arc<Record>,
    estimator: Arc<dyn OnsetEstimator>,
    window: SignalWindow,
    limits: BoundLimits,
    min_margin: usize,
    event_time: usize,
    event: Option<SeismicEvent>,
    label: String,
    state: SessionState,
    running: Option<RunningTask>,
    failure: Option<EstimationError>,
    last_plot: Option<AicPlot>,
    plot_surface: Option<Box<dyn PlotSurface + Send>>,
}

impl RefinementSession {
    /// Open a session over `[start, end)` in samples.
    ///
    /// With an existing event its time is the initial estimate, otherwise
    /// the window midpoint. Fails without creating a session if the window
    /// is out of range, shorter than the minimum margin, or does not
    /// strictly contain the estimate.
    pub fn new(
        record: Arc<Record>,
        estimator: Arc<dyn OnsetEstimator>,
        start: i64,
        end: i64,
        event: Option<SeismicEvent>,
    ) -> Result<Self, SessionError> {
        let sample_rate = record.sample_rate();
        let window = SignalWindow::new(start, end, record.len(), sample_rate)?;
        let event_time = match &event {
            Some(existing) => existing.time,
            None => window.midpoint(),
        };
        window.check_event(event_time)?;

        let min_margin = min_margin_samples(sample_rate);
        let limits = BoundLimits::for_window(record.len(), &window, min_margin);

        log::debug!(
            "Refinement session over [{}, {}) of {}, estimate {}",
            window.start(),
            window.end(),
            record.name(),
            event_time
        );

        Ok(RefinementSession {
            label: arrival_label(event_time, sample_rate),
            record,
            estimator,
            window,
            limits,
            min_margin,
            event_time,
            event,
            state: SessionState::Idle,
            running: None,
            failure: None,
            last_plot: None,
            plot_surface: None,
        })
    }

    /// Same as [`new`](Self::new) with the window given in seconds
    pub fn from_seconds(
        record: Arc<Record>,
        estimator: Arc<dyn OnsetEstimator>,
        t_start: f64,
        t_end: f64,
        event: Option<SeismicEvent>,
    ) -> Result<Self, SessionError> {
        let start = seconds_to_index(t_start, record.sample_rate());
        let end = seconds_to_index(t_end, record.sample_rate());
        Self::new(record, estimator, start, end, event)
    }

    /// [`from_seconds`](Self::from_seconds), then recentre the window with the
    /// stored default margin
    pub fn open<P: SettingsProvider + ?Sized>(
        record: Arc<Record>,
        estimator: Arc<dyn OnsetEstimator>,
        t_start: f64,
        t_end: f64,
        event: Option<SeismicEvent>,
        settings: &P,
    ) -> Result<Self, SessionError> {
        let mut session = Self::from_seconds(record, estimator, t_start, t_end, event)?;
        session.load_settings(settings)?;
        Ok(session)
    }

    pub fn with_plot_surface(mut self, surface: Box<dyn PlotSurface + Send>) -> Self {
        self.plot_surface = Some(surface);
        self
    }

    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }

    pub fn window(&self) -> SignalWindow {
        self.window
    }

    pub fn limits(&self) -> BoundLimits {
        self.limits
    }

    /// Minimum window length in samples
    pub fn min_margin(&self) -> usize {
        self.min_margin
    }

    /// Current best estimate of the arrival, in samples
    pub fn event_time(&self) -> usize {
        self.event_time
    }

    /// The event being refined, if the session started from one
    pub fn event(&self) -> Option<&SeismicEvent> {
        self.event.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Error of the last run, until [`resume_after_failure`](Self::resume_after_failure)
    pub fn last_failure(&self) -> Option<&EstimationError> {
        self.failure.as_ref()
    }

    pub fn last_plot(&self) -> Option<&AicPlot> {
        self.last_plot.as_ref()
    }

    /// Cancellation handle of the run in flight
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.running.as_ref().map(|task| task.abort_handle())
    }

    // ==================== WINDOW EDITS ====================

    /// Move the start bound. The value is clamped to the current limits.
    pub fn edit_start(&mut self, start: i64) -> Result<usize, SessionError> {
        self.ensure_idle()?;

        let start = self.limits.clamp_start(start);
        if start != self.window.start() {
            self.window.set_start(start);
            self.limits.follow_start(start, self.min_margin);
            log::debug!("Start moved to {}, end now >= {}", start, self.limits.end_min);
        }
        Ok(start)
    }

    /// Move the end bound. The value is clamped to the current limits.
    pub fn edit_end(&mut self, end: i64) -> Result<usize, SessionError> {
        self.ensure_idle()?;

        let end = self.limits.clamp_end(end);
        if end != self.window.end() {
            self.window.set_end(end);
            self.limits.follow_end(end, self.min_margin);
            log::debug!("End moved to {}, start now <= {}", end, self.limits.start_max);
        }
        Ok(end)
    }

    pub fn edit_start_seconds(&mut self, secs: f64) -> Result<usize, SessionError> {
        self.edit_start(seconds_to_index(secs, self.record.sample_rate()))
    }

    pub fn edit_end_seconds(&mut self, secs: f64) -> Result<usize, SessionError> {
        self.edit_end(seconds_to_index(secs, self.record.sample_rate()))
    }

    /// Centre the window on the current estimate with half-width `margin`
    /// samples, raised to the minimum margin and cut at the record edges.
    pub fn set_margin(&mut self, margin: i64) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if margin <= 0 {
            return Err(SessionError::NonPositiveMargin(margin));
        }

        let margin = margin.max(self.min_margin as i64);
        let time = self.event_time as i64;
        let start = (time - margin).max(0) as usize;
        let end = (time.saturating_add(margin)).min(self.record.len() as i64) as usize;

        self.window.set_start(start);
        self.window.set_end(end);
        self.limits.follow_start(start, self.min_margin);
        self.limits.follow_end(end, self.min_margin);

        log::debug!("Margin {} samples gives window [{}, {})", margin, start, end);
        Ok(())
    }

    /// Apply the stored default margin
    pub fn load_settings<P: SettingsProvider + ?Sized>(
        &mut self,
        settings: &P,
    ) -> Result<(), SessionError> {
        let secs = settings.margin_seconds(DEFAULT_MARGIN_SECS);
        let margin = (secs * self.record.sample_rate()).floor() as i64;
        self.set_margin(margin)
    }

    // ==================== ESTIMATION RUNS ====================

    /// Submit a run over the current window
    pub fn start_estimation(&mut self, worker: &Worker) -> Result<Uuid, SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Running => return Err(SessionError::AlreadyRunning),
            _ => return Err(SessionError::Closed),
        }

        let task = EstimationTask::new(
            Arc::clone(&self.record),
            Arc::clone(&self.estimator),
            self.window.start(),
            self.window.end(),
        );
        let running = worker.submit(task);
        let id = running.id();

        self.running = Some(running);
        self.state = SessionState::Running;
        Ok(id)
    }

    /// Handle every notification already delivered, without waiting
    pub fn poll(&mut self) -> Result<RunProgress, SessionError> {
        loop {
            let next = match self.running.as_mut() {
                Some(task) => task.try_recv(),
                None => return Err(self.no_run_error()),
            };

            match next {
                Ok(event) => {
                    if self.handle_event(event)? == RunProgress::Finished {
                        return Ok(RunProgress::Finished);
                    }
                }
                Err(TryRecvError::Empty) => return Ok(RunProgress::Pending),
                Err(TryRecvError::Disconnected) => return Err(self.disconnected()),
            }
        }
    }

    /// Wait until the run in flight finishes
    pub async fn wait(&mut self) -> Result<(), SessionError> {
        loop {
            let next = match self.running.as_mut() {
                Some(task) => task.recv().await,
                None => return Err(self.no_run_error()),
            };

            match next {
                Some(event) => {
                    if self.handle_event(event)? == RunProgress::Finished {
                        return Ok(());
                    }
                }
                None => return Err(self.disconnected()),
            }
        }
    }

    /// Apply one notification of the run in flight
    pub fn handle_event(&mut self, event: TaskEvent) -> Result<RunProgress, SessionError> {
        if self.state != SessionState::Running || self.failure.is_some() {
            return Err(SessionError::NotRunning);
        }

        match event {
            TaskEvent::PositionEstimated(result) => {
                self.event_time = result.time;
                self.label = arrival_label(result.time, self.record.sample_rate());
                log::info!("Estimated arrival at sample {} ({})", result.time, self.label);

                let plot = AicPlot::build(&self.record, &self.window, &result);
                if let Some(surface) = self.plot_surface.as_mut() {
                    surface.render_aic(&plot);
                }
                self.last_plot = Some(plot);
                Ok(RunProgress::Pending)
            }
            TaskEvent::Finished => {
                self.running = None;
                self.state = SessionState::Idle;
                Ok(RunProgress::Finished)
            }
            TaskEvent::Failed(e) => {
                log::warn!(
                    "Estimation over [{}, {}) failed: {}",
                    self.window.start(),
                    self.window.end(),
                    e
                );
                self.running = None;
                self.failure = Some(e.clone());
                Err(SessionError::Estimation(e))
            }
        }
    }

    /// Leave the failed run behind and return to Idle
    pub fn resume_after_failure(&mut self) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::Closed);
        }
        if self.failure.take().is_none() {
            return Err(SessionError::NoFailure);
        }

        self.state = SessionState::Idle;
        Ok(())
    }

    // ==================== COMMIT ====================

    /// Write the current estimate to the document and close the session
    pub fn accept<S: EventStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<CommitOutcome, SessionError> {
        self.ensure_idle()?;

        let outcome = match &self.event {
            Some(existing) if existing.time == self.event_time => CommitOutcome::Unchanged,
            Some(existing) => {
                let edited = store.edit_event(existing, EventEdit::takanami(self.event_time))?;
                CommitOutcome::Edited(edited)
            }
            None => {
                let created = store.create_event(
                    self.event_time,
                    PickMethod::Takanami,
                    PickMode::Automatic,
                    EventStatus::Reported,
                )?;
                CommitOutcome::Created(created)
            }
        };

        if let CommitOutcome::Created(event) | CommitOutcome::Edited(event) = &outcome {
            self.event = Some(event.clone());
        }
        self.state = SessionState::Committed;
        Ok(outcome)
    }

    /// Close the session without writing. Aborts a run in flight.
    pub fn reject(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(task) = self.running.take() {
            log::info!("Aborting estimation run {}", task.id());
            task.abort();
        }
        self.failure = None;
        self.state = SessionState::Rejected;
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Running => Err(SessionError::Busy),
            SessionState::Committed | SessionState::Rejected => Err(SessionError::Closed),
        }
    }

    fn no_run_error(&self) -> SessionError {
        match (&self.failure, self.state) {
            (Some(e), _) => SessionError::Estimation(e.clone()),
            (None, state) if state.is_terminal() => SessionError::Closed,
            _ => SessionError::NotRunning,
        }
    }

    fn disconnected(&mut self) -> SessionError {
        log::warn!("Estimation run stopped without finishing");
        self.running = None;
        self.state = SessionState::Idle;
        SessionError::TaskDisconnected
    }
}

/// `floor(secs * sample_rate)`. Non-finite times map out of range.
fn seconds_to_index(secs: f64, sample_rate: f64) -> i64 {
    if secs.is_finite() {
        (secs * sample_rate).floor() as i64
    } else {
        -1
    }
}
