// Estimation task
// One cancellable run of an onset estimator over a signal sub-range

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use super::types::{EstimationError, OnsetEstimator, TaskEvent, TaskOutcome};
use crate::record::Record;

/// Shared cancellation flag for a single task.
///
/// Aborting is cooperative: the flag is only checked right before the
/// estimator is called and right after it returns, so an abort issued
/// mid-computation takes effect once the estimator finishes.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A single-use estimation run over `[start, end)` of a record.
///
/// `run` consumes the task; running again means building a new one.
pub struct EstimationTask {
    record: Arc<Record>,
    estimator: Arc<dyn OnsetEstimator>,
    start: usize,
    end: usize,
    abort: AbortHandle,
}

impl EstimationTask {
    /// Create a task. Bounds are expected to be validated by the caller.
    pub fn new(
        record: Arc<Record>,
        estimator: Arc<dyn OnsetEstimator>,
        start: usize,
        end: usize,
    ) -> Self {
        EstimationTask {
            record,
            estimator,
            start,
            end,
            abort: AbortHandle::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Handle for aborting this task from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Request cancellation. Idempotent.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Analysis range in seconds, with the end clamped to the record length
    pub fn range_secs(&self) -> (f64, f64) {
        let fs = self.record.sample_rate();
        let start_secs = self.start as f64 / fs;
        let end_secs = self.end.min(self.record.len()) as f64 / fs;
        (start_secs, end_secs)
    }

    /// Run the estimator and report through `events`.
    ///
    /// Sends `PositionEstimated` then `Finished` on success. Returns
    /// `TaskOutcome::Aborted` without sending anything when aborted.
    /// Estimator errors are returned to the caller and nothing is sent.
    pub fn run(self, events: &UnboundedSender<TaskEvent>) -> Result<TaskOutcome, EstimationError> {
        let (start_secs, end_secs) = self.range_secs();

        if self.abort.is_aborted() {
            log::debug!("Estimation aborted before start");
            return Ok(TaskOutcome::Aborted);
        }

        let result = self.estimator.estimate(
            self.record.signal(),
            self.record.sample_rate(),
            start_secs,
            end_secs,
        )?;

        if self.abort.is_aborted() {
            log::debug!("Estimation aborted after estimator returned");
            return Ok(TaskOutcome::Aborted);
        }

        log::info!(
            "Estimated onset at sample {} ({:.3}s to {:.3}s)",
            result.time,
            start_secs,
            end_secs
        );

        let time = result.time;

        // A closed receiver means the session is gone; nothing left to notify
        if events.send(TaskEvent::PositionEstimated(result)).is_err() {
            log::debug!("Estimation result dropped: receiver closed");
            return Ok(TaskOutcome::Completed { time });
        }
        let _ = events.send(TaskEvent::Finished);

        Ok(TaskOutcome::Completed { time })
    }
}
