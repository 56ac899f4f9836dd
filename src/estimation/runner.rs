// Worker execution context
// Runs estimation tasks on the tokio blocking pool and relays their notifications

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::task::{AbortHandle, EstimationTask};
use super::types::{EstimationError, TaskEvent, TaskOutcome};
use crate::pipeline::{RunTraceEntry, TraceWriter};

/// Submits estimation tasks to worker threads.
///
/// Estimator errors and panics are caught here and forwarded as
/// `TaskEvent::Failed` so the interactive side can report them.
#[derive(Clone)]
pub struct Worker {
    runtime: Handle,
    trace: Option<Arc<TraceWriter>>,
}

impl Worker {
    pub fn new(runtime: Handle) -> Self {
        Worker {
            runtime,
            trace: None,
        }
    }

    /// Worker bound to the runtime of the calling context
    pub fn current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Record every run in a JSONL trace
    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(Arc::new(writer));
        self
    }

    /// Start a task on the blocking pool
    pub fn submit(&self, task: EstimationTask) -> RunningTask {
        let (tx, rx) = unbounded_channel();
        let abort = task.abort_handle();
        let id = Uuid::new_v4();
        let (start, end) = (task.start(), task.end());
        let trace = self.trace.clone();

        log::info!("Submitting estimation run {} over [{}, {})", id, start, end);

        let join = self.runtime.spawn_blocking(move || {
            write_trace(&trace, RunTraceEntry::started(id, start, end));

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(&tx)))
                .unwrap_or_else(|payload| {
                    Err(EstimationError::Failed(format!(
                        "estimator panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });

            match outcome {
                Ok(TaskOutcome::Completed { time }) => {
                    write_trace(&trace, RunTraceEntry::completed(id, start, end, time));
                }
                Ok(TaskOutcome::Aborted) => {
                    log::info!("Estimation run {} aborted", id);
                    write_trace(&trace, RunTraceEntry::aborted(id, start, end));
                }
                Err(e) => {
                    log::error!("Estimation run {} failed: {}", id, e);
                    write_trace(&trace, RunTraceEntry::failed(id, start, end, e.to_string()));
                    let _ = tx.send(TaskEvent::Failed(e));
                }
            }
        });

        RunningTask {
            id,
            start,
            end,
            events: rx,
            abort,
            join,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

fn write_trace(trace: &Option<Arc<TraceWriter>>, entry: RunTraceEntry) {
    if let Some(writer) = trace {
        if let Err(e) = writer.write(&entry) {
            log::warn!("Failed to write run trace to {:?}: {}", writer.path(), e);
        }
    }
}

/// Interactive-side handle to a submitted task.
///
/// Dropping it aborts the task.
pub struct RunningTask {
    id: Uuid,
    start: usize,
    end: usize,
    events: UnboundedReceiver<TaskEvent>,
    abort: AbortHandle,
    join: JoinHandle<()>,
}

impl RunningTask {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Analysis window the task was started with
    pub fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Request cancellation. Takes effect at the task's next checkpoint.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Whether the worker thread has returned
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Next notification without waiting
    pub fn try_recv(&mut self) -> Result<TaskEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// Wait for the next notification. `None` once the worker is done
    /// and every notification has been received.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        self.events.recv().await
    }
}

impl Drop for RunningTask {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::types::{EstimationError, EstimationResult, OnsetEstimator};
    use crate::pipeline::{read_trace_file, RunStage};
    use crate::record::Record;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn test_record() -> Arc<Record> {
        Arc::new(Record::new("test", vec![0.0; 10_000], 100.0).unwrap())
    }

    fn fixed_estimator(time: usize) -> Arc<dyn OnsetEstimator> {
        Arc::new(
            move |_: &[f32], _: f64, _: f64, _: f64| -> Result<EstimationResult, EstimationError> {
                Ok(EstimationResult {
                    time,
                    aic: vec![1.0, 0.5, 2.0],
                    onset_index: 1,
                })
            },
        )
    }

    async fn collect(running: &mut RunningTask) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = running.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_submit_delivers_result_then_finished() {
        let worker = Worker::current().unwrap();
        let task = EstimationTask::new(test_record(), fixed_estimator(505), 400, 600);

        let mut running = worker.submit(task);
        assert_eq!(running.range(), (400, 600));

        let events = collect(&mut running).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], TaskEvent::PositionEstimated(r) if r.time == 505));
        assert_eq!(events[1], TaskEvent::Finished);
    }

    #[tokio::test]
    async fn test_estimator_error_is_relayed_as_failed() {
        let estimator: Arc<dyn OnsetEstimator> = Arc::new(
            |_: &[f32], _: f64, _: f64, _: f64| -> Result<EstimationResult, EstimationError> {
                Err(EstimationError::DegenerateWindow("flat signal".to_string()))
            },
        );
        let worker = Worker::current().unwrap();

        let mut running = worker.submit(EstimationTask::new(test_record(), estimator, 400, 600));
        let events = collect(&mut running).await;

        assert_eq!(
            events,
            vec![TaskEvent::Failed(EstimationError::DegenerateWindow(
                "flat signal".to_string()
            ))]
        );
    }

    #[tokio::test]
    async fn test_estimator_panic_is_relayed_as_failed() {
        let estimator: Arc<dyn OnsetEstimator> = Arc::new(
            |_: &[f32], _: f64, _: f64, _: f64| -> Result<EstimationResult, EstimationError> {
                panic!("matrix not positive definite")
            },
        );
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("runs.jsonl");
        let worker = Worker::current()
            .unwrap()
            .with_trace(TraceWriter::new(trace_path.clone()));

        let mut running = worker.submit(EstimationTask::new(test_record(), estimator, 400, 600));
        let events = collect(&mut running).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            TaskEvent::Failed(EstimationError::Failed(msg)) => {
                assert!(msg.contains("matrix not positive definite"), "{}", msg);
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.last().map(|e| e.stage), Some(RunStage::Failed));
    }

    #[tokio::test]
    async fn test_abort_while_estimating_sends_nothing() {
        // The estimator blocks until the test has requested the abort
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let estimator: Arc<dyn OnsetEstimator> = Arc::new(
            move |_: &[f32], _: f64, _: f64, _: f64| -> Result<EstimationResult, EstimationError> {
                let _ = entered_tx.lock().unwrap().send(());
                let _ = release_rx.lock().unwrap().recv();
                Ok(EstimationResult {
                    time: 500,
                    aic: vec![],
                    onset_index: 0,
                })
            },
        );

        let worker = Worker::current().unwrap();
        let mut running = worker.submit(EstimationTask::new(test_record(), estimator, 400, 600));

        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();
        running.abort();
        release_tx.send(()).unwrap();

        assert!(collect(&mut running).await.is_empty());
        assert!(running.abort_handle().is_aborted());
    }

    #[tokio::test]
    async fn test_runs_are_traced() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("runs.jsonl");
        let worker = Worker::current()
            .unwrap()
            .with_trace(TraceWriter::new(trace_path.clone()));

        let mut running =
            worker.submit(EstimationTask::new(test_record(), fixed_estimator(480), 400, 600));
        let run_id = running.id();
        collect(&mut running).await;

        // The completed line is written before the sender is dropped
        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.run_id == run_id));
        assert_eq!(entries[0].stage, RunStage::Started);
        assert_eq!(entries[1].stage, RunStage::Completed);
        assert_eq!(entries[1].time, Some(480));
    }

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(Worker::current().is_err());
    }
}
