// Onset estimation types
// Estimator contract, estimation results, and task notifications

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an onset estimator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimationError {
    #[error("Invalid analysis range: {start_secs}s to {end_secs}s")]
    InvalidRange { start_secs: f64, end_secs: f64 },

    #[error("Degenerate window: {0}")]
    DegenerateWindow(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Estimation failed: {0}")]
    Failed(String),
}

/// Output of one onset estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Refined arrival time as an absolute sample index
    pub time: usize,

    /// AIC curve over the analysed range
    pub aic: Vec<f64>,

    /// Index into `aic` of the selected onset
    pub onset_index: usize,
}

/// Notifications sent from a running task to the interactive side.
///
/// For a successful run the order is always `PositionEstimated` then
/// `Finished`. An aborted run sends nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// The estimator returned a result
    PositionEstimated(EstimationResult),

    /// The task completed after delivering its result
    Finished,

    /// The estimator failed. Sent by the worker context, never by the task.
    Failed(EstimationError),
}

/// How a task run ended when the estimator did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Result delivered, onset at the given sample
    Completed { time: usize },

    /// Cancelled at a checkpoint; nothing was sent
    Aborted,
}

/// An onset-estimation algorithm.
///
/// Called on a worker thread with the whole signal and the analysis
/// range in seconds. Implementations must not assume they can be
/// interrupted: cancellation is only observed before and after the call.
pub trait OnsetEstimator: Send + Sync {
    fn estimate(
        &self,
        signal: &[f32],
        sample_rate: f64,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<EstimationResult, EstimationError>;
}

impl<F> OnsetEstimator for F
where
    F: Fn(&[f32], f64, f64, f64) -> Result<EstimationResult, EstimationError> + Send + Sync,
{
    fn estimate(
        &self,
        signal: &[f32],
        sample_rate: f64,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<EstimationResult, EstimationError> {
        self(signal, sample_rate, start_secs, end_secs)
    }
}
