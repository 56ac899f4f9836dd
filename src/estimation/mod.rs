// Onset estimation module
// Estimator contract, cancellable estimation tasks, and the worker that runs them

pub mod aic;
pub mod runner;
pub mod task;
pub mod types;

pub use aic::AicPicker;
pub use runner::{RunningTask, Worker};
pub use task::{AbortHandle, EstimationTask};
pub use types::{EstimationError, EstimationResult, OnsetEstimator, TaskEvent, TaskOutcome};
