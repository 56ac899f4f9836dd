// Refinement session module
// Window bookkeeping, labels, plot data, and the interactive session state machine

pub mod display;
pub mod plot;
pub mod refinement;
pub mod window;

pub use display::{arrival_label, format_millis, format_sample_time};
pub use plot::{AicPlot, PlotHistory, PlotSurface};
pub use refinement::{CommitOutcome, RefinementSession, RunProgress, SessionError, SessionState};
pub use window::{min_margin_samples, BoundLimits, SignalWindow, WindowError, MIN_MARGIN_SECS};
