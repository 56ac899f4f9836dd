// Seispick - interactive refinement of seismic event onsets
// Module declarations

pub mod estimation;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod state;

pub use estimation::{AicPicker, EstimationTask, OnsetEstimator, Worker};
pub use record::Record;
pub use session::{CommitOutcome, RefinementSession, SessionError};
pub use state::{Document, EventStore, SettingsFile, SettingsProvider};
