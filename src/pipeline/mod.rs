// Pipeline monitoring module
// Traces estimation runs executed by the worker

pub mod trace;

pub use trace::{read_trace_file, RunStage, RunTraceEntry, TraceError, TraceWriter};
