// Estimation run tracing
// Append-only JSONL log of every estimation run and how it ended

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stage of an estimation run recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Started,
    Completed,
    Aborted,
    Failed,
}

/// A single line of the run trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTraceEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,

    /// Run this entry belongs to
    pub run_id: Uuid,

    pub stage: RunStage,

    /// Analysis window in samples
    pub start: usize,
    pub end: usize,

    /// Estimated onset, for completed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<usize>,

    /// Error text, for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunTraceEntry {
    fn new(run_id: Uuid, stage: RunStage, start: usize, end: usize) -> Self {
        RunTraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            stage,
            start,
            end,
            time: None,
            message: None,
        }
    }

    pub fn started(run_id: Uuid, start: usize, end: usize) -> Self {
        Self::new(run_id, RunStage::Started, start, end)
    }

    pub fn completed(run_id: Uuid, start: usize, end: usize, time: usize) -> Self {
        RunTraceEntry {
            time: Some(time),
            ..Self::new(run_id, RunStage::Completed, start, end)
        }
    }

    pub fn aborted(run_id: Uuid, start: usize, end: usize) -> Self {
        Self::new(run_id, RunStage::Aborted, start, end)
    }

    pub fn failed(run_id: Uuid, start: usize, end: usize, message: impl Into<String>) -> Self {
        RunTraceEntry {
            message: Some(message.into()),
            ..Self::new(run_id, RunStage::Failed, start, end)
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Run trace writer.
/// Several worker threads may share one writer; lines never interleave.
pub struct TraceWriter {
    file_path: PathBuf,
    lock: Mutex<()>,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter {
            file_path,
            lock: Mutex::new(()),
        }
    }

    /// Append an entry, creating the file if needed
    pub fn write(&self, entry: &RunTraceEntry) -> Result<(), TraceError> {
        let json_line = entry.to_json_line()?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<RunTraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: RunTraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_constructors() {
        let run_id = Uuid::new_v4();

        let started = RunTraceEntry::started(run_id, 400, 600);
        assert_eq!(started.stage, RunStage::Started);
        assert!(started.time.is_none());

        let completed = RunTraceEntry::completed(run_id, 400, 600, 512);
        assert_eq!(completed.stage, RunStage::Completed);
        assert_eq!(completed.time, Some(512));

        let failed = RunTraceEntry::failed(run_id, 400, 600, "boom");
        assert_eq!(failed.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_json_line_format() {
        let entry = RunTraceEntry::aborted(Uuid::new_v4(), 1, 2);
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"stage\":\"aborted\""));
        // Optional fields are left out
        assert!(!json_line.contains("\"time\""));
        assert!(!json_line.contains("\"message\""));
    }

    #[test]
    fn test_trace_writer_appends() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("runs.jsonl");
        let writer = TraceWriter::new(trace_path.clone());
        let run_id = Uuid::new_v4();

        writer.write(&RunTraceEntry::started(run_id, 400, 600)).unwrap();
        writer
            .write(&RunTraceEntry::completed(run_id, 400, 600, 505))
            .unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].run_id, run_id);
        assert_eq!(entries[0].stage, RunStage::Started);
        assert_eq!(entries[1].stage, RunStage::Completed);
        assert_eq!(entries[1].time, Some(505));
    }
}
