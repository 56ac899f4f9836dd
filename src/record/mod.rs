// Seismic record module
// Read-only signal buffer shared between the refinement session and its tasks

pub mod envelope;
pub mod ingest;

pub use envelope::envelope;
pub use ingest::{ingest_wav, RecordError};

use crate::state::storage::calculate_sha256;

/// A seismic record opened for picking.
///
/// The sample buffer never changes after construction, so a record is
/// shared between threads behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct Record {
    /// Display name (usually the source file name)
    name: String,

    /// Mono samples
    samples: Vec<f32>,

    /// Sample rate in Hz
    sample_rate: f64,

    /// SHA256 of the little-endian sample bytes
    sha256: String,
}

impl Record {
    /// Create a record from mono samples
    pub fn new(
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: f64,
    ) -> Result<Self, RecordError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(RecordError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(RecordError::InvalidData);
        }

        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let sha256 = calculate_sha256(&bytes);

        Ok(Record {
            name: name.into(),
            samples,
            sample_rate,
            sha256,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full signal
    pub fn signal(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples (`N`)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate in Hz (`fs`)
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Record length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Convert a sample index to seconds from the start of the record
    pub fn samples_to_secs(&self, sample: usize) -> f64 {
        sample as f64 / self.sample_rate
    }

    /// Convert seconds to a sample index, truncating toward zero.
    /// Negative and NaN times map to sample 0.
    pub fn secs_to_samples(&self, secs: f64) -> usize {
        let samples = (secs * self.sample_rate).floor();
        if samples.is_nan() || samples <= 0.0 {
            0
        } else {
            samples as usize
        }
    }
}
