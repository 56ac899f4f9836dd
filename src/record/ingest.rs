// Record ingestion module
// Reads WAV files into mono seismic records

use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use thiserror::Error;

use super::Record;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to read WAV file: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid record data")]
    InvalidData,

    #[error("FFT failed: {0}")]
    Fft(String),
}

/// Ingest a WAV file from raw bytes.
/// Multi-channel files are averaged down to a single trace.
pub fn ingest_wav(name: &str, data: &[u8]) -> Result<Record, RecordError> {
    let mut reader = WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(RecordError::InvalidData);
    }

    // Seismic WAV exports are usually raw counts; keep integer
    // amplitudes as-is rather than scaling to [-1, 1]
    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8..=32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(RecordError::UnsupportedFormat(format!(
                "{:?} {}-bit",
                format, bits
            )));
        }
    };

    let samples = to_mono(&interleaved, channels);

    log::debug!(
        "Ingested {}: {} Hz, {} channels, {} samples",
        name,
        spec.sample_rate,
        channels,
        samples.len()
    );

    Record::new(name, samples, spec.sample_rate as f64)
}

/// Average interleaved frames into one channel
fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
