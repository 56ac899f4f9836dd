// Analysis window
// Window bounds, their construction rules, and the limits exposed for editing

use serde::Serialize;
use thiserror::Error;

/// Shortest analysis window, in seconds
pub const MIN_MARGIN_SECS: f64 = 0.5;

/// Shortest analysis window in samples at `sample_rate`
pub fn min_margin_samples(sample_rate: f64) -> usize {
    (MIN_MARGIN_SECS * sample_rate).ceil() as usize
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("Start sample {start} outside record of {len} samples")]
    StartOutOfRange { start: i64, len: usize },
    #[error("End sample {end} outside record of {len} samples")]
    EndOutOfRange { end: i64, len: usize },
    #[error("Window [{start}, {end}) must span at least {min_secs} s")]
    WindowTooShort { start: i64, end: i64, min_secs: f64 },
    #[error("Event at sample {time} is not strictly inside [{start}, {end})")]
    EventOutsideWindow { time: usize, start: usize, end: usize },
}

/// Sample range `[start, end)` analysed by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalWindow {
    start: usize,
    end: usize,
}

impl SignalWindow {
    /// Validate a window over a record of `len` samples
    pub fn new(start: i64, end: i64, len: usize, sample_rate: f64) -> Result<Self, WindowError> {
        let n = len as i64;
        if start < 0 || start >= n {
            return Err(WindowError::StartOutOfRange { start, len });
        }
        if end < 0 || end >= n {
            return Err(WindowError::EndOutOfRange { end, len });
        }
        if ((end - start) as f64) < MIN_MARGIN_SECS * sample_rate {
            return Err(WindowError::WindowTooShort {
                start,
                end,
                min_secs: MIN_MARGIN_SECS,
            });
        }

        Ok(SignalWindow {
            start: start as usize,
            end: end as usize,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start + (end - start) / 2`
    pub fn midpoint(&self) -> usize {
        self.start + self.len() / 2
    }

    pub fn contains_strictly(&self, time: usize) -> bool {
        self.start < time && time < self.end
    }

    /// Check that `time` may be the event time of this window
    pub fn check_event(&self, time: usize) -> Result<(), WindowError> {
        if self.contains_strictly(time) {
            Ok(())
        } else {
            Err(WindowError::EventOutsideWindow {
                time,
                start: self.start,
                end: self.end,
            })
        }
    }

    pub(crate) fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    pub(crate) fn set_end(&mut self, end: usize) {
        self.end = end;
    }
}

/// Legal values for each bound, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundLimits {
    pub start_min: usize,
    pub start_max: usize,
    pub end_min: usize,
    pub end_max: usize,
}

impl BoundLimits {
    /// Limits covering a whole record of `len` samples
    pub fn for_record(len: usize, min_margin: usize) -> Self {
        BoundLimits {
            start_min: 0,
            start_max: len.saturating_sub(min_margin),
            end_min: min_margin,
            end_max: len,
        }
    }

    /// Limits for a record of `len` samples, coupled to `window` so that
    /// no edit can bring the bounds closer than `min_margin`
    pub fn for_window(len: usize, window: &SignalWindow, min_margin: usize) -> Self {
        let mut limits = Self::for_record(len, min_margin);
        limits.follow_start(window.start(), min_margin);
        limits.follow_end(window.end(), min_margin);
        limits
    }

    pub fn clamp_start(&self, start: i64) -> usize {
        start
            .max(self.start_min as i64)
            .min(self.start_max as i64)
            .max(0) as usize
    }

    pub fn clamp_end(&self, end: i64) -> usize {
        end.max(self.end_min as i64).min(self.end_max as i64).max(0) as usize
    }

    /// The end may not come closer than `min_margin` to a new start
    pub(crate) fn follow_start(&mut self, start: usize, min_margin: usize) {
        self.end_min = start + min_margin;
    }

    /// The start may not come closer than `min_margin` to a new end
    pub(crate) fn follow_end(&mut self, end: usize, min_margin: usize) {
        self.start_max = end.saturating_sub(min_margin);
    }
}
