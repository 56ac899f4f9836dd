// Reference AIC onset picker
// Single-model AIC computed directly from the waveform (the order-0 AR case).
// Hosts plug their Takanami AR implementation in through `OnsetEstimator`;
// this picker backs the command line tool and the tests.

use super::types::{EstimationError, EstimationResult, OnsetEstimator};

/// Minimum samples on each side of a candidate onset
const MIN_SEGMENT: usize = 2;

/// Picks the onset at the minimum of
/// `AIC(k) = k ln(var(x[..k])) + (n - k) ln(var(x[k..]))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AicPicker;

impl AicPicker {
    pub fn new() -> Self {
        AicPicker
    }
}

impl OnsetEstimator for AicPicker {
    fn estimate(
        &self,
        signal: &[f32],
        sample_rate: f64,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<EstimationResult, EstimationError> {
        if !start_secs.is_finite()
            || !end_secs.is_finite()
            || start_secs < 0.0
            || end_secs <= start_secs
        {
            return Err(EstimationError::InvalidRange {
                start_secs,
                end_secs,
            });
        }

        let start = (start_secs * sample_rate).round() as usize;
        let end = ((end_secs * sample_rate).round() as usize).min(signal.len());
        if end < start + 2 * MIN_SEGMENT {
            return Err(EstimationError::DegenerateWindow(format!(
                "{} samples between {:.3}s and {:.3}s",
                end.saturating_sub(start),
                start_secs,
                end_secs
            )));
        }

        let aic = aic_curve(&signal[start..end])?;
        let onset_index = aic
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .ok_or_else(|| EstimationError::Numerical("empty AIC curve".to_string()))?;

        Ok(EstimationResult {
            time: start + onset_index,
            aic,
            onset_index,
        })
    }
}

/// AIC value for every split point of `x`.
/// Split points too close to either edge repeat the nearest valid value.
pub fn aic_curve(x: &[f32]) -> Result<Vec<f64>, EstimationError> {
    let n = x.len();
    if n < 2 * MIN_SEGMENT {
        return Err(EstimationError::DegenerateWindow(format!("{} samples", n)));
    }

    // Prefix sums of x and x^2
    let mut sum = vec![0.0f64; n + 1];
    let mut sum_sq = vec![0.0f64; n + 1];
    for (i, &v) in x.iter().enumerate() {
        let v = v as f64;
        sum[i + 1] = sum[i] + v;
        sum_sq[i + 1] = sum_sq[i] + v * v;
    }

    let variance = |from: usize, to: usize| -> f64 {
        let len = (to - from) as f64;
        let mean = (sum[to] - sum[from]) / len;
        ((sum_sq[to] - sum_sq[from]) / len - mean * mean).max(0.0)
    };

    if variance(0, n) == 0.0 {
        return Err(EstimationError::DegenerateWindow("constant signal".to_string()));
    }

    // Keeps ln finite when one side is flat
    let floor = f64::EPSILON * variance(0, n);

    let first = MIN_SEGMENT;
    let last = n - MIN_SEGMENT;
    let mut aic = vec![0.0; n];
    for k in first..=last {
        let left = variance(0, k).max(floor);
        let right = variance(k, n).max(floor);
        let value = k as f64 * left.ln() + (n - k) as f64 * right.ln();
        if !value.is_finite() {
            return Err(EstimationError::Numerical(format!(
                "non-finite AIC at split {}",
                k
            )));
        }
        aic[k] = value;
    }
    for k in 0..first {
        aic[k] = aic[first];
    }
    for k in last + 1..n {
        aic[k] = aic[last];
    }

    Ok(aic)
}
