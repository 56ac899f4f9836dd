// AIC plot data
// What a plot surface needs to draw the refined pick

use serde::Serialize;

use super::window::SignalWindow;
use crate::estimation::EstimationResult;
use crate::record::{envelope, Record};

/// Signal, envelope and AIC curve of one estimation, aligned at `start`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AicPlot {
    /// First sample of the plotted range
    pub start: usize,
    pub sample_rate: f64,
    pub signal: Vec<f32>,
    /// Empty when the envelope could not be computed
    pub envelope: Vec<f32>,
    pub aic: Vec<f64>,
    pub onset_index: usize,
    /// Absolute sample of the estimated arrival
    pub event_time: usize,
}

impl AicPlot {
    pub fn build(record: &Record, window: &SignalWindow, result: &EstimationResult) -> Self {
        let end = window.end().min(record.len());
        let start = window.start().min(end);
        let signal = record.signal()[start..end].to_vec();

        let envelope = match envelope(&signal) {
            Ok(env) => env,
            Err(e) => {
                log::warn!("Skipping envelope for [{}, {}): {}", start, end, e);
                Vec::new()
            }
        };

        AicPlot {
            start,
            sample_rate: record.sample_rate(),
            signal,
            envelope,
            aic: result.aic.clone(),
            onset_index: result.onset_index,
            event_time: result.time,
        }
    }

    /// Time in seconds of each plotted sample
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.signal.len())
            .map(|i| (self.start + i) as f64 / self.sample_rate)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Where refinement results get drawn
pub trait PlotSurface {
    fn render_aic(&mut self, plot: &AicPlot);
}

/// Keeps every plot it is handed
#[derive(Debug, Default)]
pub struct PlotHistory {
    plots: Vec<AicPlot>,
}

impl PlotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plots(&self) -> &[AicPlot] {
        &self.plots
    }

    pub fn last(&self) -> Option<&AicPlot> {
        self.plots.last()
    }
}

impl PlotSurface for PlotHistory {
    fn render_aic(&mut self, plot: &AicPlot) {
        self.plots.push(plot.clone());
    }
}
