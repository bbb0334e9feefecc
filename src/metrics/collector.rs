//! Per-run timing collector
//!
//! Two aggregates are kept side by side: the compute time each step
//! reported, and the wall-clock period between consecutive recorded steps.
//! The second is what a viewer experiences as frame rate.

use std::time::Instant;

use super::metric::PerformanceMetric;

/// One line of a benchmark log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    /// Total bodies simulated
    pub bodies: usize,
    pub calc_min: f64,
    pub calc_max: f64,
    pub calc_avg: f64,
    pub fps_min: f64,
    pub fps_max: f64,
    pub fps_avg: f64,
}

/// Collects step times and frame periods for one measurement span
#[derive(Debug, Clone)]
pub struct PerformanceCollector {
    calc: PerformanceMetric,
    frames: PerformanceMetric,
    last_frame: Instant,
}

impl Default for PerformanceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceCollector {
    /// Fresh collector; the first frame period is measured from now
    pub fn new() -> Self {
        Self {
            calc: PerformanceMetric::new(),
            frames: PerformanceMetric::new(),
            last_frame: Instant::now(),
        }
    }

    /// Record the compute time of one step and close the current frame
    pub fn record(&mut self, calc_seconds: f64) {
        let now = Instant::now();
        self.record_with_period(calc_seconds, now.duration_since(self.last_frame).as_secs_f64());
        self.last_frame = now;
    }

    /// Record a step with an explicitly measured frame period
    pub fn record_with_period(&mut self, calc_seconds: f64, frame_seconds: f64) {
        self.calc.record(calc_seconds);
        self.frames.record(frame_seconds);
    }

    pub fn calc_times(&self) -> &PerformanceMetric {
        &self.calc
    }

    pub fn frame_times(&self) -> &PerformanceMetric {
        &self.frames
    }

    pub fn steps(&self) -> usize {
        self.calc.len()
    }

    /// Aggregate row for `bodies`; `None` until at least one step is recorded
    ///
    /// The slowest frame gives the lowest frame rate, so `fps_min` comes
    /// from the longest period.
    pub fn summary(&self, bodies: usize) -> Option<SummaryRow> {
        Some(SummaryRow {
            bodies,
            calc_min: self.calc.min()?,
            calc_max: self.calc.max()?,
            calc_avg: self.calc.avg()?,
            fps_min: self.frames.max()?.recip(),
            fps_max: self.frames.min()?.recip(),
            fps_avg: self.frames.avg()?.recip(),
        })
    }
}
