//! Ordered timing samples with a read-only aggregate view

/// Durations in seconds, in the order they were recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMetric {
    samples: Vec<f64>,
}

impl PerformanceMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one duration
    pub fn record(&mut self, seconds: f64) {
        self.samples.push(seconds);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn min(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    pub fn avg(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }
}
