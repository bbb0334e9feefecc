//! Performance metrics: timing samples, per-run collection, and the CSV log

pub mod collector;
pub mod log;
pub mod metric;

pub use collector::{PerformanceCollector, SummaryRow};
pub use log::{AcceleratorDescription, CSV_HEADER, CsvLog, RunDescription, SummarySink};
pub use metric::PerformanceMetric;
