//! Benchmark log: one CSV file per sweep
//!
//! The first line describes the machine and build, the second is the column
//! header, and every completed sweep entry appends one row.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use super::collector::SummaryRow;
use crate::error::SimResult;
use crate::gpu::TilingVariant;

/// Column header written below the description line
pub const CSV_HEADER: &str = "nbody,calc_min,calc_max,calc_avg,fps_min,fps_max,fps_avg";

/// Destination for completed sweep rows
pub trait SummarySink {
    fn record(&mut self, row: &SummaryRow) -> SimResult<()>;
}

impl SummarySink for Vec<SummaryRow> {
    fn record(&mut self, row: &SummaryRow) -> SimResult<()> {
        self.push(*row);
        Ok(())
    }
}

// ============================================================================
// Description line
// ============================================================================

/// Accelerator half of the description
#[derive(Debug, Clone, PartialEq)]
pub struct AcceleratorDescription {
    pub adapter: String,
    pub variant: TilingVariant,
}

/// Machine and build summary written at the top of a log
#[derive(Debug, Clone, PartialEq)]
pub struct RunDescription {
    pub os: String,
    pub cpu_model: String,
    /// Present when the accelerator backend is in use
    pub accelerator: Option<AcceleratorDescription>,
    /// Host worker count; absent when the host backend is not in use
    pub host_threads: Option<usize>,
    pub release: bool,
    pub simd: bool,
}

impl RunDescription {
    /// Describe the current machine and build
    pub fn detect(accelerator: Option<AcceleratorDescription>, host_threads: Option<usize>) -> Self {
        Self {
            os: os_label().to_string(),
            cpu_model: cpu_model(),
            accelerator,
            host_threads,
            release: !cfg!(debug_assertions),
            simd: cfg!(feature = "simd"),
        }
    }
}

impl fmt::Display for RunDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.os)?;
        match &self.accelerator {
            Some(acc) => write!(f, " GPU ({}) Kernel: {}", acc.adapter, acc.variant)?,
            None => write!(f, " CPU ({})", self.cpu_model)?,
        }
        if let Some(threads) = self.host_threads {
            f.write_str(if self.release {
                " Release Mode"
            } else {
                " Debug Mode"
            })?;
            if self.simd {
                f.write_str(" - with SIMD")?;
            }
            write!(f, " - with {threads} threads")?;
        }
        Ok(())
    }
}

fn os_label() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "macOS",
        _ => "Unknown OS",
    }
}

/// CPU model name from /proc/cpuinfo, or "Unknown CPU"
pub fn cpu_model() -> String {
    fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|content| parse_cpu_model(&content))
        .unwrap_or_else(|| "Unknown CPU".to_string())
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
}

// ============================================================================
// CSV file
// ============================================================================

/// CSV log file that rows are appended to
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    /// Create `<dir>/<unix-seconds>.csv`, creating `dir` if needed
    pub fn create(dir: &Path, description: &str) -> SimResult<Self> {
        fs::create_dir_all(dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut path = dir.join(format!("{stamp}.csv"));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{stamp}-{suffix}.csv"));
            suffix += 1;
        }
        Self::with_path(path, description)
    }

    /// Create (or truncate) a log at an explicit path
    pub fn with_path(path: impl Into<PathBuf>, description: &str) -> SimResult<Self> {
        let path = path.into();
        let mut file = File::create(&path)?;
        writeln!(file, "{description}")?;
        writeln!(file, "{CSV_HEADER}")?;
        info!(path = %path.display(), "benchmark log created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummarySink for CsvLog {
    fn record(&mut self, row: &SummaryRow) -> SimResult<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            row.bodies,
            row.calc_min,
            row.calc_max,
            row.calc_avg,
            row.fps_min,
            row.fps_max,
            row.fps_avg
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn description(accelerator: Option<AcceleratorDescription>, threads: Option<usize>) -> RunDescription {
        RunDescription {
            os: "Linux".to_string(),
            cpu_model: "Test CPU 3000".to_string(),
            accelerator,
            host_threads: threads,
            release: true,
            simd: false,
        }
    }

    #[test]
    fn describes_host_runs() {
        assert_eq!(
            description(None, Some(8)).to_string(),
            "Linux CPU (Test CPU 3000) Release Mode - with 8 threads"
        );
    }

    #[test]
    fn describes_accelerator_runs() {
        let acc = AcceleratorDescription {
            adapter: "Test GPU".to_string(),
            variant: TilingVariant::SharedTile,
        };
        assert_eq!(
            description(Some(acc.clone()), None).to_string(),
            "Linux GPU (Test GPU) Kernel: shared-tile"
        );
        let mut both = description(Some(acc), Some(4));
        both.release = false;
        both.simd = true;
        assert_eq!(
            both.to_string(),
            "Linux GPU (Test GPU) Kernel: shared-tile Debug Mode - with SIMD - with 4 threads"
        );
    }

    #[test]
    fn parses_model_name() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: Acme\nmodel name\t: Acme Hyper 9 @ 4.2GHz\n";
        assert_eq!(
            parse_cpu_model(cpuinfo).as_deref(),
            Some("Acme Hyper 9 @ 4.2GHz")
        );
        assert_eq!(parse_cpu_model("processor\t: 0\n"), None);
    }

    #[test]
    fn csv_log_layout() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut log = CsvLog::create(&dir.path().join("benchmarks"), "Linux CPU (Test)").unwrap();
        log.record(&SummaryRow {
            bodies: 16,
            calc_min: 0.5,
            calc_max: 2.0,
            calc_avg: 1.0,
            fps_min: 0.25,
            fps_max: 1.0,
            fps_avg: 0.5,
        })
        .unwrap();
        log.record(&SummaryRow {
            bodies: 128,
            calc_min: 1.5,
            calc_max: 3.0,
            calc_avg: 2.25,
            fps_min: 0.125,
            fps_max: 0.5,
            fps_avg: 0.25,
        })
        .unwrap();

        assert!(log.path().starts_with(dir.path().join("benchmarks")));
        assert_eq!(log.path().extension().and_then(|e| e.to_str()), Some("csv"));

        let contents = fs::read_to_string(log.path()).unwrap();
        insta::assert_snapshot!(contents.trim_end(), @r"
        Linux CPU (Test)
        nbody,calc_min,calc_max,calc_avg,fps_min,fps_max,fps_avg
        16,0.5,2,1,0.25,1,0.5
        128,1.5,3,2.25,0.125,0.5,0.25
        ");
    }

    #[test]
    fn logs_in_the_same_second_get_distinct_files() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let a = CsvLog::create(dir.path(), "first").unwrap();
        let b = CsvLog::create(dir.path(), "second").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn vec_sink_collects_rows() {
        let mut rows: Vec<SummaryRow> = Vec::new();
        let row = SummaryRow {
            bodies: 9,
            calc_min: 1.0,
            calc_max: 1.0,
            calc_avg: 1.0,
            fps_min: 1.0,
            fps_max: 1.0,
            fps_avg: 1.0,
        };
        rows.record(&row).unwrap();
        assert_eq!(rows, vec![row]);
    }
}
