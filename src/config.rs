//! Run configuration loaded from YAML
//!
//! Every section is optional and falls back to its defaults, so an empty
//! file (or no file at all) describes a valid run. Command-line flags are
//! applied on top by the binary.
//!
//! ```yaml
//! physics:
//!   g: 6.67e-11
//!   dt: 86400.0
//! host:
//!   threads: 8
//! kernel:
//!   variant: shared-tile
//!   workgroup_divisor: 16
//!   local_memory_headroom: 4
//! dataset:
//!   count: 1000
//!   distribution: uniform
//!   seed: 42
//! benchmark:
//!   body_counts: [7, 119, 1015]
//!   short_sweep_len: 2
//!   warmup_steps: 120
//!   measured_steps: 10
//!   floor_seconds: 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::RandomBodies;
use crate::error::{SimError, SimResult};
use crate::gpu::TilingVariant;

/// Gravitational constant in m³ kg⁻¹ s⁻²
pub const DEFAULT_G: f32 = 6.67e-11;

/// One day, in seconds
pub const DEFAULT_DT: f32 = 86_400.0;

/// Physical constants shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    pub g: f32,
    pub dt: f32,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            g: DEFAULT_G,
            dt: DEFAULT_DT,
        }
    }
}

/// Host backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Size of a dedicated rayon pool; the global pool when absent
    pub threads: Option<usize>,
}

/// Accelerator kernel selection and sizing knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelTuning {
    pub variant: TilingVariant,
    /// Work-group size = device max items / this
    pub workgroup_divisor: u32,
    /// Tile bodies = (local memory bytes / 16) / this
    pub local_memory_headroom: u32,
    /// Adapter index or name fragment; high-performance default when absent
    pub adapter: Option<String>,
}

impl Default for KernelTuning {
    fn default() -> Self {
        Self {
            variant: TilingVariant::Naive,
            workgroup_divisor: 16,
            local_memory_headroom: 4,
            adapter: None,
        }
    }
}

/// Body-count sweep settings for benchmark mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Random bodies per sweep entry, ascending; nine fixed bodies are added
    pub body_counts: Vec<usize>,
    /// Entries used by the short sweep
    pub short_sweep_len: usize,
    /// Total warm-up steps allowed before a measurement is forced
    pub warmup_steps: usize,
    /// Steps aggregated into one summary row
    pub measured_steps: usize,
    /// Average step times below this trigger more warm-up
    pub floor_seconds: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            body_counts: vec![7, 119, 1015, 10231, 20471, 102391, 204791, 409591],
            short_sweep_len: 6,
            warmup_steps: 120,
            measured_steps: 10,
            floor_seconds: 1.0,
        }
    }
}

impl SweepConfig {
    /// Body counts must be strictly increasing
    pub fn validate(&self) -> SimResult<()> {
        if let Some(pair) = self.body_counts.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SimError::InvalidSweep(format!(
                "body counts must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }
}

/// Everything a run needs besides the backend choice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub physics: PhysicalConstants,
    pub host: HostConfig,
    pub kernel: KernelTuning,
    pub dataset: RandomBodies,
    pub benchmark: SweepConfig,
}

impl RunConfig {
    /// Load from a YAML file
    pub fn from_yaml_file(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse YAML text; an empty document yields the defaults
    pub fn from_yaml_str(text: &str) -> SimResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.benchmark.validate()?;
        Ok(config)
    }
}
