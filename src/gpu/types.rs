//! Kernel configuration and GPU buffer types
//!
//! [`KernelConfig`] is derived once per configuration epoch from the device
//! capabilities, the tuning knobs and the body count. Everything the shader
//! generator and the dispatch engine need to agree on lives here.

use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::config::KernelTuning;
use crate::error::{SimError, SimResult};

// =============================================================================
// Constants
// =============================================================================

/// Bytes of local memory one staged body takes (position + scaled mass)
pub const LOCAL_BYTES_PER_BODY: u32 = 16;

// =============================================================================
// Tiling variants
// =============================================================================

/// How the force kernel walks the other bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TilingVariant {
    /// One global-memory read per interacting pair
    #[default]
    Naive,
    /// Batches staged into work-group memory, barrier per batch
    SharedTile,
    /// Double-buffered batches: the next tile is staged while the current one is consumed
    AsyncCopyTile,
}

impl TilingVariant {
    pub const ALL: [TilingVariant; 3] = [
        TilingVariant::Naive,
        TilingVariant::SharedTile,
        TilingVariant::AsyncCopyTile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TilingVariant::Naive => "naive",
            TilingVariant::SharedTile => "shared-tile",
            TilingVariant::AsyncCopyTile => "async-copy-tile",
        }
    }

    /// Whether the variant stages bodies through work-group memory
    pub fn is_tiled(self) -> bool {
        !matches!(self, TilingVariant::Naive)
    }

    /// Tiles resident at once
    fn buffers(self) -> u32 {
        match self {
            TilingVariant::Naive => 0,
            TilingVariant::SharedTile => 1,
            TilingVariant::AsyncCopyTile => 2,
        }
    }
}

impl fmt::Display for TilingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TilingVariant {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TilingVariant::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimError::UnknownVariant(s.to_string()))
    }
}

// =============================================================================
// Device capabilities
// =============================================================================

/// The three device limits kernel sizing depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Maximum invocations in one work-group along x
    pub max_workgroup_items: u32,
    /// Work-group (local) memory budget in bytes
    pub local_memory_bytes: u32,
    /// Maximum work-groups in one dispatch dimension
    pub max_workgroups_per_dimension: u32,
}

impl DeviceCapabilities {
    /// Read the capabilities from device limits
    pub fn from_limits(limits: &wgpu::Limits) -> SimResult<Self> {
        let caps = Self {
            max_workgroup_items: limits
                .max_compute_invocations_per_workgroup
                .min(limits.max_compute_workgroup_size_x),
            local_memory_bytes: limits.max_compute_workgroup_storage_size,
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        };
        caps.validate()?;
        Ok(caps)
    }

    /// Reject limits no kernel could run under
    pub fn validate(&self) -> SimResult<()> {
        if self.max_workgroup_items == 0 {
            return Err(SimError::MalformedCapability(
                "device reports zero invocations per work-group".into(),
            ));
        }
        if self.max_workgroups_per_dimension == 0 {
            return Err(SimError::MalformedCapability(
                "device reports zero work-groups per dispatch dimension".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Kernel configuration
// =============================================================================

/// Sizing of one configuration epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub variant: TilingVariant,
    /// Invocations per work-group
    pub workgroup_size: u32,
    /// Bodies staged per batch; zero for the naive variant
    pub tile_bodies: u32,
    /// Number of real bodies
    pub body_count: u32,
    /// Lanes launched per pass: smallest multiple of the group size covering every body
    pub dispatch_range: u32,
}

impl KernelConfig {
    /// Derive the configuration for `body_count` bodies
    pub fn derive(
        caps: &DeviceCapabilities,
        tuning: &KernelTuning,
        body_count: usize,
    ) -> SimResult<Self> {
        caps.validate()?;

        let workgroup_size = caps
            .max_workgroup_items
            .checked_div(tuning.workgroup_divisor)
            .unwrap_or(0);
        if workgroup_size == 0 {
            return Err(SimError::ZeroWorkgroup {
                max_items: caps.max_workgroup_items,
                divisor: tuning.workgroup_divisor,
            });
        }

        if body_count == 0 {
            return Err(SimError::ZeroDispatchRange);
        }
        let body_count = u32::try_from(body_count).map_err(|_| SimError::TooManyWorkgroups {
            groups: u32::MAX,
            limit: caps.max_workgroups_per_dimension,
        })?;

        let groups = body_count.div_ceil(workgroup_size);
        if groups > caps.max_workgroups_per_dimension {
            return Err(SimError::TooManyWorkgroups {
                groups,
                limit: caps.max_workgroups_per_dimension,
            });
        }

        let tile_bodies = if tuning.variant.is_tiled() {
            let tile = (caps.local_memory_bytes / LOCAL_BYTES_PER_BODY)
                .checked_div(tuning.local_memory_headroom)
                .unwrap_or(0);
            let needed = tuning.variant.buffers() * tile * LOCAL_BYTES_PER_BODY;
            if tile == 0 || needed > caps.local_memory_bytes {
                return Err(SimError::LocalMemoryTooSmall {
                    bytes: caps.local_memory_bytes,
                    variant: tuning.variant.to_string(),
                });
            }
            tile
        } else {
            0
        };

        Ok(Self {
            variant: tuning.variant,
            workgroup_size,
            tile_bodies,
            body_count,
            dispatch_range: groups * workgroup_size,
        })
    }

    /// Work-groups per pass
    pub fn workgroups(&self) -> u32 {
        self.dispatch_range / self.workgroup_size
    }

    /// Lanes launched beyond the last body; masked out in the kernels
    pub fn idle_lanes(&self) -> u32 {
        self.dispatch_range - self.body_count
    }

    /// Work-group memory the force kernel declares
    pub fn local_memory_used(&self) -> u32 {
        self.variant.buffers() * self.tile_bodies * LOCAL_BYTES_PER_BODY
    }
}

// =============================================================================
// Buffer types
// =============================================================================

/// Per-step uniforms. Layout matches `StepUniforms` in the WGSL prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StepUniforms {
    pub body_count: u32,
    pub dt: f32,
    pub _padding: [u32; 2],
}

impl StepUniforms {
    pub fn new(body_count: u32, dt: f32) -> Self {
        Self {
            body_count,
            dt,
            _padding: [0; 2],
        }
    }
}

// =============================================================================
// Interop
// =============================================================================

/// How the engine exchanges positions with the rest of the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteropMode {
    /// The GPU owns the evolving state; positions go straight to the shared frame buffer
    Shared,
    /// The host also advances the state; positions and velocities are re-uploaded
    /// every step and positions read back into a private host copy
    Dual,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities {
            max_workgroup_items: 256,
            local_memory_bytes: 16384,
            max_workgroups_per_dimension: 65535,
        }
    }

    fn tuning(variant: TilingVariant) -> KernelTuning {
        KernelTuning {
            variant,
            ..Default::default()
        }
    }

    #[test]
    fn test_uniforms_size() {
        assert_eq!(std::mem::size_of::<StepUniforms>(), 16);
    }

    #[test]
    fn test_default_sizing() {
        let cfg = KernelConfig::derive(&caps(), &tuning(TilingVariant::SharedTile), 1000).unwrap();
        assert_eq!(cfg.workgroup_size, 16);
        assert_eq!(cfg.tile_bodies, 256);
        assert_eq!(cfg.dispatch_range, 1008);
        assert_eq!(cfg.workgroups(), 63);
        assert_eq!(cfg.idle_lanes(), 8);
        assert_eq!(cfg.local_memory_used(), 4096);
    }

    #[test]
    fn test_dispatch_range_is_smallest_covering_multiple() {
        for divisor in [1, 2, 4, 16, 64] {
            let t = KernelTuning {
                workgroup_divisor: divisor,
                ..Default::default()
            };
            for n in (1..600).chain([4095, 4096, 4097]) {
                let cfg = KernelConfig::derive(&caps(), &t, n).unwrap();
                let wi = cfg.workgroup_size;
                assert_eq!(cfg.dispatch_range % wi, 0);
                assert!(cfg.dispatch_range as usize >= n);
                assert!((cfg.dispatch_range - wi) < n as u32);
            }
        }
    }

    #[test]
    fn test_zero_guards() {
        let err = KernelConfig::derive(&caps(), &tuning(TilingVariant::Naive), 0).unwrap_err();
        assert!(matches!(err, SimError::ZeroDispatchRange));

        let t = KernelTuning {
            workgroup_divisor: 512,
            ..Default::default()
        };
        let err = KernelConfig::derive(&caps(), &t, 10).unwrap_err();
        assert!(matches!(
            err,
            SimError::ZeroWorkgroup {
                max_items: 256,
                divisor: 512
            }
        ));

        let broken = DeviceCapabilities {
            max_workgroup_items: 0,
            ..caps()
        };
        assert!(matches!(
            KernelConfig::derive(&broken, &tuning(TilingVariant::Naive), 10),
            Err(SimError::MalformedCapability(_))
        ));
    }

    #[test]
    fn test_local_memory_guard() {
        let tiny = DeviceCapabilities {
            local_memory_bytes: 32,
            ..caps()
        };
        // 32 / 16 / 4 == 0 bodies per batch
        assert!(matches!(
            KernelConfig::derive(&tiny, &tuning(TilingVariant::SharedTile), 10),
            Err(SimError::LocalMemoryTooSmall { .. })
        ));
        // Naive never touches local memory
        assert!(KernelConfig::derive(&tiny, &tuning(TilingVariant::Naive), 10).is_ok());

        // A single tile fits but a double buffer does not
        let t = KernelTuning {
            variant: TilingVariant::AsyncCopyTile,
            local_memory_headroom: 1,
            ..Default::default()
        };
        assert!(matches!(
            KernelConfig::derive(&caps(), &t, 10),
            Err(SimError::LocalMemoryTooSmall { .. })
        ));
        let t = KernelTuning {
            variant: TilingVariant::SharedTile,
            local_memory_headroom: 1,
            ..Default::default()
        };
        assert_eq!(KernelConfig::derive(&caps(), &t, 10).unwrap().tile_bodies, 1024);
    }

    #[test]
    fn test_too_many_workgroups() {
        let small = DeviceCapabilities {
            max_workgroups_per_dimension: 4,
            ..caps()
        };
        assert!(KernelConfig::derive(&small, &tuning(TilingVariant::Naive), 64).is_ok());
        assert!(matches!(
            KernelConfig::derive(&small, &tuning(TilingVariant::Naive), 65),
            Err(SimError::TooManyWorkgroups {
                groups: 5,
                limit: 4
            })
        ));
    }

    #[test]
    fn test_variant_names() {
        for v in TilingVariant::ALL {
            assert_eq!(v.as_str().parse::<TilingVariant>().unwrap(), v);
        }
        assert_eq!(
            "Shared-Tile".parse::<TilingVariant>().unwrap(),
            TilingVariant::SharedTile
        );
        assert!(matches!(
            "tiled".parse::<TilingVariant>(),
            Err(SimError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_limits_conversion() {
        let caps = DeviceCapabilities::from_limits(&wgpu::Limits::default()).unwrap();
        assert_eq!(caps.max_workgroup_items, 256);
        assert_eq!(caps.local_memory_bytes, 16384);
        assert_eq!(caps.max_workgroups_per_dimension, 65535);
    }
}
