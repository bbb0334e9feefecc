//! GPU backend built on wgpu compute shaders
//!
//! - [`GpuContext`]: adapter selection and device creation
//! - [`KernelConfig`]: work-group and tile sizing derived from device limits
//! - [`KernelShaders`]: WGSL source for the naive and tiled force kernels
//! - [`AcceleratorEngine`]: buffer lifecycle, dispatch and timing
//!
//! # Example
//!
//! ```rust,ignore
//! use nbodysim::config::RunConfig;
//! use nbodysim::dataset::{BodySource, SolarSystem};
//! use nbodysim::gpu::{AcceleratorEngine, GpuContext, InteropMode};
//!
//! let cfg = RunConfig::default();
//! let mut state = SolarSystem::new(cfg.dataset.clone()).with_count(1000).build()?;
//!
//! let ctx = GpuContext::new(None)?;
//! let mut engine = AcceleratorEngine::new(ctx, cfg.kernel, cfg.physics, InteropMode::Shared);
//! engine.configure(&state)?;
//! let seconds = engine.step(&mut state)?;
//! ```

pub mod context;
pub mod engine;
pub mod shaders;
pub mod types;

pub use context::{AdapterSummary, GpuContext};
pub use engine::AcceleratorEngine;
pub use shaders::KernelShaders;
pub use types::{DeviceCapabilities, InteropMode, KernelConfig, StepUniforms, TilingVariant};
