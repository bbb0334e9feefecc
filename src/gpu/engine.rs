//! Accelerator dispatch engine
//!
//! The engine owns every device resource. [`AcceleratorEngine::configure`]
//! starts a configuration epoch for one body count: it derives the
//! [`KernelConfig`], builds both pipelines, uploads the scaled masses and
//! the velocities, and places the positions according to the
//! [`InteropMode`]. [`AcceleratorEngine::step`] then runs the force pass and
//! the position pass and reports the device time they took.

use std::time::Instant;

use bytemuck::Pod;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::shaders::{FORCE_ENTRY, KernelShaders, POSITION_ENTRY};
use super::types::{InteropMode, KernelConfig, StepUniforms};
use crate::config::{KernelTuning, PhysicalConstants};
use crate::error::{SimError, SimResult};
use crate::presentation::FrameBuffer;
use crate::state::SimulationState;

/// Begin/end timestamps for the force pass and the position pass
const TIMESTAMP_COUNT: u32 = 4;

/// Device-side timing of the two passes
struct PassTimer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    staging: wgpu::Buffer,
    period_ns: f64,
}

impl PassTimer {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let size = u64::from(TIMESTAMP_COUNT) * 8;
        Self {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("Pass Timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: TIMESTAMP_COUNT,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Timestamp Resolve Buffer"),
                size,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Timestamp Staging Buffer"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            period_ns: f64::from(queue.get_timestamp_period()),
        }
    }

    fn writes(&self, first: u32) -> wgpu::ComputePassTimestampWrites<'_> {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(first),
            end_of_pass_write_index: Some(first + 1),
        }
    }

    fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..TIMESTAMP_COUNT, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.staging, 0, self.resolve.size());
    }

    /// Seconds spent inside both passes
    fn elapsed(&self, device: &wgpu::Device) -> SimResult<f64> {
        let ticks: Vec<u64> = read_mapped(device, &self.staging, TIMESTAMP_COUNT as usize)?;
        let busy = ticks[1].saturating_sub(ticks[0]) + ticks[3].saturating_sub(ticks[2]);
        Ok(busy as f64 * self.period_ns * 1e-9)
    }
}

/// Resources of one configuration epoch
struct Epoch {
    config: KernelConfig,
    force_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    positions: wgpu::Buffer,
    velocities: wgpu::Buffer,
    // Kept alive to maintain GPU resource (referenced by bind_group)
    _masses: wgpu::Buffer,
    _uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    position_staging: wgpu::Buffer,
    velocity_staging: wgpu::Buffer,
    flat_bytes: u64,
}

/// Steps a [`SimulationState`] on the GPU
pub struct AcceleratorEngine {
    ctx: GpuContext,
    tuning: KernelTuning,
    constants: PhysicalConstants,
    mode: InteropMode,
    frame: Option<FrameBuffer>,
    epoch: Option<Epoch>,
    timer: Option<PassTimer>,
    readback: Vec<f32>,
    warned_wall_clock: bool,
}

impl AcceleratorEngine {
    pub fn new(
        ctx: GpuContext,
        tuning: KernelTuning,
        constants: PhysicalConstants,
        mode: InteropMode,
    ) -> Self {
        let timer = ctx
            .has_timestamps()
            .then(|| PassTimer::new(ctx.device(), ctx.queue()));
        Self {
            ctx,
            tuning,
            constants,
            mode,
            frame: None,
            epoch: None,
            timer,
            readback: Vec::new(),
            warned_wall_clock: false,
        }
    }

    /// Attach the presentation buffer positions are exchanged through
    pub fn with_frame(mut self, frame: FrameBuffer) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn mode(&self) -> InteropMode {
        self.mode
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn tuning(&self) -> &KernelTuning {
        &self.tuning
    }

    /// Configuration of the current epoch, if one is active
    pub fn config(&self) -> Option<&KernelConfig> {
        self.epoch.as_ref().map(|e| &e.config)
    }

    /// Whether step times come from device timestamps rather than host wall time
    pub fn uses_device_timestamps(&self) -> bool {
        self.timer.is_some()
    }

    /// Positions read back after the last step, flattened
    pub fn readback_positions(&self) -> &[f32] {
        &self.readback
    }

    /// Drop all per-epoch device resources
    pub fn release(&mut self) {
        self.epoch = None;
        self.readback.clear();
    }

    /// Start a new configuration epoch for `state`
    ///
    /// Any previous epoch is released first. Fails on an empty state and on
    /// any sizing the device cannot satisfy.
    pub fn configure(&mut self, state: &SimulationState) -> SimResult<KernelConfig> {
        self.release();

        let config = KernelConfig::derive(&self.ctx.capabilities(), &self.tuning, state.len())?;
        let device = self.ctx.device();
        let shaders = KernelShaders::new(&config);

        let force_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.force.into()),
        });
        let position_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Position Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.positions.into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("N-Body Bind Group Layout"),
            entries: &[
                storage(0, false),
                storage(1, false),
                storage(2, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("N-Body Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let force_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Force Pipeline"),
            layout: Some(&pipeline_layout),
            module: &force_module,
            entry_point: Some(FORCE_ENTRY),
            compilation_options: Default::default(),
            cache: None,
        });
        let position_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Position Pipeline"),
            layout: Some(&pipeline_layout),
            module: &position_module,
            entry_point: Some(POSITION_ENTRY),
            compilation_options: Default::default(),
            cache: None,
        });

        let flat_bytes = state.flat_byte_len() as u64;
        let neg_g = -self.constants.g;
        let neg_g_masses: Vec<f32> = state.masses().iter().map(|&m| m * neg_g).collect();

        let initial_positions = match self.mode {
            InteropMode::Shared => self.seed_positions(state),
            InteropMode::Dual => vec![0.0; state.len() * 3],
        };
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Position Buffer"),
            contents: bytemuck::cast_slice(&initial_positions),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });
        let velocities = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Velocity Buffer"),
            contents: bytemuck::cast_slice(&state.flattened_velocities()),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });
        let masses = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scaled Mass Buffer"),
            contents: bytemuck::cast_slice(&neg_g_masses),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Step Uniform Buffer"),
            contents: bytemuck::bytes_of(&StepUniforms::new(config.body_count, self.constants.dt)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("N-Body Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocities.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: masses.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        });

        let staging = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: flat_bytes.max(16),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let position_staging = staging("Position Staging Buffer");
        let velocity_staging = staging("Velocity Staging Buffer");

        if self.timer.is_none() && !self.warned_wall_clock {
            warn!(
                adapter = %self.ctx.adapter().name,
                "adapter has no timestamp queries; GPU step times include host-side latency"
            );
            self.warned_wall_clock = true;
        }
        debug!(
            variant = %config.variant,
            bodies = config.body_count,
            workgroup_size = config.workgroup_size,
            tile_bodies = config.tile_bodies,
            dispatch_range = config.dispatch_range,
            mode = ?self.mode,
            "configured accelerator"
        );

        self.readback = initial_positions;
        self.epoch = Some(Epoch {
            config,
            force_pipeline,
            position_pipeline,
            positions,
            velocities,
            _masses: masses,
            _uniforms: uniforms,
            bind_group,
            position_staging,
            velocity_staging,
            flat_bytes,
        });
        Ok(config)
    }

    /// Shared mode takes its starting positions from the frame buffer
    fn seed_positions(&self, state: &SimulationState) -> Vec<f32> {
        let flat = state.flattened_positions();
        match &self.frame {
            Some(frame) => {
                let mut guard = frame.acquire();
                if guard.len() != flat.len() {
                    guard.write(&flat);
                }
                guard.to_vec()
            }
            None => flat,
        }
    }

    /// Advance one time step and return its duration in seconds
    ///
    /// In [`InteropMode::Shared`] the frame buffer stays acquired for the
    /// whole step, and the state receives the new positions and velocities.
    /// In [`InteropMode::Dual`] the state's positions and velocities are
    /// uploaded first and the state is left untouched; the new positions are
    /// available from [`readback_positions`](Self::readback_positions).
    pub fn step(&mut self, state: &mut SimulationState) -> SimResult<f64> {
        let needs_epoch = self
            .epoch
            .as_ref()
            .is_none_or(|e| e.config.body_count as usize != state.len());
        if needs_epoch {
            debug!(bodies = state.len(), "body count changed, reconfiguring");
            self.configure(state)?;
        }
        let Some(epoch) = self.epoch.as_ref() else {
            return Err(SimError::AcceleratorUnavailable);
        };
        let device = self.ctx.device();
        let queue = self.ctx.queue();

        let frame = self.frame.clone();
        let mut guard = match self.mode {
            InteropMode::Shared => frame.as_ref().map(FrameBuffer::acquire),
            InteropMode::Dual => None,
        };

        if self.mode == InteropMode::Dual {
            queue.write_buffer(
                &epoch.positions,
                0,
                bytemuck::cast_slice(&state.flattened_positions()),
            );
            queue.write_buffer(
                &epoch.velocities,
                0,
                bytemuck::cast_slice(&state.flattened_velocities()),
            );
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("N-Body Step Encoder"),
        });
        let groups = epoch.config.workgroups();
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Force Pass"),
                timestamp_writes: self.timer.as_ref().map(|t| t.writes(0)),
            });
            pass.set_pipeline(&epoch.force_pipeline);
            pass.set_bind_group(0, &epoch.bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Position Pass"),
                timestamp_writes: self.timer.as_ref().map(|t| t.writes(2)),
            });
            pass.set_pipeline(&epoch.position_pipeline);
            pass.set_bind_group(0, &epoch.bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        if let Some(timer) = &self.timer {
            timer.encode_resolve(&mut encoder);
        }
        encoder.copy_buffer_to_buffer(
            &epoch.positions,
            0,
            &epoch.position_staging,
            0,
            epoch.flat_bytes,
        );
        if self.mode == InteropMode::Shared {
            encoder.copy_buffer_to_buffer(
                &epoch.velocities,
                0,
                &epoch.velocity_staging,
                0,
                epoch.flat_bytes,
            );
        }

        let submitted = Instant::now();
        queue.submit(std::iter::once(encoder.finish()));
        let _ = device.poll(wgpu::Maintain::Wait);
        let wall = submitted.elapsed().as_secs_f64();

        let elapsed = match &self.timer {
            Some(timer) => timer.elapsed(device)?,
            None => wall,
        };

        let floats = state.len() * 3;
        let positions: Vec<f32> = read_mapped(device, &epoch.position_staging, floats)?;
        if self.mode == InteropMode::Shared {
            let velocities: Vec<f32> = read_mapped(device, &epoch.velocity_staging, floats)?;
            state.load_flattened(&positions, &velocities)?;
            if let Some(guard) = guard.as_mut() {
                guard.write(&positions);
            }
        }
        drop(guard);

        self.readback = positions;
        Ok(elapsed)
    }
}

/// Map a staging buffer, copy out its first `len` elements, unmap
fn read_mapped<T: Pod>(device: &wgpu::Device, buffer: &wgpu::Buffer, len: usize) -> SimResult<Vec<T>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| SimError::MapCallbackDropped)??;

    let data = slice.get_mapped_range();
    let values = bytemuck::cast_slice::<u8, T>(&data)[..len].to_vec();
    drop(data);
    buffer.unmap();
    Ok(values)
}
