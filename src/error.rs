//! Typed errors for simulation setup and accelerator plumbing
//!
//! Only configuration-class failures travel through here. Numeric
//! degeneracy (coincident bodies, non-positive masses) is not detected, and
//! cross-backend divergence is a measurement, not an error.

use thiserror::Error;

/// Errors that can occur while configuring or driving a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// The device reported a capability we cannot work with
    #[error("malformed device capability: {0}")]
    MalformedCapability(String),

    /// The work-group divisor leaves no lanes in a group
    #[error("work-group size resolves to zero (device max {max_items}, divisor {divisor})")]
    ZeroWorkgroup { max_items: u32, divisor: u32 },

    /// Nothing to dispatch
    #[error("dispatch range is zero: the state holds no bodies")]
    ZeroDispatchRange,

    /// More work-groups than a single dispatch dimension allows
    #[error("dispatch needs {groups} work-groups, device allows {limit}")]
    TooManyWorkgroups { groups: u32, limit: u32 },

    /// Tiled kernels cannot stage even one body
    #[error("local memory budget of {bytes} bytes cannot hold a {variant} batch")]
    LocalMemoryTooSmall { bytes: u32, variant: String },

    /// Tiling variant name not recognised
    #[error("unknown tiling variant: {0} (expected naive, shared-tile or async-copy-tile)")]
    UnknownVariant(String),

    /// Backend name not recognised
    #[error("unknown device: {0} (expected cpu, gpu or cpugpu)")]
    UnknownBackend(String),

    /// Random distribution name not recognised
    #[error("unknown distribution: {0} (expected normal or uniform)")]
    UnknownDistribution(String),

    /// Benchmark mode name not recognised
    #[error("unknown benchmark mode: {0} (expected off, short or long)")]
    UnknownBenchmarkMode(String),

    /// Benchmark body counts that cannot produce an increasing sweep
    #[error("invalid benchmark sweep: {0}")]
    InvalidSweep(String),

    /// Dataset parameters rejected by the sampler
    #[error("invalid dataset parameter: {0}")]
    InvalidDataset(String),

    /// Position, velocity and mass arrays disagree on the body count
    #[error("inconsistent state: {positions} positions, {velocities} velocities, {masses} masses")]
    InconsistentState {
        positions: usize,
        velocities: usize,
        masses: usize,
    },

    /// Two snapshots of different sizes were handed to the comparator
    #[error("cannot compare {reference} bodies against {candidate}")]
    LengthMismatch { reference: usize, candidate: usize },

    /// An accelerator step was requested on a host-only simulation
    #[error("accelerator backend is not configured for this simulation")]
    AcceleratorUnavailable,

    /// No adapter matched the request
    #[error("no GPU adapter found{0}")]
    NoAdapter(String),

    /// The adapter refused to hand out a device
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Mapping a readback buffer failed
    #[error("failed to map GPU buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// The map callback never reported back
    #[error("GPU buffer map callback was dropped")]
    MapCallbackDropped,

    /// The dedicated host thread pool could not be started
    #[error("failed to build host thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run configuration could not be parsed
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
