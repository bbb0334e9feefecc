//! Adapter selection and device creation

use std::sync::Arc;

use tracing::{debug, info};

use super::types::DeviceCapabilities;
use crate::error::{SimError, SimResult};

/// What we know about one adapter before opening it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub index: usize,
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub has_timestamps: bool,
}

impl AdapterSummary {
    fn from_adapter(index: usize, adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        Self {
            index,
            name: info.name,
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            has_timestamps: adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY),
        }
    }
}

/// An open device and queue, shareable between engines
#[derive(Debug, Clone)]
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter: AdapterSummary,
    capabilities: DeviceCapabilities,
    has_timestamps: bool,
}

impl GpuContext {
    /// Open a device
    ///
    /// `selector` is an adapter index or a case-insensitive fragment of its
    /// name; without one the high-performance adapter is used.
    pub fn new(selector: Option<&str>) -> SimResult<Self> {
        pollster::block_on(Self::create(selector))
    }

    fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        })
    }

    /// Every adapter the instance can see
    pub fn enumerate_adapters() -> Vec<AdapterSummary> {
        Self::create_instance()
            .enumerate_adapters(wgpu::Backends::all())
            .iter()
            .enumerate()
            .map(|(i, adapter)| AdapterSummary::from_adapter(i, adapter))
            .collect()
    }

    async fn create(selector: Option<&str>) -> SimResult<Self> {
        let instance = Self::create_instance();
        let selector = selector
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty() && s != "auto");

        let (index, adapter) = match selector {
            None => {
                let adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: None,
                        force_fallback_adapter: false,
                    })
                    .await
                    .ok_or_else(|| SimError::NoAdapter(String::new()))?;
                (0, adapter)
            }
            Some(selector) => {
                let adapters = instance.enumerate_adapters(wgpu::Backends::all());
                let by_index = selector
                    .parse::<usize>()
                    .ok()
                    .filter(|&i| i < adapters.len());
                let position = match by_index {
                    Some(i) => Some(i),
                    None => adapters.iter().position(|a| {
                        a.get_info()
                            .name
                            .to_ascii_lowercase()
                            .contains(&selector)
                    }),
                };
                let i = position
                    .ok_or_else(|| SimError::NoAdapter(format!(" matching '{selector}'")))?;
                match adapters.into_iter().nth(i) {
                    Some(adapter) => (i, adapter),
                    None => return Err(SimError::NoAdapter(format!(" at index {i}"))),
                }
            }
        };

        let summary = AdapterSummary::from_adapter(index, &adapter);
        let mut required_features = wgpu::Features::empty();
        if summary.has_timestamps {
            required_features |= wgpu::Features::TIMESTAMP_QUERY;
        }
        let limits = adapter.limits();
        let capabilities = DeviceCapabilities::from_limits(&limits)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("N-Body Device"),
                    required_features,
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        info!(
            adapter = %summary.name,
            backend = %summary.backend,
            timestamps = summary.has_timestamps,
            "opened GPU device"
        );
        debug!(?capabilities, "device capabilities");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            has_timestamps: summary.has_timestamps,
            adapter: summary,
            capabilities,
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn adapter(&self) -> &AdapterSummary {
        &self.adapter
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// Whether passes can be timed on the device
    pub fn has_timestamps(&self) -> bool {
        self.has_timestamps
    }
}
