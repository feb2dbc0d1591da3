use anyhow::{Context, Result};

use relay_wire::{GpuBackendKind, GpuDeviceInfo};

/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Prefer an sRGB format for window surfaces when available.
    pub prefer_srgb: bool,

    /// Present mode for window surfaces.
    ///
    /// Falls back to FIFO when the surface does not support the requested mode.
    pub present_mode: wgpu::PresentMode,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for window surfaces.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// Owns the wgpu core objects shared by every stream.
///
/// The device is created headless: window surfaces are attached per stream
/// after the fact (see [`WindowSurface`](super::WindowSurface)), and the
/// render targets the endpoint consumes never touch a swap chain.
pub struct Gpu {
    /// wgpu instance used to create the adapter and window surfaces.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    init: GpuInit,
}

impl Gpu {
    /// Creates the instance, adapter, device and queue.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("relay-engine device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let info = adapter.get_info();
        log::info!("using GPU adapter {} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            init,
        })
    }

    /// Blocking variant of [`Gpu::new`].
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn init(&self) -> &GpuInit {
        &self.init
    }

    /// Describes this device for endpoint binding.
    pub fn device_info(&self) -> GpuDeviceInfo {
        let info = self.adapter.get_info();
        GpuDeviceInfo {
            name: info.name,
            vendor_id: info.vendor,
            device_id: info.device,
            backend: backend_kind(info.backend),
        }
    }

    /// Whether `format` can be rendered into and copied out of on this adapter.
    pub fn supports_render_target(&self, format: wgpu::TextureFormat) -> bool {
        let needed = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        self.adapter
            .get_texture_format_features(format)
            .allowed_usages
            .contains(needed)
    }
}

fn backend_kind(backend: wgpu::Backend) -> GpuBackendKind {
    match backend {
        wgpu::Backend::Vulkan => GpuBackendKind::Vulkan,
        wgpu::Backend::Metal => GpuBackendKind::Metal,
        wgpu::Backend::Dx12 => GpuBackendKind::Dx12,
        wgpu::Backend::Gl => GpuBackendKind::Gl,
        _ => GpuBackendKind::Unknown,
    }
}
