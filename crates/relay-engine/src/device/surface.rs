use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::{Gpu, GpuFrame, SurfaceErrorAction};

/// Swap chain bound to one stream's display window.
///
/// The surface keeps its window alive through the shared `Arc`, so the window
/// handle stays valid for as long as the surface exists.
pub struct WindowSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
}

impl WindowSurface {
    /// Creates and configures a surface for `window` on `gpu`'s device.
    pub fn new(gpu: &Gpu, window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let surface = gpu
            .instance()
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let caps = surface.get_capabilities(gpu.adapter());
        let format = choose_surface_format(&caps, gpu.init().prefer_srgb)
            .context("adapter cannot present to this window")?;

        let present_mode = if caps.present_modes.contains(&gpu.init().present_mode) {
            gpu.init().present_mode
        } else {
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: choose_alpha_mode(&caps, None),
            view_formats: vec![],
            desired_maximum_frame_latency: gpu.init().desired_maximum_frame_latency,
        };

        surface.configure(gpu.device(), &config);

        Ok(Self {
            surface,
            config,
            size,
        })
    }

    /// Returns the active surface format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&mut self, device: &wgpu::Device, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(device, &self.config);
    }

    /// Acquires the next surface texture and creates an encoder.
    pub fn begin_frame(&self, device: &wgpu::Device) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("relay present encoder"),
        });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(
        &mut self,
        device: &wgpu::Device,
        err: SurfaceError,
    ) -> SurfaceErrorAction {
        map_surface_error(&self.surface, device, &self.config, self.size, err)
    }
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    err: SurfaceError,
) -> SurfaceErrorAction {
    match err {
        SurfaceError::Lost | SurfaceError::Outdated => {
            if size.width > 0 && size.height > 0 {
                surface.configure(device, config);
            }
            SurfaceErrorAction::Reconfigured
        }
        SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}
