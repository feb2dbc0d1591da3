use std::collections::HashMap;
use std::sync::{Arc, Weak};

use anyhow::Result;

use relay_engine::device::{Gpu, GpuInit, SurfaceErrorAction, WindowSurface};
use relay_engine::render::{frame_transform, MeshRenderer, RenderCtx, RenderTarget, StreamTarget};
use relay_engine::window::{DisplayHost, DisplaySurface, SurfaceRequest, Window, WindowId};
use relay_wire::{CameraResponseData, GpuDeviceInfo, SenderFrame, StreamDescription, StreamHandle};

use super::{PresentOutcome, ProvisionError, RenderBackend, RenderError};

/// Largest preview window opened for a stream; bigger streams are scaled down.
const PREVIEW_MAX: (u32, u32) = (1280, 720);

/// Render resource of one stream.
pub struct GpuStream {
    surface: DisplaySurface,
    swap_chain: WindowSurface,
    target: StreamTarget,
    clear: wgpu::Color,
}

impl GpuStream {
    pub fn handle(&self) -> StreamHandle {
        self.target.handle()
    }
}

/// wgpu device, window host and placeholder renderer shared by every stream.
pub struct GpuBackend {
    gpu: Gpu,
    display: DisplayHost,
    renderer: MeshRenderer,
    titles: HashMap<WindowId, (Weak<Window>, String)>,
}

impl GpuBackend {
    pub fn new(init: GpuInit) -> Result<Self> {
        let display = DisplayHost::new()?;
        let gpu = Gpu::new_blocking(init)?;
        let renderer = MeshRenderer::new(gpu.device());

        Ok(Self {
            gpu,
            display,
            renderer,
            titles: HashMap::new(),
        })
    }

    pub fn device_info(&self) -> GpuDeviceInfo {
        self.gpu.device_info()
    }
}

impl RenderBackend for GpuBackend {
    type Resource = GpuStream;

    fn provision(&mut self, description: &StreamDescription) -> Result<GpuStream, ProvisionError> {
        let (width, height) = preview_size(description.width, description.height);
        let surface = self
            .display
            .open(SurfaceRequest {
                title: description.name.clone(),
                width,
                height,
            })
            .map_err(|err| ProvisionError::Display(format!("{err:#}")))?;

        let resources = WindowSurface::new(&self.gpu, Arc::clone(surface.window()))
            .map_err(|err| ProvisionError::Display(format!("{err:#}")))
            .and_then(|swap_chain| {
                let target = StreamTarget::new(
                    &self.gpu,
                    &self.renderer,
                    description.handle,
                    description.width,
                    description.height,
                    description.format,
                )?;
                Ok((swap_chain, target))
            });

        let (swap_chain, target) = match resources {
            Ok(resources) => resources,
            Err(err) => {
                self.display.close(&surface);
                return Err(err);
            }
        };

        log::debug!(
            "provisioned {} {}x{} {:?} as {:?}",
            description.handle,
            description.width,
            description.height,
            description.format,
            target.format()
        );

        self.titles.insert(
            surface.id(),
            (Arc::downgrade(surface.window()), description.name.clone()),
        );

        Ok(GpuStream {
            surface,
            swap_chain,
            target,
            clear: clear_color(description.handle),
        })
    }

    fn release(&mut self, stream: GpuStream) {
        self.titles.remove(&stream.surface.id());
        self.display.close(&stream.surface);
        log::debug!("released {}", stream.target.handle());
    }

    fn pump(&mut self, stream: &mut GpuStream) -> bool {
        self.display.pump(&stream.surface)
    }

    fn load_payload(&mut self, _stream: &mut GpuStream) {
        self.renderer.load_mesh(self.gpu.device());
    }

    fn render<'r>(
        &mut self,
        stream: &'r mut GpuStream,
        _description: &StreamDescription,
        response: &CameraResponseData,
    ) -> Result<SenderFrame<'r>, RenderError> {
        let (width, height) = stream.target.size();
        let transform = frame_transform(&response.camera, response.t_tracked, width, height);
        let stride = stream.target.stride();
        let format = stream.target.pixel_format();

        let data = stream
            .target
            .render(&self.gpu, &mut self.renderer, &transform, stream.clear)?;

        Ok(SenderFrame::HostMemory {
            data,
            stride,
            width,
            height,
            format,
        })
    }

    fn report_fps(&mut self, fps: u32) {
        log::info!("{fps} fps");
        self.titles.retain(|_, (window, title)| match window.upgrade() {
            Some(window) => {
                window.set_title(&format!("{title} ({fps} fps)"));
                true
            }
            None => false,
        });
    }

    fn present(&mut self, stream: &mut GpuStream) -> PresentOutcome {
        let device = self.gpu.device();

        if let Some(size) = self.display.take_resize(&stream.surface) {
            stream.swap_chain.resize(device, size);
        }

        let size = stream.swap_chain.size();
        if size.width == 0 || size.height == 0 {
            return PresentOutcome::Skipped;
        }

        let mut frame = match stream.swap_chain.begin_frame(device) {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("{}: surface error {err:?}", stream.target.handle());
                return match stream.swap_chain.handle_surface_error(device, err) {
                    SurfaceErrorAction::Fatal => PresentOutcome::SurfaceLost,
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        PresentOutcome::Skipped
                    }
                };
            }
        };

        {
            let ctx = RenderCtx::new(device, self.gpu.queue(), stream.swap_chain.format());
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            self.renderer
                .draw(&ctx, &mut target, stream.target.binding(), stream.clear);
        }

        stream.surface.window().pre_present_notify();
        frame.present(self.gpu.queue());
        PresentOutcome::Presented
    }
}

/// Window size for previewing a `width × height` stream.
///
/// Keeps the aspect ratio and never upscales.
pub fn preview_size(width: u32, height: u32) -> (u32, u32) {
    let (width, height) = (width.max(1), height.max(1));
    let scale = f64::min(
        1.0,
        f64::min(
            f64::from(PREVIEW_MAX.0) / f64::from(width),
            f64::from(PREVIEW_MAX.1) / f64::from(height),
        ),
    );
    (
        ((f64::from(width) * scale).round() as u32).max(1),
        ((f64::from(height) * scale).round() as u32).max(1),
    )
}

/// Background colour unique-ish per stream so windows are easy to tell apart.
fn clear_color(handle: StreamHandle) -> wgpu::Color {
    let h = handle.0.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    let channel = |shift: u32| 0.05 + 0.2 * ((h >> shift) & 0xff) as f64 / 255.0;
    wgpu::Color {
        r: channel(8),
        g: channel(24),
        b: channel(40),
        a: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_streams_keep_their_size() {
        assert_eq!(preview_size(640, 480), (640, 480));
    }

    #[test]
    fn large_streams_shrink_to_fit() {
        assert_eq!(preview_size(1920, 1080), (1280, 720));
        assert_eq!(preview_size(3840, 1080), (1280, 360));
        assert_eq!(preview_size(1080, 1920), (405, 720));
    }

    #[test]
    fn degenerate_sizes_stay_positive() {
        assert_eq!(preview_size(0, 0), (1, 1));
        let (w, h) = preview_size(100_000, 1);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn clear_colours_are_dim_and_opaque() {
        for handle in [0, 1, 0x5100, u64::MAX] {
            let c = clear_color(StreamHandle(handle));
            for v in [c.r, c.g, c.b] {
                assert!((0.05..=0.25).contains(&v));
            }
            assert_eq!(c.a, 1.0);
        }
    }
}
