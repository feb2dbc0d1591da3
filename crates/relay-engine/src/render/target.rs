use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use nalgebra::Matrix4;

use relay_wire::{PixelFormat, StreamHandle};

use super::{padded_bytes_per_row, texture_format, MeshRenderer, RenderCtx, RenderTarget, TransformBinding};
use crate::device::Gpu;

/// Longest a readback may take before the frame is given up on.
const READBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Offscreen render target bound to one stream.
///
/// The texture is created at the stream's requested size and format and tagged
/// with the stream handle; every rendered frame is copied into a host-visible
/// buffer so the endpoint can read it back.
pub struct StreamTarget {
    handle: StreamHandle,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    padded_row: u32,
    readback: wgpu::Buffer,
    binding: TransformBinding,
    pixels: Vec<u8>,
}

/// Why a render target could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    UnsupportedFormat(PixelFormat),
    InvalidSize { width: u32, height: u32, max: u32 },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::UnsupportedFormat(format) => {
                write!(f, "pixel format {format:?} cannot be rendered on this device")
            }
            TargetError::InvalidSize { width, height, max } => {
                write!(f, "target size {width}x{height} outside 1..={max}")
            }
        }
    }
}

impl std::error::Error for TargetError {}

/// Why a rendered frame could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackError {
    Map(String),
    Poll(String),
    Timeout,
}

impl fmt::Display for ReadbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadbackError::Map(msg) => write!(f, "failed to map readback buffer: {msg}"),
            ReadbackError::Poll(msg) => write!(f, "device poll failed during readback: {msg}"),
            ReadbackError::Timeout => write!(f, "readback did not complete in {READBACK_TIMEOUT:?}"),
        }
    }
}

impl std::error::Error for ReadbackError {}

impl StreamTarget {
    pub fn new(
        gpu: &Gpu,
        renderer: &MeshRenderer,
        handle: StreamHandle,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<Self, TargetError> {
        let format = texture_format(pixel_format)
            .filter(|f| gpu.supports_render_target(*f))
            .ok_or(TargetError::UnsupportedFormat(pixel_format))?;

        let max = gpu.device().limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(TargetError::InvalidSize { width, height, max });
        }

        let bpp = format.block_copy_size(None).unwrap_or(4);
        let padded_row = padded_bytes_per_row(width, bpp);

        let label = format!("relay stream {handle}");

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} readback")),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let binding = renderer.create_binding(gpu.device(), &format!("{label} transform"));

        Ok(Self {
            handle,
            texture,
            view,
            format,
            pixel_format,
            width,
            height,
            padded_row,
            readback,
            binding,
            pixels: Vec::new(),
        })
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Distance in bytes between rows of the read-back pixels.
    pub fn stride(&self) -> u32 {
        self.padded_row
    }

    pub fn binding(&self) -> &TransformBinding {
        &self.binding
    }

    /// Renders the scene with `transform` and reads the result back.
    pub fn render(
        &mut self,
        gpu: &Gpu,
        renderer: &mut MeshRenderer,
        transform: &Matrix4<f32>,
        clear: wgpu::Color,
    ) -> Result<&[u8], ReadbackError> {
        self.binding.write(gpu.queue(), transform);

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("relay stream encoder"),
            });

        {
            let ctx = RenderCtx::new(gpu.device(), gpu.queue(), self.format);
            let mut target = RenderTarget::new(&mut encoder, &self.view);
            renderer.draw(&ctx, &mut target, &self.binding, clear);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        gpu.queue().submit(std::iter::once(encoder.finish()));
        self.read_back(gpu.device())?;
        Ok(&self.pixels)
    }

    fn read_back(&mut self, device: &wgpu::Device) -> Result<(), ReadbackError> {
        let slice = self.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let polled = device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(READBACK_TIMEOUT),
        });
        if let Err(err) = polled {
            // Unmapping cancels the pending request.
            self.readback.unmap();
            return Err(match err {
                wgpu::PollError::Timeout => ReadbackError::Timeout,
                other => ReadbackError::Poll(other.to_string()),
            });
        }

        match receiver.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ReadbackError::Map(e.to_string())),
            Err(mpsc::TryRecvError::Disconnected) => {
                return Err(ReadbackError::Map("map callback dropped".into()));
            }
            Err(mpsc::TryRecvError::Empty) => {
                self.readback.unmap();
                return Err(ReadbackError::Timeout);
            }
        }

        {
            let mapped = slice.get_mapped_range();
            self.pixels.clear();
            self.pixels.extend_from_slice(&mapped);
        }
        self.readback.unmap();
        Ok(())
    }
}
