//! Render resources and the device that drives them.
//!
//! [`RenderBackend`] is the seam between the exchange loop and the GPU and
//! display stack: it provisions one resource per stream, renders frames for
//! submission and presents them locally. [`GpuBackend`] is the wgpu/winit
//! implementation.

mod gpu;

use relay_engine::render::{ReadbackError, TargetError};
use relay_wire::{CameraResponseData, SenderFrame, StreamDescription};

pub use gpu::{preview_size, GpuBackend, GpuStream};

/// Why a stream's render resource could not be created.
#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("display surface: {0}")]
    Display(String),

    #[error("render target: {0}")]
    Target(#[from] TargetError),

    #[error("device: {0}")]
    Device(String),
}

/// Why a frame could not be rendered. Never fatal; the tick is skipped.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("readback: {0}")]
    Readback(#[from] ReadbackError),

    #[error("{0}")]
    Other(String),
}

/// Result of showing a rendered frame in the stream's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Nothing was shown this tick (minimised, timed out, reconfigured).
    Skipped,
    /// The window can no longer be presented to; treat it as closed.
    SurfaceLost,
}

pub trait RenderBackend {
    /// Per-stream state: display surface plus render target.
    type Resource;

    fn provision(&mut self, description: &StreamDescription) -> Result<Self::Resource, ProvisionError>;

    fn release(&mut self, resource: Self::Resource);

    /// Processes window events; returns `false` once the stream's window closed.
    fn pump(&mut self, resource: &mut Self::Resource) -> bool;

    /// Loads the render payload on first use. Idempotent.
    fn load_payload(&mut self, resource: &mut Self::Resource);

    /// Renders one frame for `description` from `response`'s camera.
    fn render<'r>(
        &mut self,
        resource: &'r mut Self::Resource,
        description: &StreamDescription,
        response: &CameraResponseData,
    ) -> Result<SenderFrame<'r>, RenderError>;

    /// Publishes the frame rate measured over the last window.
    fn report_fps(&mut self, fps: u32);

    fn present(&mut self, resource: &mut Self::Resource) -> PresentOutcome;
}
