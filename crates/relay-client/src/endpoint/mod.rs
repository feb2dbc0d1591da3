//! The broadcast endpoint the client exchanges frames with.
//!
//! [`Endpoint`] is the capability set the exchange loop needs. It is resolved
//! once at startup, either from the vendor SDK ([`SdkEndpoint`]) or from the
//! in-process [`SimulatedEndpoint`].

mod sdk;
mod simulated;

use std::time::Duration;

use relay_wire::{CameraPose, CameraResponseData, FrameData, GpuDeviceInfo, SenderFrame, Status, StreamHandle};

pub use sdk::{SdkEndpoint, SDK_LIBRARY_NAME, SDK_PATH_ENV};
pub use simulated::{SimulatedEndpoint, SimulatedStream};

/// Protocol version this client speaks.
pub const API_VERSION_MAJOR: u32 = 1;
pub const API_VERSION_MINOR: u32 = 0;

/// Outcome of a failed [`Endpoint::get_streams`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetStreamsError {
    /// `buffer` cannot hold the table; `required` bytes are needed.
    BufferTooSmall { required: usize },
    Failed(Status),
}

pub trait Endpoint {
    fn initialize(&mut self, major: u32, minor: u32) -> Result<(), Status>;

    fn bind_gpu_device(&mut self, device: &GpuDeviceInfo) -> Result<(), Status>;

    /// Copies the encoded stream table into `buffer` and returns its length.
    ///
    /// A buffer that is too small (including an empty one) is not written to;
    /// the call reports the size required instead.
    fn get_streams(&mut self, buffer: &mut [u8]) -> Result<usize, GetStreamsError>;

    /// Blocks for at most `timeout` until the next frame is due.
    fn await_frame(&mut self, timeout: Duration) -> Result<FrameData, Status>;

    fn fetch_camera_pose(&mut self, stream: StreamHandle) -> Result<CameraPose, Status>;

    fn submit_frame(
        &mut self,
        stream: StreamHandle,
        frame: &SenderFrame<'_>,
        response: &CameraResponseData,
    ) -> Result<(), Status>;

    fn shutdown(&mut self) -> Result<(), Status>;
}

impl<E: Endpoint + ?Sized> Endpoint for Box<E> {
    fn initialize(&mut self, major: u32, minor: u32) -> Result<(), Status> {
        (**self).initialize(major, minor)
    }

    fn bind_gpu_device(&mut self, device: &GpuDeviceInfo) -> Result<(), Status> {
        (**self).bind_gpu_device(device)
    }

    fn get_streams(&mut self, buffer: &mut [u8]) -> Result<usize, GetStreamsError> {
        (**self).get_streams(buffer)
    }

    fn await_frame(&mut self, timeout: Duration) -> Result<FrameData, Status> {
        (**self).await_frame(timeout)
    }

    fn fetch_camera_pose(&mut self, stream: StreamHandle) -> Result<CameraPose, Status> {
        (**self).fetch_camera_pose(stream)
    }

    fn submit_frame(
        &mut self,
        stream: StreamHandle,
        frame: &SenderFrame<'_>,
        response: &CameraResponseData,
    ) -> Result<(), Status> {
        (**self).submit_frame(stream, frame, response)
    }

    fn shutdown(&mut self) -> Result<(), Status> {
        (**self).shutdown()
    }
}
