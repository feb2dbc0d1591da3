//! Per-frame payloads exchanged with the endpoint.
//!
//! `FrameData`, `CameraPose` and `CameraResponseData` share their layout with
//! the SDK's C structs and are passed across the boundary by pointer.

use bytemuck::{Pod, Zeroable};

use crate::stream::{PixelFormat, StreamHandle};

/// Payload delivered with every frame-ready signal.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct FrameData {
    /// Timestamp the tracking data was captured at, in seconds.
    pub t_tracked: f64,
    pub local_time: f64,
    pub local_time_delta: f64,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,
    pub flags: u32,
    pub scene: u32,
}

/// Camera pose and lens for one stream on one frame.
///
/// Rotations are Euler angles in degrees; lengths are in scene units except for
/// the lens fields which are in millimetres.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct CameraPose {
    pub id: u64,
    pub camera_handle: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rx: f32,
    pub ry: f32,
    pub rz: f32,
    pub focal_length: f32,
    pub sensor_x: f32,
    pub sensor_y: f32,
    /// Horizontal lens shift as a fraction of the sensor width.
    pub cx: f32,
    /// Vertical lens shift as a fraction of the sensor height.
    pub cy: f32,
    pub near_z: f32,
    pub far_z: f32,
    /// Non-zero selects an orthographic projection of this width.
    pub ortho_width: f32,
}

/// Returned alongside a submitted frame so the endpoint can match it to the
/// tracking sample it was rendered for.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct CameraResponseData {
    pub t_tracked: f64,
    pub camera: CameraPose,
}

impl CameraResponseData {
    pub fn new(frame: &FrameData, camera: CameraPose) -> Self {
        Self {
            t_tracked: frame.t_tracked,
            camera,
        }
    }
}

/// Handle of a GPU texture the endpoint can read directly.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureHandle(pub u64);

/// Discriminant of a submitted frame, as sent over the SDK boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum FrameType {
    HostMemory = 0,
    Texture = 1,
}

/// A rendered frame ready for submission.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SenderFrame<'a> {
    /// Pixels read back into host memory, rows `stride` bytes apart.
    HostMemory {
        data: &'a [u8],
        stride: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    /// A GPU texture bound to the stream's external handle.
    Texture {
        handle: TextureHandle,
        stream: StreamHandle,
    },
}

impl SenderFrame<'_> {
    pub fn frame_type(&self) -> FrameType {
        match self {
            SenderFrame::HostMemory { .. } => FrameType::HostMemory,
            SenderFrame::Texture { .. } => FrameType::Texture,
        }
    }

    /// Checks that a host-memory frame actually holds `stride * height` bytes
    /// and that the stride covers a full row.
    pub fn is_well_formed(&self) -> bool {
        match *self {
            SenderFrame::HostMemory {
                data,
                stride,
                width,
                height,
                format,
            } => {
                let Some(bpp) = format.bytes_per_pixel() else {
                    return false;
                };
                let row = u64::from(width) * u64::from(bpp);
                u64::from(stride) >= row
                    && data.len() as u64 >= u64::from(stride) * u64::from(height)
            }
            SenderFrame::Texture { .. } => true,
        }
    }
}
