use std::path::Path;
use std::ptr;
use std::time::Duration;

use libloading::Library;

use relay_wire::device::RawGpuDeviceInfo;
use relay_wire::{
    CameraPose, CameraResponseData, FrameData, GpuDeviceInfo, SenderFrame, Status, StreamHandle,
};

use super::{Endpoint, GetStreamsError};
use crate::error::FatalError;

/// Base name of the broadcast library, without platform prefix or suffix.
pub const SDK_LIBRARY_NAME: &str = "relay_broadcast";

/// Environment variable overriding the library path.
pub const SDK_PATH_ENV: &str = "RELAY_SDK_PATH";

type InitialiseFn = unsafe extern "C" fn(major: u32, minor: u32) -> i32;
type BindGpuDeviceFn = unsafe extern "C" fn(device: *const RawGpuDeviceInfo) -> i32;
type GetStreamsFn = unsafe extern "C" fn(buffer: *mut u8, size: *mut u32) -> i32;
type AwaitFrameDataFn = unsafe extern "C" fn(timeout_ms: i32, data: *mut FrameData) -> i32;
type GetFrameCameraFn = unsafe extern "C" fn(stream: u64, pose: *mut CameraPose) -> i32;
type SendFrameFn = unsafe extern "C" fn(
    stream: u64,
    frame: *const RawSenderFrame,
    response: *const CameraResponseData,
) -> i32;
type ShutdownFn = unsafe extern "C" fn() -> i32;

/// C layout of a submitted frame.
#[repr(C)]
struct RawSenderFrame {
    frame_type: u32,
    format: u32,
    width: u32,
    height: u32,
    stride: u32,
    _reserved: u32,
    texture: u64,
    data: *const u8,
    data_len: u64,
}

impl RawSenderFrame {
    fn new(frame: &SenderFrame<'_>) -> Self {
        let frame_type = frame.frame_type() as u32;
        match *frame {
            SenderFrame::HostMemory {
                data,
                stride,
                width,
                height,
                format,
            } => Self {
                frame_type,
                format: format.as_raw(),
                width,
                height,
                stride,
                _reserved: 0,
                texture: 0,
                data: data.as_ptr(),
                data_len: data.len() as u64,
            },
            SenderFrame::Texture { handle, .. } => Self {
                frame_type,
                format: 0,
                width: 0,
                height: 0,
                stride: 0,
                _reserved: 0,
                texture: handle.0,
                data: ptr::null(),
                data_len: 0,
            },
        }
    }
}

/// Entry points resolved from the library.
struct SdkApi {
    initialise: InitialiseFn,
    bind_gpu_device: BindGpuDeviceFn,
    get_streams: GetStreamsFn,
    await_frame_data: AwaitFrameDataFn,
    get_frame_camera: GetFrameCameraFn,
    send_frame: SendFrameFn,
    shutdown: ShutdownFn,
}

impl SdkApi {
    fn resolve(library: &Library) -> Result<Self, FatalError> {
        Ok(Self {
            initialise: symbol(library, "rs_initialise")?,
            bind_gpu_device: symbol(library, "rs_bindGpuDevice")?,
            get_streams: symbol(library, "rs_getStreams")?,
            await_frame_data: symbol(library, "rs_awaitFrameData")?,
            get_frame_camera: symbol(library, "rs_getFrameCamera")?,
            send_frame: symbol(library, "rs_sendFrame")?,
            shutdown: symbol(library, "rs_shutdown")?,
        })
    }
}

fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, FatalError> {
    let mut c_name = Vec::with_capacity(name.len() + 1);
    c_name.extend_from_slice(name.as_bytes());
    c_name.push(0);

    // SAFETY: `T` is one of the function pointer types above, which match the
    // SDK's exported signatures.
    unsafe { library.get::<T>(&c_name) }
        .map(|sym| *sym)
        .map_err(|_| FatalError::MissingEntryPoint(name.to_string()))
}

/// Endpoint backed by the vendor broadcast library.
///
/// The function pointers stay valid for as long as `_library` is loaded, which
/// is the lifetime of this value.
pub struct SdkEndpoint {
    api: SdkApi,
    _library: Library,
}

impl SdkEndpoint {
    /// Loads the library at `path` and resolves every entry point.
    pub fn load(path: &Path) -> Result<Self, FatalError> {
        log::info!("loading broadcast library {}", path.display());

        // SAFETY: loading runs the library's initialisers; the path comes from
        // the operator's configuration.
        let library = unsafe { Library::new(path.as_os_str()) }.map_err(|err| FatalError::Load {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        let api = SdkApi::resolve(&library)?;
        Ok(Self {
            api,
            _library: library,
        })
    }

    /// Platform file name of the library, e.g. `librelay_broadcast.so`.
    pub fn default_library() -> std::ffi::OsString {
        libloading::library_filename(SDK_LIBRARY_NAME)
    }

    /// Library path from `RELAY_SDK_PATH`, falling back to [`SdkEndpoint::default_library`].
    pub fn library_from_env() -> std::path::PathBuf {
        std::env::var_os(SDK_PATH_ENV)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(Self::default_library)
            .into()
    }
}

impl Endpoint for SdkEndpoint {
    fn initialize(&mut self, major: u32, minor: u32) -> Result<(), Status> {
        // SAFETY: plain integer arguments.
        Status::check(unsafe { (self.api.initialise)(major, minor) })
    }

    fn bind_gpu_device(&mut self, device: &GpuDeviceInfo) -> Result<(), Status> {
        let raw = device.to_raw();
        // SAFETY: `raw` outlives the call.
        Status::check(unsafe { (self.api.bind_gpu_device)(&raw) })
    }

    fn get_streams(&mut self, buffer: &mut [u8]) -> Result<usize, GetStreamsError> {
        let mut size = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        let data = if buffer.is_empty() {
            ptr::null_mut()
        } else {
            buffer.as_mut_ptr()
        };

        // SAFETY: `data` is null or valid for `size` bytes.
        let code = unsafe { (self.api.get_streams)(data, &mut size) };
        match Status::from_raw(code) {
            Status::Success => Ok((size as usize).min(buffer.len())),
            Status::BufferOverflow => Err(GetStreamsError::BufferTooSmall {
                required: size as usize,
            }),
            status => Err(GetStreamsError::Failed(status)),
        }
    }

    fn await_frame(&mut self, timeout: Duration) -> Result<FrameData, Status> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut data = FrameData::default();
        // SAFETY: `data` is a valid out-pointer for the call.
        Status::check(unsafe { (self.api.await_frame_data)(timeout_ms, &mut data) })?;
        Ok(data)
    }

    fn fetch_camera_pose(&mut self, stream: StreamHandle) -> Result<CameraPose, Status> {
        let mut pose = CameraPose::default();
        // SAFETY: `pose` is a valid out-pointer for the call.
        Status::check(unsafe { (self.api.get_frame_camera)(stream.0, &mut pose) })?;
        Ok(pose)
    }

    fn submit_frame(
        &mut self,
        stream: StreamHandle,
        frame: &SenderFrame<'_>,
        response: &CameraResponseData,
    ) -> Result<(), Status> {
        let raw = RawSenderFrame::new(frame);
        // SAFETY: `raw` points into `frame`, which is borrowed for the call.
        Status::check(unsafe { (self.api.send_frame)(stream.0, &raw, response) })
    }

    fn shutdown(&mut self) -> Result<(), Status> {
        // SAFETY: no arguments.
        Status::check(unsafe { (self.api.shutdown)() })
    }
}
