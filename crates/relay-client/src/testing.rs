//! Scripted endpoint and recording backend for driving the exchange loop
//! without a broadcast SDK, GPU or display.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use relay_wire::status::raw;
use relay_wire::{
    CameraPose, CameraResponseData, FrameData, GpuDeviceInfo, PixelFormat, SenderFrame, Status,
    StreamDescription, StreamHandle, StreamSet, TextureHandle,
};

use crate::backend::{PresentOutcome, ProvisionError, RenderBackend, RenderError};
use crate::endpoint::{Endpoint, GetStreamsError};

pub fn description(handle: u64, name: &str, width: u32, height: u32) -> StreamDescription {
    StreamDescription {
        handle: StreamHandle(handle),
        name: name.to_string(),
        width,
        height,
        format: PixelFormat::Bgra8,
    }
}

pub fn frame(t: f64) -> FrameData {
    FrameData {
        t_tracked: t,
        ..Default::default()
    }
}

/// Endpoint replaying a fixed script of `await_frame` results.
///
/// Once the script runs dry every wait returns `QuitRequested`.
#[derive(Debug)]
pub struct ScriptedEndpoint {
    pub streams: StreamSet,
    pub script: VecDeque<Result<FrameData, Status>>,
    pub fail_get_streams: Option<Status>,
    /// Fetches (non-empty buffer) during which one more stream appears.
    pub grow_on_fetch: usize,
    pub pose_failures: HashSet<StreamHandle>,
    pub submit_failures: HashSet<StreamHandle>,
    pub shutdown_result: Result<(), Status>,

    pub get_streams_calls: Vec<usize>,
    pub awaits: usize,
    pub pose_requests: Vec<StreamHandle>,
    pub submissions: Vec<StreamHandle>,
    pub shutdowns: usize,
}

impl ScriptedEndpoint {
    pub fn new(streams: StreamSet) -> Self {
        Self {
            streams,
            script: VecDeque::new(),
            fail_get_streams: None,
            grow_on_fetch: 0,
            pose_failures: HashSet::new(),
            submit_failures: HashSet::new(),
            shutdown_result: Ok(()),
            get_streams_calls: Vec::new(),
            awaits: 0,
            pose_requests: Vec::new(),
            submissions: Vec::new(),
            shutdowns: 0,
        }
    }

    pub fn with_script(mut self, script: impl IntoIterator<Item = Result<FrameData, Status>>) -> Self {
        self.script.extend(script);
        self
    }

    fn grow(&mut self) {
        let mut streams: Vec<StreamDescription> = self.streams.iter().cloned().collect();
        let handle = 100 + streams.len() as u64;
        streams.push(description(handle, "late", 32, 32));
        self.streams = StreamSet::new(streams);
    }
}

impl Endpoint for ScriptedEndpoint {
    fn initialize(&mut self, _major: u32, _minor: u32) -> Result<(), Status> {
        Ok(())
    }

    fn bind_gpu_device(&mut self, _device: &GpuDeviceInfo) -> Result<(), Status> {
        Ok(())
    }

    fn get_streams(&mut self, buffer: &mut [u8]) -> Result<usize, GetStreamsError> {
        self.get_streams_calls.push(buffer.len());
        if let Some(status) = self.fail_get_streams {
            return Err(GetStreamsError::Failed(status));
        }

        if !buffer.is_empty() && self.grow_on_fetch > 0 {
            self.grow_on_fetch -= 1;
            self.grow();
        }

        let bytes = self.streams.encode();
        if buffer.len() < bytes.len() {
            return Err(GetStreamsError::BufferTooSmall { required: bytes.len() });
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn await_frame(&mut self, _timeout: Duration) -> Result<FrameData, Status> {
        self.awaits += 1;
        self.script.pop_front().unwrap_or(Err(Status::QuitRequested))
    }

    fn fetch_camera_pose(&mut self, stream: StreamHandle) -> Result<CameraPose, Status> {
        self.pose_requests.push(stream);
        if self.pose_failures.contains(&stream) {
            return Err(Status::Failure(raw::FAILED));
        }
        Ok(CameraPose {
            camera_handle: stream.0,
            z: 5.0,
            ..Default::default()
        })
    }

    fn submit_frame(
        &mut self,
        stream: StreamHandle,
        _frame: &SenderFrame<'_>,
        _response: &CameraResponseData,
    ) -> Result<(), Status> {
        self.submissions.push(stream);
        if self.submit_failures.contains(&stream) {
            return Err(Status::Failure(raw::FAILED));
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Status> {
        self.shutdowns += 1;
        self.shutdown_result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Provisioned(StreamHandle),
    Released(StreamHandle),
    Loaded(StreamHandle),
    Rendered(StreamHandle),
    Presented(StreamHandle),
}

#[derive(Debug)]
pub struct FakeResource {
    pub id: u64,
    pub handle: StreamHandle,
    pub width: u32,
    pub height: u32,
    pub has_target: bool,
    pub pumps: usize,
}

/// Backend that records every call instead of touching a GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub fail_provision: HashSet<StreamHandle>,
    pub fail_render: HashSet<StreamHandle>,
    /// Window closes once it has been pumped this many times.
    pub close_after: HashMap<StreamHandle, usize>,
    pub lose_surface: HashSet<StreamHandle>,

    pub events: Vec<BackendEvent>,
    pub fps_reports: Vec<u32>,
    next_id: u64,
}

impl RecordingBackend {
    pub fn count(&self, pred: impl Fn(&BackendEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn rendered(&self) -> Vec<StreamHandle> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Rendered(h) => Some(*h),
                _ => None,
            })
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    type Resource = FakeResource;

    fn provision(&mut self, description: &StreamDescription) -> Result<FakeResource, ProvisionError> {
        if self.fail_provision.contains(&description.handle) {
            return Err(ProvisionError::Device(format!(
                "cannot bind {}",
                description.handle
            )));
        }
        self.next_id += 1;
        self.events.push(BackendEvent::Provisioned(description.handle));
        Ok(FakeResource {
            id: self.next_id,
            handle: description.handle,
            width: description.width,
            height: description.height,
            has_target: true,
            pumps: 0,
        })
    }

    fn release(&mut self, resource: FakeResource) {
        self.events.push(BackendEvent::Released(resource.handle));
    }

    fn pump(&mut self, resource: &mut FakeResource) -> bool {
        resource.pumps += 1;
        self.close_after
            .get(&resource.handle)
            .is_none_or(|limit| resource.pumps < *limit)
    }

    fn load_payload(&mut self, resource: &mut FakeResource) {
        self.events.push(BackendEvent::Loaded(resource.handle));
    }

    fn render<'r>(
        &mut self,
        resource: &'r mut FakeResource,
        _description: &StreamDescription,
        _response: &CameraResponseData,
    ) -> Result<SenderFrame<'r>, RenderError> {
        if self.fail_render.contains(&resource.handle) {
            return Err(RenderError::Other("scripted render failure".into()));
        }
        self.events.push(BackendEvent::Rendered(resource.handle));
        Ok(SenderFrame::Texture {
            handle: TextureHandle(resource.id),
            stream: resource.handle,
        })
    }

    fn report_fps(&mut self, fps: u32) {
        self.fps_reports.push(fps);
    }

    fn present(&mut self, resource: &mut FakeResource) -> PresentOutcome {
        if self.lose_surface.contains(&resource.handle) {
            return PresentOutcome::SurfaceLost;
        }
        self.events.push(BackendEvent::Presented(resource.handle));
        PresentOutcome::Presented
    }
}
