use std::collections::HashMap;
use std::time::{Duration, Instant};

use relay_engine::time::Stopwatch;
use relay_wire::status::raw;
use relay_wire::{
    CameraPose, CameraResponseData, FrameData, GpuDeviceInfo, PixelFormat, SenderFrame, Status,
    StreamDescription, StreamHandle, StreamSet,
};

use super::{Endpoint, GetStreamsError, API_VERSION_MAJOR};

/// Distance of the orbiting camera from the origin.
const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_HEIGHT: f32 = 1.5;
/// Radians per second of the orbit.
const ORBIT_RATE: f64 = 0.4;

/// A stream offered by the [`SimulatedEndpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedStream {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// In-process broadcaster.
///
/// Announces its stream set on the first wait, then paces frames at a fixed
/// interval and hands out an orbiting camera per stream. It can request quit
/// after a number of frames and can alternate between the full stream set and
/// the set without its last stream, which exercises reconciliation.
pub struct SimulatedEndpoint {
    streams: Vec<StreamDescription>,
    interval: Duration,
    quit_after: Option<u64>,
    change_every: Option<u64>,

    initialised: bool,
    device: Option<GpuDeviceInfo>,
    active: StreamSet,
    announce: bool,
    reduced: bool,
    changed_at: u64,
    frames_issued: u64,
    clock: Stopwatch,
    next_frame: Instant,
    submissions: HashMap<StreamHandle, u64>,
}

impl SimulatedEndpoint {
    pub fn new(streams: Vec<SimulatedStream>, interval: Duration) -> Self {
        let streams: Vec<StreamDescription> = streams
            .into_iter()
            .enumerate()
            .map(|(i, s)| StreamDescription {
                handle: StreamHandle(0x5100 + i as u64),
                name: s.name,
                width: s.width,
                height: s.height,
                format: s.format,
            })
            .collect();

        let now = Instant::now();
        Self {
            active: StreamSet::new(streams.clone()),
            streams,
            interval,
            quit_after: None,
            change_every: None,
            initialised: false,
            device: None,
            announce: true,
            reduced: false,
            changed_at: 0,
            frames_issued: 0,
            clock: Stopwatch::started_at(now),
            next_frame: now,
            submissions: HashMap::new(),
        }
    }

    /// Requests quit once `frames` frames have been issued.
    pub fn quit_after(mut self, frames: Option<u64>) -> Self {
        self.quit_after = frames;
        self
    }

    /// Toggles the last stream in and out of the set every `frames` frames.
    pub fn change_streams_every(mut self, frames: Option<u64>) -> Self {
        self.change_every = frames.filter(|n| *n > 0);
        self
    }

    pub fn active_streams(&self) -> &StreamSet {
        &self.active
    }

    pub fn bound_device(&self) -> Option<&GpuDeviceInfo> {
        self.device.as_ref()
    }

    pub fn frames_issued(&self) -> u64 {
        self.frames_issued
    }

    /// Frames accepted for `stream` so far.
    pub fn submissions(&self, stream: StreamHandle) -> u64 {
        self.submissions.get(&stream).copied().unwrap_or(0)
    }

    fn ensure_initialised(&self) -> Result<(), Status> {
        if self.initialised {
            Ok(())
        } else {
            Err(Status::Failure(raw::FAILED))
        }
    }

    fn rotate_streams(&mut self) {
        self.reduced = !self.reduced && self.streams.len() > 1;
        let count = if self.reduced {
            self.streams.len() - 1
        } else {
            self.streams.len()
        };
        self.active = StreamSet::new(self.streams[..count].to_vec());
        self.changed_at = self.frames_issued;
        log::debug!("simulated stream set now has {count} stream(s)");
    }

    fn orbit(&self, index: usize, t: f64) -> CameraPose {
        let angle = t * ORBIT_RATE + index as f64 * std::f64::consts::FRAC_PI_2;
        let angle = angle.rem_euclid(std::f64::consts::TAU) as f32;

        CameraPose {
            id: index as u64,
            camera_handle: self.active.get(index).map_or(0, |d| d.handle.0),
            x: ORBIT_RADIUS * angle.sin(),
            y: ORBIT_HEIGHT,
            z: ORBIT_RADIUS * angle.cos(),
            rx: -(ORBIT_HEIGHT / ORBIT_RADIUS).atan().to_degrees(),
            ry: angle.to_degrees(),
            rz: 0.0,
            focal_length: 35.0,
            sensor_x: 36.0,
            sensor_y: 0.0,
            cx: 0.0,
            cy: 0.0,
            near_z: 0.1,
            far_z: 100.0,
            ortho_width: 0.0,
        }
    }
}

impl Endpoint for SimulatedEndpoint {
    fn initialize(&mut self, major: u32, minor: u32) -> Result<(), Status> {
        if major != API_VERSION_MAJOR {
            log::warn!("simulated endpoint speaks {API_VERSION_MAJOR}.x, client asked for {major}.{minor}");
            return Err(Status::Failure(raw::FAILED));
        }
        self.initialised = true;
        let now = Instant::now();
        self.clock.restart_at(now);
        self.next_frame = now;
        Ok(())
    }

    fn bind_gpu_device(&mut self, device: &GpuDeviceInfo) -> Result<(), Status> {
        self.ensure_initialised()?;
        log::info!("simulated endpoint bound to {} ({:?})", device.name, device.backend);
        self.device = Some(device.clone());
        Ok(())
    }

    fn get_streams(&mut self, buffer: &mut [u8]) -> Result<usize, GetStreamsError> {
        self.ensure_initialised().map_err(GetStreamsError::Failed)?;

        let required = self.active.encoded_len();
        if buffer.len() < required {
            return Err(GetStreamsError::BufferTooSmall { required });
        }
        buffer[..required].copy_from_slice(&self.active.encode());
        Ok(required)
    }

    fn await_frame(&mut self, timeout: Duration) -> Result<FrameData, Status> {
        self.ensure_initialised()?;

        if self.announce {
            self.announce = false;
            return Err(Status::StreamsChanged);
        }

        if self.quit_after.is_some_and(|n| self.frames_issued >= n) {
            return Err(Status::QuitRequested);
        }

        if let Some(every) = self.change_every {
            if self.frames_issued > self.changed_at && self.frames_issued % every == 0 {
                self.rotate_streams();
                return Err(Status::StreamsChanged);
            }
        }

        let now = Instant::now();
        if self.next_frame > now {
            let wait = self.next_frame - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Err(Status::Timeout);
            }
            std::thread::sleep(wait);
        }

        let now = Instant::now();
        self.next_frame = (self.next_frame + self.interval).max(now);
        self.frames_issued += 1;

        let t = self.clock.elapsed_at(now).as_secs_f64();
        let rate = (1.0 / self.interval.as_secs_f64().max(1e-3)).round() as u32;
        Ok(FrameData {
            t_tracked: t,
            local_time: t,
            local_time_delta: self.interval.as_secs_f64(),
            frame_rate_numerator: rate,
            frame_rate_denominator: 1,
            flags: 0,
            scene: 0,
        })
    }

    fn fetch_camera_pose(&mut self, stream: StreamHandle) -> Result<CameraPose, Status> {
        self.ensure_initialised()?;
        let index = self
            .active
            .position(stream)
            .ok_or(Status::Failure(raw::FAILED))?;
        let t = self.clock.elapsed().as_secs_f64();
        Ok(self.orbit(index, t))
    }

    fn submit_frame(
        &mut self,
        stream: StreamHandle,
        frame: &SenderFrame<'_>,
        _response: &CameraResponseData,
    ) -> Result<(), Status> {
        self.ensure_initialised()?;

        let expected = self
            .active
            .position(stream)
            .and_then(|i| self.active.get(i))
            .ok_or(Status::Failure(raw::FAILED))?;

        if !frame.is_well_formed() {
            log::warn!("simulated endpoint rejected a malformed frame for {stream}");
            return Err(Status::Failure(raw::FAILED));
        }

        if let SenderFrame::HostMemory { width, height, .. } = *frame {
            if (width, height) != (expected.width, expected.height) {
                log::warn!(
                    "simulated endpoint expected {}x{} for {stream}, got {width}x{height}",
                    expected.width,
                    expected.height
                );
                return Err(Status::Failure(raw::FAILED));
            }
        }

        *self.submissions.entry(stream).or_default() += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Status> {
        self.ensure_initialised()?;
        self.initialised = false;
        log::info!("simulated endpoint shut down after {} frame(s)", self.frames_issued);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streams() -> Vec<SimulatedStream> {
        vec![
            SimulatedStream {
                name: "front".into(),
                width: 640,
                height: 480,
                format: PixelFormat::Bgra8,
            },
            SimulatedStream {
                name: "wide".into(),
                width: 1920,
                height: 1080,
                format: PixelFormat::Rgba8,
            },
        ]
    }

    fn endpoint() -> SimulatedEndpoint {
        let mut e = SimulatedEndpoint::new(streams(), Duration::ZERO);
        e.initialize(API_VERSION_MAJOR, 0).unwrap();
        e
    }

    #[test]
    fn rejects_foreign_major_version() {
        let mut e = SimulatedEndpoint::new(streams(), Duration::ZERO);
        assert!(e.initialize(API_VERSION_MAJOR + 1, 0).is_err());
        assert_eq!(e.await_frame(Duration::ZERO), Err(Status::Failure(raw::FAILED)));
    }

    #[test]
    fn binding_requires_initialisation() {
        let device = GpuDeviceInfo {
            name: "test adapter".into(),
            vendor_id: 0x10de,
            device_id: 0x2204,
            backend: relay_wire::GpuBackendKind::Vulkan,
        };
        let mut e = SimulatedEndpoint::new(streams(), Duration::ZERO);
        assert!(e.bind_gpu_device(&device).is_err());
        assert!(e.bound_device().is_none());

        e.initialize(API_VERSION_MAJOR, 0).unwrap();
        e.bind_gpu_device(&device).unwrap();
        assert_eq!(e.bound_device(), Some(&device));
    }

    #[test]
    fn undersized_buffer_reports_required_size() {
        let mut e = endpoint();
        let required = match e.get_streams(&mut []) {
            Err(GetStreamsError::BufferTooSmall { required }) => required,
            other => panic!("expected overflow, got {other:?}"),
        };

        let mut small = vec![0u8; required - 1];
        assert_eq!(
            e.get_streams(&mut small),
            Err(GetStreamsError::BufferTooSmall { required })
        );

        let mut buffer = vec![0u8; required];
        assert_eq!(e.get_streams(&mut buffer), Ok(required));
        let set = StreamSet::decode(&buffer).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().width, 1920);
    }

    #[test]
    fn announces_streams_before_the_first_frame() {
        let mut e = endpoint();
        assert_eq!(e.await_frame(Duration::ZERO), Err(Status::StreamsChanged));
        let frame = e.await_frame(Duration::from_millis(10)).unwrap();
        assert!(frame.t_tracked >= 0.0);
        assert_eq!(e.frames_issued(), 1);
    }

    #[test]
    fn waits_longer_than_the_timeout_report_timeout() {
        let mut e = SimulatedEndpoint::new(streams(), Duration::from_secs(60));
        e.initialize(API_VERSION_MAJOR, 0).unwrap();
        let _ = e.await_frame(Duration::ZERO);
        e.await_frame(Duration::ZERO).unwrap();

        assert_eq!(e.await_frame(Duration::from_millis(1)), Err(Status::Timeout));
        assert_eq!(e.frames_issued(), 1);
    }

    #[test]
    fn quits_after_the_configured_frames() {
        let mut e = endpoint().quit_after(Some(2));
        let _ = e.await_frame(Duration::ZERO);
        e.await_frame(Duration::ZERO).unwrap();
        e.await_frame(Duration::ZERO).unwrap();
        assert_eq!(e.await_frame(Duration::ZERO), Err(Status::QuitRequested));
    }

    #[test]
    fn alternates_the_stream_set() {
        let mut e = endpoint().change_streams_every(Some(2));
        let _ = e.await_frame(Duration::ZERO);
        e.await_frame(Duration::ZERO).unwrap();
        e.await_frame(Duration::ZERO).unwrap();

        assert_eq!(e.await_frame(Duration::ZERO), Err(Status::StreamsChanged));
        assert_eq!(e.active_streams().len(), 1);

        e.await_frame(Duration::ZERO).unwrap();
        e.await_frame(Duration::ZERO).unwrap();
        assert_eq!(e.await_frame(Duration::ZERO), Err(Status::StreamsChanged));
        assert_eq!(e.active_streams().len(), 2);
    }

    #[test]
    fn poses_only_for_active_streams() {
        let mut e = endpoint();
        let handle = e.active_streams().get(0).unwrap().handle;
        let pose = e.fetch_camera_pose(handle).unwrap();
        let radius = (pose.x * pose.x + pose.z * pose.z).sqrt();
        assert!((radius - ORBIT_RADIUS).abs() < 1e-4);

        assert!(e.fetch_camera_pose(StreamHandle(1)).is_err());
    }

    #[test]
    fn validates_submitted_frames() {
        let mut e = endpoint();
        let handle = e.active_streams().get(0).unwrap().handle;
        let response = CameraResponseData::default();

        let pixels = vec![0u8; 2560 * 480];
        let good = SenderFrame::HostMemory {
            data: &pixels,
            stride: 2560,
            width: 640,
            height: 480,
            format: PixelFormat::Bgra8,
        };
        e.submit_frame(handle, &good, &response).unwrap();
        assert_eq!(e.submissions(handle), 1);

        let wrong_size = SenderFrame::HostMemory {
            data: &pixels,
            stride: 2560,
            width: 320,
            height: 240,
            format: PixelFormat::Bgra8,
        };
        assert!(e.submit_frame(handle, &wrong_size, &response).is_err());

        let short = SenderFrame::HostMemory {
            data: &pixels[..100],
            stride: 2560,
            width: 640,
            height: 480,
            format: PixelFormat::Bgra8,
        };
        assert!(e.submit_frame(handle, &short, &response).is_err());
        assert_eq!(e.submissions(handle), 1);
    }

    #[test]
    fn shutdown_twice_fails() {
        let mut e = endpoint();
        assert_eq!(e.shutdown(), Ok(()));
        assert!(e.shutdown().is_err());
    }
}
