//! The frame exchange loop.
//!
//! Each [`FrameExchange::step`] waits (bounded) for the endpoint's next
//! signal and acts on it:
//!
//! | Signal | Action |
//! |--------|--------|
//! | frame | render, submit and present every open stream once |
//! | streams changed | reconcile the registry |
//! | timeout | nothing |
//! | quit | shut the endpoint down and stop |
//! | other failure | shut the endpoint down and stop |
//!
//! A fatal condition shuts the endpoint down (best effort) and stops with the
//! matching exit code.

use std::ops::ControlFlow;
use std::time::Duration;

use serde::Deserialize;

use relay_engine::time::{FpsCounter, DEFAULT_FPS_WINDOW};
use relay_wire::{CameraResponseData, FrameData, Status};

use crate::backend::{PresentOutcome, RenderBackend};
use crate::endpoint::Endpoint;
use crate::error::{CleanExit, Exit, FatalError};
use crate::registry::StreamRegistry;

/// Default bound on a single frame wait.
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How closing a stream window affects the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    /// A closed stream stops rendering; the session ends once every stream
    /// window is closed.
    #[default]
    Independent,
    /// Closing any stream window ends the session.
    ExitOnAnyClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSettings {
    pub await_timeout: Duration,
    pub fps_window: Duration,
    pub lifecycle: Lifecycle,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            await_timeout: DEFAULT_AWAIT_TIMEOUT,
            fps_window: DEFAULT_FPS_WINDOW,
            lifecycle: Lifecycle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingFrame,
    Reconciling,
    /// Working on the stream at this index.
    StreamingFrames(usize),
    Shutdown,
}

/// What happened to one stream in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Rendered,
    Skipped,
    Closed,
    WindowClosed,
}

pub struct FrameExchange<E, B: RenderBackend> {
    endpoint: E,
    backend: B,
    registry: StreamRegistry<B::Resource>,
    fps: FpsCounter,
    settings: ExchangeSettings,
    state: LoopState,
}

impl<E: Endpoint, B: RenderBackend> FrameExchange<E, B> {
    pub fn new(endpoint: E, backend: B, settings: ExchangeSettings) -> Self {
        Self {
            endpoint,
            backend,
            registry: StreamRegistry::new(),
            fps: FpsCounter::new(settings.fps_window),
            settings,
            state: LoopState::AwaitingFrame,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn registry(&self) -> &StreamRegistry<B::Resource> {
        &self.registry
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Steps until the session ends.
    pub fn run(&mut self) -> Exit {
        log::info!("frame exchange started");
        loop {
            if let ControlFlow::Break(exit) = self.step() {
                self.registry.clear(&mut self.backend);
                log::info!("frame exchange stopped (exit code {})", exit.code());
                return exit;
            }
        }
    }

    /// Waits for one endpoint signal and handles it.
    pub fn step(&mut self) -> ControlFlow<Exit> {
        self.state = LoopState::AwaitingFrame;

        match self.endpoint.await_frame(self.settings.await_timeout) {
            Ok(frame) => self.stream_frames(&frame),
            Err(Status::StreamsChanged) => self.reconcile(),
            Err(Status::Timeout) => {
                log::trace!("no frame within {:?}", self.settings.await_timeout);
                ControlFlow::Continue(())
            }
            Err(Status::QuitRequested) => {
                log::info!("endpoint requested quit");
                ControlFlow::Break(self.stop(CleanExit::QuitRequested, true))
            }
            // Exits 0 when the endpoint shuts down cleanly; only a failed
            // shutdown turns this into a fatal exit.
            Err(status) => {
                log::error!("waiting for a frame failed: {status}");
                ControlFlow::Break(self.stop(CleanExit::EndpointStopped(status), true))
            }
        }
    }

    fn reconcile(&mut self) -> ControlFlow<Exit> {
        self.state = LoopState::Reconciling;

        match self.registry.reconcile(&mut self.endpoint, &mut self.backend) {
            Ok(report) => {
                log::info!(
                    "stream set changed: {} stream(s), {} kept, {} new, {} released",
                    self.registry.len(),
                    report.kept,
                    report.provisioned,
                    report.released
                );
                self.state = LoopState::AwaitingFrame;
                ControlFlow::Continue(())
            }
            Err(err) => ControlFlow::Break(self.fail(err.into())),
        }
    }

    fn stream_frames(&mut self, frame: &FrameData) -> ControlFlow<Exit> {
        for index in 0..self.registry.len() {
            self.state = LoopState::StreamingFrames(index);

            match self.stream_tick(index, frame) {
                Ok(TickOutcome::WindowClosed)
                    if self.settings.lifecycle == Lifecycle::ExitOnAnyClose =>
                {
                    log::info!("stream window closed, ending session");
                    return ControlFlow::Break(self.stop(CleanExit::WindowsClosed, false));
                }
                Ok(_) => {}
                Err(err) => return ControlFlow::Break(self.fail(err)),
            }
        }

        if !self.registry.is_empty() && self.registry.open_count() == 0 {
            log::info!("every stream window closed, ending session");
            return ControlFlow::Break(self.stop(CleanExit::WindowsClosed, false));
        }

        self.state = LoopState::AwaitingFrame;
        ControlFlow::Continue(())
    }

    /// Renders, submits and presents the stream at `index` once.
    fn stream_tick(&mut self, index: usize, frame: &FrameData) -> Result<TickOutcome, FatalError> {
        let Some((description, slot)) = self.registry.entry_mut(index) else {
            return Ok(TickOutcome::Skipped);
        };
        let Some(resource) = slot.resource_mut() else {
            return Ok(TickOutcome::Closed);
        };

        if !self.backend.pump(resource) {
            log::info!("window of stream `{}` closed", description.name);
            slot.close(&mut self.backend);
            return Ok(TickOutcome::WindowClosed);
        }

        if !slot.payload_loaded() {
            if let Some(resource) = slot.resource_mut() {
                self.backend.load_payload(resource);
            }
            slot.mark_payload_loaded();
        }

        let pose = match self.endpoint.fetch_camera_pose(description.handle) {
            Ok(pose) => {
                slot.clear_pose_failures();
                pose
            }
            Err(status) => {
                if slot.note_pose_failure() == 1 {
                    log::warn!("no camera pose for `{}`: {status}", description.name);
                } else {
                    log::trace!("no camera pose for `{}`: {status}", description.name);
                }
                return Ok(TickOutcome::Skipped);
            }
        };
        let response = CameraResponseData::new(frame, pose);

        let Some(resource) = slot.resource_mut() else {
            return Ok(TickOutcome::Closed);
        };

        let rendered = match self.backend.render(resource, description, &response) {
            Ok(rendered) => rendered,
            Err(err) => {
                log::warn!("rendering `{}` failed: {err}", description.name);
                return Ok(TickOutcome::Skipped);
            }
        };

        if let Err(status) = self
            .endpoint
            .submit_frame(description.handle, &rendered, &response)
        {
            return Err(FatalError::FrameSubmission {
                name: description.name.clone(),
                handle: description.handle,
                status,
            });
        }

        if let Some(fps) = self.fps.tick() {
            self.backend.report_fps(fps);
        }

        match self.backend.present(resource) {
            PresentOutcome::Presented | PresentOutcome::Skipped => Ok(TickOutcome::Rendered),
            PresentOutcome::SurfaceLost => {
                log::warn!("lost the window surface of `{}`", description.name);
                slot.close(&mut self.backend);
                Ok(TickOutcome::WindowClosed)
            }
        }
    }

    /// Shuts the endpoint down after a non-fatal stop.
    ///
    /// With `strict`, a failed shutdown turns the stop into exit 99.
    fn stop(&mut self, reason: CleanExit, strict: bool) -> Exit {
        self.state = LoopState::Shutdown;
        match self.endpoint.shutdown() {
            Ok(()) => Exit::Clean(reason),
            Err(status) if strict => {
                let err = FatalError::Shutdown(status);
                err.report();
                Exit::Fatal(err)
            }
            Err(status) => {
                log::warn!("endpoint shutdown failed: {status}");
                Exit::Clean(reason)
            }
        }
    }

    /// Reports `err`, shuts the endpoint down (best effort) and stops.
    fn fail(&mut self, err: FatalError) -> Exit {
        err.report();
        self.state = LoopState::Shutdown;
        if let Err(status) = self.endpoint.shutdown() {
            log::warn!("endpoint shutdown after fatal error failed: {status}");
        }
        Exit::Fatal(err)
    }
}
