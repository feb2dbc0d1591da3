use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// Pump attempts made while waiting for the platform to create a window.
const CREATE_ATTEMPTS: usize = 16;

/// Request for one display window.
#[derive(Debug, Clone)]
pub struct SurfaceRequest {
    pub title: String,
    /// Inner size in physical pixels.
    pub width: u32,
    pub height: u32,
}

/// Handle to a display window owned by the [`DisplayHost`].
#[derive(Debug, Clone)]
pub struct DisplaySurface {
    id: WindowId,
    window: Arc<Window>,
}

impl DisplaySurface {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

/// Owns the process event loop and every stream window.
///
/// The loop is never run to completion; instead it is pumped without blocking
/// from the exchange loop, which keeps the whole client on one thread. A window
/// counts as closed once the platform asked to close it or the user pressed
/// Escape in it.
pub struct DisplayHost {
    event_loop: EventLoop<()>,
    state: HostState,
}

impl DisplayHost {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        Ok(Self {
            event_loop,
            state: HostState::default(),
        })
    }

    /// Opens a window and waits until the platform has created it.
    pub fn open(&mut self, request: SurfaceRequest) -> Result<DisplaySurface> {
        self.state.pending = Some(request);

        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) = self.pump_once() {
                return Err(anyhow!("event loop exited with code {code} while opening a window"));
            }

            if let Some(created) = self.state.created.take() {
                let window = created.context("failed to create window")?;
                return Ok(DisplaySurface {
                    id: window.id(),
                    window,
                });
            }
        }

        self.state.pending = None;
        Err(anyhow!("platform did not create the window in time"))
    }

    /// Processes pending window events without blocking.
    ///
    /// Returns `false` once `surface` has been closed.
    pub fn pump(&mut self, surface: &DisplaySurface) -> bool {
        if let PumpStatus::Exit(_) = self.pump_once() {
            self.state.exited = true;
        }
        self.is_open(surface)
    }

    pub fn is_open(&self, surface: &DisplaySurface) -> bool {
        !self.state.exited
            && self
                .state
                .windows
                .get(&surface.id)
                .is_some_and(|slot| slot.open)
    }

    /// Returns the newest size if the window was resized since the last call.
    pub fn take_resize(&mut self, surface: &DisplaySurface) -> Option<PhysicalSize<u32>> {
        self.state
            .windows
            .get_mut(&surface.id)
            .and_then(|slot| slot.resized.take())
    }

    /// Forgets a window. The window itself closes once its last `Arc` drops.
    pub fn close(&mut self, surface: &DisplaySurface) {
        self.state.windows.remove(&surface.id);
    }

    fn pump_once(&mut self) -> PumpStatus {
        self.event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
    }
}

#[derive(Debug)]
struct WindowSlot {
    open: bool,
    resized: Option<PhysicalSize<u32>>,
}

#[derive(Default)]
struct HostState {
    resumed: bool,
    exited: bool,
    pending: Option<SurfaceRequest>,
    created: Option<Result<Arc<Window>>>,
    windows: HashMap<WindowId, WindowSlot>,
}

impl HostState {
    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        let Some(request) = self.pending.take() else {
            return;
        };

        let attrs = Window::default_attributes()
            .with_title(request.title)
            .with_inner_size(PhysicalSize::new(request.width.max(1), request.height.max(1)));

        let created = event_loop
            .create_window(attrs)
            .map(Arc::new)
            .map_err(anyhow::Error::from);

        if let Ok(window) = &created {
            self.windows.insert(
                window.id(),
                WindowSlot {
                    open: true,
                    resized: None,
                },
            );
        }

        self.created = Some(created);
    }

    fn mark_closed(&mut self, id: WindowId) {
        if let Some(slot) = self.windows.get_mut(&id) {
            if slot.open {
                log::debug!("window {id:?} closed");
            }
            slot.open = false;
        }
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.resumed = true;
        self.create_pending(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.resumed {
            self.create_pending(event_loop);
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.mark_closed(window_id),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.mark_closed(window_id),

            WindowEvent::Resized(size) => {
                if let Some(slot) = self.windows.get_mut(&window_id) {
                    slot.resized = Some(size);
                }
            }

            _ => {}
        }
    }
}
