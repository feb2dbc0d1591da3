//! Display windows.
//!
//! Owns the `winit` EventLoop and the per-stream windows, pumped from the
//! caller's thread instead of handing control to `run_app`.

mod host;

pub use host::{DisplayHost, DisplaySurface, SurfaceRequest};
pub use winit::window::{Window, WindowId};
