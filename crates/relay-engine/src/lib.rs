//! Relay engine crate.
//!
//! Owns the platform + GPU runtime pieces the frame exchange client renders
//! with: logging setup, frame timing, the wgpu device, display surfaces and the
//! per-stream render targets.

pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
