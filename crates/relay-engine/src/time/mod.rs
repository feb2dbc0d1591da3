//! Time subsystem.
//!
//! Wall-clock utilities for frame telemetry, decoupled from the exchange loop:
//! - `Stopwatch` measures elapsed time since the last (re)start
//! - `FpsCounter` counts presented frames and reports once per window
//!
//! Both accept explicit `Instant`s (`*_at` methods) so callers and tests can
//! drive them without sleeping.

mod fps;
mod stopwatch;

pub use fps::{FpsCounter, DEFAULT_FPS_WINDOW};
pub use stopwatch::Stopwatch;
