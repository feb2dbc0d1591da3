use std::time::{Duration, Instant};

use super::Stopwatch;

/// Reporting window used when none is configured.
pub const DEFAULT_FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Frames-per-second accounting.
///
/// Counts ticks and, once at least `window` has elapsed since the counting
/// window opened, yields the accumulated count and opens a new window. The
/// count is not normalized by the actual window length.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    window: Duration,
    stopwatch: Stopwatch,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self::started_at(window, Instant::now())
    }

    pub fn started_at(window: Duration, now: Instant) -> Self {
        Self {
            frames: 0,
            window,
            stopwatch: Stopwatch::started_at(now),
        }
    }

    /// Frames counted in the current window.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drops the current count and reopens the window at `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.frames = 0;
        self.stopwatch.restart_at(now);
    }

    /// Counts one frame; returns the frame count when a window closes.
    pub fn tick(&mut self) -> Option<u32> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);

        if self.stopwatch.elapsed_at(now) < self.window {
            return None;
        }

        let fps = self.frames;
        self.reset_at(now);
        Some(fps)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_WINDOW)
    }
}
