use std::time::{Duration, Instant};

/// Monotonic stopwatch.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch started now.
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(now: Instant) -> Self {
        Self { started: now }
    }

    pub fn restart_at(&mut self, now: Instant) {
        self.started = now;
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    /// Elapsed time at `now`; zero if `now` precedes the start.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
