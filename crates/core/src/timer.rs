//! Frame timing.

use std::time::{Duration, Instant};

/// Tracks total run time and the delta between frames.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    frames: u64,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frames: 0,
        }
    }

    /// Seconds since the timer started, as handed to hosted renderers.
    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Mark the start of a new frame and return the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.frames += 1;
        delta
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Average frames per second over the whole run.
    pub fn average_fps(&self) -> f64 {
        let secs = self.start.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
