//! Frame timing

use std::time::Instant;

/// Frames between frames-per-second checkpoints.
pub const FPS_WINDOW_FRAMES: u64 = 60;

/// Monotonic nanosecond clock shared by the render loop and the telemetry
/// thread.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Nanoseconds since the clock was created, offset by one so a reading
    /// is never the "no telemetry" marker.
    pub fn now_nanos(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos();
        u64::try_from(elapsed).unwrap_or(u64::MAX - 1) + 1
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame timing with a windowed frames-per-second estimate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameClock {
    /// Time of the current frame
    now_nanos: u64,
    /// Time of the previous frame
    prev_nanos: u64,
    /// Milliseconds between the previous frame and this one
    delta_millis: f32,
    /// Last checkpoint estimate; held between checkpoints
    fps: f32,
    /// Start of the current fps window
    fps_window_start_nanos: u64,
    frames: u64,
}

impl FrameClock {
    /// Start the clock at `start_nanos`; the first fps window opens here.
    pub fn new(start_nanos: u64) -> Self {
        Self {
            now_nanos: start_nanos,
            prev_nanos: start_nanos,
            delta_millis: 0.0,
            fps: 0.0,
            fps_window_start_nanos: start_nanos,
            frames: 0,
        }
    }

    /// Advance to a new frame.
    /// Returns the new estimate when this frame closes an fps window.
    pub fn tick(&mut self, now_nanos: u64) -> Option<f32> {
        self.prev_nanos = self.now_nanos;
        self.now_nanos = now_nanos;
        self.delta_millis = now_nanos.saturating_sub(self.prev_nanos) as f32 * 1e-6;
        self.frames += 1;

        if self.frames % FPS_WINDOW_FRAMES != 0 {
            return None;
        }

        let window_nanos = now_nanos.saturating_sub(self.fps_window_start_nanos);
        self.fps_window_start_nanos = now_nanos;
        if window_nanos == 0 {
            return None;
        }

        self.fps = (FPS_WINDOW_FRAMES as f64 / (window_nanos as f64 * 1e-9)) as f32;
        Some(self.fps)
    }

    pub fn now_nanos(&self) -> u64 {
        self.now_nanos
    }

    pub fn prev_nanos(&self) -> u64 {
        self.prev_nanos
    }

    pub fn delta_millis(&self) -> f32 {
        self.delta_millis
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn fps_window_start_nanos(&self) -> u64 {
        self.fps_window_start_nanos
    }

    /// Frames ticked since start.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
