//! Frame timing: simulation clock with pause, frame pacing, FPS measurement.

use std::time::{Duration, Instant};

/// Timing of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Measured wall-clock time since the previous frame, in seconds.
    pub real_dt: f32,
    /// Simulation step in seconds; zero while paused.
    pub sim_dt: f32,
    /// Accumulated simulation time in seconds.
    pub sim_time: f64,
    pub frame_index: u64,
}

/// Accumulates simulation time from measured frame deltas.
///
/// Wall-clock time is always measured; only simulation time stops while
/// paused. Steps are uncapped unless built with [`SimClock::with_max_step`].
#[derive(Debug, Clone)]
pub struct SimClock {
    sim_time: f64,
    frame_index: u64,
    max_step: Option<Duration>,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            sim_time: 0.0,
            frame_index: 0,
            max_step: None,
        }
    }

    /// Clamp each simulation step to `max_step`.
    pub fn with_max_step(max_step: Duration) -> Self {
        Self {
            max_step: Some(max_step),
            ..Self::new()
        }
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn advance(&mut self, elapsed: Duration, paused: bool) -> FrameTime {
        let sim_dt = if paused {
            0.0
        } else {
            self.max_step
                .map_or(elapsed, |max| elapsed.min(max))
                .as_secs_f32()
        };
        self.sim_time += f64::from(sim_dt);
        let frame = FrameTime {
            real_dt: elapsed.as_secs_f32(),
            sim_dt,
            sim_time: self.sim_time,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        frame
    }
}

/// Caps the frame rate by computing how long to wait after a frame's work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    budget: Option<Duration>,
}

impl FramePacer {
    /// `target_fps == 0` disables pacing.
    pub fn new(target_fps: u32) -> Self {
        Self {
            budget: (target_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(target_fps))),
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Time left to wait after spending `work` on a frame.
    pub fn remaining(&self, work: Duration) -> Duration {
        self.budget
            .map_or(Duration::ZERO, |budget| budget.saturating_sub(work))
    }

    /// When the next frame should start, given when this one started.
    pub fn deadline(&self, frame_start: Instant) -> Option<Instant> {
        self.budget.map(|budget| frame_start + budget)
    }
}

/// Frames per second, averaged over a sliding half-second window.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    window: Duration,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame. Returns the new average when the window closes.
    pub fn record(&mut self, real_dt: Duration) -> Option<f32> {
        self.window += real_dt;
        self.frames += 1;
        if self.window < Self::WINDOW {
            return None;
        }
        self.fps = self.frames as f32 / self.window.as_secs_f32();
        self.window = Duration::ZERO;
        self.frames = 0;
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}
