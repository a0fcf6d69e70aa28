//! Engine kernel: frame scheduler, toggle state machine, timing and platform seams.
//!
//! # Invariants
//! - Each frame runs in a fixed order: measure time, drain input, update
//!   camera, lights and objects, render the passes, present.
//! - While paused, simulation time does not advance; wall-clock time is still
//!   measured for pacing and FPS.
//! - [`EngineState`] is written only by input handling.
//! - GPU resources are released in reverse acquisition order on shutdown,
//!   including after a fatal error.

pub mod clock;
pub mod config;
pub mod engine;
pub mod platform;
pub mod run;
pub mod state;

pub use clock::{FpsCounter, FramePacer, FrameTime, SimClock};
pub use config::{ConfigError, EngineConfig, ShadowConfig, WindowConfig};
pub use engine::{Engine, EngineError, FrameOutcome};
pub use platform::{FixedSurface, Platform, ScriptedPlatform, Surface, SurfaceError, SurfaceMode};
pub use run::{RunSummary, run_loop};
pub use state::{Effect, EngineState, LightPresets};
