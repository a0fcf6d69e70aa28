//! Narrow interfaces to the windowing layer, plus in-memory doubles.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use shadowbox_common::Extent;
use shadowbox_input::InputEvent;

/// How the output surface is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    Windowed(Extent),
    Fullscreen(Extent),
}

impl SurfaceMode {
    pub fn extent(&self) -> Extent {
        match *self {
            Self::Windowed(e) | Self::Fullscreen(e) => e,
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        matches!(self, Self::Fullscreen(_))
    }
}

impl std::fmt::Display for SurfaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windowed(e) => write!(f, "windowed {e}"),
            Self::Fullscreen(e) => write!(f, "fullscreen {e}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("display mode unavailable: {0}")]
    ModeUnavailable(SurfaceMode),
    #[error("surface failure: {0}")]
    Platform(String),
}

/// The window or display the frame is presented to.
pub trait Surface {
    fn mode(&self) -> SurfaceMode;

    /// Switch presentation mode. On success returns the size actually in
    /// effect; on failure the previous mode stays active.
    fn set_mode(&mut self, mode: SurfaceMode) -> Result<Extent, SurfaceError>;
}

/// Event source and timing provider driving [`crate::run_loop`].
pub trait Platform {
    type Surface: Surface;

    fn surface(&mut self) -> &mut Self::Surface;

    /// Wall-clock time since the previous call.
    fn elapsed(&mut self) -> Duration;

    /// Pending events, oldest first.
    fn drain_events(&mut self) -> Vec<InputEvent>;

    /// Block the loop for frame pacing.
    fn wait(&mut self, duration: Duration);
}

/// In-memory surface with a fixed list of supported full-screen sizes.
#[derive(Debug, Clone)]
pub struct FixedSurface {
    mode: SurfaceMode,
    fullscreen_modes: Vec<Extent>,
    switches: u32,
}

impl FixedSurface {
    pub fn windowed(extent: Extent) -> Self {
        Self {
            mode: SurfaceMode::Windowed(extent),
            fullscreen_modes: Vec::new(),
            switches: 0,
        }
    }

    pub fn with_fullscreen_modes(mut self, modes: impl IntoIterator<Item = Extent>) -> Self {
        self.fullscreen_modes.extend(modes);
        self
    }

    /// Successful mode changes so far.
    pub fn switches(&self) -> u32 {
        self.switches
    }
}

impl Surface for FixedSurface {
    fn mode(&self) -> SurfaceMode {
        self.mode
    }

    fn set_mode(&mut self, mode: SurfaceMode) -> Result<Extent, SurfaceError> {
        if let SurfaceMode::Fullscreen(extent) = mode {
            if !self.fullscreen_modes.contains(&extent) {
                return Err(SurfaceError::ModeUnavailable(mode));
            }
        }
        self.mode = mode;
        self.switches += 1;
        Ok(mode.extent())
    }
}

/// Replays a timeline of input events at a fixed frame step.
///
/// Frame `n` receives the events scheduled at `n`. Waits are recorded, not slept.
#[derive(Debug, Clone)]
pub struct ScriptedPlatform {
    surface: FixedSurface,
    step: Duration,
    frame: u64,
    timeline: BTreeMap<u64, VecDeque<InputEvent>>,
    waited: Duration,
}

impl ScriptedPlatform {
    pub fn new(surface: FixedSurface, step: Duration) -> Self {
        Self {
            surface,
            step,
            frame: 0,
            timeline: BTreeMap::new(),
            waited: Duration::ZERO,
        }
    }

    pub fn at(mut self, frame: u64, event: InputEvent) -> Self {
        self.push(frame, event);
        self
    }

    pub fn push(&mut self, frame: u64, event: InputEvent) {
        self.timeline.entry(frame).or_default().push_back(event);
    }

    /// Schedule a quit request at `frame`.
    pub fn quit_at(self, frame: u64) -> Self {
        self.at(frame, InputEvent::Quit)
    }

    /// Frames whose events have been delivered.
    pub fn frames_delivered(&self) -> u64 {
        self.frame
    }

    pub fn total_wait(&self) -> Duration {
        self.waited
    }

    pub fn surface_ref(&self) -> &FixedSurface {
        &self.surface
    }
}

impl Platform for ScriptedPlatform {
    type Surface = FixedSurface;

    fn surface(&mut self) -> &mut FixedSurface {
        &mut self.surface
    }

    fn elapsed(&mut self) -> Duration {
        self.step
    }

    fn drain_events(&mut self) -> Vec<InputEvent> {
        let events = self
            .timeline
            .remove(&self.frame)
            .map(Vec::from)
            .unwrap_or_default();
        self.frame += 1;
        events
    }

    fn wait(&mut self, duration: Duration) {
        self.waited += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowbox_input::Key;

    #[test]
    fn unsupported_fullscreen_keeps_previous_mode() {
        let mut surface = FixedSurface::windowed(Extent::new(1600, 900));
        let err = surface
            .set_mode(SurfaceMode::Fullscreen(Extent::new(1920, 1080)))
            .unwrap_err();
        assert!(matches!(err, SurfaceError::ModeUnavailable(_)));
        assert_eq!(surface.mode(), SurfaceMode::Windowed(Extent::new(1600, 900)));
        assert_eq!(surface.switches(), 0);
    }

    #[test]
    fn supported_fullscreen_switches() {
        let mut surface = FixedSurface::windowed(Extent::new(1600, 900))
            .with_fullscreen_modes([Extent::new(1920, 1080)]);
        let extent = surface
            .set_mode(SurfaceMode::Fullscreen(Extent::new(1920, 1080)))
            .unwrap();
        assert_eq!(extent, Extent::new(1920, 1080));
        assert!(surface.mode().is_fullscreen());
    }

    #[test]
    fn timeline_delivers_per_frame_in_order() {
        let mut platform = ScriptedPlatform::new(
            FixedSurface::windowed(Extent::new(800, 600)),
            Duration::from_millis(16),
        )
        .at(1, InputEvent::KeyDown(Key::F(1)))
        .at(1, InputEvent::KeyUp(Key::F(1)))
        .quit_at(3);

        assert!(platform.drain_events().is_empty());
        assert_eq!(
            platform.drain_events(),
            vec![InputEvent::KeyDown(Key::F(1)), InputEvent::KeyUp(Key::F(1))]
        );
        assert!(platform.drain_events().is_empty());
        assert_eq!(platform.drain_events(), vec![InputEvent::Quit]);
        assert_eq!(platform.frames_delivered(), 4);
        assert_eq!(platform.elapsed(), Duration::from_millis(16));
    }

    #[test]
    fn mode_display() {
        assert_eq!(
            SurfaceMode::Fullscreen(Extent::new(1920, 1080)).to_string(),
            "fullscreen 1920x1080"
        );
    }
}
