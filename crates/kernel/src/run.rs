use std::time::{Duration, Instant};

use shadowbox_render::RenderBackend;

use crate::clock::FramePacer;
use crate::engine::{Engine, EngineError, FrameOutcome};
use crate::platform::Platform;

/// Totals for a finished [`run_loop`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub sim_time: f64,
}

/// Drive `engine` until a quit request, then shut it down.
///
/// A fatal error also releases the engine's resources before it is returned.
pub fn run_loop<P, B>(
    mut engine: Engine,
    platform: &mut P,
    backend: &mut B,
    pacer: FramePacer,
) -> Result<RunSummary, EngineError>
where
    P: Platform,
    B: RenderBackend + ?Sized,
{
    let mut summary = RunSummary::default();
    loop {
        let started = Instant::now();
        let elapsed = platform.elapsed();
        let events = platform.drain_events();
        let outcome = match engine.frame(backend, platform.surface(), events, elapsed) {
            Ok(outcome) => outcome,
            Err(e) => {
                engine.shutdown(backend);
                return Err(e);
            }
        };
        summary.frames += 1;
        match outcome {
            FrameOutcome::Rendered(_) => summary.rendered += 1,
            FrameOutcome::Skipped => summary.skipped += 1,
            FrameOutcome::Quit => break,
        }
        let wait = pacer.remaining(started.elapsed());
        if wait > Duration::ZERO {
            platform.wait(wait);
        }
    }
    summary.sim_time = engine.sim_time();
    engine.shutdown(backend);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::platform::{FixedSurface, ScriptedPlatform};
    use shadowbox_assets::ProceduralTextures;
    use shadowbox_input::{InputEvent, Key};
    use shadowbox_render::{RecordingBackend, RenderError};

    fn engine(backend: &mut RecordingBackend) -> Engine {
        let mut config = EngineConfig::default();
        config.scene.floor.tiles_per_side = 2;
        config.shadows.resolution = 32;
        Engine::new(
            config,
            backend,
            ProceduralTextures::with_size(4),
            shadowbox_common::Extent::new(640, 360),
        )
        .unwrap()
    }

    #[test]
    fn runs_until_quit_and_cleans_up() {
        let mut backend = RecordingBackend::new();
        let engine = engine(&mut backend);
        let mut platform = ScriptedPlatform::new(
            FixedSurface::windowed(shadowbox_common::Extent::new(640, 360)),
            Duration::from_millis(10),
        )
        .at(2, InputEvent::KeyDown(Key::Char('f')))
        .quit_at(5);

        let summary = run_loop(engine, &mut platform, &mut backend, FramePacer::new(0)).unwrap();
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.rendered, 5);
        assert!((summary.sim_time - 0.06).abs() < 1e-6);
        assert_eq!(backend.live_resources(), (0, 0, 0));
        assert!(backend.violations().is_empty());
        assert_eq!(platform.total_wait(), Duration::ZERO);
    }

    #[test]
    fn pacing_waits_between_frames() {
        let mut backend = RecordingBackend::new();
        let engine = engine(&mut backend);
        let mut platform = ScriptedPlatform::new(
            FixedSurface::windowed(shadowbox_common::Extent::new(640, 360)),
            Duration::from_millis(10),
        )
        .quit_at(3);
        run_loop(engine, &mut platform, &mut backend, FramePacer::new(1)).unwrap();
        // Three paced frames at one per second; the work itself is far shorter.
        assert!(platform.total_wait() > Duration::from_secs(2));
    }

    #[test]
    fn fatal_error_still_releases_resources() {
        let mut backend = RecordingBackend::new();
        let engine = engine(&mut backend);
        backend.fail_next_frame(RenderError::OutOfMemory);
        let mut platform = ScriptedPlatform::new(
            FixedSurface::windowed(shadowbox_common::Extent::new(640, 360)),
            Duration::from_millis(10),
        );
        let err = run_loop(engine, &mut platform, &mut backend, FramePacer::new(0)).unwrap_err();
        assert!(matches!(err, EngineError::Render(RenderError::OutOfMemory)));
        assert_eq!(backend.live_resources(), (0, 0, 0));
    }
}
