use serde::Serialize;
use shadowbox_kernel::Engine;
use shadowbox_render::ShadowSlot;

/// Read-only diagnostics over a running engine.
pub struct EngineInspector;

impl EngineInspector {
    /// Produce a summary of the current engine state.
    pub fn summary(engine: &Engine) -> EngineSummary {
        let state = engine.state();
        let lights = engine.scene().lights();
        let report = engine.last_report().unwrap_or_default();
        EngineSummary {
            frame: engine.frame_index(),
            fps: engine.fps(),
            sim_time: engine.sim_time(),
            paused: state.paused,
            wireframe: state.wireframe,
            fullscreen: state.fullscreen,
            debug_lights: state.debug_lights,
            ambient: state.global_ambient,
            objects: engine.scene().objects().len(),
            skipped_frames: engine.skipped_frames(),
            passes: ShadowSlot::ALL
                .iter()
                .filter(|slot| report.ran(**slot))
                .map(|slot| slot.label())
                .collect(),
            lights: LightSummary {
                global: lights.global.strength(),
                flashlight: lights.flashlight.strength(),
                locals: lights.locals.iter().map(|l| l.strength()).collect(),
            },
        }
    }

    /// One-line status for a window title.
    pub fn title(engine: &Engine) -> String {
        let s = Self::summary(engine);
        let mut flags = Vec::new();
        if s.paused {
            flags.push("paused");
        }
        if s.wireframe {
            flags.push("wireframe");
        }
        if s.debug_lights {
            flags.push("lights");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(" "))
        };
        format!(
            "{} | {:.0} fps | ambient {:.1} | shadows: {}{}",
            engine.config().window.title,
            s.fps,
            s.ambient,
            if s.passes.is_empty() {
                "none".to_string()
            } else {
                s.passes.join("+")
            },
            flags
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightSummary {
    pub global: f32,
    pub flashlight: f32,
    pub locals: Vec<f32>,
}

/// Snapshot of engine diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSummary {
    pub frame: u64,
    pub fps: f32,
    pub sim_time: f64,
    pub paused: bool,
    pub wireframe: bool,
    pub fullscreen: bool,
    pub debug_lights: bool,
    pub ambient: f32,
    pub objects: usize,
    pub skipped_frames: u64,
    /// Shadow passes run in the latest rendered frame.
    pub passes: Vec<&'static str>,
    pub lights: LightSummary,
}

impl std::fmt::Display for EngineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Engine: frame={} fps={:.1} sim_time={:.3}s paused={} wireframe={} fullscreen={} \
             ambient={:.1} objects={} skipped={} passes=[{}] global={:.2} flashlight={:.2}",
            self.frame,
            self.fps,
            self.sim_time,
            self.paused,
            self.wireframe,
            self.fullscreen,
            self.ambient,
            self.objects,
            self.skipped_frames,
            self.passes.join(","),
            self.lights.global,
            self.lights.flashlight,
        )
    }
}
