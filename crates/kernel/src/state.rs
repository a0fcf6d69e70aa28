//! Engine toggle state and the input-driven transitions over it.

use shadowbox_input::{Action, AmbientStep};

use crate::config::EngineConfig;

/// On-values and ambient bounds the toggle machine writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightPresets {
    pub global_on: f32,
    pub flashlight_on: f32,
    pub ambient_step: f32,
    pub ambient_limit: f32,
}

impl LightPresets {
    pub fn from_config(config: &EngineConfig) -> Self {
        let l = &config.lighting;
        Self {
            global_on: l.global_value,
            flashlight_on: l.flashlight_value,
            ambient_step: l.ambient_step,
            ambient_limit: l.ambient_limit,
        }
    }
}

/// Flags and knobs read by update and render.
///
/// Only [`EngineState::apply`] writes them; each frame sees one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub paused: bool,
    pub wireframe: bool,
    pub fullscreen: bool,
    pub flashlight: bool,
    pub global_light: bool,
    pub debug_lights: bool,
    /// User-adjusted term added on top of the base ambient level.
    pub global_ambient: f32,
}

/// Side effect an action asks the engine to carry out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    None,
    Quit,
    SetWireframe(bool),
    SetFullscreen(bool),
    FlashlightStrength(f32),
    GlobalLightStrength(f32),
    AmbientChanged(f32),
}

impl EngineState {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            paused: false,
            wireframe: false,
            fullscreen: config.window.start_fullscreen,
            flashlight: config.lighting.flashlight_enabled,
            global_light: config.lighting.global_enabled,
            debug_lights: false,
            global_ambient: 0.0,
        }
    }

    /// Apply one action and report what the engine must do about it.
    pub fn apply(&mut self, action: Action, presets: &LightPresets) -> Effect {
        let effect = match action {
            Action::Quit => Effect::Quit,
            Action::TogglePause => {
                self.paused = !self.paused;
                Effect::None
            }
            Action::ToggleWireframe => {
                self.wireframe = !self.wireframe;
                Effect::SetWireframe(self.wireframe)
            }
            Action::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                Effect::SetFullscreen(self.fullscreen)
            }
            Action::ToggleFlashlight => {
                self.flashlight = !self.flashlight;
                Effect::FlashlightStrength(if self.flashlight {
                    presets.flashlight_on
                } else {
                    0.0
                })
            }
            Action::ToggleGlobalLight => {
                self.global_light = !self.global_light;
                Effect::GlobalLightStrength(if self.global_light {
                    presets.global_on
                } else {
                    0.0
                })
            }
            Action::ToggleDebugLights => {
                self.debug_lights = !self.debug_lights;
                Effect::None
            }
            Action::AdjustAmbient(step) => {
                let before = self.global_ambient;
                self.global_ambient = stepped_ambient(before, step, presets);
                if self.global_ambient == before {
                    Effect::None
                } else {
                    Effect::AmbientChanged(self.global_ambient)
                }
            }
        };
        tracing::debug!(action = action.label(), ?effect, "action applied");
        effect
    }
}

/// Move one step and snap to the step grid so repeated steps do not drift.
fn stepped_ambient(current: f32, step: AmbientStep, presets: &LightPresets) -> f32 {
    let size = presets.ambient_step;
    let limit = presets.ambient_limit;
    if size <= 0.0 {
        return current.clamp(-limit, limit);
    }
    let direction = match step {
        AmbientStep::Up => 1.0,
        AmbientStep::Down => -1.0,
    };
    let steps = (current / size).round() + direction;
    (steps * size).clamp(-limit, limit)
}
