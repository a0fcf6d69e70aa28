use serde::{Deserialize, Serialize};

/// Direction of a single ambient adjustment (one mouse-wheel notch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmbientStep {
    Up,
    Down,
}

/// A discrete engine action produced from input.
///
/// The engine state machine consumes actions, never raw input events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Release every owned GPU resource and terminate.
    Quit,
    /// Stop or resume simulation time.
    TogglePause,
    /// Switch the rasterizer between filled polygons and wireframe.
    ToggleWireframe,
    /// Switch between the windowed and full-screen surface.
    ToggleFullscreen,
    /// Turn the camera-attached light on or off.
    ToggleFlashlight,
    /// Turn the orbiting global light on or off.
    ToggleGlobalLight,
    /// Show or hide light marker geometry. Diagnostic only.
    ToggleDebugLights,
    /// Nudge the global ambient term by one step.
    AdjustAmbient(AmbientStep),
}

impl Action {
    /// Short label used in logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::TogglePause => "toggle-pause",
            Self::ToggleWireframe => "toggle-wireframe",
            Self::ToggleFullscreen => "toggle-fullscreen",
            Self::ToggleFlashlight => "toggle-flashlight",
            Self::ToggleGlobalLight => "toggle-global-light",
            Self::ToggleDebugLights => "toggle-debug-light-viz",
            Self::AdjustAmbient(AmbientStep::Up) => "scroll-up",
            Self::AdjustAmbient(AmbientStep::Down) => "scroll-down",
        }
    }

    /// Parse a label produced by [`Action::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        let action = match label {
            "quit" => Self::Quit,
            "toggle-pause" => Self::TogglePause,
            "toggle-wireframe" => Self::ToggleWireframe,
            "toggle-fullscreen" => Self::ToggleFullscreen,
            "toggle-flashlight" => Self::ToggleFlashlight,
            "toggle-global-light" => Self::ToggleGlobalLight,
            "toggle-debug-light-viz" => Self::ToggleDebugLights,
            "scroll-up" => Self::AdjustAmbient(AmbientStep::Up),
            "scroll-down" => Self::AdjustAmbient(AmbientStep::Down),
            _ => return None,
        };
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        let all = [
            Action::Quit,
            Action::TogglePause,
            Action::ToggleWireframe,
            Action::ToggleFullscreen,
            Action::ToggleFlashlight,
            Action::ToggleGlobalLight,
            Action::ToggleDebugLights,
            Action::AdjustAmbient(AmbientStep::Up),
            Action::AdjustAmbient(AmbientStep::Down),
        ];
        for action in all {
            assert_eq!(Action::from_label(action.label()), Some(action));
        }
    }

    #[test]
    fn unknown_label() {
        assert_eq!(Action::from_label("jump"), None);
    }
}
