use serde::{Deserialize, Serialize};
use shadowbox_common::Extent;

/// Keyboard key identifier, independent of the windowing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Space,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    /// Function key F1..F12.
    F(u8),
    /// Letter or digit key, lower-case.
    Char(char),
}

/// One discrete event delivered by the platform layer, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Window close request or OS quit signal.
    Quit,
    KeyDown(Key),
    KeyUp(Key),
    /// Vertical wheel delta; positive scrolls up.
    MouseWheel(f32),
    /// Relative pointer motion in pixels.
    MouseMotion { dx: f32, dy: f32 },
    /// The OS resized the output surface.
    Resized(Extent),
}
