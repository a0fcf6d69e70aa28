//! Input: platform-neutral events mapped to engine actions.
//!
//! # Invariants
//! - The platform layer only produces [`InputEvent`]s; it never touches engine state.
//! - Discrete toggles become [`Action`]s through [`KeyBindings`]; held keys and
//!   mouse motion feed [`MovementState`] for the free-fly camera.

pub mod action;
pub mod bindings;
pub mod event;
pub mod movement;

pub use action::{Action, AmbientStep};
pub use bindings::KeyBindings;
pub use event::{InputEvent, Key};
pub use movement::MovementState;
