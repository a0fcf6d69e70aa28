use std::collections::BTreeMap;

use crate::action::{Action, AmbientStep};
use crate::event::{InputEvent, Key};

/// Maps key presses to engine actions.
///
/// Quit and mouse-wheel events translate without a binding; everything else
/// goes through the key map.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    keys: BTreeMap<Key, Action>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let keys = BTreeMap::from([
            (Key::Escape, Action::Quit),
            (Key::F(1), Action::TogglePause),
            (Key::F(2), Action::ToggleGlobalLight),
            (Key::F(3), Action::ToggleWireframe),
            (Key::F(4), Action::ToggleDebugLights),
            (Key::F(11), Action::ToggleFullscreen),
            (Key::Char('f'), Action::ToggleFlashlight),
        ]);
        Self { keys }
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }

    /// Bind `key` to `action`, replacing any previous binding.
    pub fn bind(&mut self, key: Key, action: Action) -> Option<Action> {
        self.keys.insert(key, action)
    }

    pub fn action_for(&self, key: Key) -> Option<Action> {
        self.keys.get(&key).copied()
    }

    /// Translate one platform event into an engine action, if it maps to one.
    pub fn translate(&self, event: &InputEvent) -> Option<Action> {
        match *event {
            InputEvent::Quit => Some(Action::Quit),
            InputEvent::KeyDown(key) => self.action_for(key),
            InputEvent::MouseWheel(delta) if delta > 0.0 => {
                Some(Action::AdjustAmbient(AmbientStep::Up))
            }
            InputEvent::MouseWheel(delta) if delta < 0.0 => {
                Some(Action::AdjustAmbient(AmbientStep::Down))
            }
            // A zero wheel delta (horizontal-only scroll) adjusts nothing.
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Action)> {
        self.keys.iter()
    }
}
