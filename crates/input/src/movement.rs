use std::collections::HashSet;

use glam::{Vec2, Vec3};

use crate::event::{InputEvent, Key};

/// Speed multiplier while a shift key is held.
pub const BOOST_FACTOR: f32 = 3.0;

/// Held-key and mouse-look state for the free-fly camera.
///
/// Fed with every input event in order; read once per frame by the camera.
#[derive(Debug, Clone, Default)]
pub struct MovementState {
    held: HashSet<Key>,
    look: Vec2,
}

impl MovementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track key state and accumulate pointer motion.
    pub fn observe(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::KeyDown(key) => {
                self.held.insert(key);
            }
            InputEvent::KeyUp(key) => {
                self.held.remove(&key);
            }
            InputEvent::MouseMotion { dx, dy } => {
                self.look += Vec2::new(dx, dy);
            }
            _ => {}
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Desired movement in camera space: x = right, y = up, z = forward.
    /// Not normalized; opposing keys cancel.
    pub fn axis(&self) -> Vec3 {
        let mut axis = Vec3::ZERO;
        if self.is_held(Key::Char('w')) {
            axis.z += 1.0;
        }
        if self.is_held(Key::Char('s')) {
            axis.z -= 1.0;
        }
        if self.is_held(Key::Char('d')) {
            axis.x += 1.0;
        }
        if self.is_held(Key::Char('a')) {
            axis.x -= 1.0;
        }
        if self.is_held(Key::Char('e')) || self.is_held(Key::Space) {
            axis.y += 1.0;
        }
        if self.is_held(Key::Char('q')) || self.is_held(Key::ControlLeft) {
            axis.y -= 1.0;
        }
        axis.clamp(Vec3::NEG_ONE, Vec3::ONE)
    }

    pub fn speed_multiplier(&self) -> f32 {
        if self.is_held(Key::ShiftLeft) || self.is_held(Key::ShiftRight) {
            BOOST_FACTOR
        } else {
            1.0
        }
    }

    /// Pointer motion accumulated since the last call.
    pub fn take_look_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.look)
    }

    /// Forget held keys, e.g. after the window loses focus.
    pub fn release_all(&mut self) {
        self.held.clear();
        self.look = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_produce_axis() {
        let mut m = MovementState::new();
        m.observe(&InputEvent::KeyDown(Key::Char('w')));
        m.observe(&InputEvent::KeyDown(Key::Char('d')));
        assert_eq!(m.axis(), Vec3::new(1.0, 0.0, 1.0));

        m.observe(&InputEvent::KeyUp(Key::Char('w')));
        assert_eq!(m.axis(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut m = MovementState::new();
        m.observe(&InputEvent::KeyDown(Key::Char('a')));
        m.observe(&InputEvent::KeyDown(Key::Char('d')));
        assert_eq!(m.axis(), Vec3::ZERO);
    }

    #[test]
    fn vertical_aliases_do_not_double() {
        let mut m = MovementState::new();
        m.observe(&InputEvent::KeyDown(Key::Char('e')));
        m.observe(&InputEvent::KeyDown(Key::Space));
        assert_eq!(m.axis().y, 1.0);
    }

    #[test]
    fn look_delta_accumulates_and_drains() {
        let mut m = MovementState::new();
        m.observe(&InputEvent::MouseMotion { dx: 2.0, dy: -1.0 });
        m.observe(&InputEvent::MouseMotion { dx: 3.0, dy: 4.0 });
        assert_eq!(m.take_look_delta(), Vec2::new(5.0, 3.0));
        assert_eq!(m.take_look_delta(), Vec2::ZERO);
    }

    #[test]
    fn shift_boosts() {
        let mut m = MovementState::new();
        assert_eq!(m.speed_multiplier(), 1.0);
        m.observe(&InputEvent::KeyDown(Key::ShiftLeft));
        assert_eq!(m.speed_multiplier(), BOOST_FACTOR);
        m.release_all();
        assert_eq!(m.speed_multiplier(), 1.0);
    }
}
