use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use shadowbox_common::Extent;
use shadowbox_input::MovementState;

const PITCH_LIMIT: f32 = 89.0;

/// Starting pose and lens of the fly camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            yaw_deg: -90.0,
            pitch_deg: 0.0,
            fov_deg: 50.0,
            near: 0.1,
            far: 100.0,
            speed: 5.0,
            sensitivity: 0.002,
        }
    }
}

/// Free-fly camera.
///
/// View and projection are cached and rebuilt by every mutating call, so
/// anything read after `update` or `set_aspect_and_projection` is consistent.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    speed: f32,
    sensitivity: f32,
    view: Mat4,
    projection: Mat4,
}

impl FlyCamera {
    pub fn new(config: &CameraConfig, surface: Extent) -> Self {
        let mut camera = Self {
            position: config.position,
            yaw: config.yaw_deg.to_radians(),
            pitch: config
                .pitch_deg
                .clamp(-PITCH_LIMIT, PITCH_LIMIT)
                .to_radians(),
            fov: config.fov_deg.clamp(1.0, 179.0).to_radians(),
            aspect: surface.aspect(),
            near: config.near.max(1e-4),
            far: config.far.max(config.near + 1e-3),
            speed: config.speed,
            sensitivity: config.sensitivity,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.rebuild_view();
        camera.rebuild_projection();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Apply mouse look and held-key movement. Look is not scaled by `dt`, so
    /// the camera can still turn while the simulation is paused.
    pub fn update(&mut self, dt: f32, input: &mut MovementState) {
        let look = input.take_look_delta();
        if look != glam::Vec2::ZERO {
            self.rotate(look.x, look.y);
        }

        let axis = input.axis();
        if axis != Vec3::ZERO && dt > 0.0 {
            let step = self.speed * input.speed_multiplier() * dt;
            let motion = self.right() * axis.x + Vec3::Y * axis.y + self.forward() * axis.z;
            self.position += motion * step;
        }
        self.rebuild_view();
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-PITCH_LIMIT.to_radians(), PITCH_LIMIT.to_radians());
    }

    /// Rebuild the projection for a new output surface size.
    pub fn set_aspect_and_projection(&mut self, width: u32, height: u32) {
        self.aspect = Extent::new(width, height).aspect();
        self.rebuild_projection();
    }

    fn rebuild_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y);
    }

    fn rebuild_projection(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowbox_input::{InputEvent, Key};

    fn camera() -> FlyCamera {
        FlyCamera::new(&CameraConfig::default(), Extent::new(1600, 900))
    }

    #[test]
    fn starts_looking_down_negative_z() {
        let cam = camera();
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 5.0));
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-5);
        assert!(cam.view_projection().to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn forward_key_moves_by_speed_times_dt() {
        let mut cam = camera();
        let mut input = MovementState::new();
        input.observe(&InputEvent::KeyDown(Key::Char('w')));
        cam.update(0.5, &mut input);
        let expected = Vec3::new(0.0, 0.0, 5.0 - 2.5);
        assert!((cam.position() - expected).length() < 1e-4);
    }

    #[test]
    fn zero_dt_does_not_move() {
        let mut cam = camera();
        let mut input = MovementState::new();
        input.observe(&InputEvent::KeyDown(Key::Char('w')));
        cam.update(0.0, &mut input);
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn view_tracks_latest_update() {
        let mut cam = camera();
        let mut input = MovementState::new();
        input.observe(&InputEvent::MouseMotion { dx: 200.0, dy: 0.0 });
        cam.update(0.016, &mut input);
        let expected = Mat4::look_at_rh(cam.position(), cam.position() + cam.forward(), Vec3::Y);
        assert_eq!(cam.view(), expected);
        assert!((cam.forward() - Vec3::NEG_Z).length() > 0.1);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = camera();
        let mut input = MovementState::new();
        input.observe(&InputEvent::MouseMotion {
            dx: 0.0,
            dy: -1.0e6,
        });
        cam.update(0.016, &mut input);
        assert!(cam.forward().y < 1.0);
        assert!(cam.forward().is_finite());
    }

    #[test]
    fn aspect_follows_surface_size() {
        let mut cam = camera();
        let windowed = cam.projection();
        cam.set_aspect_and_projection(1920, 1080);
        assert!((cam.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
        cam.set_aspect_and_projection(1600, 900);
        assert!((cam.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(cam.projection(), windowed);
    }

    #[test]
    fn zero_height_surface_does_not_produce_nan() {
        let mut cam = camera();
        cam.set_aspect_and_projection(800, 0);
        assert!(cam.projection().to_cols_array().iter().all(|v| v.is_finite()));
    }
}
