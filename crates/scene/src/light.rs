use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use shadowbox_render::{GpuLight, LightKind, LightPose, MAX_LIGHTS, ShadowRequest, ShadowSlot};

use crate::camera::FlyCamera;

/// A positioned light: the orbiting global light and the local point lights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    strength: f32,
}

impl Light {
    pub fn new(position: Vec3, color: Vec3, strength: f32) -> Self {
        Self {
            position,
            color,
            strength: strength.max(0.0),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Negative values are clamped to zero.
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.max(0.0);
    }

    pub fn is_lit(&self) -> bool {
        self.strength > 0.0
    }

    /// Orbit the position around `axis` through the origin.
    pub fn rotate_about(&mut self, axis: Vec3, angle: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.position = Quat::from_axis_angle(axis, angle) * self.position;
    }
}

/// Light bound to the camera (the flashlight). It stores no position; its
/// pose is derived from the camera at every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLight {
    pub color: Vec3,
    strength: f32,
    inner_cos: f32,
    outer_cos: f32,
}

impl CameraLight {
    pub fn new(color: Vec3, strength: f32, inner_deg: f32, outer_deg: f32) -> Self {
        let inner = inner_deg.min(outer_deg);
        Self {
            color,
            strength: strength.max(0.0),
            inner_cos: inner.to_radians().cos(),
            outer_cos: outer_deg.to_radians().cos(),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.max(0.0);
    }

    pub fn view(&self, camera: &FlyCamera) -> LightPose {
        LightPose {
            position: camera.position(),
            direction: camera.forward(),
        }
    }

    pub fn kind(&self) -> LightKind {
        LightKind::Spot {
            inner_cos: self.inner_cos,
            outer_cos: self.outer_cos,
        }
    }
}

/// Light placement and intensities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub global_position: Vec3,
    pub global_color: Vec3,
    /// Strength the global light returns to when switched on.
    pub global_value: f32,
    pub global_enabled: bool,
    /// Point the global light aims at while orbiting.
    pub global_target: Vec3,
    /// Radians per second of simulation time, about `orbit_axis`.
    pub orbit_speed: f32,
    pub orbit_axis: Vec3,

    pub flashlight_color: Vec3,
    pub flashlight_value: f32,
    pub flashlight_enabled: bool,
    pub flashlight_inner_deg: f32,
    pub flashlight_outer_deg: f32,

    pub local_lights: Vec<LocalLightConfig>,
    pub local_value: f32,

    pub base_ambient: f32,
    pub ambient_step: f32,
    pub ambient_limit: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalLightConfig {
    pub position: Vec3,
    pub color: Vec3,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            global_position: Vec3::new(-5.0, 2.0, 5.0),
            global_color: Vec3::new(1.0, 1.0, 0.0),
            global_value: 1.0,
            global_enabled: true,
            global_target: Vec3::ZERO,
            orbit_speed: 0.27,
            orbit_axis: Vec3::Y,
            flashlight_color: Vec3::ONE,
            flashlight_value: 1.0,
            flashlight_enabled: false,
            flashlight_inner_deg: 12.5,
            flashlight_outer_deg: 17.5,
            local_lights: vec![
                LocalLightConfig {
                    position: Vec3::new(-7.0, 2.0, -5.0),
                    color: Vec3::new(0.0, 0.0, 1.0),
                },
                LocalLightConfig {
                    position: Vec3::new(7.0, 2.0, -5.0),
                    color: Vec3::new(0.0, 1.0, 0.0),
                },
            ],
            local_value: 1.0,
            base_ambient: 0.1,
            ambient_step: 0.1,
            ambient_limit: 2.0,
        }
    }
}

/// Every light in the scene.
#[derive(Debug, Clone)]
pub struct LightRig {
    pub global: Light,
    pub flashlight: CameraLight,
    pub locals: Vec<Light>,
    target: Vec3,
    orbit_axis: Vec3,
    orbit_speed: f32,
}

impl LightRig {
    pub fn from_config(config: &LightingConfig) -> Self {
        let global_strength = if config.global_enabled {
            config.global_value
        } else {
            0.0
        };
        let flashlight_strength = if config.flashlight_enabled {
            config.flashlight_value
        } else {
            0.0
        };
        let max_locals = MAX_LIGHTS - 2;
        if config.local_lights.len() > max_locals {
            tracing::warn!(
                configured = config.local_lights.len(),
                max_locals,
                "extra local lights ignored"
            );
        }
        Self {
            global: Light::new(config.global_position, config.global_color, global_strength),
            flashlight: CameraLight::new(
                config.flashlight_color,
                flashlight_strength,
                config.flashlight_inner_deg,
                config.flashlight_outer_deg,
            ),
            locals: config
                .local_lights
                .iter()
                .take(max_locals)
                .map(|l| Light::new(l.position, l.color, config.local_value))
                .collect(),
            target: config.global_target,
            orbit_axis: config.orbit_axis,
            orbit_speed: config.orbit_speed,
        }
    }

    /// Advance the global light's orbit by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if dt > 0.0 {
            self.global.rotate_about(self.orbit_axis, self.orbit_speed * dt);
        }
    }

    pub fn global_pose(&self) -> LightPose {
        LightPose::looking_at(self.global.position, self.target)
    }

    /// Lights in main-pass order: global, flashlight, locals.
    pub fn gpu_lights(&self, camera: &FlyCamera) -> Vec<GpuLight> {
        let global = self.global_pose();
        let flash = self.flashlight.view(camera);
        let mut lights = Vec::with_capacity(MAX_LIGHTS);
        lights.push(GpuLight {
            kind: LightKind::Directional,
            position: global.position,
            direction: global.direction,
            color: self.global.color,
            strength: self.global.strength(),
            shadow: Some(ShadowSlot::Global),
        });
        lights.push(GpuLight {
            kind: self.flashlight.kind(),
            position: flash.position,
            direction: flash.direction,
            color: self.flashlight.color,
            strength: self.flashlight.strength(),
            shadow: Some(ShadowSlot::Flashlight),
        });
        lights.extend(self.locals.iter().map(|l| GpuLight {
            kind: LightKind::Point,
            position: l.position,
            direction: Vec3::ZERO,
            color: l.color,
            strength: l.strength(),
            shadow: None,
        }));
        lights
    }

    /// Shadow requests indexed by slot, given the current enable flags.
    pub fn shadow_requests(
        &self,
        camera: &FlyCamera,
        global_enabled: bool,
        flashlight_enabled: bool,
    ) -> [ShadowRequest; 2] {
        [
            ShadowRequest {
                enabled: global_enabled,
                strength: self.global.strength(),
                pose: self.global_pose(),
            },
            ShadowRequest {
                enabled: flashlight_enabled,
                strength: self.flashlight.strength(),
                pose: self.flashlight.view(camera),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use shadowbox_common::Extent;

    #[test]
    fn orbit_preserves_height_and_radius() {
        let mut light = Light::new(Vec3::new(-5.0, 2.0, 5.0), Vec3::ONE, 1.0);
        let radius = Vec3::new(light.position.x, 0.0, light.position.z).length();
        light.rotate_about(Vec3::Y, 1.3);
        assert!((light.position.y - 2.0).abs() < 1e-5);
        let after = Vec3::new(light.position.x, 0.0, light.position.z).length();
        assert!((after - radius).abs() < 1e-4);
    }

    #[test]
    fn full_turn_returns_home() {
        let start = Vec3::new(-5.0, 2.0, 5.0);
        let mut light = Light::new(start, Vec3::ONE, 1.0);
        light.rotate_about(Vec3::Y, std::f32::consts::TAU);
        assert!((light.position - start).length() < 1e-4);
    }

    #[test]
    fn degenerate_axis_is_ignored() {
        let mut light = Light::new(Vec3::X, Vec3::ONE, 1.0);
        light.rotate_about(Vec3::ZERO, 1.0);
        assert_eq!(light.position, Vec3::X);
    }

    #[test]
    fn strength_never_negative() {
        let mut light = Light::new(Vec3::ZERO, Vec3::ONE, -3.0);
        assert_eq!(light.strength(), 0.0);
        light.set_strength(-1.0);
        assert!(!light.is_lit());
    }

    #[test]
    fn camera_light_follows_camera() {
        let config = CameraConfig::default();
        let mut camera = FlyCamera::new(&config, Extent::new(1600, 900));
        let light = CameraLight::new(Vec3::ONE, 1.0, 12.5, 17.5);
        let before = light.view(&camera);
        assert_eq!(before.position, camera.position());

        let mut input = shadowbox_input::MovementState::new();
        input.observe(&shadowbox_input::InputEvent::KeyDown(shadowbox_input::Key::Char('w')));
        camera.update(1.0, &mut input);
        let after = light.view(&camera);
        assert_eq!(after.position, camera.position());
        assert_ne!(after.position, before.position);
        assert_eq!(after.direction, camera.forward());
    }

    #[test]
    fn rig_defaults_match_startup_state() {
        let rig = LightRig::from_config(&LightingConfig::default());
        assert_eq!(rig.global.strength(), 1.0);
        assert_eq!(rig.flashlight.strength(), 0.0);
        assert_eq!(rig.locals.len(), 2);
        let camera = FlyCamera::new(&CameraConfig::default(), Extent::new(1600, 900));
        let lights = rig.gpu_lights(&camera);
        assert_eq!(lights.len(), MAX_LIGHTS);
        assert_eq!(lights[0].shadow, Some(ShadowSlot::Global));
        assert_eq!(lights[1].shadow, Some(ShadowSlot::Flashlight));
        assert!(lights[2..].iter().all(|l| l.shadow.is_none()));
    }

    #[test]
    fn rig_update_orbits_global_light() {
        let mut rig = LightRig::from_config(&LightingConfig::default());
        let start = rig.global.position;
        rig.update(0.0);
        assert_eq!(rig.global.position, start);
        rig.update(1.0);
        assert_ne!(rig.global.position, start);
    }

    #[test]
    fn too_many_locals_are_truncated() {
        let mut config = LightingConfig::default();
        config.local_lights.push(LocalLightConfig {
            position: Vec3::ZERO,
            color: Vec3::ONE,
        });
        let rig = LightRig::from_config(&config);
        assert_eq!(rig.locals.len(), MAX_LIGHTS - 2);
    }
}
