//! Shadow depth targets and light-space matrices.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::backend::{DepthTargetId, RenderBackend, RenderError, ShadowBinding};

/// Which shadow-casting light a depth target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShadowSlot {
    /// The orbiting global light (pass 1).
    Global,
    /// The camera-attached flashlight (pass 2).
    Flashlight,
}

impl ShadowSlot {
    /// Pass order within a frame.
    pub const ALL: [ShadowSlot; 2] = [ShadowSlot::Global, ShadowSlot::Flashlight];

    pub const fn index(self) -> usize {
        match self {
            Self::Global => 0,
            Self::Flashlight => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Flashlight => "flashlight",
        }
    }
}

/// Where a shadow-casting light is and where it points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightPose {
    pub position: Vec3,
    /// Unit vector along the light's rays.
    pub direction: Vec3,
}

impl LightPose {
    /// Pose of a light at `position` aimed at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            direction: safe_direction(target - position),
        }
    }
}

/// Frustum used to render a light's depth target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShadowProjection {
    /// Directional light: a box of `half_extent` around `center`, viewed from
    /// `distance` back along the light direction.
    Orthographic {
        center: Vec3,
        half_extent: f32,
        distance: f32,
        near: f32,
        far: f32,
    },
    /// Spot light: perspective from the light position.
    Perspective { fov_y: f32, near: f32, far: f32 },
}

impl ShadowProjection {
    /// Combined view-projection mapping world space into the light's clip space.
    pub fn light_space(&self, pose: &LightPose) -> Mat4 {
        let dir = safe_direction(pose.direction);
        let up = stable_up(dir);
        match *self {
            Self::Orthographic {
                center,
                half_extent,
                distance,
                near,
                far,
            } => {
                let eye = center - dir * distance;
                let view = Mat4::look_at_rh(eye, center, up);
                let proj = Mat4::orthographic_rh(
                    -half_extent,
                    half_extent,
                    -half_extent,
                    half_extent,
                    near,
                    far,
                );
                proj * view
            }
            Self::Perspective { fov_y, near, far } => {
                let view = Mat4::look_at_rh(pose.position, pose.position + dir, up);
                let fov = fov_y.clamp(0.1, std::f32::consts::PI - 0.01);
                let proj = Mat4::perspective_rh(fov, 1.0, near, far.max(near + 0.01));
                proj * view
            }
        }
    }
}

/// Slope-scaled depth bias with a floor, applied at comparison time:
/// `max(slope * (1 - n·l), min)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowBias {
    pub slope: f32,
    pub min: f32,
}

impl Default for ShadowBias {
    fn default() -> Self {
        Self {
            slope: 0.005,
            min: 0.0005,
        }
    }
}

impl ShadowBias {
    pub fn at(&self, n_dot_l: f32) -> f32 {
        (self.slope * (1.0 - n_dot_l.clamp(0.0, 1.0))).max(self.min)
    }
}

/// An off-screen depth target plus the light-space matrix used to fill and
/// later sample it.
#[derive(Debug)]
pub struct ShadowTarget {
    slot: ShadowSlot,
    depth: DepthTargetId,
    resolution: u32,
    projection: ShadowProjection,
    light_space: Mat4,
    pose: Option<LightPose>,
    recomputes: u64,
}

impl ShadowTarget {
    /// Allocate the depth target. Resolution is fixed for the session.
    pub fn allocate<B: RenderBackend + ?Sized>(
        backend: &mut B,
        slot: ShadowSlot,
        resolution: u32,
        projection: ShadowProjection,
    ) -> Result<Self, RenderError> {
        let resolution = resolution.max(1);
        let depth = backend.create_depth_target(resolution)?;
        tracing::debug!(
            "allocated {} shadow target {:?} at {resolution}x{resolution}",
            slot.label(),
            depth
        );
        Ok(Self {
            slot,
            depth,
            resolution,
            projection,
            light_space: Mat4::IDENTITY,
            pose: None,
            recomputes: 0,
        })
    }

    pub fn slot(&self) -> ShadowSlot {
        self.slot
    }

    pub fn depth_target(&self) -> DepthTargetId {
        self.depth
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    /// How many times the light-space matrix has been rebuilt.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Rebuild the light-space matrix if the light moved. Returns true on rebuild.
    pub fn update_light_space(&mut self, pose: LightPose) -> bool {
        if self.pose == Some(pose) {
            return false;
        }
        self.light_space = self.projection.light_space(&pose);
        self.pose = Some(pose);
        self.recomputes += 1;
        true
    }

    pub fn clear<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        backend.clear_depth_target(self.depth);
    }

    pub fn begin_pass<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        backend.begin_shadow_pass(self.depth, self.light_space);
    }

    pub fn binding(&self, sampled: bool) -> ShadowBinding {
        ShadowBinding {
            target: self.depth,
            light_space: self.light_space,
            sampled,
        }
    }

    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        tracing::debug!("releasing {} shadow target", self.slot.label());
        backend.destroy_depth_target(self.depth);
    }
}

fn safe_direction(v: Vec3) -> Vec3 {
    if v.length_squared() > 1e-6 {
        v.normalize()
    } else {
        -Vec3::Z
    }
}

fn stable_up(dir: Vec3) -> Vec3 {
    if dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
}
