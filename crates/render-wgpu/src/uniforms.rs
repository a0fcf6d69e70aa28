//! CPU-side layouts of the shader uniforms and per-instance data.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use shadowbox_render::{DrawItem, GpuLight, LightKind, MAX_LIGHTS, MainPassParams};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct LightUniform {
    pub position_kind: [f32; 4],
    pub direction_shadow: [f32; 4],
    pub color_strength: [f32; 4],
    pub cone: [f32; 4],
}

impl LightUniform {
    fn from_light(light: &GpuLight) -> Self {
        let (kind, cone) = match light.kind {
            LightKind::Directional => (0.0, [0.0; 4]),
            LightKind::Spot {
                inner_cos,
                outer_cos,
            } => (1.0, [inner_cos, outer_cos, 0.0, 0.0]),
            LightKind::Point => (2.0, [0.0; 4]),
        };
        let slot = light.shadow.map_or(-1.0, |s| s.index() as f32);
        Self {
            position_kind: light.position.extend(kind).to_array(),
            direction_shadow: light.direction.extend(slot).to_array(),
            color_strength: light.color.extend(light.strength).to_array(),
            cone,
        }
    }
}

/// Mirrors `Frame` in the scene shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_space: [[[f32; 4]; 4]; 2],
    pub camera_ambient: [f32; 4],
    pub params: [f32; 4],
    pub shadow_flags: [f32; 4],
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl FrameUniform {
    pub fn from_params(params: &MainPassParams) -> Self {
        let mut lights = [LightUniform::zeroed(); MAX_LIGHTS];
        let count = params.lights.len().min(MAX_LIGHTS);
        for (slot, light) in lights.iter_mut().zip(&params.lights) {
            *slot = LightUniform::from_light(light);
        }
        let flag = |sampled: bool| if sampled { 1.0 } else { 0.0 };
        Self {
            view_proj: params.view_proj.to_cols_array_2d(),
            light_space: [
                params.shadows[0].light_space.to_cols_array_2d(),
                params.shadows[1].light_space.to_cols_array_2d(),
            ],
            camera_ambient: params.camera_position.extend(params.ambient).to_array(),
            params: [params.bias.slope, params.bias.min, count as f32, 0.0],
            shadow_flags: [
                flag(params.shadows[0].sampled),
                flag(params.shadows[1].sampled),
                0.0,
                0.0,
            ],
            lights,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ShadowUniform {
    pub light_space: [[f32; 4]; 4],
}

impl ShadowUniform {
    pub fn new(light_space: Mat4) -> Self {
        Self {
            light_space: light_space.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct InstanceData {
    pub model_0: [f32; 4],
    pub model_1: [f32; 4],
    pub model_2: [f32; 4],
    pub model_3: [f32; 4],
    pub normal_0: [f32; 4],
    pub normal_1: [f32; 4],
    pub normal_2: [f32; 4],
    pub albedo_emissive: [f32; 4],
}

impl InstanceData {
    pub fn from_item(item: &DrawItem) -> Self {
        let cols = item.model.to_cols_array_2d();
        let linear = Mat3::from_mat4(item.model);
        // Degenerate scales fall back to the plain linear part.
        let normal = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            linear
        };
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            normal_0: normal.x_axis.extend(0.0).to_array(),
            normal_1: normal.y_axis.extend(0.0).to_array(),
            normal_2: normal.z_axis.extend(0.0).to_array(),
            albedo_emissive: item
                .albedo
                .extend(if item.emissive { 1.0 } else { 0.0 })
                .to_array(),
        }
    }
}
