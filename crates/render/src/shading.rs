//! CPU reference of the main-pass lighting model.
//!
//! Mirrors `fs_main` in the wgpu backend's scene shader term for term so the
//! lighting rules can be checked without a GPU.

use glam::{Mat4, Vec2, Vec3};

use crate::backend::{GpuLight, LightKind, MainPassParams};
use crate::shadow::ShadowSlot;

pub const SPECULAR_STRENGTH: f32 = 0.5;
pub const SHININESS: f32 = 32.0;
const ATTENUATION_LINEAR: f32 = 0.09;
const ATTENUATION_QUADRATIC: f32 = 0.032;

/// A shaded surface sample in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    pub normal: Vec3,
    /// Albedo already multiplied by the texture colour.
    pub albedo: Vec3,
}

/// Stored depth of a shadow target at a texture coordinate.
pub trait DepthLookup {
    fn depth_at(&self, slot: ShadowSlot, uv: Vec2) -> f32;
}

/// Ambient multiplier from the base level and the user-adjusted global term.
pub fn ambient_factor(base: f32, global_ambient: f32) -> f32 {
    (base * (1.0 + global_ambient)).max(0.0)
}

/// Texture coordinate and depth of `world` in a light's depth target, or
/// `None` when the point falls outside the light frustum.
pub fn shadow_coords(light_space: Mat4, world: Vec3) -> Option<(Vec2, f32)> {
    let clip = light_space * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, ndc.y * -0.5 + 0.5);
    Some((uv, ndc.z))
}

/// 1.0 when lit, 0.0 when occluded. Points outside the frustum are lit.
pub fn shadow_visibility<L: DepthLookup + ?Sized>(
    lookup: &L,
    slot: ShadowSlot,
    light_space: Mat4,
    world: Vec3,
    bias: f32,
) -> f32 {
    match shadow_coords(light_space, world) {
        Some((uv, depth)) if depth - bias > lookup.depth_at(slot, uv) => 0.0,
        _ => 1.0,
    }
}

/// Colour of `point` as seen from the camera in `params`.
///
/// A light with zero strength contributes nothing and its depth target is
/// never consulted; the same holds for shadow bindings marked not sampled.
pub fn shade<L: DepthLookup + ?Sized>(
    point: &SurfacePoint,
    params: &MainPassParams,
    lookup: &L,
) -> Vec3 {
    let n = point.normal.normalize_or_zero();
    let v = (params.camera_position - point.position).normalize_or_zero();
    let mut color = point.albedo * params.ambient;

    for light in &params.lights {
        if light.strength <= 0.0 {
            continue;
        }
        let (l, attenuation) = incidence(light, point.position);
        let n_dot_l = n.dot(l);
        if n_dot_l <= 0.0 || attenuation <= 0.0 {
            continue;
        }

        let visibility = match light.shadow {
            Some(slot) if params.shadow(slot).sampled => {
                let binding = params.shadow(slot);
                shadow_visibility(
                    lookup,
                    slot,
                    binding.light_space,
                    point.position,
                    params.bias.at(n_dot_l),
                )
            }
            _ => 1.0,
        };
        if visibility <= 0.0 {
            continue;
        }

        let h = (l + v).normalize_or_zero();
        let specular = n.dot(h).max(0.0).powf(SHININESS) * SPECULAR_STRENGTH;
        let lit = point.albedo * n_dot_l + Vec3::splat(specular);
        color += light.color * light.strength * lit * attenuation * visibility;
    }
    color
}

/// Direction towards the light and its attenuation at `world`.
fn incidence(light: &GpuLight, world: Vec3) -> (Vec3, f32) {
    match light.kind {
        LightKind::Directional => (-light.direction.normalize_or_zero(), 1.0),
        LightKind::Point => {
            let to_light = light.position - world;
            (to_light.normalize_or_zero(), distance_attenuation(to_light.length()))
        }
        LightKind::Spot {
            inner_cos,
            outer_cos,
        } => {
            let to_light = light.position - world;
            let l = to_light.normalize_or_zero();
            let theta = l.dot(-light.direction.normalize_or_zero());
            let softness = (inner_cos - outer_cos).max(1e-4);
            let cone = ((theta - outer_cos) / softness).clamp(0.0, 1.0);
            (l, cone * distance_attenuation(to_light.length()))
        }
    }
}

fn distance_attenuation(d: f32) -> f32 {
    1.0 / (1.0 + ATTENUATION_LINEAR * d + ATTENUATION_QUADRATIC * d * d)
}
