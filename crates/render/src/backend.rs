use glam::{Mat4, Vec3};
use shadowbox_common::{Extent, TextureImage};

use crate::mesh::MeshData;
use crate::shadow::{ShadowBias, ShadowSlot};

/// Upper bound on lights uploaded to the main pass.
pub const MAX_LIGHTS: usize = 4;

/// Handle to an off-screen depth-only render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthTargetId(pub u32);

/// Handle to uploaded vertex/index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Handle to a texture plus its sampler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Errors surfaced by a render backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("backend initialization failed: {0}")]
    Init(String),
    #[error("output surface lost or outdated")]
    SurfaceLost,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("unknown {kind} handle {id}")]
    UnknownResource { kind: &'static str, id: u32 },
    #[error("unrecoverable backend failure: {0}")]
    Fatal(String),
}

impl RenderError {
    /// Recoverable errors skip the current frame; everything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceLost | Self::Timeout)
    }
}

/// One draw: a mesh instance with its material and model transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub model: Mat4,
    pub albedo: Vec3,
    /// Drawn unlit with `albedo` as its colour. Used for light markers.
    pub emissive: bool,
}

/// Receives draws for the pass currently open.
pub trait DrawSink {
    fn draw(&mut self, item: &DrawItem);
}

/// A scene entity that can draw itself into every pass of a frame.
///
/// The same transform must be used in all three contexts so the depth written
/// by a shadow pass matches the geometry shaded by the main pass.
pub trait Renderable {
    /// Advance per-object animation by `dt` seconds of simulation time.
    fn update(&mut self, dt: f32);

    /// Full-shading draw for the visible surface.
    fn render_main<S: DrawSink + ?Sized>(&self, sink: &mut S);

    /// Depth-only draw into the given light's shadow target.
    fn render_shadow<S: DrawSink + ?Sized>(&self, slot: ShadowSlot, sink: &mut S);
}

/// How a light's contribution falls off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Parallel rays along `direction`; no attenuation.
    Directional,
    /// Cone along `direction`, cosines of the inner and outer half-angles.
    Spot { inner_cos: f32, outer_cos: f32 },
    /// Omnidirectional with distance attenuation.
    Point,
}

/// A light as seen by the main pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuLight {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub strength: f32,
    /// Depth target that occludes this light, if it casts shadows.
    pub shadow: Option<ShadowSlot>,
}

/// A shadow target as bound to the main pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowBinding {
    pub target: DepthTargetId,
    pub light_space: Mat4,
    /// False when the target was not rewritten this frame; the shader must not read it.
    pub sampled: bool,
}

/// Everything the main pass needs besides the draws.
#[derive(Debug, Clone, PartialEq)]
pub struct MainPassParams {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub clear_color: Vec3,
    /// Final ambient multiplier applied to albedo.
    pub ambient: f32,
    pub lights: Vec<GpuLight>,
    /// Indexed by [`ShadowSlot::index`].
    pub shadows: [ShadowBinding; 2],
    pub bias: ShadowBias,
}

impl MainPassParams {
    pub fn shadow(&self, slot: ShadowSlot) -> &ShadowBinding {
        &self.shadows[slot.index()]
    }
}

/// GPU resource provider consumed by the frame pipeline.
///
/// Resources are exclusively owned by whoever allocated them and must be
/// destroyed explicitly. Pass methods are called strictly in order within a
/// frame: `begin_frame`, clears, shadow passes, the main pass, `present`.
pub trait RenderBackend: DrawSink {
    fn create_depth_target(&mut self, resolution: u32) -> Result<DepthTargetId, RenderError>;
    fn destroy_depth_target(&mut self, id: DepthTargetId);

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, RenderError>;
    fn destroy_mesh(&mut self, id: MeshId);

    fn create_material(&mut self, texture: &TextureImage) -> Result<MaterialId, RenderError>;
    fn destroy_material(&mut self, id: MaterialId);

    /// Switch rasterizer fill mode for every subsequent pass, shadow passes included.
    /// Returns the mode actually in effect; a backend may lack line rasterization.
    fn set_wireframe(&mut self, enabled: bool) -> bool;

    /// Adopt a new output surface size (viewport and main depth buffer).
    fn resize(&mut self, extent: Extent);

    /// Acquire the output surface for a new frame.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    fn clear_depth_target(&mut self, id: DepthTargetId);
    fn begin_shadow_pass(&mut self, id: DepthTargetId, light_space: Mat4);
    fn begin_main_pass(&mut self, params: &MainPassParams);
    fn end_pass(&mut self);

    /// Submit the recorded frame and show it.
    fn present(&mut self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(RenderError::SurfaceLost.is_recoverable());
        assert!(RenderError::Timeout.is_recoverable());
        assert!(!RenderError::OutOfMemory.is_recoverable());
        assert!(!RenderError::Fatal("device lost".into()).is_recoverable());
    }

    #[test]
    fn error_messages_name_the_handle() {
        let e = RenderError::UnknownResource {
            kind: "mesh",
            id: 7,
        };
        assert_eq!(e.to_string(), "unknown mesh handle 7");
    }
}
