//! Rendering core: renderer-agnostic interface and the shadow-mapped frame pipeline.
//!
//! # Invariants
//! - Both shadow depth targets are cleared at the start of every frame.
//! - A shadow pass runs only for an enabled light with non-zero strength.
//! - Shadow passes finish before the main pass begins; the main pass samples
//!   only depth targets rewritten earlier in the same frame.
//! - Renderers never own scene state; they consume [`Renderable`]s and per-frame inputs.
//!
//! # Backends
//! [`RenderBackend`] is the GPU resource provider seam. `shadowbox-render-wgpu`
//! implements it on wgpu; [`RecordingBackend`] implements it in memory and
//! checks pass ordering, for tests and headless runs.

mod backend;
mod mesh;
mod pipeline;
mod recording;
mod shading;
mod shadow;

pub use backend::{
    DepthTargetId, DrawItem, DrawSink, GpuLight, LightKind, MAX_LIGHTS, MainPassParams, MaterialId,
    MeshId, RenderBackend, RenderError, Renderable, ShadowBinding,
};
pub use mesh::{MeshData, Vertex, cube_mesh};
pub use pipeline::{FrameInputs, FramePipeline, PassReport, ShadowRequest};
pub use recording::{Command, RecordingBackend, ResourceEvent, Violation};
pub use shading::{DepthLookup, SurfacePoint, ambient_factor, shade, shadow_coords, shadow_visibility};
pub use shadow::{LightPose, ShadowBias, ShadowProjection, ShadowSlot, ShadowTarget};
