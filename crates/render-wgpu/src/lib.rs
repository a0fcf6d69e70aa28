//! wgpu render backend for shadowbox.
//!
//! Implements [`shadowbox_render::RenderBackend`] with two depth-only shadow
//! pipelines feeding a comparison sampler, and a textured forward pipeline
//! (fill, plus line when the adapter supports it).
//!
//! # Invariants
//! - Each shadow target owns its light-space uniform, so both shadow passes
//!   can be encoded into a single submission.
//! - A depth clear followed by a pass on the same target becomes the pass's
//!   load operation.
//! - The backend never sees scene state, only draw items and pass parameters.

mod gpu;
mod plan;
mod shaders;
mod uniforms;

pub use gpu::WgpuBackend;
pub use shaders::{SCENE_SHADER, SHADOW_SHADER};
