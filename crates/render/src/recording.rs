//! In-memory [`RenderBackend`] that records every call and checks pass ordering.
//!
//! Used by tests and headless runs. It never touches a GPU; instead it keeps
//! the command stream of the current frame, a log of resource creation and
//! destruction, and a list of ordering [`Violation`]s. The one that matters
//! most is [`Violation::StaleShadowRead`]: the main pass sampling a depth
//! target that no shadow pass wrote since the frame began.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use glam::Mat4;
use shadowbox_common::{Extent, TextureImage};

use crate::backend::{
    DepthTargetId, DrawItem, DrawSink, MainPassParams, MaterialId, MeshId, RenderBackend,
    RenderError,
};
use crate::mesh::MeshData;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    ClearDepth(DepthTargetId),
    BeginShadowPass {
        target: DepthTargetId,
        light_space: Mat4,
    },
    BeginMainPass(Box<MainPassParams>),
    Draw(DrawItem),
    EndPass,
    Present,
}

impl Command {
    /// Short human-readable form, draws excluded from detail.
    pub fn label(&self) -> String {
        match self {
            Self::BeginFrame => "begin-frame".into(),
            Self::ClearDepth(id) => format!("clear {id:?}"),
            Self::BeginShadowPass { target, .. } => format!("shadow {target:?}"),
            Self::BeginMainPass(_) => "main".into(),
            Self::Draw(item) => format!("draw {:?}", item.mesh),
            Self::EndPass => "end".into(),
            Self::Present => "present".into(),
        }
    }
}

/// Resource lifecycle event, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    CreatedDepthTarget(DepthTargetId),
    DestroyedDepthTarget(DepthTargetId),
    UploadedMesh(MeshId),
    DestroyedMesh(MeshId),
    CreatedMaterial(MaterialId),
    DestroyedMaterial(MaterialId),
}

/// A call sequence a real GPU backend would reject or render wrongly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The main pass sampled a depth target not written by a shadow pass this frame.
    StaleShadowRead { frame: u64, target: DepthTargetId },
    /// A shadow pass was opened after the main pass of the same frame.
    ShadowPassAfterMain { frame: u64, target: DepthTargetId },
    /// A pass was begun (or the frame presented) while another was still open.
    PassNotEnded { frame: u64 },
    /// A draw arrived with no pass open.
    DrawOutsidePass { frame: u64 },
    /// A pass command arrived outside `begin_frame`/`present`.
    OutsideFrame { command: String },
    /// A handle that was never created or is already destroyed.
    UnknownResource { kind: &'static str, id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenPass {
    Shadow(DepthTargetId),
    Main,
}

#[derive(Debug)]
pub struct RecordingBackend {
    next_id: u32,
    depth_targets: BTreeMap<DepthTargetId, u32>,
    meshes: BTreeMap<MeshId, u32>,
    materials: BTreeSet<MaterialId>,
    resources: Vec<ResourceEvent>,

    frame: u64,
    presented: u64,
    in_frame: bool,
    open_pass: Option<OpenPass>,
    main_done: bool,
    written: BTreeSet<DepthTargetId>,
    commands: Vec<Command>,
    pass_line_modes: Vec<bool>,
    violations: Vec<Violation>,

    wireframe: bool,
    line_mode_supported: bool,
    extent: Extent,
    pending_failure: Option<RenderError>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            depth_targets: BTreeMap::new(),
            meshes: BTreeMap::new(),
            materials: BTreeSet::new(),
            resources: Vec::new(),
            frame: 0,
            presented: 0,
            in_frame: false,
            open_pass: None,
            main_done: false,
            written: BTreeSet::new(),
            commands: Vec::new(),
            pass_line_modes: Vec::new(),
            violations: Vec::new(),
            wireframe: false,
            line_mode_supported: true,
            extent: Extent::new(1600, 900),
            pending_failure: None,
        }
    }

    /// Behave like an adapter without line rasterization.
    pub fn without_line_mode(mut self) -> Self {
        self.line_mode_supported = false;
        self
    }

    /// Make the next `begin_frame` fail with `error`.
    pub fn fail_next_frame(&mut self, error: RenderError) {
        self.pending_failure = Some(error);
    }

    /// Commands of the most recent frame (cleared by `begin_frame`).
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn resource_log(&self) -> &[ResourceEvent] {
        &self.resources
    }

    /// Frames begun successfully.
    pub fn frames_begun(&self) -> u64 {
        self.frame
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// Whether line rasterization was in effect as each pass of the current
    /// frame began, in pass order.
    pub fn pass_line_modes(&self) -> &[bool] {
        &self.pass_line_modes
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn is_live_depth_target(&self, id: DepthTargetId) -> bool {
        self.depth_targets.contains_key(&id)
    }

    /// Live resources: depth targets, meshes, materials.
    pub fn live_resources(&self) -> (usize, usize, usize) {
        (self.depth_targets.len(), self.meshes.len(), self.materials.len())
    }

    /// Parameters of the latest main pass in the current frame.
    pub fn last_main_pass(&self) -> Option<&MainPassParams> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::BeginMainPass(params) => Some(params.as_ref()),
            _ => None,
        })
    }

    /// Draws recorded into `target`'s shadow pass this frame.
    pub fn shadow_draws(&self, target: DepthTargetId) -> usize {
        let mut inside = false;
        let mut count = 0;
        for command in &self.commands {
            match command {
                Command::BeginShadowPass { target: t, .. } => inside = *t == target,
                Command::BeginMainPass(_) | Command::EndPass => inside = false,
                Command::Draw(_) if inside => count += 1,
                _ => {}
            }
        }
        count
    }

    /// Multi-line summary of the current frame's passes.
    pub fn describe_last_frame(&self) -> String {
        let mut out = format!("frame {}", self.frame);
        let mut draws = 0usize;
        for command in &self.commands {
            if let Command::Draw(_) = command {
                draws += 1;
                continue;
            }
            if draws > 0 {
                let _ = write!(out, " ({draws} draws)");
                draws = 0;
            }
            let _ = write!(out, "\n  {}", command.label());
        }
        if draws > 0 {
            let _ = write!(out, " ({draws} draws)");
        }
        out
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn flag(&mut self, violation: Violation) {
        tracing::warn!(?violation, "render ordering violation");
        self.violations.push(violation);
    }

    fn require_frame(&mut self, command: &str) -> bool {
        if !self.in_frame {
            self.flag(Violation::OutsideFrame {
                command: command.to_string(),
            });
        }
        self.in_frame
    }

    fn open(&mut self, pass: OpenPass) {
        if self.open_pass.is_some() {
            self.flag(Violation::PassNotEnded { frame: self.frame });
        }
        self.open_pass = Some(pass);
        self.pass_line_modes.push(self.wireframe);
    }

    fn check_depth_target(&mut self, id: DepthTargetId) -> bool {
        let live = self.depth_targets.contains_key(&id);
        if !live {
            self.flag(Violation::UnknownResource {
                kind: "depth target",
                id: id.0,
            });
        }
        live
    }
}

impl DrawSink for RecordingBackend {
    fn draw(&mut self, item: &DrawItem) {
        if self.open_pass.is_none() {
            self.flag(Violation::DrawOutsidePass { frame: self.frame });
        }
        if !self.meshes.contains_key(&item.mesh) {
            self.flag(Violation::UnknownResource {
                kind: "mesh",
                id: item.mesh.0,
            });
        }
        if !self.materials.contains(&item.material) {
            self.flag(Violation::UnknownResource {
                kind: "material",
                id: item.material.0,
            });
        }
        self.commands.push(Command::Draw(*item));
    }
}

impl RenderBackend for RecordingBackend {
    fn create_depth_target(&mut self, resolution: u32) -> Result<DepthTargetId, RenderError> {
        let id = DepthTargetId(self.alloc_id());
        self.depth_targets.insert(id, resolution);
        self.resources.push(ResourceEvent::CreatedDepthTarget(id));
        Ok(id)
    }

    fn destroy_depth_target(&mut self, id: DepthTargetId) {
        if self.depth_targets.remove(&id).is_some() {
            self.resources.push(ResourceEvent::DestroyedDepthTarget(id));
        } else {
            self.flag(Violation::UnknownResource {
                kind: "depth target",
                id: id.0,
            });
        }
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, RenderError> {
        let id = MeshId(self.alloc_id());
        self.meshes.insert(id, mesh.index_count());
        self.resources.push(ResourceEvent::UploadedMesh(id));
        Ok(id)
    }

    fn destroy_mesh(&mut self, id: MeshId) {
        if self.meshes.remove(&id).is_some() {
            self.resources.push(ResourceEvent::DestroyedMesh(id));
        } else {
            self.flag(Violation::UnknownResource {
                kind: "mesh",
                id: id.0,
            });
        }
    }

    fn create_material(&mut self, _texture: &TextureImage) -> Result<MaterialId, RenderError> {
        let id = MaterialId(self.alloc_id());
        self.materials.insert(id);
        self.resources.push(ResourceEvent::CreatedMaterial(id));
        Ok(id)
    }

    fn destroy_material(&mut self, id: MaterialId) {
        if self.materials.remove(&id) {
            self.resources.push(ResourceEvent::DestroyedMaterial(id));
        } else {
            self.flag(Violation::UnknownResource {
                kind: "material",
                id: id.0,
            });
        }
    }

    fn set_wireframe(&mut self, enabled: bool) -> bool {
        self.wireframe = enabled && self.line_mode_supported;
        self.wireframe
    }

    fn resize(&mut self, extent: Extent) {
        self.extent = extent.non_zero();
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        if let Some(error) = self.pending_failure.take() {
            self.commands.clear();
            return Err(error);
        }
        if self.in_frame {
            self.flag(Violation::OutsideFrame {
                command: "begin-frame without present".into(),
            });
        }
        self.frame += 1;
        self.in_frame = true;
        self.open_pass = None;
        self.main_done = false;
        self.written.clear();
        self.commands.clear();
        self.pass_line_modes.clear();
        self.commands.push(Command::BeginFrame);
        Ok(())
    }

    fn clear_depth_target(&mut self, id: DepthTargetId) {
        self.require_frame("clear");
        self.check_depth_target(id);
        // A clear discards whatever an earlier pass wrote.
        self.written.remove(&id);
        self.commands.push(Command::ClearDepth(id));
    }

    fn begin_shadow_pass(&mut self, id: DepthTargetId, light_space: Mat4) {
        self.require_frame("shadow pass");
        self.check_depth_target(id);
        if self.main_done || self.open_pass == Some(OpenPass::Main) {
            self.flag(Violation::ShadowPassAfterMain {
                frame: self.frame,
                target: id,
            });
        }
        self.open(OpenPass::Shadow(id));
        self.commands.push(Command::BeginShadowPass {
            target: id,
            light_space,
        });
    }

    fn begin_main_pass(&mut self, params: &MainPassParams) {
        self.require_frame("main pass");
        self.open(OpenPass::Main);
        for binding in &params.shadows {
            if !binding.sampled {
                continue;
            }
            if self.check_depth_target(binding.target) && !self.written.contains(&binding.target)
            {
                self.flag(Violation::StaleShadowRead {
                    frame: self.frame,
                    target: binding.target,
                });
            }
        }
        self.commands
            .push(Command::BeginMainPass(Box::new(params.clone())));
    }

    fn end_pass(&mut self) {
        match self.open_pass.take() {
            Some(OpenPass::Shadow(id)) => {
                self.written.insert(id);
            }
            Some(OpenPass::Main) => self.main_done = true,
            None => self.flag(Violation::PassNotEnded { frame: self.frame }),
        }
        self.commands.push(Command::EndPass);
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if self.open_pass.is_some() {
            self.flag(Violation::PassNotEnded { frame: self.frame });
        }
        if self.require_frame("present") {
            self.presented += 1;
        }
        self.in_frame = false;
        self.commands.push(Command::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShadowBinding;
    use crate::mesh::cube_mesh;
    use crate::shadow::ShadowBias;
    use glam::Vec3;

    fn params(a: DepthTargetId, b: DepthTargetId, sampled: [bool; 2]) -> MainPassParams {
        MainPassParams {
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            clear_color: Vec3::ZERO,
            ambient: 0.1,
            lights: Vec::new(),
            shadows: [
                ShadowBinding {
                    target: a,
                    light_space: Mat4::IDENTITY,
                    sampled: sampled[0],
                },
                ShadowBinding {
                    target: b,
                    light_space: Mat4::IDENTITY,
                    sampled: sampled[1],
                },
            ],
            bias: ShadowBias::default(),
        }
    }

    #[test]
    fn sampling_a_target_written_this_frame_is_fine() {
        let mut gpu = RecordingBackend::new();
        let a = gpu.create_depth_target(64).unwrap();
        let b = gpu.create_depth_target(64).unwrap();
        gpu.begin_frame().unwrap();
        gpu.clear_depth_target(a);
        gpu.clear_depth_target(b);
        gpu.begin_shadow_pass(a, Mat4::IDENTITY);
        gpu.end_pass();
        gpu.begin_main_pass(&params(a, b, [true, false]));
        gpu.end_pass();
        gpu.present().unwrap();
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn last_frames_depth_is_stale_in_the_next_frame() {
        let mut gpu = RecordingBackend::new();
        let a = gpu.create_depth_target(64).unwrap();
        let b = gpu.create_depth_target(64).unwrap();

        gpu.begin_frame().unwrap();
        gpu.begin_shadow_pass(a, Mat4::IDENTITY);
        gpu.end_pass();
        gpu.begin_main_pass(&params(a, b, [true, false]));
        gpu.end_pass();
        gpu.present().unwrap();

        gpu.begin_frame().unwrap();
        gpu.clear_depth_target(a);
        gpu.begin_main_pass(&params(a, b, [true, false]));
        gpu.end_pass();
        gpu.present().unwrap();

        assert_eq!(
            gpu.violations(),
            &[Violation::StaleShadowRead {
                frame: 2,
                target: a
            }]
        );
    }

    #[test]
    fn shadow_pass_after_main_is_flagged() {
        let mut gpu = RecordingBackend::new();
        let a = gpu.create_depth_target(64).unwrap();
        let b = gpu.create_depth_target(64).unwrap();
        gpu.begin_frame().unwrap();
        gpu.begin_main_pass(&params(a, b, [false, false]));
        gpu.end_pass();
        gpu.begin_shadow_pass(a, Mat4::IDENTITY);
        gpu.end_pass();
        assert!(matches!(
            gpu.violations(),
            [Violation::ShadowPassAfterMain { frame: 1, .. }]
        ));
    }

    #[test]
    fn draw_outside_pass_and_unknown_handles_are_flagged() {
        let mut gpu = RecordingBackend::new();
        let mesh = gpu.upload_mesh(&cube_mesh()).unwrap();
        gpu.begin_frame().unwrap();
        gpu.draw(&DrawItem {
            mesh,
            material: MaterialId(99),
            model: Mat4::IDENTITY,
            albedo: Vec3::ONE,
            emissive: false,
        });
        assert_eq!(gpu.violations().len(), 2);
        assert!(matches!(
            gpu.violations()[1],
            Violation::UnknownResource {
                kind: "material",
                id: 99
            }
        ));
    }

    #[test]
    fn resource_log_keeps_call_order() {
        let mut gpu = RecordingBackend::new();
        let d = gpu.create_depth_target(32).unwrap();
        let m = gpu.upload_mesh(&cube_mesh()).unwrap();
        gpu.destroy_mesh(m);
        gpu.destroy_depth_target(d);
        assert_eq!(
            gpu.resource_log(),
            &[
                ResourceEvent::CreatedDepthTarget(d),
                ResourceEvent::UploadedMesh(m),
                ResourceEvent::DestroyedMesh(m),
                ResourceEvent::DestroyedDepthTarget(d),
            ]
        );
        assert_eq!(gpu.live_resources(), (0, 0, 0));
    }

    #[test]
    fn double_destroy_is_flagged() {
        let mut gpu = RecordingBackend::new();
        let d = gpu.create_depth_target(32).unwrap();
        gpu.destroy_depth_target(d);
        gpu.destroy_depth_target(d);
        assert_eq!(gpu.violations().len(), 1);
    }

    #[test]
    fn wireframe_falls_back_without_line_mode() {
        let mut gpu = RecordingBackend::new();
        assert!(gpu.set_wireframe(true));
        let mut gpu = RecordingBackend::new().without_line_mode();
        assert!(!gpu.set_wireframe(true));
        assert!(!gpu.wireframe());
    }

    #[test]
    fn line_mode_reaches_shadow_and_main_passes() {
        let mut gpu = RecordingBackend::new();
        let a = gpu.create_depth_target(64).unwrap();
        let b = gpu.create_depth_target(64).unwrap();
        gpu.set_wireframe(true);
        gpu.begin_frame().unwrap();
        gpu.begin_shadow_pass(a, Mat4::IDENTITY);
        gpu.end_pass();
        gpu.set_wireframe(false);
        gpu.begin_shadow_pass(b, Mat4::IDENTITY);
        gpu.end_pass();
        gpu.begin_main_pass(&params(a, b, [true, true]));
        gpu.end_pass();
        gpu.present().unwrap();
        assert_eq!(gpu.pass_line_modes(), &[true, false, false]);
    }

    #[test]
    fn describe_groups_draws_under_passes() {
        let mut gpu = RecordingBackend::new();
        let a = gpu.create_depth_target(64).unwrap();
        let b = gpu.create_depth_target(64).unwrap();
        let mesh = gpu.upload_mesh(&cube_mesh()).unwrap();
        let material = gpu
            .create_material(&TextureImage::solid([1, 2, 3, 255]))
            .unwrap();
        let item = DrawItem {
            mesh,
            material,
            model: Mat4::IDENTITY,
            albedo: Vec3::ONE,
            emissive: false,
        };
        gpu.begin_frame().unwrap();
        gpu.begin_shadow_pass(a, Mat4::IDENTITY);
        gpu.draw(&item);
        gpu.draw(&item);
        gpu.end_pass();
        gpu.begin_main_pass(&params(a, b, [true, false]));
        gpu.draw(&item);
        gpu.end_pass();
        let text = gpu.describe_last_frame();
        assert!(text.starts_with("frame 1"));
        assert!(text.contains(&format!("shadow {a:?} (2 draws)")));
        assert!(text.contains("main (1 draws)"));
        assert_eq!(gpu.shadow_draws(a), 2);
        assert_eq!(gpu.shadow_draws(b), 0);
    }

    #[test]
    fn injected_failure_is_returned_once() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_next_frame(RenderError::Timeout);
        assert!(matches!(gpu.begin_frame(), Err(RenderError::Timeout)));
        assert!(gpu.begin_frame().is_ok());
        assert_eq!(gpu.frames_begun(), 1);
    }
}
