//! Frame recording: pass calls are collected during the frame and encoded in
//! one go at present time.

use std::collections::BTreeSet;
use std::ops::Range;

use glam::Mat4;
use shadowbox_render::{DepthTargetId, DrawItem, MainPassParams, MaterialId, MeshId};

use crate::uniforms::InstanceData;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PassKind {
    Shadow {
        target: DepthTargetId,
        light_space: Mat4,
    },
    Main(Box<MainPassParams>),
}

/// Consecutive draws sharing a mesh and material, as a range of instances.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Batch {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub instances: Range<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedPass {
    pub kind: PassKind,
    /// The target was cleared earlier this frame; load with a clear instead.
    pub clear_first: bool,
    pub batches: Vec<Batch>,
}

#[derive(Debug, Default)]
pub(crate) struct FramePlan {
    passes: Vec<PlannedPass>,
    instances: Vec<InstanceData>,
    pending_clears: BTreeSet<DepthTargetId>,
    open: bool,
}

impl FramePlan {
    pub fn clear(&mut self, target: DepthTargetId) {
        self.pending_clears.insert(target);
    }

    pub fn begin(&mut self, kind: PassKind) {
        if self.open {
            tracing::warn!("pass begun while another was open; closing it");
        }
        let clear_first = match &kind {
            PassKind::Shadow { target, .. } => self.pending_clears.remove(target),
            PassKind::Main(_) => false,
        };
        self.passes.push(PlannedPass {
            kind,
            clear_first,
            batches: Vec::new(),
        });
        self.open = true;
    }

    /// Returns false when no pass is open and the draw was dropped.
    pub fn draw(&mut self, item: &DrawItem) -> bool {
        if !self.open {
            return false;
        }
        let Some(pass) = self.passes.last_mut() else {
            return false;
        };
        let index = self.instances.len() as u32;
        self.instances.push(InstanceData::from_item(item));
        match pass.batches.last_mut() {
            Some(batch)
                if batch.mesh == item.mesh
                    && batch.material == item.material
                    && batch.instances.end == index =>
            {
                batch.instances.end += 1;
            }
            _ => pass.batches.push(Batch {
                mesh: item.mesh,
                material: item.material,
                instances: index..index + 1,
            }),
        }
        true
    }

    pub fn end(&mut self) {
        self.open = false;
    }

    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    /// Targets cleared this frame with no pass to fold the clear into.
    pub fn standalone_clears(&self) -> impl Iterator<Item = DepthTargetId> + '_ {
        self.pending_clears.iter().copied()
    }
}
