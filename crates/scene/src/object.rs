use glam::{Mat4, Quat, Vec3};
use shadowbox_common::Transform;
use shadowbox_render::{DrawItem, DrawSink, MaterialId, MeshId, Renderable, ShadowSlot};

/// Mesh and material a scene object draws with. The [`crate::Scene`] owns
/// the underlying GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub mesh: MeshId,
    pub material: MaterialId,
}

/// A textured box, optionally spinning about +Y.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    transform: Transform,
    binding: Binding,
    /// Radians per second.
    spin: f32,
    model: Mat4,
}

impl Cube {
    pub fn new(position: Vec3, half_size: f32, binding: Binding) -> Self {
        let transform = Transform::from_position_scale(position, Vec3::splat(half_size));
        Self {
            model: transform.matrix(),
            transform,
            binding,
            spin: 0.0,
        }
    }

    pub fn with_spin(mut self, radians_per_second: f32) -> Self {
        self.spin = radians_per_second;
        self
    }
}

/// One flattened slab of the ground grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorTile {
    transform: Transform,
    binding: Binding,
    model: Mat4,
}

impl FloorTile {
    pub fn new(position: Vec3, half_size: f32, half_thickness: f32, binding: Binding) -> Self {
        let transform = Transform::from_position_scale(
            position,
            Vec3::new(half_size, half_thickness, half_size),
        );
        Self {
            model: transform.matrix(),
            transform,
            binding,
        }
    }
}

/// Everything the scene can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Cube(Cube),
    FloorTile(FloorTile),
}

impl SceneObject {
    pub fn transform(&self) -> &Transform {
        match self {
            Self::Cube(c) => &c.transform,
            Self::FloorTile(t) => &t.transform,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform().position
    }

    pub fn binding(&self) -> Binding {
        match self {
            Self::Cube(c) => c.binding,
            Self::FloorTile(t) => t.binding,
        }
    }

    pub fn is_floor(&self) -> bool {
        matches!(self, Self::FloorTile(_))
    }

    fn model(&self) -> Mat4 {
        match self {
            Self::Cube(c) => c.model,
            Self::FloorTile(t) => t.model,
        }
    }

    /// The one draw used by every pass, so shadow depth matches shaded geometry.
    pub fn draw_item(&self) -> DrawItem {
        let binding = self.binding();
        DrawItem {
            mesh: binding.mesh,
            material: binding.material,
            model: self.model(),
            albedo: Vec3::ONE,
            emissive: false,
        }
    }
}

impl Renderable for SceneObject {
    fn update(&mut self, dt: f32) {
        if let Self::Cube(cube) = self {
            if cube.spin != 0.0 && dt > 0.0 {
                cube.transform.rotation =
                    (Quat::from_rotation_y(cube.spin * dt) * cube.transform.rotation).normalize();
                cube.model = cube.transform.matrix();
            }
        }
    }

    fn render_main<S: DrawSink + ?Sized>(&self, sink: &mut S) {
        sink.draw(&self.draw_item());
    }

    fn render_shadow<S: DrawSink + ?Sized>(&self, _slot: ShadowSlot, sink: &mut S) {
        sink.draw(&self.draw_item());
    }
}
