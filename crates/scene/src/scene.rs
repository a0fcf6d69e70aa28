use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use shadowbox_assets::{AssetError, TextureCache, TextureProvider};
use shadowbox_common::TextureImage;
use shadowbox_render::{
    DrawItem, MaterialId, MeshId, RenderBackend, RenderError, Renderable, cube_mesh,
};

use crate::grid::FloorGrid;
use crate::light::LightRig;
use crate::object::{Binding, Cube, SceneObject};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("render backend: {0}")]
    Render(#[from] RenderError),
    #[error("texture: {0}")]
    Asset(#[from] AssetError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeConfig {
    pub position: Vec3,
    pub half_size: f32,
    pub texture: String,
    /// Radians per second about +Y.
    #[serde(default)]
    pub spin: f32,
}

/// Objects placed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub floor: FloorGrid,
    pub floor_texture: String,
    pub cubes: Vec<CubeConfig>,
    /// Half-size of the debug cubes drawn at each light.
    pub marker_half_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let cube = |x: f32, texture: &str| CubeConfig {
            position: Vec3::new(x, 0.0, 0.0),
            half_size: 0.5,
            texture: texture.to_string(),
            spin: 0.0,
        };
        Self {
            floor: FloorGrid::default(),
            floor_texture: "ground".to_string(),
            cubes: vec![
                cube(-3.0, "crate_0"),
                cube(-1.5, "crate_1"),
                cube(0.0, "crate_2"),
                cube(1.5, "metal_0"),
                cube(3.0, "metal_1"),
            ],
            marker_half_size: 0.15,
        }
    }
}

/// Ordered renderable objects plus the light set.
///
/// The scene holds the GPU handles its objects draw with (one shared cube
/// mesh, one material per texture name) and releases them in reverse
/// acquisition order.
#[derive(Debug)]
pub struct Scene {
    objects: Vec<SceneObject>,
    lights: LightRig,
    meshes: Vec<MeshId>,
    materials: Vec<(String, MaterialId)>,
    marker: Option<Binding>,
    marker_half_size: f32,
}

impl Scene {
    /// Upload geometry and textures, then lay out the floor grid and cubes.
    /// On failure, anything already created is destroyed before returning.
    pub fn build<B, P>(
        backend: &mut B,
        textures: &mut TextureCache<P>,
        config: &SceneConfig,
        lights: LightRig,
    ) -> Result<Self, SceneError>
    where
        B: RenderBackend + ?Sized,
        P: TextureProvider,
    {
        let mut scene = Self {
            objects: Vec::new(),
            lights,
            meshes: Vec::new(),
            materials: Vec::new(),
            marker: None,
            marker_half_size: config.marker_half_size,
        };
        if let Err(e) = scene.populate(backend, textures, config) {
            scene.release(backend);
            return Err(e);
        }
        tracing::info!(
            objects = scene.objects.len(),
            materials = scene.materials.len(),
            "scene built"
        );
        Ok(scene)
    }

    fn populate<B, P>(
        &mut self,
        backend: &mut B,
        textures: &mut TextureCache<P>,
        config: &SceneConfig,
    ) -> Result<(), SceneError>
    where
        B: RenderBackend + ?Sized,
        P: TextureProvider,
    {
        let mesh = backend.upload_mesh(&cube_mesh())?;
        self.meshes.push(mesh);

        let floor = Binding {
            mesh,
            material: self.material(backend, textures, &config.floor_texture)?,
        };
        self.objects.extend(config.floor.build(floor));

        for cube in &config.cubes {
            let binding = Binding {
                mesh,
                material: self.material(backend, textures, &cube.texture)?,
            };
            self.objects.push(SceneObject::Cube(
                Cube::new(cube.position, cube.half_size, binding).with_spin(cube.spin),
            ));
        }

        let marker = backend.create_material(&TextureImage::solid([255, 255, 255, 255]))?;
        self.materials.push(("<marker>".to_string(), marker));
        self.marker = Some(Binding {
            mesh,
            material: marker,
        });
        Ok(())
    }

    fn material<B, P>(
        &mut self,
        backend: &mut B,
        textures: &mut TextureCache<P>,
        name: &str,
    ) -> Result<MaterialId, SceneError>
    where
        B: RenderBackend + ?Sized,
        P: TextureProvider,
    {
        if let Some((_, id)) = self.materials.iter().find(|(n, _)| n == name) {
            return Ok(*id);
        }
        let image = textures.get(name)?;
        let id = backend.create_material(image)?;
        tracing::debug!(texture = name, ?id, "material created");
        self.materials.push((name.to_string(), id));
        Ok(id)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightRig {
        &mut self.lights
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Advance every object, in order.
    pub fn update_objects(&mut self, dt: f32) {
        for object in &mut self.objects {
            object.update(dt);
        }
    }

    /// Unlit cubes at the global and local lights that are currently lit.
    /// The flashlight sits in the camera and gets none.
    pub fn light_markers(&self) -> Vec<DrawItem> {
        let Some(binding) = self.marker else {
            return Vec::new();
        };
        let scale = Vec3::splat(self.marker_half_size);
        std::iter::once(&self.lights.global)
            .chain(self.lights.locals.iter())
            .filter(|light| light.is_lit())
            .map(|light| DrawItem {
                mesh: binding.mesh,
                material: binding.material,
                model: Mat4::from_scale_rotation_translation(
                    scale,
                    glam::Quat::IDENTITY,
                    light.position,
                ),
                albedo: light.color,
                emissive: true,
            })
            .collect()
    }

    /// Destroy materials then meshes, each newest first.
    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        tracing::debug!(
            materials = self.materials.len(),
            meshes = self.meshes.len(),
            "releasing scene resources"
        );
        for (_, id) in self.materials.into_iter().rev() {
            backend.destroy_material(id);
        }
        for id in self.meshes.into_iter().rev() {
            backend.destroy_mesh(id);
        }
    }
}
