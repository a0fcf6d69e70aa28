//! Scene: camera, lights and the renderable objects they illuminate.
//!
//! # Invariants
//! - Object order is render order; it carries no other meaning.
//! - The flashlight stores no pose of its own. [`CameraLight::view`] derives
//!   it from the camera on every query.
//! - The scene owns no rendering logic; it hands [`SceneObject`]s to the
//!   frame pipeline and frees its GPU handles on [`Scene::release`].

mod camera;
mod grid;
mod light;
mod object;
mod scene;

pub use camera::{CameraConfig, FlyCamera};
pub use grid::FloorGrid;
pub use light::{CameraLight, Light, LightRig, LightingConfig, LocalLightConfig};
pub use object::{Binding, Cube, FloorTile, SceneObject};
pub use scene::{CubeConfig, Scene, SceneConfig, SceneError};
