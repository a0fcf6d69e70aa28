//! Engine configuration, loadable from YAML.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shadowbox_common::Extent;
use shadowbox_render::{ShadowBias, ShadowProjection};
use shadowbox_scene::{CameraConfig, LightingConfig, SceneConfig};

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Upper bound on `scene.floor.tiles_per_side`.
pub const MAX_FLOOR_TILES_PER_SIDE: u32 = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub windowed: Extent,
    pub fullscreen: Extent,
    pub start_fullscreen: bool,
    /// Frame pacing target; 0 disables pacing.
    pub target_fps: u32,
    pub vsync: bool,
    /// Hide and confine the cursor while focused.
    pub grab_cursor: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "shadowbox".to_string(),
            windowed: Extent::new(1600, 900),
            fullscreen: Extent::new(1920, 1080),
            start_fullscreen: false,
            target_fps: 144,
            vsync: false,
            grab_cursor: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Edge length in texels of each square depth target.
    pub resolution: u32,
    pub bias: ShadowBias,
    pub global: ShadowProjection,
    pub flashlight: ShadowProjection,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 2048,
            bias: ShadowBias::default(),
            global: ShadowProjection::Orthographic {
                center: Vec3::ZERO,
                half_extent: 24.0,
                distance: 30.0,
                near: 0.1,
                far: 80.0,
            },
            flashlight: ShadowProjection::Perspective {
                fov_y: 40.0_f32.to_radians(),
                near: 0.1,
                far: 60.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub lighting: LightingConfig,
    pub shadows: ShadowConfig,
    pub scene: SceneConfig,
    pub clear_color: Vec3,
    /// Directory of `<name>.png` textures. Procedural textures when unset.
    pub texture_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            lighting: LightingConfig::default(),
            shadows: ShadowConfig::default(),
            scene: SceneConfig::default(),
            clear_color: Vec3::new(0.08, 0.16, 0.18),
            texture_dir: None,
        }
    }
}

impl EngineConfig {
    /// Read and validate a YAML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.window.windowed.width == 0 || self.window.windowed.height == 0 {
            return invalid("window.windowed must be non-zero");
        }
        if self.window.fullscreen.width == 0 || self.window.fullscreen.height == 0 {
            return invalid("window.fullscreen must be non-zero");
        }
        if self.shadows.resolution == 0 || self.shadows.resolution > 8192 {
            return invalid("shadows.resolution must be within 1..=8192");
        }
        if self.shadows.bias.slope < 0.0 || self.shadows.bias.min < 0.0 {
            return invalid("shadows.bias must be non-negative");
        }
        let l = &self.lighting;
        if l.ambient_limit < 0.0 || l.ambient_step < 0.0 {
            return invalid("lighting.ambient_limit and ambient_step must be non-negative");
        }
        if l.global_value < 0.0 || l.flashlight_value < 0.0 || l.local_value < 0.0 {
            return invalid("light on-values must be non-negative");
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return invalid("camera requires 0 < near < far");
        }
        check_projection("shadows.global", &self.shadows.global)?;
        check_projection("shadows.flashlight", &self.shadows.flashlight)?;

        let scene = &self.scene;
        let floor = &scene.floor;
        if floor.tiles_per_side > MAX_FLOOR_TILES_PER_SIDE {
            return Err(ConfigError::Invalid(format!(
                "scene.floor.tiles_per_side must be at most {MAX_FLOOR_TILES_PER_SIDE}"
            )));
        }
        if !positive(floor.half_size) || !positive(floor.spacing) {
            return invalid("scene.floor half_size and spacing must be positive");
        }
        if !floor.height.is_finite() || !positive(floor.half_thickness) {
            return invalid("scene.floor height must be finite and half_thickness positive");
        }
        if !positive(scene.marker_half_size) {
            return invalid("scene.marker_half_size must be positive");
        }
        for (i, cube) in scene.cubes.iter().enumerate() {
            if !positive(cube.half_size) || !cube.position.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "scene.cubes[{i}] needs a finite position and positive half_size"
                )));
            }
        }
        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn check_projection(name: &str, projection: &ShadowProjection) -> Result<(), ConfigError> {
    let problem = match *projection {
        ShadowProjection::Orthographic {
            center,
            half_extent,
            distance,
            near,
            far,
        } => {
            if !center.is_finite() {
                Some("center must be finite")
            } else if !positive(half_extent) {
                Some("half_extent must be positive")
            } else if !positive(distance) {
                Some("distance must be positive")
            } else if !near.is_finite() || !far.is_finite() || far <= near {
                Some("requires near < far")
            } else {
                None
            }
        }
        ShadowProjection::Perspective { fov_y, near, far } => {
            if !positive(fov_y) || fov_y >= std::f32::consts::PI {
                Some("fov_y must be within (0, pi)")
            } else if !positive(near) || !far.is_finite() || far <= near {
                Some("requires 0 < near < far")
            } else {
                None
            }
        }
    };
    match problem {
        Some(problem) => Err(ConfigError::Invalid(format!("{name}: {problem}"))),
        None => Ok(()),
    }
}
