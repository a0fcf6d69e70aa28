//! Texture sources consumed at scene-construction time.
//!
//! The renderer consumes textures by name through a [`TextureProvider`], never
//! by raw file paths. Decoding happens once per name; the [`TextureCache`]
//! keeps the decoded images for the lifetime of scene construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shadowbox_common::{ImageError, TextureImage, splitmix64};

mod procedural;

pub use procedural::ProceduralTextures;

/// Errors from texture loading.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("texture not found: {0}")]
    NotFound(String),
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Resolves a texture name to decoded RGBA8 pixels.
pub trait TextureProvider {
    fn load(&self, name: &str) -> Result<TextureImage, AssetError>;
}

/// Loads `<root>/<name>.png`, falling back to procedural patterns for names
/// that have no file on disk.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    root: PathBuf,
    fallback: ProceduralTextures,
}

impl ImageDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback: ProceduralTextures::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn decode(path: &Path) -> Result<TextureImage, AssetError> {
        let decoded = image::open(path).map_err(|e| AssetError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(TextureImage::new(width, height, rgba.into_raw())?)
    }
}

impl TextureProvider for ImageDirectory {
    fn load(&self, name: &str) -> Result<TextureImage, AssetError> {
        let path = self.root.join(format!("{name}.png"));
        if path.is_file() {
            tracing::debug!("decoding texture {}", path.display());
            Self::decode(&path)
        } else {
            tracing::debug!("no file for texture '{name}', using procedural pattern");
            self.fallback.load(name)
        }
    }
}

/// Memoizing front for a provider: each name is decoded at most once.
pub struct TextureCache<P> {
    provider: P,
    images: BTreeMap<String, TextureImage>,
}

impl<P: TextureProvider> TextureCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            images: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, name: &str) -> Result<&TextureImage, AssetError> {
        if !self.images.contains_key(name) {
            let image = self.provider.load(name)?;
            self.images.insert(name.to_string(), image);
        }
        self.images
            .get(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    /// Number of decoded textures.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Stable 64-bit seed for a texture name.
pub(crate) fn name_seed(name: &str) -> u64 {
    name.bytes()
        .fold(0xcbf2_9ce4_8422_2325, |h, b| splitmix64(h ^ b as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
    }

    impl TextureProvider for Counting {
        fn load(&self, _name: &str) -> Result<TextureImage, AssetError> {
            self.calls.set(self.calls.get() + 1);
            Ok(TextureImage::solid([1, 2, 3, 255]))
        }
    }

    #[test]
    fn cache_decodes_each_name_once() {
        let mut cache = TextureCache::new(Counting {
            calls: Cell::new(0),
        });
        cache.get("crate_0").unwrap();
        cache.get("crate_0").unwrap();
        cache.get("metal_0").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.provider.calls.get(), 2);
    }

    #[test]
    fn directory_falls_back_to_procedural() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ImageDirectory::new(dir.path());
        let img = provider.load("ground").unwrap();
        assert_eq!(img, ProceduralTextures::default().load("ground").unwrap());
    }

    #[test]
    fn directory_decodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crate_0.png");
        let mut buf = image::RgbaImage::new(2, 3);
        buf.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        buf.save(&path).unwrap();

        let img = ImageDirectory::new(dir.path()).load("crate_0").unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 3);
        assert_eq!(img.texel(1, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn corrupt_png_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metal_1.png"), b"not a png").unwrap();
        let err = ImageDirectory::new(dir.path()).load("metal_1").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn name_seed_differs_per_name() {
        assert_ne!(name_seed("crate_0"), name_seed("crate_1"));
        assert_eq!(name_seed("ground"), name_seed("ground"));
    }
}
