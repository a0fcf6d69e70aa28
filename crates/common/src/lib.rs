//! Shared value types used by every shadowbox crate.

mod types;

pub use types::{Extent, ImageError, TextureImage, Transform, splitmix64};
