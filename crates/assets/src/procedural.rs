use shadowbox_common::{TextureImage, splitmix64};

use crate::{AssetError, TextureProvider, name_seed};

/// Generates deterministic stand-in textures from the texture name.
///
/// `ground*` is a mottled checker, `crate*` wooden planks with a frame,
/// `metal*` brushed plate with corner rivets. Anything else gets the
/// magenta "missing texture" checker.
#[derive(Debug, Clone)]
pub struct ProceduralTextures {
    size: u32,
}

impl Default for ProceduralTextures {
    fn default() -> Self {
        Self { size: 64 }
    }
}

impl ProceduralTextures {
    pub fn with_size(size: u32) -> Self {
        Self { size: size.max(4) }
    }

    fn generate(&self, name: &str, shade: impl Fn(u32, u32, u64) -> [f32; 3]) -> TextureImage {
        let seed = name_seed(name);
        let n = self.size;
        let mut rgba = Vec::with_capacity((n * n * 4) as usize);
        for y in 0..n {
            for x in 0..n {
                let noise = splitmix64(seed ^ ((y as u64) << 32 | x as u64));
                let [r, g, b] = shade(x, y, noise);
                rgba.extend_from_slice(&[to_u8(r), to_u8(g), to_u8(b), 255]);
            }
        }
        // Length is n*n*4 by construction.
        TextureImage::new(n, n, rgba).unwrap_or_else(|_| TextureImage::solid([255, 0, 255, 255]))
    }

    fn ground(&self, name: &str) -> TextureImage {
        let cell = (self.size / 8).max(1);
        self.generate(name, |x, y, noise| {
            let dark = ((x / cell) + (y / cell)) % 2 == 0;
            let base = if dark {
                [0.30, 0.26, 0.20]
            } else {
                [0.38, 0.34, 0.26]
            };
            let jitter = unit(noise) * 0.08 - 0.04;
            base.map(|c| c + jitter)
        })
    }

    fn planks(&self, name: &str) -> TextureImage {
        let n = self.size;
        let border = (n / 10).max(1);
        let plank = (n / 4).max(1);
        let tint = variant_tint(name);
        self.generate(name, move |x, y, noise| {
            let on_border = x < border || y < border || x >= n - border || y >= n - border;
            let seam = y % plank == 0;
            let grain = ((x as f32 * 0.35 + (y / plank) as f32 * 1.7).sin() * 0.5 + 0.5) * 0.08;
            let base = if on_border {
                [0.36, 0.22, 0.10]
            } else if seam {
                [0.25, 0.15, 0.07]
            } else {
                [0.62 + grain, 0.44 + grain, 0.22]
            };
            let jitter = unit(noise) * 0.05;
            [
                base[0] * tint + jitter,
                base[1] * tint + jitter,
                base[2] * tint + jitter,
            ]
        })
    }

    fn metal(&self, name: &str) -> TextureImage {
        let n = self.size;
        let rivet_inset = (n / 8).max(2) as i64;
        let rivet_r2 = ((n / 20).max(1) as i64).pow(2);
        let tint = variant_tint(name);
        self.generate(name, move |x, y, noise| {
            let brushed = unit(noise.rotate_left(x % 7)) * 0.06 + ((y as f32) * 0.9).sin() * 0.02;
            let corners = [
                (rivet_inset, rivet_inset),
                (n as i64 - rivet_inset, rivet_inset),
                (rivet_inset, n as i64 - rivet_inset),
                (n as i64 - rivet_inset, n as i64 - rivet_inset),
            ];
            let rivet = corners.iter().any(|&(cx, cy)| {
                let dx = x as i64 - cx;
                let dy = y as i64 - cy;
                dx * dx + dy * dy <= rivet_r2
            });
            let v = if rivet { 0.85 } else { 0.55 + brushed };
            [v * tint, v * tint, (v + 0.03) * tint]
        })
    }

    fn missing(&self, name: &str) -> TextureImage {
        let cell = (self.size / 4).max(1);
        self.generate(name, |x, y, _| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                [1.0, 0.0, 1.0]
            } else {
                [0.0, 0.0, 0.0]
            }
        })
    }
}

impl TextureProvider for ProceduralTextures {
    fn load(&self, name: &str) -> Result<TextureImage, AssetError> {
        let image = if name.starts_with("ground") {
            self.ground(name)
        } else if name.starts_with("crate") {
            self.planks(name)
        } else if name.starts_with("metal") {
            self.metal(name)
        } else {
            tracing::warn!("unknown texture '{name}', using placeholder");
            self.missing(name)
        };
        Ok(image)
    }
}

/// Brightness variation for numbered variants (`crate_0`, `crate_1`, ...).
fn variant_tint(name: &str) -> f32 {
    let digit = name
        .rsplit('_')
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    1.0 - (digit % 4) as f32 * 0.12
}

fn unit(noise: u64) -> f32 {
    (noise >> 40) as f32 / (1u64 << 24) as f32
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_deterministic() {
        let p = ProceduralTextures::default();
        assert_eq!(p.load("crate_1").unwrap(), p.load("crate_1").unwrap());
    }

    #[test]
    fn variants_differ() {
        let p = ProceduralTextures::default();
        assert_ne!(p.load("crate_0").unwrap(), p.load("crate_1").unwrap());
        assert_ne!(p.load("metal_0").unwrap(), p.load("crate_0").unwrap());
    }

    #[test]
    fn size_is_respected() {
        let p = ProceduralTextures::with_size(16);
        let img = p.load("ground").unwrap();
        assert_eq!(img.width(), 16);
        assert_eq!(img.height(), 16);
        assert_eq!(img.rgba().len(), 16 * 16 * 4);
    }

    #[test]
    fn unknown_name_is_magenta_checker() {
        let img = ProceduralTextures::default().load("nope").unwrap();
        assert_eq!(img.texel(0, 0), [255, 0, 255, 255]);
    }

    #[test]
    fn textures_are_opaque() {
        let img = ProceduralTextures::default().load("metal_0").unwrap();
        assert!(img.rgba().chunks(4).all(|px| px[3] == 255));
    }
}
