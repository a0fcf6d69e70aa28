use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::object::{Binding, FloorTile, SceneObject};

/// Square grid of floor tiles centred on the origin in XZ.
///
/// Tile `i` along an axis sits at `(i - n/2) * spacing`, so with the default
/// 20 tiles and spacing 2 the grid spans -20..18.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorGrid {
    pub tiles_per_side: u32,
    pub half_size: f32,
    pub spacing: f32,
    pub height: f32,
    pub half_thickness: f32,
}

impl Default for FloorGrid {
    fn default() -> Self {
        Self {
            tiles_per_side: 20,
            half_size: 1.0,
            spacing: 2.0,
            height: -1.0,
            half_thickness: 0.1,
        }
    }
}

impl FloorGrid {
    pub fn tile_count(&self) -> usize {
        let n = self.tiles_per_side as usize;
        n * n
    }

    /// Tile centres in row-major order (X outer, Z inner).
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        let n = self.tiles_per_side as i64;
        let offset = n / 2;
        (0..n).flat_map(move |i| {
            (0..n).map(move |j| {
                Vec3::new(
                    (i - offset) as f32 * self.spacing,
                    self.height,
                    (j - offset) as f32 * self.spacing,
                )
            })
        })
    }

    pub fn build(&self, binding: Binding) -> Vec<SceneObject> {
        self.positions()
            .map(|p| {
                SceneObject::FloorTile(FloorTile::new(
                    p,
                    self.half_size,
                    self.half_thickness,
                    binding,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowbox_render::{MaterialId, MeshId};
    use std::collections::HashSet;

    fn binding() -> Binding {
        Binding {
            mesh: MeshId(1),
            material: MaterialId(1),
        }
    }

    fn key(p: Vec3) -> (i64, i64, i64) {
        (
            (p.x * 1000.0).round() as i64,
            (p.y * 1000.0).round() as i64,
            (p.z * 1000.0).round() as i64,
        )
    }

    #[test]
    fn n_by_n_grid_has_n_squared_distinct_tiles() {
        for n in [0, 1, 2, 5, 20] {
            let grid = FloorGrid {
                tiles_per_side: n,
                ..FloorGrid::default()
            };
            let tiles = grid.build(binding());
            assert_eq!(tiles.len(), (n * n) as usize);
            assert_eq!(grid.tile_count(), tiles.len());
            let distinct: HashSet<_> = tiles.iter().map(|t| key(t.position())).collect();
            assert_eq!(distinct.len(), tiles.len());
            assert!(tiles.iter().all(SceneObject::is_floor));
        }
    }

    #[test]
    fn default_grid_matches_startup_layout() {
        let grid = FloorGrid::default();
        let positions: Vec<_> = grid.positions().collect();
        assert_eq!(positions.len(), 400);
        assert_eq!(positions[0], Vec3::new(-20.0, -1.0, -20.0));
        assert_eq!(positions[399], Vec3::new(18.0, -1.0, 18.0));
        assert!(positions.iter().all(|p| p.y == -1.0));
    }

    #[test]
    fn neighbours_are_one_spacing_apart() {
        let grid = FloorGrid {
            tiles_per_side: 3,
            spacing: 2.5,
            ..FloorGrid::default()
        };
        let positions: Vec<_> = grid.positions().collect();
        assert_eq!(positions[0], Vec3::new(-2.5, -1.0, -2.5));
        assert_eq!(positions[1], Vec3::new(-2.5, -1.0, 0.0));
        assert_eq!(positions[3], Vec3::new(0.0, -1.0, -2.5));
        assert_eq!(positions[8], Vec3::new(2.5, -1.0, 2.5));
    }
}
