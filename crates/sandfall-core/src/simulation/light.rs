//! Additive light accumulation from emissive cells
//!
//! The light map is render-layer state: it reads the grid and never writes
//! back to it.

use rayon::prelude::*;

use crate::simulation::Materials;
use crate::world::{TileGrid, Zone};

/// A light source found in the grid
#[derive(Clone, Copy, Debug, PartialEq)]
struct Emitter {
    x: f32,
    y: f32,
    radius: f32,
    rgb: [f32; 3],
}

/// RGB light over a zone of the grid, row-major
#[derive(Clone, Debug, Default)]
pub struct LightMap {
    zone: Zone,
    rgb: Vec<[u8; 3]>,
}

impl LightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn rgb(&self) -> &[[u8; 3]] {
        &self.rgb
    }

    /// Light at grid cell `(x, y)`; black outside the zone
    pub fn get(&self, x: i32, y: i32) -> [u8; 3] {
        if !self.zone.contains(x, y) {
            return [0; 3];
        }
        let i = (x - self.zone.x) as usize + (y - self.zone.y) as usize * self.zone.w as usize;
        self.rgb[i]
    }

    /// Recompute light for `zone`, sampling emitters every `stride` cells.
    ///
    /// Emitters just outside the zone still light cells inside it.
    pub fn accumulate(&mut self, grid: &TileGrid, materials: &Materials, zone: &Zone, stride: usize) -> usize {
        let bounds = Zone::new(0, 0, grid.width() as i32, grid.height() as i32);
        let zone = zone.intersect(&bounds);
        self.zone = zone;
        self.rgb.clear();
        self.rgb.resize(zone.area(), [0; 3]);
        if zone.is_empty() {
            return 0;
        }

        let reach = materials
            .iter()
            .map(|def| def.emit_radius as i32)
            .max()
            .unwrap_or(0);
        let search = Zone::new(
            zone.x - reach,
            zone.y - reach,
            zone.w + reach * 2,
            zone.h + reach * 2,
        )
        .intersect(&bounds);

        let stride = stride.max(1);
        let emitters: Vec<Emitter> = search
            .cells()
            .step_by(stride)
            .filter_map(|(x, y)| {
                let def = materials.get(grid.material_at(x, y)?);
                def.is_emissive().then(|| Emitter {
                    x: x as f32 + 0.5,
                    y: y as f32 + 0.5,
                    radius: def.emit_radius as f32,
                    rgb: [
                        ((def.emit_color >> 16) & 0xff) as f32,
                        ((def.emit_color >> 8) & 0xff) as f32,
                        (def.emit_color & 0xff) as f32,
                    ],
                })
            })
            .collect();

        if emitters.is_empty() {
            return 0;
        }

        let width = zone.w as usize;
        self.rgb
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, out)| {
                let cy = (zone.y + row as i32) as f32 + 0.5;
                for e in emitters.iter().filter(|e| (e.y - cy).abs() < e.radius) {
                    for (col, px) in out.iter_mut().enumerate() {
                        let cx = (zone.x + col as i32) as f32 + 0.5;
                        let d = ((cx - e.x).powi(2) + (cy - e.y).powi(2)).sqrt();
                        if d >= e.radius {
                            continue;
                        }
                        let falloff = 1.0 - d / e.radius;
                        for c in 0..3 {
                            let add = (e.rgb[c] * falloff) as u8;
                            px[c] = px[c].saturating_add(add);
                        }
                    }
                }
            });

        emitters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{MaterialId, MaterialInstance};

    #[test]
    fn test_dark_without_emitters() {
        let materials = Materials::new();
        let grid = TileGrid::new(8, 8).expect("grid");
        let mut light = LightMap::new();
        let count = light.accumulate(&grid, &materials, &Zone::new(0, 0, 8, 8), 1);
        assert_eq!(count, 0);
        assert!(light.rgb().iter().all(|c| *c == [0, 0, 0]));
    }

    #[test]
    fn test_lava_lights_surroundings_with_falloff() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(32, 32).expect("grid");
        grid.set_tile(16, 16, MaterialInstance::from_def(materials.get(MaterialId::LAVA)));
        let snapshot = grid.tiles().to_vec();

        let mut light = LightMap::new();
        light.accumulate(&grid, &materials, &Zone::new(0, 0, 32, 32), 1);

        let centre = light.get(16, 16);
        let near = light.get(18, 16);
        let far = light.get(30, 16);
        assert!(centre[0] > near[0]);
        assert!(near[0] > 0);
        assert_eq!(far, [0, 0, 0]);
        // The grid itself is untouched
        assert_eq!(grid.tiles(), &snapshot[..]);
    }

    #[test]
    fn test_emitter_outside_zone_contributes() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(32, 32).expect("grid");
        grid.set_tile(2, 2, MaterialInstance::from_def(materials.get(MaterialId::FIRE)));

        let mut light = LightMap::new();
        let count = light.accumulate(&grid, &materials, &Zone::new(4, 0, 10, 10), 1);
        assert_eq!(count, 1);
        assert!(light.get(4, 2)[0] > 0);
        assert_eq!(light.get(0, 0), [0, 0, 0]);
    }
}
