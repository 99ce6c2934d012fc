//! Temperature diffusion
//!
//! Each pass blends every cell with its 4-neighbours (the cell itself
//! weighted 4) and adds the heat bias of emissive materials. A uniform grid
//! without emitters is therefore a fixed point. New values are computed
//! into a scratch buffer first so the pass reads only old temperatures.

use crate::simulation::{Materials, TEMPERATURE_MAX, TEMPERATURE_MIN};
use crate::world::{TileGrid, Zone};

const SELF_WEIGHT: i32 = 4;

#[derive(Default)]
pub struct TemperatureField {
    scratch: Vec<i32>,
    /// Set by a pass that changed anything; cleared by the frame-buffer stage
    dirty: bool,
}

impl TemperatureField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Diffuse temperatures inside `zone`. Returns the number of cells changed.
    pub fn pass(&mut self, grid: &mut TileGrid, materials: &Materials, zone: &Zone) -> usize {
        let zone = zone.intersect(&Zone::new(0, 0, grid.width() as i32, grid.height() as i32));
        if zone.is_empty() {
            return 0;
        }

        self.scratch.clear();
        self.scratch.reserve(zone.area());
        {
            let tiles = grid.tiles();
            let temp_at = |x: i32, y: i32| grid.index(x, y).map(|i| tiles[i].temperature);
            for (x, y) in zone.cells() {
                let Some(own) = temp_at(x, y) else {
                    continue;
                };
                let mut sum = own * SELF_WEIGHT;
                let mut weight = SELF_WEIGHT;
                for (dx, dy) in [(0, -1), (-1, 0), (1, 0), (0, 1)] {
                    if let Some(t) = temp_at(x + dx, y + dy) {
                        sum += t;
                        weight += 1;
                    }
                }
                let bias = grid
                    .material_at(x, y)
                    .map(|id| materials.get(id))
                    .filter(|def| def.is_emissive())
                    .map_or(0, |def| def.heat_bias);
                self.scratch
                    .push((sum / weight + bias).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX));
            }
        }

        let mut changed = 0;
        for ((x, y), &new) in zone.cells().zip(self.scratch.iter()) {
            let Some(index) = grid.index(x, y) else {
                continue;
            };
            if grid.tiles()[index].temperature != new {
                grid.set_temperature_at(index, new);
                changed += 1;
            }
        }

        if changed > 0 {
            self.dirty = true;
        }
        changed
    }
}
