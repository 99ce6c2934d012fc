//! Cellular automata update logic - material movement and interactions

use smallvec::SmallVec;

use super::grid::TileGrid;
use super::rng_trait::WorldRng;
use super::stats::SimStats;
use super::zone::Zone;
use crate::simulation::{InteractionKind, MaterialDef, MaterialInstance, Materials, PhysicsType};

/// Neighbour order used when looking for an interaction partner
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Counts from one automaton tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub moved: usize,
    pub interactions: usize,
}

/// Cellular automaton over the tick zone of a grid
#[derive(Default)]
pub struct CellularAutomaton {
    /// Cells already mutated this tick
    touched: Vec<bool>,
}

impl CellularAutomaton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick of movement followed by interactions inside `zone`.
    ///
    /// Cells are swept column by column, each column bottom-to-top, so falling
    /// material moves at most one step per tick. The column order alternates
    /// per tick to avoid a directional bias. Every cell is mutated at most once.
    /// Interactions run afterwards over the same zone.
    pub fn tick<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        zone: &Zone,
        rng: &mut R,
        stats: &mut dyn SimStats,
        tick_index: u64,
    ) -> TickReport {
        let zone = zone.intersect(&Zone::new(0, 0, grid.width() as i32, grid.height() as i32));
        let mut report = TickReport::default();
        if zone.is_empty() {
            return report;
        }

        self.touched.clear();
        self.touched.resize(grid.len(), false);

        let left_to_right = tick_index % 2 == 0;
        for i in 0..zone.w {
            let x = if left_to_right {
                zone.x + i
            } else {
                zone.right() - 1 - i
            };
            for y in (zone.y..zone.bottom()).rev() {
                let Some(index) = grid.index(x, y) else {
                    continue;
                };
                if self.touched[index] {
                    continue;
                }

                let tile = grid.tiles()[index];
                let def = materials.get(tile.material_id);
                let moved = match def.physics_type {
                    PhysicsType::Sand => self.update_sand(grid, materials, def, x, y, rng),
                    PhysicsType::Soup => self.update_soup(grid, materials, def, x, y, rng),
                    PhysicsType::Gas => self.update_gas(grid, materials, def, x, y, rng),
                    _ => false,
                };
                if moved {
                    stats.record_tile_moved();
                    report.moved += 1;
                }
            }
        }

        for y in zone.y..zone.bottom() {
            for x in zone.x..zone.right() {
                if self.interact(grid, materials, x, y, rng) {
                    stats.record_interaction();
                    report.interactions += 1;
                }
            }
        }

        report
    }

    /// Sand: down, then both diagonals in random order
    fn update_sand<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x: i32,
        y: i32,
        rng: &mut R,
    ) -> bool {
        if self.try_move(grid, materials, def, x, y, x, y + 1, Self::sinks_into) {
            grid.set_flow(x, y + 1, 0);
            return true;
        }

        let dx = if rng.gen_bool() { -1 } else { 1 };
        for side in [dx, -dx] {
            if self.try_move(grid, materials, def, x, y, x + side, y + 1, Self::sinks_into) {
                grid.set_flow(x + side, y + 1, 0);
                return true;
            }
        }
        false
    }

    /// Soup: down, diagonals, then a lateral run of up to `dispersion` cells
    fn update_soup<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x: i32,
        y: i32,
        rng: &mut R,
    ) -> bool {
        if self.try_move(grid, materials, def, x, y, x, y + 1, Self::sinks_into) {
            grid.set_flow(x, y + 1, 0);
            return true;
        }

        let dx = if rng.gen_bool() { -1 } else { 1 };
        for side in [dx, -dx] {
            if self.try_move(grid, materials, def, x, y, x + side, y + 1, Self::sinks_into) {
                grid.set_flow(x + side, y + 1, 0);
                return true;
            }
        }

        let remembered = grid.flow_at(x, y) as i32;
        let first = if remembered != 0 { remembered } else { dx };
        for dir in [first, -first] {
            if let Some(tx) = self.lateral_target(grid, materials, def, x, y, dir, 1, Self::sinks_into) {
                if self.try_move(grid, materials, def, x, y, tx, y, Self::sinks_into) {
                    grid.set_flow(tx, y, dir as i8);
                    return true;
                }
            }
        }
        false
    }

    /// Gas: up, up-diagonals, then a lateral run of up to `dispersion` cells
    fn update_gas<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x: i32,
        y: i32,
        rng: &mut R,
    ) -> bool {
        if self.try_move(grid, materials, def, x, y, x, y - 1, Self::rises_into) {
            return true;
        }

        let dx = if rng.gen_bool() { -1 } else { 1 };
        for side in [dx, -dx] {
            if self.try_move(grid, materials, def, x, y, x + side, y - 1, Self::rises_into) {
                return true;
            }
        }

        for dir in [dx, -dx] {
            if let Some(tx) = self.lateral_target(grid, materials, def, x, y, dir, -1, Self::rises_into) {
                if self.try_move(grid, materials, def, x, y, tx, y, Self::rises_into) {
                    return true;
                }
            }
        }
        false
    }

    /// Farthest cell reachable along row `y` in direction `dir`, preferring
    /// the first one with an open cell in the `fall` direction.
    #[allow(clippy::too_many_arguments)]
    fn lateral_target(
        &self,
        grid: &TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x: i32,
        y: i32,
        dir: i32,
        fall: i32,
        passable: fn(&MaterialDef, &MaterialDef) -> bool,
    ) -> Option<i32> {
        let mut farthest = None;
        for k in 1..=def.dispersion as i32 {
            let tx = x + dir * k;
            if !self.open(grid, materials, def, tx, y, passable) {
                break;
            }
            if self.open(grid, materials, def, tx, y + fall, passable) {
                return Some(tx);
            }
            farthest = Some(tx);
        }
        farthest
    }

    /// Whether `def` may move into `(x, y)` this tick
    fn open(
        &self,
        grid: &TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x: i32,
        y: i32,
        passable: fn(&MaterialDef, &MaterialDef) -> bool,
    ) -> bool {
        let Some(index) = grid.index(x, y) else {
            return false;
        };
        !self.touched[index] && passable(def, materials.get(grid.tiles()[index].material_id))
    }

    /// Swap `(x0, y0)` with `(x1, y1)` if the destination is open
    #[allow(clippy::too_many_arguments)]
    fn try_move(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        def: &MaterialDef,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        passable: fn(&MaterialDef, &MaterialDef) -> bool,
    ) -> bool {
        if !self.open(grid, materials, def, x1, y1, passable) {
            return false;
        }
        let (Some(a), Some(b)) = (grid.index(x0, y0), grid.index(x1, y1)) else {
            return false;
        };
        if !grid.swap(x0, y0, x1, y1) {
            return false;
        }
        self.touched[a] = true;
        self.touched[b] = true;
        true
    }

    /// Sand and soup displace air, gas and lighter soup
    fn sinks_into(mover: &MaterialDef, target: &MaterialDef) -> bool {
        match target.physics_type {
            PhysicsType::Air | PhysicsType::Gas => true,
            PhysicsType::Soup => target.density < mover.density,
            _ => false,
        }
    }

    /// Gas displaces air and denser gas
    fn rises_into(mover: &MaterialDef, target: &MaterialDef) -> bool {
        match target.physics_type {
            PhysicsType::Air => true,
            PhysicsType::Gas => target.density > mover.density,
            _ => false,
        }
    }

    /// Apply the first passing interaction rule for the cell at `(x, y)`
    fn interact<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        x: i32,
        y: i32,
        rng: &mut R,
    ) -> bool {
        let Some(index) = grid.index(x, y) else {
            return false;
        };
        if self.touched[index] {
            return false;
        }
        let actor = grid.tiles()[index].material_id;
        if !materials.has_interactions(actor) {
            return false;
        }

        for (nx, ny) in NEIGHBOURS {
            let Some(neighbour) = grid.material_at(x + nx, y + ny) else {
                continue;
            };
            for rule in materials.interactions(actor, neighbour) {
                if !rng.check_probability(rule.probability) {
                    continue;
                }

                let result = MaterialInstance::from_def(materials.get(rule.material));
                let cells: SmallVec<[(i32, i32); 16]> = rule
                    .footprint()
                    .map(|(dx, dy)| (x + dx, y + dy))
                    .filter(|&(cx, cy)| match grid.index(cx, cy) {
                        Some(i) if !self.touched[i] => match rule.kind {
                            InteractionKind::Transform => grid.tiles()[i].material_id == actor,
                            InteractionKind::Spawn => grid.tiles()[i].is_air(),
                        },
                        _ => false,
                    })
                    .collect();

                for (cx, cy) in cells {
                    grid.set_tile(cx, cy, result);
                    if let Some(i) = grid.index(cx, cy) {
                        self.touched[i] = true;
                    }
                }
                log::trace!(
                    "{:?} {} -> {} at ({}, {})",
                    rule.kind,
                    actor,
                    rule.material,
                    x,
                    y
                );
                return true;
            }
        }
        false
    }
}
