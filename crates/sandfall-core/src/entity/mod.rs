//! Entities - sized actors whose footprint displaces grid contents
//!
//! Before the automaton runs, every entity overlays its footprint on the grid:
//! air becomes a transient OBJECT marker so falling material piles on top of
//! it, and loose sand or soup under it is ejected as particles. After the
//! automaton the markers are restored to air.

use glam::Vec2;

use crate::simulation::{MaterialId, MaterialInstance, Materials, PhysicsType};
use crate::world::particles::{Particle, ParticleSystem};
use crate::world::rng_trait::WorldRng;
use crate::world::TileGrid;

/// Downward pull applied to ejected particles, in tiles per tick²
const EJECT_GRAVITY: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// A positioned, sized actor (player or otherwise)
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Top-left corner in grid coordinates
    pub position: Vec2,
    /// Tiles per tick
    pub velocity: Vec2,
    pub width: u32,
    pub height: u32,
    /// Added to vertical velocity each tick
    pub gravity: f32,
}

impl Entity {
    pub fn new(position: Vec2, width: u32, height: u32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            width,
            height,
            gravity: 0.0,
        }
    }

    /// Footprint cells as (x0, y0, x1, y1), half-open
    pub fn footprint_at(&self, position: Vec2) -> (i32, i32, i32, i32) {
        let x0 = position.x.floor() as i32;
        let y0 = position.y.floor() as i32;
        (x0, y0, x0 + self.width as i32, y0 + self.height as i32)
    }

    pub fn footprint(&self) -> (i32, i32, i32, i32) {
        self.footprint_at(self.position)
    }
}

#[derive(Default)]
pub struct EntitySystem {
    entities: Vec<(EntityId, Entity)>,
    next_id: u32,
    /// Cells currently holding a marker written by `stamp`
    markers: Vec<(i32, i32)>,
}

impl EntitySystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push((id, entity));
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|(eid, _)| *eid == id)?;
        Some(self.entities.remove(index).1)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|(eid, _)| *eid == id)
            .map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn markers(&self) -> &[(i32, i32)] {
        &self.markers
    }

    /// Overlay every footprint on the grid. Returns particles ejected.
    pub fn stamp<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        particles: &mut ParticleSystem,
        rng: &mut R,
    ) -> usize {
        let marker = MaterialInstance::from_def(materials.get(MaterialId::OBJECT));
        let mut ejected = 0;

        for (_, entity) in &self.entities {
            let (x0, y0, x1, y1) = entity.footprint();
            for y in y0..y1 {
                for x in x0..x1 {
                    let Some(tile) = grid.get_tile(x, y) else {
                        continue;
                    };
                    match materials.physics_type(tile.material_id) {
                        PhysicsType::Air => {}
                        PhysicsType::Sand | PhysicsType::Soup => {
                            let jitter = (rng.gen_f32() * 2.0 - 1.0) * 0.5;
                            let lift = (rng.gen_below(5) + 5) as f32 / 5.0;
                            let velocity = Vec2::new(
                                -entity.velocity.x / 4.0 + jitter,
                                -entity.velocity.y / 4.0 - lift,
                            );
                            // Released just above the footprint so it is not
                            // trapped inside the marker cells
                            let spawn_at = Vec2::new(x as f32 + 0.5, y0 as f32 - 0.5);
                            particles.spawn(
                                Particle::new(tile, spawn_at, velocity)
                                    .with_acceleration(Vec2::new(0.0, EJECT_GRAVITY)),
                            );
                            ejected += 1;
                        }
                        _ => continue,
                    }
                    grid.set_tile(x, y, marker);
                    self.markers.push((x, y));
                }
            }
        }

        ejected
    }

    /// Restore marker cells to air (cells overwritten since are left alone)
    pub fn clear(&mut self, grid: &mut TileGrid) {
        for (x, y) in self.markers.drain(..) {
            if grid.material_at(x, y) == Some(MaterialId::OBJECT) {
                grid.set_tile(x, y, MaterialInstance::AIR);
            }
        }
    }

    /// Integrate velocity, blocking each axis separately against solid cells
    pub fn advance(&mut self, grid: &TileGrid, materials: &Materials) {
        for (_, entity) in &mut self.entities {
            entity.velocity.y += entity.gravity;

            let moved_x = Vec2::new(entity.position.x + entity.velocity.x, entity.position.y);
            if overlaps_solid(grid, materials, entity, moved_x) {
                entity.velocity.x = 0.0;
            } else {
                entity.position = moved_x;
            }

            let moved_y = Vec2::new(entity.position.x, entity.position.y + entity.velocity.y);
            if overlaps_solid(grid, materials, entity, moved_y) {
                entity.velocity.y = 0.0;
            } else {
                entity.position = moved_y;
            }
        }
    }

    /// Follow the grid window as it slides by `(dx, dy)`
    pub fn shift(&mut self, dx: i32, dy: i32) {
        let offset = Vec2::new(dx as f32, dy as f32);
        for (_, entity) in &mut self.entities {
            entity.position -= offset;
        }
    }
}

fn overlaps_solid(grid: &TileGrid, materials: &Materials, entity: &Entity, at: Vec2) -> bool {
    let (x0, y0, x1, y1) = entity.footprint_at(at);
    (y0..y1).any(|y| {
        (x0..x1).any(|x| grid.physics_at(x, y, materials) == Some(PhysicsType::Solid))
    })
}
