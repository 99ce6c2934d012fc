//! Rigid Body Bridge - keeps carved bodies and the tile grid in agreement
//!
//! Every body owns a local tile block (the material it was carved from).
//! Before the automaton runs, each body writes its tiles into the grid at
//! its current pose so that sand and water pile against it; after the
//! automaton the tiles are taken back out. Tiles the world consumed in the
//! meantime (burnt, dissolved) are dropped from the body, and a body with no
//! tiles left is disposed.
//!
//! The static terrain is represented by polyline colliders rebuilt from the
//! solid cells of merged chunks.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use glam::{IVec2, Vec2};
use rapier2d::prelude::{
    nalgebra, ColliderBuilder, ColliderHandle, Group, InteractionGroups, Isometry, Point, Real,
    RigidBodyBuilder, RigidBodyHandle, SharedShape,
};

use super::chunk::Chunk;
use super::events::{EventQueue, WorldEvent};
use super::grid::{TileBlock, TileGrid};
use super::mesh::{self, Polygon};
use super::particles::{Particle, ParticleSystem};
use super::physics::PhysicsWorld;
use super::rng_trait::WorldRng;
use super::zone::Zone;
use crate::simulation::{MaterialId, MaterialInstance, Materials, PhysicsType};

/// Cells tried, in order, when placing or recovering a body tile
const NEIGHBOUR_DIRS: [(i32, i32); 5] = [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)];

/// Velocity multipliers (linear, angular) per displaced cell
const SAND_DRAG: (f32, f32) = (0.99, 0.98);
const SOUP_DRAG: (f32, f32) = (0.998, 0.99);

/// Bodies further than this outside the grid are dropped after a view shift
const CULL_MARGIN: f32 = 256.0;

bitflags! {
    /// Collision categories
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        const STATIC = 0b001;
        const DEBRIS = 0b010;
        const PLAYER = 0b100;
    }
}

impl CollisionLayers {
    /// Categories this layer collides with
    pub fn filter(self) -> CollisionLayers {
        if self.contains(CollisionLayers::STATIC) {
            CollisionLayers::all()
        } else if self.contains(CollisionLayers::PLAYER) {
            CollisionLayers::STATIC | CollisionLayers::DEBRIS
        } else {
            CollisionLayers::STATIC | CollisionLayers::PLAYER
        }
    }

    pub fn groups(self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.bits()),
            Group::from_bits_truncate(self.filter().bits()),
        )
    }
}

/// Stable handle into the body arena. A stale id never aliases a newer body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId {
    pub index: u32,
    pub generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Kinematic,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyShape {
    /// Box with its top-left corner at the body origin
    Cuboid { half_width: f32, half_height: f32 },
    /// Compound of per-row runs of the body's non-air tiles
    FromTiles,
}

/// Where a local tile was written during the last stamp
#[derive(Clone, Copy, Debug)]
struct Stamped {
    local: usize,
    x: i32,
    y: i32,
}

/// A physics body carved from the grid, with its own tile buffer
pub struct RigidBody {
    pub handle: RigidBodyHandle,
    pub kind: BodyKind,
    pub shape: BodyShape,
    pub layers: CollisionLayers,
    pub density: f32,
    pub friction: f32,
    collider: Option<ColliderHandle>,
    tiles: TileBlock,
    outline: Vec<Polygon>,
    stamped: Vec<Stamped>,
}

impl RigidBody {
    pub fn tiles(&self) -> &TileBlock {
        &self.tiles
    }

    /// Closed loops around the non-air tiles, in body-local coordinates
    pub fn outline(&self) -> &[Polygon] {
        &self.outline
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.count_non_air()
    }

    /// Tiles currently written into the grid
    pub fn stamped_count(&self) -> usize {
        self.stamped.len()
    }
}

enum Slot {
    Vacant,
    Live(RigidBody),
    PendingFree(RigidBody),
}

struct Entry {
    generation: u32,
    slot: Slot,
}

/// Slot arena of bodies with generation-checked ids
#[derive(Default)]
pub struct BodyArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl BodyArena {
    pub fn insert(&mut self, body: RigidBody) -> BodyId {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.slot = Slot::Live(body);
            BodyId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: 0,
                slot: Slot::Live(body),
            });
            BodyId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: BodyId) -> Option<&Entry> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
    }

    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        match self.entry(id).map(|e| &e.slot) {
            Some(Slot::Live(body)) => Some(body),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let entry = self
            .entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)?;
        match &mut entry.slot {
            Slot::Live(body) => Some(body),
            _ => None,
        }
    }

    pub fn is_pending_free(&self, id: BodyId) -> bool {
        matches!(self.entry(id).map(|e| &e.slot), Some(Slot::PendingFree(_)))
    }

    /// Move a live body to pending-free. Returns its handle.
    pub fn mark_pending(&mut self, id: BodyId) -> Option<RigidBodyHandle> {
        let entry = self
            .entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)?;
        match std::mem::replace(&mut entry.slot, Slot::Vacant) {
            Slot::Live(body) => {
                let handle = body.handle;
                entry.slot = Slot::PendingFree(body);
                Some(handle)
            }
            other => {
                entry.slot = other;
                None
            }
        }
    }

    /// Release every pending-free slot, bumping its generation
    pub fn take_pending(&mut self) -> Vec<(BodyId, RigidBody)> {
        let mut out = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if !matches!(entry.slot, Slot::PendingFree(_)) {
                continue;
            }
            if let Slot::PendingFree(body) = std::mem::replace(&mut entry.slot, Slot::Vacant) {
                out.push((
                    BodyId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    body,
                ));
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        out
    }

    /// Number of slots, live or not; iterate `0..capacity()` with [`Self::live_id_at`]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn live_id_at(&self, index: usize) -> Option<BodyId> {
        let entry = self.entries.get(index)?;
        matches!(entry.slot, Slot::Live(_)).then_some(BodyId {
            index: index as u32,
            generation: entry.generation,
        })
    }

    pub fn live_ids(&self) -> Vec<BodyId> {
        (0..self.capacity())
            .filter_map(|i| self.live_id_at(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.slot, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the physics world and every body carved out of the grid
pub struct RigidBodyBridge {
    physics: PhysicsWorld,
    bodies: BodyArena,
    static_body: RigidBodyHandle,
    static_colliders: Vec<ColliderHandle>,
    /// Hash over the per-chunk mesh keys the static colliders were built from
    static_signature: Option<u64>,
    /// Length of the last physics step, used to scale ejected particle speed
    dt: f32,
}

impl RigidBodyBridge {
    pub fn new(gravity: Vec2) -> Self {
        let mut physics = PhysicsWorld::new(gravity);
        let static_body = physics.insert_body(RigidBodyBuilder::fixed().build());
        Self {
            physics,
            bodies: BodyArena::default(),
            static_body,
            static_colliders: Vec::new(),
            static_signature: None,
            dt: 1.0 / 60.0,
        }
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Ids of all enabled bodies
    pub fn bodies(&self) -> Vec<BodyId> {
        self.bodies.live_ids()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Position of the body's local origin and its rotation
    pub fn pose(&self, id: BodyId) -> Option<(Vec2, f32)> {
        let body = self.bodies.get(id)?;
        self.physics.transform(body.handle)
    }

    pub fn set_velocity(&mut self, id: BodyId, velocity: Vec2, angular: f32) {
        if let Some(body) = self.bodies.get(id) {
            self.physics.set_velocity(body.handle, velocity, angular);
        }
    }

    pub fn velocity(&self, id: BodyId) -> Option<Vec2> {
        let body = self.bodies.get(id)?;
        self.physics.velocity(body.handle)
    }

    /// Create a body at `(x, y)` (its top-left origin, grid coordinates).
    ///
    /// Without a pixel source a cuboid body is filled with generic solid.
    #[allow(clippy::too_many_arguments)]
    pub fn make_rigid_body(
        &mut self,
        kind: BodyKind,
        x: f32,
        y: f32,
        angle: f32,
        shape: BodyShape,
        density: f32,
        friction: f32,
        pixel_source: Option<TileBlock>,
        materials: &Materials,
        events: &mut EventQueue,
    ) -> BodyId {
        let tiles = match (pixel_source, shape) {
            (Some(block), _) => block,
            (None, BodyShape::Cuboid { half_width, half_height }) => {
                let w = (half_width * 2.0).ceil().max(1.0) as usize;
                let h = (half_height * 2.0).ceil().max(1.0) as usize;
                let mut block = TileBlock::new(w, h);
                block
                    .tiles
                    .fill(MaterialInstance::from_def(materials.get(MaterialId::GENERIC_SOLID)));
                block
            }
            (None, BodyShape::FromTiles) => TileBlock::new(0, 0),
        };

        let builder = match kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        let handle = self.physics.insert_body(
            builder
                .translation(rapier2d::prelude::vector![x, y])
                .rotation(angle)
                .build(),
        );

        let mut body = RigidBody {
            handle,
            kind,
            shape,
            layers: CollisionLayers::DEBRIS,
            density,
            friction,
            collider: None,
            tiles,
            outline: Vec::new(),
            stamped: Vec::new(),
        };
        rebuild_hitbox(&mut self.physics, &mut body);

        log::debug!(
            "[BODY] Created {:?} body at ({:.1}, {:.1}) with {} tiles",
            kind,
            x,
            y,
            body.tile_count()
        );

        let id = self.bodies.insert(body);
        events.push(WorldEvent::BodyCreated { id });
        id
    }

    /// Disable a body; it is released by the next garbage collection
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        match self.bodies.mark_pending(id) {
            Some(handle) => {
                self.physics.set_enabled(handle, false);
                true
            }
            None => false,
        }
    }

    /// Release pending-free bodies and their physics handles
    pub fn collect_garbage(&mut self, events: &mut EventQueue) -> usize {
        let freed = self.bodies.take_pending();
        for (id, body) in &freed {
            self.physics.remove_body(body.handle);
            log::debug!("[BODY] Removed body {:?}", id);
            events.push(WorldEvent::BodyRemoved { id: *id });
        }
        freed.len()
    }

    pub fn step(&mut self, dt: f32) {
        self.dt = dt;
        self.physics.step(dt);
    }

    /// Write every body's tiles into the grid at its current pose.
    ///
    /// Sand and soup in the way are ejected as particles and slow the body.
    pub fn stamp_bodies<R: WorldRng>(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        particles: &mut ParticleSystem,
        rng: &mut R,
    ) -> usize {
        let mut written = 0;
        for index in 0..self.bodies.capacity() {
            let Some(id) = self.bodies.live_id_at(index) else {
                continue;
            };
            let Some(body) = self.bodies.get_mut(id) else {
                continue;
            };
            let Some((pos, angle)) = self.physics.transform(body.handle) else {
                continue;
            };
            let velocity = self.physics.velocity(body.handle).unwrap_or(Vec2::ZERO) * self.dt;
            let (sin, cos) = angle.sin_cos();

            body.stamped.clear();
            let mut drag = (1.0f32, 1.0f32);
            for ly in 0..body.tiles.height {
                for lx in 0..body.tiles.width {
                    let local = lx + ly * body.tiles.width;
                    let tile = body.tiles.tiles[local];
                    if tile.is_air() {
                        continue;
                    }
                    let (wx, wy) = world_cell(pos, cos, sin, lx, ly);

                    for (dx, dy) in NEIGHBOUR_DIRS {
                        let (x, y) = (wx + dx, wy + dy);
                        let Some(existing) = grid.get_tile(x, y) else {
                            continue;
                        };
                        match materials.physics_type(existing.material_id) {
                            PhysicsType::Air => {}
                            kind @ (PhysicsType::Sand | PhysicsType::Soup) => {
                                let kick = Vec2::new(
                                    velocity.x * 0.5 + (rng.gen_f32() - 0.5),
                                    -((rng.gen_below(3) + 1) as f32) * 0.5,
                                );
                                particles.spawn(
                                    Particle::new(
                                        existing,
                                        Vec2::new(x as f32 + 0.5, y as f32 + 0.5),
                                        kick,
                                    )
                                    .with_acceleration(Vec2::new(0.0, 0.1)),
                                );
                                let factor = if kind == PhysicsType::Sand {
                                    SAND_DRAG
                                } else {
                                    SOUP_DRAG
                                };
                                drag.0 *= factor.0;
                                drag.1 *= factor.1;
                            }
                            _ => continue,
                        }
                        grid.set_tile(x, y, tile);
                        body.stamped.push(Stamped { local, x, y });
                        written += 1;
                        break;
                    }
                }
            }

            if drag != (1.0, 1.0) {
                self.physics.damp(body.handle, drag.0, drag.1);
            }
        }
        written
    }

    /// Take stamped tiles back out of the grid.
    ///
    /// A tile still found at (or next to) the cell it was written to is
    /// recovered, picking up whatever the world did to it. A tile the world
    /// replaced is dropped from the body. Empty bodies are disposed.
    pub fn sync_bodies(&mut self, grid: &mut TileGrid, events: &mut EventQueue) -> usize {
        let mut lost_total = 0;
        for index in 0..self.bodies.capacity() {
            let Some(id) = self.bodies.live_id_at(index) else {
                continue;
            };
            let Some(body) = self.bodies.get_mut(id) else {
                continue;
            };

            let stamped = std::mem::take(&mut body.stamped);
            let mut unmatched = Vec::new();

            // Exact cells first so neighbouring lookups cannot steal a
            // sibling tile that is still in place
            for s in stamped {
                let tile = body.tiles.tiles[s.local];
                match grid.get_tile(s.x, s.y) {
                    Some(world) if world == tile => {
                        body.tiles.tiles[s.local] = world;
                        grid.set_tile(s.x, s.y, MaterialInstance::AIR);
                    }
                    _ => unmatched.push(s),
                }
            }

            let mut lost = 0;
            for s in unmatched {
                let tile = body.tiles.tiles[s.local];
                let found = NEIGHBOUR_DIRS[1..].iter().find_map(|&(dx, dy)| {
                    let (x, y) = (s.x + dx, s.y + dy);
                    grid.get_tile(x, y)
                        .filter(|world| *world == tile)
                        .map(|world| (x, y, world))
                });
                match found {
                    Some((x, y, world)) => {
                        body.tiles.tiles[s.local] = world;
                        grid.set_tile(x, y, MaterialInstance::AIR);
                    }
                    None => {
                        // Carved to air or replaced by the world
                        body.tiles.tiles[s.local] = MaterialInstance::AIR;
                        lost += 1;
                    }
                }
            }

            if lost > 0 {
                log::trace!("[BODY] Body {:?} lost {} tiles to the world", id, lost);
                rebuild_hitbox(&mut self.physics, body);
                lost_total += lost;
            }

            if body.tile_count() == 0 {
                self.remove_body(id);
            }
        }

        self.collect_garbage(events);
        lost_total
    }

    /// Rebuild the static terrain colliders from merged chunks.
    ///
    /// `origin` is the world position of grid cell (0, 0). A chunk whose
    /// solid mask is unchanged reuses its cached polygons. Returns the
    /// number of polygons in the static mesh.
    pub fn update_world_mesh<'a, I>(
        &mut self,
        grid: &TileGrid,
        chunks: I,
        origin: IVec2,
        mesh_zone: &Zone,
        materials: &Materials,
    ) -> usize
    where
        I: IntoIterator<Item = &'a mut Chunk>,
    {
        let mut chunks: Vec<&'a mut Chunk> = chunks.into_iter().collect();
        chunks.sort_by_key(|c| (c.y, c.x));

        let mut signature = ahash::AHasher::default();
        let mut rebuilt = 0;
        for chunk in chunks.iter_mut() {
            let region = Zone::of_chunk(chunk.x, chunk.y)
                .translate(-origin.x, -origin.y)
                .intersect(mesh_zone);
            if region.is_empty() {
                chunk.clear_mesh();
                continue;
            }

            let mask = mesh::solid_mask(grid, materials, &region);
            let key = mesh::mask_key(&region, &mask);
            if chunk.mesh_key() != Some(key) {
                chunk.set_mesh(key, mesh::loops_from_mask(&region, &mask));
                rebuilt += 1;
            }
            (chunk.x, chunk.y, key).hash(&mut signature);
        }
        let signature = signature.finish();

        let polygon_count: usize = chunks.iter().map(|c| c.polygons().len()).sum();
        if self.static_signature == Some(signature) {
            return polygon_count;
        }

        for handle in self.static_colliders.drain(..) {
            self.physics.remove_collider(handle);
        }

        let mut vertices: Vec<Point<Real>> = Vec::new();
        let mut indices: Vec<[u32; 2]> = Vec::new();
        for chunk in &chunks {
            for polygon in chunk.polygons() {
                let base = vertices.len() as u32;
                vertices.extend(polygon.points.iter().map(|p| Point::new(p.x, p.y)));
                indices.extend(polygon.segment_indices(base));
            }
        }
        if !indices.is_empty() {
            let collider = ColliderBuilder::polyline(vertices, Some(indices))
                .friction(0.8)
                .collision_groups(CollisionLayers::STATIC.groups())
                .build();
            self.static_colliders
                .push(self.physics.attach_collider(collider, self.static_body));
        }
        self.static_signature = Some(signature);

        log::debug!(
            "[MESH] Static mesh rebuilt: {} chunks re-traced, {} polygons",
            rebuilt,
            polygon_count
        );
        polygon_count
    }

    /// Follow the grid window as it slides by `(dx, dy)`. Bodies left far
    /// outside the `width × height` grid are disposed.
    pub fn shift(&mut self, dx: i32, dy: i32, width: usize, height: usize, events: &mut EventQueue) {
        let offset = Vec2::new(-dx as f32, -dy as f32);
        for index in 0..self.bodies.capacity() {
            let Some(id) = self.bodies.live_id_at(index) else {
                continue;
            };
            let Some(handle) = self.bodies.get(id).map(|b| b.handle) else {
                continue;
            };
            self.physics.translate(handle, offset);

            if let Some((pos, _)) = self.physics.transform(handle) {
                let outside = pos.x < -CULL_MARGIN
                    || pos.y < -CULL_MARGIN
                    || pos.x > width as f32 + CULL_MARGIN
                    || pos.y > height as f32 + CULL_MARGIN;
                if outside {
                    log::debug!("[BODY] Culling body {:?} outside the view", id);
                    self.remove_body(id);
                }
            }
        }
        // Static mesh coordinates are stale until the next update
        self.static_signature = None;
        self.collect_garbage(events);
    }
}

/// Replace the body's collider and outline to match its current tiles
fn rebuild_hitbox(physics: &mut PhysicsWorld, body: &mut RigidBody) {
    if let Some(old) = body.collider.take() {
        physics.remove_collider(old);
    }
    body.outline = mesh::extract_block(&body.tiles);

    let shape = match body.shape {
        BodyShape::Cuboid {
            half_width,
            half_height,
        } => Some(SharedShape::compound(vec![(
            Isometry::translation(half_width, half_height),
            SharedShape::cuboid(half_width, half_height),
        )])),
        BodyShape::FromTiles => {
            let runs = tile_runs(&body.tiles);
            if runs.is_empty() {
                None
            } else {
                Some(SharedShape::compound(runs))
            }
        }
    };

    if let Some(shape) = shape {
        let collider = ColliderBuilder::new(shape)
            .density(body.density)
            .friction(body.friction)
            .collision_groups(body.layers.groups())
            .build();
        body.collider = Some(physics.attach_collider(collider, body.handle));
    }
}

/// One cuboid per horizontal run of non-air tiles
fn tile_runs(tiles: &TileBlock) -> Vec<(Isometry<Real>, SharedShape)> {
    let mut runs = Vec::new();
    for y in 0..tiles.height {
        let row = &tiles.tiles[y * tiles.width..(y + 1) * tiles.width];
        let mut x = 0;
        while x < tiles.width {
            if row[x].is_air() {
                x += 1;
                continue;
            }
            let start = x;
            while x < tiles.width && !row[x].is_air() {
                x += 1;
            }
            let half = (x - start) as f32 * 0.5;
            runs.push((
                Isometry::translation(start as f32 + half, y as f32 + 0.5),
                SharedShape::cuboid(half, 0.5),
            ));
        }
    }
    runs
}

/// Grid cell under the center of local tile `(lx, ly)`
fn world_cell(pos: Vec2, cos: f32, sin: f32, lx: usize, ly: usize) -> (i32, i32) {
    let fx = lx as f32 + 0.5;
    let fy = ly as f32 + 0.5;
    (
        (fx * cos - fy * sin + pos.x).floor() as i32,
        (fx * sin + fy * cos + pos.y).floor() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    struct Fixture {
        grid: TileGrid,
        materials: Materials,
        particles: ParticleSystem,
        events: EventQueue,
        rng: Xoshiro256StarStar,
        bridge: RigidBodyBridge,
    }

    fn fixture() -> Fixture {
        Fixture {
            grid: TileGrid::new(32, 32).expect("grid"),
            materials: Materials::new(),
            particles: ParticleSystem::new(),
            events: EventQueue::new(),
            rng: Xoshiro256StarStar::seed_from_u64(3),
            bridge: RigidBodyBridge::new(Vec2::new(0.0, 300.0)),
        }
    }

    fn stone_block(materials: &Materials, w: usize, h: usize) -> TileBlock {
        let mut block = TileBlock::new(w, h);
        block
            .tiles
            .fill(MaterialInstance::from_def(materials.get(MaterialId::STONE)));
        block
    }

    fn fixed_body(f: &mut Fixture, x: f32, y: f32, block: TileBlock) -> BodyId {
        f.bridge.make_rigid_body(
            BodyKind::Fixed,
            x,
            y,
            0.0,
            BodyShape::FromTiles,
            1.0,
            0.5,
            Some(block),
            &f.materials,
            &mut f.events,
        )
    }

    #[test]
    fn test_make_rigid_body_emits_created() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 3, 2);
        let id = fixed_body(&mut f, 4.0, 4.0, block);

        let body = f.bridge.body(id).expect("live body");
        assert_eq!(body.tile_count(), 6);
        assert_eq!(body.outline().len(), 1);
        assert_eq!(f.bridge.bodies(), vec![id]);
        assert_eq!(
            f.events.drain().collect::<Vec<_>>(),
            vec![WorldEvent::BodyCreated { id }]
        );
    }

    #[test]
    fn test_cuboid_without_source_is_generic_solid() {
        let mut f = fixture();
        let id = f.bridge.make_rigid_body(
            BodyKind::Dynamic,
            0.0,
            0.0,
            0.0,
            BodyShape::Cuboid {
                half_width: 2.0,
                half_height: 1.0,
            },
            1.0,
            0.5,
            None,
            &f.materials,
            &mut f.events,
        );
        let body = f.bridge.body(id).expect("body");
        assert_eq!(body.tiles().width, 4);
        assert_eq!(body.tiles().height, 2);
        assert!(body
            .tiles()
            .tiles
            .iter()
            .all(|t| t.material_id == MaterialId::GENERIC_SOLID));
    }

    #[test]
    fn test_stamp_then_sync_restores_grid() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 3, 2);
        let id = fixed_body(&mut f, 10.0, 10.0, block);

        let written = f
            .bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);
        assert_eq!(written, 6);
        assert_eq!(f.grid.count_material(MaterialId::STONE), 6);
        assert_eq!(f.grid.material_at(10, 10), Some(MaterialId::STONE));
        assert_eq!(f.grid.material_at(12, 11), Some(MaterialId::STONE));

        let lost = f.bridge.sync_bodies(&mut f.grid, &mut f.events);
        assert_eq!(lost, 0);
        assert_eq!(f.grid.count_material(MaterialId::STONE), 0);
        assert_eq!(f.bridge.body(id).expect("body").tile_count(), 6);
    }

    #[test]
    fn test_sync_drops_tiles_the_world_replaced() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 2, 1);
        let id = fixed_body(&mut f, 5.0, 5.0, block);
        f.bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);

        let water = MaterialInstance::from_def(f.materials.get(MaterialId::WATER));
        f.grid.set_tile(5, 5, water);
        let lost = f.bridge.sync_bodies(&mut f.grid, &mut f.events);

        assert_eq!(lost, 1);
        assert_eq!(f.bridge.body(id).expect("body").tile_count(), 1);
        assert_eq!(f.grid.material_at(5, 5), Some(MaterialId::WATER));
        assert_eq!(f.grid.count_material(MaterialId::STONE), 0);
    }

    #[test]
    fn test_sync_drops_tiles_carved_to_air() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 3, 1);
        let id = fixed_body(&mut f, 5.0, 5.0, block);
        f.bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);

        f.grid.set_tile(6, 5, MaterialInstance::AIR);
        let lost = f.bridge.sync_bodies(&mut f.grid, &mut f.events);

        assert_eq!(lost, 1);
        let body = f.bridge.body(id).expect("body");
        assert_eq!(body.tile_count(), 2);
        assert!(body.tiles().tiles[1].is_air());
        assert_eq!(f.grid.count_material(MaterialId::STONE), 0);
    }

    #[test]
    fn test_empty_body_is_disposed() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 1, 1);
        let id = fixed_body(&mut f, 5.0, 5.0, block);
        f.events.drain().for_each(drop);
        f.bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);

        f.grid.set_tile(5, 5, MaterialInstance::AIR);
        f.bridge.sync_bodies(&mut f.grid, &mut f.events);

        assert!(f.bridge.body(id).is_none());
        assert_eq!(f.bridge.body_count(), 0);
        assert_eq!(
            f.events.drain().collect::<Vec<_>>(),
            vec![WorldEvent::BodyRemoved { id }]
        );
    }

    #[test]
    fn test_stamp_displaces_sand_into_particles() {
        let mut f = fixture();
        let sand = MaterialInstance::from_def(f.materials.get(MaterialId::SAND));
        f.grid.set_tile(8, 8, sand);
        let block = stone_block(&f.materials, 1, 1);
        fixed_body(&mut f, 8.0, 8.0, block);

        f.bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);

        assert_eq!(f.grid.material_at(8, 8), Some(MaterialId::STONE));
        assert_eq!(f.particles.len(), 1);
        assert_eq!(f.particles.particles()[0].tile.material_id, MaterialId::SAND);
    }

    #[test]
    fn test_stamp_tries_cells_around_occupied_ones() {
        let mut f = fixture();
        let wood = MaterialInstance::from_def(f.materials.get(MaterialId::WOOD));
        f.grid.set_tile(8, 8, wood);
        let block = stone_block(&f.materials, 1, 1);
        let id = fixed_body(&mut f, 8.0, 8.0, block);

        f.bridge
            .stamp_bodies(&mut f.grid, &f.materials, &mut f.particles, &mut f.rng);
        assert_eq!(f.grid.material_at(8, 8), Some(MaterialId::WOOD));
        assert_eq!(f.grid.material_at(9, 8), Some(MaterialId::STONE));

        f.bridge.sync_bodies(&mut f.grid, &mut f.events);
        assert_eq!(f.grid.material_at(9, 8), Some(MaterialId::AIR));
        assert_eq!(f.bridge.body(id).expect("body").tile_count(), 1);
    }

    #[test]
    fn test_stale_id_does_not_alias() {
        let mut f = fixture();
        let block = stone_block(&f.materials, 1, 1);
        let a = fixed_body(&mut f, 0.0, 0.0, block);
        assert!(f.bridge.remove_body(a));
        assert!(f.bridge.body(a).is_none());
        f.bridge.collect_garbage(&mut f.events);

        let block = stone_block(&f.materials, 1, 1);
        let b = fixed_body(&mut f, 0.0, 0.0, block);
        assert_eq!(a.index, b.index);
        assert_ne!(a, b);
        assert!(f.bridge.body(a).is_none());
        assert!(f.bridge.body(b).is_some());
        assert!(!f.bridge.remove_body(a));
    }

    #[test]
    fn test_collision_layers() {
        let debris = CollisionLayers::DEBRIS.groups();
        let player = CollisionLayers::PLAYER.groups();
        let ground = CollisionLayers::STATIC.groups();

        assert!(!debris.test(debris));
        assert!(debris.test(ground));
        assert!(debris.test(player));
        assert!(player.test(ground));
        assert!(!player.test(player));
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut f = fixture();
        let id = f.bridge.make_rigid_body(
            BodyKind::Dynamic,
            5.0,
            5.0,
            0.0,
            BodyShape::FromTiles,
            1.0,
            0.5,
            Some(stone_block(&f.materials, 2, 2)),
            &f.materials,
            &mut f.events,
        );
        for _ in 0..10 {
            f.bridge.step(1.0 / 60.0);
        }
        let (pos, _) = f.bridge.pose(id).expect("pose");
        assert!(pos.y > 5.0);
    }

    #[test]
    fn test_world_mesh_reuses_cached_polygons() {
        let mut f = fixture();
        let stone = MaterialInstance::from_def(f.materials.get(MaterialId::STONE));
        for x in 0..32 {
            f.grid.set_tile(x, 30, stone);
        }
        let mut chunks = vec![Chunk::new(0, 0)];
        let zone = Zone::new(0, 0, 32, 32);

        let first =
            f.bridge
                .update_world_mesh(&f.grid, chunks.iter_mut(), IVec2::ZERO, &zone, &f.materials);
        let key = chunks[0].mesh_key();
        let second =
            f.bridge
                .update_world_mesh(&f.grid, chunks.iter_mut(), IVec2::ZERO, &zone, &f.materials);

        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(chunks[0].mesh_key(), key);
        assert_eq!(f.bridge.physics().collider_count(), 1);
    }

    #[test]
    fn test_shift_culls_far_bodies() {
        let mut f = fixture();
        let near_block = stone_block(&f.materials, 1, 1);
        let near = fixed_body(&mut f, 4.0, 4.0, near_block);
        let far_block = stone_block(&f.materials, 1, 1);
        let far = fixed_body(&mut f, 50.0, 4.0, far_block);
        f.bridge.shift(300, 0, 32, 32, &mut f.events);

        assert!(f.bridge.body(near).is_none());
        assert!(f.bridge.body(far).is_some());
        let (pos, _) = f.bridge.pose(far).expect("pose");
        assert_eq!(pos.x, -250.0);
    }
}
