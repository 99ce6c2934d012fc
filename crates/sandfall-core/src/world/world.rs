//! World - owns the grid and runs streaming, simulation and rendering stages
//!
//! Coordinates: the load zone is in world tiles, with its origin at grid cell
//! (0, 0). Everything else the world exposes (tick zone, mesh zone, tile
//! hooks, particles, entities, bodies) is in grid coordinates.

use glam::{IVec2, Vec2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use super::ca_update::{CellularAutomaton, TickReport};
use super::chunk_manager::{ChunkManager, FrameReport};
use super::config::WorldConfig;
use super::error::WorldError;
use super::events::{EventQueue, WorldEvent, WorldEventSink};
use super::frame::{FrameBuffers, RefreshSummary};
use super::generation::WorldGenerator;
use super::grid::{TileBlock, TileGrid};
use super::particles::{Particle, ParticleId, ParticleSystem, ParticleTickReport};
use super::persistence::{WorldMeta, WorldPersistence};
use super::raycasting;
use super::rigid_body::{BodyId, BodyKind, BodyShape, RigidBodyBridge};
use super::stats::{NoopStats, SimStats};
use super::zone::Zone;
use crate::entity::{Entity, EntityId, EntitySystem};
use crate::simulation::{
    CHUNK_H, CHUNK_W, LightMap, MaterialId, MaterialInstance, Materials, PhysicsType,
    TemperatureField,
};

/// Outward speed of explosion debris, tiles per second
const DEBRIS_SPEED: f32 = 60.0;
const DEBRIS_DENSITY: f32 = 1.0;
const DEBRIS_FRICTION: f32 = 0.6;
/// Outward speed of loose material thrown by an explosion, tiles per tick
const BLAST_PARTICLE_SPEED: f32 = 3.0;
const BLAST_PARTICLE_GRAVITY: f32 = 0.1;

/// What one `tick()` did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// `None` while a chunk was still waiting to merge
    pub automaton: Option<TickReport>,
    pub particles: ParticleTickReport,
    pub body_tiles_lost: usize,
    pub temperature_changed: Option<usize>,
    pub mesh_polygons: Option<usize>,
}

pub struct World {
    config: WorldConfig,
    materials: Materials,

    grid: TileGrid,
    frame_buffers: FrameBuffers,

    chunk_manager: ChunkManager,
    generator: WorldGenerator,
    persistence: Option<WorldPersistence>,
    meta: Option<WorldMeta>,

    automaton: CellularAutomaton,
    bodies: RigidBodyBridge,
    particles: ParticleSystem,
    entities: EntitySystem,
    temperature: TemperatureField,
    light: LightMap,

    events: EventQueue,
    rng: Xoshiro256StarStar,

    /// World-tile rectangle backed by the grid
    load_zone: Zone,
    /// World tile the view asked to be centred on
    requested_center: IVec2,
    tick_zone: Zone,
    mesh_zone: Zone,
    /// Forces a mesh rebuild on the next tick
    mesh_stale: bool,

    tick_count: u64,
    frame_count: u64,
}

/// Chunk-aligned `width × height` zone as close as possible to centred on `center`
fn zone_around(center: IVec2, width: usize, height: usize) -> Zone {
    let (cw, ch) = (CHUNK_W as i32, CHUNK_H as i32);
    let x = (center.x - width as i32 / 2).div_euclid(cw) * cw;
    let y = (center.y - height as i32 / 2).div_euclid(ch) * ch;
    Zone::new(x, y, width as i32, height as i32)
}

impl World {
    /// Build an in-memory world. Chunks are generated, never loaded.
    pub fn new(config: WorldConfig, materials: Materials) -> Result<World, WorldError> {
        config.validate()?;
        let grid = TileGrid::new(config.width, config.height)?;
        let frame_buffers = FrameBuffers::new(config.width, config.height)?;

        let load_zone = zone_around(IVec2::ZERO, config.width, config.height);
        let mut chunk_manager = ChunkManager::new();
        chunk_manager.batch_size = config.chunk_batch_size;
        chunk_manager.set_origin(IVec2::new(load_zone.x, load_zone.y));

        let gravity = Vec2::new(config.gravity[0], config.gravity[1]);
        let mut world = World {
            generator: WorldGenerator::new(config.seed),
            rng: Xoshiro256StarStar::seed_from_u64(config.seed),
            materials,
            grid,
            frame_buffers,
            chunk_manager,
            persistence: None,
            meta: None,
            automaton: CellularAutomaton::new(),
            bodies: RigidBodyBridge::new(gravity),
            particles: ParticleSystem::new(),
            entities: EntitySystem::new(),
            temperature: TemperatureField::new(),
            light: LightMap::new(),
            events: EventQueue::new(),
            load_zone,
            requested_center: IVec2::ZERO,
            tick_zone: Zone::EMPTY,
            mesh_zone: Zone::EMPTY,
            mesh_stale: true,
            tick_count: 0,
            frame_count: 0,
            config,
        };
        world.update_tick_zone();

        log::info!(
            "World created: {}x{} tiles, seed {}",
            world.config.width,
            world.config.height,
            world.config.seed
        );
        Ok(world)
    }

    /// Build a world backed by `<world_dir>/<world_name>/`.
    ///
    /// An existing world keeps the seed recorded in its meta file.
    pub fn open(config: WorldConfig, materials: Materials) -> Result<World, WorldError> {
        let persistence = WorldPersistence::new(&config.world_dir, &config.world_name)?;
        let meta = persistence.touch(config.seed)?;

        let config = WorldConfig {
            seed: meta.seed,
            ..config
        };
        let mut world = World::new(config, materials)?;
        log::info!(
            "[LOAD] Opened world '{}' (created {}) at {:?}",
            meta.world_name,
            meta.created_at,
            persistence.world_dir()
        );
        world.persistence = Some(persistence);
        world.meta = Some(meta);
        Ok(world)
    }

    // ---- accessors ----

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn materials(&self) -> &Materials {
        &self.materials
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn frame_buffers(&self) -> &FrameBuffers {
        &self.frame_buffers
    }

    pub fn light(&self) -> &LightMap {
        &self.light
    }

    pub fn chunk_manager(&self) -> &ChunkManager {
        &self.chunk_manager
    }

    pub fn bodies(&self) -> &RigidBodyBridge {
        &self.bodies
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn entities(&self) -> &EntitySystem {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntitySystem {
        &mut self.entities
    }

    pub fn meta(&self) -> Option<&WorldMeta> {
        self.meta.as_ref()
    }

    pub fn seed(&self) -> u64 {
        self.generator.seed()
    }

    pub fn load_zone(&self) -> Zone {
        self.load_zone
    }

    pub fn tick_zone(&self) -> Zone {
        self.tick_zone
    }

    pub fn mesh_zone(&self) -> Zone {
        self.mesh_zone
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// World tile position of grid cell (0, 0)
    pub fn origin(&self) -> IVec2 {
        IVec2::new(self.load_zone.x, self.load_zone.y)
    }

    pub fn world_to_grid(&self, wx: i32, wy: i32) -> (i32, i32) {
        (wx - self.load_zone.x, wy - self.load_zone.y)
    }

    pub fn grid_to_world(&self, x: i32, y: i32) -> (i32, i32) {
        (x + self.load_zone.x, y + self.load_zone.y)
    }

    fn update_tick_zone(&mut self) {
        let grid_zone = Zone::new(0, 0, self.grid.width() as i32, self.grid.height() as i32);
        self.tick_zone = grid_zone
            .inset(self.config.tick_zone_margin)
            .intersect(&grid_zone);
    }

    // ---- chunk streaming ----

    /// Queue every chunk of the load zone, plus the generation ring around it
    fn queue_zone(&mut self) -> usize {
        let Some((min, max)) = self.load_zone.chunk_range() else {
            return 0;
        };
        let ring = self.config.generation_ring.max(0);
        let force_generate = self.persistence.is_none();
        let mut queued = 0;
        for cy in min.y - ring..=max.y + ring {
            for cx in min.x - ring..=max.x + ring {
                let inside = (min.x..=max.x).contains(&cx) && (min.y..=max.y).contains(&cy);
                if self.chunk_manager.queue_load(cx, cy, force_generate, inside) {
                    queued += 1;
                }
            }
        }
        queued
    }

    fn drain_loading(&mut self) -> FrameReport {
        let report = self.chunk_manager.drain(
            &mut self.grid,
            &self.generator,
            &self.materials,
            self.persistence.as_ref(),
        );
        self.note_merges(&report);
        report
    }

    fn note_merges(&mut self, report: &FrameReport) {
        for &chunk in &report.merged {
            self.events.push(WorldEvent::ChunkMerged { chunk });
        }
        if !report.merged.is_empty() {
            self.mesh_stale = true;
        }
    }

    /// Queue the current load zone and block until it is resident
    pub fn load_initial(&mut self) -> FrameReport {
        let queued = self.queue_zone();
        let report = self.drain_loading();
        log::info!(
            "[LOAD] Initial zone: {} chunks queued, {} merged, {} stalled",
            queued,
            report.merged.len(),
            report.stalled
        );
        report
    }

    /// Ask for the load zone to be centred on world tile `(center_x, center_y)`
    pub fn set_view(&mut self, center_x: i32, center_y: i32) {
        self.requested_center = IVec2::new(center_x, center_y);
    }

    /// One round of chunk streaming
    pub fn frame(&mut self) -> FrameReport {
        let target = zone_around(self.requested_center, self.config.width, self.config.height);
        if target != self.load_zone
            && target.offset_from(&self.load_zone) >= self.config.view_shift_threshold
        {
            return self.shift_view(target);
        }

        let report = self.chunk_manager.frame(
            &mut self.grid,
            &self.generator,
            &self.materials,
            self.persistence.as_ref(),
        );
        self.note_merges(&report);
        report
    }

    fn shift_view(&mut self, target: Zone) -> FrameReport {
        let dx = target.x - self.load_zone.x;
        let dy = target.y - self.load_zone.y;
        log::debug!("[LOAD] Shifting view by ({}, {})", dx, dy);

        // Nothing may rotate past chunk data that has not arrived yet
        let mut report = self.drain_loading();

        let unloaded = self.chunk_manager.unload_outside(
            &target,
            self.config.generation_ring.max(0),
            &self.grid,
            self.persistence.as_ref(),
        );
        for chunk in unloaded {
            self.events.push(WorldEvent::ChunkUnloaded { chunk });
        }

        self.grid.shift(dx, dy);
        self.frame_buffers.shift(dx, dy);
        self.bodies.shift(
            dx,
            dy,
            self.grid.width(),
            self.grid.height(),
            &mut self.events,
        );
        self.particles.shift(dx, dy);
        self.entities.shift(dx, dy);

        self.load_zone = target;
        self.chunk_manager.set_origin(IVec2::new(target.x, target.y));
        self.queue_zone();
        self.update_tick_zone();
        self.mesh_stale = true;

        let after = self.chunk_manager.frame(
            &mut self.grid,
            &self.generator,
            &self.materials,
            self.persistence.as_ref(),
        );
        self.note_merges(&after);
        report.loaded += after.loaded;
        report.generated += after.generated;
        report.merged.extend(after.merged);
        report.stalled = after.stalled;
        report
    }

    // ---- simulation ----

    /// Advance the simulation one step
    pub fn tick(&mut self) -> TickSummary {
        self.tick_with_stats(&mut NoopStats)
    }

    pub fn tick_with_stats(&mut self, stats: &mut dyn SimStats) -> TickSummary {
        let mut summary = TickSummary::default();

        self.entities.stamp(
            &mut self.grid,
            &self.materials,
            &mut self.particles,
            &mut self.rng,
        );
        self.bodies.stamp_bodies(
            &mut self.grid,
            &self.materials,
            &mut self.particles,
            &mut self.rng,
        );

        if !self.chunk_manager.has_pending_merge() {
            summary.automaton = Some(self.automaton.tick(
                &mut self.grid,
                &self.materials,
                &self.tick_zone,
                &mut self.rng,
                stats,
                self.tick_count,
            ));
        }

        summary.body_tiles_lost = self.bodies.sync_bodies(&mut self.grid, &mut self.events);
        self.bodies.step(self.config.physics_dt);

        summary.particles =
            self.particles
                .tick(&mut self.grid, &self.materials, &mut self.events, stats);

        self.entities.clear(&mut self.grid);
        self.entities.advance(&self.grid, &self.materials);

        let interval = self.config.temperature_interval.max(1);
        if self.tick_count % interval == self.config.temperature_phase % interval {
            summary.temperature_changed =
                Some(self.temperature.pass(&mut self.grid, &self.materials, &self.tick_zone));
        }

        let mesh_due = self.tick_count % self.config.mesh_interval.max(1) == 0
            || self.tick_zone.offset_from(&self.mesh_zone) > self.config.mesh_lag_tolerance;
        if self.mesh_stale || mesh_due {
            summary.mesh_polygons = Some(self.update_world_mesh());
        }

        self.tick_count += 1;
        summary
    }

    /// Rebuild the static collision mesh over the tick zone
    pub fn update_world_mesh(&mut self) -> usize {
        let origin = self.origin();
        let polygons = self.bodies.update_world_mesh(
            &self.grid,
            self.chunk_manager.merged_chunks_mut(),
            origin,
            &self.tick_zone,
            &self.materials,
        );
        self.mesh_zone = self.tick_zone;
        self.mesh_stale = false;
        polygons
    }

    /// Repaint frame buffers from dirty cells, then the light map
    pub fn refresh_frame(&mut self) -> RefreshSummary {
        let summary = self.frame_buffers.refresh(
            &mut self.grid,
            &self.materials,
            &self.particles,
            self.temperature.is_dirty(),
        );
        self.temperature.clear_dirty();

        if self.frame_count % self.config.lighting_interval.max(1) == 0 {
            self.light.accumulate(
                &self.grid,
                &self.materials,
                &self.tick_zone,
                self.config.lighting_stride,
            );
        }
        self.frame_count += 1;
        summary
    }

    // ---- interaction hooks ----

    pub fn get_tile(&self, x: i32, y: i32) -> Option<MaterialInstance> {
        self.grid.get_tile(x, y)
    }

    /// Write a tile. Out-of-grid writes are ignored.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: MaterialInstance) -> bool {
        let written = self.grid.set_tile(x, y, tile);
        if written {
            self.events.push(WorldEvent::TileChanged { x, y });
        }
        written
    }

    /// Visit cells along a line; true when the visitor stopped early
    pub fn for_line<F>(&self, x0: i32, y0: i32, x1: i32, y1: i32, visitor: F) -> bool
    where
        F: FnMut(i32, i32) -> bool,
    {
        raycasting::for_line(x0, y0, x1, y1, visitor)
    }

    pub fn spawn_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.spawn(particle)
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.add(entity)
    }

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
    ) -> BodyId {
        self.bodies.make_rigid_body(
            kind,
            x,
            y,
            angle,
            shape,
            density,
            friction,
            pixel_source,
            &self.materials,
            &mut self.events,
        )
    }

    /// Blast a circle open.
    ///
    /// Solid cells are carved into up to four quadrant fragments that fly off
    /// as dynamic bodies; sand and soup are thrown out as particles; gas is
    /// cleared. Bedrock is left standing. Returns the debris bodies.
    pub fn explosion(&mut self, x: i32, y: i32, radius: i32) -> Vec<BodyId> {
        let radius = radius.max(0);
        let r2 = i64::from(radius) * i64::from(radius);
        let mut quadrants: [Vec<(i32, i32, MaterialInstance)>; 4] = Default::default();
        let mut thrown = 0;

        // Only cells inside the grid can be carved
        let (w, h) = (self.grid.width() as i32, self.grid.height() as i32);
        let (x0, x1) = (x.saturating_sub(radius).max(0), x.saturating_add(radius).min(w - 1));
        let (y0, y1) = (y.saturating_sub(radius).max(0), y.saturating_add(radius).min(h - 1));

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let dx = i64::from(cx) - i64::from(x);
                let dy = i64::from(cy) - i64::from(y);
                let d2 = dx * dx + dy * dy;
                if d2 > r2 {
                    continue;
                }
                let Some(tile) = self.grid.get_tile(cx, cy) else {
                    continue;
                };
                match self.materials.physics_type(tile.material_id) {
                    PhysicsType::Solid if tile.material_id != MaterialId::BEDROCK => {
                        let q = usize::from(dx >= 0) + 2 * usize::from(dy >= 0);
                        quadrants[q].push((cx, cy, tile));
                    }
                    PhysicsType::Sand | PhysicsType::Soup => {
                        let dir = Vec2::new(dx as f32, dy as f32).normalize_or_zero();
                        let falloff = 1.0 - d2 as f32 / (r2.max(1) as f32);
                        self.particles.spawn(
                            Particle::new(
                                tile,
                                Vec2::new(cx as f32 + 0.5, cy as f32 + 0.5),
                                dir * BLAST_PARTICLE_SPEED * (0.5 + falloff),
                            )
                            .with_acceleration(Vec2::new(0.0, BLAST_PARTICLE_GRAVITY)),
                        );
                        thrown += 1;
                    }
                    PhysicsType::Gas => {}
                    _ => continue,
                }
                self.grid.set_tile(cx, cy, MaterialInstance::AIR);
            }
        }

        // Terrain colliders must not overlap the fragments about to be placed
        self.update_world_mesh();

        let mut created = Vec::new();
        for (q, cells) in quadrants.iter().enumerate() {
            let Some(fragment) = fragment_block(cells) else {
                continue;
            };
            let (origin, block) = fragment;
            let id = self.bodies.make_rigid_body(
                BodyKind::Dynamic,
                origin.x as f32,
                origin.y as f32,
                0.0,
                BodyShape::FromTiles,
                DEBRIS_DENSITY,
                DEBRIS_FRICTION,
                Some(block),
                &self.materials,
                &mut self.events,
            );
            let dir = Vec2::new(
                if q % 2 == 1 { 1.0 } else { -1.0 },
                if q >= 2 { 1.0 } else { -1.0 },
            )
            .normalize();
            self.bodies.set_velocity(id, dir * DEBRIS_SPEED, 0.0);
            created.push(id);
        }

        log::debug!(
            "Explosion at ({}, {}) r={}: {} fragments, {} particles",
            x,
            y,
            radius,
            created.len(),
            thrown
        );
        self.events.push(WorldEvent::Explosion { x, y, radius });
        created
    }

    // ---- events and persistence ----

    /// Hand every queued event to `sink`, oldest first
    pub fn dispatch_events(&mut self, sink: &mut dyn WorldEventSink) -> usize {
        self.events.dispatch(sink)
    }

    /// Write every resident chunk and the meta file. A world without
    /// persistence has nothing to save.
    pub fn save(&mut self) -> Result<usize, WorldError> {
        let Some(persistence) = self.persistence.as_ref() else {
            log::debug!("[SAVE] World has no persistence, nothing saved");
            return Ok(0);
        };
        let saved = self.chunk_manager.save_all(&self.grid, persistence)?;
        if let Some(meta) = &self.meta {
            persistence.save_meta(meta)?;
        }
        Ok(saved)
    }
}

/// Bounding box of carved cells as a tile block, with its grid origin
fn fragment_block(cells: &[(i32, i32, MaterialInstance)]) -> Option<(IVec2, TileBlock)> {
    let min_x = cells.iter().map(|c| c.0).min()?;
    let min_y = cells.iter().map(|c| c.1).min()?;
    let max_x = cells.iter().map(|c| c.0).max()?;
    let max_y = cells.iter().map(|c| c.1).max()?;
    let mut block = TileBlock::new((max_x - min_x + 1) as usize, (max_y - min_y + 1) as usize);
    for &(x, y, tile) in cells {
        block.set(x - min_x, y - min_y, tile);
    }
    Some((IVec2::new(min_x, min_y), block))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> WorldConfig {
        WorldConfig {
            width: CHUNK_W * 2,
            height: CHUNK_H * 2,
            seed: 3,
            ..Default::default()
        }
    }

    fn stone(world: &World) -> MaterialInstance {
        MaterialInstance::from_def(world.materials().get(MaterialId::STONE))
    }

    #[test]
    fn test_new_rejects_bad_dimensions() {
        let config = WorldConfig {
            width: 0,
            ..small_config()
        };
        assert!(matches!(
            World::new(config, Materials::new()),
            Err(WorldError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_tick_zone_is_inset_grid() {
        let world = World::new(small_config(), Materials::new()).unwrap();
        let m = world.config().tick_zone_margin;
        assert_eq!(
            world.tick_zone(),
            Zone::new(m, m, CHUNK_W as i32 * 2 - 2 * m, CHUNK_H as i32 * 2 - 2 * m)
        );
        assert_eq!(world.origin(), IVec2::new(-(CHUNK_W as i32), -(CHUNK_H as i32)));
    }

    #[test]
    fn test_initial_load_merges_zone() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        let report = world.load_initial();
        assert_eq!(report.merged.len(), 4);
        assert!(!world.chunk_manager().has_pending_merge());

        let mut merged = 0;
        world.dispatch_events(&mut |e: &WorldEvent| {
            if matches!(e, WorldEvent::ChunkMerged { .. }) {
                merged += 1;
            }
        });
        assert_eq!(merged, 4);
    }

    #[test]
    fn test_set_tile_emits_event_and_get_reads_back() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        let tile = stone(&world);
        assert!(world.set_tile(3, 4, tile));
        assert!(!world.set_tile(-1, 4, tile));
        assert_eq!(world.get_tile(3, 4), Some(tile));

        let mut seen = Vec::new();
        world.dispatch_events(&mut |e: &WorldEvent| seen.push(e.clone()));
        assert_eq!(seen, vec![WorldEvent::TileChanged { x: 3, y: 4 }]);
    }

    #[test]
    fn test_automaton_waits_for_pending_merge() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        world.queue_zone();
        let summary = world.tick();
        assert!(summary.automaton.is_none());

        world.drain_loading();
        let summary = world.tick();
        assert!(summary.automaton.is_some());
    }

    #[test]
    fn test_temperature_runs_on_its_phase() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        let ran: Vec<bool> = (0..8)
            .map(|_| world.tick().temperature_changed.is_some())
            .collect();
        assert_eq!(ran, vec![false, false, true, false, false, false, true, false]);
    }

    #[test]
    fn test_view_shift_moves_grid_content() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        world.load_initial();
        let tile = stone(&world);
        let (gx, gy) = (CHUNK_W as i32 + 5, 7);
        world.grid.set_tile(gx, gy, tile);
        let (wx, wy) = world.grid_to_world(gx, gy);

        world.set_view(CHUNK_W as i32, 0);
        world.frame();
        assert_eq!(world.origin(), IVec2::new(0, -(CHUNK_H as i32)));

        let (nx, ny) = world.world_to_grid(wx, wy);
        assert_eq!((nx, ny), (5, 7));
        assert_eq!(world.get_tile(nx, ny), Some(tile));
    }

    #[test]
    fn test_huge_explosion_is_bounded_by_grid() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        let tile = stone(&world);
        world.grid.set_tile(0, 0, tile);
        world.grid.set_tile(127, 127, tile);
        let bedrock = MaterialInstance::from_def(world.materials().get(MaterialId::BEDROCK));
        world.grid.set_tile(5, 5, bedrock);

        let bodies = world.explosion(64, 64, 50_000);
        assert_eq!(bodies.len(), 2);
        assert!(world.get_tile(0, 0).is_some_and(|t| t.is_air()));
        assert!(world.get_tile(127, 127).is_some_and(|t| t.is_air()));
        assert_eq!(world.get_tile(5, 5), Some(bedrock));

        // Far off-grid centres and extreme radii touch nothing and never overflow
        assert!(world.explosion(i32::MIN, i32::MAX, i32::MAX).is_empty());
        assert!(world.explosion(-10_000, 64, 3).is_empty());
    }

    #[test]
    fn test_explosion_clears_gas_and_throws_sand() {
        let mut world = World::new(small_config(), Materials::new()).unwrap();
        let smoke = MaterialInstance::from_def(world.materials().get(MaterialId::SMOKE));
        let sand = MaterialInstance::from_def(world.materials().get(MaterialId::SAND));
        world.grid.set_tile(20, 20, smoke);
        world.grid.set_tile(22, 20, sand);

        let bodies = world.explosion(20, 20, 5);
        assert!(bodies.is_empty());
        assert!(world.get_tile(20, 20).is_some_and(|t| t.is_air()));
        assert!(world.get_tile(22, 20).is_some_and(|t| t.is_air()));
        assert_eq!(world.particles().len(), 1);
    }
}
