//! Chunk lifecycle management - load queue, phased generation, merging and unloading
//!
//! `frame()` is the only place chunk state changes. Phase 0 runs on the rayon
//! pool over chunk buffers taken out of the map; every later phase and every
//! merge into the grid runs serially.

use std::borrow::Cow;
use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use glam::IVec2;
use rayon::prelude::*;
use rstar::{AABB, RTree};

use super::chunk::Chunk;
use super::chunk_status::{ChunkState, GENERATION_PHASES};
use super::generation::{NeighbourView, WorldGenerator};
use super::grid::{TileBlock, TileGrid};
use super::persistence::WorldPersistence;
use super::zone::Zone;
use crate::simulation::{CHUNK_H, CHUNK_W, Materials};

/// Reserved chunk coordinate meaning "not present"
pub const NO_CHUNK: i32 = i32::MIN;

pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Wrapper for chunk position to implement R-tree traits
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct ChunkPos(IVec2);

impl rstar::Point for ChunkPos {
    type Scalar = i32;
    const DIMENSIONS: usize = 2;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        ChunkPos(IVec2::new(generator(0), generator(1)))
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        match index {
            0 => self.0.x,
            1 => self.0.y,
            _ => panic!("ChunkPos only has 2 dimensions"),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        match index {
            0 => &mut self.0.x,
            1 => &mut self.0.y,
            _ => panic!("ChunkPos only has 2 dimensions"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoadRequest {
    pos: IVec2,
    force_generate: bool,
    add_to_loaded: bool,
}

/// What one `frame()` call did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Chunks read back from disk
    pub loaded: usize,
    /// Generation phases run, summed over chunks
    pub generated: usize,
    /// Chunks written into the grid
    pub merged: Vec<IVec2>,
    /// Chunks waiting on neighbours
    pub stalled: usize,
}

impl FrameReport {
    /// Whether anything moved forward
    pub fn made_progress(&self) -> bool {
        self.loaded > 0 || self.generated > 0 || !self.merged.is_empty()
    }

    fn absorb(&mut self, other: FrameReport) {
        self.loaded += other.loaded;
        self.generated += other.generated;
        self.merged.extend(other.merged);
        self.stalled = other.stalled;
    }
}

pub struct ChunkManager {
    /// Resident chunks, chunk x → chunk y → chunk
    chunks: AHashMap<i32, AHashMap<i32, Chunk>>,

    /// Spatial index over resident chunk coordinates
    spatial_index: RTree<ChunkPos>,

    queue: VecDeque<LoadRequest>,
    queued: AHashSet<IVec2>,

    /// World tile position of grid cell (0, 0)
    origin: IVec2,

    /// Maximum number of new requests taken per frame
    pub batch_size: usize,

    stalled: Vec<IVec2>,
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkManager {
    pub fn new() -> Self {
        Self {
            chunks: AHashMap::new(),
            spatial_index: RTree::new(),
            queue: VecDeque::new(),
            queued: AHashSet::new(),
            origin: IVec2::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
            stalled: Vec::new(),
        }
    }

    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    /// Move the grid window. Call after the grid itself was shifted.
    pub fn set_origin(&mut self, origin: IVec2) {
        self.origin = origin;
    }

    /// Convert world coordinates to chunk coordinates + local offset
    pub fn world_to_chunk_coords(world_x: i32, world_y: i32) -> (IVec2, usize, usize) {
        let (w, h) = (CHUNK_W as i32, CHUNK_H as i32);
        let chunk = IVec2::new(world_x.div_euclid(w), world_y.div_euclid(h));
        (
            chunk,
            world_x.rem_euclid(w) as usize,
            world_y.rem_euclid(h) as usize,
        )
    }

    // ---- map access ----

    pub fn get(&self, cx: i32, cy: i32) -> Option<&Chunk> {
        self.chunks.get(&cx)?.get(&cy)
    }

    pub fn get_mut(&mut self, cx: i32, cy: i32) -> Option<&mut Chunk> {
        self.chunks.get_mut(&cx)?.get_mut(&cy)
    }

    fn insert(&mut self, chunk: Chunk) {
        let pos = IVec2::new(chunk.x, chunk.y);
        if self
            .chunks
            .entry(chunk.x)
            .or_default()
            .insert(chunk.y, chunk)
            .is_none()
        {
            self.spatial_index.insert(ChunkPos(pos));
        }
    }

    fn remove(&mut self, pos: IVec2) -> Option<Chunk> {
        let column = self.chunks.get_mut(&pos.x)?;
        let chunk = column.remove(&pos.y)?;
        if column.is_empty() {
            self.chunks.remove(&pos.x);
        }
        self.spatial_index.remove(&ChunkPos(pos));
        Some(chunk)
    }

    /// Resident chunk coordinates in row-major order
    fn positions(&self) -> Vec<IVec2> {
        let mut positions: Vec<IVec2> = self
            .chunks
            .iter()
            .flat_map(|(&x, column)| column.keys().map(move |&y| IVec2::new(x, y)))
            .collect();
        positions.sort_by_key(|p| (p.y, p.x));
        positions
    }

    pub fn resident_count(&self) -> usize {
        self.spatial_index.size()
    }

    pub fn state_of(&self, cx: i32, cy: i32) -> Option<ChunkState> {
        self.get(cx, cy).map(Chunk::state)
    }

    /// Requests not yet taken by `frame()`
    pub fn queued(&self) -> Vec<IVec2> {
        self.queue.iter().map(|r| r.pos).collect()
    }

    /// Resident chunks still going through generation
    pub fn pending(&self) -> Vec<(IVec2, ChunkState)> {
        self.positions()
            .into_iter()
            .filter_map(|p| {
                let state = self.get(p.x, p.y)?.state();
                state.is_generating().then_some((p, state))
            })
            .collect()
    }

    /// Generated chunks waiting to be written into the grid
    pub fn ready_to_merge(&self) -> Vec<IVec2> {
        self.positions()
            .into_iter()
            .filter(|p| {
                self.get(p.x, p.y)
                    .is_some_and(|c| c.add_to_loaded && c.state() == ChunkState::ReadyToMerge)
            })
            .collect()
    }

    /// Chunks the last frame could not advance for lack of neighbours
    pub fn stalled(&self) -> &[IVec2] {
        &self.stalled
    }

    /// Whether a chunk destined for the grid has not been merged yet
    pub fn has_pending_merge(&self) -> bool {
        self.queue.iter().any(|r| r.add_to_loaded)
            || self
                .chunks
                .values()
                .flat_map(|column| column.values())
                .any(|c| c.add_to_loaded && c.state() != ChunkState::Merged)
    }

    /// Resident chunk coordinates overlapping a world-tile zone
    pub fn chunks_in_zone(&self, zone: &Zone) -> Vec<IVec2> {
        let Some((min, max)) = zone.chunk_range() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(ChunkPos(min), ChunkPos(max));
        let mut found: Vec<IVec2> = self
            .spatial_index
            .locate_in_envelope(&envelope)
            .map(|p| p.0)
            .collect();
        found.sort_by_key(|p| (p.y, p.x));
        found
    }

    /// Merged chunks, for mesh caching
    pub fn merged_chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks
            .values_mut()
            .flat_map(|column| column.values_mut())
            .filter(|c| c.state() == ChunkState::Merged)
    }

    // ---- requests ----

    /// Ask for a chunk. Returns false for duplicates and the reserved key.
    ///
    /// `force_generate` skips the disk; `add_to_loaded` merges the chunk into
    /// the grid once ready, otherwise it only serves as a generation neighbour.
    pub fn queue_load(&mut self, cx: i32, cy: i32, force_generate: bool, add_to_loaded: bool) -> bool {
        if cx == NO_CHUNK || cy == NO_CHUNK {
            log::warn!("[LOAD] Refusing reserved chunk key ({}, {})", cx, cy);
            return false;
        }
        let pos = IVec2::new(cx, cy);

        if let Some(chunk) = self.get_mut(cx, cy) {
            if add_to_loaded && !chunk.add_to_loaded {
                chunk.add_to_loaded = true;
                return true;
            }
            return false;
        }

        if self.queued.contains(&pos) {
            if add_to_loaded {
                if let Some(request) = self.queue.iter_mut().find(|r| r.pos == pos) {
                    request.add_to_loaded = true;
                }
            }
            return false;
        }

        self.queued.insert(pos);
        self.queue.push_back(LoadRequest {
            pos,
            force_generate,
            add_to_loaded,
        });
        true
    }

    // ---- frame ----

    /// Take a batch of requests, advance generation and merge ready chunks
    pub fn frame(
        &mut self,
        grid: &mut TileGrid,
        generator: &WorldGenerator,
        materials: &Materials,
        persistence: Option<&WorldPersistence>,
    ) -> FrameReport {
        let mut report = FrameReport {
            loaded: self.take_requests(persistence),
            ..Default::default()
        };
        report.generated += self.run_terrain(generator, materials);
        report.generated += self.run_dependent_phases(grid, generator, materials);
        report.stalled = self.stalled.len();
        report.merged = self.merge_ready(grid);
        report
    }

    /// Keep calling `frame()` until nothing moves any more
    pub fn drain(
        &mut self,
        grid: &mut TileGrid,
        generator: &WorldGenerator,
        materials: &Materials,
        persistence: Option<&WorldPersistence>,
    ) -> FrameReport {
        let mut total = FrameReport::default();
        loop {
            let report = self.frame(grid, generator, materials, persistence);
            let progress = report.made_progress();
            total.absorb(report);
            if !progress {
                break;
            }
        }
        if !self.queue.is_empty() || total.stalled > 0 {
            log::debug!(
                "[LOAD] Drain stopped with {} queued, {} stalled",
                self.queue.len(),
                total.stalled
            );
        }
        total
    }

    fn take_requests(&mut self, persistence: Option<&WorldPersistence>) -> usize {
        let mut loaded = 0;
        for _ in 0..self.batch_size.max(1) {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&request.pos);
            let (cx, cy) = (request.pos.x, request.pos.y);

            let from_disk = match persistence {
                Some(persistence) if !request.force_generate => {
                    match persistence.load_chunk(cx, cy) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            log::warn!(
                                "[LOAD] Failed to load chunk ({}, {}): {:#}, regenerating",
                                cx,
                                cy,
                                e
                            );
                            None
                        }
                    }
                }
                _ => None,
            };
            let mut chunk = match from_disk {
                Some(chunk) => {
                    loaded += 1;
                    chunk
                }
                None => Chunk::new(cx, cy),
            };
            chunk.add_to_loaded = request.add_to_loaded;
            self.insert(chunk);
        }
        loaded
    }

    /// Phase 0 for every ungenerated chunk, in parallel
    fn run_terrain(&mut self, generator: &WorldGenerator, materials: &Materials) -> usize {
        let mut jobs: Vec<(IVec2, TileBlock)> = Vec::new();
        for pos in self.positions() {
            if let Some(chunk) = self.get_mut(pos.x, pos.y) {
                if chunk.state() == ChunkState::Ungenerated {
                    if let Some(block) = chunk.take_data() {
                        jobs.push((pos, block));
                    }
                }
            }
        }
        if jobs.is_empty() {
            return 0;
        }

        jobs.par_iter_mut().for_each(|(pos, block)| {
            generator.terrain(pos.x, pos.y, block, materials);
        });

        let count = jobs.len();
        for (pos, block) in jobs {
            if let Some(chunk) = self.get_mut(pos.x, pos.y) {
                chunk.put_data(block);
                let next = chunk.state().after_phase();
                chunk.advance(next);
            }
        }
        log::debug!("[GEN] Terrain generated for {} chunks", count);
        count
    }

    /// Phases 1.. in order; each chunk may climb several phases per frame
    fn run_dependent_phases(
        &mut self,
        grid: &TileGrid,
        generator: &WorldGenerator,
        materials: &Materials,
    ) -> usize {
        self.stalled.clear();
        let mut ran = 0;
        for phase in 1..GENERATION_PHASES {
            for pos in self.positions() {
                let Some(chunk) = self.get(pos.x, pos.y) else {
                    continue;
                };
                if chunk.state() != (ChunkState::Generating { completed: phase }) {
                    continue;
                }
                let needs_neighbours = WorldGenerator::phase_needs_neighbours(phase);
                if needs_neighbours && !self.neighbours_reached(pos, phase) {
                    if !self.stalled.contains(&pos) {
                        self.stalled.push(pos);
                    }
                    continue;
                }

                let Some(mut block) = self.get_mut(pos.x, pos.y).and_then(Chunk::take_data) else {
                    continue;
                };
                {
                    let view = if needs_neighbours {
                        self.neighbour_view(pos, grid)
                    } else {
                        NeighbourView::new(pos.x, pos.y)
                    };
                    generator.run_phase(phase, pos.x, pos.y, &mut block, &view, materials);
                }
                if let Some(chunk) = self.get_mut(pos.x, pos.y) {
                    chunk.put_data(block);
                    let next = chunk.state().after_phase();
                    chunk.advance(next);
                    ran += 1;
                    log::trace!("[GEN] Chunk ({}, {}) finished phase {}", pos.x, pos.y, phase);
                }
            }
        }
        ran
    }

    /// All 8 neighbours resident with at least `completed` phases done
    fn neighbours_reached(&self, pos: IVec2, completed: u8) -> bool {
        (-1..=1).all(|dy| {
            (-1..=1).all(|dx| {
                (dx, dy) == (0, 0)
                    || self
                        .get(pos.x + dx, pos.y + dy)
                        .is_some_and(|c| c.state().completed_phases() >= completed)
            })
        })
    }

    fn neighbour_view(&self, pos: IVec2, grid: &TileGrid) -> NeighbourView<'_> {
        let mut view = NeighbourView::new(pos.x, pos.y);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) == (0, 0) {
                    continue;
                }
                let Some(neighbour) = self.get(pos.x + dx, pos.y + dy) else {
                    continue;
                };
                let block = match neighbour.data() {
                    Some(block) => Cow::Borrowed(block),
                    // Merged: the grid owns the tiles
                    None => {
                        let (wx, wy) = neighbour.origin();
                        Cow::Owned(grid.read_block(
                            wx - self.origin.x,
                            wy - self.origin.y,
                            CHUNK_W,
                            CHUNK_H,
                        ))
                    }
                };
                view.insert(dx, dy, block);
            }
        }
        view
    }

    fn grid_zone(&self, grid: &TileGrid) -> Zone {
        Zone::new(
            self.origin.x,
            self.origin.y,
            grid.width() as i32,
            grid.height() as i32,
        )
    }

    fn merge_ready(&mut self, grid: &mut TileGrid) -> Vec<IVec2> {
        let window = self.grid_zone(grid);
        let origin = self.origin;
        let mut merged = Vec::new();
        for pos in self.positions() {
            let Some(chunk) = self.get_mut(pos.x, pos.y) else {
                continue;
            };
            if !chunk.add_to_loaded || chunk.state() != ChunkState::ReadyToMerge {
                continue;
            }
            if !window.contains_zone(&Zone::of_chunk(pos.x, pos.y)) {
                continue;
            }
            let Some(block) = chunk.take_data() else {
                continue;
            };
            let (wx, wy) = chunk.origin();
            grid.write_block(wx - origin.x, wy - origin.y, &block);
            chunk.advance(ChunkState::Merged);
            chunk.clear_mesh();
            merged.push(pos);
        }
        if !merged.is_empty() {
            log::debug!("[MERGE] {} chunks merged into the grid", merged.len());
        }
        merged
    }

    // ---- unloading ----

    /// Copy a merged chunk's tiles back out of the grid
    fn reclaim(&mut self, pos: IVec2, grid: &TileGrid) {
        let origin = self.origin;
        if let Some(chunk) = self.get_mut(pos.x, pos.y) {
            if chunk.data().is_none() {
                let (wx, wy) = chunk.origin();
                chunk.put_data(grid.read_block(wx - origin.x, wy - origin.y, CHUNK_W, CHUNK_H));
            }
        }
    }

    /// Save and free chunks that left the load zone.
    ///
    /// Merged chunks must lie inside `zone`; unmerged ones may stay up to
    /// `ring` chunks outside it as generation neighbours.
    pub fn unload_outside(
        &mut self,
        zone: &Zone,
        ring: i32,
        grid: &TileGrid,
        persistence: Option<&WorldPersistence>,
    ) -> Vec<IVec2> {
        let keep = Zone::new(
            zone.x - ring * CHUNK_W as i32,
            zone.y - ring * CHUNK_H as i32,
            zone.w + ring * 2 * CHUNK_W as i32,
            zone.h + ring * 2 * CHUNK_H as i32,
        );
        let leaving: Vec<IVec2> = self
            .positions()
            .into_iter()
            .filter(|p| {
                let area = Zone::of_chunk(p.x, p.y);
                match self.get(p.x, p.y).map(Chunk::state) {
                    Some(ChunkState::Merged) => !zone.contains_zone(&area),
                    Some(_) => !keep.intersects(&area),
                    None => false,
                }
            })
            .collect();

        // Whatever stays but is not fully inside is only a generation neighbour now
        for pos in self.positions() {
            if !zone.contains_zone(&Zone::of_chunk(pos.x, pos.y)) {
                if let Some(chunk) = self.get_mut(pos.x, pos.y) {
                    chunk.add_to_loaded = false;
                }
            }
        }

        for &pos in &leaving {
            self.reclaim(pos, grid);
            let Some(chunk) = self.remove(pos) else {
                continue;
            };
            if let Some(persistence) = persistence {
                if let Err(e) = persistence.save_chunk(&chunk) {
                    log::error!("[UNLOAD] Lost chunk ({}, {}): {:#}", pos.x, pos.y, e);
                }
            }
        }
        self.queue.retain(|r| keep.intersects(&Zone::of_chunk(r.pos.x, r.pos.y)));
        self.queued = self.queue.iter().map(|r| r.pos).collect();

        if !leaving.is_empty() {
            log::debug!("[UNLOAD] {} chunks unloaded", leaving.len());
        }
        leaving
    }

    /// Write every resident chunk to disk
    pub fn save_all(&mut self, grid: &TileGrid, persistence: &WorldPersistence) -> anyhow::Result<usize> {
        let mut saved = 0;
        let mut failed = 0;
        for pos in self.positions() {
            let merged = self.state_of(pos.x, pos.y) == Some(ChunkState::Merged);
            self.reclaim(pos, grid);
            let Some(chunk) = self.get_mut(pos.x, pos.y) else {
                continue;
            };
            match persistence.save_chunk(chunk) {
                Ok(()) => saved += 1,
                Err(e) => {
                    log::error!("[SAVE] Chunk ({}, {}) not saved: {:#}", pos.x, pos.y, e);
                    failed += 1;
                }
            }
            if merged {
                // The grid stays the owner
                chunk.take_data();
            }
        }
        if failed > 0 {
            anyhow::bail!("{} of {} chunks failed to save", failed, saved + failed);
        }
        log::info!("[SAVE] Saved {} chunks", saved);
        Ok(saved)
    }
}
