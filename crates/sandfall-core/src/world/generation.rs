//! Procedural world generation in ordered phases
//!
//! Phase 0 (terrain) and phase 2 (structures) only look at the chunk being
//! generated. Phase 1 (surface) reads the tile above each cell, which may live
//! in a neighbouring chunk, so it runs against a [`NeighbourView`].

use std::borrow::Cow;

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use super::grid::TileBlock;
use crate::simulation::{CHUNK_H, CHUNK_W, MaterialId, MaterialInstance, Materials};

/// World y of the mean surface line. Sky is above (smaller y).
pub const SURFACE_LEVEL: i32 = 0;
/// Maximum deviation of the surface from [`SURFACE_LEVEL`]
pub const SURFACE_AMPLITUDE: f32 = 24.0;
/// Dirt layer thickness below the surface
pub const DIRT_DEPTH: i32 = 8;
/// Depth below which the world is solid bedrock
pub const BEDROCK_LEVEL: i32 = 2048;

const CAVE_MIN_DEPTH: i32 = 12;
const CAVE_THRESHOLD: f32 = 0.45;
const WATER_MIN_DEPTH: i32 = 96;
const POOL_THRESHOLD: f32 = 0.3;
const ORE_THRESHOLD: f32 = 0.7;
const SAND_THRESHOLD: f32 = 0.2;

/// One in this many chunks gets a platform
const PLATFORM_ODDS: u32 = 4;
const PLATFORM_X: std::ops::Range<i32> = 20..44;
/// Platforms stay clear of the bottom rows so neighbours reading across the
/// border see the same tiles whether or not phase 2 already ran here
const PLATFORM_ROWS: std::ops::Range<i32> = 8..56;
const PLATFORM_CLEARANCE: i32 = 4;

const UNDERGROUND_BACKGROUND: u32 = 0x1e1a16;

/// Read-only access to the 3×3 block of chunks around the one being
/// generated. The centre slot is always empty; the caller owns it mutably.
pub struct NeighbourView<'a> {
    cx: i32,
    cy: i32,
    blocks: [Option<Cow<'a, TileBlock>>; 9],
}

impl<'a> NeighbourView<'a> {
    pub fn new(cx: i32, cy: i32) -> Self {
        Self {
            cx,
            cy,
            blocks: Default::default(),
        }
    }

    fn slot(dx: i32, dy: i32) -> Option<usize> {
        ((-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (dx, dy) != (0, 0))
            .then(|| ((dy + 1) * 3 + dx + 1) as usize)
    }

    /// Attach the block of the chunk at offset `(dx, dy)` from the centre
    pub fn insert(&mut self, dx: i32, dy: i32, block: Cow<'a, TileBlock>) {
        if let Some(slot) = Self::slot(dx, dy) {
            self.blocks[slot] = Some(block);
        }
    }

    pub fn available(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Tile at world coordinates, if it falls into an attached neighbour
    pub fn get(&self, wx: i32, wy: i32) -> Option<MaterialInstance> {
        let (w, h) = (CHUNK_W as i32, CHUNK_H as i32);
        let dx = wx.div_euclid(w) - self.cx;
        let dy = wy.div_euclid(h) - self.cy;
        let block = self.blocks[Self::slot(dx, dy)?].as_ref()?;
        block.get(wx.rem_euclid(w), wy.rem_euclid(h))
    }
}

pub struct WorldGenerator {
    seed: u64,
    height: FastNoiseLite,
    caves: FastNoiseLite,
    pools: FastNoiseLite,
    ores: FastNoiseLite,
    dunes: FastNoiseLite,
}

fn noise_layer(seed: u64, offset: i32, frequency: f32, octaves: i32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::with_seed((seed as i32).wrapping_add(offset));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(frequency));
    if octaves > 1 {
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(octaves));
        noise.set_fractal_lacunarity(Some(2.0));
        noise.set_fractal_gain(Some(0.5));
    }
    noise
}

impl WorldGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            height: noise_layer(seed, 0, 0.004, 4),
            caves: noise_layer(seed, 1000, 0.02, 3),
            pools: noise_layer(seed, 2000, 0.05, 1),
            ores: noise_layer(seed, 3000, 0.08, 2),
            dunes: noise_layer(seed, 4000, 0.1, 1),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether `phase` reads tiles of neighbouring chunks
    pub fn phase_needs_neighbours(phase: u8) -> bool {
        phase == 1
    }

    /// Surface height (world y) of column `wx`
    pub fn surface_at(&self, wx: i32) -> i32 {
        SURFACE_LEVEL + (self.height.get_noise_2d(wx as f32, 0.0) * SURFACE_AMPLITUDE) as i32
    }

    /// Run generation phase `phase` on the chunk at `(cx, cy)`
    pub fn run_phase(
        &self,
        phase: u8,
        cx: i32,
        cy: i32,
        block: &mut TileBlock,
        view: &NeighbourView<'_>,
        materials: &Materials,
    ) {
        match phase {
            0 => self.terrain(cx, cy, block, materials),
            1 => self.surface(cx, cy, block, view, materials),
            2 => self.structures(cx, cy, block, materials),
            _ => log::warn!("[GEN] Unknown phase {} for chunk ({}, {})", phase, cx, cy),
        }
    }

    /// Phase 0: rock layers, caves, ores and water pools
    pub fn terrain(&self, cx: i32, cy: i32, block: &mut TileBlock, materials: &Materials) {
        let (ox, oy) = (cx * CHUNK_W as i32, cy * CHUNK_H as i32);
        for lx in 0..CHUNK_W as i32 {
            let wx = ox + lx;
            let surface = self.surface_at(wx);
            for ly in 0..CHUNK_H as i32 {
                let wy = oy + ly;
                let Some(i) = block.index(lx, ly) else {
                    continue;
                };
                let depth = wy - surface;
                if depth < 0 {
                    block.tiles[i] = MaterialInstance::AIR;
                    block.layer2[i] = MaterialInstance::AIR;
                    block.background[i] = 0;
                    continue;
                }

                let wall = if depth < DIRT_DEPTH {
                    MaterialId::DIRT
                } else {
                    MaterialId::STONE
                };
                block.layer2[i] = self.tinted(materials, wall, wx, wy);
                block.background[i] = UNDERGROUND_BACKGROUND;

                let id = if wy >= BEDROCK_LEVEL {
                    MaterialId::BEDROCK
                } else if depth >= CAVE_MIN_DEPTH
                    && self.caves.get_noise_2d(wx as f32, wy as f32) > CAVE_THRESHOLD
                {
                    if depth >= WATER_MIN_DEPTH
                        && self.pools.get_noise_2d(wx as f32, wy as f32) > POOL_THRESHOLD
                    {
                        MaterialId::WATER
                    } else {
                        MaterialId::AIR
                    }
                } else if wall == MaterialId::STONE
                    && self.ores.get_noise_2d(wx as f32, wy as f32) > ORE_THRESHOLD
                {
                    MaterialId::ORE
                } else {
                    wall
                };
                block.tiles[i] = self.tinted(materials, id, wx, wy);
            }
        }
    }

    /// Phase 1: grass on exposed dirt, sand dropped onto exposed stone
    pub fn surface(
        &self,
        cx: i32,
        cy: i32,
        block: &mut TileBlock,
        view: &NeighbourView<'_>,
        materials: &Materials,
    ) {
        let (ox, oy) = (cx * CHUNK_W as i32, cy * CHUNK_H as i32);
        // Rows top to bottom: edits land on this row or the one above, which
        // has already been visited
        for ly in 0..CHUNK_H as i32 {
            for lx in 0..CHUNK_W as i32 {
                let (wx, wy) = (ox + lx, oy + ly);
                let Some(tile) = block.get(lx, ly) else {
                    continue;
                };
                let above = if ly > 0 {
                    block.get(lx, ly - 1)
                } else {
                    view.get(wx, wy - 1)
                };
                if !above.is_some_and(|t| t.is_air()) {
                    continue;
                }
                match tile.material_id {
                    MaterialId::DIRT => {
                        block.set(lx, ly, self.tinted(materials, MaterialId::GRASS, wx, wy));
                    }
                    MaterialId::STONE
                        if ly > 0
                            && self.dunes.get_noise_2d(wx as f32, wy as f32) > SAND_THRESHOLD =>
                    {
                        block.set(lx, ly - 1, self.tinted(materials, MaterialId::SAND, wx, wy - 1));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Phase 2: a wooden platform in some chunks with room for one
    pub fn structures(&self, cx: i32, cy: i32, block: &mut TileBlock, materials: &Materials) {
        if cell_hash(self.seed, cx, cy) % PLATFORM_ODDS != 0 {
            return;
        }
        let clear = |ly: i32| {
            (ly - PLATFORM_CLEARANCE + 1..=ly).all(|y| {
                PLATFORM_X.clone().all(|x| block.get(x, y).is_some_and(|t| t.is_air()))
            })
        };
        let Some(row) = PLATFORM_ROWS.clone().rev().find(|&ly| clear(ly)) else {
            return;
        };
        let (ox, oy) = (cx * CHUNK_W as i32, cy * CHUNK_H as i32);
        for lx in PLATFORM_X {
            block.set(lx, row, self.tinted(materials, MaterialId::WOOD, ox + lx, oy + row));
        }
        log::trace!("[GEN] Platform in chunk ({}, {}) at row {}", cx, cy, row);
    }

    fn tinted(&self, materials: &Materials, id: u16, wx: i32, wy: i32) -> MaterialInstance {
        let tile = MaterialInstance::from_def(materials.get(id));
        if tile.is_air() {
            return tile;
        }
        tile.with_color(tint(tile.color, cell_hash(self.seed, wx, wy)))
    }
}

/// Deterministic per-cell hash
fn cell_hash(seed: u64, x: i32, y: i32) -> u32 {
    let mut h = seed ^ (x as u32 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    h ^= (y as u32 as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h as u32
}

/// Shift brightness by up to ±8 per channel
fn tint(color: u32, hash: u32) -> u32 {
    let delta = (hash % 17) as i32 - 8;
    let channel = |shift: u32| (((color >> shift) & 0xff) as i32 + delta).clamp(0, 255) as u32;
    (channel(16) << 16) | (channel(8) << 8) | channel(0)
}
