//! Chunk - CHUNK_W × CHUNK_H region of tiles, the unit of streaming and persistence

use serde::{Deserialize, Serialize};

use super::chunk_status::ChunkState;
use super::grid::TileBlock;
use super::mesh::Polygon;
use crate::simulation::{CHUNK_H, CHUNK_W};

/// A fixed-size region of the world identified by chunk coordinates
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk coordinates (in chunk space, not tile space)
    pub x: i32,
    pub y: i32,

    state: ChunkState,

    /// Tile data while the chunk lives outside the grid (pending, or being
    /// saved). `None` while merged: the grid owns the tiles then.
    data: Option<TileBlock>,

    /// Collision polygons extracted from this chunk's solid cells (not persisted)
    #[serde(skip)]
    polygons: Vec<Polygon>,

    /// Hash of the solid mask the cached polygons were built from (not persisted)
    #[serde(skip)]
    mesh_key: Option<u64>,

    /// Whether the chunk should be merged into the grid once generated
    #[serde(skip)]
    pub add_to_loaded: bool,
}

impl Chunk {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            state: ChunkState::Ungenerated,
            data: Some(TileBlock::new(CHUNK_W, CHUNK_H)),
            polygons: Vec::new(),
            mesh_key: None,
            add_to_loaded: false,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Move the state forward. Regressions are refused and reported.
    pub fn advance(&mut self, to: ChunkState) -> bool {
        if to < self.state {
            log::warn!(
                "Chunk ({}, {}) refused state regression {:?} -> {:?}",
                self.x,
                self.y,
                self.state,
                to
            );
            return false;
        }
        self.state = to;
        true
    }

    /// World tile coordinates of the top-left cell
    pub fn origin(&self) -> (i32, i32) {
        (self.x * CHUNK_W as i32, self.y * CHUNK_H as i32)
    }

    pub fn data(&self) -> Option<&TileBlock> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut TileBlock> {
        self.data.as_mut()
    }

    /// Hand the tiles over to the grid
    pub fn take_data(&mut self) -> Option<TileBlock> {
        self.data.take()
    }

    /// Take the tiles back from the grid (before saving)
    pub fn put_data(&mut self, block: TileBlock) {
        self.data = Some(block);
    }

    pub fn count_non_air(&self) -> usize {
        self.data.as_ref().map_or(0, TileBlock::count_non_air)
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn mesh_key(&self) -> Option<u64> {
        self.mesh_key
    }

    pub fn set_mesh(&mut self, key: u64, polygons: Vec<Polygon>) {
        self.mesh_key = Some(key);
        self.polygons = polygons;
    }

    pub fn clear_mesh(&mut self) {
        self.mesh_key = None;
        self.polygons.clear();
    }
}
