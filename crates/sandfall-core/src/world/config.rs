//! World settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::WorldError;
use crate::simulation::{CHUNK_H, CHUNK_W};

/// Everything a `World` needs at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Grid width in tiles, a multiple of the chunk width
    pub width: usize,
    /// Grid height in tiles, a multiple of the chunk height
    pub height: usize,
    pub seed: u64,
    /// Directory holding one sub-directory per world
    pub world_dir: PathBuf,
    pub world_name: String,

    /// Distance kept between the tick zone and the grid edges
    pub tick_zone_margin: i32,
    /// How far the tick zone may drift from the mesh zone before re-extraction
    pub mesh_lag_tolerance: i32,

    /// Run temperature when `tick % temperature_interval == temperature_phase`
    pub temperature_interval: u64,
    pub temperature_phase: u64,
    /// Ticks between world mesh rebuilds
    pub mesh_interval: u64,
    /// Frames between lighting passes
    pub lighting_interval: u64,
    /// Emitter sampling stride for lighting
    pub lighting_stride: usize,

    /// View movement (tiles) that triggers a grid shift, rounded to whole chunks
    pub view_shift_threshold: i32,
    /// Load requests taken per frame
    pub chunk_batch_size: usize,
    /// Non-merging chunks generated around the load zone
    pub generation_ring: i32,

    /// Physics gravity in tiles/s², +y is down
    pub gravity: [f32; 2],
    /// Physics step per tick, seconds
    pub physics_dt: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: CHUNK_W * 8,
            height: CHUNK_H * 6,
            seed: 0,
            world_dir: PathBuf::from("worlds"),
            world_name: "default".to_string(),
            tick_zone_margin: 16,
            mesh_lag_tolerance: 16,
            temperature_interval: 4,
            temperature_phase: 2,
            mesh_interval: 10,
            lighting_interval: 2,
            lighting_stride: 1,
            view_shift_threshold: CHUNK_W as i32,
            chunk_batch_size: 16,
            generation_ring: 1,
            gravity: [0.0, 300.0],
            physics_dt: 1.0 / 60.0,
        }
    }
}

impl WorldConfig {
    /// Reject grids that cannot be tiled by whole chunks
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.width == 0
            || self.height == 0
            || self.width % CHUNK_W != 0
            || self.height % CHUNK_H != 0
        {
            return Err(WorldError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}
