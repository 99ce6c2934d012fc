//! Driver configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `sandfall.ron` file (if exists), or the file passed with `--config`
//! 3. Environment variables prefixed with `SANDFALL_`
//!
//! Example environment variable: `SANDFALL_SIMULATION__MS_PER_TICK=8`

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use sandfall_core::world::WorldConfig;

/// Main driver configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriverConfig {
    #[serde(default)]
    pub world: WorldSection,

    #[serde(default)]
    pub simulation: SimulationSection,

    #[serde(default)]
    pub streaming: StreamingSection,
}

/// Which world to open and how big its grid is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSection {
    /// Grid width in tiles, a multiple of 64
    pub width: usize,
    /// Grid height in tiles, a multiple of 64
    pub height: usize,
    /// Seed for a newly created world; existing worlds keep theirs
    pub seed: u64,
    pub world_dir: PathBuf,
    pub world_name: String,
}

impl Default for WorldSection {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            width: world.width,
            height: world.height,
            seed: world.seed,
            world_dir: world.world_dir,
            world_name: world.world_name,
        }
    }
}

/// Tick cadence and per-stage intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Wall-clock budget per tick
    pub ms_per_tick: u64,
    /// Ticks to run before saving and exiting
    pub ticks: u64,
    /// Skip the wall clock and tick once per loop
    pub unthrottled: bool,
    pub temperature_interval: u64,
    pub temperature_phase: u64,
    pub mesh_interval: u64,
    pub lighting_interval: u64,
    pub physics_dt: f32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            ms_per_tick: 16,
            ticks: 600,
            unthrottled: true,
            temperature_interval: world.temperature_interval,
            temperature_phase: world.temperature_phase,
            mesh_interval: world.mesh_interval,
            lighting_interval: world.lighting_interval,
            physics_dt: world.physics_dt,
        }
    }
}

/// Chunk streaming and view movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSection {
    /// Load requests taken per frame
    pub chunk_batch_size: usize,
    /// Rings of non-merging chunks generated around the load zone
    pub generation_ring: i32,
    /// View movement (tiles) before the grid shifts
    pub view_shift_threshold: i32,
    /// Horizontal view drift in tiles per tick, 0 keeps the view still
    pub pan_speed: i32,
    /// Ticks between autosaves, 0 disables
    pub autosave_ticks: u64,
}

impl Default for StreamingSection {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            chunk_batch_size: world.chunk_batch_size,
            generation_ring: world.generation_ring,
            view_shift_threshold: world.view_shift_threshold,
            pan_speed: 0,
            autosave_ticks: 0,
        }
    }
}

impl DriverConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `path`, or `sandfall.ron` when no path is given (optional)
    /// 3. Environment variables prefixed with `SANDFALL_` (highest priority)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = DriverConfig::default();
        let file = match path {
            Some(path) => File::with_name(path)
                .format(config::FileFormat::Ron)
                .required(true),
            None => File::with_name("sandfall")
                .format(config::FileFormat::Ron)
                .required(false),
        };

        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("world.width", defaults.world.width as i64)?
            .set_default("world.height", defaults.world.height as i64)?
            .set_default("world.seed", defaults.world.seed as i64)?
            .set_default("world.world_dir", defaults.world.world_dir.to_string_lossy().to_string())?
            .set_default("world.world_name", defaults.world.world_name.clone())?
            .set_default("simulation.ms_per_tick", defaults.simulation.ms_per_tick as i64)?
            .set_default("simulation.ticks", defaults.simulation.ticks as i64)?
            .set_default("simulation.unthrottled", defaults.simulation.unthrottled)?
            .set_default(
                "simulation.temperature_interval",
                defaults.simulation.temperature_interval as i64,
            )?
            .set_default(
                "simulation.temperature_phase",
                defaults.simulation.temperature_phase as i64,
            )?
            .set_default("simulation.mesh_interval", defaults.simulation.mesh_interval as i64)?
            .set_default(
                "simulation.lighting_interval",
                defaults.simulation.lighting_interval as i64,
            )?
            .set_default("simulation.physics_dt", defaults.simulation.physics_dt as f64)?
            .set_default(
                "streaming.chunk_batch_size",
                defaults.streaming.chunk_batch_size as i64,
            )?
            .set_default(
                "streaming.generation_ring",
                defaults.streaming.generation_ring as i64,
            )?
            .set_default(
                "streaming.view_shift_threshold",
                defaults.streaming.view_shift_threshold as i64,
            )?
            .set_default("streaming.pan_speed", defaults.streaming.pan_speed as i64)?
            .set_default(
                "streaming.autosave_ticks",
                defaults.streaming.autosave_ticks as i64,
            )?
            // Layer 2: Config file
            .add_source(file)
            // Layer 3: Environment variables (SANDFALL_WORLD__SEED, etc.)
            .add_source(Environment::with_prefix("SANDFALL").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Engine settings assembled from all three sections
    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            width: self.world.width,
            height: self.world.height,
            seed: self.world.seed,
            world_dir: self.world.world_dir.clone(),
            world_name: self.world.world_name.clone(),
            temperature_interval: self.simulation.temperature_interval,
            temperature_phase: self.simulation.temperature_phase,
            mesh_interval: self.simulation.mesh_interval,
            lighting_interval: self.simulation.lighting_interval,
            physics_dt: self.simulation.physics_dt,
            chunk_batch_size: self.streaming.chunk_batch_size,
            generation_ring: self.streaming.generation_ring,
            view_shift_threshold: self.streaming.view_shift_threshold,
            ..WorldConfig::default()
        }
    }
}
