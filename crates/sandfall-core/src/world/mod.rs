//! World management - grid, chunks, simulation stages, persistence

mod ca_update;
mod chunk;
mod chunk_manager;
mod chunk_status;
mod config;
mod error;
pub mod events;
mod frame;
pub mod generation;
mod grid;
pub mod mesh;
pub mod particles;
pub mod persistence;
pub mod physics;
pub mod raycasting;
pub mod rigid_body;
pub mod rng_trait;
pub mod stats;
mod tick_driver;
#[allow(clippy::module_inception)]
mod world;
mod zone;

pub use ca_update::{CellularAutomaton, TickReport};
pub use chunk::Chunk;
pub use chunk_manager::{ChunkManager, FrameReport, NO_CHUNK};
pub use chunk_status::{ChunkState, GENERATION_PHASES};
pub use config::WorldConfig;
pub use error::WorldError;
pub use events::{EventQueue, WorldEvent, WorldEventSink};
pub use frame::{FrameBuffers, RefreshSummary, Rgba};
pub use generation::{NeighbourView, WorldGenerator};
pub use grid::{TileBlock, TileGrid};
pub use mesh::Polygon;
pub use particles::{
    HomingTarget, OwnerTag, Particle, ParticleId, ParticleSystem, ParticleTickReport,
};
pub use persistence::{WorldMeta, WorldPersistence, delete_world, load_world_meta};
pub use physics::PhysicsWorld;
pub use raycasting::{for_line, raycast};
pub use rigid_body::{BodyId, BodyKind, BodyShape, CollisionLayers, RigidBody, RigidBodyBridge};
pub use rng_trait::WorldRng;
pub use stats::{CountingStats, NoopStats, SimStats};
pub use tick_driver::{MAX_TICKS_PER_UPDATE, TickDriver};
pub use world::{TickSummary, World};
pub use zone::Zone;
