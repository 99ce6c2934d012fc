//! Material simulation data for Sandfall
//!
//! This crate provides the foundational data types for the world engine:
//! - Material definitions and registry (MaterialId, MaterialDef, Materials)
//! - Physics categories (PhysicsType)
//! - Interaction rules (MaterialInteraction, InteractionKind)
//! - Tile content (MaterialInstance) and chunk dimensions

mod interaction;
mod materials;
mod tile;

pub use interaction::{InteractionKind, MaterialInteraction};
pub use materials::{
    MAX_MATERIALS, MaterialDef, MaterialId, Materials, MaterialsBuilder, PhysicsType,
    RegistryError,
};
pub use tile::{
    CHUNK_AREA, CHUNK_H, CHUNK_W, MaterialInstance, TEMPERATURE_MAX, TEMPERATURE_MIN,
};
