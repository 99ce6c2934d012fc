//! Simulation systems - materials, temperature, lighting

pub mod light;
pub mod temperature;

// Re-export the material registry so core code has one import path
pub use sandfall_simulation::{
    CHUNK_AREA, CHUNK_H, CHUNK_W, InteractionKind, MAX_MATERIALS, MaterialDef, MaterialId,
    MaterialInstance, MaterialInteraction, Materials, MaterialsBuilder, PhysicsType,
    RegistryError, TEMPERATURE_MAX, TEMPERATURE_MIN,
};

pub use light::LightMap;
pub use temperature::TemperatureField;
