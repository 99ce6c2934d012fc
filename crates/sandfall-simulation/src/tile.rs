//! Tile content and chunk dimensions
//!
//! Foundational types for the grid-based simulation.

use crate::materials::{MaterialDef, MaterialId};
use serde::{Deserialize, Serialize};

/// Width of a chunk in tiles
pub const CHUNK_W: usize = 64;

/// Height of a chunk in tiles
pub const CHUNK_H: usize = 64;

/// Total tiles in a chunk
pub const CHUNK_AREA: usize = CHUNK_W * CHUNK_H;

/// Lowest representable cell temperature
pub const TEMPERATURE_MIN: i32 = -1024;

/// Highest representable cell temperature
pub const TEMPERATURE_MAX: i32 = 1023;

/// Contents of a single cell.
///
/// Equality compares material and color only; temperature is ambient state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MaterialInstance {
    pub material_id: u16,
    /// Per-cell tint as 0xRRGGBB
    pub color: u32,
    pub temperature: i32,
}

impl MaterialInstance {
    pub const AIR: MaterialInstance = MaterialInstance {
        material_id: MaterialId::AIR,
        color: 0,
        temperature: 0,
    };

    pub fn air() -> Self {
        Self::AIR
    }

    pub fn from_def(def: &MaterialDef) -> Self {
        Self {
            material_id: def.id,
            color: def.color,
            temperature: def.base_temperature,
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color & 0x00ff_ffff;
        self
    }

    pub fn with_temperature(mut self, temperature: i32) -> Self {
        self.temperature = temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
        self
    }

    pub fn is_air(&self) -> bool {
        self.material_id == MaterialId::AIR
    }
}

impl Default for MaterialInstance {
    fn default() -> Self {
        Self::AIR
    }
}

impl PartialEq for MaterialInstance {
    fn eq(&self, other: &Self) -> bool {
        self.material_id == other.material_id && self.color == other.color
    }
}

impl Eq for MaterialInstance {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Materials;

    #[test]
    fn test_default_is_air() {
        assert!(MaterialInstance::default().is_air());
    }

    #[test]
    fn test_equality_ignores_temperature() {
        let materials = Materials::new();
        let a = MaterialInstance::from_def(materials.get(MaterialId::STONE));
        let b = a.with_temperature(500);
        assert_eq!(a, b);
        assert_ne!(a, a.with_color(0x123456));
    }

    #[test]
    fn test_temperature_is_clamped() {
        let t = MaterialInstance::AIR.with_temperature(5000);
        assert_eq!(t.temperature, TEMPERATURE_MAX);
        let t = MaterialInstance::AIR.with_temperature(-5000);
        assert_eq!(t.temperature, TEMPERATURE_MIN);
    }

    #[test]
    fn test_from_def_uses_base_temperature() {
        let materials = Materials::new();
        let lava = MaterialInstance::from_def(materials.get(MaterialId::LAVA));
        assert_eq!(lava.temperature, 900);
        assert_eq!(lava.color, 0xff5a00);
    }
}
