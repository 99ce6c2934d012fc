//! Material definitions and registry

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interaction::MaterialInteraction;

/// Upper bound on registered materials. Interaction tables are dense
/// `MAX_MATERIALS`-bounded arrays, so ids at or above this are rejected.
pub const MAX_MATERIALS: usize = 256;

/// Built-in material IDs
pub struct MaterialId;

impl MaterialId {
    pub const AIR: u16 = 0;
    pub const STONE: u16 = 1;
    pub const DIRT: u16 = 2;
    pub const GRASS: u16 = 3;
    pub const SAND: u16 = 4;
    pub const WATER: u16 = 5;
    pub const OIL: u16 = 6;
    pub const LAVA: u16 = 7;
    pub const FIRE: u16 = 8;
    pub const SMOKE: u16 = 9;
    pub const STEAM: u16 = 10;
    pub const WOOD: u16 = 11;
    pub const GLASS: u16 = 12;
    pub const BEDROCK: u16 = 13;
    pub const ORE: u16 = 14;
    pub const ICE: u16 = 15;

    /// Transient footprint marker written under entities
    pub const OBJECT: u16 = 16;
    /// Solid carved from an arbitrary pixel source (rigid body debris)
    pub const GENERIC_SOLID: u16 = 17;
}

/// How a material behaves in the automaton
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicsType {
    /// Empty space
    Air,
    /// Static; only moves as part of a rigid body
    Solid,
    /// Falls, piles up diagonally
    Sand,
    /// Flows and seeks level
    Soup,
    /// Rises and spreads
    Gas,
    /// Footprint of an entity, immobile
    Object,
}

impl PhysicsType {
    /// Whether particles and entities treat this as blocking
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            PhysicsType::Solid | PhysicsType::Sand | PhysicsType::Soup | PhysicsType::Object
        )
    }

    /// Whether the automaton moves cells of this type
    pub fn is_mobile(self) -> bool {
        matches!(self, PhysicsType::Sand | PhysicsType::Soup | PhysicsType::Gas)
    }
}

/// Definition of a material's properties
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDef {
    pub id: u16,
    pub name: String,
    pub physics_type: PhysicsType,

    /// Base color as 0xRRGGBB
    pub color: u32,
    pub alpha: u8,

    /// Buoyancy ordering among sand, soups and gases
    pub density: f32,
    /// Lateral spread distance per tick for soups and gases
    pub dispersion: u8,

    // Lighting
    /// Light radius in tiles (0 = not emissive)
    pub emit_radius: u8,
    /// Light color as 0xRRGGBB
    pub emit_color: u32,

    // Thermal
    /// Added to the cell temperature on every temperature pass. Only
    /// emissive materials act as heat sources.
    pub heat_bias: i32,
    /// Temperature of freshly created instances
    pub base_temperature: i32,
}

impl Default for MaterialDef {
    fn default() -> Self {
        Self {
            id: MaterialId::AIR,
            name: "air".to_string(),
            physics_type: PhysicsType::Air,
            color: 0x000000,
            alpha: 0,
            density: 0.0,
            dispersion: 0,
            emit_radius: 0,
            emit_color: 0,
            heat_bias: 0,
            base_temperature: 0,
        }
    }
}

impl MaterialDef {
    pub fn is_emissive(&self) -> bool {
        self.emit_radius > 0
    }
}

/// Registry construction failures
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("material id {id} exceeds the registry bound of {max}")]
    IdOutOfRange { id: u16, max: usize },

    #[error("material id {0} registered twice")]
    Duplicate(u16),

    #[error("material id {0} is missing; ids must be contiguous from 0")]
    Gap(u16),

    #[error("material 0 must be registered with physics type Air")]
    AirNotFirst,

    #[error("interaction {actor} -> {neighbour} references unregistered material {missing}")]
    UnknownMaterial {
        actor: u16,
        neighbour: u16,
        missing: u16,
    },
}

/// Collects material definitions and interaction rules, then validates them
/// into an immutable [`Materials`] registry.
#[derive(Default)]
pub struct MaterialsBuilder {
    defs: Vec<Option<MaterialDef>>,
    rules: Vec<(u16, u16, MaterialInteraction)>,
}

impl MaterialsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, material: MaterialDef) -> Result<&mut Self, RegistryError> {
        let id = material.id as usize;
        if id >= MAX_MATERIALS {
            return Err(RegistryError::IdOutOfRange {
                id: material.id,
                max: MAX_MATERIALS,
            });
        }

        if self.defs.len() <= id {
            self.defs.resize(id + 1, None);
        }
        if self.defs[id].is_some() {
            return Err(RegistryError::Duplicate(material.id));
        }

        self.defs[id] = Some(material);
        Ok(self)
    }

    /// Append a rule for cells of `actor` that neighbour `neighbour`.
    /// Rules for the same pair are tried in insertion order.
    pub fn interact(
        &mut self,
        actor: u16,
        neighbour: u16,
        rule: MaterialInteraction,
    ) -> &mut Self {
        self.rules.push((actor, neighbour, rule));
        self
    }

    pub fn build(&self) -> Result<Materials, RegistryError> {
        let mut defs = Vec::with_capacity(self.defs.len());
        for (id, def) in self.defs.iter().enumerate() {
            match def {
                Some(def) => defs.push(def.clone()),
                None => return Err(RegistryError::Gap(id as u16)),
            }
        }

        match defs.first() {
            Some(air) if air.physics_type == PhysicsType::Air => {}
            _ => return Err(RegistryError::AirNotFirst),
        }

        let count = defs.len();
        let mut interactions = vec![Vec::new(); count * count];
        let mut interactive = vec![false; count];

        for &(actor, neighbour, rule) in &self.rules {
            for id in [actor, neighbour, rule.material] {
                if id as usize >= count {
                    return Err(RegistryError::UnknownMaterial {
                        actor,
                        neighbour,
                        missing: id,
                    });
                }
            }
            interactions[actor as usize * count + neighbour as usize].push(rule);
            interactive[actor as usize] = true;
        }

        log::debug!(
            "Material registry built: {} materials, {} interaction rules",
            count,
            self.rules.len()
        );

        Ok(Materials {
            defs,
            interactions,
            interactive,
        })
    }
}

/// Immutable registry of all materials and their interaction tables
pub struct Materials {
    defs: Vec<MaterialDef>,
    /// Dense `actor * len + neighbour` table of ordered rules
    interactions: Vec<Vec<MaterialInteraction>>,
    interactive: Vec<bool>,
}

impl Materials {
    /// Registry with the built-in catalogue and its default interactions
    pub fn new() -> Self {
        match Self::default_builder().build() {
            Ok(materials) => materials,
            Err(e) => {
                log::error!("Built-in material catalogue is invalid: {}", e);
                Self::air_only()
            }
        }
    }

    fn air_only() -> Self {
        Self {
            defs: vec![MaterialDef::default()],
            interactions: vec![Vec::new()],
            interactive: vec![false],
        }
    }

    /// Builder pre-populated with the built-in catalogue, for callers that
    /// want to add their own materials on top
    pub fn default_builder() -> MaterialsBuilder {
        let mut builder = MaterialsBuilder::new();
        if let Err(e) = register_defaults(&mut builder) {
            log::error!("Failed to register built-in materials: {}", e);
        }
        add_default_interactions(&mut builder);
        builder
    }

    /// Get material definition by ID (unknown ids resolve to air)
    pub fn get(&self, id: u16) -> &MaterialDef {
        self.defs.get(id as usize).unwrap_or(&self.defs[0])
    }

    pub fn physics_type(&self, id: u16) -> PhysicsType {
        self.get(id).physics_type
    }

    /// Ordered rules for `actor` cells next to `neighbour` cells
    pub fn interactions(&self, actor: u16, neighbour: u16) -> &[MaterialInteraction] {
        let count = self.defs.len();
        let (a, n) = (actor as usize, neighbour as usize);
        if a >= count || n >= count {
            return &[];
        }
        &self.interactions[a * count + n]
    }

    pub fn has_interactions(&self, id: u16) -> bool {
        self.interactive.get(id as usize).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialDef> {
        self.defs.iter()
    }
}

impl Default for Materials {
    fn default() -> Self {
        Self::new()
    }
}

fn register_defaults(builder: &mut MaterialsBuilder) -> Result<(), RegistryError> {
    builder.register(MaterialDef::default())?;

    builder.register(MaterialDef {
        id: MaterialId::STONE,
        name: "stone".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x7f7f7f,
        alpha: 255,
        density: 2.5,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::DIRT,
        name: "dirt".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x6b4a2b,
        alpha: 255,
        density: 1.6,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::GRASS,
        name: "grass".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x3f8f2f,
        alpha: 255,
        density: 1.2,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::SAND,
        name: "sand".to_string(),
        physics_type: PhysicsType::Sand,
        color: 0xc2b280,
        alpha: 255,
        density: 1.5,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::WATER,
        name: "water".to_string(),
        physics_type: PhysicsType::Soup,
        color: 0x2c5fd4,
        alpha: 160,
        density: 1.0,
        dispersion: 5,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::OIL,
        name: "oil".to_string(),
        physics_type: PhysicsType::Soup,
        color: 0x3a2f1f,
        alpha: 220,
        density: 0.8,
        dispersion: 3,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::LAVA,
        name: "lava".to_string(),
        physics_type: PhysicsType::Soup,
        color: 0xff5a00,
        alpha: 255,
        density: 2.2,
        dispersion: 1,
        emit_radius: 12,
        emit_color: 0xff7a20,
        heat_bias: 40,
        base_temperature: 900,
    })?;

    builder.register(MaterialDef {
        id: MaterialId::FIRE,
        name: "fire".to_string(),
        physics_type: PhysicsType::Gas,
        color: 0xff9a1a,
        alpha: 220,
        density: 0.0005,
        dispersion: 1,
        emit_radius: 10,
        emit_color: 0xffb040,
        heat_bias: 25,
        base_temperature: 600,
    })?;

    builder.register(MaterialDef {
        id: MaterialId::SMOKE,
        name: "smoke".to_string(),
        physics_type: PhysicsType::Gas,
        color: 0x404040,
        alpha: 140,
        density: 0.0008,
        dispersion: 2,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::STEAM,
        name: "steam".to_string(),
        physics_type: PhysicsType::Gas,
        color: 0xdcdcdc,
        alpha: 120,
        density: 0.0006,
        dispersion: 3,
        base_temperature: 120,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::WOOD,
        name: "wood".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x7a5230,
        alpha: 255,
        density: 0.7,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::GLASS,
        name: "glass".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0xc8e6f0,
        alpha: 120,
        density: 2.4,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::BEDROCK,
        name: "bedrock".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x202020,
        alpha: 255,
        density: 5.0,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::ORE,
        name: "ore".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0xb87333,
        alpha: 255,
        density: 3.5,
        emit_radius: 2,
        emit_color: 0x402010,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::ICE,
        name: "ice".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0xa5d8ff,
        alpha: 200,
        density: 0.9,
        base_temperature: -200,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::OBJECT,
        name: "object".to_string(),
        physics_type: PhysicsType::Object,
        ..Default::default()
    })?;

    builder.register(MaterialDef {
        id: MaterialId::GENERIC_SOLID,
        name: "generic_solid".to_string(),
        physics_type: PhysicsType::Solid,
        color: 0x808080,
        alpha: 255,
        density: 2.0,
        ..Default::default()
    })?;

    Ok(())
}

fn add_default_interactions(builder: &mut MaterialsBuilder) {
    use crate::materials::MaterialId as M;

    builder
        // Lava quenched by water hardens, the water boils off
        .interact(M::LAVA, M::WATER, MaterialInteraction::transform(M::STONE).probability(0.5))
        .interact(M::WATER, M::LAVA, MaterialInteraction::transform(M::STEAM).probability(0.5))
        // Burning
        .interact(M::WOOD, M::FIRE, MaterialInteraction::transform(M::FIRE).probability(0.05))
        .interact(M::OIL, M::FIRE, MaterialInteraction::transform(M::FIRE).probability(0.2))
        .interact(M::LAVA, M::WOOD, MaterialInteraction::spawn(M::FIRE).offset(0, -1).probability(0.1))
        .interact(M::WOOD, M::LAVA, MaterialInteraction::transform(M::FIRE).probability(0.02))
        // Extinguishing
        .interact(M::FIRE, M::WATER, MaterialInteraction::transform(M::SMOKE).probability(0.8))
        .interact(M::WATER, M::FIRE, MaterialInteraction::transform(M::STEAM).probability(0.1))
        // Decay in open air
        .interact(M::FIRE, M::AIR, MaterialInteraction::transform(M::SMOKE).probability(0.02))
        .interact(M::SMOKE, M::AIR, MaterialInteraction::transform(M::AIR).probability(0.005))
        .interact(M::STEAM, M::AIR, MaterialInteraction::transform(M::WATER).probability(0.002))
        // Melting
        .interact(M::ICE, M::LAVA, MaterialInteraction::transform(M::WATER).probability(0.2))
        .interact(M::ICE, M::FIRE, MaterialInteraction::transform(M::WATER).probability(0.1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionKind;

    #[test]
    fn test_default_catalogue_builds() {
        let materials = MaterialsBuilder::default();
        assert!(materials.build().is_err()); // empty builder has no air

        let materials = Materials::default_builder().build().expect("defaults valid");
        assert_eq!(materials.len(), MaterialId::GENERIC_SOLID as usize + 1);
        assert_eq!(materials.get(MaterialId::SAND).name, "sand");
        assert_eq!(materials.physics_type(MaterialId::WATER), PhysicsType::Soup);
        assert_eq!(materials.physics_type(MaterialId::OBJECT), PhysicsType::Object);
    }

    #[test]
    fn test_unknown_id_falls_back_to_air() {
        let materials = Materials::new();
        assert_eq!(materials.get(999).id, MaterialId::AIR);
        assert_eq!(materials.physics_type(999), PhysicsType::Air);
    }

    #[test]
    fn test_register_rejects_out_of_range_id() {
        let mut builder = MaterialsBuilder::new();
        let result = builder.register(MaterialDef {
            id: MAX_MATERIALS as u16,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(RegistryError::IdOutOfRange { max: MAX_MATERIALS, .. })
        ));
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut builder = MaterialsBuilder::new();
        builder.register(MaterialDef::default()).expect("air");
        assert_eq!(
            builder.register(MaterialDef::default()).err(),
            Some(RegistryError::Duplicate(0))
        );
    }

    #[test]
    fn test_build_rejects_gap() {
        let mut builder = MaterialsBuilder::new();
        builder.register(MaterialDef::default()).expect("air");
        builder
            .register(MaterialDef {
                id: 2,
                name: "floating".to_string(),
                physics_type: PhysicsType::Solid,
                ..Default::default()
            })
            .expect("id 2");
        assert_eq!(builder.build().err(), Some(RegistryError::Gap(1)));
    }

    #[test]
    fn test_build_rejects_non_air_zero() {
        let mut builder = MaterialsBuilder::new();
        builder
            .register(MaterialDef {
                physics_type: PhysicsType::Solid,
                ..Default::default()
            })
            .expect("id 0");
        assert_eq!(builder.build().err(), Some(RegistryError::AirNotFirst));
    }

    #[test]
    fn test_build_rejects_unknown_rule_target() {
        let mut builder = MaterialsBuilder::new();
        builder.register(MaterialDef::default()).expect("air");
        builder.interact(0, 0, MaterialInteraction::spawn(42));
        assert_eq!(
            builder.build().err(),
            Some(RegistryError::UnknownMaterial {
                actor: 0,
                neighbour: 0,
                missing: 42
            })
        );
    }

    #[test]
    fn test_interactions_are_ordered_per_pair() {
        let materials = Materials::new();
        let rules = materials.interactions(MaterialId::LAVA, MaterialId::WATER);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, InteractionKind::Transform);
        assert_eq!(rules[0].material, MaterialId::STONE);

        assert!(materials.has_interactions(MaterialId::FIRE));
        assert!(!materials.has_interactions(MaterialId::STONE));
        assert!(materials
            .interactions(MaterialId::STONE, MaterialId::WATER)
            .is_empty());
        assert!(materials.interactions(500, 0).is_empty());
    }

    #[test]
    fn test_custom_material_on_top_of_defaults() {
        let mut builder = Materials::default_builder();
        builder
            .register(MaterialDef {
                id: MaterialId::GENERIC_SOLID + 1,
                name: "gravel".to_string(),
                physics_type: PhysicsType::Sand,
                color: 0x9a9a9a,
                alpha: 255,
                density: 1.8,
                ..Default::default()
            })
            .expect("gravel");
        let materials = builder.build().expect("valid");
        assert_eq!(materials.get(MaterialId::GENERIC_SOLID + 1).name, "gravel");
    }

    #[test]
    fn test_emissive_materials() {
        let materials = Materials::new();
        assert!(materials.get(MaterialId::LAVA).is_emissive());
        assert!(materials.get(MaterialId::FIRE).is_emissive());
        assert!(!materials.get(MaterialId::STONE).is_emissive());
    }
}
