//! Declarative material interaction rules

use serde::{Deserialize, Serialize};

/// What an interaction does when it fires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Turn cells of the acting material into `material`
    Transform,
    /// Place `material` into empty cells
    Spawn,
}

/// A single rule in a material's interaction table.
///
/// Rules are keyed by (acting material, neighbouring material). The area a rule
/// affects is a disc of `radius` cells centred on the acting cell shifted by
/// `(offset_x, offset_y)`; radius 0 affects just the centre cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialInteraction {
    pub kind: InteractionKind,
    /// Target material (result of a transform, or the spawned material)
    pub material: u16,
    pub radius: u8,
    pub offset_x: i8,
    pub offset_y: i8,
    /// Chance per tick in `[0, 1]`
    pub probability: f32,
}

impl MaterialInteraction {
    pub fn transform(material: u16) -> Self {
        Self {
            kind: InteractionKind::Transform,
            material,
            radius: 0,
            offset_x: 0,
            offset_y: 0,
            probability: 1.0,
        }
    }

    pub fn spawn(material: u16) -> Self {
        Self {
            kind: InteractionKind::Spawn,
            ..Self::transform(material)
        }
    }

    pub fn radius(mut self, radius: u8) -> Self {
        self.radius = radius;
        self
    }

    pub fn offset(mut self, x: i8, y: i8) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    pub fn probability(mut self, probability: f32) -> Self {
        self.probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Cells (relative to the acting cell) covered by this rule, row-major
    pub fn footprint(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let r = self.radius as i32;
        let (cx, cy) = (self.offset_x as i32, self.offset_y as i32);
        (-r..=r).flat_map(move |dy| {
            (-r..=r)
                .filter(move |dx| dx * dx + dy * dy <= r * r)
                .map(move |dx| (cx + dx, cy + dy))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let rule = MaterialInteraction::spawn(7);
        assert_eq!(rule.kind, InteractionKind::Spawn);
        assert_eq!(rule.material, 7);
        assert_eq!(rule.radius, 0);
        assert_eq!(rule.probability, 1.0);
    }

    #[test]
    fn test_probability_is_clamped() {
        assert_eq!(MaterialInteraction::transform(1).probability(3.0).probability, 1.0);
        assert_eq!(MaterialInteraction::transform(1).probability(-1.0).probability, 0.0);
    }

    #[test]
    fn test_footprint_radius_zero_is_offset_cell() {
        let rule = MaterialInteraction::spawn(1).offset(0, -1);
        let cells: Vec<_> = rule.footprint().collect();
        assert_eq!(cells, vec![(0, -1)]);
    }

    #[test]
    fn test_footprint_radius_one_is_plus_shape() {
        let rule = MaterialInteraction::transform(1).radius(1);
        let cells: Vec<_> = rule.footprint().collect();
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&(0, 0)));
        assert!(cells.contains(&(1, 0)));
        assert!(!cells.contains(&(1, 1)));
    }
}
