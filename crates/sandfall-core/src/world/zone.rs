//! Axis-aligned tile rectangles used for the load, tick and mesh zones

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::simulation::{CHUNK_H, CHUNK_W};

/// Half-open rectangle `[x, x + w) × [y, y + h)` in tile units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Zone {
    pub const EMPTY: Zone = Zone {
        x: 0,
        y: 0,
        w: 0,
        h: 0,
    };

    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w: w.max(0),
            h: h.max(0),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.w as usize * self.h as usize
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    pub fn contains_zone(&self, other: &Zone) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    pub fn intersects(&self, other: &Zone) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Overlapping region, or an empty zone when disjoint
    pub fn intersect(&self, other: &Zone) -> Zone {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            Zone::EMPTY
        } else {
            Zone::new(x0, y0, x1 - x0, y1 - y0)
        }
    }

    /// Shrink by `margin` on every side (never below zero size)
    pub fn inset(&self, margin: i32) -> Zone {
        let w = (self.w - 2 * margin).max(0);
        let h = (self.h - 2 * margin).max(0);
        Zone::new(self.x + margin, self.y + margin, w, h)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Zone {
        Zone::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Largest per-axis distance between the origins of two zones
    pub fn offset_from(&self, other: &Zone) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Inclusive range of chunk coordinates overlapping this zone
    pub fn chunk_range(&self) -> Option<(IVec2, IVec2)> {
        if self.is_empty() {
            return None;
        }
        let min = IVec2::new(
            self.x.div_euclid(CHUNK_W as i32),
            self.y.div_euclid(CHUNK_H as i32),
        );
        let max = IVec2::new(
            (self.right() - 1).div_euclid(CHUNK_W as i32),
            (self.bottom() - 1).div_euclid(CHUNK_H as i32),
        );
        Some((min, max))
    }

    /// Tile rectangle covered by a chunk
    pub fn of_chunk(cx: i32, cy: i32) -> Zone {
        Zone::new(
            cx * CHUNK_W as i32,
            cy * CHUNK_H as i32,
            CHUNK_W as i32,
            CHUNK_H as i32,
        )
    }

    /// Iterate cells row by row
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.y..self.bottom()).flat_map(move |y| (self.x..self.right()).map(move |x| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_overlapping() {
        let a = Zone::new(0, 0, 10, 10);
        let b = Zone::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Zone::new(5, 5, 5, 5));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Zone::new(0, 0, 10, 10);
        let b = Zone::new(10, 0, 10, 10);
        assert!(a.intersect(&b).is_empty());
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_inset_never_negative() {
        let z = Zone::new(0, 0, 10, 4);
        assert_eq!(z.inset(1), Zone::new(1, 1, 8, 2));
        assert!(z.inset(3).is_empty());
    }

    #[test]
    fn test_contains_zone() {
        let outer = Zone::new(0, 0, 128, 128);
        assert!(outer.contains_zone(&outer.inset(16)));
        assert!(!outer.contains_zone(&outer.translate(1, 0)));
        assert!(outer.contains_zone(&Zone::EMPTY));
    }

    #[test]
    fn test_chunk_range_negative_coordinates() {
        let z = Zone::new(-64, -1, 128, 2);
        let (min, max) = z.chunk_range().expect("non-empty");
        assert_eq!(min, IVec2::new(-1, -1));
        assert_eq!(max, IVec2::new(0, 0));
    }

    #[test]
    fn test_cells_row_major() {
        let z = Zone::new(1, 2, 2, 2);
        let cells: Vec<_> = z.cells().collect();
        assert_eq!(cells, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
    }
}
