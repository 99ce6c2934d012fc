//! Solid tile → collision polygon extraction
//!
//! Boundary edges of solid cells are chained into closed loops with the
//! solid side on the right, then collinear runs are merged. Diagonal-only
//! contacts are split into separate loops. The result is a pure function of
//! the solid mask, so re-extracting unchanged tiles yields identical output.

use std::hash::{Hash, Hasher};

use ahash::AHashMap;
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::grid::{TileBlock, TileGrid};
use super::zone::Zone;
use crate::simulation::{Materials, PhysicsType};

/// Closed loop of vertices on cell corners; the last point joins the first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Vec2>,
}

impl Polygon {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area (positive for solid-on-the-right loops in y-down space)
    pub fn signed_area(&self) -> f32 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum * 0.5
    }

    /// Even-odd point containment test
    pub fn contains(&self, p: Vec2) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let (a, b) = (self.points[i], self.points[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Edge segments as index pairs, for polyline colliders
    pub fn segment_indices(&self, base: u32) -> impl Iterator<Item = [u32; 2]> + '_ {
        let n = self.points.len() as u32;
        (0..n).map(move |i| [base + i, base + (i + 1) % n])
    }
}

/// Whether `loops` cover the point under the even-odd rule
pub fn loops_contain(loops: &[Polygon], p: Vec2) -> bool {
    loops.iter().filter(|poly| poly.contains(p)).count() % 2 == 1
}

/// Solid mask of a grid region, row-major over the region
pub fn solid_mask(grid: &TileGrid, materials: &Materials, region: &Zone) -> Vec<bool> {
    region
        .cells()
        .map(|(x, y)| grid.physics_at(x, y, materials) == Some(PhysicsType::Solid))
        .collect()
}

/// Cache key for a region's solid mask
pub fn mask_key(region: &Zone, mask: &[bool]) -> u64 {
    let mut hasher = ahash::AHasher::default();
    region.hash(&mut hasher);
    mask.hash(&mut hasher);
    hasher.finish()
}

/// Extract collision loops for the solid cells of a grid region, in grid coordinates
pub fn extract_solid_loops(grid: &TileGrid, region: &Zone, materials: &Materials) -> Vec<Polygon> {
    if region.is_empty() {
        return Vec::new();
    }
    let mask = solid_mask(grid, materials, region);
    loops_from_mask(region, &mask)
}

/// Same as [`extract_solid_loops`] for a mask already sampled from `region`
pub fn loops_from_mask(region: &Zone, mask: &[bool]) -> Vec<Polygon> {
    trace_loops(mask, region.w as usize, region.h as usize)
        .into_iter()
        .map(|points| Polygon {
            points: points
                .into_iter()
                .map(|p| Vec2::new((p.x + region.x) as f32, (p.y + region.y) as f32))
                .collect(),
        })
        .collect()
}

/// Outline loops of a block's non-air cells, in block-local coordinates
pub fn extract_block(block: &TileBlock) -> Vec<Polygon> {
    let mask: Vec<bool> = block.tiles.iter().map(|t| !t.is_air()).collect();
    trace_loops(&mask, block.width, block.height)
        .into_iter()
        .map(|points| Polygon {
            points: points
                .into_iter()
                .map(|p| Vec2::new(p.x as f32, p.y as f32))
                .collect(),
        })
        .collect()
}

/// Chain boundary edges of `mask` into simplified closed loops
pub fn trace_loops(mask: &[bool], width: usize, height: usize) -> Vec<Vec<IVec2>> {
    let solid = |x: i32, y: i32| -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && mask[x as usize + y as usize * width]
    };

    // Directed boundary edges, solid on the right (y grows downward)
    let mut order: Vec<(IVec2, IVec2)> = Vec::new();
    let mut outgoing: AHashMap<IVec2, SmallVec<[IVec2; 2]>> = AHashMap::new();
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            if !solid(x, y) {
                continue;
            }
            let mut edges: SmallVec<[(IVec2, IVec2); 4]> = SmallVec::new();
            if !solid(x, y - 1) {
                edges.push((IVec2::new(x, y), IVec2::new(x + 1, y)));
            }
            if !solid(x + 1, y) {
                edges.push((IVec2::new(x + 1, y), IVec2::new(x + 1, y + 1)));
            }
            if !solid(x, y + 1) {
                edges.push((IVec2::new(x + 1, y + 1), IVec2::new(x, y + 1)));
            }
            if !solid(x - 1, y) {
                edges.push((IVec2::new(x, y + 1), IVec2::new(x, y)));
            }
            for (a, b) in edges {
                outgoing.entry(a).or_default().push(b);
                order.push((a, b));
            }
        }
    }

    let mut loops = Vec::new();
    for (start, first) in order {
        if !take_edge(&mut outgoing, start, first) {
            continue;
        }

        let mut points = vec![start];
        let mut dir = first - start;
        let mut cur = first;
        while cur != start {
            points.push(cur);
            let Some(next) = next_edge(&mut outgoing, cur, dir) else {
                log::warn!("[MESH] Open boundary at {:?}, dropping loop", cur);
                points.clear();
                break;
            };
            dir = next - cur;
            cur = next;
        }

        if points.len() >= 4 {
            loops.push(merge_collinear(points));
        }
    }

    // Order by lowest (topmost, then leftmost) vertex
    loops.sort_by_key(|l| l.iter().map(|p| (p.y, p.x)).min());
    loops
}

fn take_edge(outgoing: &mut AHashMap<IVec2, SmallVec<[IVec2; 2]>>, from: IVec2, to: IVec2) -> bool {
    match outgoing.get_mut(&from) {
        Some(ends) => match ends.iter().position(|&e| e == to) {
            Some(i) => {
                ends.remove(i);
                true
            }
            None => false,
        },
        None => false,
    }
}

/// Pick the continuation at `at`, preferring a right turn so that cells
/// touching only diagonally end up in separate loops
fn next_edge(
    outgoing: &mut AHashMap<IVec2, SmallVec<[IVec2; 2]>>,
    at: IVec2,
    dir: IVec2,
) -> Option<IVec2> {
    let right = IVec2::new(-dir.y, dir.x);
    let left = IVec2::new(dir.y, -dir.x);
    for turn in [right, dir, left] {
        let to = at + turn;
        if take_edge(outgoing, at, to) {
            return Some(to);
        }
    }
    None
}

fn merge_collinear(points: Vec<IVec2>) -> Vec<IVec2> {
    let n = points.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        if (cur - prev).perp_dot(next - cur) != 0 {
            out.push(cur);
        }
    }
    out
}
