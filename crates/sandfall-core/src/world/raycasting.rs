//! Line traces over tile coordinates

use bresenham::Bresenham;

use super::grid::TileGrid;
use crate::simulation::{MaterialInstance, Materials, PhysicsType};

/// Visit every cell on the line from `(x0, y0)` to `(x1, y1)` inclusive.
///
/// Stops as soon as `visitor` returns true and reports whether it did.
pub fn for_line<F>(x0: i32, y0: i32, x1: i32, y1: i32, mut visitor: F) -> bool
where
    F: FnMut(i32, i32) -> bool,
{
    // Bresenham yields the start point but not the end point
    for (x, y) in Bresenham::new((x0 as isize, y0 as isize), (x1 as isize, y1 as isize)) {
        if visitor(x as i32, y as i32) {
            return true;
        }
    }
    visitor(x1, y1)
}

/// First non-air cell along a line, for aim and ray queries
pub fn raycast(
    grid: &TileGrid,
    materials: &Materials,
    from: (i32, i32),
    to: (i32, i32),
    stop_at: impl Fn(PhysicsType) -> bool,
) -> Option<(i32, i32, MaterialInstance)> {
    let mut hit = None;
    for_line(from.0, from.1, to.0, to.1, |x, y| match grid.get_tile(x, y) {
        Some(tile) if stop_at(materials.physics_type(tile.material_id)) => {
            hit = Some((x, y, tile));
            true
        }
        Some(_) => false,
        // Leaving the grid ends the trace
        None => true,
    });
    hit
}
