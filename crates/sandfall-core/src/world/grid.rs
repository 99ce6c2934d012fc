//! Tile grid - the single source of truth for cell state
//!
//! Every layer is a dense `x + y * width` array. Mutators write the cell and
//! set its dirty bit in the same call; only the frame-buffer stage clears
//! dirty bits once it has consumed them.

use serde::{Deserialize, Serialize};

use super::error::{WorldError, try_alloc};
use crate::simulation::{MaterialInstance, Materials, PhysicsType};

/// Dense multi-layer tile storage over a fixed-size window of the world
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<MaterialInstance>,
    layer2: Vec<MaterialInstance>,
    background: Vec<u32>,
    dirty: Vec<bool>,
    layer2_dirty: Vec<bool>,
    background_dirty: Vec<bool>,
    /// Last lateral direction of a flowing cell (-1, 0, 1); travels with the cell
    flow: Vec<i8>,
}

impl TileGrid {
    /// Allocate an all-air grid. Allocation failure is reported, not aborted.
    pub fn new(width: usize, height: usize) -> Result<Self, WorldError> {
        let cells = width
            .checked_mul(height)
            .filter(|&cells| cells > 0 && width <= i32::MAX as usize && height <= i32::MAX as usize)
            .ok_or(WorldError::InvalidDimensions { width, height })?;

        Ok(Self {
            width,
            height,
            tiles: try_alloc("tiles", cells, MaterialInstance::AIR)?,
            layer2: try_alloc("layer2", cells, MaterialInstance::AIR)?,
            background: try_alloc("background", cells, 0u32)?,
            dirty: try_alloc("dirty", cells, false)?,
            layer2_dirty: try_alloc("layer2 dirty", cells, false)?,
            background_dirty: try_alloc("background dirty", cells, false)?,
            flow: try_alloc("flow", cells, 0i8)?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Flat index of a cell, or None when out of bounds
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(x as usize + y as usize * self.width)
        } else {
            None
        }
    }

    // ---- main layer ----

    pub fn get_tile(&self, x: i32, y: i32) -> Option<MaterialInstance> {
        self.index(x, y).map(|i| self.tiles[i])
    }

    pub fn material_at(&self, x: i32, y: i32) -> Option<u16> {
        self.index(x, y).map(|i| self.tiles[i].material_id)
    }

    pub fn physics_at(&self, x: i32, y: i32, materials: &Materials) -> Option<PhysicsType> {
        self.material_at(x, y).map(|id| materials.physics_type(id))
    }

    /// Write a tile and mark it dirty. Returns false when out of bounds.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: MaterialInstance) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.tiles[i] = tile;
                self.flow[i] = 0;
                self.dirty[i] = true;
                true
            }
            None => {
                log::trace!("set_tile out of bounds at ({}, {})", x, y);
                false
            }
        }
    }

    /// Exchange two cells (with their flow memory) and dirty both
    pub fn swap(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
        match (self.index(x0, y0), self.index(x1, y1)) {
            (Some(a), Some(b)) => {
                self.tiles.swap(a, b);
                self.flow.swap(a, b);
                self.dirty[a] = true;
                self.dirty[b] = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_dirty(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.dirty[i])
    }

    pub fn mark_dirty(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.dirty[i] = true;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
        self.layer2_dirty.fill(true);
        self.background_dirty.fill(true);
    }

    pub fn flow_at(&self, x: i32, y: i32) -> i8 {
        self.index(x, y).map_or(0, |i| self.flow[i])
    }

    pub fn set_flow(&mut self, x: i32, y: i32, dir: i8) {
        if let Some(i) = self.index(x, y) {
            self.flow[i] = dir.signum();
        }
    }

    /// Temperature is rendered from its own layer flag, so this leaves the
    /// cell's dirty bit alone.
    pub(crate) fn set_temperature_at(&mut self, index: usize, temperature: i32) {
        if let Some(tile) = self.tiles.get_mut(index) {
            tile.temperature = temperature;
        }
    }

    // ---- layer 2 / background color ----

    pub fn get_layer2(&self, x: i32, y: i32) -> Option<MaterialInstance> {
        self.index(x, y).map(|i| self.layer2[i])
    }

    pub fn set_layer2(&mut self, x: i32, y: i32, tile: MaterialInstance) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.layer2[i] = tile;
                self.layer2_dirty[i] = true;
                true
            }
            None => false,
        }
    }

    pub fn get_background(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.background[i])
    }

    pub fn set_background(&mut self, x: i32, y: i32, color: u32) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.background[i] = color;
                self.background_dirty[i] = true;
                true
            }
            None => false,
        }
    }

    // ---- raw views for the frame-buffer stage ----

    pub fn tiles(&self) -> &[MaterialInstance] {
        &self.tiles
    }

    pub fn layer2(&self) -> &[MaterialInstance] {
        &self.layer2
    }

    pub fn background(&self) -> &[u32] {
        &self.background
    }

    pub fn dirty(&self) -> &[bool] {
        &self.dirty
    }

    pub fn layer2_dirty(&self) -> &[bool] {
        &self.layer2_dirty
    }

    pub fn background_dirty(&self) -> &[bool] {
        &self.background_dirty
    }

    /// Consumer side: forget main-layer changes once they have been drained
    pub fn clear_dirty(&mut self) {
        self.dirty.fill(false);
    }

    pub fn clear_layer2_dirty(&mut self) {
        self.layer2_dirty.fill(false);
    }

    pub fn clear_background_dirty(&mut self) {
        self.background_dirty.fill(false);
    }

    pub fn count_material(&self, material_id: u16) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.material_id == material_id)
            .count()
    }

    // ---- block transfer (chunk merge / unload, carving) ----

    /// Write a block with its top-left corner at grid `(x0, y0)`, clipped to
    /// the grid. Every written cell is dirtied.
    pub fn write_block(&mut self, x0: i32, y0: i32, block: &TileBlock) {
        if !block.is_consistent() {
            log::error!(
                "Refusing to write {}x{} block with mismatched layers at ({}, {})",
                block.width,
                block.height,
                x0,
                y0
            );
            return;
        }
        for by in 0..block.height {
            for bx in 0..block.width {
                let (x, y) = (x0 + bx as i32, y0 + by as i32);
                let Some(i) = self.index(x, y) else {
                    continue;
                };
                let j = bx + by * block.width;
                self.tiles[i] = block.tiles[j];
                self.layer2[i] = block.layer2[j];
                self.background[i] = block.background[j];
                self.flow[i] = 0;
                self.dirty[i] = true;
                self.layer2_dirty[i] = true;
                self.background_dirty[i] = true;
            }
        }
    }

    /// Copy a `width × height` block starting at grid `(x0, y0)`. Cells
    /// outside the grid read as air.
    pub fn read_block(&self, x0: i32, y0: i32, width: usize, height: usize) -> TileBlock {
        let mut block = TileBlock::new(width, height);
        for by in 0..height {
            for bx in 0..width {
                if let Some(i) = self.index(x0 + bx as i32, y0 + by as i32) {
                    let j = bx + by * width;
                    block.tiles[j] = self.tiles[i];
                    block.layer2[j] = self.layer2[i];
                    block.background[j] = self.background[i];
                }
            }
        }
        block
    }

    /// Move all content by `(-dx, -dy)` as the window slides by `(dx, dy)`.
    ///
    /// Layers rotate in parallel on the pool; exposed strips are cleared to
    /// air and dirtied so the next refresh repaints them.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let tiles = &mut self.tiles[..];
        let layer2 = &mut self.layer2[..];
        let background = &mut self.background[..];
        let dirty = &mut self.dirty[..];
        let layer2_dirty = &mut self.layer2_dirty[..];
        let background_dirty = &mut self.background_dirty[..];
        let flow = &mut self.flow[..];

        rayon::scope(|s| {
            s.spawn(move |_| shift_layer(tiles, w, h, dx, dy, MaterialInstance::AIR));
            s.spawn(move |_| shift_layer(layer2, w, h, dx, dy, MaterialInstance::AIR));
            s.spawn(move |_| shift_layer(background, w, h, dx, dy, 0));
            s.spawn(move |_| shift_layer(dirty, w, h, dx, dy, true));
            s.spawn(move |_| shift_layer(layer2_dirty, w, h, dx, dy, true));
            s.spawn(move |_| shift_layer(background_dirty, w, h, dx, dy, true));
            s.spawn(move |_| shift_layer(flow, w, h, dx, dy, 0));
        });
    }
}

/// Slide a `width × height` layer so that cell `(x, y)` lands on
/// `(x - dx, y - dy)`, filling the exposed strips with `fill`.
pub fn shift_layer<T: Copy + Send>(
    buf: &mut [T],
    width: usize,
    height: usize,
    dx: i32,
    dy: i32,
    fill: T,
) {
    if dx.unsigned_abs() as usize >= width || dy.unsigned_abs() as usize >= height {
        buf.fill(fill);
        return;
    }

    let delta = dx as isize + dy as isize * width as isize;
    if delta > 0 {
        buf.rotate_left(delta as usize);
    } else if delta < 0 {
        buf.rotate_right(delta.unsigned_abs());
    }

    let cols = if dx > 0 {
        width - dx as usize..width
    } else {
        0..dx.unsigned_abs() as usize
    };
    if !cols.is_empty() {
        for row in buf.chunks_mut(width) {
            row[cols.clone()].fill(fill);
        }
    }

    let rows = if dy > 0 {
        height - dy as usize..height
    } else {
        0..dy.unsigned_abs() as usize
    };
    buf[rows.start * width..rows.end * width].fill(fill);
}

/// Owned rectangular copy of tile data: a chunk's contents while it is
/// outside the grid, or a rigid body's local tiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileBlock {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<MaterialInstance>,
    pub layer2: Vec<MaterialInstance>,
    pub background: Vec<u32>,
}

impl TileBlock {
    pub fn new(width: usize, height: usize) -> Self {
        let cells = width * height;
        Self {
            width,
            height,
            tiles: vec![MaterialInstance::AIR; cells],
            layer2: vec![MaterialInstance::AIR; cells],
            background: vec![0; cells],
        }
    }

    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            Some(x as usize + y as usize * self.width)
        } else {
            None
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<MaterialInstance> {
        self.index(x, y).map(|i| self.tiles[i])
    }

    pub fn set(&mut self, x: i32, y: i32, tile: MaterialInstance) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn count_non_air(&self) -> usize {
        self.tiles.iter().filter(|t| !t.is_air()).count()
    }

    /// Every layer holds exactly `width * height` cells
    pub fn is_consistent(&self) -> bool {
        let cells = self.width * self.height;
        self.tiles.len() == cells && self.layer2.len() == cells && self.background.len() == cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::MaterialId;

    #[test]
    fn test_write_block_skips_mismatched_layers() {
        let mut grid = TileGrid::new(8, 8).unwrap();
        let mut block = TileBlock::new(4, 4);
        block.set(0, 0, sand());
        block.tiles.truncate(3);
        assert!(!block.is_consistent());

        grid.write_block(0, 0, &block);
        assert_eq!(grid.count_material(MaterialId::SAND), 0);
    }

    fn sand() -> MaterialInstance {
        MaterialInstance {
            material_id: MaterialId::SAND,
            color: 0xc2b280,
            temperature: 0,
        }
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(matches!(
            TileGrid::new(0, 10),
            Err(WorldError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_new_grid_is_air_and_clean() {
        let grid = TileGrid::new(8, 4).expect("grid");
        assert_eq!(grid.len(), 32);
        assert!(grid.tiles().iter().all(|t| t.is_air()));
        assert!(grid.dirty().iter().all(|d| !d));
    }

    #[test]
    fn test_set_tile_marks_dirty() {
        let mut grid = TileGrid::new(8, 8).expect("grid");
        assert!(grid.set_tile(3, 4, sand()));
        assert!(grid.is_dirty(3, 4));
        assert!(!grid.is_dirty(4, 4));
        assert_eq!(grid.material_at(3, 4), Some(MaterialId::SAND));
    }

    #[test]
    fn test_out_of_bounds_is_guarded() {
        let mut grid = TileGrid::new(8, 8).expect("grid");
        assert!(!grid.set_tile(-1, 0, sand()));
        assert!(!grid.set_tile(8, 0, sand()));
        assert_eq!(grid.get_tile(0, 8), None);
        assert!(!grid.swap(0, 0, 0, -1));
    }

    #[test]
    fn test_swap_moves_flow_and_dirties_both() {
        let mut grid = TileGrid::new(4, 4).expect("grid");
        grid.set_tile(1, 1, sand());
        grid.set_flow(1, 1, 1);
        grid.clear_dirty();

        assert!(grid.swap(1, 1, 2, 1));
        assert_eq!(grid.material_at(2, 1), Some(MaterialId::SAND));
        assert_eq!(grid.flow_at(2, 1), 1);
        assert_eq!(grid.flow_at(1, 1), 0);
        assert!(grid.is_dirty(1, 1));
        assert!(grid.is_dirty(2, 1));
    }

    #[test]
    fn test_block_roundtrip() {
        let mut grid = TileGrid::new(16, 16).expect("grid");
        let mut block = TileBlock::new(4, 4);
        block.set(1, 2, sand());
        block.background[0] = 0x112233;

        grid.write_block(5, 6, &block);
        assert_eq!(grid.material_at(6, 8), Some(MaterialId::SAND));
        assert_eq!(grid.get_background(5, 6), Some(0x112233));

        let copy = grid.read_block(5, 6, 4, 4);
        assert_eq!(copy, block);
    }

    #[test]
    fn test_read_block_outside_grid_is_air() {
        let grid = TileGrid::new(4, 4).expect("grid");
        let block = grid.read_block(-10, -10, 3, 3);
        assert_eq!(block.count_non_air(), 0);
    }

    #[test]
    fn test_shift_moves_content_and_clears_exposed() {
        let mut grid = TileGrid::new(8, 8).expect("grid");
        grid.set_tile(5, 6, sand());
        grid.set_tile(0, 0, sand());
        grid.clear_dirty();

        grid.shift(2, 3);

        assert_eq!(grid.material_at(3, 3), Some(MaterialId::SAND));
        // (0, 0) fell off the window
        assert_eq!(grid.count_material(MaterialId::SAND), 1);
        // exposed right columns and bottom rows are dirty air
        assert!(grid.is_dirty(7, 0));
        assert!(grid.is_dirty(0, 7));
        assert!(!grid.is_dirty(1, 1));
    }

    #[test]
    fn test_shift_negative() {
        let mut grid = TileGrid::new(8, 8).expect("grid");
        grid.set_tile(1, 1, sand());
        grid.shift(-1, -1);
        assert_eq!(grid.material_at(2, 2), Some(MaterialId::SAND));
        assert_eq!(grid.material_at(1, 1), Some(MaterialId::AIR));
    }

    #[test]
    fn test_shift_beyond_size_clears_everything() {
        let mut grid = TileGrid::new(4, 4).expect("grid");
        grid.set_tile(1, 1, sand());
        grid.shift(10, 0);
        assert_eq!(grid.count_material(MaterialId::SAND), 0);
    }
}
