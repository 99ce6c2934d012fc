//! RGBA frame buffers handed to an external renderer
//!
//! Each layer mirrors the grid one pixel per cell. Only rows holding dirty
//! cells are repainted; the rows are independent, so they are painted on the
//! rayon pool.

use rayon::prelude::*;

use super::error::{WorldError, try_alloc};
use super::grid::{TileGrid, shift_layer};
use super::particles::ParticleSystem;
use crate::simulation::{MaterialId, MaterialInstance, Materials, TEMPERATURE_MAX, TEMPERATURE_MIN};

pub type Rgba = [u8; 4];

const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// What one refresh repainted
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub main_rows: usize,
    pub layer2_rows: usize,
    pub background_rows: usize,
    pub particles_drawn: usize,
    pub temperature_redrawn: bool,
}

pub struct FrameBuffers {
    width: usize,
    height: usize,
    main: Vec<Rgba>,
    layer2: Vec<Rgba>,
    background: Vec<Rgba>,
    fire: Vec<Rgba>,
    particles: Vec<Rgba>,
    temperature: Vec<Rgba>,
}

fn unpack(color: u32, alpha: u8) -> Rgba {
    [
        ((color >> 16) & 0xff) as u8,
        ((color >> 8) & 0xff) as u8,
        (color & 0xff) as u8,
        alpha,
    ]
}

fn tile_pixel(tile: &MaterialInstance, materials: &Materials) -> Rgba {
    if tile.is_air() {
        TRANSPARENT
    } else {
        unpack(tile.color, materials.get(tile.material_id).alpha)
    }
}

/// Blue (cold) to red (hot)
fn temperature_pixel(t: i32) -> Rgba {
    let span = (TEMPERATURE_MAX - TEMPERATURE_MIN + 1) as f32;
    let f = ((t - TEMPERATURE_MIN) as f32 / span).clamp(0.0, 1.0);
    [(f * 255.0) as u8, 0, ((1.0 - f) * 255.0) as u8, 255]
}

/// Repaint every row of `out` that has a dirty cell. Returns rows touched.
fn paint_dirty_rows<F>(out: &mut [Rgba], dirty: &[bool], width: usize, paint: F) -> usize
where
    F: Fn(usize) -> Rgba + Sync,
{
    out.par_chunks_mut(width)
        .zip(dirty.par_chunks(width))
        .enumerate()
        .map(|(row, (pixels, flags))| {
            if !flags.iter().any(|&d| d) {
                return 0;
            }
            for (x, (px, _)) in pixels
                .iter_mut()
                .zip(flags)
                .enumerate()
                .filter(|(_, (_, d))| **d)
            {
                *px = paint(row * width + x);
            }
            1
        })
        .sum()
}

impl FrameBuffers {
    pub fn new(width: usize, height: usize) -> Result<Self, WorldError> {
        let cells = width * height;
        Ok(Self {
            width,
            height,
            main: try_alloc("main pixels", cells, TRANSPARENT)?,
            layer2: try_alloc("layer2 pixels", cells, TRANSPARENT)?,
            background: try_alloc("background pixels", cells, TRANSPARENT)?,
            fire: try_alloc("fire pixels", cells, TRANSPARENT)?,
            particles: try_alloc("particle pixels", cells, TRANSPARENT)?,
            temperature: try_alloc("temperature pixels", cells, TRANSPARENT)?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn main(&self) -> &[Rgba] {
        &self.main
    }

    pub fn layer2(&self) -> &[Rgba] {
        &self.layer2
    }

    pub fn background(&self) -> &[Rgba] {
        &self.background
    }

    pub fn fire(&self) -> &[Rgba] {
        &self.fire
    }

    pub fn particles(&self) -> &[Rgba] {
        &self.particles
    }

    pub fn temperature(&self) -> &[Rgba] {
        &self.temperature
    }

    /// Bring every layer up to date with the grid and drain its dirty bits
    pub fn refresh(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        particles: &ParticleSystem,
        temperature_dirty: bool,
    ) -> RefreshSummary {
        let width = self.width;
        let mut summary = RefreshSummary::default();
        if grid.width() != width || grid.height() != self.height {
            log::warn!(
                "Frame buffers {}x{} do not match grid {}x{}",
                width,
                self.height,
                grid.width(),
                grid.height()
            );
            return summary;
        }

        {
            let tiles = grid.tiles();
            let layer2 = grid.layer2();
            let background = grid.background();

            summary.main_rows = paint_dirty_rows(&mut self.main, grid.dirty(), width, |i| {
                tile_pixel(&tiles[i], materials)
            });
            paint_dirty_rows(&mut self.fire, grid.dirty(), width, |i| {
                match tiles[i].material_id {
                    MaterialId::FIRE | MaterialId::LAVA => tile_pixel(&tiles[i], materials),
                    _ => TRANSPARENT,
                }
            });
            summary.layer2_rows = paint_dirty_rows(&mut self.layer2, grid.layer2_dirty(), width, |i| {
                tile_pixel(&layer2[i], materials)
            });
            summary.background_rows =
                paint_dirty_rows(&mut self.background, grid.background_dirty(), width, |i| {
                    match background[i] {
                        0 => TRANSPARENT,
                        color => unpack(color, 255),
                    }
                });

            if temperature_dirty {
                self.temperature
                    .par_iter_mut()
                    .zip(tiles.par_iter())
                    .for_each(|(px, tile)| *px = temperature_pixel(tile.temperature));
                summary.temperature_redrawn = true;
            }
        }

        self.particles.fill(TRANSPARENT);
        for p in particles.particles() {
            let (x, y) = p.cell();
            if let Some(i) = grid.index(x, y) {
                self.particles[i] = unpack(p.tile.color, 255);
                summary.particles_drawn += 1;
            }
        }

        grid.clear_dirty();
        grid.clear_layer2_dirty();
        grid.clear_background_dirty();
        summary
    }

    /// Follow a grid shift by `(dx, dy)`
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let main = &mut self.main[..];
        let layer2 = &mut self.layer2[..];
        let background = &mut self.background[..];
        let fire = &mut self.fire[..];
        let particles = &mut self.particles[..];
        let temperature = &mut self.temperature[..];

        rayon::scope(|s| {
            s.spawn(move |_| shift_layer(main, w, h, dx, dy, TRANSPARENT));
            s.spawn(move |_| shift_layer(layer2, w, h, dx, dy, TRANSPARENT));
            s.spawn(move |_| shift_layer(background, w, h, dx, dy, TRANSPARENT));
            s.spawn(move |_| shift_layer(fire, w, h, dx, dy, TRANSPARENT));
            s.spawn(move |_| shift_layer(particles, w, h, dx, dy, TRANSPARENT));
            s.spawn(move |_| shift_layer(temperature, w, h, dx, dy, TRANSPARENT));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::particles::Particle;
    use glam::Vec2;

    #[test]
    fn test_refresh_paints_dirty_rows_and_drains() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(8, 8).unwrap();
        let mut frame = FrameBuffers::new(8, 8).unwrap();
        // A fresh grid is fully dirty
        frame.refresh(&mut grid, &materials, &ParticleSystem::new(), false);
        assert!(grid.dirty().iter().all(|d| !d));

        let sand = MaterialInstance::from_def(materials.get(MaterialId::SAND));
        grid.set_tile(2, 3, sand);
        let summary = frame.refresh(&mut grid, &materials, &ParticleSystem::new(), false);

        assert_eq!(summary.main_rows, 1);
        assert_eq!(summary.layer2_rows, 0);
        let px = frame.main()[2 + 3 * 8];
        assert_eq!(&px[..3], &unpack(sand.color, 0)[..3]);
        assert_eq!(frame.fire()[2 + 3 * 8], TRANSPARENT);
        assert!(!grid.is_dirty(2, 3));
    }

    #[test]
    fn test_fire_layer_only_holds_fire_and_lava() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(4, 4).unwrap();
        let mut frame = FrameBuffers::new(4, 4).unwrap();
        grid.set_tile(1, 1, MaterialInstance::from_def(materials.get(MaterialId::LAVA)));
        grid.set_tile(2, 1, MaterialInstance::from_def(materials.get(MaterialId::STONE)));
        frame.refresh(&mut grid, &materials, &ParticleSystem::new(), false);

        assert_ne!(frame.fire()[1 + 4], TRANSPARENT);
        assert_eq!(frame.fire()[2 + 4], TRANSPARENT);
    }

    #[test]
    fn test_particles_redrawn_and_temperature_on_request() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(4, 4).unwrap();
        let mut frame = FrameBuffers::new(4, 4).unwrap();
        let mut particles = ParticleSystem::new();
        let water = MaterialInstance::from_def(materials.get(MaterialId::WATER));
        particles.spawn(Particle::new(water, Vec2::new(1.5, 2.5), Vec2::ZERO));

        let summary = frame.refresh(&mut grid, &materials, &particles, true);
        assert_eq!(summary.particles_drawn, 1);
        assert!(summary.temperature_redrawn);
        assert_ne!(frame.particles()[1 + 2 * 4], TRANSPARENT);
        // Temperature 0 sits mid-ramp
        let t = frame.temperature()[0];
        assert!(t[0] > 100 && t[2] > 100);

        let empty = frame.refresh(&mut grid, &materials, &ParticleSystem::new(), false);
        assert_eq!(empty.particles_drawn, 0);
        assert!(!empty.temperature_redrawn);
        assert!(frame.particles().iter().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn test_shift_moves_pixels() {
        let materials = Materials::new();
        let mut grid = TileGrid::new(4, 4).unwrap();
        let mut frame = FrameBuffers::new(4, 4).unwrap();
        grid.set_tile(3, 0, MaterialInstance::from_def(materials.get(MaterialId::STONE)));
        frame.refresh(&mut grid, &materials, &ParticleSystem::new(), false);

        frame.shift(1, 0);
        assert_ne!(frame.main()[2], TRANSPARENT);
        assert_eq!(frame.main()[3], TRANSPARENT);
    }
}
