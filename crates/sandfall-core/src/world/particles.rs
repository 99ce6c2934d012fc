//! Free-moving particles that leave and re-enter the grid
//!
//! A particle carries one tile's worth of material. Each tick it integrates
//! acceleration, an optional homing pull and velocity, then traces its step
//! through the grid. Hitting a blocking cell settles it (merged into the last
//! free cell, or the nearest air when it started out buried, or dropped if
//! temporary); running out of lifetime or leaving the grid removes it without
//! merging.

use glam::Vec2;

use super::events::{EventQueue, WorldEvent};
use super::grid::TileGrid;
use super::raycasting::for_line;
use super::stats::SimStats;
use crate::simulation::{MaterialInstance, Materials};

/// Distance at which a homing particle counts as arrived
const HOMING_ARRIVAL_DISTANCE: f32 = 1.5;

/// Cells searched upward for air when the landing cell holds gas
const SETTLE_SEARCH_HEIGHT: i32 = 3;

/// Ring radius searched for air when a buried particle has no free cell on its path
const SETTLE_SEARCH_RADIUS: i32 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

/// Identifies whoever is tracking a particle (e.g. a container's in-flight list)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerTag(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HomingTarget {
    pub position: Vec2,
    /// Velocity added per tick toward the target
    pub force: f32,
}

#[derive(Clone, Debug)]
pub struct Particle {
    pub id: ParticleId,
    pub tile: MaterialInstance,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub target: Option<HomingTarget>,
    /// Remaining ticks; `None` lives until it settles
    pub lifetime: Option<u32>,
    /// Passes through blocking cells while set
    pub phase: bool,
    /// Vanishes instead of merging when it settles
    pub temporary: bool,
    pub owner: Option<OwnerTag>,
}

impl Particle {
    pub fn new(tile: MaterialInstance, position: Vec2, velocity: Vec2) -> Self {
        Self {
            id: ParticleId(0),
            tile,
            position,
            velocity,
            acceleration: Vec2::ZERO,
            target: None,
            lifetime: None,
            phase: false,
            temporary: false,
            owner: None,
        }
    }

    pub fn with_acceleration(mut self, acceleration: Vec2) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn with_target(mut self, position: Vec2, force: f32) -> Self {
        self.target = Some(HomingTarget { position, force });
        self
    }

    pub fn with_lifetime(mut self, ticks: u32) -> Self {
        self.lifetime = Some(ticks);
        self
    }

    pub fn phasing(mut self, phase: bool) -> Self {
        self.phase = phase;
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn owned_by(mut self, owner: OwnerTag) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn cell(&self) -> (i32, i32) {
        (self.position.x.floor() as i32, self.position.y.floor() as i32)
    }
}

/// How a particle left the simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fate {
    Alive,
    Settled,
    Expired,
    Arrived,
    Lost,
    /// Blocked with no air anywhere near to merge into
    Dropped,
}

/// Counts from one particle tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleTickReport {
    pub settled: usize,
    pub expired: usize,
    pub arrived: usize,
    pub lost: usize,
    /// Particles that hit something but found no air to merge into
    pub dropped: usize,
}

#[derive(Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    next_id: u64,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, mut particle: Particle) -> ParticleId {
        self.next_id += 1;
        particle.id = ParticleId(self.next_id);
        let id = particle.id;
        self.particles.push(particle);
        id
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.iter().find(|p| p.id == id)
    }

    /// Follow the grid window as it slides by `(dx, dy)`
    pub fn shift(&mut self, dx: i32, dy: i32) {
        let offset = Vec2::new(dx as f32, dy as f32);
        for p in &mut self.particles {
            p.position -= offset;
            if let Some(target) = &mut p.target {
                target.position -= offset;
            }
        }
    }

    pub fn tick(
        &mut self,
        grid: &mut TileGrid,
        materials: &Materials,
        events: &mut EventQueue,
        stats: &mut dyn SimStats,
    ) -> ParticleTickReport {
        let mut report = ParticleTickReport::default();

        self.particles.retain_mut(|p| {
            let fate = advance(p, grid, materials, events, stats);
            match fate {
                Fate::Alive => return true,
                Fate::Settled => report.settled += 1,
                Fate::Expired => report.expired += 1,
                Fate::Arrived => report.arrived += 1,
                Fate::Lost => report.lost += 1,
                Fate::Dropped => report.dropped += 1,
            }
            events.push(WorldEvent::ParticleKilled {
                id: p.id,
                owner: p.owner,
            });
            false
        });

        report
    }
}

fn advance(
    p: &mut Particle,
    grid: &mut TileGrid,
    materials: &Materials,
    events: &mut EventQueue,
    stats: &mut dyn SimStats,
) -> Fate {
    p.velocity += p.acceleration;

    if let Some(target) = p.target {
        let delta = target.position - p.position;
        let distance = delta.length();
        if distance < HOMING_ARRIVAL_DISTANCE {
            return Fate::Arrived;
        }
        p.velocity += delta / distance * target.force;
    }

    let (x0, y0) = p.cell();
    let next = p.position + p.velocity;
    let (x1, y1) = (next.x.floor() as i32, next.y.floor() as i32);

    let mut last_free: Option<(i32, i32)> = None;
    let mut blocked = false;
    let mut left_grid = false;
    let phase = p.phase;
    for_line(x0, y0, x1, y1, |x, y| {
        let Some(id) = grid.material_at(x, y) else {
            left_grid = true;
            return true;
        };
        let is_start = x == x0 && y == y0;
        if !is_start && !phase && materials.physics_type(id).is_blocking() {
            blocked = true;
            return true;
        }
        if !materials.physics_type(id).is_blocking() {
            last_free = Some((x, y));
        }
        false
    });

    if left_grid {
        return Fate::Lost;
    }

    if blocked {
        if p.temporary {
            return Fate::Settled;
        }
        let landing = last_free
            .and_then(|cell| find_air_above(grid, cell))
            .or_else(|| find_nearest_air(grid, last_free.unwrap_or((x0, y0))));
        let Some((x, y)) = landing else {
            log::debug!("Particle {:?} at ({}, {}) found no air, dropped", p.id, x0, y0);
            return Fate::Dropped;
        };
        grid.set_tile(x, y, p.tile);
        stats.record_particle_settled();
        events.push(WorldEvent::ParticleSettled {
            id: p.id,
            x,
            y,
            tile: p.tile,
        });
        return Fate::Settled;
    }

    p.position = next;

    if let Some(remaining) = p.lifetime.as_mut() {
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            return Fate::Expired;
        }
    }

    Fate::Alive
}

fn find_air_above(grid: &TileGrid, (x, y): (i32, i32)) -> Option<(i32, i32)> {
    (0..=SETTLE_SEARCH_HEIGHT)
        .map(|dy| (x, y - dy))
        .find(|&(cx, cy)| grid.get_tile(cx, cy).is_some_and(|t| t.is_air()))
}

/// Air on the closest ring around `(x, y)`, preferring the nearest cell and then cells above
fn find_nearest_air(grid: &TileGrid, (x, y): (i32, i32)) -> Option<(i32, i32)> {
    (0..=SETTLE_SEARCH_RADIUS).find_map(|r| {
        (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx.abs().max(dy.abs()) == r)
            .filter(|&(dx, dy)| grid.get_tile(x + dx, y + dy).is_some_and(|t| t.is_air()))
            .min_by_key(|&(dx, dy)| (dx * dx + dy * dy, dy, dx))
            .map(|(dx, dy)| (x + dx, y + dy))
    })
}
