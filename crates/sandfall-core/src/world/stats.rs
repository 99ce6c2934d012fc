//! Simulation statistics collection trait

/// Trait for collecting simulation statistics
///
/// Lets the engine report activity without depending on whatever collects it
/// (a HUD, a headless run summary, a benchmark).
pub trait SimStats {
    /// Record that a tile moved during the automaton pass
    fn record_tile_moved(&mut self);

    /// Record that a material interaction fired
    fn record_interaction(&mut self);

    /// Record that a particle merged back into the grid
    fn record_particle_settled(&mut self);
}

/// A no-op implementation for when stats collection is not needed
#[derive(Default)]
pub struct NoopStats;

impl SimStats for NoopStats {
    fn record_tile_moved(&mut self) {}
    fn record_interaction(&mut self) {}
    fn record_particle_settled(&mut self) {}
}

/// Plain counters, handy for headless runs and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingStats {
    pub tiles_moved: u64,
    pub interactions: u64,
    pub particles_settled: u64,
}

impl SimStats for CountingStats {
    fn record_tile_moved(&mut self) {
        self.tiles_moved += 1;
    }

    fn record_interaction(&mut self) {
        self.interactions += 1;
    }

    fn record_particle_settled(&mut self) {
        self.particles_settled += 1;
    }
}
