//! Fixed-cadence tick gating

use std::time::Duration;

/// Most ticks run for a single update; a slow frame slows the simulation
/// down instead of piling up catch-up work
pub const MAX_TICKS_PER_UPDATE: u32 = 2;

/// Accumulates wall time and hands out whole ticks of `ms_per_tick`
#[derive(Debug, Clone)]
pub struct TickDriver {
    tick_length: Duration,
    accumulator: Duration,
    ticks: u64,
}

impl TickDriver {
    pub fn new(ms_per_tick: u64) -> Self {
        Self {
            tick_length: Duration::from_millis(ms_per_tick.max(1)),
            accumulator: Duration::ZERO,
            ticks: 0,
        }
    }

    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    /// Total ticks handed out so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Add `elapsed` and return how many ticks to run now
    pub fn update(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let mut due = 0;
        while self.accumulator >= self.tick_length && due < MAX_TICKS_PER_UPDATE {
            self.accumulator -= self.tick_length;
            due += 1;
        }

        // Clamp accumulator to prevent runaway
        if self.accumulator > self.tick_length * 2 {
            self.accumulator = self.tick_length;
        }

        self.ticks += due as u64;
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_ticks() {
        let mut driver = TickDriver::new(16);
        assert_eq!(driver.update(Duration::from_millis(10)), 0);
        assert_eq!(driver.update(Duration::from_millis(10)), 1);
        assert_eq!(driver.ticks(), 1);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let mut driver = TickDriver::new(10);
        assert_eq!(driver.update(Duration::from_millis(1000)), MAX_TICKS_PER_UPDATE);
        // The backlog was dropped down to one pending tick
        assert_eq!(driver.update(Duration::ZERO), 1);
        assert_eq!(driver.update(Duration::ZERO), 0);
    }
}
