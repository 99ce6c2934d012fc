//! RNG trait abstraction for World simulation
//!
//! Lets the automaton, particles and generation draw randomness from either a
//! seeded world RNG (reproducible ticks) or any `rand::Rng`.

/// Random number generator trait for World simulation
pub trait WorldRng {
    /// Generate random boolean with 50% probability
    fn gen_bool(&mut self) -> bool;

    /// Generate random f32 in [0.0, 1.0)
    fn gen_f32(&mut self) -> f32;

    /// Generate random integer in `[0, bound)` (0 when `bound` is 0)
    fn gen_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        ((self.gen_f32() * bound as f32) as u32).min(bound - 1)
    }

    /// Check if random value is less than probability threshold
    fn check_probability(&mut self, probability: f32) -> bool {
        self.gen_f32() < probability
    }
}

// Blanket implementation for any type implementing rand::Rng
impl<T: ?Sized + rand::Rng> WorldRng for T {
    fn gen_bool(&mut self) -> bool {
        rand::Rng::r#gen(self)
    }

    fn gen_f32(&mut self) -> f32 {
        rand::Rng::r#gen(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_world_rng_gen_bool() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(12345);

        let mut seen_true = false;
        let mut seen_false = false;
        for _ in 0..100 {
            if rng.gen_bool() {
                seen_true = true;
            } else {
                seen_false = true;
            }
        }

        assert!(seen_true);
        assert!(seen_false);
    }

    #[test]
    fn test_world_rng_gen_below_bounds() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(rng.gen_below(5) < 5);
        }
        assert_eq!(rng.gen_below(0), 0);
    }

    #[test]
    fn test_world_rng_check_probability_extremes() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(12345);
        for _ in 0..100 {
            assert!(rng.check_probability(1.0));
            assert!(!rng.check_probability(0.0));
        }
    }

    #[test]
    fn test_world_rng_deterministic() {
        let mut rng1 = Xoshiro256StarStar::seed_from_u64(42);
        let mut rng2 = Xoshiro256StarStar::seed_from_u64(42);

        for _ in 0..100 {
            assert_eq!(rng1.gen_f32(), rng2.gen_f32());
        }
    }
}
