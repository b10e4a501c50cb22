//! Optional synthetic failures for chaos testing the cascade.
//!
//! With probability `rate`, a tier-1 attempt is reported as a capacity miss
//! even though the pool was never asked. The default rate is zero, in which
//! case the random source is never touched.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub struct FaultInjector {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl FaultInjector {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic injector for tests.
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Roll for a synthetic divergence.
    pub fn should_fail(&self) -> bool {
        if self.rate <= 0.0 {
            return false;
        }
        self.rng
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .gen_bool(self.rate)
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_fails() {
        let f = FaultInjector::disabled();
        assert!((0..1000).all(|_| !f.should_fail()));
    }

    #[test]
    fn full_rate_always_fails() {
        let f = FaultInjector::seeded(1.0, 1);
        assert!((0..100).all(|_| f.should_fail()));
    }

    #[test]
    fn rate_is_roughly_honored() {
        let f = FaultInjector::seeded(0.1, 7);
        let hits = (0..10_000).filter(|_| f.should_fail()).count();
        assert!((700..1300).contains(&hits), "hits = {}", hits);
    }
}
