//! Delay sources applied before each echo.

use rand::rngs::ThreadRng;
use rand::Rng;
use std::time::Duration;

/// Exclusive upper bound for a sampled delay.
pub const MAX_DELAY: Duration = Duration::from_millis(100);

/// Produces the pause inserted before each reply.
pub trait Jitter {
    fn next_delay(&mut self) -> Duration;
}

/// Uniform delay in `[0, MAX_DELAY)` drawn from the thread-local PRNG.
pub struct UniformJitter {
    rng: ThreadRng,
}

impl UniformJitter {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for UniformJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Jitter for UniformJitter {
    fn next_delay(&mut self) -> Duration {
        let max = MAX_DELAY.as_secs_f64();
        Duration::from_secs_f64(self.rng.random_range(0.0..max))
    }
}

/// Always returns the same delay.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

#[cfg(test)]
impl Jitter for FixedJitter {
    fn next_delay(&mut self) -> Duration {
        self.0
    }
}

/// Delay in milliseconds, as printed in the relay log.
pub fn as_millis_f64(delay: Duration) -> f64 {
    delay.as_secs_f64() * 1000.0
}
