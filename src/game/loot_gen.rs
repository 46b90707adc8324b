//! Probabilistic loot spawning

use std::fmt;
use std::time::Duration;

/// Source of random values in `[0, 1]`
pub type RandomSource = Box<dyn FnMut() -> f64 + Send>;

/// Decides how much loot to add each tick.
///
/// The chance that a missing item appears within the accumulated idle time `T` is
/// `1 - (1 - probability)^(T / base_interval)`, scaled by the random source. The idle
/// accumulator restarts after loot is generated or once a full base interval has passed.
pub struct LootGenerator {
    base_interval: Duration,
    probability: f64,
    time_without_loot: Duration,
    random: RandomSource,
}

impl fmt::Debug for LootGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LootGenerator")
            .field("base_interval", &self.base_interval)
            .field("probability", &self.probability)
            .field("time_without_loot", &self.time_without_loot)
            .finish_non_exhaustive()
    }
}

impl LootGenerator {
    /// Generator with the deterministic source that always yields `1.0`
    pub fn new(base_interval: Duration, probability: f64) -> Self {
        Self::with_random(base_interval, probability, Box::new(|| 1.0))
    }

    pub fn with_random(base_interval: Duration, probability: f64, random: RandomSource) -> Self {
        Self {
            base_interval,
            probability: probability.clamp(0.0, 1.0),
            time_without_loot: Duration::ZERO,
            random,
        }
    }

    pub fn time_without_loot(&self) -> Duration {
        self.time_without_loot
    }

    /// Restores the accumulator from a saved session
    pub fn set_time_without_loot(&mut self, time: Duration) {
        self.time_without_loot = time;
    }

    /// Number of loot items to add; never more than `looter_count - loot_count`
    pub fn generate(&mut self, elapsed: Duration, loot_count: usize, looter_count: usize) -> usize {
        self.time_without_loot += elapsed;

        let shortage = looter_count.saturating_sub(loot_count);
        let ratio = if self.base_interval.is_zero() {
            f64::INFINITY
        } else {
            self.time_without_loot.as_secs_f64() / self.base_interval.as_secs_f64()
        };
        let chance = 1.0 - (1.0 - self.probability).powf(ratio);
        let chance = (chance * (self.random)()).clamp(0.0, 1.0);
        let generated = ((shortage as f64) * chance).round() as usize;

        if generated > 0 || self.time_without_loot >= self.base_interval {
            self.time_without_loot = Duration::ZERO;
        }
        generated.min(shortage)
    }
}
