//! # Backoff Calculator
//!
//! Delay between automatic drain retries after a transient halt:
//! `base * multiplier^attempt`, capped at the configured maximum, with optional
//! symmetric jitter so devices coming back online together do not retry in
//! lockstep.

use rand::Rng;
use std::time::Duration;

use crate::config::BackoffConfig;

#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl BackoffCalculator {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay_ms = self.exponential_delay_ms(attempt);

        if self.config.jitter_enabled {
            delay_ms = self.apply_jitter(delay_ms);
        }

        Duration::from_millis(delay_ms)
    }

    /// Capped exponential delay without jitter
    pub fn exponential_delay_ms(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let exponential = base * self.config.multiplier.powi(exponent);

        exponential.min(self.config.max_delay_ms as f64) as u64
    }

    fn apply_jitter(&self, delay_ms: u64) -> u64 {
        let jitter_range = (delay_ms as f64 * self.config.max_jitter) as u64;
        if jitter_range == 0 {
            return delay_ms;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0..=jitter_range);

        if rng.gen_bool(0.5) {
            delay_ms.saturating_add(jitter)
        } else {
            delay_ms.saturating_sub(jitter)
        }
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_jitter() -> BackoffCalculator {
        BackoffCalculator::new(BackoffConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter_enabled: false,
            max_jitter: 0.0,
        })
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let calculator = without_jitter();
        assert_eq!(calculator.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(calculator.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(calculator.delay_for(3), Duration::from_millis(8_000));
        assert_eq!(calculator.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(calculator.delay_for(60), Duration::from_millis(10_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let calculator = BackoffCalculator::new(BackoffConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter_enabled: true,
            max_jitter: 0.1,
        });

        for _ in 0..200 {
            let delay = calculator.delay_for(2).as_millis() as u64;
            assert!((3_600..=4_400).contains(&delay), "delay {delay} out of range");
        }
    }
}
