//! Debounce raw samples into stable readings.
//!
//! Samples collect in a time window. A reading is confirmed when the most
//! frequent value in the window has been seen at least `min_repeats` times
//! and differs from the current stable value by more than `tolerance`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::types::{NumericSample, StableReading};

#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerConfig {
    pub window: Duration,
    pub capacity: usize,
    pub min_repeats: usize,
    pub tolerance: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(1000),
            capacity: 64,
            min_repeats: 2,
            tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
    window: VecDeque<NumericSample>,
    last_stable: Option<StableReading>,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        // A single sample must never confirm itself
        let min_repeats = config.min_repeats.max(2);
        let capacity = config.capacity.max(min_repeats);
        Self {
            config: StabilizerConfig {
                min_repeats,
                capacity,
                ..config
            },
            window: VecDeque::with_capacity(capacity),
            last_stable: None,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn push(&mut self, sample: NumericSample) {
        self.window.push_back(sample);
        while self.window.len() > self.config.capacity {
            self.window.pop_front();
        }
    }

    /// Evaluate the window as of `now`, returning a newly confirmed reading
    pub fn evaluate(&mut self, now: Instant) -> Option<StableReading> {
        self.prune(now);

        let (value, count) = self.modal()?;
        if count < self.config.min_repeats {
            return None;
        }

        if let Some(last) = &self.last_stable {
            if (value - last.value).abs() <= self.config.tolerance {
                return None;
            }
        }

        let reading = StableReading::new(value);
        self.last_stable = Some(reading.clone());
        self.window.clear();
        Some(reading)
    }

    /// Most frequent value in the window and its count.
    /// Ties go to the value seen most recently.
    pub fn modal(&self) -> Option<(f64, usize)> {
        let mut tallies: Vec<(f64, usize, usize)> = Vec::new();
        for (index, sample) in self.window.iter().enumerate() {
            match tallies.iter_mut().find(|(value, _, _)| *value == sample.value) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 = index;
                }
                None => tallies.push((sample.value, 1, index)),
            }
        }

        tallies
            .into_iter()
            .max_by_key(|&(_, count, last_index)| (count, last_index))
            .map(|(value, count, _)| (value, count))
    }

    pub fn last_stable(&self) -> Option<&StableReading> {
        self.last_stable.as_ref()
    }

    pub fn pending_samples(&self) -> usize {
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_stable = None;
    }

    fn prune(&mut self, now: Instant) {
        let window = self.config.window;
        while let Some(oldest) = self.window.front() {
            if now.saturating_duration_since(oldest.decoded_at) > window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64, at: Instant) -> NumericSample {
        NumericSample::new(value, at)
    }

    #[test]
    fn test_singleton_never_confirms() {
        let mut stabilizer = Stabilizer::default();
        let now = Instant::now();
        stabilizer.push(sample(4200.0, now));
        assert!(stabilizer.evaluate(now).is_none());
        assert!(stabilizer.last_stable().is_none());
    }

    #[test]
    fn test_min_repeats_floor() {
        let stabilizer = Stabilizer::new(StabilizerConfig {
            min_repeats: 1,
            ..StabilizerConfig::default()
        });
        assert_eq!(stabilizer.config().min_repeats, 2);
    }

    #[test]
    fn test_modal_tie_prefers_latest() {
        let mut stabilizer = Stabilizer::default();
        let now = Instant::now();
        for value in [10.0, 10.0, 20.0, 20.0] {
            stabilizer.push(sample(value, now));
        }
        assert_eq!(stabilizer.modal(), Some((20.0, 2)));
    }

    #[test]
    fn test_window_expiry() {
        let mut stabilizer = Stabilizer::default();
        let start = Instant::now();
        stabilizer.push(sample(700.0, start));
        let later = start + Duration::from_millis(1500);
        stabilizer.push(sample(700.0, later));
        // The first 700 aged out before the second arrived
        assert!(stabilizer.evaluate(later).is_none());
        assert_eq!(stabilizer.pending_samples(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let mut stabilizer = Stabilizer::new(StabilizerConfig {
            capacity: 4,
            ..StabilizerConfig::default()
        });
        let now = Instant::now();
        for value in 0..10 {
            stabilizer.push(sample(f64::from(value), now));
        }
        assert_eq!(stabilizer.pending_samples(), 4);
    }

    #[test]
    fn test_window_cleared_after_publish() {
        let mut stabilizer = Stabilizer::default();
        let now = Instant::now();
        stabilizer.push(sample(300.0, now));
        stabilizer.push(sample(300.0, now));
        let reading = stabilizer.evaluate(now).expect("confirmed");
        assert_eq!(reading.value, 300.0);
        assert_eq!(stabilizer.pending_samples(), 0);
    }
}
