use std::time::Instant;

use weighbridge_link::weight::{NumericSample, Stabilizer};

fn feed(stabilizer: &mut Stabilizer, value: f64, now: Instant) -> Option<f64> {
    stabilizer.push(NumericSample::new(value, now));
    stabilizer.evaluate(now).map(|reading| reading.value)
}

#[test]
fn test_modal_value_wins_in_one_window() {
    let mut stabilizer = Stabilizer::default();
    let now = Instant::now();
    for value in [100.0, 100.0, 200.0] {
        stabilizer.push(NumericSample::new(value, now));
    }
    let reading = stabilizer.evaluate(now).expect("100 seen twice");
    assert_eq!(reading.value, 100.0);
}

#[test]
fn test_not_published_until_second_occurrence() {
    let mut stabilizer = Stabilizer::default();
    let now = Instant::now();
    assert_eq!(feed(&mut stabilizer, 100.0, now), None);
    assert_eq!(feed(&mut stabilizer, 100.0, now), Some(100.0));
    assert_eq!(feed(&mut stabilizer, 200.0, now), None);
    assert_eq!(stabilizer.last_stable().map(|r| r.value), Some(100.0));
}

#[test]
fn test_tolerance_suppresses_small_changes() {
    let mut stabilizer = Stabilizer::default();
    let now = Instant::now();
    feed(&mut stabilizer, 500.0, now);
    assert_eq!(feed(&mut stabilizer, 500.0, now), Some(500.0));

    assert_eq!(feed(&mut stabilizer, 500.05, now), None);
    assert_eq!(feed(&mut stabilizer, 500.05, now), None);

    feed(&mut stabilizer, 500.2, now);
    assert_eq!(feed(&mut stabilizer, 500.2, now), Some(500.2));
}

#[test]
fn test_noise_spike_ignored() {
    let mut stabilizer = Stabilizer::default();
    let now = Instant::now();
    let mut published = Vec::new();
    for value in [8000.0, 8000.0, 999999.0, 8000.0, 8000.0] {
        if let Some(v) = feed(&mut stabilizer, value, now) {
            published.push(v);
        }
    }
    assert_eq!(published, vec![8000.0]);
}

#[test]
fn test_reset_forgets_stable_value() {
    let mut stabilizer = Stabilizer::default();
    let now = Instant::now();
    feed(&mut stabilizer, 10.0, now);
    feed(&mut stabilizer, 10.0, now);
    stabilizer.reset();
    assert!(stabilizer.last_stable().is_none());
    feed(&mut stabilizer, 10.0, now);
    assert_eq!(feed(&mut stabilizer, 10.0, now), Some(10.0));
}
