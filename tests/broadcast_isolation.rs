use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use weighbridge_link::{Broadcaster, ObserverId, ReadingKind};

fn recorder(log: &Arc<Mutex<Vec<(&'static str, f64)>>>, name: &'static str) -> impl Fn(f64) + Send + Sync {
    let log = log.clone();
    move |value| log.lock().unwrap().push((name, value))
}

#[test]
fn test_failing_observer_does_not_block_others() {
    let broadcaster = Broadcaster::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    broadcaster.on_stable(recorder(&log, "first"));
    broadcaster.register(ReadingKind::Stable, |_| Err(anyhow!("display widget destroyed")));
    broadcaster.on_stable(recorder(&log, "third"));

    let delivered = broadcaster.publish(1500.0, ReadingKind::Stable);

    assert_eq!(delivered, 2);
    assert_eq!(*log.lock().unwrap(), vec![("first", 1500.0), ("third", 1500.0)]);
}

#[test]
fn test_panicking_observer_is_contained() {
    let broadcaster = Broadcaster::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    broadcaster.on_raw(recorder(&log, "first"));
    broadcaster.on_raw(|_| panic!("observer bug"));
    broadcaster.on_raw(recorder(&log, "third"));

    assert_eq!(broadcaster.publish(7.0, ReadingKind::Raw), 2);
    assert_eq!(*log.lock().unwrap(), vec![("first", 7.0), ("third", 7.0)]);
}

#[test]
fn test_removal_during_broadcast() {
    let broadcaster = Arc::new(Broadcaster::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let victim: Arc<Mutex<Option<ObserverId>>> = Arc::new(Mutex::new(None));

    let remover = {
        let broadcaster = broadcaster.clone();
        let victim = victim.clone();
        move |_| {
            if let Some(id) = victim.lock().unwrap().take() {
                broadcaster.unregister(id);
            }
        }
    };
    broadcaster.on_stable(remover);
    let id = broadcaster.on_stable(recorder(&log, "victim"));
    *victim.lock().unwrap() = Some(id);

    // The in-flight publish still reaches the victim; the next one does not
    broadcaster.publish(1.0, ReadingKind::Stable);
    broadcaster.publish(2.0, ReadingKind::Stable);

    assert_eq!(*log.lock().unwrap(), vec![("victim", 1.0)]);
    assert_eq!(broadcaster.observer_count(), 1);
}

#[test]
fn test_same_value_to_every_observer() {
    let broadcaster = Broadcaster::default();
    let log = Arc::new(Mutex::new(Vec::new()));
    broadcaster.on_stable(recorder(&log, "form"));
    broadcaster.on_stable(recorder(&log, "status"));
    broadcaster.on_stable(recorder(&log, "panel"));

    broadcaster.publish(32000.0, ReadingKind::Stable);

    let seen: Vec<f64> = log.lock().unwrap().iter().map(|(_, v)| *v).collect();
    assert_eq!(seen, vec![32000.0; 3]);
}
