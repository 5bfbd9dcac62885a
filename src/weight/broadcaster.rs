use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::types::{ReadingKind, WeightEvent};

type ObserverFn = dyn Fn(f64) -> anyhow::Result<()> + Send + Sync;

/// Handle returned by registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

struct Registration {
    id: ObserverId,
    kind: ReadingKind,
    callback: Arc<ObserverFn>,
}

/// Fans weight values out to registered observers.
///
/// Callbacks run in registration order on the publishing task. A callback
/// that errors or panics is logged and skipped; the rest still run. Async
/// consumers can `subscribe` instead and lag on their own.
pub struct Broadcaster {
    observers: RwLock<Vec<Registration>>,
    events_tx: broadcast::Sender<WeightEvent>,
}

impl Broadcaster {
    pub fn new(event_capacity: usize) -> Self {
        let (events_tx, _events_rx) = broadcast::channel(event_capacity.max(1));
        Self {
            observers: RwLock::new(Vec::new()),
            events_tx,
        }
    }

    /// Register a fallible observer for one kind of reading
    pub fn register<F>(&self, kind: ReadingKind, callback: F) -> ObserverId
    where
        F: Fn(f64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ObserverId(Uuid::new_v4());
        self.observers.write().push(Registration {
            id,
            kind,
            callback: Arc::new(callback),
        });
        id
    }

    pub fn on_stable<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.register(ReadingKind::Stable, move |value| {
            callback(value);
            Ok(())
        })
    }

    pub fn on_raw<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.register(ReadingKind::Raw, move |value| {
            callback(value);
            Ok(())
        })
    }

    /// Returns false if the id was not registered
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|r| r.id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WeightEvent> {
        self.events_tx.subscribe()
    }

    /// Deliver `value` to every observer of `kind`; returns how many accepted it
    pub fn publish(&self, value: f64, kind: ReadingKind) -> usize {
        // Snapshot so observers can (un)register from inside a callback
        let targets: Vec<(ObserverId, Arc<ObserverFn>)> = self
            .observers
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| (r.id, r.callback.clone()))
            .collect();

        let mut delivered = 0;
        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::warn!("Weight observer {:?} failed: {:#}", id, e),
                Err(_) => log::warn!("Weight observer {:?} panicked", id),
            }
        }

        // No subscribers is fine
        let _ = self.events_tx.send(WeightEvent { value, kind });
        delivered
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_kind_filter() {
        let broadcaster = Broadcaster::default();
        let raw_hits = Arc::new(AtomicUsize::new(0));
        let hits = raw_hits.clone();
        broadcaster.on_raw(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(broadcaster.publish(1.0, ReadingKind::Stable), 0);
        assert_eq!(broadcaster.publish(1.0, ReadingKind::Raw), 1);
        assert_eq!(raw_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let broadcaster = Broadcaster::default();
        let id = broadcaster.on_stable(|_| {});
        assert_eq!(broadcaster.observer_count(), 1);
        assert!(broadcaster.unregister(id));
        assert!(!broadcaster.unregister(id));
        assert_eq!(broadcaster.publish(5.0, ReadingKind::Stable), 0);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(42.0, ReadingKind::Stable);
        let event = rx.try_recv().expect("event queued");
        assert_eq!(event, WeightEvent { value: 42.0, kind: ReadingKind::Stable });
    }
}
