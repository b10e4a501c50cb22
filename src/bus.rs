//! Observer registry used by the pool and the watchdog to publish events.
//!
//! Subscribers register an [`Observer`] and get back a [`SubscriptionId`].
//! Unsubscribing only stops future deliveries; it never cancels work that an
//! event already triggered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Receives events of type `E`.
pub trait Observer<E>: Send + Sync {
    fn on_event(&self, event: &E);
}

impl<E, F> Observer<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous fan-out of events to registered observers.
pub struct EventBus<E> {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn Observer<E>>)>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: Arc<dyn Observer<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    /// Deliver an event to every current observer.
    ///
    /// The observer list is snapshotted first, so an observer may subscribe or
    /// unsubscribe from inside its callback without deadlocking.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Arc<dyn Observer<E>>> = self
            .observers
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer.on_event(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn publish_reaches_all_subscribers() {
        let bus: EventBus<u32> = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        bus.subscribe(Arc::new(move |e: &u32| a.lock().unwrap().push(("a", *e))));
        let b = Arc::clone(&seen);
        bus.subscribe(Arc::new(move |e: &u32| b.lock().unwrap().push(("b", *e))));

        bus.publish(&7);

        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus: EventBus<u32> = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        let id = bus.subscribe(Arc::new(move |_: &u32| *c.lock().unwrap() += 1));
        bus.publish(&1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&2);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
