//! In-memory fan-out of inbound events to UI consumers.
//!
//! Arbitrarily many consumers (conversation views, unread badges) can
//! subscribe independently of which conversation is open. Subscribing
//! returns a typed [`Subscription`] handle; dropping the handle
//! removes exactly that callback, so releasing a subscription on every
//! exit path of its owning scope is the default rather than something
//! a consumer can forget.
//!
//! Dispatch is synchronous and unordered across callbacks, with no
//! back-pressure: a slow callback delays the rest of the dispatch.
//! Fan-out sizes are UI-scale, so this is acceptable.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Inner<T> {
    next_id: u64,
    subscribers: HashMap<u64, Callback<T>>,
}

/// Registry of live subscriber callbacks.
pub struct SubscriptionRegistry<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for SubscriptionRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for SubscriptionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriptionRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Register a callback to be invoked for every dispatched event.
    ///
    /// The callback stays registered for the lifetime of the returned
    /// [`Subscription`].
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, Arc::new(callback));

        tracing::debug!(id, count = inner.subscribers.len(), "subscriber registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every currently registered callback with `event`.
    ///
    /// Order is arbitrary. A panic inside one callback is caught and
    /// logged; the remaining callbacks still run.
    pub fn dispatch(&self, event: &T) {
        // Snapshot under the lock, invoke outside it, so a callback may
        // itself subscribe or drop subscriptions without deadlocking.
        let callbacks: Vec<Callback<T>> = {
            let inner = self.inner.lock().expect("registry lock poisoned");
            inner.subscribers.values().cloned().collect()
        };

        tracing::debug!(count = callbacks.len(), "dispatching to subscribers");

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!("subscriber panicked during dispatch");
            }
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .subscribers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle owning one registered callback.
///
/// Dropping it unregisters exactly that callback. Holds only a weak
/// reference to the registry, so an outliving subscription does not
/// keep the registry alive.
pub struct Subscription<T> {
    id: u64,
    registry: Weak<Mutex<Inner<T>>>,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            if let Ok(mut inner) = inner.lock() {
                inner.subscribers.remove(&self.id);
                tracing::debug!(
                    id = self.id,
                    count = inner.subscribers.len(),
                    "subscriber unregistered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_all_subscribers() {
        let registry = SubscriptionRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let subs: Vec<_> = (0..3)
            .map(|_| {
                let hits = hits.clone();
                registry.subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        registry.dispatch(&7);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        drop(subs);
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let registry = SubscriptionRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_a = hits.clone();
        let sub_a = registry.subscribe(move |_| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let hits_b = hits.clone();
        let _sub_b = registry.subscribe(move |_| {
            hits_b.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.len(), 2);
        drop(sub_a);
        assert_eq!(registry.len(), 1);

        registry.dispatch(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_the_others() {
        let registry = SubscriptionRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_a = hits.clone();
        let _sub_a = registry.subscribe(move |_| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let _sub_boom = registry.subscribe(|_| panic!("subscriber bug"));
        let hits_c = hits.clone();
        let _sub_c = registry.subscribe(move |_| {
            hits_c.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&1);

        // Both well-behaved subscribers were still invoked.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscriber_may_subscribe_during_dispatch() {
        let registry = SubscriptionRegistry::<u32>::new();

        let registry_clone = registry.clone();
        let nested: Arc<Mutex<Vec<Subscription<u32>>>> = Arc::new(Mutex::new(Vec::new()));
        let nested_clone = nested.clone();
        let _sub = registry.subscribe(move |_| {
            let sub = registry_clone.subscribe(|_| {});
            nested_clone.lock().unwrap().push(sub);
        });

        // Must not deadlock.
        registry.dispatch(&1);
        assert_eq!(registry.len(), 2);
    }
}
