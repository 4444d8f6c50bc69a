//! Single-value cell with ordered subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObservableInner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
    next_id: AtomicU64,
}

impl<T> ObservableInner<T> {
    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, Subscriber<T>)>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Observable subscriber lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    fn value(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Observable value lock poisoned - recovering");
            poisoned.into_inner()
        })
    }
}

/// Current value plus subscribers notified on every [`set`](Self::set).
///
/// Clones share the same cell.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value().clone()
    }

    /// Store `value` and notify subscribers in subscription order.
    ///
    /// Subscribers run after both locks are released, so they may read the
    /// cell or subscribe/unsubscribe.
    pub fn set(&self, value: T) {
        *self.inner.value() = value.clone();

        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
    }

    /// Register `subscriber`, invoking it immediately with the current value.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let subscriber: Subscriber<T> = Arc::new(subscriber);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers()
            .push((id, Arc::clone(&subscriber)));

        subscriber(&self.get());

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Removes its subscriber when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription<T> {
    id: u64,
    inner: Weak<ObservableInner<T>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &T| sink.lock().unwrap().push(v.clone()))
    }

    #[test]
    fn subscribe_receives_current_value_immediately() {
        let cell = Observable::new(3);
        let (seen, record) = recorder();

        let _sub = cell.subscribe(record);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn set_notifies_every_time_in_order() {
        let cell = Observable::new("light");
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = cell.subscribe(move |v| first.lock().unwrap().push(format!("a:{v}")));
        let second = Arc::clone(&order);
        let _b = cell.subscribe(move |v| second.lock().unwrap().push(format!("b:{v}")));

        cell.set("dark");
        cell.set("dark");

        assert_eq!(cell.get(), "dark");
        assert_eq!(
            *order.lock().unwrap(),
            vec!["a:light", "b:light", "a:dark", "b:dark", "a:dark", "b:dark"]
        );
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let cell = Observable::new(false);
        let (seen, record) = recorder();

        let sub = cell.subscribe(record);
        assert_eq!(cell.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(cell.subscriber_count(), 0);

        cell.set(true);
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn subscriber_may_read_cell_during_notification() {
        let cell = Observable::new(1);
        let reader = cell.clone();
        let (seen, record) = recorder();

        let _sub = cell.subscribe(move |_| record(&reader.get()));
        cell.set(2);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
