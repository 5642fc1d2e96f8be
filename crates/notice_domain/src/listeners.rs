use std::sync::{Arc, Weak};

use parking_lot::Mutex;

pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, ChangeListener)>,
}

/// Observers of the notification log. Each center owns its own set.
#[derive(Clone, Default)]
pub struct ChangeListeners {
    inner: Arc<Mutex<Registry>>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut registry = self.inner.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener registered at the time of the call. The registry
    /// lock is not held while listeners run.
    pub fn notify(&self) {
        let snapshot: Vec<ChangeListener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

/// Handle returned by [`ChangeListeners::subscribe`]. Dropping it keeps the
/// listener registered; call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let listeners = ChangeListeners::new();
        assert!(listeners.is_empty());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = first.clone();
        let sub_a = listeners.subscribe(move || {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = second.clone();
        let _sub_b = listeners.subscribe(move || {
            b.fetch_add(1, Ordering::SeqCst);
        });

        listeners.notify();
        sub_a.unsubscribe();
        listeners.notify();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(listeners.len(), 1);
        assert!(!listeners.is_empty());
    }

    #[test]
    fn listener_may_subscribe_during_notify() {
        let listeners = ChangeListeners::new();
        let handle = listeners.clone();
        let _sub = listeners.subscribe(move || {
            let _ = handle.subscribe(|| {});
        });
        listeners.notify();
        assert_eq!(listeners.len(), 2);
    }
}
