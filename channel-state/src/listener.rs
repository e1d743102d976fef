//! Listener registration with drop-to-unsubscribe handles

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// A set of callbacks invoked with a borrowed value.
///
/// Callbacks are cloned out under the lock and run after it is released, so a
/// callback may register or drop listeners without deadlocking.
pub(crate) struct ListenerSet<T> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn add<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut listeners = self.inner.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.inner);
        ListenerHandle {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    pub(crate) fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Keeps a listener registered. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) removes the listener.
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct ListenerHandle {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keep the listener for as long as the registry lives
    pub fn detach(mut self) {
        self.remove = None;
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_and_unsubscribe() {
        let set = ListenerSet::<u32>::new();
        let (count, callback) = counter();

        let handle = set.add(callback);
        set.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.unsubscribe();
        set.notify(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let set = ListenerSet::<u32>::new();
        let (count, callback) = counter();
        {
            let _handle = set.add(callback);
            set.notify(&1);
        }
        set.notify(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_keeps_listener() {
        let set = ListenerSet::<u32>::new();
        let (count, callback) = counter();
        set.add(callback).detach();
        set.notify(&1);
        set.notify(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handle_outlives_set() {
        let set = ListenerSet::<u32>::new();
        let (_count, callback) = counter();
        let handle = set.add(callback);
        drop(set);
        handle.unsubscribe();
    }

    #[test]
    fn test_callback_may_register_listeners() {
        let set = Arc::new(ListenerSet::<u32>::new());
        let inner = Arc::clone(&set);
        set.add(move |_| inner.add(|_| {}).detach()).detach();
        set.notify(&1);
        assert_eq!(set.len(), 2);
    }
}
