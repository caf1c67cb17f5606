//! Synchronous change notification
//!
//! An [`EventChannel`] delivers each published event to its listeners in
//! subscription order, inside the publishing call. A listener that panics is
//! logged and skipped; the remaining listeners still run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

/// Payload published on a per-field channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<V> {
    pub new_value: V,
}

struct Registry<T: ?Sized> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
}

/// Publish/subscribe channel for one kind of event.
pub struct EventChannel<T: ?Sized> {
    registry: Rc<Registry<T>>,
}

/// Handle returned by [`EventChannel::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Unsubscribe::unsubscribe`] to remove the listener.
pub struct Unsubscribe {
    remove: Box<dyn FnOnce()>,
}

impl Unsubscribe {
    /// Remove the listener. Does nothing if the channel is gone.
    pub fn unsubscribe(self) {
        (self.remove)()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

impl<T: ?Sized + 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(Registry {
                next_id: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register a listener.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&T) + 'static,
    {
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);
        self.registry
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let registry: Weak<Registry<T>> = Rc::downgrade(&self.registry);
        Unsubscribe {
            remove: Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .listeners
                        .borrow_mut()
                        .retain(|(listener_id, _)| *listener_id != id);
                }
            }),
        }
    }

    /// Deliver `event` to every listener. Returns how many listeners panicked.
    pub fn publish(&self, event: &T) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners: Vec<Listener<T>> = self
            .registry
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        let mut failed = 0;
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                failed += 1;
                log::warn!("change listener panicked; remaining listeners still notified");
            }
        }
        failed
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners.borrow().len()
    }
}

impl<T: ?Sized + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.registry.listeners.borrow().len())
            .finish()
    }
}
