//! Single-threaded observable cell.
//!
//! Readers receive immutable `Rc` snapshots; writers replace the value and
//! every live subscriber is called with the new snapshot. A subscription is
//! removed when its [`Subscription`] guard is dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct ListenerSlot<T> {
    call: RefCell<Box<dyn FnMut(&Rc<T>)>>,
    // Latest snapshot published while `call` was still running.
    pending: RefCell<Option<Rc<T>>>,
}

type Listener<T> = Rc<ListenerSlot<T>>;

struct Shared<T> {
    value: RefCell<Rc<T>>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_listener: Cell<u64>,
}

pub struct Observable<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.get())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(Rc::new(value)),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.shared.value.borrow())
    }

    pub fn set(&self, value: T) {
        *self.shared.value.borrow_mut() = Rc::new(value);
        self.notify();
    }

    /// Stores `value` only when it differs from the current one.
    /// Returns whether subscribers were notified.
    pub fn replace_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if *self.get() == value {
            return false;
        }
        self.set(value);
        true
    }

    /// Clones the current value, lets `f` edit it and publishes the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Clone,
    {
        let mut next = (*self.get()).clone();
        let out = f(&mut next);
        self.set(next);
        out
    }

    /// Calls `listener` with every new snapshot. A write made while the
    /// listener is still running (for example by the listener itself) is
    /// delivered once that call returns; if several such writes happen, only
    /// the latest snapshot is delivered.
    pub fn subscribe(&self, listener: impl FnMut(&Rc<T>) + 'static) -> Subscription {
        let id = self.shared.next_listener.get();
        self.shared.next_listener.set(id + 1);

        let listener: Listener<T> = Rc::new(ListenerSlot {
            call: RefCell::new(Box::new(listener)),
            pending: RefCell::new(None),
        });
        self.shared.listeners.borrow_mut().push((id, listener));

        let weak: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared
                    .listeners
                    .borrow_mut()
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.borrow().len()
    }

    fn notify(&self) {
        let snapshot = self.get();
        // Clone the handles first so listeners may subscribe, unsubscribe or
        // write back without tripping the borrow on the listener list.
        let listeners: Vec<Listener<T>> = self
            .shared
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            let Ok(mut call) = listener.call.try_borrow_mut() else {
                // Already running further up the stack; that frame delivers it.
                *listener.pending.borrow_mut() = Some(Rc::clone(&snapshot));
                continue;
            };

            (&mut **call)(&snapshot);
            loop {
                let next = listener.pending.borrow_mut().take();
                let Some(next) = next else {
                    break;
                };
                (&mut **call)(&next);
            }
        }
    }
}

/// Guard returned by [`Observable::subscribe`]; dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Combines several guards into one that releases all of them.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}
