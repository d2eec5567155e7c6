//! Minimal publish/subscribe plumbing.
//!
//! A [`Channel`] keeps a list of observers and notifies all of them on
//! [`Channel::publish`]. Nothing is buffered or replayed: a subscriber only
//! sees values published after it subscribed. Unsubscribing is the only
//! form of cancellation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::model::User;

/// Handle returned by [`Channel::subscribe`], used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Rc<dyn Fn(&T)>;

/// Multi-subscriber broadcast channel confined to its owning thread.
pub struct Channel<T> {
    next_id: Cell<u64>,
    observers: RefCell<Vec<(SubscriptionId, Observer<T>)>>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Returns `false` if the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Deliver `value` to every current subscriber, in subscription order.
    pub fn publish(&self, value: &T) {
        // Snapshot so observers may subscribe/unsubscribe while being notified.
        let snapshot: Vec<Observer<T>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, o)| Rc::clone(o))
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// How the store's ordered collection was just mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// `items` were inserted starting at `index`.
    Insert { index: usize, items: Vec<User> },
    /// `items` were removed starting at `index`.
    Remove { index: usize, items: Vec<User> },
    /// The whole collection was replaced; reload everything.
    Reset,
}

impl ChangeEvent {
    /// Apply the minimal equivalent update to a mirrored list.
    ///
    /// Returns `false` for [`ChangeEvent::Reset`] (and for events that do not
    /// fit the mirror), meaning the caller must reload the mirror from the store.
    pub fn apply(&self, mirror: &mut Vec<User>) -> bool {
        match self {
            ChangeEvent::Insert { index, items } => {
                if *index > mirror.len() {
                    return false;
                }
                mirror.splice(*index..*index, items.iter().cloned());
                true
            }
            ChangeEvent::Remove { index, items } => {
                let end = index + items.len();
                if end > mirror.len() {
                    return false;
                }
                mirror.drain(*index..end);
                true
            }
            ChangeEvent::Reset => false,
        }
    }
}
