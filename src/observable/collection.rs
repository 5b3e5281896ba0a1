//! Ordered live view over a set of records with synchronous notifications.
//!
//! Every mutation notifies all observers before it returns. Notifications
//! are never batched: observers see each individual change.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Records that are ranked by call count
pub trait Ranked {
    fn calls(&self) -> u64;
}

/// Subscriber to an `ObservableCollection`
///
/// All methods default to no-ops so observers only implement what they need.
/// `items` is the full ordered list after the change was applied.
///
/// Callbacks run while the list is borrowed. They may read the collection
/// and subscribe or unsubscribe, but must not feed updates back into the
/// model (`Models::apply` and friends) from inside a callback; that panics
/// with a `BorrowMutError`. Queue such work and apply it afterwards.
pub trait CollectionObserver<T> {
    /// The whole list was replaced (subscribe, load, unload)
    fn on_reset(&self, _items: &[T]) {}

    /// A record was inserted at `index`
    fn on_add(&self, _items: &[T], _index: usize) {}

    /// The record at `from` now lives at `to`
    fn on_move(&self, _items: &[T], _from: usize, _to: usize) {}

    /// The call count of the record at `index` changed to `calls`
    fn on_update(&self, _items: &[T], _index: usize, _calls: u64) {}
}

/// Index at which `calls` belongs in a list sorted hottest first
///
/// First position whose record is strictly colder, so equal counts keep
/// insertion order.
pub fn rank_index<T: Ranked>(items: &[T], calls: u64) -> usize {
    items
        .iter()
        .position(|item| calls > item.calls())
        .unwrap_or(items.len())
}

/// Observable, ordered collection
///
/// **Public** - the presentation layer subscribes to it. Mutation is
/// restricted to this crate.
pub struct ObservableCollection<T> {
    items: RefCell<Vec<T>>,
    observers: RefCell<Vec<Rc<dyn CollectionObserver<T>>>>,
}

impl<T: Ranked> ObservableCollection<T> {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
        }
    }

    /// Subscribe and receive the current snapshot as a reset
    pub fn add_observer(&self, observer: Rc<dyn CollectionObserver<T>>) {
        self.observers.borrow_mut().push(Rc::clone(&observer));
        observer.on_reset(&self.items.borrow());
    }

    /// Unsubscribe; returns false if the observer was not registered
    pub fn remove_observer(&self, observer: &Rc<dyn CollectionObserver<T>>) -> bool {
        let target = Rc::as_ptr(observer) as *const ();
        let mut observers = self.observers.borrow_mut();
        match observers
            .iter()
            .position(|o| Rc::as_ptr(o) as *const () == target)
        {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Read-only view of the live list
    pub fn items(&self) -> Ref<'_, [T]> {
        Ref::map(self.items.borrow(), |items| items.as_slice())
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.borrow().clone()
    }

    /// Replace the whole list, then emit a reset
    pub(crate) fn load(&self, items: Vec<T>) {
        *self.items.borrow_mut() = items;
        self.notify(|observer, items| observer.on_reset(items));
    }

    /// Clear the list, then emit a reset
    pub(crate) fn unload(&self) {
        self.items.borrow_mut().clear();
        self.notify(|observer, items| observer.on_reset(items));
    }

    /// Insert at the rank-correct position and emit an add
    pub(crate) fn insert_ranked(&self, item: T) -> usize {
        let index = {
            let mut items = self.items.borrow_mut();
            let index = rank_index(&items, item.calls());
            items.insert(index, item);
            index
        };
        self.notify(|observer, items| observer.on_add(items, index));
        index
    }

    pub(crate) fn position(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.borrow().iter().position(predicate)
    }

    /// Mutate a record in place without notifying
    ///
    /// Callers must follow up with `rerank` so observers learn about it.
    pub(crate) fn modify<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.items.borrow_mut().get_mut(index).map(f)
    }

    /// Move the record at `index` to its rank-correct position
    ///
    /// Emits a move if the position changed, then an update carrying the
    /// record's call count. Returns the new index.
    pub(crate) fn rerank(&self, index: usize) -> Option<usize> {
        let (new_index, calls) = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            let item = items.remove(index);
            let calls = item.calls();
            let new_index = rank_index(&items, calls);
            items.insert(new_index, item);
            (new_index, calls)
        };

        if new_index != index {
            self.notify(|observer, items| observer.on_move(items, index, new_index));
        }
        self.notify(|observer, items| observer.on_update(items, new_index, calls));
        Some(new_index)
    }

    fn notify(&self, event: impl Fn(&dyn CollectionObserver<T>, &[T])) {
        // Observers may subscribe or unsubscribe from inside a callback
        let observers: Vec<_> = self.observers.borrow().iter().cloned().collect();
        let items = self.items.borrow();
        for observer in observers {
            event(observer.as_ref(), &items);
        }
    }
}

impl<T: Ranked> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}
