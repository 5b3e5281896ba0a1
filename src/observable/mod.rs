//! Observer-notified live views.

pub mod collection;

pub use collection::{rank_index, CollectionObserver, ObservableCollection, Ranked};
