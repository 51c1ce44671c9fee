//! Data capabilities: records and collections.
//!
//! Views do not know where data comes from. A [`Record`] is anything that can
//! fetch itself, expose a JSON data bag for templating, and announce changes;
//! a [`Collection`] is an ordered set of records with mutation signals a
//! bound list mirrors. The crate ships [`ValueRecord`] and [`ListCollection`]
//! as in-memory reference implementations; application data layers implement
//! the traits over their own storage.
//!
//! Member identity is pointer identity: two [`RecordRef`]s denote the same
//! member iff they are clones of the same `Arc`.

use std::cmp::Ordering;
use std::sync::Arc;

use futures_util::future::{ready, BoxFuture};
use futures_util::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::FetchError;
use crate::signal::Signal;

/// Shared handle to a record; clones denote the same member.
pub type RecordRef = Arc<dyn Record>;

/// Shared handle to a collection.
pub type CollectionRef = Arc<dyn Collection>;

/// Whether two record handles denote the same member.
pub fn same_record(a: &RecordRef, b: &RecordRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Signals a record exposes to its observers.
///
/// # Related Types
///
/// - [`Record::signals`] - Accessor on the trait
#[derive(Default)]
pub struct RecordSignals {
    /// Emitted after any change to the record's data.
    pub changed: Signal<()>,
    /// Emitted for named domain events, carrying the event name.
    pub event: Signal<String>,
}

/// A unit of data a view can bind to.
pub trait Record: Send + Sync {
    /// Load or refresh the record's data.
    ///
    /// The returned future resolves when the data is usable and rejects with
    /// the source's own message otherwise. Implementations backed by local
    /// state resolve immediately.
    fn fetch(&self) -> BoxFuture<'static, Result<(), FetchError>>;

    /// The current data bag, as handed to render functions.
    fn data(&self) -> Value;

    /// The record's signal bundle.
    fn signals(&self) -> &RecordSignals;
}

/// Signals a collection exposes to its observers.
///
/// # Related Types
///
/// - [`Collection::signals`] - Accessor on the trait
#[derive(Default)]
pub struct CollectionSignals {
    /// A member was added, with its position when the insertion was ordered.
    pub added: Signal<(RecordRef, Option<usize>)>,
    /// A member was removed.
    pub removed: Signal<RecordRef>,
    /// Membership was replaced wholesale.
    pub reset: Signal<()>,
    /// Order changed without membership changing.
    pub sorted: Signal<()>,
}

/// An ordered set of records a list view can mirror.
pub trait Collection: Send + Sync {
    /// Load or refresh the collection's membership.
    fn fetch(&self) -> BoxFuture<'static, Result<(), FetchError>>;

    /// Current members in collection order.
    fn members(&self) -> Vec<RecordRef>;

    /// The collection's signal bundle.
    fn signals(&self) -> &CollectionSignals;
}

/// A record over a plain JSON value.
///
/// `set` replaces the value and emits `changed`; `fetch` resolves
/// immediately. Useful for tests and for views whose data is computed
/// locally.
#[derive(Default)]
pub struct ValueRecord {
    value: RwLock<Value>,
    signals: RecordSignals,
}

impl ValueRecord {
    /// Create a record holding `value`.
    pub fn new(value: Value) -> Self {
        Self {
            value: RwLock::new(value),
            signals: RecordSignals::default(),
        }
    }

    /// Replace the value and announce the change.
    pub fn set(&self, value: Value) {
        *self.value.write() = value;
        self.signals.changed.emit(());
    }

    /// Fire a named domain event.
    pub fn trigger(&self, name: &str) {
        self.signals.event.emit(name.to_string());
    }
}

impl Record for ValueRecord {
    fn fetch(&self) -> BoxFuture<'static, Result<(), FetchError>> {
        ready(Ok(())).boxed()
    }

    fn data(&self) -> Value {
        self.value.read().clone()
    }

    fn signals(&self) -> &RecordSignals {
        &self.signals
    }
}

/// An in-memory collection over a vector of records.
///
/// Mutations emit the corresponding [`CollectionSignals`] channel after the
/// membership lock is released, so slots may read the collection back.
#[derive(Default)]
pub struct ListCollection {
    members: RwLock<Vec<RecordRef>>,
    signals: CollectionSignals,
}

impl ListCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection with initial members.
    pub fn from_members(members: Vec<RecordRef>) -> Self {
        Self {
            members: RwLock::new(members),
            signals: CollectionSignals::default(),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Append a member and announce an unordered addition.
    pub fn add(&self, record: RecordRef) {
        self.members.write().push(record.clone());
        self.signals.added.emit((record, None));
    }

    /// Insert a member at `index` (clamped) and announce the position.
    pub fn add_at(&self, record: RecordRef, index: usize) {
        let index = {
            let mut members = self.members.write();
            let index = index.min(members.len());
            members.insert(index, record.clone());
            index
        };
        self.signals.added.emit((record, Some(index)));
    }

    /// Remove the member identical to `record`.
    ///
    /// Returns `false` when the record is not a member.
    pub fn remove(&self, record: &RecordRef) -> bool {
        let found = {
            let mut members = self.members.write();
            match members.iter().position(|m| same_record(m, record)) {
                Some(index) => {
                    members.remove(index);
                    true
                }
                None => false,
            }
        };
        if found {
            self.signals.removed.emit(record.clone());
        }
        found
    }

    /// Replace membership wholesale.
    pub fn reset(&self, members: Vec<RecordRef>) {
        *self.members.write() = members;
        self.signals.reset.emit(());
    }

    /// Reorder members and announce the sort.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&RecordRef, &RecordRef) -> Ordering,
    {
        self.members.write().sort_by(|a, b| compare(a, b));
        self.signals.sorted.emit(());
    }
}

impl Collection for ListCollection {
    fn fetch(&self) -> BoxFuture<'static, Result<(), FetchError>> {
        ready(Ok(())).boxed()
    }

    fn members(&self) -> Vec<RecordRef> {
        self.members.read().clone()
    }

    fn signals(&self) -> &CollectionSignals {
        &self.signals
    }
}
