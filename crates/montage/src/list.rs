//! Collection-bound lists.
//!
//! A list view keeps one child view per member of its bound collection,
//! all in a single destination group (the *item group*). Collection signals
//! do not mutate the view directly; they land in a pending queue and are
//! applied at the next sync point ([`View::sync_items`], or implicitly at
//! the start of every replay). Mutating a view requires `&mut` access plus
//! the tree, and a signal slot has neither; queueing defers the work to the
//! owner, which has both.
//!
//! The item group is owned by the binding: adding or removing views under
//! the item destination by hand will be fought by the next sync.
//!
//! # Key Types
//!
//! - [`ListConfig`] - Construction parameters for [`View::list`]
//! - [`ItemFactory`] - Builds an item view for a member record

use std::sync::Arc;

use parking_lot::Mutex;

use crate::destination::Destination;
use crate::dom::Dom;
use crate::error::{ListError, Result};
use crate::model::{same_record, CollectionRef, RecordRef};
use crate::signal::ConnectionId;
use crate::view::{View, ViewId};

/// Builds the item view for one collection member.
///
/// The factory may bind the record itself; if it does not, the binding binds
/// it afterwards so identity lookups stay correct.
pub type ItemFactory = Arc<dyn Fn(&RecordRef) -> View + Send + Sync>;

/// Construction parameters for a list view.
///
/// # Related Types
///
/// - [`View::list`] - Consumes the config
#[derive(Clone)]
pub struct ListConfig {
    /// Destination of the item group. Defaults to `"append"`.
    pub item_destination: String,
    /// The item view factory; required.
    pub factory: Option<ItemFactory>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            item_destination: "append".to_string(),
            factory: None,
        }
    }
}

impl ListConfig {
    /// A config with defaults and no factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the item view factory.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&RecordRef) -> View + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Place item views under a different destination.
    pub fn with_item_destination(mut self, destination: impl Into<String>) -> Self {
        self.item_destination = destination.into();
        self
    }
}

/// A queued collection notification, applied at the next sync point.
pub(crate) enum CollectionEvent {
    Added(RecordRef, Option<usize>),
    Removed(RecordRef),
    Reset,
    Sorted,
}

struct CollectionConns {
    added: ConnectionId,
    removed: ConnectionId,
    reset: ConnectionId,
    sorted: ConnectionId,
}

/// The collection-mirroring capability carried by a list view.
pub(crate) struct ListBinding {
    item_destination: Destination,
    factory: ItemFactory,
    pending: Arc<Mutex<Vec<CollectionEvent>>>,
    conns: Option<CollectionConns>,
}

impl ListBinding {
    /// Subscribe to the collection's channels and queue an initial mirror.
    pub(crate) fn watch(&mut self, collection: &CollectionRef) {
        let signals = collection.signals();

        let pending = self.pending.clone();
        let added = signals.added.connect(move |(record, index)| {
            pending
                .lock()
                .push(CollectionEvent::Added(record.clone(), *index));
        });
        let pending = self.pending.clone();
        let removed = signals.removed.connect(move |record: &RecordRef| {
            pending.lock().push(CollectionEvent::Removed(record.clone()));
        });
        let pending = self.pending.clone();
        let reset = signals.reset.connect(move |_| {
            pending.lock().push(CollectionEvent::Reset);
        });
        let pending = self.pending.clone();
        let sorted = signals.sorted.connect(move |_| {
            pending.lock().push(CollectionEvent::Sorted);
        });
        self.conns = Some(CollectionConns {
            added,
            removed,
            reset,
            sorted,
        });

        self.pending.lock().push(CollectionEvent::Reset);
    }

    /// Drop the subscriptions and any notifications still queued.
    pub(crate) fn unwatch(&mut self, collection: &CollectionRef) {
        if let Some(conns) = self.conns.take() {
            let signals = collection.signals();
            signals.added.disconnect(conns.added);
            signals.removed.disconnect(conns.removed);
            signals.reset.disconnect(conns.reset);
            signals.sorted.disconnect(conns.sorted);
        }
        self.pending.lock().clear();
    }
}

impl View {
    /// Create a list view: composition capability plus collection mirroring.
    ///
    /// Fails with [`ListError::MissingItemFactory`] when the config carries
    /// no factory, or with a destination parse error for a malformed item
    /// destination.
    pub fn list(tag: impl Into<String>, config: ListConfig) -> Result<Self> {
        let factory = config.factory.ok_or(ListError::MissingItemFactory)?;
        let item_destination: Destination = config.item_destination.parse()?;
        let mut view = Self::layout(tag);
        view.binding = Some(ListBinding {
            item_destination,
            factory,
            pending: Arc::new(Mutex::new(Vec::new())),
            conns: None,
        });
        Ok(view)
    }

    /// Apply queued collection notifications, in arrival order.
    ///
    /// A no-op on views without a list binding or with nothing queued.
    /// Replays call this implicitly; call it directly to observe the child
    /// tree between a collection mutation and the next render.
    pub fn sync_items(&mut self, dom: &mut dyn Dom) {
        let (pending, factory, destination) = match &self.binding {
            Some(binding) => (
                binding.pending.clone(),
                binding.factory.clone(),
                binding.item_destination.clone(),
            ),
            None => return,
        };
        let events: Vec<CollectionEvent> = std::mem::take(&mut *pending.lock());
        if events.is_empty() {
            return;
        }
        tracing::trace!(
            target: "montage::list",
            count = events.len(),
            "applying queued collection events"
        );
        // A rebuild reads membership as of *now*, which already reflects
        // every queued mutation; applying the other events around it would
        // double-count. One rebuild subsumes the whole drain.
        let rebuild = events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Reset | CollectionEvent::Sorted));
        if rebuild {
            self.rebuild_items(dom, &factory, &destination);
            return;
        }
        for event in events {
            match event {
                CollectionEvent::Added(record, index) => {
                    self.apply_added(&factory, destination.clone(), record, index);
                }
                CollectionEvent::Removed(record) => {
                    self.apply_removed(dom, &destination, &record);
                }
                CollectionEvent::Reset | CollectionEvent::Sorted => {}
            }
        }
    }

    /// The item view mirroring `record`, by member identity.
    pub fn get_item_view(&self, record: &RecordRef) -> Option<&View> {
        let destination = &self.binding.as_ref()?.item_destination;
        self.item_views(destination)
            .find(|view| view.record().is_some_and(|r| same_record(r, record)))
    }

    /// The item view at `index` within the item group.
    pub fn get_item_view_at(&self, index: usize) -> Option<&View> {
        let destination = &self.binding.as_ref()?.item_destination;
        self.item_views(destination).nth(index)
    }

    fn item_views<'a>(
        &'a self,
        destination: &Destination,
    ) -> impl Iterator<Item = &'a View> + 'a {
        self.composer
            .as_ref()
            .and_then(|composer| {
                composer
                    .groups
                    .iter()
                    .find(|group| group.destination == *destination)
            })
            .into_iter()
            .flat_map(|group| group.children.iter())
            .filter(|child| !child.view.defunct)
            .map(|child| &child.view)
    }

    fn apply_added(
        &mut self,
        factory: &ItemFactory,
        destination: Destination,
        record: RecordRef,
        index: Option<usize>,
    ) {
        let mut item = (factory)(&record);
        if item.record().is_none() {
            if let Err(err) = item.set_record(record.clone()) {
                tracing::warn!(
                    target: "montage::list",
                    %err,
                    "item view rejected its record; skipping member"
                );
                return;
            }
        }
        if let Err(err) = self.add_parsed(destination, index.unwrap_or(usize::MAX), item) {
            tracing::warn!(target: "montage::list", %err, "could not place item view");
        }
    }

    fn apply_removed(&mut self, dom: &mut dyn Dom, destination: &Destination, record: &RecordRef) {
        let id: Option<ViewId> = self
            .item_views(destination)
            .find(|view| view.record().is_some_and(|r| same_record(r, record)))
            .map(View::id);
        if let Some(id) = id {
            self.remove_view_by_id(dom, id);
        }
    }

    fn rebuild_items(&mut self, dom: &mut dyn Dom, factory: &ItemFactory, destination: &Destination) {
        let ids: Vec<ViewId> = self.item_views(destination).map(View::id).collect();
        for id in ids {
            self.remove_view_by_id(dom, id);
        }
        let members = self
            .collection
            .as_ref()
            .map(|collection| collection.members())
            .unwrap_or_default();
        for record in members {
            self.apply_added(factory, destination.clone(), record, None);
        }
    }
}
