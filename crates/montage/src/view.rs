//! The base view.
//!
//! A [`View`] owns one element in the tree: it knows how to create that
//! element (tag and attributes), how to fill it (an optional render
//! function over the bound record's data), and when filling can be skipped
//! (the `lazy`/`rendered` pair). Composition over child views and mirroring
//! of a collection are optional capabilities a view may carry; they are
//! wired in by [`View::layout`] and [`View::list`] and implemented in the
//! `layout` and `list` modules.
//!
//! Views form a tree through *ownership*: a parent's composer owns its child
//! views outright, and the child holds only a non-owning [`ViewId`] handle
//! back to its parent. All tree-touching operations take `&mut dyn Dom`; the
//! view stores node handles, never a reference to the tree itself.
//!
//! # Key Types
//!
//! - [`View`] - The view itself
//! - [`ViewId`] - Process-unique identity handle
//! - [`ViewEvent`] - The outgoing event payload for parent forwarding

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;

use crate::dom::{Dom, NodeId};
use crate::error::{BindingError, FetchError, MontageError, ReadyError, Result};
use crate::layout::Composer;
use crate::list::ListBinding;
use crate::model::{CollectionRef, RecordRef};
use crate::signal::{ConnectionId, Signal};

/// A process-unique identity for a view.
///
/// Identities are never reused, so a stale handle can at worst fail to
/// resolve; it can never alias a different view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A semantic event emitted by a view, as delivered to handlers.
#[derive(Clone, Debug)]
pub struct ViewEvent {
    /// The event name, e.g. `"selected"`.
    pub name: String,
    /// Event payload; [`Value::Null`] when the event carries no data.
    pub payload: Value,
}

/// Render function: substitutes a data bag into markup.
pub type RenderFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Handler invoked for forwarded or record-driven events.
pub type Handler = Arc<dyn Fn(&ViewEvent) + Send + Sync>;

/// Hook that wraps the view's own readiness future.
pub type ReadyCoupler = Arc<
    dyn Fn(BoxFuture<'static, std::result::Result<(), ReadyError>>)
            -> BoxFuture<'static, std::result::Result<(), ReadyError>>
        + Send
        + Sync,
>;

/// Data decorator: adjusts the record's data bag before rendering.
pub type DataFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Connections a view holds on its bound record's signals.
#[derive(Default)]
pub(crate) struct RecordConns {
    changed: Option<ConnectionId>,
    events: Vec<ConnectionId>,
}

/// A view over one element of the tree.
///
/// Constructed with [`View::new`] (plain), [`View::layout`] (with the
/// composition capability) or [`View::list`] (composition plus collection
/// mirroring), then configured builder-style with the `with_*` methods.
///
/// # Related Types
///
/// - [`crate::Destination`] - Where child views land
/// - [`crate::Record`] / [`crate::Collection`] - What views bind to
pub struct View {
    id: ViewId,
    tag: String,
    attrs: Vec<(String, String)>,
    template: Option<RenderFn>,
    data_decorator: Option<DataFn>,
    lazy: bool,
    /// Shared so record-change slots can void it without a view borrow.
    rendered: Arc<AtomicBool>,
    pub(crate) root: Option<NodeId>,
    pub(crate) parent: Option<ViewId>,
    /// Set by [`remove`](Self::remove); the owning composer skips the entry
    /// and drops it at its next mutation or replay.
    pub(crate) defunct: bool,
    record: Option<RecordRef>,
    record_conns: RecordConns,
    /// Declared record-event rules: event name → handler name.
    record_events: Vec<(String, String)>,
    pub(crate) collection: Option<CollectionRef>,
    pub(crate) handlers: HashMap<String, Handler>,
    /// Declared forwarding rules for child views: event name → handler name.
    pub(crate) forward_rules: Vec<(String, String)>,
    pub(crate) events: Signal<ViewEvent>,
    ready_coupler: Option<ReadyCoupler>,
    pub(crate) composer: Option<Composer>,
    pub(crate) binding: Option<ListBinding>,
}

impl View {
    /// Create a plain view rendering into a `tag` element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: ViewId::next(),
            tag: tag.into(),
            attrs: Vec::new(),
            template: None,
            data_decorator: None,
            lazy: false,
            rendered: Arc::new(AtomicBool::new(false)),
            root: None,
            parent: None,
            defunct: false,
            record: None,
            record_conns: RecordConns::default(),
            record_events: Vec::new(),
            collection: None,
            handlers: HashMap::new(),
            forward_rules: Vec::new(),
            events: Signal::new(),
            ready_coupler: None,
            composer: None,
            binding: None,
        }
    }

    /// Create a view with the composition capability.
    pub fn layout(tag: impl Into<String>) -> Self {
        let mut view = Self::new(tag);
        view.composer = Some(Composer::default());
        view
    }

    // ------------------------------------------------------------------
    // Builder configuration
    // ------------------------------------------------------------------

    /// Set the render function.
    pub fn with_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.template = Some(Arc::new(template));
        self
    }

    /// Set the data decorator applied to the record's data before rendering.
    pub fn with_data_decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.data_decorator = Some(Arc::new(decorator));
        self
    }

    /// Skip template substitution on re-render while `rendered` holds.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Set the root element's `id` attribute.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    /// Add a class to the root element.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        match self.attrs.iter_mut().find(|(k, _)| k == "class") {
            Some((_, existing)) => {
                existing.push(' ');
                existing.push_str(&class);
            }
            None => self.attrs.push(("class".to_string(), class)),
        }
        self
    }

    /// Set an attribute on the root element.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Register a named handler, the target of forwarding and record-event
    /// rules.
    pub fn with_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ViewEvent) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Declare a record-event rule: when the bound record fires `event`,
    /// invoke the named handler. Declare rules before binding the record.
    pub fn with_record_event(
        mut self,
        event: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        self.record_events.push((event.into(), handler.into()));
        self
    }

    /// Declare a forwarding rule: when any child view emits `event`, invoke
    /// the named handler on this view.
    pub fn with_forward(mut self, event: impl Into<String>, handler: impl Into<String>) -> Self {
        self.forward_rules.push((event.into(), handler.into()));
        self
    }

    /// Wrap the readiness future, e.g. to gate on an external condition.
    pub fn with_ready_coupler<F>(mut self, coupler: F) -> Self
    where
        F: Fn(BoxFuture<'static, std::result::Result<(), ReadyError>>)
                -> BoxFuture<'static, std::result::Result<(), ReadyError>>
            + Send
            + Sync
            + 'static,
    {
        self.ready_coupler = Some(Arc::new(coupler));
        self
    }

    /// Bind a record at construction. See [`set_record`](Self::set_record).
    pub fn with_record(mut self, record: RecordRef) -> Result<Self> {
        self.set_record(record)?;
        Ok(self)
    }

    /// Bind a collection at construction. See
    /// [`set_collection`](Self::set_collection).
    pub fn with_collection(mut self, collection: CollectionRef) -> Self {
        self.set_collection(collection);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The view's identity handle.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// The root element's tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The live root node, if the view has rendered or attached.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Handle to the owning parent view, if any.
    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    /// The bound record, if any.
    pub fn record(&self) -> Option<&RecordRef> {
        self.record.as_ref()
    }

    /// The bound collection, if any.
    pub fn collection(&self) -> Option<&CollectionRef> {
        self.collection.as_ref()
    }

    /// Whether the view's markup is current.
    pub fn is_rendered(&self) -> bool {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Force the next render to re-substitute the template.
    ///
    /// Invoked automatically on record change, on any `set_*`, and on child
    /// add/remove in the owning composer.
    pub fn void_rendered(&self) {
        self.rendered.store(false, Ordering::SeqCst);
    }

    pub(crate) fn mark_rendered(&self) {
        self.rendered.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Data binding
    // ------------------------------------------------------------------

    /// Bind a record, re-delegating change subscriptions.
    ///
    /// Connects the record's `changed` signal to void this view's rendered
    /// flag, plus each declared record-event rule to its named handler.
    /// Fails with [`BindingError::UnknownHandler`] when a rule names a
    /// handler this view never registered; nothing is connected in that case.
    pub fn set_record(&mut self, record: RecordRef) -> Result<()> {
        // Validate every rule before touching any connection.
        let mut wired = Vec::with_capacity(self.record_events.len());
        for (event, handler_name) in &self.record_events {
            let handler =
                self.handlers
                    .get(handler_name)
                    .cloned()
                    .ok_or_else(|| BindingError::UnknownHandler {
                        handler: handler_name.clone(),
                    })?;
            wired.push((event.clone(), handler));
        }

        self.disconnect_record();

        let rendered = self.rendered.clone();
        self.record_conns.changed = Some(record.signals().changed.connect(move |_| {
            rendered.store(false, Ordering::SeqCst);
        }));
        for (event, handler) in wired {
            let conn = record.signals().event.connect(move |name: &String| {
                if *name == event {
                    handler(&ViewEvent {
                        name: name.clone(),
                        payload: Value::Null,
                    });
                }
            });
            self.record_conns.events.push(conn);
        }

        self.record = Some(record);
        self.void_rendered();
        Ok(())
    }

    /// Bind a collection, re-delegating change subscriptions.
    ///
    /// On a list view this queues an initial mirror of the collection's
    /// current membership, applied at the next sync point.
    pub fn set_collection(&mut self, collection: CollectionRef) {
        self.disconnect_collection();
        if let Some(binding) = &mut self.binding {
            binding.watch(&collection);
        }
        self.collection = Some(collection);
        self.void_rendered();
    }

    /// Replace the render function.
    pub fn set_template<F>(&mut self, template: F)
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.template = Some(Arc::new(template));
        self.void_rendered();
    }

    /// The data bag handed to the render function: the record's data (null
    /// without a record), passed through the decorator when one is set.
    pub fn data(&self) -> Value {
        let data = self
            .record
            .as_ref()
            .map(|r| r.data())
            .unwrap_or(Value::Null);
        match &self.data_decorator {
            Some(decorate) => decorate(data),
            None => data,
        }
    }

    fn disconnect_record(&mut self) {
        if let Some(record) = &self.record {
            if let Some(conn) = self.record_conns.changed.take() {
                record.signals().changed.disconnect(conn);
            }
            for conn in self.record_conns.events.drain(..) {
                record.signals().event.disconnect(conn);
            }
        }
        self.record_conns = RecordConns::default();
    }

    fn disconnect_collection(&mut self) {
        if let (Some(collection), Some(binding)) = (&self.collection, &mut self.binding) {
            binding.unwatch(collection);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Render the view: ensure the root element exists, substitute the
    /// template, then replay child placement when the view is a composer.
    ///
    /// Template substitution is skipped when the view is lazy and its markup
    /// is current; child replay always runs.
    pub fn render(&mut self, dom: &mut dyn Dom) {
        self.render_inner(dom, false);
    }

    /// Render, re-substituting the template even when lazy and current.
    pub fn render_forced(&mut self, dom: &mut dyn Dom) {
        self.render_inner(dom, true);
    }

    fn render_inner(&mut self, dom: &mut dyn Dom, force: bool) {
        let root = self.ensure_root(dom);
        self.sync_items(dom);
        if force || !(self.lazy && self.is_rendered()) {
            if let Some(template) = &self.template {
                let markup = template(&self.data());
                dom.set_inner_markup(root, &markup);
            }
        }
        self.mark_rendered();
        tracing::trace!(target: "montage::view", view = self.id.0, tag = %self.tag, "rendered");
        self.replay_render(dom);
    }

    /// Adopt a pre-existing element as the view's root and attach children
    /// into the markup it already carries. No template substitution.
    pub fn attach(&mut self, dom: &mut dyn Dom, element: NodeId) {
        self.root = Some(element);
        self.mark_rendered();
        tracing::trace!(target: "montage::view", view = self.id.0, tag = %self.tag, "attached");
        self.sync_items(dom);
        self.replay_attach(dom);
    }

    /// Re-attach against the view's current root element.
    pub fn attach_in_place(&mut self, dom: &mut dyn Dom) {
        match self.root {
            Some(root) => self.attach(dom, root),
            None => {
                tracing::warn!(
                    target: "montage::view",
                    view = self.id.0,
                    "attach_in_place on a view with no root element"
                );
            }
        }
    }

    /// Tear the view down: destroy the root subtree and disconnect every
    /// data subscription, recursively through owned children.
    ///
    /// A view owned by a composer is also marked defunct: the parent skips
    /// it in lookups and drops its entry at the next mutation or replay, so
    /// a replay never resurrects it. Removal *via a parent* goes through the
    /// parent's `remove_view` instead, which hands the torn-down view back.
    pub fn remove(&mut self, dom: &mut dyn Dom) {
        if let Some(root) = self.root {
            dom.remove_subtree(root);
        }
        self.defunct = true;
        self.release();
    }

    /// Drop live-tree state and subscriptions without touching the tree.
    pub(crate) fn release(&mut self) {
        self.disconnect_record();
        self.disconnect_collection();
        self.root = None;
        self.void_rendered();
        if let Some(composer) = &mut self.composer {
            composer.release_children();
        }
    }

    fn ensure_root(&mut self, dom: &mut dyn Dom) -> NodeId {
        match self.root {
            Some(root) => root,
            None => {
                let root = dom.create_element(&self.tag, &self.attrs);
                self.root = Some(root);
                root
            }
        }
    }

    // ------------------------------------------------------------------
    // Events & readiness
    // ------------------------------------------------------------------

    /// Fire the view's outgoing event signal.
    ///
    /// Events reach whatever the owner connected, in particular the parent
    /// composer's forwarding rules.
    pub fn emit(&self, name: impl Into<String>, payload: Value) {
        self.events.emit(ViewEvent {
            name: name.into(),
            payload,
        });
    }

    /// A future resolving when the view's data and children are usable.
    ///
    /// Joins the record and/or collection fetches, passes that join through
    /// the ready coupler when one is set, then joins every current child's
    /// readiness. Resolves no earlier than the last constituent; rejects as
    /// soon as any constituent rejects.
    pub fn ready(&self) -> BoxFuture<'static, std::result::Result<(), ReadyError>> {
        let mut fetches: Vec<BoxFuture<'static, std::result::Result<(), FetchError>>> = Vec::new();
        if let Some(record) = &self.record {
            fetches.push(record.fetch());
        }
        if let Some(collection) = &self.collection {
            fetches.push(collection.fetch());
        }
        let own: BoxFuture<'static, std::result::Result<(), ReadyError>> = async move {
            try_join_all(fetches).await?;
            Ok(())
        }
        .boxed();
        let own = match &self.ready_coupler {
            Some(couple) => couple(own),
            None => own,
        };

        let children: Vec<_> = match &self.composer {
            Some(composer) => composer.views().map(View::ready).collect(),
            None => Vec::new(),
        };

        async move {
            own.await?;
            try_join_all(children).await?;
            Ok(())
        }
        .boxed()
    }

    /// Await the incoming record's fetch, then bind it and re-render.
    ///
    /// The tree is untouched until the fetch resolves, and untouched forever
    /// if it rejects.
    pub async fn swap_record(&mut self, dom: &mut dyn Dom, record: RecordRef) -> Result<()> {
        record.fetch().await.map_err(ReadyError::from)?;
        self.set_record(record)?;
        self.render_forced(dom);
        Ok(())
    }

    /// Await the incoming collection's fetch, then bind it and re-render.
    pub async fn swap_collection(
        &mut self,
        dom: &mut dyn Dom,
        collection: CollectionRef,
    ) -> Result<()> {
        collection
            .fetch()
            .await
            .map_err(|e| MontageError::from(ReadyError::from(e)))?;
        self.set_collection(collection);
        self.render_forced(dom);
        Ok(())
    }
}

impl Drop for View {
    fn drop(&mut self) {
        // Subscriptions must not outlive the view.
        self.disconnect_record();
        self.disconnect_collection();
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("rendered", &self.is_rendered())
            .field("root", &self.root)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
