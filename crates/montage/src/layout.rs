//! The composition engine.
//!
//! A composer owns child views grouped by [`Destination`]. Groups live in
//! first-use order; within a group, a child's position is simply its index
//! in the group's vector, so positions stay dense and repack automatically
//! on removal. Placement is deferred: `add_view` is pure bookkeeping, and
//! the tree only changes when a replay (`render_views` / `attach_views`)
//! walks the groups and applies each destination's insertion strategy with
//! every child's live root node.
//!
//! Replaying is idempotent because insertion always *moves* live nodes: a
//! second replay re-inserts the same roots into the same slots.

use crate::destination::Destination;
use crate::dom::Dom;
use crate::error::{BindingError, ComposeError, Result};
use crate::signal::ConnectionId;
use crate::view::{View, ViewEvent, ViewId};

/// The composition capability: child views grouped by destination.
#[derive(Default)]
pub(crate) struct Composer {
    pub(crate) groups: Vec<Group>,
}

/// One destination's ordered children.
pub(crate) struct Group {
    pub(crate) destination: Destination,
    pub(crate) children: Vec<Child>,
}

/// A child entry: the owned view plus its forwarding connections.
pub(crate) struct Child {
    pub(crate) view: View,
    forward_conns: Vec<ConnectionId>,
}

impl Composer {
    /// All live child views, group-major in positional order.
    pub(crate) fn views(&self) -> impl Iterator<Item = &View> {
        self.groups
            .iter()
            .flat_map(|group| group.children.iter())
            .filter(|child| !child.view.defunct)
            .map(|child| &child.view)
    }

    /// Disconnect forwarding and release every child's live-tree state.
    pub(crate) fn release_children(&mut self) {
        for group in &mut self.groups {
            for child in &mut group.children {
                for conn in child.forward_conns.drain(..) {
                    child.view.events.disconnect(conn);
                }
                child.view.release();
            }
        }
    }
}

impl View {
    /// Add a child view at the end of the destination's group.
    ///
    /// Pure bookkeeping: ownership of `view` moves to this composer, the
    /// child's parent handle is set, every declared forwarding rule is
    /// connected, and this view's rendered flag is voided. The tree is not
    /// touched until the next replay. Returns the child's [`ViewId`].
    ///
    /// Fails on an unparsable destination, on a forwarding rule naming an
    /// unregistered handler, or when this view has no composer.
    pub fn add_view(&mut self, destination: &str, view: View) -> Result<ViewId> {
        self.add_view_at(destination, usize::MAX, view)
    }

    /// Add a child view at `index` (clamped) within the destination's group.
    pub fn add_view_at(&mut self, destination: &str, index: usize, view: View) -> Result<ViewId> {
        let destination: Destination = destination.parse()?;
        self.add_parsed(destination, index, view)
    }

    pub(crate) fn add_parsed(
        &mut self,
        destination: Destination,
        index: usize,
        mut view: View,
    ) -> Result<ViewId> {
        if self.composer.is_none() {
            return Err(ComposeError::NotAComposer.into());
        }

        // Validate every forwarding rule before connecting anything.
        let mut rules = Vec::with_capacity(self.forward_rules.len());
        for (event, handler_name) in &self.forward_rules {
            let handler = self.handlers.get(handler_name).cloned().ok_or_else(|| {
                BindingError::UnknownHandler {
                    handler: handler_name.clone(),
                }
            })?;
            rules.push((event.clone(), handler));
        }
        let mut forward_conns = Vec::with_capacity(rules.len());
        for (event, handler) in rules {
            let conn = view.events.connect(move |ev: &ViewEvent| {
                if ev.name == event {
                    handler(ev);
                }
            });
            forward_conns.push(conn);
        }

        view.parent = Some(self.id());
        // A torn-down view handed back by `remove_view` may be re-added.
        view.defunct = false;
        let child_id = view.id();
        tracing::trace!(
            target: "montage::layout",
            destination = %destination,
            "adding child view"
        );

        if let Some(composer) = &mut self.composer {
            let group_index = match composer
                .groups
                .iter()
                .position(|g| g.destination == destination)
            {
                Some(i) => i,
                None => {
                    composer.groups.push(Group {
                        destination,
                        children: Vec::new(),
                    });
                    composer.groups.len() - 1
                }
            };
            let children = &mut composer.groups[group_index].children;
            let index = index.min(children.len());
            children.insert(index, Child {
                view,
                forward_conns,
            });
        }

        self.void_rendered();
        Ok(child_id)
    }

    /// Remove the first child of the destination's group.
    ///
    /// An unparsable or absent destination is a silent no-op returning
    /// `None`; lookups never fail. On removal the child's subtree is
    /// destroyed, its data subscriptions are dropped, and the torn-down
    /// `View` is handed back.
    pub fn remove_view(&mut self, dom: &mut dyn Dom, destination: &str) -> Option<View> {
        self.remove_view_at(dom, destination, 0)
    }

    /// Remove the child at `index` within the destination's group.
    pub fn remove_view_at(
        &mut self,
        dom: &mut dyn Dom,
        destination: &str,
        index: usize,
    ) -> Option<View> {
        let destination: Destination = destination.parse().ok()?;
        self.remove_parsed(dom, &destination, index)
    }

    /// Drop entries whose view tore itself down via [`View::remove`].
    ///
    /// A child reached through `get_view_mut` can remove itself; the parent
    /// only learns of it here. Runs at the head of every composer mutation
    /// and replay.
    pub(crate) fn purge_defunct(&mut self) {
        let Some(composer) = &mut self.composer else {
            return;
        };
        for group in &mut composer.groups {
            group.children.retain_mut(|child| {
                if !child.view.defunct {
                    return true;
                }
                for conn in child.forward_conns.drain(..) {
                    child.view.events.disconnect(conn);
                }
                false
            });
        }
        composer.groups.retain(|group| !group.children.is_empty());
    }

    /// Remove a child by identity, wherever it sits.
    pub fn remove_view_by_id(&mut self, dom: &mut dyn Dom, id: ViewId) -> Option<View> {
        self.purge_defunct();
        let (destination, index) = {
            let composer = self.composer.as_ref()?;
            composer.groups.iter().find_map(|group| {
                group
                    .children
                    .iter()
                    .position(|child| child.view.id() == id)
                    .map(|i| (group.destination.clone(), i))
            })?
        };
        self.remove_parsed(dom, &destination, index)
    }

    pub(crate) fn remove_parsed(
        &mut self,
        dom: &mut dyn Dom,
        destination: &Destination,
        index: usize,
    ) -> Option<View> {
        self.purge_defunct();
        let my_id = self.id();
        let mut child = {
            let composer = self.composer.as_mut()?;
            let group_index = composer
                .groups
                .iter()
                .position(|g| g.destination == *destination)?;
            let children = &mut composer.groups[group_index].children;
            if index >= children.len() {
                return None;
            }
            let child = children.remove(index);
            // Positions repack by construction; an emptied group gives up
            // its replay slot.
            if children.is_empty() {
                composer.groups.remove(group_index);
            }
            child
        };

        for conn in child.forward_conns.drain(..) {
            child.view.events.disconnect(conn);
        }
        if child.view.parent == Some(my_id) {
            child.view.parent = None;
        }
        child.view.remove(dom);
        self.void_rendered();
        tracing::trace!(
            target: "montage::layout",
            destination = %destination,
            index,
            "removed child view"
        );
        Some(child.view)
    }

    /// The first child of the destination's group.
    pub fn get_view(&self, destination: &str) -> Option<&View> {
        self.get_view_at(destination, 0)
    }

    /// The child at `index` within the destination's group.
    pub fn get_view_at(&self, destination: &str, index: usize) -> Option<&View> {
        let destination: Destination = destination.parse().ok()?;
        let composer = self.composer.as_ref()?;
        composer
            .groups
            .iter()
            .find(|g| g.destination == destination)?
            .children
            .iter()
            .filter(|child| !child.view.defunct)
            .nth(index)
            .map(|child| &child.view)
    }

    /// Mutable access to the child at the destination's head.
    pub fn get_view_mut(&mut self, destination: &str) -> Option<&mut View> {
        self.get_view_mut_at(destination, 0)
    }

    /// Mutable access to the child at `index` within the destination's group.
    pub fn get_view_mut_at(&mut self, destination: &str, index: usize) -> Option<&mut View> {
        let destination: Destination = destination.parse().ok()?;
        let composer = self.composer.as_mut()?;
        composer
            .groups
            .iter_mut()
            .find(|g| g.destination == destination)?
            .children
            .iter_mut()
            .filter(|child| !child.view.defunct)
            .nth(index)
            .map(|child| &mut child.view)
    }

    /// All children of the destination's group, in positional order.
    pub fn find_views(&self, destination: &str) -> Vec<&View> {
        let Ok(destination) = destination.parse::<Destination>() else {
            return Vec::new();
        };
        let Some(composer) = self.composer.as_ref() else {
            return Vec::new();
        };
        composer
            .groups
            .iter()
            .find(|g| g.destination == destination)
            .map(|group| {
                group
                    .children
                    .iter()
                    .filter(|child| !child.view.defunct)
                    .map(|child| &child.view)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the whole child tree: remove every current child, then add
    /// each `(destination, view)` pair in order. A teardown and rebuild, not
    /// a diff.
    pub fn reset_views<I>(&mut self, dom: &mut dyn Dom, mapping: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, View)>,
    {
        if self.composer.is_none() {
            return Err(ComposeError::NotAComposer.into());
        }
        let ids: Vec<ViewId> = self
            .composer
            .iter()
            .flat_map(|c| c.views())
            .map(View::id)
            .collect();
        for id in ids {
            self.remove_view_by_id(dom, id);
        }
        for (destination, view) in mapping {
            self.add_view(&destination, view)?;
        }
        Ok(())
    }

    /// Swap the occupant at the head of the destination's group for
    /// `new_view`, gated on the incoming view's readiness.
    ///
    /// The tree is unchanged while the readiness future is pending and
    /// unchanged forever if it rejects. On success the old occupant (if any)
    /// is removed and returned, the new view takes its position, and all
    /// children re-render.
    pub async fn swap_view(
        &mut self,
        dom: &mut dyn Dom,
        destination: &str,
        new_view: View,
    ) -> Result<Option<View>> {
        self.swap_view_at(dom, destination, 0, new_view).await
    }

    /// Swap the occupant at `index` within the destination's group.
    pub async fn swap_view_at(
        &mut self,
        dom: &mut dyn Dom,
        destination: &str,
        index: usize,
        new_view: View,
    ) -> Result<Option<View>> {
        if self.composer.is_none() {
            return Err(ComposeError::NotAComposer.into());
        }
        let destination: Destination = destination.parse()?;

        let readiness = new_view.ready();
        readiness.await?;

        let old = self.remove_parsed(dom, &destination, index);
        self.add_parsed(destination, index, new_view)?;
        self.sync_items(dom);
        self.replay_render(dom);
        Ok(old)
    }

    /// Render and place every child: drain pending collection events, then
    /// for each group in first-use order resolve the anchor and apply the
    /// insertion strategy with each child's live root, in positional order.
    pub fn render_views(&mut self, dom: &mut dyn Dom) -> Result<()> {
        if self.composer.is_none() {
            return Err(ComposeError::NotAComposer.into());
        }
        self.sync_items(dom);
        self.replay_render(dom);
        Ok(())
    }

    /// Attach every child against markup already in the tree: same replay as
    /// [`render_views`](Self::render_views) but in lookup mode. A child
    /// whose node cannot be located is left un-attached for the next render.
    pub fn attach_views(&mut self, dom: &mut dyn Dom) -> Result<()> {
        if self.composer.is_none() {
            return Err(ComposeError::NotAComposer.into());
        }
        self.sync_items(dom);
        self.replay_attach(dom);
        Ok(())
    }

    pub(crate) fn replay_render(&mut self, dom: &mut dyn Dom) {
        self.purge_defunct();
        let Some(mut composer) = self.composer.take() else {
            return;
        };
        let Some(root) = self.root else {
            if !composer.groups.is_empty() {
                tracing::warn!(
                    target: "montage::layout",
                    "render_views on a view with no root element"
                );
            }
            self.composer = Some(composer);
            return;
        };
        for group in &mut composer.groups {
            let anchor = if group.destination.targets_root() {
                root
            } else {
                match dom.select(root, &group.destination.selector) {
                    Some(node) => node,
                    None => {
                        tracing::warn!(
                            target: "montage::layout",
                            selector = %group.destination.selector,
                            "anchor not found, skipping group"
                        );
                        continue;
                    }
                }
            };
            for child in &mut group.children {
                child.view.render(dom);
                if let Some(node) = child.view.root {
                    group.destination.method.insert(dom, anchor, node);
                }
            }
        }
        self.composer = Some(composer);
    }

    pub(crate) fn replay_attach(&mut self, dom: &mut dyn Dom) {
        self.purge_defunct();
        let Some(mut composer) = self.composer.take() else {
            return;
        };
        let Some(root) = self.root else {
            self.composer = Some(composer);
            return;
        };
        for group in &mut composer.groups {
            let anchor = if group.destination.targets_root() {
                root
            } else {
                match dom.select(root, &group.destination.selector) {
                    Some(node) => node,
                    None => continue,
                }
            };
            let total = group.children.len();
            for (position, child) in group.children.iter_mut().enumerate() {
                match group.destination.method.locate(dom, anchor, position, total) {
                    Some(node) => child.view.attach(dom, node),
                    None => {
                        tracing::trace!(
                            target: "montage::layout",
                            destination = %group.destination,
                            position,
                            "no node to attach; child left un-attached"
                        );
                    }
                }
            }
        }
        self.composer = Some(composer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use crate::error::MontageError;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn leaf(text: &str) -> View {
        let text = text.to_string();
        View::new("span").with_template(move |_| text.clone())
    }

    #[test]
    fn test_add_view_requires_composer() {
        let mut plain = View::new("div");
        let err = plain.add_view("append", leaf("x")).unwrap_err();
        assert_eq!(err, MontageError::Compose(ComposeError::NotAComposer));
    }

    #[test]
    fn test_add_view_is_bookkeeping_only() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        layout.render(&mut dom);
        assert!(layout.is_rendered());

        let id = layout.add_view("append", leaf("a")).unwrap();
        // No tree mutation, but the host is voided.
        assert_eq!(dom.inner_markup(layout.root().unwrap()), "");
        assert!(!layout.is_rendered());
        assert_eq!(layout.get_view("append").unwrap().id(), id);
        assert_eq!(layout.get_view("append").unwrap().parent(), Some(layout.id()));
    }

    #[test]
    fn test_group_order_and_positions() {
        let mut layout = View::layout("div");
        layout.add_view("append .a", leaf("0")).unwrap();
        layout.add_view("prepend .b", leaf("1")).unwrap();
        let mid = layout.add_view_at("append .a", 1, leaf("2")).unwrap();
        layout.add_view("append .a", leaf("3")).unwrap();

        let views = layout.find_views("append .a");
        assert_eq!(views.len(), 3);
        assert_eq!(views[1].id(), mid);
        // Spelling differences in whitespace address the same group.
        assert_eq!(layout.find_views("append   .a").len(), 3);
        assert_eq!(layout.find_views("prepend .b").len(), 1);
        assert!(layout.find_views("append .zzz").is_empty());
        assert!(layout.find_views("not-a-method").is_empty());
    }

    #[test]
    fn test_remove_view_repacks_positions() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        layout.add_view("append", leaf("a")).unwrap();
        let b = layout.add_view("append", leaf("b")).unwrap();
        layout.add_view("append", leaf("c")).unwrap();

        let removed = layout.remove_view_at(&mut dom, "append", 0).unwrap();
        assert_eq!(removed.parent(), None);
        let views = layout.find_views("append");
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id(), b);

        // Misses are silent.
        assert!(layout.remove_view_at(&mut dom, "append", 9).is_none());
        assert!(layout.remove_view(&mut dom, "inner .gone").is_none());
        assert!(layout.remove_view(&mut dom, "bogus dest").is_none());
    }

    #[test]
    fn test_remove_view_destroys_child_subtree() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        let id = layout.add_view("append", leaf("a")).unwrap();
        layout.render(&mut dom);

        let child_root = layout.get_view("append").unwrap().root().unwrap();
        assert!(dom.contains(child_root));

        layout.remove_view_by_id(&mut dom, id).unwrap();
        assert!(!dom.contains(child_root));
        assert_eq!(dom.inner_markup(layout.root().unwrap()), "");
    }

    #[test]
    fn test_child_initiated_remove_drops_its_entry() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        layout.add_view("append", leaf("x")).unwrap();
        layout.render(&mut dom);

        // A child reached by handle can tear itself down; the parent must
        // not keep a live entry for it.
        layout.get_view_mut("append").unwrap().remove(&mut dom);
        assert!(layout.find_views("append").is_empty());
        assert!(layout.get_view("append").is_none());

        // And the next replay must not resurrect it.
        layout.render(&mut dom);
        assert_eq!(dom.inner_markup(layout.root().unwrap()), "");
    }

    #[test]
    fn test_removed_view_can_be_added_back() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        layout.add_view("append", leaf("a")).unwrap();
        layout.render(&mut dom);

        let view = layout.remove_view(&mut dom, "append").unwrap();
        layout.add_view("prepend", view).unwrap();
        layout.render(&mut dom);
        assert_eq!(dom.inner_markup(layout.root().unwrap()), "<span>a</span>");
    }

    #[test]
    fn test_forwarding_connects_and_disconnects() {
        let mut dom = MemoryDom::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut layout = View::layout("div")
            .with_handler("on_pick", move |ev: &ViewEvent| {
                seen_clone.lock().push(ev.payload.clone());
            })
            .with_forward("pick", "on_pick");

        layout.add_view("append", leaf("a")).unwrap();
        layout.get_view("append").unwrap().emit("pick", json!(1));
        layout.get_view("append").unwrap().emit("other", json!(2));
        assert_eq!(*seen.lock(), vec![json!(1)]);

        let removed = layout.remove_view(&mut dom, "append").unwrap();
        removed.emit("pick", json!(3));
        assert_eq!(*seen.lock(), vec![json!(1)]);
    }

    #[test]
    fn test_forwarding_unknown_handler_is_error() {
        let mut layout = View::layout("div").with_forward("pick", "missing");
        let err = layout.add_view("append", leaf("a")).unwrap_err();
        assert_eq!(
            err,
            MontageError::Binding(BindingError::UnknownHandler {
                handler: "missing".to_string()
            })
        );
        assert!(layout.find_views("append").is_empty());
    }

    #[test]
    fn test_reset_views_rebuilds() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div");
        layout.add_view("append", leaf("a")).unwrap();
        layout.add_view("prepend", leaf("b")).unwrap();

        layout
            .reset_views(&mut dom, vec![("inner".to_string(), leaf("c"))])
            .unwrap();
        assert!(layout.find_views("append").is_empty());
        assert!(layout.find_views("prepend").is_empty());
        assert_eq!(layout.find_views("inner").len(), 1);
    }

    #[test]
    fn test_render_views_skips_missing_anchor() {
        let mut dom = MemoryDom::new();
        let mut layout = View::layout("div").with_template(|_| "<div class=\"here\"/>".to_string());
        layout.add_view("append .gone", leaf("x")).unwrap();
        layout.add_view("append .here", leaf("y")).unwrap();

        layout.render(&mut dom);
        assert_eq!(
            dom.inner_markup(layout.root().unwrap()),
            "<div class=\"here\"><span>y</span></div>"
        );
    }
}
