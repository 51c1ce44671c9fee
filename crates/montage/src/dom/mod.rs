//! The tree-mutation capability.
//!
//! The composition engine never owns a document tree. Every operation that
//! touches markup takes `&mut dyn Dom`, so hosts decide what the tree is: the
//! bundled [`MemoryDom`] for tests and server-side composition, or an adapter
//! over whatever surface the application renders into.
//!
//! Detachment and destruction are distinct on purpose. Re-rendering a host
//! element replaces its template content but only *detaches* the previous
//! child nodes; a child view's live root survives its parent's re-render and
//! is re-inserted by the next replay, which is what makes re-render
//! idempotent.
//!
//! # Key Types
//!
//! - [`Dom`] - The object-safe tree capability
//! - [`NodeId`] - Stable handle to an element node
//! - [`MemoryDom`] - The bundled in-memory implementation

mod memory;

pub use memory::MemoryDom;

use slotmap::new_key_type;

new_key_type! {
    /// A stable handle to an element node.
    ///
    /// Handles stay valid while the node is merely detached; only
    /// [`Dom::remove_subtree`] invalidates them.
    pub struct NodeId;
}

/// Tree mutation and traversal primitives the engine composes against.
///
/// Implementations must uphold two contracts:
///
/// - [`set_inner_markup`](Self::set_inner_markup) detaches the previous
///   children rather than destroying them;
/// - every insertion primitive first detaches the inserted node from its
///   current parent, so inserting a live node *moves* it.
pub trait Dom {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str, attrs: &[(String, String)]) -> NodeId;

    /// Replace the node's content with parsed markup.
    ///
    /// Previous child nodes are detached, not destroyed.
    fn set_inner_markup(&mut self, node: NodeId, markup: &str);

    /// First descendant of `root` (excluding `root` itself) matching the
    /// selector, in document order.
    fn select(&self, root: NodeId, selector: &str) -> Option<NodeId>;

    /// The node's children, in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// The node's preceding siblings, nearest first.
    fn preceding_siblings(&self, node: NodeId) -> Vec<NodeId>;

    /// The node's following siblings, nearest first.
    fn following_siblings(&self, node: NodeId) -> Vec<NodeId>;

    /// Detach all children, returning them in document order.
    fn detach_children(&mut self, node: NodeId) -> Vec<NodeId>;

    /// Insert `child` as the last child of `parent`.
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `child` as the first child of `parent`.
    fn prepend_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `node` as the sibling immediately before `anchor`.
    fn insert_before(&mut self, anchor: NodeId, node: NodeId);

    /// Insert `node` as the sibling immediately after `anchor`.
    fn insert_after(&mut self, anchor: NodeId, node: NodeId);

    /// Replace `old` with `new` in `old`'s parent; `old` is detached.
    fn replace(&mut self, old: NodeId, new: NodeId);

    /// Unlink the node from its parent, keeping it alive.
    fn detach(&mut self, node: NodeId);

    /// Destroy the node and its whole subtree.
    fn remove_subtree(&mut self, node: NodeId);
}
