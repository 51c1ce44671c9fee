//! Insertion strategies.
//!
//! Each placement method carries two behaviors: `insert` mutates the tree to
//! place a child's root node relative to an anchor, and `locate` finds the
//! node a previously-placed child occupies, given the child's position within
//! its group and the group's size.
//!
//! `locate` indexes from the appropriate end of the relevant node list so it
//! stays correct when the anchor already carried markup of its own before the
//! group was placed: an `append` group occupies the *last* `total` children,
//! a `prepend` group the *first* `total`, and the sibling methods count
//! nearest-first from the anchor.

use crate::destination::Method;
use crate::dom::{Dom, NodeId};

impl Method {
    /// Place `fragment` relative to `anchor`.
    ///
    /// Always inserts the live node (moving it if it is already in the tree),
    /// so replaying an insertion never duplicates markup. `outer` is a no-op
    /// when the fragment *is* the anchor: a view that replaced a placeholder
    /// must not replace itself away on re-render.
    pub fn insert(self, dom: &mut dyn Dom, anchor: NodeId, fragment: NodeId) {
        match self {
            Self::Inner => {
                dom.detach_children(anchor);
                dom.append_child(anchor, fragment);
            }
            Self::Outer => {
                if fragment != anchor {
                    dom.replace(anchor, fragment);
                }
            }
            Self::Prepend => dom.prepend_child(anchor, fragment),
            Self::Append => dom.append_child(anchor, fragment),
            Self::Before => dom.insert_before(anchor, fragment),
            Self::After => dom.insert_after(anchor, fragment),
        }
    }

    /// Find the node occupied by the child at `position` in a group of
    /// `total` children placed by this method at `anchor`.
    ///
    /// Returns `None` when the group is empty or the arithmetic runs off the
    /// end of the node list (the group was never placed, or the tree changed
    /// underneath it).
    pub fn locate(
        self,
        dom: &dyn Dom,
        anchor: NodeId,
        position: usize,
        total: usize,
    ) -> Option<NodeId> {
        match self {
            Self::Inner => dom.children(anchor).first().copied(),
            Self::Outer => Some(anchor),
            Self::Prepend => {
                // Prepends stack at the front in reverse arrival order.
                let index = total.checked_sub(1)?.checked_sub(position)?;
                dom.children(anchor).get(index).copied()
            }
            Self::Append => {
                // The group occupies the last `total` children.
                let children = dom.children(anchor);
                let index = children.len().checked_sub(total)?.checked_add(position)?;
                children.get(index).copied()
            }
            Self::Before => {
                let index = total.checked_sub(1)?.checked_sub(position)?;
                dom.preceding_siblings(anchor).get(index).copied()
            }
            Self::After => {
                let index = total.checked_sub(1)?.checked_sub(position)?;
                dom.following_siblings(anchor).get(index).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    /// Place `count` fresh elements with `method`, returning them in
    /// positional order.
    fn place(dom: &mut MemoryDom, method: Method, anchor: NodeId, count: usize) -> Vec<NodeId> {
        (0..count)
            .map(|i| {
                let node = dom.create_element("x", &[(String::from("n"), i.to_string())]);
                method.insert(dom, anchor, node);
                node
            })
            .collect()
    }

    #[test]
    fn test_inner_keeps_single_child() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element("div", &[]);
        dom.set_inner_markup(host, "<p>old</p>");

        let placed = place(&mut dom, Method::Inner, host, 2);
        // Each inner insertion clears current content; only the last remains.
        assert_eq!(dom.children(host), vec![placed[1]]);
        assert_eq!(Method::Inner.locate(&dom, host, 0, 1), Some(placed[1]));
    }

    #[test]
    fn test_outer_replaces_with_self_guard() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<span class=\"slot\"/><hr/>");
        let slot = dom.select(root, ".slot").unwrap();

        let fragment = dom.create_element("article", &[]);
        Method::Outer.insert(&mut dom, slot, fragment);
        assert_eq!(dom.inner_markup(root), "<article/><hr/>");

        // Replacing a node with itself must not detach it.
        Method::Outer.insert(&mut dom, fragment, fragment);
        assert_eq!(dom.inner_markup(root), "<article/><hr/>");
        assert_eq!(Method::Outer.locate(&dom, fragment, 0, 1), Some(fragment));
    }

    #[test]
    fn test_append_locate_tolerates_existing_markup() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element("ul", &[]);
        dom.set_inner_markup(host, "<li class=\"static\"/>");

        let placed = place(&mut dom, Method::Append, host, 3);
        for (position, &node) in placed.iter().enumerate() {
            assert_eq!(Method::Append.locate(&dom, host, position, 3), Some(node));
        }
    }

    #[test]
    fn test_prepend_stacks_in_reverse() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element("ul", &[]);
        dom.set_inner_markup(host, "<li class=\"static\"/>");

        let placed = place(&mut dom, Method::Prepend, host, 3);
        // DOM order is reversed; locate undoes the reversal.
        for (position, &node) in placed.iter().enumerate() {
            assert_eq!(Method::Prepend.locate(&dom, host, position, 3), Some(node));
        }
        let statics = dom.select(host, ".static").unwrap();
        assert_eq!(dom.children(host)[3], statics);
    }

    #[test]
    fn test_sibling_methods_count_from_anchor() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<main/>");
        let anchor = dom.select(root, "main").unwrap();

        let before = place(&mut dom, Method::Before, anchor, 2);
        let after = place(&mut dom, Method::After, anchor, 2);

        for (position, &node) in before.iter().enumerate() {
            assert_eq!(Method::Before.locate(&dom, anchor, position, 2), Some(node));
        }
        for (position, &node) in after.iter().enumerate() {
            assert_eq!(Method::After.locate(&dom, anchor, position, 2), Some(node));
        }
    }

    #[test]
    fn test_locate_empty_group_is_none() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element("div", &[]);
        dom.set_inner_markup(host, "<p/>");

        for method in [Method::Prepend, Method::Append, Method::Before, Method::After] {
            assert_eq!(method.locate(&dom, host, 0, 0), None);
        }
    }

    #[test]
    fn test_locate_out_of_range_is_none() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element("div", &[]);
        place(&mut dom, Method::Append, host, 1);

        assert_eq!(Method::Append.locate(&dom, host, 3, 4), None);
        assert_eq!(Method::Prepend.locate(&dom, host, 0, 5), None);
    }
}
