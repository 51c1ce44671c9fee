//! In-memory element tree.
//!
//! A slotmap arena of elements with markup parsing and deterministic
//! serialization. This is the tree the test suite composes against and a
//! reasonable surface for server-side composition; anything fancier plugs in
//! behind the [`Dom`] trait instead.
//!
//! The selector engine is the subset the composition engine needs: `tag`,
//! `#id`, `.class`, and compounds thereof (`div.item`, `.a.b`).

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use slotmap::SlotMap;

use super::{Dom, NodeId};

#[derive(Debug, Default, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    /// Text content, serialized before any child elements.
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An in-memory [`Dom`] implementation.
///
/// Nodes live in an arena and survive detachment; only
/// [`remove_subtree`](Dom::remove_subtree) frees them. Serialization is
/// deterministic (attributes in insertion order, `<tag/>` for empty
/// elements), so tests can assert whole-markup equality.
#[derive(Default)]
pub struct MemoryDom {
    nodes: SlotMap<NodeId, Element>,
}

impl MemoryDom {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the node is still alive in the arena.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// The node's tag name, if it is alive.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|el| el.tag.as_str())
    }

    /// An attribute value, if the node is alive and carries the attribute.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the node's text content, leaving child elements in place.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(el) = self.nodes.get_mut(node) {
            el.text = text.to_string();
        }
    }

    /// Serialize the node's content (text, then children).
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(el) = self.nodes.get(node) {
            out.push_str(&escape(el.text.as_str()));
            for &child in &el.children {
                self.write_node(child, &mut out);
            }
        }
        out
    }

    /// Serialize the node itself, including its content.
    pub fn outer_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(el) = self.nodes.get(node) else {
            return;
        };
        out.push('<');
        out.push_str(&el.tag);
        for (key, value) in &el.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if el.text.is_empty() && el.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(el.text.as_str()));
        for &child in &el.children {
            self.write_node(child, out);
        }
        out.push_str("</");
        out.push_str(&el.tag);
        out.push('>');
    }

    fn position_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes.get(node)?.parent?;
        let index = self
            .nodes
            .get(parent)?
            .children
            .iter()
            .position(|&c| c == node)?;
        Some((parent, index))
    }

    /// Detach `node` and link it under `parent` at `index` (clamped).
    fn link_at(&mut self, parent: NodeId, node: NodeId, index: usize) {
        if parent == node || !self.nodes.contains_key(parent) || !self.nodes.contains_key(node) {
            return;
        }
        self.detach(node);
        if let Some(el) = self.nodes.get_mut(node) {
            el.parent = Some(parent);
        }
        if let Some(el) = self.nodes.get_mut(parent) {
            let index = index.min(el.children.len());
            el.children.insert(index, node);
        }
    }

    fn element_from_start(&mut self, start: &BytesStart<'_>) -> NodeId {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            match attr.unescape_value() {
                Ok(value) => attrs.push((key, value.into_owned())),
                Err(err) => {
                    tracing::warn!(target: "montage::dom", %err, "skipping malformed attribute");
                }
            }
        }
        self.nodes.insert(Element {
            tag,
            attrs,
            ..Default::default()
        })
    }
}

impl Dom for MemoryDom {
    fn create_element(&mut self, tag: &str, attrs: &[(String, String)]) -> NodeId {
        self.nodes.insert(Element {
            tag: tag.to_string(),
            attrs: attrs.to_vec(),
            ..Default::default()
        })
    }

    fn set_inner_markup(&mut self, node: NodeId, markup: &str) {
        if !self.nodes.contains_key(node) {
            return;
        }
        // Previous content is detached, never destroyed: a child view's live
        // root must survive its host's re-render.
        self.detach_children(node);
        self.set_text(node, "");

        let mut reader = Reader::from_str(markup);
        reader.config_mut().trim_text(true);

        let mut stack = vec![node];
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref start)) => {
                    let child = self.element_from_start(start);
                    if let Some(&parent) = stack.last() {
                        self.link_at(parent, child, usize::MAX);
                    }
                    stack.push(child);
                }
                Ok(Event::Empty(ref start)) => {
                    let child = self.element_from_start(start);
                    if let Some(&parent) = stack.last() {
                        self.link_at(parent, child, usize::MAX);
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Ok(raw) = std::str::from_utf8(t.as_ref()) {
                        let text = unescape(raw)
                            .map(|cow| cow.into_owned())
                            .unwrap_or_else(|_| raw.to_string());
                        if let Some(&current) = stack.last() {
                            if let Some(el) = self.nodes.get_mut(current) {
                                el.text.push_str(&text);
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(target: "montage::dom", %err, "stopping on malformed markup");
                    break;
                }
            }
        }
    }

    fn select(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.find_first(root, &selector)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|el| el.children.clone())
            .unwrap_or_default()
    }

    fn preceding_siblings(&self, node: NodeId) -> Vec<NodeId> {
        match self.position_in_parent(node) {
            Some((parent, index)) => {
                let mut siblings = self.children(parent)[..index].to_vec();
                siblings.reverse();
                siblings
            }
            None => Vec::new(),
        }
    }

    fn following_siblings(&self, node: NodeId) -> Vec<NodeId> {
        match self.position_in_parent(node) {
            Some((parent, index)) => self.children(parent)[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    fn detach_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = match self.nodes.get_mut(node) {
            Some(el) => std::mem::take(&mut el.children),
            None => return Vec::new(),
        };
        for &child in &children {
            if let Some(el) = self.nodes.get_mut(child) {
                el.parent = None;
            }
        }
        children
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.link_at(parent, child, usize::MAX);
    }

    fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.link_at(parent, child, 0);
    }

    fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        // Detach first so the anchor's index is computed in the final tree.
        self.detach(node);
        if let Some((parent, index)) = self.position_in_parent(anchor) {
            self.link_at(parent, node, index);
        }
    }

    fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.detach(node);
        if let Some((parent, index)) = self.position_in_parent(anchor) {
            self.link_at(parent, node, index + 1);
        }
    }

    fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        if let Some((parent, index)) = self.position_in_parent(old) {
            self.detach(old);
            self.link_at(parent, new, index);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some((parent, index)) = self.position_in_parent(node) {
            if let Some(el) = self.nodes.get_mut(parent) {
                el.children.remove(index);
            }
        }
        if let Some(el) = self.nodes.get_mut(node) {
            el.parent = None;
        }
    }

    fn remove_subtree(&mut self, node: NodeId) {
        self.detach(node);
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(el) = self.nodes.remove(current) {
                pending.extend(el.children);
            }
        }
    }
}

impl MemoryDom {
    fn find_first(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        for &child in &self.nodes.get(node)?.children {
            if let Some(el) = self.nodes.get(child) {
                if selector.matches(el) {
                    return Some(child);
                }
            }
            if let Some(found) = self.find_first(child, selector) {
                return Some(found);
            }
        }
        None
    }
}

/// A parsed compound selector: optional tag plus id/class requirements.
#[derive(Debug, Default)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parse the supported subset; `None` for empty or unsupported input.
    fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let mut selector = Selector::default();
        let mut rest = input;
        if !rest.starts_with(['#', '.']) {
            let end = rest.find(['#', '.']).unwrap_or(rest.len());
            selector.tag = Some(rest[..end].to_string());
            rest = &rest[end..];
        }
        while !rest.is_empty() {
            let marker = rest.chars().next()?;
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let segment = &body[..end];
            if segment.is_empty() {
                return None;
            }
            match marker {
                '#' => selector.id = Some(segment.to_string()),
                '.' => selector.classes.push(segment.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }
        Some(selector)
    }

    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            let found = el.attrs.iter().any(|(k, v)| k == "id" && v == id);
            if !found {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = el
                .attrs
                .iter()
                .find(|(k, _)| k == "class")
                .map(|(_, v)| v.as_str())
                .unwrap_or("");
            let have: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_and_serialize() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<h1>Title</h1><ul class=\"items\"><li/></ul>");
        assert_eq!(
            dom.inner_markup(root),
            "<h1>Title</h1><ul class=\"items\"><li/></ul>"
        );
        assert_eq!(
            dom.outer_markup(root),
            "<div><h1>Title</h1><ul class=\"items\"><li/></ul></div>"
        );
    }

    #[test]
    fn test_text_unescaped_on_parse_escaped_on_write() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<p>a &amp; b</p>");
        let p = dom.select(root, "p").unwrap();
        assert_eq!(dom.inner_markup(p), "a &amp; b");
    }

    #[test]
    fn test_select_subset() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(
            root,
            "<section id=\"main\"><p class=\"lead big\">x</p><p class=\"lead\">y</p></section>",
        );

        assert_eq!(dom.tag(dom.select(root, "#main").unwrap()), Some("section"));
        let lead = dom.select(root, ".lead").unwrap();
        assert_eq!(dom.inner_markup(lead), "x");
        let compound = dom.select(root, "p.lead.big").unwrap();
        assert_eq!(compound, lead);
        assert!(dom.select(root, ".missing").is_none());
        // The root itself is never a match.
        assert!(dom.select(root, "div").is_none());
    }

    #[test]
    fn test_set_inner_markup_detaches_not_destroys() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        let child = dom.create_element("span", &attrs(&[("class", "kept")]));
        dom.append_child(root, child);

        dom.set_inner_markup(root, "<p/>");
        assert!(dom.contains(child));
        assert_eq!(dom.outer_markup(child), "<span class=\"kept\"/>");

        dom.append_child(root, child);
        assert_eq!(dom.inner_markup(root), "<p/><span class=\"kept\"/>");
    }

    #[test]
    fn test_insertion_moves_live_nodes() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<a/><b/>");
        let a = dom.select(root, "a").unwrap();
        let b = dom.select(root, "b").unwrap();

        // Re-appending an existing child moves it, never duplicates it.
        dom.append_child(root, a);
        assert_eq!(dom.inner_markup(root), "<b/><a/>");

        dom.insert_before(b, a);
        assert_eq!(dom.inner_markup(root), "<a/><b/>");
        dom.insert_after(b, a);
        assert_eq!(dom.inner_markup(root), "<b/><a/>");
    }

    #[test]
    fn test_sibling_queries_nearest_first() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<a/><b/><c/><d/>");
        let c = dom.select(root, "c").unwrap();

        let before: Vec<_> = dom
            .preceding_siblings(c)
            .iter()
            .map(|&n| dom.tag(n).unwrap().to_string())
            .collect();
        assert_eq!(before, vec!["b", "a"]);

        let after: Vec<_> = dom
            .following_siblings(c)
            .iter()
            .map(|&n| dom.tag(n).unwrap().to_string())
            .collect();
        assert_eq!(after, vec!["d"]);
    }

    #[test]
    fn test_replace_detaches_old() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<a/><b/>");
        let a = dom.select(root, "a").unwrap();
        let fresh = dom.create_element("c", &[]);

        dom.replace(a, fresh);
        assert_eq!(dom.inner_markup(root), "<c/><b/>");
        assert!(dom.contains(a));
        assert!(dom.children(root).iter().all(|&n| n != a));
    }

    #[test]
    fn test_remove_subtree_frees_descendants() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<ul><li><em/></li></ul>");
        let ul = dom.select(root, "ul").unwrap();
        let em = dom.select(root, "em").unwrap();

        dom.remove_subtree(ul);
        assert!(!dom.contains(ul));
        assert!(!dom.contains(em));
        assert_eq!(dom.inner_markup(root), "");
    }

    #[test]
    fn test_malformed_markup_stops_quietly() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div", &[]);
        dom.set_inner_markup(root, "<p><broken");
        // The well-formed prefix is kept.
        assert_eq!(dom.inner_markup(root), "<p/>");
    }
}
