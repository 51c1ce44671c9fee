//! Destination parsing for view placement.
//!
//! A destination is a small declarative string naming *how* and *where* a
//! child view lands inside its parent's rendered surface: a placement method
//! followed by an optional selector, e.g. `"append .sidebar"` or `"inner"`.
//! Parsed destinations are the grouping key for a composer's children: every
//! child added under an equal destination shares one ordered group.
//!
//! # Key Types
//!
//! - [`Method`] - The six placement methods
//! - [`Destination`] - A parsed `(method, selector)` pair, the group key

use std::fmt;
use std::str::FromStr;

use crate::error::DestinationError;

/// How a child view's root node is placed relative to the anchor node.
///
/// The anchor is the node the destination's selector resolves to (the parent
/// view's own root when the selector is empty).
///
/// # Related Types
///
/// - [`Destination`] - Pairs a method with its selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// Replace the anchor's content with the child.
    Inner,
    /// Replace the anchor itself with the child.
    Outer,
    /// Insert the child as the anchor's first child.
    Prepend,
    /// Insert the child as the anchor's last child.
    Append,
    /// Insert the child as the anchor's immediately-preceding sibling.
    Before,
    /// Insert the child as the anchor's immediately-following sibling.
    After,
}

impl Method {
    /// The lowercase keyword that names this method in a destination string.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
            Self::Prepend => "prepend",
            Self::Append => "append",
            Self::Before => "before",
            Self::After => "after",
        }
    }

    const ALL: [Method; 6] = [
        Self::Inner,
        Self::Outer,
        Self::Prepend,
        Self::Append,
        Self::Before,
        Self::After,
    ];
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed destination: placement method plus anchor selector.
///
/// An empty selector anchors at the parent view's own root element. Equal
/// destinations address the same child group, so two spellings that parse to
/// the same `(method, selector)` pair are interchangeable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    /// The placement method.
    pub method: Method,
    /// The anchor selector; empty means the parent view's own root.
    pub selector: String,
}

impl Destination {
    /// Build a destination from parts, trimming the selector.
    pub fn new(method: Method, selector: impl Into<String>) -> Self {
        Self {
            method,
            selector: selector.into().trim().to_string(),
        }
    }

    /// Whether the selector anchors at the parent's own root element.
    pub fn targets_root(&self) -> bool {
        self.selector.is_empty()
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    /// Parse a destination string.
    ///
    /// The method keyword must start at the first byte (leading whitespace is
    /// rejected) and is matched case-insensitively; everything after it is
    /// the selector, trimmed. `"append .slot"`, `"APPEND .slot"` and
    /// `"append   .slot"` all parse to the same destination.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        for method in Method::ALL {
            let keyword = method.keyword();
            // Byte-wise prefix compare: keywords are ASCII, so a match
            // guarantees a char boundary at the split point.
            let bytes = input.as_bytes();
            if bytes.len() >= keyword.len()
                && bytes[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
            {
                return Ok(Self::new(method, &input[keyword.len()..]));
            }
        }
        Err(DestinationError::InvalidMethod {
            input: input.to_string(),
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets_root() {
            write!(f, "{}", self.method)
        } else {
            write!(f, "{} {}", self.method, self.selector)
        }
    }
}
