//! View composition for element trees.
//!
//! Montage assembles a tree of independently-lifecycled views into a host
//! view's rendered surface, keeps that tree synchronized with a data
//! collection, and separates attaching to existing markup from rendering
//! fresh markup:
//!
//! - **Destinations**: Declarative placement strings (`"append .sidebar"`)
//!   parsed once and used as the grouping key for child views
//! - **Insertion Strategies**: Six placement methods with an idempotent
//!   mutation mode (render) and a lookup mode (attach)
//! - **Views**: One element each, with optional record binding, lazy
//!   re-render, and an outgoing event signal
//! - **Composition**: Parents own children grouped by destination; placement
//!   replays group-major in positional order
//! - **Lists**: A child view per collection member, mirrored through a
//!   pending-event queue
//! - **Readiness**: An async join over data fetches and child readiness,
//!   gating view swaps so the tree never shows a half-loaded state
//!
//! The tree itself is a capability: every operation that touches markup
//! takes `&mut dyn Dom`. The bundled [`MemoryDom`] backs the test suite and
//! server-side composition.
//!
//! # Composing Views
//!
//! ```
//! use montage::{MemoryDom, View};
//!
//! let mut dom = MemoryDom::new();
//!
//! let mut page = View::layout("div")
//!     .with_id("page")
//!     .with_template(|_| "<header/><main class=\"content\"/>".to_string());
//! page.add_view(
//!     "append .content",
//!     View::new("p").with_template(|_| "hello".to_string()),
//! )?;
//!
//! page.render(&mut dom);
//! let root = page.root().unwrap();
//! assert_eq!(
//!     dom.outer_markup(root),
//!     "<div id=\"page\"><header/><main class=\"content\"><p>hello</p></main></div>"
//! );
//! # Ok::<(), montage::MontageError>(())
//! ```
//!
//! # Mirroring a Collection
//!
//! ```
//! use std::sync::Arc;
//! use montage::{ListCollection, ListConfig, MemoryDom, RecordRef, ValueRecord, View};
//! use serde_json::json;
//!
//! let mut dom = MemoryDom::new();
//! let items = Arc::new(ListCollection::new());
//!
//! let mut list = View::list(
//!     "ul",
//!     ListConfig::new().with_factory(|_: &RecordRef| {
//!         View::new("li").with_template(|data| data["label"].as_str().unwrap_or("").to_string())
//!     }),
//! )?
//! .with_collection(items.clone());
//!
//! items.add(Arc::new(ValueRecord::new(json!({ "label": "one" }))));
//! list.render(&mut dom);
//! assert_eq!(dom.inner_markup(list.root().unwrap()), "<li>one</li>");
//! # Ok::<(), montage::MontageError>(())
//! ```

mod destination;
mod dom;
mod error;
mod insertion;
mod layout;
mod list;
mod model;
pub mod signal;
mod view;

pub use destination::{Destination, Method};
pub use dom::{Dom, MemoryDom, NodeId};
pub use error::{
    BindingError, ComposeError, DestinationError, FetchError, ListError, MontageError, ReadyError,
    Result,
};
pub use list::{ItemFactory, ListConfig};
pub use model::{
    same_record, Collection, CollectionRef, CollectionSignals, ListCollection, Record, RecordRef,
    RecordSignals, ValueRecord,
};
pub use signal::{ConnectionId, Signal};
pub use view::{DataFn, Handler, ReadyCoupler, RenderFn, View, ViewEvent, ViewId};
