//! Error types for Montage.

use thiserror::Error;

/// Errors from parsing a destination string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// The destination did not start with a recognized placement method.
    #[error("destination {input:?} does not start with a placement method")]
    InvalidMethod {
        /// The rejected destination string, verbatim.
        input: String,
    },
}

/// Errors from wiring declared event-forwarding rules between views.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A forwarding rule named a handler the receiving view never registered.
    #[error("no handler named {handler:?} registered on the receiving view")]
    UnknownHandler {
        /// The missing handler name.
        handler: String,
    },
}

/// Errors from configuring a collection-bound list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    /// A list view was bound to a collection without an item view factory.
    #[error("list binding requires an item view factory")]
    MissingItemFactory,
}

/// Errors from child-view management operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A child-management operation was invoked on a view without a composer.
    #[error("view has no composer; construct it with View::layout() to manage child views")]
    NotAComposer,
}

/// A failed record or collection fetch, carrying the source's own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Errors surfaced by the readiness join.
///
/// Readiness settles only after every data fetch and every child view has
/// settled; the first rejection wins and is reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadyError {
    /// A record or collection fetch rejected.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The readiness coupler rejected after the fetches settled.
    #[error("readiness coupler rejected: {0}")]
    Coupler(String),
}

/// The main error type for Montage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MontageError {
    /// Destination parse failure.
    #[error(transparent)]
    Destination(#[from] DestinationError),
    /// Event-forwarding rule failure.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// List configuration failure.
    #[error(transparent)]
    List(#[from] ListError),
    /// Child-view management failure.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// Readiness rejection.
    #[error(transparent)]
    Ready(#[from] ReadyError),
}

/// A specialized Result type for Montage operations.
pub type Result<T> = std::result::Result<T, MontageError>;
