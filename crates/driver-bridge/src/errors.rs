//! Error signals raised across the driver boundary.

use thiserror::Error;

/// Driver error enumeration.
///
/// The engine branches on these: staleness is recovered with a single
/// transparent retry, "not interactable" is polled on under the right
/// preconditions, and window closure aborts the operation.
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    /// The handle refers to a node that is no longer attached.
    #[error("stale node reference: {0}")]
    Stale(String),

    /// A per-node call was issued against an unknown handle.
    #[error("no such node: {0}")]
    NoSuchNode(String),

    /// A frame in the query root's frame path could not be entered.
    #[error("no such frame: {0}")]
    NoSuchFrame(String),

    /// The node exists but cannot receive the interaction yet.
    #[error("node is not interactable: {0}")]
    NotInteractable(String),

    /// The window owning the target has closed.
    #[error("owning window is closed")]
    WindowClosed,

    /// The query expression was rejected by the backend.
    #[error("invalid {kind} query: {reason}")]
    InvalidQuery { kind: &'static str, reason: String },

    /// Any other backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl DriverError {
    /// The distinguishable staleness signal.
    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::Stale(_))
    }

    /// The "found but not ready for this interaction yet" signal.
    pub fn is_not_interactable(&self) -> bool {
        matches!(self, DriverError::NotInteractable(_))
    }
}
