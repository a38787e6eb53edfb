//! Error types for selector handling.
//!
//! All of these are usage errors: raised synchronously while the
//! selector is normalized or planned, before any driver interaction,
//! and never retried.

use thiserror::Error;

/// Selector error enumeration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectorError {
    /// The key is neither structural nor declared by the element kind.
    #[error("no way of finding {kind} elements by {key:?}")]
    UnknownKey { kind: &'static str, key: String },

    /// The value's type or content is not legal for the key.
    #[error("invalid value for {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Two keys that may not appear in the same selector.
    #[error("{first:?} cannot be combined with {second:?}")]
    ConflictingKeys { first: String, second: String },

    /// `index` was given to a plural lookup.
    #[error("index is not valid for a plural lookup")]
    IndexOnPlural,

    /// Invariant breach inside the engine itself.
    #[error("internal selector error: {0}")]
    Internal(String),
}
