//! Caller-facing error taxonomy.
//!
//! Timeout messages are part of the contract: they name the configured
//! timeout, the full selector chain down through every nested query
//! scope, and the precondition that was being awaited. Tooling matches
//! on these strings.

use std::time::Duration;

use selector_engine::SelectorError;
use thiserror::Error;

/// Readiness error enumeration.
#[derive(Debug, Error, Clone)]
pub enum ReadinessError {
    /// Immediate miss with relaxed locating disabled.
    #[error("unable to locate element: {chain}")]
    NotFound { chain: String },

    /// The exists precondition never held within the deadline.
    #[error("timed out after {timeout:?}, waiting for {chain} to be located")]
    LocateTimeout { timeout: Duration, chain: String },

    /// Located, but never became visible within the deadline.
    #[error("timed out after {timeout:?}, waiting for {chain} to become present")]
    PresentTimeout { timeout: Duration, chain: String },

    /// Located and present, but never enabled. Distinct from a miss.
    #[error("element located, but timed out after {timeout:?}, waiting for {chain} to become enabled")]
    Disabled { timeout: Duration, chain: String },

    /// Located and enabled, but never writable.
    #[error("element located, but timed out after {timeout:?}, waiting for {chain} to become writable")]
    ReadOnly { timeout: Duration, chain: String },

    /// A frame boundary in the scope chain could not be entered.
    #[error("unable to enter frame: {chain}")]
    FrameNotFound { chain: String },

    /// A selectable-option search matched zero options.
    #[error("no option matched {value} in {chain}")]
    NoValueMatched { value: String, chain: String },

    /// The window owning the target closed mid-operation.
    #[error("the window owning {chain} has closed")]
    WindowGone { chain: String },

    /// Bad selector; raised at normalization, never retried.
    #[error(transparent)]
    Usage(#[from] SelectorError),

    /// Unclassified driver failure.
    #[error("driver failure on {chain}: {message}")]
    Backend { chain: String, message: String },
}

impl ReadinessError {
    /// Both flavors of "no matching node".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReadinessError::NotFound { .. } | ReadinessError::LocateTimeout { .. }
        )
    }

    /// Re-frame a wait failure that happened on a frame scope: the
    /// boundary itself could not be entered.
    pub(crate) fn into_frame_context(self) -> Self {
        match self {
            ReadinessError::NotFound { chain }
            | ReadinessError::LocateTimeout { chain, .. }
            | ReadinessError::PresentTimeout { chain, .. } => {
                ReadinessError::FrameNotFound { chain }
            }
            other => other,
        }
    }
}
