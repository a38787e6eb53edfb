//! Error types for element resolution.

use driver_bridge::DriverError;
use selector_engine::SelectorError;
use thiserror::Error;

/// Locate error enumeration.
///
/// "Nothing matched" is not an error; lookups report that as an empty
/// result. These are the failures that abort resolution.
#[derive(Debug, Error, Clone)]
pub enum LocateError {
    /// Bad selector; raised before any driver interaction.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A distinguishable driver signal.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl LocateError {
    /// The staleness signal, recovered by the caller's single retry.
    pub fn is_stale(&self) -> bool {
        matches!(self, LocateError::Driver(e) if e.is_stale())
    }
}
