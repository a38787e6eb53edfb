//! Element resolution against the remote document.
//!
//! Executes compiled query plans in priority order: identifier fast
//! path, single-key native dispatch, full structural query, then
//! scan-and-filter for predicates the structural query language cannot
//! express. Candidates that over-match structurally are re-validated
//! by the matcher before they are returned.

pub mod errors;
pub mod locator;
pub mod matcher;

pub use errors::*;
pub use locator::*;
pub use matcher::*;
