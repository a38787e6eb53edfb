//! Selector normalization and structural query planning.
//!
//! Turns a caller-supplied attribute map into a query plan: a raw
//! passthrough, a fully rendered structural (XPath) expression, or a
//! scan-and-filter residual when a pattern value makes structural
//! rendering impossible. Pure string work; no I/O happens here.

pub mod errors;
pub mod normalize;
pub mod plan;
pub mod xpath;

pub use errors::*;
pub use normalize::*;
pub use plan::*;
pub use xpath::*;
