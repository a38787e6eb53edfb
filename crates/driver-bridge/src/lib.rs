//! Abstract driver capability for the element resolution engine.
//!
//! This crate owns the boundary to the remote document: the native
//! lookup kinds, the immutable query root (frame path + search base),
//! the `DriverBackend` trait the engine consumes, and the
//! distinguishable error signals the engine branches on. A scripted
//! in-memory backend for tests lives behind the `fixture` feature.

pub mod backend;
pub mod errors;
pub mod types;

#[cfg(feature = "fixture")]
pub mod fixture;

pub use backend::*;
pub use errors::*;
pub use types::*;
