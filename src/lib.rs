//! Element resolution and readiness for remote documents.
//!
//! Given a structured description of "which element(s) on the page",
//! this engine resolves it against a live, asynchronous document tree,
//! tolerates the tree changing underneath it, and blocks the caller
//! until the element reaches a required readiness state (exists,
//! present, enabled, writable) or a bounded timeout expires.
//!
//! The crate is a facade over the engine's layers:
//!
//! - [`Selector`] / [`SelectorValue`] — the attribute-map description
//!   of the target, with literal, pattern, presence, index, and list
//!   values.
//! - the selector engine — normalization and query planning: raw
//!   passthrough, rendered XPath, or a scan-and-filter residual.
//! - [`Locator`] — plan execution with fast paths and fallbacks.
//! - [`Element`] / [`ElementCollection`] — the stateful wrappers with
//!   the readiness state machine, staleness recovery, and a shared
//!   per-operation deadline.
//! - [`DriverBackend`] — the abstract driver capability the engine
//!   consumes; this crate never speaks a wire protocol itself.
//!
//! ```no_run
//! use std::sync::Arc;
//! use elemental::{EngineConfig, Page, Selector};
//! # async fn example(driver: Arc<dyn elemental::DriverBackend>) -> Result<(), elemental::ReadinessError> {
//! let page = Page::new(driver, EngineConfig::default());
//! let field = page.text_field(Selector::new().with("label", "First name"));
//! field.set_text("Ada").await?;
//! # Ok(())
//! # }
//! ```

pub use driver_bridge::{By, DriverBackend, DriverError, QueryRoot, SearchBase};
pub use element_gate::{
    Element, ElementCollection, EngineContext, Page, Precondition, ReadinessError, Scope,
    SharedTimer, TimerLock,
};
pub use element_locator::{LocateError, Locator, Matcher};
pub use elemental_core_types::{
    ElementKind, EngineConfig, KindSpec, NodeId, Selector, SelectorValue, BUTTON_INPUT_TYPES,
    NON_TEXT_INPUT_TYPES,
};
pub use selector_engine::{
    build_plan, escape, normalize, NormalizedSelector, PostFilters, QueryLanguage, QueryPlan,
    SelectorError, XPathBuilder,
};

/// Re-exported engine layers for callers that need the full module
/// surface rather than the prelude above.
pub mod layers {
    pub use driver_bridge;
    pub use element_gate;
    pub use element_locator;
    pub use elemental_core_types as core_types;
    pub use selector_engine;
}
