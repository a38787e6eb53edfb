//! Shared state for the readiness engine.

use std::sync::Arc;

use driver_bridge::DriverBackend;
use element_locator::Locator;
use elemental_core_types::EngineConfig;

use crate::timer::SharedTimer;

/// Readiness preconditions, in composition order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Precondition {
    Exists,
    Present,
    Enabled,
    Writable,
}

impl Precondition {
    pub fn name(&self) -> &'static str {
        match self {
            Precondition::Exists => "exists",
            Precondition::Present => "present",
            Precondition::Enabled => "enabled",
            Precondition::Writable => "writable",
        }
    }

    /// A backend "not yet interactable" signal is retried until the
    /// deadline only under these preconditions; anywhere else it is
    /// fatal immediately.
    pub fn tolerates_not_interactable(&self) -> bool {
        matches!(self, Precondition::Present | Precondition::Enabled)
    }
}

/// Collaborators shared by every element hanging off one page: the
/// driver handle, the locator, the configuration, and the one timer
/// whose deadline all nested waits observe.
pub struct EngineContext {
    pub driver: Arc<dyn DriverBackend>,
    pub locator: Locator,
    pub config: EngineConfig,
    pub timer: SharedTimer,
}

impl EngineContext {
    pub fn new(driver: Arc<dyn DriverBackend>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            locator: Locator::new(driver.clone()),
            driver,
            config,
            timer: SharedTimer::new(),
        })
    }
}
