//! The driver capability trait.

use async_trait::async_trait;
use elemental_core_types::NodeId;

use crate::errors::DriverError;
use crate::types::{By, QueryRoot};

/// Backend capability consumed, never implemented, by the engine core.
///
/// Lookups return `Ok(None)` / an empty list for "nothing matched";
/// errors are reserved for the distinguishable signals of
/// [`DriverError`]. Interaction primitives are only called after the
/// readiness engine has certified the relevant precondition.
#[async_trait]
pub trait DriverBackend: Send + Sync {
    /// First node matching the query under `root`, in document order.
    async fn find_one(
        &self,
        root: &QueryRoot,
        by: By,
        what: &str,
    ) -> Result<Option<NodeId>, DriverError>;

    /// Every node matching the query under `root`, in document order.
    async fn find_all(
        &self,
        root: &QueryRoot,
        by: By,
        what: &str,
    ) -> Result<Vec<NodeId>, DriverError>;

    /// Attribute value, `None` when the attribute is absent.
    async fn attribute(&self, node: &NodeId, name: &str) -> Result<Option<String>, DriverError>;

    /// Normalized visible text.
    async fn text(&self, node: &NodeId) -> Result<String, DriverError>;

    /// Tag name as the document spells it.
    async fn tag_name(&self, node: &NodeId) -> Result<String, DriverError>;

    async fn is_displayed(&self, node: &NodeId) -> Result<bool, DriverError>;

    async fn is_enabled(&self, node: &NodeId) -> Result<bool, DriverError>;

    async fn click(&self, node: &NodeId) -> Result<(), DriverError>;

    async fn type_text(&self, node: &NodeId, text: &str) -> Result<(), DriverError>;

    async fn clear(&self, node: &NodeId) -> Result<(), DriverError>;
}
