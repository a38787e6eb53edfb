//! Scripted in-memory backend for tests.
//!
//! Plays the role the stub adapters play in a real deployment: a
//! `DriverBackend` with a small node table, scripted query routes
//! (fixed or consumed in sequence), a query log for asserting which
//! lookups the engine actually issued, and fault injection for
//! staleness, interactability, and window closure.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use elemental_core_types::NodeId;
use tracing::debug;

use crate::backend::DriverBackend;
use crate::errors::DriverError;
use crate::types::{By, QueryRoot, SearchBase};

/// One recorded lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRecord {
    pub by: By,
    pub what: String,
}

#[derive(Clone, Debug)]
struct FixtureNode {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    displayed: bool,
    enabled: bool,
    parent: Option<NodeId>,
    stale: bool,
    stale_on_interaction: bool,
    not_interactable_budget: u32,
}

impl FixtureNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            text: String::new(),
            displayed: true,
            enabled: true,
            parent: None,
            stale: false,
            stale_on_interaction: false,
            not_interactable_budget: 0,
        }
    }
}

enum RouteAnswer {
    Fixed(Vec<NodeId>),
    Sequence(VecDeque<Vec<NodeId>>),
}

#[derive(Default)]
struct FixtureState {
    nodes: HashMap<NodeId, FixtureNode>,
    order: Vec<NodeId>,
    routes: HashMap<(By, String), RouteAnswer>,
    log: Vec<QueryRecord>,
    clicks: Vec<NodeId>,
    window_closed: bool,
    permissive_xpath: bool,
}

/// Scripted in-memory document backend.
#[derive(Default)]
pub struct FixtureDriver {
    state: Mutex<FixtureState>,
}

/// Builder for one fixture node.
pub struct NodeBuilder<'a> {
    driver: &'a FixtureDriver,
    node: FixtureNode,
}

impl<'a> NodeBuilder<'a> {
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.node.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.node.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.node.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.node.enabled = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.node.attrs.insert("readonly".to_string(), "true".to_string());
        self
    }

    pub fn child_of(mut self, parent: &NodeId) -> Self {
        self.node.parent = Some(parent.clone());
        self
    }

    /// Register the node and return its handle.
    pub fn insert(self) -> NodeId {
        let id = NodeId::new();
        let mut state = self.driver.state.lock().unwrap();
        state.nodes.insert(id.clone(), self.node);
        state.order.push(id.clone());
        id
    }
}

impl FixtureDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a node with the given tag.
    pub fn node(&self, tag: &str) -> NodeBuilder<'_> {
        NodeBuilder {
            driver: self,
            node: FixtureNode::new(tag),
        }
    }

    /// Answer `(by, what)` with a fixed node list.
    pub fn route(&self, by: By, what: &str, nodes: Vec<NodeId>) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .insert((by, what.to_string()), RouteAnswer::Fixed(nodes));
    }

    /// Answer `(by, what)` with one batch per call; the last batch
    /// repeats once the sequence is exhausted.
    pub fn route_sequence(&self, by: By, what: &str, batches: Vec<Vec<NodeId>>) {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(
            (by, what.to_string()),
            RouteAnswer::Sequence(batches.into()),
        );
    }

    /// Mark a node stale; every later use of its handle raises the
    /// staleness signal.
    pub fn invalidate(&self, node: &NodeId) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            n.stale = true;
        }
    }

    /// Let read probes keep succeeding, but detach the node the moment
    /// it is interacted with: the interaction raises the staleness
    /// signal and the node is stale from then on.
    pub fn invalidate_on_interaction(&self, node: &NodeId) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            n.stale_on_interaction = true;
        }
    }

    /// Make the next `times` interactions with the node raise the
    /// not-interactable signal before it starts accepting them.
    pub fn not_interactable_for(&self, node: &NodeId, times: u32) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            n.not_interactable_budget = times;
        }
    }

    pub fn close_window(&self) {
        self.state.lock().unwrap().window_closed = true;
    }

    /// Answer unscripted XPath lookups with every in-scope node instead
    /// of nothing. Useful for scan-and-filter tests, where the engine
    /// re-checks every candidate in-process anyway.
    pub fn permissive_xpath(&self) {
        self.state.lock().unwrap().permissive_xpath = true;
    }

    pub fn set_enabled(&self, node: &NodeId, enabled: bool) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            n.enabled = enabled;
        }
    }

    pub fn set_displayed(&self, node: &NodeId, displayed: bool) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            n.displayed = displayed;
        }
    }

    pub fn set_attr(&self, node: &NodeId, name: &str, value: Option<&str>) {
        if let Some(n) = self.state.lock().unwrap().nodes.get_mut(node) {
            match value {
                Some(v) => {
                    n.attrs.insert(name.to_string(), v.to_string());
                }
                None => {
                    n.attrs.remove(name);
                }
            }
        }
    }

    /// Every lookup issued so far, oldest first.
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    /// Nodes clicked so far, oldest first.
    pub fn clicks(&self) -> Vec<NodeId> {
        self.state.lock().unwrap().clicks.clone()
    }

    fn resolve(&self, root: &QueryRoot, by: By, what: &str) -> Result<Vec<NodeId>, DriverError> {
        let mut state = self.state.lock().unwrap();
        if state.window_closed {
            return Err(DriverError::WindowClosed);
        }
        for frame in &root.frame_path {
            match state.nodes.get(frame) {
                Some(node) if !node.stale => {}
                _ => return Err(DriverError::NoSuchFrame(frame.to_string())),
            }
        }
        if let SearchBase::Node(base) = &root.base {
            match state.nodes.get(base) {
                Some(node) if node.stale => return Err(DriverError::Stale(base.to_string())),
                Some(_) => {}
                None => return Err(DriverError::NoSuchNode(base.to_string())),
            }
        }
        state.log.push(QueryRecord {
            by,
            what: what.to_string(),
        });

        if let Some(answer) = state.routes.get_mut(&(by, what.to_string())) {
            let nodes = match answer {
                RouteAnswer::Fixed(nodes) => nodes.clone(),
                RouteAnswer::Sequence(batches) => {
                    let batch = if batches.len() > 1 {
                        batches.pop_front().unwrap_or_default()
                    } else {
                        batches.front().cloned().unwrap_or_default()
                    };
                    batch
                }
            };
            debug!(by = by.name(), what, hits = nodes.len(), "scripted route");
            return Ok(nodes);
        }

        Ok(Self::auto_resolve(&state, root, by, what))
    }

    fn auto_resolve(state: &FixtureState, root: &QueryRoot, by: By, what: &str) -> Vec<NodeId> {
        let in_scope = |state: &FixtureState, id: &NodeId| -> bool {
            match &root.base {
                SearchBase::Document => true,
                SearchBase::Node(base) => {
                    let mut cursor = state.nodes.get(id).and_then(|n| n.parent.clone());
                    while let Some(parent) = cursor {
                        if parent == *base {
                            return true;
                        }
                        cursor = state.nodes.get(&parent).and_then(|n| n.parent.clone());
                    }
                    false
                }
            }
        };

        let matches = |node: &FixtureNode| -> bool {
            match by {
                By::Id => node.attrs.get("id").map(String::as_str) == Some(what),
                By::Name => node.attrs.get("name").map(String::as_str) == Some(what),
                By::TagName => node.tag.eq_ignore_ascii_case(what),
                By::ClassName => node
                    .attrs
                    .get("class")
                    .map(|c| c.split_whitespace().any(|token| token == what))
                    .unwrap_or(false),
                By::LinkText => node.tag == "a" && node.text == what,
                By::PartialLinkText => node.tag == "a" && node.text.contains(what),
                By::XPath => match what.strip_prefix(".//") {
                    Some("*") => true,
                    Some(tag) if tag.chars().all(|c| c.is_ascii_alphanumeric()) => node.tag == tag,
                    _ => state.permissive_xpath,
                },
                By::Css => false,
            }
        };

        state
            .order
            .iter()
            .filter(|id| {
                state
                    .nodes
                    .get(*id)
                    .map(|n| !n.stale && matches(n))
                    .unwrap_or(false)
                    && in_scope(state, id)
            })
            .cloned()
            .collect()
    }

    fn probe<T>(
        &self,
        node: &NodeId,
        read: impl FnOnce(&FixtureNode) -> T,
    ) -> Result<T, DriverError> {
        let state = self.state.lock().unwrap();
        if state.window_closed {
            return Err(DriverError::WindowClosed);
        }
        match state.nodes.get(node) {
            None => Err(DriverError::NoSuchNode(node.to_string())),
            Some(n) if n.stale => Err(DriverError::Stale(node.to_string())),
            Some(n) => Ok(read(n)),
        }
    }

    fn interact(
        &self,
        node: &NodeId,
        act: impl FnOnce(&mut FixtureNode, &mut Vec<NodeId>),
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        if state.window_closed {
            return Err(DriverError::WindowClosed);
        }
        let FixtureState { nodes, clicks, .. } = &mut *state;
        match nodes.get_mut(node) {
            None => Err(DriverError::NoSuchNode(node.to_string())),
            Some(n) if n.stale => Err(DriverError::Stale(node.to_string())),
            Some(n) if n.stale_on_interaction => {
                n.stale = true;
                Err(DriverError::Stale(node.to_string()))
            }
            Some(n) if n.not_interactable_budget > 0 => {
                n.not_interactable_budget -= 1;
                Err(DriverError::NotInteractable(node.to_string()))
            }
            Some(n) => {
                act(n, clicks);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DriverBackend for FixtureDriver {
    async fn find_one(
        &self,
        root: &QueryRoot,
        by: By,
        what: &str,
    ) -> Result<Option<NodeId>, DriverError> {
        Ok(self.resolve(root, by, what)?.into_iter().next())
    }

    async fn find_all(
        &self,
        root: &QueryRoot,
        by: By,
        what: &str,
    ) -> Result<Vec<NodeId>, DriverError> {
        self.resolve(root, by, what)
    }

    async fn attribute(&self, node: &NodeId, name: &str) -> Result<Option<String>, DriverError> {
        self.probe(node, |n| n.attrs.get(name).cloned())
    }

    async fn text(&self, node: &NodeId) -> Result<String, DriverError> {
        self.probe(node, |n| n.text.clone())
    }

    async fn tag_name(&self, node: &NodeId) -> Result<String, DriverError> {
        self.probe(node, |n| n.tag.clone())
    }

    async fn is_displayed(&self, node: &NodeId) -> Result<bool, DriverError> {
        self.probe(node, |n| n.displayed)
    }

    async fn is_enabled(&self, node: &NodeId) -> Result<bool, DriverError> {
        self.probe(node, |n| n.enabled)
    }

    async fn click(&self, node: &NodeId) -> Result<(), DriverError> {
        let id = node.clone();
        self.interact(node, |_, clicks| clicks.push(id))
    }

    async fn type_text(&self, node: &NodeId, text: &str) -> Result<(), DriverError> {
        self.interact(node, |n, _| {
            let value = n.attrs.entry("value".to_string()).or_default();
            value.push_str(text);
        })
    }

    async fn clear(&self, node: &NodeId) -> Result<(), DriverError> {
        self.interact(node, |n, _| {
            n.attrs.remove("value");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolution_by_id_and_scope() {
        tokio_test::block_on(async {
            let fx = FixtureDriver::new();
            let parent = fx.node("div").attr("id", "wrap").insert();
            let child = fx.node("span").attr("id", "inner").child_of(&parent).insert();

            let root = QueryRoot::document();
            assert_eq!(fx.find_one(&root, By::Id, "wrap").await.unwrap(), Some(parent.clone()));

            let scoped = QueryRoot::within(Vec::new(), parent);
            assert_eq!(fx.find_one(&scoped, By::Id, "inner").await.unwrap(), Some(child));
            assert_eq!(fx.find_one(&scoped, By::Id, "wrap").await.unwrap(), None);
        });
    }

    #[test]
    fn test_route_sequence_consumes_batches() {
        tokio_test::block_on(async {
            let fx = FixtureDriver::new();
            let old = fx.node("button").insert();
            let fresh = fx.node("button").insert();
            fx.route_sequence(By::Id, "go", vec![vec![old.clone()], vec![fresh.clone()]]);

            let root = QueryRoot::document();
            assert_eq!(fx.find_one(&root, By::Id, "go").await.unwrap(), Some(old));
            assert_eq!(fx.find_one(&root, By::Id, "go").await.unwrap(), Some(fresh.clone()));
            // last batch repeats
            assert_eq!(fx.find_one(&root, By::Id, "go").await.unwrap(), Some(fresh));
        });
    }

    #[test]
    fn test_stale_node_raises_on_use() {
        tokio_test::block_on(async {
            let fx = FixtureDriver::new();
            let node = fx.node("input").insert();
            fx.invalidate(&node);
            let err = fx.is_enabled(&node).await.unwrap_err();
            assert!(err.is_stale(), "expected staleness signal, got {err}");
        });
    }

    #[test]
    fn test_stale_nodes_drop_out_of_auto_resolution() {
        tokio_test::block_on(async {
            let fx = FixtureDriver::new();
            let node = fx.node("a").attr("id", "x").text("Click me").insert();
            fx.invalidate(&node);
            let root = QueryRoot::document();
            assert_eq!(fx.find_one(&root, By::Id, "x").await.unwrap(), None);
            assert_eq!(fx.find_one(&root, By::LinkText, "Click me").await.unwrap(), None);
        });
    }
}
