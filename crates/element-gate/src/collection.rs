//! Lazily materialized element collections.

use std::sync::{Arc, Mutex};

use elemental_core_types::{ElementKind, NodeId, Selector};
use tracing::debug;

use crate::element::{chain_of, Element, Scope};
use crate::errors::ReadinessError;
use crate::types::EngineContext;

/// A selector-parameterized, restartable sequence of elements.
///
/// The underlying plural lookup runs exactly once, on first use; the
/// cached node list survives until `reset`.
pub struct ElementCollection {
    ctx: Arc<EngineContext>,
    kind: ElementKind,
    selector: Selector,
    scope: Scope,
    cache: Mutex<Option<Vec<NodeId>>>,
}

impl Clone for ElementCollection {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            kind: self.kind,
            selector: self.selector.clone(),
            scope: self.scope.clone(),
            cache: Mutex::new(self.cache.lock().unwrap().clone()),
        }
    }
}

impl ElementCollection {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        kind: ElementKind,
        selector: Selector,
        scope: Scope,
    ) -> Self {
        Self {
            ctx,
            kind,
            selector,
            scope,
            cache: Mutex::new(None),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn selector_chain(&self) -> String {
        chain_of(&self.scope, &self.selector)
    }

    /// Drop the cached node list; the next use re-resolves.
    pub fn reset(&self) {
        *self.cache.lock().unwrap() = None;
    }

    async fn materialize(&self) -> Result<Vec<NodeId>, ReadinessError> {
        if let Some(nodes) = self.cache.lock().unwrap().clone() {
            return Ok(nodes);
        }
        let nodes = match self.scope.resolve_root().await? {
            Some(root) => self
                .ctx
                .locator
                .locate_all(&root, self.kind, &self.selector)
                .await
                .map_err(|e| match e {
                    element_locator::LocateError::Selector(e) => ReadinessError::Usage(e),
                    element_locator::LocateError::Driver(e) => ReadinessError::Backend {
                        chain: self.selector_chain(),
                        message: e.to_string(),
                    },
                })?,
            // an absent ancestor scope means an empty collection
            None => Vec::new(),
        };
        debug!(chain = %self.selector_chain(), count = nodes.len(), "collection materialized");
        *self.cache.lock().unwrap() = Some(nodes.clone());
        Ok(nodes)
    }

    pub async fn len(&self) -> Result<usize, ReadinessError> {
        Ok(self.materialize().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, ReadinessError> {
        Ok(self.materialize().await?.is_empty())
    }

    /// Every element, already located, with its index merged into the
    /// selector so relocation after staleness stays deterministic.
    pub async fn to_list(&self) -> Result<Vec<Element>, ReadinessError> {
        let nodes = self.materialize().await?;
        Ok(nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                Element::located(
                    self.ctx.clone(),
                    self.kind,
                    self.selector.clone().with("index", i as i64),
                    self.scope.clone(),
                    node,
                )
            })
            .collect())
    }

    /// Element at `index`. Past the cached length this is not an
    /// error: it yields an unlocated placeholder carrying the index,
    /// so a later `exists` check still performs an index lookup.
    pub async fn get(&self, index: usize) -> Result<Element, ReadinessError> {
        let nodes = self.materialize().await?;
        let selector = self.selector.clone().with("index", index as i64);
        Ok(match nodes.get(index) {
            Some(node) => Element::located(
                self.ctx.clone(),
                self.kind,
                selector,
                self.scope.clone(),
                node.clone(),
            ),
            None => Element::new(self.ctx.clone(), self.kind, selector, self.scope.clone()),
        })
    }

    /// Elementwise equality of the materialized lists.
    pub async fn matches_elements(&self, other: &ElementCollection) -> Result<bool, ReadinessError> {
        Ok(self.materialize().await? == other.materialize().await?)
    }
}

impl Element {
    /// A collection of elements scoped under this one.
    pub fn elements(&self, kind: ElementKind, selector: Selector) -> ElementCollection {
        let scope = if self.kind() == ElementKind::Frame {
            Scope::Frame(Box::new(self.clone()))
        } else {
            Scope::Within(Box::new(self.clone()))
        };
        ElementCollection::new(self.ctx().clone(), kind, selector, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use driver_bridge::fixture::FixtureDriver;
    use elemental_core_types::{EngineConfig, SelectorValue};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lazy_materialization_runs_once() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("li").insert();
        fx.node("li").insert();
        let page = Page::new(fx.clone(), EngineConfig::default());
        let items = page.elements(
            ElementKind::Generic,
            Selector::new().with("tag_name", "li"),
        );

        assert_eq!(items.len().await.unwrap(), 2);
        let before = fx.query_count();
        assert_eq!(items.len().await.unwrap(), 2);
        assert_eq!(fx.query_count(), before, "cached list must not re-query");

        items.reset();
        fx.node("li").insert();
        assert_eq!(items.len().await.unwrap(), 3, "reset forces re-resolution");
    }

    #[tokio::test]
    async fn test_past_the_end_yields_an_indexed_placeholder() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("li").insert();
        let page = Page::new(fx, EngineConfig::default());
        let items = page.elements(
            ElementKind::Generic,
            Selector::new().with("tag_name", "li"),
        );

        let ghost = items.get(5).await.unwrap();
        assert_eq!(
            ghost.selector().get("index"),
            Some(&SelectorValue::Index(5)),
            "placeholder must carry the requested index"
        );
        assert!(!ghost.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_collections_compare_elementwise() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("a").text("One").insert();
        fx.node("a").text("Two").insert();
        let page = Page::new(fx, EngineConfig::default());

        let left = page.links(Selector::new());
        let right = page.links(Selector::new());
        assert!(left.matches_elements(&right).await.unwrap());

        let divs = page.divs(Selector::new());
        assert!(!left.matches_elements(&divs).await.unwrap());
    }
}
