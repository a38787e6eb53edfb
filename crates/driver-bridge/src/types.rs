//! Query addressing types shared across the driver boundary.

use elemental_core_types::NodeId;
use serde::{Deserialize, Serialize};

/// Native lookup kinds the backend supports directly.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum By {
    Id,
    Css,
    XPath,
    Name,
    TagName,
    ClassName,
    LinkText,
    PartialLinkText,
}

impl By {
    /// Lookup kind name as the backend spells it.
    pub fn name(&self) -> &'static str {
        match self {
            By::Id => "id",
            By::Css => "css selector",
            By::XPath => "xpath",
            By::Name => "name",
            By::TagName => "tag name",
            By::ClassName => "class name",
            By::LinkText => "link text",
            By::PartialLinkText => "partial link text",
        }
    }

    /// Map a selector key onto a native lookup kind, when one exists.
    pub fn from_selector_key(key: &str) -> Option<By> {
        match key {
            "id" => Some(By::Id),
            "css" => Some(By::Css),
            "xpath" => Some(By::XPath),
            "name" => Some(By::Name),
            "tag_name" => Some(By::TagName),
            "class" => Some(By::ClassName),
            "link_text" => Some(By::LinkText),
            "partial_link_text" => Some(By::PartialLinkText),
            _ => None,
        }
    }
}

/// Where a query starts inside the current browsing context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchBase {
    /// The document root.
    Document,

    /// Descendants of a previously located node.
    Node(NodeId),
}

/// Immutable description of the context a query runs in: the chain of
/// frames to enter, then the node (or document) to search under.
///
/// The backend switches into `frame_path` atomically right before the
/// call; no ambient "current frame" state is carried between calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryRoot {
    /// Frame elements to enter, outermost first.
    pub frame_path: Vec<NodeId>,

    /// Search base inside the innermost frame.
    pub base: SearchBase,
}

impl QueryRoot {
    /// The top-level document of the main frame.
    pub fn document() -> Self {
        Self {
            frame_path: Vec::new(),
            base: SearchBase::Document,
        }
    }

    /// Search under a located node, keeping the given frame path.
    pub fn within(frame_path: Vec<NodeId>, node: NodeId) -> Self {
        Self {
            frame_path,
            base: SearchBase::Node(node),
        }
    }

    /// The document of a nested frame.
    pub fn frame_document(frame_path: Vec<NodeId>) -> Self {
        Self {
            frame_path,
            base: SearchBase::Document,
        }
    }

    /// Re-root this query at a node inside the same frame context.
    pub fn rebase(&self, node: NodeId) -> Self {
        Self {
            frame_path: self.frame_path.clone(),
            base: SearchBase::Node(node),
        }
    }
}

impl Default for QueryRoot {
    fn default() -> Self {
        Self::document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_from_selector_key() {
        assert_eq!(By::from_selector_key("id"), Some(By::Id));
        assert_eq!(By::from_selector_key("tag_name"), Some(By::TagName));
        assert_eq!(By::from_selector_key("class"), Some(By::ClassName));
        assert_eq!(By::from_selector_key("text"), None);
        assert_eq!(By::from_selector_key("visible"), None);
    }

    #[test]
    fn test_rebase_keeps_frame_path() {
        let frame = NodeId::new();
        let node = NodeId::new();
        let root = QueryRoot::frame_document(vec![frame.clone()]);
        let rebased = root.rebase(node.clone());
        assert_eq!(rebased.frame_path, vec![frame]);
        assert_eq!(rebased.base, SearchBase::Node(node));
    }
}
