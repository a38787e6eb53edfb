//! Query planning.
//!
//! Compiles a normalized selector into the artifact the locator
//! executes: a raw passthrough, a fully structural expression, or a
//! scan-and-filter residual. `index` and `visible` can never be
//! queried structurally, so they are always extracted into post
//! filters first.

use elemental_core_types::{Selector, SelectorValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SelectorError;
use crate::normalize::NormalizedSelector;
use crate::xpath::XPathBuilder;

/// Filters applied after the candidate set is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilters {
    /// Position in the filtered candidate list; negative counts from
    /// the end.
    pub index: Option<i64>,

    /// Required computed visibility.
    pub visible: Option<bool>,
}

impl PostFilters {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.visible.is_none()
    }

    /// Effective index once candidates must be enumerated: an explicit
    /// `visible` with no `index` defaults to the first match.
    pub fn effective_index(&self) -> i64 {
        self.index.unwrap_or(0)
    }
}

/// Language of a caller-supplied raw query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryLanguage {
    XPath,
    Css,
}

/// The compiled query artifact. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryPlan {
    /// Caller supplied raw structural-query text; `residual` carries
    /// the ride-along keys that validate results (`tag_name`).
    Raw {
        language: QueryLanguage,
        expr: String,
        residual: Selector,
        post: PostFilters,
    },

    /// Every predicate rendered structurally.
    Structural { expr: String, post: PostFilters },

    /// At least one pattern value: candidates must be fetched and
    /// filtered in-process against the residual predicates.
    Scan { residual: Selector, post: PostFilters },
}

impl QueryPlan {
    pub fn post(&self) -> &PostFilters {
        match self {
            QueryPlan::Raw { post, .. }
            | QueryPlan::Structural { post, .. }
            | QueryPlan::Scan { post, .. } => post,
        }
    }
}

/// Compile a normalized selector.
pub fn build_plan(normalized: &NormalizedSelector) -> Result<QueryPlan, SelectorError> {
    let mut working = normalized.selector().clone();

    let post = PostFilters {
        index: working.remove("index").as_ref().and_then(SelectorValue::as_index),
        visible: working
            .remove("visible")
            .as_ref()
            .and_then(SelectorValue::as_presence),
    };

    for (language, key) in [(QueryLanguage::XPath, "xpath"), (QueryLanguage::Css, "css")] {
        if let Some(SelectorValue::Literal(expr)) = working.remove(key) {
            debug!(key, %expr, "raw structural selector");
            return Ok(QueryPlan::Raw {
                language,
                expr,
                residual: working,
                post,
            });
        }
    }

    if working.iter().any(|(_, value)| value.has_pattern()) {
        debug!(residual = %working, "pattern value forces scan-and-filter");
        return Ok(QueryPlan::Scan {
            residual: working,
            post,
        });
    }

    let expr = XPathBuilder::new(normalized.kind()).build(&working, &[])?;
    debug!(%expr, "structural query");
    Ok(QueryPlan::Structural { expr, post })
}

/// Split a selector into its pattern-free and pattern-bearing halves.
/// A list containing any pattern entry counts as pattern-bearing.
pub fn split_patterns(selector: &Selector) -> (Selector, Selector) {
    let mut literals = Selector::new();
    let mut patterns = Selector::new();
    for (key, value) in selector.iter() {
        if value.has_pattern() {
            patterns.insert(key, value.clone());
        } else {
            literals.insert(key, value.clone());
        }
    }
    (literals, patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use elemental_core_types::ElementKind;
    use regex::Regex;

    fn plan_for(kind: ElementKind, selector: Selector) -> QueryPlan {
        build_plan(&normalize(kind, &selector).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_only_selectors_always_get_a_structural_query() {
        let plan = plan_for(
            ElementKind::Generic,
            Selector::new()
                .with("tag_name", "div")
                .with("id", "main")
                .with("title", "Greeting"),
        );
        match plan {
            QueryPlan::Structural { expr, post } => {
                assert!(expr.starts_with(".//div["));
                assert!(post.is_empty());
            }
            other => panic!("expected structural plan, got {other:?}"),
        }
    }

    #[test]
    fn test_any_pattern_forces_scan() {
        let plan = plan_for(
            ElementKind::Generic,
            Selector::new()
                .with("id", "main")
                .with("text", Regex::new("^Submit$").unwrap()),
        );
        match plan {
            QueryPlan::Scan { residual, .. } => {
                assert!(residual.contains_key("id"));
                assert!(residual.contains_key("text"));
            }
            other => panic!("expected scan plan, got {other:?}"),
        }
    }

    #[test]
    fn test_index_and_visible_become_post_filters() {
        let plan = plan_for(
            ElementKind::Generic,
            Selector::new()
                .with("tag_name", "li")
                .with("index", SelectorValue::Index(-1))
                .with("visible", true),
        );
        match plan {
            QueryPlan::Structural { expr, post } => {
                assert_eq!(expr, ".//li");
                assert_eq!(post.index, Some(-1));
                assert_eq!(post.visible, Some(true));
            }
            other => panic!("expected structural plan, got {other:?}"),
        }
    }

    #[test]
    fn test_visible_alone_defaults_index_to_first() {
        let post = PostFilters {
            index: None,
            visible: Some(true),
        };
        assert_eq!(post.effective_index(), 0);
    }

    #[test]
    fn test_raw_selector_passthrough_keeps_tag_residual() {
        let plan = plan_for(
            ElementKind::Generic,
            Selector::new().with("xpath", ".//div[@id='x']").with("tag_name", "div"),
        );
        match plan {
            QueryPlan::Raw {
                language,
                expr,
                residual,
                ..
            } => {
                assert_eq!(language, QueryLanguage::XPath);
                assert_eq!(expr, ".//div[@id='x']");
                assert!(residual.contains_key("tag_name"));
            }
            other => panic!("expected raw plan, got {other:?}"),
        }
    }

    #[test]
    fn test_split_patterns() {
        let (literals, patterns) = split_patterns(
            &Selector::new()
                .with("name", "q")
                .with("text", Regex::new("Go").unwrap()),
        );
        assert!(literals.contains_key("name"));
        assert!(!literals.contains_key("text"));
        assert!(patterns.contains_key("text"));
        assert_eq!(patterns.len(), 1);
    }
}
