//! Query execution with fallback strategies.

use std::sync::Arc;

use driver_bridge::{By, DriverBackend, QueryRoot};
use elemental_core_types::{ElementKind, NodeId, Selector, SelectorValue};
use selector_engine::{
    build_plan, contains_predicate, literal_narrowing, normalize, split_patterns, NormalizedSelector,
    PostFilters, QueryLanguage, QueryPlan, SelectorError, XPathBuilder,
};
use tracing::debug;

use crate::errors::LocateError;
use crate::matcher::Matcher;

/// Where a label lookup redirected the search.
enum LabelTarget {
    /// The label points at a control id; merge it as a predicate.
    ControlId(String),

    /// The label has no `for`; the control is nested inside it.
    Scope(NodeId),

    /// No label matched; the whole lookup is a miss.
    Missing,
}

/// Element locator. Stateless apart from the driver handle; every call
/// carries its own query root.
#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn DriverBackend>,
}

impl Locator {
    pub fn new(driver: Arc<dyn DriverBackend>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<dyn DriverBackend> {
        &self.driver
    }

    /// Resolve a selector to at most one node.
    pub async fn locate_one(
        &self,
        root: &QueryRoot,
        kind: ElementKind,
        selector: &Selector,
    ) -> Result<Option<NodeId>, LocateError> {
        let normalized = normalize(kind, selector)?;

        if let Some((id, tag)) = id_fast_path(&normalized) {
            debug!(id, "identifier fast path");
            return self.find_by_id(root, id, tag).await;
        }

        if let Some((by, what)) = single_native_key(&normalized) {
            debug!(by = by.name(), what, "single-key native dispatch");
            let matches = self.native_lookup(root, kind, &normalized, by, what).await?;
            return Ok(matches.into_iter().next());
        }

        let matches = self.execute_plan(root, kind, &normalized, true).await?;
        Ok(matches.into_iter().next())
    }

    /// Resolve a selector to every matching node.
    pub async fn locate_all(
        &self,
        root: &QueryRoot,
        kind: ElementKind,
        selector: &Selector,
    ) -> Result<Vec<NodeId>, LocateError> {
        let normalized = normalize(kind, selector)?;
        if normalized.selector().contains_key("index") {
            return Err(SelectorError::IndexOnPlural.into());
        }

        if let Some((id, tag)) = id_fast_path(&normalized) {
            let nodes = self.driver.find_all(root, By::Id, id).await?;
            return self.filter_by_tag(nodes, tag).await;
        }

        if let Some((by, what)) = single_native_key(&normalized) {
            return self.native_lookup(root, kind, &normalized, by, what).await;
        }

        self.execute_plan(root, kind, &normalized, false).await
    }

    async fn find_by_id(
        &self,
        root: &QueryRoot,
        id: &str,
        tag: Option<&str>,
    ) -> Result<Option<NodeId>, LocateError> {
        let Some(node) = self.driver.find_one(root, By::Id, id).await? else {
            return Ok(None);
        };
        if let Some(expected) = tag {
            let actual = self.driver.tag_name(&node).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Ok(None);
            }
        }
        Ok(Some(node))
    }

    async fn filter_by_tag(
        &self,
        nodes: Vec<NodeId>,
        tag: Option<&str>,
    ) -> Result<Vec<NodeId>, LocateError> {
        let Some(expected) = tag else {
            return Ok(nodes);
        };
        let mut kept = Vec::new();
        for node in nodes {
            match self.driver.tag_name(&node).await {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => kept.push(node),
                Ok(_) => {}
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(kept)
    }

    /// Branch 2: the selector is a single native lookup key. Literal
    /// values dispatch straight to the backend; a pattern value falls
    /// back to fetching every reachable node and filtering the fetched
    /// property in-process.
    async fn native_lookup(
        &self,
        root: &QueryRoot,
        kind: ElementKind,
        normalized: &NormalizedSelector,
        by: By,
        what: &str,
    ) -> Result<Vec<NodeId>, LocateError> {
        let nodes = self.driver.find_all(root, by, what).await?;
        self.matcher_filter(kind, normalized.selector(), nodes).await
    }

    async fn execute_plan(
        &self,
        root: &QueryRoot,
        kind: ElementKind,
        normalized: &NormalizedSelector,
        single: bool,
    ) -> Result<Vec<NodeId>, LocateError> {
        match build_plan(normalized)? {
            QueryPlan::Raw {
                language,
                expr,
                residual,
                post,
            } => {
                let by = match language {
                    QueryLanguage::XPath => By::XPath,
                    QueryLanguage::Css => By::Css,
                };
                let nodes = self.driver.find_all(root, by, &expr).await?;
                let tag = residual
                    .get("tag_name")
                    .and_then(SelectorValue::as_literal)
                    .map(str::to_string);
                let nodes = self.filter_by_tag(nodes, tag.as_deref()).await?;
                let nodes = self.matcher_filter(kind, normalized.selector(), nodes).await?;
                self.apply_post(nodes, &post, single).await
            }
            QueryPlan::Structural { expr, post } => {
                debug!(%expr, "structural lookup");
                if single && post.is_empty() && !Matcher::applies(kind) {
                    let node = self.driver.find_one(root, By::XPath, &expr).await?;
                    return Ok(node.into_iter().collect());
                }
                let nodes = self.driver.find_all(root, By::XPath, &expr).await?;
                let nodes = self.matcher_filter(kind, normalized.selector(), nodes).await?;
                self.apply_post(nodes, &post, single).await
            }
            QueryPlan::Scan { residual, post } => {
                debug!(residual = %residual, "scan-and-filter lookup");
                self.scan_and_filter(root, kind, residual, post, single).await
            }
        }
    }

    /// Branch 4: at least one pattern predicate. Resolve a label
    /// redirect first, narrow with the literal subset, then re-check
    /// every key against each candidate's fetched values.
    async fn scan_and_filter(
        &self,
        root: &QueryRoot,
        kind: ElementKind,
        mut residual: Selector,
        post: PostFilters,
        single: bool,
    ) -> Result<Vec<NodeId>, LocateError> {
        let mut scope = root.clone();

        if kind.spec().label_from_control {
            if let Some(label_value) = residual.remove("label") {
                match self.resolve_label(&scope, &label_value).await? {
                    LabelTarget::ControlId(id) => {
                        residual.insert("id", id);
                    }
                    LabelTarget::Scope(label_node) => {
                        scope = scope.rebase(label_node);
                    }
                    LabelTarget::Missing => return Ok(Vec::new()),
                }
            }
        }

        let (literals, patterns) = split_patterns(&residual);
        let mut narrowing = Vec::new();
        for (key, value) in patterns.iter() {
            if let SelectorValue::Pattern(re) = value {
                if let Some(fragment) = literal_narrowing(re) {
                    if let Some(predicate) = contains_predicate(key, &fragment) {
                        narrowing.push(predicate);
                    }
                }
            }
        }

        let expr = XPathBuilder::new(kind).build(&literals, &narrowing)?;
        debug!(%expr, "narrowed scan query");
        let candidates = self.driver.find_all(&scope, By::XPath, &expr).await?;

        let mut matches = Vec::new();
        for candidate in candidates {
            if !self.candidate_matches(&candidate, kind, &residual).await? {
                continue;
            }
            match Matcher::validate(self.driver.as_ref(), &candidate, kind, &residual).await {
                Ok(true) => matches.push(candidate),
                Ok(false) => {}
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e.into()),
            }
            if single && post.is_empty() && !matches.is_empty() {
                return Ok(matches);
            }
        }

        self.apply_post(matches, &post, single).await
    }

    /// Locate the `<label>` whose text matches and decide where it
    /// redirects the search.
    async fn resolve_label(
        &self,
        scope: &QueryRoot,
        expected: &SelectorValue,
    ) -> Result<LabelTarget, LocateError> {
        let labels = self.driver.find_all(scope, By::XPath, ".//label").await?;
        for label in labels {
            let text = match self.driver.text(&label).await {
                Ok(text) => text,
                Err(e) if e.is_stale() => continue,
                Err(e) => return Err(e.into()),
            };
            let matched = match expected {
                SelectorValue::Literal(s) => text == *s,
                SelectorValue::Pattern(re) => re.is_match(&text),
                _ => false,
            };
            if !matched {
                continue;
            }
            return Ok(match self.driver.attribute(&label, "for").await? {
                Some(control_id) => LabelTarget::ControlId(control_id),
                None => LabelTarget::Scope(label),
            });
        }
        Ok(LabelTarget::Missing)
    }

    /// Re-check every residual key against the candidate, mirroring
    /// the expression builder's rendering rules.
    async fn candidate_matches(
        &self,
        node: &NodeId,
        kind: ElementKind,
        residual: &Selector,
    ) -> Result<bool, LocateError> {
        for (key, value) in residual.iter() {
            if key == "value" && Matcher::owns_value_key(kind) {
                continue;
            }
            let fetched = match self.fetch_key_value(node, key).await {
                Ok(fetched) => fetched,
                Err(e) if e.is_stale() => return Ok(false),
                Err(e) => return Err(e),
            };
            if !value_matches(key, value, fetched.as_deref()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fetch the comparable value for a key, with the same special
    /// cases the expression builder renders.
    async fn fetch_key_value(
        &self,
        node: &NodeId,
        key: &str,
    ) -> Result<Option<String>, LocateError> {
        let fetched = match key {
            "text" | "link_text" | "partial_link_text" => Some(self.driver.text(node).await?),
            "tag_name" => Some(self.driver.tag_name(node).await?.to_ascii_lowercase()),
            "href" => self
                .driver
                .attribute(node, "href")
                .await?
                .map(|href| href.trim().to_string()),
            "type" => self
                .driver
                .attribute(node, "type")
                .await?
                .map(|t| t.to_ascii_lowercase()),
            other => self.driver.attribute(node, &other.replace('_', "-")).await?,
        };
        Ok(fetched)
    }

    async fn matcher_filter(
        &self,
        kind: ElementKind,
        selector: &Selector,
        nodes: Vec<NodeId>,
    ) -> Result<Vec<NodeId>, LocateError> {
        if !Matcher::applies(kind) {
            return Ok(nodes);
        }
        let mut kept = Vec::new();
        for node in nodes {
            match Matcher::validate(self.driver.as_ref(), &node, kind, selector).await {
                Ok(true) => kept.push(node),
                Ok(false) => {}
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(kept)
    }

    /// Branch 5: visibility filtering, then index selection. An index
    /// out of range is a miss, never an error.
    async fn apply_post(
        &self,
        nodes: Vec<NodeId>,
        post: &PostFilters,
        single: bool,
    ) -> Result<Vec<NodeId>, LocateError> {
        let nodes = match post.visible {
            Some(want) => {
                let mut kept = Vec::new();
                for node in nodes {
                    match self.driver.is_displayed(&node).await {
                        Ok(shown) if shown == want => kept.push(node),
                        Ok(_) => {}
                        Err(e) if e.is_stale() => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                kept
            }
            None => nodes,
        };

        if single && !post.is_empty() {
            return Ok(select_index(nodes, post.effective_index())
                .into_iter()
                .collect());
        }
        Ok(nodes)
    }
}

/// Branch 1 check: exactly `{id}` or `{id, tag_name}`, both literal.
fn id_fast_path(normalized: &NormalizedSelector) -> Option<(&str, Option<&str>)> {
    let selector = normalized.selector();
    let id = selector.get("id")?.as_literal()?;
    match selector.len() {
        1 => Some((id, None)),
        2 => {
            let tag = selector.get("tag_name")?.as_literal()?;
            Some((id, Some(tag)))
        }
        _ => None,
    }
}

/// Branch 2 check: a lone key with a native lookup kind and a plain
/// literal value. A negated class token is not native.
fn single_native_key(normalized: &NormalizedSelector) -> Option<(By, &str)> {
    let selector = normalized.selector();
    if selector.len() != 1 {
        return None;
    }
    let (key, value) = selector.iter().next()?;
    let by = By::from_selector_key(key)?;
    let literal = value.as_literal()?;
    if by == By::ClassName && literal.starts_with('!') {
        return None;
    }
    Some((by, literal))
}

fn select_index(nodes: Vec<NodeId>, index: i64) -> Option<NodeId> {
    let len = nodes.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        nodes.into_iter().nth(resolved as usize)
    } else {
        None
    }
}

/// Mirror of the expression builder's comparison semantics, applied to
/// a fetched value.
fn value_matches(key: &str, expected: &SelectorValue, fetched: Option<&str>) -> bool {
    match expected {
        SelectorValue::Literal(want) => match key {
            "partial_link_text" => fetched.map(|v| v.contains(want.as_str())).unwrap_or(false),
            "class" => class_token_matches(fetched, want),
            "tag_name" | "type" => {
                fetched == Some(want.to_ascii_lowercase().as_str())
            }
            _ => fetched == Some(want.as_str()),
        },
        SelectorValue::Pattern(re) => fetched.map(|v| re.is_match(v)).unwrap_or(false),
        SelectorValue::Presence(true) => fetched.is_some(),
        SelectorValue::Presence(false) => fetched.is_none(),
        SelectorValue::Many(entries) if key == "class" => entries
            .iter()
            .all(|entry| match entry {
                SelectorValue::Literal(token) => class_token_matches(fetched, token),
                SelectorValue::Pattern(re) => fetched.map(|v| re.is_match(v)).unwrap_or(false),
                _ => false,
            }),
        SelectorValue::Many(entries) => entries
            .iter()
            .any(|entry| value_matches(key, entry, fetched)),
        SelectorValue::Index(_) => false,
    }
}

/// Class tokens match as members of the space-separated class set; a
/// leading `!` negates the term.
fn class_token_matches(fetched: Option<&str>, token: &str) -> bool {
    let (negated, token) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let present = fetched
        .map(|classes| classes.split_whitespace().any(|t| t == token))
        .unwrap_or(false);
    present != negated
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_bridge::fixture::FixtureDriver;
    use regex::Regex;

    fn locator(fx: Arc<FixtureDriver>) -> Locator {
        Locator::new(fx)
    }

    #[tokio::test]
    async fn test_id_fast_path_is_a_single_lookup() {
        let fx = Arc::new(FixtureDriver::new());
        let node = fx.node("div").attr("id", "foo").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new().with("id", "foo"),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(node));
        assert_eq!(fx.query_count(), 1, "fast path must issue one lookup");
    }

    #[tokio::test]
    async fn test_id_fast_path_validates_tag() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("div").attr("id", "foo").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new().with("id", "foo").with("tag_name", "span"),
            )
            .await
            .unwrap();
        assert_eq!(found, None, "tag mismatch is a miss, not a fallback");
        assert_eq!(fx.query_count(), 1);
    }

    #[tokio::test]
    async fn test_single_key_pattern_scans_descendants() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("div").text("Cancel").insert();
        let wanted = fx.node("div").text("Submit").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new().with("text", Regex::new("^Submit$").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(wanted));
    }

    #[tokio::test]
    async fn test_structural_query_with_two_literals() {
        let fx = Arc::new(FixtureDriver::new());
        let node = fx
            .node("input")
            .attr("name", "interests")
            .attr("value", "cars")
            .attr("type", "checkbox")
            .insert();
        let expected =
            ".//input[@name='interests' and {}='checkbox' and @value='cars']".replace(
                "{}",
                "translate(@type, 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')",
            );
        fx.route(By::XPath, &expected, vec![node.clone()]);
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::CheckBox,
                &Selector::new()
                    .with("name", "interests")
                    .with("value", "cars")
                    .with("type", "checkbox"),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(node));
    }

    #[tokio::test]
    async fn test_negative_index_counts_from_the_end() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("li").insert();
        fx.node("li").insert();
        let last = fx.node("li").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("tag_name", "li")
                    .with("index", SelectorValue::Index(-1)),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(last));
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_a_miss_not_an_error() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("li").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("tag_name", "li")
                    .with("index", SelectorValue::Index(1337)),
            )
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_visible_filter_defaults_to_first_visible() {
        let fx = Arc::new(FixtureDriver::new());
        fx.node("li").hidden().insert();
        let shown = fx.node("li").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new().with("tag_name", "li").with("visible", true),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(shown));
    }

    #[tokio::test]
    async fn test_locate_all_rejects_index() {
        let fx = Arc::new(FixtureDriver::new());
        let loc = locator(fx);

        let err = loc
            .locate_all(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("tag_name", "li")
                    .with("index", SelectorValue::Index(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LocateError::Selector(SelectorError::IndexOnPlural)
        ));
    }

    #[tokio::test]
    async fn test_label_redirect_through_for_attribute() {
        let fx = Arc::new(FixtureDriver::new());
        fx.permissive_xpath();
        fx.node("label").attr("for", "x").text("First name").insert();
        let control = fx.node("input").attr("id", "x").insert();
        let loc = locator(fx.clone());

        let found = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::TextField,
                &Selector::new().with("label", Regex::new("^First name$").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(control));
    }

    #[tokio::test]
    async fn test_negated_class_list_filtering() {
        let fx = Arc::new(FixtureDriver::new());
        fx.permissive_xpath();
        let node = fx.node("div").attr("class", "a b c").insert();
        let loc = locator(fx.clone());

        // `!a` must reject, `b` must match, co-present `c` rejects
        let miss = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("class", vec!["!a"])
                    .with("text", Regex::new(".*").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(miss, None);

        let hit = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("class", vec!["b"])
                    .with("text", Regex::new(".*").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(hit, Some(node));

        let miss = loc
            .locate_one(
                &QueryRoot::document(),
                ElementKind::Generic,
                &Selector::new()
                    .with("class", vec!["a", "!c", "b"])
                    .with("text", Regex::new(".*").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn test_select_index_semantics() {
        let nodes: Vec<NodeId> = (0..3).map(|_| NodeId::new()).collect();
        assert_eq!(
            select_index(nodes.clone(), -1),
            Some(nodes[2].clone()),
            "-1 selects the last of three"
        );
        assert_eq!(select_index(nodes.clone(), 1337), None);
        assert_eq!(select_index(nodes, -4), None);
    }
}
