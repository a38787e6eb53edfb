//! XPath expression rendering.
//!
//! Renders literal attribute predicates into the structural query
//! language. Pattern values are never renderable; callers split them
//! out before asking for an expression. The residual-filter logic in
//! the locator mirrors these rules exactly, so any change here must be
//! made there as well.

use elemental_core_types::{
    ElementKind, Selector, SelectorValue, BUTTON_INPUT_TYPES, NON_TEXT_INPUT_TYPES,
};
use regex::Regex;

use crate::errors::SelectorError;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Quote a literal for use inside an XPath expression.
///
/// XPath has no escape character, so a value containing a single quote
/// is rendered as a `concat(...)` of quoted runs joined by `"'"`.
pub fn escape(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value.split('\'').map(|run| format!("'{run}'")).collect();
    format!("concat({})", parts.join(r#", "'", "#))
}

/// Case-fold an expression at query time.
fn lowered(expr: &str) -> String {
    format!("translate({expr}, '{UPPER}', '{LOWER}')")
}

/// Selector key to document attribute name.
fn attribute_name(key: &str) -> String {
    key.replace('_', "-")
}

/// Per-kind XPath rendering.
///
/// The rendering rules are shared; the button and text-field families
/// override the tag part and a couple of key meanings.
#[derive(Clone, Copy, Debug)]
pub struct XPathBuilder {
    kind: ElementKind,
}

impl XPathBuilder {
    pub fn new(kind: ElementKind) -> Self {
        Self { kind }
    }

    /// Render a full expression from a pattern-free selector.
    ///
    /// `extra_predicates` lets the locator merge narrowing predicates
    /// derived from anchored-literal patterns into the same bracket.
    pub fn build(
        &self,
        selector: &Selector,
        extra_predicates: &[String],
    ) -> Result<String, SelectorError> {
        let mut working = selector.clone();
        let explicit_tag = match working.remove("tag_name") {
            Some(SelectorValue::Literal(tag)) => Some(tag),
            Some(other) => {
                return Err(SelectorError::Internal(format!(
                    "unrenderable tag_name value {other}"
                )))
            }
            None => None,
        };

        let (tag, guard) = self.tag_expression(explicit_tag.as_deref());

        let mut predicates = Vec::new();
        if let Some(guard) = guard {
            predicates.push(guard);
        }
        for (key, value) in working.iter() {
            predicates.push(self.predicate(key, value)?);
        }
        predicates.extend(extra_predicates.iter().cloned());

        if predicates.is_empty() {
            Ok(format!(".//{tag}"))
        } else {
            Ok(format!(".//{tag}[{}]", predicates.join(" and ")))
        }
    }

    /// The tag part of the expression plus the kind's tag guard, when
    /// the kind cannot be expressed as a single tag name.
    pub fn tag_expression(&self, explicit_tag: Option<&str>) -> (String, Option<String>) {
        if let Some(tag) = explicit_tag {
            let guard = match self.kind {
                ElementKind::TextField if tag == "input" => Some(text_type_guard()),
                _ => None,
            };
            return (tag.to_string(), guard);
        }
        match self.kind {
            ElementKind::Button => {
                let types = BUTTON_INPUT_TYPES
                    .iter()
                    .map(|t| format!("{}='{t}'", lowered("@type")))
                    .collect::<Vec<_>>()
                    .join(" or ");
                (
                    "*".to_string(),
                    Some(format!("(self::button or (self::input and ({types})))")),
                )
            }
            ElementKind::TextField => ("input".to_string(), Some(text_type_guard())),
            ElementKind::Frame => (
                "*".to_string(),
                Some("(self::iframe or self::frame)".to_string()),
            ),
            kind => match kind.sole_tag() {
                Some(tag) => (tag.to_string(), None),
                None => ("*".to_string(), None),
            },
        }
    }

    /// Render one key/value pair as a predicate.
    pub fn predicate(&self, key: &str, value: &SelectorValue) -> Result<String, SelectorError> {
        if value.has_pattern() {
            return Err(SelectorError::Internal(format!(
                "pattern value under {key:?} reached the expression builder"
            )));
        }
        match key {
            "class" => self.class_predicate(value),
            "text" | "link_text" => {
                Ok(format!("normalize-space()={}", self.literal(key, value)?))
            }
            "partial_link_text" => Ok(format!(
                "contains(normalize-space(), {})",
                self.literal(key, value)?
            )),
            "href" => Ok(format!(
                "normalize-space(@href)={}",
                self.literal(key, value)?
            )),
            "label" if self.kind.spec().label_from_control => {
                let text = self.literal(key, value)?;
                Ok(format!(
                    "(@id = //label[normalize-space()={text}]/@for or ancestor::label[normalize-space()={text}])"
                ))
            }
            "type" => self.type_predicate(value),
            "value" if self.kind == ElementKind::Button => {
                let text = self.literal(key, value)?;
                Ok(format!("(normalize-space()={text} or @value={text})"))
            }
            _ => self.attribute_predicate(&attribute_name(key), value),
        }
    }

    fn literal(&self, key: &str, value: &SelectorValue) -> Result<String, SelectorError> {
        match value {
            SelectorValue::Literal(s) => Ok(escape(s)),
            other => Err(SelectorError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    fn class_predicate(&self, value: &SelectorValue) -> Result<String, SelectorError> {
        match value {
            SelectorValue::Presence(true) => Ok("@class".to_string()),
            SelectorValue::Presence(false) => Ok("not(@class)".to_string()),
            SelectorValue::Literal(token) => Ok(class_token(token)),
            SelectorValue::Many(entries) => {
                let rendered: Result<Vec<String>, SelectorError> = entries
                    .iter()
                    .map(|entry| match entry {
                        SelectorValue::Literal(token) => Ok(class_token(token)),
                        other => Err(SelectorError::Internal(format!(
                            "unrenderable class entry {other}"
                        ))),
                    })
                    .collect();
                Ok(rendered?.join(" and "))
            }
            other => Err(SelectorError::InvalidValue {
                key: "class".to_string(),
                reason: format!("unsupported value {other}"),
            }),
        }
    }

    fn type_predicate(&self, value: &SelectorValue) -> Result<String, SelectorError> {
        match value {
            SelectorValue::Literal(requested) => Ok(format!(
                "{}={}",
                lowered("@type"),
                escape(&requested.to_ascii_lowercase())
            )),
            SelectorValue::Presence(true) if self.kind == ElementKind::TextField => {
                // "any text type": conjunction of type != non-text
                let conj = NON_TEXT_INPUT_TYPES
                    .iter()
                    .map(|t| format!("{}!='{t}'", lowered("@type")))
                    .collect::<Vec<_>>()
                    .join(" and ");
                Ok(format!("(@type and {conj})"))
            }
            SelectorValue::Presence(true) => Ok("@type".to_string()),
            SelectorValue::Presence(false) => Ok("not(@type)".to_string()),
            SelectorValue::Many(entries) => {
                let rendered: Result<Vec<String>, SelectorError> = entries
                    .iter()
                    .map(|entry| self.type_predicate(entry))
                    .collect();
                Ok(format!("({})", rendered?.join(" or ")))
            }
            other => Err(SelectorError::InvalidValue {
                key: "type".to_string(),
                reason: format!("unsupported value {other}"),
            }),
        }
    }

    fn attribute_predicate(
        &self,
        attribute: &str,
        value: &SelectorValue,
    ) -> Result<String, SelectorError> {
        match value {
            SelectorValue::Literal(s) => Ok(format!("@{attribute}={}", escape(s))),
            SelectorValue::Presence(true) => Ok(format!("@{attribute}")),
            SelectorValue::Presence(false) => Ok(format!("not(@{attribute})")),
            SelectorValue::Many(entries) => {
                let rendered: Result<Vec<String>, SelectorError> = entries
                    .iter()
                    .map(|entry| self.attribute_predicate(attribute, entry))
                    .collect();
                Ok(format!("({})", rendered?.join(" or ")))
            }
            other => Err(SelectorError::InvalidValue {
                key: attribute.to_string(),
                reason: format!("unsupported value {other}"),
            }),
        }
    }
}

fn text_type_guard() -> String {
    let conj = NON_TEXT_INPUT_TYPES
        .iter()
        .map(|t| format!("{}!='{t}'", lowered("@type")))
        .collect::<Vec<_>>()
        .join(" and ");
    format!("(not(@type) or ({conj}))")
}

/// A class token predicate: classes are a space-separated set, so
/// matching is "contains token bounded by spaces", never equality.
/// A leading `!` negates the term.
fn class_token(token: &str) -> String {
    let (negated, token) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let padded = escape(&format!(" {token} "));
    let term = format!("contains(concat(' ', normalize-space(@class), ' '), {padded})");
    if negated {
        format!("not({term})")
    } else {
        term
    }
}

/// Conservative anchored-literal fragment of a pattern, used to narrow
/// a structural query with a `contains()` term. Patterns carrying
/// inline flags (including case-insensitivity), alternation, classes,
/// or interior wildcards are never converted.
pub fn literal_narrowing(pattern: &Regex) -> Option<String> {
    let source = pattern.as_str();
    if source.starts_with("(?") {
        return None;
    }
    let prefix_anchored = source.starts_with('^');
    let suffix_anchored = source.ends_with('$') && !source.ends_with("\\$");
    if !prefix_anchored && !suffix_anchored {
        return None;
    }
    let mut body = source;
    if prefix_anchored {
        body = &body[1..];
    }
    if suffix_anchored {
        body = &body[..body.len() - 1];
    }
    let literal = !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'));
    literal.then(|| body.to_string())
}

/// Render a narrowing `contains()` predicate for a key, when the key's
/// fetched value has a structural counterpart.
pub fn contains_predicate(key: &str, fragment: &str) -> Option<String> {
    let quoted = escape(fragment);
    match key {
        "text" | "link_text" | "label" => {
            Some(format!("contains(normalize-space(), {quoted})"))
        }
        "partial_link_text" => Some(format!("contains(normalize-space(), {quoted})")),
        "tag_name" | "index" | "visible" => None,
        "class" => Some(format!("contains(@class, {quoted})")),
        other => Some(format!("contains(@{}, {quoted})", attribute_name(other))),
    }
}
