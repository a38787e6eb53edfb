//! Selector normalization.
//!
//! Renames synonym keys to their canonical spelling, type-checks every
//! value, validates non-structural keys against the element kind's
//! capability descriptor, and enforces the raw-selector combination
//! rules. Everything here fails before a single driver call is made.

use elemental_core_types::{
    ElementKind, Selector, SelectorValue, BUTTON_INPUT_TYPES, NON_TEXT_INPUT_TYPES,
};
use tracing::debug;

use crate::errors::SelectorError;

/// Keys with engine-defined meaning; always accepted, never checked
/// against the kind's attribute registry.
pub const STRUCTURAL_KEYS: &[&str] = &[
    "tag_name", "text", "xpath", "index", "class", "label", "css", "visible",
];

/// Keys allowed to ride along with a raw `xpath`/`css` selector.
const RAW_COMPATIBLE_KEYS: &[&str] = &["tag_name", "index", "visible"];

/// Wildcard families of namespaced attributes.
const WILDCARD_PREFIXES: &[&str] = &["aria_", "data_"];

/// A selector that has passed normalization; keys are canonical and
/// every value has the right shape for its key.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedSelector {
    inner: Selector,
    kind: ElementKind,
}

impl NormalizedSelector {
    pub fn selector(&self) -> &Selector {
        &self.inner
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn into_selector(self) -> Selector {
        self.inner
    }
}

fn canonical_key(key: &str) -> &str {
    match key {
        "class_name" => "class",
        "caption" => "text",
        other => other,
    }
}

fn key_is_known(kind: ElementKind, key: &str) -> bool {
    STRUCTURAL_KEYS.contains(&key)
        || kind.spec().valid_attributes.contains(&key)
        || WILDCARD_PREFIXES.iter().any(|p| key.starts_with(p))
}

fn check_value_shape(key: &str, value: &SelectorValue) -> Result<(), SelectorError> {
    let invalid = |reason: &str| {
        Err(SelectorError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };
    match key {
        "index" => match value {
            SelectorValue::Index(_) => Ok(()),
            _ => invalid("expected an integer"),
        },
        "visible" => match value {
            SelectorValue::Presence(_) => Ok(()),
            _ => invalid("expected a boolean"),
        },
        "xpath" | "css" => match value {
            SelectorValue::Literal(_) => Ok(()),
            _ => invalid("expected a literal query string"),
        },
        "text" | "label" | "link_text" | "partial_link_text" => match value {
            SelectorValue::Literal(_) | SelectorValue::Pattern(_) => Ok(()),
            _ => invalid("expected a string or a pattern"),
        },
        _ => match value {
            SelectorValue::Index(_) => invalid("an integer is only valid for \"index\""),
            SelectorValue::Many(entries) => {
                if entries.is_empty() {
                    invalid("list value must not be empty")
                } else if entries
                    .iter()
                    .all(|e| matches!(e, SelectorValue::Literal(_) | SelectorValue::Pattern(_)))
                {
                    Ok(())
                } else {
                    invalid("list entries must be strings or patterns")
                }
            }
            _ => Ok(()),
        },
    }
}

/// Kind-specific value restrictions that are usage errors, not misses.
fn check_kind_rules(kind: ElementKind, key: &str, value: &SelectorValue) -> Result<(), SelectorError> {
    if key != "type" {
        return Ok(());
    }
    if let SelectorValue::Literal(requested) = value {
        let lowered = requested.to_ascii_lowercase();
        match kind {
            ElementKind::Button if !BUTTON_INPUT_TYPES.contains(&lowered.as_str()) => {
                return Err(SelectorError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{requested:?} is not a button input type"),
                });
            }
            ElementKind::TextField if NON_TEXT_INPUT_TYPES.contains(&lowered.as_str()) => {
                return Err(SelectorError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{requested:?} is not a text input type"),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Normalize a caller selector for the given element kind.
pub fn normalize(kind: ElementKind, selector: &Selector) -> Result<NormalizedSelector, SelectorError> {
    let mut out = Selector::new();
    for (raw_key, value) in selector.iter() {
        let key = canonical_key(raw_key);
        if !key_is_known(kind, key) {
            return Err(SelectorError::UnknownKey {
                kind: kind.name(),
                key: raw_key.to_string(),
            });
        }
        check_value_shape(key, value)?;
        check_kind_rules(kind, key, value)?;
        out.insert(key, value.clone());
    }

    for raw in ["xpath", "css"] {
        if !out.contains_key(raw) {
            continue;
        }
        for key in out.keys() {
            if key != raw && !RAW_COMPATIBLE_KEYS.contains(&key) {
                return Err(SelectorError::ConflictingKeys {
                    first: raw.to_string(),
                    second: key.to_string(),
                });
            }
        }
    }

    debug!(kind = kind.name(), selector = %out, "normalized selector");
    Ok(NormalizedSelector { inner: out, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_synonyms_are_renamed() {
        let normalized = normalize(
            ElementKind::Generic,
            &Selector::new().with("class_name", "box").with("caption", "Hi"),
        )
        .unwrap();
        assert!(normalized.selector().contains_key("class"));
        assert!(normalized.selector().contains_key("text"));
        assert!(!normalized.selector().contains_key("class_name"));
    }

    #[test]
    fn test_unknown_key_is_a_usage_error() {
        let err = normalize(
            ElementKind::Generic,
            &Selector::new().with("href", "https://x.test"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::UnknownKey { .. }));
        // the same key is declared for links
        assert!(normalize(
            ElementKind::Link,
            &Selector::new().with("href", "https://x.test")
        )
        .is_ok());
    }

    #[test]
    fn test_wildcard_families_pass() {
        assert!(normalize(
            ElementKind::Generic,
            &Selector::new()
                .with("aria_label", "Close")
                .with("data_qa", "submit")
        )
        .is_ok());
    }

    #[test]
    fn test_index_must_be_integer() {
        let err = normalize(
            ElementKind::Generic,
            &Selector::new().with("index", "first"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::InvalidValue { .. }));
    }

    #[test]
    fn test_integer_only_valid_under_index() {
        let err = normalize(
            ElementKind::Generic,
            &Selector::new().with("title", SelectorValue::Index(2)),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::InvalidValue { .. }));
    }

    #[test]
    fn test_raw_selector_combination_rules() {
        let ok = normalize(
            ElementKind::Generic,
            &Selector::new()
                .with("xpath", ".//div")
                .with("tag_name", "div")
                .with("index", SelectorValue::Index(1)),
        );
        assert!(ok.is_ok());

        let err = normalize(
            ElementKind::Generic,
            &Selector::new().with("xpath", ".//div").with("id", "x"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::ConflictingKeys { .. }));
    }

    #[test]
    fn test_button_rejects_non_button_type() {
        let err = normalize(
            ElementKind::Button,
            &Selector::new().with("type", "radio"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::InvalidValue { .. }));
    }

    #[test]
    fn test_text_field_rejects_non_text_type() {
        let err = normalize(
            ElementKind::TextField,
            &Selector::new().with("type", "checkbox"),
        )
        .unwrap_err();
        assert!(matches!(err, SelectorError::InvalidValue { .. }));
        assert!(normalize(
            ElementKind::TextField,
            &Selector::new().with("type", "email")
        )
        .is_ok());
    }

    #[test]
    fn test_patterns_survive_normalization() {
        let normalized = normalize(
            ElementKind::Generic,
            &Selector::new().with("text", Regex::new("^Submit$").unwrap()),
        )
        .unwrap();
        assert!(normalized.selector().get("text").unwrap().has_pattern());
    }
}
