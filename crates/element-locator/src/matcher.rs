//! Post-hoc candidate validation.
//!
//! A structural query can over-match: a "button or input" union also
//! returns inputs whose `type` is not button-like, and a text-field
//! query cannot always see the implied type restriction. The matcher
//! re-checks each candidate against the kind's real constraints.

use driver_bridge::{DriverBackend, DriverError};
use elemental_core_types::{
    ElementKind, NodeId, Selector, SelectorValue, BUTTON_INPUT_TYPES, NON_TEXT_INPUT_TYPES,
};
use tracing::info;

/// Candidate validator, one call per matched candidate.
pub struct Matcher;

impl Matcher {
    /// Whether the kind needs per-candidate validation at all.
    pub fn applies(kind: ElementKind) -> bool {
        !kind.spec().tags.is_empty()
    }

    /// For the button kind the `value` key is owned by the matcher
    /// (text-first dual matching), not by the generic residual filter.
    pub fn owns_value_key(kind: ElementKind) -> bool {
        kind == ElementKind::Button
    }

    /// Re-validate one candidate. `Ok(false)` rejects it silently.
    pub async fn validate(
        driver: &dyn DriverBackend,
        node: &NodeId,
        kind: ElementKind,
        selector: &Selector,
    ) -> Result<bool, DriverError> {
        let tags = kind.spec().tags;
        if tags.is_empty() {
            return Ok(true);
        }

        let tag = driver.tag_name(node).await?.to_ascii_lowercase();
        if !tags.contains(&tag.as_str()) {
            return Ok(false);
        }

        match kind {
            ElementKind::Button => Self::validate_button(driver, node, &tag, selector).await,
            ElementKind::TextField if tag == "input" => {
                let input_type = driver
                    .attribute(node, "type")
                    .await?
                    .map(|t| t.to_ascii_lowercase());
                Ok(!matches!(input_type, Some(t) if NON_TEXT_INPUT_TYPES.contains(&t.as_str())))
            }
            _ => Ok(true),
        }
    }

    async fn validate_button(
        driver: &dyn DriverBackend,
        node: &NodeId,
        tag: &str,
        selector: &Selector,
    ) -> Result<bool, DriverError> {
        if tag == "input" {
            let input_type = driver
                .attribute(node, "type")
                .await?
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_default();
            if !BUTTON_INPUT_TYPES.contains(&input_type.as_str()) {
                return Ok(false);
            }
        }

        // Requested value matches visible text first, then the value
        // attribute; a text match short-circuits the remaining checks.
        let Some(requested) = selector.get("value") else {
            return Ok(true);
        };
        let text = driver.text(node).await?;
        let text_matched = match requested {
            SelectorValue::Literal(expected) => text == *expected,
            SelectorValue::Pattern(re) => re.is_match(&text),
            _ => false,
        };
        if text_matched {
            info!(
                %node,
                "button matched by visible text; prefer the \"text\" key over \"value\""
            );
            return Ok(true);
        }

        let value_attr = driver.attribute(node, "value").await?;
        Ok(match requested {
            SelectorValue::Literal(expected) => value_attr.as_deref() == Some(expected.as_str()),
            SelectorValue::Pattern(re) => value_attr.map(|v| re.is_match(&v)).unwrap_or(false),
            _ => false,
        })
    }
}
