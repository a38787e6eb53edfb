//! Option selection on select-list elements.

use elemental_core_types::{ElementKind, Selector, SelectorValue};
use tracing::debug;

use crate::element::Element;
use crate::errors::ReadinessError;
use crate::types::Precondition;

impl Element {
    /// Select every option whose visible text, `label` attribute, or
    /// `value` attribute matches. Zero matches is its own error kind,
    /// distinct from the list itself being missing.
    pub async fn select_option(&self, value: &SelectorValue) -> Result<(), ReadinessError> {
        let _lock = self.ctx().timer.lock(self.ctx().config.default_timeout);
        self.satisfy(Precondition::Enabled).await?;

        let options = self
            .elements(ElementKind::SelectOption, Selector::new())
            .to_list()
            .await?;

        let mut any = false;
        for option in options {
            if option_matches(&option, value).await? {
                debug!(chain = %option.selector_chain(), "selecting option");
                option.click().await?;
                any = true;
            }
        }
        if any {
            Ok(())
        } else {
            Err(ReadinessError::NoValueMatched {
                value: value.to_string(),
                chain: self.selector_chain(),
            })
        }
    }
}

async fn option_matches(option: &Element, value: &SelectorValue) -> Result<bool, ReadinessError> {
    let text = option.text().await?;
    let label = option.attribute("label").await?;
    let value_attr = option.attribute("value").await?;

    let candidates = [Some(text.as_str()), label.as_deref(), value_attr.as_deref()];
    Ok(candidates.into_iter().flatten().any(|candidate| match value {
        SelectorValue::Literal(expected) => candidate == expected,
        SelectorValue::Pattern(re) => re.is_match(candidate),
        _ => false,
    }))
}
