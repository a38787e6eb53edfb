//! Page facade: wires a driver and a configuration into root-scoped
//! elements. The per-tag accessors are pure call-throughs that merge a
//! tag into the caller's selector and forward to the core.

use std::sync::Arc;

use driver_bridge::DriverBackend;
use elemental_core_types::{ElementKind, EngineConfig, Selector};

use crate::collection::ElementCollection;
use crate::element::{Element, Scope};
use crate::types::EngineContext;

/// Entry point for element lookup on one document.
#[derive(Clone)]
pub struct Page {
    ctx: Arc<EngineContext>,
}

impl Page {
    pub fn new(driver: Arc<dyn DriverBackend>, config: EngineConfig) -> Self {
        Self {
            ctx: EngineContext::new(driver, config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// A root-scoped element of the given kind.
    pub fn element(&self, kind: ElementKind, selector: Selector) -> Element {
        Element::new(self.ctx.clone(), kind, selector, Scope::Page)
    }

    /// A root-scoped collection of the given kind.
    pub fn elements(&self, kind: ElementKind, selector: Selector) -> ElementCollection {
        ElementCollection::new(self.ctx.clone(), kind, selector, Scope::Page)
    }

    fn tagged(&self, tag: &str, selector: Selector) -> Element {
        self.element(
            ElementKind::Generic,
            Selector::new().with("tag_name", tag).merge(selector),
        )
    }

    pub fn button(&self, selector: Selector) -> Element {
        self.element(ElementKind::Button, selector)
    }

    pub fn link(&self, selector: Selector) -> Element {
        self.element(ElementKind::Link, selector)
    }

    pub fn text_field(&self, selector: Selector) -> Element {
        self.element(ElementKind::TextField, selector)
    }

    pub fn text_area(&self, selector: Selector) -> Element {
        self.element(ElementKind::TextArea, selector)
    }

    pub fn checkbox(&self, selector: Selector) -> Element {
        self.element(ElementKind::CheckBox, selector)
    }

    pub fn radio(&self, selector: Selector) -> Element {
        self.element(ElementKind::Radio, selector)
    }

    pub fn select_list(&self, selector: Selector) -> Element {
        self.element(ElementKind::SelectList, selector)
    }

    pub fn file_field(&self, selector: Selector) -> Element {
        self.element(ElementKind::FileField, selector)
    }

    pub fn label(&self, selector: Selector) -> Element {
        self.element(ElementKind::Label, selector)
    }

    pub fn frame(&self, selector: Selector) -> Element {
        self.element(ElementKind::Frame, selector)
    }

    pub fn div(&self, selector: Selector) -> Element {
        self.tagged("div", selector)
    }

    pub fn span(&self, selector: Selector) -> Element {
        self.tagged("span", selector)
    }

    pub fn buttons(&self, selector: Selector) -> ElementCollection {
        self.elements(ElementKind::Button, selector)
    }

    pub fn links(&self, selector: Selector) -> ElementCollection {
        self.elements(ElementKind::Link, selector)
    }

    pub fn divs(&self, selector: Selector) -> ElementCollection {
        self.elements(
            ElementKind::Generic,
            Selector::new().with("tag_name", "div").merge(selector),
        )
    }
}
