//! The element wrapper and its readiness state machine.
//!
//! An element is created unlocated, becomes located on the first
//! successful lookup, and silently drops back to unlocated when a use
//! detects staleness. Every readiness wait composes the previous one
//! (exists -> present -> enabled -> writable) under one shared
//! deadline, and every wait on a nested element waits for its
//! ancestors first, so a failure always blames the nearest missing
//! scope.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use driver_bridge::{DriverError, QueryRoot};
use element_locator::LocateError;
use elemental_core_types::{ElementKind, NodeId, Selector};
use tracing::{debug, info, warn};

use crate::errors::ReadinessError;
use crate::types::{EngineContext, Precondition};

/// The query scope an element hangs off.
#[derive(Clone)]
pub enum Scope {
    /// The page's document root.
    Page,

    /// Descendants of another element.
    Within(Box<Element>),

    /// The document inside a frame element.
    Frame(Box<Element>),
}

impl Scope {
    /// Render the scope prefix of a selector chain.
    pub(crate) fn chain_prefix(&self) -> Option<String> {
        match self {
            Scope::Page => None,
            Scope::Within(parent) | Scope::Frame(parent) => Some(parent.selector_chain()),
        }
    }

    /// Compute the query root this scope denotes, locating ancestors
    /// as needed (without waiting). `None` when an ancestor is absent.
    pub(crate) async fn resolve_root(&self) -> Result<Option<QueryRoot>, ReadinessError> {
        match self {
            Scope::Page => Ok(Some(QueryRoot::document())),
            Scope::Within(parent) => {
                let Some(handle) = Box::pin(parent.ensure_located()).await? else {
                    return Ok(None);
                };
                let Some(parent_root) = Box::pin(parent.scope.resolve_root()).await? else {
                    return Ok(None);
                };
                Ok(Some(QueryRoot::within(parent_root.frame_path, handle)))
            }
            Scope::Frame(frame) => {
                let Some(handle) = Box::pin(frame.ensure_located()).await? else {
                    return Ok(None);
                };
                let Some(frame_root) = Box::pin(frame.scope.resolve_root()).await? else {
                    return Ok(None);
                };
                let mut path = frame_root.frame_path;
                path.push(handle);
                Ok(Some(QueryRoot::frame_document(path)))
            }
        }
    }
}

pub(crate) fn chain_of(scope: &Scope, selector: &Selector) -> String {
    match scope.chain_prefix() {
        Some(prefix) => format!("{prefix} --> {selector}"),
        None => selector.to_string(),
    }
}

enum Action {
    Click,
    Type(String),
    Clear,
}

/// A located-on-demand wrapper around one node of the remote document.
pub struct Element {
    ctx: Arc<EngineContext>,
    kind: ElementKind,
    selector: Selector,
    scope: Scope,
    handle: Mutex<Option<NodeId>>,
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            kind: self.kind,
            selector: self.selector.clone(),
            scope: self.scope.clone(),
            handle: Mutex::new(self.cached()),
        }
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("selector", &self.selector_chain())
            .field("located", &self.cached().is_some())
            .finish()
    }
}

impl Element {
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
            handle: Mutex::new(None),
        }
    }

    pub(crate) fn located(
        ctx: Arc<EngineContext>,
        kind: ElementKind,
        selector: Selector,
        scope: Scope,
        handle: NodeId,
    ) -> Self {
        let element = Self::new(ctx, kind, selector, scope);
        element.cache(handle);
        element
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The full selector chain from the root scope to this element.
    pub fn selector_chain(&self) -> String {
        chain_of(&self.scope, &self.selector)
    }

    pub(crate) fn ctx(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// An element scoped under this one. Nesting under a frame element
    /// crosses the frame boundary.
    pub fn element(&self, kind: ElementKind, selector: Selector) -> Element {
        let scope = if self.kind == ElementKind::Frame {
            Scope::Frame(Box::new(self.clone()))
        } else {
            Scope::Within(Box::new(self.clone()))
        };
        Element::new(self.ctx.clone(), kind, selector, scope)
    }

    fn cached(&self) -> Option<NodeId> {
        self.handle.lock().unwrap().clone()
    }

    fn cache(&self, handle: NodeId) {
        *self.handle.lock().unwrap() = Some(handle);
    }

    fn clear_handle(&self) {
        *self.handle.lock().unwrap() = None;
    }

    /// Drop every cached handle up the scope chain; a stale ancestor
    /// must be relocated from scratch.
    fn clear_chain(&self) {
        self.clear_handle();
        match &self.scope {
            Scope::Page => {}
            Scope::Within(parent) | Scope::Frame(parent) => parent.clear_chain(),
        }
    }

    fn lift(&self, err: LocateError) -> ReadinessError {
        match err {
            LocateError::Selector(e) => ReadinessError::Usage(e),
            LocateError::Driver(DriverError::WindowClosed) => ReadinessError::WindowGone {
                chain: self.selector_chain(),
            },
            LocateError::Driver(DriverError::NoSuchFrame(_)) => ReadinessError::FrameNotFound {
                chain: self.selector_chain(),
            },
            LocateError::Driver(e) => self.backend(e),
        }
    }

    fn backend(&self, err: DriverError) -> ReadinessError {
        match err {
            DriverError::WindowClosed => ReadinessError::WindowGone {
                chain: self.selector_chain(),
            },
            other => ReadinessError::Backend {
                chain: self.selector_chain(),
                message: other.to_string(),
            },
        }
    }

    fn not_found_now(&self) -> ReadinessError {
        ReadinessError::NotFound {
            chain: self.selector_chain(),
        }
    }

    /// One locate attempt, no waiting. `Ok(None)` when this element or
    /// any ancestor is currently absent.
    async fn locate_now(&self) -> Result<Option<NodeId>, ReadinessError> {
        let Some(root) = self.scope.resolve_root().await? else {
            return Ok(None);
        };
        match self
            .ctx
            .locator
            .locate_one(&root, self.kind, &self.selector)
            .await
        {
            Ok(Some(handle)) => {
                debug!(chain = %self.selector_chain(), %handle, "located");
                self.cache(handle.clone());
                Ok(Some(handle))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_stale() => {
                // a scope handle went stale mid-lookup; relocate the
                // whole chain on the next attempt
                self.clear_chain();
                Ok(None)
            }
            Err(e) => Err(self.lift(e)),
        }
    }

    /// Cached handle, or one locate attempt.
    pub(crate) async fn ensure_located(&self) -> Result<Option<NodeId>, ReadinessError> {
        if let Some(handle) = self.cached() {
            return Ok(Some(handle));
        }
        self.locate_now().await
    }

    /// Whether a handle can be obtained right now. A cached handle is
    /// probed with an idempotent no-op call so staleness is detected
    /// lazily and recovered by relocation.
    pub async fn exists(&self) -> Result<bool, ReadinessError> {
        if let Some(handle) = self.cached() {
            match self.ctx.driver.is_enabled(&handle).await {
                Ok(_) => return Ok(true),
                Err(e) if e.is_stale() => {
                    debug!(chain = %self.selector_chain(), "cached handle went stale");
                    self.clear_handle();
                }
                Err(DriverError::NoSuchNode(_)) => self.clear_handle(),
                Err(DriverError::WindowClosed) => {
                    return Err(ReadinessError::WindowGone {
                        chain: self.selector_chain(),
                    })
                }
                Err(e) => return Err(self.backend(e)),
            }
        }
        Ok(self.locate_now().await?.is_some())
    }

    /// Locate now or raise; the non-relaxed flavor of `wait_for_exists`.
    pub async fn assert_exists(&self) -> Result<NodeId, ReadinessError> {
        if self.exists().await? {
            match self.cached() {
                Some(handle) => Ok(handle),
                None => Err(self.not_found_now()),
            }
        } else {
            Err(self.not_found_now())
        }
    }

    /// Ancestor-first wait propagation: the nearest non-existent
    /// ancestor must be the one blamed on failure.
    async fn scope_wait(&self) -> Result<(), ReadinessError> {
        match &self.scope {
            Scope::Page => Ok(()),
            Scope::Within(parent) => Box::pin(parent.wait_for_exists()).await,
            Scope::Frame(frame) => Box::pin(frame.wait_for_exists())
                .await
                .map_err(ReadinessError::into_frame_context),
        }
    }

    /// Block until the element exists or the shared deadline expires.
    pub async fn wait_for_exists(&self) -> Result<(), ReadinessError> {
        if !self.ctx.config.relaxed_locate {
            return self.assert_exists().await.map(|_| ());
        }
        if self.exists().await? {
            return Ok(());
        }

        let lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.scope_wait().await?;
        let started = Instant::now();
        loop {
            if self.exists().await? {
                return Ok(());
            }
            if self.ctx.timer.expired() {
                if lock.owner() && started.elapsed() >= self.ctx.config.default_timeout {
                    info!(
                        chain = %self.selector_chain(),
                        "relaxed locating consumed the whole timeout; use exists() instead of relying on the exception"
                    );
                }
                return Err(ReadinessError::LocateTimeout {
                    timeout: self.ctx.config.default_timeout,
                    chain: self.selector_chain(),
                });
            }
            self.ctx.timer.pause(self.ctx.config.poll_interval).await;
        }
    }

    /// Block until the element exists and is visible.
    pub async fn wait_for_present(&self) -> Result<(), ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_exists().await?;
        loop {
            if self.present_now().await? {
                return Ok(());
            }
            if self.ctx.timer.expired() {
                return Err(ReadinessError::PresentTimeout {
                    timeout: self.ctx.config.default_timeout,
                    chain: self.selector_chain(),
                });
            }
            self.ctx.timer.pause(self.ctx.config.poll_interval).await;
        }
    }

    /// Block until the element is enabled. Only meaningful for
    /// interactive kinds; others stop at present. The located-but-
    /// disabled timeout is distinguishable from never-found.
    pub async fn wait_for_enabled(&self) -> Result<(), ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_present().await?;
        if !self.kind.spec().interactive {
            return Ok(());
        }
        loop {
            if self.enabled_now().await? {
                return Ok(());
            }
            if self.ctx.timer.expired() {
                return Err(ReadinessError::Disabled {
                    timeout: self.ctx.config.default_timeout,
                    chain: self.selector_chain(),
                });
            }
            self.ctx.timer.pause(self.ctx.config.poll_interval).await;
        }
    }

    /// Block until the element is enabled and not read-only.
    pub async fn wait_for_writable(&self) -> Result<(), ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_enabled().await?;
        if !self.kind.spec().writable {
            return Ok(());
        }
        loop {
            if !self.read_only_now().await? {
                return Ok(());
            }
            if self.ctx.timer.expired() {
                return Err(ReadinessError::ReadOnly {
                    timeout: self.ctx.config.default_timeout,
                    chain: self.selector_chain(),
                });
            }
            self.ctx.timer.pause(self.ctx.config.poll_interval).await;
        }
    }

    async fn present_now(&self) -> Result<bool, ReadinessError> {
        let Some(handle) = self.ensure_located().await? else {
            return Ok(false);
        };
        match self.ctx.driver.is_displayed(&handle).await {
            Ok(displayed) => Ok(displayed),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                Ok(false)
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    async fn enabled_now(&self) -> Result<bool, ReadinessError> {
        let Some(handle) = self.ensure_located().await? else {
            return Ok(false);
        };
        match self.ctx.driver.is_enabled(&handle).await {
            Ok(enabled) => Ok(enabled),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                Ok(false)
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    async fn read_only_now(&self) -> Result<bool, ReadinessError> {
        let Some(handle) = self.ensure_located().await? else {
            return Ok(true);
        };
        match self.ctx.driver.attribute(&handle, "readonly").await {
            Ok(value) => Ok(value.is_some()),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                Ok(true)
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    pub(crate) async fn satisfy(&self, precondition: Precondition) -> Result<(), ReadinessError> {
        match precondition {
            Precondition::Exists => self.wait_for_exists().await,
            Precondition::Present => self.wait_for_present().await,
            Precondition::Enabled => self.wait_for_enabled().await,
            Precondition::Writable => self.wait_for_writable().await,
        }
    }

    /// Click the element, after the precondition fitting its kind.
    pub async fn click(&self) -> Result<(), ReadinessError> {
        let precondition = if self.kind.spec().interactive {
            Precondition::Enabled
        } else {
            Precondition::Present
        };
        self.run_interaction(precondition, Action::Click).await
    }

    /// Type into the element; requires writability.
    pub async fn set_text(&self, text: &str) -> Result<(), ReadinessError> {
        self.run_interaction(Precondition::Writable, Action::Type(text.to_string()))
            .await
    }

    /// Clear the element's value; requires writability.
    pub async fn clear(&self) -> Result<(), ReadinessError> {
        self.run_interaction(Precondition::Writable, Action::Clear)
            .await
    }

    /// Run one interaction under its precondition. The body is retried
    /// exactly once on a stale handle; a backend "not interactable"
    /// signal keeps being retried until the shared deadline while the
    /// precondition is present or enabled, and is fatal otherwise.
    async fn run_interaction(
        &self,
        precondition: Precondition,
        action: Action,
    ) -> Result<(), ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.satisfy(precondition).await?;
        let mut stale_retried = false;
        loop {
            let Some(handle) = self.ensure_located().await? else {
                return Err(self.not_found_now());
            };
            match self.dispatch(&handle, &action).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_stale() && !stale_retried => {
                    stale_retried = true;
                    warn!(
                        chain = %self.selector_chain(),
                        "handle went stale mid-interaction; relocating once"
                    );
                    self.clear_handle();
                    self.satisfy(precondition).await?;
                }
                Err(e)
                    if e.is_not_interactable()
                        && precondition.tolerates_not_interactable() =>
                {
                    if self.ctx.timer.expired() {
                        return Err(match precondition {
                            Precondition::Present => ReadinessError::PresentTimeout {
                                timeout: self.ctx.config.default_timeout,
                                chain: self.selector_chain(),
                            },
                            _ => ReadinessError::Disabled {
                                timeout: self.ctx.config.default_timeout,
                                chain: self.selector_chain(),
                            },
                        });
                    }
                    self.ctx.timer.pause(self.ctx.config.poll_interval).await;
                    self.satisfy(precondition).await?;
                }
                Err(e) => return Err(self.backend(e)),
            }
        }
    }

    async fn dispatch(&self, handle: &NodeId, action: &Action) -> Result<(), DriverError> {
        match action {
            Action::Click => self.ctx.driver.click(handle).await,
            Action::Type(text) => self.ctx.driver.type_text(handle, text).await,
            Action::Clear => self.ctx.driver.clear(handle).await,
        }
    }

    /// Attribute value, once the element exists.
    pub async fn attribute(&self, name: &str) -> Result<Option<String>, ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_exists().await?;
        let Some(handle) = self.ensure_located().await? else {
            return Err(self.not_found_now());
        };
        match self.ctx.driver.attribute(&handle, name).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                self.wait_for_exists().await?;
                let handle = self.assert_exists().await?;
                self.ctx
                    .driver
                    .attribute(&handle, name)
                    .await
                    .map_err(|e| self.backend(e))
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    /// Normalized visible text, once the element exists.
    pub async fn text(&self) -> Result<String, ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_exists().await?;
        let Some(handle) = self.ensure_located().await? else {
            return Err(self.not_found_now());
        };
        match self.ctx.driver.text(&handle).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                self.wait_for_exists().await?;
                let handle = self.assert_exists().await?;
                self.ctx.driver.text(&handle).await.map_err(|e| self.backend(e))
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    /// Case-folded tag name, once the element exists.
    pub async fn tag_name(&self) -> Result<String, ReadinessError> {
        let _lock = self.ctx.timer.lock(self.ctx.config.default_timeout);
        self.wait_for_exists().await?;
        let Some(handle) = self.ensure_located().await? else {
            return Err(self.not_found_now());
        };
        match self.ctx.driver.tag_name(&handle).await {
            Ok(tag) => Ok(tag.to_ascii_lowercase()),
            Err(e) if e.is_stale() => {
                self.clear_handle();
                self.wait_for_exists().await?;
                let handle = self.assert_exists().await?;
                self.ctx
                    .driver
                    .tag_name(&handle)
                    .await
                    .map(|tag| tag.to_ascii_lowercase())
                    .map_err(|e| self.backend(e))
            }
            Err(e) => Err(self.backend(e)),
        }
    }

    /// Computed visibility right now; false when not located.
    pub async fn visible(&self) -> Result<bool, ReadinessError> {
        self.present_now().await
    }

    /// Enabled state right now; false when not located.
    pub async fn enabled(&self) -> Result<bool, ReadinessError> {
        self.enabled_now().await
    }
}
