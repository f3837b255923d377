//! Tab: the high-level query engine over one session.
//!
//! All lookups are snapshot-based: each attempt fetches a document
//! snapshot, runs the match remotely, then resolves the returned ids
//! inside that same snapshot. Soft lookups ([`select`], [`find`] and
//! their `_all` variants) poll every 500ms until the timeout and then
//! report "nothing" as `None` or an empty vec; only [`wait_for`]
//! escalates a missed deadline to [`Error::NotFound`].
//!
//! Queries scoped to an [`Element`] get one stale-node recovery: when
//! the browser reports the scope node gone, the handle is refreshed by
//! backend id and the query retried exactly once.
//!
//! [`select`]: Tab::select
//! [`find`]: Tab::find
//! [`wait_for`]: Tab::wait_for

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::browser::element::Element;
use crate::browser::node;
use crate::browser::wait::{POLL_INTERVAL, poll_until};
use crate::cdp::{dom, page, runtime};
use crate::error::{Error, Result};
use crate::identifiers::NodeId;
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Containers whose text is markup plumbing, not page content. Text
/// hits resolving into these are dropped unless a tag filter names one
/// explicitly.
const BANNED_TEXT_SEARCH_TAGS: [&str; 6] = ["title", "meta", "script", "link", "style", "head"];

// ============================================================================
// Locator
// ============================================================================

/// What [`Tab::wait_for`] waits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A CSS selector.
    Css(String),
    /// Visible page text.
    Text(String),
}

impl Locator {
    /// CSS selector locator.
    #[inline]
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Page text locator.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css `{selector}`"),
            Self::Text(text) => write!(f, "text `{text}`"),
        }
    }
}

// ============================================================================
// FindOptions
// ============================================================================

/// Knobs for the text-search operations.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Prefer the candidate whose rendered text is closest in length
    /// to the query over earlier, looser hits.
    ///
    /// Inert on the single-result [`Tab::find`] path: that path stops
    /// at the first accepted candidate before any ranking happens, so
    /// the flag changes nothing there.
    pub best_match: bool,

    /// Resolve text-node hits to their nearest element ancestor.
    /// When `false` the raw `#text` node is returned instead.
    pub return_enclosing_element: bool,

    /// Accept a candidate only when its full rendered text equals the
    /// query exactly, substring hits aside.
    pub exact_match: bool,

    /// Accept only candidates with this tag, overriding the banned-tag
    /// list.
    pub tag_filter: Option<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            best_match: true,
            return_enclosing_element: true,
            exact_match: false,
            tag_filter: None,
        }
    }
}

impl FindOptions {
    /// Requires the full rendered text to equal the query.
    #[inline]
    #[must_use]
    pub fn exact(mut self) -> Self {
        self.exact_match = true;
        self
    }

    /// Restricts matches to one tag.
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_filter = Some(tag.into());
        self
    }

    /// Keeps raw text-node hits instead of their element ancestors.
    #[inline]
    #[must_use]
    pub fn keeping_text_nodes(mut self) -> Self {
        self.return_enclosing_element = false;
        self
    }
}

// ============================================================================
// Tab
// ============================================================================

/// One browser tab, driven over one protocol session.
#[derive(Clone)]
pub struct Tab {
    session: Session,
}

impl Tab {
    /// Wraps an existing session.
    #[inline]
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Connects to a tab's remote-debugging WebSocket endpoint.
    pub async fn attach(endpoint: &str) -> Result<Self> {
        Ok(Self::new(Session::connect(endpoint).await?))
    }

    /// The underlying session, for raw commands and event listeners.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Closes the underlying session.
    pub fn close(&self) {
        self.session.close();
    }
}

// ============================================================================
// Tab - Selector Queries
// ============================================================================

impl Tab {
    /// Returns the first match for a CSS selector, polling until the
    /// timeout. `None` on timeout, never an error.
    pub async fn select(&self, selector: &str, timeout: Duration) -> Result<Option<Element>> {
        poll_until(timeout, POLL_INTERVAL, || {
            self.query_selector(selector, None)
        })
        .await
    }

    /// Like [`select`](Tab::select), scoped to an element's subtree.
    pub async fn select_from(
        &self,
        selector: &str,
        scope: &Element,
        timeout: Duration,
    ) -> Result<Option<Element>> {
        poll_until(timeout, POLL_INTERVAL, || {
            self.query_selector(selector, Some(scope))
        })
        .await
    }

    /// Returns every match for a CSS selector, polling until at least
    /// one exists or the timeout passes. An empty vec on timeout,
    /// never an error. `tag` keeps only matches with that tag name.
    pub async fn select_all(
        &self,
        selector: &str,
        timeout: Duration,
        tag: Option<&str>,
    ) -> Result<Vec<Element>> {
        let hits = poll_until(timeout, POLL_INTERVAL, || async move {
            let hits = self.query_selector_all(selector, None).await?;
            Ok((!hits.is_empty()).then_some(hits))
        })
        .await?;

        Ok(Self::retain_tag(hits.unwrap_or_default(), tag))
    }

    /// Like [`select_all`](Tab::select_all), scoped to an element's
    /// subtree.
    pub async fn select_all_from(
        &self,
        selector: &str,
        scope: &Element,
        timeout: Duration,
        tag: Option<&str>,
    ) -> Result<Vec<Element>> {
        let hits = poll_until(timeout, POLL_INTERVAL, || async move {
            let hits = self.query_selector_all(selector, Some(scope)).await?;
            Ok((!hits.is_empty()).then_some(hits))
        })
        .await?;

        Ok(Self::retain_tag(hits.unwrap_or_default(), tag))
    }

    fn retain_tag(mut hits: Vec<Element>, tag: Option<&str>) -> Vec<Element> {
        if let Some(tag) = tag {
            let tag = tag.to_lowercase();
            hits.retain(|e| e.tag() == tag);
        }
        hits
    }

    /// One selector attempt, dispatching on scope.
    async fn query_selector(
        &self,
        selector: &str,
        scope: Option<&Element>,
    ) -> Result<Option<Element>> {
        match scope {
            None => {
                let tree = Arc::new(self.session.send(dom::GetDocument::full()).await?);
                let hit = self
                    .session
                    .send(dom::QuerySelector::new(tree.node_id, selector))
                    .await?;
                Ok(hit.and_then(|node_id| self.resolve_one(node_id, &tree, &tree)))
            }
            Some(scope) => {
                self.with_stale_retry(scope, || self.query_selector_scoped(selector, scope))
                    .await
            }
        }
    }

    async fn query_selector_scoped(
        &self,
        selector: &str,
        scope: &Element,
    ) -> Result<Option<Element>> {
        let (root, tree) = scope.scope_root();
        let hit = self
            .session
            .send(dom::QuerySelector::new(root.node_id, selector))
            .await?;
        Ok(hit.and_then(|node_id| self.resolve_one(node_id, &root, &tree)))
    }

    /// One selector-all attempt, dispatching on scope.
    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<&Element>,
    ) -> Result<Vec<Element>> {
        match scope {
            None => {
                let tree = Arc::new(self.session.send(dom::GetDocument::full()).await?);
                let node_ids = self
                    .session
                    .send(dom::QuerySelectorAll::new(tree.node_id, selector))
                    .await?;
                Ok(self.resolve_all(node_ids, &tree, &tree))
            }
            Some(scope) => {
                self.with_stale_retry(scope, || self.query_selector_all_scoped(selector, scope))
                    .await
            }
        }
    }

    async fn query_selector_all_scoped(
        &self,
        selector: &str,
        scope: &Element,
    ) -> Result<Vec<Element>> {
        let (root, tree) = scope.scope_root();
        let node_ids = self
            .session
            .send(dom::QuerySelectorAll::new(root.node_id, selector))
            .await?;
        Ok(self.resolve_all(node_ids, &root, &tree))
    }

    /// Resolves one returned id inside the snapshot it came from.
    fn resolve_one(
        &self,
        node_id: NodeId,
        root: &dom::Node,
        tree: &Arc<dom::Node>,
    ) -> Option<Element> {
        let found = node::find_by_node_id(root, node_id)?.clone();
        Some(Element::new(found, Arc::clone(tree), self.session.clone()))
    }

    fn resolve_all(
        &self,
        node_ids: Vec<NodeId>,
        root: &dom::Node,
        tree: &Arc<dom::Node>,
    ) -> Vec<Element> {
        node_ids
            .into_iter()
            .filter_map(|node_id| self.resolve_one(node_id, root, tree))
            .collect()
    }

    /// Runs a scoped attempt with one stale-node recovery.
    ///
    /// When the browser reports the scope node gone, the handle is
    /// refreshed and the attempt retried once. A second miss, or a
    /// failed refresh, reports the first failure unchanged.
    async fn with_stale_retry<T, F, Fut>(&self, scope: &Element, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match attempt().await {
            Ok(value) => Ok(value),
            Err(original) if original.is_node_not_found() => {
                warn!(
                    backend_node_id = %scope.backend_node_id(),
                    "Scope node gone; refreshing and retrying once"
                );
                if scope.update().await.is_err() {
                    return Err(original);
                }
                match attempt().await {
                    Ok(value) => Ok(value),
                    Err(retry) if retry.is_node_not_found() => Err(original),
                    Err(other) => Err(other),
                }
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Tab - Text Queries
// ============================================================================

impl Tab {
    /// Returns the first element matching page text, polling until the
    /// timeout. `None` on timeout, never an error.
    ///
    /// The first candidate that survives the tag and exact-match
    /// filters wins; see [`FindOptions::best_match`].
    pub async fn find(
        &self,
        text: &str,
        options: &FindOptions,
        timeout: Duration,
    ) -> Result<Option<Element>> {
        poll_until(timeout, POLL_INTERVAL, || async move {
            let mut hits = self.search_text(text, options, true).await?;
            Ok((!hits.is_empty()).then(|| hits.remove(0)))
        })
        .await
    }

    /// Returns every element matching page text, polling until at
    /// least one exists or the timeout passes. An empty vec on
    /// timeout, never an error.
    pub async fn find_all(
        &self,
        text: &str,
        options: &FindOptions,
        timeout: Duration,
    ) -> Result<Vec<Element>> {
        let hits = poll_until(timeout, POLL_INTERVAL, || async move {
            let hits = self.search_text(text, options, false).await?;
            Ok((!hits.is_empty()).then_some(hits))
        })
        .await?;
        Ok(hits.unwrap_or_default())
    }

    /// One text-search attempt: open, collect, discard, resolve.
    async fn search_text(
        &self,
        text: &str,
        options: &FindOptions,
        first_only: bool,
    ) -> Result<Vec<Element>> {
        let tree = Arc::new(self.session.send(dom::GetDocument::full()).await?);
        let handle = self.session.send(dom::PerformSearch::new(text)).await?;

        let node_ids = if handle.result_count > 0 {
            self.session.send(dom::GetSearchResults::all(&handle)).await?
        } else {
            Vec::new()
        };
        self.session
            .send(dom::DiscardSearchResults {
                search_id: handle.search_id.clone(),
            })
            .await?;

        let mut results = Vec::new();
        for node_id in node_ids {
            if first_only && !results.is_empty() {
                break;
            }
            let Some(hit) = node::find_by_node_id(&tree, node_id) else {
                debug!(%node_id, "Search hit absent from snapshot");
                continue;
            };
            let element = Element::new(hit.clone(), Arc::clone(&tree), self.session.clone());
            Self::accept_candidate(&mut results, element, text, options);
        }

        self.session.send(dom::Disable).await?;
        Ok(results)
    }

    /// Applies the ancestor, tag, and exact-match rules to one hit.
    fn accept_candidate(
        results: &mut Vec<Element>,
        element: Element,
        text: &str,
        options: &FindOptions,
    ) {
        let candidate = if element.is_text_node() && options.return_enclosing_element {
            match element.parent() {
                Some(parent) => parent,
                None => {
                    debug!(node_id = %element.node_id(), "Text hit without a snapshot parent");
                    return;
                }
            }
        } else {
            element
        };

        match options.tag_filter.as_deref() {
            Some(tag) => {
                if candidate.tag() != tag.to_lowercase() {
                    return;
                }
            }
            None => {
                if BANNED_TEXT_SEARCH_TAGS.contains(&candidate.tag().as_str()) {
                    return;
                }
            }
        }

        if options.exact_match && candidate.text() != text {
            return;
        }

        results.push(candidate);
    }
}

// ============================================================================
// Tab - Waiting
// ============================================================================

impl Tab {
    /// Waits for a locator to match, polling until the timeout.
    ///
    /// The assertion-style counterpart of the soft lookups: a missed
    /// deadline is [`Error::NotFound`] naming the locator.
    pub async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        let found = poll_until(timeout, POLL_INTERVAL, || async move {
            match locator {
                Locator::Css(selector) => self.query_selector(selector, None).await,
                Locator::Text(text) => {
                    let mut hits = self
                        .search_text(text, &FindOptions::default(), true)
                        .await?;
                    Ok((!hits.is_empty()).then(|| hits.remove(0)))
                }
            }
        })
        .await?;

        found.ok_or_else(|| Error::not_found(locator.to_string(), timeout.as_millis() as u64))
    }
}

// ============================================================================
// Tab - Script Evaluation
// ============================================================================

/// Wraps an expression so sync and promise results come back through
/// the same JSON envelope.
fn evaluation_envelope(expression: &str) -> String {
    format!(
        r#"(() => {{
    const resp = (() => {{ return ({expression}); }})();
    if (resp instanceof Promise) {{
        return new Promise((resolve, reject) => {{
            resp.then(x => resolve(JSON.stringify({{ "x": x }}))).catch(reject);
        }});
    }}
    return JSON.stringify({{ "x": resp }});
}})()"#
    )
}

/// Depth-limited dump walking the prototype chain; functions come back
/// as source text.
fn dump_script_deep(expression: &str) -> String {
    format!(
        r#"(() => {{
    function dump(obj, depth) {{
        if (typeof obj === 'function') return obj.toString();
        if (depth < 0 || obj === null || typeof obj !== 'object') return obj;
        const out = {{}};
        const names = new Set();
        let proto = obj;
        while (proto && proto !== Object.prototype) {{
            for (const name of Object.getOwnPropertyNames(proto)) names.add(name);
            proto = Object.getPrototypeOf(proto);
        }}
        for (const name of names) {{
            try {{ out[name] = dump(obj[name], depth - 1); }} catch (e) {{}}
        }}
        return out;
    }}
    return dump({expression}, 2);
}})()"#
    )
}

/// Own-keys-only dump with a cycle guard, for objects the deep walk
/// chokes on.
fn dump_script_guarded(expression: &str) -> String {
    format!(
        r#"(() => {{
    const seen = new WeakSet();
    function dump(obj) {{
        if (obj === null || typeof obj !== 'object') return obj;
        if (seen.has(obj)) return undefined;
        seen.add(obj);
        const out = {{}};
        for (const name of Object.keys(obj)) {{
            try {{ out[name] = dump(obj[name]); }} catch (e) {{}}
        }}
        return out;
    }}
    return dump({expression});
}})()"#
    )
}

impl Tab {
    /// Evaluates a JavaScript expression and returns its value.
    ///
    /// The expression is wrapped so a returned promise (awaited when
    /// `await_promise` is set) and a plain value both come back
    /// through one serialized envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::JsSyntax`] when the expression never compiled
    /// - [`Error::JsException`] when remote execution threw
    pub async fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Value> {
        let reply = self
            .session
            .send(runtime::Evaluate::new(
                evaluation_envelope(expression),
                await_promise,
                true,
            ))
            .await?;

        if let Some(detail) = reply.exception_details {
            let description = detail.describe();
            return Err(Error::js_exception(detail.text, description));
        }

        match reply.result.value {
            Some(Value::String(payload)) => {
                let envelope: Value = serde_json::from_str(&payload)?;
                Ok(envelope.get("x").cloned().unwrap_or(Value::Null))
            }
            Some(other) => Ok(other),
            None => Ok(Value::Null),
        }
    }

    /// Evaluates an expression and returns the remote object reference
    /// without serializing it, for values that cannot come back by
    /// value.
    pub async fn evaluate_handle(
        &self,
        expression: &str,
        await_promise: bool,
    ) -> Result<runtime::RemoteObject> {
        let reply = self
            .session
            .send(runtime::Evaluate::new(expression, await_promise, false))
            .await?;

        if let Some(detail) = reply.exception_details {
            let description = detail.describe();
            return Err(Error::js_exception(detail.text, description));
        }
        Ok(reply.result)
    }

    /// Serializes a live page object graph to JSON.
    ///
    /// Tries a depth-limited prototype-walking dump first; when that
    /// throws remotely (cyclic or host objects, typically), falls back
    /// once to a cycle-guarded own-keys dump.
    pub async fn dump_object(&self, expression: &str) -> Result<Value> {
        let first = self
            .session
            .send(runtime::Evaluate::new(dump_script_deep(expression), true, true).bypassing_csp())
            .await?;

        let reply = match first.exception_details {
            None => first,
            Some(detail) => {
                debug!(text = %detail.text, "Deep dump threw; trying guarded dump");
                let second = self
                    .session
                    .send(
                        runtime::Evaluate::new(dump_script_guarded(expression), true, true)
                            .bypassing_csp(),
                    )
                    .await?;
                if let Some(detail) = second.exception_details {
                    let description = detail.describe();
                    return Err(Error::js_exception(detail.text, description));
                }
                second
            }
        };

        Ok(reply.result.value.unwrap_or(Value::Null))
    }
}

// ============================================================================
// Tab - Page Operations
// ============================================================================

impl Tab {
    /// Navigates to a URL.
    pub async fn goto(&self, url: &str) -> Result<()> {
        let reply = self.session.send(page::Navigate::new(url)).await?;
        if let Some(error_text) = reply.error_text {
            return Err(Error::connection(format!(
                "navigation to {url} failed: {error_text}"
            )));
        }
        Ok(())
    }

    /// Reloads the current page.
    pub async fn reload(&self) -> Result<()> {
        self.session.send(page::Reload::default()).await
    }

    /// Enables page lifecycle events on this session.
    pub async fn enable_page_events(&self) -> Result<()> {
        self.session.send(page::Enable).await
    }

    /// Returns the full page markup.
    pub async fn content(&self) -> Result<String> {
        let root = self.session.send(dom::GetDocument::full()).await?;
        self.session
            .send(dom::GetOuterHtml::by_backend_id(root.backend_node_id))
            .await
    }

    /// Captures a full-page PNG screenshot.
    pub async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        self.session.send(page::CaptureScreenshot::png()).await
    }
}

// ============================================================================
// Tests
// ============================================================================
