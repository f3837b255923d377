//! DOM domain commands and events.
//!
//! Covers document snapshots ([`GetDocument`]), selector matching
//! ([`QuerySelector`], [`QuerySelectorAll`]), the three-step text
//! search ([`PerformSearch`] → [`GetSearchResults`] →
//! [`DiscardSearchResults`]), and markup retrieval ([`GetOuterHtml`]).

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::identifiers::{BackendNodeId, NodeId, SearchId};
use crate::protocol::{Command, ProtocolEvent};

// ============================================================================
// Node
// ============================================================================

/// A DOM node inside one `DOM.getDocument` snapshot.
///
/// The tree is a point-in-time copy of the live document: it becomes
/// stale as soon as the browser mutates the page, and staleness is
/// only detected reactively when a later call reports the node gone.
/// `backend_node_id` survives some of those mutations and is the key
/// used for re-resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Snapshot-scoped node identifier.
    pub node_id: NodeId,

    /// Mutation-resistant backend identifier.
    #[serde(default)]
    pub backend_node_id: BackendNodeId,

    /// DOM node type (1 = element, 3 = text, 9 = document).
    pub node_type: i64,

    /// Node name, upper-case for elements (`DIV`), `#text` for text nodes.
    pub node_name: String,

    /// Node value; text content for text nodes, empty otherwise.
    #[serde(default)]
    pub node_value: String,

    /// Flat name/value attribute list, as sent on the wire.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Owned, ordered child nodes.
    #[serde(default)]
    pub children: Vec<Node>,

    /// Document subtree of an IFRAME node.
    #[serde(default)]
    pub content_document: Option<Box<Node>>,

    /// Shadow root subtrees, present when the snapshot pierced them.
    #[serde(default)]
    pub shadow_roots: Vec<Node>,
}

/// DOM node type of element nodes.
pub const ELEMENT_NODE: i64 = 1;

/// DOM node type of text nodes.
pub const TEXT_NODE: i64 = 3;

// ============================================================================
// GetDocument
// ============================================================================

/// Fetches a document snapshot.
///
/// `DOM.getDocument`
#[derive(Debug, Clone)]
pub struct GetDocument {
    /// Subtree depth; `-1` for the entire tree.
    pub depth: Option<i64>,
    /// Whether to pierce iframes and shadow roots.
    pub pierce: Option<bool>,
}

impl GetDocument {
    /// Full-depth snapshot, piercing iframes and shadow roots.
    #[inline]
    #[must_use]
    pub fn full() -> Self {
        Self {
            depth: Some(-1),
            pierce: Some(true),
        }
    }
}

impl Command for GetDocument {
    type Output = Node;

    fn method(&self) -> &'static str {
        "DOM.getDocument"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        if let Some(depth) = self.depth {
            params.insert("depth".into(), json!(depth));
        }
        if let Some(pierce) = self.pierce {
            params.insert("pierce".into(), json!(pierce));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(reply: Value) -> Result<Node> {
        let root = reply
            .get("root")
            .cloned()
            .ok_or_else(|| Error::protocol(0, "getDocument reply missing root"))?;
        Ok(serde_json::from_value(root)?)
    }
}

// ============================================================================
// QuerySelector
// ============================================================================

/// Matches the first descendant of a node against a CSS selector.
///
/// `DOM.querySelector`
#[derive(Debug, Clone)]
pub struct QuerySelector {
    /// Scope node to query under.
    pub node_id: NodeId,
    /// CSS selector.
    pub selector: String,
}

impl QuerySelector {
    /// Creates a selector query scoped to `node_id`.
    #[inline]
    #[must_use]
    pub fn new(node_id: NodeId, selector: impl Into<String>) -> Self {
        Self {
            node_id,
            selector: selector.into(),
        }
    }
}

impl Command for QuerySelector {
    /// `None` when the selector matched nothing.
    type Output = Option<NodeId>;

    fn method(&self) -> &'static str {
        "DOM.querySelector"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(Some(json!({
            "nodeId": self.node_id,
            "selector": self.selector,
        })))
    }

    fn decode_reply(reply: Value) -> Result<Option<NodeId>> {
        let node_id: NodeId = serde_json::from_value(
            reply
                .get("nodeId")
                .cloned()
                .ok_or_else(|| Error::protocol(0, "querySelector reply missing nodeId"))?,
        )?;
        Ok((!node_id.is_none()).then_some(node_id))
    }
}

// ============================================================================
// QuerySelectorAll
// ============================================================================

/// Matches every descendant of a node against a CSS selector.
///
/// `DOM.querySelectorAll`
#[derive(Debug, Clone)]
pub struct QuerySelectorAll {
    /// Scope node to query under.
    pub node_id: NodeId,
    /// CSS selector.
    pub selector: String,
}

impl QuerySelectorAll {
    /// Creates a selector query scoped to `node_id`.
    #[inline]
    #[must_use]
    pub fn new(node_id: NodeId, selector: impl Into<String>) -> Self {
        Self {
            node_id,
            selector: selector.into(),
        }
    }
}

impl Command for QuerySelectorAll {
    type Output = Vec<NodeId>;

    fn method(&self) -> &'static str {
        "DOM.querySelectorAll"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(Some(json!({
            "nodeId": self.node_id,
            "selector": self.selector,
        })))
    }

    fn decode_reply(reply: Value) -> Result<Vec<NodeId>> {
        let node_ids = reply
            .get("nodeIds")
            .cloned()
            .ok_or_else(|| Error::protocol(0, "querySelectorAll reply missing nodeIds"))?;
        Ok(serde_json::from_value(node_ids)?)
    }
}

// ============================================================================
// PerformSearch
// ============================================================================

/// Opens a text search over the document.
///
/// `DOM.performSearch`. Results are collected with
/// [`GetSearchResults`] and the search must be released with
/// [`DiscardSearchResults`].
#[derive(Debug, Clone)]
pub struct PerformSearch {
    /// Plain text, selector, or XPath query.
    pub query: String,
    /// Whether to search inside user-agent shadow DOM.
    pub include_user_agent_shadow_dom: Option<bool>,
}

impl PerformSearch {
    /// Creates a shadow-DOM-inclusive text search.
    #[inline]
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_user_agent_shadow_dom: Some(true),
        }
    }
}

/// Open search handle returned by [`PerformSearch`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHandle {
    /// Identifier for collecting and discarding results.
    pub search_id: SearchId,
    /// Number of hits.
    pub result_count: i64,
}

impl Command for PerformSearch {
    type Output = SearchHandle;

    fn method(&self) -> &'static str {
        "DOM.performSearch"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        params.insert("query".into(), json!(self.query));
        if let Some(include) = self.include_user_agent_shadow_dom {
            params.insert("includeUserAgentShadowDOM".into(), json!(include));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(reply: Value) -> Result<SearchHandle> {
        Ok(serde_json::from_value(reply)?)
    }
}

// ============================================================================
// GetSearchResults
// ============================================================================

/// Collects a range of hits from an open search.
///
/// `DOM.getSearchResults`
#[derive(Debug, Clone)]
pub struct GetSearchResults {
    /// Handle from [`PerformSearch`].
    pub search_id: SearchId,
    /// Start index, inclusive.
    pub from_index: i64,
    /// End index, exclusive.
    pub to_index: i64,
}

impl GetSearchResults {
    /// Collects every hit of a search.
    #[inline]
    #[must_use]
    pub fn all(handle: &SearchHandle) -> Self {
        Self {
            search_id: handle.search_id.clone(),
            from_index: 0,
            to_index: handle.result_count,
        }
    }
}

impl Command for GetSearchResults {
    type Output = Vec<NodeId>;

    fn method(&self) -> &'static str {
        "DOM.getSearchResults"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(Some(json!({
            "searchId": self.search_id,
            "fromIndex": self.from_index,
            "toIndex": self.to_index,
        })))
    }

    fn decode_reply(reply: Value) -> Result<Vec<NodeId>> {
        let node_ids = reply
            .get("nodeIds")
            .cloned()
            .ok_or_else(|| Error::protocol(0, "getSearchResults reply missing nodeIds"))?;
        Ok(serde_json::from_value(node_ids)?)
    }
}

// ============================================================================
// DiscardSearchResults
// ============================================================================

/// Releases an open search.
///
/// `DOM.discardSearchResults`
#[derive(Debug, Clone)]
pub struct DiscardSearchResults {
    /// Handle from [`PerformSearch`].
    pub search_id: SearchId,
}

impl Command for DiscardSearchResults {
    type Output = ();

    fn method(&self) -> &'static str {
        "DOM.discardSearchResults"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(Some(json!({ "searchId": self.search_id })))
    }

    fn decode_reply(_reply: Value) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// GetOuterHtml
// ============================================================================

/// Retrieves the outer HTML of a node.
///
/// `DOM.getOuterHTML`. Exactly one of the two identifiers should be
/// set; the backend id is preferred because it survives snapshot
/// refreshes.
#[derive(Debug, Clone)]
pub struct GetOuterHtml {
    /// Snapshot-scoped identifier.
    pub node_id: Option<NodeId>,
    /// Mutation-resistant identifier.
    pub backend_node_id: Option<BackendNodeId>,
}

impl GetOuterHtml {
    /// Retrieves markup by backend node id.
    #[inline]
    #[must_use]
    pub fn by_backend_id(backend_node_id: BackendNodeId) -> Self {
        Self {
            node_id: None,
            backend_node_id: Some(backend_node_id),
        }
    }
}

impl Command for GetOuterHtml {
    type Output = String;

    fn method(&self) -> &'static str {
        "DOM.getOuterHTML"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        let mut params = Map::new();
        if let Some(node_id) = self.node_id {
            params.insert("nodeId".into(), json!(node_id));
        }
        if let Some(backend_node_id) = self.backend_node_id {
            params.insert("backendNodeId".into(), json!(backend_node_id));
        }
        Ok(Some(Value::Object(params)))
    }

    fn decode_reply(reply: Value) -> Result<String> {
        Ok(reply
            .get("outerHTML")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

// ============================================================================
// Disable
// ============================================================================

/// Disables DOM agent bookkeeping for this session.
///
/// `DOM.disable`
#[derive(Debug, Clone)]
pub struct Disable;

impl Command for Disable {
    type Output = ();

    fn method(&self) -> &'static str {
        "DOM.disable"
    }

    fn build_params(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn decode_reply(_reply: Value) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Events
// ============================================================================

/// The whole document was replaced; every snapshot node id is invalid.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpdated {}

impl ProtocolEvent for DocumentUpdated {
    const METHOD: &'static str = "DOM.documentUpdated";
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_document_params() {
        let params = GetDocument::full()
            .build_params()
            .expect("build")
            .expect("params");
        assert_eq!(params["depth"], -1);
        assert_eq!(params["pierce"], true);
    }

    #[test]
    fn test_query_selector_no_match_decodes_to_none() {
        let hit = QuerySelector::decode_reply(json!({"nodeId": 0})).expect("decode");
        assert!(hit.is_none());

        let hit = QuerySelector::decode_reply(json!({"nodeId": 12})).expect("decode");
        assert_eq!(hit, Some(NodeId::new(12)));
    }

    #[test]
    fn test_node_snapshot_decoding() {
        let reply = json!({
            "root": {
                "nodeId": 1,
                "backendNodeId": 2,
                "nodeType": 9,
                "nodeName": "#document",
                "children": [{
                    "nodeId": 3,
                    "backendNodeId": 4,
                    "nodeType": 1,
                    "nodeName": "HTML",
                    "attributes": ["lang", "en"],
                }],
            }
        });

        let root = GetDocument::decode_reply(reply).expect("decode");
        assert_eq!(root.node_type, 9);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].node_name, "HTML");
        assert_eq!(root.children[0].attributes, vec!["lang", "en"]);
    }

    #[test]
    fn test_search_round() {
        let handle = PerformSearch::decode_reply(json!({
            "searchId": "s-1",
            "resultCount": 2,
        }))
        .expect("decode");
        assert_eq!(handle.result_count, 2);

        let collect = GetSearchResults::all(&handle);
        let params = collect.build_params().expect("build").expect("params");
        assert_eq!(params["fromIndex"], 0);
        assert_eq!(params["toIndex"], 2);

        let ids = GetSearchResults::decode_reply(json!({"nodeIds": [5, 9]})).expect("decode");
        assert_eq!(ids, vec![NodeId::new(5), NodeId::new(9)]);
    }

    #[test]
    fn test_disable_has_no_params() {
        assert!(Disable.build_params().expect("build").is_none());
    }
}
