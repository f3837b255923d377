//! Element handle over a snapshot node.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::browser::node;
use crate::cdp::dom::{self, Node, TEXT_NODE};
use crate::error::{Error, Result};
use crate::identifiers::{BackendNodeId, NodeId};
use crate::session::Session;

// ============================================================================
// Element
// ============================================================================

/// A handle to one DOM node, paired with the snapshot it came from.
///
/// Accessors read the captured snapshot and never touch the wire, so
/// they are cheap but can drift from the live page. [`update`] swaps
/// in a fresh snapshot, re-resolving the node by its backend id; this
/// is also the recovery step scoped queries take when the browser
/// reports the node gone.
///
/// Handles are cheap to clone and share their state, so a refresh
/// through one clone is visible through all of them.
///
/// [`update`]: Element::update
#[derive(Clone)]
pub struct Element {
    session: Session,
    state: Arc<RwLock<ElementState>>,
}

/// Captured node plus the snapshot root it was resolved in.
struct ElementState {
    node: Node,
    tree: Arc<Node>,
}

impl Element {
    /// Wraps a snapshot node.
    #[must_use]
    pub(crate) fn new(node: Node, tree: Arc<Node>, session: Session) -> Self {
        Self {
            session,
            state: Arc::new(RwLock::new(ElementState { node, tree })),
        }
    }

    // ========================================================================
    // Snapshot Accessors
    // ========================================================================

    /// Snapshot-scoped node identifier.
    #[inline]
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.state.read().node.node_id
    }

    /// Mutation-resistant backend identifier.
    #[inline]
    #[must_use]
    pub fn backend_node_id(&self) -> BackendNodeId {
        self.state.read().node.backend_node_id
    }

    /// Wire-form node name: upper-case for elements, `#text` for text
    /// nodes.
    #[inline]
    #[must_use]
    pub fn node_name(&self) -> String {
        self.state.read().node.node_name.clone()
    }

    /// Lower-case tag name.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> String {
        self.state.read().node.node_name.to_lowercase()
    }

    /// DOM node type.
    #[inline]
    #[must_use]
    pub fn node_type(&self) -> i64 {
        self.state.read().node.node_type
    }

    /// Returns `true` for text nodes.
    #[inline]
    #[must_use]
    pub fn is_text_node(&self) -> bool {
        self.state.read().node.node_type == TEXT_NODE
    }

    /// Returns one attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        node::attribute(&self.state.read().node, name).map(str::to_string)
    }

    /// Returns every attribute as name/value pairs.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .node
            .attributes
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    /// Full rendered text: the node's own value for text nodes, the
    /// joined descendant text otherwise.
    #[must_use]
    pub fn text(&self) -> String {
        node::full_text(&self.state.read().node)
    }

    /// Resolves the parent element within the captured snapshot.
    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        let state = self.state.read();
        let parent = node::parent_of(&state.tree, state.node.node_id)?.clone();
        Some(Element::new(
            parent,
            Arc::clone(&state.tree),
            self.session.clone(),
        ))
    }

    /// Wraps every direct child as a handle sharing this snapshot.
    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        let state = self.state.read();
        state
            .node
            .children
            .iter()
            .map(|child| Element::new(child.clone(), Arc::clone(&state.tree), self.session.clone()))
            .collect()
    }

    /// Clones the captured snapshot node.
    #[must_use]
    pub fn node(&self) -> Node {
        self.state.read().node.clone()
    }

    /// Snapshot search root for queries scoped to this handle: the
    /// inner document when this node is an IFRAME, the node itself
    /// otherwise.
    pub(crate) fn scope_root(&self) -> (Node, Arc<Node>) {
        let state = self.state.read();
        let root = match (state.node.node_name.as_str(), &state.node.content_document) {
            ("IFRAME", Some(inner)) => (**inner).clone(),
            _ => state.node.clone(),
        };
        (root, Arc::clone(&state.tree))
    }

    // ========================================================================
    // Remote Operations
    // ========================================================================

    /// Re-resolves this handle against a fresh document snapshot.
    ///
    /// Resolution tries the backend id first and falls back to the
    /// snapshot id; if neither is present in the new tree the node is
    /// gone and [`Error::StaleNode`] is returned, leaving the handle
    /// unchanged.
    pub async fn update(&self) -> Result<()> {
        let (backend_node_id, node_id) = {
            let state = self.state.read();
            (state.node.backend_node_id, state.node.node_id)
        };

        let root = Arc::new(self.session.send(dom::GetDocument::full()).await?);
        let refreshed = node::find_by_backend_id(&root, backend_node_id)
            .or_else(|| node::find_by_node_id(&root, node_id))
            .cloned()
            .ok_or_else(|| Error::stale_node(backend_node_id))?;

        debug!(%backend_node_id, old = %node_id, new = %refreshed.node_id, "Refreshed element");

        let mut state = self.state.write();
        state.node = refreshed;
        state.tree = root;
        Ok(())
    }

    /// Retrieves the outer HTML of this node from the live page.
    pub async fn outer_html(&self) -> Result<String> {
        let backend_node_id = self.backend_node_id();
        self.session
            .send(dom::GetOuterHtml::by_backend_id(backend_node_id))
            .await
    }

    /// The session this handle issues remote calls on.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Element")
            .field("node_id", &state.node.node_id)
            .field("backend_node_id", &state.node.backend_node_id)
            .field("node_name", &state.node.node_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    use crate::testing::{Scripted, scripted_session};

    /// Document with one button; `None` drops the button entirely.
    fn snapshot(button_node_id: Option<i64>) -> Value {
        let body_children = match button_node_id {
            Some(node_id) => json!([{
                "nodeId": node_id,
                "backendNodeId": 108,
                "nodeType": 1,
                "nodeName": "BUTTON",
                "attributes": ["id", "submit"],
                "children": [{
                    "nodeId": node_id + 1,
                    "backendNodeId": 109,
                    "nodeType": 3,
                    "nodeName": "#text",
                    "nodeValue": "Login",
                }],
            }]),
            None => json!([]),
        };
        json!({
            "nodeId": 1,
            "backendNodeId": 101,
            "nodeType": 9,
            "nodeName": "#document",
            "children": [{
                "nodeId": 2,
                "backendNodeId": 102,
                "nodeType": 1,
                "nodeName": "HTML",
                "children": [{
                    "nodeId": 3,
                    "backendNodeId": 103,
                    "nodeType": 1,
                    "nodeName": "BODY",
                    "children": body_children,
                }],
            }],
        })
    }

    fn button_handle(session: Session, tree: Value) -> Element {
        let root: Node = serde_json::from_value(tree).expect("snapshot");
        let tree = Arc::new(root);
        let button = node::find_by_backend_id(&tree, BackendNodeId::new(108))
            .expect("button in snapshot")
            .clone();
        Element::new(button, tree, session)
    }

    #[tokio::test]
    async fn test_accessors_read_snapshot_without_io() {
        let session = scripted_session(|_method, _params| Scripted::Silent);
        let button = button_handle(session, snapshot(Some(8)));

        assert_eq!(button.node_id(), NodeId::new(8));
        assert_eq!(button.backend_node_id(), BackendNodeId::new(108));
        assert_eq!(button.tag(), "button");
        assert_eq!(button.node_name(), "BUTTON");
        assert!(!button.is_text_node());
        assert_eq!(button.attribute("id").as_deref(), Some("submit"));
        assert_eq!(button.attributes(), vec![("id".into(), "submit".into())]);
        assert_eq!(button.text(), "Login");
        assert_eq!(button.parent().expect("parent").tag(), "body");
        assert!(button.children()[0].is_text_node());
    }

    #[tokio::test]
    async fn test_update_reresolves_by_backend_id() {
        // The refreshed document renumbers the button but keeps its
        // backend id.
        let session = scripted_session(|method, _params| match method {
            "DOM.getDocument" => Scripted::Result(json!({"root": snapshot(Some(80))})),
            _ => Scripted::Result(json!({})),
        });
        let button = button_handle(session, snapshot(Some(8)));

        button.update().await.expect("refresh");

        assert_eq!(button.node_id(), NodeId::new(80));
        assert_eq!(button.backend_node_id(), BackendNodeId::new(108));
    }

    #[tokio::test]
    async fn test_update_of_vanished_node_is_stale_and_keeps_handle() {
        let session = scripted_session(|method, _params| match method {
            "DOM.getDocument" => Scripted::Result(json!({"root": snapshot(None)})),
            _ => Scripted::Result(json!({})),
        });
        let button = button_handle(session, snapshot(Some(8)));

        let err = button.update().await.unwrap_err();
        assert!(matches!(err, Error::StaleNode { .. }));
        assert_eq!(button.node_id(), NodeId::new(8));
    }

    #[tokio::test]
    async fn test_clones_share_refreshes() {
        let session = scripted_session(|method, _params| match method {
            "DOM.getDocument" => Scripted::Result(json!({"root": snapshot(Some(80))})),
            _ => Scripted::Result(json!({})),
        });
        let button = button_handle(session, snapshot(Some(8)));
        let twin = button.clone();

        button.update().await.expect("refresh");
        assert_eq!(twin.node_id(), NodeId::new(80));
    }
}
