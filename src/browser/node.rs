//! Snapshot tree helpers.
//!
//! A [`Node`] tree from `DOM.getDocument` is a point-in-time copy of
//! the live document. These helpers walk that copy: lookup by id,
//! parent resolution, attribute access, and rendered-text collection.
//! Traversal descends through children, pierced iframe documents, and
//! shadow roots alike.

// ============================================================================
// Imports
// ============================================================================

use crate::cdp::dom::{Node, TEXT_NODE};
use crate::identifiers::{BackendNodeId, NodeId};

// ============================================================================
// Traversal
// ============================================================================

/// Returns the first node in the subtree matching the predicate,
/// depth-first.
pub fn filter_recurse<'a, P>(node: &'a Node, predicate: &P) -> Option<&'a Node>
where
    P: Fn(&Node) -> bool,
{
    if predicate(node) {
        return Some(node);
    }
    for child in subtrees(node) {
        if let Some(found) = filter_recurse(child, predicate) {
            return Some(found);
        }
    }
    None
}

/// Collects every node in the subtree matching the predicate,
/// depth-first.
pub fn filter_recurse_all<'a, P>(node: &'a Node, predicate: &P, out: &mut Vec<&'a Node>)
where
    P: Fn(&Node) -> bool,
{
    if predicate(node) {
        out.push(node);
    }
    for child in subtrees(node) {
        filter_recurse_all(child, predicate, out);
    }
}

/// Finds a node by its snapshot id.
#[inline]
pub fn find_by_node_id(root: &Node, node_id: NodeId) -> Option<&Node> {
    filter_recurse(root, &|n| n.node_id == node_id)
}

/// Finds a node by its backend id.
#[inline]
pub fn find_by_backend_id(root: &Node, backend_node_id: BackendNodeId) -> Option<&Node> {
    filter_recurse(root, &|n| n.backend_node_id == backend_node_id)
}

/// Finds the parent of a node within the snapshot.
///
/// The tree owns children only; the parent link is answered by this
/// explicit lookup against the root instead of a stored back-pointer.
pub fn parent_of(root: &Node, node_id: NodeId) -> Option<&Node> {
    if root.node_id == node_id {
        return None;
    }
    for child in subtrees(root) {
        if child.node_id == node_id {
            return Some(root);
        }
        if let Some(found) = parent_of(child, node_id) {
            return Some(found);
        }
    }
    None
}

/// Direct subtrees of a node: children, pierced iframe document,
/// shadow roots.
fn subtrees(node: &Node) -> impl Iterator<Item = &Node> {
    node.children
        .iter()
        .chain(node.content_document.as_deref())
        .chain(node.shadow_roots.iter())
}

// ============================================================================
// Node Content
// ============================================================================

/// Returns an attribute value from the flat wire list.
pub fn attribute<'a>(node: &'a Node, name: &str) -> Option<&'a str> {
    node.attributes
        .chunks_exact(2)
        .find(|pair| pair[0] == name)
        .map(|pair| pair[1].as_str())
}

/// Returns the full rendered text of a node.
///
/// Text nodes yield their own value; elements yield the values of
/// every descendant text node, joined by single spaces. This is the
/// string exact-match text queries compare against.
pub fn full_text(node: &Node) -> String {
    if node.node_type == TEXT_NODE {
        return node.node_value.trim().to_string();
    }

    let mut texts = Vec::new();
    filter_recurse_all(node, &|n| n.node_type == TEXT_NODE, &mut texts);

    texts
        .iter()
        .map(|n| n.node_value.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json};

    fn sample_tree() -> Node {
        from_value(json!({
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
                    "children": [{
                        "nodeId": 4,
                        "backendNodeId": 104,
                        "nodeType": 1,
                        "nodeName": "BUTTON",
                        "attributes": ["id", "submit", "class", "primary"],
                        "children": [
                            {
                                "nodeId": 5,
                                "backendNodeId": 105,
                                "nodeType": 3,
                                "nodeName": "#text",
                                "nodeValue": "Log",
                            },
                            {
                                "nodeId": 6,
                                "backendNodeId": 106,
                                "nodeType": 1,
                                "nodeName": "B",
                                "children": [{
                                    "nodeId": 7,
                                    "backendNodeId": 107,
                                    "nodeType": 3,
                                    "nodeName": "#text",
                                    "nodeValue": "in",
                                }],
                            },
                        ],
                    }],
                }],
            }],
        }))
        .expect("sample tree")
    }

    #[test]
    fn test_find_by_ids() {
        let tree = sample_tree();

        let button = find_by_node_id(&tree, NodeId::new(4)).expect("button");
        assert_eq!(button.node_name, "BUTTON");

        let same = find_by_backend_id(&tree, BackendNodeId::new(104)).expect("button");
        assert_eq!(same.node_id, NodeId::new(4));

        assert!(find_by_node_id(&tree, NodeId::new(99)).is_none());
    }

    #[test]
    fn test_parent_of() {
        let tree = sample_tree();

        let parent = parent_of(&tree, NodeId::new(5)).expect("parent of text node");
        assert_eq!(parent.node_name, "BUTTON");

        assert!(parent_of(&tree, NodeId::new(1)).is_none());
    }

    #[test]
    fn test_attribute_lookup() {
        let tree = sample_tree();
        let button = find_by_node_id(&tree, NodeId::new(4)).expect("button");

        assert_eq!(attribute(button, "id"), Some("submit"));
        assert_eq!(attribute(button, "class"), Some("primary"));
        assert_eq!(attribute(button, "href"), None);
    }

    #[test]
    fn test_full_text_joins_descendants() {
        let tree = sample_tree();
        let button = find_by_node_id(&tree, NodeId::new(4)).expect("button");

        assert_eq!(full_text(button), "Log in");

        let text = find_by_node_id(&tree, NodeId::new(5)).expect("text node");
        assert_eq!(full_text(text), "Log");
    }
}
