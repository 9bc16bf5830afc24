//! Renderer capability the presentation engine drives.
//!
//! The engine never creates visual primitives itself; it asks an opaque
//! renderer for containers and manipulates them through this trait. The
//! concrete surface (DOM, terminal, test harness) lives outside the
//! engine. `TreeRenderer` is the in-memory implementation used by tests
//! and by the CLI to snapshot visible text.

use std::collections::HashMap;

/// Opaque handle to one renderer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

pub const HIDDEN_CLASS: &str = "hidden";

pub trait Renderer {
    fn create_container(&mut self) -> NodeId;
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    fn set_text(&mut self, node: NodeId, text: &str);
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);
    fn set_attribute(&mut self, node: NodeId, key: &str, value: &str);
    fn scroll_into_view(&mut self, node: NodeId);
    fn remove(&mut self, node: NodeId);

    fn show(&mut self, node: NodeId) {
        self.remove_class(node, HIDDEN_CLASS);
    }

    fn hide(&mut self, node: NodeId) {
        self.add_class(node, HIDDEN_CLASS);
    }
}

#[derive(Debug, Default, Clone)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub text: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

impl TreeNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|existing| existing == class)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }
}

/// In-memory node tree. Mirrors the contract closely enough that table
/// and chart behavior can be asserted without a real surface.
#[derive(Debug, Default)]
pub struct TreeRenderer {
    next_id: u64,
    nodes: HashMap<NodeId, TreeNode>,
    last_scrolled: Option<NodeId>,
}

impl TreeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn last_scrolled(&self) -> Option<NodeId> {
        self.last_scrolled
    }

    /// Concatenated text of a node's visible subtree, depth first.
    /// Hidden subtrees contribute nothing.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut pieces = Vec::new();
        self.collect_text(id, &mut pieces);
        pieces.join(" ")
    }

    fn collect_text(&self, id: NodeId, pieces: &mut Vec<String>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.has_class(HIDDEN_CLASS) {
            return;
        }
        if !node.text.is_empty() {
            pieces.push(node.text.clone());
        }
        for child in &node.children {
            self.collect_text(*child, pieces);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get(&id).and_then(|node| node.parent);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes.remove(&id);
    }
}

impl Renderer for TreeRenderer {
    fn create_container(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, TreeNode::default());
        id
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.text = text.to_string();
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            if !node.has_class(class) {
                node.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.classes.retain(|existing| existing != class);
        }
    }

    fn set_attribute(&mut self, node: NodeId, key: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            match node
                .attributes
                .iter_mut()
                .find(|(existing, _)| existing == key)
            {
                Some((_, existing)) => *existing = value.to_string(),
                None => node.attributes.push((key.to_string(), value.to_string())),
            }
        }
    }

    fn scroll_into_view(&mut self, node: NodeId) {
        self.last_scrolled = Some(node);
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.remove_subtree(node);
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, Renderer, TreeRenderer};

    fn build_parent_with_two_children(renderer: &mut TreeRenderer) -> (NodeId, NodeId, NodeId) {
        let parent = renderer.create_container();
        let first = renderer.create_container();
        let second = renderer.create_container();
        renderer.append_child(parent, first);
        renderer.append_child(parent, second);
        (parent, first, second)
    }

    #[test]
    fn unit_append_child_tracks_order_and_parentage() {
        let mut renderer = TreeRenderer::new();
        let (parent, first, second) = build_parent_with_two_children(&mut renderer);
        assert_eq!(renderer.children(parent), &[first, second]);
        assert_eq!(renderer.node(first).and_then(|node| node.parent), Some(parent));
    }

    #[test]
    fn unit_remove_detaches_and_drops_the_subtree() {
        let mut renderer = TreeRenderer::new();
        let (parent, first, second) = build_parent_with_two_children(&mut renderer);
        let grandchild = renderer.create_container();
        renderer.append_child(first, grandchild);

        renderer.remove(first);
        assert_eq!(renderer.children(parent), &[second]);
        assert!(renderer.node(first).is_none());
        assert!(renderer.node(grandchild).is_none());
    }

    #[test]
    fn unit_classes_accumulate_without_duplicates() {
        let mut renderer = TreeRenderer::new();
        let node = renderer.create_container();
        renderer.add_class(node, "time");
        renderer.add_class(node, "gold");
        renderer.add_class(node, "time");
        assert_eq!(renderer.node(node).expect("node").classes, vec!["time", "gold"]);

        renderer.remove_class(node, "gold");
        assert!(!renderer.node(node).expect("node").has_class("gold"));
    }

    #[test]
    fn functional_text_content_skips_hidden_subtrees() {
        let mut renderer = TreeRenderer::new();
        let (parent, first, second) = build_parent_with_two_children(&mut renderer);
        renderer.set_text(first, "visible");
        renderer.set_text(second, "hidden away");
        renderer.hide(second);
        assert_eq!(renderer.text_content(parent), "visible");

        renderer.show(second);
        assert_eq!(renderer.text_content(parent), "visible hidden away");
    }

    #[test]
    fn unit_set_attribute_overwrites_existing_keys() {
        let mut renderer = TreeRenderer::new();
        let node = renderer.create_container();
        renderer.set_attribute(node, "colspan", "6");
        renderer.set_attribute(node, "colspan", "7");
        assert_eq!(renderer.node(node).expect("node").attribute("colspan"), Some("7"));
    }

    #[test]
    fn unit_scroll_into_view_records_the_last_target() {
        let mut renderer = TreeRenderer::new();
        let node = renderer.create_container();
        assert_eq!(renderer.last_scrolled(), None);
        renderer.scroll_into_view(node);
        assert_eq!(renderer.last_scrolled(), Some(node));
    }
}
