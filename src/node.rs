//! Tree node stored in a [`Tree`](crate::Tree) arena.
//!
//! A node carries its structural links (parent and ordered offspring, both as
//! [`NodeId`] handles), its branch length and label, and the drawing state
//! maintained by [`DrawableTree`](crate::DrawableTree): position, selection and
//! collapse flags, Newick annotations and the derived display label.

use std::collections::BTreeMap;

use kurbo::Point;

use crate::{BranchLength, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) offspring: Vec<NodeId>,
    pub(crate) dist_to_parent: Option<BranchLength>,
    pub(crate) label: Option<String>,

    pub(crate) annotations: BTreeMap<String, String>,
    pub(crate) current_label: String,
    pub(crate) error_bar: Option<f64>,
    pub(crate) position: Point,
    pub(crate) selected: bool,
    pub(crate) collapsed: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            parent: None,
            offspring: Vec::new(),
            dist_to_parent: None,
            label: None,
            annotations: BTreeMap::new(),
            current_label: String::new(),
            error_bar: None,
            position: Point::ORIGIN,
            selected: false,
            collapsed: false,
        }
    }
}

impl Node {
    pub(crate) fn new(label: Option<String>, dist_to_parent: Option<BranchLength>) -> Self {
        Self {
            label,
            dist_to_parent,
            ..Default::default()
        }
    }

    /// Copy of this node's payload without any structural links
    pub(crate) fn detached(&self) -> Self {
        Self {
            parent: None,
            offspring: Vec::new(),
            ..self.clone()
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn offspring(&self) -> &[NodeId] {
        &self.offspring
    }

    pub fn num_offspring(&self) -> usize {
        self.offspring.len()
    }

    /// A node without offspring is a tip
    pub fn is_tip(&self) -> bool {
        self.offspring.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Branch length to the parent, `None` when unknown
    pub fn dist_to_parent(&self) -> Option<BranchLength> {
        self.dist_to_parent
    }

    pub fn set_dist_to_parent(&mut self, dist: Option<BranchLength>) {
        self.dist_to_parent = dist;
    }

    pub fn has_dist_to_parent(&self) -> bool {
        self.dist_to_parent.is_some()
    }

    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    /// The node label, or an empty string when the node has none
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Display label derived from the label and annotations
    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    /// Error bar length relative to tree height, from the `error` annotation
    pub fn error_bar(&self) -> Option<f64> {
        self.error_bar
    }

    /// Layout position in the unit square. Only meaningful after a layout pass.
    pub fn position(&self) -> Point {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    // Annotations

    /// Add or replace an annotation. Returns true if the key was already present.
    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.annotations.insert(key.into(), value.into()).is_some()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn has_annotations(&self) -> bool {
        !self.annotations.is_empty()
    }

    pub fn contains_annotation_key(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    pub fn annotation_keys(&self) -> impl Iterator<Item = &str> {
        self.annotations.keys().map(String::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.annotations.remove(key)
    }

    /// Replace all annotations with the supplied set
    pub fn set_all_annotations(&mut self, annotations: BTreeMap<String, String>) {
        self.annotations = annotations;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_replace_reports_existing_key() {
        let mut node = Node::new(Some("A".into()), Some(1.0));
        assert!(!node.add_annotation("color", "red"));
        assert!(node.add_annotation("color", "blue"));
        assert_eq!(node.annotation("color"), Some("blue"));
        assert_eq!(node.annotation_keys().collect::<Vec<_>>(), vec!["color"]);
    }

    #[test]
    fn missing_label_reads_empty() {
        let node = Node::default();
        assert_eq!(node.label(), "");
        assert!(!node.has_label());
        assert!(node.is_tip());
        assert!(node.is_root());
        assert!(!node.has_dist_to_parent());
    }

    #[test]
    fn detached_copy_drops_links() {
        let mut node = Node::new(Some("X".into()), Some(2.5));
        node.parent = Some(NodeId::new(0));
        node.offspring.push(NodeId::new(3));
        node.add_annotation("tip", "x");

        let copy = node.detached();
        assert!(copy.parent().is_none());
        assert!(copy.is_tip());
        assert_eq!(copy.label(), "X");
        assert_eq!(copy.dist_to_parent(), Some(2.5));
        assert_eq!(copy.annotation("tip"), Some("x"));
    }
}
