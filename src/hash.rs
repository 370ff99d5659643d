use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher as _};

use xxhash_rust::xxh64::Xxh64;

use crate::{iterator::post_order, Node, NodeId, Tree};

/// Hash of a node's own topology-relevant data: label and branch length.
/// Annotations and drawing state are not included.
fn hash_node(node: &Node, with_length: bool, state: &mut impl std::hash::Hasher) {
    node.label.hash(state);
    node.dist_to_parent
        .filter(|_| with_length)
        .map(f64::to_bits)
        .hash(state);
}

impl Tree {
    /// Hash of the clade below `id`, covering labels, branch lengths and
    /// offspring order. The branch above `id` is not part of its clade.
    /// Returns `None` for an unknown id.
    pub fn subtree_hash(&self, id: NodeId) -> Option<u64> {
        if !self.contains(id) {
            return None;
        }

        let mut hashes: HashMap<NodeId, u64> = HashMap::new();
        for current in post_order(self, id) {
            let node = &self[current];
            let mut hasher = Xxh64::new(0);

            // Offspring first, then ourselves
            for child in node.offspring() {
                hashes.get(child).hash(&mut hasher);
            }
            hash_node(node, current != id, &mut hasher);
            hashes.insert(current, hasher.finish());
        }
        hashes.get(&id).copied()
    }

    /// Hash of the whole tree, 0 when empty
    pub fn topology_hash(&self) -> u64 {
        self.root()
            .and_then(|root| self.subtree_hash(root))
            .unwrap_or(0)
    }
}

/// Order-independent hash of a set of tip labels
pub fn clade_hash<S: AsRef<str>>(labels: &[S]) -> u64 {
    let mut sorted: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let mut hasher = Xxh64::new(0);
    for label in sorted {
        label.hash(&mut hasher);
    }
    hasher.finish()
}

/// Maps every clade of a tree, identified by the labels of its tips, to the
/// node at its root.
///
/// Nested single-offspring nodes share their child's clade. The first of them in
/// pre-order is kept.
#[derive(Debug, Default)]
pub struct CladeIndex {
    forward: HashMap<NodeId, u64>,
    inverted: HashMap<u64, NodeId>,
}

impl CladeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: &Tree) -> Self {
        let mut index = Self::new();
        for node in tree.iter() {
            let id = node.id();
            let labels: Vec<&str> = tree.tips(id).iter().map(|t| tree[*t].label()).collect();
            let hash = clade_hash(&labels);
            index.forward.insert(id, hash);
            index.inverted.entry(hash).or_insert(id);
        }
        index
    }

    /// Root of the clade whose tips carry exactly `labels`
    pub fn find<S: AsRef<str>>(&self, labels: &[S]) -> Option<NodeId> {
        self.inverted.get(&clade_hash(labels)).copied()
    }

    /// Clade hash of the node `id`
    pub fn get_hash(&self, id: NodeId) -> Option<u64> {
        self.forward.get(&id).copied()
    }

    /// Number of distinct clades
    pub fn len(&self) -> usize {
        self.inverted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverted.is_empty()
    }

    /// Roots of the clades in this index which don't exist in `other`
    pub fn diff(&self, other: &Self) -> HashSet<NodeId> {
        self.inverted
            .iter()
            .filter(|(hash, _)| !other.inverted.contains_key(*hash))
            .map(|(_, id)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::test::find;

    #[traced_test]
    #[test]
    fn hash_ignores_annotations_and_drawing_state() {
        let plain = Tree::from_newick("(A:1,(B:2,C:3):4);").unwrap();
        let mut annotated = Tree::from_newick("(A:1[&rate=2],(B:2,C:3):4);").unwrap();
        let b = find(&annotated, "B").unwrap();
        annotated[b].selected = true;

        assert_eq!(plain.topology_hash(), annotated.topology_hash());
    }

    #[test]
    fn hash_depends_on_lengths_labels_and_order() {
        let base = Tree::from_newick("(A:1,(B:2,C:3):4);").unwrap().topology_hash();
        for other in [
            "(A:1,(B:2,C:3):5);",
            "(A:1,(B:2,D:3):4);",
            "(A:1,(C:3,B:2):4);",
            "(A:1,(B:2,C:3));",
        ] {
            assert_ne!(base, Tree::from_newick(other).unwrap().topology_hash(), "{other}");
        }
    }

    #[test]
    fn subtree_hash_matches_cloned_clade() {
        let tree = Tree::from_newick("(A:1,(B:2,C:3):4);").unwrap();
        let bc = find(&tree, "B").and_then(|b| tree[b].parent()).unwrap();
        let clone = tree.clone_subtree(bc).unwrap();
        assert_eq!(tree.subtree_hash(bc), Some(clone.topology_hash()));
        assert_eq!(Tree::new().topology_hash(), 0);
    }

    #[test]
    fn clade_index_finds_clades_by_tip_set() {
        let tree = Tree::from_newick("((A,B),(C,(D,E)));").unwrap();
        let index = CladeIndex::from_tree(&tree);

        let d = find(&tree, "D").unwrap();
        let de = tree[d].parent().unwrap();
        assert_eq!(index.find(&["E", "D"]), Some(de));
        assert_eq!(index.find(&["D"]), Some(d));
        assert_eq!(index.find(&["A", "C"]), None);
        assert_eq!(index.len(), tree.total_nodes());
        assert_eq!(index.get_hash(de), Some(clade_hash(&["D", "E"])));
    }

    #[test]
    fn clade_diff_ignores_rotation() {
        let left = Tree::from_newick("((A,B),(C,(D,E)));").unwrap();
        let rotated = Tree::from_newick("(((E,D),C),(B,A));").unwrap();
        let moved = Tree::from_newick("((A,B,C),(D,E));").unwrap();

        let left_index = CladeIndex::from_tree(&left);
        assert!(left_index.diff(&CladeIndex::from_tree(&rotated)).is_empty());

        let cde = find(&left, "C").and_then(|c| left[c].parent()).unwrap();
        let diff = left_index.diff(&CladeIndex::from_tree(&moved));
        assert_eq!(diff.len(), 2);
        assert!(diff.contains(&cde));
    }
}
