//! Rooted multifurcating tree stored as a node arena.
//!
//! Nodes live in slots of a `Vec` and refer to each other through [`NodeId`]
//! handles, so every structural edit (removal, rerooting, collapsing) is a
//! rewrite of parent and offspring ids rather than of owning pointers.

use std::ops::{Index, IndexMut};
use std::str::FromStr;

use colored::Colorize;
use tracing::{debug, debug_span, warn};

use crate::{
    error::{ParseError, TreeError},
    iterator::{post_order, PreOrderIter},
    newick::{self, NewickStyle, Parsed},
    node::Node,
    BranchLength, NodeDepth, NodeId,
};

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    root: Option<NodeId>,
    original_newick: Option<String>,
}

/// Length of a branch formed by joining two consecutive branches.
/// Unknown lengths count as zero unless both are unknown.
fn merge_lengths(upper: Option<BranchLength>, lower: Option<BranchLength>) -> Option<BranchLength> {
    match (upper, lower) {
        (None, None) => None,
        (upper, lower) => Some(upper.unwrap_or(0.0) + lower.unwrap_or(0.0)),
    }
}

// ============================================================================
// Construction, arena access
// ============================================================================
impl Tree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Newick string, returning the tree together with any non-fatal warnings
    pub fn parse(text: &str) -> Result<Parsed, ParseError> {
        newick::parse(text)
    }

    /// Parse a Newick string. Warnings are logged and otherwise discarded,
    /// use [`Tree::parse`] to inspect them.
    pub fn from_newick(text: &str) -> Result<Self, ParseError> {
        let parsed = newick::parse(text)?;
        for warning in &parsed.warnings {
            warn!("{warning}");
        }
        Ok(parsed.tree)
    }

    /// Newick representation without annotations
    pub fn to_newick(&self) -> String {
        newick::to_newick(self, NewickStyle::Plain)
    }

    pub fn to_newick_with_style(&self, style: NewickStyle) -> String {
        newick::to_newick(self, style)
    }

    /// The string this tree was parsed from, if any
    pub fn original_newick(&self) -> Option<&str> {
        self.original_newick.as_deref()
    }

    pub(crate) fn set_original_newick(&mut self, text: &str) {
        self.original_newick = Some(text.to_string());
    }

    /// Rebuild the tree from the string it was parsed from, discarding all edits.
    /// Returns false if the tree was not built from Newick text.
    pub fn restore_from_original_newick(&mut self) -> Result<bool, ParseError> {
        let Some(text) = self.original_newick.clone() else {
            return Ok(false);
        };
        *self = Self::from_newick(&text)?;
        Ok(true)
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Some(node));
        id
    }

    /// Number of arena slots, live or freed. Every `NodeId` of this tree indexes below it.
    pub(crate) fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn set_root_id(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Append `child` to the offspring of `parent`
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        self[child].parent = Some(parent);
        self[parent].offspring.push(child);
    }

    /// Remove `child` from the offspring list of `parent`, returning its former
    /// index. The child's own parent link is left for the caller to rewrite.
    fn detach(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let siblings = &mut self[parent].offspring;
        let index = siblings.iter().position(|id| *id == child)?;
        siblings.remove(index);
        Some(index)
    }

    fn free(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.get_mut(id.index()).and_then(Option::take)
    }

    fn free_clade(&mut self, id: NodeId) {
        for node in post_order(self, id) {
            self.free(node);
        }
    }

    /// Drop every node, leaving an empty tree
    pub fn clear(&mut self) {
        self.nodes.iter_mut().for_each(|slot| *slot = None);
        self.root = None;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether `id` refers to a live node of this tree
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&Node, TreeError> {
        if self.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        self.node(id).ok_or(TreeError::UnknownNode(id))
    }

    /// Pre-order traversal of the whole tree
    pub fn iter(&self) -> PreOrderIter<'_> {
        PreOrderIter::new(self, self.root)
    }

    /// Pre-order traversal of the clade below `id`
    pub fn iter_from(&self, id: NodeId) -> PreOrderIter<'_> {
        PreOrderIter::new(self, Some(id))
    }

    /// All nodes, offspring before parents
    pub fn post_order(&self) -> Vec<NodeId> {
        self.root.map(|root| post_order(self, root)).unwrap_or_default()
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    /// # Panics
    /// Panics if `id` is not a live node of this tree.
    fn index(&self, id: NodeId) -> &Self::Output {
        match self.node(id) {
            Some(node) => node,
            None => panic!("node {id} is not part of this tree"),
        }
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("node {id} is not part of this tree"),
        }
    }
}

impl FromStr for Tree {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tree::from_newick(s)
    }
}

// ============================================================================
// Queries
// ============================================================================
impl Tree {
    /// Number of nodes reachable from the root
    pub fn total_nodes(&self) -> usize {
        self.iter().count()
    }

    pub fn num_leaves(&self) -> usize {
        self.root.map(|root| self.num_tips(root)).unwrap_or(0)
    }

    /// Number of tips in the clade below `id`
    pub fn num_tips(&self, id: NodeId) -> usize {
        self.iter_from(id)
            .filter(|n| self[n.id()].is_tip())
            .count()
    }

    /// Tips of the clade below `id`, in left to right order
    pub fn tips(&self, id: NodeId) -> Vec<NodeId> {
        self.iter_from(id)
            .map(|n| n.id())
            .filter(|id| self[*id].is_tip())
            .collect()
    }

    /// Same as [`Tree::tips`]: the tips descending from `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.tips(id)
    }

    pub fn all_tips(&self) -> Vec<NodeId> {
        self.root.map(|root| self.tips(root)).unwrap_or_default()
    }

    /// Nodes with at least one offspring, in pre-order
    pub fn internal_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .map(|n| n.id())
            .filter(|id| !self[*id].is_tip())
            .collect()
    }

    /// All nodes in pre-order
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.iter().map(|n| n.id()).collect()
    }

    /// Number of edges between `id` and the root
    pub fn node_depth(&self, id: NodeId) -> NodeDepth {
        let mut depth = 0;
        let mut current = self.node(id).and_then(Node::parent);
        while let Some(parent) = current {
            depth += 1;
            current = self[parent].parent;
        }
        depth
    }

    /// Greatest edge depth of any tip
    pub fn max_node_depth(&self) -> NodeDepth {
        self.iter()
            .filter(|n| self[n.id()].is_tip())
            .map(|n| n.depth())
            .max()
            .unwrap_or(0)
    }

    /// Greatest edge depth (measured from the root) among tips below `id`
    pub fn max_descendant_node_depth(&self, id: NodeId) -> NodeDepth {
        let base = self.node_depth(id);
        self.iter_from(id)
            .filter(|n| self[n.id()].is_tip())
            .map(|n| base + n.depth())
            .max()
            .unwrap_or(0)
    }

    /// Sum of branch lengths from `id` to the root. Unknown lengths count as zero.
    pub fn dist_to_root(&self, id: NodeId) -> f64 {
        let mut dist = 0.0;
        let mut current = id;
        while let Some(node) = self.node(current) {
            let Some(parent) = node.parent else {
                break;
            };
            dist += node.dist_to_parent.unwrap_or(0.0);
            current = parent;
        }
        dist
    }

    /// Greatest root-to-tip distance
    pub fn max_height(&self) -> f64 {
        self.root
            .map(|root| self.max_descendant_depth(root))
            .unwrap_or(0.0)
    }

    /// Largest sum of the two greatest tip depths. This is the true diameter
    /// only when the longest path passes through the root.
    pub fn max_diameter(&self) -> f64 {
        let Some(root) = self.root else {
            return 0.0;
        };
        let mut depths = self.descendant_depths(root);
        depths.sort_by(|a, b| b.total_cmp(a));
        match depths.as_slice() {
            [first, second, ..] => first + second,
            [only] => *only,
            [] => 0.0,
        }
    }

    /// Root distances of all tips below `id`
    pub fn descendant_depths(&self, id: NodeId) -> Vec<f64> {
        self.tips(id)
            .into_iter()
            .map(|tip| self.dist_to_root(tip))
            .collect()
    }

    /// Root distance of the farthest tip below `id`
    pub fn max_descendant_depth(&self, id: NodeId) -> f64 {
        self.descendant_depths(id)
            .into_iter()
            .fold(0.0, f64::max)
    }

    /// Root distance of the closest tip below `id`
    pub fn min_descendant_depth(&self, id: NodeId) -> f64 {
        self.descendant_depths(id)
            .into_iter()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Distance from `id` to the farthest tip of the whole tree
    pub fn node_height(&self, id: NodeId) -> f64 {
        self.max_height() - self.dist_to_root(id)
    }

    /// Time back from the present (farthest tip) of the closest tip below `id`
    pub fn max_descendant_height(&self, id: NodeId) -> f64 {
        self.max_height() - self.min_descendant_depth(id)
    }

    /// Time back from the present (farthest tip) of the farthest tip below `id`
    pub fn min_descendant_height(&self, id: NodeId) -> f64 {
        self.max_height() - self.max_descendant_depth(id)
    }

    /// Number of lineages crossing time `t`, measured backwards from the farthest tip
    pub fn lineage_count_at_time(&self, t: f64) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let depth = self.max_height() - t;
        if depth < 0.0 {
            return 1;
        }
        self.lineage_count_below(root, depth)
    }

    fn lineage_count_below(&self, id: NodeId, depth: f64) -> usize {
        let this_depth = self.dist_to_root(id);
        let parent_depth = self[id]
            .parent
            .map(|parent| self.dist_to_root(parent))
            .unwrap_or(0.0);

        if this_depth >= depth && parent_depth <= depth {
            1
        } else if this_depth < depth {
            self[id]
                .offspring
                .iter()
                .map(|child| self.lineage_count_below(*child, depth))
                .sum()
        } else {
            0
        }
    }

    /// True only if every non-root node has a defined, non-negative branch length
    pub fn has_branch_lengths(&self) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        self.iter().filter(|n| n.id() != root).all(|n| {
            matches!(self[n.id()].dist_to_parent, Some(d) if d >= 0.0 && d.is_finite())
        })
    }

    /// True if any non-root node has a branch of length zero
    pub fn has_zero_branch_lengths(&self) -> bool {
        self.iter()
            .any(|n| !self[n.id()].is_root() && self[n.id()].dist_to_parent == Some(0.0))
    }

    /// True if every node has zero or two offspring
    pub fn is_binary(&self) -> bool {
        !self.is_empty() && self.iter().all(|n| matches!(self[n.id()].num_offspring(), 0 | 2))
    }

    /// True if the tips below `id` carry exactly the given labels
    pub fn contains_subclade<S: AsRef<str>>(&self, id: NodeId, labels: &[S]) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut tips: Vec<&str> = self.tips(id).into_iter().map(|t| self[t].label()).collect();
        let mut wanted: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
        tips.sort_unstable();
        wanted.sort_unstable();
        tips == wanted
    }
}

// ============================================================================
// Structural mutation
// ============================================================================
impl Tree {
    /// Remove `id`, attaching its offspring to its parent in its place. Each
    /// reattached child keeps its distance to the root by absorbing the
    /// removed node's branch length. Removing the root empties the tree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.require(id)?;
        let _span = debug_span!("remove_node", %id).entered();

        let Some(parent) = self[id].parent else {
            debug!("{} root, tree is now empty", "Removing".bright_red());
            self.clear();
            return Ok(());
        };

        let index = self
            .detach(parent, id)
            .unwrap_or(self[parent].offspring.len());
        let Some(node) = self.free(id) else {
            return Err(TreeError::UnknownNode(id));
        };

        for child in &node.offspring {
            let merged = merge_lengths(node.dist_to_parent, self[*child].dist_to_parent);
            let child_node = &mut self[*child];
            child_node.parent = Some(parent);
            child_node.dist_to_parent = merged;
        }
        self[parent]
            .offspring
            .splice(index..index, node.offspring.iter().copied());

        debug!(
            "{} node {}, {} offspring moved to {parent}",
            "Removed".bright_red(),
            id,
            node.offspring.len()
        );
        Ok(())
    }

    /// Remove `id` together with its whole clade. A non-root parent left with a
    /// single offspring is contracted away. Removing the root empties the tree.
    pub fn remove_clade(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.require(id)?;
        let _span = debug_span!("remove_clade", %id).entered();

        let Some(parent) = self[id].parent else {
            debug!("{} root clade, tree is now empty", "Removing".bright_red());
            self.clear();
            return Ok(());
        };

        self.detach(parent, id);
        self.free_clade(id);
        debug!("{} clade {id}", "Removed".bright_red());

        if !self[parent].is_root() && self[parent].num_offspring() == 1 {
            debug!("Contracting single-offspring parent {parent}");
            self.remove_node(parent)?;
        }
        Ok(())
    }

    /// Fold internal nodes that sit at zero distance below their parent into
    /// polytomies. Zero-length tips are left in place. Returns the number of
    /// nodes moved.
    pub fn collapse_zero_branch_lengths(&mut self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let _span = debug_span!("collapse_zero_branch_lengths").entered();

        let mut moved = 0;
        for child in self[root].offspring.clone() {
            moved += self.collapse_zeros(child);
        }
        debug!("{} {moved} zero-length nodes", "Collapsed".bright_purple());
        moved
    }

    /// Each zero-length internal child of `id` moves up to `id`'s parent and
    /// takes over `id`'s branch length, which leaves its position unchanged.
    fn collapse_zeros(&mut self, id: NodeId) -> usize {
        let Some(parent) = self.node(id).and_then(Node::parent) else {
            return 0;
        };

        let children = self[id].offspring.clone();
        let mut moved = 0;
        for child in &children {
            let node = &self[*child];
            if node.dist_to_parent != Some(0.0) || node.is_tip() {
                continue;
            }
            self.detach(id, *child);
            let dist = self[id].dist_to_parent;
            let at = self[parent]
                .offspring
                .iter()
                .position(|sibling| *sibling == id)
                .map(|i| i + 1)
                .unwrap_or(self[parent].offspring.len());
            self[parent].offspring.insert(at, *child);
            let child_node = &mut self[*child];
            child_node.parent = Some(parent);
            child_node.dist_to_parent = dist;
            moved += 1;
        }

        if moved > 0 {
            match self[id].num_offspring() {
                0 => {
                    self.detach(parent, id);
                    self.free(id);
                }
                1 => {
                    // Cannot fail, `id` is live and has a parent
                    let _ = self.remove_node(id);
                }
                _ => {}
            }
        }

        for child in children {
            moved += self.collapse_zeros(child);
        }
        moved
    }

    /// Make `new_root` the root by reversing every edge on its path to the old
    /// root. Each reversed edge keeps its branch length. Returns false if
    /// `new_root` already is the root.
    pub fn reroot(&mut self, new_root: NodeId) -> Result<bool, TreeError> {
        self.require(new_root)?;
        if self.root == Some(new_root) {
            return Ok(false);
        }
        let _span = debug_span!("reroot", %new_root).entered();

        let mut path = vec![new_root];
        let mut current = new_root;
        while let Some(parent) = self[current].parent {
            path.push(parent);
            current = parent;
        }
        let lengths: Vec<Option<BranchLength>> =
            path.iter().map(|id| self[*id].dist_to_parent).collect();

        for (i, pair) in path.windows(2).enumerate() {
            let (child, parent) = (pair[0], pair[1]);
            self.detach(parent, child);
            self[child].offspring.push(parent);
            let parent_node = &mut self[parent];
            parent_node.parent = Some(child);
            parent_node.dist_to_parent = lengths[i];
        }

        let root = &mut self[new_root];
        root.parent = None;
        root.dist_to_parent = None;
        self.root = Some(new_root);

        debug!("{} at {new_root}, {} edges reversed", "Rerooted".bright_purple(), path.len() - 1);
        Ok(true)
    }

    /// Insert a new unlabeled node halfway along the branch above `id`.
    /// Returns the new node, or `None` if `id` is the root.
    pub fn add_node_before_parent(&mut self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.require(id)?;
        let Some(parent) = self[id].parent else {
            return Ok(None);
        };

        let half = self[id].dist_to_parent.map(|d| d / 2.0);
        let index = self
            .detach(parent, id)
            .unwrap_or(self[parent].offspring.len());
        let inserted = self.alloc(Node::new(None, half));
        self[inserted].parent = Some(parent);
        self[parent].offspring.insert(index, inserted);
        self.attach(inserted, id);
        self[id].dist_to_parent = half;

        debug!("{} node {inserted} above {id}", "Inserted".bright_green());
        Ok(Some(inserted))
    }

    /// Move the first offspring of `id` to the end of its offspring list.
    /// Returns false when there is nothing to rotate.
    pub fn rotate_offspring(&mut self, id: NodeId) -> Result<bool, TreeError> {
        self.require(id)?;
        let offspring = &mut self[id].offspring;
        if offspring.len() < 2 {
            return Ok(false);
        }
        offspring.rotate_left(1);
        Ok(true)
    }

    /// Deep copy of the clade below `id` as a new tree rooted at the copy of
    /// `id`. Labels, annotations and drawing state are copied, the copied
    /// root has no branch length.
    pub fn clone_subtree(&self, id: NodeId) -> Result<Tree, TreeError> {
        self.require(id)?;

        let mut clone = Tree::new();
        let root = clone.alloc(self[id].detached());
        clone[root].dist_to_parent = None;
        clone.root = Some(root);

        let mut stack = vec![(id, root)];
        while let Some((source, target)) = stack.pop() {
            for child in &self[source].offspring {
                let copy = clone.alloc(self[*child].detached());
                clone.attach(target, copy);
                stack.push((*child, copy));
            }
        }
        Ok(clone)
    }
}
