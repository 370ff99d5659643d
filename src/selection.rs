//! Region selection, common ancestors and extraction of the selected subtree.

use std::collections::{BTreeSet, HashMap};

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::{
    error::TreeError, event::ChangeType, iterator::post_order, DrawableTree, NodeId,
};

/// What a region selection does with the nodes inside the region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Select exactly the nodes inside the region
    #[default]
    Node,
    /// Select nodes inside the region together with their whole clade
    Clade,
    /// Select the tips descending from nodes inside the region
    Descendant,
    /// Unselect nodes inside the region, leaving the rest untouched
    Unselect,
}

/// Containment including all four edges. `region` may have any corner order.
fn contains_inclusive(region: Rect, point: Point) -> bool {
    let region = region.abs();
    (region.x0..=region.x1).contains(&point.x) && (region.y0..=region.y1).contains(&point.y)
}

impl DrawableTree {
    pub fn selection_mode(&self) -> SelectionMode {
        self.config.selection_mode
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.config.selection_mode = mode;
    }

    /// Update the selected flag of a node and the selection set together
    pub(crate) fn set_selected(&mut self, id: NodeId, selected: bool) {
        self.tree[id].selected = selected;
        if selected {
            self.selected.insert(id);
        } else {
            self.selected.remove(&id);
        }
    }

    /// Apply the current [`SelectionMode`] to the nodes whose position lies in
    /// `region`, laying the tree out first if needed. Descendants of collapsed
    /// nodes are not visited. `None` clears the selection.
    ///
    /// Returns whether any node is selected afterwards.
    pub fn select_region(&mut self, region: Option<Rect>) -> bool {
        let Some(region) = region else {
            self.unselect_all();
            return false;
        };
        let Some(root) = self.tree.root() else {
            return false;
        };
        self.ensure_layout();

        let mode = self.config.selection_mode;
        let _span = debug_span!("select_region", ?mode).entered();

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.tree[id];
            let inside = contains_inclusive(region, node.position());
            let collapsed = node.is_collapsed();
            let offspring = node.offspring().to_vec();

            match (mode, inside) {
                (SelectionMode::Unselect, true) => self.set_selected(id, false),
                (SelectionMode::Unselect, false) => {}
                // Hidden descendants go along with a collapsed node
                (_, false) if collapsed => {
                    self.unselect_clade(id);
                    continue;
                }
                (_, false) => self.set_selected(id, false),
                (SelectionMode::Node, true) => self.set_selected(id, true),
                (SelectionMode::Clade, true) => {
                    self.select_clade(id);
                    continue;
                }
                (SelectionMode::Descendant, true) => {
                    self.select_tips(id);
                    continue;
                }
            }

            if !collapsed {
                stack.extend(offspring.into_iter().rev());
            }
        }

        debug!(selected = self.selected.len(), "Region selection done");
        !self.selected.is_empty()
    }

    /// Select `id` and every node below it
    pub fn select_clade(&mut self, id: NodeId) {
        if !self.tree.contains(id) {
            return;
        }
        for node in post_order(&self.tree, id) {
            self.set_selected(node, true);
        }
    }

    /// Unselect `id` and every node below it
    pub fn unselect_clade(&mut self, id: NodeId) {
        if !self.tree.contains(id) {
            return;
        }
        for node in post_order(&self.tree, id) {
            self.set_selected(node, false);
        }
    }

    /// Select the tips below `id`, treating collapsed nodes as tips
    fn select_tips(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.tree[current];
            if node.is_tip() || node.is_collapsed() {
                self.set_selected(current, true);
            } else {
                stack.extend(node.offspring().iter().rev());
            }
        }
    }

    pub fn unselect_all(&mut self) {
        for id in std::mem::take(&mut self.selected) {
            if let Some(node) = self.tree.node_mut(id) {
                node.selected = false;
            }
        }
    }

    /// Selected nodes in id order
    pub fn selected_nodes(&self) -> &BTreeSet<NodeId> {
        &self.selected
    }

    pub fn has_selected_nodes(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Deepest node whose clade contains every node of `sample`. Ids that are
    /// not part of the tree are ignored. Returns `None` for an empty sample.
    pub fn find_common_ancestor(&self, sample: &[NodeId]) -> Option<NodeId> {
        let root = self.tree.root()?;
        let members: BTreeSet<NodeId> = sample
            .iter()
            .copied()
            .filter(|id| self.tree.contains(*id))
            .collect();
        if members.is_empty() {
            return None;
        }

        // Number of members in the clade below each node
        let mut below: HashMap<NodeId, usize> = HashMap::new();
        for member in &members {
            let mut current = Some(*member);
            while let Some(id) = current {
                *below.entry(id).or_default() += 1;
                current = self.tree[id].parent();
            }
        }

        let mut current = root;
        loop {
            if members.contains(&current) {
                return Some(current);
            }
            let mut populated = self.tree[current]
                .offspring()
                .iter()
                .filter(|child| below.contains_key(*child));
            match (populated.next(), populated.next()) {
                (Some(only), None) => current = *only,
                _ => return Some(current),
            }
        }
    }

    /// Common ancestor of the current selection
    pub fn selection_ancestor(&self) -> Option<NodeId> {
        let sample: Vec<NodeId> = self.selected.iter().copied().collect();
        self.find_common_ancestor(&sample)
    }

    /// Smallest tree spanning the selected tips.
    ///
    /// The clade of the selection's common ancestor is copied, then unselected
    /// tips are pruned until every remaining tip is selected. With a single
    /// selected node its whole clade is copied.
    pub fn extract_selected_tree(&self) -> Result<DrawableTree, TreeError> {
        let ancestor = self.selection_ancestor().ok_or(TreeError::EmptySelection)?;
        let _span = debug_span!("extract_selected_tree", %ancestor).entered();

        let mut tree = self.tree.clone_subtree(ancestor)?;
        if self.selected.len() > 1 {
            loop {
                let unselected: Vec<NodeId> = tree
                    .all_tips()
                    .into_iter()
                    .filter(|tip| !tree[*tip].is_selected())
                    .collect();
                if unselected.is_empty() {
                    break;
                }
                for tip in unselected {
                    if tree.contains(tip) {
                        tree.remove_clade(tip)?;
                    }
                }
            }
        }

        debug!(tips = tree.num_leaves(), "Extracted selected tree");
        Ok(DrawableTree::from_tree(tree, self.config.clone()))
    }

    /// Collapse every selected expanded node and expand every selected collapsed one
    pub fn toggle_collapsed_selection(&mut self) {
        for id in self.selected.iter() {
            let node = &mut self.tree[*id];
            node.collapsed = !node.collapsed;
        }
        self.collapse_changed();
    }

    /// Expand every selected node
    pub fn uncollapse_selection(&mut self) {
        for id in self.selected.iter() {
            self.tree[*id].collapsed = false;
        }
        self.collapse_changed();
    }

    fn collapse_changed(&mut self) {
        self.calculate_node_positions();
        self.fire(ChangeType::Collapsed);
    }
}
