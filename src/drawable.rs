//! A [`Tree`] with layout, selection and change notification.

use std::cell::Cell;
use std::collections::{BTreeSet, HashSet};

use colored::Colorize;
use kurbo::{Point, Rect};
use tracing::{debug, debug_span, warn};

use crate::{
    config::{DrawableTreeConfig, LayoutOptions},
    error::{LayoutError, ParseError, ParseWarning, TreeError},
    event::{ChangeType, Listeners, TreeListener},
    id::ListenerId,
    iterator::post_order,
    layout::{LayoutStrategy, Orientation},
    newick, NodeId, Tree,
};

/// Tree state consumed by a renderer: node positions from a layout pass,
/// display labels and error bars derived from annotations, the selection, and
/// listeners notified after every structural or orientation change.
///
/// Positions are only valid between a layout pass and the next structural
/// change. [`DrawableTree::position`] reports [`LayoutError::Stale`] in
/// between, [`DrawableTree::ensure_layout`] recomputes on demand.
#[derive(Debug)]
pub struct DrawableTree {
    pub(crate) tree: Tree,
    pub(crate) config: DrawableTreeConfig,
    /// Always equal to the set of nodes whose `selected` flag is set
    pub(crate) selected: BTreeSet<NodeId>,
    listeners: Listeners,
    layout_valid: bool,
    height: Cell<Option<f64>>,
    warnings: Vec<ParseWarning>,
}

impl Clone for DrawableTree {
    /// Copies the tree and all drawing state. Listeners are not copied.
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            config: self.config.clone(),
            selected: self.selected.clone(),
            listeners: Listeners::default(),
            layout_valid: self.layout_valid,
            height: self.height.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

impl Default for DrawableTree {
    fn default() -> Self {
        Self::new(DrawableTreeConfig::default())
    }
}

// ============================================================================
// Construction
// ============================================================================
impl DrawableTree {
    /// Empty tree
    pub fn new(config: DrawableTreeConfig) -> Self {
        Self::from_tree(Tree::new(), config)
    }

    /// Parse Newick text. Zero-length internal branches are collapsed first
    /// when the configuration asks for it.
    pub fn from_newick(text: &str, config: DrawableTreeConfig) -> Result<Self, ParseError> {
        let _span = debug_span!("DrawableTree::from_newick").entered();
        let newick::Parsed { mut tree, warnings } = newick::parse(text)?;
        for warning in &warnings {
            warn!("{warning}");
        }
        if config.collapse_zero_lengths {
            tree.collapse_zero_branch_lengths();
        }

        let mut drawable = Self::from_tree(tree, config);
        drawable.warnings = warnings;
        Ok(drawable)
    }

    /// Take ownership of an existing tree. Nodes already flagged as selected
    /// form the initial selection.
    pub fn from_tree(tree: Tree, config: DrawableTreeConfig) -> Self {
        let selected = tree
            .iter()
            .map(|n| n.id())
            .filter(|id| tree[*id].is_selected())
            .collect();

        let mut drawable = Self {
            tree,
            config,
            selected,
            listeners: Listeners::default(),
            layout_valid: false,
            height: Cell::new(None),
            warnings: Vec::new(),
        };
        drawable.assign_annotations();
        drawable.init_error_bars();
        drawable
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Deep copy of the underlying tree
    pub fn clone_tree(&self) -> Tree {
        self.tree.clone()
    }

    pub fn config(&self) -> &DrawableTreeConfig {
        &self.config
    }

    /// Warnings reported while parsing the Newick text this tree was built from
    pub fn parse_warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Replace the whole tree, dropping the current selection
    pub fn set_root(&mut self, tree: Tree) {
        self.tree = tree;
        for id in self.tree.all_nodes() {
            self.tree[id].selected = false;
        }
        self.selected.clear();
        self.structure_changed();
        self.listeners.fire(ChangeType::NodesRemoved);
    }

    /// Register a listener, called after every change with its [`ChangeType`]
    pub fn subscribe(&mut self, listener: impl TreeListener + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn fire(&mut self, change: ChangeType) {
        self.listeners.fire(change);
    }
}

// ============================================================================
// Derived node state
// ============================================================================
impl DrawableTree {
    /// Greatest root-to-tip distance, cached until the next structural change
    pub fn height(&self) -> f64 {
        match self.height.get() {
            Some(height) => height,
            None => {
                let height = self.tree.max_height();
                self.height.set(Some(height));
                height
            }
        }
    }

    /// Tips show their label, or the tip annotation when unlabelled.
    /// Internal nodes show nothing.
    fn assign_annotations(&mut self) {
        let key = &self.config.tip_annotation_key;
        for id in self.tree.all_nodes() {
            let node = &mut self.tree[id];
            let label = if !node.is_tip() {
                String::new()
            } else if let Some(label) = node.label.as_deref().filter(|l| !l.is_empty()) {
                label.to_string()
            } else {
                node.annotation(key).unwrap_or_default().to_string()
            };
            node.current_label = label;
        }
    }

    /// Error bar lengths relative to tree height
    fn init_error_bars(&mut self) {
        let height = self.height();
        let key = &self.config.error_annotation_key;
        for id in self.tree.all_nodes() {
            let node = &mut self.tree[id];
            let bar = match node.annotation(key) {
                None => None,
                Some(raw) => match raw.parse::<f64>() {
                    Ok(value) if height > 0.0 => Some(value / height),
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%id, value = raw, "Ignoring unparseable error annotation");
                        None
                    }
                },
            };
            node.error_bar = bar;
        }
    }

    /// Invalidate cached state after the node graph was rewritten
    fn structure_changed(&mut self) {
        self.layout_valid = false;
        self.height.set(None);
        let tree = &self.tree;
        self.selected.retain(|id| tree.contains(*id));
        self.assign_annotations();
        self.init_error_bars();
    }

    /// All annotation keys present on any node, in first-seen pre-order
    pub fn collect_annotation_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for node in self.tree.iter() {
            for key in self.tree[node.id()].annotation_keys() {
                if seen.insert(key) {
                    keys.push(key.to_string());
                }
            }
        }
        keys
    }
}

// ============================================================================
// Layout
// ============================================================================
impl DrawableTree {
    pub fn orientation(&self) -> Orientation {
        self.config.options.orientation
    }

    /// Change orientation and recompute positions
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.config.options.orientation = orientation;
        self.calculate_node_positions();
        self.fire(ChangeType::Orientation);
    }

    /// Swap left and right orientations. Vertical orientations are unchanged.
    pub fn flip_horizontally(&mut self) {
        self.set_orientation(self.orientation().flipped_horizontally());
    }

    pub fn ignore_branch_lengths(&self) -> bool {
        self.config.options.ignore_branch_lengths
    }

    pub fn set_ignore_branch_lengths(&mut self, ignore: bool) {
        if self.config.options.ignore_branch_lengths != ignore {
            self.layout_valid = false;
        }
        self.config.options.ignore_branch_lengths = ignore;
        self.fire(ChangeType::NodesMoved);
    }

    pub fn layout_options(&self) -> &LayoutOptions {
        &self.config.options
    }

    /// Run the configured layout over the whole tree
    pub fn calculate_node_positions(&mut self) {
        self.config
            .layout
            .layout(&mut self.tree, &self.config.options);
        self.layout_valid = !self.tree.is_empty();
    }

    /// Recompute positions if a structural change invalidated them
    pub fn ensure_layout(&mut self) {
        if !self.layout_valid {
            self.calculate_node_positions();
        }
    }

    pub fn has_calculated_node_positions(&self) -> bool {
        self.layout_valid
    }

    fn check_layout(&self, id: NodeId) -> Result<Point, LayoutError> {
        let node = self.tree.require(id)?;
        if !self.layout_valid {
            return Err(LayoutError::Stale);
        }
        Ok(node.position())
    }

    /// Position of a node from the last layout pass
    pub fn position(&self, id: NodeId) -> Result<Point, LayoutError> {
        self.check_layout(id)
    }

    /// Positions of all nodes in pre-order, laying the tree out first if needed
    pub fn positions(&mut self) -> Vec<(NodeId, Point)> {
        self.ensure_layout();
        self.tree
            .iter()
            .map(|n| (n.id(), self.tree[n.id()].position()))
            .collect()
    }

    /// Euclidean distance between two laid out nodes
    pub fn node_distance(&self, a: NodeId, b: NodeId) -> Result<f64, LayoutError> {
        Ok(self.check_layout(a)?.distance(self.check_layout(b)?))
    }

    /// Visible node closest to `point`. Descendants of collapsed nodes are skipped.
    pub fn nearest_node(&self, point: Point) -> Result<Option<NodeId>, LayoutError> {
        let Some(root) = self.tree.root() else {
            return Err(LayoutError::EmptyTree);
        };
        if !self.layout_valid {
            return Err(LayoutError::Stale);
        }

        let mut nearest: Option<(NodeId, f64)> = None;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.tree[id];
            let dist = node.position().distance(point);
            if nearest.map_or(true, |(_, best)| dist < best) {
                nearest = Some((id, dist));
            }
            if !node.is_collapsed() {
                stack.extend(node.offspring().iter().rev());
            }
        }
        Ok(nearest.map(|(id, _)| id))
    }

    /// Smallest rectangle containing the positions of every node in the clade below `id`
    pub fn bounds(&self, id: NodeId) -> Result<Rect, LayoutError> {
        let start = self.check_layout(id)?;
        Ok(self
            .tree
            .iter_from(id)
            .map(|n| self.tree[n.id()].position())
            .fold(Rect::from_points(start, start), |rect, p| rect.union_pt(p)))
    }

    /// Shift the clade below `id` by `dx` along x
    pub fn nudge_x(&mut self, id: NodeId, dx: f64) -> Result<(), LayoutError> {
        self.nudge(id, kurbo::Vec2::new(dx, 0.0))
    }

    /// Shift the clade below `id` by `dy` along y
    pub fn nudge_y(&mut self, id: NodeId, dy: f64) -> Result<(), LayoutError> {
        self.nudge(id, kurbo::Vec2::new(0.0, dy))
    }

    fn nudge(&mut self, id: NodeId, offset: kurbo::Vec2) -> Result<(), LayoutError> {
        self.check_layout(id)?;
        for node in post_order(&self.tree, id) {
            let moved = self.tree[node].position() + offset;
            self.tree[node].set_position(moved);
        }
        Ok(())
    }
}

// ============================================================================
// Structural mutation
// ============================================================================
impl DrawableTree {
    /// Remove a node, attaching its offspring to its parent
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.tree.require(id)?;
        self.set_selected(id, false);
        self.tree.remove_node(id)?;
        self.structure_changed();
        self.fire(ChangeType::NodesRemoved);
        Ok(())
    }

    /// Remove the clade below `id`
    pub fn remove_clade(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.tree.require(id)?;
        self.unselect_clade(id);
        self.tree.remove_clade(id)?;
        self.structure_changed();
        self.fire(ChangeType::NodesRemoved);
        Ok(())
    }

    /// Fold zero-length internal branches into polytomies, see
    /// [`Tree::collapse_zero_branch_lengths`]. Returns the number of nodes moved.
    pub fn collapse_zero_branch_lengths(&mut self) -> usize {
        let moved = self.tree.collapse_zero_branch_lengths();
        if moved > 0 {
            self.structure_changed();
            self.fire(ChangeType::NodesMoved);
        }
        moved
    }

    /// Reroot at `id`. Returns false, without notifying, if it already is the root.
    pub fn reroot(&mut self, id: NodeId) -> Result<bool, TreeError> {
        let rerooted = self.tree.reroot(id)?;
        if rerooted {
            self.structure_changed();
            self.fire(ChangeType::NodesMoved);
        }
        Ok(rerooted)
    }

    /// Move the first offspring of `id` last and recompute the layout
    pub fn rotate_node(&mut self, id: NodeId) -> Result<bool, TreeError> {
        let rotated = self.tree.rotate_offspring(id)?;
        if rotated {
            self.calculate_node_positions();
            self.fire(ChangeType::NodesMoved);
        }
        Ok(rotated)
    }

    /// Order every two-offspring node so the clade with more tips comes first
    pub fn rotate_big_clades_up(&mut self) -> usize {
        self.rotate_big_clades(true)
    }

    /// Order every two-offspring node so the clade with more tips comes last
    pub fn rotate_big_clades_down(&mut self) -> usize {
        self.rotate_big_clades(false)
    }

    fn rotate_big_clades(&mut self, bigger_first: bool) -> usize {
        let _span = debug_span!("rotate_big_clades", bigger_first).entered();

        let mut rotated = 0;
        for id in self.tree.all_nodes() {
            let node = &self.tree[id];
            let [first, second] = node.offspring() else {
                continue;
            };
            let (first, second) = (self.tree.num_tips(*first), self.tree.num_tips(*second));
            let rotate = if bigger_first {
                first < second
            } else {
                first > second
            };
            if rotate {
                self.tree[id].offspring.rotate_left(1);
                rotated += 1;
            }
        }

        debug!("{} {rotated} nodes", "Rotated".bright_purple());
        if rotated > 0 {
            self.calculate_node_positions();
            self.fire(ChangeType::NodesMoved);
        }
        rotated
    }

    /// Insert a node halfway along the branch above `id`
    pub fn add_node_before_parent(&mut self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        let added = self.tree.add_node_before_parent(id)?;
        if added.is_some() {
            self.structure_changed();
            self.fire(ChangeType::NodesAdded);
        }
        Ok(added)
    }

    /// Rebuild from the Newick text the tree was parsed from, discarding all
    /// edits and the selection. Returns false when there is no such text.
    pub fn restore_from_original_newick(&mut self) -> Result<bool, ParseError> {
        if !self.tree.restore_from_original_newick()? {
            return Ok(false);
        }
        if self.config.collapse_zero_lengths {
            self.tree.collapse_zero_branch_lengths();
        }
        self.selected.clear();
        self.structure_changed();
        self.fire(ChangeType::NodesAdded);
        Ok(true)
    }
}
