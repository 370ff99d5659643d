use serde::{Deserialize, Serialize};

use crate::{
    layout::{Layout, Orientation},
    selection::SelectionMode,
};

/// Settings read by a [`LayoutStrategy`](crate::LayoutStrategy) pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub orientation: Orientation,
    /// Place nodes by topology even when every branch has a length
    pub ignore_branch_lengths: bool,
}

/// Configuration for a [`DrawableTree`](crate::DrawableTree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawableTreeConfig {
    /// Layout algorithm.
    pub layout: Layout,
    pub options: LayoutOptions,
    /// How [`select_region`](crate::DrawableTree::select_region) treats nodes inside the region.
    pub selection_mode: SelectionMode,
    /// Fold zero-length internal branches into polytomies when loading Newick text.
    pub collapse_zero_lengths: bool,
    /// Annotation used as display label of tips without a label.
    pub tip_annotation_key: String,
    /// Annotation holding the error bar length, in branch length units.
    pub error_annotation_key: String,
}

impl Default for DrawableTreeConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            options: LayoutOptions::default(),
            selection_mode: SelectionMode::default(),
            collapse_zero_lengths: true,
            tip_annotation_key: "tip".to_string(),
            error_annotation_key: "error".to_string(),
        }
    }
}
