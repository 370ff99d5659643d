//! Layout strategies assigning every node a position in the unit square.

mod square;

pub use square::SquareLayout;

use serde::{Deserialize, Serialize};

use crate::{config::LayoutOptions, Tree};

/// Direction in which the tree grows from its root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Root on the left, tips on the right
    #[default]
    Right,
    Left,
    /// Root at the bottom (largest y), tips at the top
    Up,
    Down,
}

impl Orientation {
    /// Mirror image across the vertical axis
    pub fn flipped_horizontally(self) -> Self {
        match self {
            Orientation::Right => Orientation::Left,
            Orientation::Left => Orientation::Right,
            other => other,
        }
    }

    /// Map a (depth, cross) pair, both in [0, 1], to x/y for this orientation
    pub(crate) fn place(self, depth: f64, cross: f64) -> kurbo::Point {
        match self {
            Orientation::Right => kurbo::Point::new(depth, cross),
            Orientation::Left => kurbo::Point::new(1.0 - depth, cross),
            Orientation::Up => kurbo::Point::new(cross, 1.0 - depth),
            Orientation::Down => kurbo::Point::new(cross, depth),
        }
    }
}

pub trait LayoutStrategy {
    /// Assign a position in [0, 1] x [0, 1] to every live node of `tree`
    fn layout(&self, tree: &mut Tree, options: &LayoutOptions);
}

/// Available layout algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    Square(SquareLayout),
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Square(SquareLayout::default())
    }
}

impl LayoutStrategy for Layout {
    fn layout(&self, tree: &mut Tree, options: &LayoutOptions) {
        match self {
            Layout::Square(square) => square.layout(tree, options),
        }
    }
}
