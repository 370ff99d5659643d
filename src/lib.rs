//! # phylotree
//!
//! Phylogenetic trees for interactive drawing.
//!
//! ## Overview
//!
//! A [`Tree`] is a rooted, multifurcating tree stored as an arena of [`Node`]s
//! addressed by [`NodeId`]. Trees are read from and written to Newick text,
//! including `[&key=value]` annotation blocks, through the [`newick`] module.
//!
//! [`DrawableTree`] wraps a tree with the state a renderer needs: node positions
//! computed by a [`LayoutStrategy`] (currently the rectangular [`SquareLayout`]),
//! display labels and error bars derived from annotations, region selection, and
//! listeners notified with a [`ChangeType`] after every change.
//!
//! ```
//! use phylotree::{DrawableTree, DrawableTreeConfig, Orientation};
//!
//! let mut tree = DrawableTree::from_newick("((A:1,B:1):2,C:3);", DrawableTreeConfig::default())?;
//! tree.set_orientation(Orientation::Up);
//! assert_eq!(tree.positions().len(), 5);
//! # Ok::<(), phylotree::ParseError>(())
//! ```

mod builder;
mod compare;
mod config;
mod display;
mod drawable;
mod error;
mod event;
mod hash;
mod id;
mod iterator;
mod layout;
mod node;
mod selection;
mod tree;

pub mod newick;


pub use builder::{NodeBuilder, TreeBuilder};
pub use config::{DrawableTreeConfig, LayoutOptions};
pub use drawable::DrawableTree;
pub use error::{LayoutError, ParseError, ParseErrorKind, ParseWarning, TreeError};
pub use event::{ChangeType, TreeListener};
pub use hash::{clade_hash, CladeIndex};
pub use id::{ListenerId, NodeId};
pub use iterator::{IterNode, PreOrderIter};
pub use layout::{Layout, LayoutStrategy, Orientation, SquareLayout};
pub use newick::{NewickStyle, Parsed};
pub use node::Node;
pub use selection::SelectionMode;
pub use tree::Tree;

/// Number of edges between a node and the root
pub type NodeDepth = usize;

/// Length of the branch joining a node to its parent
pub type BranchLength = f64;
