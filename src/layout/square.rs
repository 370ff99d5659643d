use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::LayoutStrategy;
use crate::{config::LayoutOptions, iterator::post_order, NodeDepth, NodeId, Tree};

/// Rectangular layout: tips are spread evenly along the cross axis, each
/// internal node sits midway between its offspring, and depth follows branch
/// lengths when every branch has one.
///
/// Depth is measured along x for [`Right`](super::Orientation::Right) and
/// [`Left`](super::Orientation::Left), along y for the vertical orientations.
/// Without branch lengths a node's depth is its edge depth divided by the edge
/// depth of its deepest descendant tip, so tips always land at the far edge.
/// Collapsed nodes are laid out as tips and their hidden descendants share
/// the collapsed node's position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareLayout {}

impl LayoutStrategy for SquareLayout {
    fn layout(&self, tree: &mut Tree, options: &LayoutOptions) {
        let Some(root) = tree.root() else {
            debug!("Empty tree, nothing to lay out");
            return;
        };
        let _span = debug_span!("square_layout", orientation = ?options.orientation).entered();

        let slots = tree.slot_count();
        let order = post_order(tree, root);
        let tips = visible_tip_counts(tree, &order, slots);
        let total_tips = tips[root.index()].max(1) as f64;

        let height = tree.max_height();
        let by_length = !options.ignore_branch_lengths && tree.has_branch_lengths() && height > 0.0;
        let (node_depth, deepest) = depth_tables(tree, &order, slots);

        let mut depth = vec![0.0; slots];
        let mut cross = vec![0.0; slots];
        cross[root.index()] = 0.5;

        // Parents are pushed to `visible` before any of their offspring
        let mut visible = Vec::with_capacity(order.len());
        let mut stack = vec![(root, 0.0)];
        while let Some((id, start)) = stack.pop() {
            visible.push(id);
            let node = &tree[id];
            if node.is_collapsed() {
                continue;
            }

            let mut offset = start;
            for child in node.offspring() {
                let i = child.index();
                let frac = tips[i] as f64 / total_tips;
                cross[i] = offset + frac / 2.0;
                depth[i] = if by_length {
                    depth[id.index()] + tree[*child].dist_to_parent().unwrap_or(0.0) / height
                } else {
                    depth_ratio(node_depth[i], deepest[i])
                };
                stack.push((*child, offset));
                offset += frac;
            }
        }

        for id in visible.iter().rev() {
            let node = &tree[*id];
            if node.is_tip() || node.is_collapsed() {
                continue;
            }
            let sum: f64 = node.offspring().iter().map(|c| cross[c.index()]).sum();
            cross[id.index()] = sum / node.num_offspring() as f64;
        }

        if tree[root].num_offspring() < 2 {
            debug!("Root has fewer than two offspring, skipping rescale");
        } else {
            rescale(&visible, &mut depth);
            rescale(&visible, &mut cross);
        }

        for id in &visible {
            let point = options
                .orientation
                .place(depth[id.index()], cross[id.index()]);
            tree[*id].set_position(point);
            if tree[*id].is_collapsed() {
                for hidden in post_order(tree, *id) {
                    tree[hidden].set_position(point);
                }
            }
        }

        debug!(
            by_length,
            "{} {} visible nodes",
            "Laid out".bright_blue(),
            visible.len()
        );
    }
}

/// Tips below each node, counting a collapsed node as a single tip
fn visible_tip_counts(tree: &Tree, post_order: &[NodeId], slots: usize) -> Vec<usize> {
    let mut tips = vec![0; slots];
    for id in post_order {
        let node = &tree[*id];
        tips[id.index()] = if node.is_tip() || node.is_collapsed() {
            1
        } else {
            node.offspring().iter().map(|c| tips[c.index()]).sum()
        };
    }
    tips
}

/// Edge depth of every node, and the edge depth of the deepest visible tip below it
fn depth_tables(
    tree: &Tree,
    post_order: &[NodeId],
    slots: usize,
) -> (Vec<NodeDepth>, Vec<NodeDepth>) {
    let mut node_depth = vec![0; slots];
    for node in tree.iter() {
        node_depth[node.id().index()] = node.depth();
    }

    let mut deepest = vec![0; slots];
    for id in post_order {
        let node = &tree[*id];
        deepest[id.index()] = if node.is_tip() || node.is_collapsed() {
            node_depth[id.index()]
        } else {
            node.offspring()
                .iter()
                .map(|c| deepest[c.index()])
                .max()
                .unwrap_or(0)
        };
    }
    (node_depth, deepest)
}

/// 0/0 counts as 1.0
fn depth_ratio(depth: NodeDepth, deepest: NodeDepth) -> f64 {
    if deepest == 0 {
        1.0
    } else {
        depth as f64 / deepest as f64
    }
}

/// Translate `values` of the given nodes so the minimum is 0, then scale so the
/// maximum is 1. A constant axis is only translated.
fn rescale(ids: &[NodeId], values: &mut [f64]) {
    let (min, max) = ids
        .iter()
        .map(|id| values[id.index()])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    for id in ids {
        let value = &mut values[id.index()];
        *value -= min;
        if range > 0.0 {
            *value /= range;
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        test::{find, four_tip_tree, scenario_tree},
        Orientation,
    };

    const EPSILON: f64 = 1e-9;

    fn options(orientation: Orientation) -> LayoutOptions {
        LayoutOptions {
            orientation,
            ignore_branch_lengths: false,
        }
    }

    fn assert_close(actual: Point, expected: Point) {
        assert!(
            (actual - expected).hypot() < EPSILON,
            "{actual:?} != {expected:?}"
        );
    }

    #[traced_test]
    #[test]
    fn topology_only_tips_reach_the_far_edge() {
        let mut tree = four_tip_tree();
        SquareLayout::default().layout(&mut tree, &options(Orientation::Right));

        let root = tree.root().unwrap();
        assert_close(tree[root].position(), Point::new(0.0, 0.5));
        for tip in tree.all_tips() {
            assert!((tree[tip].position().x - 1.0).abs() < EPSILON);
        }

        let ys: Vec<f64> = tree
            .all_tips()
            .iter()
            .map(|t| tree[*t].position().y)
            .collect();
        for (y, expected) in ys.iter().zip([0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]) {
            assert!((y - expected).abs() < EPSILON);
        }

        let ab = tree[find(&tree, "A").unwrap()].parent().unwrap();
        assert_close(tree[ab].position(), Point::new(0.5, 1.0 / 6.0));
    }

    #[test]
    fn branch_lengths_set_depth() {
        let mut tree = scenario_tree();
        SquareLayout::default().layout(&mut tree, &options(Orientation::Right));

        let x = |label: &str| tree[find(&tree, label).unwrap()].position().x;
        assert!((x("A") - 1.0 / 9.0).abs() < EPSILON);
        assert!((x("B") - 2.0 / 9.0).abs() < EPSILON);
        assert!((x("C") - 8.0 / 9.0).abs() < EPSILON);
        assert!((x("D") - 1.0).abs() < EPSILON);

        let internal = tree[find(&tree, "C").unwrap()].parent().unwrap();
        assert!((tree[internal].position().x - 5.0 / 9.0).abs() < EPSILON);
    }

    #[test]
    fn ignoring_branch_lengths_uses_topology() {
        let mut tree = scenario_tree();
        let opts = LayoutOptions {
            ignore_branch_lengths: true,
            ..Default::default()
        };
        SquareLayout::default().layout(&mut tree, &opts);
        let a = find(&tree, "A").unwrap();
        assert!((tree[a].position().x - 1.0).abs() < EPSILON);
    }

    #[test]
    fn topology_depth_is_normalised_per_clade() {
        let mut tree = Tree::from_newick("(A,(B,(C,D)));").unwrap();
        SquareLayout::default().layout(&mut tree, &options(Orientation::Right));

        let a = find(&tree, "A").unwrap();
        let b = find(&tree, "B").unwrap();
        let bcd = tree[b].parent().unwrap();
        assert!((tree[a].position().x - 1.0).abs() < EPSILON);
        assert!((tree[bcd].position().x - 1.0 / 3.0).abs() < EPSILON);
    }

    #[test]
    fn every_orientation_stays_in_unit_square() {
        for orientation in [
            Orientation::Right,
            Orientation::Left,
            Orientation::Up,
            Orientation::Down,
        ] {
            for text in [
                "(A:1,B:2,(C:3,D:4):5);",
                "((A:1,B:1):1);",
                "(A,(B,(C,(D,E))),F);",
                "A;",
            ] {
                let mut tree = Tree::from_newick(text).unwrap();
                SquareLayout::default().layout(&mut tree, &options(orientation));
                for node in tree.iter() {
                    let p = tree[node.id()].position();
                    assert!(
                        (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y),
                        "{text} {orientation:?} {p:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn orientation_places_root() {
        let cases = [
            (Orientation::Right, Point::new(0.0, 0.5)),
            (Orientation::Left, Point::new(1.0, 0.5)),
            (Orientation::Up, Point::new(0.5, 1.0)),
            (Orientation::Down, Point::new(0.5, 0.0)),
        ];
        for (orientation, expected) in cases {
            let mut tree = four_tip_tree();
            SquareLayout::default().layout(&mut tree, &options(orientation));
            let root = tree.root().unwrap();
            assert_close(tree[root].position(), expected);
        }
    }

    #[test]
    fn collapsed_clade_is_laid_out_as_one_tip() {
        let mut tree = scenario_tree();
        let c = find(&tree, "C").unwrap();
        let d = find(&tree, "D").unwrap();
        let internal = tree[c].parent().unwrap();
        tree[internal].collapsed = true;

        SquareLayout::default().layout(&mut tree, &options(Orientation::Right));

        let clade = tree[internal].position();
        assert_eq!(tree[c].position(), clade);
        assert_eq!(tree[d].position(), clade);
        // Three visible tips spread over the full cross axis
        assert!((clade.y - 1.0).abs() < EPSILON);
        assert!((tree[find(&tree, "A").unwrap()].position().y).abs() < EPSILON);
    }
}
