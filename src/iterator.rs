use std::collections::VecDeque;

use crate::{NodeDepth, NodeId, Tree};

/// Node yielded by [`PreOrderIter`], with its edge depth below the start node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterNode {
    depth: NodeDepth,
    id: NodeId,
}

impl IterNode {
    pub fn depth(&self) -> NodeDepth {
        self.depth
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Depth-first pre-order traversal, visiting offspring in list order
pub struct PreOrderIter<'tree> {
    tree: &'tree Tree,
    stack: VecDeque<(NodeDepth, NodeId)>,
}

impl<'tree> PreOrderIter<'tree> {
    pub(crate) fn new(tree: &'tree Tree, start: Option<NodeId>) -> Self {
        let stack = start
            .filter(|id| tree.contains(*id))
            .map(|id| VecDeque::from([(0, id)]))
            .unwrap_or_default();
        Self { tree, stack }
    }
}

impl<'tree> Iterator for PreOrderIter<'tree> {
    type Item = IterNode;

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, id) = self.stack.pop_front()?;

        if let Some(node) = self.tree.node(id) {
            node.offspring()
                .iter()
                .rev()
                .for_each(|child| self.stack.push_front((depth + 1, *child)));
        }

        Some(IterNode { depth, id })
    }
}

/// Ids of the clade below `start` in post-order (offspring before parents)
pub(crate) fn post_order(tree: &Tree, start: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![(start, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        stack.push((id, true));
        if let Some(node) = tree.node(id) {
            for child in node.offspring().iter().rev() {
                stack.push((*child, false));
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use crate::test::scenario_tree;

    use super::post_order;

    #[traced_test]
    #[test]
    fn pre_order_visits_parents_first() {
        let tree = scenario_tree();
        let labels: Vec<(usize, String)> = tree
            .iter()
            .map(|n| (n.depth(), tree[n.id()].label().to_string()))
            .collect();

        assert_eq!(
            labels,
            vec![
                (0, "".to_string()),
                (1, "A".to_string()),
                (1, "B".to_string()),
                (1, "".to_string()),
                (2, "C".to_string()),
                (2, "D".to_string()),
            ]
        );
    }

    #[test]
    fn post_order_visits_offspring_first() {
        let tree = scenario_tree();
        let root = tree.root().unwrap();
        let order = post_order(&tree, root);

        assert_eq!(order.len(), 6);
        assert_eq!(*order.last().unwrap(), root);
        let labels: Vec<&str> = order.iter().map(|id| tree[*id].label()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D", "", ""]);
    }
}
