use crate::{BranchLength, NodeId, Tree};

/// Trees are equal when they have the same labels, branch lengths and
/// offspring order. Annotations, the root branch and drawing state are ignored.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.topology_hash() == other.topology_hash()
    }
}

fn lengths_close(a: Option<BranchLength>, b: Option<BranchLength>, epsilon: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= epsilon,
        _ => false,
    }
}

impl Tree {
    /// Same shape and labels as `other`, with every branch length within
    /// `epsilon` of its counterpart. The root branch is not compared.
    pub fn approx_eq(&self, other: &Tree, epsilon: f64) -> bool {
        let (self_root, other_root) = match (self.root(), other.root()) {
            (None, None) => return true,
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };

        let mut stack: Vec<(NodeId, NodeId)> = vec![(self_root, other_root)];
        while let Some((a, b)) = stack.pop() {
            let (left, right) = (&self[a], &other[b]);
            if left.label() != right.label() || left.num_offspring() != right.num_offspring() {
                return false;
            }
            if a != self_root
                && !lengths_close(left.dist_to_parent(), right.dist_to_parent(), epsilon)
            {
                return false;
            }
            stack.extend(
                left.offspring()
                    .iter()
                    .copied()
                    .zip(right.offspring().iter().copied()),
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::Tree;

    #[test]
    fn equality_follows_topology() {
        let a = Tree::from_newick("(A:1,(B:2,C:3):4);").unwrap();
        let b = Tree::from_newick("(A:1[&x=1],(B:2,C:3):4):7;").unwrap();
        let c = Tree::from_newick("((B:2,C:3):4,A:1);").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Tree::new(), Tree::new());
    }

    #[test]
    fn approx_eq_tolerates_rounding() {
        let a = Tree::from_newick("(A:0.1,(B:0.2,C:0.3):0.4);").unwrap();
        let b = Tree::from_newick("(A:0.1000001,(B:0.2,C:0.3):0.4);").unwrap();
        assert!(a.approx_eq(&b, 1e-6));
        assert!(!a.approx_eq(&b, 1e-9));
        assert_ne!(a, b);

        let missing = Tree::from_newick("(A,(B:0.2,C:0.3):0.4);").unwrap();
        assert!(!a.approx_eq(&missing, 1.0));
        assert!(!a.approx_eq(&Tree::new(), 1.0));
    }
}
