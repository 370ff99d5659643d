use std::fmt::{self, Write};

use crate::{Node, Tree};

/// Label and branch length of a node, followed by `*` when selected and `+`
/// when collapsed
fn write_node(node: &Node, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut text = node.label().to_string();
    if let Some(dist) = node.dist_to_parent() {
        write!(text, ":{dist}")?;
    }
    if !text.is_empty() {
        write!(f, " {text}")?;
    }
    if node.is_selected() {
        f.write_str(" *")?;
    }
    if node.is_collapsed() {
        f.write_str(" +")?;
    }
    f.write_char('\n')
}

/// One line per node, drawn with box characters below the root
///
/// ```text
/// ┏
/// ┣ A:1
/// ┗ :4
///   ┣ B:2
///   ┗ C:3
/// ```
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.root() else {
            return f.write_str("(empty)\n");
        };

        let root_node = &self[root];
        f.write_char(if root_node.is_tip() { '━' } else { '┏' })?;
        write_node(root_node, f)?;

        let mut stack: Vec<_> = root_node
            .offspring()
            .iter()
            .enumerate()
            .rev()
            .map(|(i, id)| (*id, String::new(), i + 1 == root_node.num_offspring()))
            .collect();

        while let Some((id, prefix, last)) = stack.pop() {
            let node = &self[id];
            f.write_str(&prefix)?;
            f.write_char(if last { '┗' } else { '┣' })?;
            write_node(node, f)?;

            let column = if last { "  " } else { "┃ " };
            let count = node.num_offspring();
            for (i, child) in node.offspring().iter().enumerate().rev() {
                stack.push((*child, format!("{prefix}{column}"), i + 1 == count));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test::find;
    use crate::Tree;

    #[test]
    fn draws_nested_clades() {
        let tree = Tree::from_newick("(A:1,(B:2,(C,D)):4,E);").unwrap();
        let expected = "\
┏
┣ A:1
┣ :4
┃ ┣ B:2
┃ ┗
┃   ┣ C
┃   ┗ D
┗ E
";
        assert_eq!(tree.to_string(), expected);
    }

    #[test]
    fn marks_selected_and_collapsed_nodes() {
        let mut tree = Tree::from_newick("(A,B);").unwrap();
        let a = find(&tree, "A").unwrap();
        tree[a].selected = true;
        tree[a].collapsed = true;
        assert_eq!(tree.to_string(), "┏\n┣ A * +\n┗ B\n");
    }

    #[test]
    fn empty_and_single_node_trees() {
        assert_eq!(Tree::new().to_string(), "(empty)\n");
        assert_eq!(Tree::from_newick("A;").unwrap().to_string(), "━ A\n");
    }
}
