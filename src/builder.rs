//! Builders for constructing trees in code.
//!
//! `TreeBuilder` and `NodeBuilder` build a [`Tree`] top-down through nested
//! closures. Each closure returns `Result<(), E>` so errors raised while
//! building propagate out of the builder unchanged.

use std::marker::PhantomData;

use tracing::{debug, debug_span, trace};

use crate::{node::Node, BranchLength, NodeDepth, NodeId, Tree};

/// Adds offspring to one node of the tree under construction.
pub struct NodeBuilder<'a, E> {
    tree: &'a mut Tree,
    node: NodeId,
    depth: NodeDepth,
    _phantom: PhantomData<E>,
}

impl<'a, E> NodeBuilder<'a, E> {
    fn new(tree: &'a mut Tree, node: NodeId, depth: NodeDepth) -> Self {
        Self {
            tree,
            node,
            depth,
            _phantom: PhantomData,
        }
    }

    /// Adds an internal node below the current one.
    ///
    /// # Arguments
    ///
    /// * `label`: Optional label of the new node.
    /// * `dist`: Branch length to the current node.
    /// * `f`: A closure that takes the child builder and adds its own offspring.
    pub fn child<F>(
        &mut self,
        label: Option<&str>,
        dist: Option<BranchLength>,
        f: F,
    ) -> Result<NodeId, E>
    where
        F: FnOnce(&mut NodeBuilder<'_, E>) -> Result<(), E>,
    {
        let id = self.push(label, dist);
        let mut builder = NodeBuilder::new(&mut *self.tree, id, self.depth + 1);
        f(&mut builder)?;
        Ok(id)
    }

    /// Adds a labelled tip below the current node
    pub fn tip(&mut self, label: &str, dist: Option<BranchLength>) -> NodeId {
        self.push(Some(label), dist)
    }

    /// Annotates the current node
    pub fn annotate(&mut self, key: &str, value: &str) -> &mut Self {
        self.tree[self.node].add_annotation(key, value);
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn depth(&self) -> NodeDepth {
        self.depth
    }

    fn push(&mut self, label: Option<&str>, dist: Option<BranchLength>) -> NodeId {
        let id = self
            .tree
            .alloc(Node::new(label.map(str::to_string), dist));
        self.tree.attach(self.node, id);
        trace!(%id, parent = %self.node, depth = self.depth + 1, "Added node");
        id
    }
}

/// A builder for constructing trees.
///
/// # Examples
///
/// ```
/// use phylotree::TreeBuilder;
///
/// let tree = TreeBuilder::<()>::new()
///     .root(|root| {
///         root.tip("A", Some(1.0));
///         root.child(None, Some(2.0), |clade| {
///             clade.tip("B", Some(0.5));
///             clade.tip("C", Some(0.5));
///             Ok(())
///         })?;
///         Ok(())
///     })
///     .unwrap()
///     .done();
///
/// assert_eq!(tree.to_newick(), "(A:1,(B:0.5,C:0.5):2);");
/// ```
#[derive(Debug)]
pub struct TreeBuilder<E> {
    tree: Tree,
    debug_span: tracing::Span,
    _phantom: PhantomData<E>,
}

impl<E> Default for TreeBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TreeBuilder<E> {
    pub fn new() -> Self {
        let debug_span = debug_span!("TreeBuilder");
        debug_span.in_scope(|| debug!("Created new TreeBuilder"));

        Self {
            tree: Tree::new(),
            debug_span,
            _phantom: PhantomData,
        }
    }

    /// Adds an unlabelled root and calls `f` to add its offspring.
    /// Calling this again replaces the previously built tree.
    pub fn root<F>(mut self, f: F) -> Result<Self, E>
    where
        F: FnOnce(&mut NodeBuilder<'_, E>) -> Result<(), E>,
    {
        self.debug_span.in_scope(|| {
            if !self.tree.is_empty() {
                debug!("Replacing existing root");
                self.tree = Tree::new();
            }
            let root = self.tree.alloc(Node::default());
            self.tree.set_root_id(root);

            let mut builder = NodeBuilder::new(&mut self.tree, root, 0);
            f(&mut builder)?;
            debug!("Added root");
            Ok(())
        })?;
        Ok(self)
    }

    /// Returns the constructed tree
    pub fn done(self) -> Tree {
        self.debug_span.in_scope(|| {
            debug!(nodes = self.tree.total_nodes(), "Finished building tree");
        });
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum MyError {
        Fail(String),
    }

    #[traced_test]
    #[test]
    fn builds_nested_tree() {
        let tree = TreeBuilder::<MyError>::new()
            .root(|root| {
                root.tip("A", Some(1.0));
                root.child(Some("inner"), None, |inner| {
                    assert_eq!(inner.depth(), 1);
                    inner.annotate("tip", "x");
                    inner.tip("B", None);
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap()
            .done();

        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.total_nodes(), 4);
        assert_eq!(tree.to_newick(), "(A:1,(B)inner);");
        assert!(logs_contain("Finished building tree"));
    }

    #[test]
    fn closure_errors_propagate() {
        let result = TreeBuilder::<MyError>::new().root(|root| {
            root.child(None, Some(1.0), |_| Err(MyError::Fail("bad clade".into())))?;
            Ok(())
        });
        assert_eq!(result.unwrap_err(), MyError::Fail("bad clade".into()));
    }
}
