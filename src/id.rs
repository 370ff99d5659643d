use std::sync::atomic::AtomicU64;

/// Handle to a node slot in a [`Tree`](crate::Tree) arena.
///
/// Ids are never reused within a tree: once a node is removed its slot stays
/// empty, so a stale id resolves to `None` rather than to an unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slot index of this node within its tree
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a subscribed [`TreeListener`](crate::TreeListener)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn generate<G>(gen: &mut G) -> Self
    where
        G: UniqueGenerator<Output = u64>,
    {
        ListenerId(gen.generate())
    }
}

pub(crate) trait UniqueGenerator: std::fmt::Debug {
    type Output: std::fmt::Debug;
    /// Generate a unique value
    fn generate(&mut self) -> Self::Output;
}

#[derive(Default, Debug)]
pub(crate) struct AtomicU64Generator {
    next_id: AtomicU64,
}

impl UniqueGenerator for AtomicU64Generator {
    type Output = u64;

    fn generate(&mut self) -> u64 {
        self.next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_ids_are_unique() {
        let mut gen = AtomicU64Generator::default();
        let a = ListenerId::generate(&mut gen);
        let b = ListenerId::generate(&mut gen);
        assert_ne!(a, b);
    }
}
