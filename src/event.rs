//! Change notification for [`DrawableTree`](crate::DrawableTree).
//!
//! Listeners are called synchronously, after a mutation has been fully
//! applied, exactly once per mutating call. A listener must not call back into
//! the tree that notified it.

use std::fmt;

use tracing::trace;

use crate::id::{AtomicU64Generator, ListenerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// The layout direction changed
    Orientation,
    NodesAdded,
    NodesRemoved,
    /// Topology or positions changed without adding or removing tips
    NodesMoved,
    /// A node was collapsed or expanded
    Collapsed,
}

pub trait TreeListener {
    fn on_tree_changed(&mut self, change: ChangeType);
}

impl<F> TreeListener for F
where
    F: FnMut(ChangeType),
{
    fn on_tree_changed(&mut self, change: ChangeType) {
        self(change)
    }
}

/// Registered listeners in subscription order
#[derive(Default)]
pub(crate) struct Listeners {
    idgen: AtomicU64Generator,
    listeners: Vec<(ListenerId, Box<dyn TreeListener>)>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: impl TreeListener + 'static) -> ListenerId {
        let id = ListenerId::generate(&mut self.idgen);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if no listener with this id was subscribed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    pub fn fire(&mut self, change: ChangeType) {
        trace!(?change, listeners = self.listeners.len(), "Firing tree change");
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_tree_changed(change);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
