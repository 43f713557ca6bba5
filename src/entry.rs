use crate::{
    geom::Rect,
    node::{NodeId, Nodes},
};

/// A record stored in a tree node.
///
/// Leaf nodes hold [`Entry::Leaf`] records carrying a user object; internal
/// nodes hold [`Entry::Inner`] records referencing a child node. An internal
/// entry's bounding box and Hilbert key are those cached on its child.
#[derive(Debug, Clone)]
pub(crate) enum Entry<O> {
    Leaf {
        /// The object's bounding box, captured at insertion time.
        bb: Rect,
        obj: O,
        /// The Hilbert value of the object's centre.
        h: u64,
    },
    Inner {
        child: NodeId,
    },
}

impl<O> Entry<O> {
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Entry::Leaf { .. })
    }

    /// The child node referenced by an internal entry.
    pub(crate) fn child(&self) -> Option<NodeId> {
        match self {
            Entry::Leaf { .. } => None,
            Entry::Inner { child } => Some(*child),
        }
    }

    /// The bounding box this entry contributes to its node.
    ///
    /// # Panics
    ///
    /// Panics if an internal entry references an empty child node.
    pub(crate) fn mbr(&self, nodes: &Nodes<O>) -> Rect {
        match self {
            Entry::Leaf { bb, .. } => *bb,
            Entry::Inner { child } => nodes[*child]
                .mbr()
                .expect("internal entry references an empty node"),
        }
    }

    /// The Hilbert key this entry sorts by: the stored value for leaf
    /// entries, the child's cached largest Hilbert value otherwise.
    pub(crate) fn lhv(&self, nodes: &Nodes<O>) -> u64 {
        match self {
            Entry::Leaf { h, .. } => *h,
            Entry::Inner { child } => nodes[*child].lhv(),
        }
    }
}

/// A sequence of entries kept sorted by Hilbert key, ascending.
///
/// The list itself enforces no capacity; the owning node checks overflow
/// before inserting.
#[derive(Debug, Clone)]
pub(crate) struct EntryList<O>(Vec<Entry<O>>);

impl<O> Default for EntryList<O> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<O> EntryList<O> {
    /// The index at which an entry with Hilbert key `key` belongs: the first
    /// slot holding a strictly greater key, so ties break to the right.
    pub(crate) fn position_for(&self, key: u64, nodes: &Nodes<O>) -> usize {
        self.0.partition_point(|e| e.lhv(nodes) <= key)
    }

    /// Insert `e` at its sorted position, returning the index it landed at.
    pub(crate) fn insert(&mut self, e: Entry<O>, nodes: &Nodes<O>) -> usize {
        let i = self.position_for(e.lhv(nodes), nodes);
        self.0.insert(i, e);
        i
    }

    /// Insert `e` at `i`, which the caller has already located with
    /// [`position_for`](Self::position_for).
    pub(crate) fn insert_at(&mut self, i: usize, e: Entry<O>) {
        self.0.insert(i, e);
    }

    pub(crate) fn remove(&mut self, i: usize) -> Entry<O> {
        self.0.remove(i)
    }

    pub(crate) fn get(&self, i: usize) -> &Entry<O> {
        &self.0[i]
    }

    pub(crate) fn first(&self) -> Option<&Entry<O>> {
        self.0.first()
    }

    pub(crate) fn last(&self) -> Option<&Entry<O>> {
        self.0.last()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry<O>> {
        self.0.iter()
    }

    pub(crate) fn into_inner(self) -> Vec<Entry<O>> {
        self.0
    }
}
