use slotmap::SlotMap;

use crate::{
    entry::{Entry, EntryList},
    geom::Rect,
};

slotmap::new_key_type! {
    /// Stable handle to a node in the tree's arena.
    pub(crate) struct NodeId;
}

/// The arena owning every node of a tree.
///
/// The node graph is cyclic (parent back-references plus the per-level
/// sibling chain), so nodes refer to each other through arena keys rather
/// than ownership.
pub(crate) type Nodes<O> = SlotMap<NodeId, Node<O>>;

/// A tree vertex: an ordered entry list plus cached aggregates and the
/// non-owning references linking it into the node graph.
///
/// `left` and `right` chain same-level nodes in ascending Hilbert order; the
/// neighbours are not necessarily under the same parent.
#[derive(Debug, Clone)]
pub(crate) struct Node<O> {
    leaf: bool,
    entries: EntryList<O>,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    /// Bounding box of all entries; `None` while the node is empty.
    mbr: Option<Rect>,
    /// Largest Hilbert value anywhere in the subtree rooted here.
    lhv: u64,
}

impl<O> Node<O> {
    pub(crate) fn new(leaf: bool) -> Self {
        Self {
            leaf,
            entries: EntryList::default(),
            parent: None,
            left: None,
            right: None,
            mbr: None,
            lhv: 0,
        }
    }

    pub(crate) fn leaf(&self) -> bool {
        self.leaf
    }

    /// Flip the node kind. Only the root collapse does this.
    pub(crate) fn set_leaf(&mut self, leaf: bool) {
        self.leaf = leaf;
    }

    pub(crate) fn entries(&self) -> &EntryList<O> {
        &self.entries
    }

    pub(crate) fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub(crate) fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub(crate) fn set_left(&mut self, left: Option<NodeId>) {
        self.left = left;
    }

    pub(crate) fn set_right(&mut self, right: Option<NodeId>) {
        self.right = right;
    }

    pub(crate) fn mbr(&self) -> Option<Rect> {
        self.mbr
    }

    pub(crate) fn lhv(&self) -> u64 {
        self.lhv
    }

    /// True when the next insertion would exceed capacity.
    pub(crate) fn is_overflow(&self, max: usize) -> bool {
        self.entries.len() == max
    }

    /// True when a removal has left the node under-occupied.
    pub(crate) fn is_underflow(&self, min: usize) -> bool {
        self.entries.len() < min
    }

    /// Empty the node, returning its entries and clearing the cached
    /// aggregates. The graph references are left in place.
    pub(crate) fn reset(&mut self) -> Vec<Entry<O>> {
        self.mbr = None;
        self.lhv = 0;
        std::mem::take(&mut self.entries).into_inner()
    }
}

/// Collect up to `k` cooperating siblings starting at `id` and walking the
/// right-hand chain. Fewer are returned when the chain runs out; the window
/// deliberately never extends leftward.
pub(crate) fn siblings<O>(nodes: &Nodes<O>, id: NodeId, k: usize) -> Vec<NodeId> {
    let mut out = vec![id];
    let mut next = nodes[id].right;
    while out.len() < k {
        match next {
            Some(r) => {
                out.push(r);
                next = nodes[r].right;
            }
            None => break,
        }
    }
    out
}

/// Recompute the cached bounding box of `id` from its entries.
pub(crate) fn adjust_mbr<O>(nodes: &mut Nodes<O>, id: NodeId) {
    let mut bb: Option<Rect> = None;
    for i in 0..nodes[id].entries.len() {
        let r = nodes[id].entries.get(i).mbr(nodes);
        bb = Some(match bb {
            Some(mut acc) => {
                acc.enlarge(&r);
                acc
            }
            None => r,
        });
    }
    nodes[id].mbr = bb;
}

/// Recompute the cached largest Hilbert value of `id` from its entries.
pub(crate) fn adjust_lhv<O>(nodes: &mut Nodes<O>, id: NodeId) {
    let mut lhv = 0;
    for i in 0..nodes[id].entries.len() {
        lhv = lhv.max(nodes[id].entries.get(i).lhv(nodes));
    }
    nodes[id].lhv = lhv;
}

/// Insert a leaf entry into the ordered list of leaf node `id`.
pub(crate) fn insert_leaf_entry<O>(nodes: &mut Nodes<O>, id: NodeId, e: Entry<O>) {
    debug_assert!(nodes[id].leaf, "leaf entry inserted into an internal node");
    debug_assert!(e.is_leaf());

    let i = nodes[id].entries.position_for(e.lhv(nodes), nodes);
    nodes[id].entries.insert_at(i, e);
}

/// Insert an internal entry referencing `child` into internal node `id`,
/// re-parenting the child and splicing it into the per-level sibling chain
/// between the children held by the neighbouring list entries.
///
/// When a list neighbour is absent the corresponding sibling pointer is left
/// untouched: the child keeps whatever cross-parent link the caller set.
pub(crate) fn insert_inner_entry<O>(nodes: &mut Nodes<O>, id: NodeId, child: NodeId) {
    debug_assert!(!nodes[id].leaf, "internal entry inserted into a leaf node");

    let i = nodes[id].entries.position_for(nodes[child].lhv, nodes);
    nodes[id].entries.insert_at(i, Entry::Inner { child });
    nodes[child].parent = Some(id);

    let prev = (i > 0).then(|| nodes[id].entries.get(i - 1).child().unwrap());
    if let Some(prev) = prev {
        debug_assert_eq!(nodes[prev].leaf, nodes[child].leaf);
        nodes[child].left = Some(prev);
        nodes[prev].right = Some(child);
    }

    let next = (i + 1 < nodes[id].entries.len())
        .then(|| nodes[id].entries.get(i + 1).child().unwrap());
    if let Some(next) = next {
        debug_assert_eq!(nodes[next].leaf, nodes[child].leaf);
        nodes[child].right = Some(next);
        nodes[next].left = Some(child);
    }
}

/// Remove the first leaf entry of `id` whose stored rectangle equals `bb`.
///
/// Returns false when no entry matches.
pub(crate) fn remove_leaf_entry<O>(nodes: &mut Nodes<O>, id: NodeId, bb: &Rect) -> bool {
    debug_assert!(nodes[id].leaf, "leaf removal from an internal node");

    let i = nodes[id]
        .entries
        .iter()
        .position(|e| matches!(e, Entry::Leaf { bb: b, .. } if b == bb));

    match i {
        Some(i) => {
            nodes[id].entries.remove(i);
            true
        }
        None => false,
    }
}

/// Remove the internal entry of `id` referencing `child`.
pub(crate) fn remove_child_entry<O>(nodes: &mut Nodes<O>, id: NodeId, child: NodeId) -> bool {
    debug_assert!(!nodes[id].leaf, "child removal from a leaf node");

    let i = nodes[id]
        .entries
        .iter()
        .position(|e| e.child() == Some(child));

    match i {
        Some(i) => {
            nodes[id].entries.remove(i);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::rect;

    fn leaf_entry(bb: Rect, h: u64) -> Entry<Rect> {
        Entry::Leaf { bb, obj: bb, h }
    }

    #[test]
    fn test_overflow_predicate() {
        let mut nodes = Nodes::with_key();
        let n = nodes.insert(Node::new(true));

        assert!(!nodes[n].is_overflow(2));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 2, 2, 4), 7));
        assert!(!nodes[n].is_overflow(2));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 2, 2, 4), 7));
        assert!(nodes[n].is_overflow(2));
    }

    #[test]
    fn test_underflow_predicate() {
        let mut nodes = Nodes::with_key();
        let n = nodes.insert(Node::new(true));

        assert!(nodes[n].is_underflow(1));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 2, 2, 4), 7));
        assert!(!nodes[n].is_underflow(1));
        assert!(nodes[n].is_underflow(2));
    }

    #[test]
    fn test_siblings_walk_right_only() {
        let mut nodes = Nodes::<Rect>::with_key();
        let main = nodes.insert(Node::new(true));
        let left = nodes.insert(Node::new(true));
        let right = nodes.insert(Node::new(true));

        assert_eq!(siblings(&nodes, main, 2), [main]);

        nodes[main].set_right(Some(right));
        nodes[right].set_left(Some(main));
        assert_eq!(siblings(&nodes, main, 2), [main, right]);

        // Left-hand siblings are never harvested.
        nodes[main].set_left(Some(left));
        nodes[left].set_right(Some(main));
        assert_eq!(siblings(&nodes, main, 2), [main, right]);
        assert_eq!(siblings(&nodes, main, 1), [main]);
        assert_eq!(siblings(&nodes, main, 3), [main, right]);
    }

    #[test]
    fn test_adjust_mbr() {
        let mut nodes = Nodes::with_key();
        let n = nodes.insert(Node::new(true));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 0, 2, 4), 1));
        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 1, 2, 5), 2));
        adjust_mbr(&mut nodes, n);
        assert_eq!(nodes[n].mbr(), Some(rect(2, 0, 2, 5)));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(1, 5, 2, 10), 3));
        adjust_mbr(&mut nodes, n);
        assert_eq!(nodes[n].mbr(), Some(rect(1, 0, 2, 10)));
    }

    #[test]
    fn test_adjust_lhv() {
        let mut nodes = Nodes::with_key();
        let n = nodes.insert(Node::new(true));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 0, 2, 0), 3));
        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(2, 0, 2, 2), 11));
        adjust_lhv(&mut nodes, n);
        assert_eq!(nodes[n].lhv(), 11);

        // A removal shrinks the cache on recomputation.
        let removed = remove_leaf_entry(&mut nodes, n, &rect(2, 0, 2, 2));
        assert!(removed);
        adjust_lhv(&mut nodes, n);
        assert_eq!(nodes[n].lhv(), 3);
    }

    #[test]
    fn test_insert_inner_entry_reparents() {
        let mut nodes = Nodes::<Rect>::with_key();
        let parent = nodes.insert(Node::new(false));
        let child = nodes.insert(Node::new(true));

        insert_inner_entry(&mut nodes, parent, child);

        assert_eq!(nodes[parent].entries().len(), 1);
        assert_eq!(nodes[child].parent(), Some(parent));

        // A sole child has no list neighbours, so its chain pointers are
        // left untouched.
        assert_eq!(nodes[child].left(), None);
        assert_eq!(nodes[child].right(), None);
    }

    #[test]
    fn test_insert_inner_entry_splices_chain() {
        let mut nodes = Nodes::<Rect>::with_key();
        let parent = nodes.insert(Node::new(false));

        let mut children = Vec::new();
        for h in [10u64, 30, 20] {
            let c = nodes.insert(Node::new(true));
            insert_leaf_entry(&mut nodes, c, leaf_entry(rect(0, 0, 1, 1), h));
            adjust_lhv(&mut nodes, c);
            adjust_mbr(&mut nodes, c);
            insert_inner_entry(&mut nodes, parent, c);
            children.push(c);
        }
        let (a, c, b) = (children[0], children[1], children[2]);

        // List order is by LHV: a(10), b(20), c(30); the chain follows it.
        assert_eq!(nodes[a].right(), Some(b));
        assert_eq!(nodes[b].left(), Some(a));
        assert_eq!(nodes[b].right(), Some(c));
        assert_eq!(nodes[c].left(), Some(b));
        assert_eq!(nodes[a].left(), None);
        assert_eq!(nodes[c].right(), None);
    }

    #[test]
    fn test_remove_child_entry() {
        let mut nodes = Nodes::<Rect>::with_key();
        let parent = nodes.insert(Node::new(false));
        let child = nodes.insert(Node::new(true));
        let other = nodes.insert(Node::new(true));

        insert_inner_entry(&mut nodes, parent, child);

        assert!(!remove_child_entry(&mut nodes, parent, other));
        assert_eq!(nodes[parent].entries().len(), 1);

        assert!(remove_child_entry(&mut nodes, parent, child));
        assert_eq!(nodes[parent].entries().len(), 0);
    }

    #[test]
    fn test_remove_leaf_entry_takes_first_match() {
        let mut nodes = Nodes::with_key();
        let n = nodes.insert(Node::new(true));

        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(1, 1, 2, 2), 4));
        insert_leaf_entry(&mut nodes, n, leaf_entry(rect(1, 1, 2, 2), 4));

        assert!(remove_leaf_entry(&mut nodes, n, &rect(1, 1, 2, 2)));
        assert_eq!(nodes[n].entries().len(), 1);

        assert!(!remove_leaf_entry(&mut nodes, n, &rect(0, 0, 9, 9)));
    }
}
