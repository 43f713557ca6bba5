use tracing::trace;

use crate::{
    entry::{Entry, EntryList},
    error::Error,
    geom::{Point, Rect, Spatial},
    hilbert::Hilbert,
    node::{self, Node, NodeId, Nodes},
};

/// Default minimum node occupancy.
pub const DEFAULT_MIN_ENTRIES: usize = 20;

/// Default maximum node occupancy.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default Hilbert curve resolution, in bits per axis.
pub const DEFAULT_RESOLUTION: u32 = 32;

/// The number of cooperating siblings pooled before an overflowing node is
/// split (the "2-to-3" in 2-to-3 splitting).
const COOPERATING_SIBLINGS: usize = 2;

/// An in-memory Hilbert R-tree storing objects of type `O`.
///
/// A height-balanced, multiway search tree over axis-aligned bounding
/// rectangles. Entries within a node, and nodes within a level, are ordered
/// by the Hilbert curve value of each entry's centroid; the total order lets
/// an overflowing node shed entries into its cooperating right-hand siblings
/// before resorting to a split.
///
/// # Duplicates
///
/// Inserts are unconditional: objects with identical geometry each get their
/// own entry. [`remove`](Self::remove) drops the first entry whose stored
/// rectangle equals the argument's bounds.
///
/// # Example
///
/// ```
/// use hrtree::{HilbertRTree, Point, Rect};
///
/// let mut tree = HilbertRTree::with_config(2, 4, 32)?;
///
/// tree.insert(Rect::new(Point([4, 4]), Point([5, 5])));
/// tree.insert(Rect::new(Point([8, 8]), Point([9, 9])));
///
/// let q = Rect::new(Point([5, 5]), Point([6, 6]));
/// assert_eq!(tree.search_intersect(&q).len(), 1);
/// # Ok::<(), hrtree::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct HilbertRTree<O> {
    nodes: Nodes<O>,
    root: NodeId,
    size: usize,
    min: usize,
    max: usize,
    curve: Hilbert,
}

impl<O> HilbertRTree<O>
where
    O: Spatial,
{
    /// Construct a tree with the default node occupancy bounds
    /// ([`DEFAULT_MIN_ENTRIES`], [`DEFAULT_MAX_ENTRIES`]) and a Hilbert curve
    /// of `bits` resolution per axis.
    pub fn new(bits: u32) -> Result<Self, Error> {
        Self::with_config(DEFAULT_MIN_ENTRIES, DEFAULT_MAX_ENTRIES, bits)
    }

    /// Construct a tree holding between `min` and `max` entries per node
    /// (the root is exempt from the lower bound).
    ///
    /// Requires `max >= min >= 1` and `bits` in `1..=32`.
    pub fn with_config(min: usize, max: usize, bits: u32) -> Result<Self, Error> {
        if min == 0 {
            return Err(Error::ZeroMinOccupancy);
        }
        if max < min {
            return Err(Error::MinGreaterThanMax { min, max });
        }

        let curve = Hilbert::new(bits)?;
        let mut nodes = Nodes::with_key();
        let root = nodes.insert(Node::new(true));

        Ok(Self {
            nodes,
            root,
            size: 0,
            min,
            max,
            curve,
        })
    }

    /// The number of objects currently stored.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true when the tree holds no objects.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Insert `obj`, positioning it by the Hilbert value of its centre.
    ///
    /// Inserts are unconditional; duplicates by geometry are allowed.
    pub fn insert(&mut self, obj: O) {
        let bb = obj.bounds();
        let h = self.curve.encode(obj.center());
        let e = Entry::Leaf { bb, obj, h };

        let leaf = self.choose_leaf(self.root, h);

        let (split, touched) = if !self.nodes[leaf].is_overflow(self.max) {
            node::insert_leaf_entry(&mut self.nodes, leaf, e);
            node::adjust_lhv(&mut self.nodes, leaf);
            node::adjust_mbr(&mut self.nodes, leaf);
            (None, vec![leaf])
        } else {
            self.handle_overflow(leaf, e)
        };

        self.adjust_tree_for_insert(leaf, split, touched);
        self.size += 1;
    }

    /// Remove the first entry whose stored rectangle equals `obj.bounds()`.
    ///
    /// Returns whether a removal occurred.
    pub fn remove(&mut self, obj: &O) -> bool {
        let bb = obj.bounds();

        let Some(leaf) = self.find_leaf(self.root, &bb) else {
            return false;
        };
        if !node::remove_leaf_entry(&mut self.nodes, leaf, &bb) {
            return false;
        }
        self.size -= 1;

        let (dropped, touched) = if self.nodes[leaf].is_underflow(self.min) {
            self.handle_underflow(leaf)
        } else {
            node::adjust_lhv(&mut self.nodes, leaf);
            node::adjust_mbr(&mut self.nodes, leaf);
            (None, vec![leaf])
        };

        self.adjust_tree_for_remove(leaf, dropped, touched);
        true
    }

    /// All stored objects whose bounding rectangle intersects `bb`.
    ///
    /// Rectangles that merely touch count as intersecting. Result order is
    /// unspecified; duplicates appear only if inserted.
    pub fn search_intersect(&self, bb: &Rect) -> Vec<&O> {
        let mut out = Vec::new();
        self.search_node(self.root, bb, &mut out);
        out
    }

    /// The stored object nearest to `p` by squared Euclidean distance to its
    /// bounding rectangle, if any.
    pub fn nearest_neighbor(&self, p: Point) -> Option<&O> {
        self.nearest_neighbors(1, p).into_iter().next()
    }

    /// Up to `k` stored objects nearest to `p`, ordered nearest first.
    ///
    /// Branch-and-bound search per Roussopoulos, Kelley and Vincent (1995),
    /// descending children by ascending `min_dist` and pruning subtrees that
    /// cannot improve on the current candidates.
    pub fn nearest_neighbors(&self, k: usize, p: Point) -> Vec<&O> {
        let mut best = Vec::new();
        if k > 0 && !self.is_empty() {
            self.nearest(self.root, p, k, &mut best);
        }
        best.into_iter().map(|(_, obj)| obj).collect()
    }

    /// Find the leaf to hold a new entry with Hilbert value `h`: descend into
    /// the first child whose largest Hilbert value reaches `h`, or the last
    /// child when every subtree orders below it.
    fn choose_leaf(&self, n: NodeId, h: u64) -> NodeId {
        let node = &self.nodes[n];
        if node.leaf() {
            return n;
        }

        for e in node.entries().iter() {
            let child = e.child().expect("internal node holds internal entries");
            if self.nodes[child].lhv() >= h {
                return self.choose_leaf(child, h);
            }
        }

        let last = node
            .entries()
            .last()
            .and_then(Entry::child)
            .expect("internal node is never empty");
        self.choose_leaf(last, h)
    }

    /// Find the leaf holding an entry whose stored rectangle equals `bb`,
    /// descending every subtree whose bounding box contains it.
    fn find_leaf(&self, n: NodeId, bb: &Rect) -> Option<NodeId> {
        let node = &self.nodes[n];
        if node.leaf() {
            return Some(n);
        }

        for e in node.entries().iter() {
            if !e.mbr(&self.nodes).contains(bb) {
                continue;
            }
            let child = e.child().expect("internal node holds internal entries");
            if let Some(leaf) = self.find_leaf(child, bb) {
                // Containment got us here; only rectangle equality confirms
                // the object actually lives in this leaf.
                let held = self.nodes[leaf]
                    .entries()
                    .iter()
                    .any(|le| matches!(le, Entry::Leaf { bb: b, .. } if b == bb));
                if held {
                    return Some(leaf);
                }
            }
        }

        None
    }

    /// Absorb `e` into the cooperating-sibling window of overflowing node
    /// `n`, splitting the window only when it cannot hold the union of its
    /// entries.
    ///
    /// Returns the freshly allocated node (if any) and the cohort that
    /// received entries.
    fn handle_overflow(&mut self, n: NodeId, e: Entry<O>) -> (Option<NodeId>, Vec<NodeId>) {
        let leaf = e.is_leaf();

        let mut cohort = node::siblings(&self.nodes, n, COOPERATING_SIBLINGS);

        let mut pool = EntryList::default();
        pool.insert(e, &self.nodes);

        for &id in &cohort {
            debug_assert_eq!(self.nodes[id].leaf(), leaf);
            let drained = self.nodes[id].reset();
            for en in drained {
                pool.insert(en, &self.nodes);
            }
        }

        let split = if pool.len() > cohort.len() * self.max {
            // The window is saturated: allocate one new node and splice it
            // into the level chain immediately left of the target, where the
            // lowest slice of the pool belongs.
            let nn = self.nodes.insert(Node::new(leaf));

            let prev = self.nodes[n].left();
            self.nodes[nn].set_left(prev);
            if let Some(prev) = prev {
                debug_assert_eq!(self.nodes[prev].leaf(), leaf);
                self.nodes[prev].set_right(Some(nn));
            }
            self.nodes[nn].set_right(Some(n));
            self.nodes[n].set_left(Some(nn));

            // The window always starts at the target, so the new node takes
            // its position.
            debug_assert_eq!(cohort[0], n);
            cohort.insert(0, nn);
            trace!(
                pool = pool.len(),
                cohort = cohort.len(),
                "cooperating siblings saturated; split into a new node"
            );
            Some(nn)
        } else {
            None
        };

        self.redistribute(pool, &cohort);

        (split, cohort)
    }

    /// Refill the underflowing node `target` from its cooperating-sibling
    /// window, dropping one node when the window cannot keep every member at
    /// minimum occupancy.
    ///
    /// Returns the dropped node (if any) and the cohort that received
    /// entries.
    fn handle_underflow(&mut self, target: NodeId) -> (Option<NodeId>, Vec<NodeId>) {
        let mut cohort = node::siblings(&self.nodes, target, COOPERATING_SIBLINGS + 1);

        // The window only ever extends rightward, so a target at the right
        // edge of its level would pool alone and dropping it would discard
        // entries. Start the window one node to the left instead.
        if cohort.len() == 1 {
            if let Some(left) = self.nodes[target].left() {
                cohort = node::siblings(&self.nodes, left, COOPERATING_SIBLINGS + 1);
            }
        }

        let mut pool = EntryList::default();
        for &id in &cohort {
            let drained = self.nodes[id].reset();
            for en in drained {
                pool.insert(en, &self.nodes);
            }
        }

        let dropped = if pool.len() < cohort.len() * self.min
            && self.nodes[target].parent().is_some()
        {
            // The pool cannot keep every cohort member at `min`: unlink the
            // leftmost node and spread its share over the remainder.
            let dead = cohort.remove(0);

            let prev = self.nodes[dead].left();
            let next = self.nodes[dead].right();
            if let Some(prev) = prev {
                self.nodes[prev].set_right(next);
            }
            if let Some(next) = next {
                self.nodes[next].set_left(prev);
            }
            self.nodes[dead].set_left(None);
            self.nodes[dead].set_right(None);

            trace!(
                pool = pool.len(),
                cohort = cohort.len(),
                "underflow starves the window; dropping its leftmost node"
            );
            Some(dead)
        } else {
            None
        };

        self.redistribute(pool, &cohort);

        (dropped, cohort)
    }

    /// Deal the ordered `pool` across `cohort` left to right in equal
    /// batches, the last node taking the remainder, and refresh each node's
    /// caches.
    ///
    /// The pool is consumed in Hilbert order and each node receives a
    /// contiguous ascending slice, preserving the per-level ordering.
    fn redistribute(&mut self, pool: EntryList<O>, cohort: &[NodeId]) {
        let batch = pool.len().div_ceil(cohort.len());
        let mut remaining = pool.len();

        let mut entries = pool.into_inner().into_iter();
        for (i, &id) in cohort.iter().enumerate() {
            // A full batch may not leave one entry for every node still
            // waiting (a pool of 4 over 3 nodes would deal 2, 2, 0); cap the
            // take so no attached node ends up empty.
            let waiting = cohort.len() - i - 1;
            let take = batch.min(remaining.saturating_sub(waiting));

            for e in entries.by_ref().take(take) {
                self.insert_entry(id, e);
            }
            remaining -= take;

            node::adjust_lhv(&mut self.nodes, id);
            node::adjust_mbr(&mut self.nodes, id);
        }

        debug_assert!(entries.next().is_none(), "pool not fully redistributed");
    }

    /// Insert an entry of either kind into `id`.
    fn insert_entry(&mut self, id: NodeId, e: Entry<O>) {
        match e {
            Entry::Leaf { .. } => node::insert_leaf_entry(&mut self.nodes, id, e),
            Entry::Inner { child } => node::insert_inner_entry(&mut self.nodes, id, child),
        }
    }

    /// Propagate an insertion at leaf `n` (and an optional split `nn`) to the
    /// root, refreshing ancestor caches and growing a new root when the old
    /// one split.
    fn adjust_tree_for_insert(&mut self, n: NodeId, nn: Option<NodeId>, touched: Vec<NodeId>) {
        let mut n = n;
        let mut nn = nn;
        let mut touched = touched;
        let mut new_root = self.root;

        loop {
            let Some(parent) = self.nodes[n].parent() else {
                if let Some(split) = nn {
                    // The root itself split: a fresh root adopts both halves
                    // in Hilbert order.
                    let grown = self.nodes.insert(Node::new(false));
                    node::insert_inner_entry(&mut self.nodes, grown, n);
                    node::insert_inner_entry(&mut self.nodes, grown, split);
                    trace!("root split; tree grew a level");
                    new_root = grown;
                }

                // The caches of whichever node ends up as the root are the
                // last thing refreshed.
                node::adjust_lhv(&mut self.nodes, new_root);
                node::adjust_mbr(&mut self.nodes, new_root);
                break;
            };

            let mut pp = None;
            let mut next_touched = Vec::new();

            if let Some(split) = nn {
                if !self.nodes[parent].is_overflow(self.max) {
                    node::insert_inner_entry(&mut self.nodes, parent, split);
                    node::adjust_lhv(&mut self.nodes, parent);
                    node::adjust_mbr(&mut self.nodes, parent);
                    next_touched.push(parent);
                } else {
                    let (split, cohort) =
                        self.handle_overflow(parent, Entry::Inner { child: split });
                    pp = split;
                    next_touched = cohort;
                }
            } else {
                next_touched.push(parent);
            }

            for &t in &touched {
                if let Some(tp) = self.nodes[t].parent() {
                    node::adjust_lhv(&mut self.nodes, tp);
                    node::adjust_mbr(&mut self.nodes, tp);
                }
            }

            n = parent;
            nn = pp;
            touched = next_touched;
        }

        self.root = new_root;
    }

    /// Propagate a removal at leaf `n` (and an optional dropped node `dl`)
    /// to the root, cascading entry removal and underflow upward and
    /// collapsing the root while it holds a single internal entry.
    fn adjust_tree_for_remove(&mut self, n: NodeId, dl: Option<NodeId>, touched: Vec<NodeId>) {
        let mut n = n;
        let mut dl = dl;
        let mut touched = touched;

        loop {
            let Some(parent) = self.nodes[n].parent() else {
                // A root holding exactly one internal entry adopts that
                // child's entries, leaf flag and caches. With a minimum
                // occupancy of one this can expose another single-entry
                // root, hence the loop.
                while !self.nodes[n].leaf() && self.nodes[n].entries().len() == 1 {
                    let child = self.nodes[n]
                        .entries()
                        .first()
                        .and_then(Entry::child)
                        .expect("internal node holds internal entries");

                    let grandchildren = self.nodes[child].reset();
                    let child_leaf = self.nodes[child].leaf();
                    self.nodes.remove(child);

                    self.nodes[n].reset();
                    self.nodes[n].set_leaf(child_leaf);
                    for e in grandchildren {
                        self.insert_entry(n, e);
                    }
                    trace!("root collapsed into its only child");
                }

                node::adjust_lhv(&mut self.nodes, n);
                node::adjust_mbr(&mut self.nodes, n);
                break;
            };

            let mut dp = None;
            let mut next_touched = Vec::new();

            if let Some(dead) = dl {
                // The dropped node's entries were redistributed; retire its
                // entry in the parent before any cache refresh can observe
                // the empty husk.
                let dead_parent = self.nodes[dead]
                    .parent()
                    .expect("dropped node is never the root");
                node::remove_child_entry(&mut self.nodes, dead_parent, dead);
                self.nodes.remove(dead);

                if self.nodes[dead_parent].is_underflow(self.min) {
                    let (dropped, cohort) = self.handle_underflow(dead_parent);
                    dp = dropped;
                    next_touched = cohort;
                } else {
                    node::adjust_lhv(&mut self.nodes, dead_parent);
                    node::adjust_mbr(&mut self.nodes, dead_parent);
                    next_touched.push(dead_parent);
                }
            }

            next_touched.push(parent);

            for &t in &touched {
                // A touched sibling may since have been dropped and retired;
                // its former parent was already refreshed above.
                let Some(tp) = self.nodes.get(t).and_then(Node::parent) else {
                    continue;
                };
                node::adjust_lhv(&mut self.nodes, tp);
                node::adjust_mbr(&mut self.nodes, tp);
            }

            n = parent;
            dl = dp;
            touched = next_touched;
        }
    }

    fn search_node<'a>(&'a self, n: NodeId, bb: &Rect, out: &mut Vec<&'a O>) {
        for e in self.nodes[n].entries().iter() {
            if !e.mbr(&self.nodes).intersects(bb) {
                continue;
            }
            match e {
                Entry::Leaf { obj, .. } => out.push(obj),
                Entry::Inner { child } => self.search_node(*child, bb, out),
            }
        }
    }

    /// Accumulate the `k` nearest objects to `p` in `best`, ordered by
    /// ascending squared distance.
    fn nearest<'a>(&'a self, n: NodeId, p: Point, k: usize, best: &mut Vec<(u128, &'a O)>) {
        let node = &self.nodes[n];

        if node.leaf() {
            for e in node.entries().iter() {
                let Entry::Leaf { bb, obj, .. } = e else {
                    unreachable!("leaf node holds leaf entries");
                };
                let d = p.min_dist(bb);
                let at = best.partition_point(|&(bd, _)| bd <= d);
                if at < k {
                    best.insert(at, (d, obj));
                    best.truncate(k);
                }
            }
            return;
        }

        let mut branches: Vec<(u128, u128, NodeId)> = node
            .entries()
            .iter()
            .map(|e| {
                let r = e.mbr(&self.nodes);
                let child = e.child().expect("internal node holds internal entries");
                (p.min_dist(&r), p.min_max_dist(&r), child)
            })
            .collect();
        branches.sort_by_key(|&(md, ..)| md);

        // Some object certainly lies within the smallest min-max distance,
        // but only one: the bound is a valid cutoff for a single-neighbour
        // search alone.
        let cutoff = (k == 1)
            .then(|| branches.iter().map(|&(_, mm, _)| mm).min())
            .flatten();

        for &(md, _, child) in &branches {
            if cutoff.is_some_and(|c| md > c) {
                continue;
            }
            if best.len() == k && best.last().is_some_and(|&(worst, _)| md > worst) {
                continue;
            }
            self.nearest(child, p, k, best);
        }
    }
}

impl<O> HilbertRTree<O> {
    /// The node arena, for rendering and structural validation.
    #[allow(unused)]
    pub(crate) fn arena(&self) -> &Nodes<O> {
        &self.nodes
    }

    /// The current root node.
    #[allow(unused)]
    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }
}
