//! An in-memory [Hilbert R-tree]: a height-balanced, multiway search tree
//! indexing axis-aligned bounding rectangles in a fixed two-dimensional
//! integer coordinate space.
//!
//! Sibling ordering on every level of the tree follows the [Hilbert curve]
//! value of each entry's centroid. The total order this imposes over entries
//! lets an overflowing node defer its split by redistributing entries into
//! cooperating right-hand siblings (2-to-3 splitting), yielding near-full
//! node utilisation and tight bounding boxes compared to a classical Guttman
//! R-tree.
//!
//! # Example
//!
//! ```
//! use hrtree::{HilbertRTree, Point, Rect};
//!
//! let mut tree = HilbertRTree::with_config(2, 4, 32)?;
//!
//! tree.insert(Rect::new(Point([1, 1]), Point([2, 2])));
//! tree.insert(Rect::new(Point([6, 6]), Point([7, 7])));
//! tree.insert(Rect::new(Point([3, 3]), Point([4, 4])));
//!
//! // Rectangles that merely touch the query box count as intersecting.
//! let hits = tree.search_intersect(&Rect::new(Point([0, 0]), Point([3, 3])));
//! assert_eq!(hits.len(), 2);
//!
//! assert!(tree.remove(&Rect::new(Point([6, 6]), Point([7, 7]))));
//! assert_eq!(tree.len(), 2);
//! # Ok::<(), hrtree::Error>(())
//! ```
//!
//! # Indexing arbitrary types
//!
//! Any type implementing [`Spatial`] can be stored directly; the tree keeps
//! ownership of the object and hands out references from queries.
//!
//! # Limitations
//!
//! The tree is a single-writer, in-memory structure: callers must serialise
//! mutations, and mutations against queries. Coordinates are non-negative
//! integers in `0..2^bits` per axis, where `bits` is the Hilbert curve
//! resolution fixed at construction.
//!
//! [Hilbert R-tree]: https://en.wikipedia.org/wiki/Hilbert_R-tree
//! [Hilbert curve]: https://en.wikipedia.org/wiki/Hilbert_curve

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_docs, missing_debug_implementations)]

mod dot;
mod entry;
mod error;
mod geom;
mod hilbert;
mod node;
#[cfg(test)]
mod test_utils;
mod tree;

pub use error::Error;
pub use geom::{Point, Rect, Spatial, DIM};
pub use hilbert::Hilbert;
pub use tree::{
    HilbertRTree, DEFAULT_MAX_ENTRIES, DEFAULT_MIN_ENTRIES, DEFAULT_RESOLUTION,
};
