use thiserror::Error;

/// Errors returned when constructing a [`HilbertRTree`].
///
/// All other operations on a constructed tree are infallible.
///
/// [`HilbertRTree`]: crate::HilbertRTree
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The minimum node occupancy exceeds the maximum.
    #[error("minimum node occupancy ({min}) must not exceed the maximum ({max})")]
    MinGreaterThanMax {
        /// The rejected minimum occupancy.
        min: usize,
        /// The rejected maximum occupancy.
        max: usize,
    },

    /// The minimum node occupancy is zero.
    #[error("minimum node occupancy must be at least 1")]
    ZeroMinOccupancy,

    /// The Hilbert curve resolution is outside the supported range.
    #[error("hilbert curve resolution must be 1..=32 bits per axis, got {0}")]
    InvalidResolution(u32),
}
