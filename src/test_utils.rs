use proptest::prelude::*;

use crate::geom::{Point, Rect};

const COORD_MAX: u64 = 16;

/// Shorthand rectangle construction from corner coordinates.
pub(crate) fn rect(x0: u64, y0: u64, x1: u64, y1: u64) -> Rect {
    Rect::new(Point([x0, y0]), Point([x1, y1]))
}

/// Generate small rectangles with corners in [0..[`COORD_MAX`]).
///
/// A small value domain encourages multiple operations to act on the same
/// geometry.
pub(crate) fn arbitrary_rect() -> impl Strategy<Value = Rect> {
    let coord = || 0..COORD_MAX;
    (coord(), coord(), coord(), coord())
        .prop_map(|(a, b, c, d)| rect(a.min(c), b.min(d), a.max(c), b.max(d)))
}

/// Linear-feedback shift register based PRNG.
///
/// Generates 65,535 unique values before cycling.
#[derive(Debug, Clone)]
pub(crate) struct Lfsr(u16);

impl Default for Lfsr {
    fn default() -> Self {
        Self(42)
    }
}

impl Lfsr {
    #[allow(clippy::should_implement_trait)]
    pub(crate) fn next(&mut self) -> u16 {
        let lsb = self.0 & 1;
        self.0 >>= 1;
        if lsb == 1 {
            self.0 ^= 0xD008;
        }
        assert_ne!(self.0, 42, "LFSR rollover");
        self.0
    }

    /// Generate a rectangle with its corner in a 1024x1024 grid and sides of
    /// up to 16 units.
    pub(crate) fn next_rect(&mut self) -> Rect {
        let x = u64::from(self.next() % 1024);
        let y = u64::from(self.next() % 1024);
        let w = u64::from(self.next() % 16);
        let h = u64::from(self.next() % 16);
        rect(x, y, x + w, y + h)
    }
}
