//! Node sizes.

use serde::{Deserialize, Serialize};

/// The width and height of a placed node, in its own unrotated frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dims {
    /// The width.
    pub w: f64,
    /// The height.
    pub h: f64,
}

impl Dims {
    /// Creates a new [`Dims`] from a width and a height.
    #[inline]
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// A zero-sized extent, used by markers and pins.
    #[inline]
    pub const fn zero() -> Self {
        Self { w: 0., h: 0. }
    }

    /// Returns `true` if both dimensions are zero.
    pub fn is_zero(&self) -> bool {
        self.w == 0. && self.h == 0.
    }
}
