//! 2-D placement geometry for hierarchical cell graphs.
//!
//! Node instances are placed by a center point, a size, and an [`Orientation`](orientation::Orientation).
//! Composing the placements of nested instances yields the [`Transformation`](transform::Transformation)
//! that maps coordinates deep in a hierarchy into the coordinate space of an ancestor cell.
//!
//! # Examples
//!
//! ```
//! # use geometry::prelude::*;
//! let parent = Transformation::translate(10., 0.);
//! let child = Transformation::rotate(90.);
//! let trans = Transformation::cascade(parent, child);
//! approx::assert_abs_diff_eq!(trans.apply(Point::new(1., 0.)), Point::new(10., 1.));
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod dims;
pub mod orientation;
pub mod point;
pub mod prelude;
pub mod transform;

/// Wraps the given angle to the interval `[0, 360)` degrees.
///
/// # Examples
///
/// ```
/// use geometry::wrap_angle;
///
/// assert_eq!(wrap_angle(10.), 10.);
/// assert_eq!(wrap_angle(-10.), 350.);
/// assert_eq!(wrap_angle(-740.), 340.);
/// assert_eq!(wrap_angle(725.), 5.);
/// assert_eq!(wrap_angle(360.), 0.);
/// ```
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = ((angle % 360.) + 360.) % 360.;
    // `-0.0 % 360.` and values just below 360 after rounding both land here.
    if wrapped >= 360. || wrapped == 0. {
        0.
    } else {
        wrapped
    }
}
