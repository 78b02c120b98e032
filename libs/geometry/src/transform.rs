//! Transformation types and traits.

use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};

use super::orientation::Orientation;
use crate::point::Point;
use crate::wrap_angle;

/// An affine transformation representing a translation, rotation, and/or reflection of geometry.
///
/// This object does not support scaling of geometry, and as such all transformation matrices
/// should be orthonormal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// The transformation matrix.
    pub(crate) mat: [[f64; 2]; 2],
    /// The x-y translation applied after the transformation.
    pub(crate) b: Point,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Returns the sine and cosine of `angle` degrees.
///
/// Multiples of 90 degrees are exact so that Manhattan placements never accumulate error.
fn sin_cos(angle: f64) -> (f64, f64) {
    let angle = wrap_angle(angle);
    let quarter = angle / 90.;
    if quarter.fract().abs() < 1e-12 {
        match quarter.round() as i64 % 4 {
            0 => (0., 1.),
            1 => (1., 0.),
            2 => (0., -1.),
            _ => (-1., 0.),
        }
    } else {
        angle.to_radians().sin_cos()
    }
}

fn matmul(a: &[[f64; 2]; 2], b: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

fn matvec(a: &[[f64; 2]; 2], p: Point) -> Point {
    Point::new(
        a[0][0] * p.x + a[0][1] * p.y,
        a[1][0] * p.x + a[1][1] * p.y,
    )
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub fn identity() -> Self {
        Self {
            mat: [[1., 0.], [0., 1.]],
            b: Point::zero(),
        }
    }

    /// Returns a translation by `(x,y)`.
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            mat: [[1., 0.], [0., 1.]],
            b: Point::new(x, y),
        }
    }

    /// Returns a counter-clockwise rotation by `angle` degrees.
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = sin_cos(angle);
        Self {
            mat: [[cos, -sin], [sin, cos]],
            b: Point::zero(),
        }
    }

    /// Returns a reflection about the x-axis.
    pub fn reflect_vert() -> Self {
        Self {
            mat: [[1., 0.], [0., -1.]],
            b: Point::zero(),
        }
    }

    /// Creates a transform from only an offset.
    pub fn from_offset(offset: Point) -> Self {
        Self::translate(offset.x, offset.y)
    }

    /// Creates a transform from an offset and [`Orientation`].
    ///
    /// This is the placement transform of a node centered at `offset`.
    pub fn from_offset_and_orientation(offset: Point, orientation: impl Into<Orientation>) -> Self {
        let mut trans = Self::from(orientation.into());
        trans.b = offset;
        trans
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical instance hierarchies,
    /// in which each level of instance has a nested set of transformations
    /// relative to its top-level parent.
    ///
    /// Note this operation *is not* commutative.
    /// For example the set of transformations:
    /// * (a) Reflect vertically, then
    /// * (b) Translate by (1,1)
    /// * (c) Place a point at (local coordinate) (1,1)
    ///
    /// Lands said point at (2,-2) in top-level space,
    /// whereas reversing the order of (a) and (b) lands it at (2,0).
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        let b = matvec(&parent.mat, child.b) + parent.b;
        let mat = matmul(&parent.mat, &child.mat);
        Self { mat, b }
    }

    /// Applies this transformation to a point.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        matvec(&self.mat, p) + self.b
    }

    /// The point representing the translation of this transformation.
    #[inline]
    pub fn offset_point(&self) -> Point {
        self.b
    }

    /// Returns an [`Orientation`] corresponding to this transformation.
    pub fn orientation(&self) -> Orientation {
        let det = self.mat[0][0] * self.mat[1][1] - self.mat[0][1] * self.mat[1][0];
        let angle = self.mat[1][0].atan2(self.mat[0][0]).to_degrees();
        let angle = (angle * 1e9).round() / 1e9;
        Orientation::from_reflect_and_angle(det < 0., angle)
    }

    /// Returns the inverse [`Transformation`] of `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use geometry::transform::Transformation;
    /// use approx::assert_abs_diff_eq;
    ///
    /// let trans = Transformation::cascade(
    ///     Transformation::rotate(90.),
    ///     Transformation::translate(5., 10.),
    /// );
    /// let inv = trans.inv();
    ///
    /// assert_abs_diff_eq!(Transformation::cascade(inv, trans), Transformation::identity());
    /// ```
    pub fn inv(&self) -> Transformation {
        // Orthonormal matrices are inverted by their transpose.
        let m = &self.mat;
        let mat = [[m[0][0], m[1][0]], [m[0][1], m[1][1]]];
        let b = -matvec(&mat, self.b);
        Self { mat, b }
    }
}

impl From<Orientation> for Transformation {
    fn from(value: Orientation) -> Self {
        let (sin, cos) = sin_cos(value.angle);
        // Rotation applied after the optional vertical reflection.
        let mat = if value.reflect_vert {
            [[cos, sin], [sin, -cos]]
        } else {
            [[cos, -sin], [sin, cos]]
        };
        Self {
            mat,
            b: Point::zero(),
        }
    }
}

impl AbsDiffEq for Transformation {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-9
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.mat
            .iter()
            .flatten()
            .zip(other.mat.iter().flatten())
            .all(|(a, b)| f64::abs_diff_eq(a, b, epsilon))
            && self.b.abs_diff_eq(&other.b, epsilon)
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
pub trait TransformMut {
    /// Applies matrix-vector [`Transformation`] `trans`.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
///
/// Takes in an owned copy of the object and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies matrix-vector [`Transformation`] `trans`.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

/// A trait for specifying how an object is translated by a [`Point`].
pub trait TranslateMut {
    /// Translates the object by `p`.
    fn translate_mut(&mut self, p: Point);
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::orientation::NamedOrientation;

    #[test]
    fn cascade_is_not_commutative() {
        let p = Point::new(1., 1.);
        let a = Transformation::cascade(
            Transformation::reflect_vert(),
            Transformation::translate(1., 1.),
        );
        assert_abs_diff_eq!(a.apply(p), Point::new(2., -2.));
        let b = Transformation::cascade(
            Transformation::translate(1., 1.),
            Transformation::reflect_vert(),
        );
        assert_abs_diff_eq!(b.apply(p), Point::new(2., 0.));
    }

    #[test]
    fn manhattan_rotations_are_exact() {
        let trans = Transformation::rotate(90.);
        assert_eq!(trans.apply(Point::new(3., 0.)), Point::new(0., 3.));
        let trans = Transformation::rotate(-90.);
        assert_eq!(trans.apply(Point::new(3., 0.)), Point::new(0., -3.));
    }

    #[test]
    fn nested_placements_compose() {
        // An instance at (100, 50) rotated 90 degrees, containing an instance at (10, 0)
        // rotated 180 degrees, containing a point at (1, 2).
        let outer = Transformation::from_offset_and_orientation(Point::new(100., 50.), NamedOrientation::R90);
        let inner = Transformation::from_offset_and_orientation(Point::new(10., 0.), NamedOrientation::R180);
        let trans = Transformation::cascade(outer, inner);
        // Inner: (1, 2) -> (-1, -2) + (10, 0) = (9, -2). Outer: (9, -2) -> (2, 9) + (100, 50).
        assert_abs_diff_eq!(trans.apply(Point::new(1., 2.)), Point::new(102., 59.));
        assert_abs_diff_eq!(trans.orientation(), Orientation::rotated(270.));
    }

    #[test]
    fn inverse_undoes_arbitrary_angles() {
        let trans = Transformation::cascade(
            Transformation::from_offset_and_orientation(
                Point::new(-3., 7.),
                Orientation::from_reflect_and_angle(true, 30.),
            ),
            Transformation::rotate(45.),
        );
        let p = Point::new(12.5, -4.);
        assert_abs_diff_eq!(trans.inv().apply(trans.apply(p)), p, epsilon = 1e-9);
    }
}
