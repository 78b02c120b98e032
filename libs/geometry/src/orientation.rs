//! Utilities and types for orienting placed nodes.

use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};

use crate::transform::Transformation;
use crate::wrap_angle;

/// A named orientation.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NamedOrientation {
    /// No rotations or reflections.
    #[default]
    R0,
    /// Reflect vertically (ie. about the x-axis).
    ReflectVert,
    /// Reflect horizontally (ie. about the y-axis).
    ReflectHoriz,
    /// Rotate 90 degrees counter-clockwise.
    R90,
    /// Rotate 180 degrees counter-clockwise.
    R180,
    /// Rotate 270 degrees counter-clockwise.
    R270,
    /// Flip across the line y = x.
    FlipYx,
    /// Flip across the line y = -x.
    FlipMinusYx,
}

/// An orientation of a placed node.
///
/// Captures reflection and rotation, but not position or size.
/// Angles need not be Manhattan.
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Orientation {
    /// Reflect vertically.
    ///
    /// Applied before rotation.
    pub(crate) reflect_vert: bool,
    /// Counter-clockwise angle in degrees, in `[0, 360)`.
    ///
    /// Applied after reflecting vertically.
    pub(crate) angle: f64,
}

impl From<NamedOrientation> for Orientation {
    fn from(value: NamedOrientation) -> Self {
        use NamedOrientation::*;
        let (reflect_vert, angle) = match value {
            R0 => (false, 0.),
            R90 => (false, 90.),
            R180 => (false, 180.),
            R270 => (false, 270.),
            ReflectVert => (true, 0.),
            FlipYx => (true, 90.),
            ReflectHoriz => (true, 180.),
            FlipMinusYx => (true, 270.),
        };
        Self {
            reflect_vert,
            angle,
        }
    }
}

impl Orientation {
    /// Creates a new orientation with the given reflection and angle settings.
    ///
    /// The angle is wrapped to `[0, 360)`.
    pub fn from_reflect_and_angle(reflect_vert: bool, angle: f64) -> Self {
        Self {
            reflect_vert,
            angle: wrap_angle(angle),
        }
    }

    /// A pure counter-clockwise rotation by `angle` degrees.
    #[inline]
    pub fn rotated(angle: f64) -> Self {
        Self::from_reflect_and_angle(false, angle)
    }

    /// Returns whether the orientation is reflected vertically.
    #[inline]
    pub fn reflect_vert(&self) -> bool {
        self.reflect_vert
    }

    /// Returns the angle of the orientation, in degrees.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Returns `true` if the angle is a multiple of 90 degrees.
    pub fn is_manhattan(&self) -> bool {
        (self.angle / 90.).fract().abs() < 1e-9
    }

    /// Returns the orientation obtained by applying `child` inside a frame oriented by `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let o = Orientation::rotated(90.).concatenate(Orientation::rotated(180.));
    /// assert_eq!(o, Orientation::rotated(270.));
    /// ```
    pub fn concatenate(self, child: Orientation) -> Orientation {
        Transformation::cascade(self.into(), child.into()).orientation()
    }
}

impl AbsDiffEq for Orientation {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-9
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let delta = wrap_angle(self.angle - other.angle);
        self.reflect_vert == other.reflect_vert && (delta <= epsilon || 360. - delta <= epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_orientations_round_trip_through_transformations() {
        for named in [
            NamedOrientation::R0,
            NamedOrientation::R90,
            NamedOrientation::R180,
            NamedOrientation::R270,
            NamedOrientation::ReflectVert,
            NamedOrientation::ReflectHoriz,
            NamedOrientation::FlipYx,
            NamedOrientation::FlipMinusYx,
        ] {
            let o = Orientation::from(named);
            let back = Transformation::from(o).orientation();
            approx::assert_abs_diff_eq!(back, o);
        }
    }

    #[test]
    fn reflection_reverses_child_rotation() {
        let parent = Orientation::from(NamedOrientation::ReflectVert);
        let o = parent.concatenate(Orientation::rotated(90.));
        approx::assert_abs_diff_eq!(o, Orientation::from_reflect_and_angle(true, 270.));
    }
}
