//! An import prelude that re-exports commonly used items.

pub use crate::dims::Dims;
pub use crate::orientation::{NamedOrientation, Orientation};
pub use crate::point::Point;
pub use crate::transform::{Transform, TransformMut, Transformation, TranslateMut};
