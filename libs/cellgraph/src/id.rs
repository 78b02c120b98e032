//! Identifiers for graph objects.
//!
//! Libraries, cells, groups, and primitives live in graph-wide arenas and are
//! keyed by [`slotmap`] keys, which are never reused. Objects inside a cell are
//! numbered by per-cell counters.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

slotmap::new_key_type! {
    /// An opaque library identifier.
    pub struct LibraryId;
    /// A stable cell identity.
    ///
    /// Survives for the lifetime of the graph; a destroyed cell's ID is never reassigned,
    /// so it can key maps from old cells to their replacements.
    pub struct CellId;
    /// An opaque cell group identifier.
    pub struct GroupId;
    /// An opaque primitive node identifier.
    pub struct PrimitiveId;
}

/// A per-cell object identifier.
///
/// An ID created in the context of one cell must *not* be used in the context of another cell,
/// except for a cell and its duplicate, which share numbering.
pub struct Id<T>(u64, PhantomData<T>);

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(|id| Self(id, PhantomData))
    }
}

impl<T> Id<T> {
    pub(crate) fn new() -> Self {
        Self(0, PhantomData)
    }

    pub(crate) fn alloc(&mut self) -> Self {
        *self = Self(self.0 + 1, PhantomData);
        *self
    }

    /// The raw counter value.
    pub fn index(&self) -> u64 {
        self.0
    }
}
