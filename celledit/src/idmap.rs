//! Tracking of replaced cells.

use cellgraph::{CellId, CellMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A map from the identity of an original cell to the cell that replaces it.
///
/// Filled in as an operation proceeds and handed to callers, which use it to
/// re-point anything that referred to an original cell.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IdMapper {
    map: IndexMap<CellId, CellId>,
}

impl IdMapper {
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `old` was replaced by `new`.
    pub fn put(&mut self, old: CellId, new: CellId) {
        self.map.insert(old, new);
    }

    /// The cell that replaced `old`, if any.
    #[inline]
    pub fn get(&self, old: CellId) -> Option<CellId> {
        self.map.get(&old).copied()
    }

    /// Follows replacements transitively, returning `old` itself if it was never replaced.
    pub fn resolve(&self, old: CellId) -> CellId {
        let mut current = old;
        // Bounded by the number of entries; a chain can visit each at most once.
        for _ in 0..=self.map.len() {
            match self.get(current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    /// Returns `true` if `old` has a replacement.
    #[inline]
    pub fn contains(&self, old: CellId) -> bool {
        self.map.contains_key(&old)
    }

    /// The number of recorded replacements.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing was replaced.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(old, new)` pairs in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, CellId)> + '_ {
        self.map.iter().map(|(old, new)| (*old, *new))
    }

    /// Adds every entry of `other`, overwriting existing entries.
    pub fn merge(&mut self, other: IdMapper) {
        self.map.extend(other.map);
    }
}

impl CellMap for IdMapper {
    fn mapped(&self, cell: CellId) -> Option<CellId> {
        self.get(cell)
    }
}

impl FromIterator<(CellId, CellId)> for IdMapper {
    fn from_iter<T: IntoIterator<Item = (CellId, CellId)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
