//! A library for assigning unique names.
//!
//! Three layers are provided:
//! * [`NameSet`] allocates fresh names inside one namespace using a [`SuffixPolicy`].
//! * [`Names`] associates each allocated name with a key, so repeated requests are stable.
//! * [`ScopedNames`] shares one namespace among several origins: the same base name
//!   requested by two different origins receives two different names.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};


/// Which run of digits in a name is incremented when the name collides.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuffixDirection {
    /// Increment the right-most run of digits.
    #[default]
    FromRight,
    /// Increment the left-most run of digits.
    FromLeft,
}

/// How a colliding name is turned into a fresh one.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixPolicy {
    /// Placed between a name without digits and the appended counter.
    pub separator: ArcStr,
    /// Which run of digits to increment.
    pub direction: SuffixDirection,
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self {
            separator: arcstr::literal!("_"),
            direction: SuffixDirection::default(),
        }
    }
}

impl SuffixPolicy {
    /// Returns the `n`-th candidate derived from `base`, for `n >= 1`.
    ///
    /// A name containing digits has the selected run of digits replaced by its value plus `n`;
    /// any other name, or one whose digits would overflow a `u64`, has the separator
    /// and `n` appended.
    ///
    /// # Examples
    ///
    /// ```
    /// use uniquify::{SuffixDirection, SuffixPolicy};
    ///
    /// let right = SuffixPolicy::default();
    /// assert_eq!(right.candidate("net", 1), "net_1");
    /// assert_eq!(right.candidate("m1_x7", 2), "m1_x9");
    ///
    /// let left = SuffixPolicy { direction: SuffixDirection::FromLeft, ..Default::default() };
    /// assert_eq!(left.candidate("m1_x7", 2), "m3_x7");
    /// ```
    pub fn candidate(&self, base: &str, n: u64) -> ArcStr {
        let incremented = self.digit_run(base).and_then(|(start, end)| {
            let value = base[start..end].parse::<u64>().ok()?.checked_add(n)?;
            Some((start, end, value))
        });
        match incremented {
            Some((start, end, value)) => {
                arcstr::format!("{}{}{}", &base[..start], value, &base[end..])
            }
            // Digit runs that do not fit in a `u64` are left alone.
            None => arcstr::format!("{}{}{}", base, self.separator, n),
        }
    }

    /// The byte range of the run of ASCII digits selected by the direction.
    fn digit_run(&self, name: &str) -> Option<(usize, usize)> {
        let bytes = name.as_bytes();
        match self.direction {
            SuffixDirection::FromRight => {
                let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
                let start = bytes[..end]
                    .iter()
                    .rposition(|b| !b.is_ascii_digit())
                    .map(|i| i + 1)
                    .unwrap_or(0);
                Some((start, end))
            }
            SuffixDirection::FromLeft => {
                let start = bytes.iter().position(u8::is_ascii_digit)?;
                let end = bytes[start..]
                    .iter()
                    .position(|b| !b.is_ascii_digit())
                    .map(|i| start + i)
                    .unwrap_or(bytes.len());
                Some((start, end))
            }
        }
    }
}

/// A namespace of names already in use.
///
/// Names are compared case-sensitively unless the set was created with
/// [`NameSet::case_insensitive`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameSet {
    names: HashSet<ArcStr>,
    fold_case: bool,
    policy: SuffixPolicy,
}

impl NameSet {
    /// Creates a new, empty, case-sensitive name set with the default policy.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new, empty name set that treats names differing only in case as equal.
    pub fn case_insensitive() -> Self {
        Self {
            fold_case: true,
            ..Default::default()
        }
    }

    /// Sets the policy used to derive fresh names.
    pub fn with_policy(mut self, policy: SuffixPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn key(&self, name: &str) -> ArcStr {
        if self.fold_case {
            name.to_ascii_lowercase().into()
        } else {
            name.into()
        }
    }

    /// Returns `true` if the name is already taken.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&self.key(name))
    }

    /// Marks the given name as taken.
    ///
    /// Returns `false` if it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        let key = self.key(name);
        self.names.insert(key)
    }

    /// Allocates a name based on `base_name`, reserving it.
    ///
    /// The base name itself is returned if it is still free.
    pub fn allocate(&mut self, base_name: &str) -> ArcStr {
        let name = if self.contains(base_name) {
            let mut i = 1;
            loop {
                let candidate = self.policy.candidate(base_name, i);
                if !self.contains(&candidate) {
                    break candidate;
                }
                i += 1;
            }
        } else {
            base_name.into()
        };
        self.reserve(&name);
        name
    }

    /// The number of names taken.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no name is taken.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A set of unique names.
///
/// Each key of type `K` is assigned a unique name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Names<K: Hash + Eq> {
    names: NameSet,
    assignments: HashMap<K, ArcStr>,
}

impl<K: Hash + Eq> Default for Names<K> {
    fn default() -> Self {
        Self {
            names: NameSet::new(),
            assignments: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> Names<K> {
    /// Creates a new, empty name set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a name map backed by the given namespace.
    pub fn with_names(names: NameSet) -> Self {
        Self {
            names,
            assignments: HashMap::new(),
        }
    }

    /// Returns the name associated with this key, if it exists.
    pub fn name(&self, id: &K) -> Option<ArcStr> {
        self.assignments.get(id).cloned()
    }

    /// Associates `name` with `id` without disambiguation.
    ///
    /// Used for names that already exist and must not change.
    pub fn reserve_name(&mut self, id: K, name: impl Into<ArcStr>) {
        let name = name.into();
        self.names.reserve(&name);
        self.assignments.insert(id, name);
    }

    /// Allocates a new, unique name associated with the given ID.
    ///
    /// The name will be based on the given `base_name`.
    /// If the ID already has a name, that name is returned unchanged.
    pub fn assign_name(&mut self, id: K, base_name: &str) -> ArcStr {
        if let Some(name) = self.assignments.get(&id) {
            return name.clone();
        }
        let name = self.names.allocate(base_name);
        self.assignments.insert(id, name.clone());
        name
    }
}

/// Names shared by several origins.
///
/// Keeps a two-level table: base name, then origin, then the name assigned
/// to that (base name, origin) pair. The first origin to request a base name
/// keeps it; later origins receive suffixed names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedNames<O: Hash + Eq> {
    names: NameSet,
    table: HashMap<ArcStr, HashMap<O, ArcStr>>,
}

impl<O: Hash + Eq> Default for ScopedNames<O> {
    fn default() -> Self {
        Self::new(NameSet::new())
    }
}

impl<O: Hash + Eq> ScopedNames<O> {
    /// Creates a scoped table over the given namespace.
    pub fn new(names: NameSet) -> Self {
        Self {
            names,
            table: HashMap::new(),
        }
    }

    fn table_key(&self, base_name: &str) -> ArcStr {
        self.names.key(base_name)
    }

    /// Returns the name previously assigned to `(base_name, origin)`.
    pub fn get(&self, base_name: &str, origin: &O) -> Option<ArcStr> {
        self.table
            .get(&self.table_key(base_name))
            .and_then(|origins| origins.get(origin))
            .cloned()
    }

    /// Records that `origin` owns `base_name` as-is.
    ///
    /// Used to seed the table with names that already exist in the namespace.
    pub fn claim(&mut self, base_name: &str, origin: O) {
        self.names.reserve(base_name);
        let key = self.table_key(base_name);
        self.table
            .entry(key)
            .or_default()
            .insert(origin, base_name.into());
    }

    /// Returns the name for `(base_name, origin)`, assigning one if needed.
    ///
    /// The base name is kept when no other origin has claimed it.
    pub fn assign(&mut self, base_name: &str, origin: O) -> ArcStr {
        if let Some(name) = self.get(base_name, &origin) {
            return name;
        }
        let key = self.table_key(base_name);
        let taken_by_other = self
            .table
            .get(&key)
            .map(|origins| !origins.is_empty())
            .unwrap_or(false);
        let name = if taken_by_other || self.names.contains(base_name) {
            self.names.allocate(base_name)
        } else {
            self.names.reserve(base_name);
            base_name.into()
        };
        self.table
            .entry(key)
            .or_default()
            .insert(origin, name.clone());
        name
    }

    /// The number of distinct origins that requested `base_name`.
    pub fn origins_of(&self, base_name: &str) -> usize {
        self.table
            .get(&self.table_key(base_name))
            .map(HashMap::len)
            .unwrap_or(0)
    }
}
