//! Name disambiguation for copied cells and promoted objects.

use arcstr::ArcStr;
use cellgraph::{CellId, CellName, DesignGraph, LibraryId};
use uniquify::{NameSet, ScopedNames};

pub use uniquify::{SuffixDirection, SuffixPolicy as NamingPolicy};

/// Assigns destination names to cells copied into one library.
///
/// Names are memoized per (base name, origin library), so every version and view of
/// a cell from one library keeps a single base name, while same-named cells from
/// different libraries receive distinct ones. Names are compared ignoring case.
#[derive(Debug, Clone)]
pub struct Disambiguator {
    names: ScopedNames<LibraryId>,
}

impl Default for Disambiguator {
    fn default() -> Self {
        Self::new(NamingPolicy::default())
    }
}

impl Disambiguator {
    /// Creates an empty disambiguator using the given policy.
    pub fn new(policy: NamingPolicy) -> Self {
        Self {
            names: ScopedNames::new(NameSet::case_insensitive().with_policy(policy)),
        }
    }

    /// The destination base name for `base_name` coming from `origin`.
    pub fn base_name(&mut self, base_name: &str, origin: LibraryId) -> ArcStr {
        self.names.assign(base_name, origin)
    }

    /// The full destination name for `cell`: the disambiguated base name,
    /// the original version, and the original view.
    pub fn dest_name(&mut self, graph: &DesignGraph, cell: CellId) -> CellName {
        let c = graph.cell(cell);
        CellName::new(
            self.base_name(c.name(), c.library()),
            c.version(),
            c.view(),
        )
    }
}

/// Unique names for nodes, arcs, and exports promoted into one cell.
#[derive(Debug, Clone)]
pub(crate) struct CellNamespace {
    pub(crate) nodes: NameSet,
    pub(crate) arcs: NameSet,
    pub(crate) exports: NameSet,
}

impl CellNamespace {
    /// Seeds the namespace with every name already used in `cell`.
    pub(crate) fn of(graph: &DesignGraph, cell: CellId, policy: &NamingPolicy) -> Self {
        let fresh = || NameSet::case_insensitive().with_policy(policy.clone());
        let (mut nodes, mut arcs, mut exports) = (fresh(), fresh(), fresh());
        let c = graph.cell(cell);
        for name in c.nodes().filter_map(|(_, n)| n.name()) {
            nodes.reserve(name);
        }
        for name in c.arcs().filter_map(|(_, a)| a.name.as_ref()) {
            arcs.reserve(name);
        }
        for (_, export) in c.exports() {
            exports.reserve(export.name());
        }
        Self {
            nodes,
            arcs,
            exports,
        }
    }
}
