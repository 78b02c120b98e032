//! An in-memory graph of libraries, cells, and the instances that connect them.
//!
//! A [`DesignGraph`] owns every [`Library`], [`Cell`], and [`CellGroup`],
//! along with the [`Technology`] that defines leaf primitives.
//! Cells contain [`NodeInst`]s, [`ArcInst`]s, and [`Export`]s.
//!
//! All mutation goes through methods on [`DesignGraph`] that validate their
//! inputs and return a [`GraphError`] on failure, so a graph can only be
//! modified into another well-formed graph.
#![warn(missing_docs)]

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use slotmap::SlotMap;
use tracing::{span, Level};

pub mod arc;
pub mod cell;
mod duplicate;
mod edit;
pub mod error;
pub mod export;
pub mod id;
pub mod node;
pub mod tech;
pub mod validation;


pub use arc::{ArcEnd, ArcInst, ArcProps};
pub use cell::{Cell, CellGroup, CellName, Library, View};
pub use duplicate::CellMap;
pub use error::{GraphError, Result};
pub use export::{Characteristic, Export};
pub use id::{CellId, GroupId, Id, LibraryId, PrimitiveId};
pub use node::{NodeInst, NodeProto, NodeState, PortInst, Variable};
pub use tech::{PrimitiveFunction, PrimitiveNode, PrimitivePort, Technology};

/// Identifies a node instance within a cell.
pub type NodeId = Id<NodeInst>;
/// Identifies an arc instance within a cell.
pub type ArcId = Id<ArcInst>;
/// Identifies an export within a cell.
pub type ExportId = Id<Export>;

/// A graph of libraries and cells.
#[derive(Debug, Clone, Default)]
pub struct DesignGraph {
    libraries: SlotMap<LibraryId, Library>,
    cells: SlotMap<CellId, Cell>,
    groups: SlotMap<GroupId, CellGroup>,
    tech: Technology,
}

impl DesignGraph {
    /// Creates an empty graph with the generic technology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph using the given technology.
    pub fn with_technology(tech: Technology) -> Self {
        Self {
            tech,
            ..Default::default()
        }
    }

    /// The technology of this graph.
    #[inline]
    pub fn technology(&self) -> &Technology {
        &self.tech
    }

    /// A mutable reference to the technology of this graph.
    #[inline]
    pub fn technology_mut(&mut self) -> &mut Technology {
        &mut self.tech
    }

    /// Adds a library with the given name.
    ///
    /// Library names are unique, ignoring case.
    pub fn add_library(&mut self, name: impl Into<ArcStr>) -> Result<LibraryId> {
        let name = name.into();
        if !cell::is_valid_base_name(&name) {
            return Err(GraphError::InvalidName(name));
        }
        if self.library_named(&name).is_some() {
            return Err(GraphError::DuplicateLibrary(name));
        }
        Ok(self.libraries.insert(Library {
            name,
            cells: Vec::new(),
        }))
    }

    /// Gets the library with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no library has the given ID.
    #[inline]
    pub fn library(&self, id: LibraryId) -> &Library {
        &self.libraries[id]
    }

    /// Gets the library with the given ID.
    #[inline]
    pub fn try_library(&self, id: LibraryId) -> Result<&Library> {
        self.libraries.get(id).ok_or(GraphError::UnknownLibrary(id))
    }

    /// Looks up a library by name, ignoring case.
    pub fn library_named(&self, name: &str) -> Option<LibraryId> {
        self.libraries
            .iter()
            .find(|(_, lib)| lib.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    /// Iterate over all libraries.
    pub fn libraries(&self) -> impl Iterator<Item = (LibraryId, &Library)> {
        self.libraries.iter()
    }

    /// Adds an empty cell to a library.
    ///
    /// A missing version becomes one past the newest version of the same name and view.
    /// A missing view becomes [`View::Unknown`].
    /// The cell joins the group of a same-named cell of the library, if there is one.
    pub fn add_cell(&mut self, lib: LibraryId, name: CellName) -> Result<CellId> {
        self.try_library(lib)?;
        if !cell::is_valid_base_name(&name.name) {
            return Err(GraphError::InvalidName(name.name));
        }
        let view = name.view.unwrap_or_default();
        let version = match name.version {
            Some(version) => {
                if self.find_cell(lib, &name.name, Some(version), view).is_some() {
                    return Err(GraphError::DuplicateCell(arcstr::format!("{name}")));
                }
                version
            }
            None => self.next_version(lib, &name.name, view),
        };
        let cell = Cell::empty(name.name, version, view, lib, GroupId::default());
        Ok(self.insert_cell(cell))
    }

    /// Inserts a fully built cell, attaching it to its library and a group.
    pub(crate) fn insert_cell(&mut self, mut cell: Cell) -> CellId {
        let group = match self.group_for(cell.library, &cell.name) {
            Some(group) => group,
            None => self.groups.insert(CellGroup {
                library: cell.library,
                cells: Vec::new(),
            }),
        };
        cell.group = group;
        let lib = cell.library;
        let id = self.cells.insert(cell);
        self.libraries[lib].cells.push(id);
        self.groups[group].cells.push(id);
        tracing::debug!(cell = %self.describe(id), "added cell");
        id
    }

    fn group_for(&self, lib: LibraryId, base_name: &str) -> Option<GroupId> {
        self.libraries[lib]
            .cells
            .iter()
            .map(|id| &self.cells[*id])
            .find(|cell| cell.name.eq_ignore_ascii_case(base_name))
            .map(|cell| cell.group)
    }

    /// One past the newest version of `base_name` in `view`, or 1.
    pub(crate) fn next_version(&self, lib: LibraryId, base_name: &str, view: View) -> u32 {
        self.library_cells(lib)
            .filter(|(_, cell)| cell.view == view && cell.name.eq_ignore_ascii_case(base_name))
            .map(|(_, cell)| cell.version)
            .max()
            .map(|v| v + 1)
            .unwrap_or(1)
    }

    /// Gets the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no cell has the given ID.
    #[inline]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    /// Gets the cell with the given ID.
    #[inline]
    pub fn try_cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(id).ok_or(GraphError::UnknownCell(id))
    }

    #[inline]
    pub(crate) fn try_cell_mut(&mut self, id: CellId) -> Result<&mut Cell> {
        self.cells.get_mut(id).ok_or(GraphError::UnknownCell(id))
    }

    /// Returns `true` if a cell with the given ID exists.
    #[inline]
    pub fn contains_cell(&self, id: CellId) -> bool {
        self.cells.contains_key(id)
    }

    /// Iterate over every cell of every library.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter()
    }

    /// Iterate over the cells of a library, in creation order.
    pub fn library_cells(&self, lib: LibraryId) -> impl Iterator<Item = (CellId, &Cell)> {
        self.libraries
            .get(lib)
            .into_iter()
            .flat_map(|lib| lib.cells.iter())
            .map(|id| (*id, &self.cells[*id]))
    }

    /// Gets the cell group with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no group has the given ID.
    #[inline]
    pub fn group(&self, id: GroupId) -> &CellGroup {
        &self.groups[id]
    }

    /// The other members of the group of `cell`.
    pub fn related_views(&self, cell: CellId) -> Vec<CellId> {
        let group = self.cells[cell].group;
        self.groups[group]
            .cells
            .iter()
            .copied()
            .filter(|id| *id != cell)
            .collect()
    }

    /// Finds a cell by base name (ignoring case) and view.
    ///
    /// If `version` is `None`, the newest version is returned.
    pub fn find_cell(
        &self,
        lib: LibraryId,
        name: &str,
        version: Option<u32>,
        view: View,
    ) -> Option<CellId> {
        let candidates = self
            .library_cells(lib)
            .filter(|(_, cell)| cell.view == view && cell.name.eq_ignore_ascii_case(name));
        match version {
            Some(version) => candidates
                .filter(|(_, cell)| cell.version == version)
                .map(|(id, _)| id)
                .next(),
            None => candidates
                .max_by_key(|(_, cell)| cell.version)
                .map(|(id, _)| id),
        }
    }

    /// Returns `true` if `icon` is an icon of the schematic `cell`.
    pub fn is_icon_of(&self, icon: CellId, cell: CellId) -> bool {
        match (self.cells.get(icon), self.cells.get(cell)) {
            (Some(i), Some(c)) => i.is_icon() && c.is_schematic() && i.group == c.group,
            _ => false,
        }
    }

    /// Returns `true` if `node` in `cell` instances an icon of `cell` itself.
    ///
    /// Such nodes are the only legal self-reference and are skipped by every recursion.
    pub fn is_icon_of_parent(&self, cell: CellId, node: NodeId) -> bool {
        self.cells
            .get(cell)
            .and_then(|c| c.try_node(node))
            .and_then(|n| n.proto.cell())
            .map(|proto| self.is_icon_of(proto, cell))
            .unwrap_or(false)
    }

    /// The names of the ports of a prototype.
    ///
    /// These are the ports of a primitive, or the exports of a cell.
    pub fn ports_of(&self, proto: NodeProto) -> Vec<ArcStr> {
        match proto {
            NodeProto::Primitive(prim) => self
                .tech
                .try_primitive(prim)
                .map(|p| p.ports.iter().map(|port| port.name.clone()).collect())
                .unwrap_or_default(),
            NodeProto::Cell(cell) => self
                .cells
                .get(cell)
                .map(|c| c.exports().map(|(_, e)| e.name.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// Returns `true` if the prototype has a port with the given name.
    pub fn has_port(&self, proto: NodeProto, port: &str) -> bool {
        match proto {
            NodeProto::Primitive(prim) => self
                .tech
                .try_primitive(prim)
                .map(|p| p.port(port).is_some())
                .unwrap_or(false),
            NodeProto::Cell(cell) => self
                .cells
                .get(cell)
                .map(|c| c.export_named(port).is_some())
                .unwrap_or(false),
        }
    }

    /// Every node, in any cell, that instances `cell`.
    pub fn instances_of(&self, cell: CellId) -> Vec<(CellId, NodeId)> {
        self.cells
            .iter()
            .flat_map(|(parent, c)| {
                c.nodes()
                    .filter(move |(_, node)| node.proto == NodeProto::Cell(cell))
                    .map(move |(id, _)| (parent, id))
            })
            .collect()
    }

    /// The distinct cells instanced directly by `cell`, in order of first use.
    pub fn children(&self, cell: CellId) -> Vec<CellId> {
        let mut children = Vec::new();
        if let Some(c) = self.cells.get(cell) {
            for (_, node) in c.nodes() {
                if let Some(child) = node.proto.cell() {
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
            }
        }
        children
    }

    /// The roots and every cell they transitively instance, dependencies first.
    pub fn cells_used_by(&self, roots: &[CellId]) -> Vec<CellId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for root in roots {
            self.post_order(*root, &mut visited, &mut order);
        }
        order
    }

    fn post_order(&self, cell: CellId, visited: &mut HashSet<CellId>, order: &mut Vec<CellId>) {
        if !self.cells.contains_key(cell) || !visited.insert(cell) {
            return;
        }
        for child in self.children(cell) {
            self.post_order(child, visited, order);
        }
        order.push(cell);
    }

    /// Returns `true` if `a` is `b` or transitively instances `b`.
    pub fn depends_on(&self, a: CellId, b: CellId) -> bool {
        let mut stack = vec![a];
        let mut visited = HashSet::new();
        while let Some(cell) = stack.pop() {
            if cell == b {
                return true;
            }
            if visited.insert(cell) {
                stack.extend(self.children(cell));
            }
        }
        false
    }

    /// Every cell, ordered so that each cell comes after every cell it instances.
    ///
    /// Fails with [`GraphError::Cycle`] if the instance graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<CellId>> {
        let _guard = span!(Level::DEBUG, "computing topological order").entered();
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Mark {
            Open,
            Done,
        }
        let mut marks: HashMap<CellId, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(self.cells.len());
        for (root, _) in self.cells.iter() {
            if marks.contains_key(&root) {
                continue;
            }
            // Iterative DFS; each frame is a cell and its unvisited children.
            let mut stack = vec![(root, self.children(root))];
            marks.insert(root, Mark::Open);
            while let Some((cell, children)) = stack.last_mut() {
                match children.pop() {
                    Some(child) => match marks.get(&child) {
                        Some(Mark::Open) => return Err(GraphError::Cycle(child)),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::Open);
                            let grandchildren = self.children(child);
                            stack.push((child, grandchildren));
                        }
                    },
                    None => {
                        let cell = *cell;
                        marks.insert(cell, Mark::Done);
                        order.push(cell);
                        stack.pop();
                    }
                }
            }
        }
        Ok(order)
    }

    /// A human-readable `library:name;version{view}` description of a cell.
    pub fn describe(&self, cell: CellId) -> String {
        match self.cells.get(cell) {
            Some(c) => format!("{}:{}", self.libraries[c.library].name, c.full_name()),
            None => format!("<deleted cell {cell:?}>"),
        }
    }
}
