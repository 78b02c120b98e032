//! Libraries, cells, cell groups, views, and cell names.

use std::fmt::Display;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::arc::ArcInst;
use crate::error::{GraphError, Result};
use crate::export::Export;
use crate::id::{CellId, GroupId, Id, LibraryId};
use crate::node::{NodeInst, PortInst};
use crate::{ArcId, ExportId, NodeId};

/// A named, ordered collection of cells.
#[derive(Debug, Clone)]
pub struct Library {
    pub(crate) name: ArcStr,
    pub(crate) cells: Vec<CellId>,
}

impl Library {
    /// The name of the library.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The cells of this library, in creation order.
    #[inline]
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }
}

/// The set of cells that are different views of one logical design.
#[derive(Debug, Clone)]
pub struct CellGroup {
    pub(crate) library: LibraryId,
    pub(crate) cells: Vec<CellId>,
}

impl CellGroup {
    /// The library every member of the group belongs to.
    #[inline]
    pub fn library(&self) -> LibraryId {
        self.library
    }

    /// The members of the group, in the order they joined.
    #[inline]
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }
}

/// The view of a design that a cell represents.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// A view with no particular meaning.
    #[default]
    Unknown,
    /// A schematic.
    Schematic,
    /// A physical layout.
    Layout,
    /// The symbol used to instance a schematic.
    Icon,
    /// A behavioral description.
    Behavioral,
    /// Documentation.
    Documentation,
    /// A layout skeleton holding only exports and bounds.
    Skeleton,
    /// A netlist.
    Netlist,
}

impl View {
    /// Every view, in a fixed order.
    pub const ALL: [View; 8] = [
        View::Unknown,
        View::Schematic,
        View::Layout,
        View::Icon,
        View::Behavioral,
        View::Documentation,
        View::Skeleton,
        View::Netlist,
    ];

    /// The abbreviation used in full cell names.
    ///
    /// # Examples
    ///
    /// ```
    /// use cellgraph::View;
    /// assert_eq!(View::Schematic.abbreviation(), "sch");
    /// assert_eq!(View::Unknown.abbreviation(), "");
    /// ```
    pub fn abbreviation(&self) -> &'static str {
        match self {
            View::Unknown => "",
            View::Schematic => "sch",
            View::Layout => "lay",
            View::Icon => "ic",
            View::Behavioral => "beh",
            View::Documentation => "doc",
            View::Skeleton => "sk",
            View::Netlist => "net",
        }
    }

    /// Looks up a view by its abbreviation, ignoring case.
    pub fn from_abbreviation(abbr: &str) -> Option<View> {
        View::ALL
            .into_iter()
            .find(|v| v.abbreviation().eq_ignore_ascii_case(abbr))
    }
}

impl Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            View::Unknown => "unknown",
            View::Schematic => "schematic",
            View::Layout => "layout",
            View::Icon => "icon",
            View::Behavioral => "behavioral",
            View::Documentation => "documentation",
            View::Skeleton => "skeleton",
            View::Netlist => "netlist",
        };
        write!(f, "{name}")
    }
}

/// A parsed cell name of the form `name;version{view}`.
///
/// Version and view are optional when parsing.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CellName {
    /// The base name.
    pub name: ArcStr,
    /// The version, if specified.
    pub version: Option<u32>,
    /// The view, if specified.
    pub view: Option<View>,
}

/// Returns `true` if `name` may be used as a base name.
pub(crate) fn is_valid_base_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c > ' ' && c < '\u{7f}' && !matches!(c, ':' | ';' | '{' | '}'))
}

impl CellName {
    /// Creates a fully specified cell name.
    pub fn new(name: impl Into<ArcStr>, version: u32, view: View) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
            view: Some(view),
        }
    }

    /// Creates a cell name with only a base name.
    pub fn base(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            version: None,
            view: None,
        }
    }

    /// Parses a name of the form `name;version{view}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cellgraph::{CellName, View};
    /// let name = CellName::parse("inv;2{sch}").unwrap();
    /// assert_eq!(name, CellName::new("inv", 2, View::Schematic));
    /// assert_eq!(CellName::parse("inv").unwrap().version, None);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || GraphError::InvalidName(text.into());
        let (rest, view) = match text.strip_suffix('}') {
            Some(body) => {
                let open = body.rfind('{').ok_or_else(invalid)?;
                let view = View::from_abbreviation(&body[open + 1..]).ok_or_else(invalid)?;
                (&body[..open], Some(view))
            }
            None => (text, None),
        };
        let (base, version) = match rest.split_once(';') {
            Some((base, version)) => {
                let version = version.parse::<u32>().map_err(|_| invalid())?;
                (base, Some(version))
            }
            None => (rest, None),
        };
        if !is_valid_base_name(base) {
            return Err(invalid());
        }
        Ok(Self {
            name: base.into(),
            version,
            view,
        })
    }
}

impl Display for CellName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = self.version {
            write!(f, ";{version}")?;
        }
        if let Some(view) = self.view {
            if !view.abbreviation().is_empty() {
                write!(f, "{{{}}}", view.abbreviation())?;
            }
        }
        Ok(())
    }
}

/// A named, versioned design prototype.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) name: ArcStr,
    pub(crate) view: View,
    pub(crate) version: u32,
    pub(crate) library: LibraryId,
    pub(crate) group: GroupId,

    pub(crate) node_id: NodeId,
    pub(crate) nodes: IndexMap<NodeId, NodeInst>,
    pub(crate) arc_id: ArcId,
    pub(crate) arcs: IndexMap<ArcId, ArcInst>,
    pub(crate) export_id: ExportId,
    pub(crate) exports: IndexMap<ExportId, Export>,
}

impl Cell {
    pub(crate) fn empty(
        name: ArcStr,
        version: u32,
        view: View,
        library: LibraryId,
        group: GroupId,
    ) -> Self {
        Self {
            name,
            view,
            version,
            library,
            group,
            node_id: Id::new(),
            nodes: IndexMap::new(),
            arc_id: Id::new(),
            arcs: IndexMap::new(),
            export_id: Id::new(),
            exports: IndexMap::new(),
        }
    }

    /// The base name of the cell.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The view of the cell.
    #[inline]
    pub fn view(&self) -> View {
        self.view
    }

    /// The version of the cell.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The library containing the cell.
    #[inline]
    pub fn library(&self) -> LibraryId {
        self.library
    }

    /// The cell group the cell belongs to.
    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// The full `name;version{view}` name of the cell.
    pub fn full_name(&self) -> CellName {
        CellName::new(self.name.clone(), self.version, self.view)
    }

    /// Returns `true` if this cell is an icon.
    #[inline]
    pub fn is_icon(&self) -> bool {
        self.view == View::Icon
    }

    /// Returns `true` if this cell is a schematic.
    #[inline]
    pub fn is_schematic(&self) -> bool {
        self.view == View::Schematic
    }

    /// Iterate over the node instances of this cell.
    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeInst)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// The number of node instances in this cell.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Get the node associated with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no node with the given ID exists.
    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeInst {
        self.nodes.get(&id).unwrap()
    }

    /// Get the node associated with the given ID.
    #[inline]
    pub fn try_node(&self, id: NodeId) -> Option<&NodeInst> {
        self.nodes.get(&id)
    }

    /// Gets the node with the given user name, ignoring case.
    pub fn node_named(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|(_, node)| {
                node.name()
                    .map(|n| n.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id)
    }

    /// Iterate over the arcs of this cell.
    #[inline]
    pub fn arcs(&self) -> impl Iterator<Item = (ArcId, &ArcInst)> {
        self.arcs.iter().map(|(id, arc)| (*id, arc))
    }

    /// The number of arcs in this cell.
    #[inline]
    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Get the arc associated with the given ID.
    #[inline]
    pub fn try_arc(&self, id: ArcId) -> Option<&ArcInst> {
        self.arcs.get(&id)
    }

    /// Iterate over the arcs attached to the given node.
    pub fn arcs_on(&self, node: NodeId) -> impl Iterator<Item = (ArcId, &ArcInst)> {
        self.arcs().filter(move |(_, arc)| arc.touches(node))
    }

    /// Iterate over the exports of this cell.
    #[inline]
    pub fn exports(&self) -> impl Iterator<Item = (ExportId, &Export)> {
        self.exports.iter().map(|(id, export)| (*id, export))
    }

    /// Get the export associated with the given ID.
    #[inline]
    pub fn try_export(&self, id: ExportId) -> Option<&Export> {
        self.exports.get(&id)
    }

    /// Gets the export with the given name, ignoring case.
    pub fn export_named(&self, name: &str) -> Option<(ExportId, &Export)> {
        self.exports()
            .find(|(_, export)| export.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over the exports placed on ports of the given node.
    pub fn exports_on(&self, node: NodeId) -> impl Iterator<Item = (ExportId, &Export)> {
        self.exports()
            .filter(move |(_, export)| export.port().node == node)
    }

    /// Returns the export on the given port, if any.
    pub fn export_at(&self, port: &PortInst) -> Option<(ExportId, &Export)> {
        self.exports().find(|(_, export)| export.port() == port)
    }

    /// Names of the ports of `node` that are used by arcs or exports.
    pub fn used_ports(&self, node: NodeId) -> Vec<ArcStr> {
        let mut ports: Vec<ArcStr> = Vec::new();
        let mut push = |port: &PortInst| {
            if port.node == node && !ports.contains(&port.port) {
                ports.push(port.port.clone());
            }
        };
        for (_, arc) in self.arcs_on(node) {
            arc.ends().iter().for_each(|end| push(&end.port));
        }
        for (_, export) in self.exports_on(node) {
            push(export.port());
        }
        ports
    }
}
