//! Duplication of a single cell into a library.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{span, Level};

use crate::cell::{is_valid_base_name, Cell, CellName, View};
use crate::error::{GraphError, Result};
use crate::id::{CellId, LibraryId};
use crate::node::NodeProto;
use crate::{DesignGraph, NodeId};

/// A table from source cells to cells already produced in a destination.
pub trait CellMap {
    /// The destination cell that replaces `cell`, if one has been produced.
    fn mapped(&self, cell: CellId) -> Option<CellId>;
}

impl CellMap for HashMap<CellId, CellId> {
    fn mapped(&self, cell: CellId) -> Option<CellId> {
        self.get(&cell).copied()
    }
}

impl CellMap for IndexMap<CellId, CellId> {
    fn mapped(&self, cell: CellId) -> Option<CellId> {
        self.get(&cell).copied()
    }
}

impl CellMap for () {
    fn mapped(&self, _cell: CellId) -> Option<CellId> {
        None
    }
}

impl DesignGraph {
    /// Copies the contents of `src` into a new cell of `dest_lib` named `dest_name`.
    ///
    /// A missing version or view in `dest_name` is taken from `src`.
    /// If the full name is already taken, the version is bumped past the newest one.
    ///
    /// References to other cells are resolved in order:
    /// 1. through `table`;
    /// 2. if `use_existing` is set, to a cell of `dest_lib` with the same name and view
    ///    whose exports cover every port the node uses;
    /// 3. for an icon of `src` itself, to the matching icon of `dest_name` in `dest_lib`;
    /// 4. otherwise the original reference is kept.
    ///
    /// The new cell is fully built before it is inserted, so on error the graph is unchanged.
    pub fn duplicate_cell_contents(
        &mut self,
        src: CellId,
        dest_lib: LibraryId,
        dest_name: CellName,
        use_existing: bool,
        table: &dyn CellMap,
    ) -> Result<CellId> {
        let _guard = span!(
            Level::DEBUG,
            "duplicating cell",
            src = %self.describe(src),
            dest = %dest_name,
        )
        .entered();

        let source = self.try_cell(src)?;
        self.try_library(dest_lib)?;
        if !is_valid_base_name(&dest_name.name) {
            return Err(GraphError::InvalidName(dest_name.name));
        }
        let view = dest_name.view.unwrap_or(source.view);
        let mut version = dest_name.version.unwrap_or(source.version);
        if self
            .find_cell(dest_lib, &dest_name.name, Some(version), view)
            .is_some()
        {
            version = self.next_version(dest_lib, &dest_name.name, view);
        }

        let mut cell = Cell::empty(
            dest_name.name.clone(),
            version,
            view,
            dest_lib,
            Default::default(),
        );
        cell.node_id = source.node_id;
        cell.arc_id = source.arc_id;
        cell.export_id = source.export_id;
        for (id, node) in source.nodes() {
            let mut node = node.clone();
            if let NodeProto::Cell(child) = node.proto {
                node.proto = NodeProto::Cell(self.resolve_reference(
                    src,
                    id,
                    child,
                    dest_lib,
                    &dest_name,
                    use_existing,
                    table,
                ));
            }
            cell.nodes.insert(id, node);
        }
        cell.arcs = source.arcs.clone();
        cell.exports = source.exports.clone();

        Ok(self.insert_cell(cell))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_reference(
        &self,
        src: CellId,
        node: NodeId,
        child: CellId,
        dest_lib: LibraryId,
        dest_name: &CellName,
        use_existing: bool,
        table: &dyn CellMap,
    ) -> CellId {
        if let Some(mapped) = table.mapped(child) {
            return mapped;
        }
        let child_cell = &self.cells[child];
        if use_existing && child_cell.library != dest_lib {
            if let Some(existing) = self.find_cell(dest_lib, &child_cell.name, None, child_cell.view)
            {
                if self.covers_used_ports(src, node, existing) {
                    return existing;
                }
                tracing::warn!(
                    cell = %self.describe(existing),
                    "exports don't match; keeping reference to {}",
                    self.describe(child),
                );
            }
        }
        if self.is_icon_of(child, src) {
            if let Some(icon) = self.find_cell(dest_lib, &dest_name.name, None, View::Icon) {
                if self.covers_used_ports(src, node, icon) {
                    return icon;
                }
            }
        }
        child
    }

    /// Returns `true` if `candidate` exports every port of `node` used in `cell`.
    fn covers_used_ports(&self, cell: CellId, node: NodeId, candidate: CellId) -> bool {
        self.cells[cell]
            .used_ports(node)
            .iter()
            .all(|port| self.has_port(NodeProto::Cell(candidate), port))
    }
}
