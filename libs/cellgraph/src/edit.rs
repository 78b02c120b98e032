//! Low-level, validated edits of cell contents.

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::cell::is_valid_base_name;
use crate::error::{GraphError, Result};
use crate::export::{Characteristic, Export};
use crate::node::{NodeInst, NodeProto, NodeState, PortInst, Variable};
use crate::{ArcId, ArcInst, CellId, DesignGraph, ExportId, NodeId};

impl DesignGraph {
    fn check_proto(&self, cell: CellId, proto: NodeProto) -> Result<()> {
        match proto {
            NodeProto::Primitive(prim) => {
                self.tech
                    .try_primitive(prim)
                    .ok_or(GraphError::UnknownPrimitive(prim))?;
            }
            NodeProto::Cell(child) => {
                self.try_cell(child)?;
                if self.depends_on(child, cell) {
                    return Err(GraphError::WouldCreateCycle { cell, proto: child });
                }
            }
        }
        Ok(())
    }

    fn check_port(&self, cell: CellId, port: &PortInst) -> Result<()> {
        let node = self
            .try_cell(cell)?
            .try_node(port.node)
            .ok_or(GraphError::UnknownNode {
                cell,
                node: port.node,
            })?;
        if !self.has_port(node.proto, &port.port) {
            return Err(GraphError::UnknownPort {
                node: port.node,
                port: port.port.clone(),
            });
        }
        Ok(())
    }

    /// Places a node in `cell`.
    ///
    /// Fails if the prototype does not exist, if it depends on `cell`,
    /// or if the node name is invalid or already used in the cell.
    pub fn create_node(&mut self, cell: CellId, node: NodeInst) -> Result<NodeId> {
        self.check_proto(cell, node.proto)?;
        if let Some(name) = node.name() {
            if !is_valid_base_name(name) {
                return Err(GraphError::InvalidName(name.clone()));
            }
            if self.try_cell(cell)?.node_named(name).is_some() {
                return Err(GraphError::DuplicateName(name.clone()));
            }
        }
        let c = self.try_cell_mut(cell)?;
        let id = c.node_id.alloc();
        c.nodes.insert(id, node);
        Ok(id)
    }

    /// Connects two ports of `cell` with an arc.
    pub fn create_arc(&mut self, cell: CellId, arc: ArcInst) -> Result<ArcId> {
        for end in arc.ends() {
            self.check_port(cell, &end.port)?;
        }
        let c = self.try_cell_mut(cell)?;
        let id = c.arc_id.alloc();
        c.arcs.insert(id, arc);
        Ok(id)
    }

    /// Exports a port of `cell` under the given name.
    ///
    /// Export names are unique within a cell, ignoring case.
    pub fn create_export(
        &mut self,
        cell: CellId,
        name: impl Into<ArcStr>,
        port: PortInst,
        characteristic: Characteristic,
    ) -> Result<ExportId> {
        let name = name.into();
        if !is_valid_base_name(&name) {
            return Err(GraphError::InvalidName(name));
        }
        self.check_port(cell, &port)?;
        let c = self.try_cell_mut(cell)?;
        if c.exports.values().any(|e| e.name.eq_ignore_ascii_case(&name)) {
            return Err(GraphError::DuplicateExport(name));
        }
        let id = c.export_id.alloc();
        c.exports.insert(
            id,
            Export {
                name,
                port,
                characteristic,
                vars: IndexMap::new(),
            },
        );
        Ok(id)
    }

    /// Moves an export onto another port of the same cell, keeping its name.
    pub fn move_export(&mut self, cell: CellId, export: ExportId, port: PortInst) -> Result<()> {
        self.check_port(cell, &port)?;
        let e = self
            .try_cell_mut(cell)?
            .exports
            .get_mut(&export)
            .ok_or(GraphError::UnknownExport { cell, export })?;
        e.port = port;
        Ok(())
    }

    /// Removes an arc.
    pub fn delete_arc(&mut self, cell: CellId, arc: ArcId) -> Result<ArcInst> {
        self.try_cell_mut(cell)?
            .arcs
            .shift_remove(&arc)
            .ok_or(GraphError::UnknownArc { cell, arc })
    }

    /// Removes an export.
    ///
    /// Arcs and exports that used the corresponding port on instances of `cell`
    /// are removed as well.
    pub fn delete_export(&mut self, cell: CellId, export: ExportId) -> Result<Export> {
        let removed = self
            .try_cell_mut(cell)?
            .exports
            .shift_remove(&export)
            .ok_or(GraphError::UnknownExport { cell, export })?;
        for (parent, node) in self.instances_of(cell) {
            self.detach_port(parent, &PortInst::new(node, removed.name.clone()))?;
        }
        Ok(removed)
    }

    /// Removes every arc and export that uses `port`.
    fn detach_port(&mut self, cell: CellId, port: &PortInst) -> Result<()> {
        let c = self.try_cell_mut(cell)?;
        c.arcs
            .retain(|_, arc| arc.ends().iter().all(|end| &end.port != port));
        let exports: Vec<ExportId> = c
            .exports()
            .filter(|(_, e)| &e.port == port)
            .map(|(id, _)| id)
            .collect();
        for export in exports {
            self.delete_export(cell, export)?;
        }
        Ok(())
    }

    /// Removes a node together with its arcs and exports.
    pub fn delete_node(&mut self, cell: CellId, node: NodeId) -> Result<NodeInst> {
        let c = self.try_cell(cell)?;
        if c.try_node(node).is_none() {
            return Err(GraphError::UnknownNode { cell, node });
        }
        let exports: Vec<ExportId> = c.exports_on(node).map(|(id, _)| id).collect();
        for export in exports {
            self.delete_export(cell, export)?;
        }
        let c = self.try_cell_mut(cell)?;
        c.arcs.retain(|_, arc| !arc.touches(node));
        c.nodes
            .shift_remove(&node)
            .ok_or(GraphError::UnknownNode { cell, node })
    }

    /// Replaces the prototype of a node in place.
    ///
    /// Position, orientation, name, state, arcs, and exports are kept.
    /// Fails with [`GraphError::IncompatiblePrototype`] if a port used by an arc
    /// or export is missing on the new prototype.
    pub fn replace_node_proto(
        &mut self,
        cell: CellId,
        node: NodeId,
        proto: impl Into<NodeProto>,
    ) -> Result<()> {
        let proto = proto.into();
        self.check_proto(cell, proto)?;
        let c = self.try_cell(cell)?;
        if c.try_node(node).is_none() {
            return Err(GraphError::UnknownNode { cell, node });
        }
        if let Some(port) = c
            .used_ports(node)
            .into_iter()
            .find(|port| !self.has_port(proto, port))
        {
            return Err(GraphError::IncompatiblePrototype { node, port });
        }
        let n = self
            .try_cell_mut(cell)?
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::UnknownNode { cell, node })?;
        n.proto = proto;
        Ok(())
    }

    /// Sets the display and editing state of a node.
    pub fn set_node_state(&mut self, cell: CellId, node: NodeId, state: NodeState) -> Result<()> {
        self.node_mut(cell, node)?.state = state;
        Ok(())
    }

    /// Attaches a variable to a node, replacing any previous value.
    pub fn set_node_var(
        &mut self,
        cell: CellId,
        node: NodeId,
        key: impl Into<ArcStr>,
        value: Variable,
    ) -> Result<()> {
        self.node_mut(cell, node)?.vars.insert(key.into(), value);
        Ok(())
    }

    /// Attaches a variable to an export, replacing any previous value.
    pub fn set_export_var(
        &mut self,
        cell: CellId,
        export: ExportId,
        key: impl Into<ArcStr>,
        value: Variable,
    ) -> Result<()> {
        self.try_cell_mut(cell)?
            .exports
            .get_mut(&export)
            .ok_or(GraphError::UnknownExport { cell, export })?
            .vars
            .insert(key.into(), value);
        Ok(())
    }

    fn node_mut(&mut self, cell: CellId, node: NodeId) -> Result<&mut NodeInst> {
        self.try_cell_mut(cell)?
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::UnknownNode { cell, node })
    }

    /// Destroys a cell.
    ///
    /// Fails with [`GraphError::CellInUse`] while any node still instances it.
    pub fn delete_cell(&mut self, cell: CellId) -> Result<crate::Cell> {
        self.try_cell(cell)?;
        let uses = self.instances_of(cell).len();
        if uses > 0 {
            return Err(GraphError::CellInUse { cell, uses });
        }
        tracing::debug!(cell = %self.describe(cell), "deleting cell");
        let removed = self
            .cells
            .remove(cell)
            .ok_or(GraphError::UnknownCell(cell))?;
        self.libraries[removed.library].cells.retain(|id| *id != cell);
        let group = &mut self.groups[removed.group];
        group.cells.retain(|id| *id != cell);
        if group.cells.is_empty() {
            self.groups.remove(removed.group);
        }
        Ok(removed)
    }
}
