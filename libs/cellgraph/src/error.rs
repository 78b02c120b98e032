//! Error types for low-level graph edits.

use arcstr::ArcStr;

use crate::id::{CellId, LibraryId, PrimitiveId};
use crate::{ArcId, ExportId, NodeId};

/// A result type returning [`GraphError`]s.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// A structural failure of a low-level graph primitive.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum GraphError {
    /// No library with the given ID exists.
    #[error("unknown library {0:?}")]
    UnknownLibrary(LibraryId),
    /// No cell with the given ID exists.
    #[error("unknown cell {0:?}")]
    UnknownCell(CellId),
    /// No primitive with the given ID exists.
    #[error("unknown primitive {0:?}")]
    UnknownPrimitive(PrimitiveId),
    /// The cell has no node with the given ID.
    #[error("cell {cell:?} has no node {node}")]
    UnknownNode {
        /// The containing cell.
        cell: CellId,
        /// The missing node.
        node: NodeId,
    },
    /// The cell has no arc with the given ID.
    #[error("cell {cell:?} has no arc {arc}")]
    UnknownArc {
        /// The containing cell.
        cell: CellId,
        /// The missing arc.
        arc: ArcId,
    },
    /// The cell has no export with the given ID.
    #[error("cell {cell:?} has no export {export}")]
    UnknownExport {
        /// The containing cell.
        cell: CellId,
        /// The missing export.
        export: ExportId,
    },
    /// The prototype of a node has no port with the given name.
    #[error("node {node} has no port named `{port}`")]
    UnknownPort {
        /// The node whose prototype lacks the port.
        node: NodeId,
        /// The requested port name.
        port: ArcStr,
    },
    /// A name is empty or contains reserved characters.
    #[error("invalid name `{0}`")]
    InvalidName(ArcStr),
    /// A library with the given name already exists.
    #[error("a library named `{0}` already exists")]
    DuplicateLibrary(ArcStr),
    /// A cell with the same name, version, and view already exists in the library.
    #[error("cell `{0}` already exists")]
    DuplicateCell(ArcStr),
    /// A node with the given name already exists in the cell.
    #[error("a node named `{0}` already exists")]
    DuplicateName(ArcStr),
    /// An export with the given name already exists in the cell.
    #[error("an export named `{0}` already exists")]
    DuplicateExport(ArcStr),
    /// A primitive with the given name already exists in the technology.
    #[error("a primitive named `{0}` already exists")]
    DuplicatePrimitive(ArcStr),
    /// A node cannot be re-pointed to the new prototype because a used port is missing.
    #[error("prototype lacks port `{port}` used by node {node}")]
    IncompatiblePrototype {
        /// The node being re-pointed.
        node: NodeId,
        /// The port missing from the new prototype.
        port: ArcStr,
    },
    /// Instancing the prototype would make a cell contain itself.
    #[error("instancing {proto:?} in {cell:?} would create a cycle")]
    WouldCreateCycle {
        /// The containing cell.
        cell: CellId,
        /// The prototype that depends on the containing cell.
        proto: CellId,
    },
    /// The cell is still instanced and cannot be deleted.
    #[error("cell {cell:?} is still used by {uses} instance(s)")]
    CellInUse {
        /// The cell.
        cell: CellId,
        /// The number of remaining instances.
        uses: usize,
    },
    /// The instance graph contains a cycle through the given cell.
    #[error("instance graph has a cycle through {0:?}")]
    Cycle(CellId),
}
