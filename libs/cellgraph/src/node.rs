//! Node instances and the ports they expose.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::{CellId, PrimitiveId};
use crate::NodeId;

/// The prototype of a node instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NodeProto {
    /// A technology-defined leaf.
    Primitive(PrimitiveId),
    /// Another cell.
    Cell(CellId),
}

impl NodeProto {
    /// Returns the instanced cell, if this is a hierarchical prototype.
    #[inline]
    pub fn cell(&self) -> Option<CellId> {
        match self {
            NodeProto::Cell(cell) => Some(*cell),
            NodeProto::Primitive(_) => None,
        }
    }

    /// Returns the primitive, if this is a leaf prototype.
    #[inline]
    pub fn primitive(&self) -> Option<PrimitiveId> {
        match self {
            NodeProto::Primitive(prim) => Some(*prim),
            NodeProto::Cell(_) => None,
        }
    }

    /// Returns `true` if the prototype is a cell.
    #[inline]
    pub fn is_cell(&self) -> bool {
        matches!(self, NodeProto::Cell(_))
    }
}

impl From<CellId> for NodeProto {
    fn from(value: CellId) -> Self {
        Self::Cell(value)
    }
}

impl From<PrimitiveId> for NodeProto {
    fn from(value: PrimitiveId) -> Self {
        Self::Primitive(value)
    }
}

/// A port of a specific node instance.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PortInst {
    /// The node.
    pub node: NodeId,
    /// The name of the port on the node's prototype.
    pub port: ArcStr,
}

impl PortInst {
    /// Creates a new [`PortInst`].
    pub fn new(node: NodeId, port: impl Into<ArcStr>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

/// A value attached to a design object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Text.
    Text(ArcStr),
    /// An integer.
    Int(i64),
    /// A real number.
    Float(f64),
    /// A flag.
    Bool(bool),
}

/// Display and editing state of a node.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeState {
    /// Whether the contents of a hierarchical instance are drawn.
    pub expanded: bool,
    /// Whether the node is locked against edits.
    pub locked: bool,
    /// Whether the node can only be selected explicitly.
    pub hard_select: bool,
}

/// A placed instance of a primitive or a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInst {
    /// The prototype.
    pub proto: NodeProto,
    /// The center of the node in the coordinates of the containing cell.
    pub center: Point,
    /// The size of the node.
    pub size: Dims,
    /// The orientation of the node.
    pub orientation: Orientation,
    /// The user-assigned name, if any.
    pub name: Option<ArcStr>,
    /// Display and editing state.
    pub state: NodeState,
    /// Attached variables.
    pub vars: IndexMap<ArcStr, Variable>,
}

impl NodeInst {
    /// Creates an unnamed node at `center` with default state.
    pub fn new(proto: impl Into<NodeProto>, center: Point) -> Self {
        Self {
            proto: proto.into(),
            center,
            size: Dims::zero(),
            orientation: Orientation::default(),
            name: None,
            state: NodeState::default(),
            vars: IndexMap::new(),
        }
    }

    /// Sets the size.
    pub fn with_size(mut self, size: Dims) -> Self {
        self.size = size;
        self
    }

    /// Sets the orientation.
    pub fn with_orientation(mut self, orientation: impl Into<Orientation>) -> Self {
        self.orientation = orientation.into();
        self
    }

    /// Sets the user name.
    pub fn with_name(mut self, name: impl Into<ArcStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a variable.
    pub fn with_var(mut self, key: impl Into<ArcStr>, value: Variable) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// The user-assigned name, if any.
    #[inline]
    pub fn name(&self) -> Option<&ArcStr> {
        self.name.as_ref()
    }

    /// The transformation from the prototype's frame into the containing cell.
    pub fn transformation(&self) -> Transformation {
        Transformation::from_offset_and_orientation(self.center, self.orientation)
    }
}
