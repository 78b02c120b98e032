//! Technology-defined primitive prototypes.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::error::{GraphError, Result};
use crate::id::PrimitiveId;

/// The function of a primitive node.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PrimitiveFunction {
    /// Marks the origin of a cell. Never promoted when flattening.
    CellCenter,
    /// Marks the essential bounds of a cell. At most one is kept when flattening.
    EssentialBounds,
    /// A connection point with no geometry of its own.
    Pin,
    /// A contact between layers.
    Contact,
    /// A transistor.
    Transistor,
    /// A resistor.
    Resistor,
    /// A capacitor.
    Capacitor,
    /// Anything else.
    #[default]
    Other,
}

/// A port of a primitive, at an offset from the node center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitivePort {
    /// The port name.
    pub name: ArcStr,
    /// The location of the port in the unrotated frame of the node.
    pub offset: Point,
}

impl PrimitivePort {
    /// Creates a port at the given offset.
    pub fn new(name: impl Into<ArcStr>, offset: Point) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }
}

/// A leaf prototype defined by the technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveNode {
    /// The primitive name.
    pub name: ArcStr,
    /// What the primitive does.
    pub function: PrimitiveFunction,
    /// The ports of the primitive.
    pub ports: Vec<PrimitivePort>,
    /// The size given to new instances.
    pub default_size: Dims,
}

impl PrimitiveNode {
    /// Creates a primitive with no ports.
    pub fn new(name: impl Into<ArcStr>, function: PrimitiveFunction) -> Self {
        Self {
            name: name.into(),
            function,
            ports: Vec::new(),
            default_size: Dims::zero(),
        }
    }

    /// Adds a port.
    pub fn with_port(mut self, port: PrimitivePort) -> Self {
        self.ports.push(port);
        self
    }

    /// Sets the default size.
    pub fn with_size(mut self, size: Dims) -> Self {
        self.default_size = size;
        self
    }

    /// Returns the port with the given name.
    pub fn port(&self, name: &str) -> Option<&PrimitivePort> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// The set of primitives available to a design graph.
///
/// Every technology defines a cell-center marker, an essential-bounds marker,
/// and a universal pin. Each has a single port named `p` at its center.
#[derive(Debug, Clone)]
pub struct Technology {
    primitives: SlotMap<PrimitiveId, PrimitiveNode>,
    by_name: IndexMap<ArcStr, PrimitiveId>,
    cell_center: PrimitiveId,
    essential_bounds: PrimitiveId,
    pin: PrimitiveId,
}

impl Default for Technology {
    fn default() -> Self {
        Self::new()
    }
}

impl Technology {
    /// Creates a technology holding only the generic primitives.
    pub fn new() -> Self {
        let mut primitives = SlotMap::with_key();
        let mut by_name = IndexMap::new();
        let mut add = |node: PrimitiveNode| {
            let name = node.name.clone();
            let id = primitives.insert(node);
            by_name.insert(name, id);
            id
        };
        let cell_center = add(
            PrimitiveNode::new("cell-center", PrimitiveFunction::CellCenter)
                .with_port(PrimitivePort::new("p", Point::zero())),
        );
        let essential_bounds = add(
            PrimitiveNode::new("essential-bounds", PrimitiveFunction::EssentialBounds)
                .with_port(PrimitivePort::new("p", Point::zero())),
        );
        let pin = add(
            PrimitiveNode::new("universal-pin", PrimitiveFunction::Pin)
                .with_port(PrimitivePort::new("p", Point::zero())),
        );
        Self {
            primitives,
            by_name,
            cell_center,
            essential_bounds,
            pin,
        }
    }

    /// Adds a primitive, returning its ID.
    pub fn add_primitive(&mut self, node: PrimitiveNode) -> Result<PrimitiveId> {
        if self.by_name.contains_key(&node.name) {
            return Err(GraphError::DuplicatePrimitive(node.name));
        }
        let name = node.name.clone();
        let id = self.primitives.insert(node);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Gets the primitive with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no primitive has the given ID.
    #[inline]
    pub fn primitive(&self, id: PrimitiveId) -> &PrimitiveNode {
        &self.primitives[id]
    }

    /// Gets the primitive with the given ID.
    #[inline]
    pub fn try_primitive(&self, id: PrimitiveId) -> Option<&PrimitiveNode> {
        self.primitives.get(id)
    }

    /// Looks up a primitive by name.
    pub fn primitive_named(&self, name: &str) -> Option<PrimitiveId> {
        self.by_name.get(name).copied()
    }

    /// Iterate over all primitives.
    pub fn primitives(&self) -> impl Iterator<Item = (PrimitiveId, &PrimitiveNode)> {
        self.primitives.iter()
    }

    /// The cell-center marker.
    #[inline]
    pub fn cell_center(&self) -> PrimitiveId {
        self.cell_center
    }

    /// The essential-bounds marker.
    #[inline]
    pub fn essential_bounds(&self) -> PrimitiveId {
        self.essential_bounds
    }

    /// The universal pin.
    #[inline]
    pub fn pin(&self) -> PrimitiveId {
        self.pin
    }
}
