//! Arc instances connecting two ports.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::node::{PortInst, Variable};
use crate::NodeId;

/// Electrical and constraint properties of an arc.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ArcProps {
    /// Ends move together with both attached nodes.
    pub rigid: bool,
    /// The arc keeps its angle when nodes move.
    pub fixed_angle: bool,
    /// Ends may slide within their ports.
    pub slidable: bool,
    /// The arc is drawn with a direction arrow.
    pub directional: bool,
    /// The head end extends past its port.
    pub head_extended: bool,
    /// The tail end extends past its port.
    pub tail_extended: bool,
}

/// One end of an arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcEnd {
    /// The connected port.
    pub port: PortInst,
    /// The location of the end in the containing cell.
    pub location: Point,
}

impl ArcEnd {
    /// Creates a new [`ArcEnd`].
    pub fn new(port: PortInst, location: Point) -> Self {
        Self { port, location }
    }
}

/// A connection between exactly two ports of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcInst {
    /// The name of the arc prototype, such as a metal layer.
    pub proto: ArcStr,
    /// The width of the arc.
    pub width: f64,
    /// The head and tail.
    pub ends: [ArcEnd; 2],
    /// The user-assigned name, if any.
    pub name: Option<ArcStr>,
    /// Electrical and constraint properties.
    pub props: ArcProps,
    /// Attached variables.
    pub vars: IndexMap<ArcStr, Variable>,
}

impl ArcInst {
    /// Creates an unnamed arc between `head` and `tail`.
    pub fn new(proto: impl Into<ArcStr>, width: f64, head: ArcEnd, tail: ArcEnd) -> Self {
        Self {
            proto: proto.into(),
            width,
            ends: [head, tail],
            name: None,
            props: ArcProps::default(),
            vars: IndexMap::new(),
        }
    }

    /// Sets the user name.
    pub fn with_name(mut self, name: impl Into<ArcStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the properties.
    pub fn with_props(mut self, props: ArcProps) -> Self {
        self.props = props;
        self
    }

    /// The head and tail.
    #[inline]
    pub fn ends(&self) -> &[ArcEnd; 2] {
        &self.ends
    }

    /// The head end.
    #[inline]
    pub fn head(&self) -> &ArcEnd {
        &self.ends[0]
    }

    /// The tail end.
    #[inline]
    pub fn tail(&self) -> &ArcEnd {
        &self.ends[1]
    }

    /// Returns `true` if either end is on the given node.
    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.ends.iter().any(|end| end.port.node == node)
    }
}
