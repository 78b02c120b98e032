//! Exports: ports promoted to the boundary of a cell.

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::node::{PortInst, Variable};

/// The electrical role of an export.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    /// No declared role.
    #[default]
    Unknown,
    /// An input.
    Input,
    /// An output.
    Output,
    /// Both an input and an output.
    Bidirectional,
    /// A power supply.
    Power,
    /// A ground.
    Ground,
    /// A clock.
    Clock,
}

/// A named port of a cell, backed by a port of one of its nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub(crate) name: ArcStr,
    pub(crate) port: PortInst,
    pub(crate) characteristic: Characteristic,
    pub(crate) vars: IndexMap<ArcStr, Variable>,
}

impl Export {
    /// The export name. Instances of the cell see a port with this name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The port this export promotes.
    #[inline]
    pub fn port(&self) -> &PortInst {
        &self.port
    }

    /// The electrical role.
    #[inline]
    pub fn characteristic(&self) -> Characteristic {
        self.characteristic
    }

    /// Attached variables.
    #[inline]
    pub fn vars(&self) -> &IndexMap<ArcStr, Variable> {
        &self.vars
    }
}
