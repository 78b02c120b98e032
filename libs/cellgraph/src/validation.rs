//! Graph validation utilities.
//!
//! Checks that names are unique, that every reference resolves,
//! and that the instance graph is acyclic.

use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, IssueSet, Severity};
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::error::GraphError;
use crate::id::{CellId, LibraryId};
use crate::node::NodeProto;
use crate::{ArcId, DesignGraph, ExportId};

/// An issue identified during validation of a design graph.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidatorIssue {
    cause: Cause,
    severity: Severity,
}

/// The cause of a [`ValidatorIssue`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// Two cells of a library have the same full name.
    DuplicateCellNames {
        library: LibraryId,
        id1: CellId,
        id2: CellId,
        name: ArcStr,
    },
    /// Two nodes in the same cell have the same name.
    DuplicateNodeNames { cell_id: CellId, name: ArcStr },
    /// Two exports in the same cell have the same name.
    DuplicateExportNames { cell_id: CellId, name: ArcStr },
    /// A node references a cell that does not exist.
    MissingChildCell {
        child_cell_id: CellId,
        parent_cell_id: CellId,
        parent_cell_name: ArcStr,
    },
    /// An arc end refers to a node or port that does not exist.
    DanglingArcEnd {
        arc: ArcId,
        port: ArcStr,
        cell_id: CellId,
        cell_name: ArcStr,
    },
    /// An export refers to a node or port that does not exist.
    DanglingExport {
        export: ExportId,
        name: ArcStr,
        cell_id: CellId,
        cell_name: ArcStr,
    },
    /// A cell contains itself.
    InstanceCycle { cell_id: CellId, cell_name: ArcStr },
}

impl Diagnostic for ValidatorIssue {
    fn severity(&self) -> Severity {
        self.severity
    }
}

impl ValidatorIssue {
    fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Display for ValidatorIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateCellNames { name, .. } => write!(
                f,
                "duplicate cell names: found two or more cells named `{}`",
                name
            ),
            Self::DuplicateNodeNames { name, cell_id } => write!(
                f,
                "duplicate node names: found two or more nodes named `{}` in cell {:?}",
                name, cell_id
            ),
            Self::DuplicateExportNames { name, cell_id } => write!(
                f,
                "duplicate export names: found two or more exports named `{}` in cell {:?}",
                name, cell_id
            ),
            Self::MissingChildCell {
                child_cell_id,
                parent_cell_name,
                ..
            } => write!(
                f,
                "missing child cell: cell `{}` instances cell {:?}, which does not exist",
                parent_cell_name, child_cell_id
            ),
            Self::DanglingArcEnd {
                arc,
                port,
                cell_name,
                ..
            } => write!(
                f,
                "dangling arc: arc {} in cell `{}` ends on missing port `{}`",
                arc, cell_name, port
            ),
            Self::DanglingExport {
                name, cell_name, ..
            } => write!(
                f,
                "dangling export: export `{}` in cell `{}` is on a missing port",
                name, cell_name
            ),
            Self::InstanceCycle { cell_name, .. } => write!(
                f,
                "instance cycle: cell `{}` contains itself",
                cell_name
            ),
        }
    }
}

impl DesignGraph {
    /// Checks whether or not this graph is well formed.
    pub fn validate(&self) -> IssueSet<ValidatorIssue> {
        let _guard = span!(Level::INFO, "validating design graph").entered();
        let mut issues = IssueSet::new();
        self.validate_names(&mut issues);
        self.validate_references(&mut issues);
        self.validate_acyclic(&mut issues);
        issues
    }

    fn validate_names(&self, issues: &mut IssueSet<ValidatorIssue>) {
        for (lib, _) in self.libraries() {
            let mut names: HashMap<String, CellId> = HashMap::new();
            for (id, cell) in self.library_cells(lib) {
                let name = cell.full_name().to_string();
                if let Some(first) = names.insert(name.to_ascii_lowercase(), id) {
                    issues.add_and_emit(ValidatorIssue::new(
                        Cause::DuplicateCellNames {
                            library: lib,
                            id1: first,
                            id2: id,
                            name: name.into(),
                        },
                        Severity::Error,
                    ));
                }
            }
        }
        for (id, cell) in self.cells() {
            let mut nodes = HashMap::new();
            for name in cell.nodes().filter_map(|(_, node)| node.name()) {
                if nodes.insert(name.to_ascii_lowercase(), ()).is_some() {
                    issues.add_and_emit(ValidatorIssue::new(
                        Cause::DuplicateNodeNames {
                            cell_id: id,
                            name: name.clone(),
                        },
                        Severity::Error,
                    ));
                }
            }
            let mut exports = HashMap::new();
            for (_, export) in cell.exports() {
                if exports.insert(export.name().to_ascii_lowercase(), ()).is_some() {
                    issues.add_and_emit(ValidatorIssue::new(
                        Cause::DuplicateExportNames {
                            cell_id: id,
                            name: export.name().clone(),
                        },
                        Severity::Error,
                    ));
                }
            }
        }
    }

    fn validate_references(&self, issues: &mut IssueSet<ValidatorIssue>) {
        for (id, cell) in self.cells() {
            let cell_name: ArcStr = self.describe(id).into();
            for (_, node) in cell.nodes() {
                if let NodeProto::Cell(child) = node.proto {
                    if !self.contains_cell(child) {
                        issues.add_and_emit(ValidatorIssue::new(
                            Cause::MissingChildCell {
                                child_cell_id: child,
                                parent_cell_id: id,
                                parent_cell_name: cell_name.clone(),
                            },
                            Severity::Error,
                        ));
                    }
                }
            }
            let port_exists = |port: &crate::PortInst| {
                cell.try_node(port.node)
                    .map(|node| self.has_port(node.proto, &port.port))
                    .unwrap_or(false)
            };
            for (arc_id, arc) in cell.arcs() {
                for end in arc.ends() {
                    if !port_exists(&end.port) {
                        issues.add_and_emit(ValidatorIssue::new(
                            Cause::DanglingArcEnd {
                                arc: arc_id,
                                port: end.port.port.clone(),
                                cell_id: id,
                                cell_name: cell_name.clone(),
                            },
                            Severity::Error,
                        ));
                    }
                }
            }
            for (export_id, export) in cell.exports() {
                if !port_exists(export.port()) {
                    issues.add_and_emit(ValidatorIssue::new(
                        Cause::DanglingExport {
                            export: export_id,
                            name: export.name().clone(),
                            cell_id: id,
                            cell_name: cell_name.clone(),
                        },
                        Severity::Error,
                    ));
                }
            }
        }
    }

    fn validate_acyclic(&self, issues: &mut IssueSet<ValidatorIssue>) {
        if let Err(GraphError::Cycle(cell)) = self.topological_order() {
            issues.add_and_emit(ValidatorIssue::new(
                Cause::InstanceCycle {
                    cell_id: cell,
                    cell_name: self.describe(cell).into(),
                },
                Severity::Error,
            ));
        }
    }
}
