//! Issues reported by engine operations.

use std::fmt::Display;

use arcstr::ArcStr;
use cellgraph::NodeId;
use diagnostics::{Diagnostic, Severity};

/// An expected failure, recorded instead of aborting an operation.
#[derive(Clone, Debug)]
pub struct Issue {
    cause: Cause,
    severity: Severity,
}

/// The cause of an [`Issue`].
#[derive(Clone, Debug)]
pub enum Cause {
    /// Subcells were requested without reusing existing cells.
    SubCellsWithoutExisting,
    /// The destination library does not exist.
    UnknownLibrary,
    /// A root cell does not exist.
    UnknownCell,
    /// Replicating a cell failed and the remaining roots were skipped.
    ReplicationFailed { reason: ArcStr },
    /// The operation was rejected before any change was made.
    PolicyViolation { reason: ArcStr },
    /// A root cell already lives in the destination library.
    AlreadyInLibrary { cell: ArcStr },
    /// An instance of a moved cell could not be re-pointed.
    ReplaceFailed {
        parent: ArcStr,
        node: NodeId,
        reason: ArcStr,
    },
    /// Re-pointing instances in one cell gave up after too many failures.
    RetryLimit { parent: ArcStr, limit: usize },
    /// The original of a moved cell is still referenced and was kept.
    OriginalKept { cell: ArcStr, remaining: usize },
    /// The original of a moved cell could not be deleted.
    DeleteFailed { cell: ArcStr, reason: ArcStr },
    /// The selection contains no cell instances.
    NothingToExtract,
    /// A selected node does not exist.
    UnknownNode { node: NodeId },
    /// Promoting the contents of an instance failed; the instance was left in place.
    ExtractFailed { node: NodeId, reason: ArcStr },
    /// An arc could not be reconnected and was dropped.
    ArcDropped { arc: ArcStr, reason: ArcStr },
    /// An export sat on a port with no promoted counterpart and was deleted.
    ExportDeleted { export: ArcStr },
    /// An export of the flattened prototype could not be re-created.
    ExportNotCopied { export: ArcStr, reason: ArcStr },
}

impl Issue {
    pub(crate) fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    pub(crate) fn warning(cause: Cause) -> Self {
        Self::new(cause, Severity::Warning)
    }

    pub(crate) fn error(cause: Cause) -> Self {
        Self::new(cause, Severity::Error)
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Diagnostic for Issue {
    fn help(&self) -> Option<Box<dyn Display>> {
        match self.cause {
            Cause::SubCellsWithoutExisting => Some(Box::new(
                "enable `use_existing` so copied subcells are referenced",
            )),
            Cause::NothingToExtract => Some(Box::new("select one or more cell instances")),
            _ => None,
        }
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubCellsWithoutExisting => write!(
                f,
                "cross-library copy warning: it makes no sense to copy subcells but not use them"
            ),
            Self::UnknownLibrary => write!(f, "destination library does not exist"),
            Self::UnknownCell => write!(f, "cell does not exist"),
            Self::ReplicationFailed { reason } => write!(f, "{}", reason),
            Self::PolicyViolation { reason } => write!(f, "{}", reason),
            Self::AlreadyInLibrary { cell } => {
                write!(f, "{} is already in the destination library", cell)
            }
            Self::ReplaceFailed {
                parent,
                node,
                reason,
            } => write!(
                f,
                "could not replace instance {} in {}: {}",
                node, parent, reason
            ),
            Self::RetryLimit { parent, limit } => write!(
                f,
                "gave up replacing instances in {} after {} failures",
                parent, limit
            ),
            Self::OriginalKept { cell, remaining } => write!(
                f,
                "{} is still used by {} instance(s) and was not deleted",
                cell, remaining
            ),
            Self::DeleteFailed { cell, reason } => {
                write!(f, "could not delete {}: {}", cell, reason)
            }
            Self::NothingToExtract => write!(f, "must select cell instances to extract"),
            Self::UnknownNode { node } => write!(f, "node {} does not exist", node),
            Self::ExtractFailed { node, reason } => {
                write!(f, "could not extract instance {}: {}", node, reason)
            }
            Self::ArcDropped { arc, reason } => write!(f, "dropped arc {}: {}", arc, reason),
            Self::ExportDeleted { export } => write!(
                f,
                "export `{}` has no promoted port and was deleted",
                export
            ),
            Self::ExportNotCopied { export, reason } => {
                write!(f, "could not copy export `{}`: {}", export, reason)
            }
        }
    }
}
