//! Error types and error handling utilities.

use arcstr::ArcStr;
use cellgraph::GraphError;

/// A result type returning engine errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for engine operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A low-level graph primitive failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Duplicating a cell failed.
    #[error("{verb} of {cell} failed: {source}")]
    Duplicate {
        /// "copy" or "move".
        verb: &'static str,
        /// The cell being replicated.
        cell: ArcStr,
        /// The underlying failure.
        source: GraphError,
    },
    /// Moving a cell would make a destination cell contain itself.
    #[error("moving {cell} into {library} would create a cycle through {existing}")]
    WouldCreateCycle {
        /// The cell being moved.
        cell: ArcStr,
        /// The destination library.
        library: ArcStr,
        /// The destination cell that already instances the moved cell.
        existing: ArcStr,
    },
    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
