//! Structural edits of cell graphs.
//!
//! Two operations rewrite a [`DesignGraph`](cellgraph::DesignGraph):
//!
//! * [`replicate`](replicate::replicate) copies or moves cells, together with
//!   everything they depend on, into another library;
//! * [`flatten`](flatten::flatten) promotes the contents of cell instances into
//!   the cell containing them.
//!
//! The [`cells`] module adds smaller edits of whole cells within a library.
//!
//! Replication and flattening never abort with an error. Expected failures are collected as
//! [`Issue`]s in the returned outcome and logged through `tracing` as they occur.
#![warn(missing_docs)]

pub mod cells;
pub mod config;
pub mod error;
pub mod flatten;
pub mod idmap;
pub mod naming;
pub mod progress;
pub mod replicate;
pub mod report;

#[cfg(test)]
mod tests;

pub use cells::{
    delete_unused_old_versions, duplicate, new_version, replace_instances, ReplaceOutcome,
};
pub use config::EditConfig;
pub use error::{Error, Result};
pub use flatten::{flatten, Depth, FlattenOptions, FlattenOutcome};
pub use idmap::IdMapper;
pub use naming::{Disambiguator, NamingPolicy, SuffixDirection};
pub use progress::{LogProgress, NoProgress, Progress};
pub use replicate::{replicate, ReplicateOptions, ReplicateOutcome, Replicator};
pub use report::{Cause, Issue};
