//! Cross-library copy and move of cells together with everything they depend on.

use std::collections::HashSet;

use cellgraph::{CellId, DesignGraph, LibraryId, NodeProto, View};
use diagnostics::IssueSet;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::cells::replace_instances;
use crate::config::EditConfig;
use crate::error::{Error, Result};
use crate::idmap::IdMapper;
use crate::naming::{Disambiguator, NamingPolicy};
use crate::progress::{percent, Progress};
use crate::report::{Cause, Issue};

/// The default cap on failed replacements per containing cell when moving.
pub const DEFAULT_MOVE_RETRY_LIMIT: usize = 1000;

/// Options controlling [`replicate`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateOptions {
    /// Move the cells instead of copying them.
    pub move_cells: bool,
    /// Also replicate every subcell not yet present in the destination.
    pub copy_sub_cells: bool,
    /// Rewire references to cells that already exist in the destination.
    pub use_existing: bool,
    /// Bring along every view in the group of a root cell, not only icon and schematic.
    pub all_related_views: bool,
    /// Log every replicated cell at `INFO` rather than `DEBUG`.
    pub verbose: bool,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            move_cells: false,
            copy_sub_cells: true,
            use_existing: true,
            all_related_views: true,
            verbose: false,
        }
    }
}

/// The result of [`replicate`].
#[derive(Debug)]
pub struct ReplicateOutcome {
    /// Every original cell mapped to the cell that was produced for it.
    pub mapper: IdMapper,
    /// Problems encountered along the way.
    pub issues: IssueSet<Issue>,
    /// The destination cell of the last root processed, or `None` if replication failed.
    pub last: Option<CellId>,
}

/// Copies or moves `roots` and their dependencies into `dest`.
///
/// See [`Replicator`] for details.
pub fn replicate(
    graph: &mut DesignGraph,
    roots: &[CellId],
    dest: LibraryId,
    options: &ReplicateOptions,
    progress: &mut dyn Progress,
) -> ReplicateOutcome {
    Replicator::new(graph, dest, *options).run(roots, progress)
}

/// Replicates cells into one destination library.
///
/// Dependencies are replicated before the cells that use them, so the destination
/// graph stays acyclic. Each original cell is replicated at most once per run.
pub struct Replicator<'a> {
    graph: &'a mut DesignGraph,
    dest: LibraryId,
    options: ReplicateOptions,
    retry_limit: usize,
    names: Disambiguator,
    mapper: IdMapper,
    in_progress: HashSet<CellId>,
    issues: IssueSet<Issue>,
}

impl<'a> Replicator<'a> {
    /// Creates a replicator into `dest`.
    pub fn new(graph: &'a mut DesignGraph, dest: LibraryId, options: ReplicateOptions) -> Self {
        Self {
            graph,
            dest,
            options,
            retry_limit: DEFAULT_MOVE_RETRY_LIMIT,
            names: Disambiguator::default(),
            mapper: IdMapper::new(),
            in_progress: HashSet::new(),
            issues: IssueSet::new(),
        }
    }

    /// Creates a replicator into `dest` using the options and retry limit of `config`.
    pub fn from_config(graph: &'a mut DesignGraph, dest: LibraryId, config: &EditConfig) -> Self {
        Self::new(graph, dest, config.replicate).with_retry_limit(config.move_retry_limit)
    }

    /// Caps the number of failed replacements per containing cell when moving.
    pub fn with_retry_limit(mut self, limit: usize) -> Self {
        self.retry_limit = limit;
        self
    }

    /// The cap on failed replacements per containing cell when moving.
    pub fn retry_limit(&self) -> usize {
        self.retry_limit
    }

    /// Sets the policy used to disambiguate clashing cell names.
    pub fn with_naming(mut self, policy: NamingPolicy) -> Self {
        self.names = Disambiguator::new(policy);
        self
    }

    fn verb(&self) -> &'static str {
        if self.options.move_cells {
            "move"
        } else {
            "copy"
        }
    }

    /// Replicates each root in turn.
    ///
    /// A failure stops the run; roots completed before it stay replicated.
    pub fn run(mut self, roots: &[CellId], progress: &mut dyn Progress) -> ReplicateOutcome {
        let dest_name = match self.graph.try_library(self.dest) {
            Ok(lib) => lib.name().clone(),
            Err(_) => {
                self.issues.add_and_emit(Issue::error(Cause::UnknownLibrary));
                return self.finish(None);
            }
        };
        let _guard = span!(
            Level::INFO,
            "replicate",
            dest = %dest_name,
            roots = roots.len(),
            mode = self.verb(),
        )
        .entered();

        if self.options.copy_sub_cells && !self.options.use_existing {
            self.issues
                .add_and_emit(Issue::warning(Cause::SubCellsWithoutExisting));
        }
        for root in roots {
            if !self.graph.contains_cell(*root) {
                self.issues.add_and_emit(Issue::error(Cause::UnknownCell));
                return self.finish(None);
            }
        }
        if let Err(err) = self.check_policy(roots) {
            self.issues.add_and_emit(Issue::error(Cause::PolicyViolation {
                reason: arcstr::format!("{err}"),
            }));
            return self.finish(None);
        }

        progress.start(if self.options.move_cells {
            "Moving cells"
        } else {
            "Copying cells"
        });
        let mut last = None;
        for (i, root) in roots.iter().enumerate() {
            progress.update(percent(i, roots.len()));
            match self.replicate_root(*root) {
                Ok(cell) => last = Some(cell),
                Err(err) => {
                    self.issues.add_and_emit(Issue::error(Cause::ReplicationFailed {
                        reason: arcstr::format!("{err}"),
                    }));
                    last = None;
                    break;
                }
            }
        }
        progress.stop();
        self.finish(last)
    }

    fn finish(self, last: Option<CellId>) -> ReplicateOutcome {
        ReplicateOutcome {
            mapper: self.mapper,
            issues: self.issues,
            last,
        }
    }

    /// Rejects moves that would make a reused destination cell contain the moved cell.
    fn check_policy(&self, roots: &[CellId]) -> Result<()> {
        if !(self.options.move_cells && self.options.use_existing) {
            return Ok(());
        }
        for root in roots {
            for used in self.graph.cells_used_by(&[*root]) {
                let cell = self.graph.cell(used);
                if used == *root || cell.library() == self.dest {
                    continue;
                }
                if let Some(existing) =
                    self.graph
                        .find_cell(self.dest, cell.name(), None, cell.view())
                {
                    if self.graph.depends_on(existing, *root) {
                        return Err(Error::WouldCreateCycle {
                            cell: self.graph.describe(*root).into(),
                            library: self.graph.library(self.dest).name().clone(),
                            existing: self.graph.describe(existing).into(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn replicate_root(&mut self, root: CellId) -> Result<CellId> {
        if self.options.move_cells && self.graph.cell(root).library() == self.dest {
            self.issues.add_and_emit(Issue::new(
                Cause::AlreadyInLibrary {
                    cell: self.graph.describe(root).into(),
                },
                diagnostics::Severity::Info,
            ));
            return Ok(root);
        }
        self.copy_recursively(root, true, self.options.all_related_views)
    }

    /// Replicates `cell` after everything it needs.
    ///
    /// `follow_schematic` is cleared when replicating the icon of a schematic that is
    /// itself being replicated. `related_this_level` brings along every view in the group.
    fn copy_recursively(
        &mut self,
        cell: CellId,
        follow_schematic: bool,
        related_this_level: bool,
    ) -> Result<CellId> {
        if let Some(done) = self.mapper.get(cell) {
            return Ok(done);
        }
        let _guard = span!(Level::DEBUG, "copy_recursively", cell = %self.graph.describe(cell))
            .entered();
        let entered = self.in_progress.insert(cell);
        let result = self.copy_with_dependencies(cell, follow_schematic, related_this_level);
        if entered {
            self.in_progress.remove(&cell);
        }
        result
    }

    fn copy_with_dependencies(
        &mut self,
        cell: CellId,
        follow_schematic: bool,
        related_this_level: bool,
    ) -> Result<CellId> {
        if self.options.copy_sub_cells || self.graph.cell(cell).is_schematic() {
            // Replicating a subcell can add cells to the destination, so rescan after each one.
            while let Some((sub, icon_of_parent)) = self.next_missing_subcell(cell) {
                self.copy_recursively(sub, !icon_of_parent, related_this_level)?;
            }
        }

        if related_this_level {
            // Icons first, so a schematic that instances its own icon finds it copied.
            while let Some(view) = self.next_missing_view(cell, |c| c == View::Icon) {
                self.copy_recursively(view, true, false)?;
            }
            while let Some(view) = self.next_missing_view(cell, |c| c != View::Icon) {
                self.copy_recursively(view, true, false)?;
            }
        } else if follow_schematic && self.graph.cell(cell).is_icon() {
            while let Some(view) = self.next_missing_view(cell, |c| c == View::Schematic) {
                self.copy_recursively(view, true, false)?;
            }
        }

        // A related view may have replicated this cell through an icon-of-parent reference.
        if let Some(done) = self.mapper.get(cell) {
            return Ok(done);
        }

        let name = self.names.dest_name(self.graph, cell);
        let new = self
            .graph
            .duplicate_cell_contents(
                cell,
                self.dest,
                name,
                self.options.use_existing,
                &self.mapper,
            )
            .map_err(|source| Error::Duplicate {
                verb: self.verb(),
                cell: self.graph.describe(cell).into(),
                source,
            })?;
        self.mapper.put(cell, new);

        let action = if self.options.move_cells {
            "moved"
        } else {
            "copied"
        };
        let from = self.graph.describe(cell);
        let to = self.graph.describe(new);
        if self.options.verbose {
            tracing::info!("{action} {from} to {to}");
        } else {
            tracing::debug!("{action} {from} to {to}");
        }

        if self.options.move_cells {
            self.finalize_move(cell, new);
        }
        Ok(new)
    }

    /// The first subcell of `cell` that still has to be replicated, and whether it
    /// is an icon of `cell` itself.
    fn next_missing_subcell(&self, cell: CellId) -> Option<(CellId, bool)> {
        let c = self.graph.cell(cell);
        for (id, node) in c.nodes() {
            let NodeProto::Cell(sub) = node.proto else {
                continue;
            };
            let icon_of_parent = self.graph.is_icon_of_parent(cell, id);
            if !self.options.copy_sub_cells && !icon_of_parent {
                continue;
            }
            let sub_cell = self.graph.cell(sub);
            if sub_cell.library() == self.dest || self.mapper.contains(sub) {
                continue;
            }
            if self.in_progress.contains(&sub) && !icon_of_parent {
                continue;
            }
            if self.options.use_existing
                && self
                    .graph
                    .find_cell(self.dest, sub_cell.name(), None, sub_cell.view())
                    .is_some()
            {
                continue;
            }
            return Some((sub, icon_of_parent));
        }
        None
    }

    /// The first related view of `cell` matching `filter` that still has to be replicated.
    fn next_missing_view(&self, cell: CellId, filter: impl Fn(View) -> bool) -> Option<CellId> {
        self.graph.related_views(cell).into_iter().find(|view| {
            filter(self.graph.cell(*view).view())
                && !self.mapper.contains(*view)
                && !self.in_progress.contains(view)
        })
    }

    /// Re-points every instance of `old` to `new`, then deletes `old` if nothing uses it.
    fn finalize_move(&mut self, old: CellId, new: CellId) {
        let outcome = replace_instances(self.graph, old, new, self.retry_limit);
        self.issues.merge(outcome.issues);
        if outcome.remaining > 0 {
            self.issues.add_and_emit(Issue::warning(Cause::OriginalKept {
                cell: self.graph.describe(old).into(),
                remaining: outcome.remaining,
            }));
            return;
        }
        if let Err(err) = self.graph.delete_cell(old) {
            self.issues.add_and_emit(Issue::warning(Cause::DeleteFailed {
                cell: self.graph.describe(old).into(),
                reason: arcstr::format!("{err}"),
            }));
        }
    }
}
