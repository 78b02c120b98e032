//! Whole-cell edits within one library: new versions, duplicates, instance
//! replacement, and removal of unused old versions.

use std::collections::HashSet;

use arcstr::ArcStr;
use cellgraph::{CellId, CellName, DesignGraph, LibraryId, NodeId, NodeProto, View};
use diagnostics::IssueSet;

use crate::error::Result;
use crate::idmap::IdMapper;
use crate::report::{Cause, Issue};

/// The result of [`replace_instances`].
#[derive(Debug)]
pub struct ReplaceOutcome {
    /// The number of instances now pointing at the new cell.
    pub replaced: usize,
    /// The number of instances still pointing at the old cell.
    pub remaining: usize,
    /// Problems encountered along the way.
    pub issues: IssueSet<Issue>,
}

/// Re-points every instance of `old` to `new`.
///
/// Instances whose connections `new` cannot carry keep their prototype and are
/// reported; the others are still replaced. Once `retry_limit` replacements have
/// failed in one containing cell, the rest of that cell is skipped.
pub fn replace_instances(
    graph: &mut DesignGraph,
    old: CellId,
    new: CellId,
    retry_limit: usize,
) -> ReplaceOutcome {
    let mut issues = IssueSet::new();
    let mut parents: Vec<CellId> = Vec::new();
    for (parent, _) in graph.instances_of(old) {
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    let mut replaced = 0;
    let mut failed: HashSet<(CellId, NodeId)> = HashSet::new();
    for parent in parents {
        let mut failures = 0;
        loop {
            let next = graph
                .cell(parent)
                .nodes()
                .find(|(id, node)| {
                    node.proto == NodeProto::Cell(old) && !failed.contains(&(parent, *id))
                })
                .map(|(id, _)| id);
            let Some(node) = next else {
                break;
            };
            match graph.replace_node_proto(parent, node, new) {
                Ok(()) => replaced += 1,
                Err(err) => {
                    failed.insert((parent, node));
                    failures += 1;
                    issues.add_and_emit(Issue::warning(Cause::ReplaceFailed {
                        parent: graph.describe(parent).into(),
                        node,
                        reason: arcstr::format!("{err}"),
                    }));
                    if failures >= retry_limit {
                        issues.add_and_emit(Issue::warning(Cause::RetryLimit {
                            parent: graph.describe(parent).into(),
                            limit: retry_limit,
                        }));
                        break;
                    }
                }
            }
        }
    }

    ReplaceOutcome {
        replaced,
        remaining: graph.instances_of(old).len(),
        issues,
    }
}

/// Creates a new version of `cell` in its own library, one past the newest existing one.
///
/// Existing instances keep pointing at the version they use.
pub fn new_version(graph: &mut DesignGraph, cell: CellId) -> Result<CellId> {
    let c = graph.try_cell(cell)?;
    let (lib, name) = (c.library(), CellName::base(c.name().clone()));
    let new = graph.duplicate_cell_contents(cell, lib, name, false, &())?;
    tracing::info!(
        "created new version {}, old version is {}",
        graph.describe(new),
        graph.describe(cell)
    );
    Ok(new)
}

/// Copies `cell` within its library under the base name `new_name`.
///
/// With `entire_group`, every view in the cell's group is copied too; otherwise
/// only the icon of a schematic comes along. Copies start at version 1, and
/// references between copied views point at the copies. If a later view fails,
/// the views already copied stay and the error is returned.
///
/// Returns every copied cell mapped to its copy.
pub fn duplicate(
    graph: &mut DesignGraph,
    cell: CellId,
    new_name: &str,
    entire_group: bool,
) -> Result<IdMapper> {
    let c = graph.try_cell(cell)?;
    let lib = c.library();
    let schematic = c.is_schematic();

    let mut members = vec![cell];
    members.extend(
        graph
            .related_views(cell)
            .into_iter()
            .filter(|other| entire_group || (schematic && graph.cell(*other).is_icon())),
    );
    // Icons first, so schematics instancing them resolve to the new icons.
    members.sort_by_key(|id| graph.cell(*id).view() != View::Icon);

    let mut mapper = IdMapper::new();
    for src in members {
        let name = CellName::new(new_name, 1, graph.cell(src).view());
        let copy = graph.duplicate_cell_contents(src, lib, name, false, &mapper)?;
        tracing::info!(
            "duplicated {}; new cell is {}",
            graph.describe(src),
            graph.describe(copy)
        );
        mapper.put(src, copy);
    }
    Ok(mapper)
}

/// Deletes every cell of `lib` that has a newer version and no instances.
///
/// Deleting a cell can leave an older version unused, so the scan repeats until
/// nothing changes. Returns the descriptions of the deleted cells.
pub fn delete_unused_old_versions(
    graph: &mut DesignGraph,
    lib: LibraryId,
) -> Result<Vec<ArcStr>> {
    graph.try_library(lib)?;
    let mut deleted = Vec::new();
    loop {
        let next = graph.library_cells(lib).find_map(|(id, c)| {
            let newest = graph.find_cell(lib, c.name(), None, c.view())?;
            (newest != id && graph.instances_of(id).is_empty()).then_some(id)
        });
        let Some(cell) = next else {
            break;
        };
        let name: ArcStr = graph.describe(cell).into();
        graph.delete_cell(cell)?;
        tracing::info!("deleted {name}");
        deleted.push(name);
    }
    if deleted.is_empty() {
        tracing::info!("no unused old cell versions to delete");
    }
    Ok(deleted)
}
