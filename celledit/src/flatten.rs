//! Promotion of the contents of cell instances into their containing cell.

use std::collections::HashMap;

use arcstr::ArcStr;
use cellgraph::{
    ArcEnd, ArcId, ArcInst, CellId, DesignGraph, ExportId, NodeId, NodeInst, NodeProto, PortInst,
};
use diagnostics::IssueSet;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::error::{Error, Result};
use crate::naming::{CellNamespace, NamingPolicy};
use crate::progress::{percent, Progress};
use crate::report::{Cause, Issue};

/// How many levels of hierarchy to flatten.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDepth", into = "RawDepth")]
pub enum Depth {
    /// Flatten the given number of levels, at least one.
    Levels(u32),
    /// Flatten down to primitives.
    All,
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Levels(1)
    }
}

impl Depth {
    /// The depth remaining after descending one level, or `None` if exhausted.
    fn descend(self) -> Option<Depth> {
        match self {
            Depth::Levels(n) if n > 1 => Some(Depth::Levels(n - 1)),
            Depth::Levels(_) => None,
            Depth::All => Some(Depth::All),
        }
    }
}

/// The serialized form of [`Depth`]: a positive integer or `"all"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDepth {
    Levels(u32),
    Keyword(DepthKeyword),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DepthKeyword {
    All,
}

impl TryFrom<RawDepth> for Depth {
    type Error = String;

    fn try_from(value: RawDepth) -> std::result::Result<Self, Self::Error> {
        match value {
            RawDepth::Levels(0) => Err("depth must be at least 1".to_string()),
            RawDepth::Levels(n) => Ok(Depth::Levels(n)),
            RawDepth::Keyword(DepthKeyword::All) => Ok(Depth::All),
        }
    }
}

impl From<Depth> for RawDepth {
    fn from(value: Depth) -> Self {
        match value {
            Depth::Levels(n) => RawDepth::Levels(n),
            Depth::All => RawDepth::Keyword(DepthKeyword::All),
        }
    }
}

/// Options controlling [`flatten`].
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// How many levels to flatten.
    pub depth: Depth,
    /// Re-create the exports of each flattened prototype on the containing cell.
    pub copy_exports: bool,
    /// How names of promoted objects are made unique.
    pub naming: NamingPolicy,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            depth: Depth::default(),
            copy_exports: true,
            naming: NamingPolicy::default(),
        }
    }
}

/// The result of [`flatten`].
#[derive(Debug)]
pub struct FlattenOutcome {
    /// The selected instances that were flattened and removed.
    pub flattened: Vec<NodeId>,
    /// The number of nodes promoted into the containing cell.
    pub promoted: usize,
    /// Promoted cell instances that were drawn expanded.
    pub expanded: Vec<NodeId>,
    /// Problems encountered along the way.
    pub issues: IssueSet<Issue>,
}

/// Flattens the selected cell instances of `cell`.
///
/// Selected nodes that are not cell instances are ignored. Each instance is
/// flattened on its own: if promoting its contents fails, everything created for it
/// is removed and the instance stays. Flattened instances are deleted together at the end.
pub fn flatten(
    graph: &mut DesignGraph,
    cell: CellId,
    selected: &[NodeId],
    options: &FlattenOptions,
    progress: &mut dyn Progress,
) -> FlattenOutcome {
    let mut issues = IssueSet::new();
    let finish = |issues| FlattenOutcome {
        flattened: Vec::new(),
        promoted: 0,
        expanded: Vec::new(),
        issues,
    };
    let Ok(c) = graph.try_cell(cell) else {
        issues.add_and_emit(Issue::error(Cause::UnknownCell));
        return finish(issues);
    };
    let mut instances = Vec::new();
    for node in selected {
        match c.try_node(*node) {
            Some(n) if n.proto.is_cell() => {
                if !instances.contains(node) {
                    instances.push(*node);
                }
            }
            Some(_) => {}
            None => issues.add_and_emit(Issue::warning(Cause::UnknownNode { node: *node })),
        }
    }
    if instances.is_empty() {
        issues.add_and_emit(Issue::warning(Cause::NothingToExtract));
        return finish(issues);
    }

    let _guard = span!(
        Level::INFO,
        "flatten",
        cell = %graph.describe(cell),
        instances = instances.len(),
    )
    .entered();
    let bounds = NodeProto::Primitive(graph.technology().essential_bounds());
    let has_bounds = graph.cell(cell).nodes().any(|(_, n)| n.proto == bounds);
    let names = CellNamespace::of(graph, cell, &options.naming);
    let mut flattener = Flattener {
        names,
        has_bounds,
        graph,
        cell,
        options,
        created_nodes: Vec::new(),
        created_arcs: Vec::new(),
        promoted: 0,
        expanded: Vec::new(),
        issues,
    };

    progress.start("Extracting cell instances");
    let mut flattened = Vec::new();
    for (i, inst) in instances.iter().enumerate() {
        progress.update(percent(i, instances.len()));
        if flattener.extract_instance(*inst) {
            flattened.push(*inst);
        }
    }
    for inst in flattened.iter() {
        if let Err(err) = flattener.graph.delete_node(cell, *inst) {
            flattener.issues.add_and_emit(Issue::error(Cause::ExtractFailed {
                node: *inst,
                reason: arcstr::format!("{err}"),
            }));
        }
    }
    progress.stop();

    tracing::debug!(
        flattened = flattened.len(),
        promoted = flattener.promoted,
        "flatten complete"
    );
    FlattenOutcome {
        flattened,
        promoted: flattener.promoted,
        expanded: flattener.expanded,
        issues: flattener.issues,
    }
}

/// How a port of a node inside a flattened cell reaches the containing cell.
#[derive(Debug, Clone)]
enum Placed {
    /// The node was promoted; its ports keep their names.
    Node(NodeId),
    /// The node was itself flattened; its ports resolve through the exports of its prototype.
    Flattened(HashMap<ArcStr, PortInst>),
}

struct Flattener<'a> {
    graph: &'a mut DesignGraph,
    cell: CellId,
    options: &'a FlattenOptions,
    names: CellNamespace,
    has_bounds: bool,
    created_nodes: Vec<NodeId>,
    created_arcs: Vec<ArcId>,
    promoted: usize,
    expanded: Vec<NodeId>,
    issues: IssueSet<Issue>,
}

impl Flattener<'_> {
    /// Flattens one selected instance, returning `true` on success.
    fn extract_instance(&mut self, inst: NodeId) -> bool {
        let node = self.graph.cell(self.cell).node(inst).clone();
        let Some(proto) = node.proto.cell() else {
            return false;
        };
        let _guard = span!(Level::DEBUG, "extract", node = %inst).entered();
        self.created_nodes.clear();
        self.created_arcs.clear();
        let (promoted, expanded) = (self.promoted, self.expanded.len());
        let has_bounds = self.has_bounds;

        let result = self
            .extract_level(proto, node.transformation(), self.options.depth)
            .and_then(|ports| {
                self.replace_crossing_arcs(inst, &ports)?;
                Ok(ports)
            });
        let ports = match result {
            Ok(ports) => ports,
            Err(err) => {
                self.rollback();
                self.promoted = promoted;
                self.expanded.truncate(expanded);
                self.has_bounds = has_bounds;
                self.issues.add_and_emit(Issue::error(Cause::ExtractFailed {
                    node: inst,
                    reason: arcstr::format!("{err}"),
                }));
                return false;
            }
        };

        self.rehome_exports(inst, &ports);
        if self.options.copy_exports {
            self.copy_exports(proto, &ports);
        }
        true
    }

    /// Promotes the contents of `src` placed by `trans`, descending while `depth` allows.
    ///
    /// Returns where each export of `src` landed in the containing cell.
    fn extract_level(
        &mut self,
        src: CellId,
        trans: Transformation,
        depth: Depth,
    ) -> Result<HashMap<ArcStr, PortInst>> {
        let tech = self.graph.technology();
        let (center, bounds) = (tech.cell_center(), tech.essential_bounds());
        let nodes: Vec<(NodeId, NodeInst)> = self
            .graph
            .cell(src)
            .nodes()
            .map(|(id, n)| (id, n.clone()))
            .collect();

        let mut placed: HashMap<NodeId, Placed> = HashMap::new();
        for (id, node) in nodes {
            match node.proto {
                NodeProto::Primitive(p) if p == center => continue,
                NodeProto::Primitive(p) if p == bounds => {
                    if self.has_bounds {
                        continue;
                    }
                    self.has_bounds = true;
                }
                _ => {}
            }
            let node_trans = Transformation::cascade(trans, node.transformation());
            if let (NodeProto::Cell(sub), Some(next)) = (node.proto, depth.descend()) {
                let ports = self.extract_level(sub, node_trans, next)?;
                placed.insert(id, Placed::Flattened(ports));
            } else {
                let new = self.promote(&node, node_trans)?;
                placed.insert(id, Placed::Node(new));
            }
        }

        let resolve = |port: &PortInst| -> Option<PortInst> {
            match placed.get(&port.node)? {
                Placed::Node(new) => Some(PortInst::new(*new, port.port.clone())),
                Placed::Flattened(ports) => ports.get(&port.port).cloned(),
            }
        };

        let arcs: Vec<(ArcId, ArcInst)> = self
            .graph
            .cell(src)
            .arcs()
            .map(|(id, a)| (id, a.clone()))
            .collect();
        for (id, arc) in arcs {
            let (Some(head), Some(tail)) = (resolve(&arc.head().port), resolve(&arc.tail().port))
            else {
                self.issues.add_and_emit(Issue::warning(Cause::ArcDropped {
                    arc: arcstr::format!("{} in {}", id, self.graph.describe(src)),
                    reason: "an end has no promoted port".into(),
                }));
                continue;
            };
            let mut new = arc.clone();
            new.ends = [
                ArcEnd::new(head, trans.apply(arc.head().location)),
                ArcEnd::new(tail, trans.apply(arc.tail().location)),
            ];
            new.name = arc.name.as_ref().map(|name| self.names.arcs.allocate(name));
            let new_id = self.graph.create_arc(self.cell, new)?;
            self.created_arcs.push(new_id);
        }

        let exports = self
            .graph
            .cell(src)
            .exports()
            .filter_map(|(_, e)| Some((e.name().clone(), resolve(e.port())?)))
            .collect();
        Ok(exports)
    }

    /// Places a copy of `node` in the containing cell using the composed placement.
    fn promote(&mut self, node: &NodeInst, placement: Transformation) -> Result<NodeId> {
        let mut new = node.clone();
        new.center = placement.offset_point();
        new.orientation = placement.orientation();
        new.name = node.name().map(|name| self.names.nodes.allocate(name));
        let expanded = node.proto.is_cell() && node.state.expanded;
        let id = self.graph.create_node(self.cell, new)?;
        self.created_nodes.push(id);
        self.promoted += 1;
        if expanded {
            self.expanded.push(id);
        }
        Ok(id)
    }

    /// Rebuilds arcs of the containing cell that end on `inst` onto the promoted ports.
    fn replace_crossing_arcs(
        &mut self,
        inst: NodeId,
        ports: &HashMap<ArcStr, PortInst>,
    ) -> Result<()> {
        let crossing: Vec<(ArcId, ArcInst)> = self
            .graph
            .cell(self.cell)
            .arcs_on(inst)
            .map(|(id, a)| (id, a.clone()))
            .collect();
        let mut replaced = Vec::new();
        for (id, arc) in crossing {
            let mut new = arc.clone();
            let mut resolved = true;
            for end in new.ends.iter_mut() {
                if end.port.node != inst {
                    continue;
                }
                match ports.get(&end.port.port) {
                    Some(port) => end.port = port.clone(),
                    None => resolved = false,
                }
            }
            if !resolved {
                self.issues.add_and_emit(Issue::warning(Cause::ArcDropped {
                    arc: arcstr::format!("{} in {}", id, self.graph.describe(self.cell)),
                    reason: "the export it used has no promoted port".into(),
                }));
                continue;
            }
            let new_id = self.graph.create_arc(self.cell, new)?;
            self.created_arcs.push(new_id);
            replaced.push(id);
        }
        // The originals go only once every replacement exists.
        for id in replaced {
            self.graph.delete_arc(self.cell, id)?;
        }
        Ok(())
    }

    /// Moves exports of the containing cell off `inst`, deleting those with nowhere to go.
    fn rehome_exports(&mut self, inst: NodeId, ports: &HashMap<ArcStr, PortInst>) {
        let exports: Vec<(ExportId, ArcStr, PortInst)> = self
            .graph
            .cell(self.cell)
            .exports_on(inst)
            .map(|(id, e)| (id, e.name().clone(), e.port().clone()))
            .collect();
        for (id, name, port) in exports {
            let moved = match ports.get(&port.port) {
                Some(target) => self
                    .graph
                    .move_export(self.cell, id, target.clone())
                    .map_err(Error::from),
                None => Err(Error::from(cellgraph::GraphError::UnknownPort {
                    node: inst,
                    port: port.port.clone(),
                })),
            };
            if moved.is_err() {
                // Deleting also removes connections made to it from above.
                if self.graph.delete_export(self.cell, id).is_ok() {
                    self.issues
                        .add_and_emit(Issue::warning(Cause::ExportDeleted { export: name }));
                }
            }
        }
    }

    /// Re-creates the exports of `proto` at their promoted ports.
    fn copy_exports(&mut self, proto: CellId, ports: &HashMap<ArcStr, PortInst>) {
        let exports: Vec<_> = self
            .graph
            .cell(proto)
            .exports()
            .map(|(_, e)| (e.name().clone(), e.characteristic(), e.vars().clone()))
            .collect();
        for (name, characteristic, vars) in exports {
            let Some(port) = ports.get(&name) else {
                continue;
            };
            if self.graph.cell(self.cell).export_at(port).is_some() {
                continue;
            }
            let new_name = self.names.exports.allocate(&name);
            let created = self
                .graph
                .create_export(self.cell, new_name, port.clone(), characteristic)
                .and_then(|id| {
                    vars.into_iter()
                        .try_for_each(|(k, v)| self.graph.set_export_var(self.cell, id, k, v))
                });
            if let Err(err) = created {
                self.issues.add_and_emit(Issue::warning(Cause::ExportNotCopied {
                    export: name,
                    reason: arcstr::format!("{err}"),
                }));
            }
        }
    }

    /// Removes everything created for the current instance.
    fn rollback(&mut self) {
        for arc in self.created_arcs.drain(..) {
            let _ = self.graph.delete_arc(self.cell, arc);
        }
        for node in self.created_nodes.drain(..) {
            let _ = self.graph.delete_node(self.cell, node);
        }
    }
}
