use approx::assert_abs_diff_eq;
use cellgraph::*;
use geometry::prelude::*;
use test_log::test;

use crate::*;

struct Fixture {
    graph: DesignGraph,
    res: PrimitiveId,
}

impl Fixture {
    fn new() -> Self {
        let mut graph = DesignGraph::new();
        let res = graph
            .technology_mut()
            .add_primitive(
                PrimitiveNode::new("res", PrimitiveFunction::Resistor)
                    .with_port(PrimitivePort::new("a", Point::new(-1., 0.)))
                    .with_port(PrimitivePort::new("b", Point::new(1., 0.)))
                    .with_size(Dims::new(2., 1.)),
            )
            .unwrap();
        Self { graph, res }
    }

    fn lib(&mut self, name: &str) -> LibraryId {
        self.graph.add_library(name).unwrap()
    }

    fn cell(&mut self, lib: LibraryId, name: &str, view: View) -> CellId {
        self.graph
            .add_cell(
                lib,
                CellName {
                    view: Some(view),
                    ..CellName::base(name)
                },
            )
            .unwrap()
    }

    /// A schematic holding one resistor whose ends are exported as `a` and `b`.
    fn leaf(&mut self, lib: LibraryId, name: &str) -> CellId {
        let cell = self.cell(lib, name, View::Schematic);
        let r = self
            .graph
            .create_node(cell, NodeInst::new(self.res, Point::zero()).with_name("r0"))
            .unwrap();
        self.graph
            .create_export(cell, "a", PortInst::new(r, "a"), Characteristic::Input)
            .unwrap();
        self.graph
            .create_export(cell, "b", PortInst::new(r, "b"), Characteristic::Output)
            .unwrap();
        cell
    }

    /// An icon with two pins exported as `a` and `b`.
    fn icon(&mut self, lib: LibraryId, name: &str) -> CellId {
        let cell = self.cell(lib, name, View::Icon);
        let pin = self.graph.technology().pin();
        for (port, x) in [("a", -2.), ("b", 2.)] {
            let p = self
                .graph
                .create_node(cell, NodeInst::new(pin, Point::new(x, 0.)))
                .unwrap();
            self.graph
                .create_export(cell, port, PortInst::new(p, "p"), Characteristic::Unknown)
                .unwrap();
        }
        cell
    }

    fn place(&mut self, parent: CellId, child: CellId, at: Point) -> NodeId {
        self.graph
            .create_node(parent, NodeInst::new(child, at))
            .unwrap()
    }

    /// `Q` holds resistors `p1` at the origin and `p2` at (4, 0), joined by arc `W`,
    /// with `p1.a` exported as `E`.
    fn two_resistors(&mut self, lib: LibraryId, name: &str) -> CellId {
        let q = self.cell(lib, name, View::Schematic);
        let p1 = self
            .graph
            .create_node(q, NodeInst::new(self.res, Point::zero()).with_name("p1"))
            .unwrap();
        let p2 = self
            .graph
            .create_node(
                q,
                NodeInst::new(self.res, Point::new(4., 0.)).with_name("p2"),
            )
            .unwrap();
        self.graph
            .create_arc(
                q,
                ArcInst::new(
                    "metal1",
                    1.,
                    ArcEnd::new(PortInst::new(p1, "b"), Point::new(1., 0.)),
                    ArcEnd::new(PortInst::new(p2, "a"), Point::new(3., 0.)),
                )
                .with_name("W")
                .with_props(ArcProps {
                    rigid: true,
                    ..Default::default()
                }),
            )
            .unwrap();
        self.graph
            .create_export(q, "E", PortInst::new(p1, "a"), Characteristic::Input)
            .unwrap();
        q
    }

    fn names_in(&self, lib: LibraryId) -> Vec<String> {
        self.graph
            .library_cells(lib)
            .map(|(_, c)| c.full_name().to_string())
            .collect()
    }
}

fn has_cause(issues: &diagnostics::IssueSet<Issue>, f: impl Fn(&Cause) -> bool) -> bool {
    issues.iter().any(|issue| f(issue.cause()))
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Progress for Recorder {
    fn start(&mut self, label: &str) {
        self.events.push(format!("start {label}"));
    }
    fn update(&mut self, percent: u32) {
        self.events.push(format!("{percent}%"));
    }
    fn stop(&mut self) {
        self.events.push("stop".to_string());
    }
}

#[test]
fn replicate_schematic_with_icon_and_subcell() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let b = f.leaf(l1, "B");
    let a = f.cell(l1, "A", View::Schematic);
    let xb = f.place(a, b, Point::new(5., 0.));
    let a_icon = f.icon(l1, "A");

    let options = ReplicateOptions {
        move_cells: false,
        copy_sub_cells: true,
        use_existing: true,
        all_related_views: true,
        verbose: true,
    };
    let outcome = replicate(&mut f.graph, &[a], l2, &options, &mut LogProgress::default());

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.mapper.len(), 3);
    let a2 = outcome.mapper.get(a).unwrap();
    let b2 = outcome.mapper.get(b).unwrap();
    let icon2 = outcome.mapper.get(a_icon).unwrap();
    assert_eq!(outcome.last, Some(a2));

    let mut names = f.names_in(l2);
    names.sort();
    assert_eq!(names, vec!["A;1{ic}", "A;1{sch}", "B;1{sch}"]);
    assert_eq!(f.graph.cell(a2).node(xb).proto, NodeProto::Cell(b2));
    assert_eq!(f.graph.cell(a2).group(), f.graph.cell(icon2).group());
    assert!(f.graph.is_icon_of(icon2, a2));

    // The originals are untouched by a copy.
    assert_eq!(f.graph.cell(a).node(xb).proto, NodeProto::Cell(b));
    assert_eq!(f.graph.cell(a).library(), l1);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn icon_of_parent_is_copied_before_its_schematic() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let b = f.leaf(l1, "B");
    let a = f.cell(l1, "A", View::Schematic);
    let xb = f.place(a, b, Point::zero());
    let a_icon = f.icon(l1, "A");
    let xi = f.place(a, a_icon, Point::new(20., 0.));

    let options = ReplicateOptions {
        copy_sub_cells: false,
        use_existing: false,
        all_related_views: false,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[a], l2, &options, &mut NoProgress);

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.mapper.len(), 2);
    let a2 = outcome.mapper.get(a).unwrap();
    let icon2 = outcome.mapper.get(a_icon).unwrap();
    assert_eq!(f.graph.cell(a2).node(xi).proto, NodeProto::Cell(icon2));
    // Without copying subcells, other references stay cross-library.
    assert_eq!(f.graph.cell(a2).node(xb).proto, NodeProto::Cell(b));
}

#[test]
fn replicating_an_icon_brings_its_schematic() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let a = f.cell(l1, "A", View::Schematic);
    let a_icon = f.icon(l1, "A");
    let xi = f.place(a, a_icon, Point::zero());

    let options = ReplicateOptions {
        all_related_views: false,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[a_icon], l2, &options, &mut NoProgress);

    assert!(!outcome.issues.has_error());
    let icon2 = outcome.mapper.get(a_icon).unwrap();
    let a2 = outcome.mapper.get(a).unwrap();
    assert_eq!(outcome.last, Some(icon2));
    assert_eq!(f.graph.cell(a2).node(xi).proto, NodeProto::Cell(icon2));
    assert_eq!(f.graph.library_cells(l2).count(), 2);
}

#[test]
fn shared_dependency_is_copied_once() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let d = f.leaf(l1, "D");
    let c1 = f.cell(l1, "C1", View::Schematic);
    let x1 = f.place(c1, d, Point::zero());
    let c2 = f.cell(l1, "C2", View::Schematic);
    let x2 = f.place(c2, d, Point::zero());

    let outcome = replicate(
        &mut f.graph,
        &[c1, c2],
        l2,
        &ReplicateOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.mapper.len(), 3);
    let copies = f
        .graph
        .library_cells(l2)
        .filter(|(_, c)| c.name() == "D")
        .count();
    assert_eq!(copies, 1);
    let d2 = outcome.mapper.get(d).unwrap();
    let c1_copy = outcome.mapper.get(c1).unwrap();
    let c2_copy = outcome.mapper.get(c2).unwrap();
    assert_eq!(f.graph.cell(c1_copy).node(x1).proto, NodeProto::Cell(d2));
    assert_eq!(f.graph.cell(c2_copy).node(x2).proto, NodeProto::Cell(d2));
}

#[test]
fn destination_stays_acyclic() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let leaf = f.leaf(l1, "leaf");
    let left = f.cell(l1, "left", View::Schematic);
    f.place(left, leaf, Point::zero());
    let right = f.cell(l1, "right", View::Schematic);
    f.place(right, leaf, Point::zero());
    let top = f.cell(l1, "top", View::Schematic);
    f.place(top, left, Point::zero());
    f.place(top, right, Point::new(10., 0.));
    f.place(top, leaf, Point::new(20., 0.));

    let outcome = replicate(
        &mut f.graph,
        &[top],
        l2,
        &ReplicateOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.mapper.len(), 4);
    assert!(f.graph.topological_order().is_ok());
    for (id, cell) in f.graph.library_cells(l2) {
        for child in f.graph.children(id) {
            assert_eq!(f.graph.cell(child).library(), l2, "{} escapes", cell.name());
            assert!(!f.graph.depends_on(child, id));
        }
    }
    assert!(!f.graph.validate().has_error());
}

#[test]
fn same_names_from_different_libraries_stay_distinct() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let l3 = f.lib("L3");
    let x1 = f.leaf(l1, "X");
    let x3 = f.leaf(l3, "x");

    let outcome = replicate(
        &mut f.graph,
        &[x1, x3],
        l2,
        &ReplicateOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    let n1 = f.graph.cell(outcome.mapper.get(x1).unwrap()).name().clone();
    let n3 = f.graph.cell(outcome.mapper.get(x3).unwrap()).name().clone();
    assert_eq!(n1, "X");
    assert_eq!(n3, "x_1");
    assert!(!n1.eq_ignore_ascii_case(&n3));
}

#[test]
fn disambiguator_is_stable_per_origin() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l3 = f.lib("L3");
    let mut names = Disambiguator::default();
    assert_eq!(names.base_name("inv", l1), "inv");
    assert_eq!(names.base_name("INV", l3), "INV_1");
    assert_eq!(names.base_name("inv", l1), "inv");
    assert_eq!(names.base_name("Inv", l3), "INV_1");

    let mut names = Disambiguator::new(NamingPolicy {
        separator: "-".into(),
        direction: SuffixDirection::FromLeft,
    });
    assert_eq!(names.base_name("a1b2", l1), "a1b2");
    assert_eq!(names.base_name("a1b2", l3), "a2b2");
    assert_eq!(names.base_name("nand", l1), "nand");
    assert_eq!(names.base_name("nand", l3), "nand-1");
}

#[test]
fn move_repoints_every_instance() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let l3 = f.lib("L3");
    let d = f.leaf(l1, "D");
    let p1 = f.cell(l1, "P1", View::Schematic);
    f.place(p1, d, Point::zero());
    f.place(p1, d, Point::new(10., 0.));
    let p3 = f.cell(l3, "P3", View::Schematic);
    f.place(p3, d, Point::zero());
    let before = f.graph.instances_of(d).len();

    let options = ReplicateOptions {
        move_cells: true,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[d], l2, &options, &mut NoProgress);

    assert!(!outcome.issues.has_error());
    assert!(!outcome.issues.has_warning());
    let d2 = outcome.mapper.get(d).unwrap();
    assert!(!f.graph.contains_cell(d));
    assert_eq!(f.graph.cell(d2).library(), l2);
    assert_eq!(f.graph.instances_of(d2).len(), before);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn move_repoints_more_instances_than_retry_limit() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let d = f.leaf(l1, "D");
    let p1 = f.cell(l1, "P1", View::Schematic);
    let count = replicate::DEFAULT_MOVE_RETRY_LIMIT + 1;
    for i in 0..count {
        f.place(p1, d, Point::new(10. * i as f64, 0.));
    }

    let options = ReplicateOptions {
        move_cells: true,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[d], l2, &options, &mut NoProgress);

    assert!(!outcome.issues.has_warning());
    let d2 = outcome.mapper.get(d).unwrap();
    assert!(!f.graph.contains_cell(d));
    assert_eq!(f.graph.instances_of(d2).len(), count);
}

#[test]
fn move_into_cycle_is_rejected() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let s = f.leaf(l1, "S");
    let r = f.cell(l1, "R", View::Schematic);
    f.place(r, s, Point::zero());
    // The destination's `S` already instances `R`.
    let s_dest = f.cell(l2, "S", View::Schematic);
    f.place(s_dest, r, Point::zero());
    let cells_before = f.graph.cells().count();

    let options = ReplicateOptions {
        move_cells: true,
        use_existing: true,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[r], l2, &options, &mut NoProgress);

    assert_eq!(outcome.last, None);
    assert!(outcome.mapper.is_empty());
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::PolicyViolation { .. }
    )));
    assert_eq!(f.graph.cells().count(), cells_before);
    assert_eq!(f.graph.cell(r).library(), l1);
}

#[test]
fn root_already_in_destination() {
    let mut f = Fixture::new();
    let l2 = f.lib("L2");
    let a = f.leaf(l2, "A");

    let outcome = replicate(
        &mut f.graph,
        &[a],
        l2,
        &ReplicateOptions::default(),
        &mut NoProgress,
    );
    let copy = outcome.mapper.get(a).unwrap();
    assert_ne!(copy, a);
    assert_eq!(f.graph.cell(copy).version(), 2);
    assert_eq!(f.graph.cell(copy).name(), "A");
    assert_eq!(f.graph.cell(copy).group(), f.graph.cell(a).group());

    let options = ReplicateOptions {
        move_cells: true,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[a], l2, &options, &mut NoProgress);
    assert_eq!(outcome.last, Some(a));
    assert!(outcome.mapper.is_empty());
    assert!(!outcome.issues.has_warning());
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::AlreadyInLibrary { .. }
    )));
}

#[test]
fn subcells_without_existing_warns() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let a = f.leaf(l1, "A");
    let options = ReplicateOptions {
        copy_sub_cells: true,
        use_existing: false,
        ..Default::default()
    };
    let outcome = replicate(&mut f.graph, &[a], l2, &options, &mut NoProgress);
    assert!(outcome.last.is_some());
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::SubCellsWithoutExisting
    )));
}

#[test]
fn replicate_reports_progress() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let a = f.leaf(l1, "A");
    let b = f.leaf(l1, "B");
    let mut progress = Recorder::default();
    replicate(
        &mut f.graph,
        &[a, b],
        l2,
        &ReplicateOptions::default(),
        &mut progress,
    );
    assert_eq!(
        progress.events,
        vec!["start Copying cells", "0%", "50%", "stop"]
    );
}

/// Places three instances of `d` in a new schematic of `lib`, with an arc to port `b`
/// of the one at `bad`.
fn parent_with_wired_instance(
    f: &mut Fixture,
    lib: LibraryId,
    name: &str,
    d: CellId,
    bad: usize,
) -> CellId {
    let parent = f.cell(lib, name, View::Schematic);
    let pin = f.graph.technology().pin();
    for i in 0..3 {
        let x = 10. * i as f64;
        let inst = f.place(parent, d, Point::new(x, 0.));
        if i == bad {
            let pn = f
                .graph
                .create_node(parent, NodeInst::new(pin, Point::new(x + 5., 0.)))
                .unwrap();
            f.graph
                .create_arc(
                    parent,
                    ArcInst::new(
                        "metal1",
                        1.,
                        ArcEnd::new(PortInst::new(inst, "b"), Point::new(x + 1., 0.)),
                        ArcEnd::new(PortInst::new(pn, "p"), Point::new(x + 5., 0.)),
                    ),
                )
                .unwrap();
        }
    }
    parent
}

/// A schematic exporting only `a`.
fn half_leaf(f: &mut Fixture, lib: LibraryId, name: &str) -> CellId {
    let cell = f.cell(lib, name, View::Schematic);
    let r = f
        .graph
        .create_node(cell, NodeInst::new(f.res, Point::zero()).with_name("r0"))
        .unwrap();
    f.graph
        .create_export(cell, "a", PortInst::new(r, "a"), Characteristic::Input)
        .unwrap();
    cell
}

#[test]
fn replace_instances_skips_incompatible_ones() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let d = f.leaf(lib, "D");
    let d2 = half_leaf(&mut f, lib, "D2");
    let p1 = parent_with_wired_instance(&mut f, lib, "P1", d, 1);

    let outcome = replace_instances(&mut f.graph, d, d2, replicate::DEFAULT_MOVE_RETRY_LIMIT);

    assert_eq!(outcome.replaced, 2);
    assert_eq!(outcome.remaining, 1);
    assert_eq!(outcome.issues.num_warnings(), 1);
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::ReplaceFailed { .. }
    )));
    assert!(!has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::RetryLimit { .. }
    )));
    let left = f.graph.instances_of(d);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].0, p1);
    assert_eq!(f.graph.instances_of(d2).len(), 2);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn replace_instances_stops_a_cell_at_the_retry_limit() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let d = f.leaf(lib, "D");
    let d2 = half_leaf(&mut f, lib, "D2");
    let p1 = parent_with_wired_instance(&mut f, lib, "P1", d, 0);
    let p2 = f.cell(lib, "P2", View::Schematic);
    f.place(p2, d, Point::zero());

    let outcome = replace_instances(&mut f.graph, d, d2, 1);

    // `P1` is abandoned after its first failure; `P2` is still handled.
    assert_eq!(outcome.replaced, 1);
    assert_eq!(outcome.remaining, 3);
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::RetryLimit { limit: 1, .. }
    )));
    assert!(f.graph.instances_of(d).iter().all(|(parent, _)| *parent == p1));
    let moved = f.graph.instances_of(d2);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].0, p2);
}

#[test]
fn failed_root_stops_replication() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let l3 = f.lib("L3");
    let a = f.leaf(l1, "A");
    let x1 = f.leaf(l1, "X");
    let x3 = f.leaf(l3, "X");
    let b = f.leaf(l1, "B");

    // The second `X` would be renamed `X;1`, which is not a valid cell name.
    let outcome = Replicator::new(&mut f.graph, l2, ReplicateOptions::default())
        .with_naming(NamingPolicy {
            separator: ";".into(),
            direction: SuffixDirection::FromRight,
        })
        .run(&[a, x1, x3, b], &mut NoProgress);

    assert_eq!(outcome.last, None);
    assert!(outcome.issues.has_error());
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::ReplicationFailed { .. }
    )));
    // Roots finished before the failure stay replicated; later roots are not started.
    assert_eq!(outcome.mapper.len(), 2);
    assert!(outcome.mapper.contains(a));
    assert!(outcome.mapper.contains(x1));
    assert!(!outcome.mapper.contains(b));
    let mut names = f.names_in(l2);
    names.sort();
    assert_eq!(names, vec!["A;1{sch}", "X;1{sch}"]);
}

#[test]
fn id_mapper_resolves_chains() {
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let a = f.leaf(l1, "A");
    let b = f.leaf(l1, "B");
    let c = f.leaf(l1, "C");
    let mut mapper = IdMapper::new();
    mapper.put(a, b);
    mapper.put(b, c);
    assert_eq!(mapper.get(a), Some(b));
    assert_eq!(mapper.resolve(a), c);
    assert_eq!(mapper.resolve(c), c);
    assert_eq!(mapper.iter().collect::<Vec<_>>(), vec![(a, b), (b, c)]);
}

#[test]
fn flatten_one_level_with_exports() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let p = f.cell(lib, "P", View::Schematic);
    let inst = f
        .graph
        .create_node(
            p,
            NodeInst::new(q, Point::new(10., 5.))
                .with_orientation(NamedOrientation::R90)
                .with_name("I"),
        )
        .unwrap();

    let options = FlattenOptions {
        depth: Depth::Levels(1),
        copy_exports: true,
        naming: NamingPolicy::default(),
    };
    let outcome = flatten(&mut f.graph, p, &[inst], &options, &mut NoProgress);

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.flattened, vec![inst]);
    assert_eq!(outcome.promoted, 2);

    let cell = f.graph.cell(p);
    assert!(cell.try_node(inst).is_none());
    let p1 = cell.node_named("p1").unwrap();
    let p2 = cell.node_named("p2").unwrap();
    assert_abs_diff_eq!(cell.node(p1).center, Point::new(10., 5.));
    assert_abs_diff_eq!(cell.node(p2).center, Point::new(10., 9.));
    assert_abs_diff_eq!(cell.node(p2).orientation, Orientation::rotated(90.));

    assert_eq!(cell.num_arcs(), 1);
    let (_, w) = cell.arcs().next().unwrap();
    assert_eq!(w.name.as_deref(), Some("W"));
    assert!(w.props.rigid);
    assert_eq!(w.head().port, PortInst::new(p1, "b"));
    assert_eq!(w.tail().port, PortInst::new(p2, "a"));
    assert_abs_diff_eq!(w.head().location, Point::new(10., 6.));
    assert_abs_diff_eq!(w.tail().location, Point::new(10., 8.));

    let (_, e) = cell.export_named("E").unwrap();
    assert_eq!(e.port(), &PortInst::new(p1, "a"));
    assert_eq!(e.characteristic(), Characteristic::Input);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn flatten_keeps_crossing_connections() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let p = f.cell(lib, "P", View::Schematic);
    let inst = f.place(p, q, Point::new(20., 0.));
    let pin = f.graph.technology().pin();
    let pn = f
        .graph
        .create_node(p, NodeInst::new(pin, Point::new(30., 0.)))
        .unwrap();
    f.graph
        .create_arc(
            p,
            ArcInst::new(
                "metal1",
                1.,
                ArcEnd::new(PortInst::new(pn, "p"), Point::new(30., 0.)),
                ArcEnd::new(PortInst::new(inst, "E"), Point::new(19., 0.)),
            ),
        )
        .unwrap();
    f.graph
        .create_export(p, "OUT", PortInst::new(inst, "E"), Characteristic::Output)
        .unwrap();

    // A parent of `P` connects to `OUT`.
    let g = f.cell(lib, "G", View::Schematic);
    let gp = f.place(g, p, Point::zero());
    let gpin = f
        .graph
        .create_node(g, NodeInst::new(pin, Point::new(50., 0.)))
        .unwrap();
    f.graph
        .create_arc(
            g,
            ArcInst::new(
                "metal1",
                1.,
                ArcEnd::new(PortInst::new(gp, "OUT"), Point::new(19., 0.)),
                ArcEnd::new(PortInst::new(gpin, "p"), Point::new(50., 0.)),
            ),
        )
        .unwrap();

    let outcome = flatten(
        &mut f.graph,
        p,
        &[inst],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    assert!(!outcome.issues.has_warning());
    let cell = f.graph.cell(p);
    let p1 = cell.node_named("p1").unwrap();
    assert_eq!(cell.num_arcs(), 2);
    assert!(cell.arcs().any(|(_, arc)| {
        arc.head().port == PortInst::new(pn, "p") && arc.tail().port == PortInst::new(p1, "a")
    }));
    // `OUT` was moved, so `E` is not exported a second time.
    assert_eq!(cell.exports().count(), 1);
    assert_eq!(cell.export_named("OUT").unwrap().1.port(), &PortInst::new(p1, "a"));
    assert_eq!(f.graph.cell(g).num_arcs(), 1);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn flatten_connected_instances() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let p = f.cell(lib, "P", View::Schematic);
    let i1 = f.place(p, q, Point::zero());
    let i2 = f.place(p, q, Point::new(0., 10.));
    f.graph
        .create_arc(
            p,
            ArcInst::new(
                "metal1",
                1.,
                ArcEnd::new(PortInst::new(i1, "E"), Point::new(-1., 0.)),
                ArcEnd::new(PortInst::new(i2, "E"), Point::new(-1., 10.)),
            ),
        )
        .unwrap();

    let options = FlattenOptions {
        copy_exports: false,
        ..Default::default()
    };
    let outcome = flatten(&mut f.graph, p, &[i1, i2], &options, &mut NoProgress);

    assert_eq!(outcome.flattened, vec![i1, i2]);
    assert_eq!(outcome.promoted, 4);
    let cell = f.graph.cell(p);
    assert_eq!(cell.num_nodes(), 4);
    assert_eq!(cell.num_arcs(), 3);
    assert_eq!(cell.exports().count(), 0);
    let names: Vec<_> = cell
        .nodes()
        .filter_map(|(_, n)| n.name().map(|n| n.to_string()))
        .collect();
    assert_eq!(names, vec!["p1", "p2", "p3", "p4"]);
    let crossing = cell
        .arcs()
        .find(|(_, arc)| arc.name.is_none())
        .map(|(_, arc)| arc.clone())
        .unwrap();
    for end in crossing.ends() {
        assert!(cell.try_node(end.port.node).is_some());
        assert_eq!(end.port.port, "a");
    }
    assert!(!f.graph.validate().has_error());
}

#[test]
fn flatten_all_levels_matches_expansion() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let q2 = f.cell(lib, "Q2", View::Schematic);
    let j = NodeInst::new(q, Point::new(2., 0.))
        .with_orientation(NamedOrientation::R180)
        .with_name("J");
    let j_trans = j.transformation();
    let j = f.graph.create_node(q2, j).unwrap();
    f.graph
        .create_export(q2, "E2", PortInst::new(j, "E"), Characteristic::Input)
        .unwrap();
    let p = f.cell(lib, "P", View::Schematic);
    let i = NodeInst::new(q2, Point::new(5., 5.)).with_orientation(NamedOrientation::FlipYx);
    let i_trans = i.transformation();
    let inst = f.graph.create_node(p, i).unwrap();

    let options = FlattenOptions {
        depth: Depth::All,
        ..Default::default()
    };
    let outcome = flatten(&mut f.graph, p, &[inst], &options, &mut NoProgress);

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.promoted, 2);
    assert!(outcome.expanded.is_empty());
    let full = Transformation::cascade(i_trans, j_trans);
    let cell = f.graph.cell(p);
    let p1 = cell.node_named("p1").unwrap();
    let p2 = cell.node_named("p2").unwrap();
    assert_abs_diff_eq!(cell.node(p1).center, full.apply(Point::zero()));
    assert_abs_diff_eq!(cell.node(p2).center, full.apply(Point::new(4., 0.)));
    assert_abs_diff_eq!(cell.node(p2).orientation, full.orientation());

    let (_, w) = cell.arcs().next().unwrap();
    assert_abs_diff_eq!(w.head().location, full.apply(Point::new(1., 0.)));
    assert_abs_diff_eq!(w.tail().location, full.apply(Point::new(3., 0.)));

    // `E2` resolves through `J` down to `p1.a`.
    assert_eq!(
        cell.export_named("E2").unwrap().1.port(),
        &PortInst::new(p1, "a")
    );
    assert!(!f.graph.validate().has_error());
}

#[test]
fn flatten_depth_limit_keeps_nested_instances() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let q2 = f.cell(lib, "Q2", View::Schematic);
    let mut j = NodeInst::new(q, Point::new(2., 0.))
        .with_orientation(NamedOrientation::R180)
        .with_name("J");
    j.state.expanded = true;
    f.graph.create_node(q2, j).unwrap();
    let p = f.cell(lib, "P", View::Schematic);
    let inst = f
        .graph
        .create_node(
            p,
            NodeInst::new(q2, Point::new(0., 3.)).with_orientation(NamedOrientation::R90),
        )
        .unwrap();

    let outcome = flatten(
        &mut f.graph,
        p,
        &[inst],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert_eq!(outcome.promoted, 1);
    let cell = f.graph.cell(p);
    let j2 = cell.node_named("J").unwrap();
    assert_eq!(outcome.expanded, vec![j2]);
    let node = cell.node(j2);
    assert_eq!(node.proto, NodeProto::Cell(q));
    assert!(node.state.expanded);
    assert_abs_diff_eq!(node.center, Point::new(0., 5.));
    assert_abs_diff_eq!(node.orientation, Orientation::rotated(270.));
}

#[test]
fn flatten_skips_markers() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let center = f.graph.technology().cell_center();
    let bounds = f.graph.technology().essential_bounds();
    let q = f.leaf(lib, "Q");
    f.graph
        .create_node(q, NodeInst::new(center, Point::zero()))
        .unwrap();
    f.graph
        .create_node(q, NodeInst::new(bounds, Point::new(5., 5.)))
        .unwrap();
    let p = f.cell(lib, "P", View::Schematic);
    let i1 = f.place(p, q, Point::zero());
    let i2 = f.place(p, q, Point::new(20., 0.));

    let outcome = flatten(
        &mut f.graph,
        p,
        &[i1, i2],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert_eq!(outcome.promoted, 3);
    let count = |proto: PrimitiveId| {
        f.graph
            .cell(p)
            .nodes()
            .filter(|(_, n)| n.proto == NodeProto::Primitive(proto))
            .count()
    };
    assert_eq!(count(center), 0);
    assert_eq!(count(bounds), 1);
    assert_eq!(count(f.res), 2);
}

#[test]
fn flatten_uniquifies_names() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let q = f.two_resistors(lib, "Q");
    let p = f.cell(lib, "P", View::Schematic);
    let pin = f.graph.technology().pin();
    let existing = f
        .graph
        .create_node(p, NodeInst::new(pin, Point::zero()).with_name("P1"))
        .unwrap();
    f.graph
        .create_export(p, "e", PortInst::new(existing, "p"), Characteristic::Unknown)
        .unwrap();
    let inst = f.place(p, q, Point::new(10., 0.));

    let outcome = flatten(
        &mut f.graph,
        p,
        &[inst],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    let cell = f.graph.cell(p);
    let mut names: Vec<_> = cell
        .nodes()
        .filter_map(|(_, n)| n.name().map(|n| n.to_string()))
        .collect();
    names.sort();
    assert_eq!(names, vec!["P1", "p2", "p3"]);
    assert!(cell.export_named("E_1").is_some());
}

#[test]
fn flatten_without_instances_warns() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let p = f.leaf(lib, "P");
    let r = f.graph.cell(p).node_named("r0").unwrap();

    let outcome = flatten(
        &mut f.graph,
        p,
        &[r],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert!(outcome.flattened.is_empty());
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::NothingToExtract
    )));
    assert_eq!(
        outcome.issues.iter().next().unwrap().to_string(),
        "must select cell instances to extract"
    );
    assert_eq!(f.graph.cell(p).num_nodes(), 1);
}

#[test]
fn flatten_drops_connections_to_skipped_bounds() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let bounds = f.graph.technology().essential_bounds();
    let pin = f.graph.technology().pin();
    let q = f.leaf(lib, "Q");
    let r0 = f.graph.cell(q).node_named("r0").unwrap();
    let eb = f
        .graph
        .create_node(q, NodeInst::new(bounds, Point::new(5., 0.)))
        .unwrap();
    f.graph
        .create_arc(
            q,
            ArcInst::new(
                "metal1",
                1.,
                ArcEnd::new(PortInst::new(r0, "b"), Point::new(1., 0.)),
                ArcEnd::new(PortInst::new(eb, "p"), Point::new(5., 0.)),
            ),
        )
        .unwrap();
    f.graph
        .create_export(q, "EB", PortInst::new(eb, "p"), Characteristic::Unknown)
        .unwrap();

    // `P` already has bounds, so those of `Q` are not promoted.
    let p = f.cell(lib, "P", View::Schematic);
    f.graph
        .create_node(p, NodeInst::new(bounds, Point::new(-5., 0.)))
        .unwrap();
    let inst = f.place(p, q, Point::new(20., 0.));
    let pn = f
        .graph
        .create_node(p, NodeInst::new(pin, Point::new(40., 0.)))
        .unwrap();
    f.graph
        .create_arc(
            p,
            ArcInst::new(
                "metal1",
                1.,
                ArcEnd::new(PortInst::new(pn, "p"), Point::new(40., 0.)),
                ArcEnd::new(PortInst::new(inst, "EB"), Point::new(25., 0.)),
            ),
        )
        .unwrap();
    f.graph
        .create_export(p, "OUT", PortInst::new(inst, "EB"), Characteristic::Output)
        .unwrap();

    let outcome = flatten(
        &mut f.graph,
        p,
        &[inst],
        &FlattenOptions::default(),
        &mut NoProgress,
    );

    assert!(!outcome.issues.has_error());
    assert_eq!(outcome.flattened, vec![inst]);
    let dropped = outcome
        .issues
        .iter()
        .filter(|issue| matches!(issue.cause(), Cause::ArcDropped { .. }))
        .count();
    // The arc inside `Q` and the arc in `P` that reached it.
    assert_eq!(dropped, 2);
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::ExportDeleted { export } if export.as_str() == "OUT"
    )));
    let cell = f.graph.cell(p);
    assert_eq!(cell.num_arcs(), 0);
    assert!(cell.export_named("OUT").is_none());
    let count = cell
        .nodes()
        .filter(|(_, n)| n.proto == NodeProto::Primitive(bounds))
        .count();
    assert_eq!(count, 1);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn failed_instance_is_rolled_back() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let pin = f.graph.technology().pin();
    let q = f.cell(lib, "Q", View::Schematic);
    for (name, x) in [("p1", 0.), ("out", 4.)] {
        f.graph
            .create_node(q, NodeInst::new(f.res, Point::new(x, 0.)).with_name(name))
            .unwrap();
    }
    let l = f.leaf(lib, "L");
    let p = f.cell(lib, "P", View::Schematic);
    f.graph
        .create_node(p, NodeInst::new(pin, Point::zero()).with_name("out"))
        .unwrap();
    let i1 = f.place(p, q, Point::new(10., 0.));
    let i2 = f.place(p, l, Point::new(20., 0.));

    // The promoted `out` would be renamed `out;1`, which is not a valid node name.
    let options = FlattenOptions {
        naming: NamingPolicy {
            separator: ";".into(),
            direction: SuffixDirection::FromRight,
        },
        ..Default::default()
    };
    let outcome = flatten(&mut f.graph, p, &[i1, i2], &options, &mut NoProgress);

    assert_eq!(outcome.flattened, vec![i2]);
    assert_eq!(outcome.promoted, 1);
    assert!(has_cause(&outcome.issues, |c| matches!(
        c,
        Cause::ExtractFailed { node, .. } if *node == i1
    )));
    let cell = f.graph.cell(p);
    assert_eq!(cell.node(i1).proto, NodeProto::Cell(q));
    assert!(cell.node_named("p1").is_none());
    assert!(cell.node_named("r0").is_some());
    assert!(cell.try_node(i2).is_none());
    assert_eq!(cell.num_nodes(), 3);
    assert!(!f.graph.validate().has_error());
}

#[test]
fn parse_full_config() {
    let config = EditConfig::from_toml_str(
        r#"
        move_retry_limit = 50

        [replicate]
        move_cells = true
        copy_sub_cells = false
        use_existing = false
        all_related_views = false
        verbose = true

        [flatten]
        depth = 3
        copy_exports = false

        [flatten.naming]
        separator = "-"
        direction = "from-left"
        "#,
    )
    .unwrap();

    assert_eq!(config.move_retry_limit, 50);
    assert_eq!(
        config.replicate,
        ReplicateOptions {
            move_cells: true,
            copy_sub_cells: false,
            use_existing: false,
            all_related_views: false,
            verbose: true,
        }
    );
    assert_eq!(config.flatten.depth, Depth::Levels(3));
    assert!(!config.flatten.copy_exports);
    assert_eq!(config.flatten.naming.separator, "-");
    assert_eq!(config.flatten.naming.direction, SuffixDirection::FromLeft);
}

#[test]
fn partial_config_uses_defaults() {
    let config = EditConfig::from_toml_str("[flatten]\ndepth = \"all\"\n").unwrap();
    assert_eq!(config.flatten.depth, Depth::All);
    assert!(config.flatten.copy_exports);
    assert_eq!(config.move_retry_limit, 1000);
    assert_eq!(config.replicate, ReplicateOptions::default());
    assert_eq!(EditConfig::from_toml_str("").unwrap(), EditConfig::default());

    assert!(matches!(
        EditConfig::from_toml_str("[flatten]\ndepth = 0\n"),
        Err(Error::Config(_))
    ));
    assert!(EditConfig::from_toml_str("[flatten]\ndepth = \"some\"\n").is_err());
}

#[test]
fn load_config_from_file() {
    let dir = std::env::temp_dir().join(format!("celledit-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("edit.toml");
    std::fs::write(&path, "move_retry_limit = 7\n").unwrap();
    assert_eq!(EditConfig::load(&path).unwrap().move_retry_limit, 7);

    let missing = dir.join("missing.toml");
    let err = EditConfig::load(&missing).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn replicator_takes_retry_limit_from_config() {
    let config = EditConfig::from_toml_str(
        r#"
        move_retry_limit = 5

        [replicate]
        move_cells = true
        "#,
    )
    .unwrap();
    let mut f = Fixture::new();
    let l1 = f.lib("L1");
    let l2 = f.lib("L2");
    let d = f.leaf(l1, "D");
    let p1 = f.cell(l1, "P1", View::Schematic);
    f.place(p1, d, Point::zero());

    let replicator = Replicator::from_config(&mut f.graph, l2, &config);
    assert_eq!(replicator.retry_limit(), 5);
    let outcome = replicator.run(&[d], &mut NoProgress);

    assert!(!outcome.issues.has_warning());
    let d2 = outcome.mapper.get(d).unwrap();
    assert!(!f.graph.contains_cell(d));
    assert_eq!(f.graph.instances_of(d2).len(), 1);
}

#[test]
fn new_version_leaves_instances_alone() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let a = f.leaf(lib, "A");
    let p = f.cell(lib, "P", View::Schematic);
    let xa = f.place(p, a, Point::zero());

    let a2 = new_version(&mut f.graph, a).unwrap();

    let cell = f.graph.cell(a2);
    assert_eq!(cell.name(), "A");
    assert_eq!(cell.version(), 2);
    assert_eq!(cell.library(), lib);
    assert_eq!(cell.group(), f.graph.cell(a).group());
    assert_eq!(cell.num_nodes(), 1);
    assert_eq!(f.graph.find_cell(lib, "a", None, View::Schematic), Some(a2));
    assert_eq!(f.graph.cell(p).node(xa).proto, NodeProto::Cell(a));

    let a3 = new_version(&mut f.graph, a).unwrap();
    assert_eq!(f.graph.cell(a3).version(), 3);
}

#[test]
fn duplicate_brings_icon_along() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let b = f.leaf(lib, "B");
    let s = f.cell(lib, "S", View::Schematic);
    let xb = f.place(s, b, Point::zero());
    let s_icon = f.icon(lib, "S");
    let xi = f.place(s, s_icon, Point::new(20., 0.));
    let s_lay = f.cell(lib, "S", View::Layout);

    let mapper = duplicate(&mut f.graph, s, "T", false).unwrap();

    assert_eq!(mapper.len(), 2);
    assert!(!mapper.contains(s_lay));
    let t = mapper.get(s).unwrap();
    let t_icon = mapper.get(s_icon).unwrap();
    assert_eq!(f.graph.cell(t).full_name().to_string(), "T;1{sch}");
    assert_eq!(f.graph.cell(t_icon).full_name().to_string(), "T;1{ic}");
    assert!(f.graph.is_icon_of(t_icon, t));
    assert_ne!(f.graph.cell(t).group(), f.graph.cell(s).group());
    assert_eq!(f.graph.cell(t).node(xi).proto, NodeProto::Cell(t_icon));
    assert_eq!(f.graph.cell(t).node(xb).proto, NodeProto::Cell(b));
    // The original still uses its own icon.
    assert_eq!(f.graph.cell(s).node(xi).proto, NodeProto::Cell(s_icon));

    let mapper = duplicate(&mut f.graph, s, "U", true).unwrap();
    assert_eq!(mapper.len(), 3);
    let u_lay = mapper.get(s_lay).unwrap();
    assert_eq!(f.graph.cell(u_lay).full_name().to_string(), "U;1{lay}");
    assert!(!f.graph.validate().has_error());
}

#[test]
fn duplicate_rejects_invalid_names() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let a = f.leaf(lib, "A");
    let cells = f.graph.cells().count();
    assert!(matches!(
        duplicate(&mut f.graph, a, "bad;name", false),
        Err(Error::Graph(GraphError::InvalidName(_)))
    ));
    assert_eq!(f.graph.cells().count(), cells);
}

#[test]
fn unused_old_versions_are_deleted() {
    let mut f = Fixture::new();
    let lib = f.lib("lib");
    let a1 = f.leaf(lib, "A");
    let p = f.cell(lib, "P", View::Schematic);
    f.place(p, a1, Point::zero());
    let a2 = new_version(&mut f.graph, a1).unwrap();
    let a3 = new_version(&mut f.graph, a1).unwrap();

    let deleted = delete_unused_old_versions(&mut f.graph, lib).unwrap();
    assert_eq!(deleted, vec![arcstr::literal!("lib:A;2{sch}")]);
    assert!(!f.graph.contains_cell(a2));
    assert!(f.graph.contains_cell(a1));
    assert!(f.graph.contains_cell(a3));

    let outcome = replace_instances(&mut f.graph, a1, a3, 1);
    assert_eq!(outcome.replaced, 1);
    assert_eq!(outcome.remaining, 0);
    let deleted = delete_unused_old_versions(&mut f.graph, lib).unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(!f.graph.contains_cell(a1));
    assert!(delete_unused_old_versions(&mut f.graph, lib)
        .unwrap()
        .is_empty());
    assert_eq!(f.graph.library_cells(lib).count(), 2);
}
