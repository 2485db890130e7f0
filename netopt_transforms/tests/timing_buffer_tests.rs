//! End-to-end scenarios for the timing_buffer transform.

mod common;

use common::*;
use netopt_db::PinId;
use netopt_transforms::{
    BufferConfig, BufferEngine, BufferSelection, ClusterGranularity, ClusterPolicy,
    CurationPolicy, InverterSelection, Transform, TimingBufferTransform, TransformError,
    TransformRegistry, WorkingLibrary, curate,
};
use rstest::rstest;

fn driver_output(db: &netopt_db::Database, instance: &str) -> PinId {
    let inst = db.netlist().find_instance(instance).unwrap();
    db.output_pins(inst)[0]
}

#[rstest]
#[case(3)]
#[case(4)]
#[case(6)]
fn test_fixes_capacitance_violation(#[case] sinks: usize) {
    let mut db = fan_design(sinks);
    let drv_y = driver_output(&db, "u_drv");
    assert!(db.violates_maximum_capacitance(drv_y));

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&[
                "-buffers",
                "BUF_X1",
                "BUF_X2",
                "BUF_X4",
                "BUF_X8",
                "-maximum_capacitance",
            ]),
        )
        .unwrap();

    assert!(count >= 1);
    assert!(transform.buffer_count >= 1);
    assert!(!db.violates_maximum_capacitance(drv_y));
}

#[test]
fn test_realization_preserves_connectivity() {
    let mut db = fan_design(4);
    let n_fan = db.netlist().find_net("n_fan").unwrap();
    let before = reachable_sinks(&db, n_fan);
    assert_eq!(before.len(), 4);

    let mut transform = TimingBufferTransform::new();
    transform
        .run(
            &mut db,
            &args(&["-buffers", "BUF_X1", "-maximum_capacitance"]),
        )
        .unwrap();

    // Inserted buffer chains are transparent: the same sinks remain
    // reachable from the driver's net.
    let after = reachable_sinks(&db, n_fan);
    assert_eq!(before, after);
}

#[test]
fn test_second_run_reaches_quiescence() {
    let mut db = fan_design(4);
    let mut transform = TimingBufferTransform::new();
    let arg_vec = args(&["-buffers", "BUF_X1", "BUF_X2", "-iterations", "4"]);
    let first = transform.run(&mut db, &arg_vec).unwrap();
    assert!(first >= 1);

    // Everything repairable was repaired: a fresh run mutates nothing.
    let mut again = TimingBufferTransform::new();
    let second = again.run(&mut db, &arg_vec).unwrap();
    assert_eq!(second, 0);
}

#[test]
fn test_no_buffers_is_a_no_op() {
    let mut db = fan_design(4);
    let drv_y = driver_output(&db, "u_drv");
    let names_before = instance_names(&db);

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&["-maximum_capacitance", "-maximum_transition"]),
        )
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(instance_names(&db), names_before);
    // The violation is untouched without a working set.
    assert!(db.violates_maximum_capacitance(drv_y));
}

#[test]
fn test_gate_resize_replaces_driver() {
    let mut db = fan_design(4);
    let drv_y = driver_output(&db, "u_drv");

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&[
                "-buffers",
                "BUF_X1",
                "-enable_gate_resize",
                "-area_penalty",
                "0",
                "-maximum_capacitance",
            ]),
        )
        .unwrap();

    assert!(count >= 2, "expected buffering plus a resize, got {count}");
    assert_eq!(transform.resize_count, 1);
    let inst = db.netlist().find_instance("u_drv").unwrap();
    assert_eq!(db.cell(db.library_cell(inst)).name, "DRV_X2");
    assert!(!db.violates_maximum_capacitance(drv_y));
}

#[test]
fn test_area_budget_stops_the_pass() {
    // Budget for one and a half BUF_X1: the second insertion crosses the
    // ceiling, the third net stays broken.
    let mut db = budget_design(3, Some(1.5));

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&["-buffers", "BUF_X1", "-maximum_capacitance"]),
        )
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(transform.buffer_count, 2);
    let still_violating = (0..3)
        .filter(|i| {
            let pin = driver_output(&db, &format!("u_drv{i}"));
            db.violates_maximum_capacitance(pin)
        })
        .count();
    assert_eq!(still_violating, 1);
}

#[test]
fn test_min_gain_rejects_weak_plans() {
    let mut db = fan_design(4);
    let drv_y = driver_output(&db, "u_drv");
    let names_before = instance_names(&db);

    // No buffering plan on this net gains a full second of slack, so
    // every costed candidate is rejected.
    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&[
                "-buffers",
                "BUF_X1",
                "-min_gain",
                "1.0",
                "-maximum_capacitance",
            ]),
        )
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(instance_names(&db), names_before);
    assert!(db.violates_maximum_capacitance(drv_y));
}

#[test]
fn test_clock_nets_are_skipped() {
    let mut db = clocked_fan_design(4);
    let drv_y = driver_output(&db, "u_drv");
    assert!(db.violates_maximum_capacitance(drv_y));

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&["-buffers", "BUF_X1", "-maximum_capacitance"]),
        )
        .unwrap();

    assert_eq!(count, 0);
    assert!(db.violates_maximum_capacitance(drv_y));
}

#[test]
fn test_auto_library_uses_cluster_query() {
    let db = fan_design(4);
    let policy = CurationPolicy {
        buffers: BufferSelection::Named(Default::default()),
        inverters: InverterSelection::None,
        cluster: Some(ClusterPolicy {
            granularity: ClusterGranularity::Small,
            minimize: false,
            use_inverting: false,
        }),
    };
    let library = curate(&db, &policy).unwrap();
    let (expected, expected_inverters) = db.buffer_clusters(0.75, false, false);
    assert_eq!(library.buffers, expected);
    assert!(expected_inverters.is_empty());
    assert!(library.inverters.is_empty());
}

#[test]
fn test_identical_runs_are_deterministic() {
    let arg_vec = args(&["-buffers", "BUF_X1", "BUF_X2", "-maximum_capacitance"]);

    let mut db_a = fan_design(4);
    let mut transform_a = TimingBufferTransform::new();
    let count_a = transform_a.run(&mut db_a, &arg_vec).unwrap();

    let mut db_b = fan_design(4);
    let mut transform_b = TimingBufferTransform::new();
    let count_b = transform_b.run(&mut db_b, &arg_vec).unwrap();

    assert_eq!(count_a, count_b);
    assert_eq!(transform_a.buffer_count, transform_b.buffer_count);
    assert_eq!(instance_names(&db_a), instance_names(&db_b));
}

#[test]
fn test_boundary_driver_is_refused() {
    let mut db = fan_design(1);
    // The first levelized driver is the boundary input port.
    let port = db.level_driver_pins()[0];
    assert!(db.is_top_level(port));

    let mut engine = BufferEngine::new(BufferConfig::default(), db.area());
    let err = engine
        .buffer_pin(&mut db, port, &WorkingLibrary::default())
        .unwrap_err();
    assert!(matches!(err, TransformError::Boundary(_)));
}

#[test]
fn test_unknown_cell_name_fails_dispatch() {
    let mut db = fan_design(4);
    let mut registry = TransformRegistry::with_standard_transforms();
    let exit = registry.dispatch(&mut db, "timing_buffer", &args(&["-buffers", "NOPE"]));
    assert_eq!(exit, -1);
}

#[test]
fn test_inverter_pairs_are_usable() {
    let mut db = fan_design(4);
    let drv_y = driver_output(&db, "u_drv");

    let mut transform = TimingBufferTransform::new();
    let count = transform
        .run(
            &mut db,
            &args(&[
                "-buffers",
                "BUF_X1",
                "-inverters",
                "INV_X1",
                "INV_X2",
                "-maximum_capacitance",
            ]),
        )
        .unwrap();

    assert!(count >= 1);
    assert!(!db.violates_maximum_capacitance(drv_y));
    // Whatever mix won, polarity-preserving realization keeps the sinks.
    let n_fan = db.netlist().find_net("n_fan").unwrap();
    assert_eq!(reachable_sinks(&db, n_fan).len(), 4);
}
