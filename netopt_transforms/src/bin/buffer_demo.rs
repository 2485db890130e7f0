//! Builds a small placed design with an overloaded driver and repairs it
//! with the timing_buffer transform.

use netopt_db::timing::ElmoreTimer;
use netopt_db::{
    CellClass, Database, DesignConstraints, LibraryCell, LibraryPort, Netlist, Point,
    PortDirection, TechParams, TimingModel,
};
use netopt_transforms::TransformRegistry;

fn demo_design() -> Database {
    let mut nl = Netlist::new(TechParams {
        dbu_per_micron: 1000.0,
        resistance_per_micron: 1.0e4,
        capacitance_per_micron: 1.0e-10,
    });
    nl.add_library_cell(LibraryCell {
        name: "BUF_X1".to_string(),
        class: CellClass::Buffer,
        ports: vec![
            LibraryPort::input("A", 2.0e-15),
            LibraryPort::output("Y", None),
        ],
        timing: TimingModel {
            intrinsic: 20.0e-12,
            drive_resistance: 1.0e3,
        },
        area: 1.0,
        dont_use: false,
        function_class: None,
        commutative_groups: vec![],
    })
    .unwrap();
    nl.add_library_cell(LibraryCell {
        name: "DRV_X1".to_string(),
        class: CellClass::Gate,
        ports: vec![
            LibraryPort::input("A", 2.0e-15),
            LibraryPort::output("Y", Some(10.0e-15)),
        ],
        timing: TimingModel {
            intrinsic: 50.0e-12,
            drive_resistance: 20.0e3,
        },
        area: 2.0,
        dont_use: false,
        function_class: None,
        commutative_groups: vec![],
    })
    .unwrap();
    nl.add_library_cell(LibraryCell {
        name: "SINK_X1".to_string(),
        class: CellClass::Gate,
        ports: vec![LibraryPort::input("A", 4.5e-15)],
        timing: TimingModel {
            intrinsic: 0.0,
            drive_resistance: 0.0,
        },
        area: 1.0,
        dont_use: false,
        function_class: None,
        commutative_groups: vec![],
    })
    .unwrap();

    let drv_cell = nl.find_library_cell("DRV_X1").unwrap();
    let sink_cell = nl.find_library_cell("SINK_X1").unwrap();
    let p_in = nl
        .create_port("in", PortDirection::Input, Point::new(0, 0))
        .unwrap();
    let n_in = nl.create_net("n_in").unwrap();
    nl.attach_port(n_in, p_in).unwrap();
    let u_drv = nl.create_instance("u_drv", drv_cell).unwrap();
    nl.connect(n_in, u_drv, "A").unwrap();
    let n_fan = nl.create_net("n_fan").unwrap();
    nl.connect(n_fan, u_drv, "Y").unwrap();
    for i in 0..4 {
        let u = nl
            .create_instance(&format!("u_sink{i}"), sink_cell)
            .unwrap();
        nl.set_location(u, Point::new(1000 + 2000 * i, 0));
        nl.connect(n_fan, u, "A").unwrap();
    }

    Database::new(
        nl,
        Box::new(ElmoreTimer::new(10.0e-9)),
        DesignConstraints::default(),
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut db = demo_design();
    let drv = db.netlist().find_instance("u_drv").unwrap();
    let drv_y = db.output_pins(drv)[0];
    println!(
        "before: load {:.1} fF, violating: {}",
        db.load_capacitance(drv_y) * 1.0e15,
        db.violates_maximum_capacitance(drv_y)
    );

    let mut registry = TransformRegistry::with_standard_transforms();
    let argv: Vec<String> = ["-buffers", "BUF_X1", "-maximum_capacitance"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mutations = registry.dispatch(&mut db, "timing_buffer", &argv);

    println!("timing_buffer committed {mutations} mutations");
    println!(
        "after: load {:.1} fF, violating: {}",
        db.load_capacitance(drv_y) * 1.0e15,
        db.violates_maximum_capacitance(drv_y)
    );
}
