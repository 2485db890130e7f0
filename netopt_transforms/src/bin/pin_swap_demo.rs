//! Builds a gate with a late signal on its slow input and lets the
//! pin_swap transform repair the critical path.

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
        name: "AND2_X1".to_string(),
        class: CellClass::Gate,
        ports: vec![
            LibraryPort::input("A", 2.0e-15),
            LibraryPort {
                arc_intrinsic: 60.0e-12,
                ..LibraryPort::input("B", 2.0e-15)
            },
            LibraryPort::output("Y", None),
        ],
        timing: TimingModel {
            intrinsic: 30.0e-12,
            drive_resistance: 2.0e3,
        },
        area: 1.5,
        dont_use: false,
        function_class: Some("AND2".to_string()),
        commutative_groups: vec![vec!["A".to_string(), "B".to_string()]],
    })
    .unwrap();

    let buf_cell = nl.find_library_cell("BUF_X1").unwrap();
    let and_cell = nl.find_library_cell("AND2_X1").unwrap();

    let p_a = nl
        .create_port("a_in", PortDirection::Input, Point::new(0, 0))
        .unwrap();
    let p_b = nl
        .create_port("b_in", PortDirection::Input, Point::new(0, 2000))
        .unwrap();
    let p_out = nl
        .create_port("out", PortDirection::Output, Point::new(6000, 0))
        .unwrap();
    nl.set_port_capacitance(p_out, 5.0e-15);

    let n_early = nl.create_net("n_early").unwrap();
    let n_b = nl.create_net("n_b").unwrap();
    let n_late = nl.create_net("n_late").unwrap();
    let n_out = nl.create_net("n_out").unwrap();
    nl.attach_port(n_early, p_a).unwrap();
    nl.attach_port(n_b, p_b).unwrap();
    nl.attach_port(n_out, p_out).unwrap();

    let u_buf = nl.create_instance("u_buf", buf_cell).unwrap();
    nl.set_location(u_buf, Point::new(1000, 2000));
    nl.connect(n_b, u_buf, "A").unwrap();
    nl.connect(n_late, u_buf, "Y").unwrap();

    let u_and = nl.create_instance("u_and", and_cell).unwrap();
    nl.set_location(u_and, Point::new(3000, 0));
    nl.connect(n_late, u_and, "B").unwrap();
    nl.connect(n_early, u_and, "A").unwrap();
    nl.connect(n_out, u_and, "Y").unwrap();

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
    let u_and = db.netlist().find_instance("u_and").unwrap();
    let out_pin = db.output_pins(u_and)[0];
    let before = db.arrival(out_pin, 0, true).unwrap();

    let mut registry = TransformRegistry::with_standard_transforms();
    let swaps = registry.dispatch(&mut db, "pin_swap", &[]);

    let after = db.arrival(out_pin, 0, true).unwrap();
    println!("pin_swap committed {swaps} swaps");
    println!(
        "arrival at u_and/Y: {:.1} ps -> {:.1} ps",
        before * 1.0e12,
        after * 1.0e12
    );
}
