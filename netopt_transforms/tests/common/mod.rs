//! Shared fixtures: a small standard-cell library and hand-placed
//! designs exercising the repair transforms.

#![allow(dead_code)]

use std::collections::BTreeSet;

use netopt_db::timing::ElmoreTimer;
use netopt_db::{
    CellClass, Database, DesignConstraints, LibraryCell, LibraryPort, NetId, Netlist, Point,
    PortDirection, TechParams, TimingModel,
};

pub const CLOCK_PERIOD: f64 = 10.0e-9;

pub fn tech() -> TechParams {
    TechParams {
        dbu_per_micron: 1000.0,
        resistance_per_micron: 1.0e4,
        capacitance_per_micron: 1.0e-10,
    }
}

fn repeater(
    name: &str,
    class: CellClass,
    input_cap: f64,
    drive: f64,
    intrinsic: f64,
    area: f64,
) -> LibraryCell {
    LibraryCell {
        name: name.to_string(),
        class,
        ports: vec![
            LibraryPort::input("A", input_cap),
            LibraryPort::output("Y", None),
        ],
        timing: TimingModel {
            intrinsic,
            drive_resistance: drive,
        },
        area,
        dont_use: false,
        function_class: None,
        commutative_groups: vec![],
    }
}

fn sink(name: &str, input_cap: f64) -> LibraryCell {
    LibraryCell {
        name: name.to_string(),
        class: CellClass::Gate,
        ports: vec![LibraryPort::input("A", input_cap)],
        timing: TimingModel {
            intrinsic: 0.0,
            drive_resistance: 0.0,
        },
        area: 1.0,
        dont_use: false,
        function_class: None,
        commutative_groups: vec![],
    }
}

fn driver(name: &str, max_cap: f64, drive: f64, area: f64) -> LibraryCell {
    LibraryCell {
        name: name.to_string(),
        class: CellClass::Gate,
        ports: vec![
            LibraryPort::input("A", 2.0e-15),
            LibraryPort::output("Y", Some(max_cap)),
        ],
        timing: TimingModel {
            intrinsic: 50.0e-12,
            drive_resistance: drive,
        },
        area,
        dont_use: false,
        function_class: Some("DRV".to_string()),
        commutative_groups: vec![],
    }
}

/// Registers the standard test library.
pub fn install_library(nl: &mut Netlist) {
    nl.add_library_cell(repeater(
        "BUF_X1",
        CellClass::Buffer,
        2.0e-15,
        1.0e3,
        20.0e-12,
        1.0,
    ))
    .unwrap();
    nl.add_library_cell(repeater(
        "BUF_X2",
        CellClass::Buffer,
        3.0e-15,
        0.5e3,
        18.0e-12,
        2.0,
    ))
    .unwrap();
    nl.add_library_cell(repeater(
        "BUF_X4",
        CellClass::Buffer,
        4.0e-15,
        0.25e3,
        16.0e-12,
        4.0,
    ))
    .unwrap();
    nl.add_library_cell(repeater(
        "BUF_X8",
        CellClass::Buffer,
        6.0e-15,
        0.125e3,
        15.0e-12,
        8.0,
    ))
    .unwrap();
    nl.add_library_cell(repeater(
        "INV_X1",
        CellClass::Inverter,
        1.5e-15,
        1.2e3,
        12.0e-12,
        0.6,
    ))
    .unwrap();
    nl.add_library_cell(repeater(
        "INV_X2",
        CellClass::Inverter,
        2.5e-15,
        0.6e3,
        11.0e-12,
        1.2,
    ))
    .unwrap();
    nl.add_library_cell(driver("DRV_X1", 10.0e-15, 20.0e3, 2.0)).unwrap();
    nl.add_library_cell(driver("DRV_X2", 20.0e-15, 10.0e3, 4.0)).unwrap();
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
    nl.add_library_cell(sink("SINK_X1", 4.5e-15)).unwrap();
    nl.add_library_cell(sink("SINK_BIG", 30.0e-15)).unwrap();
}

fn wrap(nl: Netlist, constraints: DesignConstraints) -> Database {
    Database::new(nl, Box::new(ElmoreTimer::new(CLOCK_PERIOD)), constraints)
}

/// A weak driver fanning out to `num_sinks` SINK_X1 loads; with four
/// sinks the 18 fF pin load violates the driver's 10 fF limit.
pub fn fan_design(num_sinks: usize) -> Database {
    let mut nl = Netlist::new(tech());
    install_library(&mut nl);
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

    for i in 0..num_sinks {
        let u = nl.create_instance(&format!("u_sink{i}"), sink_cell).unwrap();
        nl.set_location(u, Point::new(1000 + 2000 * i as i64, 2000 * (i as i64 % 2)));
        nl.connect(n_fan, u, "A").unwrap();
    }
    wrap(nl, DesignConstraints::default())
}

/// The fan design with the violating net marked as a clock net.
pub fn clocked_fan_design(num_sinks: usize) -> Database {
    let mut nl = Netlist::new(tech());
    install_library(&mut nl);
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
    for i in 0..num_sinks {
        let u = nl.create_instance(&format!("u_sink{i}"), sink_cell).unwrap();
        nl.set_location(u, Point::new(1000 + 2000 * i as i64, 0));
        nl.connect(n_fan, u, "A").unwrap();
    }
    nl.set_clock_net(n_fan, true);
    wrap(nl, DesignConstraints::default())
}

/// A violating design whose library holds no repeaters at all.
pub fn bufferless_design() -> Database {
    let mut nl = Netlist::new(tech());
    nl.add_library_cell(driver("DRV_X1", 10.0e-15, 20.0e3, 2.0)).unwrap();
    nl.add_library_cell(sink("SINK_BIG", 30.0e-15)).unwrap();
    let drv_cell = nl.find_library_cell("DRV_X1").unwrap();
    let sink_cell = nl.find_library_cell("SINK_BIG").unwrap();
    let u_drv = nl.create_instance("u_drv", drv_cell).unwrap();
    let n_load = nl.create_net("n_load").unwrap();
    nl.connect(n_load, u_drv, "Y").unwrap();
    let u_sink = nl.create_instance("u_sink", sink_cell).unwrap();
    nl.set_location(u_sink, Point::new(2000, 0));
    nl.connect(n_load, u_sink, "A").unwrap();
    wrap(nl, DesignConstraints::default())
}

/// `num_nets` independent chains, each a DRV_X1 driving one SINK_BIG
/// (30 fF, always violating). `extra_area` bounds the area budget above
/// the initial design area.
pub fn budget_design(num_nets: usize, extra_area: Option<f64>) -> Database {
    let mut nl = Netlist::new(tech());
    install_library(&mut nl);
    let drv_cell = nl.find_library_cell("DRV_X1").unwrap();
    let sink_cell = nl.find_library_cell("SINK_BIG").unwrap();

    for i in 0..num_nets {
        let p_in = nl
            .create_port(&format!("in{i}"), PortDirection::Input, Point::new(0, 4000 * i as i64))
            .unwrap();
        let n_in = nl.create_net(&format!("n_in{i}")).unwrap();
        nl.attach_port(n_in, p_in).unwrap();
        let u_drv = nl.create_instance(&format!("u_drv{i}"), drv_cell).unwrap();
        nl.set_location(u_drv, Point::new(1000, 4000 * i as i64));
        nl.connect(n_in, u_drv, "A").unwrap();
        let n_load = nl.create_net(&format!("n_load{i}")).unwrap();
        nl.connect(n_load, u_drv, "Y").unwrap();
        let u_sink = nl.create_instance(&format!("u_sink{i}"), sink_cell).unwrap();
        nl.set_location(u_sink, Point::new(3000, 4000 * i as i64));
        nl.connect(n_load, u_sink, "A").unwrap();
    }

    let constraints = DesignConstraints {
        maximum_area: extra_area.map(|extra| nl.total_area() + extra),
        ..DesignConstraints::default()
    };
    wrap(nl, constraints)
}

/// An AND2 with one late input. `late_on_slow` routes the late signal
/// through the slow B arc (a swap helps); otherwise it is already on the
/// fast A arc (a swap hurts and must be reverted).
pub fn swap_design(late_on_slow: bool) -> Database {
    let mut nl = Netlist::new(tech());
    install_library(&mut nl);
    let buf_cell = nl.find_library_cell("BUF_X1").unwrap();
    let and_cell = nl.find_library_cell("AND2_X1").unwrap();

    let p_a = nl
        .create_port("a_in", PortDirection::Input, Point::new(0, 0))
        .unwrap();
    let p_b = nl
        .create_port("b_in", PortDirection::Input, Point::new(0, 2000))
        .unwrap();
    let p_out = nl
        .create_port("out", PortDirection::Output, Point::new(8000, 0))
        .unwrap();
    nl.set_port_capacitance(p_out, 5.0e-15);

    let n_early = nl.create_net("n_early").unwrap();
    let n_b = nl.create_net("n_b").unwrap();
    nl.attach_port(n_early, p_a).unwrap();
    nl.attach_port(n_b, p_b).unwrap();

    // Two buffers delay the late signal.
    let u_c1 = nl.create_instance("u_c1", buf_cell).unwrap();
    nl.set_location(u_c1, Point::new(1000, 2000));
    let u_c2 = nl.create_instance("u_c2", buf_cell).unwrap();
    nl.set_location(u_c2, Point::new(2000, 2000));
    let n_mid = nl.create_net("n_mid").unwrap();
    let n_late = nl.create_net("n_late").unwrap();
    nl.connect(n_b, u_c1, "A").unwrap();
    nl.connect(n_mid, u_c1, "Y").unwrap();
    nl.connect(n_mid, u_c2, "A").unwrap();
    nl.connect(n_late, u_c2, "Y").unwrap();

    let u_and = nl.create_instance("u_and", and_cell).unwrap();
    nl.set_location(u_and, Point::new(4000, 0));
    let (late_port, early_port) = if late_on_slow { ("B", "A") } else { ("A", "B") };
    nl.connect(n_late, u_and, late_port).unwrap();
    nl.connect(n_early, u_and, early_port).unwrap();

    let n_out = nl.create_net("n_out").unwrap();
    nl.connect(n_out, u_and, "Y").unwrap();
    nl.attach_port(n_out, p_out).unwrap();

    wrap(nl, DesignConstraints::default())
}

/// Load pins reachable from `net`, looking through repeater chains.
pub fn reachable_sinks(db: &Database, net: NetId) -> BTreeSet<String> {
    let mut sinks = BTreeSet::new();
    collect_sinks(db, net, &mut sinks);
    sinks
}

fn collect_sinks(db: &Database, net: NetId, sinks: &mut BTreeSet<String>) {
    for load in db.load_pins(net) {
        let transparent = db.instance(load).and_then(|inst| {
            let cell = db.cell(db.library_cell(inst));
            match cell.class {
                CellClass::Buffer | CellClass::Inverter => {
                    db.output_pins(inst).first().copied()
                }
                CellClass::Gate => None,
            }
        });
        match transparent.and_then(|out| db.net(out)) {
            Some(downstream) => collect_sinks(db, downstream, sinks),
            None => {
                sinks.insert(db.pin_name(load));
            }
        }
    }
}

/// Sorted instance names, for determinism and no-op comparisons.
pub fn instance_names(db: &Database) -> Vec<String> {
    db.netlist()
        .instances()
        .map(|(_, inst)| inst.name.clone())
        .collect()
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}
