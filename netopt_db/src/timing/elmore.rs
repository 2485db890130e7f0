//! Reference timing engine with linear gate delays and lumped-RC wires.

use tracing::trace;

use crate::error::DbError;
use crate::geom::half_perimeter;
use crate::ids::{NetId, PinId};
use crate::netlist::{NetParasitics, Netlist};
use crate::timing::{PathPoint, TimingEngine};

/// Bundled single-corner timer.
///
/// Arrival propagates forward over the levelized pin graph, required
/// backward from a single target period at every endpoint. Rise and fall
/// are symmetric and only analysis point 0 exists, so the `ap_index` /
/// `is_rise` query arguments select nothing here; they stay in the
/// signatures for engines that do distinguish them.
#[derive(Debug)]
pub struct ElmoreTimer {
    clock_period: f64,
    tables: Option<Tables>,
    cached_revision: u64,
}

#[derive(Debug)]
struct Tables {
    arrival: Vec<f64>,
    slew: Vec<f64>,
    required: Vec<f64>,
}

impl ElmoreTimer {
    /// Creates a timer with the given target period in seconds.
    #[must_use]
    pub fn new(clock_period: f64) -> Self {
        Self {
            clock_period,
            tables: None,
            cached_revision: 0,
        }
    }

    /// The target period used as required time at endpoints.
    #[must_use]
    pub fn clock_period(&self) -> f64 {
        self.clock_period
    }

    fn wire_delay(parasitics: NetParasitics, load_cap: f64) -> f64 {
        parasitics.wire_resistance * (parasitics.wire_capacitance / 2.0 + load_cap)
    }

    fn net_parasitics(netlist: &Netlist, net: NetId) -> NetParasitics {
        netlist.net(net).parasitics.unwrap_or_default()
    }

    /// True for load pins where a path ends: boundary output ports and
    /// inputs of instances without a driven output.
    fn is_endpoint(netlist: &Netlist, pin: PinId) -> bool {
        if !netlist.is_load(pin) || netlist.net_of(pin).is_none() {
            return false;
        }
        match netlist.pin(pin).instance {
            None => true,
            Some(inst) => netlist
                .output_pins(inst)
                .iter()
                .all(|&out| netlist.net_of(out).is_none()),
        }
    }

    fn ensure_tables(&mut self, netlist: &Netlist) {
        if self.tables.is_some() && self.cached_revision == netlist.revision() {
            return;
        }
        self.tables = Some(self.build_tables(netlist));
        self.cached_revision = netlist.revision();
    }

    fn build_tables(&self, netlist: &Netlist) -> Tables {
        let n = netlist.pin_count();
        let mut arrival = vec![f64::NAN; n];
        let mut slew = vec![f64::NAN; n];
        let mut required = vec![f64::NAN; n];
        let drivers = netlist.levelized_driver_pins();

        // Forward: arrivals and slews, shallow to deep.
        for &driver in &drivers {
            let (arr, sl) = if netlist.is_top_level(driver) {
                (0.0, 0.0)
            } else {
                let inst = netlist.pin(driver).instance.expect("instance driver");
                let cell = netlist.cell_of_pin(driver).expect("cell of driver");
                let load = netlist
                    .net_of(driver)
                    .map_or(0.0, |net| netlist.net_load_capacitance(net));
                let mut worst = 0.0_f64;
                for in_pin in netlist.input_pins(inst) {
                    let a_in = arrival[in_pin.index()];
                    if a_in.is_nan() {
                        continue;
                    }
                    let skew = netlist
                        .port_of_pin(in_pin)
                        .map_or(0.0, |p| p.arc_intrinsic);
                    worst = worst.max(a_in + cell.timing.delay(load) + skew);
                }
                (worst, cell.timing.slew(load))
            };
            arrival[driver.index()] = arr;
            slew[driver.index()] = sl;

            if let Some(net) = netlist.net_of(driver) {
                let parasitics = Self::net_parasitics(netlist, net);
                for load_pin in netlist.load_pins(net) {
                    let wd = Self::wire_delay(parasitics, netlist.pin_capacitance(load_pin));
                    arrival[load_pin.index()] = arr + wd;
                    slew[load_pin.index()] = sl;
                }
            }
        }

        // Backward: required times, deep to shallow.
        for &driver in drivers.iter().rev() {
            let req = match netlist.net_of(driver) {
                Some(net) => {
                    let parasitics = Self::net_parasitics(netlist, net);
                    let loads = netlist.load_pins(net);
                    if loads.is_empty() {
                        self.clock_period
                    } else {
                        loads
                            .iter()
                            .map(|&load_pin| {
                                let r = required[load_pin.index()];
                                let r = if r.is_nan() { self.clock_period } else { r };
                                r - Self::wire_delay(
                                    parasitics,
                                    netlist.pin_capacitance(load_pin),
                                )
                            })
                            .fold(f64::INFINITY, f64::min)
                    }
                }
                None => self.clock_period,
            };
            required[driver.index()] = req;

            if let Some(inst) = netlist.pin(driver).instance {
                let cell = netlist.cell_of_pin(driver).expect("cell of driver");
                let load = netlist
                    .net_of(driver)
                    .map_or(0.0, |net| netlist.net_load_capacitance(net));
                for in_pin in netlist.input_pins(inst) {
                    let skew = netlist
                        .port_of_pin(in_pin)
                        .map_or(0.0, |p| p.arc_intrinsic);
                    let candidate = req - cell.timing.delay(load) - skew;
                    let slot = &mut required[in_pin.index()];
                    *slot = if slot.is_nan() {
                        candidate
                    } else {
                        slot.min(candidate)
                    };
                }
            }
        }

        // Endpoint loads never reached from an instance output keep the
        // target period.
        for idx in 0..n {
            let pin = PinId::from(idx);
            if required[idx].is_nan() && Self::is_endpoint(netlist, pin) {
                required[idx] = self.clock_period;
            }
        }

        trace!("timing tables rebuilt for {} pins", n);
        Tables {
            arrival,
            slew,
            required,
        }
    }

    fn lookup(table: &[f64], pin: PinId) -> Result<f64, DbError> {
        let value = table
            .get(pin.index())
            .copied()
            .unwrap_or(f64::NAN);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DbError::TimingUnavailable { pin })
        }
    }
}

impl TimingEngine for ElmoreTimer {
    fn arrival(
        &mut self,
        netlist: &Netlist,
        pin: PinId,
        _ap_index: usize,
        _is_rise: bool,
    ) -> Result<f64, DbError> {
        self.ensure_tables(netlist);
        Self::lookup(&self.tables.as_ref().expect("tables").arrival, pin)
    }

    fn required(&mut self, netlist: &Netlist, pin: PinId) -> Result<f64, DbError> {
        self.ensure_tables(netlist);
        Self::lookup(&self.tables.as_ref().expect("tables").required, pin)
    }

    fn slew(&mut self, netlist: &Netlist, pin: PinId) -> Result<f64, DbError> {
        self.ensure_tables(netlist);
        Self::lookup(&self.tables.as_ref().expect("tables").slew, pin)
    }

    fn gate_delay(
        &self,
        netlist: &Netlist,
        driver_pin: PinId,
        load: f64,
    ) -> Result<f64, DbError> {
        if netlist.is_top_level(driver_pin) {
            return Ok(0.0);
        }
        let cell = netlist
            .cell_of_pin(driver_pin)
            .ok_or(DbError::TimingUnavailable { pin: driver_pin })?;
        let delay = cell.worst_arc_delay(load);
        if delay.is_finite() && delay >= 0.0 {
            Ok(delay)
        } else {
            Err(DbError::TimingUnavailable { pin: driver_pin })
        }
    }

    fn critical_path(&mut self, netlist: &Netlist) -> Result<Vec<PathPoint>, DbError> {
        self.ensure_tables(netlist);
        let tables = self.tables.as_ref().expect("tables");

        let mut worst: Option<(f64, PinId)> = None;
        for idx in 0..netlist.pin_count() {
            let pin = PinId::from(idx);
            if !Self::is_endpoint(netlist, pin) {
                continue;
            }
            let arr = tables.arrival[idx];
            let req = tables.required[idx];
            if arr.is_nan() || req.is_nan() {
                continue;
            }
            let slack = req - arr;
            match worst {
                Some((best, _)) if best <= slack => {}
                _ => worst = Some((slack, pin)),
            }
        }
        let Some((_, endpoint)) = worst else {
            return Ok(Vec::new());
        };

        let mut reversed = Vec::new();
        let mut cursor = Some(endpoint);
        while let Some(pin) = cursor {
            let arr = tables.arrival[pin.index()];
            let req = tables.required[pin.index()];
            reversed.push(PathPoint {
                pin,
                is_rise: true,
                arrival: arr,
                slack: if req.is_nan() { f64::NAN } else { req - arr },
                ap_index: 0,
            });
            cursor = if netlist.is_load(pin) {
                netlist.net_of(pin).and_then(|net| netlist.driver_pin(net))
            } else if let Some(inst) = netlist.pin(pin).instance {
                // Walk to the input that determines this output's arrival.
                netlist
                    .input_pins(inst)
                    .into_iter()
                    .filter(|&p| !tables.arrival[p.index()].is_nan())
                    .max_by(|&a, &b| {
                        tables.arrival[a.index()]
                            .total_cmp(&tables.arrival[b.index()])
                    })
            } else {
                None
            };
            if reversed.len() > netlist.pin_count() {
                // Cyclic structure; bail out with what we have.
                break;
            }
        }
        reversed.reverse();
        Ok(reversed)
    }

    fn wire_parasitics(&self, netlist: &Netlist, net: NetId) -> NetParasitics {
        let locations: Vec<_> = netlist
            .net(net)
            .pins()
            .iter()
            .map(|&p| netlist.pin_location(p))
            .collect();
        let length = netlist.tech().dbu_to_meters(half_perimeter(&locations));
        NetParasitics {
            wire_resistance: length * netlist.tech().resistance_per_micron,
            wire_capacitance: length * netlist.tech().capacitance_per_micron,
        }
    }

    fn reset_delays(&mut self) {
        self.tables = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::library::{CellClass, LibraryCell, LibraryPort, PortDirection, TimingModel};
    use crate::netlist::TechParams;

    fn tech() -> TechParams {
        TechParams {
            dbu_per_micron: 1000.0,
            resistance_per_micron: 1.0e6,
            capacitance_per_micron: 1.0e-9,
        }
    }

    fn buf_cell() -> LibraryCell {
        LibraryCell {
            name: "BUF_X1".to_string(),
            class: CellClass::Buffer,
            ports: vec![
                LibraryPort::input("A", 2.0e-15),
                LibraryPort::output("Y", Some(20.0e-15)),
            ],
            timing: TimingModel {
                intrinsic: 30.0e-12,
                drive_resistance: 2.0e3,
            },
            area: 1.0,
            dont_use: false,
            function_class: None,
            commutative_groups: vec![],
        }
    }

    fn chain() -> (Netlist, PinId, PinId) {
        let mut nl = Netlist::new(tech());
        let buf = nl.add_library_cell(buf_cell()).unwrap();
        let u1 = nl.create_instance("u1", buf).unwrap();
        let n_in = nl.create_net("n_in").unwrap();
        let n_out = nl.create_net("n_out").unwrap();
        let p_in = nl
            .create_port("in", PortDirection::Input, Point::new(0, 0))
            .unwrap();
        let p_out = nl
            .create_port("out", PortDirection::Output, Point::new(0, 0))
            .unwrap();
        nl.set_port_capacitance(p_out, 5.0e-15);
        nl.attach_port(n_in, p_in).unwrap();
        nl.attach_port(n_out, p_out).unwrap();
        nl.connect(n_in, u1, "A").unwrap();
        nl.connect(n_out, u1, "Y").unwrap();
        (nl, p_in, p_out)
    }

    #[test]
    fn test_arrival_through_chain() {
        let (nl, p_in, p_out) = chain();
        let mut timer = ElmoreTimer::new(1.0e-9);
        assert_eq!(timer.arrival(&nl, p_in, 0, true).unwrap(), 0.0);
        // No parasitics: arrival at the output port is the gate delay
        // driving the external 5 fF load.
        let expected = 30.0e-12 + 2.0e3 * 5.0e-15;
        let got = timer.arrival(&nl, p_out, 0, true).unwrap();
        assert!((got - expected).abs() < 1e-15, "got {got}");
    }

    #[test]
    fn test_required_meets_period_at_endpoint() {
        let (nl, _, p_out) = chain();
        let mut timer = ElmoreTimer::new(1.0e-9);
        assert_eq!(timer.required(&nl, p_out).unwrap(), 1.0e-9);
        let arr = timer.arrival(&nl, p_out, 0, true).unwrap();
        assert!(arr < 1.0e-9);
    }

    #[test]
    fn test_critical_path_runs_start_to_end() {
        let (nl, p_in, p_out) = chain();
        let mut timer = ElmoreTimer::new(1.0e-9);
        let path = timer.critical_path(&nl).unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path.first().unwrap().pin, p_in);
        assert_eq!(path.last().unwrap().pin, p_out);
        // Arrivals are monotone along the path.
        for pair in path.windows(2) {
            assert!(pair[0].arrival <= pair[1].arrival + 1e-18);
        }
    }

    #[test]
    fn test_cache_invalidation_on_mutation() {
        let (mut nl, _, p_out) = chain();
        let mut timer = ElmoreTimer::new(1.0e-9);
        let before = timer.arrival(&nl, p_out, 0, true).unwrap();
        // Double the external load; arrival must go up on the next query.
        nl.set_port_capacitance(p_out, 10.0e-15);
        let after = timer.arrival(&nl, p_out, 0, true).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_wire_parasitics_scale_with_span() {
        let (mut nl, _, _) = chain();
        let timer = ElmoreTimer::new(1.0e-9);
        let u1 = nl.find_instance("u1").unwrap();
        let n_in = nl.find_net("n_in").unwrap();
        let zero_span = timer.wire_parasitics(&nl, n_in);
        nl.set_location(u1, Point::new(2000, 0));
        let spanned = timer.wire_parasitics(&nl, n_in);
        assert!(spanned.wire_capacitance > zero_span.wire_capacitance);
        assert!(spanned.wire_resistance > zero_span.wire_resistance);
    }
}
