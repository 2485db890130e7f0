//! Design-database facade: one handle over netlist, constraints, and the
//! bound timing engine.
//!
//! Transforms talk exclusively to [`Database`]; it routes structural
//! queries to the [`Netlist`], timing queries to the [`TimingEngine`],
//! and enforces the boundary rules (no rewiring of top-level pins).

use indexmap::IndexSet;
use itertools::Itertools;
use tracing::debug;

use crate::error::DbError;
use crate::geom::Point;
use crate::ids::{CellId, InstId, NetId, PinId};
use crate::library::{CellClass, LibraryCell};
use crate::netlist::Netlist;
use crate::timing::{PathPoint, TimingEngine};

/// Design-wide electrical and area constraints.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesignConstraints {
    /// Utilization ceiling for area-growing transforms.
    pub maximum_area: Option<f64>,
    /// Fallback transition limit where the library port has none.
    pub default_max_transition: Option<f64>,
    /// Fallback capacitance limit where the library port has none.
    pub default_max_capacitance: Option<f64>,
}

/// The facade transforms operate through.
pub struct Database {
    netlist: Netlist,
    timer: Box<dyn TimingEngine>,
    constraints: DesignConstraints,
}

impl Database {
    /// Binds a netlist and a timing engine under the given constraints.
    #[must_use]
    pub fn new(
        netlist: Netlist,
        timer: Box<dyn TimingEngine>,
        constraints: DesignConstraints,
    ) -> Self {
        Self {
            netlist,
            timer,
            constraints,
        }
    }

    /// Read access to the structural netlist.
    #[must_use]
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// The active constraints.
    #[must_use]
    pub fn constraints(&self) -> &DesignConstraints {
        &self.constraints
    }

    // ------------------------------------------------------------------
    // Structure queries
    // ------------------------------------------------------------------

    /// Net a pin is bound to.
    #[must_use]
    pub fn net(&self, pin: PinId) -> Option<NetId> {
        self.netlist.net_of(pin)
    }

    /// Pins of a net in connection order.
    #[must_use]
    pub fn pins(&self, net: NetId) -> Vec<PinId> {
        self.netlist.net(net).pins().iter().copied().collect()
    }

    /// Owning instance of a pin.
    #[must_use]
    pub fn instance(&self, pin: PinId) -> Option<InstId> {
        self.netlist.pin(pin).instance
    }

    /// Library cell of an instance.
    #[must_use]
    pub fn library_cell(&self, inst: InstId) -> CellId {
        self.netlist.instance(inst).cell
    }

    /// Library cell lookup by name.
    #[must_use]
    pub fn library_cell_by_name(&self, name: &str) -> Option<CellId> {
        self.netlist.find_library_cell(name)
    }

    /// Catalog entry accessor.
    #[must_use]
    pub fn cell(&self, id: CellId) -> &LibraryCell {
        self.netlist.library_cell(id)
    }

    /// Input pins of an instance.
    #[must_use]
    pub fn input_pins(&self, inst: InstId) -> Vec<PinId> {
        self.netlist.input_pins(inst)
    }

    /// Output pins of an instance.
    #[must_use]
    pub fn output_pins(&self, inst: InstId) -> Vec<PinId> {
        self.netlist.output_pins(inst)
    }

    /// True for instance input pins.
    #[must_use]
    pub fn is_input(&self, pin: PinId) -> bool {
        self.netlist.is_input(pin)
    }

    /// True for pins that sink a signal.
    #[must_use]
    pub fn is_load(&self, pin: PinId) -> bool {
        self.netlist.is_load(pin)
    }

    /// True for boundary pins.
    #[must_use]
    pub fn is_top_level(&self, pin: PinId) -> bool {
        self.netlist.is_top_level(pin)
    }

    /// Driver pin of a net.
    #[must_use]
    pub fn driver_pin(&self, net: NetId) -> Option<PinId> {
        self.netlist.driver_pin(net)
    }

    /// Load pins of a net.
    #[must_use]
    pub fn load_pins(&self, net: NetId) -> Vec<PinId> {
        self.netlist.load_pins(net)
    }

    /// Diagnostic pin name.
    #[must_use]
    pub fn pin_name(&self, pin: PinId) -> String {
        self.netlist.pin_name(pin)
    }

    /// Driver pins in topological order, inputs toward outputs.
    #[must_use]
    pub fn level_driver_pins(&self) -> Vec<PinId> {
        self.netlist.levelized_driver_pins()
    }

    /// Nets marked as clocks.
    #[must_use]
    pub fn clock_nets(&self) -> IndexSet<NetId> {
        self.netlist
            .nets()
            .filter(|(_, net)| net.is_clock)
            .map(|(id, _)| id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Timing queries (delegated)
    // ------------------------------------------------------------------

    /// Arrival time at a pin.
    pub fn arrival(&mut self, pin: PinId, ap_index: usize, is_rise: bool) -> Result<f64, DbError> {
        self.timer.arrival(&self.netlist, pin, ap_index, is_rise)
    }

    /// Required time at a pin.
    pub fn required(&mut self, pin: PinId) -> Result<f64, DbError> {
        self.timer.required(&self.netlist, pin)
    }

    /// Transition time at a pin.
    pub fn slew(&mut self, pin: PinId) -> Result<f64, DbError> {
        self.timer.slew(&self.netlist, pin)
    }

    /// Library pin capacitance (or external load for boundary outputs).
    #[must_use]
    pub fn pin_capacitance(&self, pin: PinId) -> f64 {
        self.netlist.pin_capacitance(pin)
    }

    /// Total capacitance seen by a driver pin.
    #[must_use]
    pub fn load_capacitance(&self, driver_pin: PinId) -> f64 {
        self.netlist
            .net_of(driver_pin)
            .map_or(0.0, |net| self.netlist.net_load_capacitance(net))
    }

    /// Delay through the driving gate for a hypothetical load.
    pub fn gate_delay(&self, driver_pin: PinId, load: f64) -> Result<f64, DbError> {
        self.timer.gate_delay(&self.netlist, driver_pin, load)
    }

    /// Delay a candidate cell would have driving the given load.
    #[must_use]
    pub fn cell_delay(&self, cell: CellId, load: f64) -> f64 {
        self.netlist.library_cell(cell).worst_arc_delay(load)
    }

    /// True when a driver pin exceeds its capacitance limit.
    #[must_use]
    pub fn violates_maximum_capacitance(&self, pin: PinId) -> bool {
        if !self.netlist.is_driver(pin) {
            return false;
        }
        let limit = self
            .netlist
            .port_of_pin(pin)
            .and_then(|p| p.max_capacitance)
            .or(self.constraints.default_max_capacitance);
        match limit {
            Some(limit) => self.load_capacitance(pin) > limit,
            None => false,
        }
    }

    /// True when a pin's transition exceeds its limit.
    pub fn violates_maximum_transition(&mut self, pin: PinId) -> bool {
        let limit = self
            .netlist
            .port_of_pin(pin)
            .and_then(|p| p.max_transition)
            .or(self.constraints.default_max_transition);
        let Some(limit) = limit else { return false };
        match self.timer.slew(&self.netlist, pin) {
            Ok(slew) => slew > limit,
            Err(_) => false,
        }
    }

    /// The worst path, startpoint first.
    pub fn critical_path(&mut self) -> Result<Vec<PathPoint>, DbError> {
        self.timer.critical_path(&self.netlist)
    }

    /// Drops cached delays; the next query sees all committed mutations.
    pub fn reset_delays(&mut self) {
        self.timer.reset_delays();
    }

    // ------------------------------------------------------------------
    // Library queries
    // ------------------------------------------------------------------

    /// Non-don't-use buffer cells in area order.
    #[must_use]
    pub fn buffer_cells(&self) -> Vec<CellId> {
        self.repeaters_of_class(CellClass::Buffer)
    }

    /// Non-don't-use inverter cells in area order.
    #[must_use]
    pub fn inverter_cells(&self) -> Vec<CellId> {
        self.repeaters_of_class(CellClass::Inverter)
    }

    fn repeaters_of_class(&self, class: CellClass) -> Vec<CellId> {
        self.netlist
            .cells_of_class(class)
            .into_iter()
            .filter(|&id| !self.netlist.library_cell(id).dont_use)
            .sorted_by(|&a, &b| {
                self.netlist
                    .library_cell(a)
                    .area
                    .total_cmp(&self.netlist.library_cell(b).area)
                    .then(a.cmp(&b))
            })
            .collect()
    }

    /// Cells sharing the Boolean function of `cell`, itself included.
    #[must_use]
    pub fn equivalent_cells(&self, cell: CellId) -> Vec<CellId> {
        let reference = self.netlist.library_cell(cell);
        let Some(class) = reference.function_class.as_deref() else {
            return vec![cell];
        };
        self.netlist
            .library_cells()
            .filter(|(id, c)| {
                *id == cell
                    || (!c.dont_use && c.function_class.as_deref() == Some(class))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Don't-use flag of a cell.
    #[must_use]
    pub fn dont_use(&self, cell: CellId) -> bool {
        self.netlist.library_cell(cell).dont_use
    }

    /// Input pin name of a repeater cell.
    pub fn buffer_input_port(&self, cell: CellId) -> Result<String, DbError> {
        self.netlist
            .library_cell(cell)
            .repeater_input()
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                DbError::unsupported(format!(
                    "cell '{}' is not a repeater",
                    self.netlist.library_cell(cell).name
                ))
            })
    }

    /// Output pin name of a repeater cell.
    pub fn buffer_output_port(&self, cell: CellId) -> Result<String, DbError> {
        self.netlist
            .library_cell(cell)
            .repeater_output()
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                DbError::unsupported(format!(
                    "cell '{}' is not a repeater",
                    self.netlist.library_cell(cell).name
                ))
            })
    }

    /// Clustered repeater working sets.
    ///
    /// The area-sorted buffer list is split into `k` contiguous size
    /// classes with `k = clamp(round(n * (1 - threshold)), 1, n)`, one
    /// representative per class: the smallest member under `minimize`,
    /// the median member otherwise. `use_inverting` applies the same
    /// selection to the inverter list; otherwise no inverters are
    /// returned.
    #[must_use]
    pub fn buffer_clusters(
        &self,
        threshold: f64,
        minimize: bool,
        use_inverting: bool,
    ) -> (Vec<CellId>, Vec<CellId>) {
        let buffers = Self::cluster_selection(self.buffer_cells(), threshold, minimize);
        let inverters = if use_inverting {
            Self::cluster_selection(self.inverter_cells(), threshold, minimize)
        } else {
            Vec::new()
        };
        debug!(
            "buffer clusters: threshold {threshold}, {} buffers, {} inverters",
            buffers.len(),
            inverters.len()
        );
        (buffers, inverters)
    }

    fn cluster_selection(sorted: Vec<CellId>, threshold: f64, minimize: bool) -> Vec<CellId> {
        let n = sorted.len();
        if n == 0 {
            return sorted;
        }
        let k = ((n as f64) * (1.0 - threshold)).round() as usize;
        let k = k.clamp(1, n);
        let mut selected = Vec::with_capacity(k);
        for chunk_index in 0..k {
            let start = chunk_index * n / k;
            let end = ((chunk_index + 1) * n / k).max(start + 1);
            let chunk = &sorted[start..end.min(n)];
            let pick = if minimize { 0 } else { chunk.len() / 2 };
            selected.push(chunk[pick]);
        }
        selected.dedup();
        selected
    }

    // ------------------------------------------------------------------
    // Electrical constants
    // ------------------------------------------------------------------

    /// Wire resistance per unit length in ohms.
    #[must_use]
    pub fn resistance_per_micron(&self) -> f64 {
        self.netlist.tech().resistance_per_micron
    }

    /// Wire capacitance per unit length in farads.
    #[must_use]
    pub fn capacitance_per_micron(&self) -> f64 {
        self.netlist.tech().capacitance_per_micron
    }

    /// Converts a dbu length to meters.
    #[must_use]
    pub fn dbu_to_meters(&self, dbu: i64) -> f64 {
        self.netlist.tech().dbu_to_meters(dbu)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Creates an instance of a library cell.
    pub fn create_instance(&mut self, name: &str, cell: CellId) -> Result<InstId, DbError> {
        self.netlist.create_instance(name, cell)
    }

    /// Creates an empty net.
    pub fn create_net(&mut self, name: &str) -> Result<NetId, DbError> {
        self.netlist.create_net(name)
    }

    /// Connects an instance pin to a net.
    pub fn connect(&mut self, net: NetId, inst: InstId, port: &str) -> Result<PinId, DbError> {
        self.netlist.connect(net, inst, port)
    }

    /// Disconnects a pin from its net; boundary pins are refused.
    pub fn disconnect(&mut self, pin: PinId) -> Result<(), DbError> {
        if self.netlist.is_top_level(pin) {
            return Err(DbError::unsupported(format!(
                "cannot disconnect top-level pin '{}'",
                self.netlist.pin_name(pin)
            )));
        }
        self.netlist.disconnect(pin);
        Ok(())
    }

    /// Rewires a load pin onto another net carrying the same logical
    /// signal. Boundary loads may be moved, unlike [`Self::disconnect`]:
    /// the signal the boundary pin observes is unchanged.
    pub fn move_load(&mut self, pin: PinId, net: NetId) -> Result<(), DbError> {
        if !self.netlist.is_load(pin) {
            return Err(DbError::unsupported(format!(
                "'{}' is not a load pin",
                self.netlist.pin_name(pin)
            )));
        }
        self.netlist.move_pin(pin, net);
        Ok(())
    }

    /// Places an instance.
    pub fn set_location(&mut self, inst: InstId, location: Point) {
        self.netlist.set_location(inst, location);
    }

    /// Swaps an instance's cell for an equivalent one.
    pub fn replace_instance(&mut self, inst: InstId, cell: CellId) -> Result<(), DbError> {
        self.netlist.replace_instance(inst, cell)
    }

    /// Re-extracts wire parasitics for a net under the bound engine's
    /// wire model.
    pub fn calculate_parasitics(&mut self, net: NetId) {
        let parasitics = self.timer.wire_parasitics(&self.netlist, net);
        self.netlist.set_parasitics(net, parasitics);
    }

    /// Exchanges the nets on two input pins; boundary pins are refused.
    pub fn swap_pins(&mut self, a: PinId, b: PinId) -> Result<(), DbError> {
        if self.netlist.is_top_level(a) || self.netlist.is_top_level(b) {
            return Err(DbError::unsupported("cannot swap top-level pins"));
        }
        self.netlist.swap_pins(a, b)
    }

    /// True if two input pins may be exchanged without changing the
    /// gate's Boolean function.
    #[must_use]
    pub fn is_commutative(&self, a: PinId, b: PinId) -> bool {
        let (pa, pb) = (self.netlist.pin(a), self.netlist.pin(b));
        let (Some(ia), Some(ib)) = (pa.instance, pb.instance) else {
            return false;
        };
        if ia != ib {
            return false;
        }
        let cell = self.netlist.library_cell(self.netlist.instance(ia).cell);
        cell.ports_commutative(&pa.name, &pb.name)
    }

    // ------------------------------------------------------------------
    // Area
    // ------------------------------------------------------------------

    /// Sum of placed instance areas.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.netlist.total_area()
    }

    /// Area of a library cell.
    #[must_use]
    pub fn cell_area(&self, cell: CellId) -> f64 {
        self.netlist.library_cell(cell).area
    }

    /// The utilization ceiling, if constrained.
    #[must_use]
    pub fn maximum_area(&self) -> Option<f64> {
        self.constraints.maximum_area
    }

    /// True when an area ceiling is set.
    #[must_use]
    pub fn has_maximum_area(&self) -> bool {
        self.constraints.maximum_area.is_some()
    }
}
