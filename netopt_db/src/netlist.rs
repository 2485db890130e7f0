//! Mutable in-memory netlist: instances, nets, pins, placement.
//!
//! The netlist is the structural half of the design database. It knows
//! nothing about timing; engines read it through `&Netlist` and the
//! facade in [`crate::database`] combines both. Every mutation bumps a
//! revision counter so timing caches can invalidate themselves.

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use crate::error::DbError;
use crate::geom::Point;
use crate::ids::{CellId, InstId, NetId, PinId};
use crate::library::{CellClass, LibraryCell, LibraryPort, PortDirection};

/// Process constants for wire estimation and unit conversion.
#[derive(Clone, Copy, Debug)]
pub struct TechParams {
    /// Database units per micron.
    pub dbu_per_micron: f64,
    /// Wire resistance per unit length, in ohms.
    pub resistance_per_micron: f64,
    /// Wire capacitance per unit length, in farads.
    pub capacitance_per_micron: f64,
}

impl TechParams {
    /// Converts a dbu length to meters.
    #[must_use]
    pub fn dbu_to_meters(&self, dbu: i64) -> f64 {
        dbu as f64 / self.dbu_per_micron * 1.0e-6
    }
}

/// Lumped wire parasitics attached to a net after extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetParasitics {
    /// Total wire resistance in ohms.
    pub wire_resistance: f64,
    /// Total wire capacitance in farads.
    pub wire_capacitance: f64,
}

/// An occurrence of a [`LibraryCell`] in the design.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Instance name, unique within the design.
    pub name: String,
    /// The catalog entry this instance realizes.
    pub cell: CellId,
    /// Placed location in dbu.
    pub location: Point,
    pins: Vec<PinId>,
}

impl Instance {
    /// Pins in library port declaration order.
    #[must_use]
    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }
}

/// An instance terminal or top-level port.
#[derive(Clone, Debug)]
pub struct Pin {
    /// Port name (for instance pins, the library port name).
    pub name: String,
    /// Owning instance; `None` for top-level ports.
    pub instance: Option<InstId>,
    /// Signal direction, from the owning cell's port (or the port
    /// declaration for top-level pins).
    pub direction: PortDirection,
    /// Net this pin is bound to, if any.
    pub net: Option<NetId>,
    /// Location of a top-level port; instance pins take the instance
    /// location.
    pub port_location: Point,
    /// External load presented by a top-level output port, in farads.
    pub external_cap: f64,
}

/// An equipotential connection of one driver pin and its loads.
#[derive(Clone, Debug)]
pub struct Net {
    /// Net name, unique within the design.
    pub name: String,
    pins: IndexSet<PinId>,
    /// Marked by clock propagation; skipped by repair passes.
    pub is_clock: bool,
    /// Extracted wire parasitics, absent until first extraction.
    pub parasitics: Option<NetParasitics>,
}

impl Net {
    /// Connected pins in connection order.
    #[must_use]
    pub fn pins(&self) -> &IndexSet<PinId> {
        &self.pins
    }
}

/// The structural design database.
#[derive(Clone, Debug)]
pub struct Netlist {
    tech: TechParams,
    library: Vec<LibraryCell>,
    cell_names: IndexMap<String, CellId>,
    instances: Vec<Instance>,
    instance_names: IndexMap<String, InstId>,
    nets: Vec<Net>,
    net_names: IndexMap<String, NetId>,
    pins: Vec<Pin>,
    top_ports: Vec<PinId>,
    revision: u64,
}

impl Netlist {
    /// Creates an empty netlist over the given process constants.
    #[must_use]
    pub fn new(tech: TechParams) -> Self {
        Self {
            tech,
            library: Vec::new(),
            cell_names: IndexMap::new(),
            instances: Vec::new(),
            instance_names: IndexMap::new(),
            nets: Vec::new(),
            net_names: IndexMap::new(),
            pins: Vec::new(),
            top_ports: Vec::new(),
            revision: 0,
        }
    }

    /// Process constants.
    #[must_use]
    pub fn tech(&self) -> &TechParams {
        &self.tech
    }

    /// Monotonic mutation counter for cache invalidation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Registers a library cell; the name must be unused.
    pub fn add_library_cell(&mut self, cell: LibraryCell) -> Result<CellId, DbError> {
        if self.cell_names.contains_key(&cell.name) {
            return Err(DbError::unsupported(format!(
                "duplicate library cell '{}'",
                cell.name
            )));
        }
        let id = CellId::new(self.library.len() as u32);
        self.cell_names.insert(cell.name.clone(), id);
        self.library.push(cell);
        Ok(id)
    }

    /// Catalog entry by id.
    #[must_use]
    pub fn library_cell(&self, id: CellId) -> &LibraryCell {
        &self.library[id.index()]
    }

    /// Catalog entry by name.
    #[must_use]
    pub fn find_library_cell(&self, name: &str) -> Option<CellId> {
        self.cell_names.get(name).copied()
    }

    /// All catalog entries in registration order.
    pub fn library_cells(&self) -> impl Iterator<Item = (CellId, &LibraryCell)> {
        self.library
            .iter()
            .enumerate()
            .map(|(i, c)| (CellId::new(i as u32), c))
    }

    // ------------------------------------------------------------------
    // Construction and mutation
    // ------------------------------------------------------------------

    /// Creates an unplaced instance of `cell` with unconnected pins.
    pub fn create_instance(&mut self, name: &str, cell: CellId) -> Result<InstId, DbError> {
        if self.instance_names.contains_key(name) {
            return Err(DbError::unsupported(format!(
                "duplicate instance '{name}'"
            )));
        }
        let inst_id = InstId::new(self.instances.len() as u32);
        let ports: Vec<(String, PortDirection)> = self.library[cell.index()]
            .ports
            .iter()
            .map(|p| (p.name.clone(), p.direction))
            .collect();
        let mut pins = Vec::with_capacity(ports.len());
        for (port_name, direction) in ports {
            let pin_id = PinId::new(self.pins.len() as u32);
            self.pins.push(Pin {
                name: port_name,
                instance: Some(inst_id),
                direction,
                net: None,
                port_location: Point::default(),
                external_cap: 0.0,
            });
            pins.push(pin_id);
        }
        self.instances.push(Instance {
            name: name.to_string(),
            cell,
            location: Point::default(),
            pins,
        });
        self.instance_names.insert(name.to_string(), inst_id);
        self.touch();
        Ok(inst_id)
    }

    /// Creates an empty net; the name must be unused.
    pub fn create_net(&mut self, name: &str) -> Result<NetId, DbError> {
        if self.net_names.contains_key(name) {
            return Err(DbError::unsupported(format!("duplicate net '{name}'")));
        }
        let id = NetId::new(self.nets.len() as u32);
        self.nets.push(Net {
            name: name.to_string(),
            pins: IndexSet::new(),
            is_clock: false,
            parasitics: None,
        });
        self.net_names.insert(name.to_string(), id);
        self.touch();
        Ok(id)
    }

    /// Declares a top-level port at a placed location.
    pub fn create_port(
        &mut self,
        name: &str,
        direction: PortDirection,
        location: Point,
    ) -> Result<PinId, DbError> {
        let pin_id = PinId::new(self.pins.len() as u32);
        self.pins.push(Pin {
            name: name.to_string(),
            instance: None,
            direction,
            net: None,
            port_location: location,
            external_cap: 0.0,
        });
        self.top_ports.push(pin_id);
        self.touch();
        Ok(pin_id)
    }

    /// Sets the external load presented by a top-level output port.
    pub fn set_port_capacitance(&mut self, port: PinId, cap: f64) {
        self.pins[port.index()].external_cap = cap;
        self.touch();
    }

    /// Connects an instance pin, addressed by port name, to `net`.
    ///
    /// The pin must currently be unconnected; loads are moved between
    /// nets with an explicit [`Self::disconnect`] first.
    pub fn connect(&mut self, net: NetId, inst: InstId, port: &str) -> Result<PinId, DbError> {
        let pin_id = self
            .instances[inst.index()]
            .pins
            .iter()
            .copied()
            .find(|&p| self.pins[p.index()].name == port)
            .ok_or_else(|| DbError::not_found("port", port))?;
        self.bind(net, pin_id)?;
        Ok(pin_id)
    }

    /// Connects a top-level port pin to `net`.
    pub fn attach_port(&mut self, net: NetId, port: PinId) -> Result<(), DbError> {
        if self.pins[port.index()].instance.is_some() {
            return Err(DbError::unsupported(
                "attach_port called on an instance pin",
            ));
        }
        self.bind(net, port)
    }

    fn bind(&mut self, net: NetId, pin: PinId) -> Result<(), DbError> {
        if let Some(existing) = self.pins[pin.index()].net {
            return Err(DbError::unsupported(format!(
                "pin {pin} already bound to net '{}'",
                self.nets[existing.index()].name
            )));
        }
        self.pins[pin.index()].net = Some(net);
        self.nets[net.index()].pins.insert(pin);
        self.touch();
        Ok(())
    }

    /// Unbinds a pin from its net; no-op when already unconnected.
    pub fn disconnect(&mut self, pin: PinId) {
        if let Some(net) = self.pins[pin.index()].net.take() {
            self.nets[net.index()].pins.shift_remove(&pin);
            self.touch();
        }
    }

    /// Moves a pin onto another net, detaching it from its current one.
    pub fn move_pin(&mut self, pin: PinId, net: NetId) {
        self.disconnect(pin);
        self.pins[pin.index()].net = Some(net);
        self.nets[net.index()].pins.insert(pin);
        self.touch();
    }

    /// Exchanges the nets bound to two input pins of one instance.
    pub fn swap_pins(&mut self, a: PinId, b: PinId) -> Result<(), DbError> {
        let (pa, pb) = (&self.pins[a.index()], &self.pins[b.index()]);
        if pa.instance.is_none() || pb.instance.is_none() {
            return Err(DbError::unsupported("cannot swap top-level pins"));
        }
        if pa.instance != pb.instance {
            return Err(DbError::unsupported(
                "swapped pins must belong to one instance",
            ));
        }
        if pa.direction != PortDirection::Input || pb.direction != PortDirection::Input {
            return Err(DbError::unsupported("only input pins can be swapped"));
        }
        let net_a = pa.net;
        let net_b = pb.net;
        if let Some(n) = net_a {
            self.nets[n.index()].pins.shift_remove(&a);
        }
        if let Some(n) = net_b {
            self.nets[n.index()].pins.shift_remove(&b);
        }
        self.pins[a.index()].net = net_b;
        self.pins[b.index()].net = net_a;
        if let Some(n) = net_b {
            self.nets[n.index()].pins.insert(a);
        }
        if let Some(n) = net_a {
            self.nets[n.index()].pins.insert(b);
        }
        self.touch();
        Ok(())
    }

    /// Swaps an instance's catalog entry for a port-compatible cell.
    pub fn replace_instance(&mut self, inst: InstId, new_cell: CellId) -> Result<(), DbError> {
        let pins = self.instances[inst.index()].pins.clone();
        for pin_id in &pins {
            let pin = &self.pins[pin_id.index()];
            match self.library[new_cell.index()].port(&pin.name) {
                Some(port) if port.direction == pin.direction => {}
                _ => {
                    return Err(DbError::unsupported(format!(
                        "cell '{}' has no port '{}' compatible with instance '{}'",
                        self.library[new_cell.index()].name,
                        pin.name,
                        self.instances[inst.index()].name
                    )));
                }
            }
        }
        self.instances[inst.index()].cell = new_cell;
        self.touch();
        Ok(())
    }

    /// Places an instance.
    pub fn set_location(&mut self, inst: InstId, location: Point) {
        self.instances[inst.index()].location = location;
        self.touch();
    }

    /// Marks a net as a clock net.
    pub fn set_clock_net(&mut self, net: NetId, is_clock: bool) {
        self.nets[net.index()].is_clock = is_clock;
        self.touch();
    }

    /// Stores extracted parasitics for a net.
    pub fn set_parasitics(&mut self, net: NetId, parasitics: NetParasitics) {
        self.nets[net.index()].parasitics = Some(parasitics);
        self.touch();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Pin accessor.
    #[must_use]
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.index()]
    }

    /// Net accessor.
    #[must_use]
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Instance accessor.
    #[must_use]
    pub fn instance(&self, id: InstId) -> &Instance {
        &self.instances[id.index()]
    }

    /// Instance lookup by name.
    #[must_use]
    pub fn find_instance(&self, name: &str) -> Option<InstId> {
        self.instance_names.get(name).copied()
    }

    /// Net lookup by name.
    #[must_use]
    pub fn find_net(&self, name: &str) -> Option<NetId> {
        self.net_names.get(name).copied()
    }

    /// All instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = (InstId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstId::new(i as u32), inst))
    }

    /// All nets in creation order.
    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, net)| (NetId::new(i as u32), net))
    }

    /// Top-level ports in declaration order.
    #[must_use]
    pub fn top_ports(&self) -> &[PinId] {
        &self.top_ports
    }

    /// Number of pins ever created (table sizing for engines).
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Net a pin is bound to.
    #[must_use]
    pub fn net_of(&self, pin: PinId) -> Option<NetId> {
        self.pins[pin.index()].net
    }

    /// True for top-level boundary pins.
    #[must_use]
    pub fn is_top_level(&self, pin: PinId) -> bool {
        self.pins[pin.index()].instance.is_none()
    }

    /// True for instance input pins.
    #[must_use]
    pub fn is_input(&self, pin: PinId) -> bool {
        let p = &self.pins[pin.index()];
        p.instance.is_some() && p.direction == PortDirection::Input
    }

    /// True for pins that sink a signal: instance inputs and top-level
    /// output ports.
    #[must_use]
    pub fn is_load(&self, pin: PinId) -> bool {
        let p = &self.pins[pin.index()];
        match p.instance {
            Some(_) => p.direction == PortDirection::Input,
            None => p.direction == PortDirection::Output,
        }
    }

    /// True for pins that source a signal: instance outputs and
    /// top-level input ports.
    #[must_use]
    pub fn is_driver(&self, pin: PinId) -> bool {
        let p = &self.pins[pin.index()];
        match p.instance {
            Some(_) => p.direction == PortDirection::Output,
            None => p.direction == PortDirection::Input,
        }
    }

    /// The unique driver pin of a net, if connected.
    #[must_use]
    pub fn driver_pin(&self, net: NetId) -> Option<PinId> {
        self.nets[net.index()]
            .pins
            .iter()
            .copied()
            .find(|&p| self.is_driver(p))
    }

    /// Load pins of a net in connection order.
    #[must_use]
    pub fn load_pins(&self, net: NetId) -> Vec<PinId> {
        self.nets[net.index()]
            .pins
            .iter()
            .copied()
            .filter(|&p| self.is_load(p))
            .collect()
    }

    /// Input pins of an instance in port order.
    #[must_use]
    pub fn input_pins(&self, inst: InstId) -> Vec<PinId> {
        self.instances[inst.index()]
            .pins
            .iter()
            .copied()
            .filter(|&p| self.pins[p.index()].direction == PortDirection::Input)
            .collect()
    }

    /// Output pins of an instance in port order.
    #[must_use]
    pub fn output_pins(&self, inst: InstId) -> Vec<PinId> {
        self.instances[inst.index()]
            .pins
            .iter()
            .copied()
            .filter(|&p| self.pins[p.index()].direction == PortDirection::Output)
            .collect()
    }

    /// Capacitance presented by a pin: library pin capacitance for
    /// instance pins, external load for top-level output ports.
    #[must_use]
    pub fn pin_capacitance(&self, pin: PinId) -> f64 {
        let p = &self.pins[pin.index()];
        match p.instance {
            Some(inst) => {
                let cell = &self.library[self.instances[inst.index()].cell.index()];
                cell.port(&p.name).map_or(0.0, |port| port.capacitance)
            }
            None => p.external_cap,
        }
    }

    /// Placed location of a pin.
    #[must_use]
    pub fn pin_location(&self, pin: PinId) -> Point {
        let p = &self.pins[pin.index()];
        match p.instance {
            Some(inst) => self.instances[inst.index()].location,
            None => p.port_location,
        }
    }

    /// Library cell backing a pin's instance.
    #[must_use]
    pub fn cell_of_pin(&self, pin: PinId) -> Option<&LibraryCell> {
        self.pins[pin.index()]
            .instance
            .map(|inst| &self.library[self.instances[inst.index()].cell.index()])
    }

    /// Library port backing an instance pin.
    #[must_use]
    pub fn port_of_pin(&self, pin: PinId) -> Option<&LibraryPort> {
        let p = &self.pins[pin.index()];
        self.cell_of_pin(pin).and_then(|cell| cell.port(&p.name))
    }

    /// Total capacitance seen by a net's driver: wire capacitance plus
    /// every load pin's capacitance.
    #[must_use]
    pub fn net_load_capacitance(&self, net: NetId) -> f64 {
        let wire = self.nets[net.index()]
            .parasitics
            .map_or(0.0, |p| p.wire_capacitance);
        wire + self
            .load_pins(net)
            .iter()
            .map(|&p| self.pin_capacitance(p))
            .sum::<f64>()
    }

    /// Full hierarchical pin name for diagnostics.
    #[must_use]
    pub fn pin_name(&self, pin: PinId) -> String {
        let p = &self.pins[pin.index()];
        match p.instance {
            Some(inst) => format!("{}/{}", self.instances[inst.index()].name, p.name),
            None => p.name.clone(),
        }
    }

    /// Sum of placed instance areas.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.instances
            .iter()
            .map(|inst| self.library[inst.cell.index()].area)
            .sum()
    }

    /// True if the cell is a repeater candidate of the given class.
    #[must_use]
    pub fn cells_of_class(&self, class: CellClass) -> Vec<CellId> {
        self.library_cells()
            .filter(|(_, c)| c.class == class)
            .map(|(id, _)| id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Levelization
    // ------------------------------------------------------------------

    /// Topological level per instance: 1 for instances fed only by
    /// boundary ports or unconnected pins, increasing toward the outputs.
    /// Instances on combinational cycles are parked one past the deepest
    /// acyclic level.
    #[must_use]
    pub fn instance_levels(&self) -> Vec<u32> {
        let n = self.instances.len();
        let mut level = vec![0u32; n];
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];

        for (i, inst) in self.instances.iter().enumerate() {
            for &pin in &inst.pins {
                let p = &self.pins[pin.index()];
                if p.direction != PortDirection::Input {
                    continue;
                }
                let Some(net) = p.net else { continue };
                if let Some(driver) = self.driver_pin(net) {
                    if let Some(src) = self.pins[driver.index()].instance {
                        preds[i].push(src.index());
                        indegree[i] += 1;
                    }
                }
            }
        }

        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, ps) in preds.iter().enumerate() {
            for &p in ps {
                succs[p].push(i);
            }
        }

        let mut queue: std::collections::VecDeque<usize> =
            (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut seen = 0usize;
        while let Some(i) = queue.pop_front() {
            seen += 1;
            level[i] = 1 + preds[i].iter().map(|&p| level[p]).max().unwrap_or(0);
            for &s in &succs[i] {
                indegree[s] -= 1;
                if indegree[s] == 0 {
                    queue.push_back(s);
                }
            }
        }
        if seen < n {
            let deepest = level.iter().copied().max().unwrap_or(0);
            warn!("{} instances on combinational cycles", n - seen);
            for (i, l) in level.iter_mut().enumerate() {
                if indegree[i] > 0 {
                    *l = deepest + 1;
                }
            }
        }
        level
    }

    /// Driver pins in deterministic topological order, boundary input
    /// ports first, then instance outputs from shallow to deep.
    #[must_use]
    pub fn levelized_driver_pins(&self) -> Vec<PinId> {
        let levels = self.instance_levels();
        let mut drivers: Vec<(u32, PinId)> = Vec::new();
        for &port in &self.top_ports {
            if self.pins[port.index()].direction == PortDirection::Input {
                drivers.push((0, port));
            }
        }
        for (i, inst) in self.instances.iter().enumerate() {
            for &pin in &inst.pins {
                if self.pins[pin.index()].direction == PortDirection::Output {
                    drivers.push((levels[i], pin));
                }
            }
        }
        drivers.sort_by_key(|&(level, pin)| (level, pin));
        drivers.into_iter().map(|(_, pin)| pin).collect()
    }
}
