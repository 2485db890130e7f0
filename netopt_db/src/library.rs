//! Cell-library catalog: logic and repeater cell definitions.
//!
//! A [`LibraryCell`] is the immutable catalog entry an [`crate::netlist::Instance`]
//! points at: port set, per-input pin capacitance, a linear timing model,
//! area, and the attributes the optimization transforms key on
//! (`dont_use`, function class for resizing, commutative input groups).

use std::fmt;

/// Direction of a library port or design pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Signal flows into the cell (or into the design, for top-level ports).
    Input,
    /// Signal flows out of the cell (or out of the design).
    Output,
}

/// Coarse functional category of a library cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellClass {
    /// Non-inverting repeater.
    Buffer,
    /// Inverting repeater.
    Inverter,
    /// Any other logic gate.
    Gate,
}

impl CellClass {
    /// Returns true if the cell can be used as a repeater by itself.
    #[must_use]
    pub const fn is_buffer(self) -> bool {
        matches!(self, Self::Buffer)
    }

    /// Returns true if the cell inverts its single input.
    #[must_use]
    pub const fn is_inverter(self) -> bool {
        matches!(self, Self::Inverter)
    }
}

impl fmt::Display for CellClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Linear delay model of a cell's switching arc.
///
/// Delay through the cell is `intrinsic + drive_resistance * load`, with
/// the load in farads and the result in seconds. Per-input skew is added
/// on top from [`LibraryPort::arc_intrinsic`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingModel {
    /// Load-independent delay in seconds.
    pub intrinsic: f64,
    /// Output drive resistance in ohms.
    pub drive_resistance: f64,
}

impl TimingModel {
    /// Delay in seconds for the given capacitive load in farads.
    #[must_use]
    pub fn delay(&self, load: f64) -> f64 {
        self.intrinsic + self.drive_resistance * load
    }

    /// Output transition estimate in seconds for the given load.
    #[must_use]
    pub fn slew(&self, load: f64) -> f64 {
        self.drive_resistance * load
    }
}

/// A port on a library cell.
#[derive(Clone, Debug)]
pub struct LibraryPort {
    /// Port name, unique within the cell.
    pub name: String,
    /// Signal direction.
    pub direction: PortDirection,
    /// Input pin capacitance in farads; zero for outputs.
    pub capacitance: f64,
    /// Extra arc delay from this input to the output, in seconds.
    ///
    /// Models the per-pin delay asymmetry that makes commutative-pin
    /// swapping profitable; zero when the cell is symmetric.
    pub arc_intrinsic: f64,
    /// Maximum capacitance this port may drive; output ports only.
    pub max_capacitance: Option<f64>,
    /// Maximum transition allowed at this port.
    pub max_transition: Option<f64>,
}

impl LibraryPort {
    /// An input port with the given pin capacitance and no arc skew.
    #[must_use]
    pub fn input(name: &str, capacitance: f64) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Input,
            capacitance,
            arc_intrinsic: 0.0,
            max_capacitance: None,
            max_transition: None,
        }
    }

    /// An output port with an optional maximum-capacitance limit.
    #[must_use]
    pub fn output(name: &str, max_capacitance: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Output,
            capacitance: 0.0,
            arc_intrinsic: 0.0,
            max_capacitance,
            max_transition: None,
        }
    }
}

/// Catalog entry for a logic-gate or repeater type.
#[derive(Clone, Debug)]
pub struct LibraryCell {
    /// Cell name, unique within the library.
    pub name: String,
    /// Functional category.
    pub class: CellClass,
    /// Ports in declaration order.
    pub ports: Vec<LibraryPort>,
    /// Delay model shared by all arcs of the cell.
    pub timing: TimingModel,
    /// Placement area in square microns.
    pub area: f64,
    /// Excluded from optimization working sets when set.
    pub dont_use: bool,
    /// Cells sharing a function class are drop-in replacements of each
    /// other (gate resizing); `None` opts the cell out of resizing.
    pub function_class: Option<String>,
    /// Groups of input port names whose exchange preserves the cell's
    /// Boolean function.
    pub commutative_groups: Vec<Vec<String>>,
}

impl LibraryCell {
    /// Looks up a port by name.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<&LibraryPort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Input ports in declaration order.
    pub fn input_ports(&self) -> impl Iterator<Item = &LibraryPort> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Input)
    }

    /// Output ports in declaration order.
    pub fn output_ports(&self) -> impl Iterator<Item = &LibraryPort> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Output)
    }

    /// The single input port of a repeater cell.
    #[must_use]
    pub fn repeater_input(&self) -> Option<&LibraryPort> {
        match self.class {
            CellClass::Buffer | CellClass::Inverter => self.input_ports().next(),
            CellClass::Gate => None,
        }
    }

    /// The single output port of a repeater cell.
    #[must_use]
    pub fn repeater_output(&self) -> Option<&LibraryPort> {
        match self.class {
            CellClass::Buffer | CellClass::Inverter => self.output_ports().next(),
            CellClass::Gate => None,
        }
    }

    /// True if the named input ports belong to one commutative group.
    #[must_use]
    pub fn ports_commutative(&self, a: &str, b: &str) -> bool {
        a != b
            && self
                .commutative_groups
                .iter()
                .any(|group| group.iter().any(|p| p == a) && group.iter().any(|p| p == b))
    }

    /// Worst-case arc delay to the output for the given load.
    #[must_use]
    pub fn worst_arc_delay(&self, load: f64) -> f64 {
        let skew = self
            .input_ports()
            .map(|p| p.arc_intrinsic)
            .fold(0.0_f64, f64::max);
        self.timing.delay(load) + skew
    }
}
