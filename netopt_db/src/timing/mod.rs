//! Timing-engine contract and the reference implementation.
//!
//! The optimizer never computes arrival or required times itself; it asks
//! whatever engine is bound to the database. [`TimingEngine`] is that
//! seam. [`ElmoreTimer`] is the bundled reference engine: linear gate
//! delays, lumped-RC wires, one analysis point, rise/fall symmetric.

mod elmore;

pub use elmore::ElmoreTimer;

use crate::error::DbError;
use crate::ids::{NetId, PinId};
use crate::netlist::{NetParasitics, Netlist};

/// One step on a timing path, startpoint to endpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPoint {
    /// Pin the path passes through.
    pub pin: PinId,
    /// Transition sense at this pin.
    pub is_rise: bool,
    /// Arrival time in seconds.
    pub arrival: f64,
    /// Slack in seconds at this pin.
    pub slack: f64,
    /// Analysis point the values belong to.
    pub ap_index: usize,
}

/// Static-timing queries the design database delegates.
///
/// Query methods take `&mut self` so engines may rebuild internal tables
/// lazily; implementations must key their caches on
/// [`Netlist::revision`] so every committed mutation is visible to the
/// next query.
pub trait TimingEngine {
    /// Arrival time at a pin for the given analysis point and edge.
    fn arrival(
        &mut self,
        netlist: &Netlist,
        pin: PinId,
        ap_index: usize,
        is_rise: bool,
    ) -> Result<f64, DbError>;

    /// Required time at a pin.
    fn required(&mut self, netlist: &Netlist, pin: PinId) -> Result<f64, DbError>;

    /// Transition time at a pin.
    fn slew(&mut self, netlist: &Netlist, pin: PinId) -> Result<f64, DbError>;

    /// Delay through the gate driving `driver_pin` for a hypothetical
    /// capacitive load. Boundary ports drive with zero delay.
    fn gate_delay(&self, netlist: &Netlist, driver_pin: PinId, load: f64)
    -> Result<f64, DbError>;

    /// The worst-slack register-to-register or port-to-port path,
    /// ordered startpoint first. Empty when the design has no endpoint.
    fn critical_path(&mut self, netlist: &Netlist) -> Result<Vec<PathPoint>, DbError>;

    /// Wire parasitics for a net under this engine's wire model.
    fn wire_parasitics(&self, netlist: &Netlist, net: NetId) -> NetParasitics;

    /// Drops every cached delay so the next query recomputes from the
    /// current netlist state.
    fn reset_delays(&mut self);
}
