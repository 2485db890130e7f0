//! In-memory design database for physical-synthesis transforms.
//!
//! Holds the cell library, the placed netlist, design constraints, and a
//! pluggable static-timing engine behind one facade. Optimization
//! transforms read and mutate the design exclusively through
//! [`Database`].

mod database;
mod error;
mod geom;
mod ids;
mod library;
mod netlist;

pub mod timing;

pub use database::{Database, DesignConstraints};
pub use error::DbError;
pub use geom::{Point, half_perimeter};
pub use ids::{CellId, InstId, NetId, PinId};
pub use library::{CellClass, LibraryCell, LibraryPort, PortDirection, TimingModel};
pub use netlist::{Instance, Net, NetParasitics, Netlist, Pin, TechParams};
