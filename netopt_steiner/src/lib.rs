//! Rectilinear Steiner-tree construction for a single net.
//!
//! The buffering engine walks a rooted binary tree over a net: the root
//! is the driver pin, every leaf is a load pin, and internal junctions
//! branch wire. Topology comes from recursive median bipartition of the
//! sink locations on the longer bounding-box axis — coarse next to a
//! proper RSMT, but it preserves the contract the dynamic program needs:
//! one leaf per load, at most two children per node, rectilinear edge
//! lengths in dbu.

use std::fmt;

use thiserror::Error;
use tracing::trace;

use netopt_db::{Database, NetId, PinId, Point};

/// Errors from tree construction; callers log and skip the net.
#[derive(Debug, Error)]
pub enum SteinerError {
    /// The net has no driver pin.
    #[error("net has no driver pin")]
    MissingDriver,
    /// The net has no load pins (single-pin or dangling net).
    #[error("net has no load pins")]
    NoSinks,
}

/// Index of a node within one [`SteinerTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteinerPoint {
    inner: u32,
}

impl SteinerPoint {
    const fn new(id: u32) -> Self {
        Self { inner: id }
    }

    /// Returns the index as a usize for table access.
    #[must_use]
    pub const fn index(self) -> usize {
        self.inner as usize
    }
}

impl fmt::Display for SteinerPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.inner)
    }
}

#[derive(Clone, Debug)]
struct SteinerNode {
    location: Point,
    pin: Option<PinId>,
    left: Option<SteinerPoint>,
    right: Option<SteinerPoint>,
}

/// A rooted binary Steiner tree over one net.
#[derive(Clone, Debug)]
pub struct SteinerTree {
    nodes: Vec<SteinerNode>,
    driver: SteinerPoint,
    driver_pin: PinId,
}

impl SteinerTree {
    /// Builds the tree for `net`: driver at the root, one leaf per load.
    pub fn create(db: &Database, net: NetId) -> Result<Self, SteinerError> {
        let driver_pin = db.driver_pin(net).ok_or(SteinerError::MissingDriver)?;
        let loads = db.load_pins(net);
        if loads.is_empty() {
            return Err(SteinerError::NoSinks);
        }
        let mut sinks: Vec<(PinId, Point)> = loads
            .into_iter()
            .map(|pin| (pin, db.netlist().pin_location(pin)))
            .collect();

        let mut nodes = Vec::with_capacity(2 * sinks.len());
        let top = Self::build(&mut nodes, &mut sinks);
        let driver = SteinerPoint::new(nodes.len() as u32);
        nodes.push(SteinerNode {
            location: db.netlist().pin_location(driver_pin),
            pin: Some(driver_pin),
            left: Some(top),
            right: None,
        });
        trace!(
            "steiner tree for {}: {} nodes",
            db.pin_name(driver_pin),
            nodes.len()
        );
        Ok(Self {
            nodes,
            driver,
            driver_pin,
        })
    }

    fn build(nodes: &mut Vec<SteinerNode>, sinks: &mut [(PinId, Point)]) -> SteinerPoint {
        if sinks.len() == 1 {
            let (pin, location) = sinks[0];
            let id = SteinerPoint::new(nodes.len() as u32);
            nodes.push(SteinerNode {
                location,
                pin: Some(pin),
                left: None,
                right: None,
            });
            return id;
        }

        // Split the sinks at the median of the longer bounding-box axis.
        let min_x = sinks.iter().map(|s| s.1.x).min().unwrap_or(0);
        let max_x = sinks.iter().map(|s| s.1.x).max().unwrap_or(0);
        let min_y = sinks.iter().map(|s| s.1.y).min().unwrap_or(0);
        let max_y = sinks.iter().map(|s| s.1.y).max().unwrap_or(0);
        if max_x - min_x >= max_y - min_y {
            sinks.sort_by_key(|s| (s.1.x, s.1.y, s.0));
        } else {
            sinks.sort_by_key(|s| (s.1.y, s.1.x, s.0));
        }
        let mid = sinks.len() / 2;
        let junction = Point::new(
            Self::median(sinks, |p| p.x),
            Self::median(sinks, |p| p.y),
        );
        let (lo, hi) = sinks.split_at_mut(mid);
        let left = Self::build(nodes, lo);
        let right = Self::build(nodes, hi);
        let id = SteinerPoint::new(nodes.len() as u32);
        nodes.push(SteinerNode {
            location: junction,
            pin: None,
            left: Some(left),
            right: Some(right),
        });
        id
    }

    fn median(sinks: &[(PinId, Point)], axis: impl Fn(Point) -> i64) -> i64 {
        let mut values: Vec<i64> = sinks.iter().map(|s| axis(s.1)).collect();
        values.sort_unstable();
        values[values.len() / 2]
    }

    /// The root node, at the driver pin's location.
    #[must_use]
    pub fn driver_point(&self) -> SteinerPoint {
        self.driver
    }

    /// The driver pin this tree was built from.
    #[must_use]
    pub fn driver_pin(&self) -> PinId {
        self.driver_pin
    }

    /// The single child of the root, where the bottom-up walk starts.
    #[must_use]
    pub fn top(&self) -> Option<SteinerPoint> {
        self.nodes[self.driver.index()].left
    }

    /// Left child of a node.
    #[must_use]
    pub fn left(&self, pt: SteinerPoint) -> Option<SteinerPoint> {
        self.nodes[pt.index()].left
    }

    /// Right child of a node; `None` on chain nodes.
    #[must_use]
    pub fn right(&self, pt: SteinerPoint) -> Option<SteinerPoint> {
        self.nodes[pt.index()].right
    }

    /// Pin at a node: load pins at leaves, the driver pin at the root,
    /// `None` at junctions.
    #[must_use]
    pub fn pin(&self, pt: SteinerPoint) -> Option<PinId> {
        self.nodes[pt.index()].pin
    }

    /// Placed location of a node.
    #[must_use]
    pub fn location(&self, pt: SteinerPoint) -> Point {
        self.nodes[pt.index()].location
    }

    /// Rectilinear distance between two nodes in dbu.
    #[must_use]
    pub fn distance(&self, a: SteinerPoint, b: SteinerPoint) -> i64 {
        self.location(a).rectilinear_distance(self.location(b))
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True only for the degenerate empty tree (never constructed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf pins in construction order.
    #[must_use]
    pub fn leaf_pins(&self) -> Vec<PinId> {
        self.nodes
            .iter()
            .filter(|n| n.left.is_none() && n.right.is_none())
            .filter_map(|n| n.pin)
            .collect()
    }
}
