//! Curation of the repeater working set.
//!
//! Transforms never iterate the raw library: they hand a policy to
//! [`curate`] and get back an area-sorted, deduplicated working set of
//! buffers and (optionally) inverters, either named explicitly or
//! clustered by the database into size classes.

use indexmap::IndexSet;
use itertools::Itertools;
use tracing::{debug, info};

use netopt_db::{CellId, Database};

use crate::error::TransformError;

/// Which buffer cells enter the working set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferSelection {
    /// Every non-don't-use buffer in the library.
    All,
    /// Exactly the named cells.
    Named(IndexSet<String>),
}

/// Which inverter cells enter the working set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InverterSelection {
    /// Inverter-pair candidates disabled.
    None,
    /// Every non-don't-use inverter in the library.
    All,
    /// Exactly the named cells.
    Named(IndexSet<String>),
}

/// Cluster granularity presets and their thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterGranularity {
    /// One representative cell.
    Single,
    /// A small working set.
    Small,
    /// A mid-sized working set.
    Medium,
    /// A large working set.
    Large,
    /// The whole usable library.
    All,
}

impl ClusterGranularity {
    /// Threshold handed to the database's cluster query.
    #[must_use]
    pub fn threshold(self) -> f64 {
        match self {
            Self::Single => 1.0,
            Self::Small => 3.0 / 4.0,
            Self::Medium => 1.0 / 4.0,
            Self::Large => 1.0 / 12.0,
            Self::All => 0.0,
        }
    }

    /// Parses the `-auto_buffer_library` argument value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(Self::Single),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Automatic clustering request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterPolicy {
    /// Size-class preset.
    pub granularity: ClusterGranularity,
    /// Request the smallest subset spanning the size range.
    pub minimize: bool,
    /// Also cluster the inverter library.
    pub use_inverting: bool,
}

/// Full curation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurationPolicy {
    /// Buffer selection; ignored when clustering is requested.
    pub buffers: BufferSelection,
    /// Inverter selection; ignored when clustering is requested.
    pub inverters: InverterSelection,
    /// Delegate selection to the database's cluster query.
    pub cluster: Option<ClusterPolicy>,
}

/// The curated repeater working set, area-sorted and deduplicated.
#[derive(Clone, Debug, Default)]
pub struct WorkingLibrary {
    /// Buffer candidates, ascending area.
    pub buffers: Vec<CellId>,
    /// Inverter candidates, ascending area.
    pub inverters: Vec<CellId>,
}

impl WorkingLibrary {
    /// Median-area buffer, the reference cell for junction estimates.
    #[must_use]
    pub fn reference_buffer(&self) -> Option<CellId> {
        self.buffers.get(self.buffers.len() / 2).copied()
    }
}

/// Resolves a curation policy against the library.
pub fn curate(db: &Database, policy: &CurationPolicy) -> Result<WorkingLibrary, TransformError> {
    if let Some(cluster) = policy.cluster {
        let (buffers, inverters) = db.buffer_clusters(
            cluster.granularity.threshold(),
            cluster.minimize,
            cluster.use_inverting,
        );
        info!(
            "using {} buffers and {} inverters",
            buffers.len(),
            inverters.len()
        );
        return Ok(WorkingLibrary { buffers, inverters });
    }

    let buffers = match &policy.buffers {
        BufferSelection::All => db.buffer_cells(),
        BufferSelection::Named(names) => resolve_named(db, names)?,
    };
    let inverters = match &policy.inverters {
        InverterSelection::None => Vec::new(),
        InverterSelection::All => db.inverter_cells(),
        InverterSelection::Named(names) => resolve_named(db, names)?,
    };
    debug!(
        "curated {} buffers and {} inverters",
        buffers.len(),
        inverters.len()
    );
    Ok(WorkingLibrary {
        buffers: sort_and_dedup(db, buffers),
        inverters: sort_and_dedup(db, inverters),
    })
}

fn resolve_named(db: &Database, names: &IndexSet<String>) -> Result<Vec<CellId>, TransformError> {
    names
        .iter()
        .map(|name| {
            db.library_cell_by_name(name)
                .ok_or_else(|| TransformError::Library(name.clone()))
        })
        .collect()
}

// Deduplicate after sorting; adjacent duplicates are the only kind left.
fn sort_and_dedup(db: &Database, cells: Vec<CellId>) -> Vec<CellId> {
    cells
        .into_iter()
        .sorted_by(|&a, &b| db.cell_area(a).total_cmp(&db.cell_area(b)).then(a.cmp(&b)))
        .dedup()
        .collect()
}
