//! Physical-synthesis repair transforms.
//!
//! The library side of the optimizer: a Van Ginneken buffering engine
//! with driver resizing, a basic electrical-repair sweep, and
//! critical-path pin swapping, all operating on a
//! [`netopt_db::Database`] and invocable through the
//! [`TransformRegistry`] with raw argument vectors.

mod buffer;
mod curator;
mod engine;
mod error;
mod registry;
mod transforms;

pub use buffer::{BufferSolution, BufferTree};
pub use curator::{
    BufferSelection, ClusterGranularity, ClusterPolicy, CurationPolicy, InverterSelection,
    WorkingLibrary, curate,
};
pub use engine::{BufferConfig, BufferEngine};
pub use error::TransformError;
pub use registry::{Transform, TransformRegistry};
pub use transforms::{BufferResizeTransform, PinSwapTransform, TimingBufferTransform};
