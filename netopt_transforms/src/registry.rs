//! Transform trait and name-based dispatch.
//!
//! A scripting host addresses transforms by name with a raw argument
//! vector; the registry resolves the name, runs the transform, and folds
//! the result into the host's exit-code convention: the mutation count
//! on success, -1 on any transform-wide error.

use indexmap::IndexMap;
use tracing::error;

use netopt_db::Database;

use crate::error::TransformError;
use crate::transforms::{BufferResizeTransform, PinSwapTransform, TimingBufferTransform};

/// A named design transform invocable with a textual argument vector.
pub trait Transform {
    /// Registry name of the transform.
    fn name(&self) -> &'static str;

    /// Usage string logged on argument errors.
    fn help(&self) -> &'static str;

    /// Runs the transform, returning the number of committed mutations.
    fn run(&mut self, db: &mut Database, args: &[String]) -> Result<usize, TransformError>;
}

/// Name-indexed transform collection.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: IndexMap<String, Box<dyn Transform>>,
}

impl TransformRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the standard repair transforms installed.
    #[must_use]
    pub fn with_standard_transforms() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BufferResizeTransform::new()));
        registry.register(Box::new(TimingBufferTransform::new()));
        registry.register(Box::new(PinSwapTransform::new()));
        registry
    }

    /// Installs a transform under its own name.
    pub fn register(&mut self, transform: Box<dyn Transform>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    /// Installed transform names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    /// Runs a transform by name. Returns the mutation count, or -1 when
    /// the name is unknown or the transform fails.
    pub fn dispatch(&mut self, db: &mut Database, name: &str, args: &[String]) -> i64 {
        let Some(transform) = self.transforms.get_mut(name) else {
            error!("unknown transform '{name}'");
            return -1;
        };
        match transform.run(db, args) {
            Ok(count) => count as i64,
            Err(e) => {
                error!("{name}: {e}");
                error!("{}", transform.help());
                -1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netopt_db::timing::ElmoreTimer;
    use netopt_db::{DesignConstraints, Netlist, TechParams};

    fn empty_db() -> Database {
        let netlist = Netlist::new(TechParams {
            dbu_per_micron: 1000.0,
            resistance_per_micron: 1.0e6,
            capacitance_per_micron: 1.0e-9,
        });
        Database::new(
            netlist,
            Box::new(ElmoreTimer::new(1.0e-9)),
            DesignConstraints::default(),
        )
    }

    #[test]
    fn test_standard_names() {
        let registry = TransformRegistry::with_standard_transforms();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["buffer_resize", "timing_buffer", "pin_swap"]);
    }

    #[test]
    fn test_unknown_transform_is_minus_one() {
        let mut registry = TransformRegistry::with_standard_transforms();
        let mut db = empty_db();
        assert_eq!(registry.dispatch(&mut db, "flatten", &[]), -1);
    }

    #[test]
    fn test_argument_error_is_minus_one() {
        let mut registry = TransformRegistry::with_standard_transforms();
        let mut db = empty_db();
        let args = vec!["-bogus".to_string(), "x".to_string()];
        assert_eq!(registry.dispatch(&mut db, "timing_buffer", &args), -1);
    }

    #[test]
    fn test_pin_swap_on_empty_design() {
        let mut registry = TransformRegistry::with_standard_transforms();
        let mut db = empty_db();
        assert_eq!(registry.dispatch(&mut db, "pin_swap", &[]), 0);
    }
}
