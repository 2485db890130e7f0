//! Commutative pin swapping along the critical path.
//!
//! Walks the worst path endpoint-to-start; at every input pin of a
//! multi-input, single-output gate it tries exchanging the pin with each
//! commutative sibling and keeps the swap only when the gate's output
//! arrival improves. Rejected swaps are undone in place, leaving the
//! netlist untouched.

use tracing::{debug, error};

use netopt_db::Database;

use crate::error::TransformError;
use crate::registry::Transform;

const HELP: &str = "Usage: transform pin_swap [true|false] \
(true enables power optimization, unsupported)";

/// Critical-path pin swapping.
#[derive(Debug, Default)]
pub struct PinSwapTransform {
    /// Swaps committed by the last run.
    pub swap_count: usize,
}

impl PinSwapTransform {
    /// Creates a transform with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn timing_pin_swap(&mut self, db: &mut Database) -> Result<usize, TransformError> {
        let mut path = db.critical_path()?;
        path.reverse();

        for point in path {
            let pin = point.pin;
            if !db.is_input(pin) {
                continue;
            }
            let Some(inst) = db.instance(pin) else {
                continue;
            };
            let input_pins = db.input_pins(inst);
            let output_pins = db.output_pins(inst);
            if input_pins.len() < 2 || output_pins.len() != 1 {
                continue;
            }
            let out_pin = output_pins[0];
            for other in input_pins {
                if other == pin || !db.is_commutative(other, pin) {
                    continue;
                }
                let current_arrival = db.arrival(out_pin, point.ap_index, point.is_rise)?;
                db.swap_pins(pin, other)?;
                let new_arrival = db.arrival(out_pin, point.ap_index, point.is_rise)?;
                if new_arrival < current_arrival {
                    debug!(
                        "accepted swap: {} <-> {}",
                        db.pin_name(pin),
                        db.pin_name(other)
                    );
                    self.swap_count += 1;
                } else {
                    db.swap_pins(pin, other)?;
                }
            }
        }
        Ok(self.swap_count)
    }
}

impl Transform for PinSwapTransform {
    fn name(&self) -> &'static str {
        "pin_swap"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn run(&mut self, db: &mut Database, args: &[String]) -> Result<usize, TransformError> {
        self.swap_count = 0;
        if args.len() > 1 {
            return Err(TransformError::Argument(
                "pin_swap takes at most one argument".to_string(),
            ));
        }
        let power_opt = match args.first().map(|a| a.to_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            Some(v) => {
                return Err(TransformError::Argument(format!(
                    "expected a boolean, got '{v}'"
                )));
            }
        };
        if power_opt {
            error!("pin swapping for power optimization is not supported yet");
            return Err(TransformError::Argument(
                "power optimization mode is not supported".to_string(),
            ));
        }
        self.timing_pin_swap(db)
    }
}
