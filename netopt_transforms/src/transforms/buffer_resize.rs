//! Basic buffering and resizing sweep.
//!
//! The lighter sibling of `timing_buffer`: one capacitance pass and one
//! transition pass over the levelized driver pins, no iteration loop, no
//! gain gate, no area budget. Junction solutions are re-pruned after
//! every merge.

use indexmap::IndexSet;
use tracing::debug;

use netopt_db::{Database, PinId};

use crate::curator::{
    BufferSelection, CurationPolicy, InverterSelection, WorkingLibrary, curate,
};
use crate::engine::{BufferConfig, BufferEngine};
use crate::error::TransformError;
use crate::registry::Transform;

const HELP: &str = "Usage: transform buffer_resize -buffers (-all | <cell>+) \
[-inverters (-all | <cell>+)] [-enable_gate_resize] [-enable_inverter_pair]";

#[derive(Debug)]
struct Options {
    buffers: BufferSelection,
    inverters: InverterSelection,
    resize_gates: bool,
    use_inverter_pair: bool,
}

/// Buffer insertion and resizing for electrical repairs.
#[derive(Debug, Default)]
pub struct BufferResizeTransform {
    /// Repeaters committed by the last run.
    pub buffer_count: usize,
    /// Drivers resized by the last run.
    pub resize_count: usize,
}

impl BufferResizeTransform {
    /// Creates a transform with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(args: &[String]) -> Result<Options, TransformError> {
        if args.len() < 2 {
            return Err(TransformError::Argument(
                "expected a buffer specification".to_string(),
            ));
        }
        const KEYWORDS: &[&str] = &[
            "-buffers",
            "--buffers",
            "-inverters",
            "--inverters",
            "-enable_gate_resize",
            "--enable_gate_resize",
            "-enable_inverter_pair",
            "--enable_inverter_pair",
        ];

        let mut buffer_names = IndexSet::new();
        let mut inverter_names = IndexSet::new();
        let mut all_buffers = false;
        let mut all_inverters = false;
        let mut resize_gates = false;
        let mut use_inverter_pair = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-buffers" | "--buffers" => {
                    i += 1;
                    while i < args.len() && !KEYWORDS.contains(&args[i].as_str()) {
                        if args[i] == "-all" || args[i] == "--all" {
                            if !buffer_names.is_empty() {
                                return Err(TransformError::Argument(
                                    "-buffers -all excludes explicit names".to_string(),
                                ));
                            }
                            all_buffers = true;
                        } else if args[i].starts_with('-') {
                            return Err(TransformError::Argument(format!(
                                "unexpected flag '{}' in -buffers list",
                                args[i]
                            )));
                        } else {
                            buffer_names.insert(args[i].clone());
                        }
                        i += 1;
                    }
                }
                "-inverters" | "--inverters" => {
                    i += 1;
                    while i < args.len() && !KEYWORDS.contains(&args[i].as_str()) {
                        if args[i] == "-all" || args[i] == "--all" {
                            if !inverter_names.is_empty() {
                                return Err(TransformError::Argument(
                                    "-inverters -all excludes explicit names".to_string(),
                                ));
                            }
                            all_inverters = true;
                        } else if args[i].starts_with('-') {
                            return Err(TransformError::Argument(format!(
                                "unexpected flag '{}' in -inverters list",
                                args[i]
                            )));
                        } else {
                            inverter_names.insert(args[i].clone());
                        }
                        i += 1;
                    }
                }
                "-enable_gate_resize" | "--enable_gate_resize" => {
                    resize_gates = true;
                    i += 1;
                }
                "-enable_inverter_pair" | "--enable_inverter_pair" => {
                    use_inverter_pair = true;
                    i += 1;
                }
                unknown => {
                    return Err(TransformError::Argument(format!(
                        "unknown argument '{unknown}'"
                    )));
                }
            }
        }

        if !all_buffers && buffer_names.is_empty() {
            return Err(TransformError::Argument(
                "-buffers requires -all or at least one cell name".to_string(),
            ));
        }
        let buffers = if all_buffers {
            if !buffer_names.is_empty() {
                return Err(TransformError::Argument(
                    "-buffers -all excludes explicit names".to_string(),
                ));
            }
            BufferSelection::All
        } else {
            BufferSelection::Named(buffer_names)
        };
        let inverters = if !use_inverter_pair {
            InverterSelection::None
        } else if all_inverters {
            if !inverter_names.is_empty() {
                return Err(TransformError::Argument(
                    "-inverters -all excludes explicit names".to_string(),
                ));
            }
            InverterSelection::All
        } else if inverter_names.is_empty() {
            return Err(TransformError::Argument(
                "-enable_inverter_pair requires -inverters -all or names".to_string(),
            ));
        } else {
            InverterSelection::Named(inverter_names)
        };

        Ok(Options {
            buffers,
            inverters,
            resize_gates,
            use_inverter_pair,
        })
    }

    fn fix_violations(
        &mut self,
        db: &mut Database,
        library: &WorkingLibrary,
        engine: &mut BufferEngine,
    ) -> Result<(), TransformError> {
        for pin in db.level_driver_pins() {
            if db.violates_maximum_capacitance(pin) {
                debug!("fix max cap violation for {}", db.pin_name(pin));
                Self::repair(db, pin, library, engine)?;
            }
        }
        for pin in db.level_driver_pins() {
            if db.violates_maximum_transition(pin) {
                debug!("fix max transition violation for {}", db.pin_name(pin));
                Self::repair(db, pin, library, engine)?;
            }
        }
        Ok(())
    }

    fn repair(
        db: &mut Database,
        pin: PinId,
        library: &WorkingLibrary,
        engine: &mut BufferEngine,
    ) -> Result<(), TransformError> {
        match engine.buffer_pin(db, pin, library) {
            Ok(()) => Ok(()),
            Err(e) if e.is_recoverable() => {
                debug!("skipping {}: {}", db.pin_name(pin), e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Transform for BufferResizeTransform {
    fn name(&self) -> &'static str {
        "buffer_resize"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn run(&mut self, db: &mut Database, args: &[String]) -> Result<usize, TransformError> {
        self.buffer_count = 0;
        self.resize_count = 0;
        let options = Self::parse(args)?;
        let policy = CurationPolicy {
            buffers: options.buffers.clone(),
            inverters: options.inverters.clone(),
            cluster: None,
        };
        let library = curate(db, &policy)?;
        if library.buffers.is_empty() {
            return Err(TransformError::Argument(
                "empty buffer library".to_string(),
            ));
        }
        let mut engine = BufferEngine::new(
            BufferConfig {
                resize_gates: options.resize_gates,
                min_gain: 0.0,
                area_penalty: 0.0,
                gate_on_gain: false,
            },
            db.area(),
        );
        debug!(
            "inverter pairs {}",
            if options.use_inverter_pair {
                "enabled"
            } else {
                "disabled"
            }
        );
        self.fix_violations(db, &library, &mut engine)?;
        self.buffer_count = engine.buffer_count;
        self.resize_count = engine.resize_count;
        Ok(self.buffer_count + self.resize_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_all_buffers() {
        let options =
            BufferResizeTransform::parse(&args(&["-buffers", "-all", "-enable_gate_resize"]))
                .unwrap();
        assert_eq!(options.buffers, BufferSelection::All);
        assert!(options.resize_gates);
        assert!(!options.use_inverter_pair);
    }

    #[test]
    fn test_parse_named_buffers() {
        let options = BufferResizeTransform::parse(&args(&["-buffers", "B1", "B2"])).unwrap();
        match options.buffers {
            BufferSelection::Named(names) => assert_eq!(names.len(), 2),
            BufferSelection::All => panic!("expected named selection"),
        }
    }

    #[test]
    fn test_parse_rejects_all_plus_names() {
        assert!(BufferResizeTransform::parse(&args(&["-buffers", "B1", "-all"])).is_err());
    }

    #[test]
    fn test_parse_requires_buffers() {
        assert!(
            BufferResizeTransform::parse(&args(&["-enable_gate_resize", "-enable_inverter_pair"]))
                .is_err()
        );
    }

    #[test]
    fn test_parse_inverter_pair_needs_inverters() {
        assert!(
            BufferResizeTransform::parse(&args(&["-buffers", "-all", "-enable_inverter_pair"]))
                .is_err()
        );
        let options = BufferResizeTransform::parse(&args(&[
            "-buffers",
            "-all",
            "-inverters",
            "-all",
            "-enable_inverter_pair",
        ]))
        .unwrap();
        assert_eq!(options.inverters, InverterSelection::All);
        assert!(options.use_inverter_pair);
    }
}
