//! The full Van Ginneken repair pass: iterative capacitance and
//! transition fixing with optional driver resizing and library
//! clustering.

use indexmap::IndexSet;
use itertools::Itertools;
use tracing::{debug, info, warn};

use netopt_db::{Database, PinId};

use crate::curator::{
    BufferSelection, ClusterGranularity, ClusterPolicy, CurationPolicy, InverterSelection,
    WorkingLibrary, curate,
};
use crate::engine::{BufferConfig, BufferEngine};
use crate::error::TransformError;
use crate::registry::Transform;

const HELP: &str = "Usage: transform timing_buffer -buffers <cell>+ | \
-auto_buffer_library (single|small|medium|large|all) \
[-inverters <cell>+] [-minimize_buffer_library] \
[-use_inverting_buffer_library] [-enable_gate_resize] \
[-iterations <num>] [-min_gain <gain>] [-area_penalty <penalty>] \
[-maximum_capacitance] [-maximum_transition]";

const KEYWORDS: &[&str] = &[
    "-buffers",
    "--buffers",
    "-inverters",
    "--inverters",
    "-enable_gate_resize",
    "--enable_gate_resize",
    "-iterations",
    "--iterations",
    "-min_gain",
    "--min_gain",
    "-area_penalty",
    "--area_penalty",
    "-auto_buffer_library",
    "--auto_buffer_library",
    "-minimize_buffer_library",
    "--minimize_buffer_library",
    "-use_inverting_buffer_library",
    "--use_inverting_buffer_library",
    "-maximum_capacitance",
    "--maximum_capacitance",
    "-maximum_transition",
    "--maximum_transition",
];

#[derive(Debug)]
struct Options {
    buffer_names: IndexSet<String>,
    inverter_names: IndexSet<String>,
    cluster: Option<ClusterGranularity>,
    minimize_cluster: bool,
    use_inverting: bool,
    resize_gates: bool,
    max_iterations: usize,
    min_gain: f64,
    area_penalty: f64,
    fix_capacitance: bool,
    fix_transition: bool,
}

/// Timing-driven buffer insertion and gate resizing.
#[derive(Debug, Default)]
pub struct TimingBufferTransform {
    /// Repeaters committed by the last run.
    pub buffer_count: usize,
    /// Drivers resized by the last run.
    pub resize_count: usize,
    /// Capacitance violations encountered by the last run.
    pub capacitance_violations: usize,
    /// Transition violations encountered by the last run.
    pub transition_violations: usize,
}

impl TimingBufferTransform {
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
        let mut options = Options {
            buffer_names: IndexSet::new(),
            inverter_names: IndexSet::new(),
            cluster: None,
            minimize_cluster: false,
            use_inverting: false,
            resize_gates: false,
            max_iterations: 1,
            min_gain: 0.0,
            area_penalty: 0.0,
            fix_capacitance: false,
            fix_transition: false,
        };
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-buffers" | "--buffers" => {
                    i += 1;
                    let start = i;
                    while i < args.len() && !KEYWORDS.contains(&args[i].as_str()) {
                        if args[i].starts_with('-') {
                            return Err(TransformError::Argument(format!(
                                "unexpected flag '{}' in -buffers list",
                                args[i]
                            )));
                        }
                        options.buffer_names.insert(args[i].clone());
                        i += 1;
                    }
                    if i == start {
                        return Err(TransformError::Argument(
                            "-buffers expects at least one cell name".to_string(),
                        ));
                    }
                }
                "-inverters" | "--inverters" => {
                    i += 1;
                    let start = i;
                    while i < args.len() && !KEYWORDS.contains(&args[i].as_str()) {
                        if args[i].starts_with('-') {
                            return Err(TransformError::Argument(format!(
                                "unexpected flag '{}' in -inverters list",
                                args[i]
                            )));
                        }
                        options.inverter_names.insert(args[i].clone());
                        i += 1;
                    }
                    if i == start {
                        return Err(TransformError::Argument(
                            "-inverters expects at least one cell name".to_string(),
                        ));
                    }
                }
                "-auto_buffer_library" | "--auto_buffer_library" => {
                    i += 1;
                    let granularity = args
                        .get(i)
                        .and_then(|v| ClusterGranularity::parse(v))
                        .ok_or_else(|| {
                            TransformError::Argument(
                                "-auto_buffer_library expects one of \
                                 single|small|medium|large|all"
                                    .to_string(),
                            )
                        })?;
                    options.cluster = Some(granularity);
                    i += 1;
                }
                "-iterations" | "--iterations" => {
                    i += 1;
                    options.max_iterations = args
                        .get(i)
                        .and_then(|v| v.parse::<usize>().ok())
                        .ok_or_else(|| {
                            TransformError::Argument(
                                "-iterations expects an integer".to_string(),
                            )
                        })?;
                    i += 1;
                }
                "-min_gain" | "--min_gain" => {
                    i += 1;
                    options.min_gain = args
                        .get(i)
                        .and_then(|v| v.parse::<f64>().ok())
                        .ok_or_else(|| {
                            TransformError::Argument("-min_gain expects a number".to_string())
                        })?;
                    i += 1;
                }
                "-area_penalty" | "--area_penalty" => {
                    i += 1;
                    options.area_penalty = args
                        .get(i)
                        .and_then(|v| v.parse::<f64>().ok())
                        .ok_or_else(|| {
                            TransformError::Argument(
                                "-area_penalty expects a number".to_string(),
                            )
                        })?;
                    i += 1;
                }
                "-enable_gate_resize" | "--enable_gate_resize" => {
                    options.resize_gates = true;
                    i += 1;
                }
                "-minimize_buffer_library" | "--minimize_buffer_library" => {
                    options.minimize_cluster = true;
                    i += 1;
                }
                "-use_inverting_buffer_library" | "--use_inverting_buffer_library" => {
                    options.use_inverting = true;
                    i += 1;
                }
                "-maximum_capacitance" | "--maximum_capacitance" => {
                    options.fix_capacitance = true;
                    i += 1;
                }
                "-maximum_transition" | "--maximum_transition" => {
                    options.fix_transition = true;
                    i += 1;
                }
                unknown => {
                    return Err(TransformError::Argument(format!(
                        "unknown argument '{unknown}'"
                    )));
                }
            }
        }
        if !options.fix_capacitance && !options.fix_transition {
            options.fix_capacitance = true;
            options.fix_transition = true;
        }
        Ok(options)
    }

    fn timing_buffer(
        &mut self,
        db: &mut Database,
        options: &Options,
    ) -> Result<usize, TransformError> {
        let policy = CurationPolicy {
            buffers: BufferSelection::Named(options.buffer_names.clone()),
            inverters: if options.inverter_names.is_empty() {
                InverterSelection::None
            } else {
                InverterSelection::Named(options.inverter_names.clone())
            },
            cluster: options.cluster.map(|granularity| ClusterPolicy {
                granularity,
                minimize: options.minimize_cluster,
                use_inverting: options.use_inverting,
            }),
        };
        let library = curate(db, &policy)?;
        info!(
            "buffer library: {}",
            if library.buffers.is_empty() {
                "none".to_string()
            } else {
                library.buffers.iter().map(|&c| &db.cell(c).name).join(", ")
            }
        );
        info!(
            "inverter library: {}",
            if library.inverters.is_empty() {
                "none".to_string()
            } else {
                library
                    .inverters
                    .iter()
                    .map(|&c| &db.cell(c).name)
                    .join(", ")
            }
        );
        info!(
            "driver sizing {}",
            if options.resize_gates {
                "enabled"
            } else {
                "disabled"
            }
        );

        let mut engine = BufferEngine::new(
            BufferConfig {
                resize_gates: options.resize_gates,
                min_gain: options.min_gain,
                area_penalty: options.area_penalty,
                gate_on_gain: true,
            },
            db.area(),
        );

        for iteration in 0..options.max_iterations {
            info!("iteration {}", iteration + 1);
            let mut driver_pins = db.level_driver_pins();
            driver_pins.reverse();
            let before = (engine.buffer_count, engine.resize_count);

            if options.fix_capacitance {
                if let Err(e) =
                    self.fix_capacitance_violations(db, &driver_pins, &library, &mut engine)
                {
                    return self.stop_on(e, &engine);
                }
            }
            if options.fix_transition {
                // Account for buffers the capacitance pass just placed.
                db.reset_delays();
                if let Err(e) =
                    self.fix_transition_violations(db, &driver_pins, &library, &mut engine)
                {
                    return self.stop_on(e, &engine);
                }
            }
            if (engine.buffer_count, engine.resize_count) == before {
                debug!("no more violations or nothing bufferable");
                break;
            }
        }
        Ok(self.finish(&engine))
    }

    fn stop_on(
        &mut self,
        error: TransformError,
        engine: &BufferEngine,
    ) -> Result<usize, TransformError> {
        match error {
            TransformError::AreaExceeded => {
                warn!("maximum utilization reached");
                Ok(self.finish(engine))
            }
            other => Err(other),
        }
    }

    fn finish(&mut self, engine: &BufferEngine) -> usize {
        self.buffer_count = engine.buffer_count;
        self.resize_count = engine.resize_count;
        info!(
            "found {} maximum capacitance violations",
            self.capacitance_violations
        );
        info!(
            "found {} maximum transition violations",
            self.transition_violations
        );
        info!("placed {} buffers", self.buffer_count);
        info!("resized {} gates", self.resize_count);
        self.buffer_count + self.resize_count
    }

    fn fix_capacitance_violations(
        &mut self,
        db: &mut Database,
        driver_pins: &[PinId],
        library: &WorkingLibrary,
        engine: &mut BufferEngine,
    ) -> Result<(), TransformError> {
        debug!("fixing capacitance violations");
        let clock_nets = db.clock_nets();
        for &pin in driver_pins {
            let Some(net) = db.net(pin) else { continue };
            if clock_nets.contains(&net) {
                continue;
            }
            let violating = db
                .pins(net)
                .into_iter()
                .any(|p| db.violates_maximum_capacitance(p));
            if !violating {
                continue;
            }
            self.capacitance_violations += 1;
            debug!("fixing capacitance violation at {}", db.pin_name(pin));
            Self::repair(db, pin, library, engine)?;
            Self::check_area(db, engine)?;
        }
        Ok(())
    }

    fn fix_transition_violations(
        &mut self,
        db: &mut Database,
        driver_pins: &[PinId],
        library: &WorkingLibrary,
        engine: &mut BufferEngine,
    ) -> Result<(), TransformError> {
        debug!("fixing transition violations");
        let clock_nets = db.clock_nets();
        for &pin in driver_pins {
            let Some(net) = db.net(pin) else { continue };
            if clock_nets.contains(&net) {
                continue;
            }
            let mut violating = false;
            for p in db.pins(net) {
                if db.violates_maximum_transition(p) {
                    violating = true;
                    break;
                }
            }
            if !violating {
                continue;
            }
            self.transition_violations += 1;
            debug!("fixing transition violation at {}", db.pin_name(pin));
            Self::repair(db, pin, library, engine)?;
            Self::check_area(db, engine)?;
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

    fn check_area(db: &Database, engine: &BufferEngine) -> Result<(), TransformError> {
        match db.maximum_area() {
            Some(max) if engine.current_area > max => Err(TransformError::AreaExceeded),
            _ => Ok(()),
        }
    }
}

impl Transform for TimingBufferTransform {
    fn name(&self) -> &'static str {
        "timing_buffer"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn run(&mut self, db: &mut Database, args: &[String]) -> Result<usize, TransformError> {
        self.buffer_count = 0;
        self.resize_count = 0;
        self.capacitance_violations = 0;
        self.transition_violations = 0;
        let options = Self::parse(args)?;
        self.timing_buffer(db, &options)
    }
}
