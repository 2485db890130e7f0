//! The Van Ginneken buffering engine.
//!
//! `bottom_up` walks a net's Steiner tree from the sinks toward the
//! driver, carrying a [`BufferSolution`] of non-dominated candidates per
//! point; `top_down` realizes the winning candidate by instantiating
//! repeaters and rewiring loads. Both run inside one `buffer_pin` call
//! per driver pin, and all mutation counters live on the engine so the
//! owning transform can report them.

use tracing::{debug, warn};

use netopt_db::{Database, NetId, PinId};
use netopt_steiner::{SteinerPoint, SteinerTree};

use crate::buffer::{BufferSolution, BufferTree};
use crate::curator::WorkingLibrary;
use crate::error::TransformError;

/// Per-invocation tuning of the engine.
#[derive(Clone, Copy, Debug)]
pub struct BufferConfig {
    /// Consider resizing the driving gate together with buffering.
    pub resize_gates: bool,
    /// Minimum slack gain a costed plan must bring to be committed.
    pub min_gain: f64,
    /// Area term subtracted per unit driver area during joint selection.
    pub area_penalty: f64,
    /// Gate acceptance on the slack gain over the zero-buffer baseline.
    pub gate_on_gain: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            resize_gates: false,
            min_gain: 0.0,
            area_penalty: 0.0,
            gate_on_gain: false,
        }
    }
}

/// One transform invocation's buffering state.
#[derive(Debug)]
pub struct BufferEngine {
    config: BufferConfig,
    /// Repeaters committed so far.
    pub buffer_count: usize,
    /// Driver gates resized so far.
    pub resize_count: usize,
    /// Design area including every committed mutation.
    pub current_area: f64,
    buff_name_index: usize,
    net_name_index: usize,
}

impl BufferEngine {
    /// Creates an engine starting from the design's current area.
    #[must_use]
    pub fn new(config: BufferConfig, initial_area: f64) -> Self {
        Self {
            config,
            buffer_count: 0,
            resize_count: 0,
            current_area: initial_area,
            buff_name_index: 0,
            net_name_index: 0,
        }
    }

    /// Runs the dynamic program on `pin`'s net and commits the winning
    /// plan if it passes the acceptance gate.
    pub fn buffer_pin(
        &mut self,
        db: &mut Database,
        pin: PinId,
        library: &WorkingLibrary,
    ) -> Result<(), TransformError> {
        if db.is_top_level(pin) {
            warn!("skipping top-level driver {}", db.pin_name(pin));
            return Err(TransformError::Boundary(db.pin_name(pin)));
        }
        let net = db
            .net(pin)
            .ok_or_else(|| TransformError::Topology(format!(
                "driver {} has no net",
                db.pin_name(pin)
            )))?;
        let st_tree = SteinerTree::create(db, net).map_err(|e| {
            TransformError::Topology(format!("{} on {}", e, db.pin_name(pin)))
        })?;

        let Some(mut solution) = self.bottom_up(
            db,
            &st_tree,
            st_tree.top(),
            st_tree.driver_point(),
            library,
        )?
        else {
            return Ok(());
        };
        solution.prune();
        if solution.trees().is_empty() {
            return Ok(());
        }

        let Some(inst) = db.instance(pin) else {
            return Err(TransformError::Boundary(db.pin_name(pin)));
        };
        let driver_cell = db.library_cell(inst);
        let buff_tree = if self.config.resize_gates && db.output_pins(inst).len() == 1 {
            let equivalents = db.equivalent_cells(driver_cell);
            if equivalents.len() <= 1 {
                solution.optimal_driver_tree(db, pin)
            } else {
                solution.optimal_driver_tree_with_resize(
                    db,
                    &equivalents,
                    self.config.area_penalty,
                )
            }
        } else {
            solution.optimal_driver_tree(db, pin)
        };
        let Some(buff_tree) = buff_tree else {
            return Ok(());
        };
        let replace_driver = buff_tree.driver_cell().filter(|&cell| cell != driver_cell);

        if self.config.gate_on_gain && !self.passes_gain_gate(db, pin, &solution, &buff_tree)? {
            debug!(
                "weak solution for {}: cost {} below min gain",
                db.pin_name(pin),
                buff_tree.cost()
            );
            return Ok(());
        }

        self.top_down(db, net, &buff_tree)?;
        if let Some(new_cell) = replace_driver {
            db.replace_instance(inst, new_cell)?;
            self.current_area += db.cell_area(new_cell) - db.cell_area(driver_cell);
            self.resize_count += 1;
        }
        Ok(())
    }

    /// Accept a plan when it is free, or when the slack at the driver
    /// improves over the zero-buffer baseline by at least `min_gain`.
    fn passes_gain_gate(
        &self,
        db: &Database,
        pin: PinId,
        solution: &BufferSolution,
        buff_tree: &BufferTree,
    ) -> Result<bool, TransformError> {
        let Some(baseline) = solution.baseline_tree() else {
            return Ok(true);
        };
        let old_delay = db.gate_delay(pin, baseline.total_capacitance())?;
        let old_slack = baseline.total_required() - old_delay;
        let new_delay = db.gate_delay(pin, buff_tree.total_capacitance())?;
        let new_slack = buff_tree.total_required() - new_delay;
        let gain = new_slack - old_slack;
        Ok(buff_tree.cost() <= f64::EPSILON || gain >= self.config.min_gain - f64::EPSILON)
    }

    fn bottom_up(
        &self,
        db: &mut Database,
        st_tree: &SteinerTree,
        pt: Option<SteinerPoint>,
        prev: SteinerPoint,
        library: &WorkingLibrary,
    ) -> Result<Option<BufferSolution>, TransformError> {
        let Some(pt) = pt else {
            return Ok(None);
        };
        let wire_length = db.dbu_to_meters(st_tree.distance(prev, pt));
        let wire_res = wire_length * db.resistance_per_micron();
        let wire_cap = wire_length * db.capacitance_per_micron();
        let wire_delay = wire_res * wire_cap;
        let prev_location = st_tree.location(prev);

        match st_tree.pin(pt) {
            Some(pin) if db.is_load(pin) => {
                let cap = db.pin_capacitance(pin);
                let req = db.required(pin)?;
                let mut solution = BufferSolution::with_tree(BufferTree::leaf(
                    cap,
                    req,
                    st_tree.location(pt),
                    pin,
                ));
                solution.add_wire_delay_and_capacitance(wire_delay, wire_cap);
                solution.add_leaf_trees(db, prev_location, &library.buffers, &library.inverters);
                Ok(Some(solution))
            }
            Some(_) => Ok(None),
            None => {
                let left = self.bottom_up(db, st_tree, st_tree.left(pt), pt, library)?;
                let right = self.bottom_up(db, st_tree, st_tree.right(pt), pt, library)?;
                let mut solution = match (left, right) {
                    (Some(l), Some(r)) => {
                        let mut merged = BufferSolution::merge(
                            db,
                            l,
                            r,
                            st_tree.location(pt),
                            library.reference_buffer(),
                        );
                        // Junction cross products compound; pruning here
                        // keeps the candidate sets Pareto-sized.
                        merged.prune();
                        merged
                    }
                    // Chain nodes pass the single child through.
                    (Some(l), None) => l,
                    (None, Some(r)) => r,
                    (None, None) => return Ok(None),
                };
                solution.add_wire_delay_and_capacitance(wire_delay, wire_cap);
                solution.add_leaf_trees(db, prev_location, &library.buffers, &library.inverters);
                Ok(Some(solution))
            }
        }
    }

    /// Realizes a committed plan: post-order over the candidate tree,
    /// creating repeater instances and moving loads onto the new nets.
    /// Mutations applied before a mid-realization failure stay in place.
    fn top_down(
        &mut self,
        db: &mut Database,
        net: NetId,
        tree: &BufferTree,
    ) -> Result<(), TransformError> {
        if tree.is_unbuffered() {
            let Some(pin) = tree.pin() else {
                return Ok(());
            };
            if db.net(pin) != Some(net) {
                db.move_load(pin, net)?;
            }
        } else if tree.is_buffered() {
            let cell = tree.buffer_cell().expect("buffered node carries a cell");
            let inst_name = self.unique_instance_name(db);
            let net_name = self.unique_net_name(db);
            debug!(
                "inserting {} as {} at {}",
                db.cell(cell).name,
                inst_name,
                tree.location()
            );
            let inst = db.create_instance(&inst_name, cell)?;
            let buf_net = db.create_net(&net_name)?;
            let input_port = db.buffer_input_port(cell)?;
            let output_port = db.buffer_output_port(cell)?;
            db.connect(net, inst, &input_port)?;
            db.connect(buf_net, inst, &output_port)?;
            db.set_location(inst, tree.location());
            db.calculate_parasitics(net);
            db.calculate_parasitics(buf_net);
            self.current_area += db.cell_area(cell);
            self.buffer_count += 1;
            if let Some(child) = tree.left() {
                self.top_down(db, buf_net, child)?;
            }
        } else if tree.is_branched() {
            if let Some(left) = tree.left() {
                self.top_down(db, net, left)?;
            }
            if let Some(right) = tree.right() {
                self.top_down(db, net, right)?;
            }
        }
        Ok(())
    }

    fn unique_instance_name(&mut self, db: &Database) -> String {
        loop {
            let name = format!("buff_{}", self.buff_name_index);
            self.buff_name_index += 1;
            if db.netlist().find_instance(&name).is_none() {
                return name;
            }
        }
    }

    fn unique_net_name(&mut self, db: &Database) -> String {
        loop {
            let name = format!("net_{}", self.net_name_index);
            self.net_name_index += 1;
            if db.netlist().find_net(&name).is_none() {
                return name;
            }
        }
    }
}
