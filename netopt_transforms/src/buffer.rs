//! Candidate model for repeater insertion along a Steiner tree.
//!
//! A [`BufferTree`] is one candidate subtree rooted at a Steiner point:
//! its scalars summarize everything the dynamic program needs upstream
//! (downstream capacitance, earliest required time, inserted area).
//! A [`BufferSolution`] is the set of non-dominated candidates at one
//! point. Solutions own their candidate vector; children are shared
//! through `Rc` because one subtree can appear under many candidates.

use std::rc::Rc;

use tracing::trace;

use netopt_db::{CellId, Database, PinId, Point};

/// One candidate subtree at a Steiner point.
#[derive(Clone, Debug)]
pub struct BufferTree {
    capacitance: f64,
    required: f64,
    cost: f64,
    wire_delay: f64,
    wire_capacitance: f64,
    location: Point,
    pin: Option<PinId>,
    buffer_cell: Option<CellId>,
    driver_cell: Option<CellId>,
    baseline: bool,
    left: Option<Rc<BufferTree>>,
    right: Option<Rc<BufferTree>>,
}

impl BufferTree {
    /// The zero-buffer candidate at a load pin.
    #[must_use]
    pub fn leaf(capacitance: f64, required: f64, location: Point, pin: PinId) -> Self {
        Self {
            capacitance,
            required,
            cost: 0.0,
            wire_delay: 0.0,
            wire_capacitance: 0.0,
            location,
            pin: Some(pin),
            buffer_cell: None,
            driver_cell: None,
            baseline: true,
            left: None,
            right: None,
        }
    }

    /// A candidate that inserts `cell` in front of `child`.
    #[must_use]
    pub fn buffered(
        cell: CellId,
        location: Point,
        capacitance: f64,
        required: f64,
        cost: f64,
        child: Rc<BufferTree>,
    ) -> Self {
        Self {
            capacitance,
            required,
            cost,
            wire_delay: 0.0,
            wire_capacitance: 0.0,
            location,
            pin: None,
            buffer_cell: Some(cell),
            driver_cell: None,
            baseline: false,
            left: Some(child),
            right: None,
        }
    }

    /// A candidate joining two subtrees at a Steiner junction.
    #[must_use]
    pub fn branched(location: Point, left: Rc<BufferTree>, right: Rc<BufferTree>) -> Self {
        Self {
            capacitance: left.capacitance + right.capacitance,
            required: left.required.min(right.required),
            cost: left.cost + right.cost,
            wire_delay: 0.0,
            wire_capacitance: 0.0,
            location,
            pin: None,
            buffer_cell: None,
            driver_cell: None,
            baseline: left.baseline && right.baseline,
            left: Some(left),
            right: Some(right),
        }
    }

    /// Walks one wire segment upstream: the segment's capacitance adds
    /// to the downstream load and its delay consumes required time.
    pub fn add_wire(&mut self, wire_delay: f64, wire_capacitance: f64) {
        self.required -= wire_delay;
        self.capacitance += wire_capacitance;
        self.wire_delay += wire_delay;
        self.wire_capacitance += wire_capacitance;
    }

    /// Tags the candidate with the driver cell chosen for it.
    #[must_use]
    pub fn with_driver_cell(mut self, cell: CellId) -> Self {
        self.driver_cell = Some(cell);
        self
    }

    /// Downstream capacitance seen at this node, wire included.
    #[must_use]
    pub fn total_capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Earliest downstream required time as seen at this node.
    #[must_use]
    pub fn total_required(&self) -> f64 {
        self.required
    }

    /// Inserted repeater area in the subtree.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Accumulated upstream wire delay at this node.
    #[must_use]
    pub fn wire_delay(&self) -> f64 {
        self.wire_delay
    }

    /// Accumulated upstream wire capacitance at this node.
    #[must_use]
    pub fn wire_capacitance(&self) -> f64 {
        self.wire_capacitance
    }

    /// Location the candidate's repeater or junction sits at.
    #[must_use]
    pub fn location(&self) -> Point {
        self.location
    }

    /// Load pin at an unbuffered leaf.
    #[must_use]
    pub fn pin(&self) -> Option<PinId> {
        self.pin
    }

    /// Repeater cell inserted at this node, if any.
    #[must_use]
    pub fn buffer_cell(&self) -> Option<CellId> {
        self.buffer_cell
    }

    /// Driver sizing choice committed at the root, if any.
    #[must_use]
    pub fn driver_cell(&self) -> Option<CellId> {
        self.driver_cell
    }

    /// True when a driver sizing choice is attached.
    #[must_use]
    pub fn has_driver_cell(&self) -> bool {
        self.driver_cell.is_some()
    }

    /// True for the zero-buffer candidate (transitively unbuffered).
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.baseline
    }

    /// Leaf candidate: a bare load pin.
    #[must_use]
    pub fn is_unbuffered(&self) -> bool {
        self.buffer_cell.is_none() && self.left.is_none() && self.right.is_none()
    }

    /// Candidate wrapping one child through a repeater.
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        self.buffer_cell.is_some()
    }

    /// Candidate joining two children at a junction.
    #[must_use]
    pub fn is_branched(&self) -> bool {
        self.buffer_cell.is_none() && self.left.is_some() && self.right.is_some()
    }

    /// Left child (the only child of a buffered node).
    #[must_use]
    pub fn left(&self) -> Option<&Rc<BufferTree>> {
        self.left.as_ref()
    }

    /// Right child of a branched node.
    #[must_use]
    pub fn right(&self) -> Option<&Rc<BufferTree>> {
        self.right.as_ref()
    }

    /// Pareto dominance on `(capacitance, -required, cost)`; requires at
    /// least one strict inequality.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        self.capacitance <= other.capacitance
            && self.required >= other.required
            && self.cost <= other.cost
            && (self.capacitance < other.capacitance
                || self.required > other.required
                || self.cost < other.cost)
    }

    fn same_scalars(&self, other: &Self) -> bool {
        self.capacitance == other.capacitance
            && self.required == other.required
            && self.cost == other.cost
    }
}

/// The set of non-dominated candidates at a Steiner point.
#[derive(Clone, Debug, Default)]
pub struct BufferSolution {
    trees: Vec<BufferTree>,
}

impl BufferSolution {
    /// An empty solution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A solution seeded with one candidate.
    #[must_use]
    pub fn with_tree(tree: BufferTree) -> Self {
        Self { trees: vec![tree] }
    }

    /// Appends a candidate without re-pruning.
    pub fn add_tree(&mut self, tree: BufferTree) {
        self.trees.push(tree);
    }

    /// Current candidates.
    #[must_use]
    pub fn trees(&self) -> &[BufferTree] {
        &self.trees
    }

    /// The tagged zero-buffer candidate. The baseline is the unique
    /// zero-cost candidate, so a correct prune can never drop it.
    #[must_use]
    pub fn baseline_tree(&self) -> Option<&BufferTree> {
        self.trees.iter().find(|t| t.is_baseline())
    }

    /// Applies one upstream wire segment to every candidate.
    pub fn add_wire_delay_and_capacitance(&mut self, wire_delay: f64, wire_capacitance: f64) {
        for tree in &mut self.trees {
            tree.add_wire(wire_delay, wire_capacitance);
        }
    }

    /// Joins two child solutions at a junction: the cross product of
    /// branched candidates. `reference` (the median-area repeater of the
    /// working set) orders the emitted candidates by their estimated
    /// slack under a typical downstream driver, keeping the sweep
    /// deterministic before any prune.
    #[must_use]
    pub fn merge(
        db: &Database,
        left: BufferSolution,
        right: BufferSolution,
        junction: Point,
        reference: Option<CellId>,
    ) -> Self {
        let mut trees = Vec::with_capacity(left.trees.len() * right.trees.len());
        let right_shared: Vec<Rc<BufferTree>> =
            right.trees.into_iter().map(Rc::new).collect();
        for a in left.trees {
            let a = Rc::new(a);
            for b in &right_shared {
                trees.push(BufferTree::branched(junction, Rc::clone(&a), Rc::clone(b)));
            }
        }
        let estimate = |t: &BufferTree| -> f64 {
            match reference {
                Some(cell) => t.total_required() - db.cell_delay(cell, t.total_capacitance()),
                None => t.total_required(),
            }
        };
        trees.sort_by(|a, b| {
            estimate(b)
                .total_cmp(&estimate(a))
                .then(a.total_capacitance().total_cmp(&b.total_capacitance()))
                .then(a.cost().total_cmp(&b.cost()))
        });
        trace!("merged {} candidates at {}", trees.len(), junction);
        Self { trees }
    }

    /// Offers every repeater of the working set in front of every
    /// current candidate, at `location` (the upstream end of the wire
    /// segment just walked). Inverters come in re-inverting pairs so the
    /// net polarity is preserved. Dominated offers are not admitted.
    pub fn add_leaf_trees(
        &mut self,
        db: &Database,
        location: Point,
        buffers: &[CellId],
        inverters: &[CellId],
    ) {
        let existing = self.trees.len();
        let mut offers = Vec::new();
        for tree in &self.trees[..existing] {
            let child = Rc::new(tree.clone());
            for &cell in buffers {
                offers.push(Self::wrap(db, cell, location, Rc::clone(&child)));
            }
            for &first in inverters {
                for &second in inverters {
                    let inner = Self::wrap(db, second, location, Rc::clone(&child));
                    offers.push(Self::wrap(db, first, location, Rc::new(inner)));
                }
            }
        }
        for offer in offers {
            self.admit(offer);
        }
    }

    fn wrap(db: &Database, cell: CellId, location: Point, child: Rc<BufferTree>) -> BufferTree {
        let input_cap = db
            .cell(cell)
            .repeater_input()
            .map_or(0.0, |p| p.capacitance);
        let delay = db.cell_delay(cell, child.total_capacitance());
        let required = child.total_required() - delay;
        let cost = child.cost() + db.cell_area(cell);
        BufferTree::buffered(cell, location, input_cap, required, cost, child)
    }

    fn admit(&mut self, candidate: BufferTree) {
        if self.trees.iter().any(|t| t.dominates(&candidate)) {
            return;
        }
        self.trees.push(candidate);
    }

    /// Removes every dominated candidate and exact duplicates.
    pub fn prune(&mut self) {
        self.trees.sort_by(|a, b| {
            a.capacitance
                .total_cmp(&b.capacitance)
                .then(b.required.total_cmp(&a.required))
                .then(a.cost.total_cmp(&b.cost))
                .then(b.baseline.cmp(&a.baseline))
        });
        let mut kept: Vec<BufferTree> = Vec::with_capacity(self.trees.len());
        'outer: for tree in self.trees.drain(..) {
            for survivor in &kept {
                if survivor.dominates(&tree) || survivor.same_scalars(&tree) {
                    continue 'outer;
                }
            }
            kept.push(tree);
        }
        self.trees = kept;
    }

    /// The candidate maximizing slack at the driver,
    /// `required - gate_delay(driver, capacitance)`, ties broken toward
    /// lower cost.
    #[must_use]
    pub fn optimal_driver_tree(&self, db: &Database, driver_pin: PinId) -> Option<BufferTree> {
        let mut best: Option<(f64, usize)> = None;
        for (index, tree) in self.trees.iter().enumerate() {
            let Ok(delay) = db.gate_delay(driver_pin, tree.total_capacitance()) else {
                continue;
            };
            let slack = tree.total_required() - delay;
            let better = match best {
                None => true,
                Some((best_slack, best_index)) => {
                    slack > best_slack
                        || (slack == best_slack
                            && tree.cost() < self.trees[best_index].cost())
                }
            };
            if better {
                best = Some((slack, index));
            }
        }
        best.map(|(_, index)| self.trees[index].clone())
    }

    /// Joint driver-sizing and buffering choice: maximizes
    /// `required - delay(driver_candidate, capacitance) - area_penalty * area`,
    /// tagging the winner with the chosen driver cell.
    #[must_use]
    pub fn optimal_driver_tree_with_resize(
        &self,
        db: &Database,
        driver_candidates: &[CellId],
        area_penalty: f64,
    ) -> Option<BufferTree> {
        let mut best: Option<(f64, usize, CellId)> = None;
        for (index, tree) in self.trees.iter().enumerate() {
            for &cell in driver_candidates {
                let delay = db.cell_delay(cell, tree.total_capacitance());
                let slack =
                    tree.total_required() - delay - area_penalty * db.cell_area(cell);
                let better = match best {
                    None => true,
                    Some((best_slack, best_index, _)) => {
                        slack > best_slack
                            || (slack == best_slack
                                && tree.cost() < self.trees[best_index].cost())
                    }
                };
                if better {
                    best = Some((slack, index, cell));
                }
            }
        }
        best.map(|(_, index, cell)| self.trees[index].clone().with_driver_cell(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(cap: f64, req: f64, cost: f64) -> BufferTree {
        let mut t = BufferTree::leaf(cap, req, Point::new(0, 0), PinId::from(0usize));
        // Leaves always cost zero; fake the cost for pruning tests.
        t.cost = cost;
        t.baseline = cost == 0.0;
        t
    }

    #[test]
    fn test_wire_arithmetic() {
        let mut sol = BufferSolution::with_tree(tree(10.0, 100.0, 0.0));
        sol.add_wire_delay_and_capacitance(5.0, 3.0);
        let t = &sol.trees()[0];
        assert_eq!(t.total_capacitance(), 13.0);
        assert_eq!(t.total_required(), 95.0);
        assert_eq!(t.wire_delay(), 5.0);
        assert_eq!(t.wire_capacitance(), 3.0);
    }

    #[test]
    fn test_prune_removes_dominated() {
        let mut sol = BufferSolution::new();
        sol.add_tree(tree(10.0, 100.0, 0.0));
        // Dominated: more cap, less required, more cost.
        sol.add_tree(tree(12.0, 90.0, 1.0));
        // Incomparable: less cap but worse required and higher cost.
        sol.add_tree(tree(5.0, 80.0, 2.0));
        sol.prune();
        assert_eq!(sol.trees().len(), 2);
        assert!(sol.baseline_tree().is_some());
    }

    #[test]
    fn test_prune_no_dominated_pairs_remain() {
        let mut sol = BufferSolution::new();
        let specs = [
            (10.0, 100.0, 0.0),
            (8.0, 95.0, 1.0),
            (8.0, 99.0, 1.0),
            (6.0, 90.0, 2.0),
            (6.0, 90.0, 2.0),
            (11.0, 100.0, 0.5),
        ];
        for (cap, req, cost) in specs {
            sol.add_tree(tree(cap, req, cost));
        }
        sol.prune();
        let trees = sol.trees();
        for (i, a) in trees.iter().enumerate() {
            for (j, b) in trees.iter().enumerate() {
                if i != j {
                    assert!(!a.dominates(b), "candidate {i} dominates {j}");
                }
            }
        }
    }

    #[test]
    fn test_prune_keeps_unique_baseline() {
        let mut sol = BufferSolution::new();
        sol.add_tree(tree(10.0, 100.0, 0.0));
        sol.add_tree(tree(2.0, 120.0, 1.0));
        sol.prune();
        let baseline = sol.baseline_tree().expect("baseline survives");
        assert_eq!(baseline.total_capacitance(), 10.0);
    }

    #[test]
    fn test_branched_combines_scalars() {
        let a = Rc::new(tree(4.0, 100.0, 1.0));
        let b = Rc::new(tree(6.0, 80.0, 2.0));
        let j = BufferTree::branched(Point::new(1, 1), a, b);
        assert_eq!(j.total_capacitance(), 10.0);
        assert_eq!(j.total_required(), 80.0);
        assert_eq!(j.cost(), 3.0);
        assert!(j.is_branched());
        assert!(!j.is_baseline());
    }

    #[test]
    fn test_classification() {
        let leaf = tree(1.0, 1.0, 0.0);
        assert!(leaf.is_unbuffered());
        assert!(!leaf.is_buffered());
        let wrapped = BufferTree::buffered(
            CellId::from(0usize),
            Point::new(0, 0),
            0.5,
            0.8,
            1.0,
            Rc::new(leaf),
        );
        assert!(wrapped.is_buffered());
        assert!(!wrapped.is_branched());
        assert!(!wrapped.is_baseline());
    }
}
