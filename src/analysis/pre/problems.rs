//! The six bit-vector problems of lazy code motion.
//!
//! All sets range over the [`ExpressionTable`] universe. The iterative
//! problems run on [`DataFlowSolver`]; earliest and latest are pointwise.
//!
//! | Problem     | Direction | Meet | Equation                                   |
//! |-------------|-----------|------|--------------------------------------------|
//! | anticipated | backward  | ∩    | `in = gen ∪ (out − kill)`                  |
//! | available   | forward   | ∩    | `out = (anticipated.in ∪ in) − kill`       |
//! | earliest    | pointwise |      | `anticipated.in − available.in`            |
//! | postponable | forward   | ∩    | `out = (earliest ∪ in) − use`              |
//! | latest      | pointwise |      | see [`latest`]                             |
//! | used        | backward  | ∪    | `in = (use ∪ out) − latest`                |

use crate::{
    analysis::{
        dataflow::{AnalysisResults, Confluence, DataFlowAnalysis, DataFlowSolver, Direction},
        pre::expressions::ExpressionTable,
    },
    ir::{ControlFlowGraph, InstId},
    utils::BitSet,
};

/// Expressions computed on every path from a point before any operand
/// changes.
pub struct Anticipated<'a> {
    table: &'a ExpressionTable,
}

impl<'a> Anticipated<'a> {
    /// Creates the problem over `table`.
    #[must_use]
    pub fn new(table: &'a ExpressionTable) -> Self {
        Self { table }
    }
}

impl DataFlowAnalysis for Anticipated<'_> {
    const DIRECTION: Direction = Direction::Backward;
    const CONFLUENCE: Confluence = Confluence::Intersection;

    fn name(&self) -> &'static str {
        "anticipated"
    }

    fn universe(&self) -> usize {
        self.table.universe()
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.universe())
    }

    fn initial(&self) -> BitSet {
        BitSet::full(self.universe())
    }

    fn transfer(&self, inst: InstId, output: &BitSet) -> BitSet {
        let mut input = output.clone();
        input.difference_with(self.table.killed(inst));
        input.union_with(self.table.generated(inst));
        input
    }
}

/// Expressions already computed, or anticipated, on every path to a point.
pub struct Available<'a> {
    table: &'a ExpressionTable,
    anticipated_in: &'a [BitSet],
}

impl<'a> Available<'a> {
    /// Creates the problem seeded with the anticipated `in` sets.
    #[must_use]
    pub fn new(table: &'a ExpressionTable, anticipated_in: &'a [BitSet]) -> Self {
        Self {
            table,
            anticipated_in,
        }
    }
}

impl DataFlowAnalysis for Available<'_> {
    const DIRECTION: Direction = Direction::Forward;
    const CONFLUENCE: Confluence = Confluence::Intersection;

    fn name(&self) -> &'static str {
        "available"
    }

    fn universe(&self) -> usize {
        self.table.universe()
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.universe())
    }

    fn initial(&self) -> BitSet {
        BitSet::full(self.universe())
    }

    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
        let mut output = input.clone();
        output.union_with(&self.anticipated_in[inst.index()]);
        output.difference_with(self.table.killed(inst));
        output
    }
}

/// Expressions whose placement can still be delayed past a point.
pub struct Postponable<'a> {
    table: &'a ExpressionTable,
    earliest: &'a [BitSet],
}

impl<'a> Postponable<'a> {
    /// Creates the problem seeded with the earliest sets.
    #[must_use]
    pub fn new(table: &'a ExpressionTable, earliest: &'a [BitSet]) -> Self {
        Self { table, earliest }
    }
}

impl DataFlowAnalysis for Postponable<'_> {
    const DIRECTION: Direction = Direction::Forward;
    const CONFLUENCE: Confluence = Confluence::Intersection;

    fn name(&self) -> &'static str {
        "postponable"
    }

    fn universe(&self) -> usize {
        self.table.universe()
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.universe())
    }

    fn initial(&self) -> BitSet {
        BitSet::full(self.universe())
    }

    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
        let mut output = input.clone();
        output.union_with(&self.earliest[inst.index()]);
        output.difference_with(self.table.generated(inst));
        output
    }
}

/// Expressions whose value is read after a point before being placed again.
pub struct Used<'a> {
    table: &'a ExpressionTable,
    latest: &'a [BitSet],
}

impl<'a> Used<'a> {
    /// Creates the problem seeded with the latest sets.
    #[must_use]
    pub fn new(table: &'a ExpressionTable, latest: &'a [BitSet]) -> Self {
        Self { table, latest }
    }
}

impl DataFlowAnalysis for Used<'_> {
    const DIRECTION: Direction = Direction::Backward;
    const CONFLUENCE: Confluence = Confluence::Union;

    fn name(&self) -> &'static str {
        "used"
    }

    fn universe(&self) -> usize {
        self.table.universe()
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.universe())
    }

    fn initial(&self) -> BitSet {
        BitSet::new(self.universe())
    }

    fn transfer(&self, inst: InstId, output: &BitSet) -> BitSet {
        let mut input = output.clone();
        input.union_with(self.table.generated(inst));
        input.difference_with(&self.latest[inst.index()]);
        input
    }
}

/// `earliest = anticipated.in − available.in`
#[must_use]
pub fn earliest(anticipated: &AnalysisResults, available: &AnalysisResults) -> Vec<BitSet> {
    anticipated
        .in_states
        .iter()
        .zip(&available.in_states)
        .map(|(ant, avail)| {
            let mut set = ant.clone();
            set.difference_with(avail);
            set
        })
        .collect()
}

/// `latest = (earliest ∪ postponable.in) ∩ (¬(∩ succ (earliest ∪ postponable.in)) ∪ use)`
///
/// The intersection over an instruction without successors is the full set.
#[must_use]
pub fn latest(
    table: &ExpressionTable,
    cfg: &ControlFlowGraph,
    earliest: &[BitSet],
    postponable: &AnalysisResults,
) -> Vec<BitSet> {
    let universe = table.universe();
    let frontier: Vec<BitSet> = earliest
        .iter()
        .zip(&postponable.in_states)
        .map(|(e, p)| {
            let mut set = e.clone();
            set.union_with(p);
            set
        })
        .collect();

    (0..cfg.len())
        .map(|i| {
            let inst = InstId::new(i);
            let mut after = Confluence::Intersection.meet_all(
                universe,
                cfg.successors(inst).iter().map(|s| &frontier[s.index()]),
            );
            after.negate();
            after.union_with(table.generated(inst));

            let mut set = frontier[i].clone();
            set.intersect_with(&after);
            set
        })
        .collect()
}

/// Solutions of all six problems for one method.
#[derive(Debug, Clone)]
pub struct LazyCodeMotion {
    /// Anticipated expressions.
    pub anticipated: AnalysisResults,
    /// Available expressions.
    pub available: AnalysisResults,
    /// Earliest placement points.
    pub earliest: Vec<BitSet>,
    /// Postponable expressions.
    pub postponable: AnalysisResults,
    /// Latest placement points.
    pub latest: Vec<BitSet>,
    /// Used expressions.
    pub used: AnalysisResults,
}

impl LazyCodeMotion {
    /// Solves the problems in dependency order, capping each solver at
    /// `max_sweeps` when given.
    #[must_use]
    pub fn solve(table: &ExpressionTable, cfg: &ControlFlowGraph, max_sweeps: Option<usize>) -> Self {
        let anticipated = DataFlowSolver::new(Anticipated::new(table))
            .with_limit(max_sweeps)
            .solve(cfg);
        let available = DataFlowSolver::new(Available::new(table, &anticipated.in_states))
            .with_limit(max_sweeps)
            .solve(cfg);
        let earliest = earliest(&anticipated, &available);
        let postponable = DataFlowSolver::new(Postponable::new(table, &earliest))
            .with_limit(max_sweeps)
            .solve(cfg);
        let latest = latest(table, cfg, &earliest, &postponable);
        let used = DataFlowSolver::new(Used::new(table, &latest))
            .with_limit(max_sweeps)
            .solve(cfg);

        tracing::debug!(
            anticipated = anticipated.sweeps,
            available = available.sweeps,
            postponable = postponable.sweeps,
            used = used.sweeps,
            "lazy code motion sweeps"
        );

        Self {
            anticipated,
            available,
            earliest,
            postponable,
            latest,
            used,
        }
    }

    /// Expressions to compute right before `inst`: `latest ∩ used.out`.
    #[must_use]
    pub fn placements(&self, inst: InstId) -> BitSet {
        let mut set = self.latest[inst.index()].clone();
        set.intersect_with(&self.used.out_states[inst.index()]);
        set
    }

    /// Returns `true` if the value computed by `inst` can be read from the
    /// temporary of its class: `use ∩ (¬latest ∪ used.out)` holds its bit.
    #[must_use]
    pub fn is_redundant(&self, inst: InstId) -> bool {
        let i = inst.index();
        !self.latest[i].contains(i) || self.used.out_states[i].contains(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::dataflow::Escapes, ir::MethodBuilder};

    #[test]
    fn test_fully_redundant_straight_line() {
        let mut b = MethodBuilder::new("f");
        let (x, y, r1, r2) = (b.var(), b.var(), b.var(), b.var());
        b.add(r1, x, y); // 0
        b.nop(); // 1
        b.add(r2, x, y); // 2
        b.ret(Some(r2.into())); // 3
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let table = ExpressionTable::build(&method, &Escapes::compute(&method));
        let lcm = LazyCodeMotion::solve(&table, &cfg, None);

        // Both computations are anticipated at the entry and nowhere
        // available before it.
        assert_eq!(lcm.earliest[0].iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(lcm.earliest[2].is_empty());
        assert_eq!(lcm.placements(InstId::new(0)).iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(lcm.placements(InstId::new(2)).is_empty());
        assert!(lcm.is_redundant(InstId::new(0)));
        assert!(lcm.is_redundant(InstId::new(2)));
    }

    #[test]
    fn test_single_use_is_left_alone() {
        let mut b = MethodBuilder::new("f");
        let (x, y, r) = (b.var(), b.var(), b.var());
        b.add(r, x, y);
        b.ret(Some(r.into()));
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let table = ExpressionTable::build(&method, &Escapes::compute(&method));
        let lcm = LazyCodeMotion::solve(&table, &cfg, None);

        assert!(lcm.latest[0].contains(0));
        assert!(lcm.placements(InstId::new(0)).is_empty());
        assert!(!lcm.is_redundant(InstId::new(0)));
    }

    #[test]
    fn test_problem_sweeps_are_monotone() {
        let mut b = MethodBuilder::new("loop");
        let (x, y, r, c) = (b.var(), b.var(), b.var(), b.var());
        let head = b.label();
        let done = b.label();
        b.place(head);
        b.add(r, x, y);
        b.lt(c, r, 10);
        b.branch_if_not(c, done);
        b.mov(x, r);
        b.branch(head);
        b.place(done);
        b.ret(Some(r.into()));
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let table = ExpressionTable::build(&method, &Escapes::compute(&method));

        let full = DataFlowSolver::new(Anticipated::new(&table)).solve(&cfg);
        assert!(full.sweeps <= method.len() + 1);
        let mut previous: Option<AnalysisResults> = None;
        for k in 1..=full.sweeps {
            let step = DataFlowSolver::new(Anticipated::new(&table))
                .max_sweeps(k)
                .solve(&cfg);
            if let Some(prev) = &previous {
                for (now, before) in step.in_states.iter().zip(&prev.in_states) {
                    assert!(now.is_subset(before));
                }
            }
            previous = Some(step);
        }
        assert_eq!(previous.map(|p| p.in_states), Some(full.in_states));
    }
}
