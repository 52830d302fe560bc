//! Round-robin bit-vector data flow solver.
//!
//! # Algorithm
//!
//! 1. Initialize every `in` and `out` fact with the problem's initial value
//! 2. Set the boundary value at the entry (forward) or at the exits (backward)
//! 3. Sweep over all instructions, in ascending identifier order for forward
//!    problems and descending order for backward ones, recomputing the
//!    combined fact and applying the transfer function
//! 4. Repeat until a sweep changes no bit
//! 5. Call the finalize hook
//!
//! The sweep order only affects how fast the fixed point is reached: the
//! transfer functions are monotone over a finite lattice, so every order
//! converges to the same solution.

use crate::{
    analysis::dataflow::framework::{AnalysisResults, DataFlowAnalysis, Direction},
    ir::{ControlFlowGraph, InstId},
    utils::BitSet,
};

/// Iterative solver for a [`DataFlowAnalysis`].
///
/// # Usage
///
/// ```rust
/// use optscope::analysis::dataflow::{DataFlowSolver, LiveVariables};
/// use optscope::ir::MethodBuilder;
///
/// let mut b = MethodBuilder::new("f");
/// let x = b.var();
/// b.mov(x, 1);
/// b.ret(Some(x.into()));
/// let method = b.build();
/// let cfg = method.cfg()?;
///
/// let results = DataFlowSolver::new(LiveVariables::new(&method)).solve(&cfg);
/// assert!(results.out_states[0].contains(x.index()));
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct DataFlowSolver<A: DataFlowAnalysis> {
    /// The analysis being solved.
    analysis: A,
    /// Optional cap on the number of sweeps.
    max_sweeps: Option<usize>,
}

impl<A: DataFlowAnalysis> DataFlowSolver<A> {
    /// Creates a new solver for the given analysis.
    #[must_use]
    pub fn new(analysis: A) -> Self {
        Self {
            analysis,
            max_sweeps: None,
        }
    }

    /// Stops after `sweeps` sweeps even if the fixed point was not reached.
    ///
    /// Intermediate results are only useful to observe convergence.
    #[must_use]
    pub fn max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_sweeps = Some(sweeps);
        self
    }

    /// Caps the number of sweeps if `sweeps` is `Some`.
    #[must_use]
    pub fn with_limit(mut self, sweeps: Option<usize>) -> Self {
        self.max_sweeps = sweeps;
        self
    }

    /// Solves the problem over `cfg`.
    pub fn solve(self, cfg: &ControlFlowGraph) -> AnalysisResults {
        self.solve_with_analysis(cfg).1
    }

    /// Solves the problem and hands the analysis back after `finalize`.
    pub fn solve_with_analysis(mut self, cfg: &ControlFlowGraph) -> (A, AnalysisResults) {
        let count = cfg.len();
        let initial = self.analysis.initial();
        let boundary = self.analysis.boundary();

        let mut results = AnalysisResults::new(
            vec![initial.clone(); count],
            vec![initial; count],
            0,
        );

        match A::DIRECTION {
            Direction::Forward => {
                if let Some(entry) = cfg.entry() {
                    results.in_states[entry.index()] = boundary.clone();
                }
            }
            Direction::Backward => {
                for exit in cfg.exits() {
                    results.out_states[exit.index()] = boundary.clone();
                }
            }
        }

        loop {
            if self.max_sweeps.is_some_and(|max| results.sweeps >= max) {
                break;
            }
            results.sweeps += 1;

            let changed = match A::DIRECTION {
                Direction::Forward => self.sweep_forward(cfg, &boundary, &mut results),
                Direction::Backward => self.sweep_backward(cfg, &mut results),
            };
            if !changed {
                break;
            }
        }

        tracing::trace!(
            analysis = self.analysis.name(),
            instructions = count,
            sweeps = results.sweeps,
            "data flow fixed point"
        );

        self.analysis.finalize(&results, cfg);
        (self.analysis, results)
    }

    /// Returns `true` if any fact changed.
    fn sweep_forward(
        &self,
        cfg: &ControlFlowGraph,
        boundary: &BitSet,
        results: &mut AnalysisResults,
    ) -> bool {
        let entry = cfg.entry();
        let mut changed = false;
        for i in 0..cfg.len() {
            let inst = InstId::new(i);
            let preds = cfg.predecessors(inst);
            // The entry meets its boundary value with any back edges into it;
            // other instructions without predecessors keep whatever they hold.
            if Some(inst) == entry {
                if !preds.is_empty() {
                    let input = self.combine(
                        std::iter::once(boundary)
                            .chain(preds.iter().map(|p| &results.out_states[p.index()])),
                    );
                    changed |= replace(&mut results.in_states[i], input);
                }
            } else if !preds.is_empty() {
                let input = self.combine(preds.iter().map(|p| &results.out_states[p.index()]));
                changed |= replace(&mut results.in_states[i], input);
            }
            let output = self.analysis.transfer(inst, &results.in_states[i]);
            changed |= replace(&mut results.out_states[i], output);
        }
        changed
    }

    /// Returns `true` if any fact changed.
    fn sweep_backward(&self, cfg: &ControlFlowGraph, results: &mut AnalysisResults) -> bool {
        let mut changed = false;
        for i in (0..cfg.len()).rev() {
            let inst = InstId::new(i);
            let succs = cfg.successors(inst);
            if !succs.is_empty() {
                let output = self.combine(succs.iter().map(|s| &results.in_states[s.index()]));
                changed |= replace(&mut results.out_states[i], output);
            }
            let input = self.analysis.transfer(inst, &results.out_states[i]);
            changed |= replace(&mut results.in_states[i], input);
        }
        changed
    }

    fn combine<'a>(&self, facts: impl Iterator<Item = &'a BitSet>) -> BitSet {
        A::CONFLUENCE.meet_all(self.analysis.universe(), facts)
    }
}

fn replace(slot: &mut BitSet, value: BitSet) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
