//! Data flow analysis framework trait and direction.
//!
//! Any instruction-level bit-vector problem (liveness, reaching definitions,
//! predominators, the partial redundancy elimination problems) implements
//! [`DataFlowAnalysis`] to be solved by [`super::DataFlowSolver`].

use crate::{
    analysis::dataflow::lattice::Confluence,
    ir::{ControlFlowGraph, InstId},
    utils::BitSet,
};

/// Direction of data flow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Information flows from the entry to the exits.
    ///
    /// `in[i]` combines `out[p]` over predecessors and `out[i] = transfer(i, in[i])`.
    Forward,

    /// Information flows from the exits to the entry.
    ///
    /// `out[i]` combines `in[s]` over successors and `in[i] = transfer(i, out[i])`.
    Backward,
}

/// A bit-vector data flow problem over the instructions of one method.
///
/// # Example
///
/// ```rust
/// use optscope::analysis::dataflow::{Confluence, DataFlowAnalysis, Direction};
/// use optscope::{ir::InstId, utils::BitSet};
///
/// /// Instructions that are executed on some path to the current point.
/// struct Visited(usize);
///
/// impl DataFlowAnalysis for Visited {
///     const DIRECTION: Direction = Direction::Forward;
///     const CONFLUENCE: Confluence = Confluence::Union;
///
///     fn universe(&self) -> usize { self.0 }
///     fn boundary(&self) -> BitSet { BitSet::new(self.0) }
///     fn initial(&self) -> BitSet { BitSet::new(self.0) }
///     fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
///         let mut out = input.clone();
///         out.insert(inst.index());
///         out
///     }
/// }
/// ```
pub trait DataFlowAnalysis {
    /// The direction of this analysis.
    const DIRECTION: Direction;

    /// How facts combine at merge points.
    const CONFLUENCE: Confluence;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Number of bits of each fact.
    fn universe(&self) -> usize;

    /// Fact at the boundary: `in` of the entry (forward) or `out` of every
    /// exit (backward). Boundary facts are never recomputed.
    fn boundary(&self) -> BitSet;

    /// Fact every other program point starts from.
    fn initial(&self) -> BitSet;

    /// Applies the effect of `inst` to the fact flowing into it.
    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet;

    /// Called once with the fixed point. The default does nothing.
    fn finalize(&mut self, _results: &AnalysisResults, _cfg: &ControlFlowGraph) {}
}

/// Facts before and after every instruction.
///
/// For forward problems `in` is before and `out` after the instruction;
/// backward problems keep the same naming, so `out` is the fact combined
/// from successors and `in` the one propagated to predecessors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisResults {
    /// `in` fact of each instruction.
    pub in_states: Vec<BitSet>,
    /// `out` fact of each instruction.
    pub out_states: Vec<BitSet>,
    /// Number of full sweeps performed.
    pub sweeps: usize,
}

impl AnalysisResults {
    /// Creates new analysis results with the given states.
    #[must_use]
    pub fn new(in_states: Vec<BitSet>, out_states: Vec<BitSet>, sweeps: usize) -> Self {
        Self {
            in_states,
            out_states,
            sweeps,
        }
    }

    /// Returns the `in` fact of `inst`.
    #[must_use]
    pub fn in_state(&self, inst: InstId) -> Option<&BitSet> {
        self.in_states.get(inst.index())
    }

    /// Returns the `out` fact of `inst`.
    #[must_use]
    pub fn out_state(&self, inst: InstId) -> Option<&BitSet> {
        self.out_states.get(inst.index())
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_states.len()
    }

    /// Returns `true` if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_states.is_empty()
    }
}
