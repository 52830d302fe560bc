//! Instruction predominators.
//!
//! `a` predominates `b` if every path from the entry to `b` passes through
//! `a`. The relation is reflexive. It is computed as a forward must problem
//! whose transfer function adds the instruction itself:
//! `OUT[i] = {i} ∪ ∩{OUT[p] | p is a predecessor of i}`.
//!
//! Instructions unreachable from the entry have no predominators, not even
//! themselves.

use crate::{
    analysis::dataflow::{
        framework::{DataFlowAnalysis, Direction},
        lattice::Confluence,
        solver::DataFlowSolver,
    },
    ir::{ControlFlowGraph, InstId},
    utils::BitSet,
};

/// Predominator analysis.
pub struct PreDominators {
    count: usize,
}

impl PreDominators {
    /// Creates the analysis for a method with `count` instructions.
    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self { count }
    }
}

impl DataFlowAnalysis for PreDominators {
    const DIRECTION: Direction = Direction::Forward;
    const CONFLUENCE: Confluence = Confluence::Intersection;

    fn name(&self) -> &'static str {
        "predominators"
    }

    fn universe(&self) -> usize {
        self.count
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.count)
    }

    fn initial(&self) -> BitSet {
        BitSet::full(self.count)
    }

    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
        let mut out = input.clone();
        out.insert(inst.index());
        out
    }
}

/// Predominator sets of one method.
#[derive(Debug, Clone, Default)]
pub struct DominatorSets {
    dominators: Vec<BitSet>,
}

impl DominatorSets {
    /// Computes predominators over `cfg`.
    #[must_use]
    pub fn compute(cfg: &ControlFlowGraph) -> Self {
        let results = DataFlowSolver::new(PreDominators::new(cfg.len())).solve(cfg);
        let reachable = cfg.reachable();
        let mut dominators = results.out_states;
        for (i, set) in dominators.iter_mut().enumerate() {
            if !reachable.contains(i) {
                set.clear();
            }
        }
        Self { dominators }
    }

    /// Returns `true` if `a` predominates `b`.
    #[must_use]
    pub fn is_predominator(&self, a: InstId, b: InstId) -> bool {
        self.dominators
            .get(b.index())
            .is_some_and(|d| d.contains(a.index()))
    }

    /// All predominators of `b`, including `b` itself when it is reachable.
    #[must_use]
    pub fn dominators_of(&self, b: InstId) -> Option<&BitSet> {
        self.dominators.get(b.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodBuilder;

    #[test]
    fn test_branch_arms_do_not_dominate_join() {
        let mut b = MethodBuilder::new("diamond");
        let c = b.var();
        let other = b.label();
        let join = b.label();
        b.mov(c, 1); // 0
        b.branch_if(c, other); // 1
        b.nop(); // 2
        b.branch(join); // 3
        b.place(other); // 4
        b.place(join); // 5
        b.ret(None); // 6
        let method = b.build();
        let dom = DominatorSets::compute(&method.cfg().unwrap());

        assert!(dom.is_predominator(InstId::new(1), InstId::new(6)));
        assert!(dom.is_predominator(InstId::new(6), InstId::new(6)));
        assert!(!dom.is_predominator(InstId::new(2), InstId::new(5)));
        assert!(!dom.is_predominator(InstId::new(4), InstId::new(5)));
        assert!(dom.is_predominator(InstId::new(2), InstId::new(3)));
    }

    #[test]
    fn test_unreachable_has_no_predominators() {
        let mut b = MethodBuilder::new("dead");
        let head = b.label();
        let dead = b.label();
        b.place(head); // 0
        b.nop(); // 1
        b.ret(None); // 2
        b.place(dead); // 3
        b.branch(head); // 4
        let method = b.build();
        let dom = DominatorSets::compute(&method.cfg().unwrap());

        assert!(!dom.is_predominator(InstId::new(0), InstId::new(4)));
        assert!(!dom.is_predominator(InstId::new(4), InstId::new(4)));
        assert!(dom.dominators_of(InstId::new(3)).is_some_and(BitSet::is_empty));
        assert!(dom.is_predominator(InstId::new(0), InstId::new(2)));
    }
}
