//! Live variable analysis.
//!
//! A variable is *live* at a program point if there exists a path from that
//! point to a use of the variable that doesn't pass through a definition of
//! the variable.
//!
//! # Algorithm
//!
//! This is a backward data flow analysis over the variable universe:
//!
//! - `USE[i]` = variables read by instruction `i`
//! - `DEF[i]` = the variable written by `i`, if any
//! - `OUT[i]` = ∪{IN[s] | s is a successor of i}
//! - `IN[i]` = USE[i] ∪ (OUT[i] - DEF[i])
//!
//! Besides the live sets, [`LivenessResult`] records the def/use view of
//! every instruction and the definition sites of every variable, which the
//! loop, induction and dependence analyses query.

use crate::{
    analysis::dataflow::{
        framework::{DataFlowAnalysis, Direction},
        lattice::Confluence,
        solver::DataFlowSolver,
    },
    ir::{ControlFlowGraph, InstId, Method, VarId},
    utils::BitSet,
};

/// Live variable analysis.
pub struct LiveVariables {
    /// Number of variables in the method.
    num_vars: usize,
    /// USE set of each instruction.
    use_sets: Vec<BitSet>,
    /// DEF set of each instruction.
    def_sets: Vec<BitSet>,
}

impl LiveVariables {
    /// Creates a new live variables analysis for `method`.
    #[must_use]
    pub fn new(method: &Method) -> Self {
        let num_vars = method.var_count();
        let mut use_sets = Vec::with_capacity(method.len());
        let mut def_sets = Vec::with_capacity(method.len());

        for (_, inst) in method.iter() {
            use_sets.push(BitSet::from_indices(
                num_vars,
                inst.uses().map(VarId::index),
            ));
            def_sets.push(BitSet::from_indices(
                num_vars,
                inst.result.map(VarId::index),
            ));
        }

        Self {
            num_vars,
            use_sets,
            def_sets,
        }
    }
}

impl DataFlowAnalysis for LiveVariables {
    const DIRECTION: Direction = Direction::Backward;
    const CONFLUENCE: Confluence = Confluence::Union;

    fn name(&self) -> &'static str {
        "liveness"
    }

    fn universe(&self) -> usize {
        self.num_vars
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.num_vars)
    }

    fn initial(&self) -> BitSet {
        BitSet::new(self.num_vars)
    }

    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
        let mut live = input.clone();
        live.difference_with(&self.def_sets[inst.index()]);
        live.union_with(&self.use_sets[inst.index()]);
        live
    }
}

/// Liveness facts of one method.
#[derive(Debug, Clone, Default)]
pub struct LivenessResult {
    live_in: Vec<BitSet>,
    live_out: Vec<BitSet>,
    defs: Vec<Option<VarId>>,
    uses: Vec<Vec<VarId>>,
    definitions: Vec<Vec<InstId>>,
}

impl LivenessResult {
    /// Computes liveness of `method`.
    #[must_use]
    pub fn compute(method: &Method, cfg: &ControlFlowGraph) -> Self {
        let results = DataFlowSolver::new(LiveVariables::new(method)).solve(cfg);

        let mut definitions = vec![Vec::new(); method.var_count()];
        let mut defs = Vec::with_capacity(method.len());
        let mut uses = Vec::with_capacity(method.len());
        for (id, inst) in method.iter() {
            if let Some(var) = inst.result {
                definitions[var.index()].push(id);
            }
            defs.push(inst.result);
            let mut read: Vec<VarId> = Vec::new();
            for var in inst.uses() {
                if !read.contains(&var) {
                    read.push(var);
                }
            }
            uses.push(read);
        }

        Self {
            live_in: results.in_states,
            live_out: results.out_states,
            defs,
            uses,
            definitions,
        }
    }

    /// Variables live before `inst`.
    #[must_use]
    pub fn live_in(&self, inst: InstId) -> Option<&BitSet> {
        self.live_in.get(inst.index())
    }

    /// Variables live after `inst`.
    #[must_use]
    pub fn live_out(&self, inst: InstId) -> Option<&BitSet> {
        self.live_out.get(inst.index())
    }

    /// Returns `true` if `var` is live after `inst`.
    #[must_use]
    pub fn is_live_out(&self, inst: InstId, var: VarId) -> bool {
        self.live_out(inst).is_some_and(|s| s.contains(var.index()))
    }

    /// Variable defined by `inst`.
    #[must_use]
    pub fn def(&self, inst: InstId) -> Option<VarId> {
        self.defs.get(inst.index()).copied().flatten()
    }

    /// Variables read by `inst`.
    #[must_use]
    pub fn uses(&self, inst: InstId) -> &[VarId] {
        self.uses.get(inst.index()).map_or(&[], Vec::as_slice)
    }

    /// Every instruction defining `var`.
    #[must_use]
    pub fn definitions_of(&self, var: VarId) -> &[InstId] {
        self.definitions.get(var.index()).map_or(&[], Vec::as_slice)
    }

    /// Number of instructions covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` for an empty method.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodBuilder;

    #[test]
    fn test_liveness_across_loop() {
        let mut b = MethodBuilder::new("sum");
        let i = b.var();
        let s = b.var();
        let c = b.var();
        let head = b.label();
        b.mov(i, 0); // 0
        b.mov(s, 0); // 1
        b.place(head); // 2
        b.add(s, s, i); // 3
        b.add(i, i, 1); // 4
        b.lt(c, i, 10); // 5
        b.branch_if(c, head); // 6
        b.ret(Some(s.into())); // 7
        let method = b.build();
        let cfg = method.cfg().unwrap();

        let live = LivenessResult::compute(&method, &cfg);
        // i is live around the back edge, c dies at the branch.
        assert!(live.is_live_out(InstId::new(6), i));
        assert!(!live.is_live_out(InstId::new(6), c));
        assert!(live.is_live_out(InstId::new(5), c));
        assert!(!live.live_in(InstId::new(0)).unwrap().contains(i.index()));
        assert_eq!(live.definitions_of(i), &[InstId::new(0), InstId::new(4)]);
        assert_eq!(live.def(InstId::new(3)), Some(s));
        assert_eq!(live.uses(InstId::new(3)), &[s, i]);
    }
}
