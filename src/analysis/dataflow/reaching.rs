//! Reaching definitions analysis.
//!
//! A definition `d` of variable `v` *reaches* a program point `p` if there
//! is a path from `d` to `p` along which `v` is not redefined.
//!
//! # Algorithm
//!
//! Forward, union over the instruction universe:
//!
//! - `GEN[i]` = `{i}` if `i` defines a variable
//! - `KILL[i]` = every other definition of the same variable
//! - `IN[i]` = ∪{OUT[p] | p is a predecessor of i}
//! - `OUT[i]` = GEN[i] ∪ (IN[i] - KILL[i])

use crate::{
    analysis::dataflow::{
        framework::{DataFlowAnalysis, Direction},
        lattice::Confluence,
        solver::DataFlowSolver,
    },
    ir::{ControlFlowGraph, InstId, Method, VarId},
    utils::BitSet,
};

/// Reaching definitions analysis.
pub struct ReachingDefinitions {
    /// Number of instructions.
    count: usize,
    /// Definition sites of each variable.
    definitions: Vec<BitSet>,
    /// Variable defined by each instruction.
    defs: Vec<Option<VarId>>,
}

impl ReachingDefinitions {
    /// Creates a new reaching definitions analysis for `method`.
    #[must_use]
    pub fn new(method: &Method) -> Self {
        let count = method.len();
        let mut definitions = vec![BitSet::new(count); method.var_count()];
        let mut defs = Vec::with_capacity(count);
        for (id, inst) in method.iter() {
            if let Some(var) = inst.result {
                definitions[var.index()].insert(id.index());
            }
            defs.push(inst.result);
        }
        Self {
            count,
            definitions,
            defs,
        }
    }
}

impl DataFlowAnalysis for ReachingDefinitions {
    const DIRECTION: Direction = Direction::Forward;
    const CONFLUENCE: Confluence = Confluence::Union;

    fn name(&self) -> &'static str {
        "reaching-definitions"
    }

    fn universe(&self) -> usize {
        self.count
    }

    fn boundary(&self) -> BitSet {
        BitSet::new(self.count)
    }

    fn initial(&self) -> BitSet {
        BitSet::new(self.count)
    }

    fn transfer(&self, inst: InstId, input: &BitSet) -> BitSet {
        let mut out = input.clone();
        if let Some(var) = self.defs[inst.index()] {
            out.difference_with(&self.definitions[var.index()]);
            out.insert(inst.index());
        }
        out
    }
}

/// Reaching definition facts of one method.
#[derive(Debug, Clone, Default)]
pub struct ReachingDefsResult {
    reaching_in: Vec<BitSet>,
    definitions: Vec<BitSet>,
}

impl ReachingDefsResult {
    /// Computes reaching definitions of `method`.
    #[must_use]
    pub fn compute(method: &Method, cfg: &ControlFlowGraph) -> Self {
        let (analysis, results) =
            DataFlowSolver::new(ReachingDefinitions::new(method)).solve_with_analysis(cfg);
        Self {
            reaching_in: results.in_states,
            definitions: analysis.definitions,
        }
    }

    /// Definitions reaching the point before `inst`.
    #[must_use]
    pub fn reaching_in(&self, inst: InstId) -> Option<&BitSet> {
        self.reaching_in.get(inst.index())
    }

    /// Definitions of `var` reaching the point before `inst`, ascending.
    #[must_use]
    pub fn reaching_definitions_of(&self, inst: InstId, var: VarId) -> Vec<InstId> {
        let (Some(reaching), Some(defs)) = (
            self.reaching_in.get(inst.index()),
            self.definitions.get(var.index()),
        ) else {
            return Vec::new();
        };
        let mut set = reaching.clone();
        set.intersect_with(defs);
        set.iter().map(InstId::new).collect()
    }

    /// Definition sites of `var`.
    #[must_use]
    pub fn definitions_of(&self, var: VarId) -> Option<&BitSet> {
        self.definitions.get(var.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodBuilder;

    #[test]
    fn test_definitions_merge_at_loop_header() {
        let mut b = MethodBuilder::new("count");
        let i = b.var();
        let c = b.var();
        let head = b.label();
        b.mov(i, 0); // 0
        b.place(head); // 1
        b.add(i, i, 1); // 2
        b.lt(c, i, 10); // 3
        b.branch_if(c, head); // 4
        b.ret(None); // 5
        let method = b.build();
        let cfg = method.cfg().unwrap();

        let reaching = ReachingDefsResult::compute(&method, &cfg);
        assert_eq!(
            reaching.reaching_definitions_of(InstId::new(2), i),
            vec![InstId::new(0), InstId::new(2)]
        );
        assert_eq!(
            reaching.reaching_definitions_of(InstId::new(3), i),
            vec![InstId::new(2)]
        );
        assert!(reaching.reaching_definitions_of(InstId::new(0), i).is_empty());
    }
}
