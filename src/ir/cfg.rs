//! Instruction-level control flow graph.
//!
//! Edges are derived from the instruction stream:
//!
//! - `Return` has no successors
//! - `Branch` jumps to the position of its label
//! - `BranchIf`/`BranchIfNot` fall through and jump to the label
//! - everything else falls through to the next instruction
//!
//! The last instruction of a method that can fall through simply has no
//! successor. The entry is always the first instruction.

use std::collections::HashMap;

use crate::{
    ir::{InstId, LabelId, Method},
    Result,
};

/// Successor and predecessor adjacency of one method snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowGraph {
    successors: Vec<Vec<InstId>>,
    predecessors: Vec<Vec<InstId>>,
}

impl ControlFlowGraph {
    /// Builds the graph for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a branch targets an undefined label.
    pub fn build(method: &Method) -> Result<Self> {
        let count = method.len();
        let labels: HashMap<LabelId, InstId> = method
            .iter()
            .filter_map(|(id, inst)| inst.defined_label().map(|l| (l, id)))
            .collect();

        let mut successors = vec![Vec::new(); count];
        let mut predecessors = vec![Vec::new(); count];

        for (id, inst) in method.iter() {
            let succs = &mut successors[id.index()];
            if inst.opcode.can_fall_through() && id.index() + 1 < count {
                succs.push(InstId::new(id.index() + 1));
            }
            if let Some(target) = inst.branch_target() {
                let Some(&pos) = labels.get(&target) else {
                    return Err(malformed_error!(
                        "{}: branch at {} targets undefined label {}",
                        method.name(),
                        id.index(),
                        target.index()
                    ));
                };
                if !succs.contains(&pos) {
                    succs.push(pos);
                }
            }
            for &succ in succs.iter() {
                predecessors[succ.index()].push(id);
            }
        }

        Ok(Self {
            successors,
            predecessors,
        })
    }

    /// Number of instructions covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Returns `true` for an empty method.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// The entry instruction, if any.
    #[must_use]
    pub fn entry(&self) -> Option<InstId> {
        (!self.is_empty()).then(|| InstId::new(0))
    }

    /// Successors of `id`.
    #[must_use]
    pub fn successors(&self, id: InstId) -> &[InstId] {
        self.successors.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Predecessors of `id`, in ascending order.
    #[must_use]
    pub fn predecessors(&self, id: InstId) -> &[InstId] {
        self.predecessors.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Instructions without successors.
    pub fn exits(&self) -> impl Iterator<Item = InstId> + '_ {
        self.successors
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_empty())
            .map(|(i, _)| InstId::new(i))
    }

    /// Instructions reachable from the entry.
    #[must_use]
    pub fn reachable(&self) -> crate::utils::BitSet {
        let mut seen = crate::utils::BitSet::new(self.len());
        let mut stack: Vec<InstId> = self.entry().into_iter().collect();
        while let Some(id) = stack.pop() {
            if seen.insert(id.index()) {
                stack.extend(self.successors(id).iter().copied());
            }
        }
        seen
    }
}
