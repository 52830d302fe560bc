//! Loop records and the program-wide loop collection.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{
        dataflow::{DominatorSets, LivenessResult, ReachingDefsResult},
        induction::{InductionTable, InductionVariable},
    },
    ir::{InstId, Method, MethodId, LoopId, VarId},
    utils::BitSet,
    Result,
};

/// How the reaching definitions of one operand split relative to a loop.
///
/// This is the single primitive behind operand invariance checks, both for
/// loop invariant identification and for induction variable classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReachCounts {
    /// Definitions inside the loop.
    pub in_loop: usize,
    /// Definitions outside the loop.
    pub out_of_loop: usize,
    /// Definitions inside the loop that are loop invariant.
    pub by_invariant: usize,
}

impl ReachCounts {
    /// Returns `true` if the operand has the same value on every iteration:
    /// either no definition inside the loop reaches it, or exactly one
    /// invariant in-loop definition does and nothing from outside.
    #[must_use]
    pub const fn is_loop_invariant(&self) -> bool {
        self.in_loop == 0 || (self.out_of_loop == 0 && self.in_loop == 1 && self.by_invariant == 1)
    }
}

/// A natural loop of one method.
#[derive(Debug, Clone)]
pub struct Loop {
    /// Position in the owning [`LoopSet`].
    pub id: LoopId,
    /// Method containing the loop.
    pub method: MethodId,
    /// Loop header. Every back edge targets it.
    pub header: InstId,
    /// Member instructions, header included.
    pub instructions: BitSet,
    /// Sources of the back edges, ascending.
    pub backedges: Vec<InstId>,
    /// Members with a successor outside the loop, ascending.
    pub exits: Vec<InstId>,
    /// Loop invariant members.
    pub invariants: BitSet,
    /// Immediate sub-loops, possibly in other methods.
    pub sub_loops: BTreeSet<LoopId>,
    /// Induction variables, once classified.
    pub induction: Option<InductionTable>,
}

impl Loop {
    /// Creates a loop with only its header as member.
    #[must_use]
    pub fn new(method: MethodId, header: InstId, instruction_count: usize) -> Self {
        let mut instructions = BitSet::new(instruction_count);
        instructions.insert(header.index());
        Self {
            id: LoopId::new(0),
            method,
            header,
            instructions,
            backedges: Vec::new(),
            exits: Vec::new(),
            invariants: BitSet::new(instruction_count),
            sub_loops: BTreeSet::new(),
            induction: None,
        }
    }

    /// Returns `true` if `inst` belongs to the loop.
    #[must_use]
    pub fn contains(&self, inst: InstId) -> bool {
        self.instructions.contains(inst.index())
    }

    /// Number of member instructions.
    #[must_use]
    pub fn size(&self) -> usize {
        self.instructions.count()
    }

    /// Back edge sources.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the loop has no members or does not
    /// contain its own header.
    pub fn backedges(&self) -> Result<&[InstId]> {
        self.check()?;
        Ok(&self.backedges)
    }

    /// Number of back edges.
    #[must_use]
    pub fn number_of_backedges(&self) -> usize {
        self.backedges.len()
    }

    /// Exit instructions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a malformed loop.
    pub fn exit_instructions(&self) -> Result<&[InstId]> {
        self.check()?;
        Ok(&self.exits)
    }

    /// Returns `true` if `inst` is an exit of the loop.
    #[must_use]
    pub fn is_an_exit_instruction(&self, inst: InstId) -> bool {
        self.exits.binary_search(&inst).is_ok()
    }

    /// Returns `true` if `inst` is loop invariant.
    #[must_use]
    pub fn is_an_invariant_instruction(&self, inst: InstId) -> bool {
        self.invariants.contains(inst.index())
    }

    /// Returns `true` if every definition of `var` inside the loop is loop
    /// invariant. A variable not defined inside the loop is invariant.
    #[must_use]
    pub fn is_an_invariant_variable(&self, liveness: &LivenessResult, var: VarId) -> bool {
        liveness
            .definitions_of(var)
            .iter()
            .filter(|def| self.contains(**def))
            .all(|def| self.is_an_invariant_instruction(*def))
    }

    /// Induction variable record of `var`, if classified.
    #[must_use]
    pub fn induction_variable(&self, var: VarId) -> Option<&InductionVariable> {
        self.induction.as_ref()?.get(var)
    }

    /// Returns `true` if `var` is a basic or derived induction variable.
    #[must_use]
    pub fn is_an_induction_variable(&self, var: VarId) -> bool {
        self.induction_variable(var).is_some()
    }

    /// Returns `true` if the chains of `a` and `b` meet at a common basis.
    #[must_use]
    pub fn has_shared_parent_induction_variable(&self, a: VarId, b: VarId) -> bool {
        if a == b {
            return true;
        }
        self.induction
            .as_ref()
            .is_some_and(|table| table.shares_parent(a, b))
    }

    /// Returns `true` if the loop has the shape of a while loop: the header
    /// predominates every member and no back edge source leaves the loop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a malformed loop.
    pub fn is_a_while_loop(&self, dominators: &DominatorSets) -> Result<bool> {
        self.check()?;
        let header_dominates = self
            .instructions
            .iter()
            .all(|i| dominators.is_predominator(self.header, InstId::new(i)));
        let exiting_latch = self.backedges.iter().any(|b| self.is_an_exit_instruction(*b));
        Ok(header_dominates && !exiting_latch)
    }

    /// Call instructions inside the loop, ascending.
    #[must_use]
    pub fn call_instructions_within_loop(&self, method: &Method) -> Vec<InstId> {
        self.instructions
            .iter()
            .map(InstId::new)
            .filter(|id| {
                method
                    .instruction(*id)
                    .is_some_and(|inst| inst.opcode.is_call())
            })
            .collect()
    }

    /// Splits the definitions of `var` reaching `inst` into in-loop,
    /// out-of-loop and invariant in-loop definitions.
    #[must_use]
    pub fn reaching_counts(
        &self,
        reaching: &ReachingDefsResult,
        inst: InstId,
        var: VarId,
    ) -> ReachCounts {
        let mut counts = ReachCounts::default();
        for def in reaching.reaching_definitions_of(inst, var) {
            if self.contains(def) {
                counts.in_loop += 1;
                if self.is_an_invariant_instruction(def) {
                    counts.by_invariant += 1;
                }
            } else {
                counts.out_of_loop += 1;
            }
        }
        counts
    }

    fn check(&self) -> Result<()> {
        if self.instructions.is_empty() {
            return Err(malformed_error!(
                "loop {} of method {} has no instructions",
                self.id.index(),
                self.method.index()
            ));
        }
        if !self.contains(self.header) {
            return Err(malformed_error!(
                "loop {} does not contain its header {}",
                self.id.index(),
                self.header.index()
            ));
        }
        Ok(())
    }
}

/// Every loop of the program, indexed by [`LoopId`].
#[derive(Debug, Clone, Default)]
pub struct LoopSet {
    loops: Vec<Loop>,
    by_method: BTreeMap<MethodId, Vec<LoopId>>,
}

impl LoopSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `lp`, assigning its identifier.
    pub fn push(&mut self, mut lp: Loop) -> LoopId {
        let id = LoopId::new(self.loops.len());
        lp.id = id;
        self.by_method.entry(lp.method).or_default().push(id);
        self.loops.push(lp);
        id
    }

    /// Number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns `true` if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the loop `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLoop`] if `id` is out of range.
    pub fn get(&self, id: LoopId) -> Result<&Loop> {
        self.loops.get(id.index()).ok_or(crate::Error::UnknownLoop(id))
    }

    /// Returns the loop `id` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLoop`] if `id` is out of range.
    pub fn get_mut(&mut self, id: LoopId) -> Result<&mut Loop> {
        self.loops
            .get_mut(id.index())
            .ok_or(crate::Error::UnknownLoop(id))
    }

    /// Iterates over all loops.
    pub fn iter(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    /// Iterates over all loops mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Loop> {
        self.loops.iter_mut()
    }

    /// Loops of `method`, ordered by header.
    #[must_use]
    pub fn loops_of(&self, method: MethodId) -> &[LoopId] {
        self.by_method.get(&method).map_or(&[], Vec::as_slice)
    }

    /// Methods with at least one loop, ascending.
    #[must_use]
    pub fn methods_with_loops(&self) -> Vec<MethodId> {
        self.by_method.keys().copied().collect()
    }

    /// The loop whose header is `header`.
    #[must_use]
    pub fn loop_with_header(&self, method: MethodId, header: InstId) -> Option<&Loop> {
        self.loops_of(method)
            .iter()
            .map(|id| &self.loops[id.index()])
            .find(|lp| lp.header == header)
    }

    /// The innermost loop of `method` containing `inst`.
    #[must_use]
    pub fn loop_nesting_of_instruction(&self, method: MethodId, inst: InstId) -> Option<LoopId> {
        self.loops_of(method)
            .iter()
            .map(|id| &self.loops[id.index()])
            .filter(|lp| lp.contains(inst))
            .min_by_key(|lp| (lp.size(), lp.header))
            .map(|lp| lp.id)
    }

    /// Every loop listing `id` as an immediate sub-loop.
    #[must_use]
    pub fn immediate_parents(&self, id: LoopId) -> Vec<LoopId> {
        self.loops
            .iter()
            .filter(|lp| lp.sub_loops.contains(&id))
            .map(|lp| lp.id)
            .collect()
    }

    /// The immediate parent of `id` inside its own method.
    #[must_use]
    pub fn parent_loop_within_method(&self, id: LoopId) -> Option<LoopId> {
        let method = self.loops.get(id.index())?.method;
        self.immediate_parents(id)
            .into_iter()
            .find(|p| self.loops[p.index()].method == method)
    }

    /// Returns `true` if `sub` is nested, at any depth, inside `outer`.
    #[must_use]
    pub fn is_a_sub_loop(&self, outer: LoopId, sub: LoopId) -> bool {
        let mut visited = BitSet::new(self.loops.len());
        let mut stack = vec![outer];
        while let Some(current) = stack.pop() {
            let Some(lp) = self.loops.get(current.index()) else {
                continue;
            };
            for &child in &lp.sub_loops {
                if child == sub {
                    return true;
                }
                if child.index() < self.loops.len() && visited.insert(child.index()) {
                    stack.push(child);
                }
            }
        }
        false
    }

    /// Returns `true` if `id` is nested inside itself, which recursion
    /// through call sites inside loops produces.
    #[must_use]
    pub fn is_self_called_loop(&self, id: LoopId) -> bool {
        self.is_a_sub_loop(id, id)
    }

    /// Length of the longest chain of parents above `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CyclicNesting`] if the parents of `id` form a cycle,
    /// and [`crate::Error::UnknownLoop`] for an unknown identifier.
    pub fn depth(&self, id: LoopId) -> Result<usize> {
        self.get(id)?;
        let mut depth = 0;
        let mut frontier = vec![id];
        let mut visited = BitSet::new(self.loops.len());
        visited.insert(id.index());
        loop {
            let mut next = Vec::new();
            for current in &frontier {
                for parent in self.immediate_parents(*current) {
                    if parent == id {
                        return Err(crate::Error::CyclicNesting(id));
                    }
                    if visited.insert(parent.index()) {
                        next.push(parent);
                    }
                }
            }
            if next.is_empty() {
                return Ok(depth);
            }
            depth += 1;
            frontier = next;
        }
    }

    /// Loops of `method` without a parent inside `method`.
    #[must_use]
    pub fn outermost_loops_within_method(&self, method: MethodId) -> Vec<LoopId> {
        self.loops_of(method)
            .iter()
            .copied()
            .filter(|id| self.parent_loop_within_method(*id).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(method: usize, header: usize, members: &[usize]) -> Loop {
        let mut lp = Loop::new(MethodId::new(method), InstId::new(header), 16);
        for m in members {
            lp.instructions.insert(*m);
        }
        lp
    }

    #[test]
    fn test_nesting_queries() {
        let mut set = LoopSet::new();
        let outer = set.push(body(0, 1, &[1, 2, 3, 4, 5]));
        let inner = set.push(body(0, 2, &[2, 3]));
        let callee = set.push(body(1, 0, &[0, 1]));
        set.get_mut(outer).unwrap().sub_loops.insert(inner);
        set.get_mut(inner).unwrap().sub_loops.insert(callee);

        assert_eq!(set.immediate_parents(inner), vec![outer]);
        assert!(set.is_a_sub_loop(outer, callee));
        assert!(!set.is_a_sub_loop(callee, outer));
        assert_eq!(set.parent_loop_within_method(inner), Some(outer));
        assert_eq!(set.parent_loop_within_method(callee), None);
        assert_eq!(set.depth(callee).unwrap(), 2);
        assert_eq!(
            set.loop_nesting_of_instruction(MethodId::new(0), InstId::new(3)),
            Some(inner)
        );
        assert_eq!(set.outermost_loops_within_method(MethodId::new(0)), vec![outer]);
        assert_eq!(set.methods_with_loops(), vec![MethodId::new(0), MethodId::new(1)]);
    }

    #[test]
    fn test_cyclic_nesting_is_guarded() {
        let mut set = LoopSet::new();
        let a = set.push(body(0, 0, &[0, 1]));
        let b = set.push(body(1, 0, &[0, 1]));
        set.get_mut(a).unwrap().sub_loops.insert(b);
        set.get_mut(b).unwrap().sub_loops.insert(a);

        assert!(set.is_self_called_loop(a));
        assert!(set.is_a_sub_loop(a, b));
        assert!(matches!(set.depth(a), Err(crate::Error::CyclicNesting(_))));
    }

    #[test]
    fn test_malformed_loop() {
        let mut lp = body(0, 3, &[]);
        lp.instructions.clear();
        assert!(matches!(lp.backedges(), Err(crate::Error::Malformed { .. })));

        let mut headless = body(0, 3, &[4, 5]);
        headless.instructions.remove(3);
        assert!(headless.exit_instructions().is_err());
    }

    #[test]
    fn test_reach_counts_invariance() {
        let outside = ReachCounts {
            in_loop: 0,
            out_of_loop: 2,
            by_invariant: 0,
        };
        assert!(outside.is_loop_invariant());
        let single_invariant = ReachCounts {
            in_loop: 1,
            out_of_loop: 0,
            by_invariant: 1,
        };
        assert!(single_invariant.is_loop_invariant());
        let mixed = ReachCounts {
            in_loop: 1,
            out_of_loop: 1,
            by_invariant: 1,
        };
        assert!(!mixed.is_loop_invariant());
    }
}
