//! Natural loop discovery, loop invariants and nesting.
//!
//! # Algorithm
//!
//! 1. Find back edges: `s → h` where `h` predominates `s`
//! 2. For each back edge, walk predecessors from `s` up to `h` to collect the body
//! 3. Merge loops sharing a header
//! 4. Record exits: members with a successor outside the body
//! 5. Nest loops of one method by the smallest containing body
//!
//! [`link_across_calls`] then nests the outermost loops of a callee under the
//! innermost loop that contains the call.

use std::collections::BTreeMap;

use crate::{
    analysis::{
        callgraph::CallGraph,
        dataflow::{DominatorSets, Escapes, ReachingDefsResult},
        loops::{Loop, LoopSet},
    },
    ir::{ControlFlowGraph, InstId, Method, MethodId, LoopId},
    utils::BitSet,
};

/// Discovers the natural loops of `method`, ordered by header.
#[must_use]
pub fn detect_loops(
    method: &Method,
    cfg: &ControlFlowGraph,
    dominators: &DominatorSets,
) -> Vec<Loop> {
    let count = cfg.len();
    let mut by_header: BTreeMap<InstId, Loop> = BTreeMap::new();

    for i in 0..count {
        let node = InstId::new(i);
        for &succ in cfg.successors(node) {
            if dominators.is_predominator(succ, node) {
                let lp = by_header
                    .entry(succ)
                    .or_insert_with(|| Loop::new(method.id(), succ, count));
                if !lp.backedges.contains(&node) {
                    lp.backedges.push(node);
                }
                expand_loop_body(cfg, dominators, lp, node);
            }
        }
    }

    let mut loops: Vec<Loop> = by_header.into_values().collect();
    for lp in &mut loops {
        lp.backedges.sort_unstable();
        compute_exits(cfg, lp);
    }
    loops
}

/// Adds every instruction that reaches `latch` without passing the header.
///
/// Unreachable code jumping into the body is left out.
fn expand_loop_body(
    cfg: &ControlFlowGraph,
    dominators: &DominatorSets,
    lp: &mut Loop,
    latch: InstId,
) {
    let mut worklist = vec![latch];
    while let Some(node) = worklist.pop() {
        if node == lp.header || !lp.instructions.insert(node.index()) {
            continue;
        }
        for &pred in cfg.predecessors(node) {
            if pred != lp.header
                && !lp.contains(pred)
                && dominators.is_predominator(lp.header, pred)
            {
                worklist.push(pred);
            }
        }
    }
}

fn compute_exits(cfg: &ControlFlowGraph, lp: &mut Loop) {
    lp.exits = lp
        .instructions
        .iter()
        .map(InstId::new)
        .filter(|&member| cfg.successors(member).iter().any(|s| !lp.contains(*s)))
        .collect();
}

/// Makes each loop of `method` an immediate sub-loop of the smallest other
/// loop of `method` whose body strictly contains it.
pub fn nest_within_method(loops: &mut LoopSet, method: MethodId) {
    let ids = loops.loops_of(method).to_vec();
    let mut links = Vec::new();
    for &inner in &ids {
        let Ok(inner_loop) = loops.get(inner) else {
            continue;
        };
        let parent = ids
            .iter()
            .filter(|&&outer| outer != inner)
            .filter_map(|&outer| loops.get(outer).ok())
            .filter(|outer| {
                inner_loop.instructions.is_subset(&outer.instructions)
                    && inner_loop.size() < outer.size()
            })
            .min_by_key(|outer| (outer.size(), outer.header))
            .map(|outer| outer.id);
        if let Some(parent) = parent {
            links.push((parent, inner));
        }
    }
    for (parent, inner) in links {
        if let Ok(lp) = loops.get_mut(parent) {
            lp.sub_loops.insert(inner);
        }
    }
}

/// Nests loops across call sites.
///
/// A method's *one-step* loops are its own outermost loops plus the one-step
/// loops of every method it calls from outside all of its loops. For each call
/// made inside a loop, the one-step loops of every target become sub-loops of
/// the innermost loop containing the call.
///
/// Must run after [`nest_within_method`] for every method.
pub fn link_across_calls(loops: &mut LoopSet, callgraph: &CallGraph) {
    let method_count = callgraph.method_count();
    let mut one_step: Vec<Vec<LoopId>> = (0..method_count)
        .map(|m| loops.outermost_loops_within_method(MethodId::new(m)))
        .collect();

    // Calls outside every loop forward their callees' loops to the caller.
    let mut forwarding: Vec<(MethodId, MethodId)> = Vec::new();
    let mut nesting: Vec<(LoopId, MethodId)> = Vec::new();
    for m in 0..method_count {
        let method = MethodId::new(m);
        for site in callgraph.call_sites(method) {
            match loops.loop_nesting_of_instruction(method, site.instruction) {
                Some(inner) => nesting.extend(site.targets.iter().map(|t| (inner, *t))),
                None => forwarding.extend(site.targets.iter().map(|t| (method, *t))),
            }
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &(caller, callee) in &forwarding {
            if caller == callee || callee.index() >= method_count {
                continue;
            }
            let inherited = one_step[callee.index()].clone();
            let own = &mut one_step[caller.index()];
            for lp in inherited {
                if !own.contains(&lp) {
                    own.push(lp);
                    changed = true;
                }
            }
        }
    }

    let mut linked = 0usize;
    for (inner, callee) in nesting {
        let Some(callee_loops) = one_step.get(callee.index()) else {
            continue;
        };
        if let Ok(lp) = loops.get_mut(inner) {
            for &sub in callee_loops {
                if sub != inner && lp.sub_loops.insert(sub) {
                    linked += 1;
                }
            }
        }
    }
    tracing::debug!(linked, "interprocedural loop nesting");
}

/// Marks loop invariant instructions of `lp` until nothing changes.
///
/// An instruction is invariant when it is a pure computation (an expression
/// or a move) whose result does not escape and whose variable operands are
/// each reached either only from outside the loop or by exactly one invariant
/// definition inside it.
pub fn compute_invariants(
    lp: &mut Loop,
    method: &Method,
    reaching: &ReachingDefsResult,
    escapes: &Escapes,
) {
    lp.invariants = BitSet::new(method.len());
    let members: Vec<InstId> = lp.instructions.iter().map(InstId::new).collect();
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &members {
            if lp.is_an_invariant_instruction(id) {
                continue;
            }
            let Some(inst) = method.instruction(id) else {
                continue;
            };
            let Some(result) = inst.result else {
                continue;
            };
            if !inst.opcode.is_pure() || escapes.is_escaped(result) {
                continue;
            }
            let invariant_operands = inst
                .uses()
                .all(|var| lp.reaching_counts(reaching, id, var).is_loop_invariant());
            if invariant_operands {
                lp.invariants.insert(id.index());
                changed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodBuilder;

    fn nested() -> Method {
        let mut b = MethodBuilder::new("nested");
        let i = b.var();
        let j = b.var();
        let c = b.var();
        let outer = b.label();
        let inner = b.label();
        b.mov(i, 0); // 0
        b.place(outer); // 1
        b.mov(j, 0); // 2
        b.place(inner); // 3
        b.add(j, j, 1); // 4
        b.lt(c, j, 8); // 5
        b.branch_if(c, inner); // 6
        b.add(i, i, 1); // 7
        b.lt(c, i, 8); // 8
        b.branch_if(c, outer); // 9
        b.ret(None); // 10
        b.build()
    }

    #[test]
    fn test_detect_nested_loops() {
        let method = nested();
        let cfg = method.cfg().unwrap();
        let dom = DominatorSets::compute(&cfg);
        let loops = detect_loops(&method, &cfg, &dom);

        assert_eq!(loops.len(), 2);
        let outer = &loops[0];
        let inner = &loops[1];
        assert_eq!(outer.header, InstId::new(1));
        assert_eq!(outer.backedges, vec![InstId::new(9)]);
        assert_eq!(outer.instructions.iter().collect::<Vec<_>>(), (1..=9).collect::<Vec<_>>());
        assert_eq!(outer.exits, vec![InstId::new(9)]);
        assert_eq!(inner.header, InstId::new(3));
        assert_eq!(inner.instructions.iter().collect::<Vec<_>>(), vec![3, 4, 5, 6]);

        let mut set = LoopSet::new();
        for lp in loops {
            set.push(lp);
        }
        nest_within_method(&mut set, method.id());
        let outer_id = set.loops_of(method.id())[0];
        let inner_id = set.loops_of(method.id())[1];
        assert!(set.get(outer_id).unwrap().sub_loops.contains(&inner_id));
        assert!(set.get(inner_id).unwrap().sub_loops.is_empty());
    }

    #[test]
    fn test_invariants_are_iterative() {
        let mut b = MethodBuilder::new("inv");
        let n = b.var();
        let k = b.var();
        let m = b.var();
        let i = b.var();
        let c = b.var();
        let head = b.label();
        b.mov(n, 3); // 0
        b.mov(i, 0); // 1
        b.place(head); // 2
        b.add(k, n, 1); // 3 invariant: n defined outside
        b.mul(m, k, 2); // 4 invariant through k
        b.add(i, i, m); // 5 not invariant
        b.lt(c, i, 100); // 6
        b.branch_if(c, head); // 7
        b.ret(None); // 8
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let dom = DominatorSets::compute(&cfg);
        let reaching = ReachingDefsResult::compute(&method, &cfg);
        let escapes = Escapes::compute(&method);

        let mut lp = detect_loops(&method, &cfg, &dom).remove(0);
        compute_invariants(&mut lp, &method, &reaching, &escapes);

        assert!(lp.is_an_invariant_instruction(InstId::new(3)));
        assert!(lp.is_an_invariant_instruction(InstId::new(4)));
        assert!(!lp.is_an_invariant_instruction(InstId::new(5)));
        assert!(!lp.is_an_invariant_instruction(InstId::new(6)));
    }

    #[test]
    fn test_unreachable_jump_back_is_not_a_loop() {
        let mut b = MethodBuilder::new("dead_back");
        let i = b.var();
        let l1 = b.label();
        let l2 = b.label();
        b.mov(i, 0); // 0
        b.place(l1); // 1
        b.add(i, i, 1); // 2
        b.ret(Some(i.into())); // 3
        b.place(l2); // 4
        b.branch(l1); // 5
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let dom = DominatorSets::compute(&cfg);

        assert!(detect_loops(&method, &cfg, &dom).is_empty());
    }

    #[test]
    fn test_unreachable_jump_into_body_is_excluded() {
        let mut b = MethodBuilder::new("dead_into");
        let i = b.var();
        let c = b.var();
        let head = b.label();
        let mid = b.label();
        b.mov(i, 0); // 0
        b.place(head); // 1
        b.add(i, i, 1); // 2
        b.place(mid); // 3
        b.lt(c, i, 10); // 4
        b.branch_if(c, head); // 5
        b.ret(None); // 6
        b.nop(); // 7
        b.branch(mid); // 8
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let dom = DominatorSets::compute(&cfg);
        let loops = detect_loops(&method, &cfg, &dom);

        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].instructions.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_loop_headed_at_entry() {
        let mut b = MethodBuilder::new("entry_loop");
        let i = b.var();
        let c = b.var();
        let head = b.label();
        b.place(head); // 0
        b.add(i, i, 1); // 1
        b.lt(c, i, 10); // 2
        b.branch_if(c, head); // 3
        b.ret(None); // 4
        let method = b.build();
        let cfg = method.cfg().unwrap();
        let dom = DominatorSets::compute(&cfg);
        let reaching = ReachingDefsResult::compute(&method, &cfg);
        let escapes = Escapes::compute(&method);

        let mut loops = detect_loops(&method, &cfg, &dom);
        assert_eq!(loops.len(), 1);
        let lp = &mut loops[0];
        assert_eq!(lp.header, InstId::new(0));
        assert_eq!(lp.backedges, vec![InstId::new(3)]);
        assert_eq!(lp.instructions.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        compute_invariants(lp, &method, &reaching, &escapes);
        assert!(!lp.is_an_invariant_instruction(InstId::new(1)));
        assert!(!lp.is_an_invariant_instruction(InstId::new(2)));
    }
}
