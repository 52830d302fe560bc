//! Program-wide loop nest queries.

use std::collections::BTreeSet;

use crate::{
    analysis::{callgraph::CallGraph, loops::LoopSet},
    ir::{InstId, LoopId, MethodId, Program},
};

/// How hard [`LoopNest`] works to decide whether a loop is outermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Loops whose parents all live in other methods are reported as
    /// possibly outermost without a reachability query.
    Approximate,
    /// Such loops are outermost only if the program entry reaches their
    /// method without calling any method that holds a parent.
    Exact,
}

/// The loop set viewed together with the call graph and the program entry.
///
/// # Examples
///
/// ```rust
/// use optscope::analysis::{callgraph::CallGraph, loops::{LoopNest, LoopSet}};
/// use optscope::ir::{MethodBuilder, Program};
///
/// let mut program = Program::new();
/// let mut b = MethodBuilder::new("main");
/// b.ret(None);
/// let main = program.add_method(b.build());
///
/// let loops = LoopSet::new();
/// let callgraph = CallGraph::build(&program)?;
/// let nest = LoopNest::new(&loops, &callgraph, main);
/// assert!(nest.outermost_loops().is_empty());
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct LoopNest<'a> {
    loops: &'a LoopSet,
    callgraph: &'a CallGraph,
    entry: MethodId,
}

impl<'a> LoopNest<'a> {
    /// Creates a view rooted at `entry`.
    #[must_use]
    pub fn new(loops: &'a LoopSet, callgraph: &'a CallGraph, entry: MethodId) -> Self {
        Self {
            loops,
            callgraph,
            entry,
        }
    }

    /// The loop set.
    #[must_use]
    pub const fn loops(&self) -> &'a LoopSet {
        self.loops
    }

    /// Loops that are never executed inside another loop.
    #[must_use]
    pub fn outermost_loops(&self) -> Vec<LoopId> {
        self.outermost(Precision::Exact)
    }

    /// Superset of [`LoopNest::outermost_loops`] that skips the call graph
    /// reachability query.
    #[must_use]
    pub fn may_be_outermost_loops(&self) -> Vec<LoopId> {
        self.outermost(Precision::Approximate)
    }

    /// Outermost loops at the requested precision, ascending.
    #[must_use]
    pub fn outermost(&self, precision: Precision) -> Vec<LoopId> {
        self.loops
            .iter()
            .map(|lp| lp.id)
            .filter(|id| self.is_outermost(*id, precision))
            .collect()
    }

    /// Returns `true` if `id` is outermost at the requested precision.
    #[must_use]
    pub fn is_outermost(&self, id: LoopId, precision: Precision) -> bool {
        let Ok(lp) = self.loops.get(id) else {
            return false;
        };
        let parents = self.loops.immediate_parents(id);
        if parents.is_empty() {
            return true;
        }

        let mut parent_methods = Vec::new();
        for parent in parents {
            let Ok(p) = self.loops.get(parent) else {
                continue;
            };
            if p.method == lp.method {
                return false;
            }
            if !parent_methods.contains(&p.method) {
                parent_methods.push(p.method);
            }
        }
        if parent_methods.is_empty() {
            return true;
        }

        match precision {
            Precision::Approximate => true,
            Precision::Exact => self.callgraph.is_reachable_without_going_through(
                self.entry,
                lp.method,
                &parent_methods,
            ),
        }
    }

    /// Loops exactly `level` sub-loop steps below the outermost loops,
    /// ascending and without duplicates. Level 0 is the outermost set.
    #[must_use]
    pub fn loops_at_nesting_level(&self, level: usize) -> Vec<LoopId> {
        self.descend(self.outermost_loops(), level)
    }

    /// Like [`LoopNest::loops_at_nesting_level`] but skipping loops of
    /// library methods.
    #[must_use]
    pub fn program_loops_at_nesting_level(&self, program: &Program, level: usize) -> Vec<LoopId> {
        self.loops_at_nesting_level(level)
            .into_iter()
            .filter(|id| {
                self.loops
                    .get(*id)
                    .is_ok_and(|lp| !program.is_library(lp.method))
            })
            .collect()
    }

    fn descend(&self, start: Vec<LoopId>, level: usize) -> Vec<LoopId> {
        let mut frontier: BTreeSet<LoopId> = start.into_iter().collect();
        for _ in 0..level {
            frontier = frontier
                .iter()
                .filter_map(|id| self.loops.get(*id).ok())
                .flat_map(|lp| lp.sub_loops.iter().copied())
                .collect();
            if frontier.is_empty() {
                break;
            }
        }
        frontier.into_iter().collect()
    }
}

/// Orders loop members the way the loop executes them: ascending, with the
/// members that precede the header moved behind the rest.
///
/// Applying it to its own output with the same header yields the same order.
#[must_use]
pub fn sort_instructions(instructions: &[InstId], header: InstId) -> Vec<InstId> {
    let mut sorted = instructions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let split = sorted.partition_point(|id| *id < header);
    sorted.rotate_left(split);
    sorted
}
