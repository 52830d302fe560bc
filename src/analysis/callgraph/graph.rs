//! Call graph construction and representation.
//!
//! The [`CallGraph`] is a snapshot: it records call sites by instruction
//! position, so it must be rebuilt after a pass inserts instructions into a
//! method whose call sites are queried later.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::OnceLock,
};

use crate::{
    analysis::callgraph::{CallResolver, CallSite, CallType},
    ir::{InstId, MethodId, Program},
    utils::{BitSet, DotWriter},
    Error, Result,
};

/// Inter-procedural call graph of a [`Program`].
#[derive(Debug)]
pub struct CallGraph {
    /// Call sites per method, in instruction order.
    sites: Vec<Vec<CallSite>>,
    /// Distinct callees per method.
    callees: Vec<BTreeSet<MethodId>>,
    /// Distinct callers per method.
    callers: Vec<BTreeSet<MethodId>>,
    /// Method names, copied for diagnostics.
    names: Vec<String>,
    /// Resolver used to build this graph.
    resolver: CallResolver,
    /// Methods with no callers (lazily computed on first access).
    entry_points: OnceLock<Vec<MethodId>>,
}

impl CallGraph {
    /// Builds a call graph over every method of `program`.
    ///
    /// Construction takes each method lock once to find escaped methods and
    /// once more to collect call sites; no two locks are held at a time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if a method lock is poisoned.
    pub fn build(program: &Program) -> Result<Self> {
        let count = program.method_count();
        let mut resolver = CallResolver::empty();
        for id in program.method_ids() {
            resolver.scan(&*program.lock(id)?);
        }

        let mut sites = vec![Vec::new(); count];
        let mut callees = vec![BTreeSet::new(); count];
        let mut callers = vec![BTreeSet::new(); count];

        for caller in program.method_ids() {
            let method = program.lock(caller)?;
            for (id, inst) in method.iter() {
                let Some(call_type) = CallType::from_opcode(inst.opcode) else {
                    continue;
                };
                let targets: Vec<MethodId> = resolver
                    .resolve(inst)
                    .into_iter()
                    .filter(|t| t.index() < count)
                    .collect();
                for &target in &targets {
                    callees[caller.index()].insert(target);
                    callers[target.index()].insert(caller);
                }
                sites[caller.index()].push(CallSite {
                    caller,
                    instruction: id,
                    call_type,
                    targets,
                });
            }
        }

        tracing::debug!(
            methods = count,
            call_sites = sites.iter().map(Vec::len).sum::<usize>(),
            "built call graph"
        );

        Ok(Self {
            sites,
            callees,
            callers,
            names: program
                .method_ids()
                .map(|m| program.name(m).unwrap_or_default().to_string())
                .collect(),
            resolver,
            entry_points: OnceLock::new(),
        })
    }

    /// Number of methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.callees.len()
    }

    /// Number of distinct caller/callee pairs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.callees.iter().map(BTreeSet::len).sum()
    }

    /// Methods called by `caller`, ascending.
    #[must_use]
    pub fn callees(&self, caller: MethodId) -> Vec<MethodId> {
        self.callees
            .get(caller.index())
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Methods calling `callee`, ascending.
    #[must_use]
    pub fn callers(&self, callee: MethodId) -> Vec<MethodId> {
        self.callers
            .get(callee.index())
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Call sites of `method`, in instruction order.
    #[must_use]
    pub fn call_sites(&self, method: MethodId) -> &[CallSite] {
        self.sites.get(method.index()).map_or(&[], Vec::as_slice)
    }

    /// Resolved targets of the call at `instruction` in `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedCallee`] if `instruction` is not a call or
    /// none of its targets could be determined.
    pub fn targets(&self, method: MethodId, instruction: InstId) -> Result<&[MethodId]> {
        self.call_sites(method)
            .iter()
            .find(|s| s.instruction == instruction && !s.is_unresolved())
            .map(|s| s.targets.as_slice())
            .ok_or(Error::UnresolvedCallee {
                method,
                instruction,
            })
    }

    /// The resolver used during construction.
    #[must_use]
    pub const fn resolver(&self) -> &CallResolver {
        &self.resolver
    }

    /// Methods that no method calls.
    pub fn entry_points(&self) -> &[MethodId] {
        self.entry_points.get_or_init(|| {
            self.callers
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_empty())
                .map(|(i, _)| MethodId::new(i))
                .collect()
        })
    }

    /// Methods reachable from `root` (including `root`) in breadth-first order.
    #[must_use]
    pub fn reachable_from(&self, root: MethodId) -> Vec<MethodId> {
        let mut seen = BitSet::new(self.method_count());
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        if root.index() < self.method_count() {
            seen.insert(root.index());
            queue.push_back(root);
        }
        while let Some(m) = queue.pop_front() {
            order.push(m);
            for &callee in &self.callees[m.index()] {
                if seen.insert(callee.index()) {
                    queue.push_back(callee);
                }
            }
        }
        order
    }

    /// Returns `true` if a chain of calls leads from `from` to `to`.
    #[must_use]
    pub fn is_reachable(&self, from: MethodId, to: MethodId) -> bool {
        self.is_reachable_without_going_through(from, to, &[])
    }

    /// Returns `true` if a chain of calls leads from `from` to `to` without
    /// executing any method of `avoid` on the way.
    ///
    /// `to` itself is allowed to be in `avoid`: reaching it ends the search.
    /// Starting inside `avoid` (with `from != to`) yields `false`.
    #[must_use]
    pub fn is_reachable_without_going_through(
        &self,
        from: MethodId,
        to: MethodId,
        avoid: &[MethodId],
    ) -> bool {
        if from == to {
            return true;
        }
        if avoid.contains(&from) || from.index() >= self.method_count() {
            return false;
        }

        let mut seen = BitSet::new(self.method_count());
        let mut stack = vec![from];
        seen.insert(from.index());
        while let Some(m) = stack.pop() {
            for &callee in &self.callees[m.index()] {
                if callee == to {
                    return true;
                }
                if !avoid.contains(&callee) && seen.insert(callee.index()) {
                    stack.push(callee);
                }
            }
        }
        false
    }

    /// Renders the call graph in DOT format; entry points are filled green.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = DotWriter::new("CallGraph", title.unwrap_or("Call Graph"));
        let entries = self.entry_points();
        for (i, name) in self.names.iter().enumerate() {
            let id = MethodId::new(i);
            let fill = entries.contains(&id).then_some("lightgreen");
            dot.node(&i.to_string(), name, fill);
        }
        for (caller, callees) in self.callees.iter().enumerate() {
            for callee in callees {
                dot.edge(&caller.to_string(), &callee.index().to_string());
            }
        }
        dot.finish()
    }
}
