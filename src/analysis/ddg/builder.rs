//! Interprocedural construction of the data dependence graphs.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    analysis::{
        callgraph::CallGraph,
        dataflow::{Escapes, LivenessResult},
        ddg::{
            graph::{DependenceGraph, DependenceKind},
            possible::{ConservativeAliasOracle, MayAliasOracle, PossibleDependences},
        },
    },
    config::OptimizerConfig,
    ir::{ControlFlowGraph, GlobalId, InstId, Method, MethodId, Opcode, Operand, Program, VarId},
    utils::BitSet,
    Result,
};

type LivenessProvider<'a> =
    Box<dyn Fn(MethodId, &Method) -> Result<Arc<LivenessResult>> + Send + Sync + 'a>;

/// Memory dependences of every reachable instruction, keyed by
/// `(method, instruction)`.
pub type PossibleDependenceTable = DashMap<(MethodId, InstId), PossibleDependences>;

/// Dependence graphs of every method reachable from the entry.
#[derive(Debug, Clone)]
pub struct ProgramDependences {
    entry: MethodId,
    graphs: BTreeMap<MethodId, DependenceGraph>,
}

impl ProgramDependences {
    /// The method the construction started from.
    #[must_use]
    pub const fn entry(&self) -> MethodId {
        self.entry
    }

    /// The graph of `method`, if it was reached.
    #[must_use]
    pub fn graph(&self, method: MethodId) -> Option<&DependenceGraph> {
        self.graphs.get(&method)
    }

    /// Reached methods, ascending.
    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.graphs.keys().copied()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graphs.values().map(DependenceGraph::edge_count).sum()
    }

    /// Hands out the graphs.
    #[must_use]
    pub fn into_graphs(self) -> BTreeMap<MethodId, DependenceGraph> {
        self.graphs
    }
}

/// Builds data dependence graphs for the methods reachable from the program
/// entry.
///
/// Construction runs in three phases:
///
/// - **A** asks the [`MayAliasOracle`] for the memory dependences of every
///   instruction and caches them
/// - **B** walks the call graph from the entry, skipping library methods,
///   and propagates every variable definition down to its readers and
///   redefiners and up to earlier readers and definers, merging in the
///   cached memory dependences
/// - **C** drops memory-only edges between an access to a global whose
///   address is never taken and an access through a pointer
///
/// # Examples
///
/// ```rust
/// use optscope::analysis::{callgraph::CallGraph, ddg::{DdgBuilder, DependenceKind}};
/// use optscope::ir::{InstId, MethodBuilder, Program};
///
/// let mut b = MethodBuilder::new("main");
/// let (a, t) = (b.var(), b.var());
/// b.add(t, a, 1);
/// b.ret(Some(t.into()));
/// let mut program = Program::new();
/// let main = program.add_method(b.build());
/// let callgraph = CallGraph::build(&program)?;
///
/// let deps = DdgBuilder::new(&program, &callgraph).build()?;
/// let graph = deps.graph(main).unwrap();
/// assert_eq!(graph.dependence(InstId::new(0), InstId::new(1)), Some(DependenceKind::RAW));
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct DdgBuilder<'a> {
    program: &'a Program,
    callgraph: &'a CallGraph,
    oracle: Box<dyn MayAliasOracle + 'a>,
    liveness: LivenessProvider<'a>,
    entry_names: Vec<String>,
    parallel: bool,
    adjacency: DashMap<MethodId, Arc<ControlFlowGraph>>,
}

impl<'a> DdgBuilder<'a> {
    /// Creates a builder with the conservative oracle, liveness computed on
    /// demand and the default entry names.
    #[must_use]
    pub fn new(program: &'a Program, callgraph: &'a CallGraph) -> Self {
        let config = OptimizerConfig::default();
        Self {
            program,
            callgraph,
            oracle: Box::new(ConservativeAliasOracle),
            liveness: Box::new(|_: MethodId, method: &Method| {
                Ok(Arc::new(LivenessResult::compute(method, &method.cfg()?)))
            }),
            entry_names: config.entry_names,
            parallel: config.parallel,
            adjacency: DashMap::new(),
        }
    }

    /// Takes the entry names and the parallelism switch from `config`.
    #[must_use]
    pub fn configure(mut self, config: &OptimizerConfig) -> Self {
        self.entry_names.clone_from(&config.entry_names);
        self.parallel = config.parallel;
        self
    }

    /// Replaces the memory dependence oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: impl MayAliasOracle + 'a) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Replaces how liveness is obtained for a method.
    #[must_use]
    pub fn with_liveness<F>(mut self, provider: F) -> Self
    where
        F: Fn(MethodId, &Method) -> Result<Arc<LivenessResult>> + Send + Sync + 'a,
    {
        self.liveness = Box::new(provider);
        self
    }

    /// Names tried, in order, to pick the entry method.
    #[must_use]
    pub fn entry_names(mut self, names: Vec<String>) -> Self {
        self.entry_names = names;
        self
    }

    /// Runs all three phases.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingEntryPoint`] if no entry can be chosen,
    /// [`crate::Error::UnresolvedCallee`] if a reached call has no target,
    /// and propagates lock and IR errors.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(&self) -> Result<ProgramDependences> {
        let entry = self.program.main_method(&self.entry_names)?;
        let reachable: Vec<MethodId> = self
            .callgraph
            .reachable_from(entry)
            .into_iter()
            .filter(|m| *m == entry || !self.program.is_library(*m))
            .collect();

        let possible = self.possible_dependences(&reachable)?;
        let (mut graphs, escaped_globals) = self.variable_dependences(entry, &possible)?;
        let removed = self.remove_false_global_dependences(&mut graphs, &escaped_globals)?;

        let deps = ProgramDependences { entry, graphs };
        tracing::debug!(
            methods = deps.graphs.len(),
            edges = deps.edge_count(),
            removed,
            "data dependence graphs built"
        );
        Ok(deps)
    }

    /// Phase A.
    ///
    /// # Errors
    ///
    /// Propagates lock errors.
    #[tracing::instrument(level = "debug", skip_all, fields(methods = methods.len()))]
    pub fn possible_dependences(&self, methods: &[MethodId]) -> Result<PossibleDependenceTable> {
        let table = PossibleDependenceTable::new();
        let collect = |id: &MethodId| -> Result<()> {
            let method = self.program.lock(*id)?;
            for i in 0..method.len() {
                let inst = InstId::new(i);
                if let Some(deps) = self.oracle.possible_dependences(&method, inst) {
                    if !deps.is_empty() {
                        table.insert((*id, inst), deps);
                    }
                }
            }
            Ok(())
        };
        if self.parallel {
            methods.par_iter().try_for_each(collect)?;
        } else {
            methods.iter().try_for_each(collect)?;
        }
        tracing::debug!(instructions = table.len(), "possible dependences collected");
        Ok(table)
    }

    /// Phase B. Returns the graphs and the globals whose address is taken
    /// in some reached method.
    #[tracing::instrument(level = "debug", skip_all, fields(entry = entry.index()))]
    fn variable_dependences(
        &self,
        entry: MethodId,
        possible: &PossibleDependenceTable,
    ) -> Result<(BTreeMap<MethodId, DependenceGraph>, BTreeSet<GlobalId>)> {
        let mut graphs = BTreeMap::new();
        let mut escaped_globals = BTreeSet::new();
        let mut seen = BitSet::new(self.program.method_count());
        let mut worklist = VecDeque::from([entry]);
        seen.insert(entry.index());

        while let Some(id) = worklist.pop_front() {
            let method = self.program.lock(id)?;
            if method.is_empty() {
                graphs.insert(id, DependenceGraph::new(0));
                continue;
            }

            for (inst, instruction) in method.iter() {
                if !instruction.opcode.is_call() {
                    continue;
                }
                for &callee in self.callgraph.targets(id, inst)? {
                    if !self.program.is_library(callee) && seen.insert(callee.index()) {
                        worklist.push_back(callee);
                    }
                }
            }

            let cfg = self.adjacency(id, &method)?;
            let liveness = (self.liveness)(id, &method)?;
            escaped_globals.extend(Escapes::compute(&method).escaped_globals().iter().copied());

            let mut graph = DependenceGraph::new(method.len());
            for i in 0..method.len() {
                let inst = InstId::new(i);
                if let Some(deps) = possible.get(&(id, inst)) {
                    merge_possible(&mut graph, inst, deps.value());
                }
                if let Some(var) = liveness.def(inst) {
                    propagate_down(&mut graph, &method, &liveness, &cfg, inst, var);
                    propagate_up(&mut graph, &method, &liveness, &cfg, inst, var);
                }
            }
            tracing::trace!(method = method.name(), edges = graph.edge_count(), "method dependences");
            graphs.insert(id, graph);
        }
        Ok((graphs, escaped_globals))
    }

    /// Phase C. Returns the number of edges removed.
    #[tracing::instrument(level = "debug", skip_all)]
    fn remove_false_global_dependences(
        &self,
        graphs: &mut BTreeMap<MethodId, DependenceGraph>,
        escaped_globals: &BTreeSet<GlobalId>,
    ) -> Result<usize> {
        let mut removed = 0;
        for (id, graph) in graphs.iter_mut() {
            let method = self.program.lock(*id)?;
            for (inst, instruction) in method.iter() {
                if !matches!(instruction.opcode, Opcode::LoadRel | Opcode::StoreRel) {
                    continue;
                }
                let Some(Operand::Global(global)) = instruction.memory_base() else {
                    continue;
                };
                if escaped_globals.contains(global) {
                    continue;
                }

                let false_deps: Vec<InstId> = graph
                    .depends_from(inst)
                    .filter(|(other, kind)| {
                        kind.is_memory_only()
                            && graph
                                .dependence(inst, *other)
                                .map_or(true, DependenceKind::is_memory_only)
                            && method.instruction(*other).is_some_and(|o| {
                                o.opcode.is_memory()
                                    && !matches!(o.memory_base(), Some(Operand::Global(_)))
                            })
                    })
                    .map(|(other, _)| other)
                    .collect();
                for other in false_deps {
                    removed += usize::from(graph.remove(other, inst).is_some());
                    removed += usize::from(graph.remove(inst, other).is_some());
                }
            }
        }
        Ok(removed)
    }

    fn adjacency(&self, id: MethodId, method: &Method) -> Result<Arc<ControlFlowGraph>> {
        if let Some(cfg) = self.adjacency.get(&id) {
            return Ok(Arc::clone(cfg.value()));
        }
        let cfg = Arc::new(method.cfg()?);
        self.adjacency.insert(id, Arc::clone(&cfg));
        Ok(cfg)
    }
}

fn merge_possible(graph: &mut DependenceGraph, inst: InstId, deps: &PossibleDependences) {
    for from in deps.raw.iter() {
        graph.add(InstId::new(from), inst, DependenceKind::MRAW);
    }
    for from in deps.war.iter() {
        graph.add(InstId::new(from), inst, DependenceKind::MWAR);
    }
    for from in deps.waw.iter() {
        graph.add(InstId::new(from), inst, DependenceKind::MWAW);
    }
}

/// `GetAddress` names its operand without reading it.
fn reads(method: &Method, liveness: &LivenessResult, inst: InstId, var: VarId) -> bool {
    liveness.uses(inst).contains(&var)
        && method
            .instruction(inst)
            .is_some_and(|i| i.opcode != Opcode::GetAddress)
}

fn push_unseen(next: &[InstId], stack: &mut Vec<InstId>, seen: &mut BitSet) {
    for &n in next {
        if seen.insert(n.index()) {
            stack.push(n);
        }
    }
}

/// Records RAW edges to the readers and WAW edges to the redefiners that the
/// definition of `var` at `def` reaches.
fn propagate_down(
    graph: &mut DependenceGraph,
    method: &Method,
    liveness: &LivenessResult,
    cfg: &ControlFlowGraph,
    def: InstId,
    var: VarId,
) {
    let mut seen = BitSet::new(cfg.len());
    let mut stack = Vec::new();
    push_unseen(cfg.successors(def), &mut stack, &mut seen);
    while let Some(succ) = stack.pop() {
        if reads(method, liveness, succ, var) {
            graph.add(def, succ, DependenceKind::RAW);
        }
        if liveness.def(succ) == Some(var) {
            graph.add(def, succ, DependenceKind::WAW);
        } else {
            push_unseen(cfg.successors(succ), &mut stack, &mut seen);
        }
    }
}

/// Records WAR edges from earlier readers and WAW edges from earlier
/// definers of `var` that reach `def`.
fn propagate_up(
    graph: &mut DependenceGraph,
    method: &Method,
    liveness: &LivenessResult,
    cfg: &ControlFlowGraph,
    def: InstId,
    var: VarId,
) {
    let mut seen = BitSet::new(cfg.len());
    let mut stack = Vec::new();
    push_unseen(cfg.predecessors(def), &mut stack, &mut seen);
    while let Some(pred) = stack.pop() {
        if reads(method, liveness, pred, var) {
            graph.add(pred, def, DependenceKind::WAR);
        }
        if liveness.def(pred) == Some(var) {
            graph.add(pred, def, DependenceKind::WAW);
        } else {
            push_unseen(cfg.predecessors(pred), &mut stack, &mut seen);
        }
    }
}
