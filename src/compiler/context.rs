//! Shared state of one optimizer run.
//!
//! The [`CompilerContext`] owns the program and everything the passes compute
//! about it. It is shared by reference between all passes, including the
//! per-method passes running in parallel, so every mutable part sits behind a
//! `DashMap` or a lock.
//!
//! # Locking
//!
//! A pass holds at most one method lock at a time. Building the call graph
//! locks every method in turn, so [`CompilerContext::callgraph`] must not be
//! called while a method lock is held.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::{
    analysis::{
        callgraph::CallGraph, ddg::DependenceGraph, loops::LoopSet, MethodFacts,
    },
    compiler::job::JobKind,
    config::OptimizerConfig,
    ir::{ControlFlowGraph, Method, MethodId, Program},
    Result,
};

/// Program, configuration and cached analysis results.
pub struct CompilerContext {
    program: Program,
    config: OptimizerConfig,

    /// Jobs currently valid for each method.
    pub valid: DashMap<MethodId, JobKind>,

    /// Method-level analysis results.
    pub facts: DashMap<MethodId, MethodFacts>,

    /// Every loop of the program.
    pub loops: RwLock<LoopSet>,

    /// Data dependence graphs of the methods reachable from the entry.
    pub dependences: DashMap<MethodId, DependenceGraph>,

    callgraph: RwLock<Option<Arc<CallGraph>>>,
}

impl CompilerContext {
    /// Creates a context with no valid job.
    #[must_use]
    pub fn new(program: Program, config: OptimizerConfig) -> Self {
        Self {
            program,
            config,
            valid: DashMap::new(),
            facts: DashMap::new(),
            loops: RwLock::new(LoopSet::new()),
            dependences: DashMap::new(),
            callgraph: RwLock::new(None),
        }
    }

    /// The program being optimized.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Gives the program back.
    #[must_use]
    pub fn into_program(self) -> Program {
        self.program
    }

    /// Every method of the program, ascending.
    #[must_use]
    pub fn methods(&self) -> Vec<MethodId> {
        self.program.method_ids().collect()
    }

    /// Jobs valid for `method`.
    #[must_use]
    pub fn valid_jobs(&self, method: MethodId) -> JobKind {
        self.valid.get(&method).map_or(JobKind::empty(), |v| *v)
    }

    /// Returns `true` if every job in `jobs` is valid for `method`.
    #[must_use]
    pub fn is_valid(&self, method: MethodId, jobs: JobKind) -> bool {
        self.valid_jobs(method).contains(jobs)
    }

    /// Marks `jobs` valid for `method`.
    pub fn mark_valid(&self, method: MethodId, jobs: JobKind) {
        *self.valid.entry(method).or_insert(JobKind::empty()) |= jobs;
    }

    /// Clears `jobs` for `method` and drops the results they produced.
    ///
    /// Invalidating any method-level job means the code changed: the cached
    /// control flow graph and the call graph go as well.
    pub fn invalidate(&self, method: MethodId, jobs: JobKind) {
        if jobs.is_empty() {
            return;
        }
        if let Some(mut valid) = self.valid.get_mut(&method) {
            valid.remove(jobs);
        }

        if jobs.intersects(JobKind::METHOD_FACTS) {
            if let Some(mut facts) = self.facts.get_mut(&method) {
                facts.cfg = None;
                if jobs.contains(JobKind::LIVENESS) {
                    facts.liveness = None;
                }
                if jobs.contains(JobKind::REACHING_DEFINITIONS) {
                    facts.reaching = None;
                }
                if jobs.contains(JobKind::PRE_DOMINATORS) {
                    facts.dominators = None;
                }
                if jobs.contains(JobKind::ESCAPES) {
                    facts.escapes = None;
                }
            }
            if let Ok(mut callgraph) = self.callgraph.write() {
                *callgraph = None;
            }
        }

        if jobs.contains(JobKind::DATA_DEPENDENCES) {
            self.dependences.remove(&method);
        }
    }

    /// Cached facts of `method`. Missing ones fail on access.
    #[must_use]
    pub fn facts(&self, method: MethodId) -> MethodFacts {
        self.facts
            .get(&method)
            .map(|f| f.value().clone())
            .unwrap_or_default()
    }

    /// Applies `update` to the facts of `method`.
    pub fn update_facts(&self, method: MethodId, update: impl FnOnce(&mut MethodFacts)) {
        update(&mut self.facts.entry(method).or_default());
    }

    /// The cached control flow graph of `method`, built from the locked
    /// `body` when missing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a branch targets an undefined
    /// label.
    pub fn cfg(&self, id: MethodId, body: &Method) -> Result<Arc<ControlFlowGraph>> {
        if let Ok(cfg) = self.facts(id).cfg() {
            return Ok(cfg);
        }
        let cfg = Arc::new(body.cfg()?);
        self.update_facts(id, |f| f.cfg = Some(Arc::clone(&cfg)));
        Ok(cfg)
    }

    /// The call graph, built on first use after every code change.
    ///
    /// # Errors
    ///
    /// Propagates call graph construction and lock errors.
    pub fn callgraph(&self) -> Result<Arc<CallGraph>> {
        if let Some(callgraph) = read_lock!(self.callgraph).as_ref() {
            return Ok(Arc::clone(callgraph));
        }
        let callgraph = Arc::new(CallGraph::build(&self.program)?);
        *write_lock!(self.callgraph) = Some(Arc::clone(&callgraph));
        Ok(callgraph)
    }

    /// Runs `query` on the loop set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the loop set lock is poisoned.
    pub fn with_loops<R>(&self, query: impl FnOnce(&LoopSet) -> R) -> Result<R> {
        let loops = read_lock!(self.loops);
        Ok(query(&loops))
    }

    /// Runs `update` on the loop set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the loop set lock is poisoned.
    pub fn update_loops<R>(&self, update: impl FnOnce(&mut LoopSet) -> R) -> Result<R> {
        let mut loops = write_lock!(self.loops);
        Ok(update(&mut loops))
    }

    /// A copy of the dependence graph of `method`, if one was built.
    #[must_use]
    pub fn dependence_graph(&self, method: MethodId) -> Option<DependenceGraph> {
        self.dependences.get(&method).map(|g| g.value().clone())
    }
}
