//! Cached per-method analysis results.

use std::sync::Arc;

use crate::{
    analysis::dataflow::{DominatorSets, Escapes, LivenessResult, ReachingDefsResult},
    ir::ControlFlowGraph,
    Error, Result,
};

/// Results of the method-level analyses that other analyses consume.
///
/// Each field is filled by the pass providing it and cleared when a later
/// pass invalidates it. Accessors fail with [`Error::MissingAnalysis`] for an
/// empty field.
#[derive(Debug, Clone, Default)]
pub struct MethodFacts {
    /// Control flow graph the other facts were computed on.
    pub cfg: Option<Arc<ControlFlowGraph>>,
    /// Live variables.
    pub liveness: Option<Arc<LivenessResult>>,
    /// Reaching definitions.
    pub reaching: Option<Arc<ReachingDefsResult>>,
    /// Predominators.
    pub dominators: Option<Arc<DominatorSets>>,
    /// Escaped variables and globals.
    pub escapes: Option<Arc<Escapes>>,
}

impl MethodFacts {
    /// The control flow graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if it was not computed.
    pub fn cfg(&self) -> Result<Arc<ControlFlowGraph>> {
        self.cfg.clone().ok_or(Error::MissingAnalysis("control flow graph"))
    }

    /// Live variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if liveness did not run.
    pub fn liveness(&self) -> Result<Arc<LivenessResult>> {
        self.liveness.clone().ok_or(Error::MissingAnalysis("liveness"))
    }

    /// Reaching definitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if reaching definitions did not run.
    pub fn reaching(&self) -> Result<Arc<ReachingDefsResult>> {
        self.reaching
            .clone()
            .ok_or(Error::MissingAnalysis("reaching definitions"))
    }

    /// Predominators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if predominators did not run.
    pub fn dominators(&self) -> Result<Arc<DominatorSets>> {
        self.dominators
            .clone()
            .ok_or(Error::MissingAnalysis("predominators"))
    }

    /// Escapes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if escape analysis did not run.
    pub fn escapes(&self) -> Result<Arc<Escapes>> {
        self.escapes.clone().ok_or(Error::MissingAnalysis("escapes"))
    }

    /// Drops every fact.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
