//! # optscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the optscope library. Import this module to get quick access to the IR, the
//! analyses and the pass scheduler.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optscope operations
pub use crate::Error;

/// The result type used throughout optscope
pub use crate::Result;

/// Configuration shared by the analyses and the scheduler
pub use crate::config::OptimizerConfig;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Identifiers of IR entities
pub use crate::ir::{GlobalId, InstId, LabelId, LoopId, MethodId, VarId};

/// Instructions and their parts
pub use crate::ir::{Constant, Instruction, Opcode, Operand, ValueType};

/// Methods, programs and control flow
pub use crate::ir::{ControlFlowGraph, Method, MethodBuilder, Program};

// ================================================================================================
// Analyses
// ================================================================================================

/// Call graph
pub use crate::analysis::callgraph::CallGraph;

/// Dataflow framework and the method-level analyses built on it
pub use crate::analysis::dataflow::{
    DataFlowAnalysis, DataFlowSolver, DominatorSets, Escapes, LivenessResult, ReachingDefsResult,
};

/// Cached per-method results
pub use crate::analysis::MethodFacts;

/// Loops and their queries
pub use crate::analysis::loops::{Loop, LoopNest, LoopSet};

/// Induction variables
pub use crate::analysis::induction::{InductionClassifier, InductionTable, InductionVariable};

/// Partial redundancy elimination
pub use crate::analysis::pre::{PartialRedundancy, PreReport};

/// Data dependence graphs
pub use crate::analysis::ddg::{DdgBuilder, DependenceGraph, DependenceKind};

// ================================================================================================
// Pass Infrastructure
// ================================================================================================

/// Passes, jobs, the shared context and the scheduler
pub use crate::compiler::{CompilerContext, JobKind, Pass, PassScheduler};

// ================================================================================================
// Utilities
// ================================================================================================

/// Instruction-indexed bit vector
pub use crate::utils::BitSet;
