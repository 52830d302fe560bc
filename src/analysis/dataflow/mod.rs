//! Bit-vector data flow analysis over method instructions.
//!
//! This module provides a generic framework for computing properties that
//! propagate along control flow edges between single instructions. It
//! supports both forward and backward analyses with either union or
//! intersection confluence, solved by round-robin sweeps.
//!
//! # Architecture
//!
//! - [`Confluence`]: how facts combine where control flow merges
//! - [`DataFlowAnalysis`]: universe, boundary, initial fact and transfer function
//! - [`DataFlowSolver`]: iterates sweeps until no bit changes
//!
//! # Analyses Provided
//!
//! - [`LiveVariables`]: variables live before and after each instruction
//! - [`ReachingDefinitions`]: definitions reaching each instruction
//! - [`PreDominators`]: instructions on every path from the entry
//! - [`Escapes`]: variables and globals whose address is taken
//!
//! The partial redundancy elimination problems live next to the transformation
//! in [`crate::analysis::pre`] and reuse the same solver.
//!
//! # Example
//!
//! ```rust
//! use optscope::analysis::dataflow::LivenessResult;
//! use optscope::ir::{InstId, MethodBuilder};
//!
//! let mut b = MethodBuilder::new("f");
//! let x = b.var();
//! let y = b.var();
//! b.mov(x, 1);
//! b.add(y, x, 2);
//! b.ret(Some(y.into()));
//! let method = b.build();
//!
//! let live = LivenessResult::compute(&method, &method.cfg()?);
//! assert!(live.is_live_out(InstId::new(0), x));
//! assert!(!live.is_live_out(InstId::new(1), x));
//! # Ok::<(), optscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

mod dominance;
mod escape;
mod framework;
mod lattice;
mod liveness;
mod reaching;
mod solver;

pub use dominance::{DominatorSets, PreDominators};
pub use escape::Escapes;
pub use framework::{AnalysisResults, DataFlowAnalysis, Direction};
pub use lattice::Confluence;
pub use liveness::{LiveVariables, LivenessResult};
pub use reaching::{ReachingDefinitions, ReachingDefsResult};
pub use solver::DataFlowSolver;
