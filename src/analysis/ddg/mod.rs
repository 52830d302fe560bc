//! Interprocedural data dependence graphs.
//!
//! Every method reachable from the program entry gets a
//! [`DependenceGraph`] whose edges carry a [`DependenceKind`]:
//!
//! - `RAW`, `WAR` and `WAW` come from exact propagation of variable
//!   definitions along the control flow graph
//! - `MRAW`, `MWAR` and `MWAW` come from a [`MayAliasOracle`] and describe
//!   possible conflicts through memory
//!
//! [`DdgBuilder`] drives the construction; see its documentation for the
//! phases.

mod builder;
mod graph;
mod possible;

pub use builder::{DdgBuilder, PossibleDependenceTable, ProgramDependences};
pub use graph::{DependenceGraph, DependenceKind};
pub use possible::{ConservativeAliasOracle, MayAliasOracle, PossibleDependences};
