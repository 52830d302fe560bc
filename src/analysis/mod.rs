//! Program analyses and the loop optimizer core.
//!
//! # Architecture
//!
//! The analyses are layered; each module only consumes the ones above it:
//!
//! - [`callgraph`] - call sites, call targets and method reachability
//! - [`dataflow`] - the generic bit-vector solver with liveness, reaching
//!   definitions, predominators and escapes built on it
//! - [`facts`] - cached per-method results of the analyses above
//! - [`loops`] - loop discovery, invariants and the loop query engine
//! - [`induction`] - basic and derived induction variables of a loop
//! - [`pre`] - partial redundancy elimination by lazy code motion
//! - [`ddg`] - interprocedural data dependence graphs
//!
//! # Usage
//!
//! ```rust
//! use optscope::analysis::{dataflow::DominatorSets, loops::detect_loops};
//! use optscope::ir::MethodBuilder;
//!
//! let mut b = MethodBuilder::new("count");
//! let (i, c) = (b.var(), b.var());
//! let head = b.label();
//! let done = b.label();
//! b.mov(i, 0);
//! b.place(head);
//! b.add(i, i, 1);
//! b.lt(c, i, 10);
//! b.branch_if_not(c, done);
//! b.branch(head);
//! b.place(done);
//! b.ret(Some(i.into()));
//! let method = b.build();
//!
//! let cfg = method.cfg()?;
//! let dominators = DominatorSets::compute(&cfg);
//! let loops = detect_loops(&method, &cfg, &dominators);
//! assert_eq!(loops.len(), 1);
//! # Ok::<(), optscope::Error>(())
//! ```

pub mod callgraph;
pub mod dataflow;
pub mod ddg;
pub mod facts;
pub mod induction;
pub mod loops;
pub mod pre;

pub use facts::MethodFacts;
