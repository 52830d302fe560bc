//! Inter-procedural call graph construction and reachability.
//!
//! The call graph is built by scanning every method for call instructions and
//! resolving their targets. Direct and virtual calls name their callee;
//! indirect calls are resolved conservatively to every method whose address
//! is taken somewhere in the program.
//!
//! # Components
//!
//! - [`CallGraph`]: forward and reverse edges plus reachability queries
//! - [`CallSite`]: a call instruction and its resolved targets
//! - [`CallResolver`]: target resolution for the three call kinds
//!
//! # Example
//!
//! ```rust
//! use optscope::{analysis::callgraph::CallGraph, ir::{MethodBuilder, Program}};
//!
//! let mut program = Program::new();
//! let leaf = program.add_method({
//!     let mut b = MethodBuilder::new("leaf");
//!     b.ret(None);
//!     b.build()
//! });
//! let main = program.add_method({
//!     let mut b = MethodBuilder::new("main");
//!     b.call(leaf, &[], None);
//!     b.ret(None);
//!     b.build()
//! });
//!
//! let graph = CallGraph::build(&program)?;
//! assert_eq!(graph.callees(main), vec![leaf]);
//! assert!(graph.is_reachable(main, leaf));
//! # Ok::<(), optscope::Error>(())
//! ```

mod graph;
mod resolution;
mod site;

pub use graph::CallGraph;
pub use resolution::CallResolver;
pub use site::{CallSite, CallType};
