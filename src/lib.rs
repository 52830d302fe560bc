// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0


#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # optscope
//!
//! [![Crates.io](https://img.shields.io/crates/v/optscope.svg)](https://crates.io/crates/optscope)
//! [![Documentation](https://docs.rs/optscope/badge.svg)](https://docs.rs/optscope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/optscope/blob/main/LICENSE-APACHE)
//!
//! The analysis core of a JIT optimizer middle-end. `optscope` works on a
//! compact three-address IR where every instruction is its own node, and
//! provides the loop, dataflow and dependence analyses that loop
//! transformations and code motion are built on.
//!
//! ## Features
//!
//! - **🔁 Loop query engine** - Natural loops, invariants, nesting across call sites
//! - **📐 Bit-vector dataflow** - A generic iterative solver and partial redundancy elimination on top of it
//! - **📈 Induction variables** - Basic and derived variables with their affine relations
//! - **🕸️ Interprocedural DDG** - Variable and memory dependences for every reachable method
//! - **⚡ Parallel passes** - Per-method passes scheduled on the rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use optscope::prelude::*;
//!
//! // i = 0; loop: i = i + 1; if i < 10 goto loop; return i
//! let mut b = MethodBuilder::new("main");
//! let (i, c) = (b.var(), b.var());
//! let head = b.label();
//! b.mov(i, 0);
//! b.place(head);
//! b.add(i, i, 1);
//! b.lt(c, i, 10);
//! b.branch_if(c, head);
//! b.ret(Some(i.into()));
//!
//! let mut program = Program::new();
//! program.add_method(b.build());
//!
//! let ctx = CompilerContext::new(program, OptimizerConfig::default());
//! PassScheduler::new().run_jobs(&ctx, JobKind::INDUCTION_VARIABLES)?;
//!
//! ctx.with_loops(|loops| {
//!     let lp = loops.iter().next().expect("one loop");
//!     assert!(lp.is_an_induction_variable(i));
//! })?;
//! # Ok::<(), optscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `optscope` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`ir`] - Instructions, methods, the program and control flow graphs
//! - [`analysis`] - Call graph, dataflow, loops, induction variables, PRE and DDG
//! - [`compiler`] - The pass trait, the shared context and the pass scheduler
//! - [`config`] - Optimizer configuration
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Every error is an
//! analysis fault: the input broke an assumption of the analysis, so no
//! partial result is produced.
//!
//! ```rust
//! use optscope::{analysis::{callgraph::CallGraph, ddg::DdgBuilder}, ir::Program, Error};
//!
//! let program = Program::new();
//! let callgraph = CallGraph::build(&program)?;
//! match DdgBuilder::new(&program, &callgraph).build() {
//!     Err(Error::MissingEntryPoint) => println!("nothing to analyze"),
//!     Err(e) => println!("Error: {}", e),
//!     Ok(deps) => println!("{} graphs", deps.methods().count()),
//! }
//! # Ok::<(), optscope::Error>(())
//! ```
//!
//! [`compiler::PassScheduler::run_or_abort`] is the boundary for embedders
//! that treat a fault as fatal: it logs the fault and aborts the process.
//!
//! ## Logging
//!
//! Events are emitted through [`tracing`]. The crate never installs a
//! subscriber; the embedding application decides where events go.
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use optscope::prelude::*;
///
/// let mut b = MethodBuilder::new("main");
/// b.ret(None);
/// let mut program = Program::new();
/// program.add_method(b.build());
/// let callgraph = CallGraph::build(&program)?;
/// assert_eq!(callgraph.method_count(), 1);
/// # Ok::<(), optscope::Error>(())
/// ```
pub mod prelude;

pub mod analysis;
pub mod compiler;
pub mod config;
pub mod ir;
pub mod utils;

/// `optscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `optscope` Error type
///
/// The analysis fault type returned by every fallible operation.
pub use error::Error;
