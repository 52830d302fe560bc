//! Pass infrastructure: jobs, the shared context and the scheduler.
//!
//! This module sits on top of [`crate::analysis`]: every analysis and the
//! partial redundancy transformation is wrapped in a [`Pass`] that declares
//! which job it provides, which jobs it needs and which it invalidates.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Pass Pipeline                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext             Shared state of one run             │
//! │    ├─ Program                 (methods behind per-method locks)  │
//! │    ├─ Valid job masks         (per method)                       │
//! │    ├─ MethodFacts             (cfg, liveness, reaching, ...)     │
//! │    ├─ LoopSet                 (loops, invariants, induction)     │
//! │    └─ Dependence graphs       (per reachable method)             │
//! │                                                                  │
//! │  PassScheduler               Dependence-ordered execution        │
//! │    ├─ Orders requested passes by their dependences               │
//! │    ├─ Runs providers where a needed job is not valid             │
//! │    ├─ Per-method passes on the rayon pool                        │
//! │    └─ Clears invalidated jobs after every pass                   │
//! │                                                                  │
//! │  Passes (9 built-in)         One provider per JobKind            │
//! │    ├─ Facts: liveness, reaching definitions, predominators,      │
//! │    │         escapes                                             │
//! │    ├─ Loops: identification, invariants, induction variables     │
//! │    ├─ Transform: partial redundancy elimination                  │
//! │    └─ Interprocedural: data dependences                          │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use optscope::compiler::{CompilerContext, JobKind, PassScheduler};
//! use optscope::config::OptimizerConfig;
//! use optscope::ir::{MethodBuilder, Program};
//!
//! let mut b = MethodBuilder::new("main");
//! let (a, t) = (b.var(), b.var());
//! b.add(t, a, 1);
//! b.ret(Some(t.into()));
//! let mut program = Program::new();
//! let main = program.add_method(b.build());
//!
//! let ctx = CompilerContext::new(program, OptimizerConfig::default());
//! PassScheduler::new().run_jobs(&ctx, JobKind::DATA_DEPENDENCES)?;
//! assert_eq!(ctx.dependence_graph(main).map(|g| g.edge_count()), Some(1));
//! # Ok::<(), optscope::Error>(())
//! ```

mod context;
mod job;
mod pass;
mod passes;
mod scheduler;

pub use context::CompilerContext;
pub use job::JobKind;
pub use pass::Pass;
pub use passes::{
    DataDependencesPass, EscapesPass, InductionVariablesPass, LivenessPass,
    LoopIdentificationPass, LoopInvariantsPass, PartialRedundancyPass, PreDominatorsPass,
    ReachingDefinitionsPass,
};
pub use scheduler::PassScheduler;
