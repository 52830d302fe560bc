//! Loop discovery and the loop query engine.
//!
//! Loops are natural loops over single instructions. Each [`Loop`] records
//! its header, members, back edges, exits, invariants and immediate sub-loops;
//! sub-loops may live in other methods when a loop calls a method that itself
//! loops.
//!
//! # Loop Structure
//!
//! ```text
//!          |
//!          v
//!     [header] <------+  <- every back edge targets the header
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [back edge] ----+
//!          |
//!          v
//!     (outside)          <- reached from an exit instruction
//! ```
//!
//! # Components
//!
//! - [`detect_loops`], [`nest_within_method`], [`link_across_calls`] and
//!   [`compute_invariants`] build the loop set
//! - [`LoopSet`] answers membership and nesting queries
//! - [`LoopNest`] answers program-wide questions that need the call graph,
//!   such as which loops are outermost
//! - [`sort_instructions`] orders members in execution order
//!
//! # Thread Safety
//!
//! All types are `Send` and `Sync`. The scheduler keeps the loop set behind an
//! `RwLock` because discovery and invariant identification rewrite it.

mod detect;
mod info;
mod query;

pub use detect::{compute_invariants, detect_loops, link_across_calls, nest_within_method};
pub use info::{Loop, LoopSet, ReachCounts};
pub use query::{sort_instructions, LoopNest, Precision};
