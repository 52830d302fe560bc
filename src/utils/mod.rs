//! Shared building blocks.
//!
//! - [`BitSet`] - fixed-length bit vector used for every dataflow fact
//! - [`DotWriter`] - Graphviz output for call graphs and dependence graphs

mod bitset;
mod dot;

pub use bitset::{BitSet, BitSetIter};
pub use dot::{escape_dot, DotWriter};
