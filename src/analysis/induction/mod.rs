//! Induction variable classification.
//!
//! An induction variable changes by a loop invariant amount on every
//! iteration. *Basic* variables update themselves (`i = i + 1`); *derived*
//! variables are affine functions of another induction variable
//! (`j = i * 4`). Each loop gets an [`InductionTable`] keyed by variable.
//!
//! # Example
//!
//! ```rust
//! use optscope::analysis::induction::{InductionTable, InductionVariable, IvTerm};
//! use optscope::ir::VarId;
//!
//! let i = VarId::new(0);
//! let j = VarId::new(1);
//! let mut table = InductionTable::new();
//! table.insert(InductionVariable { id: i, basis: i, a: IvTerm::ZERO, b: IvTerm::ONE, c: IvTerm::ZERO });
//! table.insert(InductionVariable { id: j, basis: i, a: IvTerm::ZERO, b: IvTerm::Const(4), c: IvTerm::ZERO });
//!
//! assert!(table.is_basic(i));
//! assert_eq!(table.fold(j), Some((i, 0, 4)));
//! ```

mod classify;
mod table;

pub use classify::InductionClassifier;
pub use table::{InductionTable, InductionVariable, IvTerm};
