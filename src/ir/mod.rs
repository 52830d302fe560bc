//! Intermediate representation consumed by the analyses.
//!
//! The IR is deliberately small: a [`Program`] owns [`Method`]s behind
//! per-method locks, a method is an ordered vector of [`Instruction`]s and
//! control flow is derived from instruction order, labels and branches by
//! [`ControlFlowGraph`]. Every entity is addressed by a dense integer
//! identifier so analysis results can be stored in [`crate::utils::BitSet`]s
//! and plain vectors.
//!
//! # Identifiers
//!
//! | Type        | Indexes                                          |
//! |-------------|--------------------------------------------------|
//! | [`InstId`]  | position of an instruction within its method     |
//! | [`VarId`]   | variable of a method                             |
//! | [`MethodId`]| method of a program                              |
//! | [`LoopId`]  | loop of a [`crate::analysis::loops::LoopSet`]    |
//! | [`LabelId`] | branch target label of a method                  |
//! | [`GlobalId`]| static storage shared by all methods             |
//!
//! Instruction identifiers are positions: inserting an instruction shifts
//! every later identifier, and analyses computed before the insertion are
//! stale afterwards.

mod builder;
mod cfg;
mod instruction;
mod method;
mod program;

pub use builder::MethodBuilder;
pub use cfg::ControlFlowGraph;
pub use instruction::{Constant, Instruction, Opcode, Operand, ValueType};
pub use method::Method;
pub use program::Program;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Creates the identifier for `index`.
            #[must_use]
            #[allow(clippy::cast_possible_truncation)]
            pub const fn new(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the dense index this identifier stands for.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Position of an instruction inside its method.
    InstId
);
define_id!(
    /// Variable of a method.
    VarId
);
define_id!(
    /// Method of a program.
    MethodId
);
define_id!(
    /// Loop of a loop set.
    LoopId
);
define_id!(
    /// Branch target label.
    LabelId
);
define_id!(
    /// Global (static) storage location.
    GlobalId
);
