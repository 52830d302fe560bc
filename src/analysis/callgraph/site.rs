//! Call site representation.

use crate::ir::{InstId, MethodId, Opcode};

/// Kind of call instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Direct call (`Call`).
    Direct,
    /// Virtual call (`VCall`), dispatched on the declared method.
    Virtual,
    /// Call through a function pointer (`ICall`).
    Indirect,
}

impl CallType {
    /// Classifies `opcode`, returning `None` for non-call opcodes.
    #[must_use]
    pub const fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Call => Some(Self::Direct),
            Opcode::VCall => Some(Self::Virtual),
            Opcode::ICall => Some(Self::Indirect),
            _ => None,
        }
    }

    /// Returns `true` if this is an indirect call through a function pointer.
    #[must_use]
    pub const fn is_indirect(&self) -> bool {
        matches!(self, Self::Indirect)
    }
}

/// A call instruction within a method together with its resolved targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The calling method.
    pub caller: MethodId,
    /// The call instruction.
    pub instruction: InstId,
    /// How the call dispatches.
    pub call_type: CallType,
    /// Every method the call may invoke. Empty when unresolved.
    pub targets: Vec<MethodId>,
}

impl CallSite {
    /// Returns `true` if no target could be determined.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.targets.is_empty()
    }
}
