//! Call target resolution.
//!
//! Direct and virtual calls carry their callee as the first operand.
//! Indirect calls may reach any method whose address escapes through a
//! `GetAddress` instruction, which is the conservative answer available
//! without points-to information.

use std::collections::BTreeSet;

use crate::{
    analysis::callgraph::CallType,
    ir::{Instruction, Method, MethodId, Opcode, Operand},
};

/// Resolves the callees of call instructions.
#[derive(Debug, Clone, Default)]
pub struct CallResolver {
    /// Methods whose address is taken somewhere in the program.
    escaped_methods: BTreeSet<MethodId>,
}

impl CallResolver {
    /// Creates a resolver that knows no escaped methods.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records the methods whose address `method` takes.
    pub fn scan(&mut self, method: &Method) {
        for (_, inst) in method.iter() {
            if inst.opcode == Opcode::GetAddress {
                if let Some(Operand::Method(target)) = inst.operand(0) {
                    self.escaped_methods.insert(*target);
                }
            }
        }
    }

    /// Methods that may be invoked through a function pointer.
    pub fn escaped_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.escaped_methods.iter().copied()
    }

    /// Returns every method `inst` may call; empty for non-calls and for
    /// unresolvable calls.
    #[must_use]
    pub fn resolve(&self, inst: &Instruction) -> Vec<MethodId> {
        match CallType::from_opcode(inst.opcode) {
            Some(CallType::Direct | CallType::Virtual) => match inst.operand(0) {
                Some(Operand::Method(callee)) => vec![*callee],
                _ => Vec::new(),
            },
            Some(CallType::Indirect) => self.escaped_methods.iter().copied().collect(),
            None => Vec::new(),
        }
    }
}
