//! Variable escape facts.
//!
//! A variable escapes when its address is taken: from then on it may be read
//! or written through memory, so variable-level reasoning about it is unsafe.
//! The same holds for globals whose address is taken.

use std::collections::BTreeSet;

use crate::{
    ir::{GlobalId, Method, Opcode, Operand, VarId},
    utils::BitSet,
};

/// Escaped variables and globals of one method.
#[derive(Debug, Clone, Default)]
pub struct Escapes {
    vars: BitSet,
    globals: BTreeSet<GlobalId>,
}

impl Escapes {
    /// Scans `method` for address-taking instructions.
    #[must_use]
    pub fn compute(method: &Method) -> Self {
        let mut vars = BitSet::new(method.var_count());
        let mut globals = BTreeSet::new();
        for (_, inst) in method.iter() {
            if inst.opcode != Opcode::GetAddress {
                continue;
            }
            match inst.operand(0) {
                Some(Operand::Var(v)) => {
                    vars.insert(v.index());
                }
                Some(Operand::Global(g)) => {
                    globals.insert(*g);
                }
                _ => {}
            }
        }
        Self { vars, globals }
    }

    /// Returns `true` if the address of `var` is taken.
    #[must_use]
    pub fn is_escaped(&self, var: VarId) -> bool {
        self.vars.contains(var.index())
    }

    /// The escaped variables.
    #[must_use]
    pub const fn escaped_variables(&self) -> &BitSet {
        &self.vars
    }

    /// Globals whose address this method takes.
    #[must_use]
    pub const fn escaped_globals(&self) -> &BTreeSet<GlobalId> {
        &self.globals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodBuilder;

    #[test]
    fn test_address_taken_variables_escape() {
        let mut b = MethodBuilder::new("f");
        let x = b.var();
        let p = b.var();
        let q = b.var();
        b.mov(x, 1);
        b.get_address(p, x);
        b.get_address(q, GlobalId::new(2));
        b.ret(None);
        let escapes = Escapes::compute(&b.build());

        assert!(escapes.is_escaped(x));
        assert!(!escapes.is_escaped(p));
        assert!(escapes.escaped_globals().contains(&GlobalId::new(2)));
    }
}
