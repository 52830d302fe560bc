//! Memory dependences supplied by a may-alias oracle.

use crate::{
    ir::{InstId, Method, Operand},
    utils::BitSet,
};

/// Instructions one instruction may depend on through memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleDependences {
    /// Writes whose value the instruction may read.
    pub raw: BitSet,
    /// Reads the instruction may overwrite.
    pub war: BitSet,
    /// Writes the instruction may overwrite.
    pub waw: BitSet,
}

impl PossibleDependences {
    /// Empty sets over `count` instructions.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            raw: BitSet::new(count),
            war: BitSet::new(count),
            waw: BitSet::new(count),
        }
    }

    /// Returns `true` if no dependence is possible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.war.is_empty() && self.waw.is_empty()
    }
}

/// Source of memory dependences, typically a pointer analysis.
///
/// The oracle only has to over-approximate: every pair it omits is assumed
/// never to touch the same location.
pub trait MayAliasOracle: Send + Sync {
    /// Memory dependences of `inst` within `method`, or `None` if it does
    /// not access memory.
    fn possible_dependences(&self, method: &Method, inst: InstId) -> Option<PossibleDependences>;
}

/// Assumes every pair of memory accesses may alias, unless both address
/// different globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeAliasOracle;

impl ConservativeAliasOracle {
    fn may_alias(a: Option<&Operand>, b: Option<&Operand>) -> bool {
        !matches!((a, b), (Some(Operand::Global(x)), Some(Operand::Global(y))) if x != y)
    }
}

impl MayAliasOracle for ConservativeAliasOracle {
    fn possible_dependences(&self, method: &Method, inst: InstId) -> Option<PossibleDependences> {
        let access = method.instruction(inst)?;
        if !access.opcode.is_memory() {
            return None;
        }
        let base = access.memory_base();
        let mut deps = PossibleDependences::new(method.len());
        for (other, other_inst) in method.iter() {
            if other == inst
                || !other_inst.opcode.is_memory()
                || !Self::may_alias(base, other_inst.memory_base())
            {
                continue;
            }
            match (access.opcode.is_memory_write(), other_inst.opcode.is_memory_write()) {
                (false, true) => {
                    deps.raw.insert(other.index());
                }
                (true, false) => {
                    deps.war.insert(other.index());
                }
                (true, true) => {
                    deps.waw.insert(other.index());
                }
                (false, false) => {}
            }
        }
        Some(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GlobalId, MethodBuilder};

    #[test]
    fn test_conservative_oracle() {
        let mut b = MethodBuilder::new("f");
        let (p, v) = (b.var(), b.var());
        let g0 = GlobalId::new(0);
        let g1 = GlobalId::new(1);
        b.store(g0, 0, 1); // 0
        b.load(v, g1, 0); // 1
        b.load(v, p, 0); // 2
        b.store(p, 0, v); // 3
        b.ret(None); // 4
        let method = b.build();
        let oracle = ConservativeAliasOracle;

        let load_g1 = oracle.possible_dependences(&method, InstId::new(1)).unwrap();
        assert_eq!(load_g1.raw.iter().collect::<Vec<_>>(), vec![3]);

        let store_p = oracle.possible_dependences(&method, InstId::new(3)).unwrap();
        assert_eq!(store_p.war.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store_p.waw.iter().collect::<Vec<_>>(), vec![0]);

        assert!(oracle.possible_dependences(&method, InstId::new(4)).is_none());
    }
}
