//! The expression universe of partial redundancy elimination.
//!
//! Every instruction that computes an expression owns one bit. Two
//! instructions compute the same value when they are *equivalent*:
//!
//! - **same**: identical opcode and positionally identical operands
//! - **similar**: identical commutative opcode and the same operand pair in
//!   either order
//! - **equivalent**: *similar* for commutative opcodes, *same* otherwise
//!
//! Equivalence partitions the candidates into classes, and every set computed
//! over this universe holds either all or none of a class.

use crate::{
    analysis::dataflow::Escapes,
    ir::{InstId, Instruction, Method},
    utils::BitSet,
};

/// Returns `true` if `inst` computes a value partial redundancy elimination
/// may move.
#[must_use]
pub fn is_candidate(inst: &Instruction) -> bool {
    inst.opcode.is_expression() && inst.result.is_some()
}

/// Identical opcode and positionally identical operands.
#[must_use]
pub fn same(a: &Instruction, b: &Instruction) -> bool {
    a.opcode == b.opcode && a.operands == b.operands
}

/// Identical opcode and the first two operands equal as an unordered pair.
#[must_use]
pub fn similar(a: &Instruction, b: &Instruction) -> bool {
    if a.opcode != b.opcode || a.operands[2] != b.operands[2] {
        return false;
    }
    let (a0, a1) = (a.operands[0], a.operands[1]);
    let (b0, b1) = (b.operands[0], b.operands[1]);
    (a0 == b0 && a1 == b1) || (a0 == b1 && a1 == b0)
}

/// Equivalence used by every problem: [`similar`] for commutative opcodes,
/// [`same`] for the rest.
#[must_use]
pub fn equivalent(a: &Instruction, b: &Instruction) -> bool {
    if a.opcode.is_commutative() {
        similar(a, b)
    } else {
        same(a, b)
    }
}

/// Returns `true` if executing `killer` invalidates the value of `expr`.
///
/// A definition kills every expression reading the defined variable. A store
/// or a call may write any escaped variable, so it kills expressions reading
/// one.
#[must_use]
pub fn kills(killer: &Instruction, expr: &Instruction, escapes: &Escapes) -> bool {
    if !is_candidate(expr) {
        return false;
    }
    if let Some(defined) = killer.result {
        if expr.uses_var(defined) {
            return true;
        }
    }
    if killer.opcode.is_memory_write() || killer.opcode.is_call() {
        return expr.uses().any(|v| escapes.is_escaped(v));
    }
    false
}

/// Candidates of a method with their equivalence classes and the local
/// `gen`/`kill` sets of every instruction.
#[derive(Debug, Clone)]
pub struct ExpressionTable {
    /// Representative (lowest equivalent candidate) of each candidate.
    class: Vec<Option<InstId>>,
    /// Equivalent candidates computed by each instruction.
    generated: Vec<BitSet>,
    /// Candidates invalidated by each instruction.
    killed: Vec<BitSet>,
}

impl ExpressionTable {
    /// Collects the candidates of `method`.
    #[must_use]
    pub fn build(method: &Method, escapes: &Escapes) -> Self {
        let count = method.len();
        let instructions: Vec<&Instruction> = method.iter().map(|(_, inst)| inst).collect();

        let mut class: Vec<Option<InstId>> = vec![None; count];
        let mut representatives: Vec<InstId> = Vec::new();
        for (i, inst) in instructions.iter().enumerate() {
            if !is_candidate(inst) {
                continue;
            }
            let rep = representatives
                .iter()
                .copied()
                .find(|r| equivalent(instructions[r.index()], inst));
            class[i] = Some(rep.unwrap_or_else(|| {
                representatives.push(InstId::new(i));
                InstId::new(i)
            }));
        }

        let mut generated = vec![BitSet::new(count); count];
        for (i, rep) in class.iter().enumerate() {
            if let Some(rep) = rep {
                generated[i] = BitSet::from_indices(
                    count,
                    class
                        .iter()
                        .enumerate()
                        .filter(|(_, r)| *r == &Some(*rep))
                        .map(|(j, _)| j),
                );
            }
        }

        let killed = instructions
            .iter()
            .map(|killer| {
                BitSet::from_indices(
                    count,
                    instructions
                        .iter()
                        .enumerate()
                        .filter(|(_, expr)| kills(killer, expr, escapes))
                        .map(|(j, _)| j),
                )
            })
            .collect();

        Self {
            class,
            generated,
            killed,
        }
    }

    /// Number of bits in every set.
    #[must_use]
    pub fn universe(&self) -> usize {
        self.class.len()
    }

    /// Returns `true` if `inst` is a candidate.
    #[must_use]
    pub fn is_candidate(&self, inst: InstId) -> bool {
        self.class_of(inst).is_some()
    }

    /// The representative of the class of `inst`.
    #[must_use]
    pub fn class_of(&self, inst: InstId) -> Option<InstId> {
        self.class.get(inst.index()).copied().flatten()
    }

    /// Number of equivalence classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.class
            .iter()
            .enumerate()
            .filter(|(i, rep)| rep.is_some_and(|r| r.index() == *i))
            .count()
    }

    /// Candidates equivalent to `inst`; also the `use` set of the
    /// postponable and used problems.
    #[must_use]
    pub fn generated(&self, inst: InstId) -> &BitSet {
        &self.generated[inst.index()]
    }

    /// Candidates invalidated by `inst`.
    #[must_use]
    pub fn killed(&self, inst: InstId) -> &BitSet {
        &self.killed[inst.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{MethodBuilder, Opcode};

    #[test]
    fn test_equivalence_tiers() {
        let mut b = MethodBuilder::new("f");
        let (x, y, r1, r2) = (b.var(), b.var(), b.var(), b.var());
        let add_xy = Instruction::binary(Opcode::Add, r1, x, y);
        let add_yx = Instruction::binary(Opcode::Add, r2, y, x);
        let sub_xy = Instruction::binary(Opcode::Sub, r1, x, y);
        let sub_yx = Instruction::binary(Opcode::Sub, r2, y, x);

        assert!(same(&add_xy, &add_xy));
        assert!(!same(&add_xy, &add_yx));
        assert!(similar(&add_xy, &add_yx));
        assert!(equivalent(&add_xy, &add_yx));
        assert!(similar(&sub_xy, &sub_yx));
        assert!(!equivalent(&sub_xy, &sub_yx));
        assert!(!equivalent(&add_xy, &sub_xy));
    }

    #[test]
    fn test_classes_and_kills() {
        let mut b = MethodBuilder::new("f");
        let (x, y, p, r1, r2, r3) = (b.var(), b.var(), b.var(), b.var(), b.var(), b.var());
        b.add(r1, x, y); // 0
        b.add(r2, y, x); // 1
        b.mov(x, 3); // 2
        b.add(r3, p, 1); // 3
        b.get_address(y, p); // 4
        b.store(y, 0, 1); // 5
        b.ret(None); // 6
        let method = b.build();
        let escapes = Escapes::compute(&method);
        let table = ExpressionTable::build(&method, &escapes);

        assert_eq!(table.class_of(InstId::new(1)), Some(InstId::new(0)));
        assert_eq!(table.class_of(InstId::new(2)), None);
        // x + y, p + 1 and the address of p
        assert_eq!(table.class_count(), 3);
        assert_eq!(table.generated(InstId::new(1)).iter().collect::<Vec<_>>(), vec![0, 1]);

        // Redefining x kills both additions of x.
        assert_eq!(table.killed(InstId::new(2)).iter().collect::<Vec<_>>(), vec![0, 1]);
        // p escapes, so the store kills p + 1 and the address of p.
        assert_eq!(table.killed(InstId::new(5)).iter().collect::<Vec<_>>(), vec![3, 4]);
    }
}
