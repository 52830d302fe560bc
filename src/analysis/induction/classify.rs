use crate::{
    analysis::{
        dataflow::{DominatorSets, Escapes, ReachingDefsResult},
        induction::{InductionTable, InductionVariable, IvTerm},
        loops::{Loop, LoopSet},
    },
    ir::{Constant, InstId, Instruction, LoopId, Method, Opcode, Operand, VarId},
    utils::BitSet,
    Result,
};

/// Classifies the induction variables of one loop.
///
/// # Algorithm
///
/// 1. **Defined once**: variables with a single definition in the loop, made
///    by an integer move, add, subtract or multiply, and not redefined by a
///    non-invariant instruction of a nested loop of the same method
/// 2. **Basic**: `v = v ± c`, `v = c + v` or `v = v × c` where `c` is a
///    literal or a loop invariant variable, the definition executes on every
///    iteration and `v` does not escape
/// 3. **Derived**: `w = u ± c`, `w = c ± u`, `w = u × c` or `w = u` where `u`
///    is already classified, repeated until a full pass adds nothing
///
/// A variable is only ever derived from variables classified before it, so
/// chains cannot cycle.
pub struct InductionClassifier<'a> {
    method: &'a Method,
    lp: &'a Loop,
    sub_loop_members: BitSet,
    reaching: &'a ReachingDefsResult,
    dominators: &'a DominatorSets,
    escapes: &'a Escapes,
}

impl<'a> InductionClassifier<'a> {
    /// Prepares classification of loop `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLoop`] for an unknown loop.
    pub fn new(
        method: &'a Method,
        loops: &'a LoopSet,
        id: LoopId,
        reaching: &'a ReachingDefsResult,
        dominators: &'a DominatorSets,
        escapes: &'a Escapes,
    ) -> Result<Self> {
        let lp = loops.get(id)?;
        Ok(Self {
            method,
            lp,
            sub_loop_members: sub_loop_members(loops, lp),
            reaching,
            dominators,
            escapes,
        })
    }

    /// Runs all three steps.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the loop has no members or lacks
    /// its header.
    pub fn classify(&self) -> Result<InductionTable> {
        let backedges = self.lp.backedges()?;
        let mut table = InductionTable::new();

        let defined_once = self.defined_once();
        if defined_once.is_empty() {
            return Ok(table);
        }

        self.identify_basic(&defined_once, backedges, &mut table);
        if table.is_empty() {
            return Ok(table);
        }
        self.identify_derived(&defined_once, backedges, &mut table);

        tracing::debug!(
            method = self.method.name(),
            header = self.lp.header.index(),
            basic = table.basic_count(),
            derived = table.derived_count(),
            "induction variables"
        );
        Ok(table)
    }

    fn members(&self) -> impl Iterator<Item = (InstId, &'a Instruction)> + '_ {
        self.lp.instructions.iter().filter_map(|i| {
            let id = InstId::new(i);
            self.method.instruction(id).map(|inst| (id, inst))
        })
    }

    /// Step 1.
    fn defined_once(&self) -> BitSet {
        let vars = self.method.var_count();
        let mut defined = BitSet::new(vars);
        let mut once = BitSet::new(vars);

        for (id, inst) in self.members() {
            let Some(var) = inst.result else {
                continue;
            };
            let in_varying_sub_loop = self.sub_loop_members.contains(id.index())
                && !self.lp.is_an_invariant_instruction(id);
            if defined.contains(var.index()) || in_varying_sub_loop {
                defined.insert(var.index());
                once.remove(var.index());
                continue;
            }
            defined.insert(var.index());
            if self.has_induction_shape(inst, var) {
                once.insert(var.index());
            } else {
                once.remove(var.index());
            }
        }
        once
    }

    fn has_induction_shape(&self, inst: &Instruction, var: VarId) -> bool {
        if !self.method.var_type(var).is_integer() {
            return false;
        }
        match inst.opcode {
            Opcode::Move => self.is_integer_operand(inst.operand(0)),
            Opcode::Add | Opcode::Sub | Opcode::Mul => {
                self.is_integer_operand(inst.operand(0)) && self.is_integer_operand(inst.operand(1))
            }
            _ => false,
        }
    }

    fn is_integer_operand(&self, operand: Option<&Operand>) -> bool {
        match operand {
            Some(Operand::Var(v)) => self.method.var_type(*v).is_integer(),
            Some(op) => op.is_integer_constant(),
            None => false,
        }
    }

    fn always_executed(&self, inst: InstId, backedges: &[InstId]) -> bool {
        backedges
            .iter()
            .all(|b| self.dominators.is_predominator(inst, *b))
    }

    /// Literal, or a variable with the same value on every iteration.
    fn is_invariant_operand(&self, inst: InstId, operand: Option<&Operand>) -> bool {
        match operand {
            Some(Operand::Const(c)) => c.is_integer(),
            Some(Operand::Var(v)) => self
                .lp
                .reaching_counts(self.reaching, inst, *v)
                .is_loop_invariant(),
            _ => false,
        }
    }

    /// Step 2.
    fn identify_basic(&self, once: &BitSet, backedges: &[InstId], table: &mut InductionTable) {
        for (id, inst) in self.members() {
            if self.lp.is_an_invariant_instruction(id) {
                continue;
            }
            let Some(var) = inst.result else {
                continue;
            };
            if !once.contains(var.index())
                || self.sub_loop_members.contains(id.index())
                || !self.always_executed(id, backedges)
                || !matches!(inst.opcode, Opcode::Add | Opcode::Sub | Opcode::Mul)
                || self.escapes.is_escaped(var)
            {
                continue;
            }

            let own = Some(&Operand::Var(var));
            let (left, right) = (inst.operand(0), inst.operand(1));
            let recurrence = if self.is_invariant_operand(id, right) && left == own {
                match inst.opcode {
                    Opcode::Add => term(right, false).map(|b| (b, IvTerm::ZERO)),
                    Opcode::Sub => term(right, true).map(|b| (b, IvTerm::ZERO)),
                    _ => term(right, false).map(|c| (IvTerm::ZERO, c)),
                }
            } else if inst.opcode == Opcode::Add
                && self.is_invariant_operand(id, left)
                && right == own
            {
                term(left, false).map(|b| (b, IvTerm::ZERO))
            } else {
                None
            };

            if let Some((b, c)) = recurrence {
                table.insert(InductionVariable {
                    id: var,
                    basis: var,
                    a: IvTerm::ZERO,
                    b,
                    c,
                });
            }
        }
    }

    /// Step 3.
    fn identify_derived(&self, once: &BitSet, backedges: &[InstId], table: &mut InductionTable) {
        let mut modified = true;
        while modified {
            modified = false;
            for (id, inst) in self.members() {
                if self.lp.is_an_invariant_instruction(id) || !self.always_executed(id, backedges) {
                    continue;
                }
                let Some(var) = inst.result else {
                    continue;
                };
                if table.contains(var)
                    || !once.contains(var.index())
                    || self.escapes.is_escaped(var)
                {
                    continue;
                }

                let derived = match inst.opcode {
                    Opcode::Add | Opcode::Sub | Opcode::Mul => self
                        .derive_arithmetic(id, inst, var, 1, table)
                        .or_else(|| self.derive_arithmetic(id, inst, var, 0, table)),
                    Opcode::Move => self.derive_copy(id, inst, var, table),
                    _ => None,
                };
                if let Some(iv) = derived {
                    modified |= table.insert(iv);
                }
            }
        }
    }

    /// `var = input (op) stride` with the stride in operand slot `stride_slot`.
    fn derive_arithmetic(
        &self,
        id: InstId,
        inst: &Instruction,
        var: VarId,
        stride_slot: usize,
        table: &InductionTable,
    ) -> Option<InductionVariable> {
        let input = inst.operand_var(1 - stride_slot)?;
        if !table.contains(input) {
            return None;
        }
        let stride = inst.operand(stride_slot);
        if !self.is_invariant_operand(id, stride) {
            return None;
        }

        let (a, b) = match (inst.opcode, stride_slot) {
            (Opcode::Add, _) => (term(stride, false)?, IvTerm::ONE),
            // var = input - stride
            (Opcode::Sub, 1) => (term(stride, true)?, IvTerm::ONE),
            // var = stride - input
            (Opcode::Sub, _) => (term(stride, false)?, IvTerm::Const(-1)),
            (Opcode::Mul, _) => (IvTerm::ZERO, term(stride, false)?),
            _ => return None,
        };
        Some(InductionVariable {
            id: var,
            basis: input,
            a,
            b,
            c: IvTerm::ZERO,
        })
    }

    /// `var = source` where `source` is basic and all its definitions
    /// predominate the copy.
    fn derive_copy(
        &self,
        id: InstId,
        inst: &Instruction,
        var: VarId,
        table: &InductionTable,
    ) -> Option<InductionVariable> {
        let source = inst.operand_var(0)?;
        if source == var || !table.is_basic(source) {
            return None;
        }
        let definitions = self.reaching.definitions_of(source)?;
        let dominated = definitions
            .iter()
            .all(|def| self.dominators.is_predominator(InstId::new(def), id));
        dominated.then_some(InductionVariable {
            id: var,
            basis: source,
            a: IvTerm::ZERO,
            b: IvTerm::ONE,
            c: IvTerm::ZERO,
        })
    }
}

/// Members of the loops nested in `lp` within the same method.
fn sub_loop_members(loops: &LoopSet, lp: &Loop) -> BitSet {
    let mut members = BitSet::new(lp.instructions.len());
    let mut visited = BitSet::new(loops.len());
    let mut stack: Vec<LoopId> = lp.sub_loops.iter().copied().collect();
    while let Some(id) = stack.pop() {
        if !visited.insert(id.index()) {
            continue;
        }
        let Ok(sub) = loops.get(id) else {
            continue;
        };
        if sub.method != lp.method || sub.id == lp.id {
            continue;
        }
        members.union_with(&sub.instructions);
        stack.extend(sub.sub_loops.iter().copied());
    }
    members
}

/// Converts a stride operand into a term, rejecting literals whose negation or
/// signed reading overflows.
fn term(operand: Option<&Operand>, negate: bool) -> Option<IvTerm> {
    match operand? {
        Operand::Const(c) => {
            let value = safe_literal(*c)?;
            Some(IvTerm::Const(if negate { value.checked_neg()? } else { value }))
        }
        Operand::Var(v) => Some(if negate {
            IvTerm::NegVar(*v)
        } else {
            IvTerm::Var(*v)
        }),
        _ => None,
    }
}

/// Signed value of an integer literal, excluding `i64::MIN` and unsigned
/// values of `2^63` and above.
fn safe_literal(c: Constant) -> Option<i64> {
    match c {
        Constant::Int(v) if v != i64::MIN => Some(v),
        Constant::UInt(v) => i64::try_from(v).ok(),
        _ => None,
    }
}
