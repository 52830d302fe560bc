//! Fluent construction of method bodies.
//!
//! ```rust
//! use optscope::ir::MethodBuilder;
//!
//! let mut b = MethodBuilder::new("count");
//! let i = b.var();
//! let c = b.var();
//! let head = b.label();
//! b.mov(i, 0);
//! b.place(head);
//! b.add(i, i, 1);
//! b.lt(c, i, 10);
//! b.branch_if(c, head);
//! b.ret(None);
//! let method = b.build();
//! assert_eq!(method.len(), 6);
//! ```

use crate::ir::{
    InstId, Instruction, LabelId, Method, MethodId, Opcode, Operand, ValueType, VarId,
};

/// Builds a [`Method`] one instruction at a time.
#[derive(Debug)]
pub struct MethodBuilder {
    method: Method,
}

impl MethodBuilder {
    /// Starts an empty method called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            method: Method::new(name),
        }
    }

    /// Marks the method as a runtime library method.
    #[must_use]
    pub fn library(mut self) -> Self {
        self.method.set_library(true);
        self
    }

    /// Allocates an integer variable.
    pub fn var(&mut self) -> VarId {
        self.method.new_variable(ValueType::Int)
    }

    /// Allocates a variable of type `ty`.
    pub fn var_typed(&mut self, ty: ValueType) -> VarId {
        self.method.new_variable(ty)
    }

    /// Allocates a label; place it with [`MethodBuilder::place`].
    pub fn label(&mut self) -> LabelId {
        self.method.new_label()
    }

    /// Appends an arbitrary instruction.
    pub fn emit(&mut self, inst: Instruction) -> InstId {
        self.method.push(inst)
    }

    /// Defines `label` at the current position.
    pub fn place(&mut self, label: LabelId) -> InstId {
        self.emit(Instruction::label(label))
    }

    /// `dst = src`
    pub fn mov(&mut self, dst: VarId, src: impl Into<Operand>) -> InstId {
        self.emit(Instruction::mov(dst, src))
    }

    /// `dst = a <op> b`
    pub fn binary(
        &mut self,
        op: Opcode,
        dst: VarId,
        a: impl Into<Operand>,
        b: impl Into<Operand>,
    ) -> InstId {
        self.emit(Instruction::binary(op, dst, a, b))
    }

    /// `dst = a + b`
    pub fn add(&mut self, dst: VarId, a: impl Into<Operand>, b: impl Into<Operand>) -> InstId {
        self.binary(Opcode::Add, dst, a, b)
    }

    /// `dst = a - b`
    pub fn sub(&mut self, dst: VarId, a: impl Into<Operand>, b: impl Into<Operand>) -> InstId {
        self.binary(Opcode::Sub, dst, a, b)
    }

    /// `dst = a * b`
    pub fn mul(&mut self, dst: VarId, a: impl Into<Operand>, b: impl Into<Operand>) -> InstId {
        self.binary(Opcode::Mul, dst, a, b)
    }

    /// `dst = a < b`
    pub fn lt(&mut self, dst: VarId, a: impl Into<Operand>, b: impl Into<Operand>) -> InstId {
        self.binary(Opcode::Lt, dst, a, b)
    }

    /// `dst = &src`
    pub fn get_address(&mut self, dst: VarId, src: impl Into<Operand>) -> InstId {
        self.emit(Instruction::unary(Opcode::GetAddress, dst, src))
    }

    /// Unconditional jump.
    pub fn branch(&mut self, target: LabelId) -> InstId {
        self.emit(Instruction::branch(target))
    }

    /// Jump to `target` when `cond` is non-zero.
    pub fn branch_if(&mut self, cond: impl Into<Operand>, target: LabelId) -> InstId {
        self.emit(Instruction::branch_if(cond, target))
    }

    /// Jump to `target` when `cond` is zero.
    pub fn branch_if_not(&mut self, cond: impl Into<Operand>, target: LabelId) -> InstId {
        self.emit(
            Instruction::new(Opcode::BranchIfNot)
                .with_operand(0, cond)
                .with_operand(1, target),
        )
    }

    /// Direct call of `callee`.
    pub fn call(&mut self, callee: MethodId, args: &[Operand], result: Option<VarId>) -> InstId {
        let mut inst = Instruction::new(Opcode::Call).with_operand(0, callee);
        inst.args = args.to_vec();
        inst.result = result;
        self.emit(inst)
    }

    /// Indirect call through the function pointer `target`.
    pub fn icall(&mut self, target: VarId, args: &[Operand], result: Option<VarId>) -> InstId {
        let mut inst = Instruction::new(Opcode::ICall).with_operand(0, target);
        inst.args = args.to_vec();
        inst.result = result;
        self.emit(inst)
    }

    /// `dst = *(base + offset)`
    pub fn load(
        &mut self,
        dst: VarId,
        base: impl Into<Operand>,
        offset: impl Into<Operand>,
    ) -> InstId {
        self.emit(Instruction::binary(Opcode::LoadRel, dst, base, offset))
    }

    /// `*(base + offset) = value`
    pub fn store(
        &mut self,
        base: impl Into<Operand>,
        offset: impl Into<Operand>,
        value: impl Into<Operand>,
    ) -> InstId {
        self.emit(
            Instruction::new(Opcode::StoreRel)
                .with_operand(0, base)
                .with_operand(1, offset)
                .with_operand(2, value),
        )
    }

    /// Return, optionally with a value.
    pub fn ret(&mut self, value: Option<Operand>) -> InstId {
        self.emit(Instruction::ret(value))
    }

    /// A no-op.
    pub fn nop(&mut self) -> InstId {
        self.emit(Instruction::nop())
    }

    /// Finishes the method.
    #[must_use]
    pub fn build(self) -> Method {
        self.method
    }
}
