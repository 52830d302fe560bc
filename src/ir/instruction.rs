//! Instructions, opcodes and operands.
//!
//! # Operand layout
//!
//! | Opcode                    | operand 1        | operand 2    | operand 3 | result |
//! |---------------------------|------------------|--------------|-----------|--------|
//! | binary arithmetic/compare | left             | right        |           | yes    |
//! | unary, `Conv`, `Move`     | source           |              |           | yes    |
//! | `GetAddress`              | variable/global  |              |           | yes    |
//! | `Label`                   | label            |              |           |        |
//! | `Branch`                  | label            |              |           |        |
//! | `BranchIf[Not]`           | condition        | label        |           |        |
//! | `Call`/`VCall`            | method           |              |           | opt.   |
//! | `ICall`                   | function pointer |              |           | opt.   |
//! | `LoadRel`/`LoadElem`      | base             | offset/index |           | yes    |
//! | `StoreRel`/`StoreElem`    | base             | offset/index | value     |        |
//! | `Return`                  | value (opt.)     |              |           |        |
//!
//! Call arguments live in [`Instruction::args`].

use strum::{Display, EnumIter, IntoStaticStr};

use crate::ir::{GlobalId, LabelId, MethodId, VarId};

/// Operation performed by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Opcode {
    Nop,
    Label,
    Move,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Shl,
    Shr,
    Conv,
    Lt,
    Gt,
    Eq,
    GetAddress,
    IsNaN,
    IsInf,
    Sqrt,
    Sin,
    Cos,
    Branch,
    BranchIf,
    BranchIfNot,
    Call,
    VCall,
    ICall,
    LoadRel,
    StoreRel,
    LoadElem,
    StoreElem,
    Return,
}

impl Opcode {
    /// Returns `true` for side-effect free computations whose value depends
    /// only on their operands.
    #[must_use]
    pub const fn is_expression(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
                | Self::Rem
                | Self::And
                | Self::Or
                | Self::Xor
                | Self::Not
                | Self::Neg
                | Self::Shl
                | Self::Shr
                | Self::Conv
                | Self::Lt
                | Self::Gt
                | Self::Eq
                | Self::GetAddress
                | Self::IsNaN
                | Self::IsInf
                | Self::Sqrt
                | Self::Sin
                | Self::Cos
        )
    }

    /// Returns `true` if swapping the two operands does not change the value.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor | Self::Eq
        )
    }

    /// Returns `true` if the instruction may be hoisted out of a loop when
    /// its operands are loop invariant.
    #[must_use]
    pub const fn is_pure(self) -> bool {
        self.is_expression() || matches!(self, Self::Move)
    }

    /// Returns `true` for direct, virtual and indirect calls.
    #[must_use]
    pub const fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::VCall | Self::ICall)
    }

    /// Returns `true` for branch instructions.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Branch | Self::BranchIf | Self::BranchIfNot)
    }

    /// Returns `true` for memory loads.
    #[must_use]
    pub const fn is_memory_read(self) -> bool {
        matches!(self, Self::LoadRel | Self::LoadElem)
    }

    /// Returns `true` for memory stores.
    #[must_use]
    pub const fn is_memory_write(self) -> bool {
        matches!(self, Self::StoreRel | Self::StoreElem)
    }

    /// Returns `true` for any load or store.
    #[must_use]
    pub const fn is_memory(self) -> bool {
        self.is_memory_read() || self.is_memory_write()
    }

    /// Returns `true` if control may continue with the next instruction.
    #[must_use]
    pub const fn can_fall_through(self) -> bool {
        !matches!(self, Self::Branch | Self::Return)
    }
}

/// Type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Signed integer.
    #[default]
    Int,
    /// Unsigned integer.
    UInt,
    /// Floating point.
    Float,
    /// Managed or unmanaged pointer.
    Pointer,
}

impl ValueType {
    /// Returns `true` for signed and unsigned integers.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }
}

/// A literal operand.
#[derive(Debug, Clone, Copy)]
pub enum Constant {
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer.
    UInt(u64),
    /// 64-bit float.
    Float(f64),
}

impl Constant {
    /// Returns `true` for integer constants.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_))
    }

    /// Converts to a signed value when this does not lose information.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            Self::Float(_) => None,
        }
    }

    /// Returns the negated constant, or `None` when negation overflows.
    #[must_use]
    pub fn checked_neg(&self) -> Option<Self> {
        match *self {
            Self::Int(v) => v.checked_neg().map(Self::Int),
            Self::UInt(v) => i64::try_from(v).ok().map(|v| Self::Int(-v)),
            Self::Float(v) => Some(Self::Float(-v)),
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Constant {}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// A variable of the enclosing method.
    Var(VarId),
    /// A literal.
    Const(Constant),
    /// A branch label.
    Label(LabelId),
    /// A method reference.
    Method(MethodId),
    /// A global storage location.
    Global(GlobalId),
}

impl Operand {
    /// Returns the variable if this operand is one.
    #[must_use]
    pub const fn as_var(&self) -> Option<VarId> {
        match *self {
            Self::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the constant if this operand is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<Constant> {
        match *self {
            Self::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Returns `true` for integer literals.
    #[must_use]
    pub const fn is_integer_constant(&self) -> bool {
        matches!(self, Self::Const(c) if c.is_integer())
    }
}

impl From<VarId> for Operand {
    fn from(var: VarId) -> Self {
        Self::Var(var)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Const(Constant::Int(value))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Const(Constant::Int(i64::from(value)))
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Self::Const(value)
    }
}

impl From<GlobalId> for Operand {
    fn from(global: GlobalId) -> Self {
        Self::Global(global)
    }
}

impl From<MethodId> for Operand {
    fn from(method: MethodId) -> Self {
        Self::Method(method)
    }
}

impl From<LabelId> for Operand {
    fn from(label: LabelId) -> Self {
        Self::Label(label)
    }
}

/// A single IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation.
    pub opcode: Opcode,
    /// Up to three positional operands.
    pub operands: [Option<Operand>; 3],
    /// Call arguments.
    pub args: Vec<Operand>,
    /// Variable defined by this instruction.
    pub result: Option<VarId>,
}

impl Instruction {
    /// Creates an instruction without operands or result.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: [None; 3],
            args: Vec::new(),
            result: None,
        }
    }

    /// Sets operand `slot` (0-based).
    #[must_use]
    pub fn with_operand(mut self, slot: usize, operand: impl Into<Operand>) -> Self {
        self.operands[slot] = Some(operand.into());
        self
    }

    /// Sets the result variable.
    #[must_use]
    pub fn with_result(mut self, result: VarId) -> Self {
        self.result = Some(result);
        self
    }

    /// `result = left <opcode> right`
    #[must_use]
    pub fn binary(
        opcode: Opcode,
        result: VarId,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Self {
        Self::new(opcode)
            .with_operand(0, left)
            .with_operand(1, right)
            .with_result(result)
    }

    /// `result = <opcode> source`
    #[must_use]
    pub fn unary(opcode: Opcode, result: VarId, source: impl Into<Operand>) -> Self {
        Self::new(opcode).with_operand(0, source).with_result(result)
    }

    /// `result = source`
    #[must_use]
    pub fn mov(result: VarId, source: impl Into<Operand>) -> Self {
        Self::unary(Opcode::Move, result, source)
    }

    /// A label definition.
    #[must_use]
    pub fn label(label: LabelId) -> Self {
        Self::new(Opcode::Label).with_operand(0, label)
    }

    /// An unconditional branch.
    #[must_use]
    pub fn branch(target: LabelId) -> Self {
        Self::new(Opcode::Branch).with_operand(0, target)
    }

    /// A conditional branch taken when `condition` is non-zero.
    #[must_use]
    pub fn branch_if(condition: impl Into<Operand>, target: LabelId) -> Self {
        Self::new(Opcode::BranchIf)
            .with_operand(0, condition)
            .with_operand(1, target)
    }

    /// A no-op.
    #[must_use]
    pub fn nop() -> Self {
        Self::new(Opcode::Nop)
    }

    /// A return, optionally carrying a value.
    #[must_use]
    pub fn ret(value: Option<Operand>) -> Self {
        let mut inst = Self::new(Opcode::Return);
        inst.operands[0] = value;
        inst
    }

    /// Returns operand `slot` (0-based).
    #[must_use]
    pub fn operand(&self, slot: usize) -> Option<&Operand> {
        self.operands.get(slot).and_then(Option::as_ref)
    }

    /// Returns operand `slot` if it is a variable.
    #[must_use]
    pub fn operand_var(&self, slot: usize) -> Option<VarId> {
        self.operand(slot).and_then(Operand::as_var)
    }

    /// Iterates over every variable read by this instruction, including
    /// call arguments. A variable read twice is reported twice.
    pub fn uses(&self) -> impl Iterator<Item = VarId> + '_ {
        self.operands
            .iter()
            .flatten()
            .chain(self.args.iter())
            .filter_map(Operand::as_var)
    }

    /// Returns `true` if `var` is read by this instruction.
    #[must_use]
    pub fn uses_var(&self, var: VarId) -> bool {
        self.uses().any(|v| v == var)
    }

    /// Returns `true` if this instruction defines `var`.
    #[must_use]
    pub fn defines(&self, var: VarId) -> bool {
        self.result == Some(var)
    }

    /// Returns the label this instruction defines, if it is a `Label`.
    #[must_use]
    pub fn defined_label(&self) -> Option<LabelId> {
        if self.opcode != Opcode::Label {
            return None;
        }
        match self.operand(0) {
            Some(Operand::Label(l)) => Some(*l),
            _ => None,
        }
    }

    /// Returns the branch target, if this is a branch.
    #[must_use]
    pub fn branch_target(&self) -> Option<LabelId> {
        let slot = match self.opcode {
            Opcode::Branch => 0,
            Opcode::BranchIf | Opcode::BranchIfNot => 1,
            _ => return None,
        };
        match self.operand(slot) {
            Some(Operand::Label(l)) => Some(*l),
            _ => None,
        }
    }

    /// Redirects a branch to `target`. Returns `false` if this is not a branch.
    pub fn set_branch_target(&mut self, target: LabelId) -> bool {
        let slot = match self.opcode {
            Opcode::Branch => 0,
            Opcode::BranchIf | Opcode::BranchIfNot => 1,
            _ => return false,
        };
        self.operands[slot] = Some(Operand::Label(target));
        true
    }

    /// Returns the memory base operand of a load or store.
    #[must_use]
    pub fn memory_base(&self) -> Option<&Operand> {
        if self.opcode.is_memory() {
            self.operand(0)
        } else {
            None
        }
    }
}
