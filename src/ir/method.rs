//! Method bodies.

use crate::{
    ir::{ControlFlowGraph, InstId, Instruction, LabelId, MethodId, ValueType, VarId},
    Result,
};

/// An ordered instruction stream together with its variable space.
///
/// Instruction identifiers are positions, so [`Method::insert_before`] and
/// [`Method::insert_after`] renumber every later instruction.
#[derive(Debug, Clone)]
pub struct Method {
    id: MethodId,
    name: String,
    library: bool,
    instructions: Vec<Instruction>,
    var_types: Vec<ValueType>,
    next_label: usize,
}

impl Method {
    /// Creates an empty method.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MethodId::new(0),
            name: name.into(),
            library: false,
            instructions: Vec::new(),
            var_types: Vec::new(),
            next_label: 0,
        }
    }

    /// Identifier assigned when the method was added to a [`crate::ir::Program`].
    #[must_use]
    pub const fn id(&self) -> MethodId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: MethodId) {
        self.id = id;
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for methods of the runtime library.
    #[must_use]
    pub const fn is_library(&self) -> bool {
        self.library
    }

    /// Marks the method as belonging to the runtime library.
    pub fn set_library(&mut self, library: bool) {
        self.library = library;
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the method has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `id`.
    #[must_use]
    pub fn instruction(&self, id: InstId) -> Option<&Instruction> {
        self.instructions.get(id.index())
    }

    /// Returns the instruction at `id`, failing on out-of-range identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `id` is not an instruction of this method.
    pub fn get(&self, id: InstId) -> Result<&Instruction> {
        self.instructions.get(id.index()).ok_or_else(|| {
            malformed_error!("{}: instruction {} out of range", self.name, id.index())
        })
    }

    /// Returns the instruction at `id` for mutation.
    pub fn instruction_mut(&mut self, id: InstId) -> Option<&mut Instruction> {
        self.instructions.get_mut(id.index())
    }

    /// Iterates over `(id, instruction)` pairs in program order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (InstId, &Instruction)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstId::new(i), inst))
    }

    /// Number of variables.
    #[must_use]
    pub fn var_count(&self) -> usize {
        self.var_types.len()
    }

    /// Type of `var`, defaulting to `Int` for unknown variables.
    #[must_use]
    pub fn var_type(&self, var: VarId) -> ValueType {
        self.var_types.get(var.index()).copied().unwrap_or_default()
    }

    /// Allocates a fresh variable.
    pub fn new_variable(&mut self, ty: ValueType) -> VarId {
        self.var_types.push(ty);
        VarId::new(self.var_types.len() - 1)
    }

    /// Allocates a fresh label identifier.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId::new(self.next_label);
        self.next_label += 1;
        label
    }

    /// Appends an instruction.
    pub fn push(&mut self, inst: Instruction) -> InstId {
        self.reserve_names(&inst);
        self.instructions.push(inst);
        InstId::new(self.instructions.len() - 1)
    }

    /// Inserts `inst` so that it becomes the new instruction at `position`.
    pub fn insert_before(&mut self, position: InstId, inst: Instruction) -> InstId {
        self.reserve_names(&inst);
        let at = position.index().min(self.instructions.len());
        self.instructions.insert(at, inst);
        InstId::new(at)
    }

    /// Inserts `inst` right after `position`.
    pub fn insert_after(&mut self, position: InstId, inst: Instruction) -> InstId {
        self.insert_before(InstId::new(position.index() + 1), inst)
    }

    /// Position of the `Label` instruction defining `label`.
    #[must_use]
    pub fn label_position(&self, label: LabelId) -> Option<InstId> {
        self.iter()
            .find(|(_, inst)| inst.defined_label() == Some(label))
            .map(|(id, _)| id)
    }

    /// Every instruction defining `var`, in program order.
    #[must_use]
    pub fn definitions_of(&self, var: VarId) -> Vec<InstId> {
        self.iter()
            .filter(|(_, inst)| inst.defines(var))
            .map(|(id, _)| id)
            .collect()
    }

    /// Builds the instruction-level control flow graph.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a branch targets an undefined label.
    pub fn cfg(&self) -> Result<ControlFlowGraph> {
        ControlFlowGraph::build(self)
    }

    // Keeps variable and label counters ahead of identifiers used by
    // instructions built outside of this method.
    fn reserve_names(&mut self, inst: &Instruction) {
        let max_var = inst.uses().chain(inst.result).map(VarId::index).max();
        if let Some(max_var) = max_var {
            while self.var_types.len() <= max_var {
                self.var_types.push(ValueType::default());
            }
        }
        for label in inst.defined_label().into_iter().chain(inst.branch_target()) {
            self.next_label = self.next_label.max(label.index() + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn test_insert_renumbers_later_instructions() {
        let mut method = Method::new("m");
        let v = method.new_variable(ValueType::Int);
        method.push(Instruction::mov(v, 1));
        let ret = method.push(Instruction::ret(None));
        assert_eq!(ret.index(), 1);

        method.insert_before(ret, Instruction::nop());
        assert_eq!(method.get(InstId::new(2)).unwrap().opcode, Opcode::Return);
        assert!(method.get(InstId::new(3)).is_err());
    }

    #[test]
    fn test_reserve_names_grows_variable_space() {
        let mut method = Method::new("m");
        method.push(Instruction::mov(VarId::new(4), VarId::new(2)));
        assert_eq!(method.var_count(), 5);
        method.push(Instruction::label(LabelId::new(2)));
        assert_eq!(method.new_label().index(), 3);
        assert_eq!(method.definitions_of(VarId::new(4)), vec![InstId::new(0)]);
    }
}
