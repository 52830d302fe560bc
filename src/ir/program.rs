//! The set of methods an optimizer run works on.

use std::sync::{Mutex, MutexGuard};

use crate::{
    ir::{Method, MethodId},
    Error, Result,
};

/// All methods known to the optimizer.
///
/// Each method sits behind its own lock; a pass holds the lock of the method
/// it works on for its whole duration. Names and the library flag are
/// copied out at registration so they can be queried without locking.
#[derive(Debug, Default)]
pub struct Program {
    methods: Vec<Mutex<Method>>,
    names: Vec<String>,
    library: Vec<bool>,
    entry_point: Option<MethodId>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` and returns its identifier.
    pub fn add_method(&mut self, mut method: Method) -> MethodId {
        let id = MethodId::new(self.methods.len());
        method.set_id(id);
        self.names.push(method.name().to_string());
        self.library.push(method.is_library());
        self.methods.push(Mutex::new(method));
        id
    }

    /// Reserves an identifier for a method added later with
    /// [`Program::define_method`]; useful for building mutually recursive calls.
    pub fn declare_method(&mut self, name: impl Into<String>) -> MethodId {
        self.add_method(Method::new(name))
    }

    /// Replaces the body of a declared method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMethod`] for an unknown identifier and
    /// [`Error::LockError`] if the method lock is poisoned.
    pub fn define_method(&self, id: MethodId, mut method: Method) -> Result<()> {
        let mut slot = self.lock(id)?;
        method.set_id(id);
        if method.name() != self.names[id.index()] || method.is_library() != slot.is_library() {
            return Err(Error::Error(format!(
                "definition of {} does not match its declaration",
                self.names[id.index()]
            )));
        }
        *slot = method;
        Ok(())
    }

    /// Number of methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Iterates over all method identifiers.
    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId::new)
    }

    /// Acquires the lock of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMethod`] for an unknown identifier and
    /// [`Error::LockError`] if the lock is poisoned.
    pub fn lock(&self, id: MethodId) -> Result<MutexGuard<'_, Method>> {
        let slot = self
            .methods
            .get(id.index())
            .ok_or(Error::UnknownMethod(id))?;
        Ok(lock!(slot))
    }

    /// Name of `id`, if known.
    #[must_use]
    pub fn name(&self, id: MethodId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Returns `true` if `id` belongs to the runtime library.
    #[must_use]
    pub fn is_library(&self, id: MethodId) -> bool {
        self.library.get(id.index()).copied().unwrap_or(false)
    }

    /// All methods called `name`.
    #[must_use]
    pub fn methods_named(&self, name: &str) -> Vec<MethodId> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(i, _)| MethodId::new(i))
            .collect()
    }

    /// Sets the runtime-provided default entry point.
    pub fn set_entry_point(&mut self, id: MethodId) {
        self.entry_point = Some(id);
    }

    /// The runtime-provided default entry point.
    #[must_use]
    pub const fn entry_point(&self) -> Option<MethodId> {
        self.entry_point
    }

    /// Chooses the method the interprocedural analyses start from.
    ///
    /// The first name in `names` that matches any method decides: a unique
    /// match wins, an ambiguous one falls back to the runtime entry point.
    /// The entry point is also used when no name matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntryPoint`] if neither yields a method.
    pub fn main_method(&self, names: &[String]) -> Result<MethodId> {
        for name in names {
            match self.methods_named(name).as_slice() {
                [] => {}
                [single] => return Ok(*single),
                _ => break,
            }
        }
        self.entry_point.ok_or(Error::MissingEntryPoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_main_method_prefers_unique_name() {
        let mut program = Program::new();
        let start = program.add_method(Method::new("start"));
        let main = program.add_method(Method::new("main"));
        program.set_entry_point(start);

        assert_eq!(program.main_method(&names(&["main", "Main"])).unwrap(), main);
    }

    #[test]
    fn test_main_method_falls_back_on_ambiguity() {
        let mut program = Program::new();
        let start = program.add_method(Method::new("start"));
        program.add_method(Method::new("main"));
        program.add_method(Method::new("main"));
        assert!(program.main_method(&names(&["main"])).is_err());

        program.set_entry_point(start);
        assert_eq!(program.main_method(&names(&["main"])).unwrap(), start);
    }

    #[test]
    fn test_ambiguous_name_stops_the_search() {
        let mut program = Program::new();
        let start = program.add_method(Method::new("start"));
        program.add_method(Method::new("main"));
        program.add_method(Method::new("main"));
        program.add_method(Method::new("Main"));
        program.set_entry_point(start);

        assert_eq!(program.main_method(&names(&["main", "Main"])).unwrap(), start);
        assert_eq!(program.main_method(&names(&["absent", "main"])).unwrap(), start);
    }

    #[test]
    fn test_define_declared_method() {
        let mut program = Program::new();
        let id = program.declare_method("f");
        let mut body = Method::new("f");
        body.push(crate::ir::Instruction::ret(None));
        program.define_method(id, body).unwrap();
        assert_eq!(program.lock(id).unwrap().len(), 1);
        assert!(program.define_method(id, Method::new("g")).is_err());
    }
}
