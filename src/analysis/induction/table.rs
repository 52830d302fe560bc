use std::{collections::BTreeMap, fmt};

use crate::ir::VarId;

/// A coefficient of an induction variable relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvTerm {
    /// A literal.
    Const(i64),
    /// A loop invariant variable.
    Var(VarId),
    /// The negation of a loop invariant variable.
    NegVar(VarId),
}

impl IvTerm {
    /// Zero.
    pub const ZERO: Self = Self::Const(0);
    /// One.
    pub const ONE: Self = Self::Const(1);

    /// The literal value, if this is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<i64> {
        match *self {
            Self::Const(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for IvTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v}"),
            Self::Var(v) => write!(f, "v{}", v.index()),
            Self::NegVar(v) => write!(f, "-v{}", v.index()),
        }
    }
}

/// An induction variable `id` with basis `basis`.
///
/// For additive recurrences `id = a + b * basis`. A basic multiplicative
/// variable (`id = id * c` every iteration) keeps `a = b = 0` and its factor
/// in `c`; every other record has `c = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InductionVariable {
    /// The variable.
    pub id: VarId,
    /// The variable it is computed from; `id` itself for basic variables.
    pub basis: VarId,
    /// Additive term.
    pub a: IvTerm,
    /// Coefficient of the basis, or the step of a basic variable.
    pub b: IvTerm,
    /// Factor of a basic multiplicative variable.
    pub c: IvTerm,
}

impl InductionVariable {
    /// Returns `true` if the variable is its own basis.
    #[must_use]
    pub fn is_basic(&self) -> bool {
        self.id == self.basis
    }
}

impl fmt::Display for InductionVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} = ({}, {}, {}) over v{}",
            self.id.index(),
            self.a,
            self.b,
            self.c,
            self.basis.index()
        )
    }
}

/// Induction variables of one loop, keyed by variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InductionTable {
    vars: BTreeMap<VarId, InductionVariable>,
}

impl InductionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `iv`. Returns `false` if its variable was already classified.
    pub fn insert(&mut self, iv: InductionVariable) -> bool {
        if self.vars.contains_key(&iv.id) {
            return false;
        }
        self.vars.insert(iv.id, iv);
        true
    }

    /// The record of `var`.
    #[must_use]
    pub fn get(&self, var: VarId) -> Option<&InductionVariable> {
        self.vars.get(&var)
    }

    /// Returns `true` if `var` is classified.
    #[must_use]
    pub fn contains(&self, var: VarId) -> bool {
        self.vars.contains_key(&var)
    }

    /// Returns `true` if `var` is a basic induction variable.
    #[must_use]
    pub fn is_basic(&self, var: VarId) -> bool {
        self.get(var).is_some_and(InductionVariable::is_basic)
    }

    /// Returns `true` if `var` is a derived induction variable.
    #[must_use]
    pub fn is_derived(&self, var: VarId) -> bool {
        self.get(var).is_some_and(|iv| !iv.is_basic())
    }

    /// Iterates over the records by ascending variable.
    pub fn iter(&self) -> impl Iterator<Item = &InductionVariable> {
        self.vars.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if nothing is classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Number of basic variables.
    #[must_use]
    pub fn basic_count(&self) -> usize {
        self.iter().filter(|iv| iv.is_basic()).count()
    }

    /// Number of derived variables.
    #[must_use]
    pub fn derived_count(&self) -> usize {
        self.len() - self.basic_count()
    }

    /// Bases visited from `var` down to its basic variable, `var` excluded.
    fn chain(&self, var: VarId) -> Vec<VarId> {
        let mut chain = Vec::new();
        let mut current = self.get(var);
        while let Some(iv) = current {
            if chain.contains(&iv.basis) {
                break;
            }
            chain.push(iv.basis);
            if iv.is_basic() {
                break;
            }
            current = self.get(iv.basis);
        }
        chain
    }

    /// The basic variable `var` ultimately derives from.
    #[must_use]
    pub fn root_of(&self, var: VarId) -> Option<VarId> {
        let root = *self.chain(var).last()?;
        self.is_basic(root).then_some(root)
    }

    /// Returns `true` if the chains of `a` and `b` share a basis.
    #[must_use]
    pub fn shares_parent(&self, a: VarId, b: VarId) -> bool {
        if a == b {
            return true;
        }
        let left = self.chain(a);
        let right = self.chain(b);
        left.iter().any(|v| right.contains(v))
    }

    /// Folds `var` down to its basic variable as `(basis, a, b)` with
    /// `var = a + b * basis`.
    ///
    /// Returns `None` when a coefficient on the chain is not a literal or
    /// when the arithmetic overflows.
    #[must_use]
    pub fn fold(&self, var: VarId) -> Option<(VarId, i64, i64)> {
        let mut steps = Vec::new();
        let mut current = *self.get(var)?;
        while !current.is_basic() {
            if steps.len() > self.vars.len() {
                return None;
            }
            steps.push((current.a.as_const()?, current.b.as_const()?));
            current = *self.get(current.basis)?;
        }

        let (mut a, mut b) = (0i64, 1i64);
        for (step_a, step_b) in steps.into_iter().rev() {
            // var = step_a + step_b * (a + b * root)
            a = step_a.checked_add(step_b.checked_mul(a)?)?;
            b = step_b.checked_mul(b)?;
        }
        Some((current.id, a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId::new(i)
    }

    fn table() -> InductionTable {
        let mut t = InductionTable::new();
        t.insert(InductionVariable {
            id: v(0),
            basis: v(0),
            a: IvTerm::ZERO,
            b: IvTerm::Const(1),
            c: IvTerm::ZERO,
        });
        // v1 = 3 + 4 * v0
        t.insert(InductionVariable {
            id: v(1),
            basis: v(0),
            a: IvTerm::Const(3),
            b: IvTerm::Const(4),
            c: IvTerm::ZERO,
        });
        // v2 = -1 + 2 * v1
        t.insert(InductionVariable {
            id: v(2),
            basis: v(1),
            a: IvTerm::Const(-1),
            b: IvTerm::Const(2),
            c: IvTerm::ZERO,
        });
        // v3 = v5 + 1 * v0
        t.insert(InductionVariable {
            id: v(3),
            basis: v(0),
            a: IvTerm::Var(v(5)),
            b: IvTerm::ONE,
            c: IvTerm::ZERO,
        });
        t
    }

    #[test]
    fn test_fold_chain() {
        let t = table();
        assert_eq!(t.fold(v(0)), Some((v(0), 0, 1)));
        assert_eq!(t.fold(v(1)), Some((v(0), 3, 4)));
        // -1 + 2 * (3 + 4 * v0) = 5 + 8 * v0
        assert_eq!(t.fold(v(2)), Some((v(0), 5, 8)));
        assert_eq!(t.fold(v(3)), None);
        assert_eq!(t.fold(v(9)), None);
    }

    #[test]
    fn test_fold_overflow() {
        let mut t = table();
        t.insert(InductionVariable {
            id: v(4),
            basis: v(2),
            a: IvTerm::ZERO,
            b: IvTerm::Const(i64::MAX),
            c: IvTerm::ZERO,
        });
        assert_eq!(t.fold(v(4)), None);
    }

    #[test]
    fn test_chain_queries() {
        let mut t = table();
        assert_eq!(t.root_of(v(2)), Some(v(0)));
        assert!(t.shares_parent(v(2), v(3)));
        assert!(!t.shares_parent(v(2), v(7)));
        assert_eq!(t.basic_count(), 1);
        assert_eq!(t.derived_count(), 3);
        assert!(!t.insert(InductionVariable {
            id: v(1),
            basis: v(1),
            a: IvTerm::ZERO,
            b: IvTerm::ONE,
            c: IvTerm::ZERO,
        }));
    }
}
