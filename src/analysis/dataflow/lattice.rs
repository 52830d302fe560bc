//! Confluence operators for bit-vector lattices.
//!
//! Every problem solved in this crate is a powerset lattice over a finite
//! universe (instructions or variables). The only degree of freedom is how
//! facts combine where control flow merges:
//!
//! - **Union** for *may* problems (liveness, reaching definitions, used
//!   expressions): a fact holds if it holds on some path
//! - **Intersection** for *must* problems (anticipated, available and
//!   postponable expressions, predominators): a fact holds only if it holds
//!   on every path
//!
//! Both operators are idempotent, commutative and associative, and the
//! lattice height is the universe size, which bounds the number of times any
//! fact can change.

use crate::utils::BitSet;

/// How facts from several neighbours are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confluence {
    /// Set union (may analysis).
    Union,
    /// Set intersection (must analysis).
    Intersection,
}

impl Confluence {
    /// The identity element: empty for union, full for intersection.
    #[must_use]
    pub fn identity(self, universe: usize) -> BitSet {
        match self {
            Self::Union => BitSet::new(universe),
            Self::Intersection => BitSet::full(universe),
        }
    }

    /// Combines `other` into `acc`, returning `true` if `acc` changed.
    pub fn meet_into(self, acc: &mut BitSet, other: &BitSet) -> bool {
        match self {
            Self::Union => acc.union_with(other),
            Self::Intersection => acc.intersect_with(other),
        }
    }

    /// Combines all `facts`; the identity when `facts` is empty.
    #[must_use]
    pub fn meet_all<'a, I>(self, universe: usize, facts: I) -> BitSet
    where
        I: IntoIterator<Item = &'a BitSet>,
    {
        let mut acc = self.identity(universe);
        for fact in facts {
            self.meet_into(&mut acc, fact);
        }
        acc
    }
}
