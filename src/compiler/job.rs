use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    /// Jobs a pass provides, depends on or invalidates
    pub struct JobKind : u32 {
        /// Live variables
        const LIVENESS = 0x0001;
        /// Reaching definitions
        const REACHING_DEFINITIONS = 0x0002;
        /// Predominator sets
        const PRE_DOMINATORS = 0x0004;
        /// Escaped variables and globals
        const ESCAPES = 0x0008;
        /// Natural loops and their nesting
        const LOOP_IDENTIFICATION = 0x0010;
        /// Loop invariant instructions
        const LOOP_INVARIANTS = 0x0020;
        /// Induction variables of every loop
        const INDUCTION_VARIABLES = 0x0040;
        /// Partial redundancy elimination
        const PARTIAL_REDUNDANCY = 0x0080;
        /// Interprocedural data dependence graphs
        const DATA_DEPENDENCES = 0x0100;

        /// Every job
        const ALL = 0x01ff;
    }
}

impl JobKind {
    /// Jobs whose results live in [`crate::analysis::MethodFacts`].
    pub const METHOD_FACTS: Self = Self::LIVENESS
        .union(Self::REACHING_DEFINITIONS)
        .union(Self::PRE_DOMINATORS)
        .union(Self::ESCAPES);

    /// Jobs whose results live in the loop set.
    pub const LOOP_INFORMATION: Self = Self::LOOP_IDENTIFICATION
        .union(Self::LOOP_INVARIANTS)
        .union(Self::INDUCTION_VARIABLES);

    /// Every single job, in dependence order of the shipped passes.
    pub const EACH: [Self; 9] = [
        Self::LIVENESS,
        Self::REACHING_DEFINITIONS,
        Self::PRE_DOMINATORS,
        Self::ESCAPES,
        Self::LOOP_IDENTIFICATION,
        Self::LOOP_INVARIANTS,
        Self::INDUCTION_VARIABLES,
        Self::PARTIAL_REDUNDANCY,
        Self::DATA_DEPENDENCES,
    ];

    /// The single jobs contained in `self`.
    pub fn jobs(self) -> impl Iterator<Item = Self> {
        Self::EACH.into_iter().filter(move |job| self.contains(*job))
    }

    /// Lower case name of a single job, `"mixed"` for several.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LIVENESS => "liveness",
            Self::REACHING_DEFINITIONS => "reaching definitions",
            Self::PRE_DOMINATORS => "predominators",
            Self::ESCAPES => "escapes",
            Self::LOOP_IDENTIFICATION => "loop identification",
            Self::LOOP_INVARIANTS => "loop invariants",
            Self::INDUCTION_VARIABLES => "induction variables",
            Self::PARTIAL_REDUNDANCY => "partial redundancy",
            Self::DATA_DEPENDENCES => "data dependences",
            _ if self.is_empty() => "none",
            _ => "mixed",
        }
    }
}

#[cfg(test)]
mod tests {
    use bitflags::Flags;

    use super::*;

    #[test]
    fn test_all_covers_every_job() {
        let union = JobKind::FLAGS
            .iter()
            .filter(|flag| *flag.value() != JobKind::ALL)
            .fold(JobKind::empty(), |acc, flag| acc | *flag.value());
        assert_eq!(union, JobKind::ALL);
        assert_eq!(JobKind::all(), JobKind::ALL);
    }

    #[test]
    fn test_groups_are_disjoint() {
        assert!(!JobKind::METHOD_FACTS.intersects(JobKind::LOOP_INFORMATION));
        assert_eq!(JobKind::LIVENESS.label(), "liveness");
        assert_eq!((JobKind::LIVENESS | JobKind::ESCAPES).label(), "mixed");
        let jobs: Vec<_> = (JobKind::ESCAPES | JobKind::LIVENESS).jobs().collect();
        assert_eq!(jobs, vec![JobKind::LIVENESS, JobKind::ESCAPES]);
        assert_eq!(JobKind::ALL.jobs().count(), JobKind::EACH.len());
    }
}
