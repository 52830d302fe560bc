//! Per-method dependence graphs.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::{
    ir::{InstId, Method},
    utils::DotWriter,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Kinds of data dependence between two instructions
    pub struct DependenceKind : u8 {
        /// Read after write through a variable
        const RAW = 0x01;
        /// Write after read through a variable
        const WAR = 0x02;
        /// Write after write through a variable
        const WAW = 0x04;
        /// Read after write through memory
        const MRAW = 0x08;
        /// Write after read through memory
        const MWAR = 0x10;
        /// Write after write through memory
        const MWAW = 0x20;

        /// Every variable kind
        const REGISTER = Self::RAW.bits() | Self::WAR.bits() | Self::WAW.bits();
        /// Every memory kind
        const MEMORY = Self::MRAW.bits() | Self::MWAR.bits() | Self::MWAW.bits();
    }
}

impl DependenceKind {
    /// Returns `true` if only memory kinds are set.
    #[must_use]
    pub fn is_memory_only(self) -> bool {
        !self.is_empty() && Self::MEMORY.contains(self)
    }
}

/// Data dependences among the instructions of one method.
///
/// An edge `from -> to` means `to` depends on `from`: `from` executes first
/// and `to` must observe its effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependenceGraph {
    /// `depending[from][to]`
    depending: Vec<BTreeMap<InstId, DependenceKind>>,
    /// `depends_from[to][from]`
    depends_from: Vec<BTreeMap<InstId, DependenceKind>>,
}

impl DependenceGraph {
    /// Creates an edgeless graph over `count` instructions.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            depending: vec![BTreeMap::new(); count],
            depends_from: vec![BTreeMap::new(); count],
        }
    }

    /// Number of instructions covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.depending.len()
    }

    /// Returns `true` if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depending.iter().all(BTreeMap::is_empty)
    }

    /// Number of dependent instruction pairs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.depending.iter().map(BTreeMap::len).sum()
    }

    /// Records that `to` depends on `from` with `kind`, merging with any
    /// kind already recorded. Returns `true` if a bit was added.
    ///
    /// Instructions outside the graph are ignored.
    pub fn add(&mut self, from: InstId, to: InstId, kind: DependenceKind) -> bool {
        if from.index() >= self.len() || to.index() >= self.len() || kind.is_empty() {
            return false;
        }
        let entry = self.depending[from.index()]
            .entry(to)
            .or_insert(DependenceKind::empty());
        let before = *entry;
        *entry |= kind;
        let after = *entry;
        self.depends_from[to.index()].insert(from, after);
        before != after
    }

    /// Removes the edge `from -> to` and returns its kind.
    pub fn remove(&mut self, from: InstId, to: InstId) -> Option<DependenceKind> {
        let kind = self.depending.get_mut(from.index())?.remove(&to)?;
        if let Some(back) = self.depends_from.get_mut(to.index()) {
            back.remove(&from);
        }
        Some(kind)
    }

    /// Kind of the edge `from -> to`.
    #[must_use]
    pub fn dependence(&self, from: InstId, to: InstId) -> Option<DependenceKind> {
        self.depending.get(from.index())?.get(&to).copied()
    }

    /// Instructions `to` depends on, ascending.
    pub fn depends_from(&self, to: InstId) -> impl Iterator<Item = (InstId, DependenceKind)> + '_ {
        self.depends_from
            .get(to.index())
            .into_iter()
            .flat_map(|m| m.iter().map(|(i, k)| (*i, *k)))
    }

    /// Instructions depending on `from`, ascending.
    pub fn depending_insts(&self, from: InstId) -> impl Iterator<Item = (InstId, DependenceKind)> + '_ {
        self.depending
            .get(from.index())
            .into_iter()
            .flat_map(|m| m.iter().map(|(i, k)| (*i, *k)))
    }

    /// Every edge as `(from, to, kind)`, ordered by `from` then `to`.
    pub fn edges(&self) -> impl Iterator<Item = (InstId, InstId, DependenceKind)> + '_ {
        self.depending.iter().enumerate().flat_map(|(from, m)| {
            m.iter().map(move |(to, k)| (InstId::new(from), *to, *k))
        })
    }

    /// Renders the graph in DOT format with instructions labelled by opcode.
    #[must_use]
    pub fn to_dot(&self, method: &Method) -> String {
        let mut dot = DotWriter::new("DDG", &format!("Data dependences of {}", method.name()));
        for (id, inst) in method.iter() {
            if id.index() >= self.len() {
                break;
            }
            let fill = (!self.depending[id.index()].is_empty()
                || !self.depends_from[id.index()].is_empty())
            .then_some("lightblue");
            dot.node(
                &format!("i{}", id.index()),
                &format!("{}: {}", id.index(), inst.opcode),
                fill,
            );
        }
        for (from, to, _) in self.edges() {
            dot.edge(&format!("i{}", from.index()), &format!("i{}", to.index()));
        }
        dot.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i(n: usize) -> InstId {
        InstId::new(n)
    }

    #[test]
    fn test_add_merges_kinds() {
        let mut g = DependenceGraph::new(4);
        assert!(g.add(i(0), i(2), DependenceKind::RAW));
        assert!(g.add(i(0), i(2), DependenceKind::WAW));
        assert!(!g.add(i(0), i(2), DependenceKind::RAW));
        assert!(!g.add(i(0), i(9), DependenceKind::RAW));

        assert_eq!(g.edge_count(), 1);
        assert_eq!(
            g.dependence(i(0), i(2)),
            Some(DependenceKind::RAW | DependenceKind::WAW)
        );
        assert_eq!(
            g.depends_from(i(2)).collect::<Vec<_>>(),
            vec![(i(0), DependenceKind::RAW | DependenceKind::WAW)]
        );
        assert_eq!(g.dependence(i(2), i(0)), None);
    }

    #[test]
    fn test_remove_keeps_views_in_sync() {
        let mut g = DependenceGraph::new(3);
        g.add(i(1), i(2), DependenceKind::MRAW);
        g.add(i(0), i(2), DependenceKind::RAW);
        assert_eq!(g.remove(i(1), i(2)), Some(DependenceKind::MRAW));
        assert_eq!(g.remove(i(1), i(2)), None);
        assert_eq!(g.depends_from(i(2)).count(), 1);
        assert_eq!(g.depending_insts(i(1)).count(), 0);
    }

    #[test]
    fn test_memory_only() {
        assert!(DependenceKind::MRAW.is_memory_only());
        assert!((DependenceKind::MRAW | DependenceKind::MWAW).is_memory_only());
        assert!(!(DependenceKind::MRAW | DependenceKind::RAW).is_memory_only());
        assert!(!DependenceKind::empty().is_memory_only());
    }
}
