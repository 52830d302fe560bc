//! Partial redundancy elimination by lazy code motion.
//!
//! An expression is partially redundant when some, but not all, paths to a
//! computation of it already computed it. Lazy code motion places one
//! computation into a fresh temporary on the paths that lack it, as late as
//! possible, and turns the original computations into copies of the
//! temporary.
//!
//! # Pipeline
//!
//! 1. [`split_merge_points`] gives every incoming edge of a merge point its
//!    own pad instruction
//! 2. [`ExpressionTable`] numbers the candidate expressions and builds the
//!    local `gen`/`kill` sets
//! 3. [`LazyCodeMotion`] solves anticipated, available, earliest,
//!    postponable, latest and used in that order
//! 4. [`PartialRedundancy::run`] inserts `latest ∩ used.out` and rewrites
//!    redundant computations
//!
//! # Example
//!
//! ```rust
//! use optscope::analysis::pre::PartialRedundancy;
//! use optscope::ir::MethodBuilder;
//!
//! let mut b = MethodBuilder::new("f");
//! let (x, y, r1, r2) = (b.var(), b.var(), b.var(), b.var());
//! b.add(r1, x, y);
//! b.add(r2, x, y);
//! b.ret(Some(r2.into()));
//! let mut method = b.build();
//!
//! let report = PartialRedundancy::new().run(&mut method)?;
//! assert_eq!(report.temporaries, 1);
//! assert_eq!(report.rewrites, 2);
//! # Ok::<(), optscope::Error>(())
//! ```

mod expressions;
mod problems;

use std::collections::BTreeMap;

pub use expressions::{equivalent, is_candidate, kills, same, similar, ExpressionTable};
pub use problems::{earliest, latest, Anticipated, Available, LazyCodeMotion, Postponable, Used};

use crate::{
    analysis::dataflow::Escapes,
    config::OptimizerConfig,
    ir::{ControlFlowGraph, InstId, Instruction, LabelId, Method, Opcode, VarId},
    Result,
};

/// What one run of [`PartialRedundancy`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreReport {
    /// Pad instructions added by edge splitting.
    pub split_edges: usize,
    /// Fresh temporaries, one per moved expression class.
    pub temporaries: usize,
    /// Computations inserted into temporaries.
    pub insertions: usize,
    /// Original computations turned into copies of a temporary.
    pub rewrites: usize,
}

impl PreReport {
    /// Returns `true` if the method was not modified.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.split_edges == 0 && self.insertions == 0 && self.rewrites == 0
    }
}

/// Lazy code motion over a single method.
#[derive(Debug, Clone)]
pub struct PartialRedundancy {
    max_sweeps: Option<usize>,
    split_critical_edges: bool,
}

impl Default for PartialRedundancy {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialRedundancy {
    /// Splits merge points and solves every problem to its fixed point.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_sweeps: None,
            split_critical_edges: true,
        }
    }

    /// Takes the sweep cap and the edge splitting switch from `config`.
    #[must_use]
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            max_sweeps: config.max_sweeps,
            split_critical_edges: config.split_critical_edges,
        }
    }

    /// Caps every solver at `sweeps` sweeps.
    #[must_use]
    pub const fn max_sweeps(mut self, sweeps: Option<usize>) -> Self {
        self.max_sweeps = sweeps;
        self
    }

    /// Enables or disables [`split_merge_points`]. When disabled the method
    /// must already satisfy its postcondition.
    #[must_use]
    pub const fn split_critical_edges(mut self, split: bool) -> Self {
        self.split_critical_edges = split;
        self
    }

    /// Eliminates partial redundancies in `method`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a merge point cannot be split
    /// or, with splitting disabled, if one is left unsplit.
    #[tracing::instrument(level = "debug", skip_all, fields(method = method.name()))]
    pub fn run(&self, method: &mut Method) -> Result<PreReport> {
        let mut report = PreReport::default();
        if self.split_critical_edges {
            report.split_edges = split_merge_points(method)?;
        }

        let cfg = method.cfg()?;
        check_merge_points(method, &cfg)?;

        let escapes = Escapes::compute(method);
        let table = ExpressionTable::build(method, &escapes);
        if table.class_count() == 0 {
            return Ok(report);
        }
        let lcm = LazyCodeMotion::solve(&table, &cfg, self.max_sweeps);

        // Class representative -> computation of the class into its temporary.
        let mut computations: BTreeMap<InstId, Instruction> = BTreeMap::new();
        let mut insertions: Vec<(InstId, InstId)> = Vec::new();
        for i in 0..table.universe() {
            let point = InstId::new(i);
            let mut placed: Vec<InstId> = Vec::new();
            for j in lcm.placements(point).iter() {
                let Some(class) = table.class_of(InstId::new(j)) else {
                    continue;
                };
                if placed.contains(&class) {
                    continue;
                }
                placed.push(class);
                if !computations.contains_key(&class) {
                    let mut computation = method.get(class)?.clone();
                    let ty = computation
                        .result
                        .map(|r| method.var_type(r))
                        .unwrap_or_default();
                    computation.result = Some(method.new_variable(ty));
                    computations.insert(class, computation);
                }
                insertions.push((point, class));
            }
        }

        let mut rewrites: Vec<(InstId, VarId)> = Vec::new();
        for i in 0..table.universe() {
            let inst = InstId::new(i);
            let temp = table
                .class_of(inst)
                .and_then(|class| computations.get(&class))
                .and_then(|c| c.result);
            if let Some(temp) = temp {
                if lcm.is_redundant(inst) {
                    rewrites.push((inst, temp));
                }
            }
        }

        for (inst, temp) in &rewrites {
            let Some(target) = method.instruction_mut(*inst) else {
                return Err(malformed_error!("rewrite target {} vanished", inst.index()));
            };
            if let Some(result) = target.result {
                *target = Instruction::mov(result, *temp);
            }
        }

        // Descending points keep lower positions valid while inserting.
        insertions.sort_by(|a, b| b.0.cmp(&a.0));
        for (point, class) in &insertions {
            let Some(computation) = computations.get(class).cloned() else {
                continue;
            };
            if method.get(*point)?.opcode == Opcode::Label {
                method.insert_after(*point, computation);
            } else {
                method.insert_before(*point, computation);
            }
        }

        report.temporaries = computations.len();
        report.insertions = insertions.len();
        report.rewrites = rewrites.len();
        tracing::debug!(
            split_edges = report.split_edges,
            temporaries = report.temporaries,
            insertions = report.insertions,
            rewrites = report.rewrites,
            "partial redundancy elimination done"
        );
        Ok(report)
    }
}

/// Gives every incoming edge of every merge point a pad instruction of its
/// own, and returns the number of pads added.
///
/// A fall-through edge gets a `Nop` in front of the merge label. A branch is
/// redirected to a new label appended at the end of the method, followed by
/// a `Nop` and a branch back to the merge label.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if a pad has to be appended but the
/// last instruction of the method falls through.
pub fn split_merge_points(method: &mut Method) -> Result<usize> {
    let cfg = method.cfg()?;
    let merges: Vec<LabelId> = method
        .iter()
        .filter(|(id, _)| cfg.predecessors(*id).len() > 1)
        .filter_map(|(_, inst)| inst.defined_label())
        .collect();

    let mut pads = 0;
    for label in merges {
        let cfg = method.cfg()?;
        let Some(position) = method.label_position(label) else {
            continue;
        };
        let preds = cfg.predecessors(position).to_vec();
        for pred in preds.into_iter().rev() {
            let inst = method.get(pred)?;
            let falls_in =
                inst.opcode.can_fall_through() && pred.index() + 1 == position.index();
            if inst.branch_target() == Some(label) {
                let pad = append_pad(method, label)?;
                if let Some(branch) = method.instruction_mut(pred) {
                    branch.set_branch_target(pad);
                }
                pads += 1;
                if falls_in {
                    method.insert_after(pred, Instruction::nop());
                    pads += 1;
                }
            } else {
                method.insert_after(pred, Instruction::nop());
                pads += 1;
            }
        }
    }

    if pads > 0 {
        tracing::trace!(method = method.name(), pads, "split merge points");
    }
    Ok(pads)
}

fn append_pad(method: &mut Method, target: LabelId) -> Result<LabelId> {
    if let Some((last, inst)) = method.iter().next_back() {
        if inst.opcode.can_fall_through() {
            return Err(malformed_error!(
                "{}: cannot append a pad after fall-through instruction {}",
                method.name(),
                last.index()
            ));
        }
    }
    let pad = method.new_label();
    method.push(Instruction::label(pad));
    method.push(Instruction::nop());
    method.push(Instruction::branch(target));
    Ok(pad)
}

/// Every predecessor of a merge point must be a pad: a nop leading only
/// there, or an unconditional branch whose sole predecessor is such a nop.
fn check_merge_points(method: &Method, cfg: &ControlFlowGraph) -> Result<()> {
    for i in 0..cfg.len() {
        let merge = InstId::new(i);
        let preds = cfg.predecessors(merge);
        if preds.len() < 2 {
            continue;
        }
        for pred in preds {
            if !is_pad(method, cfg, *pred)? {
                return Err(malformed_error!(
                    "{}: edge {} -> {} into a merge point is not split",
                    method.name(),
                    pred.index(),
                    merge.index()
                ));
            }
        }
    }
    Ok(())
}

fn is_pad(method: &Method, cfg: &ControlFlowGraph, id: InstId) -> Result<bool> {
    if cfg.successors(id).len() != 1 || cfg.predecessors(id).len() > 1 {
        return Ok(false);
    }
    Ok(match method.get(id)?.opcode {
        Opcode::Nop => true,
        Opcode::Branch => match cfg.predecessors(id) {
            [nop] => method.get(*nop)?.opcode == Opcode::Nop,
            _ => false,
        },
        _ => false,
    })
}
