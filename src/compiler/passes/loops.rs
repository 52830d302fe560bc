//! Loop discovery and loop invariant identification.

use crate::{
    analysis::loops::{
        compute_invariants, detect_loops, link_across_calls, nest_within_method, Loop, LoopSet,
    },
    compiler::{context::CompilerContext, job::JobKind, pass::Pass},
    ir::MethodId,
    Result,
};

/// Discovers the natural loops of every method and nests them.
///
/// Nesting crosses call sites, so the whole loop set is rebuilt at once and
/// every loop identifier changes.
pub struct LoopIdentificationPass;

impl Pass for LoopIdentificationPass {
    fn name(&self) -> &'static str {
        "loop identification"
    }

    fn job_id(&self) -> JobKind {
        JobKind::LOOP_IDENTIFICATION
    }

    fn dependences(&self) -> JobKind {
        JobKind::PRE_DOMINATORS
    }

    fn invalidations(&self) -> JobKind {
        JobKind::LOOP_INVARIANTS | JobKind::INDUCTION_VARIABLES
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni, Brambilla Marco, Massari Giuseppe"
    }

    fn informations(&self) -> &'static str {
        "Identifies natural loops and their nesting across calls"
    }

    /// Loops of one method cannot be rebuilt alone; runs the global pass.
    fn run_on_method(&self, ctx: &CompilerContext, _method: MethodId) -> Result<()> {
        self.run_global(ctx)
    }

    fn is_global(&self) -> bool {
        true
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn run_global(&self, ctx: &CompilerContext) -> Result<()> {
        let mut loops = LoopSet::new();
        for id in ctx.methods() {
            let facts = ctx.facts(id);
            let method = ctx.program().lock(id)?;
            let cfg = ctx.cfg(id, &method)?;
            let found = detect_loops(&method, &cfg, &*facts.dominators()?);
            drop(method);
            for lp in found {
                loops.push(lp);
            }
            nest_within_method(&mut loops, id);
        }

        if ctx.config().interprocedural_nesting {
            let callgraph = ctx.callgraph()?;
            link_across_calls(&mut loops, &callgraph);
        }

        tracing::debug!(
            loops = loops.len(),
            methods = loops.methods_with_loops().len(),
            "loops identified"
        );
        ctx.update_loops(|set| *set = loops)
    }
}

/// Marks the loop invariant instructions of every loop of a method.
pub struct LoopInvariantsPass;

impl Pass for LoopInvariantsPass {
    fn name(&self) -> &'static str {
        "loop invariants"
    }

    fn job_id(&self) -> JobKind {
        JobKind::LOOP_INVARIANTS
    }

    fn dependences(&self) -> JobKind {
        JobKind::LOOP_IDENTIFICATION | JobKind::REACHING_DEFINITIONS | JobKind::ESCAPES
    }

    fn invalidations(&self) -> JobKind {
        JobKind::INDUCTION_VARIABLES
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni, Borgio Simone, Bosisio Davide, Alessandro Licata Caruso"
    }

    fn informations(&self) -> &'static str {
        "Identifies the loop invariant instructions"
    }

    fn run_on_method(&self, ctx: &CompilerContext, id: MethodId) -> Result<()> {
        let mut own: Vec<Loop> = ctx.with_loops(|loops| {
            loops
                .loops_of(id)
                .iter()
                .filter_map(|l| loops.get(*l).ok().cloned())
                .collect()
        })?;
        if own.is_empty() {
            return Ok(());
        }

        let facts = ctx.facts(id);
        let reaching = facts.reaching()?;
        let escapes = facts.escapes()?;
        {
            let method = ctx.program().lock(id)?;
            for lp in &mut own {
                compute_invariants(lp, &method, &reaching, &escapes);
            }
        }

        ctx.update_loops(|loops| {
            for lp in own {
                if let Ok(slot) = loops.get_mut(lp.id) {
                    slot.invariants = lp.invariants;
                }
            }
        })
    }
}
