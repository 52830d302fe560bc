//! Method-level analyses cached in [`crate::analysis::MethodFacts`].
//!
//! Each pass locks one method, computes its result on the cached control
//! flow graph and stores it. None of them changes the code.

use std::sync::Arc;

use crate::{
    analysis::{
        dataflow::{DominatorSets, Escapes, LivenessResult, ReachingDefsResult},
        MethodFacts,
    },
    compiler::{context::CompilerContext, job::JobKind, pass::Pass},
    ir::{ControlFlowGraph, Method, MethodId},
    Result,
};

/// Locks `id`, computes a fact with `compute` and stores it with `store`.
fn compute_fact<T>(
    ctx: &CompilerContext,
    id: MethodId,
    compute: impl FnOnce(&Method, &ControlFlowGraph) -> T,
    store: impl FnOnce(&mut MethodFacts, Arc<T>),
) -> Result<()> {
    let method = ctx.program().lock(id)?;
    let cfg = ctx.cfg(id, &method)?;
    let fact = Arc::new(compute(&method, &cfg));
    drop(method);
    ctx.update_facts(id, |facts| store(facts, fact));
    Ok(())
}

/// Live variables at every instruction.
pub struct LivenessPass;

impl Pass for LivenessPass {
    fn name(&self) -> &'static str {
        "liveness"
    }

    fn job_id(&self) -> JobKind {
        JobKind::LIVENESS
    }

    fn author(&self) -> &'static str {
        "Campanoni Simone"
    }

    fn informations(&self) -> &'static str {
        "Computes the variables live in and out of each instruction"
    }

    fn run_on_method(&self, ctx: &CompilerContext, method: MethodId) -> Result<()> {
        compute_fact(ctx, method, LivenessResult::compute, |facts, liveness| {
            facts.liveness = Some(liveness);
        })
    }
}

/// Definitions reaching every instruction.
pub struct ReachingDefinitionsPass;

impl Pass for ReachingDefinitionsPass {
    fn name(&self) -> &'static str {
        "reaching definitions"
    }

    fn job_id(&self) -> JobKind {
        JobKind::REACHING_DEFINITIONS
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni and Ezequiel Lara Gómez"
    }

    fn informations(&self) -> &'static str {
        "Computes the definitions reaching each instruction"
    }

    fn run_on_method(&self, ctx: &CompilerContext, method: MethodId) -> Result<()> {
        compute_fact(ctx, method, ReachingDefsResult::compute, |facts, reaching| {
            facts.reaching = Some(reaching);
        })
    }
}

/// Predominator sets of every instruction.
pub struct PreDominatorsPass;

impl Pass for PreDominatorsPass {
    fn name(&self) -> &'static str {
        "predominators"
    }

    fn job_id(&self) -> JobKind {
        JobKind::PRE_DOMINATORS
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni, Castiglioni William, Sozzi Domenico"
    }

    fn informations(&self) -> &'static str {
        "Computes the predominators of each instruction"
    }

    fn run_on_method(&self, ctx: &CompilerContext, method: MethodId) -> Result<()> {
        compute_fact(
            ctx,
            method,
            |_, cfg| DominatorSets::compute(cfg),
            |facts, dominators| facts.dominators = Some(dominators),
        )
    }
}

/// Variables and globals whose address is taken.
pub struct EscapesPass;

impl Pass for EscapesPass {
    fn name(&self) -> &'static str {
        "escapes"
    }

    fn job_id(&self) -> JobKind {
        JobKind::ESCAPES
    }

    fn author(&self) -> &'static str {
        "Campanoni Simone"
    }

    fn informations(&self) -> &'static str {
        "Marks the variables and globals whose address is taken"
    }

    fn run_on_method(&self, ctx: &CompilerContext, method: MethodId) -> Result<()> {
        compute_fact(
            ctx,
            method,
            |method, _| Escapes::compute(method),
            |facts, escapes| facts.escapes = Some(escapes),
        )
    }
}
