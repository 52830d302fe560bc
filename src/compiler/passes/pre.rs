//! Partial redundancy elimination.

use crate::{
    analysis::pre::PartialRedundancy,
    compiler::{context::CompilerContext, job::JobKind, pass::Pass},
    ir::MethodId,
    Result,
};

/// Moves computations to their latest safe placement and removes the
/// redundant ones, one method at a time.
pub struct PartialRedundancyPass;

impl Pass for PartialRedundancyPass {
    fn name(&self) -> &'static str {
        "partial redundancy elimination"
    }

    fn job_id(&self) -> JobKind {
        JobKind::PARTIAL_REDUNDANCY
    }

    fn invalidations(&self) -> JobKind {
        JobKind::ALL
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni and Scott Moore and Sophia Shao"
    }

    fn informations(&self) -> &'static str {
        "Applies lazy code motion to eliminate partially redundant expressions"
    }

    fn run_on_method(&self, ctx: &CompilerContext, id: MethodId) -> Result<()> {
        let mut method = ctx.program().lock(id)?;
        let report = PartialRedundancy::from_config(ctx.config()).run(&mut method)?;
        if !report.is_unchanged() {
            tracing::debug!(
                method = method.name(),
                split_edges = report.split_edges,
                temporaries = report.temporaries,
                insertions = report.insertions,
                rewrites = report.rewrites,
                "partial redundancies eliminated"
            );
        }
        Ok(())
    }
}
