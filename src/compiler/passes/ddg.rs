//! Interprocedural data dependence graphs.

use std::sync::Arc;

use crate::{
    analysis::{dataflow::LivenessResult, ddg::DdgBuilder},
    compiler::{context::CompilerContext, job::JobKind, pass::Pass},
    ir::{Method, MethodId},
    Result,
};

/// Builds the data dependence graph of every method reachable from the
/// program entry, reusing the cached liveness of each method.
pub struct DataDependencesPass;

impl Pass for DataDependencesPass {
    fn name(&self) -> &'static str {
        "data dependences"
    }

    fn job_id(&self) -> JobKind {
        JobKind::DATA_DEPENDENCES
    }

    fn dependences(&self) -> JobKind {
        JobKind::LIVENESS | JobKind::ESCAPES
    }

    fn author(&self) -> &'static str {
        "Timothy M Jones, Simone Campanoni"
    }

    fn informations(&self) -> &'static str {
        "Builds the data dependence graphs without using the control flow graph of callers"
    }

    fn run_on_method(&self, ctx: &CompilerContext, _method: MethodId) -> Result<()> {
        self.run_global(ctx)
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_global(&self, ctx: &CompilerContext) -> Result<()> {
        let callgraph = ctx.callgraph()?;
        let dependences = DdgBuilder::new(ctx.program(), &callgraph)
            .configure(ctx.config())
            .with_liveness(|id: MethodId, method: &Method| match ctx.facts(id).liveness() {
                Ok(liveness) => Ok(liveness),
                Err(_) => Ok(Arc::new(LivenessResult::compute(method, &method.cfg()?))),
            })
            .build()?;

        ctx.dependences.clear();
        for (method, graph) in dependences.into_graphs() {
            ctx.dependences.insert(method, graph);
        }
        Ok(())
    }
}
