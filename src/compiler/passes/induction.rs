//! Induction variable classification for every loop of a method.

use crate::{
    analysis::induction::{InductionClassifier, InductionTable},
    compiler::{context::CompilerContext, job::JobKind, pass::Pass},
    ir::{LoopId, MethodId},
    Result,
};

/// Classifies the induction variables of every loop of a method and stores
/// the table in the loop.
pub struct InductionVariablesPass;

impl Pass for InductionVariablesPass {
    fn name(&self) -> &'static str {
        "induction variables"
    }

    fn job_id(&self) -> JobKind {
        JobKind::INDUCTION_VARIABLES
    }

    fn dependences(&self) -> JobKind {
        JobKind::LOOP_INVARIANTS
            | JobKind::REACHING_DEFINITIONS
            | JobKind::PRE_DOMINATORS
            | JobKind::ESCAPES
    }

    fn author(&self) -> &'static str {
        "Simone Campanoni, Borgio Simone, Bosisio Davide, Licata Caruso Alessandro"
    }

    fn informations(&self) -> &'static str {
        "Identifies the basic and derived induction variables of each loop"
    }

    fn run_on_method(&self, ctx: &CompilerContext, id: MethodId) -> Result<()> {
        let facts = ctx.facts(id);
        let reaching = facts.reaching()?;
        let dominators = facts.dominators()?;
        let escapes = facts.escapes()?;

        let tables: Vec<(LoopId, InductionTable)> = {
            let method = ctx.program().lock(id)?;
            ctx.with_loops(|loops| {
                loops
                    .loops_of(id)
                    .iter()
                    .map(|&lp| {
                        let classifier = InductionClassifier::new(
                            &method,
                            loops,
                            lp,
                            &reaching,
                            &dominators,
                            &escapes,
                        )?;
                        Ok((lp, classifier.classify()?))
                    })
                    .collect::<Result<Vec<_>>>()
            })??
        };
        if tables.is_empty() {
            return Ok(());
        }

        ctx.update_loops(|loops| {
            for (lp, table) in tables {
                if let Ok(slot) = loops.get_mut(lp) {
                    slot.induction = Some(table);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::PassScheduler,
        config::OptimizerConfig,
        ir::{MethodBuilder, Program},
    };

    #[test]
    fn test_tables_stored_in_loops() {
        let mut b = MethodBuilder::new("main");
        let (i, j, c) = (b.var(), b.var(), b.var());
        let head = b.label();
        b.mov(i, 0);
        b.place(head);
        b.mul(j, i, 4);
        b.add(i, i, 1);
        b.lt(c, i, 16);
        b.branch_if(c, head);
        b.ret(Some(j.into()));
        let mut program = Program::new();
        program.add_method(b.build());
        let ctx = CompilerContext::new(program, OptimizerConfig::default());

        PassScheduler::new()
            .run_jobs(&ctx, JobKind::INDUCTION_VARIABLES)
            .unwrap();

        ctx.with_loops(|loops| {
            let lp = loops.iter().next().unwrap();
            let table = lp.induction.as_ref().unwrap();
            assert!(table.is_basic(i));
            assert!(table.is_derived(j));
            assert!(lp.is_an_induction_variable(j));
            assert!(!lp.is_an_induction_variable(c));
        })
        .unwrap();
    }
}
