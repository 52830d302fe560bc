//! Whole pipelines driven through the pass scheduler.

use optscope::{
    analysis::loops::LoopNest,
    compiler::{CompilerContext, JobKind, PassScheduler},
    config::OptimizerConfig,
    ir::{MethodBuilder, MethodId, Program, VarId},
};

/// `main` sums `i * 8` over a counting loop and calls `step` afterwards.
fn program() -> (Program, MethodId, MethodId) {
    let mut program = Program::new();
    let step = program.add_method({
        let mut b = MethodBuilder::new("step");
        let (x, y) = (b.var(), b.var());
        b.mov(x, 2);
        b.mul(y, x, x);
        b.ret(Some(y.into()));
        b.build()
    });
    let main = program.add_method({
        let mut b = MethodBuilder::new("main");
        let (i, n, s, off, c, r) = (b.var(), b.var(), b.var(), b.var(), b.var(), b.var());
        let head = b.label();
        b.mov(i, 0);
        b.mov(n, 16);
        b.mov(s, 0);
        b.place(head);
        b.mul(off, i, 8);
        b.add(s, s, off);
        b.add(i, i, 1);
        b.lt(c, i, n);
        b.branch_if(c, head);
        b.call(step, &[], Some(r));
        b.ret(Some(s.into()));
        b.build()
    });
    (program, main, step)
}

fn pipeline(config: OptimizerConfig) {
    let (program, main, step) = program();
    let ctx = CompilerContext::new(program, config);
    let scheduler = PassScheduler::new();

    scheduler
        .run_jobs(&ctx, JobKind::INDUCTION_VARIABLES | JobKind::DATA_DEPENDENCES)
        .unwrap();
    for method in [main, step] {
        assert!(ctx.is_valid(method, JobKind::LOOP_INFORMATION));
        assert!(ctx.is_valid(method, JobKind::DATA_DEPENDENCES));
    }

    let callgraph = ctx.callgraph().unwrap();
    ctx.with_loops(|loops| {
        assert_eq!(loops.len(), 1);
        let nest = LoopNest::new(loops, &callgraph, main);
        let outer = nest.outermost_loops();
        assert_eq!(outer.len(), 1);

        let lp = loops.get(outer[0]).unwrap();
        assert_eq!(lp.method, main);
        let table = lp.induction.as_ref().unwrap();
        // i is basic, off = i * 8 derives from it, s accumulates a varying
        // value and is neither.
        let (i, s, off) = (VarId::new(0), VarId::new(2), VarId::new(3));
        assert!(table.is_basic(i));
        assert!(table.is_derived(off));
        assert!(!table.contains(s));
        assert!(lp.has_shared_parent_induction_variable(i, off));
    })
    .unwrap();

    assert!(ctx.dependence_graph(step).unwrap().edge_count() > 0);
    assert!(ctx.dependence_graph(main).unwrap().edge_count() > 0);
}

#[test]
fn test_pipeline_parallel() {
    pipeline(OptimizerConfig::default());
}

#[test]
fn test_pipeline_sequential() {
    pipeline(OptimizerConfig::sequential());
}

#[test]
fn test_rewrite_invalidates_loops() {
    let (program, main, _) = program();
    let ctx = CompilerContext::new(program, OptimizerConfig::sequential());
    let scheduler = PassScheduler::new();

    scheduler
        .run_jobs(&ctx, JobKind::LOOP_INVARIANTS)
        .unwrap();
    assert!(ctx.is_valid(main, JobKind::LOOP_INVARIANTS));

    scheduler
        .run_jobs(&ctx, JobKind::PARTIAL_REDUNDANCY)
        .unwrap();
    assert!(!ctx.is_valid(main, JobKind::LOOP_IDENTIFICATION));
    assert!(!ctx.is_valid(main, JobKind::LOOP_INVARIANTS));

    scheduler
        .run_jobs(&ctx, JobKind::INDUCTION_VARIABLES)
        .unwrap();
    assert!(ctx.is_valid(main, JobKind::LOOP_INFORMATION));
    ctx.with_loops(|loops| {
        let id = loops.loops_of(main)[0];
        assert!(loops.get(id).unwrap().induction.is_some());
    })
    .unwrap();
}

#[test]
fn test_run_with_explicit_passes() {
    let (program, main, step) = program();
    let ctx = CompilerContext::new(program, OptimizerConfig::sequential());
    let scheduler = PassScheduler::new();
    let escapes = scheduler.provider(JobKind::ESCAPES).unwrap();
    let liveness = scheduler.provider(JobKind::LIVENESS).unwrap();

    scheduler.run(&ctx, &[escapes, liveness]).unwrap();
    for method in [main, step] {
        assert_eq!(
            ctx.valid_jobs(method),
            JobKind::ESCAPES | JobKind::LIVENESS
        );
    }
}
