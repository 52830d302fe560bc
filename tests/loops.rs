//! Loop discovery and loop query scenarios.

use optscope::{
    analysis::{
        callgraph::CallGraph,
        dataflow::DominatorSets,
        loops::{detect_loops, sort_instructions, LoopNest, Precision},
    },
    compiler::{CompilerContext, JobKind, PassScheduler},
    config::OptimizerConfig,
    ir::{InstId, Method, MethodBuilder, MethodId, Program},
};

/// `i = 0; head: i = i + 1; c = i < 10; if c goto head; ret`
fn counting(name: &str) -> Method {
    counting_with(MethodBuilder::new(name))
}

fn counting_with(mut b: MethodBuilder) -> Method {
    let (i, c) = (b.var(), b.var());
    let head = b.label();
    b.mov(i, 0); // 0
    b.place(head); // 1
    b.add(i, i, 1); // 2
    b.lt(c, i, 10); // 3
    b.branch_if(c, head); // 4
    b.ret(None); // 5
    b.build()
}

/// Same loop with a call to `callee` as its first body instruction.
fn calling_loop(name: &str, callee: MethodId) -> Method {
    let mut b = MethodBuilder::new(name);
    let (i, c) = (b.var(), b.var());
    let head = b.label();
    b.mov(i, 0); // 0
    b.place(head); // 1
    b.call(callee, &[], None); // 2
    b.add(i, i, 1); // 3
    b.lt(c, i, 10); // 4
    b.branch_if(c, head); // 5
    b.ret(None); // 6
    b.build()
}

struct Scenario {
    ctx: CompilerContext,
    main: MethodId,
    work: MethodId,
    driver: MethodId,
}

/// `main -> driver`, where `driver` calls `work` from inside its loop. With
/// `direct_call`, `main` also calls `work` outside of every loop.
fn scenario(direct_call: bool, config: OptimizerConfig) -> Scenario {
    let mut program = Program::new();
    let work = program.add_method(counting("work"));
    let driver = program.add_method(calling_loop("driver", work));

    let mut b = MethodBuilder::new("main");
    b.call(driver, &[], None);
    if direct_call {
        b.call(work, &[], None);
    }
    b.ret(None);
    let main = program.add_method(b.build());

    let ctx = CompilerContext::new(program, config);
    PassScheduler::new()
        .run_jobs(&ctx, JobKind::LOOP_IDENTIFICATION)
        .unwrap();
    Scenario {
        ctx,
        main,
        work,
        driver,
    }
}

#[test]
fn test_loop_called_only_from_loop_is_not_outermost() {
    let s = scenario(false, OptimizerConfig::default());
    let callgraph = s.ctx.callgraph().unwrap();
    s.ctx
        .with_loops(|loops| {
            let inner = loops.loops_of(s.work)[0];
            let outer = loops.loops_of(s.driver)[0];
            assert_eq!(loops.immediate_parents(inner), vec![outer]);
            assert!(loops.is_a_sub_loop(outer, inner));

            let nest = LoopNest::new(loops, &callgraph, s.main);
            assert_eq!(nest.outermost_loops(), vec![outer]);
            assert!(!nest.is_outermost(inner, Precision::Exact));
        })
        .unwrap();
}

#[test]
fn test_second_call_site_makes_loop_outermost() {
    let s = scenario(true, OptimizerConfig::default());
    let callgraph = s.ctx.callgraph().unwrap();
    s.ctx
        .with_loops(|loops| {
            let inner = loops.loops_of(s.work)[0];
            let outer = loops.loops_of(s.driver)[0];
            // Still nested under the calling loop,
            assert_eq!(loops.immediate_parents(inner), vec![outer]);

            // but reachable from the entry without going through it.
            let nest = LoopNest::new(loops, &callgraph, s.main);
            assert_eq!(nest.outermost_loops(), vec![inner, outer]);
        })
        .unwrap();
}

#[test]
fn test_may_be_outermost_over_approximates() {
    let s = scenario(false, OptimizerConfig::default());
    let callgraph = s.ctx.callgraph().unwrap();
    s.ctx
        .with_loops(|loops| {
            let nest = LoopNest::new(loops, &callgraph, s.main);
            let exact = nest.outermost_loops();
            let approximate = nest.may_be_outermost_loops();
            assert!(exact.iter().all(|id| approximate.contains(id)));
            assert_eq!(approximate.len(), 2);
        })
        .unwrap();
}

#[test]
fn test_nesting_levels() {
    let s = scenario(false, OptimizerConfig::default());
    let callgraph = s.ctx.callgraph().unwrap();
    s.ctx
        .with_loops(|loops| {
            let inner = loops.loops_of(s.work)[0];
            let outer = loops.loops_of(s.driver)[0];
            let nest = LoopNest::new(loops, &callgraph, s.main);
            assert_eq!(nest.loops_at_nesting_level(0), vec![outer]);
            assert_eq!(nest.loops_at_nesting_level(1), vec![inner]);
            assert!(nest.loops_at_nesting_level(2).is_empty());
            assert_eq!(loops.depth(inner).unwrap(), 1);
        })
        .unwrap();
}

#[test]
fn test_library_loops_excluded_from_program_levels() {
    let mut program = Program::new();
    let work = program.add_method(counting_with(MethodBuilder::new("work").library()));
    let driver = program.add_method(calling_loop("driver", work));
    let mut b = MethodBuilder::new("main");
    b.call(driver, &[], None);
    b.ret(None);
    let main = program.add_method(b.build());

    let ctx = CompilerContext::new(program, OptimizerConfig::default());
    PassScheduler::new()
        .run_jobs(&ctx, JobKind::LOOP_IDENTIFICATION)
        .unwrap();
    let callgraph = ctx.callgraph().unwrap();
    ctx.with_loops(|loops| {
        let nest = LoopNest::new(loops, &callgraph, main);
        assert_eq!(nest.loops_at_nesting_level(1).len(), 1);
        assert!(nest
            .program_loops_at_nesting_level(ctx.program(), 1)
            .is_empty());
    })
    .unwrap();
}

#[test]
fn test_intraprocedural_nesting_only() {
    let config = OptimizerConfig {
        interprocedural_nesting: false,
        ..OptimizerConfig::default()
    };
    let s = scenario(false, config);
    let callgraph = s.ctx.callgraph().unwrap();
    s.ctx
        .with_loops(|loops| {
            let inner = loops.loops_of(s.work)[0];
            assert!(loops.immediate_parents(inner).is_empty());
            let nest = LoopNest::new(loops, &callgraph, s.main);
            assert_eq!(nest.outermost_loops().len(), 2);
        })
        .unwrap();
}

#[test]
fn test_loop_containment() {
    let s = scenario(true, OptimizerConfig::default());
    for method in [s.main, s.work, s.driver] {
        let body = s.ctx.program().lock(method).unwrap();
        let cfg = body.cfg().unwrap();
        s.ctx
            .with_loops(|loops| {
                for &id in loops.loops_of(method) {
                    let lp = loops.get(id).unwrap();
                    assert!(lp.contains(lp.header));
                    for &b in lp.backedges().unwrap() {
                        assert!(lp.contains(b));
                        assert!(cfg.predecessors(lp.header).contains(&b));
                    }
                }
            })
            .unwrap();
    }
}

#[test]
fn test_call_instructions_within_loop() {
    let s = scenario(false, OptimizerConfig::default());
    let body = s.ctx.program().lock(s.driver).unwrap();
    s.ctx
        .with_loops(|loops| {
            let lp = loops.get(loops.loops_of(s.driver)[0]).unwrap();
            assert_eq!(lp.call_instructions_within_loop(&body), vec![InstId::new(2)]);
            assert_eq!(
                loops.loop_nesting_of_instruction(s.driver, InstId::new(2)),
                Some(lp.id)
            );
            assert_eq!(loops.loop_nesting_of_instruction(s.driver, InstId::new(6)), None);
            assert_eq!(loops.methods_with_loops(), vec![s.work, s.driver]);
        })
        .unwrap();
}

#[test]
fn test_while_and_do_while_shapes() {
    // head: c = i < 10; if !c goto exit; i = i + 1; goto head; exit: ret
    let mut b = MethodBuilder::new("while");
    let (i, c) = (b.var(), b.var());
    let (head, exit) = (b.label(), b.label());
    b.mov(i, 0);
    b.place(head);
    b.lt(c, i, 10);
    b.branch_if_not(c, exit);
    b.add(i, i, 1);
    b.branch(head);
    b.place(exit);
    b.ret(None);
    let while_loop = b.build();

    let do_while = counting("do_while");

    for (method, expected) in [(while_loop, true), (do_while, false)] {
        let cfg = method.cfg().unwrap();
        let dominators = DominatorSets::compute(&cfg);
        let loops = detect_loops(&method, &cfg, &dominators);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].is_a_while_loop(&dominators).unwrap(), expected);
        assert_eq!(loops[0].number_of_backedges(), 1);
    }
}

#[test]
fn test_sort_instructions_is_idempotent() {
    // The body wraps past the header: the latch sits before it.
    let mut b = MethodBuilder::new("rotated");
    let (i, c) = (b.var(), b.var());
    let (latch, head) = (b.label(), b.label());
    b.mov(i, 0); // 0
    b.branch(head); // 1
    b.place(latch); // 2
    b.add(i, i, 1); // 3
    b.place(head); // 4
    b.lt(c, i, 10); // 5
    b.branch_if(c, latch); // 6
    b.ret(None); // 7
    let method = b.build();

    let cfg = method.cfg().unwrap();
    let dominators = DominatorSets::compute(&cfg);
    let lp = detect_loops(&method, &cfg, &dominators).remove(0);
    assert_eq!(lp.header, InstId::new(4));

    let members: Vec<InstId> = lp.instructions.iter().map(InstId::new).collect();
    let once = sort_instructions(&members, lp.header);
    let twice = sort_instructions(&once, lp.header);
    assert_eq!(once, twice);
    let expected: Vec<InstId> = [4, 5, 6, 2, 3].into_iter().map(InstId::new).collect();
    assert_eq!(once, expected);
}

#[test]
fn test_indirect_call_without_address_taken_target() {
    let mut b = MethodBuilder::new("main");
    let target = b.var();
    b.icall(target, &[], None);
    b.ret(None);
    let mut program = Program::new();
    let main = program.add_method(b.build());

    let callgraph = CallGraph::build(&program).unwrap();
    assert!(matches!(
        callgraph.targets(main, InstId::new(0)),
        Err(optscope::Error::UnresolvedCallee { .. })
    ));
}

#[test]
fn test_unreachable_jump_back_forms_no_loop() {
    // i = 0; l1: i = i + 1; ret i; l2: goto l1
    let mut b = MethodBuilder::new("main");
    let i = b.var();
    let (l1, l2) = (b.label(), b.label());
    b.mov(i, 0); // 0
    b.place(l1); // 1
    b.add(i, i, 1); // 2
    b.ret(Some(i.into())); // 3
    b.place(l2); // 4
    b.branch(l1); // 5
    let method = b.build();

    let cfg = method.cfg().unwrap();
    assert!(detect_loops(&method, &cfg, &DominatorSets::compute(&cfg)).is_empty());

    let mut program = Program::new();
    let main = program.add_method(method);
    let ctx = CompilerContext::new(program, OptimizerConfig::default());
    PassScheduler::new()
        .run_jobs(&ctx, JobKind::LOOP_IDENTIFICATION)
        .unwrap();
    let callgraph = ctx.callgraph().unwrap();
    ctx.with_loops(|loops| {
        assert_eq!(loops.len(), 0);
        assert!(loops.loops_of(main).is_empty());
        let nest = LoopNest::new(loops, &callgraph, main);
        assert!(nest.outermost_loops().is_empty());
    })
    .unwrap();
}

#[test]
fn test_loop_headed_at_first_instruction() {
    // head: i = i + 1; c = i < 10; if c goto head; ret
    let mut b = MethodBuilder::new("main");
    let (i, c) = (b.var(), b.var());
    let head = b.label();
    b.place(head); // 0
    b.add(i, i, 1); // 1
    b.lt(c, i, 10); // 2
    b.branch_if(c, head); // 3
    b.ret(None); // 4

    let mut program = Program::new();
    let main = program.add_method(b.build());
    let ctx = CompilerContext::new(program, OptimizerConfig::default());
    PassScheduler::new()
        .run_jobs(&ctx, JobKind::LOOP_IDENTIFICATION)
        .unwrap();
    let callgraph = ctx.callgraph().unwrap();
    ctx.with_loops(|loops| {
        let ids = loops.loops_of(main);
        assert_eq!(ids.len(), 1);
        let lp = loops.get(ids[0]).unwrap();
        assert_eq!(lp.header, InstId::new(0));
        assert_eq!(lp.backedges().unwrap(), &[InstId::new(3)]);
        assert!(lp.contains(InstId::new(2)));
        assert!(!lp.contains(InstId::new(4)));
        assert!(!lp.is_an_invariant_instruction(InstId::new(1)));
        let nest = LoopNest::new(loops, &callgraph, main);
        assert_eq!(nest.outermost_loops(), vec![ids[0]]);
    })
    .unwrap();
}
