//! Benchmarks for the dataflow solvers and the optimizer pipeline.
//!
//! Every benchmark runs on a generated method made of `n` sequential
//! counting loops, each accumulating a derived induction variable:
//! - Liveness, reaching definitions and predominators
//! - Lazy code motion
//! - The full scheduler pipeline up to induction variables

extern crate optscope;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use optscope::{
    analysis::{
        dataflow::{DominatorSets, LivenessResult, ReachingDefsResult},
        pre::PartialRedundancy,
    },
    compiler::{CompilerContext, JobKind, PassScheduler},
    config::OptimizerConfig,
    ir::{Method, MethodBuilder, Program},
};
use std::hint::black_box;

const SIZES: [usize; 3] = [4, 32, 128];

/// `n` loops of `off = i * 8; s = s + off; t = x + y; i = i + 1`.
fn loops(n: usize) -> Method {
    let mut b = MethodBuilder::new("main");
    let (x, y, s) = (b.var(), b.var(), b.var());
    b.mov(x, 3);
    b.mov(y, 4);
    b.mov(s, 0);
    for _ in 0..n {
        let (i, off, t, c) = (b.var(), b.var(), b.var(), b.var());
        let head = b.label();
        b.mov(i, 0);
        b.place(head);
        b.mul(off, i, 8);
        b.add(s, s, off);
        b.add(t, x, y);
        b.add(i, i, 1);
        b.lt(c, i, 100);
        b.branch_if(c, head);
    }
    b.ret(Some(s.into()));
    b.build()
}

fn bench_method_analyses(c: &mut Criterion) {
    let mut group = c.benchmark_group("method_analyses");
    for n in SIZES {
        let method = loops(n);
        let cfg = method.cfg().unwrap();
        group.bench_with_input(BenchmarkId::new("liveness", n), &n, |b, _| {
            b.iter(|| black_box(LivenessResult::compute(black_box(&method), &cfg)));
        });
        group.bench_with_input(BenchmarkId::new("reaching", n), &n, |b, _| {
            b.iter(|| black_box(ReachingDefsResult::compute(black_box(&method), &cfg)));
        });
        group.bench_with_input(BenchmarkId::new("predominators", n), &n, |b, _| {
            b.iter(|| black_box(DominatorSets::compute(black_box(&cfg))));
        });
    }
    group.finish();
}

fn bench_lazy_code_motion(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_code_motion");
    for n in SIZES {
        let method = loops(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut body = method.clone();
                black_box(PartialRedundancy::new().run(&mut body).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    for n in SIZES {
        group.bench_with_input(BenchmarkId::new("induction_variables", n), &n, |b, &n| {
            b.iter(|| {
                let mut program = Program::new();
                program.add_method(loops(n));
                let ctx = CompilerContext::new(program, OptimizerConfig::sequential());
                PassScheduler::new()
                    .run_jobs(&ctx, JobKind::INDUCTION_VARIABLES)
                    .unwrap();
                black_box(ctx)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_method_analyses,
    bench_lazy_code_motion,
    bench_pipeline
);
criterion_main!(benches);
