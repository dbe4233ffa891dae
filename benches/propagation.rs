//! Benchmarks for value range propagation.
//!
//! Measures the full pass (assertion insertion, propagation, removal) on:
//! - A counting loop whose bound is only reached through widening
//! - A long chain of bounds checks on one name
//! - A batch of functions analyzed in parallel
//!
//! and the binary extractor on its own.

extern crate rangescope;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rangescope::prelude::*;
use std::hint::black_box;

/// `for (i = 0; i < limit; i++) sum += i;`
fn counting_loop(limit: i128) -> Function {
    SsaFunctionBuilder::new("count")
        .build_with(|f| {
            let i = f.name(ScalarType::i32());
            let next = f.name(ScalarType::i32());
            let sum = f.name(ScalarType::i32());
            let total = f.name(ScalarType::i32());
            f.block(0, |b| b.jump(1));
            f.block(1, |b| {
                b.phi_into(i, &[(0, 0.into()), (2, next.into())]);
                b.phi_into(sum, &[(0, 0.into()), (2, total.into())]);
                b.branch(CmpOp::Lt, i, limit, 2, 3);
            });
            f.block(2, |b| {
                b.binary_into(total, BinaryOp::Add, sum, i);
                b.binary_into(next, BinaryOp::Add, i, 1);
                b.jump(1);
            });
            f.block(3, |b| b.ret_val(sum));
        })
        .unwrap()
}

/// `if (x < 1000) if (x < 999) ... y = x + 1;` with `depth` nested checks.
fn bounds_chain(name: &str, depth: usize) -> Function {
    SsaFunctionBuilder::new(name)
        .build_with(|f| {
            let x = f.param(ScalarType::u32());
            for k in 0..depth {
                let limit = 1000 - k as i128;
                f.block(k, |b| b.branch(CmpOp::Lt, x, limit, k + 1, depth + 1));
            }
            f.block(depth, |b| {
                let y = b.add(x, 1);
                b.ret_val(y);
            });
            f.block(depth + 1, |b| b.ret_val(0));
        })
        .unwrap()
}

fn bench_counting_loop(c: &mut Criterion) {
    let pass = ValueRangePropagation::new(VrpConfig::default());
    let func = counting_loop(1_000_000);

    c.bench_function("vrp_counting_loop", |b| {
        b.iter_batched(
            || func.clone(),
            |mut func| {
                let result = pass.run(black_box(&mut func)).unwrap();
                black_box(result)
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_bounds_chain(c: &mut Criterion) {
    let pass = ValueRangePropagation::new(VrpConfig::default());
    let func = bounds_chain("chain", 64);

    c.bench_function("vrp_bounds_chain_64", |b| {
        b.iter_batched(
            || func.clone(),
            |mut func| {
                let result = pass.run(black_box(&mut func)).unwrap();
                black_box(result)
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_context_batch(c: &mut Criterion) {
    let funcs: Vec<Function> = (0..256)
        .map(|i| bounds_chain(&format!("chain{i}"), 16))
        .collect();

    c.bench_function("vrp_context_batch_256", |b| {
        b.iter_batched(
            || funcs.clone(),
            |mut funcs| {
                let context = RangeContext::default();
                context.analyze_all(black_box(&mut funcs)).unwrap();
                black_box(context.function_count())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_extract_binary(c: &mut Criterion) {
    let ty = ScalarType::i32();
    let lhs = ValueRange::anti(-10, 10);
    let rhs = ValueRange::range(3, 1000);

    c.bench_function("extract_binary_mul_anti", |b| {
        b.iter(|| {
            let vr = extract_binary(BinaryOp::Mul, black_box(&lhs), black_box(&rhs), ty);
            black_box(vr)
        });
    });
}

criterion_group!(
    benches,
    bench_counting_loop,
    bench_bounds_chain,
    bench_context_batch,
    bench_extract_binary
);
criterion_main!(benches);
