//! End-to-end range propagation tests.
//!
//! Each test builds a small function with the public builder, runs the
//! full pass (assertion insertion, propagation, removal) and checks the
//! ranges and reachability a downstream optimizer would rely on.

use rangescope::{
    analysis::{Bound, RangeResult, ValueRangePropagation},
    config::VrpConfig,
    ir::{
        BinaryOp, BlockId, CmpOp, Function, Rhs, ScalarType, SsaFunctionBuilder, SsaNameId,
        UnaryOp,
    },
    Result,
};

fn analyze(func: &mut Function) -> Result<RangeResult> {
    ValueRangePropagation::new(VrpConfig::default()).run(func)
}

/// `if (x > 0) y = x; else y = -x;`
#[test]
fn test_absolute_value_through_branches() -> Result<()> {
    let mut func = SsaFunctionBuilder::new("abs").build_with(|f| {
        let x = f.param(ScalarType::i32());
        let negated = f.name(ScalarType::i32());
        f.block(0, |b| b.branch(CmpOp::Gt, x, 0, 1, 2));
        f.block(1, |b| b.jump(3));
        f.block(2, |b| {
            b.assign_into(
                negated,
                Rhs::Unary {
                    op: UnaryOp::Negate,
                    operand: x.into(),
                },
            );
            b.jump(3);
        });
        f.block(3, |b| {
            let y = b.phi(ScalarType::i32(), &[(1, x.into()), (2, negated.into())]);
            b.ret_val(y);
        });
    })?;
    let result = analyze(&mut func)?;
    let x = SsaNameId::new(0);
    let ty = ScalarType::i32();

    let positive = result.range_in_block(x, BlockId::new(1)).unwrap();
    assert_eq!(positive.min(), Bound::Const(1));
    assert_eq!(positive.max(), Bound::Const(i128::from(i32::MAX)));

    let rest = result.range_in_block(x, BlockId::new(2)).unwrap();
    assert!(rest.min().is_min(ty));
    assert_eq!(rest.max(), Bound::Const(0));

    let y = result.range(SsaNameId::new(2)).unwrap();
    assert_eq!(y.min(), Bound::Const(0));
    assert!(y.max().is_max(ty));
    // -INT_MIN is only excluded by assuming signed overflow cannot happen.
    assert!(result.used_strict_overflow());
    Ok(())
}

/// `unsigned idx; if (idx < 10) a[idx] = 1;`
#[test]
fn test_index_refined_inside_bounds_check() -> Result<()> {
    let mut func = SsaFunctionBuilder::new("store").build_with(|f| {
        let a = f.param_nonnull();
        let idx = f.param(ScalarType::u32());
        f.block(0, |b| b.branch(CmpOp::Lt, idx, 10, 1, 2));
        f.block(1, |b| {
            let slot = b.pointer_plus(a, idx);
            b.store(slot, 1);
            b.jump(2);
        });
        f.block(2, |b| b.ret());
    })?;
    let result = analyze(&mut func)?;

    let inside = result
        .range_in_block(SsaNameId::new(1), BlockId::new(1))
        .unwrap();
    assert_eq!(inside.min(), Bound::Const(0));
    assert_eq!(inside.max(), Bound::Const(9));
    assert!(result.range(SsaNameId::new(1)).unwrap().is_varying());
    Ok(())
}

/// `switch (x % 3 + 1) { case 1..3: L1; case 4..5: L2; default: L3 }`
#[test]
fn test_switch_with_known_index_has_one_target() -> Result<()> {
    let mut func = SsaFunctionBuilder::new("dispatch").build_with(|f| {
        let x = f.param(ScalarType::u32());
        f.block(0, |b| {
            let r = b.rem(x, 3);
            let index = b.add(r, 1);
            b.switch(index, &[(1, 1, 1), (2, 2, 1), (3, 3, 1), (4, 5, 2)], 3);
        });
        f.block(1, |b| b.ret_val(1));
        f.block(2, |b| b.ret_val(2));
        f.block(3, |b| b.ret_val(3));
    })?;
    let result = analyze(&mut func)?;

    assert_eq!(result.range(SsaNameId::new(2)).unwrap().to_string(), "[1, 3]");
    assert_eq!(result.static_branch_outcome(BlockId::new(0)), Some(BlockId::new(1)));
    assert!(result.is_block_executable(BlockId::new(1)));
    assert!(!result.is_block_executable(BlockId::new(2)));
    assert!(!result.is_block_executable(BlockId::new(3)));
    let dead = func.find_edge(BlockId::new(0), BlockId::new(2)).unwrap();
    assert!(!result.is_edge_executable(dead));
    Ok(())
}

/// `x = y / 4` with `y` in `[0, 100]`.
#[test]
fn test_division_of_known_range() -> Result<()> {
    let mut func = SsaFunctionBuilder::new("quarter").build_with(|f| {
        let y = f.param(ScalarType::u32());
        f.block(0, |b| b.branch(CmpOp::Le, y, 100, 1, 2));
        f.block(1, |b| {
            let x = b.div(y, 4);
            b.ret_val(x);
        });
        f.block(2, |b| b.ret_val(0));
    })?;
    let result = analyze(&mut func)?;
    assert_eq!(result.range(SsaNameId::new(1)).unwrap().to_string(), "[0, 25]");

    let mut func = SsaFunctionBuilder::new("quarter_rem").build_with(|f| {
        let z = f.param(ScalarType::u32());
        f.block(0, |b| {
            let y = b.rem(z, 101);
            let x = b.div(y, 4);
            b.ret_val(x);
        });
    })?;
    let result = analyze(&mut func)?;
    assert_eq!(result.range(SsaNameId::new(1)).unwrap().to_string(), "[0, 100]");
    assert_eq!(result.range(SsaNameId::new(2)).unwrap().to_string(), "[0, 25]");
    Ok(())
}

fn counting_loop(limit: Option<i128>) -> Result<Function> {
    SsaFunctionBuilder::new("count").build_with(|f| {
        let n = f.param(ScalarType::i32());
        let i = f.name(ScalarType::i32());
        let next = f.name(ScalarType::i32());
        f.block(0, |b| b.jump(1));
        f.block(1, |b| {
            b.phi_into(i, &[(0, 0.into()), (2, next.into())]);
            match limit {
                Some(limit) => b.branch(CmpOp::Lt, i, limit, 2, 3),
                None => b.branch(CmpOp::Lt, i, n, 2, 3),
            }
        });
        f.block(2, |b| {
            b.binary_into(next, BinaryOp::Add, i, 1);
            b.jump(1);
        });
        f.block(3, |b| b.ret_val(i));
    })
}

/// `for (i = 0; i < 100; i++)`
#[test]
fn test_loop_counter_narrowed_by_evolution() -> Result<()> {
    let mut func = counting_loop(Some(100))?;
    let result = analyze(&mut func)?;
    let i = SsaNameId::new(1);

    assert_eq!(result.range(i).unwrap().to_string(), "[0, 100]");
    let body = result.range_in_block(i, BlockId::new(2)).unwrap();
    assert_eq!((body.min(), body.max()), (Bound::Const(0), Bound::Const(99)));
    let exit = result.range_in_block(i, BlockId::new(3)).unwrap();
    assert_eq!(exit.single_integer(), Some(100));
    assert!(result.converged());
    Ok(())
}

/// `for (i = 0; i < n; i++)` with `n` unknown.
#[test]
fn test_loop_counter_with_unknown_bound() -> Result<()> {
    let mut func = counting_loop(None)?;
    let result = analyze(&mut func)?;
    let i = result.range(SsaNameId::new(1)).unwrap();

    assert!(!i.is_varying());
    assert_eq!(i.min(), Bound::Const(0));
    assert!(i.max().is_max(ScalarType::i32()));
    Ok(())
}

#[test]
fn test_long_loop_converges_in_few_visits() -> Result<()> {
    let mut func = counting_loop(Some(1_000_000))?;
    let result = analyze(&mut func)?;
    assert!(result.converged());
    assert!(result.visits() < 100);
    assert_eq!(result.range(SsaNameId::new(1)).unwrap().to_string(), "[0, 1000000]");
    Ok(())
}

/// `p = malloc(...); if (p) *p = 1;`
#[test]
fn test_pointer_nonnull_after_null_check() -> Result<()> {
    let build = || {
        SsaFunctionBuilder::new("alloc").build_with(|f| {
            f.block(0, |b| {
                let p = b.call(&[], ScalarType::pointer(), false);
                b.branch(CmpOp::Ne, p, 0, 1, 2);
            });
            f.block(1, |b| {
                b.store(SsaNameId::new(0), 1);
                b.ret();
            });
            f.block(2, |b| b.ret());
        })
    };
    let p = SsaNameId::new(0);

    for config in [
        VrpConfig::default(),
        VrpConfig::default().with_delete_null_pointer_checks(false),
    ] {
        let mut func = build()?;
        let result = ValueRangePropagation::new(config).run(&mut func)?;
        assert!(result.range(p).unwrap().is_varying());
        let inside = result.range_in_block(p, BlockId::new(1)).unwrap();
        assert!(inside.is_nonnull());
    }
    Ok(())
}
