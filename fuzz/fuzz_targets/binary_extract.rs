#![no_main]

use libfuzzer_sys::fuzz_target;
use rangescope::analysis::{extract_binary, RangeKind, ValueRange};
use rangescope::ir::{BinaryOp, ScalarType};
use strum::IntoEnumIterator;

fn range(kind: u8, a: u8, b: u8, ty: ScalarType) -> ValueRange {
    let (lo, hi) = (ty.wrap(i128::from(a.min(b))), ty.wrap(i128::from(a.max(b))));
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    match kind % 4 {
        0 => ValueRange::varying(),
        1 => ValueRange::singleton(lo),
        2 => ValueRange::canonical(RangeKind::Range, lo.into(), hi.into(), ty),
        _ => ValueRange::canonical(RangeKind::AntiRange, lo.into(), hi.into(), ty),
    }
}

// Every concrete result of `a op b` must lie in the extracted range.
fuzz_target!(|data: &[u8]| {
    let [selector, op, k0, a0, b0, k1, a1, b1, ..] = *data else {
        return;
    };
    let ty = match selector % 3 {
        0 => ScalarType::u8(),
        1 => ScalarType::i8(),
        _ => ScalarType::i8().wrapping(),
    };
    let ops: Vec<BinaryOp> = BinaryOp::iter().collect();
    let op = ops[usize::from(op) % ops.len()];
    let vr0 = range(k0, a0, b0, ty);
    let vr1 = range(k1, a1, b1, ty);
    let result = extract_binary(op, &vr0, &vr1, ty);

    for a in ty.min_value()..=ty.max_value() {
        if !vr0.contains_value(a, ty) {
            continue;
        }
        for b in ty.min_value()..=ty.max_value() {
            if !vr1.contains_value(b, ty) {
                continue;
            }
            let Some(exact) = op.apply_exact(a, b, ty) else {
                continue;
            };
            if (op == BinaryOp::ExactDiv && a % b != 0) || (ty.overflow_undefined() && !ty.fits(exact)) {
                continue;
            }
            let actual = ty.wrap(exact);
            assert!(
                result.contains_value(actual, ty),
                "{vr0} {op} {vr1} in {ty} gave {result}, missing {actual}"
            );
        }
    }
});
