//! Property tests for the range lattice.
//!
//! Every property is checked exhaustively over small types: 4-bit and 8-bit
//! integers, signed and unsigned, with and without wrapping overflow. At
//! those widths each range can be enumerated value by value, so soundness
//! is tested against concrete arithmetic instead of against another model.

use proptest::prelude::*;
use rangescope::{
    analysis::{
        compare_ranges, compare_values, extract_binary, extract_unary, intersect, meet, Bound,
        RangeKind, ValueRange,
    },
    ir::{BinaryOp, CmpOp, ScalarType, UnaryOp},
};
use strum::IntoEnumIterator;

fn small_types() -> Vec<ScalarType> {
    vec![
        ScalarType::int(4, false).unwrap(),
        ScalarType::int(4, true).unwrap(),
        ScalarType::int(4, true).unwrap().wrapping(),
        ScalarType::u8(),
        ScalarType::i8(),
        ScalarType::i8().wrapping(),
    ]
}

fn scalar_type() -> impl Strategy<Value = ScalarType> {
    prop::sample::select(small_types())
}

fn value_in(ty: ScalarType) -> impl Strategy<Value = i128> {
    ty.min_value()..=ty.max_value()
}

fn ordered_pair(ty: ScalarType) -> impl Strategy<Value = (i128, i128)> {
    (value_in(ty), value_in(ty)).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

/// Ranges, anti-ranges, singletons and VARYING, all in normal form.
fn range_in(ty: ScalarType) -> impl Strategy<Value = ValueRange> {
    prop_oneof![
        1 => Just(ValueRange::varying()),
        2 => value_in(ty).prop_map(ValueRange::singleton),
        4 => ordered_pair(ty).prop_map(move |(lo, hi)| {
            ValueRange::canonical(RangeKind::Range, Bound::Const(lo), Bound::Const(hi), ty)
        }),
        3 => ordered_pair(ty).prop_map(move |(lo, hi)| {
            ValueRange::canonical(RangeKind::AntiRange, Bound::Const(lo), Bound::Const(hi), ty)
        }),
    ]
}

fn typed_pair() -> impl Strategy<Value = (ScalarType, ValueRange, ValueRange)> {
    scalar_type().prop_flat_map(|ty| (Just(ty), range_in(ty), range_in(ty)))
}

/// Conversions between any two types; the other operators keep the type.
fn unary_case() -> impl Strategy<Value = (UnaryOp, ScalarType, ScalarType, ValueRange)> {
    let op = prop::sample::select(vec![
        UnaryOp::Convert,
        UnaryOp::Negate,
        UnaryOp::BitNot,
        UnaryOp::Abs,
    ]);
    (op, scalar_type(), scalar_type()).prop_flat_map(|(op, from, to)| {
        let to = if op == UnaryOp::Convert { to } else { from };
        (Just(op), Just(from), Just(to), range_in(from))
    })
}

fn members(vr: &ValueRange, ty: ScalarType) -> Vec<i128> {
    (ty.min_value()..=ty.max_value())
        .filter(|&v| vr.contains_value(v, ty))
        .collect()
}

fn is_subset(inner: &ValueRange, outer: &ValueRange, ty: ScalarType) -> bool {
    members(inner, ty)
        .into_iter()
        .all(|v| outer.contains_value(v, ty))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn binary_extraction_holds_every_result(
        (ty, vr0, vr1) in typed_pair(),
        op in prop::sample::select(BinaryOp::iter().collect::<Vec<_>>()),
    ) {
        let result = extract_binary(op, &vr0, &vr1, ty);
        for a in members(&vr0, ty) {
            for b in members(&vr1, ty) {
                let Some(exact) = op.apply_exact(a, b, ty) else {
                    continue;
                };
                if op == BinaryOp::ExactDiv && a % b != 0 {
                    continue;
                }
                if ty.overflow_undefined() && !ty.fits(exact) {
                    continue;
                }
                let actual = ty.wrap(exact);
                prop_assert!(
                    result.contains_value(actual, ty),
                    "{vr0} {op} {vr1} in {ty} gave {result}, missing {a} {op} {b} = {actual}"
                );
            }
        }
    }

    #[test]
    fn unary_extraction_holds_every_result((op, from, to, vr) in unary_case()) {
        let result = extract_unary(op, &vr, from, to);
        for v in members(&vr, from) {
            let Some(actual) = op.fold(v, from, to) else {
                continue;
            };
            prop_assert!(
                result.contains_value(actual, to),
                "{op} {vr} from {from} to {to} gave {result}, missing {actual}"
            );
        }
    }

    #[test]
    fn meet_holds_both_inputs((ty, vr0, vr1) in typed_pair()) {
        let joined = meet(&vr0, &vr1, ty);
        prop_assert!(is_subset(&vr0, &joined, ty), "{vr0} not in meet {joined}");
        prop_assert!(is_subset(&vr1, &joined, ty), "{vr1} not in meet {joined}");
    }

    #[test]
    fn intersect_is_sound_and_narrows((ty, vr0, vr1) in typed_pair()) {
        let both = intersect(&vr0, &vr1, ty);
        for v in members(&vr0, ty) {
            if vr1.contains_value(v, ty) {
                prop_assert!(both.contains_value(v, ty), "{vr0} ^ {vr1} = {both} lost {v}");
            }
        }
        prop_assert!(
            is_subset(&both, &vr0, ty) || is_subset(&both, &vr1, ty),
            "{vr0} ^ {vr1} = {both} is wider than both inputs"
        );
    }

    #[test]
    fn canonical_form_is_stable(ty in scalar_type(), seed in any::<(u16, u16, bool)>()) {
        let span = (ty.max_value() - ty.min_value() + 1) as u16;
        let lo = ty.min_value() + i128::from(seed.0 % span);
        let hi = ty.min_value() + i128::from(seed.1 % span);
        let kind = if seed.2 { RangeKind::Range } else { RangeKind::AntiRange };

        let once = ValueRange::canonical(kind, Bound::Const(lo), Bound::Const(hi), ty);
        let twice = ValueRange::canonical(once.kind(), once.min(), once.max(), ty);
        prop_assert_eq!(&once, &twice);

        if lo <= hi {
            return Ok(());
        }
        // Touching ends: a wrapped range covers every value, and the wrapped
        // anti-range, which excludes every value, is kept as VARYING too.
        if lo == hi + 1 {
            prop_assert!(once.is_varying(), "{} [{}, {}] gave {}", kind, lo, hi, once);
            return Ok(());
        }

        // A wrapped pair denotes the complement of the gap between its ends,
        // stored with the other kind. Stepping back across the gap restores
        // the pair.
        let flipped = if seed.2 { RangeKind::AntiRange } else { RangeKind::Range };
        prop_assert_eq!(once.kind(), flipped);
        let (Bound::Const(min), Bound::Const(max)) = (once.min(), once.max()) else {
            return Err(TestCaseError::fail(format!("{once} has non-constant bounds")));
        };
        prop_assert_eq!((max + 1, min - 1), (lo, hi));
        for v in ty.min_value()..=ty.max_value() {
            let in_pair = v >= lo || v <= hi;
            prop_assert_eq!(once.contains_value(v, ty), in_pair == seed.2);
        }
    }

    #[test]
    fn decided_comparisons_hold_for_every_pair(
        (ty, vr0, vr1) in typed_pair(),
        op in prop::sample::select(CmpOp::iter().collect::<Vec<_>>()),
    ) {
        let mut strict_overflow = false;
        if let Some(answer) = compare_ranges(op, &vr0, &vr1, ty, &mut strict_overflow) {
            for a in members(&vr0, ty) {
                for b in members(&vr1, ty) {
                    prop_assert_eq!(op.eval(a, b), answer, "{} {} {}", a, op, b);
                }
            }
        }
    }

    #[test]
    fn value_order_is_antisymmetric(
        ty in scalar_type(),
        a in prop_oneof![Just(Bound::NegInf), Just(Bound::PosInf), (-200i128..200).prop_map(Bound::Const)],
        b in prop_oneof![Just(Bound::NegInf), Just(Bound::PosInf), (-200i128..200).prop_map(Bound::Const)],
    ) {
        prop_assert_eq!(compare_values(&a, &b, ty), compare_values(&b, &a, ty).reverse());
    }

    #[test]
    fn wrapping_lands_in_type(ty in scalar_type(), v in -1000i128..1000) {
        let w = ty.wrap(v);
        prop_assert!(ty.fits(w));
        prop_assert_eq!(ty.wrap(w), w);
        prop_assert_eq!((v - w).rem_euclid(1i128 << ty.precision()), 0);
    }
}
