//! Range extraction for unary operators.
//!
//! Negation and complement are rewritten as `0 - x` and `-1 - x` and handled
//! by the binary rules. Conversions carry both bounds over when no value can
//! be truncated. Pointer results only track nullness.

use crate::{
    analysis::range::{
        algebra::meet,
        compare::{compare_values, range_includes_zero},
        extract::binary::{extract_binary, split_anti_range},
        Bound, RangeKind, ValueOrder, ValueRange,
    },
    ir::{BinaryOp, ScalarType, UnaryOp},
};

/// The range of `op x` where `x`, of type `from`, has range `vr0` and the
/// result has type `to`.
#[must_use]
pub fn extract_unary(op: UnaryOp, vr0: &ValueRange, from: ScalarType, to: ScalarType) -> ValueRange {
    if !from.is_tracked() || !to.is_tracked() {
        return ValueRange::varying();
    }
    if vr0.is_undefined() {
        return ValueRange::undefined();
    }

    match op {
        UnaryOp::Negate => {
            return extract_binary(BinaryOp::Sub, &ValueRange::singleton(0), vr0, to);
        }
        UnaryOp::BitNot => {
            return extract_binary(BinaryOp::Sub, &ValueRange::singleton(-1), vr0, to);
        }
        UnaryOp::Convert if to.is_pointer() => return pointer_conversion(vr0, from),
        UnaryOp::Convert | UnaryOp::Abs => {}
        UnaryOp::TruthNot | UnaryOp::FloatToInt | UnaryOp::IntToFloat => {
            return fold_singleton(op, vr0, from, to);
        }
    }

    if !from.is_pointer() {
        if let Some((first, second)) = split_anti_range(vr0, from) {
            let result = extract_unary(op, &first, from, to);
            return match second {
                Some(second) => meet(&result, &extract_unary(op, &second, from, to), to),
                None => result,
            };
        }
    }

    match op {
        UnaryOp::Abs => absolute(vr0, to),
        _ => convert(vr0, from, to),
    }
}

fn fold_singleton(op: UnaryOp, vr0: &ValueRange, from: ScalarType, to: ScalarType) -> ValueRange {
    vr0.single_integer()
        .filter(|_| !vr0.uses_overflow_infinity())
        .and_then(|value| op.fold(value, from, to))
        .map_or_else(ValueRange::varying, ValueRange::singleton)
}

fn pointer_conversion(vr0: &ValueRange, from: ScalarType) -> ValueRange {
    if vr0.is_null() {
        ValueRange::null()
    } else if !vr0.is_symbolic() && range_includes_zero(vr0, from) == Some(false) {
        ValueRange::nonnull()
    } else {
        ValueRange::varying()
    }
}

fn convert(vr0: &ValueRange, from: ScalarType, to: ScalarType) -> ValueRange {
    let widening = to.precision() > from.precision();
    let full;
    let vr0 = if vr0.is_varying() && from.is_integral() && widening {
        full = ValueRange::full(from);
        &full
    } else {
        vr0
    };

    if !vr0.is_bounded() || vr0.is_symbolic() {
        return ValueRange::varying();
    }
    let infinity_allowed = vr0.is_range() && widening && to.overflow_undefined();
    if (vr0.min().is_overflow_infinity() || vr0.max().is_overflow_infinity()) && !infinity_allowed {
        return ValueRange::varying();
    }
    let Some((lo, hi)) = vr0.const_bounds(from) else {
        return ValueRange::varying();
    };

    // A truncating conversion is exact only for a range narrower than the
    // target type.
    let exact = to.precision() >= from.precision()
        || (vr0.is_range() && (hi - lo) >> to.precision() == 0);
    if !exact {
        return ValueRange::varying();
    }

    let min = if vr0.min().is_overflow_infinity() {
        Bound::NegInf
    } else {
        Bound::Const(to.wrap(lo))
    };
    let max = if vr0.max().is_overflow_infinity() {
        Bound::PosInf
    } else {
        Bound::Const(to.wrap(hi))
    };
    ValueRange::canonical(vr0.kind(), min, max, to)
}

fn absolute(vr0: &ValueRange, ty: ScalarType) -> ValueRange {
    if ty.is_unsigned() || vr0.is_nonnegative(ty) {
        return vr0.clone();
    }
    if !vr0.is_range() || vr0.is_symbolic() {
        return ValueRange::varying();
    }
    // abs(MIN) wraps back to MIN.
    if !ty.overflow_undefined() && vr0.min().is_min(ty) {
        return ValueRange::varying();
    }

    let abs_of = |b: Bound| -> Option<Bound> {
        match b {
            Bound::NegInf | Bound::PosInf => Some(Bound::PosInf),
            _ if b.is_min(ty) => Some(Bound::positive_extreme(ty)),
            Bound::Const(c) => Some(Bound::Const(c.abs())),
            Bound::Symbolic { .. } => None,
        }
    };
    let (Some(mut min), Some(mut max)) = (abs_of(vr0.min()), abs_of(vr0.max())) else {
        return ValueRange::varying();
    };
    if min == Bound::PosInf && max == Bound::PosInf {
        return ValueRange::varying();
    }

    let cmp = compare_values(&min, &max, ty);
    if range_includes_zero(vr0, ty) == Some(true) {
        if cmp == ValueOrder::Greater {
            max = min;
        }
        min = Bound::Const(0);
    } else if cmp == ValueOrder::Greater {
        std::mem::swap(&mut min, &mut max);
    }

    match compare_values(&min, &max, ty) {
        ValueOrder::Less | ValueOrder::Equal => ValueRange::canonical(RangeKind::Range, min, max, ty),
        ValueOrder::Greater | ValueOrder::NotEqual | ValueOrder::Unknown => ValueRange::varying(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: ScalarType = ScalarType::i32();

    #[test]
    fn test_negate() {
        let r = extract_unary(UnaryOp::Negate, &ValueRange::range(1, 10), T, T);
        assert_eq!(r, ValueRange::range(-10, -1));

        let r = extract_unary(UnaryOp::Negate, &ValueRange::range(i128::from(i32::MIN), 0), T, T);
        assert_eq!(r, ValueRange::range(Bound::Const(0), Bound::PosInf));
    }

    #[test]
    fn test_bit_not() {
        let r = extract_unary(UnaryOp::BitNot, &ValueRange::range(0, 7), T, T);
        assert_eq!(r, ValueRange::range(-8, -1));
    }

    #[test]
    fn test_widening_conversion_of_varying() {
        let r = extract_unary(UnaryOp::Convert, &ValueRange::varying(), ScalarType::u8(), T);
        assert_eq!(r, ValueRange::range(0, 255));
    }

    #[test]
    fn test_truncating_conversion() {
        let u8 = ScalarType::u8();
        // Fits without wrapping: [300, 310] becomes [44, 54].
        let r = extract_unary(UnaryOp::Convert, &ValueRange::range(300, 310), T, u8);
        assert_eq!(r, ValueRange::range(44, 54));

        // Wider than the target: nothing is known.
        let r = extract_unary(UnaryOp::Convert, &ValueRange::range(0, 1000), T, u8);
        assert!(r.is_varying());
    }

    #[test]
    fn test_sign_changing_conversion_wraps() {
        let u32 = ScalarType::u32();
        let r = extract_unary(UnaryOp::Convert, &ValueRange::range(-1, 1), T, u32);
        // [0xffffffff, 1] wraps: everything except [2, 0xfffffffe].
        assert_eq!(r, ValueRange::anti(2, 0xffff_fffe_i64));
    }

    #[test]
    fn test_pointer_conversion() {
        let p = ScalarType::pointer();
        let r = extract_unary(UnaryOp::Convert, &ValueRange::range(1, 100), ScalarType::u64(), p);
        assert!(r.is_nonnull());
        let r = extract_unary(UnaryOp::Convert, &ValueRange::null(), ScalarType::u64(), p);
        assert!(r.is_null());
    }

    #[test]
    fn test_abs() {
        let r = extract_unary(UnaryOp::Abs, &ValueRange::range(-5, 3), T, T);
        assert_eq!(r, ValueRange::range(0, 5));

        let r = extract_unary(UnaryOp::Abs, &ValueRange::range(-9, -2), T, T);
        assert_eq!(r, ValueRange::range(2, 9));

        let r = extract_unary(UnaryOp::Abs, &ValueRange::range(2, 9), T, T);
        assert_eq!(r, ValueRange::range(2, 9));
    }

    #[test]
    fn test_abs_of_type_minimum() {
        let min = i128::from(i32::MIN);
        let r = extract_unary(UnaryOp::Abs, &ValueRange::range(min, -1), T, T);
        assert_eq!(r, ValueRange::range(Bound::Const(1), Bound::PosInf));

        let wrapping = T.wrapping();
        let r = extract_unary(UnaryOp::Abs, &ValueRange::range(min, -1), wrapping, wrapping);
        assert!(r.is_varying());
    }

    #[test]
    fn test_abs_of_anti_range() {
        // ~[0, 0] splits into [MIN, -1] and [1, MAX].
        let r = extract_unary(UnaryOp::Abs, &ValueRange::anti(0, 0), T, T);
        assert_eq!(r, ValueRange::range(Bound::Const(1), Bound::PosInf));
    }

    #[test]
    fn test_truth_not_folds_constants() {
        let b = ScalarType::boolean();
        assert_eq!(
            extract_unary(UnaryOp::TruthNot, &ValueRange::singleton(0), b, b),
            ValueRange::singleton(1)
        );
        assert!(extract_unary(UnaryOp::TruthNot, &ValueRange::range(0, 1), b, b).is_varying());
    }

    #[test]
    fn test_float_operand_is_varying() {
        let r = extract_unary(UnaryOp::FloatToInt, &ValueRange::varying(), ScalarType::float(), T);
        assert!(r.is_varying());
    }
}
