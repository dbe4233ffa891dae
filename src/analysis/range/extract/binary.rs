//! Range extraction for binary operators.
//!
//! Constant anti-ranges are first split into the one or two ranges they
//! denote, each piece is evaluated separately and the results are joined
//! with [`meet`]. Arithmetic then works bound by bound: addition and
//! subtraction combine corresponding ends, multiplication, division and
//! shifts take the extremes of the four cross products, and the bitwise
//! operators reason about which bits may or must be set.
//!
//! A bound that overflows a type with undefined overflow becomes an
//! overflow infinity; in a wrapping type the result wraps and may turn into
//! an anti-range. Whatever cannot be bounded soundly is VARYING.

use crate::{
    analysis::range::{
        algebra::meet,
        compare::{compare_values, range_includes_zero},
        Bound, RangeKind, ValueOrder, ValueRange,
    },
    ir::{BinaryOp, ScalarType},
};

/// The range of `vr0 op vr1` in type `ty`.
#[must_use]
pub fn extract_binary(
    op: BinaryOp,
    vr0: &ValueRange,
    vr1: &ValueRange,
    ty: ScalarType,
) -> ValueRange {
    if !ty.is_tracked() {
        return ValueRange::varying();
    }
    if ty.is_pointer() {
        return extract_pointer(op, vr0, vr1, ty);
    }

    if let Some((first, second)) = split_anti_range(vr0, ty) {
        let result = extract_binary(op, &first, vr1, ty);
        return match second {
            Some(second) => meet(&result, &extract_binary(op, &second, vr1, ty), ty),
            None => result,
        };
    }
    if let Some((first, second)) = split_anti_range(vr1, ty) {
        let result = extract_binary(op, vr0, &first, ty);
        return match second {
            Some(second) => meet(&result, &extract_binary(op, vr0, &second, ty), ty),
            None => result,
        };
    }

    extract_binary_1(op, vr0, vr1, ty)
}

/// Splits a constant anti-range into the ranges below and above the
/// excluded interval. The first piece is always present.
pub(crate) fn split_anti_range(
    vr: &ValueRange,
    ty: ScalarType,
) -> Option<(ValueRange, Option<ValueRange>)> {
    if !vr.is_anti_range() {
        return None;
    }
    let (lo, hi) = vr.const_bounds(ty)?;
    let below = (lo > ty.min_value()).then(|| ValueRange::range(ty.min_value(), lo - 1));
    let above = (hi < ty.max_value()).then(|| ValueRange::range(hi + 1, ty.max_value()));
    match (below, above) {
        (Some(below), above) => Some((below, above)),
        (None, Some(above)) => Some((above, None)),
        (None, None) => None,
    }
}

fn extract_pointer(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let nonnull = |vr: &ValueRange| !vr.is_symbolic() && range_includes_zero(vr, ty) == Some(false);
    let (nonnull0, nonnull1) = (nonnull(vr0), nonnull(vr1));
    let (null0, null1) = (vr0.is_null(), vr1.is_null());

    let (result_nonnull, result_null) = match op {
        BinaryOp::Min | BinaryOp::Max => (nonnull0 && nonnull1, null0 && null1),
        BinaryOp::PointerPlus => (nonnull0 || nonnull1, null0 && null1),
        BinaryOp::BitAnd => (nonnull0 && nonnull1, null0 || null1),
        _ => (false, false),
    };
    if result_nonnull {
        ValueRange::nonnull()
    } else if result_null {
        ValueRange::null()
    } else {
        ValueRange::varying()
    }
}

fn extract_binary_1(
    op: BinaryOp,
    vr0: &ValueRange,
    vr1: &ValueRange,
    ty: ScalarType,
) -> ValueRange {
    if vr0.is_undefined() && vr1.is_undefined() {
        return ValueRange::undefined();
    }
    let vr0 = if vr0.is_undefined() { ValueRange::varying() } else { vr0.clone() };
    let vr1 = if vr1.is_undefined() { ValueRange::varying() } else { vr1.clone() };

    let tolerates_partial = matches!(
        op,
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::TruncMod | BinaryOp::Min | BinaryOp::Max
    ) || op.is_division();
    if !tolerates_partial
        && (vr0.is_varying()
            || vr1.is_varying()
            || vr0.kind() != vr1.kind()
            || vr0.is_symbolic()
            || vr1.is_symbolic())
    {
        return ValueRange::varying();
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub => plus_minus(op, &vr0, &vr1, ty),
        BinaryOp::Mul => multiply(&vr0, &vr1, ty),
        BinaryOp::Shl | BinaryOp::Shr => shift(op, &vr0, &vr1, ty),
        BinaryOp::TruncDiv
        | BinaryOp::FloorDiv
        | BinaryOp::CeilDiv
        | BinaryOp::RoundDiv
        | BinaryOp::ExactDiv => divide(op, vr0, &vr1, ty),
        BinaryOp::TruncMod => modulo(&vr0, &vr1, ty),
        BinaryOp::Min | BinaryOp::Max => min_max(op, &vr0, &vr1, ty),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => bitwise(op, &vr0, &vr1, ty),
        BinaryOp::PointerPlus => ValueRange::varying(),
    }
}

/// Validates a computed bound pair: a pair spanning the whole type, or one
/// whose ends are unordered, says nothing.
fn finish(kind: RangeKind, min: Bound, max: Bound, ty: ScalarType) -> ValueRange {
    if (min.is_min(ty) || min.is_overflow_infinity()) && (max.is_max(ty) || max.is_overflow_infinity())
    {
        return ValueRange::varying();
    }
    match compare_values(&min, &max, ty) {
        ValueOrder::Less | ValueOrder::Equal => ValueRange::canonical(kind, min, max, ty),
        ValueOrder::Greater | ValueOrder::NotEqual | ValueOrder::Unknown => ValueRange::varying(),
    }
}

/// Folds `a op b` on two constant bounds.
///
/// Overflow in a type with undefined overflow, or arithmetic on an overflow
/// infinity, saturates to the infinity whose sign the operation implies.
/// Overflow in a wrapping type and undefined operations give `None`.
fn const_binop(op: BinaryOp, a: Bound, b: Bound, ty: ScalarType) -> Option<Bound> {
    let (x, y) = (a.concrete(ty)?, b.concrete(ty)?);

    if !ty.overflow_undefined() {
        let exact = op.apply_exact(x, y, ty)?;
        return ty.fits(exact).then_some(Bound::Const(exact));
    }

    let (inf0, inf1) = (a.is_overflow_infinity(), b.is_overflow_infinity());
    if op == BinaryOp::Mul && ((x == 0 && !inf0) || (y == 0 && !inf1)) {
        return Some(Bound::Const(0));
    }
    let exact = op.apply_exact(x, y, ty)?;
    if !inf0 && !inf1 && ty.fits(exact) {
        return Some(Bound::Const(exact));
    }

    let (sgn0, sgn1) = (x.signum(), y.signum());
    if inf0
        && inf1
        && ((op == BinaryOp::Add && sgn0 != sgn1) || (op == BinaryOp::Sub && sgn0 == sgn1))
    {
        return None;
    }
    if (inf0 || inf1) && (op.is_division() || op == BinaryOp::Shr) {
        return None;
    }

    let positive = match op {
        BinaryOp::Mul => sgn0 == sgn1,
        BinaryOp::Add => {
            if sgn0 >= 0 {
                b != Bound::NegInf
            } else {
                b == Bound::PosInf
            }
        }
        BinaryOp::Sub => {
            if sgn0 >= 0 {
                b != Bound::PosInf
            } else {
                b == Bound::NegInf
            }
        }
        BinaryOp::Shl | BinaryOp::Shr => sgn0 >= 0,
        _ => true,
    };
    Some(if positive { Bound::PosInf } else { Bound::NegInf })
}

fn overflow_direction(value: i128, ty: ScalarType) -> i8 {
    if value < ty.min_value() {
        -1
    } else if value > ty.max_value() {
        1
    } else {
        0
    }
}

fn plus_minus(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    if !vr0.is_range() || !vr1.is_range() {
        return ValueRange::varying();
    }
    let (Some((min0, max0)), Some((min1, max1))) = (vr0.const_bounds(ty), vr1.const_bounds(ty))
    else {
        return ValueRange::varying();
    };
    let add = op == BinaryOp::Add;
    let (wmin, wmax) = if add {
        (min0 + min1, max0 + max1)
    } else {
        (min0 - max1, max0 - min1)
    };
    let (min_ovf, max_ovf) = (overflow_direction(wmin, ty), overflow_direction(wmax, ty));

    let (kind, mut min, mut max) = if ty.wraps() {
        let (tmin, tmax) = (ty.wrap(wmin), ty.wrap(wmax));
        if min_ovf == max_ovf {
            (RangeKind::Range, Bound::Const(tmin), Bound::Const(tmax))
        } else if min_ovf == -1 && max_ovf == 1 {
            return ValueRange::varying();
        } else {
            // One end wrapped: the values lie outside (tmax, tmin).
            if tmax == ty.max_value() || tmin == ty.min_value() {
                return ValueRange::varying();
            }
            let (anti_min, anti_max) = (tmax + 1, tmin - 1);
            if anti_min > anti_max {
                return ValueRange::varying();
            }
            (RangeKind::AntiRange, Bound::Const(anti_min), Bound::Const(anti_max))
        }
    } else {
        let saturate = |ovf: i8, value: i128| match ovf {
            -1 => Bound::negative_extreme(ty),
            1 => Bound::positive_extreme(ty),
            _ => Bound::Const(value),
        };
        (RangeKind::Range, saturate(min_ovf, wmin), saturate(max_ovf, wmax))
    };

    if ty.overflow_undefined() {
        let (low_inf, high_inf) = if add {
            (vr1.min() == Bound::NegInf, vr1.max() == Bound::PosInf)
        } else {
            (vr1.max() == Bound::PosInf, vr1.min() == Bound::NegInf)
        };
        if vr0.min() == Bound::NegInf || low_inf {
            min = Bound::NegInf;
        }
        if vr0.max() == Bound::PosInf || high_inf {
            max = Bound::PosInf;
        }
    }

    finish(kind, min, max, ty)
}

fn multiply(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    if ty.wraps() && vr0.is_range() && vr1.is_range() {
        if let (Some(r0), Some(r1)) = (vr0.const_bounds(ty), vr1.const_bounds(ty)) {
            return multiply_wrapping(r0, r1, ty);
        }
    }
    if vr0.is_anti_range() || vr1.is_anti_range() {
        return ValueRange::varying();
    }
    cross_products(BinaryOp::Mul, vr0, vr1, ty)
}

/// Multiplication modulo `2^precision`, exact whenever the spread of the
/// product fits in the type.
fn multiply_wrapping(r0: (i128, i128), r1: (i128, i128), ty: ScalarType) -> ValueRange {
    let size = 1i128 << ty.precision();
    let recenter = |(lo, hi): (i128, i128)| {
        if ty.is_unsigned() && lo + hi > size {
            (lo - size, hi - size)
        } else {
            (lo, hi)
        }
    };
    let ((min0, max0), (min1, max1)) = (recenter(r0), recenter(r1));

    let products = [
        min0.checked_mul(min1),
        min0.checked_mul(max1),
        max0.checked_mul(min1),
        max0.checked_mul(max1),
    ];
    let mut lo = i128::MAX;
    let mut hi = i128::MIN;
    for product in products {
        let Some(p) = product else {
            return ValueRange::varying();
        };
        lo = lo.min(p);
        hi = hi.max(p);
    }
    if hi - lo > size - 1 {
        return ValueRange::varying();
    }
    ValueRange::canonical(
        RangeKind::Range,
        Bound::Const(ty.wrap(lo)),
        Bound::Const(ty.wrap(hi)),
        ty,
    )
}

/// Takes the smallest and largest of the cross products of the bounds.
fn cross_products(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let (min0, max0, min1, max1) = (vr0.min(), vr0.max(), vr1.min(), vr1.max());
    let single0 = min0 == max0;
    let single1 = min1 == max1;

    let mut pairs = vec![(min0, min1)];
    if !single1 {
        pairs.push((min0, max1));
    }
    if !single0 {
        pairs.push((max0, min1));
    }
    if !single0 && !single1 {
        pairs.push((max0, max1));
    }

    let mut values = Vec::with_capacity(pairs.len());
    for (a, b) in pairs {
        match const_binop(op, a, b, ty) {
            Some(v) => values.push(v),
            None => return ValueRange::varying(),
        }
    }

    let mut min = values[0];
    let mut max = values[0];
    for value in &values[1..] {
        if compare_values(value, &min, ty) == ValueOrder::Less {
            min = *value;
        }
        if compare_values(value, &max, ty) == ValueOrder::Greater {
            max = *value;
        }
    }
    finish(vr0.kind(), min, max, ty)
}

fn shift(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let precision = i128::from(ty.precision());
    let Some((lo1, hi1)) = vr1.is_range().then(|| vr1.const_bounds(ty)).flatten() else {
        return ValueRange::varying();
    };
    if vr1.uses_overflow_infinity() || lo1 < 0 || hi1 >= precision {
        return ValueRange::varying();
    }

    if op == BinaryOp::Shr {
        return cross_products(op, vr0, vr1, ty);
    }

    if lo1 == hi1 {
        // x << c is x * 2^c with wrapping semantics.
        let wrapping = ty.wrapping();
        let factor = ValueRange::singleton(wrapping.wrap(1i128 << lo1));
        return multiply(vr0, &factor, wrapping);
    }

    let Some((lo0, hi0)) = vr0.const_bounds(ty) else {
        return ValueRange::varying();
    };
    if !vr0.is_range() || vr0.uses_overflow_infinity() {
        return ValueRange::varying();
    }
    let in_bounds = [(lo0, lo1), (lo0, hi1), (hi0, lo1), (hi0, hi1)]
        .into_iter()
        .all(|(x, s)| BinaryOp::Shl.apply_exact(x, s, ty).is_some_and(|v| ty.fits(v)));
    if in_bounds {
        cross_products(op, vr0, vr1, ty)
    } else {
        ValueRange::varying()
    }
}

fn excludes_zero(vr: &ValueRange, ty: ScalarType) -> bool {
    vr.is_range() && range_includes_zero(vr, ty) == Some(false)
}

fn divide(op: BinaryOp, vr0: ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let vr0 = if !vr0.is_range() || vr0.is_symbolic() {
        if excludes_zero(vr1, ty) && !vr1.is_symbolic() {
            ValueRange::full(ty)
        } else {
            return ValueRange::varying();
        }
    } else {
        vr0
    };

    if excludes_zero(vr1, ty) {
        return cross_products(op, &vr0, vr1, ty);
    }

    // The divisor may be anything but zero; the quotient is no larger in
    // magnitude than the dividend.
    if ty.is_unsigned() || vr1.is_nonnegative(ty) {
        let zero = Bound::Const(0);
        let max = match compare_values(&vr0.max(), &zero, ty) {
            ValueOrder::Less => zero,
            ValueOrder::Equal | ValueOrder::Greater => vr0.max(),
            ValueOrder::NotEqual | ValueOrder::Unknown => return ValueRange::varying(),
        };
        let min = match compare_values(&vr0.min(), &zero, ty) {
            ValueOrder::Greater => zero,
            ValueOrder::Equal | ValueOrder::Less => vr0.min(),
            ValueOrder::NotEqual | ValueOrder::Unknown => return ValueRange::varying(),
        };
        finish(RangeKind::Range, min, max, ty)
    } else {
        abs_extent(&vr0, ty)
    }
}

/// `[-m, m]` where `m` is the larger magnitude of the two bounds.
fn abs_extent(vr: &ValueRange, ty: ScalarType) -> ValueRange {
    if vr.uses_overflow_infinity() {
        return ValueRange::varying();
    }
    let Some((lo, hi)) = vr.const_bounds(ty) else {
        return ValueRange::varying();
    };
    let magnitude = lo.abs().max(hi.abs());
    if !ty.fits(magnitude) || !ty.fits(-magnitude) {
        return ValueRange::varying();
    }
    ValueRange::canonical(
        RangeKind::Range,
        Bound::Const(-magnitude),
        Bound::Const(magnitude),
        ty,
    )
}

fn modulo(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    if !excludes_zero(vr1, ty) || vr1.min().is_min(ty) {
        return ValueRange::varying();
    }
    let Some((lo1, hi1)) = vr1.const_bounds(ty) else {
        return ValueRange::varying();
    };
    let limit = lo1.abs().max(hi1) - 1;
    let min = if ty.is_unsigned() || vr0.is_nonnegative(ty) {
        0
    } else {
        -limit
    };
    finish(RangeKind::Range, Bound::Const(min), Bound::Const(limit), ty)
}

fn lesser(a: Bound, b: Bound, ty: ScalarType) -> Option<Bound> {
    match compare_values(&a, &b, ty) {
        ValueOrder::Less | ValueOrder::Equal => Some(a),
        ValueOrder::Greater => Some(b),
        ValueOrder::NotEqual | ValueOrder::Unknown => None,
    }
}

fn greater(a: Bound, b: Bound, ty: ScalarType) -> Option<Bound> {
    match compare_values(&a, &b, ty) {
        ValueOrder::Greater | ValueOrder::Equal => Some(a),
        ValueOrder::Less => Some(b),
        ValueOrder::NotEqual | ValueOrder::Unknown => None,
    }
}

fn min_max(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let usable0 = vr0.is_range() && !vr0.is_symbolic();
    let usable1 = vr1.is_range() && !vr1.is_symbolic();
    let type_min = Bound::Const(ty.min_value());
    let type_max = Bound::Const(ty.max_value());

    let bounds = match (usable0, usable1, op) {
        (true, true, BinaryOp::Min) => lesser(vr0.min(), vr1.min(), ty)
            .zip(lesser(vr0.max(), vr1.max(), ty)),
        (true, true, _) => greater(vr0.min(), vr1.min(), ty)
            .zip(greater(vr0.max(), vr1.max(), ty)),
        (true, false, BinaryOp::Min) => Some((type_min, vr0.max())),
        (true, false, _) => Some((vr0.min(), type_max)),
        (false, true, BinaryOp::Min) => Some((type_min, vr1.max())),
        (false, true, _) => Some((vr1.min(), type_max)),
        (false, false, _) => None,
    };
    match bounds {
        Some((min, max)) => finish(RangeKind::Range, min, max, ty),
        None => ValueRange::varying(),
    }
}

fn width_mask(ty: ScalarType) -> u128 {
    (1u128 << ty.precision()) - 1
}

fn to_bits(value: i128, ty: ScalarType) -> u128 {
    (value as u128) & width_mask(ty)
}

fn from_bits(bits: u128, ty: ScalarType) -> i128 {
    ty.wrap((bits & width_mask(ty)) as i128)
}

/// Bits that may be set and bits that must be set in every value of `vr`.
///
/// The flag tells whether `vr` was a constant range at all. A constant
/// range straddling zero yields no information about individual bits.
pub(crate) fn zero_nonzero_bits(vr: &ValueRange, ty: ScalarType) -> (u128, u128, bool) {
    let unknown = (width_mask(ty), 0, false);
    if !vr.is_range() || vr.uses_overflow_infinity() {
        return unknown;
    }
    let Some((lo, hi)) = vr.const_bounds(ty) else {
        return unknown;
    };

    if lo == hi {
        let bits = to_bits(lo, ty);
        return (bits, bits, true);
    }
    if lo >= 0 || hi < 0 {
        let (lo_bits, hi_bits) = (to_bits(lo, ty), to_bits(hi, ty));
        let mut may = lo_bits | hi_bits;
        let mut must = lo_bits & hi_bits;
        let differ = lo_bits ^ hi_bits;
        if differ != 0 {
            let top = 127 - differ.leading_zeros();
            let mask = (1u128 << (top + 1)) - 1;
            may |= mask;
            must &= !mask;
        }
        return (may, must, true);
    }
    (width_mask(ty), 0, true)
}

fn bitwise(op: BinaryOp, vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    let (may0, must0, known0) = zero_nonzero_bits(vr0, ty);
    let (may1, must1, known1) = zero_nonzero_bits(vr1, ty);
    let bounds0 = vr0.const_bounds(ty);
    let bounds1 = vr1.const_bounds(ty);
    let nonnegative = |known: bool, b: Option<(i128, i128)>| known && b.is_some_and(|(lo, _)| lo >= 0);
    let negative = |known: bool, b: Option<(i128, i128)>| known && b.is_some_and(|(_, hi)| hi < 0);

    let (min, max) = match op {
        BinaryOp::BitAnd => {
            let min = from_bits(must0 & must1, ty);
            let mut max = from_bits(may0 & may1, ty);
            if let (true, true, Some((_, hi0)), Some((_, hi1))) = (
                negative(known0, bounds0),
                negative(known1, bounds1),
                bounds0,
                bounds1,
            ) {
                max = max.min(hi0).min(hi1);
            }
            if let (true, Some((_, hi0))) = (nonnegative(known0, bounds0), bounds0) {
                max = max.min(hi0);
            }
            if let (true, Some((_, hi1))) = (nonnegative(known1, bounds1), bounds1) {
                max = max.min(hi1);
            }
            (min, max)
        }
        BinaryOp::BitOr => {
            let max = from_bits(may0 | may1, ty);
            let mut min = from_bits(must0 | must1, ty);
            if let (true, true, Some((lo0, _)), Some((lo1, _))) = (
                nonnegative(known0, bounds0),
                nonnegative(known1, bounds1),
                bounds0,
                bounds1,
            ) {
                min = min.max(lo0).max(lo1);
            }
            if let (true, Some((lo0, _))) = (negative(known0, bounds0), bounds0) {
                min = min.max(lo0);
            }
            if let (true, Some((lo1, _))) = (negative(known1, bounds1), bounds1) {
                min = min.max(lo1);
            }
            (min, max)
        }
        _ => {
            let zero_bits = (must0 & must1) | !(may0 | may1);
            let one_bits = (must0 & !may1) | (must1 & !may0);
            let min = from_bits(one_bits, ty);
            let max = from_bits(!zero_bits, ty);
            if !(min < 0 || max >= 0) {
                return ValueRange::varying();
            }
            (min, max)
        }
    };
    finish(RangeKind::Range, Bound::Const(min), Bound::Const(max), ty)
}
