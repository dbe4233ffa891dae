//! Comparison of range bounds and of whole ranges.
//!
//! Every answer is three-valued at least: when two bounds cannot be ordered
//! at compile time the result is [`ValueOrder::Unknown`], and range
//! comparisons return `None`. Functions taking a `sop` flag set it when the
//! answer relied on signed overflow being undefined, either through an
//! overflow infinity or through symbolic `name + c` arithmetic.

use std::cmp::Ordering;

use crate::{
    analysis::range::{Bound, ValueRange},
    ir::{CmpOp, ScalarType},
};

/// The relative order of two bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ValueOrder {
    /// Strictly less.
    Less,
    /// Equal.
    Equal,
    /// Strictly greater.
    Greater,
    /// Known different without a known order.
    NotEqual,
    /// Not comparable at compile time.
    Unknown,
}

impl ValueOrder {
    /// The order with the operands exchanged.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            ValueOrder::Less => ValueOrder::Greater,
            ValueOrder::Greater => ValueOrder::Less,
            other => other,
        }
    }

    /// Whether the order is `Less` or `Equal`.
    #[must_use]
    pub const fn is_le(self) -> bool {
        matches!(self, ValueOrder::Less | ValueOrder::Equal)
    }

    /// Whether the order is `Greater` or `Equal`.
    #[must_use]
    pub const fn is_ge(self) -> bool {
        matches!(self, ValueOrder::Greater | ValueOrder::Equal)
    }
}

impl From<Ordering> for ValueOrder {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => ValueOrder::Less,
            Ordering::Equal => ValueOrder::Equal,
            Ordering::Greater => ValueOrder::Greater,
        }
    }
}

/// Compares two bounds of type `ty`, setting `sop` when the answer relies on
/// undefined signed overflow.
pub fn compare_values_warnv(a: &Bound, b: &Bound, ty: ScalarType, sop: &mut bool) -> ValueOrder {
    if a == b {
        return ValueOrder::Equal;
    }

    match (a, b) {
        (
            Bound::Symbolic { name: n1, offset: c1 },
            Bound::Symbolic { name: n2, offset: c2 },
        ) => {
            if n1 != n2 {
                return ValueOrder::Unknown;
            }
            if !ty.overflow_undefined() {
                return ValueOrder::Unknown;
            }
            *sop = true;
            c1.cmp(c2).into()
        }
        (Bound::Symbolic { .. }, _) | (_, Bound::Symbolic { .. }) => ValueOrder::Unknown,
        _ if a.is_overflow_infinity() || b.is_overflow_infinity() => {
            *sop = true;
            match (a, b) {
                (Bound::NegInf, Bound::NegInf) | (Bound::PosInf, Bound::PosInf) => ValueOrder::Equal,
                (Bound::NegInf, _) | (_, Bound::PosInf) => ValueOrder::Less,
                _ => ValueOrder::Greater,
            }
        }
        (Bound::Const(x), Bound::Const(y)) => x.cmp(y).into(),
        _ => ValueOrder::Unknown,
    }
}

/// Compares two bounds, refusing any answer that depends on undefined
/// overflow unless both bounds are compile-time invariants.
#[must_use]
pub fn compare_values(a: &Bound, b: &Bound, ty: ScalarType) -> ValueOrder {
    let mut sop = false;
    let order = compare_values_warnv(a, b, ty, &mut sop);
    if sop && (!a.is_invariant() || !b.is_invariant()) {
        ValueOrder::Unknown
    } else {
        order
    }
}

/// Fast `a < b`. Overflow infinities take the value of the type extreme,
/// except that `-INF(OVF)` is below and `+INF(OVF)` above every other bound.
#[must_use]
pub fn operand_less(a: &Bound, b: &Bound, ty: ScalarType) -> Option<bool> {
    if let (Some(x), Some(y)) = (a.concrete(ty), b.concrete(ty)) {
        if x < y {
            return Some(true);
        }
        if matches!(a, Bound::NegInf) {
            return Some(!matches!(b, Bound::NegInf));
        }
        return Some(matches!(b, Bound::PosInf) && !matches!(a, Bound::PosInf));
    }
    match compare_values(a, b, ty) {
        ValueOrder::Less => Some(true),
        ValueOrder::Equal | ValueOrder::Greater => Some(false),
        ValueOrder::NotEqual | ValueOrder::Unknown => None,
    }
}

/// Whether `value` lies in `[min, max]`.
#[must_use]
pub fn value_inside_range(value: &Bound, min: &Bound, max: &Bound, ty: ScalarType) -> Option<bool> {
    if operand_less(value, min, ty)? {
        return Some(false);
    }
    Some(!operand_less(max, value, ty)?)
}

/// Whether two ranges may share a value; `true` unless proven disjoint.
#[must_use]
pub fn ranges_intersect(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> bool {
    value_inside_range(&vr1.min(), &vr0.min(), &vr0.max(), ty) != Some(false)
        || value_inside_range(&vr0.min(), &vr1.min(), &vr1.max(), ty) != Some(false)
}

/// Whether zero is one of the values a range or anti-range describes.
#[must_use]
pub fn range_includes_zero(vr: &ValueRange, ty: ScalarType) -> Option<bool> {
    if !vr.is_bounded() {
        return None;
    }
    let inside = value_inside_range(&Bound::Const(0), &vr.min(), &vr.max(), ty)?;
    Some(inside == vr.is_range())
}

fn overflow_infinity_range(vr: &ValueRange) -> bool {
    vr.is_range() && vr.uses_overflow_infinity()
}

fn usable_range(vr: &ValueRange, sop: &mut bool) -> bool {
    if vr.min().is_overflow_infinity() {
        *sop = true;
        if vr.max().is_overflow_infinity() {
            return false;
        }
    } else if vr.max().is_overflow_infinity() {
        *sop = true;
    }
    true
}

/// Decides `vr0 op vr1` for every pair of values the ranges describe.
///
/// Returns `None` when the outcome differs between pairs or cannot be
/// established. Against an anti-range only equality and inequality are ever
/// decided.
pub fn compare_ranges(
    op: CmpOp,
    vr0: &ValueRange,
    vr1: &ValueRange,
    ty: ScalarType,
    sop: &mut bool,
) -> Option<bool> {
    if !vr0.is_bounded() || !vr1.is_bounded() {
        return None;
    }

    if vr0.is_anti_range() || vr1.is_anti_range() {
        if vr0.is_anti_range() && vr1.is_anti_range() {
            return None;
        }
        if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
            return None;
        }
        let (anti, range) = if vr0.is_anti_range() { (vr0, vr1) } else { (vr1, vr0) };
        if compare_values_warnv(&anti.min(), &range.min(), ty, sop) == ValueOrder::Equal
            && compare_values_warnv(&anti.max(), &range.max(), ty, sop) == ValueOrder::Equal
        {
            return Some(op == CmpOp::Ne);
        }
        return None;
    }

    if !usable_range(vr0, sop) || !usable_range(vr1, sop) {
        return None;
    }

    let (op, vr0, vr1) = match op {
        CmpOp::Gt => (CmpOp::Lt, vr1, vr0),
        CmpOp::Ge => (CmpOp::Le, vr1, vr0),
        other => (other, vr0, vr1),
    };
    let mut cmp = |a: Bound, b: Bound| compare_values_warnv(&a, &b, ty, sop);

    match op {
        CmpOp::Eq => {
            if cmp(vr0.min(), vr0.max()) == ValueOrder::Equal
                && cmp(vr1.min(), vr1.max()) == ValueOrder::Equal
            {
                let cmp_min = cmp(vr0.min(), vr1.min());
                let cmp_max = cmp(vr0.max(), vr1.max());
                if cmp_min == ValueOrder::Equal && cmp_max == ValueOrder::Equal {
                    return Some(true);
                } else if cmp_min != ValueOrder::Unknown && cmp_max != ValueOrder::Unknown {
                    return Some(false);
                }
            } else if cmp(vr0.min(), vr1.max()) == ValueOrder::Greater
                || cmp(vr1.min(), vr0.max()) == ValueOrder::Greater
            {
                return Some(false);
            }
            None
        }
        CmpOp::Ne => {
            let cmp1 = cmp(vr0.max(), vr1.min());
            let cmp2 = cmp(vr0.min(), vr1.max());
            if (cmp1 == ValueOrder::Less && cmp2 == ValueOrder::Less)
                || (cmp1 == ValueOrder::Greater && cmp2 == ValueOrder::Greater)
            {
                Some(true)
            } else if cmp(vr0.min(), vr0.max()) == ValueOrder::Equal
                && cmp(vr1.min(), vr1.max()) == ValueOrder::Equal
                && cmp(vr0.min(), vr1.min()) == ValueOrder::Equal
                && cmp(vr0.max(), vr1.max()) == ValueOrder::Equal
            {
                Some(false)
            } else {
                None
            }
        }
        CmpOp::Lt | CmpOp::Le => {
            let strict = op == CmpOp::Lt;
            let left = cmp(vr0.max(), vr1.min());
            if (strict && left == ValueOrder::Less) || (!strict && left.is_le()) {
                if overflow_infinity_range(vr0) || overflow_infinity_range(vr1) {
                    *sop = true;
                }
                return Some(true);
            }
            let right = cmp(vr0.min(), vr1.max());
            if (strict && right.is_ge()) || (!strict && right == ValueOrder::Greater) {
                if overflow_infinity_range(vr0) || overflow_infinity_range(vr1) {
                    *sop = true;
                }
                return Some(false);
            }
            None
        }
        CmpOp::Gt | CmpOp::Ge => None,
    }
}

/// Decides `vr op value` for every value the range describes.
pub fn compare_range_with_value(
    op: CmpOp,
    vr: &ValueRange,
    value: &Bound,
    ty: ScalarType,
    sop: &mut bool,
) -> Option<bool> {
    if !vr.is_bounded() {
        return None;
    }

    if vr.is_anti_range() {
        if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
            return None;
        }
        if value_inside_range(value, &vr.min(), &vr.max(), ty) == Some(true) {
            return Some(op == CmpOp::Ne);
        }
        return None;
    }

    if !usable_range(vr, sop) {
        return None;
    }
    let infinite = overflow_infinity_range(vr);
    let mut cmp = |a: &Bound, b: &Bound| compare_values_warnv(a, b, ty, sop);
    let (min, max) = (vr.min(), vr.max());

    let decided = match op {
        CmpOp::Eq => {
            if cmp(&min, &max) == ValueOrder::Equal {
                return match cmp(&min, value) {
                    ValueOrder::Equal => Some(true),
                    ValueOrder::Less | ValueOrder::Greater | ValueOrder::NotEqual => Some(false),
                    ValueOrder::Unknown => None,
                };
            } else if cmp(value, &min) == ValueOrder::Less || cmp(&max, value) == ValueOrder::Less {
                return Some(false);
            }
            return None;
        }
        CmpOp::Ne => {
            if cmp(&max, value) == ValueOrder::Less || cmp(&min, value) == ValueOrder::Greater {
                return Some(true);
            }
            if cmp(&min, &max) == ValueOrder::Equal && cmp(&min, value) == ValueOrder::Equal {
                return Some(false);
            }
            return None;
        }
        CmpOp::Lt | CmpOp::Le => {
            let strict = op == CmpOp::Lt;
            let left = cmp(&max, value);
            if (strict && left == ValueOrder::Less) || (!strict && left.is_le()) {
                Some(true)
            } else {
                let right = cmp(&min, value);
                if (strict && right.is_ge()) || (!strict && right == ValueOrder::Greater) {
                    Some(false)
                } else {
                    None
                }
            }
        }
        CmpOp::Gt | CmpOp::Ge => {
            let strict = op == CmpOp::Gt;
            let right = cmp(&min, value);
            if (strict && right == ValueOrder::Greater) || (!strict && right.is_ge()) {
                Some(true)
            } else {
                let left = cmp(&max, value);
                if (strict && left.is_le()) || (!strict && left == ValueOrder::Less) {
                    Some(false)
                } else {
                    None
                }
            }
        }
    };
    if decided.is_some() && infinite {
        *sop = true;
    }
    decided
}
