//! Meet and intersection over the range lattice.
//!
//! [`meet`] joins the facts flowing into a PHI node: the result holds every
//! value either input holds. [`intersect`] combines two facts true at the
//! same time, as when an assertion refines a name's range. Neither operation
//! ever returns a range smaller (for meet) or larger (for intersect) than is
//! sound; when no precise answer is available meet climbs towards VARYING
//! and intersect keeps its first operand.

use crate::{
    analysis::range::{
        compare::{compare_values, operand_less, range_includes_zero, ranges_intersect},
        Bound, RangeKind, ValueOrder, ValueRange,
    },
    ir::ScalarType,
};

/// The smallest range holding every value of `vr0` and of `vr1`.
///
/// Equivalences are intersected. When no bound-wise answer exists but both
/// inputs exclude zero, the result is `~[0, 0]`.
#[must_use]
pub fn meet(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    match (vr0.kind(), vr1.kind()) {
        (RangeKind::Undefined, _) => return vr1.clone(),
        (_, RangeKind::Undefined) => return vr0.clone(),
        (RangeKind::Varying, _) | (_, RangeKind::Varying) => return ValueRange::varying(),
        _ => {}
    }

    match meet_bounded(vr0, vr1, ty) {
        Some(result) => {
            let equiv = vr0.equiv().intersection(vr1.equiv()).copied().collect();
            result.with_equiv(equiv)
        }
        None => give_up(vr0, vr1, ty),
    }
}

fn meet_bounded(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> Option<ValueRange> {
    match (vr0.kind(), vr1.kind()) {
        (RangeKind::Range, RangeKind::Range) => {
            let min = match compare_values(&vr0.min(), &vr1.min(), ty) {
                ValueOrder::Equal | ValueOrder::Greater => vr1.min(),
                ValueOrder::Less => vr0.min(),
                ValueOrder::NotEqual | ValueOrder::Unknown => return None,
            };
            let max = match compare_values(&vr0.max(), &vr1.max(), ty) {
                ValueOrder::Equal | ValueOrder::Less => vr1.max(),
                ValueOrder::Greater => vr0.max(),
                ValueOrder::NotEqual | ValueOrder::Unknown => return None,
            };
            if ty.is_integral() && min.is_min(ty) && max.is_max(ty) {
                return None;
            }
            Some(ValueRange::range(min, max))
        }
        (RangeKind::AntiRange, RangeKind::AntiRange) => {
            let identical_singleton = compare_values(&vr0.min(), &vr1.min(), ty) == ValueOrder::Equal
                && compare_values(&vr0.max(), &vr1.max(), ty) == ValueOrder::Equal
                && compare_values(&vr0.min(), &vr0.max(), ty) == ValueOrder::Equal;
            identical_singleton.then(|| ValueRange::anti(vr0.min(), vr0.max()))
        }
        _ => {
            if vr0.is_symbolic() || vr1.is_symbolic() || ranges_intersect(vr0, vr1, ty) {
                return None;
            }
            let anti = if vr0.is_anti_range() { vr0 } else { vr1 };
            Some(ValueRange::anti(anti.min(), anti.max()))
        }
    }
}

fn excludes_zero(vr: &ValueRange, ty: ScalarType) -> bool {
    !vr.is_symbolic() && range_includes_zero(vr, ty) == Some(false)
}

fn give_up(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    if excludes_zero(vr0, ty) && excludes_zero(vr1, ty) {
        ValueRange::nonnull()
    } else {
        ValueRange::varying()
    }
}

/// The largest range describable holding only values in both `vr0` and
/// `vr1`.
///
/// An empty intersection is UNDEFINED. When the exact intersection is not
/// expressible (two disjoint pieces, say) a sound superset is returned, and
/// when normalization would lose everything `vr0` is returned unchanged.
/// Equivalences are united.
#[must_use]
pub fn intersect(vr0: &ValueRange, vr1: &ValueRange, ty: ScalarType) -> ValueRange {
    match (vr0.kind(), vr1.kind()) {
        (RangeKind::Undefined, _) => return ValueRange::undefined(),
        (_, RangeKind::Undefined) => return ValueRange::undefined(),
        (_, RangeKind::Varying) => return vr0.clone(),
        (RangeKind::Varying, _) => return vr1.clone(),
        _ => {}
    }

    let (kind, min, max) = intersect_bounds(
        (vr0.kind(), vr0.min(), vr0.max()),
        (vr1.kind(), vr1.min(), vr1.max()),
        ty,
    );
    let result = ValueRange::canonical(kind, min, max, ty);
    if result.is_varying() {
        return vr0.clone();
    }
    if result.is_undefined() {
        return result;
    }
    let equiv = vr0.equiv().union(vr1.equiv()).copied().collect();
    result.with_equiv(equiv)
}

type Triple = (RangeKind, Bound, Bound);

fn less(a: &Bound, b: &Bound, ty: ScalarType) -> bool {
    operand_less(a, b, ty) == Some(true)
}

fn plus_one(b: Bound, ty: ScalarType) -> Bound {
    match b {
        Bound::Const(_) | Bound::NegInf | Bound::PosInf => b
            .concrete(ty)
            .and_then(|v| v.checked_add(1))
            .filter(|v| ty.fits(*v))
            .map_or(b, Bound::Const),
        Bound::Symbolic { .. } => b,
    }
}

fn minus_one(b: Bound, ty: ScalarType) -> Bound {
    match b {
        Bound::Const(_) | Bound::NegInf | Bound::PosInf => b
            .concrete(ty)
            .and_then(|v| v.checked_sub(1))
            .filter(|v| ty.fits(*v))
            .map_or(b, Bound::Const),
        Bound::Symbolic { .. } => b,
    }
}

// Classification comments draw vr0 as [ ] and vr1 as ( ).
fn intersect_bounds(vr0: Triple, vr1: Triple, ty: ScalarType) -> Triple {
    use RangeKind::{AntiRange as Anti, Range};

    let (k0, min0, max0) = vr0;
    let (k1, min1, max1) = vr1;
    let empty = (RangeKind::Undefined, Bound::Const(0), Bound::Const(0));
    let mineq = min0 == min1;
    let maxeq = max0 == max1;

    if mineq && maxeq {
        // [(  )]
        return if k0 == k1 { vr0 } else { empty };
    }

    if less(&max0, &min1, ty) || less(&max1, &min0, ty) {
        // [ ] ( )  or  ( ) [ ]
        return match (k0, k1) {
            (Range, Anti) => vr0,
            (Anti, Range) => vr1,
            (Range, Range) => empty,
            _ => {
                let adjacent = |lo: &Bound, hi: &Bound| match (lo, hi) {
                    (Bound::Const(a), Bound::Const(b)) => a.checked_add(1) == Some(*b),
                    _ => false,
                };
                if less(&max0, &min1, ty) && adjacent(&max0, &min1) {
                    (Anti, min0, max1)
                } else if less(&max1, &min0, ty) && adjacent(&max1, &min0) {
                    (Anti, min1, max0)
                } else {
                    vr0
                }
            }
        };
    }

    if (maxeq || less(&max1, &max0, ty)) && (mineq || less(&min0, &min1, ty)) {
        // [ (  ) ]  or  [(  ) ]  or  [ (  )]
        return match (k0, k1) {
            (Range, Range) => vr1,
            (Range, Anti) => {
                if mineq {
                    (Range, plus_one(max1, ty), max0)
                } else if maxeq {
                    (Range, min0, minus_one(min1, ty))
                } else if min0.is_min(ty) && max0.is_max(ty) {
                    vr1
                } else {
                    vr0
                }
            }
            (Anti, Anti) => vr0,
            _ => empty,
        };
    }

    if (maxeq || less(&max0, &max1, ty)) && (mineq || less(&min1, &min0, ty)) {
        // ( [  ] )  or  ([  ] )  or  ( [  ])
        return match (k0, k1) {
            (Range, Range) => vr0,
            (Anti, Range) => {
                if mineq {
                    (Range, plus_one(max0, ty), max1)
                } else if maxeq {
                    (Range, min1, minus_one(min0, ty))
                } else if min1.is_min(ty) && max1.is_max(ty) {
                    vr0
                } else {
                    vr1
                }
            }
            (Anti, Anti) => vr1,
            _ => empty,
        };
    }

    if (less(&min1, &max0, ty) || min1 == max0) && less(&min0, &min1, ty) {
        // [  (  ]  )  or  [  ](  )
        return match (k0, k1) {
            (Range, Range) => (Range, min1, max0),
            (Range, Anti) => (Range, min0, minus_one(min1, ty)),
            (Anti, Range) => (Range, plus_one(max0, ty), max1),
            _ => (Anti, min0, max1),
        };
    }

    if (less(&min0, &max1, ty) || min0 == max1) && less(&min1, &min0, ty) {
        // (  [  )  ]  or  (  )[  ]
        return match (k0, k1) {
            (Range, Range) => (Range, min0, max1),
            (Range, Anti) => (Range, plus_one(max1, ty), max0),
            (Anti, Range) => (Range, min1, minus_one(min0, ty)),
            _ => (Anti, min1, max0),
        };
    }

    vr0
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::ir::SsaNameId;

    const T: ScalarType = ScalarType::i32();

    #[test]
    fn test_meet_hull() {
        let m = meet(&ValueRange::range(0, 4), &ValueRange::range(10, 20), T);
        assert_eq!(m, ValueRange::range(0, 20));
        assert_eq!(meet(&ValueRange::undefined(), &ValueRange::range(1, 2), T), ValueRange::range(1, 2));
        assert!(meet(&ValueRange::varying(), &ValueRange::range(1, 2), T).is_varying());
    }

    #[test]
    fn test_meet_nonnull_salvage() {
        let m = meet(&ValueRange::range(1, 5), &ValueRange::nonnull(), T);
        assert!(m.is_nonnull());
        let m = meet(&ValueRange::range(-5, -1), &ValueRange::range(1, Bound::PosInf), T);
        assert_eq!(m, ValueRange::range(-5, Bound::PosInf));
        let m = meet(&ValueRange::range(Bound::NegInf, -1), &ValueRange::range(1, Bound::PosInf), T);
        assert!(m.is_nonnull());
    }

    #[test]
    fn test_meet_range_with_disjoint_anti_range() {
        let m = meet(&ValueRange::range(10, 20), &ValueRange::anti(0, 5), T);
        assert_eq!(m, ValueRange::anti(0, 5));
        assert!(meet(&ValueRange::range(-3, 20), &ValueRange::anti(0, 5), T).is_varying());
    }

    #[test]
    fn test_meet_intersects_equivalences() {
        let a = SsaNameId::new(1);
        let b = SsaNameId::new(2);
        let vr0 = ValueRange::range(0, 1).with_equiv(BTreeSet::from([a, b]));
        let vr1 = ValueRange::range(0, 2).with_equiv(BTreeSet::from([b]));
        let m = meet(&vr0, &vr1, T);
        assert_eq!(m.equiv(), &BTreeSet::from([b]));
    }

    #[test]
    fn test_intersect_ranges() {
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::range(5, 20), T);
        assert_eq!(r, ValueRange::range(5, 10));
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::range(20, 30), T);
        assert!(r.is_undefined());
        let r = intersect(&ValueRange::varying(), &ValueRange::range(1, Bound::PosInf), T);
        assert_eq!(r, ValueRange::range(1, Bound::PosInf));
    }

    #[test]
    fn test_intersect_prefers_untainted_minimum() {
        let t = ScalarType::i8();
        let r = intersect(&ValueRange::range(Bound::NegInf, 5), &ValueRange::range(-128, 10), t);
        assert_eq!(r, ValueRange::range(-128, 5));
        assert!(!r.uses_overflow_infinity());
    }

    #[test]
    fn test_intersect_range_with_anti_range() {
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::anti(0, 3), T);
        assert_eq!(r, ValueRange::range(4, 10));
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::anti(8, 20), T);
        assert_eq!(r, ValueRange::range(0, 7));
        // Excluding a hole in the middle is not expressible; the range stays.
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::anti(4, 5), T);
        assert_eq!(r, ValueRange::range(0, 10));
        let r = intersect(&ValueRange::range(0, 10), &ValueRange::anti(0, 10), T);
        assert!(r.is_undefined());
    }

    #[test]
    fn test_intersect_anti_ranges_merge_when_adjacent() {
        let r = intersect(&ValueRange::anti(0, 3), &ValueRange::anti(4, 9), T);
        assert_eq!(r, ValueRange::anti(0, 9));
        let r = intersect(&ValueRange::anti(0, 5), &ValueRange::anti(3, 9), T);
        assert_eq!(r, ValueRange::anti(0, 9));
    }

    #[test]
    fn test_intersect_keeps_first_on_failure() {
        let sym = ValueRange::same_as(SsaNameId::new(3));
        let r = intersect(&ValueRange::range(0, 10), &sym, T);
        assert_eq!(r, ValueRange::range(0, 10));
    }
}
