//! Ranges of assertion results.
//!
//! An assertion `x' = ASSERT(x, x op limit)` narrows the range of `x` with
//! what the predicate says. The limit's own range is used when it is a
//! constant range; a limit name without one contributes a symbolic bound.

use std::collections::BTreeSet;

use crate::{
    analysis::range::{
        algebra::intersect,
        compare::compare_values,
        extract::RangeQuery,
        Bound, RangeKind, ValueOrder, ValueRange,
    },
    ir::{CmpOp, Operand, Predicate, ScalarType, SsaNameId},
};

/// The range of `ASSERT(name, predicate)` where the result has type `ty`.
pub fn extract_assert<Q: RangeQuery + ?Sized>(
    query: &Q,
    name: SsaNameId,
    predicate: &Predicate,
    ty: ScalarType,
) -> ValueRange {
    if !ty.is_tracked() {
        return ValueRange::varying();
    }

    let mut equiv = BTreeSet::from([name]);
    let implied = match *predicate {
        Predicate::Within { low, high, negated } => {
            let kind = if negated {
                RangeKind::AntiRange
            } else {
                RangeKind::Range
            };
            ValueRange::canonical(kind, Bound::Const(low), Bound::Const(high), ty)
        }
        Predicate::Compare { op, limit } => {
            if ty.is_pointer() && !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                return ValueRange::varying();
            }
            let limit_vr = limit_range(query, &limit);
            let implied = from_comparison(op, &limit, limit_vr.as_ref(), ty);
            if op == CmpOp::Eq {
                if let Operand::Name(limit_name) = limit {
                    let known = query.range_of(limit_name);
                    equiv.insert(limit_name);
                    equiv.extend(known.equiv().iter().copied());
                }
            }
            implied
        }
    };

    let implied = implied.with_equiv(equiv);
    let current = query.range_of(name);
    intersect(&current, &implied, ty)
}

/// The limit's range, when it is a usable constant range.
fn limit_range<Q: RangeQuery + ?Sized>(query: &Q, limit: &Operand) -> Option<ValueRange> {
    match *limit {
        Operand::Const(c) => Some(ValueRange::singleton(c)),
        Operand::Name(n) => {
            let vr = query.range_of(n);
            (vr.is_bounded() && !vr.is_symbolic()).then_some(vr)
        }
    }
}

fn limit_bound(limit: &Operand) -> Bound {
    match *limit {
        Operand::Const(c) => Bound::Const(c),
        Operand::Name(n) => Bound::name(n),
    }
}

fn from_comparison(
    op: CmpOp,
    limit: &Operand,
    limit_vr: Option<&ValueRange>,
    ty: ScalarType,
) -> ValueRange {
    let type_min = Bound::Const(ty.min_value());
    let type_max = Bound::Const(ty.max_value());

    match op {
        CmpOp::Eq => match limit_vr {
            Some(vr) => ValueRange::canonical(vr.kind(), vr.min(), vr.max(), ty),
            None => {
                let bound = limit_bound(limit);
                ValueRange::range(bound, bound)
            }
        },
        CmpOp::Ne => match limit_vr {
            Some(vr) if vr.is_range() && vr.min() == vr.max() => {
                ValueRange::canonical(RangeKind::AntiRange, vr.min(), vr.max(), ty)
            }
            Some(_) => ValueRange::varying(),
            None => {
                let bound = limit_bound(limit);
                ValueRange::anti(bound, bound)
            }
        },
        CmpOp::Le | CmpOp::Lt => {
            // Only the limit's upper end helps; an anti-range limit says nothing.
            let max = match limit_vr {
                Some(vr) if vr.is_anti_range() => return ValueRange::varying(),
                Some(vr) => vr.max(),
                None => limit_bound(limit),
            };
            let max = if op == CmpOp::Lt {
                if compare_values(&max, &type_min, ty) == ValueOrder::Equal {
                    return ValueRange::varying();
                }
                step(max, -1, ty)
            } else {
                max
            };
            range_or_varying(type_min, max, ty)
        }
        CmpOp::Ge | CmpOp::Gt => {
            let min = match limit_vr {
                Some(vr) if vr.is_anti_range() => return ValueRange::varying(),
                Some(vr) => vr.min(),
                None => limit_bound(limit),
            };
            let min = if op == CmpOp::Gt {
                if compare_values(&min, &type_max, ty) == ValueOrder::Equal {
                    return ValueRange::varying();
                }
                step(min, 1, ty)
            } else {
                min
            };
            range_or_varying(min, type_max, ty)
        }
    }
}

/// Moves a bound one step, turning an overflow infinity into the adjacent
/// finite value.
fn step(bound: Bound, delta: i128, ty: ScalarType) -> Bound {
    match bound {
        Bound::PosInf => Bound::Const(ty.max_value() - 1),
        Bound::NegInf => Bound::Const(ty.min_value() + 1),
        Bound::Const(c) => Bound::Const(c + delta),
        Bound::Symbolic { name, offset } => Bound::Symbolic {
            name,
            offset: offset + delta,
        },
    }
}

fn range_or_varying(min: Bound, max: Bound, ty: ScalarType) -> ValueRange {
    match compare_values(&min, &max, ty) {
        ValueOrder::Greater => ValueRange::varying(),
        _ if min.is_min(ty) && max.is_max(ty) => ValueRange::varying(),
        _ => ValueRange::canonical(RangeKind::Range, min, max, ty),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const T: ScalarType = ScalarType::i32();

    #[derive(Default)]
    struct Ranges(HashMap<SsaNameId, ValueRange>);

    impl RangeQuery for Ranges {
        fn range_of(&self, name: SsaNameId) -> ValueRange {
            self.0.get(&name).cloned().unwrap_or_else(ValueRange::varying)
        }

        fn type_of(&self, _name: SsaNameId) -> ScalarType {
            T
        }
    }

    fn n(i: usize) -> SsaNameId {
        SsaNameId::new(i)
    }

    fn compare(op: CmpOp, limit: impl Into<Operand>) -> Predicate {
        Predicate::Compare {
            op,
            limit: limit.into(),
        }
    }

    #[test]
    fn test_less_than_constant() {
        let q = Ranges::default();
        let r = extract_assert(&q, n(0), &compare(CmpOp::Lt, 10), T);
        assert_eq!(r.kind(), RangeKind::Range);
        assert_eq!(r.min(), Bound::Const(i128::from(i32::MIN)));
        assert_eq!(r.max(), Bound::Const(9));
        assert!(r.equiv().contains(&n(0)));
    }

    #[test]
    fn test_narrows_existing_range() {
        let mut q = Ranges::default();
        q.0.insert(n(0), ValueRange::range(0, 100));
        let r = extract_assert(&q, n(0), &compare(CmpOp::Ge, 40), T);
        assert!(r.same_bounds(&ValueRange::range(40, 100)));
    }

    #[test]
    fn test_not_equal_constant() {
        let q = Ranges::default();
        let r = extract_assert(&q, n(0), &compare(CmpOp::Ne, 0), T);
        assert!(r.is_nonnull());
    }

    #[test]
    fn test_equal_to_name_records_equivalence() {
        let mut q = Ranges::default();
        q.0.insert(n(1), ValueRange::range(3, 8));
        let r = extract_assert(&q, n(0), &compare(CmpOp::Eq, n(1)), T);
        assert!(r.same_bounds(&ValueRange::range(3, 8)));
        assert!(r.equiv().contains(&n(1)));
    }

    #[test]
    fn test_name_limit_without_range_is_symbolic() {
        let q = Ranges::default();
        let r = extract_assert(&q, n(0), &compare(CmpOp::Lt, n(1)), T);
        assert_eq!(r.max(), Bound::Symbolic { name: n(1), offset: -1 });
    }

    #[test]
    fn test_impossible_strict_bound() {
        let q = Ranges::default();
        let r = extract_assert(&q, n(0), &compare(CmpOp::Lt, i128::from(i32::MIN)), T);
        assert!(r.is_varying());
        let r = extract_assert(&q, n(0), &compare(CmpOp::Gt, i128::from(i32::MAX)), T);
        assert!(r.is_varying());
    }

    #[test]
    fn test_within() {
        let q = Ranges::default();
        let r = extract_assert(
            &q,
            n(0),
            &Predicate::Within {
                low: 3,
                high: 10,
                negated: false,
            },
            T,
        );
        assert!(r.same_bounds(&ValueRange::range(3, 10)));
        let r = extract_assert(
            &q,
            n(0),
            &Predicate::Within {
                low: 3,
                high: 10,
                negated: true,
            },
            T,
        );
        assert!(r.same_bounds(&ValueRange::anti(3, 10)));
    }

    #[test]
    fn test_pointer_ordering_is_ignored() {
        let q = Ranges::default();
        let p = ScalarType::pointer();
        assert!(extract_assert(&q, n(0), &compare(CmpOp::Gt, 0), p).is_varying());
        let r = extract_assert(&q, n(0), &compare(CmpOp::Ne, 0), p);
        assert!(r.is_nonnull());
    }
}
