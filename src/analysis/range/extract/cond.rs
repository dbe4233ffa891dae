//! Evaluation of comparisons over ranges.
//!
//! A comparison is first decided from the operands' own ranges. When that
//! fails and equivalences may be consulted, every name known equal to an
//! operand is tried in turn; if two members disagree the comparison sits in
//! dead code and no answer is given.

use crate::{
    analysis::range::{
        compare::{compare_range_with_value, compare_ranges},
        extract::RangeQuery,
        Bound, ValueRange,
    },
    ir::{CmpOp, Operand, ScalarType, SsaNameId},
};

/// Decides `lhs op rhs` from the current ranges.
///
/// `sop` is set when the answer relies on undefined signed overflow.
/// Equivalence sets are consulted only with `use_equiv`.
pub fn evaluate_condition<Q: RangeQuery + ?Sized>(
    query: &Q,
    op: CmpOp,
    lhs: &Operand,
    rhs: &Operand,
    use_equiv: bool,
    sop: &mut bool,
) -> Option<bool> {
    let ty = match (lhs, rhs) {
        (Operand::Const(a), Operand::Const(b)) => return Some(op.eval(*a, *b)),
        (Operand::Name(n), _) | (_, Operand::Name(n)) => query.type_of(*n),
    };
    if !ty.is_tracked() {
        return None;
    }

    let decided = match (lhs, rhs) {
        (Operand::Name(a), Operand::Name(b)) => {
            compare_ranges(op, &query.range_of(*a), &query.range_of(*b), ty, sop)
        }
        (Operand::Name(a), Operand::Const(c)) => {
            compare_range_with_value(op, &query.range_of(*a), &Bound::Const(*c), ty, sop)
        }
        (Operand::Const(c), Operand::Name(b)) => {
            compare_range_with_value(op.swap(), &query.range_of(*b), &Bound::Const(*c), ty, sop)
        }
        (Operand::Const(_), Operand::Const(_)) => None,
    };
    if decided.is_some() || !use_equiv {
        return decided;
    }

    match (lhs, rhs) {
        (Operand::Name(a), Operand::Name(b)) => compare_names(query, op, *a, *b, ty, sop),
        (Operand::Name(a), Operand::Const(c)) => compare_name_with_value(query, op, *a, *c, ty, sop),
        (Operand::Const(c), Operand::Name(b)) => {
            compare_name_with_value(query, op.swap(), *b, *c, ty, sop)
        }
        (Operand::Const(_), Operand::Const(_)) => None,
    }
}

/// The range used for `name` when comparing members of an equivalence set:
/// a name without a useful range stands for itself.
fn range_for_comparison<Q: RangeQuery + ?Sized>(query: &Q, name: SsaNameId) -> ValueRange {
    let vr = query.range_of(name);
    if vr.is_varying() || vr.is_undefined() {
        ValueRange::same_as(name)
    } else {
        vr
    }
}

fn equivalence_class<Q: RangeQuery + ?Sized>(query: &Q, name: SsaNameId) -> Vec<SsaNameId> {
    let mut class: Vec<SsaNameId> = query.range_of(name).equiv().iter().copied().collect();
    if !class.contains(&name) {
        class.insert(0, name);
    }
    class
}

/// Tracks the answers of several comparisons that must agree.
#[derive(Default)]
struct Agreement {
    answer: Option<bool>,
    conflict: bool,
    // None until a comparison succeeds; then whether every success relied
    // on undefined overflow.
    all_strict: Option<bool>,
}

impl Agreement {
    fn record(&mut self, answer: bool, strict: bool) {
        if self.answer.is_some_and(|previous| previous != answer) {
            self.conflict = true;
        }
        self.answer = Some(answer);
        self.all_strict = Some(self.all_strict.unwrap_or(true) && strict);
    }

    fn finish(self, sop: &mut bool) -> Option<bool> {
        if self.conflict {
            return None;
        }
        if self.answer.is_some() && self.all_strict == Some(true) {
            *sop = true;
        }
        self.answer
    }
}

fn compare_names<Q: RangeQuery + ?Sized>(
    query: &Q,
    op: CmpOp,
    n1: SsaNameId,
    n2: SsaNameId,
    ty: ScalarType,
    sop: &mut bool,
) -> Option<bool> {
    let e1 = equivalence_class(query, n1);
    let e2 = equivalence_class(query, n2);

    if e1.iter().any(|n| e2.contains(n)) {
        return Some(matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge));
    }

    for &i1 in &e1 {
        let vr1 = range_for_comparison(query, i1);
        let mut agreement = Agreement::default();
        for &i2 in &e2 {
            let vr2 = range_for_comparison(query, i2);
            let mut strict = false;
            if let Some(answer) = compare_ranges(op, &vr1, &vr2, ty, &mut strict) {
                agreement.record(answer, strict);
                if agreement.conflict {
                    break;
                }
            }
        }
        if let Some(answer) = agreement.finish(sop) {
            return Some(answer);
        }
    }
    None
}

fn compare_name_with_value<Q: RangeQuery + ?Sized>(
    query: &Q,
    op: CmpOp,
    name: SsaNameId,
    value: i128,
    ty: ScalarType,
    sop: &mut bool,
) -> Option<bool> {
    let value = Bound::Const(value);
    let mut agreement = Agreement::default();
    for member in equivalence_class(query, name) {
        let vr = range_for_comparison(query, member);
        let mut strict = false;
        if let Some(answer) = compare_range_with_value(op, &vr, &value, ty, &mut strict) {
            agreement.record(answer, strict);
            if agreement.conflict {
                break;
            }
        }
    }
    agreement.finish(sop)
}

/// The range of a comparison's truth value in type `ty`.
///
/// An answer that relied on undefined overflow is not used, since a
/// constant cannot carry that dependency.
pub fn extract_compare<Q: RangeQuery + ?Sized>(
    query: &Q,
    op: CmpOp,
    lhs: &Operand,
    rhs: &Operand,
    ty: ScalarType,
) -> ValueRange {
    let mut sop = false;
    match evaluate_condition(query, op, lhs, rhs, true, &mut sop) {
        Some(value) if !sop => ValueRange::singleton(ty.wrap(i128::from(value))),
        _ => truth_value(ty),
    }
}

/// `[0, 1]`, which for a one-bit type is all of it.
pub(crate) fn truth_value(ty: ScalarType) -> ValueRange {
    if ty.precision() == 1 {
        ValueRange::varying()
    } else {
        ValueRange::range(0, 1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

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

    #[test]
    fn test_range_against_constant() {
        let mut q = Ranges::default();
        q.0.insert(n(0), ValueRange::range(0, 9));
        let mut sop = false;
        let lhs = Operand::Name(n(0));
        assert_eq!(
            evaluate_condition(&q, CmpOp::Lt, &lhs, &Operand::Const(10), false, &mut sop),
            Some(true)
        );
        assert_eq!(
            evaluate_condition(&q, CmpOp::Gt, &Operand::Const(3), &lhs, false, &mut sop),
            None
        );
        assert!(!sop);
    }

    #[test]
    fn test_constants_fold() {
        let q = Ranges::default();
        let mut sop = false;
        assert_eq!(
            evaluate_condition(&q, CmpOp::Ne, &Operand::Const(1), &Operand::Const(2), false, &mut sop),
            Some(true)
        );
    }

    #[test]
    fn test_equivalences_decide_when_ranges_do_not() {
        let mut q = Ranges::default();
        // _1 is known equal to _2, which is below 5.
        let equiv: BTreeSet<_> = [n(2)].into_iter().collect();
        q.0.insert(n(1), ValueRange::same_as(n(1)).with_equiv(equiv));
        q.0.insert(n(2), ValueRange::range(0, 4));

        let lhs = Operand::Name(n(1));
        let rhs = Operand::Const(5);
        let mut sop = false;
        assert_eq!(evaluate_condition(&q, CmpOp::Lt, &lhs, &rhs, false, &mut sop), None);
        assert_eq!(evaluate_condition(&q, CmpOp::Lt, &lhs, &rhs, true, &mut sop), Some(true));
    }

    #[test]
    fn test_shared_equivalence_means_equal() {
        let mut q = Ranges::default();
        let equiv: BTreeSet<_> = [n(3)].into_iter().collect();
        q.0.insert(n(1), ValueRange::same_as(n(3)).with_equiv(equiv.clone()));
        q.0.insert(n(2), ValueRange::same_as(n(3)).with_equiv(equiv));
        let mut sop = false;
        let (a, b) = (Operand::Name(n(1)), Operand::Name(n(2)));
        assert_eq!(evaluate_condition(&q, CmpOp::Le, &a, &b, true, &mut sop), Some(true));
        assert_eq!(evaluate_condition(&q, CmpOp::Ne, &a, &b, true, &mut sop), Some(false));
    }

    #[test]
    fn test_extract_compare() {
        let mut q = Ranges::default();
        q.0.insert(n(0), ValueRange::range(10, 20));
        let lhs = Operand::Name(n(0));
        let r = extract_compare(&q, CmpOp::Gt, &lhs, &Operand::Const(5), T);
        assert_eq!(r, ValueRange::singleton(1));

        let r = extract_compare(&q, CmpOp::Gt, &lhs, &Operand::Const(15), T);
        assert_eq!(r, ValueRange::range(0, 1));

        let r = extract_compare(&q, CmpOp::Gt, &lhs, &Operand::Const(15), ScalarType::boolean());
        assert!(r.is_varying());
    }

    #[test]
    fn test_overflow_dependent_answer_is_discarded() {
        let mut q = Ranges::default();
        q.0.insert(n(0), ValueRange::range(Bound::Const(1), Bound::PosInf));
        let lhs = Operand::Name(n(0));
        let mut sop = false;
        let decided = evaluate_condition(&q, CmpOp::Gt, &lhs, &Operand::Const(0), false, &mut sop);
        assert_eq!(decided, Some(true));
        assert!(sop);
        assert_eq!(
            extract_compare(&q, CmpOp::Gt, &lhs, &Operand::Const(0), T),
            ValueRange::range(0, 1)
        );
    }
}
