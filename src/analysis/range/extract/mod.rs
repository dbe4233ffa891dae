//! Range extraction: the transfer function of every statement form.
//!
//! Extractors are pure functions from operand ranges to a result range. The
//! ranges of SSA names are read through [`RangeQuery`], so the same rules
//! serve the propagation engine and anything else holding a range table.
//!
//! PHI nodes are not handled here; joining over incoming edges and widening
//! need the engine's visit state.

mod binary;
mod cond;
mod refine;
mod unary;

pub use binary::extract_binary;
pub use cond::{evaluate_condition, extract_compare};
pub use refine::extract_assert;
pub use unary::extract_unary;

use crate::{
    analysis::range::{algebra::meet, compare::range_includes_zero, ValueRange},
    ir::{Operand, Rhs, ScalarType, SsaNameId},
};

/// Read access to the ranges and types of SSA names.
pub trait RangeQuery {
    /// The current range of `name`.
    fn range_of(&self, name: SsaNameId) -> ValueRange;

    /// The declared type of `name`.
    fn type_of(&self, name: SsaNameId) -> ScalarType;
}

impl<Q: RangeQuery + ?Sized> RangeQuery for &Q {
    fn range_of(&self, name: SsaNameId) -> ValueRange {
        (**self).range_of(name)
    }

    fn type_of(&self, name: SsaNameId) -> ScalarType {
        (**self).type_of(name)
    }
}

/// The range of an operand: a constant is a singleton.
pub fn operand_range<Q: RangeQuery + ?Sized>(query: &Q, operand: &Operand) -> ValueRange {
    match *operand {
        Operand::Const(c) => ValueRange::singleton(c),
        Operand::Name(n) => query.range_of(n),
    }
}

/// The single value an operand is known to hold, if any.
///
/// Ranges that reach their value through an overflow infinity do not count.
pub fn op_with_constant_singleton<Q: RangeQuery + ?Sized>(query: &Q, operand: &Operand) -> Option<i128> {
    match *operand {
        Operand::Const(c) => Some(c),
        Operand::Name(n) => {
            let vr = query.range_of(n);
            if vr.uses_overflow_infinity() {
                None
            } else {
                vr.single_integer()
            }
        }
    }
}

fn operand_type<Q: RangeQuery + ?Sized>(query: &Q, operand: &Operand, fallback: ScalarType) -> ScalarType {
    operand.as_name().map_or(fallback, |n| query.type_of(n))
}

/// The range of the value `rhs` computes, stored into a name of type `ty`.
///
/// With `division_traps`, a division whose divisor may be zero tells
/// nothing about its result.
pub fn extract_rhs<Q: RangeQuery + ?Sized>(
    query: &Q,
    ty: ScalarType,
    rhs: &Rhs,
    division_traps: bool,
) -> ValueRange {
    match rhs {
        Rhs::Copy(operand) => extract_copy(query, operand, ty),
        Rhs::Unary { op, operand } => {
            let from = operand_type(query, operand, ty);
            extract_unary(*op, &operand_range(query, operand), from, ty)
        }
        Rhs::Binary { op, lhs, rhs } => {
            let divisor = operand_range(query, rhs);
            if division_traps
                && op.is_division()
                && !(divisor.is_range() && range_includes_zero(&divisor, ty) == Some(false))
            {
                return ValueRange::varying();
            }
            extract_binary(*op, &operand_range(query, lhs), &divisor, ty)
        }
        Rhs::Compare { op, lhs, rhs } => extract_compare(query, *op, lhs, rhs, ty),
        Rhs::Select {
            cond,
            then_value,
            else_value,
        } => {
            let mut sop = false;
            match evaluate_condition(query, cond.op, &cond.lhs, &cond.rhs, false, &mut sop) {
                Some(true) => operand_range(query, then_value),
                Some(false) => operand_range(query, else_value),
                None => meet(
                    &operand_range(query, then_value),
                    &operand_range(query, else_value),
                    ty,
                ),
            }
        }
        Rhs::Assert { name, predicate } => extract_assert(query, *name, predicate, ty),
        Rhs::AddressOf => ValueRange::nonnull(),
        Rhs::Call { returns_nonnull, .. } if *returns_nonnull && ty.is_pointer() => {
            ValueRange::nonnull()
        }
        Rhs::Call { .. } | Rhs::Load { .. } => ValueRange::varying(),
    }
}

/// A copy takes its source's range and becomes equivalent to it. A varying
/// source is recorded symbolically.
fn extract_copy<Q: RangeQuery + ?Sized>(query: &Q, operand: &Operand, ty: ScalarType) -> ValueRange {
    let Operand::Name(source) = *operand else {
        return operand_range(query, operand);
    };
    if !ty.is_tracked() {
        return ValueRange::varying();
    }
    let source_vr = query.range_of(source);
    if source_vr.is_undefined() {
        return source_vr;
    }
    let mut result = if source_vr.is_varying() {
        ValueRange::same_as(source)
    } else {
        source_vr.clone()
    };
    result.add_equivalence(source, source_vr.equiv());
    result
}
