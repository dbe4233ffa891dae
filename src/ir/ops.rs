//! Operators, operands and predicates.
//!
//! # Operator Families
//!
//! - [`UnaryOp`] - conversions, negation, bitwise and truth negation, absolute value
//! - [`BinaryOp`] - arithmetic, the division and modulo family, shifts, min/max, bitwise
//! - [`CmpOp`] - the six relational comparisons
//!
//! Constant folding lives here too, since the analysis folds statements whose
//! operands are all known constants before reasoning about ranges.

use std::fmt;

use strum::{Display, EnumIter};

use crate::ir::{ScalarType, SsaNameId};

/// An operand: an SSA name or an integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// The current value of an SSA name.
    Name(SsaNameId),
    /// An integer literal, already truncated to the type of its use.
    Const(i128),
}

impl Operand {
    /// The name, if this operand is one.
    #[must_use]
    pub const fn as_name(&self) -> Option<SsaNameId> {
        match self {
            Operand::Name(n) => Some(*n),
            Operand::Const(_) => None,
        }
    }

    /// The literal, if this operand is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<i128> {
        match self {
            Operand::Const(c) => Some(*c),
            Operand::Name(_) => None,
        }
    }
}

impl From<SsaNameId> for Operand {
    fn from(name: SsaNameId) -> Self {
        Operand::Name(name)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Const(i128::from(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Const(i128::from(value))
    }
}

impl From<i128> for Operand {
    fn from(value: i128) -> Self {
        Operand::Const(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Name(n) => write!(f, "{n}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum UnaryOp {
    /// Integer or pointer conversion to the destination type.
    #[strum(to_string = "(convert)")]
    Convert,
    /// Arithmetic negation.
    #[strum(to_string = "-")]
    Negate,
    /// Bitwise complement.
    #[strum(to_string = "~")]
    BitNot,
    /// Absolute value.
    #[strum(to_string = "abs")]
    Abs,
    /// Logical negation of a boolean.
    #[strum(to_string = "!")]
    TruthNot,
    /// Float to integer conversion.
    #[strum(to_string = "(fix_trunc)")]
    FloatToInt,
    /// Integer to float conversion.
    #[strum(to_string = "(float)")]
    IntToFloat,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BinaryOp {
    /// Addition.
    #[strum(to_string = "+")]
    Add,
    /// Subtraction.
    #[strum(to_string = "-")]
    Sub,
    /// Multiplication.
    #[strum(to_string = "*")]
    Mul,
    /// Division rounding toward zero.
    #[strum(to_string = "/")]
    TruncDiv,
    /// Division rounding toward negative infinity.
    #[strum(to_string = "/[fl]")]
    FloorDiv,
    /// Division rounding toward positive infinity.
    #[strum(to_string = "/[cl]")]
    CeilDiv,
    /// Division rounding to nearest, ties away from zero.
    #[strum(to_string = "/[rd]")]
    RoundDiv,
    /// Division known to be exact.
    #[strum(to_string = "/[ex]")]
    ExactDiv,
    /// Remainder of truncating division.
    #[strum(to_string = "%")]
    TruncMod,
    /// Left shift.
    #[strum(to_string = "<<")]
    Shl,
    /// Right shift, arithmetic for signed types.
    #[strum(to_string = ">>")]
    Shr,
    /// Minimum.
    #[strum(to_string = "min")]
    Min,
    /// Maximum.
    #[strum(to_string = "max")]
    Max,
    /// Bitwise and.
    #[strum(to_string = "&")]
    BitAnd,
    /// Bitwise inclusive or.
    #[strum(to_string = "|")]
    BitOr,
    /// Bitwise exclusive or.
    #[strum(to_string = "^")]
    BitXor,
    /// Pointer plus integer offset.
    #[strum(to_string = "p+")]
    PointerPlus,
}

impl BinaryOp {
    /// Whether this is one of the division operators.
    #[must_use]
    pub const fn is_division(self) -> bool {
        matches!(
            self,
            BinaryOp::TruncDiv
                | BinaryOp::FloorDiv
                | BinaryOp::CeilDiv
                | BinaryOp::RoundDiv
                | BinaryOp::ExactDiv
        )
    }

    /// Computes `lhs op rhs` exactly, before any truncation to a type.
    ///
    /// Returns `None` when the operation has no defined result (division by
    /// zero, shift amounts outside the type) or the exact value does not fit
    /// the intermediate representation.
    #[must_use]
    pub fn apply_exact(self, lhs: i128, rhs: i128, ty: ScalarType) -> Option<i128> {
        match self {
            BinaryOp::Add | BinaryOp::PointerPlus => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            BinaryOp::TruncDiv | BinaryOp::ExactDiv => lhs.checked_div(rhs),
            BinaryOp::FloorDiv => {
                let q = lhs.checked_div(rhs)?;
                let r = lhs.checked_rem(rhs)?;
                Some(if r != 0 && ((r < 0) != (rhs < 0)) { q - 1 } else { q })
            }
            BinaryOp::CeilDiv => {
                let q = lhs.checked_div(rhs)?;
                let r = lhs.checked_rem(rhs)?;
                Some(if r != 0 && ((r < 0) == (rhs < 0)) { q + 1 } else { q })
            }
            BinaryOp::RoundDiv => {
                let q = lhs.checked_div(rhs)?;
                let r = lhs.checked_rem(rhs)?;
                if r.checked_abs()?.checked_mul(2)? >= rhs.checked_abs()? {
                    Some(if (lhs < 0) == (rhs < 0) { q + 1 } else { q - 1 })
                } else {
                    Some(q)
                }
            }
            BinaryOp::TruncMod => lhs.checked_rem(rhs),
            BinaryOp::Shl => {
                let amount = shift_amount(rhs, ty)?;
                lhs.checked_mul(1i128 << amount)
            }
            BinaryOp::Shr => {
                let amount = shift_amount(rhs, ty)?;
                Some(lhs >> amount)
            }
            BinaryOp::Min => Some(lhs.min(rhs)),
            BinaryOp::Max => Some(lhs.max(rhs)),
            BinaryOp::BitAnd => Some(lhs & rhs),
            BinaryOp::BitOr => Some(lhs | rhs),
            BinaryOp::BitXor => Some(lhs ^ rhs),
        }
    }

    /// Folds `lhs op rhs` in type `ty`.
    ///
    /// Wrapping types truncate the exact result. For types with undefined
    /// overflow an out-of-range result does not fold.
    #[must_use]
    pub fn fold(self, lhs: i128, rhs: i128, ty: ScalarType) -> Option<i128> {
        let exact = self.apply_exact(lhs, rhs, ty)?;
        if ty.fits(exact) {
            Some(exact)
        } else if ty.wraps() || matches!(self, BinaryOp::Shl) {
            Some(ty.wrap(exact))
        } else {
            None
        }
    }
}

fn shift_amount(rhs: i128, ty: ScalarType) -> Option<u32> {
    u32::try_from(rhs).ok().filter(|&s| s < ty.precision())
}

impl UnaryOp {
    /// Folds `op operand` from `from` into `to`.
    #[must_use]
    pub fn fold(self, operand: i128, from: ScalarType, to: ScalarType) -> Option<i128> {
        let exact = match self {
            UnaryOp::Convert => return Some(to.wrap(operand)),
            UnaryOp::Negate => operand.checked_neg()?,
            UnaryOp::BitNot => !operand,
            UnaryOp::Abs => operand.checked_abs()?,
            UnaryOp::TruthNot => i128::from(operand == 0),
            UnaryOp::FloatToInt | UnaryOp::IntToFloat => return None,
        };
        if to.fits(exact) {
            Some(exact)
        } else if from.wraps() {
            Some(to.wrap(exact))
        } else {
            None
        }
    }
}

/// Relational comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CmpOp {
    /// `<`
    #[strum(to_string = "<")]
    Lt,
    /// `<=`
    #[strum(to_string = "<=")]
    Le,
    /// `>`
    #[strum(to_string = ">")]
    Gt,
    /// `>=`
    #[strum(to_string = ">=")]
    Ge,
    /// `==`
    #[strum(to_string = "==")]
    Eq,
    /// `!=`
    #[strum(to_string = "!=")]
    Ne,
}

impl CmpOp {
    /// The operator that gives the same answer with the operands exchanged.
    #[must_use]
    pub const fn swap(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
        }
    }

    /// The logical negation.
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
        }
    }

    /// Evaluates the comparison on two integers.
    #[must_use]
    pub const fn eval(self, lhs: i128, rhs: i128) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

/// A comparison between two operands, as tested by a branch or a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    /// The comparison.
    pub op: CmpOp,
    /// Left operand.
    pub lhs: Operand,
    /// Right operand.
    pub rhs: Operand,
}

impl Condition {
    /// Builds a condition.
    pub fn new(op: CmpOp, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        Self {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    /// The same condition, negated.
    #[must_use]
    pub const fn inverted(self) -> Self {
        Self {
            op: self.op.invert(),
            ..self
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// The fact an assertion states about its subject name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `name op limit`.
    Compare {
        /// The relation.
        op: CmpOp,
        /// The other side; a constant or another SSA name.
        limit: Operand,
    },
    /// `low <= name <= high`, or its complement when `negated`.
    ///
    /// Produced by range tests such as `(unsigned)(x - 3) <= 7`.
    Within {
        /// Inclusive lower bound.
        low: i128,
        /// Inclusive upper bound.
        high: i128,
        /// The name lies outside `[low, high]` instead.
        negated: bool,
    },
}

impl Predicate {
    /// The SSA name the predicate compares against, if any.
    #[must_use]
    pub const fn limit_name(&self) -> Option<SsaNameId> {
        match self {
            Predicate::Compare { limit, .. } => limit.as_name(),
            Predicate::Within { .. } => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { op, limit } => write!(f, "{op} {limit}"),
            Predicate::Within {
                low,
                high,
                negated: false,
            } => write!(f, "in [{low}, {high}]"),
            Predicate::Within {
                low,
                high,
                negated: true,
            } => write!(f, "not in [{low}, {high}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_cmp_swap_and_invert() {
        for op in CmpOp::iter() {
            assert_eq!(op.swap().swap(), op);
            assert_eq!(op.invert().invert(), op);
            for (a, b) in [(1, 2), (2, 2), (3, 2)] {
                assert_eq!(op.eval(a, b), op.swap().eval(b, a));
                assert_eq!(op.eval(a, b), !op.invert().eval(a, b));
            }
        }
    }

    #[test]
    fn test_division_rounding() {
        let t = ScalarType::i32();
        assert_eq!(BinaryOp::TruncDiv.fold(-7, 2, t), Some(-3));
        assert_eq!(BinaryOp::FloorDiv.fold(-7, 2, t), Some(-4));
        assert_eq!(BinaryOp::CeilDiv.fold(7, 2, t), Some(4));
        assert_eq!(BinaryOp::CeilDiv.fold(-7, 2, t), Some(-3));
        assert_eq!(BinaryOp::RoundDiv.fold(7, 2, t), Some(4));
        assert_eq!(BinaryOp::RoundDiv.fold(5, 3, t), Some(2));
        assert_eq!(BinaryOp::TruncMod.fold(-7, 2, t), Some(-1));
        assert_eq!(BinaryOp::TruncDiv.fold(1, 0, t), None);
    }

    #[test]
    fn test_fold_overflow() {
        let s = ScalarType::i8();
        assert_eq!(BinaryOp::Add.fold(127, 1, s), None);
        assert_eq!(BinaryOp::Add.fold(127, 1, s.wrapping()), Some(-128));
        assert_eq!(BinaryOp::Add.fold(255, 1, ScalarType::u8()), Some(0));
        assert_eq!(BinaryOp::Shl.fold(1, 8, ScalarType::u8()), None);
        assert_eq!(BinaryOp::Shl.fold(3, 7, ScalarType::u8()), Some(128));
    }

    #[test]
    fn test_unary_fold() {
        let s = ScalarType::i8();
        assert_eq!(UnaryOp::Negate.fold(-128, s, s), None);
        assert_eq!(UnaryOp::Convert.fold(300, ScalarType::i32(), ScalarType::u8()), Some(44));
        assert_eq!(UnaryOp::BitNot.fold(0, ScalarType::u8(), ScalarType::u8()), Some(255));
        assert_eq!(UnaryOp::TruthNot.fold(0, ScalarType::boolean(), ScalarType::boolean()), Some(1));
    }
}
