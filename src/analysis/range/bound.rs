//! Range endpoints.
//!
//! A [`Bound`] is either a plain constant, a symbolic `name + offset`, or one
//! of the two overflow infinities. The infinities denote the extreme values
//! of a type whose signed overflow is undefined; they mark a bound that is
//! only valid because the analysis assumed overflow cannot happen, so any
//! decision reached through one must be reported as depending on that
//! assumption.

use std::fmt;

use crate::ir::{ScalarType, SsaNameId};

/// One endpoint of a value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    /// The type minimum, reached by assuming no signed overflow.
    NegInf,
    /// A known constant.
    Const(i128),
    /// `name + offset`, the run-time value of another SSA name shifted by a
    /// constant. An offset of zero is the bare name.
    Symbolic {
        /// The base name.
        name: SsaNameId,
        /// Constant displacement.
        offset: i128,
    },
    /// The type maximum, reached by assuming no signed overflow.
    PosInf,
}

impl Bound {
    /// A bare symbolic name.
    #[must_use]
    pub const fn name(name: SsaNameId) -> Self {
        Bound::Symbolic { name, offset: 0 }
    }

    /// The negative extreme of `ty`: an overflow infinity where the type
    /// supports one, its minimum value otherwise.
    #[must_use]
    pub const fn negative_extreme(ty: ScalarType) -> Self {
        if ty.overflow_undefined() {
            Bound::NegInf
        } else {
            Bound::Const(ty.min_value())
        }
    }

    /// The positive extreme of `ty`.
    #[must_use]
    pub const fn positive_extreme(ty: ScalarType) -> Self {
        if ty.overflow_undefined() {
            Bound::PosInf
        } else {
            Bound::Const(ty.max_value())
        }
    }

    /// The constant, if this is a plain constant.
    #[must_use]
    pub const fn as_const(&self) -> Option<i128> {
        match self {
            Bound::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// The value in `ty`, mapping overflow infinities to the type extremes.
    /// `None` for symbolic bounds.
    #[must_use]
    pub const fn concrete(&self, ty: ScalarType) -> Option<i128> {
        match self {
            Bound::NegInf => Some(ty.min_value()),
            Bound::Const(c) => Some(*c),
            Bound::PosInf => Some(ty.max_value()),
            Bound::Symbolic { .. } => None,
        }
    }

    /// Whether the bound is a compile-time constant (infinities included).
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        !matches!(self, Bound::Symbolic { .. })
    }

    /// Whether the bound refers to another name.
    #[must_use]
    pub const fn is_symbolic(&self) -> bool {
        matches!(self, Bound::Symbolic { .. })
    }

    /// Whether this is one of the overflow infinities.
    #[must_use]
    pub const fn is_overflow_infinity(&self) -> bool {
        matches!(self, Bound::NegInf | Bound::PosInf)
    }

    /// Whether the bound equals the minimum of `ty`.
    #[must_use]
    pub fn is_min(&self, ty: ScalarType) -> bool {
        self.concrete(ty) == Some(ty.min_value())
    }

    /// Whether the bound equals the maximum of `ty`.
    #[must_use]
    pub fn is_max(&self, ty: ScalarType) -> bool {
        self.concrete(ty) == Some(ty.max_value())
    }

    /// The symbolic base name.
    #[must_use]
    pub const fn base_name(&self) -> Option<SsaNameId> {
        match self {
            Bound::Symbolic { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Displaces a constant or symbolic bound by `delta`.
    ///
    /// Returns `None` for infinities, and when a constant result leaves `ty`.
    #[must_use]
    pub fn offset_by(&self, delta: i128, ty: ScalarType) -> Option<Bound> {
        match *self {
            Bound::Const(c) => c
                .checked_add(delta)
                .filter(|v| ty.fits(*v))
                .map(Bound::Const),
            Bound::Symbolic { name, offset } => offset
                .checked_add(delta)
                .map(|offset| Bound::Symbolic { name, offset }),
            Bound::NegInf | Bound::PosInf => None,
        }
    }

    /// Whether the bound is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        matches!(self, Bound::Const(0))
    }
}

impl From<i128> for Bound {
    fn from(value: i128) -> Self {
        Bound::Const(value)
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Const(i128::from(value))
    }
}

impl From<i32> for Bound {
    fn from(value: i32) -> Self {
        Bound::Const(i128::from(value))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-INF(OVF)"),
            Bound::PosInf => write!(f, "+INF(OVF)"),
            Bound::Const(c) => write!(f, "{c}"),
            Bound::Symbolic { name, offset: 0 } => write!(f, "{name}"),
            Bound::Symbolic { name, offset } if *offset < 0 => {
                write!(f, "{name} - {}", offset.unsigned_abs())
            }
            Bound::Symbolic { name, offset } => write!(f, "{name} + {offset}"),
        }
    }
}
