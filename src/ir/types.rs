//! Scalar types and their numeric properties.
//!
//! [`ScalarType`] answers every question the range analysis asks about a
//! type: its precision, signedness, the representable extremes, and whether
//! arithmetic overflow wraps or is undefined. Constants are carried as
//! `i128`, which holds every value of every supported type (precisions up
//! to 64 bits) and every exact sum, difference or product of two of them
//! except the largest unsigned products.

use std::fmt;

use crate::{Error, Result};

/// The family a scalar type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TypeKind {
    /// Fixed-width two's complement integer.
    #[strum(to_string = "int")]
    Integer,
    /// One-bit truth value; behaves as an unsigned 1-bit integer.
    #[strum(to_string = "bool")]
    Boolean,
    /// Address. Only nullness is tracked.
    #[strum(to_string = "ptr")]
    Pointer,
    /// Floating point. Never tracked.
    #[strum(to_string = "float")]
    Float,
}

/// A scalar type as seen by the analysis.
///
/// # Examples
///
/// ```rust,ignore
/// use rangescope::ir::ScalarType;
///
/// let t = ScalarType::i8();
/// assert_eq!(t.min_value(), -128);
/// assert_eq!(t.wrap(130), -126);
/// assert!(t.overflow_undefined());
/// assert!(!ScalarType::u8().overflow_undefined());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarType {
    kind: TypeKind,
    precision: u32,
    signed: bool,
    wraps: bool,
}

impl ScalarType {
    /// Builds an integer type of the given precision.
    ///
    /// Unsigned types always wrap on overflow; signed types start with
    /// undefined overflow (see [`ScalarType::wrapping`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPrecision`] unless `1 <= precision <= 64`.
    pub fn int(precision: u32, signed: bool) -> Result<Self> {
        if precision == 0 || precision > 64 {
            return Err(Error::UnsupportedPrecision(precision));
        }
        Ok(Self {
            kind: TypeKind::Integer,
            precision,
            signed,
            wraps: !signed,
        })
    }

    const fn fixed(precision: u32, signed: bool) -> Self {
        Self {
            kind: TypeKind::Integer,
            precision,
            signed,
            wraps: !signed,
        }
    }

    /// `int8_t`.
    #[must_use]
    pub const fn i8() -> Self {
        Self::fixed(8, true)
    }

    /// `int16_t`.
    #[must_use]
    pub const fn i16() -> Self {
        Self::fixed(16, true)
    }

    /// `int32_t`.
    #[must_use]
    pub const fn i32() -> Self {
        Self::fixed(32, true)
    }

    /// `int64_t`.
    #[must_use]
    pub const fn i64() -> Self {
        Self::fixed(64, true)
    }

    /// `uint8_t`.
    #[must_use]
    pub const fn u8() -> Self {
        Self::fixed(8, false)
    }

    /// `uint16_t`.
    #[must_use]
    pub const fn u16() -> Self {
        Self::fixed(16, false)
    }

    /// `uint32_t`.
    #[must_use]
    pub const fn u32() -> Self {
        Self::fixed(32, false)
    }

    /// `uint64_t`.
    #[must_use]
    pub const fn u64() -> Self {
        Self::fixed(64, false)
    }

    /// The one-bit boolean type.
    #[must_use]
    pub const fn boolean() -> Self {
        Self {
            kind: TypeKind::Boolean,
            precision: 1,
            signed: false,
            wraps: true,
        }
    }

    /// A 64-bit pointer.
    #[must_use]
    pub const fn pointer() -> Self {
        Self {
            kind: TypeKind::Pointer,
            precision: 64,
            signed: false,
            wraps: true,
        }
    }

    /// A 64-bit floating point type.
    #[must_use]
    pub const fn float() -> Self {
        Self {
            kind: TypeKind::Float,
            precision: 64,
            signed: true,
            wraps: false,
        }
    }

    /// Returns the same type with wrapping (`-fwrapv`) overflow semantics.
    #[must_use]
    pub const fn wrapping(self) -> Self {
        Self { wraps: true, ..self }
    }

    /// The type family.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Width in bits.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }

    /// Whether values are two's complement signed.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Whether values are unsigned.
    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        !self.signed
    }

    /// Whether this is a pointer type.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer)
    }

    /// Whether this is an integer or boolean type.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(self.kind, TypeKind::Integer | TypeKind::Boolean)
    }

    /// Whether the analysis computes ranges for values of this type.
    #[must_use]
    pub const fn is_tracked(&self) -> bool {
        !matches!(self.kind, TypeKind::Float)
    }

    /// Whether overflow wraps modulo `2^precision`.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        self.wraps
    }

    /// Whether overflow is undefined behaviour, licensing the analysis to
    /// assume it never happens.
    #[must_use]
    pub const fn overflow_undefined(&self) -> bool {
        self.is_integral() && self.signed && !self.wraps
    }

    /// Smallest representable value.
    #[must_use]
    pub const fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.precision - 1))
        } else {
            0
        }
    }

    /// Largest representable value.
    #[must_use]
    pub const fn max_value(&self) -> i128 {
        if self.signed {
            (1i128 << (self.precision - 1)) - 1
        } else {
            (1i128 << self.precision) - 1
        }
    }

    /// Returns `true` if `value` is representable without truncation.
    #[must_use]
    pub const fn fits(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Truncates a mathematical integer to this type, as a conversion would.
    #[must_use]
    pub const fn wrap(&self, value: i128) -> i128 {
        let modulus = 1i128 << self.precision;
        let low = value.rem_euclid(modulus);
        if self.signed && low > self.max_value() {
            low - modulus
        } else {
            low
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Integer => {
                let prefix = if self.signed { 'i' } else { 'u' };
                write!(f, "{prefix}{}", self.precision)?;
                if self.signed && self.wraps {
                    write!(f, "(wrapv)")?;
                }
                Ok(())
            }
            kind => write!(f, "{kind}"),
        }
    }
}
