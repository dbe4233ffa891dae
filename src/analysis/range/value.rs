//! The value range lattice.
//!
//! ```text
//!               VARYING
//!              /       \
//!   [min, max]           ~[min, max]
//!              \       /
//!              UNDEFINED
//! ```
//!
//! A [`ValueRange`] is one element of a four-state lattice. `Range` holds
//! every value in `[min, max]`, `AntiRange` every value of the type outside
//! it. Bounds are ordered (`min <= max`) whenever both are constants; a
//! wrapped encoding `min > max` is resolved by [`ValueRange::canonical`].
//!
//! Each range also carries the set of SSA names known to hold the same value
//! at the point it describes. The set refines comparisons and is never
//! needed for soundness.

use std::{collections::BTreeSet, fmt};

use crate::{
    analysis::range::Bound,
    ir::{ScalarType, SsaNameId},
};

/// The lattice state of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum RangeKind {
    /// No value reaches this point yet.
    #[strum(to_string = "UNDEFINED")]
    Undefined,
    /// Values in `[min, max]`.
    #[strum(to_string = "RANGE")]
    Range,
    /// Values outside `[min, max]`.
    #[strum(to_string = "ANTI_RANGE")]
    AntiRange,
    /// Any value of the type.
    #[strum(to_string = "VARYING")]
    Varying,
}

/// A value range with its equivalence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    kind: RangeKind,
    min: Bound,
    max: Bound,
    equiv: BTreeSet<SsaNameId>,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::undefined()
    }
}

impl ValueRange {
    /// The lattice bottom.
    #[must_use]
    pub const fn undefined() -> Self {
        Self::bare(RangeKind::Undefined, Bound::Const(0), Bound::Const(0))
    }

    /// The lattice top.
    #[must_use]
    pub const fn varying() -> Self {
        Self::bare(RangeKind::Varying, Bound::Const(0), Bound::Const(0))
    }

    const fn bare(kind: RangeKind, min: Bound, max: Bound) -> Self {
        Self {
            kind,
            min,
            max,
            equiv: BTreeSet::new(),
        }
    }

    /// `[min, max]`, stored as given.
    ///
    /// Debug builds check that constant bounds are ordered.
    #[must_use]
    pub fn range(min: impl Into<Bound>, max: impl Into<Bound>) -> Self {
        let vr = Self::bare(RangeKind::Range, min.into(), max.into());
        vr.debug_check();
        vr
    }

    /// `~[min, max]`, stored as given.
    #[must_use]
    pub fn anti(min: impl Into<Bound>, max: impl Into<Bound>) -> Self {
        let vr = Self::bare(RangeKind::AntiRange, min.into(), max.into());
        vr.debug_check();
        vr
    }

    /// The single value `value`.
    #[must_use]
    pub const fn singleton(value: i128) -> Self {
        Self::bare(RangeKind::Range, Bound::Const(value), Bound::Const(value))
    }

    /// `~[0, 0]`.
    #[must_use]
    pub const fn nonnull() -> Self {
        Self::bare(RangeKind::AntiRange, Bound::Const(0), Bound::Const(0))
    }

    /// `[0, 0]`.
    #[must_use]
    pub const fn null() -> Self {
        Self::singleton(0)
    }

    /// Exactly the value of another name.
    #[must_use]
    pub fn same_as(name: SsaNameId) -> Self {
        Self::bare(RangeKind::Range, Bound::name(name), Bound::name(name))
    }

    /// The whole of `ty` as a range, `[min, max]`.
    #[must_use]
    pub fn full(ty: ScalarType) -> Self {
        Self::bare(
            RangeKind::Range,
            Bound::Const(ty.min_value()),
            Bound::Const(ty.max_value()),
        )
    }

    /// Builds a range of `kind` over `[min, max]` in normal form.
    ///
    /// - A constant pair with `min > max` wraps: it denotes the complement of
    ///   `[max + 1, min - 1]`, so the kind flips. `[c + 1, c]` is empty and
    ///   becomes varying.
    /// - An anti-range touching one type extreme is rewritten as a range,
    ///   except `~[0, 0]` in an unsigned type. One touching both extremes
    ///   becomes varying.
    /// - A range covering the whole type, with or without overflow
    ///   infinities, becomes varying.
    ///
    /// Symbolic pairs are kept as given.
    #[must_use]
    pub fn canonical(kind: RangeKind, min: Bound, max: Bound, ty: ScalarType) -> Self {
        let (mut kind, mut min, mut max) = (kind, min, max);
        match kind {
            RangeKind::Undefined => return Self::undefined(),
            RangeKind::Varying => return Self::varying(),
            RangeKind::Range | RangeKind::AntiRange => {}
        }
        if min.is_symbolic() || max.is_symbolic() {
            return Self::bare(kind, min, max);
        }

        let (Some(lo), Some(hi)) = (min.concrete(ty), max.concrete(ty)) else {
            return Self::varying();
        };
        if hi < lo {
            let (Bound::Const(_), Bound::Const(_)) = (min, max) else {
                return Self::varying();
            };
            let (new_min, new_max) = (hi + 1, lo - 1);
            if new_max < new_min {
                return Self::varying();
            }
            min = Bound::Const(new_min);
            max = Bound::Const(new_max);
            kind = match kind {
                RangeKind::Range => RangeKind::AntiRange,
                _ => RangeKind::Range,
            };
        }

        if kind == RangeKind::AntiRange {
            let is_min = min.is_min(ty);
            let is_max = max.is_max(ty);
            if is_min && is_max {
                return Self::varying();
            } else if is_min && !(ty.is_unsigned() && max.is_zero()) {
                let Some(next) = max.concrete(ty).map(|v| v + 1) else {
                    return Self::varying();
                };
                min = Bound::Const(next);
                max = Bound::Const(ty.max_value());
                kind = RangeKind::Range;
            } else if is_max {
                let Some(prev) = min.concrete(ty).map(|v| v - 1) else {
                    return Self::varying();
                };
                max = Bound::Const(prev);
                min = Bound::Const(ty.min_value());
                kind = RangeKind::Range;
            }
        }

        if kind == RangeKind::Range && min.is_min(ty) && max.is_max(ty) {
            return Self::varying();
        }
        Self::bare(kind, min, max)
    }

    fn debug_check(&self) {
        if let (Bound::Const(lo), Bound::Const(hi)) = (self.min, self.max) {
            debug_assert!(lo <= hi, "malformed range [{lo}, {hi}]");
        }
        debug_assert!(
            !matches!(self.min, Bound::PosInf) && !matches!(self.max, Bound::NegInf),
            "inverted overflow infinity in {self}"
        );
    }

    /// The lattice state.
    #[must_use]
    pub const fn kind(&self) -> RangeKind {
        self.kind
    }

    /// Lower bound; meaningful for ranges and anti-ranges only.
    #[must_use]
    pub const fn min(&self) -> Bound {
        self.min
    }

    /// Upper bound; meaningful for ranges and anti-ranges only.
    #[must_use]
    pub const fn max(&self) -> Bound {
        self.max
    }

    /// Names known to hold the same value.
    #[must_use]
    pub fn equiv(&self) -> &BTreeSet<SsaNameId> {
        &self.equiv
    }

    /// Mutable access to the equivalence set.
    pub fn equiv_mut(&mut self) -> &mut BTreeSet<SsaNameId> {
        &mut self.equiv
    }

    /// Replaces the equivalence set.
    #[must_use]
    pub fn with_equiv(mut self, equiv: BTreeSet<SsaNameId>) -> Self {
        if matches!(self.kind, RangeKind::Range | RangeKind::AntiRange) {
            self.equiv = equiv;
        }
        self
    }

    /// Records that `name` holds this value, along with every name already
    /// known equivalent to it.
    pub fn add_equivalence(&mut self, name: SsaNameId, known: &BTreeSet<SsaNameId>) {
        self.equiv.insert(name);
        self.equiv.extend(known.iter().copied());
    }

    /// Whether this is the lattice bottom.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self.kind, RangeKind::Undefined)
    }

    /// Whether this is the lattice top.
    #[must_use]
    pub const fn is_varying(&self) -> bool {
        matches!(self.kind, RangeKind::Varying)
    }

    /// Whether this is an interval.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        matches!(self.kind, RangeKind::Range)
    }

    /// Whether this is a complemented interval.
    #[must_use]
    pub const fn is_anti_range(&self) -> bool {
        matches!(self.kind, RangeKind::AntiRange)
    }

    /// Whether this is an interval or a complemented interval.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        matches!(self.kind, RangeKind::Range | RangeKind::AntiRange)
    }

    /// Whether this is exactly `~[0, 0]`.
    #[must_use]
    pub const fn is_nonnull(&self) -> bool {
        self.is_anti_range() && self.min.is_zero() && self.max.is_zero()
    }

    /// Whether this is exactly `[0, 0]`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.is_range() && self.min.is_zero() && self.max.is_zero()
    }

    /// The value of a single-integer range.
    #[must_use]
    pub fn single_integer(&self) -> Option<i128> {
        match (self.kind, self.min, self.max) {
            (RangeKind::Range, Bound::Const(lo), Bound::Const(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    /// Whether either bound refers to another name.
    #[must_use]
    pub const fn is_symbolic(&self) -> bool {
        self.is_bounded() && (self.min.is_symbolic() || self.max.is_symbolic())
    }

    /// Whether either bound is an overflow infinity.
    #[must_use]
    pub const fn uses_overflow_infinity(&self) -> bool {
        self.is_bounded() && (self.min.is_overflow_infinity() || self.max.is_overflow_infinity())
    }

    /// The bounds of a non-symbolic range or anti-range as plain values of
    /// `ty`, overflow infinities mapped to the type extremes.
    #[must_use]
    pub fn const_bounds(&self, ty: ScalarType) -> Option<(i128, i128)> {
        if !self.is_bounded() {
            return None;
        }
        Some((self.min.concrete(ty)?, self.max.concrete(ty)?))
    }

    /// Whether the concrete value `value` of type `ty` may be described by
    /// this range. Symbolic ranges answer `true`.
    #[must_use]
    pub fn contains_value(&self, value: i128, ty: ScalarType) -> bool {
        match self.kind {
            RangeKind::Undefined => false,
            RangeKind::Varying => true,
            RangeKind::Range | RangeKind::AntiRange => {
                let Some((lo, hi)) = self.const_bounds(ty) else {
                    return true;
                };
                let inside = lo <= value && value <= hi;
                inside == self.is_range()
            }
        }
    }

    /// Whether every value in the range is non-negative.
    #[must_use]
    pub fn is_nonnegative(&self, ty: ScalarType) -> bool {
        if ty.is_unsigned() {
            return self.is_bounded() || self.is_varying();
        }
        self.is_range() && self.min.concrete(ty).is_some_and(|lo| lo >= 0)
    }

    /// Compares kind and bounds, ignoring equivalences.
    #[must_use]
    pub fn same_bounds(&self, other: &Self) -> bool {
        self.kind == other.kind
            && (!self.is_bounded() || (self.min == other.min && self.max == other.max))
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RangeKind::Undefined => write!(f, "UNDEFINED")?,
            RangeKind::Varying => write!(f, "VARYING")?,
            RangeKind::Range => write!(f, "[{}, {}]", self.min, self.max)?,
            RangeKind::AntiRange => write!(f, "~[{}, {}]", self.min, self.max)?,
        }
        if !self.equiv.is_empty() {
            write!(f, "  EQUIVALENCES: {{ ")?;
            for name in &self.equiv {
                write!(f, "{name} ")?;
            }
            write!(f, "}} ({} elements)", self.equiv.len())?;
        }
        Ok(())
    }
}
