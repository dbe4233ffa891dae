//! The per-name range table.
//!
//! One slot per SSA name, created lazily on first query. The initial value
//! depends on where the name comes from: parameters are unknown on entry,
//! everything defined in the body starts out undefined until a definition
//! is simulated.

use crate::{
    analysis::range::{RangeQuery, ValueRange},
    config::VrpConfig,
    ir::{Function, NameOrigin, ScalarType, SsaNameId},
};

/// Ranges of every SSA name of one function.
#[derive(Debug, Clone)]
pub struct RangeTable {
    ranges: Vec<Option<ValueRange>>,
    origins: Vec<NameOrigin>,
    types: Vec<ScalarType>,
}

impl RangeTable {
    /// Creates an empty table for `func`.
    ///
    /// Types are stored as the analysis sees them under `config`, so with
    /// `strict_overflow` disabled every signed type wraps.
    #[must_use]
    pub fn new(func: &Function, config: &VrpConfig) -> Self {
        let origins = func.names().iter().map(|n| n.origin()).collect();
        let types = func
            .names()
            .iter()
            .map(|n| config.effective_type(n.ty()))
            .collect();
        Self {
            ranges: vec![None; func.name_count()],
            origins,
            types,
        }
    }

    /// Number of names in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the table has no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The stored range of `name`, if one was created.
    #[must_use]
    pub fn get(&self, name: SsaNameId) -> Option<&ValueRange> {
        self.ranges.get(name.index()).and_then(Option::as_ref)
    }

    /// The range of `name`, creating its initial value on first access.
    pub fn get_or_default(&mut self, name: SsaNameId) -> &ValueRange {
        if name.index() >= self.ranges.len() {
            self.ranges.resize(name.index() + 1, None);
        }
        let initial = self.initial(name);
        self.ranges[name.index()].get_or_insert(initial)
    }

    /// The analysis type of `name`.
    #[must_use]
    pub fn ty(&self, name: SsaNameId) -> ScalarType {
        self.types
            .get(name.index())
            .copied()
            .unwrap_or(ScalarType::float())
    }

    fn initial(&self, name: SsaNameId) -> ValueRange {
        if !self.ty(name).is_tracked() {
            return ValueRange::varying();
        }
        match self.origins.get(name.index()) {
            Some(NameOrigin::Param { nonnull: true, .. }) if self.ty(name).is_pointer() => {
                ValueRange::nonnull()
            }
            Some(NameOrigin::Param { .. }) | None => ValueRange::varying(),
            Some(NameOrigin::Uninit | NameOrigin::Defined) => ValueRange::undefined(),
        }
    }

    /// Stores `new` as the range of `name` if it differs from the current
    /// one, and reports whether it did.
    ///
    /// Moves never go back down the lattice: an undefined result, or any
    /// change to a name already varying, lands on varying.
    pub fn update(&mut self, name: SsaNameId, new: ValueRange) -> bool {
        let old = self.get_or_default(name);
        let changed = !old.same_bounds(&new) || old.equiv() != new.equiv();
        if !changed {
            return false;
        }
        let stored = if new.is_undefined() || old.is_varying() {
            ValueRange::varying()
        } else {
            new
        };
        self.ranges[name.index()] = Some(stored);
        true
    }

    /// Drops `name` to varying.
    pub fn set_varying(&mut self, name: SsaNameId) {
        if let Some(slot) = self.ranges.get_mut(name.index()) {
            *slot = Some(ValueRange::varying());
        }
    }

    /// The final range of every name, indexed by name.
    #[must_use]
    pub fn into_ranges(self) -> Vec<ValueRange> {
        let initial: Vec<ValueRange> = (0..self.ranges.len())
            .map(|i| self.initial(SsaNameId::new(i)))
            .collect();
        self.ranges
            .into_iter()
            .zip(initial)
            .map(|(stored, initial)| stored.unwrap_or(initial))
            .collect()
    }
}

impl RangeQuery for RangeTable {
    fn range_of(&self, name: SsaNameId) -> ValueRange {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| self.initial(name))
    }

    fn type_of(&self, name: SsaNameId) -> ScalarType {
        self.ty(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SsaFunctionBuilder;

    fn sample() -> Function {
        SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                let p = f.param_nonnull();
                let u = f.undef(ScalarType::i32());
                let d = f.param(ScalarType::float());
                f.block(0, |b| {
                    let y = b.add(x, u);
                    b.store(p, y);
                    b.store(p, d);
                    b.ret();
                });
            })
            .unwrap()
    }

    #[test]
    fn test_initial_ranges() {
        let func = sample();
        let table = RangeTable::new(&func, &VrpConfig::default());
        assert!(table.range_of(SsaNameId::new(0)).is_varying());
        assert!(table.range_of(SsaNameId::new(1)).is_nonnull());
        assert!(table.range_of(SsaNameId::new(2)).is_undefined());
        assert!(table.range_of(SsaNameId::new(3)).is_varying());
        assert!(table.range_of(SsaNameId::new(4)).is_undefined());
        assert!(table.get(SsaNameId::new(4)).is_none());
    }

    #[test]
    fn test_update_reports_change() {
        let func = sample();
        let mut table = RangeTable::new(&func, &VrpConfig::default());
        let y = SsaNameId::new(4);
        assert!(table.update(y, ValueRange::range(0, 5)));
        assert!(!table.update(y, ValueRange::range(0, 5)));
        assert!(table.update(y, ValueRange::range(0, 6)));
        assert_eq!(table.get(y), Some(&ValueRange::range(0, 6)));
    }

    #[test]
    fn test_update_never_leaves_varying() {
        let func = sample();
        let mut table = RangeTable::new(&func, &VrpConfig::default());
        let y = SsaNameId::new(4);
        assert!(table.update(y, ValueRange::varying()));
        assert!(table.update(y, ValueRange::range(1, 2)));
        assert!(table.range_of(y).is_varying());

        let z = SsaNameId::new(2);
        table.update(z, ValueRange::range(1, 2));
        assert!(table.update(z, ValueRange::undefined()));
        assert!(table.range_of(z).is_varying());
    }

    #[test]
    fn test_types_follow_overflow_mode() {
        let func = sample();
        let strict = RangeTable::new(&func, &VrpConfig::default());
        assert!(strict.type_of(SsaNameId::new(0)).overflow_undefined());
        let wrapping = RangeTable::new(&func, &VrpConfig::default().with_strict_overflow(false));
        assert!(!wrapping.type_of(SsaNameId::new(0)).overflow_undefined());
    }

    #[test]
    fn test_into_ranges_fills_defaults() {
        let func = sample();
        let mut table = RangeTable::new(&func, &VrpConfig::default());
        table.update(SsaNameId::new(4), ValueRange::range(3, 4));
        let ranges = table.into_ranges();
        assert_eq!(ranges.len(), func.name_count());
        assert!(ranges[1].is_nonnull());
        assert_eq!(ranges[4], ValueRange::range(3, 4));
    }
}
