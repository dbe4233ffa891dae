//! Assertion synthesis.
//!
//! Branches, switches and dereferences tell something about the values
//! flowing past them. This module turns that knowledge into explicit
//! pseudo-definitions the propagation engine can see:
//!
//! ```text
//! if (x < 10) goto bb1 else goto bb2
//! bb1:
//!   x_5 = ASSERT_EXPR <x, x < 10>
//!   ...uses of x dominated by bb1 now read x_5...
//! ```
//!
//! # Stages
//!
//! 1. **Collection**: every fact is registered at its locus (an edge, or
//!    the point after a statement), merging requests by dominance.
//! 2. **Insertion**: critical edges are split, `ASSERT` statements are
//!    added and dominated uses are renamed.
//! 3. **Removal**: after propagation the renaming is undone and the
//!    statements are deleted.
//!
//! A name is only asserted where it is live and used more than once, and
//! never when it flows through an exceptional edge into a PHI.

mod collect;
mod insert;
mod liveness;
mod locus;

pub use locus::{AssertLocus, Locus};

use log::debug;

use crate::{
    config::VrpConfig,
    ir::{BlockId, Function, Predicate, SsaNameId},
};

/// One assertion inserted into a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionRecord {
    /// The name the assertion refines.
    pub original: SsaNameId,
    /// The name the assertion defines.
    pub derived: SsaNameId,
    /// The block holding the assertion.
    pub block: BlockId,
    /// What the assertion states about `original`.
    pub predicate: Predicate,
}

/// Finds the assertions `func` supports without changing it.
#[must_use]
pub fn find_assertions(func: &Function, config: &VrpConfig) -> Vec<AssertLocus> {
    collect::find_assertions(func, config).into_loci()
}

/// Inserts every assertion `func` supports and renames dominated uses.
///
/// Returns one record per inserted assertion.
pub fn insert_assertions(func: &mut Function, config: &VrpConfig) -> Vec<AssertionRecord> {
    let registry = collect::find_assertions(func, config);
    if registry.is_empty() {
        return Vec::new();
    }
    let records = insert::materialize(func, registry.into_loci());
    debug!("inserted {} assertions into {}", records.len(), func.name());
    records
}

/// Removes every assertion from `func`, restoring the original names.
///
/// Returns the number of assertions removed.
pub fn remove_assertions(func: &mut Function) -> usize {
    insert::strip(func)
}
