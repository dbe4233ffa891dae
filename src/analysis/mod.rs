//! Value range analysis over SSA functions.
//!
//! # Architecture
//!
//! The analysis module is organized into focused sub-modules:
//!
//! - [`range`] - The value-range lattice, the comparator, transfer functions
//!   for every operation, and the meet/intersect algebra
//! - [`assert`] - Assertion synthesis: turns branch conditions and
//!   dereferences into explicit `ASSERT` definitions
//! - [`propagate`] - The sparse worklist engine and the pass driver
//!
//! # Usage
//!
//! ```rust
//! use rangescope::analysis::{extract_binary, meet, ValueRange};
//! use rangescope::ir::{BinaryOp, ScalarType};
//!
//! let ty = ScalarType::i32();
//! let sum = extract_binary(
//!     BinaryOp::Add,
//!     &ValueRange::range(1, 10),
//!     &ValueRange::range(100, 200),
//!     ty,
//! );
//! assert_eq!(sum, ValueRange::range(101, 210));
//!
//! let joined = meet(&ValueRange::range(0, 5), &ValueRange::range(20, 30), ty);
//! assert_eq!(joined, ValueRange::range(0, 30));
//! ```

pub mod assert;
pub mod propagate;
pub mod range;

pub use assert::{
    find_assertions, insert_assertions, remove_assertions, AssertLocus, AssertionRecord, Locus,
};
pub use propagate::{
    Direction, Evolution, InductionScev, NoScev, RangeResult, RangeTable, ScevOracle,
    ValueRangePropagation,
};
pub use range::{
    compare_range_with_value, compare_ranges, compare_values, evaluate_condition, extract_assert,
    extract_binary, extract_compare, extract_unary, intersect, meet, Bound, RangeKind, RangeQuery,
    ValueOrder, ValueRange,
};
