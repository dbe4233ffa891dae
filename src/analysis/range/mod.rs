//! Value ranges and the operations over them.
//!
//! This module holds everything about ranges that does not depend on where
//! in a program they come from: the lattice element itself, bound
//! comparison, meet and intersection, and the transfer rules that compute
//! the range of an expression from the ranges of its operands.
//!
//! # Architecture
//!
//! - [`bound`] - Range endpoints: constants, `name + offset`, overflow infinities
//! - [`value`] - The four-state [`ValueRange`] lattice element
//! - [`compare`] - Three-valued bound and range comparison
//! - [`algebra`] - [`meet`] and [`intersect`]
//! - [`extract`] - Per-operator range extraction
//!
//! # Example
//!
//! ```rust
//! use rangescope::analysis::{extract_binary, meet, ValueRange};
//! use rangescope::ir::{BinaryOp, ScalarType};
//!
//! let ty = ScalarType::i32();
//! let sum = extract_binary(BinaryOp::Add, &ValueRange::range(1, 5), &ValueRange::range(10, 20), ty);
//! assert_eq!(sum.to_string(), "[11, 25]");
//!
//! let joined = meet(&ValueRange::range(1, 5), &ValueRange::anti(0, 0), ty);
//! assert!(joined.is_nonnull());
//! ```

pub mod algebra;
pub mod bound;
pub mod compare;
pub mod extract;
pub mod value;

pub use algebra::{intersect, meet};
pub use bound::Bound;
pub use compare::{
    compare_range_with_value, compare_ranges, compare_values, compare_values_warnv,
    operand_less, range_includes_zero, ranges_intersect, value_inside_range, ValueOrder,
};
pub use extract::{
    evaluate_condition, extract_assert, extract_binary, extract_compare, extract_unary,
    op_with_constant_singleton, operand_range, RangeQuery,
};
pub use value::{RangeKind, ValueRange};
