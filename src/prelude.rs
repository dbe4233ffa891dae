//! # rangescope Prelude
//!
//! The types needed to build a function, run the analysis and read its
//! results, importable with one glob.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all rangescope operations
pub use crate::Error;

/// The result type used throughout rangescope
pub use crate::Result;

/// Analysis switches
pub use crate::config::VrpConfig;

// ================================================================================================
// Program Representation
// ================================================================================================

pub use crate::ir::{
    BinaryOp, BlockId, CmpOp, EdgeId, Function, Operand, Predicate, ScalarType,
    SsaFunctionBuilder, SsaNameId, UnaryOp,
};

// ================================================================================================
// Range Lattice
// ================================================================================================

pub use crate::analysis::{
    extract_binary, extract_unary, intersect, meet, Bound, RangeKind, ValueOrder, ValueRange,
};

// ================================================================================================
// Propagation
// ================================================================================================

pub use crate::analysis::{
    AssertionRecord, InductionScev, NoScev, RangeResult, ScevOracle, ValueRangePropagation,
};

/// Parallel analysis of many functions
pub use crate::context::RangeContext;
