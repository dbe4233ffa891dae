//! The SSA program representation the analysis reads.
//!
//! A small IR: integer, boolean, pointer and float scalars;
//! assignments built from closed operator enums; blocks ending in a jump,
//! two-way branch, switch or return. Every query the range analysis needs
//! (def-use chains, edge properties, dominance, loops) is answered here.
//!
//! # Key Types
//!
//! - [`Function`] - Blocks, names, edges and def-use chains
//! - [`SsaFunctionBuilder`] - Closure-based construction with validation
//! - [`ScalarType`] - Precision, signedness and overflow semantics
//! - [`Rhs`] / [`Stmt`] / [`Terminator`] - Statement forms
//! - [`LoopForest`] - Natural loops and induction variables

mod block;
mod builder;
mod function;
mod loops;
mod name;
mod ops;
mod stmt;
mod types;

pub use block::Block;
pub use builder::{SsaBlockBuilder, SsaFunctionBuilder, SsaFunctionContext};
pub use function::{DefSite, Edge, EdgeFlags, EdgeId, Function, UseSite};
pub use loops::{detect_loops, InductionUpdateKind, InductionVar, LoopExit, LoopForest, LoopInfo};
pub use name::{NameOrigin, SsaName, SsaNameId};
pub use ops::{BinaryOp, CmpOp, Condition, Operand, Predicate, UnaryOp};
pub use stmt::{Phi, PhiOperand, Rhs, Stmt, SwitchCase, Terminator};
pub use types::{ScalarType, TypeKind};

pub(crate) use loops::{constant_value, strip_copies};

/// Identifier of a basic block: its index in [`Function::blocks`].
pub type BlockId = crate::utils::graph::NodeId;
