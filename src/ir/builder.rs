//! Closure-based construction of SSA functions.
//!
//! Tests, benches and embedders describe a function block by block; the
//! builder allocates names, assembles blocks, derives the edge and def-use
//! tables and validates the result:
//!
//! ```rust,ignore
//! use rangescope::ir::{CmpOp, ScalarType, SsaFunctionBuilder};
//!
//! let func = SsaFunctionBuilder::new("clamp").build_with(|f| {
//!     let x = f.param(ScalarType::i32());
//!     f.block(0, |b| b.branch(CmpOp::Gt, x, 100, 1, 2));
//!     f.block(1, |b| b.ret_val(100));
//!     f.block(2, |b| b.ret_val(x));
//! })?;
//! ```
//!
//! Values flowing around a loop need their name before their definition;
//! allocate it with [`SsaFunctionContext::name`] and define it later with
//! one of the `*_into` methods.

use std::collections::HashMap;

use crate::{
    ir::{
        BinaryOp, Block, CmpOp, Condition, Function, NameOrigin, Operand, Phi, PhiOperand, Rhs,
        ScalarType, SsaName, SsaNameId, Stmt, SwitchCase, Terminator, UnaryOp,
    },
    utils::graph::NodeId,
    Result,
};

/// Builder for constructing SSA functions programmatically.
#[derive(Debug)]
pub struct SsaFunctionBuilder {
    name: String,
    names: Vec<SsaName>,
    params: usize,
    blocks: HashMap<usize, Block>,
    max_block_id: usize,
}

impl SsaFunctionBuilder {
    /// Creates a builder for a function called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            names: Vec::new(),
            params: 0,
            blocks: HashMap::new(),
            max_block_id: 0,
        }
    }

    fn alloc(&mut self, ty: ScalarType, origin: NameOrigin) -> SsaNameId {
        let id = SsaNameId::new(self.names.len());
        self.names.push(SsaName { id, ty, origin });
        id
    }

    fn type_of(&self, op: &Operand) -> Option<ScalarType> {
        op.as_name()
            .and_then(|n| self.names.get(n.index()))
            .map(SsaName::ty)
    }

    /// Builds the function using a closure that defines all blocks.
    ///
    /// Block ids skipped by the closure become empty unreachable blocks.
    ///
    /// # Errors
    ///
    /// Returns any error [`Function::validate`] reports.
    pub fn build_with<F>(mut self, f: F) -> Result<Function>
    where
        F: FnOnce(&mut SsaFunctionContext<'_>),
    {
        let mut ctx = SsaFunctionContext { builder: &mut self };
        f(&mut ctx);
        self.build()
    }

    fn build(mut self) -> Result<Function> {
        let blocks: Vec<Block> = (0..=self.max_block_id)
            .map(|id| {
                self.blocks
                    .remove(&id)
                    .unwrap_or_else(|| Block::new(Terminator::Unreachable))
            })
            .collect();
        let func = Function::from_parts(self.name, self.names, blocks);
        func.validate()?;
        Ok(func)
    }
}

/// Context passed to the build closure for defining parameters and blocks.
pub struct SsaFunctionContext<'a> {
    builder: &'a mut SsaFunctionBuilder,
}

impl SsaFunctionContext<'_> {
    /// Declares the next parameter.
    pub fn param(&mut self, ty: ScalarType) -> SsaNameId {
        let index = self.builder.params;
        self.builder.params += 1;
        self.builder
            .alloc(ty, NameOrigin::Param { index, nonnull: false })
    }

    /// Declares the next parameter as a pointer the caller guarantees non-null.
    pub fn param_nonnull(&mut self) -> SsaNameId {
        let index = self.builder.params;
        self.builder.params += 1;
        self.builder
            .alloc(ScalarType::pointer(), NameOrigin::Param { index, nonnull: true })
    }

    /// Declares the default definition of an uninitialized local.
    pub fn undef(&mut self, ty: ScalarType) -> SsaNameId {
        self.builder.alloc(ty, NameOrigin::Uninit)
    }

    /// Allocates a name to be defined later by a `*_into` method.
    pub fn name(&mut self, ty: ScalarType) -> SsaNameId {
        self.builder.alloc(ty, NameOrigin::Defined)
    }

    /// Defines block `id`.
    pub fn block<F>(&mut self, id: usize, f: F)
    where
        F: FnOnce(&mut SsaBlockBuilder<'_>),
    {
        if id > self.builder.max_block_id {
            self.builder.max_block_id = id;
        }

        let mut block = Block::new(Terminator::Unreachable);
        let mut block_builder = SsaBlockBuilder {
            builder: self.builder,
            block: &mut block,
        };
        f(&mut block_builder);
        self.builder.blocks.insert(id, block);
    }
}

/// Builder for the contents of one block.
///
/// Value-producing methods return the freshly allocated destination. The
/// destination type follows the first named operand; when every operand is
/// a literal it defaults to `i32`.
pub struct SsaBlockBuilder<'a> {
    builder: &'a mut SsaFunctionBuilder,
    block: &'a mut Block,
}

impl SsaBlockBuilder<'_> {
    fn infer(&self, a: &Operand, b: &Operand) -> ScalarType {
        self.builder
            .type_of(a)
            .or_else(|| self.builder.type_of(b))
            .unwrap_or(ScalarType::i32())
    }

    fn emit(&mut self, ty: ScalarType, rhs: Rhs) -> SsaNameId {
        let dest = self.builder.alloc(ty, NameOrigin::Defined);
        self.block.stmts.push(Stmt::Assign { dest, rhs });
        dest
    }

    fn phi_operands(operands: &[(usize, Operand)]) -> Vec<PhiOperand> {
        operands
            .iter()
            .map(|&(pred, value)| PhiOperand {
                predecessor: NodeId::new(pred),
                value,
            })
            .collect()
    }

    /// Adds `dest = PHI <...>` with a fresh destination of type `ty`.
    pub fn phi(&mut self, ty: ScalarType, operands: &[(usize, Operand)]) -> SsaNameId {
        let dest = self.builder.alloc(ty, NameOrigin::Defined);
        self.phi_into(dest, operands);
        dest
    }

    /// Adds a PHI defining a name allocated earlier.
    pub fn phi_into(&mut self, dest: SsaNameId, operands: &[(usize, Operand)]) {
        self.block.phis.push(Phi {
            dest,
            operands: Self::phi_operands(operands),
        });
    }

    /// Adds an arbitrary assignment to a name allocated earlier.
    pub fn assign_into(&mut self, dest: SsaNameId, rhs: Rhs) {
        self.block.stmts.push(Stmt::Assign { dest, rhs });
    }

    /// Adds `dest = value` where `value` is a literal of type `ty`.
    pub fn constant(&mut self, ty: ScalarType, value: i128) -> SsaNameId {
        self.emit(ty, Rhs::Copy(Operand::Const(value)))
    }

    /// Adds `dest = src`.
    pub fn copy(&mut self, src: SsaNameId) -> SsaNameId {
        let ty = self.infer(&src.into(), &src.into());
        self.emit(ty, Rhs::Copy(src.into()))
    }

    /// Adds `dest = op operand` with destination type `ty`.
    pub fn unary(&mut self, op: UnaryOp, operand: impl Into<Operand>, ty: ScalarType) -> SsaNameId {
        self.emit(
            ty,
            Rhs::Unary {
                op,
                operand: operand.into(),
            },
        )
    }

    /// Adds a conversion of `operand` to `ty`.
    pub fn convert(&mut self, operand: impl Into<Operand>, ty: ScalarType) -> SsaNameId {
        self.unary(UnaryOp::Convert, operand, ty)
    }

    /// Adds `dest = -operand`.
    pub fn negate(&mut self, operand: SsaNameId) -> SsaNameId {
        let ty = self.infer(&operand.into(), &operand.into());
        self.unary(UnaryOp::Negate, operand, ty)
    }

    /// Adds `dest = ~operand`.
    pub fn bit_not(&mut self, operand: SsaNameId) -> SsaNameId {
        let ty = self.infer(&operand.into(), &operand.into());
        self.unary(UnaryOp::BitNot, operand, ty)
    }

    /// Adds `dest = abs(operand)`.
    pub fn abs(&mut self, operand: SsaNameId) -> SsaNameId {
        let ty = self.infer(&operand.into(), &operand.into());
        self.unary(UnaryOp::Abs, operand, ty)
    }

    /// Adds `dest = lhs op rhs`.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> SsaNameId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = match op {
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::PointerPlus => self.infer(&lhs, &lhs),
            _ => self.infer(&lhs, &rhs),
        };
        self.emit(ty, Rhs::Binary { op, lhs, rhs })
    }

    /// Defines a name allocated earlier as `lhs op rhs`.
    pub fn binary_into(
        &mut self,
        dest: SsaNameId,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) {
        self.assign_into(
            dest,
            Rhs::Binary {
                op,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        );
    }

    /// Adds `dest = lhs + rhs`.
    pub fn add(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// Adds `dest = lhs - rhs`.
    pub fn sub(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// Adds `dest = lhs * rhs`.
    pub fn mul(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// Adds `dest = lhs / rhs`, truncating.
    pub fn div(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::TruncDiv, lhs, rhs)
    }

    /// Adds `dest = lhs % rhs`.
    pub fn rem(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::TruncMod, lhs, rhs)
    }

    /// Adds `dest = lhs & rhs`.
    pub fn bit_and(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::BitAnd, lhs, rhs)
    }

    /// Adds `dest = lhs | rhs`.
    pub fn bit_or(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::BitOr, lhs, rhs)
    }

    /// Adds `dest = lhs ^ rhs`.
    pub fn bit_xor(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::BitXor, lhs, rhs)
    }

    /// Adds `dest = lhs << rhs`.
    pub fn shl(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    /// Adds `dest = lhs >> rhs`.
    pub fn shr(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Shr, lhs, rhs)
    }

    /// Adds `dest = min(lhs, rhs)`.
    pub fn min(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Min, lhs, rhs)
    }

    /// Adds `dest = max(lhs, rhs)`.
    pub fn max(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::Max, lhs, rhs)
    }

    /// Adds `dest = ptr p+ offset`.
    pub fn pointer_plus(&mut self, ptr: SsaNameId, offset: impl Into<Operand>) -> SsaNameId {
        self.binary(BinaryOp::PointerPlus, ptr, offset)
    }

    /// Adds a boolean `dest = lhs op rhs`.
    pub fn compare(
        &mut self,
        op: CmpOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> SsaNameId {
        self.emit(
            ScalarType::boolean(),
            Rhs::Compare {
                op,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        )
    }

    /// Adds `dest = cond ? then_value : else_value`.
    pub fn select(
        &mut self,
        cond: Condition,
        then_value: impl Into<Operand>,
        else_value: impl Into<Operand>,
    ) -> SsaNameId {
        let (then_value, else_value) = (then_value.into(), else_value.into());
        let ty = self.infer(&then_value, &else_value);
        self.emit(
            ty,
            Rhs::Select {
                cond,
                then_value,
                else_value,
            },
        )
    }

    /// Adds `dest = &local`.
    pub fn address_of(&mut self) -> SsaNameId {
        self.emit(ScalarType::pointer(), Rhs::AddressOf)
    }

    /// Adds `dest = *ptr` with type `ty`.
    pub fn load(&mut self, ptr: SsaNameId, ty: ScalarType) -> SsaNameId {
        self.emit(ty, Rhs::Load { ptr: ptr.into() })
    }

    /// Adds `*ptr = value`.
    pub fn store(&mut self, ptr: SsaNameId, value: impl Into<Operand>) {
        self.block.stmts.push(Stmt::Store {
            ptr: ptr.into(),
            value: value.into(),
        });
    }

    /// Adds a call returning a value of type `ty`.
    pub fn call(&mut self, args: &[Operand], ty: ScalarType, returns_nonnull: bool) -> SsaNameId {
        self.emit(
            ty,
            Rhs::Call {
                args: args.to_vec(),
                returns_nonnull,
            },
        )
    }

    /// Adds a no-op.
    pub fn nop(&mut self) {
        self.block.stmts.push(Stmt::Nop);
    }

    /// Marks `target` as an exceptional successor.
    pub fn abnormal(&mut self, target: usize) {
        self.block.abnormal.push(NodeId::new(target));
    }

    /// Ends the block with `goto target`.
    pub fn jump(&mut self, target: usize) {
        self.block.terminator = Terminator::Jump(NodeId::new(target));
    }

    /// Ends the block with `if (lhs op rhs) goto on_true else goto on_false`.
    pub fn branch(
        &mut self,
        op: CmpOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        on_true: usize,
        on_false: usize,
    ) {
        self.block.terminator = Terminator::Branch {
            cond: Condition::new(op, lhs, rhs),
            on_true: NodeId::new(on_true),
            on_false: NodeId::new(on_false),
        };
    }

    /// Ends the block with `if (flag != 0) goto on_true else goto on_false`.
    pub fn branch_if(&mut self, flag: SsaNameId, on_true: usize, on_false: usize) {
        self.branch(CmpOp::Ne, flag, 0, on_true, on_false);
    }

    /// Ends the block with a switch. Each case is `(low, high, target)`.
    pub fn switch(&mut self, index: impl Into<Operand>, cases: &[(i128, i128, usize)], default: usize) {
        self.block.terminator = Terminator::Switch {
            index: index.into(),
            cases: cases
                .iter()
                .map(|&(low, high, target)| SwitchCase {
                    low,
                    high,
                    target: NodeId::new(target),
                })
                .collect(),
            default: NodeId::new(default),
        };
    }

    /// Ends the block with `return`.
    pub fn ret(&mut self) {
        self.block.terminator = Terminator::Return(None);
    }

    /// Ends the block with `return value`.
    pub fn ret_val(&mut self, value: impl Into<Operand>) {
        self.block.terminator = Terminator::Return(Some(value.into()));
    }

    /// Ends the block with `unreachable`.
    pub fn unreachable(&mut self) {
        self.block.terminator = Terminator::Unreachable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_loop() {
        let func = SsaFunctionBuilder::new("count")
            .build_with(|f| {
                let i = f.name(ScalarType::i32());
                let next = f.name(ScalarType::i32());
                f.block(0, |b| b.jump(1));
                f.block(1, |b| {
                    b.phi_into(i, &[(0, 0.into()), (2, next.into())]);
                    b.branch(CmpOp::Lt, i, 10, 2, 3);
                });
                f.block(2, |b| {
                    b.binary_into(next, BinaryOp::Add, i, 1);
                    b.jump(1);
                });
                f.block(3, |b| b.ret_val(i));
            })
            .unwrap();

        assert_eq!(func.block_count(), 4);
        assert_eq!(func.edges().len(), 4);
        assert_eq!(func.blocks()[1].phis().len(), 1);
        assert_eq!(func.name_count(), 2);
    }

    #[test]
    fn test_builder_fills_gaps() {
        let func = SsaFunctionBuilder::new("gaps")
            .build_with(|f| {
                f.block(0, |b| b.jump(2));
                f.block(2, |b| b.ret());
            })
            .unwrap();
        assert_eq!(func.block_count(), 3);
        assert_eq!(*func.blocks()[1].terminator(), Terminator::Unreachable);
    }

    #[test]
    fn test_builder_infers_types() {
        let func = SsaFunctionBuilder::new("types")
            .build_with(|f| {
                let x = f.param(ScalarType::u8());
                f.block(0, |b| {
                    let y = b.add(1, x);
                    let c = b.compare(CmpOp::Lt, y, 3);
                    b.ret_val(c);
                });
            })
            .unwrap();
        assert_eq!(func.name_type(SsaNameId::new(1)), ScalarType::u8());
        assert_eq!(func.name_type(SsaNameId::new(2)), ScalarType::boolean());
    }
}
