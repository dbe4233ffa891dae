//! Finding the assertions a function supports.
//!
//! Sources of facts:
//!
//! - **Conditional branches**: on each outgoing edge the condition (or its
//!   negation) holds for every name operand.
//! - **Switches**: the case labels reaching an edge bound the index.
//! - **Dereferences**: a pointer read or written through is non-null
//!   afterwards.
//!
//! A fact about a name is pushed further back into the statements defining
//! it: through boolean `&`/`|`/`!`, comparisons and copies, through
//! value-preserving conversions, and through the `(unsigned)(x + c) <= k`
//! range-check idiom.

use log::trace;

use crate::{
    analysis::assert::{
        liveness::Liveness,
        locus::{AssertRegistry, Locus},
    },
    config::VrpConfig,
    ir::{
        BinaryOp, BlockId, CmpOp, Condition, EdgeFlags, EdgeId, Function, NameOrigin, Operand,
        Predicate, Rhs, SsaNameId, SwitchCase, Terminator, UnaryOp,
    },
    utils::graph::algorithms::DominatorTree,
};

/// Collects every assertion `func` supports.
pub(crate) fn find_assertions(func: &Function, config: &VrpConfig) -> AssertRegistry {
    let dom = func.dominators();
    let mut collector = Collector {
        func,
        dom: &dom,
        live: Liveness::compute(func),
        config,
        registry: AssertRegistry::default(),
    };
    for block in func.reverse_postorder() {
        collector.visit_block(block);
    }
    collector.registry
}

/// Whether `name` cannot be null regardless of control flow.
fn known_nonnull(func: &Function, name: SsaNameId) -> bool {
    if let Some(NameOrigin::Param { nonnull: true, .. }) = func.ssa_name(name).map(|n| n.origin()) {
        return true;
    }
    matches!(
        func.def_rhs(name),
        Some(Rhs::AddressOf | Rhs::Call {
            returns_nonnull: true,
            ..
        })
    )
}

struct Collector<'a> {
    func: &'a Function,
    dom: &'a DominatorTree,
    live: Liveness,
    config: &'a VrpConfig,
    registry: AssertRegistry,
}

impl Collector<'_> {
    fn visit_block(&mut self, block: BlockId) {
        let func = self.func;
        let Some(b) = func.block(block) else {
            return;
        };

        if self.config.delete_null_pointer_checks {
            for (index, stmt) in b.stmts().iter().enumerate() {
                if let Some(ptr) = stmt.dereferenced() {
                    self.dereference_asserts(block, index, ptr);
                }
            }
        }

        match b.terminator() {
            Terminator::Branch { cond, .. } => self.conditional_asserts(block, *cond),
            Terminator::Switch {
                index: Operand::Name(index),
                cases,
                default,
            } => self.switch_asserts(block, *index, cases, *default),
            _ => {}
        }
    }

    fn register(&mut self, name: SsaNameId, predicate: Predicate, locus: Locus) {
        self.registry
            .register(self.func, self.dom, name, predicate, locus);
    }

    /// Whether an assertion for `name` on `edge` would be worth inserting.
    fn wants_edge_assert(&self, edge: EdgeId, name: SsaNameId) -> bool {
        self.live.live_on_edge(self.func, edge, name)
            && !self.func.has_single_use(name)
            && !self.func.occurs_in_abnormal_phi(name)
    }

    fn dereference_asserts(&mut self, block: BlockId, index: usize, ptr: SsaNameId) {
        let func = self.func;
        if !func.name_type(ptr).is_pointer()
            || known_nonnull(func, ptr)
            || func.occurs_in_abnormal_phi(ptr)
            || !self.live.live_after_stmt(func, block, index, ptr)
        {
            return;
        }
        let Some(locus) = self.locus_after(block, index) else {
            return;
        };
        trace!("{ptr} dereferenced in {block} at {index}");
        self.register(ptr, ne_zero(), locus);

        // The source of a pointer conversion is non-null as well.
        let mut source = ptr;
        while let Some(Rhs::Unary {
            op: UnaryOp::Convert,
            operand: Operand::Name(inner),
        }) = func.def_rhs(source)
        {
            source = *inner;
            if !func.name_type(source).is_pointer() {
                break;
            }
            if !func.has_single_use(source)
                && !known_nonnull(func, source)
                && !func.occurs_in_abnormal_phi(source)
                && self.live.live_after_stmt(func, block, index, source)
            {
                self.register(source, ne_zero(), locus);
            }
        }
    }

    /// Where a fact established by statement `index` of `block` starts to
    /// hold. A statement that ends its block through exceptional control
    /// flow hands the fact to the single normal successor edge.
    fn locus_after(&self, block: BlockId, index: usize) -> Option<Locus> {
        let func = self.func;
        let b = func.block(block)?;
        if index + 1 < b.stmts().len() || !func.has_abnormal_successor(block) {
            return Some(Locus::After { block, index });
        }
        let mut normal = func
            .succ_edges(block)
            .iter()
            .copied()
            .filter(|&e| func.edge(e).is_some_and(|edge| !edge.is_abnormal()));
        match (normal.next(), normal.next()) {
            (Some(edge), None) => Some(Locus::Edge(edge)),
            _ => None,
        }
    }

    fn conditional_asserts(&mut self, block: BlockId, cond: Condition) {
        if cond.lhs == cond.rhs {
            return;
        }
        let func = self.func;
        for &e in func.succ_edges(block) {
            let Some(edge) = func.edge(e) else {
                continue;
            };
            if edge.is_abnormal() || edge.dst == block {
                continue;
            }
            let holds = match (
                edge.flags.contains(EdgeFlags::TRUE_VALUE),
                edge.flags.contains(EdgeFlags::FALSE_VALUE),
            ) {
                (true, false) => cond,
                (false, true) => cond.inverted(),
                _ => continue,
            };
            if let Operand::Name(name) = holds.lhs {
                self.edge_asserts(e, name, holds.op, holds.rhs);
            }
            if let Operand::Name(name) = holds.rhs {
                self.edge_asserts(e, name, holds.op.swap(), holds.lhs);
            }
        }
    }

    fn switch_asserts(
        &mut self,
        block: BlockId,
        index: SsaNameId,
        cases: &[SwitchCase],
        default: BlockId,
    ) {
        if !self.func.name_type(index).is_integral() {
            return;
        }

        // Labels reaching one destination are merged into their hull.
        let mut hulls: Vec<(BlockId, i128, i128)> = Vec::new();
        for case in cases.iter().filter(|c| c.target != default && c.target != block) {
            match hulls.iter_mut().find(|(target, _, _)| *target == case.target) {
                Some((_, low, high)) => {
                    *low = (*low).min(case.low);
                    *high = (*high).max(case.high);
                }
                None => hulls.push((case.target, case.low, case.high)),
            }
        }

        for (target, low, high) in hulls {
            let Some(edge) = self.func.find_edge(block, target) else {
                continue;
            };
            if self.func.edge(edge).is_some_and(|e| e.is_abnormal()) {
                continue;
            }
            if low == high {
                self.edge_asserts(edge, index, CmpOp::Eq, Operand::Const(low));
            } else {
                self.edge_asserts(edge, index, CmpOp::Ge, Operand::Const(low));
                self.edge_asserts(edge, index, CmpOp::Le, Operand::Const(high));
            }
        }
    }

    /// `name op limit` holds on `edge`.
    fn edge_asserts(&mut self, edge: EdgeId, name: SsaNameId, op: CmpOp, limit: Operand) {
        let ty = self.func.name_type(name);
        if !ty.is_tracked() || (ty.is_pointer() && !matches!(op, CmpOp::Eq | CmpOp::Ne)) {
            return;
        }
        if self.wants_edge_assert(edge, name) {
            self.register(name, Predicate::Compare { op, limit }, Locus::Edge(edge));
        }
        if let Operand::Const(value) = limit {
            self.conversion_asserts(edge, name, op, value);
            self.range_test_asserts(edge, name, op, value);
            self.boolean_asserts(edge, name, op, value);
        }
    }

    /// `name = (T) source` where the conversion keeps the compared values.
    fn conversion_asserts(&mut self, edge: EdgeId, name: SsaNameId, op: CmpOp, value: i128) {
        let Some(Rhs::Unary {
            op: UnaryOp::Convert,
            operand: Operand::Name(source),
        }) = self.func.def_rhs(name)
        else {
            return;
        };
        let source = *source;
        let (to, from) = (self.func.name_type(name), self.func.name_type(source));
        if !to.is_integral() || !from.is_integral() {
            return;
        }

        let order_kept = match op {
            CmpOp::Eq | CmpOp::Ne => true,
            _ if to.is_signed() == from.is_signed() => true,
            CmpOp::Le | CmpOp::Lt => from.is_signed(),
            CmpOp::Ge | CmpOp::Gt => from.is_unsigned(),
        };
        let value_kept = to.precision() > from.precision()
            || (to.precision() == from.precision() && to.is_signed() == from.is_signed());

        if order_kept && value_kept && from.fits(value) && self.wants_edge_assert(edge, source) {
            self.register(
                source,
                Predicate::Compare {
                    op,
                    limit: Operand::Const(value),
                },
                Locus::Edge(edge),
            );
        }
    }

    /// `(unsigned)(x + c2) <= k` confines `x` to a wrapped interval.
    fn range_test_asserts(&mut self, edge: EdgeId, name: SsaNameId, op: CmpOp, value: i128) {
        let func = self.func;
        let ty = func.name_type(name);
        if !ty.is_integral() || !ty.is_unsigned() {
            return;
        }
        let (negated, bound) = match op {
            CmpOp::Le => (false, value),
            CmpOp::Gt => (true, value),
            CmpOp::Lt if value > 0 => (false, value - 1),
            CmpOp::Ge if value > 0 => (true, value - 1),
            _ => return,
        };

        let (base, offset) = match func.def_rhs(name) {
            Some(Rhs::Binary {
                op: BinaryOp::Add,
                lhs: Operand::Name(base),
                rhs: Operand::Const(c),
            }) => (*base, *c),
            Some(Rhs::Binary {
                op: BinaryOp::Sub,
                lhs: Operand::Name(base),
                rhs: Operand::Const(c),
            }) => (*base, -*c),
            _ => (name, 0),
        };
        let base_ty = func.name_type(base);
        if !base_ty.is_integral() || !base_ty.is_unsigned() || base_ty.precision() != ty.precision() {
            return;
        }

        let low = ty.wrap(-offset);
        let high = ty.wrap(bound - offset);
        if base != name && self.wants_edge_assert(edge, base) {
            self.register(base, Predicate::Within { low, high, negated }, Locus::Edge(edge));
        }

        // Look through a sign-changing cast of the same width.
        if let Some(Rhs::Unary {
            op: UnaryOp::Convert,
            operand: Operand::Name(source),
        }) = func.def_rhs(base)
        {
            let from = func.name_type(*source);
            if from.is_integral()
                && from.is_signed()
                && from.precision() == ty.precision()
                && self.wants_edge_assert(edge, *source)
            {
                let predicate = Predicate::Within {
                    low: from.wrap(low),
                    high: from.wrap(high),
                    negated,
                };
                self.register(*source, predicate, Locus::Edge(edge));
            }
        }
    }

    /// `name op value` is a truth test; push it into `name`'s definition.
    fn boolean_asserts(&mut self, edge: EdgeId, name: SsaNameId, op: CmpOp, value: i128) {
        let one_bit = self.func.name_type(name).precision() == 1;
        let nonzero = match (op, value) {
            (CmpOp::Ne, 0) => true,
            (CmpOp::Eq, 0) => false,
            (CmpOp::Eq, 1) if one_bit => true,
            (CmpOp::Ne, 1) if one_bit => false,
            _ => return,
        };
        self.truth_asserts(edge, name, nonzero);
    }

    /// `name` is known nonzero (or zero) on `edge`.
    fn truth_asserts(&mut self, edge: EdgeId, name: SsaNameId, nonzero: bool) {
        let func = self.func;
        let ty = func.name_type(name);
        let one_bit = ty.precision() == 1;

        match func.def_rhs(name) {
            Some(Rhs::Binary {
                op: BinaryOp::BitAnd,
                lhs,
                rhs,
            }) if nonzero => {
                for operand in [*lhs, *rhs] {
                    if let Operand::Name(n) = operand {
                        self.operand_truth(edge, n, true);
                    }
                }
            }
            Some(Rhs::Binary {
                op: BinaryOp::BitOr,
                lhs,
                rhs,
            }) if !nonzero => {
                for operand in [*lhs, *rhs] {
                    if let Operand::Name(n) = operand {
                        self.operand_truth(edge, n, false);
                    }
                }
            }
            Some(Rhs::Compare { op, lhs, rhs }) if one_bit && lhs != rhs => {
                let op = if nonzero { *op } else { op.invert() };
                let (lhs, rhs) = (*lhs, *rhs);
                if let Operand::Name(n) = lhs {
                    self.edge_asserts(edge, n, op, rhs);
                }
                if let Operand::Name(n) = rhs {
                    self.edge_asserts(edge, n, op.swap(), lhs);
                }
            }
            Some(Rhs::Unary {
                op: UnaryOp::TruthNot,
                operand: Operand::Name(n),
            }) if one_bit => self.operand_truth(edge, *n, !nonzero),
            Some(Rhs::Copy(Operand::Name(n))) => self.operand_truth(edge, *n, nonzero),
            Some(Rhs::Unary {
                op: UnaryOp::Convert,
                operand: Operand::Name(n),
            }) => {
                // Extension keeps zero and nonzero apart; truncation does not.
                let from = func.name_type(*n);
                if from.is_integral() && from.precision() <= ty.precision() {
                    self.operand_truth(edge, *n, nonzero);
                }
            }
            _ => {}
        }
    }

    fn operand_truth(&mut self, edge: EdgeId, name: SsaNameId, nonzero: bool) {
        let ty = self.func.name_type(name);
        if !ty.is_integral() {
            return;
        }
        if self.wants_edge_assert(edge, name) {
            let op = if nonzero { CmpOp::Ne } else { CmpOp::Eq };
            self.register(
                name,
                Predicate::Compare {
                    op,
                    limit: Operand::Const(0),
                },
                Locus::Edge(edge),
            );
        }
        self.truth_asserts(edge, name, nonzero);
    }
}

fn ne_zero() -> Predicate {
    Predicate::Compare {
        op: CmpOp::Ne,
        limit: Operand::Const(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::assert::locus::AssertLocus,
        ir::{ScalarType, SsaFunctionBuilder},
    };

    fn loci(func: &Function) -> Vec<AssertLocus> {
        find_assertions(func, &VrpConfig::default()).into_loci()
    }

    fn compare(op: CmpOp, limit: impl Into<Operand>) -> Predicate {
        Predicate::Compare {
            op,
            limit: limit.into(),
        }
    }

    fn has(loci: &[AssertLocus], name: SsaNameId, predicate: Predicate, locus: Locus) -> bool {
        loci.iter()
            .any(|l| l.name == name && l.predicate == predicate && l.locus == locus)
    }

    #[test]
    fn test_branch_asserts_both_edges() {
        let mut x = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                x = Some(p);
                f.block(0, |b| b.branch(CmpOp::Lt, p, 10, 1, 2));
                f.block(1, |b| b.ret_val(p));
                f.block(2, |b| b.ret_val(p));
            })
            .unwrap();
        let x = x.unwrap();
        let found = loci(&func);
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        let on_false = func.find_edge(0.into(), 2.into()).unwrap();
        assert!(has(&found, x, compare(CmpOp::Lt, 10), Locus::Edge(on_true)));
        assert!(has(&found, x, compare(CmpOp::Ge, 10), Locus::Edge(on_false)));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_dead_and_single_use_names_are_skipped() {
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Lt, p, 10, 1, 2));
                f.block(1, |b| b.ret());
                f.block(2, |b| b.ret());
            })
            .unwrap();
        assert!(loci(&func).is_empty());
    }

    #[test]
    fn test_both_operands_get_asserts() {
        let mut names = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::i32());
                let b2 = f.param(ScalarType::i32());
                names = Some((a, b2));
                f.block(0, |b| b.branch(CmpOp::Lt, a, b2, 1, 2));
                f.block(1, |b| {
                    let s = b.add(a, b2);
                    b.ret_val(s);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let (a, b) = names.unwrap();
        let found = loci(&func);
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        assert!(has(&found, a, compare(CmpOp::Lt, b), Locus::Edge(on_true)));
        assert!(has(&found, b, compare(CmpOp::Gt, a), Locus::Edge(on_true)));
    }

    #[test]
    fn test_switch_hull_per_destination() {
        let mut x = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                x = Some(p);
                f.block(0, |b| b.switch(p, &[(1, 1, 1), (3, 4, 1), (7, 7, 2)], 3));
                f.block(1, |b| b.ret_val(p));
                f.block(2, |b| b.ret_val(p));
                f.block(3, |b| b.ret_val(p));
            })
            .unwrap();
        let x = x.unwrap();
        let found = loci(&func);
        let to1 = func.find_edge(0.into(), 1.into()).unwrap();
        let to2 = func.find_edge(0.into(), 2.into()).unwrap();
        assert!(has(&found, x, compare(CmpOp::Ge, 1), Locus::Edge(to1)));
        assert!(has(&found, x, compare(CmpOp::Le, 4), Locus::Edge(to1)));
        assert!(has(&found, x, compare(CmpOp::Eq, 7), Locus::Edge(to2)));
        assert!(!found.iter().any(|l| {
            l.locus == Locus::Edge(func.find_edge(0.into(), 3.into()).unwrap())
        }));
    }

    #[test]
    fn test_dereference_implies_nonnull() {
        let mut ptr = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::pointer());
                ptr = Some(p);
                f.block(0, |b| {
                    b.store(p, 1);
                    b.store(p, 2);
                    b.ret();
                });
            })
            .unwrap();
        let p = ptr.unwrap();
        let found = loci(&func);
        assert_eq!(found.len(), 1);
        assert!(has(&found, p, ne_zero(), Locus::After { block: 0.into(), index: 0 }));

        let config = VrpConfig::default().with_delete_null_pointer_checks(false);
        assert!(find_assertions(&func, &config).is_empty());
    }

    #[test]
    fn test_known_nonnull_pointer_needs_no_assert() {
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param_nonnull();
                f.block(0, |b| {
                    b.store(p, 1);
                    b.store(p, 2);
                    b.ret();
                });
            })
            .unwrap();
        assert!(loci(&func).is_empty());
    }

    #[test]
    fn test_conjunction_asserts_both_operands() {
        let mut names = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::i32());
                let c = f.param(ScalarType::i32());
                names = Some((a, c));
                f.block(0, |b| {
                    let t1 = b.compare(CmpOp::Gt, a, 0);
                    let t2 = b.compare(CmpOp::Lt, c, 5);
                    let both = b.bit_and(t1, t2);
                    b.branch_if(both, 1, 2);
                });
                f.block(1, |b| {
                    let s = b.add(a, c);
                    b.ret_val(s);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let (a, c) = names.unwrap();
        let found = loci(&func);
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        assert!(has(&found, a, compare(CmpOp::Gt, 0), Locus::Edge(on_true)));
        assert!(has(&found, c, compare(CmpOp::Lt, 5), Locus::Edge(on_true)));
        // A conjunction being false says nothing about either side.
        let on_false = func.find_edge(0.into(), 2.into()).unwrap();
        assert!(!found.iter().any(|l| l.locus == Locus::Edge(on_false)));
    }

    #[test]
    fn test_negated_flag_inverts_comparison() {
        let mut x = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::i32());
                x = Some(a);
                f.block(0, |b| {
                    let t = b.compare(CmpOp::Lt, a, 3);
                    let n = b.unary(UnaryOp::TruthNot, t, ScalarType::boolean());
                    b.branch_if(n, 1, 2);
                });
                f.block(1, |b| b.ret_val(a));
                f.block(2, |b| b.ret_val(a));
            })
            .unwrap();
        let a = x.unwrap();
        let found = loci(&func);
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        let on_false = func.find_edge(0.into(), 2.into()).unwrap();
        assert!(has(&found, a, compare(CmpOp::Ge, 3), Locus::Edge(on_true)));
        assert!(has(&found, a, compare(CmpOp::Lt, 3), Locus::Edge(on_false)));
    }

    #[test]
    fn test_range_check_idiom() {
        let mut x = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::u32());
                x = Some(a);
                f.block(0, |b| {
                    let t = b.add(a, 4_294_967_293_i64);
                    b.branch(CmpOp::Le, t, 7, 1, 2);
                });
                f.block(1, |b| b.ret_val(a));
                f.block(2, |b| b.ret_val(a));
            })
            .unwrap();
        let a = x.unwrap();
        let found = loci(&func);
        // t = a - 3, so t <= 7 means a in [3, 10].
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        let on_false = func.find_edge(0.into(), 2.into()).unwrap();
        let inside = Predicate::Within {
            low: 3,
            high: 10,
            negated: false,
        };
        let outside = Predicate::Within {
            low: 3,
            high: 10,
            negated: true,
        };
        assert!(has(&found, a, inside, Locus::Edge(on_true)));
        assert!(has(&found, a, outside, Locus::Edge(on_false)));
    }

    #[test]
    fn test_widening_conversion_passes_constant_tests() {
        let mut x = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::i16());
                x = Some(a);
                f.block(0, |b| {
                    let w = b.convert(a, ScalarType::i64());
                    b.branch(CmpOp::Gt, w, 100, 1, 2);
                });
                f.block(1, |b| b.ret_val(a));
                f.block(2, |b| b.ret_val(a));
            })
            .unwrap();
        let a = x.unwrap();
        let found = loci(&func);
        let on_true = func.find_edge(0.into(), 1.into()).unwrap();
        assert!(has(&found, a, compare(CmpOp::Gt, 100), Locus::Edge(on_true)));
    }

    #[test]
    fn test_pointer_ordering_not_asserted() {
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::pointer());
                let q = f.param(ScalarType::pointer());
                f.block(0, |b| b.branch(CmpOp::Lt, p, q, 1, 2));
                f.block(1, |b| b.ret_val(p));
                f.block(2, |b| b.ret_val(q));
            })
            .unwrap();
        assert!(loci(&func).is_empty());
    }
}
