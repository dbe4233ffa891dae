//! Live SSA names at block boundaries.
//!
//! A backward fixpoint over the CFG:
//!
//! - `USE[B]` = names read in B (statements and terminator)
//! - `DEF[B]` = names defined in B (PHIs and statements)
//! - `OUT[B]` = ∪ IN[S] over successors S, plus the PHI operands B feeds
//! - `IN[B]` = USE[B] ∪ (OUT[B] − DEF[B])
//!
//! PHI operands count as uses at the end of the predecessor they flow in
//! from, so a name feeding a PHI is live on exactly the edges carrying it.

use crate::{
    ir::{BlockId, EdgeId, Function, Operand, SsaNameId},
    utils::BitSet,
};

/// Per-block live-in and live-out sets.
#[derive(Debug, Clone)]
pub(crate) struct Liveness {
    live_in: Vec<BitSet>,
    live_out: Vec<BitSet>,
}

impl Liveness {
    /// Computes liveness for every block of `func`.
    pub(crate) fn compute(func: &Function) -> Self {
        let names = func.name_count();
        let blocks = func.block_count();

        let mut uses = vec![BitSet::new(names); blocks];
        let mut defs = vec![BitSet::new(names); blocks];
        let mut phi_out = vec![BitSet::new(names); blocks];

        for (b, block) in func.blocks().iter().enumerate() {
            for phi in block.phis() {
                defs[b].insert(phi.dest.index());
                for operand in &phi.operands {
                    if let Some(n) = operand.value.as_name() {
                        if let Some(set) = phi_out.get_mut(operand.predecessor.index()) {
                            set.insert(n.index());
                        }
                    }
                }
            }
            for stmt in block.stmts() {
                for n in stmt.used_names() {
                    if !defs[b].contains(n.index()) {
                        uses[b].insert(n.index());
                    }
                }
                if let Some(dest) = stmt.dest() {
                    defs[b].insert(dest.index());
                }
            }
            for n in block.terminator().used_names() {
                if !defs[b].contains(n.index()) {
                    uses[b].insert(n.index());
                }
            }
        }

        let mut live_in = uses.clone();
        let mut live_out = phi_out.clone();
        let order = func.reverse_postorder();

        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().rev() {
                let b = block.index();
                let mut out = phi_out[b].clone();
                for &e in func.succ_edges(block) {
                    if let Some(edge) = func.edge(e) {
                        out.union_with(&live_in[edge.dst.index()]);
                    }
                }
                let mut inn = out.clone();
                inn.difference_with(&defs[b]);
                inn.union_with(&uses[b]);

                if out != live_out[b] {
                    live_out[b] = out;
                    changed = true;
                }
                if inn != live_in[b] {
                    live_in[b] = inn;
                    changed = true;
                }
            }
        }

        Self { live_in, live_out }
    }

    /// Whether `name` is read somewhere after control crosses `edge`.
    pub(crate) fn live_on_edge(&self, func: &Function, edge: EdgeId, name: SsaNameId) -> bool {
        let Some(e) = func.edge(edge) else {
            return false;
        };
        if self.live_in[e.dst.index()].contains(name.index()) {
            return true;
        }
        func.block(e.dst).is_some_and(|block| {
            block
                .phis()
                .iter()
                .any(|phi| phi.operand_from(e.src) == Some(Operand::Name(name)))
        })
    }

    /// Whether `name` is read after statement `index` of `block`.
    pub(crate) fn live_after_stmt(
        &self,
        func: &Function,
        block: BlockId,
        index: usize,
        name: SsaNameId,
    ) -> bool {
        let Some(b) = func.block(block) else {
            return false;
        };
        b.stmts()
            .iter()
            .skip(index + 1)
            .any(|stmt| stmt.used_names().any(|n| n == name))
            || b.terminator().used_names().any(|n| n == name)
            || self.live_out[block.index()].contains(name.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, ScalarType, SsaFunctionBuilder};

    #[test]
    fn test_live_on_branch_edges() {
        let mut y = None;
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                let z = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Gt, x, 0, 1, 2));
                f.block(1, |b| {
                    y = Some(b.add(x, 1));
                    b.ret();
                });
                f.block(2, |b| b.ret_val(z));
            })
            .unwrap();
        let live = Liveness::compute(&func);
        let x = SsaNameId::new(0);
        let z = SsaNameId::new(1);
        let to_then = func.find_edge(func.entry(), 1.into()).unwrap();
        let to_else = func.find_edge(func.entry(), 2.into()).unwrap();

        assert!(live.live_on_edge(&func, to_then, x));
        assert!(!live.live_on_edge(&func, to_else, x));
        assert!(live.live_on_edge(&func, to_else, z));
        assert!(!live.live_on_edge(&func, to_then, y.unwrap()));
    }

    #[test]
    fn test_phi_operand_is_live_on_its_edge_only() {
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let a = f.param(ScalarType::i32());
                let c = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Lt, c, 0, 1, 2));
                f.block(1, |b| b.jump(3));
                f.block(2, |b| b.jump(3));
                f.block(3, |b| {
                    let p = b.phi(ScalarType::i32(), &[(1, a.into()), (2, 0.into())]);
                    b.ret_val(p);
                });
            })
            .unwrap();
        let live = Liveness::compute(&func);
        let a = SsaNameId::new(0);
        let e13 = func.find_edge(1.into(), 3.into()).unwrap();
        let e23 = func.find_edge(2.into(), 3.into()).unwrap();
        assert!(live.live_on_edge(&func, e13, a));
        assert!(!live.live_on_edge(&func, e23, a));
        let e01 = func.find_edge(func.entry(), 1.into()).unwrap();
        assert!(live.live_on_edge(&func, e01, a));
    }

    #[test]
    fn test_live_after_statement() {
        let func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::pointer());
                f.block(0, |b| {
                    b.store(p, 1);
                    b.store(p, 2);
                    b.ret();
                });
            })
            .unwrap();
        let live = Liveness::compute(&func);
        let p = SsaNameId::new(0);
        assert!(live.live_after_stmt(&func, func.entry(), 0, p));
        assert!(!live.live_after_stmt(&func, func.entry(), 1, p));
    }
}
