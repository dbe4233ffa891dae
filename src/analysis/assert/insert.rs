//! Materializing and removing assertions.
//!
//! Insertion splits the edges that need it, adds one
//! `name' = ASSERT(name, predicate)` statement per pending assertion and
//! rewrites every use of `name` dominated by an assertion to the nearest
//! one. Removal undoes the renaming and deletes the statements; split
//! blocks stay behind as empty forwarding blocks.

use std::collections::HashMap;

use log::debug;

use crate::{
    analysis::assert::{
        locus::{AssertLocus, Locus},
        AssertionRecord,
    },
    ir::{Block, BlockId, DefSite, Function, NameOrigin, Operand, Rhs, SsaNameId, Stmt, Terminator, UseSite},
    utils::graph::algorithms::DominatorTree,
};

/// Statement index standing for the end of a block.
const BLOCK_END: usize = usize::MAX;

/// Where a statement goes inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Start,
    After(usize),
}

/// Where a pending assertion goes once edges are split.
#[derive(Debug, Clone, Copy)]
enum Target {
    Block(BlockId, Slot),
    Split(BlockId, BlockId),
}

/// Inserts `loci` into `func` and renames the dominated uses.
pub(crate) fn materialize(func: &mut Function, loci: Vec<AssertLocus>) -> Vec<AssertionRecord> {
    if loci.is_empty() {
        return Vec::new();
    }

    // Resolve edges against the original CFG before anything changes.
    let mut pending: Vec<(AssertLocus, Target)> = Vec::with_capacity(loci.len());
    let mut to_split: Vec<(BlockId, BlockId)> = Vec::new();
    for locus in loci {
        let target = match locus.locus {
            Locus::After { block, index } => Target::Block(block, Slot::After(index)),
            Locus::Edge(e) => {
                let Some(edge) = func.edge(e).copied() else {
                    continue;
                };
                if func.pred_edges(edge.dst).len() == 1 {
                    Target::Block(edge.dst, Slot::Start)
                } else {
                    if !to_split.contains(&(edge.src, edge.dst)) {
                        to_split.push((edge.src, edge.dst));
                    }
                    Target::Split(edge.src, edge.dst)
                }
            }
        };
        pending.push((locus, target));
    }

    let split_blocks: HashMap<(BlockId, BlockId), BlockId> = to_split
        .into_iter()
        .map(|(src, dst)| ((src, dst), split_edge(func, src, dst)))
        .collect();
    let placements = pending.into_iter().filter_map(|(locus, target)| match target {
        Target::Block(block, slot) => Some((locus, block, slot)),
        Target::Split(src, dst) => split_blocks
            .get(&(src, dst))
            .map(|&block| (locus, block, Slot::Start)),
    });

    // Create the statements, grouped per block and slot.
    let mut records = Vec::new();
    let mut per_block: HashMap<BlockId, Vec<(Slot, Stmt)>> = HashMap::new();
    for (locus, block, slot) in placements {
        let ty = func.name_type(locus.name);
        let derived = func.new_name(ty, NameOrigin::Defined);
        debug!(
            "inserting {derived} = ASSERT({}, {} {}) in {block}",
            locus.name, locus.name, locus.predicate
        );
        per_block.entry(block).or_default().push((
            slot,
            Stmt::Assign {
                dest: derived,
                rhs: Rhs::Assert {
                    name: locus.name,
                    predicate: locus.predicate,
                },
            },
        ));
        records.push(AssertionRecord {
            original: locus.name,
            derived,
            block,
            predicate: locus.predicate,
        });
    }

    for (block, inserts) in per_block {
        let Some(b) = func.blocks.get_mut(block.index()) else {
            continue;
        };
        let old = std::mem::take(&mut b.stmts);
        let mut stmts = Vec::with_capacity(old.len() + inserts.len());
        stmts.extend(
            inserts
                .iter()
                .filter(|(slot, _)| *slot == Slot::Start)
                .map(|(_, stmt)| stmt.clone()),
        );
        for (index, stmt) in old.into_iter().enumerate() {
            stmts.push(stmt);
            stmts.extend(
                inserts
                    .iter()
                    .filter(|(slot, _)| *slot == Slot::After(index))
                    .map(|(_, stmt)| stmt.clone()),
            );
        }
        b.stmts = stmts;
    }
    func.rebuild();

    rename_dominated_uses(func, &records);
    records
}

/// Splits the edge `src -> dst` with a new empty block.
fn split_edge(func: &mut Function, src: BlockId, dst: BlockId) -> BlockId {
    let mut block = Block::new(Terminator::Jump(dst));
    block.split = true;
    let new_block = func.add_block(block);

    if let Some(b) = func.blocks.get_mut(src.index()) {
        b.terminator.rewrite_targets(|target| {
            if *target == dst {
                *target = new_block;
            }
        });
    }
    if let Some(b) = func.blocks.get_mut(dst.index()) {
        for phi in &mut b.phis {
            for operand in &mut phi.operands {
                if operand.predecessor == src {
                    operand.predecessor = new_block;
                }
            }
        }
    }
    debug!("split edge {src} -> {dst} with {new_block}");
    func.rebuild();
    new_block
}

/// The program point at which a use reads its operand.
fn use_point(site: UseSite) -> (BlockId, usize) {
    match site {
        UseSite::Stmt { block, index } => (block, index),
        UseSite::Terminator(block) => (block, BLOCK_END),
        UseSite::Phi { pred, .. } => (pred, BLOCK_END),
    }
}

fn strictly_before(dom: &DominatorTree, def: (BlockId, usize), at: (BlockId, usize)) -> bool {
    if def.0 == at.0 {
        def.1 < at.1
    } else {
        dom.strictly_dominates(def.0, at.0)
    }
}

/// Rewrites each use of an asserted name to the closest dominating
/// assertion result.
fn rename_dominated_uses(func: &mut Function, records: &[AssertionRecord]) {
    let dom = func.dominators();

    let mut candidates: HashMap<SsaNameId, Vec<(SsaNameId, (BlockId, usize))>> = HashMap::new();
    for record in records {
        if let Some(DefSite::Stmt { block, index }) = func.def_site(record.derived) {
            candidates
                .entry(record.original)
                .or_default()
                .push((record.derived, (block, index)));
        }
    }

    let mut renames: Vec<(UseSite, SsaNameId, SsaNameId)> = Vec::new();
    for (&original, defs) in &candidates {
        for &site in func.uses(original) {
            let at = use_point(site);
            let closest = defs
                .iter()
                .filter(|(_, def)| strictly_before(&dom, *def, at))
                .max_by_key(|(_, (block, index))| (dom.depth(*block), *index));
            if let Some(&(derived, _)) = closest {
                renames.push((site, original, derived));
            }
        }
    }

    for (site, from, to) in renames {
        let replace = |operand: &mut Operand| {
            if *operand == Operand::Name(from) {
                *operand = Operand::Name(to);
            }
        };
        match site {
            UseSite::Stmt { block, index } => {
                if let Some(stmt) = func
                    .blocks
                    .get_mut(block.index())
                    .and_then(|b| b.stmts.get_mut(index))
                {
                    stmt.rewrite_operands(replace);
                }
            }
            UseSite::Terminator(block) => {
                if let Some(b) = func.blocks.get_mut(block.index()) {
                    b.terminator.rewrite_operands(replace);
                }
            }
            UseSite::Phi { block, index, pred } => {
                if let Some(phi) = func
                    .blocks
                    .get_mut(block.index())
                    .and_then(|b| b.phis.get_mut(index))
                {
                    for operand in phi.operands.iter_mut().filter(|o| o.predecessor == pred) {
                        let mut value = operand.value;
                        replace(&mut value);
                        operand.value = value;
                    }
                }
            }
        }
    }
    func.rebuild();
}

/// Deletes every assertion, pointing its uses back at the original name.
///
/// Returns the number of assertions removed.
pub(crate) fn strip(func: &mut Function) -> usize {
    let mut subject: HashMap<SsaNameId, SsaNameId> = HashMap::new();
    for block in &func.blocks {
        for stmt in &block.stmts {
            if let Stmt::Assign {
                dest,
                rhs: Rhs::Assert { name, .. },
            } = stmt
            {
                subject.insert(*dest, *name);
            }
        }
    }
    if subject.is_empty() {
        return 0;
    }

    let root = |mut name: SsaNameId| {
        while let Some(&inner) = subject.get(&name) {
            name = inner;
        }
        name
    };
    let restore = |operand: &mut Operand| {
        if let Operand::Name(n) = *operand {
            *operand = Operand::Name(root(n));
        }
    };

    for block in &mut func.blocks {
        block.stmts.retain(|stmt| !stmt.is_assert());
        for stmt in &mut block.stmts {
            stmt.rewrite_operands(restore);
        }
        for phi in &mut block.phis {
            for operand in &mut phi.operands {
                restore(&mut operand.value);
            }
        }
        block.terminator.rewrite_operands(restore);
    }
    func.rebuild();

    debug!("removed {} assertions from {}", subject.len(), func.name());
    subject.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, Predicate, ScalarType, SsaFunctionBuilder};

    fn lt(limit: i128) -> Predicate {
        Predicate::Compare {
            op: CmpOp::Lt,
            limit: Operand::Const(limit),
        }
    }

    #[test]
    fn test_insert_on_single_predecessor_edge() {
        let mut x = None;
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                x = Some(p);
                f.block(0, |b| b.branch(CmpOp::Lt, p, 10, 1, 2));
                f.block(1, |b| {
                    let y = b.add(p, 1);
                    b.ret_val(y);
                });
                f.block(2, |b| b.ret_val(p));
            })
            .unwrap();
        let x = x.unwrap();
        let edge = func.find_edge(0.into(), 1.into()).unwrap();
        let records = materialize(
            &mut func,
            vec![AssertLocus {
                name: x,
                predicate: lt(10),
                locus: Locus::Edge(edge),
            }],
        );
        assert_eq!(records.len(), 1);
        let derived = records[0].derived;
        assert_eq!(records[0].block, BlockId::from(1));

        let block = func.block(1.into()).unwrap();
        assert!(block.stmts()[0].is_assert());
        // The add now reads the asserted name; block 2 still reads x.
        assert!(block.stmts()[1].used_names().any(|n| n == derived));
        assert!(func
            .block(2.into())
            .unwrap()
            .terminator()
            .used_names()
            .any(|n| n == x));
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_critical_edge_is_split() {
        let mut x = None;
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                x = Some(p);
                f.block(0, |b| b.branch(CmpOp::Lt, p, 10, 2, 1));
                f.block(1, |b| b.jump(2));
                f.block(2, |b| {
                    let m = b.phi(ScalarType::i32(), &[(0, p.into()), (1, 0.into())]);
                    b.ret_val(m);
                });
            })
            .unwrap();
        let x = x.unwrap();
        let edge = func.find_edge(0.into(), 2.into()).unwrap();
        assert!(func.is_critical(edge));
        let records = materialize(
            &mut func,
            vec![AssertLocus {
                name: x,
                predicate: lt(10),
                locus: Locus::Edge(edge),
            }],
        );
        let split = records[0].block;
        assert_eq!(split.index(), 3);
        assert!(func.block(split).unwrap().is_split_block());
        assert!(func.find_edge(0.into(), 2.into()).is_none());
        assert!(func.find_edge(split, 2.into()).is_some());

        // The PHI argument now flows in from the split block, renamed.
        let phi = &func.block(2.into()).unwrap().phis()[0];
        assert_eq!(phi.operand_from(split), Some(Operand::Name(records[0].derived)));
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_nested_assertions_chain() {
        let mut x = None;
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::i32());
                x = Some(p);
                f.block(0, |b| b.branch(CmpOp::Lt, p, 10, 1, 3));
                f.block(1, |b| b.branch(CmpOp::Gt, p, 0, 2, 3));
                f.block(2, |b| b.ret_val(p));
                f.block(3, |b| b.ret());
            })
            .unwrap();
        let x = x.unwrap();
        let e01 = func.find_edge(0.into(), 1.into()).unwrap();
        let e12 = func.find_edge(1.into(), 2.into()).unwrap();
        let gt0 = Predicate::Compare {
            op: CmpOp::Gt,
            limit: Operand::Const(0),
        };
        let records = materialize(
            &mut func,
            vec![
                AssertLocus {
                    name: x,
                    predicate: lt(10),
                    locus: Locus::Edge(e01),
                },
                AssertLocus {
                    name: x,
                    predicate: gt0,
                    locus: Locus::Edge(e12),
                },
            ],
        );
        let (outer, inner) = (records[0].derived, records[1].derived);
        let inner_stmt = &func.block(2.into()).unwrap().stmts()[0];
        assert_eq!(
            inner_stmt.rhs(),
            Some(&Rhs::Assert {
                name: outer,
                predicate: gt0
            })
        );
        assert!(func
            .block(2.into())
            .unwrap()
            .terminator()
            .used_names()
            .any(|n| n == inner));
        assert!(func
            .block(1.into())
            .unwrap()
            .terminator()
            .used_names()
            .any(|n| n == outer));
    }

    #[test]
    fn test_strip_restores_original_names() {
        let mut x = None;
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let p = f.param(ScalarType::pointer());
                x = Some(p);
                f.block(0, |b| {
                    b.store(p, 1);
                    b.store(p, 2);
                    b.ret();
                });
            })
            .unwrap();
        let x = x.unwrap();
        let before = func.clone();
        let records = materialize(
            &mut func,
            vec![AssertLocus {
                name: x,
                predicate: Predicate::Compare {
                    op: CmpOp::Ne,
                    limit: Operand::Const(0),
                },
                locus: Locus::After {
                    block: 0.into(),
                    index: 0,
                },
            }],
        );
        let block = func.block(0.into()).unwrap();
        assert_eq!(block.stmts().len(), 3);
        assert!(block.stmts()[2].used_names().any(|n| n == records[0].derived));

        assert_eq!(strip(&mut func), 1);
        assert_eq!(func.block(0.into()).unwrap().stmts(), before.block(0.into()).unwrap().stmts());
        assert_eq!(strip(&mut func), 0);
    }
}
