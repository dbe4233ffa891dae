//! What range propagation found out about a function.

use std::collections::HashMap;

use crate::{
    analysis::{assert::AssertionRecord, propagate::engine::Propagated, range::ValueRange},
    ir::{BlockId, EdgeId, Function, SsaNameId, Terminator},
};

/// The ranges and reachability computed for one function.
///
/// Names introduced by assertions stay queryable after the assertions are
/// removed: [`RangeResult::assertions`] lists them together with the name
/// they refine, which is how the range of `x` on one side of a branch is
/// read back.
#[derive(Debug, Clone)]
pub struct RangeResult {
    function: String,
    ranges: Vec<ValueRange>,
    executable_edges: Vec<bool>,
    executable_blocks: Vec<bool>,
    outcomes: HashMap<BlockId, BlockId>,
    assertions: Vec<AssertionRecord>,
    visits: usize,
    converged: bool,
    used_strict_overflow: bool,
}

impl RangeResult {
    pub(crate) fn harvest(func: &Function, propagated: Propagated, assertions: Vec<AssertionRecord>) -> Self {
        let Propagated {
            table,
            executable_edges,
            executable_blocks,
            visits,
            converged,
        } = propagated;

        let mut outcomes = HashMap::new();
        for (b, block) in func.blocks().iter().enumerate() {
            let block_id = BlockId::new(b);
            if !executable_blocks.get(b).copied().unwrap_or(false)
                || !matches!(
                    block.terminator(),
                    Terminator::Branch { .. } | Terminator::Switch { .. }
                )
            {
                continue;
            }
            let normal: Vec<EdgeId> = func
                .succ_edges(block_id)
                .iter()
                .copied()
                .filter(|&e| func.edge(e).is_some_and(|edge| !edge.is_abnormal()))
                .collect();
            let taken: Vec<EdgeId> = normal
                .iter()
                .copied()
                .filter(|&e| executable_edges.get(e).copied().unwrap_or(false))
                .collect();
            if let ([edge], true) = (taken.as_slice(), normal.len() > 1) {
                if let Some(dst) = func.edge(*edge).map(|e| e.dst) {
                    outcomes.insert(block_id, dst);
                }
            }
        }

        let ranges = table.into_ranges();
        let used_strict_overflow = ranges.iter().any(ValueRange::uses_overflow_infinity);

        Self {
            function: func.name().to_string(),
            ranges,
            executable_edges,
            executable_blocks,
            outcomes,
            assertions,
            visits,
            converged,
            used_strict_overflow,
        }
    }

    /// Name of the analyzed function.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// The final range of `name`, or `None` for a name the analysis never saw.
    #[must_use]
    pub fn range(&self, name: SsaNameId) -> Option<&ValueRange> {
        self.ranges.get(name.index())
    }

    /// Iterates every name with its range.
    pub fn ranges(&self) -> impl Iterator<Item = (SsaNameId, &ValueRange)> {
        self.ranges
            .iter()
            .enumerate()
            .map(|(i, vr)| (SsaNameId::new(i), vr))
    }

    /// The single value `name` always holds, if known.
    #[must_use]
    pub fn constant_value(&self, name: SsaNameId) -> Option<i128> {
        self.range(name)
            .filter(|vr| !vr.uses_overflow_infinity())
            .and_then(ValueRange::single_integer)
    }

    /// Whether control may flow along `edge`.
    #[must_use]
    pub fn is_edge_executable(&self, edge: EdgeId) -> bool {
        self.executable_edges.get(edge).copied().unwrap_or(false)
    }

    /// Whether `block` may execute.
    #[must_use]
    pub fn is_block_executable(&self, block: BlockId) -> bool {
        self.executable_blocks
            .get(block.index())
            .copied()
            .unwrap_or(false)
    }

    /// Number of blocks that may execute.
    #[must_use]
    pub fn executable_block_count(&self) -> usize {
        self.executable_blocks.iter().filter(|&&b| b).count()
    }

    /// The only successor a branch or switch in `block` can reach, when
    /// the analysis decided it.
    #[must_use]
    pub fn static_branch_outcome(&self, block: BlockId) -> Option<BlockId> {
        self.outcomes.get(&block).copied()
    }

    /// Assertions that were in place during propagation.
    #[must_use]
    pub fn assertions(&self) -> &[AssertionRecord] {
        &self.assertions
    }

    /// The refined ranges of `original` inside the blocks its assertions
    /// were placed in.
    pub fn refinements(&self, original: SsaNameId) -> impl Iterator<Item = (&AssertionRecord, &ValueRange)> {
        self.assertions
            .iter()
            .filter(move |r| r.original == original)
            .filter_map(|r| self.range(r.derived).map(|vr| (r, vr)))
    }

    /// The refined range of `original` in `block`, if an assertion placed
    /// there covers it.
    #[must_use]
    pub fn range_in_block(&self, original: SsaNameId, block: BlockId) -> Option<&ValueRange> {
        self.refinements(original)
            .filter(|(r, _)| r.block == block)
            .map(|(_, vr)| vr)
            .last()
    }

    /// Statement and PHI visits the engine made.
    #[must_use]
    pub fn visits(&self) -> usize {
        self.visits
    }

    /// Whether the engine reached a fixpoint before the visit cap.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Whether some final range relies on signed overflow being undefined.
    #[must_use]
    pub fn used_strict_overflow(&self) -> bool {
        self.used_strict_overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ValueRangePropagation,
        config::VrpConfig,
        ir::{CmpOp, ScalarType, SsaFunctionBuilder},
    };

    #[test]
    fn test_static_outcome_and_constants() {
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                f.block(0, |b| {
                    let x = b.constant(ScalarType::i32(), 4);
                    let y = b.mul(x, 2);
                    b.branch(CmpOp::Eq, y, 8, 1, 2);
                });
                f.block(1, |b| b.ret_val(1));
                f.block(2, |b| b.ret_val(2));
            })
            .unwrap();
        let result = ValueRangePropagation::new(VrpConfig::default())
            .run(&mut func)
            .unwrap();

        assert_eq!(result.function(), "f");
        assert_eq!(result.constant_value(SsaNameId::new(1)), Some(8));
        assert_eq!(result.static_branch_outcome(BlockId::new(0)), Some(BlockId::new(1)));
        assert!(result.is_block_executable(BlockId::new(1)));
        assert!(!result.is_block_executable(BlockId::new(2)));
        assert_eq!(result.executable_block_count(), 2);
        let dead = func.find_edge(BlockId::new(0), BlockId::new(2)).unwrap();
        assert!(!result.is_edge_executable(dead));
        assert!(result.converged());
        assert!(!result.used_strict_overflow());
    }

    #[test]
    fn test_refinements_per_block() {
        let mut func = SsaFunctionBuilder::new("f")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Lt, x, 10, 1, 2));
                f.block(1, |b| {
                    let y = b.add(x, 1);
                    b.ret_val(y);
                });
                f.block(2, |b| {
                    let y = b.sub(x, 1);
                    b.ret_val(y);
                });
            })
            .unwrap();
        let result = ValueRangePropagation::new(VrpConfig::default())
            .run(&mut func)
            .unwrap();
        let x = SsaNameId::new(0);

        assert!(result.range(x).unwrap().is_varying());
        assert_eq!(result.refinements(x).count(), 2);
        let below = result.range_in_block(x, BlockId::new(1)).unwrap();
        assert_eq!(below.max(), crate::analysis::Bound::Const(9));
        let above = result.range_in_block(x, BlockId::new(2)).unwrap();
        assert_eq!(above.min(), crate::analysis::Bound::Const(10));
        assert_eq!(result.static_branch_outcome(BlockId::new(0)), None);
    }
}
