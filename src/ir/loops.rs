//! Natural loop detection and induction variable discovery.
//!
//! # Loop Structure
//!
//! ```text
//!     [preheader]     <- Single entry predecessor (optional)
//!          |
//!          v
//!     [header] <------+  <- Single entry point, dominates all loop nodes
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+  <- Back edge source(s)
//!          |
//!          v
//!     [exit ...]         <- Outside the loop, with a predecessor inside
//! ```
//!
//! [`detect_loops`] works on any graph implementing the traits in
//! [`crate::utils::graph`]; [`LoopInfo::find_induction_vars`] then reads the
//! header PHIs of a [`Function`] to find the counters the scalar evolution
//! oracle reasons about.

use std::collections::{HashMap, HashSet};

use crate::{
    ir::{BinaryOp, Function, Operand, PhiOperand, Rhs, SsaNameId},
    utils::graph::{algorithms::DominatorTree, GraphBase, NodeId, Predecessors, Successors},
};

/// Exit edge information for a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    /// The block inside the loop that branches out.
    pub exiting_block: NodeId,
    /// The block outside the loop that is the exit target.
    pub exit_block: NodeId,
}

/// Classification of induction variable update operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InductionUpdateKind {
    /// `i = i + stride`
    Add,
    /// `i = i - stride`
    Sub,
    /// Anything else
    Unknown,
}

/// An induction variable of a loop.
///
/// A PHI at the header merging one value from outside the loop with one
/// value computed inside it. Updates are recognized through copies and
/// assertions, so `i' = ASSERT_EXPR <i, i < n>; i2 = i' + 1` still counts as
/// `i2 = i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InductionVar {
    /// The PHI result at the loop header.
    pub phi_result: SsaNameId,
    /// The initial value, flowing in from outside the loop.
    pub init_value: Operand,
    /// The block providing the initial value.
    pub init_block: NodeId,
    /// The updated value, flowing in over a back edge.
    pub update_value: Operand,
    /// The block providing the updated value.
    pub update_block: NodeId,
    /// The update operation.
    pub update_kind: InductionUpdateKind,
    /// Constant amount added or subtracted per iteration, if known.
    pub stride: Option<i128>,
}

impl InductionVar {
    /// Signed per-iteration change, if the update is `phi ± constant`.
    #[must_use]
    pub fn step(&self) -> Option<i128> {
        match self.update_kind {
            InductionUpdateKind::Add => self.stride,
            InductionUpdateKind::Sub => self.stride.and_then(i128::checked_neg),
            InductionUpdateKind::Unknown => None,
        }
    }
}

/// A natural loop.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// The header block (single entry point, dominates all loop nodes).
    pub header: NodeId,

    /// All blocks in the loop body, including the header.
    pub body: HashSet<NodeId>,

    /// Back edge sources.
    pub latches: Vec<NodeId>,

    /// The single predecessor of the header outside the loop, if there is
    /// exactly one.
    pub preheader: Option<NodeId>,

    /// Exit edges from the loop.
    pub exits: Vec<LoopExit>,

    /// Loop nesting depth (0 = outermost).
    pub depth: usize,

    /// Parent loop header, if this loop is nested.
    pub parent: Option<NodeId>,
}

impl LoopInfo {
    /// Creates a loop consisting of the header alone.
    #[must_use]
    pub fn new(header: NodeId) -> Self {
        let mut body = HashSet::new();
        body.insert(header);
        Self {
            header,
            body,
            latches: Vec::new(),
            preheader: None,
            exits: Vec::new(),
            depth: 0,
            parent: None,
        }
    }

    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.body.contains(&node)
    }

    /// Returns the number of blocks in the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Returns the single latch if there is exactly one.
    #[must_use]
    pub fn single_latch(&self) -> Option<NodeId> {
        match self.latches.as_slice() {
            [latch] => Some(*latch),
            _ => None,
        }
    }

    /// Returns all exiting blocks (blocks inside loop that branch out).
    pub fn exiting_blocks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.exits.iter().map(|e| e.exiting_block)
    }

    /// Identifies induction variables in this loop.
    ///
    /// A header PHI qualifies when exactly one operand flows in from outside
    /// the loop. The first operand from inside is the update; its kind and
    /// stride are classified when it is `phi + c` or `phi - c`.
    #[must_use]
    pub fn find_induction_vars(&self, func: &Function) -> Vec<InductionVar> {
        let mut induction_vars = Vec::new();
        let Some(header_block) = func.block(self.header) else {
            return induction_vars;
        };

        for phi in header_block.phis() {
            if phi.operands.len() < 2 {
                continue;
            }

            let (inside, outside): (Vec<&PhiOperand>, Vec<&PhiOperand>) = phi
                .operands
                .iter()
                .partition(|op| self.body.contains(&op.predecessor));

            if let ([init], [update, ..]) = (outside.as_slice(), inside.as_slice()) {
                let (update_kind, stride) = analyze_update(func, update.value, phi.dest);
                induction_vars.push(InductionVar {
                    phi_result: phi.dest,
                    init_value: init.value,
                    init_block: init.predecessor,
                    update_value: update.value,
                    update_block: update.predecessor,
                    update_kind,
                    stride,
                });
            }
        }

        induction_vars
    }
}

/// Follows copies and assertions back to the name they restate.
pub(crate) fn strip_copies(func: &Function, mut name: SsaNameId) -> SsaNameId {
    // SSA definitions are acyclic through copies, but stay bounded anyway.
    for _ in 0..func.name_count() {
        match func.def_rhs(name) {
            Some(Rhs::Assert { name: base, .. }) => name = *base,
            Some(Rhs::Copy(Operand::Name(base))) => name = *base,
            _ => break,
        }
    }
    name
}

/// The constant an operand holds: a literal, or a name copied from one.
pub(crate) fn constant_value(func: &Function, op: Operand) -> Option<i128> {
    match op {
        Operand::Const(c) => Some(c),
        Operand::Name(n) => match func.def_rhs(strip_copies(func, n))? {
            Rhs::Copy(Operand::Const(c)) => Some(*c),
            _ => None,
        },
    }
}

fn analyze_update(
    func: &Function,
    update: Operand,
    phi_result: SsaNameId,
) -> (InductionUpdateKind, Option<i128>) {
    let Some(update) = update.as_name() else {
        return (InductionUpdateKind::Unknown, None);
    };
    let is_phi = |op: &Operand| {
        op.as_name()
            .is_some_and(|n| strip_copies(func, n) == phi_result)
    };

    match func.def_rhs(strip_copies(func, update)) {
        Some(Rhs::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        }) => {
            if is_phi(lhs) {
                (InductionUpdateKind::Add, constant_value(func, *rhs))
            } else if is_phi(rhs) {
                (InductionUpdateKind::Add, constant_value(func, *lhs))
            } else {
                (InductionUpdateKind::Unknown, None)
            }
        }
        Some(Rhs::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        }) if is_phi(lhs) => (InductionUpdateKind::Sub, constant_value(func, *rhs)),
        _ => (InductionUpdateKind::Unknown, None),
    }
}

/// All natural loops of a function.
#[derive(Debug, Clone)]
pub struct LoopForest {
    loops: Vec<LoopInfo>,
    /// Innermost loop containing each block.
    block_to_loop: Vec<Option<usize>>,
}

impl LoopForest {
    /// Creates an empty loop forest.
    #[must_use]
    pub fn new(block_count: usize) -> Self {
        Self {
            loops: Vec::new(),
            block_to_loop: vec![None; block_count],
        }
    }

    /// Adds a loop to the forest.
    pub fn add_loop(&mut self, loop_info: LoopInfo) {
        let loop_idx = self.loops.len();

        for &block in &loop_info.body {
            let Some(slot) = self.block_to_loop.get_mut(block.index()) else {
                continue;
            };
            match *slot {
                Some(existing) if self.loops[existing].depth >= loop_info.depth => {}
                _ => *slot = Some(loop_idx),
            }
        }

        self.loops.push(loop_info);
    }

    /// Returns all loops in the forest.
    #[must_use]
    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the innermost loop containing the given block.
    #[must_use]
    pub fn innermost_loop(&self, block: NodeId) -> Option<&LoopInfo> {
        self.block_to_loop
            .get(block.index())
            .copied()
            .flatten()
            .map(|idx| &self.loops[idx])
    }

    /// Returns the loop with the given header.
    #[must_use]
    pub fn loop_for_header(&self, header: NodeId) -> Option<&LoopInfo> {
        self.loops.iter().find(|l| l.header == header)
    }

    /// Returns the loop depth for a block (0 if not in any loop).
    #[must_use]
    pub fn loop_depth(&self, block: NodeId) -> usize {
        self.innermost_loop(block).map_or(0, |l| l.depth + 1)
    }

    /// Iterates over all loops in the forest.
    pub fn iter(&self) -> impl Iterator<Item = &LoopInfo> {
        self.loops.iter()
    }
}

/// Detects all natural loops in a graph using dominance-based back edge detection.
///
/// # Algorithm
///
/// 1. Finds back edges using dominance (n → h where h dominates n)
/// 2. For each back edge, computes the natural loop body
/// 3. Computes preheaders and exits
/// 4. Establishes nesting relationships
///
/// Loops sharing a header are merged into one loop with several latches.
#[must_use]
pub fn detect_loops<G>(graph: &G, dominators: &DominatorTree) -> LoopForest
where
    G: GraphBase + Successors + Predecessors,
{
    let mut forest = LoopForest::new(graph.node_count());
    let mut loops_by_header: HashMap<NodeId, LoopInfo> = HashMap::new();

    for node in graph.node_ids() {
        if !dominators.is_reachable(node) {
            continue;
        }
        for succ in graph.successors(node) {
            if dominators.dominates(succ, node) {
                let loop_info = loops_by_header
                    .entry(succ)
                    .or_insert_with(|| LoopInfo::new(succ));
                if !loop_info.latches.contains(&node) {
                    loop_info.latches.push(node);
                }
                expand_loop_body(graph, loop_info, node);
            }
        }
    }

    for loop_info in loops_by_header.values_mut() {
        compute_preheader(graph, loop_info);
        compute_exits(graph, loop_info);
    }

    let mut loops: Vec<LoopInfo> = loops_by_header.into_values().collect();
    compute_nesting(&mut loops);
    loops.sort_by_key(|l| l.header.index());

    for loop_info in loops {
        forest.add_loop(loop_info);
    }

    forest
}

/// Adds every node that reaches `latch` without passing through the header.
fn expand_loop_body<G>(graph: &G, loop_info: &mut LoopInfo, latch: NodeId)
where
    G: Predecessors,
{
    let mut worklist = vec![latch];

    while let Some(node) = worklist.pop() {
        if loop_info.body.insert(node) {
            for pred in graph.predecessors(node) {
                if pred != loop_info.header && !loop_info.body.contains(&pred) {
                    worklist.push(pred);
                }
            }
        }
    }
}

fn compute_preheader<G>(graph: &G, loop_info: &mut LoopInfo)
where
    G: Predecessors,
{
    let outside: Vec<NodeId> = graph
        .predecessors(loop_info.header)
        .filter(|pred| !loop_info.body.contains(pred))
        .collect();

    loop_info.preheader = match outside.as_slice() {
        [single] => Some(*single),
        _ => None,
    };
}

fn compute_exits<G>(graph: &G, loop_info: &mut LoopInfo)
where
    G: Successors,
{
    let mut exits = Vec::new();
    for &body_block in &loop_info.body {
        for succ in graph.successors(body_block) {
            if !loop_info.body.contains(&succ) {
                exits.push(LoopExit {
                    exiting_block: body_block,
                    exit_block: succ,
                });
            }
        }
    }
    exits.sort_by_key(|e| (e.exiting_block.index(), e.exit_block.index()));
    loop_info.exits = exits;
}

/// Parent is the smallest other loop containing the header.
fn compute_nesting(loops: &mut [LoopInfo]) {
    let n = loops.len();
    let header_to_idx: HashMap<NodeId, usize> = loops
        .iter()
        .enumerate()
        .map(|(i, l)| (l.header, i))
        .collect();

    for i in 0..n {
        let header = loops[i].header;
        loops[i].parent = (0..n)
            .filter(|&j| j != i && loops[j].body.contains(&header))
            .min_by_key(|&j| loops[j].size())
            .map(|j| loops[j].header);
    }

    for i in 0..n {
        let mut depth = 0;
        let mut current = loops[i].parent;
        while let Some(parent_header) = current {
            depth += 1;
            current = header_to_idx
                .get(&parent_header)
                .and_then(|&idx| loops[idx].parent);
        }
        loops[i].depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, ScalarType, SsaFunctionBuilder};

    /// `for (i = 0; i < 10; i++)` with the exit test in the header.
    fn counting_loop() -> Function {
        SsaFunctionBuilder::new("count")
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
                f.block(3, |b| b.ret());
            })
            .unwrap()
    }

    #[test]
    fn test_loop_info_creation() {
        let header = NodeId::new(0);
        let loop_info = LoopInfo::new(header);

        assert_eq!(loop_info.header, header);
        assert!(loop_info.contains(header));
        assert_eq!(loop_info.size(), 1);
        assert_eq!(loop_info.single_latch(), None);
    }

    #[test]
    fn test_detect_single_loop() {
        let func = counting_loop();
        let forest = detect_loops(&func, &func.dominators());

        assert_eq!(forest.len(), 1);
        let l = &forest.loops()[0];
        assert_eq!(l.header, NodeId::new(1));
        assert_eq!(l.single_latch(), Some(NodeId::new(2)));
        assert_eq!(l.preheader, Some(NodeId::new(0)));
        assert_eq!(
            l.exits,
            vec![LoopExit {
                exiting_block: NodeId::new(1),
                exit_block: NodeId::new(3),
            }]
        );
        assert_eq!(forest.loop_depth(NodeId::new(2)), 1);
        assert_eq!(forest.loop_depth(NodeId::new(3)), 0);
    }

    #[test]
    fn test_find_induction_vars() {
        let func = counting_loop();
        let forest = detect_loops(&func, &func.dominators());
        let ivs = forest.loops()[0].find_induction_vars(&func);

        assert_eq!(ivs.len(), 1);
        let iv = &ivs[0];
        assert_eq!(iv.init_value, Operand::Const(0));
        assert_eq!(iv.update_kind, InductionUpdateKind::Add);
        assert_eq!(iv.step(), Some(1));
    }

    #[test]
    fn test_nested_loops() {
        let func = SsaFunctionBuilder::new("nested")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                f.block(0, |b| b.jump(1));
                f.block(1, |b| b.branch(CmpOp::Lt, x, 10, 2, 4));
                f.block(2, |b| b.branch(CmpOp::Lt, x, 5, 2, 3));
                f.block(3, |b| b.jump(1));
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let forest = detect_loops(&func, &func.dominators());

        assert_eq!(forest.len(), 2);
        let inner = forest.loop_for_header(NodeId::new(2)).unwrap();
        assert_eq!(inner.parent, Some(NodeId::new(1)));
        assert_eq!(inner.depth, 1);
        assert_eq!(forest.innermost_loop(NodeId::new(2)).unwrap().header, NodeId::new(2));
        assert_eq!(forest.innermost_loop(NodeId::new(3)).unwrap().header, NodeId::new(1));
    }
}
