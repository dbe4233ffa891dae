//! Functions in SSA form and their derived control- and data-flow tables.
//!
//! A [`Function`] owns its blocks and names. Everything else (the edge list,
//! per-block successor and predecessor edges, and the def-use chains) is
//! derived from the blocks by [`Function::rebuild`], which every mutation
//! path calls before handing the function back.
//!
//! Edges are unique per `(source, destination)` pair. A branch whose two
//! arms lead to the same block produces a single edge carrying both the
//! `TRUE_VALUE` and `FALSE_VALUE` flags, and a switch with several cases
//! sharing a destination produces a single edge to it.

use std::fmt;

use bitflags::bitflags;

use crate::{
    error::malformed_error,
    ir::{
        BinaryOp, Block, BlockId, NameOrigin, Operand, Phi, Rhs, ScalarType, SsaName, SsaNameId,
        Stmt, Terminator,
    },
    utils::graph::{
        algorithms::{compute_dominators, reverse_postorder, DominatorTree},
        GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Properties of a control-flow edge
    pub struct EdgeFlags: u8 {
        /// Taken when the source's branch condition is true
        const TRUE_VALUE = 0x01;
        /// Taken when the source's branch condition is false
        const FALSE_VALUE = 0x02;
        /// Exceptional control flow; never carries assertions
        const ABNORMAL = 0x04;
        /// Enters or leaves a block created by edge splitting
        const SPLIT = 0x08;
    }
}

/// Index of an edge in [`Function::edges`].
pub type EdgeId = usize;

/// A control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Source block.
    pub src: BlockId,
    /// Destination block.
    pub dst: BlockId,
    /// Edge properties.
    pub flags: EdgeFlags,
}

impl Edge {
    /// Whether this is an exceptional edge.
    #[must_use]
    pub fn is_abnormal(&self) -> bool {
        self.flags.contains(EdgeFlags::ABNORMAL)
    }
}

/// Where a name receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefSite {
    /// Parameter or uninitialized local; defined on entry.
    Default,
    /// PHI node `index` of `block`.
    Phi {
        /// The block.
        block: BlockId,
        /// Position among the block's PHIs.
        index: usize,
    },
    /// Statement `index` of `block`.
    Stmt {
        /// The block.
        block: BlockId,
        /// Position among the block's statements.
        index: usize,
    },
}

/// One occurrence of a name as an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseSite {
    /// Incoming value of PHI `index` in `block`, flowing from `pred`.
    Phi {
        /// The block holding the PHI.
        block: BlockId,
        /// Position among the block's PHIs.
        index: usize,
        /// The predecessor the value arrives from.
        pred: BlockId,
    },
    /// Operand of statement `index` of `block`.
    Stmt {
        /// The block.
        block: BlockId,
        /// Position among the block's statements.
        index: usize,
    },
    /// Operand of the terminator of the block.
    Terminator(BlockId),
}

impl UseSite {
    /// The block holding the use. For a PHI operand this is the PHI's own
    /// block; the value is read at the end of `pred`.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        match self {
            UseSite::Phi { block, .. } | UseSite::Stmt { block, .. } | UseSite::Terminator(block) => {
                *block
            }
        }
    }
}

/// A function in SSA form.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    pub(crate) names: Vec<SsaName>,
    pub(crate) blocks: Vec<Block>,
    edges: Vec<Edge>,
    succ_edges: Vec<Vec<EdgeId>>,
    pred_edges: Vec<Vec<EdgeId>>,
    defs: Vec<Option<DefSite>>,
    uses: Vec<Vec<UseSite>>,
}

impl Function {
    pub(crate) fn from_parts(name: String, names: Vec<SsaName>, blocks: Vec<Block>) -> Self {
        let mut func = Self {
            name,
            names,
            blocks,
            edges: Vec::new(),
            succ_edges: Vec::new(),
            pred_edges: Vec::new(),
            defs: Vec::new(),
            uses: Vec::new(),
        };
        func.rebuild();
        func
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry block. Always block 0.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        NodeId::new(0)
    }

    /// All blocks, indexed by [`BlockId`].
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Looks up a block.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All SSA names, indexed by [`SsaNameId`].
    #[must_use]
    pub fn names(&self) -> &[SsaName] {
        &self.names
    }

    /// Number of allocated SSA names.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Looks up a name.
    #[must_use]
    pub fn ssa_name(&self, id: SsaNameId) -> Option<&SsaName> {
        self.names.get(id.index())
    }

    /// The type of a name.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this function.
    #[must_use]
    pub fn name_type(&self, id: SsaNameId) -> ScalarType {
        self.names[id.index()].ty
    }

    /// The type of an operand; literals take `context`.
    #[must_use]
    pub fn operand_type(&self, op: &Operand, context: ScalarType) -> ScalarType {
        match op {
            Operand::Name(n) => self.ssa_name(*n).map_or(context, SsaName::ty),
            Operand::Const(_) => context,
        }
    }

    /// The type two compared operands share.
    #[must_use]
    pub fn comparison_type(&self, lhs: &Operand, rhs: &Operand) -> Option<ScalarType> {
        lhs.as_name()
            .or_else(|| rhs.as_name())
            .and_then(|n| self.ssa_name(n))
            .map(SsaName::ty)
    }

    /// All edges.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Looks up an edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Edges leaving `block`.
    #[must_use]
    pub fn succ_edges(&self, block: BlockId) -> &[EdgeId] {
        self.succ_edges.get(block.index()).map_or(&[], Vec::as_slice)
    }

    /// Edges entering `block`.
    #[must_use]
    pub fn pred_edges(&self, block: BlockId) -> &[EdgeId] {
        self.pred_edges.get(block.index()).map_or(&[], Vec::as_slice)
    }

    /// The edge from `src` to `dst`, if one exists.
    #[must_use]
    pub fn find_edge(&self, src: BlockId, dst: BlockId) -> Option<EdgeId> {
        self.succ_edges(src)
            .iter()
            .copied()
            .find(|&e| self.edges[e].dst == dst)
    }

    /// Number of non-exceptional edges leaving `block`.
    #[must_use]
    pub fn normal_successor_count(&self, block: BlockId) -> usize {
        self.succ_edges(block)
            .iter()
            .filter(|&&e| !self.edges[e].is_abnormal())
            .count()
    }

    /// Whether `block` has an exceptional successor.
    #[must_use]
    pub fn has_abnormal_successor(&self, block: BlockId) -> bool {
        self.succ_edges(block)
            .iter()
            .any(|&e| self.edges[e].is_abnormal())
    }

    /// A critical edge leaves a block with several successors and enters a
    /// block with several predecessors.
    #[must_use]
    pub fn is_critical(&self, edge: EdgeId) -> bool {
        let e = &self.edges[edge];
        self.succ_edges(e.src).len() > 1 && self.pred_edges(e.dst).len() > 1
    }

    /// Where `name` is defined, or `None` if nothing defines it.
    #[must_use]
    pub fn def_site(&self, name: SsaNameId) -> Option<DefSite> {
        self.defs.get(name.index()).copied().flatten()
    }

    /// The right-hand side of the statement defining `name`.
    #[must_use]
    pub fn def_rhs(&self, name: SsaNameId) -> Option<&Rhs> {
        match self.def_site(name)? {
            DefSite::Stmt { block, index } => self.blocks[block.index()].stmts[index].rhs(),
            DefSite::Phi { .. } | DefSite::Default => None,
        }
    }

    /// The statement defining `name`.
    #[must_use]
    pub fn def_stmt(&self, name: SsaNameId) -> Option<&Stmt> {
        match self.def_site(name)? {
            DefSite::Stmt { block, index } => self.blocks[block.index()].stmts.get(index),
            DefSite::Phi { .. } | DefSite::Default => None,
        }
    }

    /// The PHI defining `name`.
    #[must_use]
    pub fn def_phi(&self, name: SsaNameId) -> Option<(BlockId, &Phi)> {
        match self.def_site(name)? {
            DefSite::Phi { block, index } => Some((block, &self.blocks[block.index()].phis[index])),
            DefSite::Stmt { .. } | DefSite::Default => None,
        }
    }

    /// Every occurrence of `name` as an operand.
    #[must_use]
    pub fn uses(&self, name: SsaNameId) -> &[UseSite] {
        self.uses.get(name.index()).map_or(&[], Vec::as_slice)
    }

    /// Whether `name` is read exactly once.
    #[must_use]
    pub fn has_single_use(&self, name: SsaNameId) -> bool {
        self.uses(name).len() == 1
    }

    /// Whether `name` flows into a PHI over an exceptional edge.
    ///
    /// Such names cannot be renamed without breaking the exceptional path.
    #[must_use]
    pub fn occurs_in_abnormal_phi(&self, name: SsaNameId) -> bool {
        self.uses(name).iter().any(|u| match u {
            UseSite::Phi { block, pred, .. } => self
                .find_edge(*pred, *block)
                .is_some_and(|e| self.edges[e].is_abnormal()),
            UseSite::Stmt { .. } | UseSite::Terminator(_) => false,
        })
    }

    /// Blocks reachable from the entry in reverse post-order.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        reverse_postorder(self, self.entry())
    }

    /// The dominator tree of the current CFG.
    #[must_use]
    pub fn dominators(&self) -> DominatorTree {
        compute_dominators(self, self.entry())
    }

    pub(crate) fn new_name(&mut self, ty: ScalarType, origin: NameOrigin) -> SsaNameId {
        let id = SsaNameId::new(self.names.len());
        self.names.push(SsaName { id, ty, origin });
        id
    }

    pub(crate) fn add_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        NodeId::new(self.blocks.len() - 1)
    }

    /// Recomputes edges and def-use chains from the blocks.
    pub(crate) fn rebuild(&mut self) {
        let block_count = self.blocks.len();
        self.edges.clear();
        self.succ_edges = vec![Vec::new(); block_count];
        self.pred_edges = vec![Vec::new(); block_count];

        for (index, block) in self.blocks.iter().enumerate() {
            let src = NodeId::new(index);
            let mut outgoing: Vec<(BlockId, EdgeFlags)> = Vec::new();
            let mut add = |dst: BlockId, flags: EdgeFlags| {
                match outgoing.iter_mut().find(|(d, _)| *d == dst) {
                    Some((_, existing)) => *existing |= flags,
                    None => outgoing.push((dst, flags)),
                }
            };
            match &block.terminator {
                Terminator::Branch {
                    on_true, on_false, ..
                } => {
                    add(*on_true, EdgeFlags::TRUE_VALUE);
                    add(*on_false, EdgeFlags::FALSE_VALUE);
                }
                other => other.targets().for_each(|t| add(t, EdgeFlags::empty())),
            }
            for &target in &block.abnormal {
                add(target, EdgeFlags::ABNORMAL);
            }

            for (dst, mut flags) in outgoing {
                if dst.index() >= block_count {
                    continue;
                }
                if block.split || self.blocks[dst.index()].split {
                    flags |= EdgeFlags::SPLIT;
                }
                let id = self.edges.len();
                self.edges.push(Edge { src, dst, flags });
                self.succ_edges[index].push(id);
                self.pred_edges[dst.index()].push(id);
            }
        }

        self.defs = vec![None; self.names.len()];
        self.uses = vec![Vec::new(); self.names.len()];
        for name in &self.names {
            if name.origin.is_default_def() {
                self.defs[name.id.index()] = Some(DefSite::Default);
            }
        }

        for (b, block) in self.blocks.iter().enumerate() {
            let block_id = NodeId::new(b);
            for (index, phi) in block.phis.iter().enumerate() {
                if let Some(slot) = self.defs.get_mut(phi.dest.index()) {
                    *slot = Some(DefSite::Phi {
                        block: block_id,
                        index,
                    });
                }
                for operand in &phi.operands {
                    if let Some(n) = operand.value.as_name() {
                        if let Some(list) = self.uses.get_mut(n.index()) {
                            list.push(UseSite::Phi {
                                block: block_id,
                                index,
                                pred: operand.predecessor,
                            });
                        }
                    }
                }
            }
            for (index, stmt) in block.stmts.iter().enumerate() {
                if let Some(dest) = stmt.dest() {
                    if let Some(slot) = self.defs.get_mut(dest.index()) {
                        *slot = Some(DefSite::Stmt {
                            block: block_id,
                            index,
                        });
                    }
                }
                for n in stmt.used_names() {
                    if let Some(list) = self.uses.get_mut(n.index()) {
                        list.push(UseSite::Stmt {
                            block: block_id,
                            index,
                        });
                    }
                }
            }
            for n in block.terminator.used_names() {
                if let Some(list) = self.uses.get_mut(n.index()) {
                    list.push(UseSite::Terminator(block_id));
                }
            }
        }
    }

    /// Checks the structural and typing rules the analysis relies on.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownBlock`] for a jump, case or PHI operand naming a missing block
    /// - [`Error::UnknownName`] for an operand naming an unallocated SSA name
    /// - [`Error::TypeMismatch`] when operands that must agree in type do not
    /// - [`Error::Malformed`] for double definitions, uses of undefined names,
    ///   PHIs that disagree with the predecessor list, bad switch tables and
    ///   literals that do not fit their type
    pub fn validate(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(malformed_error!("Function {} has no blocks", self.name));
        }
        for block in &self.blocks {
            for target in block.terminator.targets().chain(block.abnormal.iter().copied()) {
                if target.index() >= self.blocks.len() {
                    return Err(Error::UnknownBlock(target));
                }
            }
        }

        let mut defined = vec![false; self.names.len()];
        for name in &self.names {
            if name.origin.is_default_def() {
                defined[name.id.index()] = true;
            }
        }
        let mut define = |dest: SsaNameId| -> Result<()> {
            let slot = defined.get_mut(dest.index()).ok_or(Error::UnknownName(dest))?;
            if *slot {
                return Err(malformed_error!("SSA name {} defined more than once", dest));
            }
            *slot = true;
            Ok(())
        };
        for block in &self.blocks {
            for phi in &block.phis {
                define(phi.dest)?;
            }
            for stmt in &block.stmts {
                if let Some(dest) = stmt.dest() {
                    define(dest)?;
                }
            }
        }

        for (index, uses) in self.uses.iter().enumerate() {
            if !uses.is_empty() && !defined[index] {
                return Err(malformed_error!(
                    "SSA name {} is used but never defined",
                    SsaNameId::new(index)
                ));
            }
        }

        for (b, block) in self.blocks.iter().enumerate() {
            let block_id = NodeId::new(b);
            self.validate_phis(block_id, block)?;
            for stmt in &block.stmts {
                self.validate_stmt(stmt)?;
            }
            self.validate_terminator(&block.terminator)?;
        }
        Ok(())
    }

    fn check_name(&self, op: &Operand) -> Result<()> {
        match op {
            Operand::Name(n) if n.index() >= self.names.len() => Err(Error::UnknownName(*n)),
            _ => Ok(()),
        }
    }

    fn check_operand(&self, op: &Operand, expected: ScalarType) -> Result<()> {
        self.check_name(op)?;
        match op {
            Operand::Name(n) => {
                let found = self.name_type(*n);
                if found != expected {
                    return Err(Error::TypeMismatch {
                        name: *n,
                        expected,
                        found,
                    });
                }
            }
            Operand::Const(c) => {
                if expected.is_tracked() && !expected.fits(*c) {
                    return Err(malformed_error!("Literal {} does not fit type {}", c, expected));
                }
            }
        }
        Ok(())
    }

    fn check_comparison(&self, lhs: &Operand, rhs: &Operand) -> Result<()> {
        self.check_name(lhs)?;
        self.check_name(rhs)?;
        if let Some(ty) = self.comparison_type(lhs, rhs) {
            self.check_operand(lhs, ty)?;
            self.check_operand(rhs, ty)?;
        }
        Ok(())
    }

    fn validate_phis(&self, block_id: BlockId, block: &Block) -> Result<()> {
        let preds: Vec<BlockId> = self
            .pred_edges(block_id)
            .iter()
            .map(|&e| self.edges[e].src)
            .collect();
        for phi in &block.phis {
            let ty = self
                .ssa_name(phi.dest)
                .ok_or(Error::UnknownName(phi.dest))?
                .ty;
            if phi.operands.len() != preds.len() {
                return Err(malformed_error!(
                    "PHI for {} in {} has {} operands but the block has {} predecessors",
                    phi.dest,
                    block_id,
                    phi.operands.len(),
                    preds.len()
                ));
            }
            for operand in &phi.operands {
                if operand.predecessor.index() >= self.blocks.len() {
                    return Err(Error::UnknownBlock(operand.predecessor));
                }
                if !preds.contains(&operand.predecessor) {
                    return Err(malformed_error!(
                        "PHI for {} in {} names {} which is not a predecessor",
                        phi.dest,
                        block_id,
                        operand.predecessor
                    ));
                }
                self.check_operand(&operand.value, ty)?;
            }
            for pred in &preds {
                if phi.operand_from(*pred).is_none() {
                    return Err(malformed_error!(
                        "PHI for {} in {} lacks an operand from {}",
                        phi.dest,
                        block_id,
                        pred
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_stmt(&self, stmt: &Stmt) -> Result<()> {
        let (dest, rhs) = match stmt {
            Stmt::Assign { dest, rhs } => (*dest, rhs),
            Stmt::Store { ptr, value } => {
                self.check_name(ptr)?;
                return self.check_name(value);
            }
            Stmt::Nop => return Ok(()),
        };
        let ty = self.ssa_name(dest).ok_or(Error::UnknownName(dest))?.ty;
        for op in rhs.operands() {
            self.check_name(op)?;
        }
        match rhs {
            Rhs::Copy(op) => self.check_operand(op, ty),
            Rhs::Binary { op, lhs, rhs } => {
                self.check_operand(lhs, ty)?;
                match op {
                    BinaryOp::Shl | BinaryOp::Shr | BinaryOp::PointerPlus => Ok(()),
                    _ => self.check_operand(rhs, ty),
                }
            }
            Rhs::Compare { lhs, rhs, .. } => self.check_comparison(lhs, rhs),
            Rhs::Select {
                cond,
                then_value,
                else_value,
            } => {
                self.check_comparison(&cond.lhs, &cond.rhs)?;
                self.check_operand(then_value, ty)?;
                self.check_operand(else_value, ty)
            }
            Rhs::Assert { name, .. } => self.check_operand(&Operand::Name(*name), ty),
            Rhs::Unary { .. } | Rhs::AddressOf | Rhs::Load { .. } | Rhs::Call { .. } => Ok(()),
        }
    }

    fn validate_terminator(&self, terminator: &Terminator) -> Result<()> {
        match terminator {
            Terminator::Branch { cond, .. } => self.check_comparison(&cond.lhs, &cond.rhs),
            Terminator::Switch { index, cases, .. } => {
                self.check_name(index)?;
                let ty = index.as_name().map(|n| self.name_type(n));
                let mut previous: Option<i128> = None;
                for case in cases {
                    if case.low > case.high {
                        return Err(malformed_error!(
                            "Switch case [{}, {}] is empty",
                            case.low,
                            case.high
                        ));
                    }
                    if previous.is_some_and(|p| case.low <= p) {
                        return Err(malformed_error!(
                            "Switch cases must be sorted and disjoint at {}",
                            case.low
                        ));
                    }
                    if let Some(ty) = ty {
                        if !ty.fits(case.low) || !ty.fits(case.high) {
                            return Err(malformed_error!(
                                "Switch case [{}, {}] does not fit {}",
                                case.low,
                                case.high,
                                ty
                            ));
                        }
                    }
                    previous = Some(case.high);
                }
                Ok(())
            }
            Terminator::Return(Some(value)) => self.check_name(value),
            Terminator::Return(None) | Terminator::Jump(_) | Terminator::Unreachable => Ok(()),
        }
    }
}

impl GraphBase for Function {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for Function {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.succ_edges(node).iter().map(|&e| self.edges[e].dst)
    }
}

impl Predecessors for Function {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.pred_edges(node).iter().map(|&e| self.edges[e].src)
    }
}

impl RootedGraph for Function {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        let mut first = true;
        for name in &self.names {
            if let NameOrigin::Param { .. } = name.origin {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name.id, name.ty)?;
                first = false;
            }
        }
        writeln!(f, ")")?;
        for (b, block) in self.blocks.iter().enumerate() {
            writeln!(f, "  bb{b}:")?;
            for phi in &block.phis {
                writeln!(f, "    {phi}")?;
            }
            for stmt in &block.stmts {
                writeln!(f, "    {stmt}")?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, SsaFunctionBuilder};

    #[test]
    fn test_branch_to_same_block_merges_edge() {
        let func = SsaFunctionBuilder::new("same")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Lt, x, 0, 1, 1));
                f.block(1, |b| b.ret());
            })
            .unwrap();
        assert_eq!(func.edges().len(), 1);
        let flags = func.edges()[0].flags;
        assert!(flags.contains(EdgeFlags::TRUE_VALUE | EdgeFlags::FALSE_VALUE));
    }

    #[test]
    fn test_def_use_chains() {
        let mut y = None;
        let func = SsaFunctionBuilder::new("chains")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                f.block(0, |b| {
                    let v = b.add(x, x);
                    y = Some(v);
                    b.ret_val(v);
                });
            })
            .unwrap();
        let y = y.unwrap();
        let x = SsaNameId::new(0);
        assert_eq!(func.uses(x).len(), 2);
        assert!(func.has_single_use(y));
        assert_eq!(func.def_site(x), Some(DefSite::Default));
        assert!(matches!(func.def_site(y), Some(DefSite::Stmt { index: 0, .. })));
        assert!(matches!(func.def_rhs(y), Some(Rhs::Binary { .. })));
    }

    #[test]
    fn test_critical_edge() {
        let func = SsaFunctionBuilder::new("critical")
            .build_with(|f| {
                let x = f.param(ScalarType::i32());
                f.block(0, |b| b.branch(CmpOp::Eq, x, 0, 1, 2));
                f.block(1, |b| b.jump(2));
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let direct = func.find_edge(NodeId::new(0), NodeId::new(2)).unwrap();
        let via = func.find_edge(NodeId::new(0), NodeId::new(1)).unwrap();
        assert!(func.is_critical(direct));
        assert!(!func.is_critical(via));
    }

    #[test]
    fn test_validate_rejects_type_mismatch() {
        let result = SsaFunctionBuilder::new("mismatch").build_with(|f| {
            let a = f.param(ScalarType::i32());
            let b = f.param(ScalarType::u8());
            f.block(0, |blk| blk.branch(CmpOp::Lt, a, b, 1, 1));
            f.block(1, |blk| blk.ret());
        });
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_rejects_dangling_jump() {
        let result = SsaFunctionBuilder::new("dangling").build_with(|f| {
            f.block(0, |b| b.jump(3));
        });
        assert!(matches!(result, Err(Error::UnknownBlock(_))));
    }

    #[test]
    fn test_validate_rejects_phi_from_non_predecessor() {
        let result = SsaFunctionBuilder::new("badphi").build_with(|f| {
            let x = f.param(ScalarType::i32());
            f.block(0, |b| b.jump(1));
            f.block(1, |b| {
                b.phi(ScalarType::i32(), &[(2, x.into())]);
                b.ret();
            });
            f.block(2, |b| b.ret());
        });
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
