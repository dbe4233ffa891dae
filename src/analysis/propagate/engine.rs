//! The propagation worklist.
//!
//! A sparse conditional propagator in the Wegman-Zadeck style, with ranges
//! in place of constants:
//!
//! - **CFG worklist**: edges that just became executable. Popping one
//!   simulates the PHIs of its destination, and on the first visit of the
//!   block also its statements and terminator.
//! - **SSA worklists**: names whose range changed. Names that reached
//!   varying are drained before names that merely moved.
//!
//! A statement whose result is varying is settled and never simulated
//! again. Branches and switches whose outcome cannot be decided mark every
//! outgoing edge executable.
//!
//! # Termination
//!
//! PHIs revisited with the same number of executable incoming edges widen
//! any bound that moved straight to the type extreme, or to an overflow
//! infinity when the value may overflow. A loop-header PHI is then
//! narrowed again through the scalar-evolution oracle. The visit cap of
//! [`VrpConfig::max_visits`] is a last resort only.

use std::collections::{BTreeSet, HashSet, VecDeque};

use log::{trace, warn};

use crate::{
    analysis::{
        propagate::{
            scev::{Direction, ScevOracle},
            table::RangeTable,
        },
        range::{
            compare_values, evaluate_condition,
            extract::{extract_rhs, op_with_constant_singleton, operand_range},
            extract_binary, meet, Bound, RangeKind, RangeQuery, ValueOrder, ValueRange,
        },
    },
    config::VrpConfig,
    ir::{
        detect_loops, BinaryOp, BlockId, EdgeId, Function, LoopForest, Operand, Rhs, ScalarType,
        SsaNameId, Stmt, SwitchCase, Terminator, UseSite,
    },
    utils::graph::RootedGraph,
};

/// Something the engine simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Site {
    Phi { block: BlockId, index: usize },
    Stmt { block: BlockId, index: usize },
    Terminator(BlockId),
}

/// What a visit found out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Nothing changed.
    NotInteresting,
    /// The result moved, or a single outgoing edge was decided.
    Interesting,
    /// The result is varying, or every outgoing edge may be taken.
    Varying,
}

/// The state the engine leaves behind.
#[derive(Debug)]
pub(crate) struct Propagated {
    pub(crate) table: RangeTable,
    pub(crate) executable_edges: Vec<bool>,
    pub(crate) executable_blocks: Vec<bool>,
    pub(crate) visits: usize,
    pub(crate) converged: bool,
}

/// Range propagation over one function.
pub(crate) struct Engine<'a> {
    func: &'a Function,
    config: &'a VrpConfig,
    scev: &'a dyn ScevOracle,
    loops: LoopForest,
    table: RangeTable,
    /// Edges known to be taken on some execution.
    executable_edges: Vec<bool>,
    /// Blocks whose statements have been simulated.
    executable_blocks: Vec<bool>,
    /// Edges whose destination dominates their source.
    back_edges: Vec<bool>,
    cfg_worklist: VecDeque<EdgeId>,
    varying_worklist: VecDeque<SsaNameId>,
    interesting_worklist: VecDeque<SsaNameId>,
    queued: Vec<bool>,
    /// Sites whose result can no longer change.
    settled: HashSet<Site>,
    /// Executable incoming edges of each PHI at its previous visit.
    phi_edges: Vec<usize>,
    visits: usize,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(func: &'a Function, config: &'a VrpConfig, scev: &'a dyn ScevOracle) -> Self {
        let dom = func.dominators();
        let loops = detect_loops(func, &dom);
        let back_edges = func
            .edges()
            .iter()
            .map(|e| dom.dominates(e.dst, e.src))
            .collect();
        Self {
            func,
            config,
            scev,
            loops,
            table: RangeTable::new(func, config),
            executable_edges: vec![false; func.edges().len()],
            executable_blocks: vec![false; func.block_count()],
            back_edges,
            cfg_worklist: VecDeque::new(),
            varying_worklist: VecDeque::new(),
            interesting_worklist: VecDeque::new(),
            queued: vec![false; func.name_count()],
            settled: HashSet::new(),
            phi_edges: vec![0; func.name_count()],
            visits: 0,
        }
    }

    /// Runs to a fixpoint, or until the visit cap.
    pub(crate) fn run(mut self) -> Propagated {
        self.initialize();
        if self.func.block_count() > 0 {
            self.simulate_block(self.func.entry());
        }
        let converged = self.propagate();

        if !converged {
            warn!(
                "range propagation of {} stopped after {} visits; every name is now varying",
                self.func.name(),
                self.visits
            );
            for index in 0..self.func.name_count() {
                self.table.update(SsaNameId::new(index), ValueRange::varying());
            }
            self.executable_edges.fill(true);
            self.executable_blocks.fill(true);
        }

        Propagated {
            table: self.table,
            executable_edges: self.executable_edges,
            executable_blocks: self.executable_blocks,
            visits: self.visits,
            converged,
        }
    }

    /// Settles every site that can never produce a useful range.
    fn initialize(&mut self) {
        let func = self.func;
        for (b, block) in func.blocks().iter().enumerate() {
            let block_id = BlockId::new(b);
            for (index, phi) in block.phis().iter().enumerate() {
                if !self.table.ty(phi.dest).is_tracked() {
                    self.table.update(phi.dest, ValueRange::varying());
                    self.settled.insert(Site::Phi {
                        block: block_id,
                        index,
                    });
                }
            }
            for (index, stmt) in block.stmts().iter().enumerate() {
                let interesting = match stmt {
                    Stmt::Assign { dest, rhs } => {
                        self.table.ty(*dest).is_tracked() && !matches!(rhs, Rhs::Load { .. })
                    }
                    Stmt::Store { .. } | Stmt::Nop => false,
                };
                if !interesting {
                    if let Some(dest) = stmt.dest() {
                        self.table.update(dest, ValueRange::varying());
                    }
                    self.settled.insert(Site::Stmt {
                        block: block_id,
                        index,
                    });
                }
            }
        }
    }

    /// Drains the worklists. Returns `false` when the visit cap was hit.
    fn propagate(&mut self) -> bool {
        loop {
            if self.visits > self.config.max_visits {
                return false;
            }
            if let Some(edge) = self.cfg_worklist.pop_front() {
                if let Some(dst) = self.func.edge(edge).map(|e| e.dst) {
                    self.simulate_block(dst);
                }
                continue;
            }
            let next = self
                .varying_worklist
                .pop_front()
                .or_else(|| self.interesting_worklist.pop_front());
            match next {
                Some(name) => self.process_name(name),
                None => return true,
            }
        }
    }

    fn add_edge(&mut self, edge: EdgeId) {
        if let Some(flag) = self.executable_edges.get_mut(edge) {
            if !*flag {
                *flag = true;
                self.cfg_worklist.push_back(edge);
            }
        }
    }

    fn add_edge_to(&mut self, src: BlockId, dst: BlockId) {
        if let Some(edge) = self.func.find_edge(src, dst) {
            self.add_edge(edge);
        }
    }

    fn queue_name(&mut self, name: SsaNameId, varying: bool) {
        let Some(queued) = self.queued.get_mut(name.index()) else {
            return;
        };
        if *queued {
            return;
        }
        *queued = true;
        if varying {
            self.varying_worklist.push_back(name);
        } else {
            self.interesting_worklist.push_back(name);
        }
    }

    /// Simulates a block reached over a new edge.
    ///
    /// PHIs are revisited every time; statements only the first time.
    fn simulate_block(&mut self, block: BlockId) {
        let func = self.func;
        let Some(bb) = func.block(block) else {
            return;
        };
        for index in 0..bb.phis().len() {
            self.simulate(Site::Phi { block, index });
        }
        if self.executable_blocks[block.index()] {
            return;
        }
        self.executable_blocks[block.index()] = true;
        trace!("block {block} of {} is executable", func.name());

        for index in 0..bb.stmts().len() {
            self.simulate(Site::Stmt { block, index });
        }

        let conditional = matches!(
            bb.terminator(),
            Terminator::Branch { .. } | Terminator::Switch { .. }
        );
        for &edge in func.succ_edges(block) {
            let abnormal = func.edge(edge).is_some_and(|e| e.is_abnormal());
            if abnormal || !conditional {
                self.add_edge(edge);
            }
        }
        if conditional {
            self.simulate(Site::Terminator(block));
        }
    }

    /// Revisits every executable site reading `name`.
    fn process_name(&mut self, name: SsaNameId) {
        if let Some(queued) = self.queued.get_mut(name.index()) {
            *queued = false;
        }
        let mut sites: Vec<Site> = Vec::new();
        for site in self.func.uses(name) {
            let site = match *site {
                UseSite::Phi { block, index, .. } => Site::Phi { block, index },
                UseSite::Stmt { block, index } => Site::Stmt { block, index },
                UseSite::Terminator(block) => Site::Terminator(block),
            };
            if !sites.contains(&site) {
                sites.push(site);
            }
        }
        for site in sites {
            let block = match site {
                Site::Phi { block, .. } | Site::Stmt { block, .. } | Site::Terminator(block) => block,
            };
            if self.executable_blocks[block.index()] {
                self.simulate(site);
            }
        }
    }

    fn simulate(&mut self, site: Site) {
        if self.settled.contains(&site) {
            return;
        }
        self.visits += 1;

        let (status, output) = match site {
            Site::Phi { block, index } => self.visit_phi(block, index),
            Site::Stmt { block, index } => self.visit_stmt(block, index),
            Site::Terminator(block) => (self.visit_terminator(block), None),
        };

        match status {
            Status::Varying => {
                self.settled.insert(site);
                if let Some(name) = output {
                    self.queue_name(name, true);
                }
                if let Site::Terminator(block) = site {
                    let func = self.func;
                    for &edge in func.succ_edges(block) {
                        self.add_edge(edge);
                    }
                }
            }
            Status::Interesting => {
                if let Some(name) = output {
                    self.queue_name(name, false);
                }
            }
            Status::NotInteresting => {}
        }
    }

    /// Stores a new range and classifies the change.
    fn update(&mut self, name: SsaNameId, vr: ValueRange) -> Status {
        if !self.table.update(name, vr) {
            return Status::NotInteresting;
        }
        let stored = self.table.range_of(name);
        trace!("{name} is now {stored}");
        if stored.is_varying() {
            Status::Varying
        } else {
            Status::Interesting
        }
    }

    fn visit_stmt(&mut self, block: BlockId, index: usize) -> (Status, Option<SsaNameId>) {
        let func = self.func;
        let Some(Stmt::Assign { dest, rhs }) = func
            .block(block)
            .and_then(|bb| bb.stmts().get(index))
        else {
            return (Status::Varying, None);
        };
        let ty = self.table.ty(*dest);
        let vr = extract_rhs(&self.table, ty, rhs, self.config.non_call_exceptions);
        trace!("visiting {dest} = {rhs}: {vr}");
        (self.update(*dest, vr), Some(*dest))
    }

    /// Decides which outgoing edge a branch or switch takes.
    fn visit_terminator(&mut self, block: BlockId) -> Status {
        let func = self.func;
        let Some(bb) = func.block(block) else {
            return Status::Varying;
        };
        let taken = match bb.terminator() {
            Terminator::Branch {
                cond,
                on_true,
                on_false,
            } => {
                let mut sop = false;
                match evaluate_condition(&self.table, cond.op, &cond.lhs, &cond.rhs, false, &mut sop) {
                    Some(_) if sop => {
                        trace!("ignoring {cond} in {block}: relies on undefined overflow");
                        None
                    }
                    Some(true) => Some(*on_true),
                    Some(false) => Some(*on_false),
                    None => None,
                }
            }
            Terminator::Switch {
                index,
                cases,
                default,
            } => self.switch_target(index, cases, *default),
            Terminator::Jump(_) | Terminator::Return(_) | Terminator::Unreachable => None,
        };

        match taken {
            Some(target) => {
                trace!("{block} always continues to {target}");
                self.add_edge_to(block, target);
                Status::Interesting
            }
            None => Status::Varying,
        }
    }

    /// The single destination a switch can reach, if there is one.
    fn switch_target(&self, index: &Operand, cases: &[SwitchCase], default: BlockId) -> Option<BlockId> {
        let intervals: Vec<(i128, i128)> = match *index {
            Operand::Const(c) => vec![(c, c)],
            Operand::Name(name) => {
                let ty = self.table.ty(name);
                let vr = self.table.range_of(name);
                if vr.is_symbolic() {
                    return None;
                }
                let (lo, hi) = vr.const_bounds(ty)?;
                if vr.is_range() {
                    vec![(lo, hi)]
                } else {
                    [(ty.min_value(), lo - 1), (hi + 1, ty.max_value())]
                        .into_iter()
                        .filter(|(l, h)| l <= h)
                        .collect()
                }
            }
        };

        let mut targets: Vec<BlockId> = Vec::new();
        let mut reaches_default = false;
        for (lo, hi) in intervals {
            let mut uncovered = lo;
            for case in cases.iter().filter(|c| c.high >= lo && c.low <= hi) {
                if case.low > uncovered {
                    reaches_default = true;
                }
                uncovered = uncovered.max(case.high + 1);
                if !targets.contains(&case.target) {
                    targets.push(case.target);
                }
            }
            if uncovered <= hi {
                reaches_default = true;
            }
        }
        if reaches_default && !targets.contains(&default) {
            targets.push(default);
        }
        match targets.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    fn visit_phi(&mut self, block: BlockId, index: usize) -> (Status, Option<SsaNameId>) {
        let func = self.func;
        let Some(phi) = func.block(block).and_then(|bb| bb.phis().get(index)) else {
            return (Status::Varying, None);
        };
        let dest = phi.dest;
        let ty = self.table.ty(dest);

        let mut result: Option<ValueRange> = None;
        let mut edges = 0;
        for operand in &phi.operands {
            let Some(edge) = func.find_edge(operand.predecessor, block) else {
                continue;
            };
            if !self.executable_edges[edge] {
                continue;
            }
            edges += 1;
            let arg = match operand.value {
                Operand::Const(c) => ValueRange::singleton(c),
                Operand::Name(name) => {
                    let vr = self.table.range_of(name);
                    if self.back_edges[edge] {
                        // Equivalences and symbolic bounds must not flow
                        // around a loop.
                        if vr.is_symbolic() {
                            ValueRange::varying()
                        } else if vr.is_bounded() {
                            vr.with_equiv(BTreeSet::new())
                        } else {
                            vr
                        }
                    } else if vr.is_varying() {
                        ValueRange::same_as(name)
                    } else {
                        vr
                    }
                }
            };
            let merged = match result {
                None => arg,
                Some(acc) => meet(&acc, &arg, ty),
            };
            let varying = merged.is_varying();
            result = Some(merged);
            if varying {
                break;
            }
        }

        let mut result = result.unwrap_or_else(ValueRange::undefined);
        trace!("visiting {phi}: {result}");
        if result.is_varying() {
            return self.phi_varying(block, dest, ty);
        }

        if !result.is_undefined() {
            let old_edges = std::mem::replace(&mut self.phi_edges[dest.index()], edges);
            let old = self.table.range_of(dest);
            if edges > 0 && phi.operands.len() > 1 && edges == old_edges && !old.is_undefined() {
                match self.widen(block, dest, ty, &old, result) {
                    Some(widened) => result = widened,
                    None => return self.phi_varying(block, dest, ty),
                }
            }
        }
        (self.update(dest, result), Some(dest))
    }

    /// A PHI whose merge lost everything. At a loop header the evolution
    /// of the name may still bound it.
    fn phi_varying(&mut self, block: BlockId, dest: SsaNameId, ty: ScalarType) -> (Status, Option<SsaNameId>) {
        if self.loops.loop_for_header(block).is_some() {
            let vr = self.adjust_with_scev(block, dest, ty, ValueRange::varying());
            if !vr.is_varying() && !(vr.min().is_min(ty) && vr.max().is_max(ty)) {
                return (self.update(dest, vr), Some(dest));
            }
        }
        self.update(dest, ValueRange::varying());
        (Status::Varying, Some(dest))
    }

    /// Widens a PHI result that moved since the previous visit. `None`
    /// means the PHI goes to varying.
    fn widen(
        &self,
        block: BlockId,
        dest: SsaNameId,
        ty: ScalarType,
        old: &ValueRange,
        new: ValueRange,
    ) -> Option<ValueRange> {
        if old.is_varying() {
            return None;
        }
        let min_moved = compare_values(&old.min(), &new.min(), ty) != ValueOrder::Equal;
        let max_moved = compare_values(&old.max(), &new.max(), ty) != ValueOrder::Equal;
        if !min_moved && !max_moved {
            return Some(new);
        }
        if old.is_anti_range() && new.is_anti_range() && !ty.is_pointer() {
            let widened = widen_anti_range(&new, min_moved, max_moved, ty)?;
            trace!("widening {dest} from {old} to {widened}");
            return Some(widened);
        }
        if !old.is_range() || !new.is_range() || ty.is_pointer() {
            return None;
        }

        let may_overflow = ty.overflow_undefined() && self.may_overflow(block, dest);
        let mut min = new.min();
        let mut max = new.max();
        if min_moved {
            min = if may_overflow {
                Bound::NegInf
            } else {
                Bound::Const(ty.min_value())
            };
        }
        if max_moved {
            max = if may_overflow {
                Bound::PosInf
            } else {
                Bound::Const(ty.max_value())
            };
        }
        trace!("widening {dest} from {old} to [{min}, {max}]");
        let mut widened = ValueRange::range(min, max).with_equiv(new.equiv().clone());
        if self.loops.loop_for_header(block).is_some() {
            widened = self.adjust_with_scev(block, dest, ty, widened);
        }

        if (widened.min().is_min(ty) && widened.max().is_max(ty))
            || compare_values(&widened.min(), &widened.max(), ty) == ValueOrder::Greater
        {
            return None;
        }
        Some(widened)
    }

    /// Whether the PHI `dest` at `block` may overflow, as far as the
    /// oracle knows.
    fn may_overflow(&self, block: BlockId, dest: SsaNameId) -> bool {
        if !self.config.use_scev {
            return true;
        }
        let Some(loop_info) = self.loops.loop_for_header(block) else {
            return true;
        };
        !self
            .scev
            .evolution(self.func, loop_info, dest)
            .is_some_and(|ev| ev.no_wrap)
    }

    /// Narrows a widened loop-header PHI using its evolution.
    fn adjust_with_scev(&self, block: BlockId, dest: SsaNameId, ty: ScalarType, vr: ValueRange) -> ValueRange {
        if vr.is_anti_range() || !self.config.use_scev {
            return vr;
        }
        let Some(loop_info) = self.loops.loop_for_header(block) else {
            return vr;
        };
        let Some(evolution) = self.scev.evolution(self.func, loop_info, dest) else {
            return vr;
        };
        if evolution.direction == Direction::Unknown || !evolution.no_wrap {
            return vr;
        }

        let init = match (
            evolution.init,
            op_with_constant_singleton(&self.table, &evolution.init),
        ) {
            (_, Some(c)) => Bound::Const(c),
            (Operand::Name(n), None) => Bound::name(n),
            (Operand::Const(c), None) => Bound::Const(c),
        };

        let mut tmin = Bound::Const(ty.min_value());
        let mut tmax = Bound::Const(ty.max_value());
        if let Some(trips) = evolution.trip_count {
            let init_vr = operand_range(&self.table, &evolution.init);
            let delta = i128::try_from(trips.saturating_sub(1))
                .ok()
                .and_then(|n| evolution.step.checked_mul(n));
            if let Some(delta) = delta.filter(|_| init_vr.is_range()) {
                if ty.fits(delta) || ty.is_unsigned() {
                    let last = extract_binary(
                        BinaryOp::Add,
                        &init_vr,
                        &ValueRange::singleton(ty.wrap(delta)),
                        ty,
                    );
                    if last.is_range() {
                        tmin = last.min();
                        tmax = last.max();
                    }
                }
            }
        }

        let decreasing = evolution.direction == Direction::Decreasing;
        let (min, max) = if vr.is_varying() || vr.is_undefined() {
            if decreasing {
                (tmin, init)
            } else {
                (init, tmax)
            }
        } else {
            let (mut min, mut max) = (vr.min(), vr.max());
            if decreasing {
                if compare_values(&init, &max, ty) == ValueOrder::Less {
                    max = init;
                }
                if min == Bound::NegInf || compare_values(&min, &tmin, ty) == ValueOrder::Less {
                    min = tmin;
                }
            } else {
                if compare_values(&init, &min, ty) == ValueOrder::Greater {
                    min = init;
                }
                if max == Bound::PosInf || compare_values(&tmax, &max, ty) == ValueOrder::Less {
                    max = tmax;
                }
            }
            (min, max)
        };

        if compare_values(&min, &max, ty) == ValueOrder::Greater {
            return vr;
        }
        trace!("scalar evolution narrows {dest} to [{min}, {max}]");
        ValueRange::range(min, max).with_equiv(vr.equiv().clone())
    }
}

/// Collapses the excluded interval of a moving anti-range onto the bound
/// that held still. `None` once both bounds have moved.
fn widen_anti_range(new: &ValueRange, min_moved: bool, max_moved: bool, ty: ScalarType) -> Option<ValueRange> {
    let kept = match (min_moved, max_moved) {
        (true, false) => new.max(),
        (false, true) => new.min(),
        _ => return None,
    };
    let widened = ValueRange::canonical(RangeKind::AntiRange, kept, kept, ty);
    if widened.is_varying() {
        return None;
    }
    Some(widened.with_equiv(new.equiv().clone()))
}
