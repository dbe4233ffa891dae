//! Scalar evolution: how loop-header PHIs change per iteration.
//!
//! The engine widens loop PHIs to the type extremes to terminate, then asks
//! a [`ScevOracle`] whether the name is an affine induction variable. A
//! known direction plus a proof that the counter cannot wrap lets it pull
//! the bound facing away from the iteration direction back to the initial
//! value, and a trip count bounds the other side.

use strum::Display;

use crate::ir::{
    constant_value, strip_copies, CmpOp, Function, InductionVar, LoopInfo, Operand, ScalarType,
    SsaNameId, Terminator,
};

/// Which way an induction variable moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// Each iteration adds a positive step.
    Increasing,
    /// Each iteration adds a negative step.
    Decreasing,
    /// Not known.
    Unknown,
}

/// The evolution of a loop-header PHI: `init, init + step, init + 2*step, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evolution {
    /// The value on loop entry.
    pub init: Operand,
    /// Signed change per iteration.
    pub step: i128,
    /// Sign of `step`.
    pub direction: Direction,
    /// The sequence never wraps around the type.
    pub no_wrap: bool,
    /// Upper bound on the number of times the loop header executes.
    pub trip_count: Option<u128>,
}

/// Answers evolution queries for loop-header PHIs.
pub trait ScevOracle: Send + Sync {
    /// The evolution of `name`, a PHI at the header of `loop_info`.
    fn evolution(&self, func: &Function, loop_info: &LoopInfo, name: SsaNameId) -> Option<Evolution>;
}

/// An oracle that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScev;

impl ScevOracle for NoScev {
    fn evolution(&self, _func: &Function, _loop_info: &LoopInfo, _name: SsaNameId) -> Option<Evolution> {
        None
    }
}

/// Evolutions of `phi ± constant` counters.
///
/// Recognizes header PHIs with one initial value from outside the loop and
/// the same `phi + c` or `phi - c` update on every back edge. The trip count
/// comes from exit branches that compare the counter (or its update) with a
/// constant, provided the initial value is also constant.
#[derive(Debug, Clone, Copy)]
pub struct InductionScev {
    strict_overflow: bool,
}

impl Default for InductionScev {
    fn default() -> Self {
        Self::new()
    }
}

impl InductionScev {
    /// Creates the oracle, trusting that signed overflow is undefined.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            strict_overflow: true,
        }
    }

    /// Sets whether signed overflow being undefined proves a counter does
    /// not wrap.
    #[must_use]
    pub const fn with_strict_overflow(mut self, enabled: bool) -> Self {
        self.strict_overflow = enabled;
        self
    }
}

impl ScevOracle for InductionScev {
    fn evolution(&self, func: &Function, loop_info: &LoopInfo, name: SsaNameId) -> Option<Evolution> {
        let iv = loop_info
            .find_induction_vars(func)
            .into_iter()
            .find(|iv| iv.phi_result == name)?;
        let phi = func
            .block(loop_info.header)?
            .phis()
            .iter()
            .find(|p| p.dest == name)?;
        if phi
            .operands
            .iter()
            .any(|o| loop_info.contains(o.predecessor) && o.value != iv.update_value)
        {
            return None;
        }

        let step = iv.step()?;
        let direction = match step.signum() {
            1 => Direction::Increasing,
            -1 => Direction::Decreasing,
            _ => Direction::Unknown,
        };
        let ty = func.name_type(name);
        let trip_count = if step == 0 {
            None
        } else {
            trip_count(func, loop_info, &iv, step, ty)
        };
        let no_wrap = (self.strict_overflow && ty.overflow_undefined()) || trip_count.is_some();

        Some(Evolution {
            init: iv.init_value,
            step,
            direction,
            no_wrap,
            trip_count,
        })
    }
}

/// The smallest header execution count any counted exit allows.
///
/// An exit only counts when its block runs on every iteration, so it must
/// dominate every latch. Counts whose sequence would leave the type are
/// discarded, which makes a known count also a proof of no wrapping.
fn trip_count(
    func: &Function,
    loop_info: &LoopInfo,
    iv: &InductionVar,
    step: i128,
    ty: ScalarType,
) -> Option<u128> {
    let init = constant_value(func, iv.init_value)?;
    let update = iv.update_value.as_name().map(|n| strip_copies(func, n));
    let dom = func.dominators();

    let base_of = |operand: &Operand| -> Option<i128> {
        let name = strip_copies(func, operand.as_name()?);
        if name == iv.phi_result {
            Some(init)
        } else if Some(name) == update {
            init.checked_add(step)
        } else {
            None
        }
    };

    let mut best: Option<u128> = None;
    for exit in &loop_info.exits {
        if !loop_info
            .latches
            .iter()
            .all(|&latch| dom.dominates(exit.exiting_block, latch))
        {
            continue;
        }
        let Some(block) = func.block(exit.exiting_block) else {
            continue;
        };
        let Terminator::Branch {
            cond,
            on_true,
            on_false,
        } = block.terminator()
        else {
            continue;
        };
        let op = match (loop_info.contains(*on_true), loop_info.contains(*on_false)) {
            (true, false) => cond.op,
            (false, true) => cond.op.invert(),
            _ => continue,
        };

        let oriented = if let Some(base) = base_of(&cond.lhs) {
            constant_value(func, cond.rhs).map(|limit| (base, op, limit))
        } else if let Some(base) = base_of(&cond.rhs) {
            constant_value(func, cond.lhs).map(|limit| (base, op.swap(), limit))
        } else {
            None
        };
        let Some((base, op, limit)) = oriented else {
            continue;
        };
        let Some(iterations) = continuing_iterations(base, step, op, limit) else {
            continue;
        };

        let last = i128::try_from(iterations)
            .ok()
            .and_then(|m| step.checked_mul(m))
            .and_then(|delta| base.checked_add(delta));
        if !ty.fits(base) || !last.is_some_and(|v| ty.fits(v)) {
            continue;
        }
        let Some(count) = iterations.checked_add(1) else {
            continue;
        };
        best = Some(best.map_or(count, |b| b.min(count)));
    }
    best
}

/// How many consecutive `k >= 0` satisfy `base + step * k op limit`, in
/// exact arithmetic. `None` when the condition keeps holding until the
/// value would leave any finite type.
fn continuing_iterations(base: i128, step: i128, op: CmpOp, limit: i128) -> Option<u128> {
    if !op.eval(base, limit) {
        return Some(0);
    }
    if op == CmpOp::Eq {
        return Some(1);
    }
    let stride = step.unsigned_abs();
    let distance = if step > 0 {
        limit.checked_sub(base)?
    } else {
        base.checked_sub(limit)?
    };
    let distance = u128::try_from(distance).ok()?;

    match (op, step > 0) {
        (CmpOp::Lt, true) | (CmpOp::Gt, false) => Some(distance.div_ceil(stride)),
        (CmpOp::Le, true) | (CmpOp::Ge, false) => Some(distance / stride + 1),
        (CmpOp::Ne, _) if distance % stride == 0 => Some(distance / stride),
        _ => None,
    }
}
