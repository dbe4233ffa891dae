//! Statements, PHI nodes and block terminators.

use std::fmt;

use crate::ir::{BinaryOp, BlockId, CmpOp, Condition, Operand, Predicate, SsaNameId, UnaryOp};

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rhs {
    /// Plain copy of an operand.
    Copy(Operand),
    /// `op operand`.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Operand,
    },
    /// `lhs op rhs`.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// A comparison producing a truth value.
    Compare {
        /// The comparison.
        op: CmpOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// `cond ? then_value : else_value`.
    Select {
        /// The tested condition.
        cond: Condition,
        /// Value when the condition holds.
        then_value: Operand,
        /// Value otherwise.
        else_value: Operand,
    },
    /// Assertion: the result is `name`, known to satisfy `predicate`.
    ///
    /// Only the assertion synthesizer creates these.
    Assert {
        /// The name being refined.
        name: SsaNameId,
        /// What holds at this point.
        predicate: Predicate,
    },
    /// Address of a local object; never null.
    AddressOf,
    /// Load through a pointer.
    Load {
        /// The address read.
        ptr: Operand,
    },
    /// Call to an opaque function.
    Call {
        /// Arguments.
        args: Vec<Operand>,
        /// The callee is declared to return a non-null pointer.
        returns_nonnull: bool,
    },
}

impl Rhs {
    /// Iterates the operands of this right-hand side. For an assertion this
    /// is the limit only; see [`Rhs::used_names`] for the subject.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> + '_ {
        let (fixed, rest): ([Option<&Operand>; 3], &[Operand]) = match self {
            Rhs::Copy(o) | Rhs::Unary { operand: o, .. } => ([Some(o), None, None], &[]),
            Rhs::Binary { lhs, rhs, .. } | Rhs::Compare { lhs, rhs, .. } => {
                ([Some(lhs), Some(rhs), None], &[])
            }
            Rhs::Select {
                cond,
                then_value,
                else_value,
            } => (
                [Some(&cond.lhs), Some(&cond.rhs), Some(then_value)],
                std::slice::from_ref(else_value),
            ),
            Rhs::Assert { predicate, .. } => match predicate {
                Predicate::Compare { limit, .. } => ([Some(limit), None, None], &[]),
                Predicate::Within { .. } => ([None, None, None], &[]),
            },
            Rhs::AddressOf => ([None, None, None], &[]),
            Rhs::Load { ptr } => ([Some(ptr), None, None], &[]),
            Rhs::Call { args, .. } => ([None, None, None], args.as_slice()),
        };
        fixed.into_iter().flatten().chain(rest.iter())
    }

    /// Iterates every SSA name read by this right-hand side.
    pub fn used_names(&self) -> impl Iterator<Item = SsaNameId> + '_ {
        let subject = match self {
            Rhs::Assert { name, .. } => Some(*name),
            _ => None,
        };
        subject
            .into_iter()
            .chain(self.operands().filter_map(Operand::as_name))
    }

    /// Applies `f` to every operand slot, including an assertion's subject.
    pub fn rewrite_operands(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Rhs::Copy(o) | Rhs::Unary { operand: o, .. } | Rhs::Load { ptr: o } => f(o),
            Rhs::Binary { lhs, rhs, .. } | Rhs::Compare { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Rhs::Select {
                cond,
                then_value,
                else_value,
            } => {
                f(&mut cond.lhs);
                f(&mut cond.rhs);
                f(then_value);
                f(else_value);
            }
            Rhs::Assert { name, predicate } => {
                let mut subject = Operand::Name(*name);
                f(&mut subject);
                if let Operand::Name(renamed) = subject {
                    *name = renamed;
                }
                if let Predicate::Compare { limit, .. } = predicate {
                    f(limit);
                }
            }
            Rhs::AddressOf => {}
            Rhs::Call { args, .. } => args.iter_mut().for_each(f),
        }
    }
}

impl fmt::Display for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Copy(o) => write!(f, "{o}"),
            Rhs::Unary { op, operand } => write!(f, "{op} {operand}"),
            Rhs::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Rhs::Compare { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Rhs::Select {
                cond,
                then_value,
                else_value,
            } => write!(f, "{cond} ? {then_value} : {else_value}"),
            Rhs::Assert { name, predicate } => write!(f, "ASSERT_EXPR <{name}, {name} {predicate}>"),
            Rhs::AddressOf => write!(f, "&local"),
            Rhs::Load { ptr } => write!(f, "*{ptr}"),
            Rhs::Call {
                args,
                returns_nonnull,
            } => {
                write!(f, "call(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")?;
                if *returns_nonnull {
                    write!(f, " [nonnull]")?;
                }
                Ok(())
            }
        }
    }
}

/// A statement inside a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `dest = rhs`.
    Assign {
        /// The defined name.
        dest: SsaNameId,
        /// The computation.
        rhs: Rhs,
    },
    /// `*ptr = value`.
    Store {
        /// The address written; dereferencing it proves it non-null.
        ptr: Operand,
        /// The stored value.
        value: Operand,
    },
    /// No operation.
    Nop,
}

impl Stmt {
    /// The name this statement defines.
    #[must_use]
    pub fn dest(&self) -> Option<SsaNameId> {
        match self {
            Stmt::Assign { dest, .. } => Some(*dest),
            Stmt::Store { .. } | Stmt::Nop => None,
        }
    }

    /// The right-hand side of an assignment.
    #[must_use]
    pub fn rhs(&self) -> Option<&Rhs> {
        match self {
            Stmt::Assign { rhs, .. } => Some(rhs),
            Stmt::Store { .. } | Stmt::Nop => None,
        }
    }

    /// Whether this is an assertion inserted by the synthesizer.
    #[must_use]
    pub fn is_assert(&self) -> bool {
        matches!(
            self,
            Stmt::Assign {
                rhs: Rhs::Assert { .. },
                ..
            }
        )
    }

    /// The pointer this statement dereferences, if any.
    #[must_use]
    pub fn dereferenced(&self) -> Option<SsaNameId> {
        match self {
            Stmt::Store { ptr, .. }
            | Stmt::Assign {
                rhs: Rhs::Load { ptr },
                ..
            } => ptr.as_name(),
            _ => None,
        }
    }

    /// Iterates every SSA name read by this statement.
    pub fn used_names(&self) -> Box<dyn Iterator<Item = SsaNameId> + '_> {
        match self {
            Stmt::Assign { rhs, .. } => Box::new(rhs.used_names()),
            Stmt::Store { ptr, value } => Box::new(
                [ptr, value]
                    .into_iter()
                    .filter_map(Operand::as_name),
            ),
            Stmt::Nop => Box::new(std::iter::empty()),
        }
    }

    /// Applies `f` to every operand slot read by this statement.
    pub fn rewrite_operands(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Stmt::Assign { rhs, .. } => rhs.rewrite_operands(f),
            Stmt::Store { ptr, value } => {
                f(ptr);
                f(value);
            }
            Stmt::Nop => {}
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { dest, rhs } => write!(f, "{dest} = {rhs}"),
            Stmt::Store { ptr, value } => write!(f, "*{ptr} = {value}"),
            Stmt::Nop => write!(f, "nop"),
        }
    }
}

/// One arm of a switch: values in `[low, high]` jump to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    /// Smallest matching value.
    pub low: i128,
    /// Largest matching value; equal to `low` for a single label.
    pub high: i128,
    /// Destination block.
    pub target: BlockId,
}

impl SwitchCase {
    /// Whether `value` selects this case.
    #[must_use]
    pub const fn matches(&self, value: i128) -> bool {
        value >= self.low && value <= self.high
    }
}

/// How control leaves a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional transfer.
    Jump(BlockId),
    /// Two-way branch on a comparison.
    Branch {
        /// The tested condition.
        cond: Condition,
        /// Taken when the condition holds.
        on_true: BlockId,
        /// Taken otherwise.
        on_false: BlockId,
    },
    /// Multi-way branch on an integer.
    Switch {
        /// The scrutinee.
        index: Operand,
        /// Case arms, sorted by `low` and non-overlapping.
        cases: Vec<SwitchCase>,
        /// Taken when no case matches.
        default: BlockId,
    },
    /// Function exit.
    Return(Option<Operand>),
    /// Control never reaches the end of this block.
    Unreachable,
}

impl Terminator {
    /// Iterates the destination blocks, possibly with repeats.
    pub fn targets(&self) -> Box<dyn Iterator<Item = BlockId> + '_> {
        match self {
            Terminator::Jump(t) => Box::new(std::iter::once(*t)),
            Terminator::Branch {
                on_true, on_false, ..
            } => Box::new([*on_true, *on_false].into_iter()),
            Terminator::Switch { cases, default, .. } => Box::new(
                cases
                    .iter()
                    .map(|c| c.target)
                    .chain(std::iter::once(*default)),
            ),
            Terminator::Return(_) | Terminator::Unreachable => Box::new(std::iter::empty()),
        }
    }

    /// Iterates every SSA name read by the terminator.
    pub fn used_names(&self) -> impl Iterator<Item = SsaNameId> + '_ {
        let ops: [Option<&Operand>; 2] = match self {
            Terminator::Branch { cond, .. } => [Some(&cond.lhs), Some(&cond.rhs)],
            Terminator::Switch { index, .. } => [Some(index), None],
            Terminator::Return(value) => [value.as_ref(), None],
            Terminator::Jump(_) | Terminator::Unreachable => [None, None],
        };
        ops.into_iter().flatten().filter_map(Operand::as_name)
    }

    /// Applies `f` to every operand slot read by the terminator.
    pub fn rewrite_operands(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Terminator::Branch { cond, .. } => {
                f(&mut cond.lhs);
                f(&mut cond.rhs);
            }
            Terminator::Switch { index, .. } => f(index),
            Terminator::Return(Some(value)) => f(value),
            Terminator::Return(None) | Terminator::Jump(_) | Terminator::Unreachable => {}
        }
    }

    /// Applies `f` to every destination block.
    pub fn rewrite_targets(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            Terminator::Jump(t) => f(t),
            Terminator::Branch {
                on_true, on_false, ..
            } => {
                f(on_true);
                f(on_false);
            }
            Terminator::Switch { cases, default, .. } => {
                cases.iter_mut().for_each(|c| f(&mut c.target));
                f(default);
            }
            Terminator::Return(_) | Terminator::Unreachable => {}
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(t) => write!(f, "goto {t}"),
            Terminator::Branch {
                cond,
                on_true,
                on_false,
            } => write!(f, "if ({cond}) goto {on_true} else goto {on_false}"),
            Terminator::Switch {
                index,
                cases,
                default,
            } => {
                write!(f, "switch ({index}) {{ ")?;
                for c in cases {
                    if c.low == c.high {
                        write!(f, "case {}: {}; ", c.low, c.target)?;
                    } else {
                        write!(f, "case {} ... {}: {}; ", c.low, c.high, c.target)?;
                    }
                }
                write!(f, "default: {default} }}")
            }
            Terminator::Return(Some(v)) => write!(f, "return {v}"),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// An incoming value of a PHI node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOperand {
    /// The predecessor the value flows in from.
    pub predecessor: BlockId,
    /// The value.
    pub value: Operand,
}

/// A PHI node: `dest = PHI <value from each predecessor>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phi {
    /// The defined name.
    pub dest: SsaNameId,
    /// One entry per incoming edge.
    pub operands: Vec<PhiOperand>,
}

impl Phi {
    /// The value flowing in from `pred`.
    #[must_use]
    pub fn operand_from(&self, pred: BlockId) -> Option<Operand> {
        self.operands
            .iter()
            .find(|o| o.predecessor == pred)
            .map(|o| o.value)
    }
}

impl fmt::Display for Phi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = PHI <", self.dest)?;
        for (i, o) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", o.value, o.predecessor)?;
        }
        write!(f, ">")
    }
}
