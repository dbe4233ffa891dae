//! Pending assertions and where they go.
//!
//! An assertion is requested for a name, a predicate and a locus: a CFG
//! edge, or the point just after a statement. Requests for the same name
//! and predicate are merged by dominance. A request already covered by a
//! dominating one is dropped, and a request that dominates an existing one
//! takes its place.

use std::collections::HashMap;

use log::debug;

use crate::{
    ir::{BlockId, EdgeId, Function, Predicate, SsaNameId},
    utils::graph::algorithms::DominatorTree,
};

/// Where an assertion is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus {
    /// On a CFG edge; the edge is split when it is critical.
    Edge(EdgeId),
    /// Right after statement `index` of `block`.
    After {
        /// The block.
        block: BlockId,
        /// The statement the assertion follows.
        index: usize,
    },
}

/// Statement index standing for "after every statement of the block".
const BLOCK_END: usize = usize::MAX;

/// A program point as `(block, statement index)`.
type Point = (BlockId, usize);

impl Locus {
    /// The earliest point at which the assertion holds for the rest of the
    /// dominated region, or `None` when it sits in a split block that
    /// dominates nothing else.
    fn holds_from(self, func: &Function) -> Option<Point> {
        match self {
            Locus::After { block, index } => Some((block, index + 1)),
            Locus::Edge(e) => {
                let edge = func.edge(e)?;
                (func.pred_edges(edge.dst).len() == 1).then_some((edge.dst, 0))
            }
        }
    }

    /// A point every path to the locus passes through last.
    fn reached_at(self, func: &Function) -> Option<Point> {
        match self {
            Locus::After { block, index } => Some((block, index + 1)),
            Locus::Edge(e) => {
                let edge = func.edge(e)?;
                if func.pred_edges(edge.dst).len() == 1 {
                    Some((edge.dst, 0))
                } else {
                    Some((edge.src, BLOCK_END))
                }
            }
        }
    }
}

fn point_dominates(dom: &DominatorTree, a: Point, b: Point) -> bool {
    if a.0 == b.0 {
        a.1 <= b.1
    } else {
        dom.strictly_dominates(a.0, b.0)
    }
}

/// A pending assertion `name' = ASSERT(name, predicate)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertLocus {
    /// The name being refined.
    pub name: SsaNameId,
    /// What holds at the locus.
    pub predicate: Predicate,
    /// Where the assertion goes.
    pub locus: Locus,
}

/// Requested assertions, grouped per name.
#[derive(Debug, Default)]
pub(crate) struct AssertRegistry {
    per_name: HashMap<SsaNameId, Vec<AssertLocus>>,
    order: Vec<SsaNameId>,
}

impl AssertRegistry {
    /// Registers a request, merging it with any equivalent one by dominance.
    pub(crate) fn register(
        &mut self,
        func: &Function,
        dom: &DominatorTree,
        name: SsaNameId,
        predicate: Predicate,
        locus: Locus,
    ) {
        let Some(reached) = locus.reached_at(func) else {
            return;
        };
        let holds = locus.holds_from(func);
        let entries = self.per_name.entry(name).or_insert_with(|| {
            self.order.push(name);
            Vec::new()
        });

        for existing in entries.iter_mut().filter(|l| l.predicate == predicate) {
            if existing.locus == locus {
                return;
            }
            let existing_holds = existing.locus.holds_from(func);
            if existing_holds.is_some_and(|p| point_dominates(dom, p, reached)) {
                debug!("assertion {name} {predicate} at {locus:?} already covered");
                return;
            }
            let existing_reached = existing.locus.reached_at(func);
            if let (Some(h), Some(r)) = (holds, existing_reached) {
                if point_dominates(dom, h, r) {
                    debug!(
                        "relocating assertion {name} {predicate} from {:?} to {locus:?}",
                        existing.locus
                    );
                    existing.locus = locus;
                    return;
                }
            }
        }

        debug!("registering assertion {name} {predicate} at {locus:?}");
        entries.push(AssertLocus {
            name,
            predicate,
            locus,
        });
    }

    /// Whether nothing was registered.
    pub(crate) fn is_empty(&self) -> bool {
        self.per_name.values().all(Vec::is_empty)
    }

    /// All requests, names in registration order.
    pub(crate) fn into_loci(mut self) -> Vec<AssertLocus> {
        self.order
            .iter()
            .filter_map(|name| self.per_name.remove(name))
            .flatten()
            .collect()
    }
}
