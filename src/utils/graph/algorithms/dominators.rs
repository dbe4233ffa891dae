//! Dominator trees over rooted graphs.
//!
//! A node `d` **dominates** `n` if every path from the entry to `n` passes
//! through `d`. The immediate dominator of `n` is its closest strict
//! dominator; linking every node to it forms the dominator tree.
//!
//! The assertion synthesizer uses dominance to deduplicate and relocate
//! assertions, and the insertion pass uses it to decide which uses an
//! assertion definition reaches.
//!
//! # Algorithm
//!
//! Cooper, Harvey and Kennedy's iterative scheme: process nodes in reverse
//! post-order, intersecting the already-known dominators of each processed
//! predecessor until nothing changes. CFGs produced from structured code
//! converge in two or three passes.
//!
//! Nodes unreachable from the entry have no immediate dominator. They are
//! dominated by nothing and dominate nothing but themselves.

use crate::utils::graph::{
    algorithms::traversal::reverse_postorder, NodeId, Predecessors, RootedGraph, Successors,
};

/// Result of dominator computation.
///
/// # Examples
///
/// ```rust,ignore
/// use rangescope::utils::graph::algorithms::compute_dominators;
///
/// let dom = compute_dominators(&function, function.entry());
/// assert!(dom.dominates(function.entry(), some_block));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    /// Immediate dominator per node; the entry maps to itself, unreachable nodes to `None`.
    idom: Vec<Option<NodeId>>,
    depth: Vec<usize>,
}

impl DominatorTree {
    /// Returns the root of the tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of `node`, or `None` for the entry and
    /// for unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            return None;
        }
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        matches!(self.idom.get(node.index()), Some(Some(_)))
    }

    /// Checks if `a` dominates `b`. A node dominates itself.
    ///
    /// # Complexity
    ///
    /// O(depth(b) - depth(a)).
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let target = self.depth[a.index()];
        let mut current = b;
        while self.depth[current.index()] > target {
            match self.immediate_dominator(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        current == a
    }

    /// Checks if `a` dominates `b` and `a != b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Iterates the dominators of `node`, from `node` itself up to the entry.
    pub fn dominators(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.is_reachable(node).then_some(node);
        std::iter::successors(start, move |&n| self.immediate_dominator(n))
    }

    /// Returns the depth of `node`; the entry has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        self.depth.get(node.index()).copied().unwrap_or(0)
    }

    /// Returns the nodes whose immediate dominator is `node`.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        (0..self.idom.len())
            .map(NodeId::new)
            .filter(|&n| n != self.entry && self.idom[n.index()] == Some(node))
            .collect()
    }

    /// Returns the number of nodes covered by the tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: RootedGraph + Successors + Predecessors,
{
    let count = graph.node_count();
    let order = reverse_postorder(graph, entry);

    let mut rpo_number = vec![usize::MAX; count];
    for (i, node) in order.iter().enumerate() {
        rpo_number[node.index()] = i;
    }

    let mut idom: Vec<Option<NodeId>> = vec![None; count];
    if entry.index() < count {
        idom[entry.index()] = Some(entry);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &node in order.iter().skip(1) {
            let mut new_idom: Option<NodeId> = None;
            for pred in graph.predecessors(node) {
                if idom[pred.index()].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &rpo_number, pred, current),
                });
            }
            if new_idom.is_some() && idom[node.index()] != new_idom {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }

    let mut depth = vec![0usize; count];
    for &node in order.iter().skip(1) {
        if let Some(parent) = idom[node.index()] {
            depth[node.index()] = depth[parent.index()] + 1;
        }
    }

    DominatorTree { entry, idom, depth }
}

fn intersect(idom: &[Option<NodeId>], rpo: &[usize], a: NodeId, b: NodeId) -> NodeId {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo[finger1.index()] > rpo[finger2.index()] {
            match idom[finger1.index()] {
                Some(next) => finger1 = next,
                None => return finger2,
            }
        }
        while rpo[finger2.index()] > rpo[finger1.index()] {
            match idom[finger2.index()] {
                Some(next) => finger2 = next,
                None => return finger1,
            }
        }
    }
    finger1
}
