//! Minimal graph abstractions consumed by the traversal and dominator algorithms.
//!
//! - [`GraphBase`] - node count and node iteration
//! - [`Successors`] - outgoing edges
//! - [`Predecessors`] - incoming edges
//! - [`RootedGraph`] - a designated entry node
//!
//! Adjacency queries return iterators so the IR can answer them straight from
//! its edge tables without allocating.

use crate::utils::graph::NodeId;

/// Core graph properties.
pub trait GraphBase {
    /// Returns the number of nodes. Node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Iterates all node identifiers in ascending order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward traversal.
pub trait Successors: GraphBase {
    /// Iterates the targets of edges leaving `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward traversal.
pub trait Predecessors: GraphBase {
    /// Iterates the sources of edges entering `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a single entry node from which analyses start.
pub trait RootedGraph: GraphBase {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Adjacency-list graph used by the algorithm unit tests.

    use super::*;

    pub(crate) struct TestGraph {
        pub succ: Vec<Vec<usize>>,
        pub pred: Vec<Vec<usize>>,
    }

    impl TestGraph {
        pub(crate) fn new(nodes: usize, edges: &[(usize, usize)]) -> Self {
            let mut succ = vec![Vec::new(); nodes];
            let mut pred = vec![Vec::new(); nodes];
            for &(a, b) in edges {
                succ[a].push(b);
                pred[b].push(a);
            }
            Self { succ, pred }
        }
    }

    impl GraphBase for TestGraph {
        fn node_count(&self) -> usize {
            self.succ.len()
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.succ.len()).map(NodeId::new)
        }
    }

    impl Successors for TestGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.succ[node.index()].iter().map(|&n| NodeId::new(n))
        }
    }

    impl Predecessors for TestGraph {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.pred[node.index()].iter().map(|&n| NodeId::new(n))
        }
    }

    impl RootedGraph for TestGraph {
        fn entry(&self) -> NodeId {
            NodeId::new(0)
        }
    }
}
