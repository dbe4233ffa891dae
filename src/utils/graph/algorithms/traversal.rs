//! Depth-first orderings.
//!
//! Reverse post-order is the visiting order the propagation engine seeds its
//! worklist with and the order dominators converge fastest in. Post-order is
//! what the backward liveness sweep walks.

use crate::utils::graph::{NodeId, Successors};

#[derive(Clone, Copy)]
enum Visit {
    Enter,
    Leave,
}

/// Returns the nodes reachable from `start` in depth-first post-order.
///
/// Successors are explored in the order the graph yields them. An invalid
/// `start` yields an empty vector.
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let count = graph.node_count();
    if start.index() >= count {
        return Vec::new();
    }

    let mut seen = vec![false; count];
    let mut order = Vec::with_capacity(count);
    let mut stack = vec![(start, Visit::Enter)];

    while let Some((node, visit)) = stack.pop() {
        match visit {
            Visit::Leave => order.push(node),
            Visit::Enter => {
                if std::mem::replace(&mut seen[node.index()], true) {
                    continue;
                }
                stack.push((node, Visit::Leave));
                let succs: Vec<NodeId> = graph.successors(node).collect();
                stack.extend(
                    succs
                        .into_iter()
                        .rev()
                        .filter(|s| !seen[s.index()])
                        .map(|s| (s, Visit::Enter)),
                );
            }
        }
    }

    order
}

/// Returns the nodes reachable from `start` in reverse post-order.
///
/// Every node appears before its successors, back edges excepted.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}
