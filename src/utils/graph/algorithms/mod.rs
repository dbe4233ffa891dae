//! Graph algorithms used by the analyses.
//!
//! | Algorithm | Complexity | Used by |
//! |-----------|------------|---------|
//! | [`postorder`] / [`reverse_postorder`] | O(V + E) | liveness, worklist seeding |
//! | [`compute_dominators`] | O(V + E) per pass | assertion placement, loop detection |

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, DominatorTree};
pub use traversal::{postorder, reverse_postorder};
