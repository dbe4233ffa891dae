//! Graph abstractions and algorithms.
//!
//! The IR implements the traits in [`traits`] directly, so algorithms run on
//! a [`crate::ir::Function`] without building a separate graph.

pub mod algorithms;
mod node;
pub mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
