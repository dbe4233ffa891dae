//! Support data structures: bit sets and graph algorithms.

mod bitset;
pub mod graph;

pub use bitset::BitSet;
